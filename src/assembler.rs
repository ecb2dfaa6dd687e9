//! Metadata assembly: one upload in, one envelope out.

use crate::ai::AiAnalyzer;
use crate::error::AppError;
use crate::exif_data;
use crate::gps;
use crate::metadata::{format_file_size, FileInfo, MetadataEnvelope, ProcessingInfo, Section};
use crate::properties;
use chrono::{SecondsFormat, Utc};
use md5::{Digest, Md5};

/// Assemble the full metadata envelope for an uploaded image.
///
/// Image decode failure is fatal (the request cannot mean anything without
/// a readable image); every other section degrades independently, so a
/// missing GPS block or a failed AI call never suppresses its siblings.
pub async fn assemble(
    image_bytes: &[u8],
    filename: &str,
    content_type: &str,
    ai: Option<&AiAnalyzer>,
) -> Result<MetadataEnvelope, AppError> {
    let file_info = FileInfo {
        filename: filename.to_string(),
        size_bytes: image_bytes.len() as u64,
        size_formatted: format_file_size(image_bytes.len() as u64),
        content_type: content_type.to_string(),
        md5_hash: md5_hex(image_bytes),
        upload_timestamp: now(),
    };

    let format = image::guess_format(image_bytes)?;
    let image = image::load_from_memory_with_format(image_bytes, format)?;
    log::debug!(
        "Decoded {} as {:?}, {} bytes",
        filename,
        format,
        image_bytes.len()
    );

    let image_properties = Section::Present(properties::inspect(&image, format));

    let exif = exif_data::read_exif(image_bytes);
    // No EXIF is an empty tag set, not an error.
    let exif_data = Section::Present(
        exif.as_ref()
            .map(exif_data::tag_set)
            .unwrap_or_default(),
    );

    let gps_location = gps::extract_gps(exif.as_ref());

    let mut envelope = MetadataEnvelope {
        status: "success".to_string(),
        message: "Metadata extracted successfully".to_string(),
        file_info,
        image_properties,
        exif_data,
        gps_location,
        ai_analysis: None,
        processing_info: ProcessingInfo {
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            processed_at: now(),
        },
    };

    if let Some(analyzer) = ai {
        let section = analyzer
            .analyze_section(image_bytes, content_type, &envelope)
            .await;
        envelope.ai_analysis = Some(section);
    }

    Ok(envelope)
}

fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
