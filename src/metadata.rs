//! Wire types for the metadata response envelope.

use crate::ai::AiAnalysis;
use crate::exif_data::ExifTagSet;
use crate::gps::GpsRecord;
use crate::properties::ImageProperties;
use serde::Serialize;

/// Per-section result: either data, or a first-class "no data" outcome.
///
/// Serialized untagged so absence comes out as exactly `{"error": <reason>}`;
/// clients branch on the presence of the `error` key.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Present(T),
    Absent { error: String },
}

impl<T> Section<T> {
    pub fn absent(reason: impl Into<String>) -> Self {
        Section::Absent {
            error: reason.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Section::Present(_))
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Section::Present(value) => Some(value),
            Section::Absent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub content_type: String,
    pub md5_hash: String,
    pub upload_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingInfo {
    pub api_version: String,
    pub processed_at: String,
}

/// The aggregated extraction response. Sections are independent: one
/// section degrading never removes its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataEnvelope {
    pub status: String,
    pub message: String,
    pub file_info: FileInfo,
    pub image_properties: Section<ImageProperties>,
    pub exif_data: Section<ExifTagSet>,
    pub gps_location: Section<GpsRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<Section<AiAnalysis>>,
    pub processing_info: ProcessingInfo,
}

impl MetadataEnvelope {
    pub fn has_gps(&self) -> bool {
        self.gps_location.is_present()
    }

    pub fn has_ai_analysis(&self) -> bool {
        self.ai_analysis.as_ref().map_or(false, Section::is_present)
    }
}

pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_section_serializes_as_error_object() {
        let section: Section<ImageProperties> = Section::absent("No GPS data found in EXIF");
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, serde_json::json!({"error": "No GPS data found in EXIF"}));
    }

    #[test]
    fn present_section_serializes_transparently() {
        let section = Section::Present(vec![1, 2, 3]);
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
