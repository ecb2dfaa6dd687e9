//! Filesystem persistence for uploaded images and their metadata.
//!
//! Each save writes the image bytes under a generated id plus a sidecar
//! JSON record keyed by the same id. Listings are recomputed from the data
//! directory on every call; there is no cache, no update, and no delete.

use crate::error::AppError;
use crate::metadata::MetadataEnvelope;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedImageRecord {
    pub image_id: String,
    pub original_filename: String,
    pub saved_filename: String,
    pub image_path: String,
    pub file_size: u64,
    pub saved_at: String,
    pub has_gps: bool,
    pub has_ai_analysis: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedImageSummary {
    pub image_id: String,
    pub original_filename: String,
    pub saved_filename: String,
    pub file_size: u64,
    pub saved_at: String,
    pub has_gps: bool,
    pub has_ai_analysis: bool,
}

impl From<&SavedImageRecord> for SavedImageSummary {
    fn from(record: &SavedImageRecord) -> Self {
        Self {
            image_id: record.image_id.clone(),
            original_filename: record.original_filename.clone(),
            saved_filename: record.saved_filename.clone(),
            file_size: record.file_size,
            saved_at: record.saved_at.clone(),
            has_gps: record.has_gps,
            has_ai_analysis: record.has_ai_analysis,
        }
    }
}

pub struct Storage {
    image_dir: PathBuf,
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(image_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let storage = Self {
            image_dir: image_dir.into(),
            data_dir: data_dir.into(),
        };
        std::fs::create_dir_all(&storage.image_dir)?;
        std::fs::create_dir_all(&storage.data_dir)?;
        Ok(storage)
    }

    pub fn save(
        &self,
        image_bytes: &[u8],
        original_filename: &str,
        envelope: &MetadataEnvelope,
    ) -> Result<SavedImageRecord, AppError> {
        let image_id = generate_image_id();
        let extension = extension_of(original_filename);
        let saved_filename = format!("{}.{}", image_id, extension);
        let image_path = self.image_dir.join(&saved_filename);

        std::fs::write(&image_path, image_bytes)?;

        let record = SavedImageRecord {
            image_id: image_id.clone(),
            original_filename: original_filename.to_string(),
            saved_filename,
            image_path: image_path.to_string_lossy().to_string(),
            file_size: image_bytes.len() as u64,
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            has_gps: envelope.has_gps(),
            has_ai_analysis: envelope.has_ai_analysis(),
            metadata: serde_json::to_value(envelope)?,
        };

        let data_path = self.data_dir.join(format!("{}.json", image_id));
        std::fs::write(&data_path, serde_json::to_vec_pretty(&record)?)?;
        log::info!("Saved image {} ({} bytes)", image_id, image_bytes.len());

        Ok(record)
    }

    /// Lightweight summaries of every saved image, newest first.
    pub fn list(&self) -> Result<Vec<SavedImageSummary>, AppError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => summaries.push(SavedImageSummary::from(&record)),
                Err(e) => log::warn!("Skipping unreadable record {:?}: {}", path, e),
            }
        }
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    pub fn get(&self, image_id: &str) -> Result<SavedImageRecord, AppError> {
        if image_id.is_empty()
            || !image_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::InvalidInput(format!(
                "Invalid image id: {}",
                image_id
            )));
        }

        let path = self.data_dir.join(format!("{}.json", image_id));
        if !path.exists() {
            return Err(AppError::NotFound(format!(
                "No saved image with id {}",
                image_id
            )));
        }
        read_record(&path)
    }
}

fn read_record(path: &Path) -> Result<SavedImageRecord, AppError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn generate_image_id() -> String {
    format!(
        "{}_{:06x}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        rand::random::<u32>() & 0xff_ffff
    )
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string())
}
