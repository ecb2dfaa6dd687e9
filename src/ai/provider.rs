//! Vision provider seam.

use crate::error::AppError;
use async_trait::async_trait;
use base64::Engine;

/// Image payload prepared for a vision request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub media_type: String,
    pub data: String,
}

impl ImageInput {
    pub fn from_bytes(content_type: &str, bytes: &[u8]) -> Self {
        Self {
            media_type: content_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image: ImageInput,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct VisionReply {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// Object-safe seam over the vision-capable chat completion API.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn is_configured(&self) -> bool;

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, AppError>;
}
