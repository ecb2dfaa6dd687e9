//! AI analysis adapter: vision-model analysis of an uploaded image,
//! grounded with a digest of the metadata already extracted.

pub mod openai;
pub mod provider;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metadata::{MetadataEnvelope, Section};
use openai::OpenAiProvider;
use provider::{ImageInput, VisionProvider, VisionRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_INSTRUCTION: &str = "You are an expert image analyst. Describe the image content, \
assess its technical quality, and identify any recognizable context such as location, \
time period, or subject matter. Be concise and factual.";

const ANALYSIS_FEATURES: [&str; 4] = [
    "image_content_analysis",
    "metadata_interpretation",
    "quality_assessment",
    "contextual_identification",
];

#[derive(Debug, Clone, Serialize)]
pub struct AiAnalysis {
    pub analysis: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    pub metadata_context_provided: bool,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiStatusReport {
    pub ai_available: bool,
    pub openai_configured: bool,
    pub model: String,
    pub features: Vec<String>,
    pub status: String,
}

pub struct AiAnalyzer {
    provider: Arc<dyn VisionProvider>,
    max_tokens: u32,
}

impl AiAnalyzer {
    pub fn new(config: &AppConfig) -> Self {
        let provider = OpenAiProvider::new(
            config.openai_api_key.clone(),
            &config.openai_model,
            Duration::from_secs(config.ai_timeout_secs),
        );
        Self {
            provider: Arc::new(provider),
            max_tokens: config.ai_max_tokens,
        }
    }

    #[cfg(test)]
    pub fn with_provider(provider: Arc<dyn VisionProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Report adapter availability without performing a call.
    pub fn status(&self) -> AiStatusReport {
        let configured = self.provider.is_configured();
        AiStatusReport {
            ai_available: configured,
            openai_configured: configured,
            model: self.provider.model().to_string(),
            features: if configured {
                ANALYSIS_FEATURES.iter().map(|f| f.to_string()).collect()
            } else {
                Vec::new()
            },
            status: if configured { "ready" } else { "unavailable" }.to_string(),
        }
    }

    /// Analyze the image, failing loudly. Used by the AI-only endpoint,
    /// where an unconfigured adapter is a request-level error.
    pub async fn analyze(
        &self,
        image_bytes: &[u8],
        content_type: &str,
        envelope: &MetadataEnvelope,
    ) -> Result<AiAnalysis, AppError> {
        log::debug!(
            "Requesting vision analysis from {} ({})",
            self.provider.name(),
            self.provider.model()
        );
        let digest = metadata_digest(envelope);
        let request = VisionRequest {
            image: ImageInput::from_bytes(content_type, image_bytes),
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: format!(
                "Analyze this image.\n\nKnown metadata:\n{}",
                digest
            ),
            max_tokens: self.max_tokens,
        };

        let reply = self.provider.complete(&request).await?;
        Ok(AiAnalysis {
            analysis: reply.text,
            model: reply.model,
            tokens_used: reply.tokens_used,
            metadata_context_provided: true,
            analyzed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        })
    }

    /// Analyze the image, degrading any failure to a section absence.
    /// Used when the AI result rides along inside a larger envelope.
    pub async fn analyze_section(
        &self,
        image_bytes: &[u8],
        content_type: &str,
        envelope: &MetadataEnvelope,
    ) -> Section<AiAnalysis> {
        match self.analyze(image_bytes, content_type, envelope).await {
            Ok(analysis) => Section::Present(analysis),
            Err(e) => {
                log::warn!("AI analysis degraded: {}", e);
                Section::absent(e.to_string())
            }
        }
    }
}

/// Textual digest of already-extracted metadata, so the model does not
/// re-derive facts the service has in hand.
fn metadata_digest(envelope: &MetadataEnvelope) -> String {
    let mut lines = vec![format!("Filename: {}", envelope.file_info.filename)];

    if let Some(props) = envelope.image_properties.as_present() {
        lines.push(format!(
            "Dimensions: {} ({} MP, {})",
            props.dimensions.resolution, props.dimensions.megapixels, props.dimensions.orientation
        ));
        lines.push(format!("Format: {}", props.technical.format));
    }

    if let Some(tags) = envelope.exif_data.as_present() {
        let camera: Vec<String> = ["Make", "Model"]
            .iter()
            .filter_map(|k| tags.get(*k))
            .filter_map(|v| match v {
                crate::exif_data::ExifValue::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        if !camera.is_empty() {
            lines.push(format!("Camera: {}", camera.join(" ")));
        }
    }

    match envelope.gps_location.as_present() {
        Some(gps) => lines.push(format!("GPS: recorded at {}", gps.coordinates_decimal)),
        None => lines.push("GPS: no location data".to_string()),
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::VisionReply;
    use async_trait::async_trait;

    struct MockProvider {
        configured: bool,
    }

    #[async_trait]
    impl VisionProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-vision-1"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, AppError> {
            if !self.configured {
                return Err(AppError::AiUnavailable("no credential".to_string()));
            }
            assert!(request.prompt.contains("Known metadata"));
            Ok(VisionReply {
                text: "A plain blue test image.".to_string(),
                model: "mock-vision-1".to_string(),
                tokens_used: Some(42),
            })
        }
    }

    async fn envelope() -> MetadataEnvelope {
        let png = crate::assembler::tests::png_bytes(64, 64);
        crate::assembler::assemble(&png, "test.png", "image/png", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn successful_analysis_carries_usage_and_context_flag() {
        let analyzer = AiAnalyzer::with_provider(Arc::new(MockProvider { configured: true }), 100);
        let env = envelope().await;
        let analysis = analyzer
            .analyze(b"png bytes", "image/png", &env)
            .await
            .unwrap();

        assert_eq!(analysis.analysis, "A plain blue test image.");
        assert_eq!(analysis.model, "mock-vision-1");
        assert_eq!(analysis.tokens_used, Some(42));
        assert!(analysis.metadata_context_provided);
    }

    #[tokio::test]
    async fn failure_degrades_to_section_absence() {
        let analyzer = AiAnalyzer::with_provider(Arc::new(MockProvider { configured: false }), 100);
        let env = envelope().await;
        let section = analyzer.analyze_section(b"png bytes", "image/png", &env).await;

        match section {
            Section::Absent { error } => assert!(!error.is_empty()),
            Section::Present(_) => panic!("unconfigured provider must not produce analysis"),
        }
    }

    #[tokio::test]
    async fn digest_names_dimensions_and_gps_absence() {
        let env = envelope().await;
        let digest = metadata_digest(&env);
        assert!(digest.contains("Filename: test.png"));
        assert!(digest.contains("64x64"));
        assert!(digest.contains("GPS: no location data"));
    }

    #[test]
    fn status_report_lists_features_only_when_configured() {
        let ready = AiAnalyzer::with_provider(Arc::new(MockProvider { configured: true }), 100);
        let report = ready.status();
        assert!(report.ai_available);
        assert!(report.openai_configured);
        assert_eq!(report.features.len(), ANALYSIS_FEATURES.len());
        assert_eq!(report.status, "ready");

        let idle = AiAnalyzer::with_provider(Arc::new(MockProvider { configured: false }), 100);
        let report = idle.status();
        assert!(!report.ai_available);
        assert!(report.features.is_empty());
        assert_eq!(report.status, "unavailable");
    }
}
