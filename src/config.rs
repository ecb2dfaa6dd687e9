use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web_port: u16,
    pub log_level: String,
    pub image_directory: String,
    pub data_directory: String,
    pub max_upload_bytes: usize,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ai_timeout_secs: u64,
    pub ai_max_tokens: u32,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // The credential is usually supplied via the conventional variable
        // rather than through the config file layers.
        if config.openai_api_key.is_none() {
            config.openai_api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }
}
