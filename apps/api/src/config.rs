use std::str::FromStr;

use anyhow::{Context, Result};

const DEFAULT_BUCKET: &str = "llm-customer-uploads";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub s3_bucket: String,
    /// Custom endpoint for S3-compatible stores (MinIO, localstack).
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm: LlmDefaults,
    /// Request body cap for multipart uploads.
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

/// Model parameters applied when the caller does not supply their own.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmDefaults {
    pub model: String,
    pub timeout_secs: u64,
    pub recommend_temperature: f32,
    pub recommend_max_tokens: u32,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
}

impl Default for LlmDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            recommend_temperature: 0.4,
            recommend_max_tokens: 1024,
            chat_temperature: 0.7,
            chat_max_tokens: 2048,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = LlmDefaults::default();

        Ok(Config {
            s3_bucket: env_or("S3_BUCKET_NAME", DEFAULT_BUCKET),
            s3_endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env_or("AWS_REGION", DEFAULT_REGION),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            llm: LlmDefaults {
                model: env_or("LLM_MODEL", &defaults.model),
                timeout_secs: parse_env("LLM_TIMEOUT_SECS", defaults.timeout_secs)?,
                recommend_temperature: parse_env(
                    "RECOMMEND_TEMPERATURE",
                    defaults.recommend_temperature,
                )?,
                recommend_max_tokens: parse_env(
                    "RECOMMEND_MAX_TOKENS",
                    defaults.recommend_max_tokens,
                )?,
                chat_temperature: parse_env("CHAT_TEMPERATURE", defaults.chat_temperature)?,
                chat_max_tokens: parse_env("CHAT_MAX_TOKENS", defaults.chat_max_tokens)?,
            },
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_env("PORT", 8000u16)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Configuration used by in-process tests; never touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            s3_bucket: DEFAULT_BUCKET.to_string(),
            s3_endpoint: None,
            aws_region: DEFAULT_REGION.to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            openai_api_key: "test".to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            llm: LlmDefaults::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}
