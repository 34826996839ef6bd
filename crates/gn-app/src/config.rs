use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::Context;
use tracing::debug;
use crate::pipeline::PipelineOptions;

pub const DEFAULT_API_URL: &str = "https://assetforger.blockadelabs.com/api/skybox/";

#[derive(Debug, Clone, PartialEq)]
pub struct GenesisConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub model_path: PathBuf,
    pub model_resolution: usize,
    pub output_dir: PathBuf,
}

impl GenesisConfig {
    /// Reads `.env` if present, then the process environment
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env loaded: {}", e);
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = lookup("GENESIS_API_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_token = lookup("GENESIS_API_TOKEN").filter(|token| !token.trim().is_empty());

        let max_retries: u32 = parse_var(&lookup, "GENESIS_MAX_RETRIES", 10)?;
        let poll_interval_ms: u64 = parse_var(&lookup, "GENESIS_POLL_INTERVAL_MS", 5000)?;
        let request_timeout_secs: u64 = parse_var(&lookup, "GENESIS_REQUEST_TIMEOUT_SECS", 30)?;
        let model_resolution: usize = parse_var(&lookup, "GENESIS_MODEL_RESOLUTION", 256)?;
        if model_resolution == 0 {
            anyhow::bail!("GENESIS_MODEL_RESOLUTION must be positive");
        }

        Ok(Self {
            api_url,
            api_token,
            max_retries,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            model_path: lookup("GENESIS_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/model/depth_net.mpk")),
            model_resolution,
            output_dir: lookup("GENESIS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("outputs")),
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_retries: self.max_retries,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        None => Ok(default),
    }
}
