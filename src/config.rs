use crate::audio::PreprocessConfig;
use crate::pipeline::{confidence::LOW_CONFIDENCE_THRESHOLD, PipelineConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineSettings,
    pub exports: ExportSettings,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Largest accepted upload body
    pub max_upload_mb: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "whsp".to_string(),
            http: HttpConfig::default(),
            max_upload_mb: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub recordings_path: String,
    pub exports_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            recordings_path: "data/recordings".to_string(),
            exports_path: "data/exports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub model_size: String,
    pub stage_timeout_secs: u64,
    pub pipeline_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub noise_reduction: bool,
    pub silence_trimming: bool,
    pub low_confidence_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_size: "base".to_string(),
            stage_timeout_secs: 120,
            pipeline_timeout_secs: 300,
            max_attempts: 3,
            retry_backoff_ms: 500,
            noise_reduction: true,
            silence_trimming: true,
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 15 * 60,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub transcribe_subject: String,
    pub generate_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            transcribe_subject: "stt.transcribe".to_string(),
            generate_subject: "llm.generate".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (extension optional) and overlay `WHSP__SECTION__KEY`
    /// environment variables. A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("WHSP").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            model_size: p.model_size.clone(),
            stage_timeout: Duration::from_secs(p.stage_timeout_secs),
            pipeline_timeout: Duration::from_secs(p.pipeline_timeout_secs),
            max_attempts: p.max_attempts,
            retry_backoff: Duration::from_millis(p.retry_backoff_ms),
            preprocess: PreprocessConfig {
                noise_reduction: p.noise_reduction,
                silence_trimming: p.silence_trimming,
                ..PreprocessConfig::default()
            },
            low_confidence_threshold: p.low_confidence_threshold,
        }
    }

    pub fn export_ttl(&self) -> Duration {
        Duration::from_secs(self.exports.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio::time::interval panics on zero
        Duration::from_secs(self.exports.sweep_interval_secs.max(1))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.service.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
