use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Continue past individual bad records and tally them.
    #[default]
    Skip,
    /// Fail the run on the first bad record.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_edges")]
    pub edges: Vec<f64>,
    #[serde(default)]
    pub on_rejection: RejectionPolicy,
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    /// Deadline for draining the record source; exceeded fetches fail as
    /// source-unavailable rather than hanging.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

fn default_edges() -> Vec<f64> {
    vec![0.0, 25.0, 50.0, 75.0, 100.0]
}
fn default_preview_limit() -> usize {
    100
}
fn default_quantiles() -> Vec<f64> {
    vec![0.5, 0.95, 0.99]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            edges: default_edges(),
            on_rejection: RejectionPolicy::default(),
            preview_limit: default_preview_limit(),
            quantiles: default_quantiles(),
            fetch_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_format() -> String {
    "json".into()
}
fn default_output_dir() -> String {
    ".".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("statpipe")
            .join("config.toml")
    }

    /// $STATPIPE_CONFIG overrides the default config path for both loads
    /// and saves, so a load/save round trip touches one file.
    fn resolved_path() -> PathBuf {
        match std::env::var("STATPIPE_CONFIG") {
            Ok(env_path) => PathBuf::from(env_path),
            Err(_) => Self::config_path(),
        }
    }

    pub fn load() -> crate::Result<Self> {
        let path = Self::resolved_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let cfg: Self =
            toml::from_str(&content).map_err(|e| crate::StatPipeError::Other(e.to_string()))?;
        Ok(cfg)
    }

    pub fn save(&self) -> crate::Result<()> {
        let path = Self::resolved_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::StatPipeError::Other(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}
