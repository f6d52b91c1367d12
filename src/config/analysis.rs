// src/config/analysis.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::BucketMode;
use crate::error::{check_sigma, check_width};
use crate::present::ChartKind;

pub const ENV_CONFIG_PATH: &str = "CHAT_DENSITY_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/chat_density.toml";
pub const DEFAULT_JSON_PATH: &str = "config/chat_density.json";

fn default_input_dir() -> PathBuf {
    PathBuf::from("chats")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}
fn default_widths() -> Vec<f64> {
    vec![60.0]
}
fn default_sigma() -> f64 {
    2.0
}
fn default_smooth() -> bool {
    true
}
fn default_concurrency() -> usize {
    4
}

/// Knobs for one batch run. Every field has a serde default, so an empty
/// file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// One chart set per width.
    #[serde(default = "default_widths")]
    pub widths_seconds: Vec<f64>,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Smooth line charts before presenting them.
    #[serde(default = "default_smooth")]
    pub smooth: bool,
    #[serde(default)]
    pub chart_kind: ChartKind,
    #[serde(default)]
    pub mode: BucketMode,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            widths_seconds: default_widths(),
            sigma: default_sigma(),
            smooth: default_smooth(),
            chart_kind: ChartKind::default(),
            mode: BucketMode::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl AnalysisConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validated()
            .with_context(|| format!("validating config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) $CHAT_DENSITY_CONFIG_PATH
    /// 2) config/chat_density.toml
    /// 3) config/chat_density.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from(DEFAULT_JSON_PATH);
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Reject widths and sigma the core cannot use, naming the field.
    /// Duplicate widths are merged and the list is sorted; a concurrency of
    /// 0 becomes 1.
    pub fn validated(mut self) -> Result<Self> {
        if self.widths_seconds.is_empty() {
            return Err(anyhow!("widths_seconds: at least one bucket width is required"));
        }
        for (i, &w) in self.widths_seconds.iter().enumerate() {
            check_width(w).with_context(|| format!("widths_seconds[{i}]"))?;
        }
        check_sigma(self.sigma).context("sigma")?;

        let before = self.widths_seconds.len();
        self.widths_seconds.sort_by(|a, b| a.total_cmp(b));
        self.widths_seconds.dedup();
        if self.widths_seconds.len() != before {
            tracing::debug!(
                target: "config",
                widths = ?self.widths_seconds,
                "merged duplicate widths"
            );
        }

        self.concurrency = self.concurrency.max(1);
        Ok(self)
    }
}

fn parse(s: &str, hint_ext: &str) -> Result<AnalysisConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    if let Ok(v) = toml::from_str::<AnalysisConfig>(s) {
        return Ok(v);
    }
    serde_json::from_str(s)
        .map_err(|_| anyhow!("unsupported config format (expected TOML or JSON)"))
}
