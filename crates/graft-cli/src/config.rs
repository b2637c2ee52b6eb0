//! `graft.toml` loading.
//!
//! ```toml
//! [inject]
//! max_eval_depth = 64
//! static_capture_fallback = "reuse"   # or "reject"
//! warnings_as_errors = false
//!
//! [output]
//! format = "pretty"                   # or "json"
//! color = "auto"                      # "always", "never"
//!
//! [log]
//! level = "warn"
//! ```

use anyhow::Context;
use clap::ValueEnum;
use graft_engine::InjectConfig;
use serde::Deserialize;
use std::path::Path;

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "graft.toml";

/// How results are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable, colored when the terminal allows it
    #[default]
    Pretty,
    /// One JSON document on stdout
    Json,
}

/// `[output]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: Option<String>,
}

/// `[log]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: log::LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: log::LevelFilter::Warn,
        }
    }
}

/// The whole config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraftToml {
    pub inject: InjectConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

impl GraftToml {
    /// Parse config text
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load an explicit config file, or `graft.toml` from the working
    /// directory when it exists, or the defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(CONFIG_FILE).is_file() => Path::new(CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }
}
