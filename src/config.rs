// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Top-level configuration loaded from a TOML file, with environment variable overrides
/// applied on top (§6 "Environment config").
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Sources the process starts with. The engine itself does not persist this list; a
    /// real deployment replays it from the external catalog service at start-up.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }

/// Shared tuning knobs applied when a per-source request omits them.
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: i32,
    #[serde(default = "default_reconnect_delay_s")]
    pub reconnect_delay_s: f64,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            target_fps: default_target_fps(),
            max_sources: default_max_sources(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_s: default_reconnect_delay_s(),
            timeout_s: default_timeout_s(),
        }
    }
}

fn default_queue_size() -> usize { 30 }
fn default_target_fps() -> f64 { 10.0 }
fn default_max_sources() -> usize { 10 }
fn default_reconnect_attempts() -> i32 { -1 }
fn default_reconnect_delay_s() -> f64 { 2.0 }
fn default_timeout_s() -> f64 { 10.0 }

/// Declaration of a source to start automatically at process launch.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub source_id: String,
    pub name: String,
    /// Auto-detected from `uri` when absent.
    #[serde(default)]
    pub source_type: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub target_fps: Option<f64>,
    #[serde(default)]
    pub reconnect_attempts: Option<i32>,
    #[serde(default)]
    pub reconnect_delay_s: Option<f64>,
    #[serde(default)]
    pub timeout_s: Option<f64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// File adapter only; ignored by other protocols.
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
}

fn default_loop_playback() -> bool { true }

impl Config {
    /// Load configuration from a TOML file at `path`, then apply environment overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| IngestError::Config(format!("Invalid TOML: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INGEST_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("INGEST_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("INGEST_QUEUE_SIZE") {
            if let Ok(n) = v.parse() {
                self.defaults.queue_size = n;
            }
        }
        if let Ok(v) = std::env::var("INGEST_DEFAULT_FPS") {
            if let Ok(n) = v.parse() {
                self.defaults.target_fps = n;
            }
        }
        if let Ok(v) = std::env::var("INGEST_MAX_SOURCES") {
            if let Ok(n) = v.parse() {
                self.defaults.max_sources = n;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.defaults.queue_size == 0 {
            return Err(IngestError::Config("queue_size must be > 0".into()));
        }
        if self.defaults.target_fps <= 0.0 {
            return Err(IngestError::Config("target_fps must be > 0".into()));
        }
        if self.defaults.max_sources == 0 {
            return Err(IngestError::Config("max_sources must be > 0".into()));
        }
        Ok(())
    }
}
