//! Runner settings loaded through the `config` crate.
//!
//! Sources, later ones winning:
//! 1. built-in defaults,
//! 2. an optional settings file (TOML, JSON or YAML by extension),
//! 3. `TILEWORLD_*` environment variables (`TILEWORLD_TICK_RATE_HZ=60`).

use crate::types::SessionConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub tick_rate_hz: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub camera_depth_offset: f64,
    /// Quiet period before a burst of viewport changes is applied.
    pub resize_debounce_ms: u64,
    pub swept_moves: bool,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            tick_rate_hz: 30.0,
            viewport_width: session.viewport_width,
            viewport_height: session.viewport_height,
            camera_depth_offset: session.camera_depth_offset,
            resize_debounce_ms: 100,
            swept_moves: session.swept_moves,
            log_filter: "tileworld=debug".into(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(Environment::with_prefix("TILEWORLD").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            camera_depth_offset: self.camera_depth_offset,
            swept_moves: self.swept_moves,
        }
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}
