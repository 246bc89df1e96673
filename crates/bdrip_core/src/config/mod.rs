//! Configuration management for bdrip.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Defaults for every missing key
//!
//! # Example
//!
//! ```no_run
//! use bdrip_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("bdrip.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Encoder threads: {}", config.settings().encoder.threads);
//! config.settings_mut().logging.compact = false;
//! config.save().unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{parse_settings, ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    BatchSettings, EncoderSettings, LoggingSettings, PathSettings, Settings, TimeoutSettings,
    ToolSettings,
};
