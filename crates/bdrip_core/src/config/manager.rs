//! Loading and saving the `bdrip.toml` settings file.
//!
//! A missing file can be created from defaults. Missing keys take their
//! defaults and unknown keys are ignored. Saves go through a temp file and a
//! rename so a crash never leaves a half-written config.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::Settings;

/// Settings file failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings could not be written as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Settings file {0} does not exist")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Shorthand for settings file results.
pub type ConfigResult<T> = Result<T, ConfigError>;

const HEADER: &str = "# bdrip configuration\n\
# Missing keys fall back to their defaults. Timeouts are in seconds, 0 = none.\n\n";

/// Owns one settings file and the `Settings` read from it.
pub struct ConfigManager {
    path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Manager for `path`, holding defaults until `load` or `load_or_create` runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory edits; persisted only by `save`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Read and validate the file. A missing file is `ConfigError::NotFound`.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.path.is_file() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }

        self.settings = parse_settings(&fs::read_to_string(&self.path)?)?;
        tracing::debug!("Settings loaded from {}", self.path.display());
        Ok(())
    }

    /// Like `load`, but writes the defaults first when the file is missing.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.path.is_file() {
            return self.load();
        }

        self.settings = Settings::default();
        self.save()?;
        tracing::info!("Default settings written to {}", self.path.display());
        Ok(())
    }

    /// Write every section, replacing the file in one rename.
    pub fn save(&self) -> ConfigResult<()> {
        let body = toml::to_string_pretty(&self.settings)?;
        self.replace_file(&format!("{}{}", HEADER, body))?;
        Ok(())
    }

    fn replace_file(&self, content: &str) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)?,
            _ => {}
        }

        let staging = self.path.with_extension("toml.tmp");
        let mut file = fs::File::create(&staging)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &self.path)
    }
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.validate().map_err(ConfigError::Invalid)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("bdrip.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.starts_with("# bdrip configuration"));
        assert!(content.contains("[paths]"));
        assert!(content.contains("[encoder]"));
        assert!(content.contains("[tools.encoder]"));
    }

    #[test]
    fn saved_file_round_trips() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bdrip.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.settings_mut().encoder.threads = 8;
        manager.settings_mut().batch.output_prefix = "title_".to_string();
        manager.save().unwrap();

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().encoder.threads, 8);
        assert_eq!(reloaded.settings().batch.output_prefix, "title_");
        assert_eq!(
            reloaded.settings().encoder.extra_args,
            Settings::default().encoder.extra_args
        );
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bdrip.toml");
        fs::write(&config_path, "[paths]\noutput_folder = \"/srv/out\"\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(
            manager.settings().paths.output_folder,
            PathBuf::from("/srv/out")
        );
        let content = fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[paths]\noutput_folder = \"/srv/out\"\n");
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bdrip.toml");
        fs::write(&config_path, "[encoder]\nthreads = 0\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        assert!(matches!(manager.load(), Err(ConfigError::Invalid(_))));

        fs::write(&config_path, "[encoder\n").unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bdrip.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }
}
