use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::polling::DEFAULT_MILLISECS_BETWEEN_POLLS;
use crate::renderer::RenderOptions;

pub const DEFAULT_FONTS_DIR: &str = "assets/fonts";
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Settings read from a YAML file. Every key is optional.
///
/// ```yaml
/// fonts_dir: assets/fonts
/// font_size: 14.0
/// poll_interval_ms: 20000
/// force_overwrite: false
/// status_line: false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Holds `primary/` and `fallbacks/` font folders.
    pub fonts_dir: PathBuf,
    pub font_size: f32,
    pub poll_interval_ms: u64,
    pub force_overwrite: bool,
    pub status_line: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from(DEFAULT_FONTS_DIR),
            font_size: DEFAULT_FONT_SIZE,
            poll_interval_ms: DEFAULT_MILLISECS_BETWEEN_POLLS,
            force_overwrite: false,
            status_line: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read '{}': {error}", path.display()))
        })?;
        Self::from_yaml(&raw).map_err(|error| match error {
            Error::Config(reason) => Error::Config(format!("'{}': {reason}", path.display())),
            other => other,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).map_err(|error| Error::Config(error.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(Error::Config(format!(
                "font_size must be > 0, got {}",
                self.font_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be > 0".to_owned()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            status_line: self.status_line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(20));
        assert_eq!(config.fonts_dir, PathBuf::from("assets/fonts"));
    }

    #[test]
    fn partial_document_overrides_named_keys_only() {
        let config = Config::from_yaml("font_size: 18\nstatus_line: true\n").unwrap();
        assert_eq!(config.font_size, 18.0);
        assert!(config.render_options().status_line);
        assert!(!config.force_overwrite);
        assert_eq!(config.poll_interval_ms, DEFAULT_MILLISECS_BETWEEN_POLLS);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml("font_sise: 18\n").unwrap_err();
        assert_eq!(err.code(), "BAD_CONFIG");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_yaml("font_size: 0\n").is_err());
        assert!(Config::from_yaml("font_size: -3.5\n").is_err());
        assert!(Config::from_yaml("poll_interval_ms: 0\n").is_err());
    }

    #[test]
    fn loads_from_file_and_names_it_in_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("termsnap.yaml");
        fs::write(&path, "poll_interval_ms: 500\nforce_overwrite: true\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.force_overwrite);

        let missing = dir.path().join("missing.yaml");
        let err = Config::load(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
