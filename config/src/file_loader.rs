//! Reads an [`AppConfig`] from a `.toml`, `.yaml` or `.yml` file. Sections
//! and fields the file leaves out keep their defaults.

use crate::config::AppConfig;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("Cannot read config file {0}")]
    FileNotFound(String),

    #[error("Invalid TOML config: {0}")]
    TomlParse(String),

    #[error("Invalid YAML config: {0}")]
    YamlParse(String),

    #[error("Config file needs a .toml, .yaml or .yml extension")]
    NoExtension,

    #[error("Unsupported config extension: {0}")]
    UnsupportedFormat(String)
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path).map_err(|_| ConfigFileError::FileNotFound(path.display().to_string()))
}

pub fn load_from_toml(path: &Path) -> Result<AppConfig, ConfigFileError> {
    toml::from_str(&read(path)?).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

pub fn load_from_yaml(path: &Path) -> Result<AppConfig, ConfigFileError> {
    serde_yaml::from_str(&read(path)?).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Picks the parser from the file extension.
pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[feedback]\nlearning_rate = 0.25\n\n[generation]\nmax_track_seconds = 30"
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert!((config.feedback.learning_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.generation.max_track_seconds, 30);
        assert_eq!(config.generation.max_tracks, 4);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_yaml_is_detected_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "server:\n  port: 9100\nagents:\n  max_captions: 2").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.agents.max_captions, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            load_from_file(file.path()),
            Err(ConfigFileError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_from_toml(Path::new("/definitely/not/here.toml")),
            Err(ConfigFileError::FileNotFound(_))
        ));
    }
}
