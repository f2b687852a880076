//! # Configuration Precedence
//!
//! Resolves the effective configuration from layered sources.
//!
//! # Precedence Order
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)

use crate::config::AppConfig;
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::apply_env_overrides;
use std::path::Path;
use tracing::info;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Builds the effective configuration and validates it.
///
/// ## Usage
/// ```rust,no_run
/// use std::path::Path;
///
/// let config = config::resolve(Some(Path::new("ambience.toml"))).unwrap();
/// println!("listening on {}", config.server.port);
/// ```
pub fn resolve(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration file");
            load_from_file(path)?
        }
        None => AppConfig::default()
    };

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_env_beats_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 7000\nbind_address = \"127.0.0.1\"").unwrap();

        unsafe {
            std::env::set_var("AMB_PORT", "7100");
        }
        let config = resolve(Some(file.path())).unwrap();
        unsafe {
            std::env::remove_var("AMB_PORT");
        }

        assert_eq!(config.server.port, 7100);
        assert_eq!(config.server.bind_address, "127.0.0.1");
    }

    #[test]
    #[serial]
    fn test_invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[generation]\nmax_tracks = 9").unwrap();

        assert!(matches!(
            resolve(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }
}
