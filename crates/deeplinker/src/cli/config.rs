//! Configuration loading and the `config` command.
//!
//! Paths live under `~/.deeplinker/` unless `DEEPLINKER_HOME` is set.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use deeplinker_protocol::paths::default_config_path;
use deeplinker_protocol::{ConfigError, DeeplinkerConfig};

use super::error::HelpfulError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Show,
    Path,
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// Load `config.toml`; a missing file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<DeeplinkerConfig> {
    let path = config_path(explicit);
    match DeeplinkerConfig::load(&path) {
        Ok(config) => Ok(config),
        Err(err @ (ConfigError::Parse { .. } | ConfigError::Invalid { .. })) => {
            Err(HelpfulError::bad_config(&path, &err.to_string()).into())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to load {}", path.display())),
    }
}

pub fn run(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_path(explicit).display());
        }
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("# {}", config_path(explicit).display());
            println!("# links file: {}", config.storage.links_path().display());
            println!("# relay file: {}", config.storage.relay_path().display());
            print!("{}", rendered);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = load_config(Some(&temp.path().join("config.toml"))).unwrap();
        assert_eq!(config, DeeplinkerConfig::default());
    }

    #[test]
    fn test_bad_file_is_helpful() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[routes]\nshort_prefix = \"l\"\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        let helpful = err.downcast_ref::<HelpfulError>().unwrap();
        assert!(helpful.message.contains("config.toml"));
    }
}
