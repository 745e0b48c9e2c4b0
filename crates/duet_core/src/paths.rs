use anyhow::{Context, Result};
use std::path::PathBuf;

/// Well-known locations under `~/.duet/`.
pub struct DuetPaths;

impl DuetPaths {
    /// Returns the base directory: `~/.duet/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".duet"))
    }

    /// Returns the relay config file path: `~/.duet/relay.json`
    pub fn relay_config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("relay.json"))
    }

    /// Returns the logs directory: `~/.duet/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_base_dir() {
        let base = DuetPaths::base_dir().unwrap();
        assert!(base.ends_with(".duet"));
        assert_eq!(DuetPaths::relay_config_path().unwrap(), base.join("relay.json"));
        assert_eq!(DuetPaths::logs_dir().unwrap(), base.join("logs"));
    }
}
