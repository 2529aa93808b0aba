use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::services::version_check::{ReleaseSource, DEFAULT_RELEASE_API};
use crate::utils::errors::{ConfigError, Result};

const APP_DIR: &str = "f2b-control";

/// Client settings. Every key is optional in the file.
///
/// ```toml
/// api_url = "http://127.0.0.1:9000/api"
/// request_timeout_secs = 10
/// refresh_interval_secs = 10
/// check_updates = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    /// 0 disables the timeout.
    pub request_timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub check_updates: bool,
    pub release_owner: String,
    pub release_repo: String,
    pub release_api_base: String,
    pub state_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let source = ReleaseSource::from_package();
        Self {
            api_url: "http://127.0.0.1:9000/api".to_string(),
            request_timeout_secs: 10,
            refresh_interval_secs: 10,
            check_updates: true,
            release_owner: source.owner,
            release_repo: source.repo,
            release_api_base: DEFAULT_RELEASE_API.to_string(),
            state_file: None,
        }
    }
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub no_update_check: bool,
}

impl AppConfig {
    /// Loads `explicit` (which must exist) or the first existing default
    /// location, then applies the overrides.
    pub fn load(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()).into());
                }
                Self::from_file(path)?
            },
            None => match default_config_paths(env_var).into_iter().find(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    log::info!("No configuration file found, using defaults");
                    Self::default()
                },
            },
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config = toml::from_str::<AppConfig>(&raw).map_err(|e| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.api_url {
            self.api_url = url.clone();
        }
        if overrides.no_update_check {
            self.check_updates = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_url".to_string(),
                value: self.api_url.clone(),
            }
            .into());
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn release_source(&self) -> ReleaseSource {
        ReleaseSource {
            api_base: self.release_api_base.clone(),
            owner: self.release_owner.clone(),
            repo: self.release_repo.clone(),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| default_state_path(env_var))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

pub fn default_config_paths(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(xdg) = env("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join(APP_DIR).join("config.toml"));
    }
    if let Some(home) = env("HOME") {
        paths.push(PathBuf::from(home).join(".config").join(APP_DIR).join("config.toml"));
    }
    paths.push(PathBuf::from("/etc").join(APP_DIR).join("config.toml"));
    paths
}

pub fn default_state_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(xdg) = env("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join(APP_DIR).join("state.toml");
    }
    if let Some(home) = env("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR)
            .join("state.toml");
    }
    PathBuf::from(".f2b-control-state.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::AppError;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = \"http://10.0.0.5:9000/api\"\nrequest_timeout_secs = 0\n").unwrap();

        let config = AppConfig::load(Some(&path), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.api_url, "http://10.0.0.5:9000/api");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert!(config.check_updates);
        assert_eq!(config.release_repo, "fail2bancontrol");
    }

    #[test]
    fn cli_overrides_win() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = \"http://file/api\"\ncheck_updates = true\n").unwrap();

        let overrides = ConfigOverrides {
            api_url: Some("http://cli/api".to_string()),
            no_update_check: true,
        };
        let config = AppConfig::load(Some(&path), &overrides).unwrap();
        assert_eq!(config.api_url, "http://cli/api");
        assert!(!config.check_updates);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = AppConfig::load(Some(&missing), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "refresh_interval_secs = \"soon\"").unwrap();

        let err = AppConfig::load(Some(&path), &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidFile { .. })));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "refresh_interval_secs = 0").unwrap();

        assert!(AppConfig::load(Some(&path), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn lookup_order() {
        let paths = default_config_paths(env_from(&[("XDG_CONFIG_HOME", "/x"), ("HOME", "/home/op")]));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/x/f2b-control/config.toml"),
                PathBuf::from("/home/op/.config/f2b-control/config.toml"),
                PathBuf::from("/etc/f2b-control/config.toml"),
            ]
        );
        assert_eq!(default_config_paths(env_from(&[])).len(), 1);
    }

    #[test]
    fn state_path_fallbacks() {
        assert_eq!(
            default_state_path(env_from(&[("XDG_STATE_HOME", "/s"), ("HOME", "/home/op")])),
            PathBuf::from("/s/f2b-control/state.toml")
        );
        assert_eq!(
            default_state_path(env_from(&[("HOME", "/home/op")])),
            PathBuf::from("/home/op/.local/state/f2b-control/state.toml")
        );
        assert_eq!(default_state_path(env_from(&[])), PathBuf::from(".f2b-control-state.toml"));
    }
}
