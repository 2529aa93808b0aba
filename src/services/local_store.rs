use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::errors::{AppError, Result};

pub const DEFAULT_TAIL_LINES: u32 = 20;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Tail viewer settings remembered between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailPreferences {
    pub tail_mode: bool,
    pub tail_lines: u32,
    pub poll_interval_secs: u64,
}

impl Default for TailPreferences {
    fn default() -> Self {
        Self {
            tail_mode: true,
            tail_lines: DEFAULT_TAIL_LINES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl TailPreferences {
    /// Line count and interval are at least 1; zero falls back to the default.
    pub fn sanitized(self) -> Self {
        Self {
            tail_mode: self.tail_mode,
            tail_lines: if self.tail_lines == 0 { DEFAULT_TAIL_LINES } else { self.tail_lines },
            poll_interval_secs: if self.poll_interval_secs == 0 {
                DEFAULT_POLL_INTERVAL_SECS
            } else {
                self.poll_interval_secs
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVersion {
    pub version: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    tail: TailPreferences,
    #[serde(default)]
    latest_version: Option<CachedVersion>,
}

/// Small TOML file holding client-side state. Reads are forgiving: a missing
/// or corrupt file starts from defaults.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    state: StoredState,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<StoredState>(&raw).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable state file {}: {}", path.display(), e);
                StoredState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => {
                log::warn!("Cannot read state file {}: {}", path.display(), e);
                StoredState::default()
            },
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tail_preferences(&self) -> TailPreferences {
        self.state.tail.sanitized()
    }

    pub fn set_tail_preferences(&mut self, prefs: TailPreferences) -> Result<()> {
        self.state.tail = prefs.sanitized();
        self.save()
    }

    /// Cached release version if it is younger than `ttl`.
    pub fn cached_version(&self, now: DateTime<Utc>, ttl: Duration) -> Option<String> {
        let cached = self.state.latest_version.as_ref()?;
        if cached.version.is_empty() || now.signed_duration_since(cached.fetched_at) > ttl {
            return None;
        }
        Some(cached.version.clone())
    }

    pub fn cache_version(&mut self, version: &str, now: DateTime<Utc>) -> Result<()> {
        self.state.latest_version = Some(CachedVersion {
            version: version.to_string(),
            fetched_at: now,
        });
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = toml::to_string_pretty(&self.state)
            .map_err(|e| AppError::Parse(format!("cannot serialize state: {}", e)))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("state.toml"));
        assert_eq!(store.tail_preferences(), TailPreferences::default());
        assert_eq!(store.cached_version(Utc::now(), Duration::hours(6)), None);
    }

    #[test]
    fn preferences_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut store = LocalStore::open(&path);
        store
            .set_tail_preferences(TailPreferences {
                tail_mode: false,
                tail_lines: 150,
                poll_interval_secs: 2,
            })
            .unwrap();

        let reopened = LocalStore::open(&path);
        let prefs = reopened.tail_preferences();
        assert!(!prefs.tail_mode);
        assert_eq!(prefs.tail_lines, 150);
        assert_eq!(prefs.poll_interval_secs, 2);
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "tail = [this is not toml").unwrap();

        let store = LocalStore::open(&path);
        assert_eq!(store.tail_preferences(), TailPreferences::default());
    }

    #[test]
    fn zero_values_are_clamped() {
        let prefs = TailPreferences {
            tail_mode: true,
            tail_lines: 0,
            poll_interval_secs: 0,
        }
        .sanitized();
        assert_eq!(prefs.tail_lines, DEFAULT_TAIL_LINES);
        assert_eq!(prefs.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn version_cache_expires() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let fetched = Utc::now();

        let mut store = LocalStore::open(&path);
        store.cache_version("v1.2.3", fetched).unwrap();

        let store = LocalStore::open(&path);
        let ttl = Duration::hours(6);
        assert_eq!(
            store.cached_version(fetched + Duration::hours(1), ttl).as_deref(),
            Some("v1.2.3")
        );
        assert_eq!(store.cached_version(fetched + Duration::hours(7), ttl), None);
    }
}
