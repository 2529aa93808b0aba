use std::cmp::Ordering;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::utils::semver::cmp_semver;

/// How long a looked-up release version is trusted.
pub fn cache_ttl() -> chrono::Duration {
    chrono::Duration::hours(6)
}

pub const DEFAULT_RELEASE_API: &str = "https://api.github.com";

/// Where published releases are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
}

impl ReleaseSource {
    /// Derived from this crate's `repository` field.
    pub fn from_package() -> Self {
        let (owner, repo) = owner_and_repo(env!("CARGO_PKG_REPOSITORY"))
            .unwrap_or_else(|| ("oweitman".to_string(), "fail2bancontrol".to_string()));
        Self {
            api_base: DEFAULT_RELEASE_API.to_string(),
            owner,
            repo,
        }
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }
}

fn owner_and_repo(repository: &str) -> Option<(String, String)> {
    let mut parts = repository
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .filter(|p| !p.is_empty());
    let repo = parts.next()?.to_string();
    let owner = parts.next()?.to_string();
    Some((owner, repo))
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStatus {
    pub current: String,
    pub latest: Option<String>,
    /// True when `latest` came from the network rather than the cache.
    pub fetched: bool,
}

impl VersionStatus {
    pub fn update_available(&self) -> bool {
        self.latest
            .as_deref()
            .map(|latest| cmp_semver(latest, &self.current) == Ordering::Greater)
            .unwrap_or(false)
    }
}

pub struct VersionChecker {
    http: Client,
    source: ReleaseSource,
}

impl VersionChecker {
    pub fn new(source: ReleaseSource) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("f2b-control/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { http, source }
    }

    /// Latest published tag, or `None` when the lookup fails for any reason.
    pub fn fetch_latest(&self) -> Option<String> {
        let url = self.source.latest_release_url();
        let response = match self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Release lookup at {} failed: {}", url, e);
                return None;
            },
        };

        if !response.status().is_success() {
            log::warn!("Release lookup at {} answered {}", url, response.status());
            return None;
        }

        match response.json::<LatestRelease>() {
            Ok(release) => release
                .tag_name
                .filter(|t| !t.is_empty())
                .or(release.name.filter(|n| !n.is_empty())),
            Err(e) => {
                log::warn!("Unexpected release payload from {}: {}", url, e);
                None
            },
        }
    }

    /// Runs the lookup on its own thread unless `cached` already answers it.
    /// The receiver yields one status; if it has been dropped by then the
    /// result is discarded. Writing a fetched value back to the store is left
    /// to the receiver, which owns the store.
    pub fn spawn(self, cached: Option<String>, current: &str) -> Receiver<VersionStatus> {
        let (tx, rx) = mpsc::channel();
        let current = current.to_string();
        thread::spawn(move || {
            let status = match cached {
                Some(latest) => VersionStatus {
                    current,
                    latest: Some(latest),
                    fetched: false,
                },
                None => {
                    let latest = self.fetch_latest();
                    VersionStatus {
                        current,
                        fetched: latest.is_some(),
                        latest,
                    }
                },
            };
            let _ = tx.send(status);
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    fn checker(server: &MockServer) -> VersionChecker {
        VersionChecker::new(ReleaseSource {
            api_base: server.base_url(),
            owner: "acme".to_string(),
            repo: "panel".to_string(),
        })
    }

    #[test]
    fn prefers_tag_name() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/panel/releases/latest")
                .header("accept", "application/vnd.github+json");
            then.status(200).json_body(json!({"tag_name": "v2.1.0", "name": "Release 2.1"}));
        });

        assert_eq!(checker(&server).fetch_latest().as_deref(), Some("v2.1.0"));
        mock.assert();
    }

    #[test]
    fn falls_back_to_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/panel/releases/latest");
            then.status(200).json_body(json!({"tag_name": "", "name": "1.4.0"}));
        });

        assert_eq!(checker(&server).fetch_latest().as_deref(), Some("1.4.0"));
    }

    #[test]
    fn failed_lookup_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/panel/releases/latest");
            then.status(403).body("rate limited");
        });

        assert_eq!(checker(&server).fetch_latest(), None);
    }

    #[test]
    fn spawned_check_reports_through_channel() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/panel/releases/latest");
            then.status(200).json_body(json!({"tag_name": "v0.2.0"}));
        });

        let rx = checker(&server).spawn(None, "0.1.0");
        let status = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(status.latest.as_deref(), Some("v0.2.0"));
        assert!(status.fetched);
        assert!(status.update_available());

        let rx = checker(&server).spawn(Some("v0.1.0".to_string()), "0.1.0");
        let status = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(!status.fetched);
        assert!(!status.update_available());
        assert_eq!(mock.hits(), 1);
    }

    #[test]
    fn update_signal_follows_semver() {
        let status = |latest: Option<&str>| VersionStatus {
            current: "1.2.0".to_string(),
            latest: latest.map(str::to_string),
            fetched: true,
        };
        assert!(status(Some("v1.2.1")).update_available());
        assert!(!status(Some("1.2")).update_available());
        assert!(!status(Some("1.1.9")).update_available());
        assert!(!status(None).update_available());
    }

    #[test]
    fn repository_url_is_split() {
        assert_eq!(
            owner_and_repo("https://github.com/oweitman/fail2bancontrol"),
            Some(("oweitman".to_string(), "fail2bancontrol".to_string()))
        );
        assert_eq!(
            owner_and_repo("https://github.com/acme/panel.git/"),
            Some(("acme".to_string(), "panel".to_string()))
        );
    }
}
