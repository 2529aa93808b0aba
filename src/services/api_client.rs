use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::{
    value_as_u64, ActionResult, BannedSummary, FileContent, GlobalStatus, JailReloadOptions,
    JailRestartOptions, JailStatus, JailTunable, LogLevel, ServerInfo, ServiceAction,
};
use crate::utils::errors::{ApiError, AppError, ConfigError, Result};
use crate::utils::validation::is_valid_ipv4;

/// Blocking client for the fail2bancontrol REST API.
///
/// Every method issues exactly one request, except [`ApiClient::load_server_info`]
/// which fans out to the five info endpoints. There are no retries and nothing
/// is cached.
pub struct ApiClient {
    http: Client,
    base: Url,
}

#[derive(Serialize)]
struct IpBody<'a> {
    ip: &'a str,
}

#[derive(Serialize)]
struct ValueBody {
    value: u64,
}

#[derive(Serialize)]
struct SecondsBody {
    seconds: u64,
}

#[derive(Serialize)]
struct LevelBody<'a> {
    level: &'a str,
}

impl ApiClient {
    /// `base_url` points at the API root, e.g. `http://127.0.0.1:9000/api`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue {
                field: "api_url".to_string(),
                value: format!("{} ({})", base_url, e),
            })
        })?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(ConfigError::InvalidValue {
                field: "api_url".to_string(),
                value: base_url.to_string(),
            }));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("f2b-control/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response> {
        let response = request.send().map_err(ApiError::from)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        log::warn!("{} answered {}: {}", endpoint, status.as_u16(), message);

        Err(AppError::Api(ApiError::Status {
            status: status.as_u16(),
            message,
        }))
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments);
        let label = url.path().to_string();
        log::debug!("GET {}", label);

        let response = self.send(self.http.get(url), &label)?;
        response.json::<T>().map_err(|e| {
            AppError::Api(ApiError::Decode {
                endpoint: label,
                reason: e.to_string(),
            })
        })
    }

    fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: Option<&B>) -> Result<ActionResult> {
        let url = self.endpoint(segments);
        let label = url.path().to_string();
        log::debug!("POST {}", label);

        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(request, &label)?;
        let text = response.text().map_err(ApiError::from)?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    fn get_field(&self, segments: &[&str], field: &str) -> Result<Value> {
        let body: Value = self.get_json(segments)?;
        Ok(body.get(field).cloned().unwrap_or(Value::Null))
    }

    pub fn global_status(&self) -> Result<GlobalStatus> {
        self.get_json(&["status"])
    }

    pub fn jails(&self) -> Result<Vec<String>> {
        self.get_json(&["jails"])
    }

    pub fn jail_status(&self, jail: &str) -> Result<JailStatus> {
        self.get_json(&["jail", jail, "status"])
    }

    pub fn banned(&self) -> Result<BannedSummary> {
        self.get_json(&["banned"])
    }

    pub fn ban(&self, jail: &str, ip: &str) -> Result<ActionResult> {
        require_ipv4(ip)?;
        self.post(&["jail", jail, "ban"], Some(&IpBody { ip }))
    }

    pub fn unban(&self, jail: &str, ip: &str) -> Result<ActionResult> {
        require_ipv4(ip)?;
        self.post(&["jail", jail, "unban"], Some(&IpBody { ip }))
    }

    pub fn unban_global(&self, ip: &str) -> Result<ActionResult> {
        require_ipv4(ip)?;
        self.post(&["unban"], Some(&IpBody { ip }))
    }

    pub fn unban_all(&self) -> Result<ActionResult> {
        self.post::<()>(&["unban", "all"], None)
    }

    /// `lines` > 0 reads the first N lines, < 0 the last N, 0 the whole file.
    pub fn file(&self, path: &str, lines: i64) -> Result<FileContent> {
        let url = self.endpoint(&["file"]);
        let label = url.path().to_string();
        log::debug!("GET {} path={} lines={}", label, path, lines);

        let request = self
            .http
            .get(url)
            .query(&[("path", path.to_string()), ("lines", lines.to_string())]);
        let response = self.send(request, &label)?;
        response.json::<FileContent>().map_err(|e| {
            AppError::Api(ApiError::Decode {
                endpoint: label,
                reason: e.to_string(),
            })
        })
    }

    pub fn version(&self) -> Result<String> {
        Ok(value_as_string(&self.get_field(&["version"], "version")?))
    }

    pub fn log_level(&self) -> Result<String> {
        Ok(value_as_string(&self.get_field(&["loglevel"], "loglevel")?))
    }

    pub fn set_log_level(&self, level: LogLevel) -> Result<ActionResult> {
        self.post(&["loglevel"], Some(&LevelBody { level: level.as_str() }))
    }

    pub fn db_file(&self) -> Result<String> {
        Ok(value_as_string(&self.get_field(&["db", "file"], "dbfile")?))
    }

    pub fn db_max_matches(&self) -> Result<Option<u64>> {
        Ok(value_as_u64(&self.get_field(&["db", "maxmatches"], "dbmaxmatches")?))
    }

    pub fn set_db_max_matches(&self, value: u64) -> Result<ActionResult> {
        self.post(&["db", "maxmatches"], Some(&ValueBody { value }))
    }

    pub fn db_purge_age(&self) -> Result<Option<u64>> {
        Ok(value_as_u64(&self.get_field(&["db", "purgeage"], "dbpurgeage")?))
    }

    pub fn set_db_purge_age(&self, seconds: u64) -> Result<ActionResult> {
        self.post(&["db", "purgeage"], Some(&SecondsBody { seconds }))
    }

    pub fn server(&self, action: ServiceAction) -> Result<ActionResult> {
        match action {
            ServiceAction::Reload(options) => self.post(&["server", action.path()], Some(&options)),
            _ => self.post::<()>(&["server", action.path()], None),
        }
    }

    pub fn set_jail_tunable(&self, jail: &str, tunable: JailTunable, value: u64) -> Result<ActionResult> {
        self.post(&["jail", jail, tunable.as_str()], Some(&ValueBody { value }))
    }

    pub fn reload_jail(&self, jail: &str, options: JailReloadOptions) -> Result<ActionResult> {
        self.post(&["jail", jail, "reload"], Some(&options))
    }

    pub fn restart_jail(&self, jail: &str, options: JailRestartOptions) -> Result<ActionResult> {
        self.post(&["jail", jail, "restart"], Some(&options))
    }

    /// Fetches version, log level and db settings concurrently. A failing
    /// endpoint leaves its field empty instead of failing the whole load.
    pub fn load_server_info(&self) -> ServerInfo {
        let (version, log_level_raw, db_file, db_max_matches, db_purge_age) = thread::scope(|s| {
            let version = s.spawn(|| self.version());
            let log_level = s.spawn(|| self.log_level());
            let db_file = s.spawn(|| self.db_file());
            let max_matches = s.spawn(|| self.db_max_matches());
            let purge_age = s.spawn(|| self.db_purge_age());

            (
                settle("version", version.join()),
                settle("loglevel", log_level.join()),
                settle("db/file", db_file.join()),
                settle("db/maxmatches", max_matches.join()),
                settle("db/purgeage", purge_age.join()),
            )
        });

        ServerInfo {
            log_level: log_level_raw.parse().ok(),
            version,
            log_level_raw,
            db_file,
            db_max_matches,
            db_purge_age,
        }
    }
}

fn settle<T: Default>(what: &str, joined: thread::Result<Result<T>>) -> T {
    match joined {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            log::warn!("Failed to load {}: {}", what, e);
            T::default()
        },
        Err(_) => {
            log::error!("Request thread for {} panicked", what);
            T::default()
        },
    }
}

fn require_ipv4(ip: &str) -> Result<()> {
    if is_valid_ipv4(ip) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("'{}' is not a valid IPv4 address", ip)))
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Prefers the `error` field of a JSON error body, then the raw text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(Value::String(error)) = map.get("error") {
            return Some(error.clone());
        }
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReloadOptions;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.url("/api"), Some(Duration::from_secs(5))).unwrap()
    }

    #[test]
    fn global_status_parses_list_and_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/status");
            then.status(200).json_body(json!({"jails": 2, "list": ["sshd", "nginx"]}));
        });

        let status = client(&server).global_status().unwrap();
        assert_eq!(status.list, vec!["sshd", "nginx"]);
        assert_eq!(status.error, None);
    }

    #[test]
    fn non_2xx_carries_status_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/jail/sshd/status");
            then.status(500).json_body(json!({"error": "socket unavailable"}));
        });

        match client(&server).jail_status("sshd") {
            Err(AppError::Api(ApiError::Status { status, message })) => {
                assert_eq!(status, 500);
                assert_eq!(message, "socket unavailable");
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_error_body_uses_reason_phrase() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/jails");
            then.status(404);
        });

        let err = client(&server).jails().unwrap_err();
        assert_eq!(err.to_string(), "API error: HTTP 404: Not Found");
    }

    #[test]
    fn jail_names_are_percent_encoded() {
        let api = ApiClient::new("http://127.0.0.1:9000/api/", None).unwrap();
        assert_eq!(
            api.endpoint(&["jail", "my jail/x", "status"]).as_str(),
            "http://127.0.0.1:9000/api/jail/my%20jail%2Fx/status"
        );
    }

    #[test]
    fn ban_posts_ip_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/jail/sshd/ban")
                .json_body(json!({"ip": "203.0.113.9"}));
            then.status(200).json_body(json!({"result": "1"}));
        });

        let result = client(&server).ban("sshd", "203.0.113.9").unwrap();
        mock.assert();
        assert_eq!(result.result.as_deref(), Some("1"));
    }

    #[test]
    fn invalid_ip_never_reaches_the_server() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });

        let api = client(&server);
        assert!(matches!(api.ban("sshd", "999.1.1.1"), Err(AppError::Validation(_))));
        assert!(matches!(api.unban("sshd", "1.2.3"), Err(AppError::Validation(_))));
        assert!(matches!(api.unban_global("abc.d.e.f"), Err(AppError::Validation(_))));
        assert_eq!(mock.hits(), 0);
    }

    #[test]
    fn empty_success_body_is_empty_result() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/unban/all");
            then.status(200);
        });

        let result = client(&server).unban_all().unwrap();
        mock.assert();
        assert_eq!(result, ActionResult::default());
    }

    #[test]
    fn file_request_encodes_line_count() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/file")
                .query_param("path", "/var/log/auth.log")
                .query_param("lines", "-20");
            then.status(200)
                .json_body(json!({"path": "/var/log/auth.log", "exists": true, "lines": ["a", "b"]}));
        });

        let content = client(&server).file("/var/log/auth.log", -20).unwrap();
        mock.assert();
        assert_eq!(content.text_lines(), vec!["a", "b"]);
    }

    #[test]
    fn reload_sends_flags_and_start_sends_nothing() {
        let server = MockServer::start();
        let reload = server.mock(|when, then| {
            when.method(POST)
                .path("/api/server/reload")
                .json_body(json!({"restart": false, "unban": true, "all": false}));
            then.status(200).json_body(json!({"result": "OK"}));
        });
        let start = server.mock(|when, then| {
            when.method(POST).path("/api/server/start");
            then.status(200).json_body(json!({"result": "OK"}));
        });

        let api = client(&server);
        api.server(ServiceAction::Reload(ReloadOptions {
            unban: true,
            ..Default::default()
        }))
        .unwrap();
        api.server(ServiceAction::Start).unwrap();
        reload.assert();
        start.assert();
    }

    #[test]
    fn tunables_use_their_body_shapes() {
        let server = MockServer::start();
        let bantime = server.mock(|when, then| {
            when.method(POST)
                .path("/api/jail/sshd/bantime")
                .json_body(json!({"value": 3600}));
            then.status(200);
        });
        let purge = server.mock(|when, then| {
            when.method(POST)
                .path("/api/db/purgeage")
                .json_body(json!({"seconds": 86400}));
            then.status(200);
        });
        let level = server.mock(|when, then| {
            when.method(POST).path("/api/loglevel").json_body(json!({"level": "DEBUG"}));
            then.status(200);
        });

        let api = client(&server);
        api.set_jail_tunable("sshd", JailTunable::Bantime, 3600).unwrap();
        api.set_db_purge_age(86400).unwrap();
        api.set_log_level(LogLevel::Debug).unwrap();
        bantime.assert();
        purge.assert();
        level.assert();
    }

    #[test]
    fn server_info_tolerates_failing_endpoints() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/version");
            then.status(200).json_body(json!({"version": "1.1.0"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/loglevel");
            then.status(200).json_body(json!({"loglevel": "INFO"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/db/file");
            then.status(500);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/db/maxmatches");
            then.status(200).json_body(json!({"dbmaxmatches": "10"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/db/purgeage");
            then.status(200).json_body(json!({"dbpurgeage": 86400}));
        });

        let info = client(&server).load_server_info();
        assert_eq!(info.version, "1.1.0");
        assert_eq!(info.log_level, Some(LogLevel::Info));
        assert_eq!(info.db_file, "");
        assert_eq!(info.db_max_matches, Some(10));
        assert_eq!(info.db_purge_age, Some(86400));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let api = ApiClient::new("http://127.0.0.1:1/api", Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(api.jails(), Err(AppError::Api(ApiError::Transport(_)))));
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(ApiClient::new("not a url", None).is_err());
        assert!(ApiClient::new("mailto:root@example.com", None).is_err());
    }
}
