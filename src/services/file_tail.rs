use std::time::{Duration, Instant};

use crate::models::FileContent;
use crate::services::api_client::ApiClient;
use crate::services::local_store::{LocalStore, TailPreferences, DEFAULT_TAIL_LINES};
use crate::utils::errors::Result;

const MAX_TAIL_LINES: u32 = 10_000;
const MAX_POLL_INTERVAL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
struct OpenFile {
    path: String,
    exists: bool,
    lines: Vec<String>,
    last_error: Option<String>,
    last_fetch: Option<Instant>,
}

/// State of the log file modal: which file is open, what it showed last and
/// when to fetch it again.
#[derive(Debug, Clone)]
pub struct TailViewer {
    prefs: TailPreferences,
    file: Option<OpenFile>,
    next_fetch: Option<Instant>,
    pub scroll: u16,
}

impl TailViewer {
    pub fn new(prefs: TailPreferences) -> Self {
        Self {
            prefs: prefs.sanitized(),
            file: None,
            next_fetch: None,
            scroll: 0,
        }
    }

    /// `lines` query value: 0 reads the whole file, a negative count the tail.
    pub fn lines_param(prefs: &TailPreferences) -> i64 {
        if !prefs.tail_mode {
            return 0;
        }
        if prefs.tail_lines > 0 {
            -i64::from(prefs.tail_lines)
        } else {
            -i64::from(DEFAULT_TAIL_LINES)
        }
    }

    pub fn preferences(&self) -> TailPreferences {
        self.prefs
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.path.as_str())
    }

    pub fn lines(&self) -> &[String] {
        self.file.as_ref().map(|f| f.lines.as_slice()).unwrap_or(&[])
    }

    pub fn exists(&self) -> bool {
        self.file.as_ref().map(|f| f.exists).unwrap_or(false)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.last_error.as_deref())
    }

    pub fn last_fetch(&self) -> Option<Instant> {
        self.file.as_ref().and_then(|f| f.last_fetch)
    }

    /// Opens `path`; the first fetch is due immediately.
    pub fn open(&mut self, path: &str, now: Instant) {
        log::info!("Opening tail viewer for {}", path);
        self.file = Some(OpenFile {
            path: path.to_string(),
            exists: true,
            lines: Vec::new(),
            last_error: None,
            last_fetch: None,
        });
        self.scroll = 0;
        self.next_fetch = Some(now);
    }

    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            log::info!("Closing tail viewer for {}", file.path);
        }
        self.next_fetch = None;
        self.scroll = 0;
    }

    pub fn due(&self, now: Instant) -> bool {
        self.is_open() && self.next_fetch.map(|at| now >= at).unwrap_or(false)
    }

    /// Fetches the open file if polling is due. Returns whether the display
    /// changed.
    pub fn poll(&mut self, api: &ApiClient, now: Instant) -> bool {
        if !self.due(now) {
            return false;
        }
        self.fetch(api, now)
    }

    /// Fetches the open file now regardless of the schedule.
    pub fn fetch(&mut self, api: &ApiClient, now: Instant) -> bool {
        let path = match self.path() {
            Some(path) => path.to_string(),
            None => return false,
        };
        let result = api.file(&path, Self::lines_param(&self.prefs));
        self.apply(&path, result, now)
    }

    /// Stores a fetch result. Results for a path that is no longer open are
    /// dropped; a failed fetch keeps the previous text.
    pub fn apply(&mut self, requested: &str, result: Result<FileContent>, now: Instant) -> bool {
        let interval = Duration::from_secs(self.prefs.poll_interval_secs);
        let file = match self.file.as_mut() {
            Some(file) if file.path == requested => file,
            _ => {
                log::debug!("Discarding stale file response for {}", requested);
                return false;
            },
        };

        self.next_fetch = Some(now + interval);
        file.last_fetch = Some(now);
        match result {
            Ok(content) => {
                file.exists = content.exists;
                file.lines = content.text_lines();
                file.last_error = None;
                true
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", requested, e);
                file.last_error = Some(e.to_string());
                false
            },
        }
    }

    pub fn toggle_tail_mode(&mut self, store: &mut LocalStore, now: Instant) {
        let mut prefs = self.prefs;
        prefs.tail_mode = !prefs.tail_mode;
        self.update(prefs, store, now);
    }

    pub fn adjust_tail_lines(&mut self, delta: i64, store: &mut LocalStore, now: Instant) {
        let mut prefs = self.prefs;
        let lines = (i64::from(prefs.tail_lines) + delta).clamp(1, i64::from(MAX_TAIL_LINES));
        prefs.tail_lines = u32::try_from(lines).unwrap_or(DEFAULT_TAIL_LINES);
        self.update(prefs, store, now);
    }

    pub fn adjust_poll_interval(&mut self, delta: i64, store: &mut LocalStore, now: Instant) {
        let mut prefs = self.prefs;
        let secs = i64::try_from(prefs.poll_interval_secs)
            .unwrap_or(i64::MAX)
            .saturating_add(delta)
            .clamp(1, MAX_POLL_INTERVAL_SECS as i64);
        prefs.poll_interval_secs = secs as u64;
        if prefs == self.prefs {
            return;
        }
        self.prefs = prefs.sanitized();
        self.persist(store);
        if let Some(last) = self.last_fetch() {
            self.next_fetch = Some(last + Duration::from_secs(self.prefs.poll_interval_secs));
        } else if self.is_open() {
            self.next_fetch = Some(now);
        }
    }

    /// Mode and line count change what is shown, so the next fetch is due now.
    fn update(&mut self, prefs: TailPreferences, store: &mut LocalStore, now: Instant) {
        if prefs == self.prefs {
            return;
        }
        self.prefs = prefs.sanitized();
        self.persist(store);
        if self.is_open() {
            self.next_fetch = Some(now);
        }
    }

    fn persist(&self, store: &mut LocalStore) {
        if let Err(e) = store.set_tail_preferences(self.prefs) {
            log::warn!("Could not save tail preferences: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::{ApiError, AppError};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use tempfile::tempdir;

    fn prefs(tail_mode: bool, tail_lines: u32) -> TailPreferences {
        TailPreferences {
            tail_mode,
            tail_lines,
            poll_interval_secs: 5,
        }
    }

    fn content(lines: &[&str]) -> FileContent {
        FileContent {
            path: "/var/log/auth.log".to_string(),
            exists: true,
            lines: Some(lines.iter().map(|l| l.to_string()).collect()),
            content: None,
        }
    }

    #[test]
    fn lines_parameter_encoding() {
        assert_eq!(TailViewer::lines_param(&prefs(false, 50)), 0);
        assert_eq!(TailViewer::lines_param(&prefs(true, 50)), -50);
        assert_eq!(TailViewer::lines_param(&prefs(true, 0)), -20);
    }

    #[test]
    fn polling_only_while_open_and_after_interval() {
        let start = Instant::now();
        let mut viewer = TailViewer::new(TailPreferences::default());
        assert!(!viewer.due(start));

        viewer.open("/var/log/auth.log", start);
        assert!(viewer.due(start));

        assert!(viewer.apply("/var/log/auth.log", Ok(content(&["one"])), start));
        assert!(!viewer.due(start + Duration::from_secs(4)));
        assert!(viewer.due(start + Duration::from_secs(5)));

        viewer.close();
        assert!(!viewer.due(start + Duration::from_secs(60)));
    }

    #[test]
    fn stale_responses_are_discarded() {
        let start = Instant::now();
        let mut viewer = TailViewer::new(TailPreferences::default());
        viewer.open("/var/log/nginx/error.log", start);

        assert!(!viewer.apply("/var/log/auth.log", Ok(content(&["old"])), start));
        assert!(viewer.lines().is_empty());

        viewer.close();
        assert!(!viewer.apply("/var/log/nginx/error.log", Ok(content(&["late"])), start));
        assert!(viewer.lines().is_empty());
    }

    #[test]
    fn failed_fetch_keeps_previous_text() {
        let start = Instant::now();
        let mut viewer = TailViewer::new(TailPreferences::default());
        viewer.open("/var/log/auth.log", start);
        viewer.apply("/var/log/auth.log", Ok(content(&["kept"])), start);

        let failure = Err(AppError::Api(ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        }));
        assert!(!viewer.apply("/var/log/auth.log", failure, start + Duration::from_secs(5)));
        assert_eq!(viewer.lines(), ["kept".to_string()]);
        assert_eq!(viewer.last_error(), Some("API error: HTTP 500: boom"));
        assert!(!viewer.due(start + Duration::from_secs(6)));
    }

    #[test]
    fn preference_change_refetches_and_persists() {
        let server = MockServer::start();
        let tail = server.mock(|when, then| {
            when.method(GET)
                .path("/api/file")
                .query_param("path", "/var/log/auth.log")
                .query_param("lines", "-20");
            then.status(200)
                .json_body(json!({"path": "/var/log/auth.log", "exists": true, "lines": ["t1", "t2"]}));
        });
        let whole = server.mock(|when, then| {
            when.method(GET)
                .path("/api/file")
                .query_param("path", "/var/log/auth.log")
                .query_param("lines", "0");
            then.status(200)
                .json_body(json!({"path": "/var/log/auth.log", "exists": true, "content": "a\nb\nc"}));
        });

        let api = ApiClient::new(&server.url("/api"), Some(Duration::from_secs(5))).unwrap();
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.toml");
        let mut store = LocalStore::open(&state);

        let start = Instant::now();
        let mut viewer = TailViewer::new(store.tail_preferences());
        viewer.open("/var/log/auth.log", start);
        assert!(viewer.poll(&api, start));
        assert_eq!(viewer.lines(), ["t1".to_string(), "t2".to_string()]);

        let later = start + Duration::from_secs(1);
        assert!(!viewer.due(later));
        viewer.toggle_tail_mode(&mut store, later);
        assert!(viewer.due(later));
        assert!(viewer.poll(&api, later));
        assert_eq!(viewer.lines().len(), 3);

        tail.assert();
        whole.assert();
        assert!(!LocalStore::open(&state).tail_preferences().tail_mode);
    }

    #[test]
    fn line_count_is_clamped() {
        let dir = tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("state.toml"));
        let now = Instant::now();
        let mut viewer = TailViewer::new(prefs(true, 5));

        viewer.adjust_tail_lines(-50, &mut store, now);
        assert_eq!(viewer.preferences().tail_lines, 1);

        viewer.adjust_poll_interval(-10, &mut store, now);
        assert_eq!(viewer.preferences().poll_interval_secs, 1);
    }
}
