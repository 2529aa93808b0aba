//! View models mirrored from the REST API. They are replaced wholesale on every
//! refresh and never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GlobalStatus {
    #[serde(default)]
    pub jails: usize,
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GlobalStatus {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            jails: 0,
            list: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub exists: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    #[serde(default)]
    pub currently_failed: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub file_list: Vec<FileEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStats {
    #[serde(default)]
    pub currently_banned: u64,
    #[serde(default)]
    pub total_banned: u64,
    #[serde(default, rename = "bannedIPList")]
    pub banned_ip_list: Vec<String>,
}

/// Runtime tunables of a jail. Values the daemon reports as negative (for
/// example a permanent bantime) or non-numeric come through as `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JailExtra {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub findtime: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bantime: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub maxretry: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub maxmatches: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub maxlines: Option<u64>,
}

impl JailExtra {
    pub fn get(&self, tunable: JailTunable) -> Option<u64> {
        match tunable {
            JailTunable::Findtime => self.findtime,
            JailTunable::Bantime => self.bantime,
            JailTunable::Maxretry => self.maxretry,
            JailTunable::Maxmatches => self.maxmatches,
            JailTunable::Maxlines => self.maxlines,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JailStatus {
    #[serde(default)]
    pub filter: FilterStats,
    #[serde(default)]
    pub actions: ActionStats,
    #[serde(default)]
    pub extra: Option<JailExtra>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BannedSummary {
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub lines: Option<Vec<String>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl FileContent {
    pub fn text_lines(&self) -> Vec<String> {
        if let Some(ref lines) = self.lines {
            return lines.clone();
        }
        self.content
            .as_deref()
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Body of a successful POST. Servers may answer with an empty body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    TraceDebug,
    HeavyDebug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 8] = [
        LogLevel::Critical,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Notice,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::TraceDebug,
        LogLevel::HeavyDebug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::TraceDebug => "TRACEDEBUG",
            LogLevel::HeavyDebug => "HEAVYDEBUG",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|level| level == self).unwrap_or(0)
    }

    /// One step more verbose, saturating at the end of the scale.
    pub fn more_verbose(&self) -> LogLevel {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }

    pub fn less_verbose(&self) -> LogLevel {
        Self::ALL[self.index().saturating_sub(1)]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Accepts level names in any case, with or without separators
    /// (`TRACE-DEBUG`), and fail2ban's numeric levels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        let level = match normalized.as_str() {
            "CRITICAL" | "50" => LogLevel::Critical,
            "ERROR" | "40" => LogLevel::Error,
            "WARNING" | "WARN" | "30" => LogLevel::Warning,
            "NOTICE" | "25" => LogLevel::Notice,
            "INFO" | "20" => LogLevel::Info,
            "DEBUG" | "10" => LogLevel::Debug,
            "TRACEDEBUG" | "7" => LogLevel::TraceDebug,
            "HEAVYDEBUG" | "5" => LogLevel::HeavyDebug,
            _ => return Err(format!("unknown log level '{}'", s.trim())),
        };
        Ok(level)
    }
}

/// Daemon-wide facts shown on the overview. Fields the server did not
/// answer stay empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    pub version: String,
    pub log_level_raw: String,
    pub log_level: Option<LogLevel>,
    pub db_file: String,
    pub db_max_matches: Option<u64>,
    pub db_purge_age: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JailTunable {
    Findtime,
    Bantime,
    Maxretry,
    Maxmatches,
    Maxlines,
}

impl JailTunable {
    pub const ALL: [JailTunable; 5] = [
        JailTunable::Findtime,
        JailTunable::Bantime,
        JailTunable::Maxretry,
        JailTunable::Maxmatches,
        JailTunable::Maxlines,
    ];

    /// Path segment under `/jail/{name}/`, also used as label.
    pub fn as_str(&self) -> &'static str {
        match self {
            JailTunable::Findtime => "findtime",
            JailTunable::Bantime => "bantime",
            JailTunable::Maxretry => "maxretry",
            JailTunable::Maxmatches => "maxmatches",
            JailTunable::Maxlines => "maxlines",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerTunable {
    DbMaxMatches,
    DbPurgeAge,
}

impl ServerTunable {
    pub const ALL: [ServerTunable; 2] = [ServerTunable::DbMaxMatches, ServerTunable::DbPurgeAge];

    pub fn label(&self) -> &'static str {
        match self {
            ServerTunable::DbMaxMatches => "dbmaxmatches",
            ServerTunable::DbPurgeAge => "dbpurgeage (s)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadOptions {
    pub restart: bool,
    pub unban: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JailReloadOptions {
    pub restart: bool,
    pub unban: bool,
    #[serde(rename = "ifExists")]
    pub if_exists: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JailRestartOptions {
    pub unban: bool,
    #[serde(rename = "ifExists")]
    pub if_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload(ReloadOptions),
}

impl ServiceAction {
    pub fn path(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Reload(_) => "reload",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            ServiceAction::Start => "✓ Server started",
            ServiceAction::Stop => "✓ Server stopped",
            ServiceAction::Restart => "✓ Server restarted",
            ServiceAction::Reload(_) => "✓ Server reload issued",
        }
    }
}

/// Accepts a JSON number or a numeric string; everything else is `None`.
pub fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u64))
}

pub fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        serde_json::Value::String(s) => crate::utils::validation::parse_non_negative(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jail_status_from_api_shape() {
        let json = r#"{
            "filter": {"currentlyFailed": 2, "totalFailed": 17,
                       "fileList": [{"path": "/var/log/auth.log", "exists": true}]},
            "actions": {"currentlyBanned": 1, "totalBanned": 9,
                        "bannedIPList": ["203.0.113.7"]},
            "extra": {"bantime": "600", "findtime": 300, "maxretry": -1, "maxlines": "x"}
        }"#;
        let status: JailStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.filter.total_failed, 17);
        assert_eq!(status.filter.file_list[0].path, "/var/log/auth.log");
        assert_eq!(status.actions.banned_ip_list, vec!["203.0.113.7"]);

        let extra = status.extra.unwrap();
        assert_eq!(extra.bantime, Some(600));
        assert_eq!(extra.findtime, Some(300));
        assert_eq!(extra.maxretry, None);
        assert_eq!(extra.maxlines, None);
        assert_eq!(extra.maxmatches, None);
    }

    #[test]
    fn partial_jail_status_defaults() {
        let status: JailStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status, JailStatus::default());
    }

    #[test]
    fn file_content_prefers_lines() {
        let with_lines = FileContent {
            lines: Some(vec!["a".into(), "b".into()]),
            content: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(with_lines.text_lines(), vec!["a", "b"]);

        let with_content = FileContent {
            content: Some("x\ny".into()),
            ..Default::default()
        };
        assert_eq!(with_content.text_lines(), vec!["x", "y"]);
        assert!(FileContent::default().text_lines().is_empty());
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("TRACE-DEBUG".parse::<LogLevel>(), Ok(LogLevel::TraceDebug));
        assert_eq!("'NOTICE'".parse::<LogLevel>(), Ok(LogLevel::Notice));
        assert_eq!("25".parse::<LogLevel>(), Ok(LogLevel::Notice));
        assert!("LOUD".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_stepping_saturates() {
        assert_eq!(LogLevel::Critical.less_verbose(), LogLevel::Critical);
        assert_eq!(LogLevel::HeavyDebug.more_verbose(), LogLevel::HeavyDebug);
        assert_eq!(LogLevel::Info.more_verbose(), LogLevel::Debug);
    }

    #[test]
    fn jail_reload_options_use_camel_case_flag() {
        let body = serde_json::to_value(JailReloadOptions {
            restart: true,
            unban: false,
            if_exists: true,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"restart": true, "unban": false, "ifExists": true}));
    }
}
