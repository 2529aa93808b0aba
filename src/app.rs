use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::config::AppConfig;
use crate::models::{
    BannedSummary, GlobalStatus, JailReloadOptions, JailRestartOptions, JailStatus, JailTunable,
    LogLevel, ReloadOptions, ServerInfo, ServerTunable, ServiceAction,
};
use crate::services::api_client::ApiClient;
use crate::services::file_tail::TailViewer;
use crate::services::local_store::LocalStore;
use crate::services::version_check::{cache_ttl, VersionChecker, VersionStatus};
use crate::utils::debounce::{DebouncedField, Fire};
use crate::utils::validation::{is_valid_ipv4, sort_ips, split_ip_list};

mod render;

/// How long a header status message stays visible.
pub const STATUS_MESSAGE_SECS: i64 = 8;

const TAIL_LINES_STEP: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Overview,
    Jail,
    Help,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Overview => "Overview",
            Screen::Jail => "Jail",
            Screen::Help => "Help",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverviewFocus {
    #[default]
    Jails,
    LogLevel,
    Server(ServerTunable),
}

impl OverviewFocus {
    fn next(self) -> Self {
        match self {
            OverviewFocus::Jails => OverviewFocus::LogLevel,
            OverviewFocus::LogLevel => OverviewFocus::Server(ServerTunable::DbMaxMatches),
            OverviewFocus::Server(ServerTunable::DbMaxMatches) => {
                OverviewFocus::Server(ServerTunable::DbPurgeAge)
            },
            OverviewFocus::Server(ServerTunable::DbPurgeAge) => OverviewFocus::Jails,
        }
    }

    fn previous(self) -> Self {
        match self {
            OverviewFocus::Jails => OverviewFocus::Server(ServerTunable::DbPurgeAge),
            OverviewFocus::LogLevel => OverviewFocus::Jails,
            OverviewFocus::Server(ServerTunable::DbMaxMatches) => OverviewFocus::LogLevel,
            OverviewFocus::Server(ServerTunable::DbPurgeAge) => {
                OverviewFocus::Server(ServerTunable::DbMaxMatches)
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JailFocus {
    #[default]
    BannedIps,
    Files,
    Tunables,
}

impl JailFocus {
    fn next(self) -> Self {
        match self {
            JailFocus::BannedIps => JailFocus::Files,
            JailFocus::Files => JailFocus::Tunables,
            JailFocus::Tunables => JailFocus::BannedIps,
        }
    }

    fn previous(self) -> Self {
        match self {
            JailFocus::BannedIps => JailFocus::Tunables,
            JailFocus::Files => JailFocus::BannedIps,
            JailFocus::Tunables => JailFocus::Files,
        }
    }
}

/// The jail currently open on the Jail screen, with its editors.
#[derive(Debug, Clone)]
pub struct JailView {
    pub name: String,
    pub focus: JailFocus,
    pub banned_index: usize,
    pub file_index: usize,
    pub tunable_index: usize,
    pub tunables: HashMap<JailTunable, DebouncedField>,
}

impl JailView {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            focus: JailFocus::default(),
            banned_index: 0,
            file_index: 0,
            tunable_index: 0,
            tunables: JailTunable::ALL
                .iter()
                .map(|t| (*t, DebouncedField::default()))
                .collect(),
        }
    }

    pub fn selected_tunable(&self) -> JailTunable {
        JailTunable::ALL[self.tunable_index.min(JailTunable::ALL.len() - 1)]
    }

    fn cancel_pending(&mut self) {
        for field in self.tunables.values_mut() {
            field.cancel();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Ban { ip: String, jail_index: usize },
    GlobalUnban { input: String },
    ConfirmUnbanAll,
    ServerReload { options: ReloadOptions, field: usize },
    JailReload { jail: String, options: JailReloadOptions, field: usize },
    JailRestart { jail: String, options: JailRestartOptions, field: usize },
    TailViewer,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppMessage {
    SwitchScreen(Screen),
    OpenJail(String),
    CloseJail,
    Refresh { forced: bool },
    Server(ServiceAction),
    SetLogLevel(LogLevel),
    SetServerTunable(ServerTunable, u64),
    SetJailTunable { jail: String, tunable: JailTunable, value: u64 },
    Ban { jail: String, ip: String },
    Unban { jail: String, ip: String },
    UnbanGlobal(Vec<String>),
    UnbanAll,
    ReloadJail { jail: String, options: JailReloadOptions },
    RestartJail { jail: String, options: JailRestartOptions },
    OpenTail(String),
    CloseTail,
    Quit,
}

pub struct AppState {
    pub current_screen: Screen,
    pub previous_screen: Screen,
    pub overview_focus: OverviewFocus,
    pub selected_jail_index: usize,
    pub status: GlobalStatus,
    pub jail_statuses: HashMap<String, JailStatus>,
    pub banned: BannedSummary,
    pub server_info: ServerInfo,
    pub log_level_choice: Option<LogLevel>,
    pub db_max_matches: DebouncedField,
    pub db_purge_age: DebouncedField,
    pub jail_view: Option<JailView>,
    pub dialog: Option<Dialog>,
    pub status_message: Option<(String, chrono::DateTime<Utc>)>,
    pub version_status: Option<VersionStatus>,
    pub last_refresh: Option<chrono::DateTime<chrono::Local>>,
    pub help_scroll_offset: u16,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_screen: Screen::Overview,
            previous_screen: Screen::Overview,
            overview_focus: OverviewFocus::default(),
            selected_jail_index: 0,
            status: GlobalStatus::default(),
            jail_statuses: HashMap::new(),
            banned: BannedSummary::default(),
            server_info: ServerInfo::default(),
            log_level_choice: None,
            db_max_matches: DebouncedField::default(),
            db_purge_age: DebouncedField::default(),
            jail_view: None,
            dialog: None,
            status_message: None,
            version_status: None,
            last_refresh: None,
            help_scroll_offset: 0,
        }
    }
}

impl AppState {
    pub fn jail_names(&self) -> &[String] {
        &self.status.list
    }

    pub fn selected_jail(&self) -> Option<&str> {
        self.status.list.get(self.selected_jail_index).map(String::as_str)
    }

    /// Banned addresses of `jail`, in numeric order.
    pub fn sorted_banned(&self, jail: &str) -> Vec<String> {
        let mut ips = self
            .jail_statuses
            .get(jail)
            .map(|s| s.actions.banned_ip_list.clone())
            .unwrap_or_default();
        sort_ips(&mut ips);
        ips
    }

    pub fn server_field(&self, tunable: ServerTunable) -> &DebouncedField {
        match tunable {
            ServerTunable::DbMaxMatches => &self.db_max_matches,
            ServerTunable::DbPurgeAge => &self.db_purge_age,
        }
    }

    fn server_field_mut(&mut self, tunable: ServerTunable) -> &mut DebouncedField {
        match tunable {
            ServerTunable::DbMaxMatches => &mut self.db_max_matches,
            ServerTunable::DbPurgeAge => &mut self.db_purge_age,
        }
    }

    /// Message text if it is still young enough to show.
    pub fn visible_status_message(&self) -> Option<&str> {
        let (msg, at) = self.status_message.as_ref()?;
        if Utc::now().signed_duration_since(*at).num_seconds() < STATUS_MESSAGE_SECS {
            Some(msg.as_str())
        } else {
            None
        }
    }
}

pub struct App {
    state: AppState,
    should_quit: bool,
    api: ApiClient,
    store: LocalStore,
    tail: TailViewer,
    refresh_interval: Duration,
    last_data_refresh: Option<Instant>,
    version_rx: Option<Receiver<VersionStatus>>,
}

impl App {
    pub fn new(config: &AppConfig) -> crate::utils::errors::Result<Self> {
        let api = ApiClient::new(&config.api_url, config.request_timeout())?;
        let store = LocalStore::open(config.state_path());
        log::info!(
            "Using API {} with state file {}",
            api.base_url(),
            store.path().display()
        );

        let version_rx = if config.check_updates {
            let cached = store.cached_version(Utc::now(), cache_ttl());
            let checker = VersionChecker::new(config.release_source());
            Some(checker.spawn(cached, env!("CARGO_PKG_VERSION")))
        } else {
            None
        };

        let mut app = Self::with_parts(api, store, config.refresh_interval());
        app.version_rx = version_rx;

        log::info!("Application initialized, loading initial data...");
        if let Err(message) = app.refresh_all() {
            app.state.dialog = Some(Dialog::Error(format!(
                "Cannot reach the fail2ban API at {}\n\n{}\n\nPress F to retry.",
                app.api.base_url(),
                message
            )));
        }
        app.last_data_refresh = Some(Instant::now());
        Ok(app)
    }

    /// Assembles an app without touching the network.
    pub fn with_parts(api: ApiClient, store: LocalStore, refresh_interval: Duration) -> Self {
        let tail = TailViewer::new(store.tail_preferences());
        Self {
            state: AppState::default(),
            should_quit: false,
            api,
            store,
            tail,
            refresh_interval,
            last_data_refresh: None,
            version_rx: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn tail(&self) -> &TailViewer {
        &self.tail
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// One turn of the event loop: timers, then at most one key.
    pub fn handle_events(&mut self) -> Result<bool> {
        self.tick(Instant::now());

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                self.handle_key(key);
            }
        }

        Ok(self.should_quit)
    }

    /// Runs everything that is driven by time rather than keys.
    pub fn tick(&mut self, now: Instant) {
        let refresh_due = self
            .last_data_refresh
            .map(|at| now.duration_since(at) >= self.refresh_interval)
            .unwrap_or(true);
        if refresh_due {
            if self.refresh_all().is_err() {
                log::debug!("Background refresh left the overview empty");
            }
            self.last_data_refresh = Some(now);
        }

        self.poll_settings(now);

        if self.tail.is_open() {
            self.tail.poll(&self.api, now);
        }

        self.poll_version();
    }

    fn poll_version(&mut self) {
        let received = match self.version_rx.as_ref() {
            Some(rx) => rx.try_recv(),
            None => return,
        };
        match received {
            Ok(status) => {
                if status.fetched {
                    if let Some(ref latest) = status.latest {
                        if let Err(e) = self.store.cache_version(latest, Utc::now()) {
                            log::warn!("Could not cache latest version: {}", e);
                        }
                    }
                }
                if status.update_available() {
                    log::info!(
                        "Update available: {} -> {}",
                        status.current,
                        status.latest.as_deref().unwrap_or("unknown")
                    );
                }
                self.state.version_status = Some(status);
                self.version_rx = None;
            },
            Err(TryRecvError::Empty) => {},
            Err(TryRecvError::Disconnected) => {
                log::warn!("Version check ended without a result");
                self.version_rx = None;
            },
        }
    }

    /// Fires debounced editors whose idle delay has passed.
    fn poll_settings(&mut self, now: Instant) {
        for tunable in ServerTunable::ALL {
            if let Some(fire) = self.state.server_field_mut(tunable).poll(now) {
                match fire {
                    Fire::Commit(value) => {
                        self.handle_message(AppMessage::SetServerTunable(tunable, value))
                    },
                    Fire::Rejected(input) => self.reject_setting(tunable.label(), &input),
                }
            }
        }

        let mut fired = Vec::new();
        if let Some(ref mut view) = self.state.jail_view {
            for tunable in JailTunable::ALL {
                if let Some(field) = view.tunables.get_mut(&tunable) {
                    if let Some(fire) = field.poll(now) {
                        fired.push((view.name.clone(), tunable, fire));
                    }
                }
            }
        }
        for (jail, tunable, fire) in fired {
            match fire {
                Fire::Commit(value) => self.handle_message(AppMessage::SetJailTunable {
                    jail,
                    tunable,
                    value,
                }),
                Fire::Rejected(input) => self.reject_setting(tunable.as_str(), &input),
            }
        }
    }

    fn reject_setting(&mut self, label: &str, input: &str) {
        log::warn!("Rejected {} value '{}'", label, input);
        self.set_status_message(&format!(
            "✗ {} must be a non-negative whole number, got '{}'",
            label, input
        ));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.handle_key_at(key, Instant::now());
    }

    pub fn handle_key_at(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.handle_message(AppMessage::Quit);
            return;
        }

        if self.state.dialog.is_some() {
            self.handle_dialog_key(key, now);
            return;
        }

        if self.handle_field_key(key, now) {
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.handle_message(AppMessage::Quit),
            KeyCode::Char('h') | KeyCode::Char('?') => {
                if self.state.current_screen == Screen::Help {
                    let back = self.state.previous_screen;
                    self.handle_message(AppMessage::SwitchScreen(back));
                } else {
                    self.handle_message(AppMessage::SwitchScreen(Screen::Help));
                }
            },
            KeyCode::Char('F') | KeyCode::Char('f') => {
                self.handle_message(AppMessage::Refresh { forced: true })
            },
            KeyCode::Char('B') | KeyCode::Char('b') => self.open_ban_dialog(),
            KeyCode::Char('U') => {
                self.state.dialog = Some(Dialog::GlobalUnban {
                    input: String::new(),
                })
            },
            KeyCode::Char('A') => self.state.dialog = Some(Dialog::ConfirmUnbanAll),
            _ => match self.state.current_screen {
                Screen::Overview => self.handle_overview_key(key),
                Screen::Jail => self.handle_jail_key(key),
                Screen::Help => self.handle_help_key(key),
            },
        }
    }

    /// Keystrokes for a focused numeric editor. Returns whether it was consumed.
    fn handle_field_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        let accepts = |c: char| c.is_ascii_digit() || c == '.' || c == '-';
        let screen = self.state.current_screen;
        let focus = self.state.overview_focus;
        let field = match screen {
            Screen::Overview => match focus {
                OverviewFocus::Server(tunable) => Some(self.state.server_field_mut(tunable)),
                _ => None,
            },
            Screen::Jail => match self.state.jail_view {
                Some(ref mut view) if view.focus == JailFocus::Tunables => {
                    let tunable = view.selected_tunable();
                    view.tunables.get_mut(&tunable)
                },
                _ => None,
            },
            Screen::Help => None,
        };
        let Some(field) = field else {
            return false;
        };

        match key.code {
            KeyCode::Char(c) if accepts(c) => {
                field.push_char(c, now);
                true
            },
            KeyCode::Backspace => {
                field.backspace(now);
                true
            },
            _ => false,
        }
    }

    fn handle_overview_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => self.set_overview_focus(self.state.overview_focus.next()),
            KeyCode::BackTab => self.set_overview_focus(self.state.overview_focus.previous()),
            KeyCode::Char('S') => self.handle_message(AppMessage::Server(ServiceAction::Start)),
            KeyCode::Char('T') => self.handle_message(AppMessage::Server(ServiceAction::Stop)),
            KeyCode::Char('R') => self.handle_message(AppMessage::Server(ServiceAction::Restart)),
            KeyCode::Char('D') => {
                self.state.dialog = Some(Dialog::ServerReload {
                    options: ReloadOptions::default(),
                    field: 0,
                })
            },
            _ => match self.state.overview_focus {
                OverviewFocus::Jails => self.handle_jail_list_key(key),
                OverviewFocus::LogLevel => self.handle_log_level_key(key),
                OverviewFocus::Server(_) => {},
            },
        }
    }

    fn set_overview_focus(&mut self, focus: OverviewFocus) {
        self.state.overview_focus = focus;
        self.state.log_level_choice = if focus == OverviewFocus::LogLevel {
            Some(self.state.server_info.log_level.unwrap_or(LogLevel::Info))
        } else {
            None
        };
    }

    fn handle_jail_list_key(&mut self, key: KeyEvent) {
        let count = self.state.status.list.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.state.selected_jail_index = self.state.selected_jail_index.saturating_sub(1);
            },
            KeyCode::Down | KeyCode::Char('j') => {
                if count > 0 {
                    self.state.selected_jail_index = (self.state.selected_jail_index + 1).min(count - 1);
                }
            },
            KeyCode::Enter => {
                if let Some(jail) = self.state.selected_jail().map(str::to_string) {
                    self.handle_message(AppMessage::OpenJail(jail));
                }
            },
            _ => {},
        }
    }

    fn handle_log_level_key(&mut self, key: KeyEvent) {
        let current = self
            .state
            .log_level_choice
            .or(self.state.server_info.log_level)
            .unwrap_or(LogLevel::Info);
        match key.code {
            KeyCode::Left => self.state.log_level_choice = Some(current.less_verbose()),
            KeyCode::Right => self.state.log_level_choice = Some(current.more_verbose()),
            KeyCode::Enter => self.handle_message(AppMessage::SetLogLevel(current)),
            _ => {},
        }
    }

    fn handle_jail_key(&mut self, key: KeyEvent) {
        let Some(jail) = self.state.jail_view.as_ref().map(|v| v.name.clone()) else {
            self.handle_message(AppMessage::CloseJail);
            return;
        };
        let banned = self.state.sorted_banned(&jail);
        let files = self
            .state
            .jail_statuses
            .get(&jail)
            .map(|s| s.filter.file_list.clone())
            .unwrap_or_default();

        let Some(view) = self.state.jail_view.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.handle_message(AppMessage::CloseJail);
            },
            KeyCode::Tab => view.focus = view.focus.next(),
            KeyCode::BackTab => view.focus = view.focus.previous(),
            KeyCode::Up | KeyCode::Char('k') => match view.focus {
                JailFocus::BannedIps => view.banned_index = view.banned_index.saturating_sub(1),
                JailFocus::Files => view.file_index = view.file_index.saturating_sub(1),
                JailFocus::Tunables => view.tunable_index = view.tunable_index.saturating_sub(1),
            },
            KeyCode::Down | KeyCode::Char('j') => match view.focus {
                JailFocus::BannedIps => {
                    view.banned_index = (view.banned_index + 1).min(banned.len().saturating_sub(1))
                },
                JailFocus::Files => {
                    view.file_index = (view.file_index + 1).min(files.len().saturating_sub(1))
                },
                JailFocus::Tunables => {
                    view.tunable_index = (view.tunable_index + 1).min(JailTunable::ALL.len() - 1)
                },
            },
            KeyCode::Char('u') | KeyCode::Delete if view.focus == JailFocus::BannedIps => {
                if let Some(ip) = banned.get(view.banned_index).cloned() {
                    self.handle_message(AppMessage::Unban { jail, ip });
                }
            },
            KeyCode::Enter if view.focus == JailFocus::Files => {
                match files.get(view.file_index) {
                    Some(file) if file.exists => {
                        let path = file.path.clone();
                        self.handle_message(AppMessage::OpenTail(path));
                    },
                    Some(file) => {
                        let msg = format!("✗ {} does not exist on the server", file.path);
                        self.set_status_message(&msg);
                    },
                    None => {},
                }
            },
            KeyCode::Char('r') => {
                self.state.dialog = Some(Dialog::JailReload {
                    jail,
                    options: JailReloadOptions::default(),
                    field: 0,
                })
            },
            KeyCode::Char('x') => {
                self.state.dialog = Some(Dialog::JailRestart {
                    jail,
                    options: JailRestartOptions::default(),
                    field: 0,
                })
            },
            _ => {},
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                let back = self.state.previous_screen;
                self.handle_message(AppMessage::SwitchScreen(back));
            },
            KeyCode::Up | KeyCode::Char('k') => {
                self.state.help_scroll_offset = self.state.help_scroll_offset.saturating_sub(1)
            },
            KeyCode::Down | KeyCode::Char('j') => {
                self.state.help_scroll_offset = self.state.help_scroll_offset.saturating_add(1)
            },
            _ => {},
        }
    }

    fn open_ban_dialog(&mut self) {
        let preferred = match self.state.jail_view {
            Some(ref view) if self.state.current_screen == Screen::Jail => Some(view.name.clone()),
            _ => self.state.selected_jail().map(str::to_string),
        };
        let jail_index = preferred
            .and_then(|name| self.state.status.list.iter().position(|j| *j == name))
            .unwrap_or(0);
        self.state.dialog = Some(Dialog::Ban {
            ip: String::new(),
            jail_index,
        });
    }

    fn handle_dialog_key(&mut self, key: KeyEvent, now: Instant) {
        let Some(dialog) = self.state.dialog.take() else {
            return;
        };

        let (next, message) = match dialog {
            Dialog::Ban { mut ip, mut jail_index } => match key.code {
                KeyCode::Esc => (None, None),
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                    ip.push(c);
                    (Some(Dialog::Ban { ip, jail_index }), None)
                },
                KeyCode::Backspace => {
                    ip.pop();
                    (Some(Dialog::Ban { ip, jail_index }), None)
                },
                KeyCode::Up => {
                    jail_index = jail_index.saturating_sub(1);
                    (Some(Dialog::Ban { ip, jail_index }), None)
                },
                KeyCode::Down => {
                    let last = self.state.status.list.len().saturating_sub(1);
                    jail_index = (jail_index + 1).min(last);
                    (Some(Dialog::Ban { ip, jail_index }), None)
                },
                KeyCode::Enter => match self.state.status.list.get(jail_index).cloned() {
                    None => {
                        self.set_status_message("✗ No jail to ban in");
                        (Some(Dialog::Ban { ip, jail_index }), None)
                    },
                    Some(_) if !is_valid_ipv4(ip.trim()) => {
                        self.set_status_message(&format!("✗ '{}' is not a valid IPv4 address", ip));
                        (Some(Dialog::Ban { ip, jail_index }), None)
                    },
                    Some(jail) => (
                        None,
                        Some(AppMessage::Ban {
                            jail,
                            ip: ip.trim().to_string(),
                        }),
                    ),
                },
                _ => (Some(Dialog::Ban { ip, jail_index }), None),
            },
            Dialog::GlobalUnban { mut input } => match key.code {
                KeyCode::Esc => (None, None),
                KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | ',' | ' ' | ';') => {
                    input.push(c);
                    (Some(Dialog::GlobalUnban { input }), None)
                },
                KeyCode::Backspace => {
                    input.pop();
                    (Some(Dialog::GlobalUnban { input }), None)
                },
                KeyCode::Enter => {
                    let (valid, invalid) = split_ip_list(&input);
                    if !invalid.is_empty() {
                        self.set_status_message(&format!("✗ Invalid IPv4: {}", invalid.join(", ")));
                        (Some(Dialog::GlobalUnban { input }), None)
                    } else if valid.is_empty() {
                        self.set_status_message("✗ Enter at least one IPv4 address");
                        (Some(Dialog::GlobalUnban { input }), None)
                    } else {
                        (None, Some(AppMessage::UnbanGlobal(valid)))
                    }
                },
                _ => (Some(Dialog::GlobalUnban { input }), None),
            },
            Dialog::ConfirmUnbanAll => match key.code {
                KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                    (None, Some(AppMessage::UnbanAll))
                },
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => (None, None),
                _ => (Some(Dialog::ConfirmUnbanAll), None),
            },
            Dialog::ServerReload { mut options, field } => match key.code {
                KeyCode::Esc => (None, None),
                KeyCode::Enter => (None, Some(AppMessage::Server(ServiceAction::Reload(options)))),
                code => {
                    let field = move_flag_cursor(code, field, 3);
                    if code == KeyCode::Char(' ') {
                        match field {
                            0 => options.restart = !options.restart,
                            1 => options.unban = !options.unban,
                            _ => options.all = !options.all,
                        }
                    }
                    (Some(Dialog::ServerReload { options, field }), None)
                },
            },
            Dialog::JailReload {
                jail,
                mut options,
                field,
            } => match key.code {
                KeyCode::Esc => (None, None),
                KeyCode::Enter => (None, Some(AppMessage::ReloadJail { jail, options })),
                code => {
                    let field = move_flag_cursor(code, field, 3);
                    if code == KeyCode::Char(' ') {
                        match field {
                            0 => options.restart = !options.restart,
                            1 => options.unban = !options.unban,
                            _ => options.if_exists = !options.if_exists,
                        }
                    }
                    (Some(Dialog::JailReload { jail, options, field }), None)
                },
            },
            Dialog::JailRestart {
                jail,
                mut options,
                field,
            } => match key.code {
                KeyCode::Esc => (None, None),
                KeyCode::Enter => (None, Some(AppMessage::RestartJail { jail, options })),
                code => {
                    let field = move_flag_cursor(code, field, 2);
                    if code == KeyCode::Char(' ') {
                        match field {
                            0 => options.unban = !options.unban,
                            _ => options.if_exists = !options.if_exists,
                        }
                    }
                    (Some(Dialog::JailRestart { jail, options, field }), None)
                },
            },
            Dialog::TailViewer => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => (None, Some(AppMessage::CloseTail)),
                code => {
                    self.handle_tail_key(code, now);
                    (Some(Dialog::TailViewer), None)
                },
            },
            Dialog::Error(text) => match key.code {
                KeyCode::Esc | KeyCode::Enter => (None, None),
                KeyCode::Char('F') | KeyCode::Char('f') => {
                    (None, Some(AppMessage::Refresh { forced: true }))
                },
                _ => (Some(Dialog::Error(text)), None),
            },
        };

        self.state.dialog = next;
        if let Some(message) = message {
            self.handle_message(message);
        }
    }

    fn handle_tail_key(&mut self, code: KeyCode, now: Instant) {
        match code {
            KeyCode::Char('t') => self.tail.toggle_tail_mode(&mut self.store, now),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.tail.adjust_tail_lines(TAIL_LINES_STEP, &mut self.store, now)
            },
            KeyCode::Char('-') => self.tail.adjust_tail_lines(-TAIL_LINES_STEP, &mut self.store, now),
            KeyCode::Char(']') => self.tail.adjust_poll_interval(1, &mut self.store, now),
            KeyCode::Char('[') => self.tail.adjust_poll_interval(-1, &mut self.store, now),
            KeyCode::Up | KeyCode::Char('k') => self.tail.scroll = self.tail.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.tail.scroll = self.tail.scroll.saturating_add(1),
            KeyCode::PageUp => self.tail.scroll = self.tail.scroll.saturating_sub(10),
            KeyCode::PageDown => self.tail.scroll = self.tail.scroll.saturating_add(10),
            KeyCode::Home => self.tail.scroll = 0,
            _ => {},
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Quit => self.should_quit = true,
            AppMessage::SwitchScreen(screen) => {
                if screen == Screen::Help && self.state.current_screen != Screen::Help {
                    self.state.previous_screen = self.state.current_screen;
                    self.state.help_scroll_offset = 0;
                }
                self.state.current_screen = screen;
            },
            AppMessage::OpenJail(jail) => {
                log::debug!("Opening jail {}", jail);
                if let Some(ref mut old) = self.state.jail_view {
                    old.cancel_pending();
                }
                let mut view = JailView::new(&jail);
                if let Some(extra) = self.state.jail_statuses.get(&jail).and_then(|s| s.extra.as_ref()) {
                    for (tunable, field) in view.tunables.iter_mut() {
                        field.sync(extra.get(*tunable));
                    }
                }
                self.state.jail_view = Some(view);
                self.state.current_screen = Screen::Jail;
                self.refresh_jail(&jail);
            },
            AppMessage::CloseJail => {
                if let Some(mut view) = self.state.jail_view.take() {
                    view.cancel_pending();
                }
                self.state.current_screen = Screen::Overview;
            },
            AppMessage::Refresh { forced } => {
                match self.refresh_all() {
                    Ok(()) => {
                        if forced {
                            self.set_status_message("✓ Data refreshed");
                        }
                    },
                    Err(e) => {
                        if forced {
                            self.set_status_message(&format!("✗ Refresh failed: {}", e));
                        }
                    },
                }
                self.last_data_refresh = Some(Instant::now());
            },
            AppMessage::Server(action) => {
                log::info!("Server action: {}", action.path());
                match self.api.server(action) {
                    Ok(_) => self.set_status_message(action.success_message()),
                    Err(e) => {
                        log::error!("Server {} failed: {}", action.path(), e);
                        self.set_status_message(&format!("✗ Server {} failed: {}", action.path(), e));
                    },
                }
                let _ = self.refresh_all();
            },
            AppMessage::SetLogLevel(level) => {
                match self.api.set_log_level(level) {
                    Ok(_) => self.set_status_message(&format!("✓ Log level set to {}", level)),
                    Err(e) => {
                        log::error!("Setting log level {} failed: {}", level, e);
                        self.set_status_message(&format!("✗ Failed to set log level: {}", e));
                    },
                }
                self.refresh_server_info();
            },
            AppMessage::SetServerTunable(tunable, value) => {
                let result = match tunable {
                    ServerTunable::DbMaxMatches => self.api.set_db_max_matches(value),
                    ServerTunable::DbPurgeAge => self.api.set_db_purge_age(value),
                };
                match result {
                    Ok(_) => self.set_status_message(&format!("✓ {} set to {}", tunable.label(), value)),
                    Err(e) => {
                        log::error!("Setting {} failed: {}", tunable.label(), e);
                        self.set_status_message(&format!("✗ Failed to set {}: {}", tunable.label(), e));
                    },
                }
                self.refresh_server_info();
            },
            AppMessage::SetJailTunable { jail, tunable, value } => {
                match self.api.set_jail_tunable(&jail, tunable, value) {
                    Ok(_) => self.set_status_message(&format!(
                        "✓ {} {} set to {}",
                        jail,
                        tunable.as_str(),
                        value
                    )),
                    Err(e) => {
                        log::error!("Setting {} for {} failed: {}", tunable.as_str(), jail, e);
                        self.set_status_message(&format!("✗ Failed to set {}: {}", tunable.as_str(), e));
                    },
                }
                self.refresh_jail(&jail);
            },
            AppMessage::Ban { jail, ip } => {
                log::info!("Banning {} in {}", ip, jail);
                match self.api.ban(&jail, &ip) {
                    Ok(_) => self.set_status_message(&format!("✓ Banned {} in {}", ip, jail)),
                    Err(e) => {
                        log::error!("Failed to ban {}: {}", ip, e);
                        self.set_status_message(&format!("✗ Failed to ban {}: {}", ip, e));
                    },
                }
                self.refresh_jail(&jail);
            },
            AppMessage::Unban { jail, ip } => {
                log::info!("Unbanning {} from {}", ip, jail);
                match self.api.unban(&jail, &ip) {
                    Ok(_) => self.set_status_message(&format!("✓ Unbanned {} from {}", ip, jail)),
                    Err(e) => {
                        log::error!("Failed to unban {}: {}", ip, e);
                        self.set_status_message(&format!("✗ Failed to unban {}: {}", ip, e));
                    },
                }
                self.refresh_jail(&jail);
            },
            AppMessage::UnbanGlobal(ips) => {
                let mut failed = Vec::new();
                for ip in &ips {
                    if let Err(e) = self.api.unban_global(ip) {
                        log::error!("Failed to unban {}: {}", ip, e);
                        failed.push(format!("{} ({})", ip, e));
                    }
                }
                if failed.is_empty() {
                    self.set_status_message(&format!("✓ Unbanned {} address(es) in all jails", ips.len()));
                } else {
                    self.set_status_message(&format!("✗ Unban failed for {}", failed.join(", ")));
                }
                let _ = self.refresh_all();
            },
            AppMessage::UnbanAll => {
                log::info!("Unbanning all addresses");
                match self.api.unban_all() {
                    Ok(result) => {
                        let count = result.result.unwrap_or_default();
                        if count.is_empty() {
                            self.set_status_message("✓ All addresses unbanned");
                        } else {
                            self.set_status_message(&format!("✓ Unbanned all addresses ({})", count));
                        }
                    },
                    Err(e) => {
                        log::error!("Unban all failed: {}", e);
                        self.set_status_message(&format!("✗ Unban all failed: {}", e));
                    },
                }
                let _ = self.refresh_all();
            },
            AppMessage::ReloadJail { jail, options } => {
                match self.api.reload_jail(&jail, options) {
                    Ok(_) => self.set_status_message(&format!("✓ Jail {} reloaded", jail)),
                    Err(e) => {
                        log::error!("Reloading {} failed: {}", jail, e);
                        self.set_status_message(&format!("✗ Reload of {} failed: {}", jail, e));
                    },
                }
                let _ = self.refresh_all();
            },
            AppMessage::RestartJail { jail, options } => {
                match self.api.restart_jail(&jail, options) {
                    Ok(_) => self.set_status_message(&format!("✓ Jail {} restarted", jail)),
                    Err(e) => {
                        log::error!("Restarting {} failed: {}", jail, e);
                        self.set_status_message(&format!("✗ Restart of {} failed: {}", jail, e));
                    },
                }
                let _ = self.refresh_all();
            },
            AppMessage::OpenTail(path) => {
                let now = Instant::now();
                self.tail.open(&path, now);
                self.tail.poll(&self.api, now);
                self.state.dialog = Some(Dialog::TailViewer);
            },
            AppMessage::CloseTail => {
                self.tail.close();
                if self.state.dialog == Some(Dialog::TailViewer) {
                    self.state.dialog = None;
                }
            },
        }
    }

    /// Global status, every listed jail, server info and the banned summary.
    /// Only a failing status request is reported; the rest is logged.
    fn refresh_all(&mut self) -> std::result::Result<(), String> {
        let status_result = match self.api.global_status() {
            Ok(status) => {
                self.state.status = status;
                Ok(())
            },
            Err(e) => {
                log::warn!("Failed to load global status: {}", e);
                self.state.status = GlobalStatus::failed(e.to_string());
                Err(e.to_string())
            },
        };

        let names = self.state.status.list.clone();
        self.state.jail_statuses.retain(|name, _| names.contains(name));
        for name in &names {
            self.refresh_jail(name);
        }
        if self.state.selected_jail_index >= names.len() {
            self.state.selected_jail_index = names.len().saturating_sub(1);
        }

        if status_result.is_ok() {
            self.refresh_server_info();
            match self.api.banned() {
                Ok(banned) => self.state.banned = banned,
                Err(e) => log::debug!("Banned summary unavailable: {}", e),
            }
        }

        self.state.last_refresh = Some(chrono::Local::now());
        status_result
    }

    fn refresh_server_info(&mut self) {
        let info = self.api.load_server_info();
        self.state.db_max_matches.sync(info.db_max_matches);
        self.state.db_purge_age.sync(info.db_purge_age);
        self.state.server_info = info;
    }

    fn refresh_jail(&mut self, jail: &str) {
        match self.api.jail_status(jail) {
            Ok(status) => {
                if let Some(ref mut view) = self.state.jail_view {
                    if view.name == jail {
                        let extra = status.extra.clone().unwrap_or_default();
                        for (tunable, field) in view.tunables.iter_mut() {
                            field.sync(extra.get(*tunable));
                        }
                        let banned = status.actions.banned_ip_list.len();
                        view.banned_index = view.banned_index.min(banned.saturating_sub(1));
                        let files = status.filter.file_list.len();
                        view.file_index = view.file_index.min(files.saturating_sub(1));
                    }
                }
                self.state.jail_statuses.insert(jail.to_string(), status);
            },
            Err(e) => log::warn!("Failed to load status of jail {}: {}", jail, e),
        }
    }

    fn set_status_message(&mut self, message: &str) {
        self.state.status_message = Some((message.to_string(), Utc::now()));
    }
}

/// Up/Down over `count` checkbox rows.
fn move_flag_cursor(code: KeyCode, field: usize, count: usize) -> usize {
    match code {
        KeyCode::Up => field.saturating_sub(1),
        KeyCode::Down | KeyCode::Tab => (field + 1).min(count - 1),
        _ => field,
    }
}
