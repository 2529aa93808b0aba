use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::{App, Dialog, JailFocus, OverviewFocus, Screen};
use crate::models::{JailTunable, ServerTunable};
use crate::services::file_tail::TailViewer;
use crate::utils::debounce::DebouncedField;

const HOTKEY: Color = Color::Rgb(0, 150, 255);

fn hotkey(key: &str, label: &str) -> Vec<Span<'static>> {
    vec![
        Span::styled(key.to_string(), Style::default().fg(HOTKEY)),
        Span::raw(format!(":{}", label)),
    ]
}

/// Joins hotkey hints with gray separators.
fn hotkey_line(prefix: &str, keys: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::new();
    if !prefix.is_empty() {
        spans.push(Span::raw(prefix.to_string()));
    }
    for (i, (key, label)) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        }
        spans.extend(hotkey(key, label));
    }
    Line::from(spans)
}

fn focus_border(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

impl App {
    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Content
                Constraint::Length(2), // Footer
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0]);

        match self.state.current_screen {
            Screen::Overview => self.render_overview(frame, chunks[1]),
            Screen::Jail => self.render_jail(frame, chunks[1]),
            Screen::Help => self.render_help(frame, chunks[1]),
        }

        self.render_footer(frame, chunks[2]);

        if let Some(ref dialog) = self.state.dialog {
            let area = frame.size();
            match dialog {
                Dialog::Ban { ip, jail_index } => self.render_ban_dialog(frame, area, ip, *jail_index),
                Dialog::GlobalUnban { input } => render_global_unban_dialog(frame, area, input),
                Dialog::ConfirmUnbanAll => self.render_unban_all_dialog(frame, area),
                Dialog::ServerReload { options, field } => render_flags_dialog(
                    frame,
                    area,
                    " Reload fail2ban ",
                    &[
                        ("Restart jails", options.restart),
                        ("Unban all addresses", options.unban),
                        ("Reload all jails", options.all),
                    ],
                    *field,
                ),
                Dialog::JailReload { jail, options, field } => render_flags_dialog(
                    frame,
                    area,
                    &format!(" Reload jail {} ", jail),
                    &[
                        ("Restart jail", options.restart),
                        ("Unban addresses", options.unban),
                        ("Only if it exists", options.if_exists),
                    ],
                    *field,
                ),
                Dialog::JailRestart { jail, options, field } => render_flags_dialog(
                    frame,
                    area,
                    &format!(" Restart jail {} ", jail),
                    &[
                        ("Unban addresses", options.unban),
                        ("Only if it exists", options.if_exists),
                    ],
                    *field,
                ),
                Dialog::TailViewer => render_tail_dialog(frame, area, &self.tail),
                Dialog::Error(message) => render_error_dialog(frame, area, message),
            }
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let now = chrono::Local::now();
        let status_display = self.state.visible_status_message().map(str::to_string);

        let version_prefix = "f2b-control v";
        let version_number = env!("CARGO_PKG_VERSION");
        let (daemon_symbol, daemon_color) = if self.state.status.error.is_some() {
            ("[✗ offline]", Color::Red)
        } else {
            ("[● online]", Color::Green)
        };
        let screen_title = format!(" {} ", self.state.current_screen.title());
        let update_notice = self.state.version_status.as_ref().and_then(|status| {
            if status.update_available() {
                status.latest.as_ref().map(|latest| format!(" ⬆ {} available", latest))
            } else if status.latest.is_none() {
                Some(" (latest: unknown)".to_string())
            } else {
                None
            }
        });
        let datetime_str = now.format("%Y-%m-%d %H:%M:%S").to_string();

        let mut left_side_width = version_prefix.width()
            + version_number.width()
            + 1
            + daemon_symbol.width()
            + screen_title.width();
        if let Some(ref notice) = update_notice {
            left_side_width += notice.width();
        }
        if let Some(ref msg) = status_display {
            left_side_width += " | ".width() + msg.width();
        }
        // Borders take two columns.
        let total_width = (area.width as usize).saturating_sub(2);
        let padding_space = total_width.saturating_sub(left_side_width + datetime_str.width());

        let mut header_spans = vec![
            Span::raw(version_prefix),
            Span::raw(version_number),
        ];
        if let Some(notice) = update_notice {
            header_spans.push(Span::styled(notice, Style::default().fg(Color::Cyan)));
        }
        header_spans.extend(vec![
            Span::raw(" "),
            Span::styled(daemon_symbol, Style::default().fg(daemon_color)),
            Span::styled(screen_title, Style::default().fg(Color::White)),
        ]);

        if let Some(status_msg) = status_display {
            let status_color = if status_msg.starts_with('✓') {
                Color::Green
            } else if status_msg.starts_with('✗') {
                Color::Red
            } else {
                Color::Yellow
            };
            header_spans.push(Span::raw(" | "));
            header_spans.push(Span::styled(status_msg, Style::default().fg(status_color)));
        }

        header_spans.push(Span::raw(" ".repeat(padding_space)));
        header_spans.push(Span::styled(datetime_str, Style::default().fg(Color::Gray)));

        let header = Paragraph::new(vec![Line::from(header_spans)])
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, area);
    }

    fn render_overview(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8), // Server
                Constraint::Min(6),    // Jails
                Constraint::Length(3), // Banned summary
            ])
            .split(area);

        self.render_server_panel(frame, chunks[0]);
        self.render_jail_list(frame, chunks[1]);

        let banned = &self.state.banned;
        let summary = if banned.ips.is_empty() {
            "No addresses are banned".to_string()
        } else {
            let mut ips = banned.ips.clone();
            crate::utils::validation::sort_ips(&mut ips);
            format!("{} banned: {}", banned.count.max(ips.len()), ips.join(", "))
        };
        let banned_panel = Paragraph::new(summary)
            .style(Style::default().fg(Color::White))
            .block(Block::default().borders(Borders::ALL).title(hotkey_line(
                "Banned (all jails) - ",
                &[("U", "Unban IPs"), ("A", "Unban All")],
            )));
        frame.render_widget(banned_panel, chunks[2]);
    }

    fn render_server_panel(&self, frame: &mut Frame, area: Rect) {
        let info = &self.state.server_info;
        let or_unknown = |s: &str| if s.is_empty() { "unknown".to_string() } else { s.to_string() };

        let level_focused = self.state.overview_focus == OverviewFocus::LogLevel;
        let shown_level = self
            .state
            .log_level_choice
            .filter(|_| level_focused)
            .or(info.log_level);
        let level_text = match shown_level {
            Some(level) if level_focused => format!("◀ {} ▶", level),
            Some(level) => level.to_string(),
            None => or_unknown(&info.log_level_raw),
        };

        let label = Style::default().fg(Color::Gray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled("fail2ban version: ", label),
                Span::styled(or_unknown(&info.version), Style::default().fg(Color::White)),
                Span::styled("   Jails: ", label),
                Span::styled(self.state.status.jails.to_string(), Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Log level: ", label),
                Span::styled(
                    level_text,
                    if level_focused {
                        Style::default().fg(Color::White).bg(Color::Blue)
                    } else {
                        Style::default().fg(Color::White)
                    },
                ),
            ]),
            Line::from(vec![
                Span::styled("Database: ", label),
                Span::styled(or_unknown(&info.db_file), Style::default().fg(Color::White)),
            ]),
        ];

        for tunable in ServerTunable::ALL {
            let focused = self.state.overview_focus == OverviewFocus::Server(tunable);
            lines.push(field_line(tunable.label(), self.state.server_field(tunable), focused));
        }

        if let Some(ref error) = self.state.status.error {
            lines.push(Line::from(Span::styled(
                format!("✗ {}", error),
                Style::default().fg(Color::Red),
            )));
        }

        let title = hotkey_line(
            "Server - ",
            &[("S", "Start"), ("T", "Stop"), ("R", "Restart"), ("D", "Reload")],
        );
        let panel = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, area);
    }

    fn render_jail_list(&self, frame: &mut Frame, area: Rect) {
        let focused = self.state.overview_focus == OverviewFocus::Jails;
        let header_style = Style::default().fg(Color::Yellow);

        let rows: Vec<Row> = if self.state.status.list.is_empty() {
            let text = if self.state.status.error.is_some() {
                "Daemon unreachable"
            } else {
                "No jails"
            };
            vec![Row::new(vec![Cell::from(text).style(Style::default().fg(Color::Yellow))])]
        } else {
            self.state
                .status
                .list
                .iter()
                .map(|name| {
                    let status = self.state.jail_statuses.get(name);
                    let count = |f: fn(&crate::models::JailStatus) -> u64| {
                        status.map(|s| f(s).to_string()).unwrap_or_else(|| "-".to_string())
                    };
                    let banned_now = status.map(|s| s.actions.currently_banned).unwrap_or(0);
                    Row::new(vec![
                        Cell::from(name.clone()).style(Style::default().fg(Color::White)),
                        Cell::from(count(|s| s.actions.currently_banned)).style(if banned_now > 0 {
                            Style::default().fg(Color::Red)
                        } else {
                            Style::default().fg(Color::White)
                        }),
                        Cell::from(count(|s| s.actions.total_banned)),
                        Cell::from(count(|s| s.filter.currently_failed)),
                        Cell::from(count(|s| s.filter.total_failed)),
                    ])
                })
                .collect()
        };

        let title = if focused {
            hotkey_line(
                &format!("Jails ({}) - ", self.state.status.list.len()),
                &[("ENTER", "Open"), ("↑↓", "Navigate"), ("TAB", "Switch Focus")],
            )
        } else {
            hotkey_line(
                &format!("Jails ({}) - ", self.state.status.list.len()),
                &[("TAB", "Switch Focus")],
            )
        };

        let table = Table::new(
            rows,
            [
                Constraint::Length(24), // Name
                Constraint::Length(10), // Banned
                Constraint::Length(14), // Total banned
                Constraint::Length(10), // Failed
                Constraint::Length(14), // Total failed
            ],
        )
        .header(Row::new(vec![
            Cell::from("Jail").style(header_style),
            Cell::from("Banned").style(header_style),
            Cell::from("Total banned").style(header_style),
            Cell::from("Failed").style(header_style),
            Cell::from("Total failed").style(header_style),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_border(focused))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));

        let mut table_state = TableState::default();
        if focused && !self.state.status.list.is_empty() {
            table_state.select(Some(self.state.selected_jail_index));
        }
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn render_jail(&self, frame: &mut Frame, area: Rect) {
        let Some(ref view) = self.state.jail_view else {
            return;
        };
        let status = self.state.jail_statuses.get(&view.name).cloned().unwrap_or_default();

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let counters = Paragraph::new(Line::from(vec![
            Span::styled("Currently failed: ", Style::default().fg(Color::Gray)),
            Span::raw(status.filter.currently_failed.to_string()),
            Span::styled("   Total failed: ", Style::default().fg(Color::Gray)),
            Span::raw(status.filter.total_failed.to_string()),
            Span::styled("   Currently banned: ", Style::default().fg(Color::Gray)),
            Span::styled(
                status.actions.currently_banned.to_string(),
                Style::default().fg(Color::Red),
            ),
            Span::styled("   Total banned: ", Style::default().fg(Color::Gray)),
            Span::raw(status.actions.total_banned.to_string()),
        ]))
        .block(Block::default().borders(Borders::ALL).title(hotkey_line(
            &format!("Jail {} - ", view.name),
            &[("r", "Reload"), ("x", "Restart"), ("B", "Ban IP"), ("ESC", "Back")],
        )));
        frame.render_widget(counters, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(40),
                Constraint::Percentage(30),
            ])
            .split(rows[1]);

        // Banned addresses
        let banned = self.state.sorted_banned(&view.name);
        let banned_focus = view.focus == JailFocus::BannedIps;
        let banned_rows: Vec<Row> = banned.iter().map(|ip| Row::new(vec![Cell::from(ip.clone())])).collect();
        let banned_table = Table::new(banned_rows, [Constraint::Min(15)])
            .header(Row::new(vec![Cell::from("Address").style(Style::default().fg(Color::Yellow))]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(focus_border(banned_focus))
                    .title(if banned_focus {
                        hotkey_line(&format!("Banned ({}) - ", banned.len()), &[("u", "Unban")])
                    } else {
                        Line::from(format!("Banned ({})", banned.len()))
                    }),
            )
            .highlight_style(Style::default().bg(Color::DarkGray));
        let mut banned_state = TableState::default();
        if banned_focus && !banned.is_empty() {
            banned_state.select(Some(view.banned_index));
        }
        frame.render_stateful_widget(banned_table, columns[0], &mut banned_state);

        // Log files
        let files = &status.filter.file_list;
        let files_focus = view.focus == JailFocus::Files;
        let file_rows: Vec<Row> = files
            .iter()
            .map(|file| {
                let (marker, color) = if file.exists {
                    ("●", Color::Green)
                } else {
                    ("○", Color::Red)
                };
                Row::new(vec![
                    Cell::from(marker).style(Style::default().fg(color)),
                    Cell::from(file.path.clone()),
                ])
            })
            .collect();
        let file_table = Table::new(file_rows, [Constraint::Length(2), Constraint::Min(10)])
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(focus_border(files_focus))
                    .title(if files_focus {
                        hotkey_line("Log files - ", &[("ENTER", "View")])
                    } else {
                        Line::from("Log files")
                    }),
            )
            .highlight_style(Style::default().bg(Color::DarkGray));
        let mut file_state = TableState::default();
        if files_focus && !files.is_empty() {
            file_state.select(Some(view.file_index));
        }
        frame.render_stateful_widget(file_table, columns[1], &mut file_state);

        // Tunables
        let tunables_focus = view.focus == JailFocus::Tunables;
        let lines: Vec<Line> = JailTunable::ALL
            .iter()
            .enumerate()
            .filter_map(|(i, tunable)| {
                let field = view.tunables.get(tunable)?;
                Some(field_line(tunable.as_str(), field, tunables_focus && i == view.tunable_index))
            })
            .collect();
        let tunables = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_border(tunables_focus))
                .title("Settings"),
        );
        frame.render_widget(tunables, columns[2]);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let section = |title: &str| {
            Line::from(Span::styled(
                title.to_string(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        };
        let entry = |key: &str, text: &str| {
            Line::from(vec![
                Span::styled(format!("  {:<12}", key), Style::default().fg(HOTKEY)),
                Span::raw(text.to_string()),
            ])
        };

        let lines = vec![
            section("Global"),
            entry("h / ?", "Toggle this help"),
            entry("F", "Refresh now"),
            entry("B", "Ban an address in a jail"),
            entry("U", "Unban addresses in every jail"),
            entry("A", "Unban everything"),
            entry("q / Ctrl+C", "Quit"),
            Line::from(""),
            section("Overview"),
            entry("S T R", "Start, stop or restart the daemon"),
            entry("D", "Reload the daemon with options"),
            entry("TAB", "Move between jails, log level and db settings"),
            entry("ENTER", "Open the selected jail / apply the log level"),
            entry("← →", "Choose a log level"),
            Line::from(""),
            section("Jail"),
            entry("TAB", "Move between banned addresses, files and settings"),
            entry("u / Del", "Unban the selected address"),
            entry("ENTER", "View the selected log file"),
            entry("r / x", "Reload or restart the jail"),
            entry("ESC", "Back to the overview"),
            Line::from(""),
            section("Settings"),
            Line::from("  Type a number; it is sent one second after the last keystroke."),
            Line::from(""),
            section("Log viewer"),
            entry("t", "Toggle tail mode / whole file"),
            entry("+ / -", "More or fewer tail lines"),
            entry("[ / ]", "Slower or faster polling"),
            entry("↑↓ PgUp PgDn", "Scroll"),
            entry("ESC", "Close"),
        ];

        let help = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Help "))
            .scroll((self.state.help_scroll_offset, 0));
        frame.render_widget(help, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let mut keys = vec![("H", "Help"), ("F", "Refresh"), ("B", "Ban IP"), ("U", "Unban IPs")];
        match self.state.current_screen {
            Screen::Overview => keys.push(("A", "Unban All")),
            Screen::Jail | Screen::Help => keys.push(("ESC", "Back")),
        }
        keys.push(("Q", "Quit"));

        let mut line = hotkey_line("", &keys);
        if let Some(at) = self.state.last_refresh {
            line.spans.push(Span::styled(
                format!("  (updated {})", at.format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let footer = Paragraph::new(vec![line]).block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, area);
    }

    fn render_ban_dialog(&self, frame: &mut Frame, area: Rect, ip: &str, jail_index: usize) {
        let popup_area = dialog_frame(frame, area, 60, 50, " Ban IP ", Color::Yellow);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // IP input
                Constraint::Length(3), // Jail
                Constraint::Min(2),    // Instructions
            ])
            .split(popup_area);

        let ip_text = if ip.is_empty() {
            "Type IP address here...".to_string()
        } else {
            format!("{}_", ip)
        };
        let ip_input = Paragraph::new(ip_text)
            .style(Style::default().fg(Color::White).bg(Color::Blue))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title(" Enter IPv4 Address ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            );
        frame.render_widget(ip_input, chunks[0]);

        let jail_text = match self.state.status.list.get(jail_index) {
            Some(jail) => format!("▶ {} ◀ (↑/↓ to change)", jail),
            None => "No jails available".to_string(),
        };
        let jail = Paragraph::new(jail_text)
            .style(Style::default().fg(Color::White))
            .alignment(Alignment::Center)
            .block(Block::default().title("Jail").borders(Borders::ALL));
        frame.render_widget(jail, chunks[1]);

        frame.render_widget(dialog_instructions("Ban"), chunks[2]);
    }

    fn render_unban_all_dialog(&self, frame: &mut Frame, area: Rect) {
        let popup_area = dialog_frame(frame, area, 50, 30, " Confirm Unban All ", Color::Red);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(2), Constraint::Length(2)])
            .split(popup_area);

        let message = Paragraph::new(format!(
            "Remove all {} banned address(es) from every jail?",
            self.state.banned.count
        ))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(message, chunks[0]);

        let buttons = Paragraph::new("[Y/Enter] Confirm • [N/Esc] Cancel")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        frame.render_widget(buttons, chunks[1]);
    }
}

fn field_line(label: &str, field: &DebouncedField, focused: bool) -> Line<'static> {
    let value = if focused {
        format!("{}_", field.input())
    } else if field.input().is_empty() {
        "-".to_string()
    } else {
        field.input().to_string()
    };
    let style = if focused {
        Style::default().fg(Color::White).bg(Color::Blue)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::styled(format!("{:<16}", label), Style::default().fg(Color::Gray)),
        Span::styled(value, style),
    ];
    if field.is_pending() {
        spans.push(Span::styled(" …", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

/// Clears the screen behind a popup and draws its border. Returns the inner area.
fn dialog_frame(frame: &mut Frame, area: Rect, pct_x: u16, pct_y: u16, title: &str, color: Color) -> Rect {
    frame.render_widget(Clear, area);

    let overlay = " ".repeat(area.width as usize * area.height as usize);
    let solid_background = Paragraph::new(overlay)
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false });
    frame.render_widget(solid_background, area);

    let popup_area = centered_rect(pct_x, pct_y, area);
    let dialog_border = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title.to_string());
    frame.render_widget(dialog_border, popup_area);

    popup_area.inner(&Margin {
        horizontal: 1,
        vertical: 1,
    })
}

fn dialog_instructions(action: &str) -> Paragraph<'static> {
    Paragraph::new(Line::from(vec![
        Span::styled("[Enter]", Style::default().fg(Color::Green)),
        Span::styled(format!(" {}  ", action), Style::default().fg(Color::Gray)),
        Span::styled("[Esc]", Style::default().fg(Color::Red)),
        Span::styled(" Cancel", Style::default().fg(Color::Gray)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP))
}

fn render_global_unban_dialog(frame: &mut Frame, area: Rect, input: &str) {
    let popup_area = dialog_frame(frame, area, 60, 40, " Unban IPs (all jails) ", Color::Yellow);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(2), Constraint::Min(2)])
        .split(popup_area);

    let text = if input.is_empty() {
        "203.0.113.5, 198.51.100.7 ...".to_string()
    } else {
        format!("{}_", input)
    };
    let field = Paragraph::new(text)
        .style(Style::default().fg(Color::White).bg(Color::Blue))
        .block(
            Block::default()
                .title(" Addresses ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
    frame.render_widget(field, chunks[0]);

    let hint = Paragraph::new("Separate addresses with commas or spaces")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    frame.render_widget(hint, chunks[1]);

    frame.render_widget(dialog_instructions("Unban"), chunks[2]);
}

fn render_flags_dialog(frame: &mut Frame, area: Rect, title: &str, flags: &[(&str, bool)], cursor: usize) {
    let popup_area = dialog_frame(frame, area, 50, 40, title, Color::Yellow);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(flags.len() as u16), Constraint::Length(3)])
        .split(popup_area);

    let lines: Vec<Line> = flags
        .iter()
        .enumerate()
        .map(|(i, (label, checked))| {
            let style = if i == cursor {
                Style::default().fg(Color::White).bg(Color::Blue)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(format!(" {} {} ", checkbox(*checked), label), style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), chunks[0]);

    let instructions = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("[↑/↓]", Style::default().fg(Color::Green)),
            Span::styled(" Move  ", Style::default().fg(Color::Gray)),
            Span::styled("[Space]", Style::default().fg(Color::Green)),
            Span::styled(" Toggle", Style::default().fg(Color::Gray)),
        ]),
        Line::from(vec![
            Span::styled("[Enter]", Style::default().fg(Color::Green)),
            Span::styled(" Run  ", Style::default().fg(Color::Gray)),
            Span::styled("[Esc]", Style::default().fg(Color::Red)),
            Span::styled(" Cancel", Style::default().fg(Color::Gray)),
        ]),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(instructions, chunks[1]);
}

fn render_tail_dialog(frame: &mut Frame, area: Rect, tail: &TailViewer) {
    let prefs = tail.preferences();
    let title = format!(" {} ", tail.path().unwrap_or("log file"));
    let popup_area = dialog_frame(frame, area, 90, 85, &title, Color::Cyan);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(2)])
        .split(popup_area);

    let mode = if prefs.tail_mode {
        format!("tail: last {} lines", prefs.tail_lines)
    } else {
        "entire file".to_string()
    };
    let mut info = vec![
        Span::styled(mode, Style::default().fg(Color::Yellow)),
        Span::styled(
            format!("   every {}s", prefs.poll_interval_secs),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(error) = tail.last_error() {
        info.push(Span::styled(format!("   ✗ {}", error), Style::default().fg(Color::Red)));
    }
    frame.render_widget(Paragraph::new(Line::from(info)), chunks[0]);

    let body: Vec<Line> = if tail.last_fetch().is_none() {
        vec![Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow)))]
    } else if !tail.exists() {
        vec![Line::from(Span::styled(
            "File does not exist on the server",
            Style::default().fg(Color::Red),
        ))]
    } else {
        tail.lines().iter().map(|l| Line::from(l.clone())).collect()
    };
    let content = Paragraph::new(body)
        .block(Block::default().borders(Borders::TOP | Borders::BOTTOM))
        .scroll((tail.scroll, 0));
    frame.render_widget(content, chunks[1]);

    let keys = hotkey_line(
        "",
        &[
            ("t", "Tail/Full"),
            ("+/-", "Lines"),
            ("[/]", "Interval"),
            ("↑↓", "Scroll"),
            ("ESC", "Close"),
        ],
    );
    frame.render_widget(Paragraph::new(keys).alignment(Alignment::Center), chunks[2]);
}

fn render_error_dialog(frame: &mut Frame, area: Rect, message: &str) {
    frame.render_widget(Clear, area);
    let overlay = " ".repeat(area.width as usize * area.height as usize);
    let solid_background = Paragraph::new(overlay)
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false });
    frame.render_widget(solid_background, area);

    let popup_area = centered_rect(80, 60, area);
    let dialog_border = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" ⚠ Error ");
    frame.render_widget(dialog_border, popup_area);

    let inner = popup_area.inner(&Margin {
        horizontal: 2,
        vertical: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(inner);

    let error_text: Vec<Line> = message.lines().map(|line| Line::from(line.to_string())).collect();
    let error_content = Paragraph::new(error_text)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });
    frame.render_widget(error_content, chunks[0]);

    let instructions = Paragraph::new("Press [Esc] to close this dialog")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(instructions, chunks[1]);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(60, 50, outer);
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 20);
        assert_eq!(inner.x, 20);
        assert_eq!(inner.y, 10);
    }

    #[test]
    fn pending_field_is_marked() {
        let mut field = DebouncedField::default();
        field.sync(Some(5));
        let idle: String = field_line("maxretry", &field, false)
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(idle.contains('5'));
        assert!(!idle.contains('…'));

        field.push_char('0', std::time::Instant::now());
        let pending: String = field_line("maxretry", &field, true)
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(pending.contains("50_"));
        assert!(pending.contains('…'));
    }
}
