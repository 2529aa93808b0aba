use std::time::{Duration, Instant};

use crate::utils::validation::parse_non_negative;

/// Idle time after the last keystroke before a settings edit is sent.
pub const SETTING_IDLE_DELAY: Duration = Duration::from_millis(1000);

/// What happened when a field's idle deadline expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fire {
    /// Post this value; it is already recorded as committed.
    Commit(u64),
    /// Input was not a non-negative whole number; nothing is sent.
    Rejected(String),
}

/// One numeric settings field with a debounced commit.
///
/// `input` is what the user sees, `committed` is the last value sent to (or
/// received from) the daemon. Each edit re-arms the deadline; only the value
/// present when the deadline passes is considered.
#[derive(Debug, Clone)]
pub struct DebouncedField {
    input: String,
    committed: String,
    deadline: Option<Instant>,
    delay: Duration,
}

impl Default for DebouncedField {
    fn default() -> Self {
        Self::new(SETTING_IDLE_DELAY)
    }
}

impl DebouncedField {
    pub fn new(delay: Duration) -> Self {
        Self {
            input: String::new(),
            committed: String::new(),
            deadline: None,
            delay,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Takes a fresh value from the server. Ignored while an edit is pending so
    /// a refresh does not clobber what the user is typing.
    pub fn sync(&mut self, value: Option<u64>) {
        if self.is_pending() {
            return;
        }
        let text = value.map(|v| v.to_string()).unwrap_or_default();
        self.input = text.clone();
        self.committed = text;
    }

    pub fn edit(&mut self, value: impl Into<String>, now: Instant) {
        self.input = value.into();
        self.deadline = Some(now + self.delay);
    }

    pub fn push_char(&mut self, c: char, now: Instant) {
        let mut value = self.input.clone();
        value.push(c);
        self.edit(value, now);
    }

    pub fn backspace(&mut self, now: Instant) {
        let mut value = self.input.clone();
        if value.pop().is_some() {
            self.edit(value, now);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Fires at most once per armed deadline.
    pub fn poll(&mut self, now: Instant) -> Option<Fire> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
            },
            _ => return None,
        }

        if self.input.is_empty() || self.input == self.committed {
            return None;
        }

        match parse_non_negative(&self.input) {
            Some(value) => {
                self.committed = self.input.clone();
                Some(Fire::Commit(value))
            },
            None => Some(Fire::Rejected(self.input.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(committed: u64) -> DebouncedField {
        let mut field = DebouncedField::default();
        field.sync(Some(committed));
        field
    }

    #[test]
    fn rapid_edits_fire_once_with_last_value() {
        let start = Instant::now();
        let mut field = field(600);
        let mut fired = Vec::new();

        field.edit("7", start);
        fired.extend(field.poll(start + Duration::from_millis(300)));
        field.edit("70", start + Duration::from_millis(400));
        fired.extend(field.poll(start + Duration::from_millis(900)));
        field.edit("700", start + Duration::from_millis(950));
        fired.extend(field.poll(start + Duration::from_millis(1500)));
        fired.extend(field.poll(start + Duration::from_millis(1950)));
        fired.extend(field.poll(start + Duration::from_millis(5000)));

        assert_eq!(fired, vec![Fire::Commit(700)]);
        assert_eq!(field.committed(), "700");
        assert!(!field.is_pending());
    }

    #[test]
    fn unchanged_or_empty_input_sends_nothing() {
        let start = Instant::now();
        let mut field = field(600);

        field.edit("600", start);
        assert_eq!(field.poll(start + SETTING_IDLE_DELAY), None);

        field.edit("", start);
        assert_eq!(field.poll(start + SETTING_IDLE_DELAY), None);
        assert_eq!(field.committed(), "600");
    }

    #[test]
    fn invalid_input_is_rejected_without_commit() {
        let start = Instant::now();
        let mut field = field(10);

        field.edit("-5", start);
        assert_eq!(
            field.poll(start + SETTING_IDLE_DELAY),
            Some(Fire::Rejected("-5".to_string()))
        );
        assert_eq!(field.committed(), "10");
    }

    #[test]
    fn sync_waits_for_pending_edit() {
        let start = Instant::now();
        let mut field = field(10);

        field.push_char('5', start);
        field.sync(Some(99));
        assert_eq!(field.input(), "105");

        field.cancel();
        field.sync(Some(99));
        assert_eq!(field.input(), "99");
        assert_eq!(field.committed(), "99");
    }

    #[test]
    fn cancel_drops_the_deadline() {
        let start = Instant::now();
        let mut field = field(1);

        field.backspace(start);
        field.push_char('2', start);
        field.cancel();
        assert_eq!(field.poll(start + Duration::from_secs(10)), None);
    }
}
