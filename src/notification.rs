//! Notifications — diagnostics collected during a conversion run.
//!
//! Converters never raise errors past their boundary. Everything worth
//! reporting is appended to a [`Notifications`] log which the caller
//! inspects after [`convert_to`](crate::Converter::convert_to) returns.
//! Each appended message is also forwarded to `tracing`.

use std::fmt;

/// Severity level of a notification, ordered `Note < Warn < Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warn,
    Error,
}

impl Severity {
    /// Upper-case label used in rendered messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Note => "NOTE",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single severity-tagged message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Append-only notification log.
#[derive(Clone, Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and mirror it to `tracing`.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Note => tracing::info!("{message}"),
            Severity::Warn => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
        self.items.push(Notification { severity, message });
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.push(Severity::Note, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// True iff at least one ERROR was recorded.
    pub fn has_errors(&self) -> bool {
        self.has(Severity::Error)
    }

    /// True iff at least one WARN was recorded. Independent of [`has_errors`](Self::has_errors).
    pub fn has_warnings(&self) -> bool {
        self.has(Severity::Warn)
    }

    fn has(&self, severity: Severity) -> bool {
        self.items.iter().any(|n| n.severity == severity)
    }

    /// Highest severity recorded so far.
    pub fn max_severity(&self) -> Option<Severity> {
        self.items.iter().map(|n| n.severity).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Notifications {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
