//! Helpers for running conversions and checking their notifications.

use std::path::Path;

use caro::{CaToRo, ConvertOptions, Converter, Notifications, RoToCa, Severity};

/// Convert a COMBINE archive at `source` into a bundle at `target`.
pub fn forward(source: &Path, target: &Path) -> (bool, CaToRo) {
    let mut converter = CaToRo::new(source, ConvertOptions::default());
    let ok = converter.convert_to(target);
    assert_consistent(converter.notifications());
    (ok, converter)
}

/// Convert a bundle at `source` into a COMBINE archive at `target`.
pub fn reverse(source: &Path, target: &Path) -> (bool, RoToCa) {
    let mut converter = RoToCa::new(source, ConvertOptions::default());
    let ok = converter.convert_to(target);
    assert_consistent(converter.notifications());
    (ok, converter)
}

/// Messages of the given severity.
pub fn messages(notifications: &Notifications, severity: Severity) -> Vec<String> {
    notifications
        .iter()
        .filter(|n| n.severity == severity)
        .map(|n| n.message.clone())
        .collect()
}

/// `has_errors`/`has_warnings` agree with the log contents.
pub fn assert_consistent(notifications: &Notifications) {
    assert_eq!(
        notifications.has_errors(),
        notifications.iter().any(|n| n.severity == Severity::Error)
    );
    assert_eq!(
        notifications.has_warnings(),
        notifications.iter().any(|n| n.severity == Severity::Warn)
    );
}
