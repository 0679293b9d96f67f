//! Container conversion.
//!
//! Both directions implement [`Converter`]: four phases driven in order by
//! [`convert_to`](Converter::convert_to).
//!
//! ```text
//!  Init ──open──► Opened ──transform──► Transformed ──close──► Closed ──write──► Written
//!    │               │                      │                    │
//!    └───────────────┴──────────────────────┴────────────────────┴──► Failed
//! ```
//!
//! A failing phase records an ERROR naming the phase and both paths, the
//! source is closed anyway, and the run ends in `Failed`. Everything else
//! that goes wrong while walking entries is a [`Notification`](crate::Notification)
//! and does not stop the run.

mod ca_to_ro;
pub mod escape;
mod ro_to_ca;

pub use ca_to_ro::CaToRo;
pub use ro_to_ca::RoToCa;

use std::fmt;
use std::path::Path;

use crate::error::CaroError;
use crate::notification::Notifications;

/// Lifecycle state of one conversion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConversionState {
    #[default]
    Init,
    Opened,
    Transformed,
    Closed,
    Written,
    Failed,
}

/// The four phases of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Open,
    Transform,
    Close,
    Write,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Open => "open",
            Phase::Transform => "transform",
            Phase::Close => "close",
            Phase::Write => "write",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State and notification log of a converter.
#[derive(Clone, Debug, Default)]
pub struct Lifecycle {
    pub(crate) state: ConversionState,
    pub(crate) notifications: Notifications,
}

impl Lifecycle {
    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }
}

/// One direction of conversion.
///
/// Implementors provide the phases; callers use [`convert_to`](Self::convert_to)
/// and inspect the notifications afterwards. Warnings can accompany a
/// successful run.
pub trait Converter {
    /// Path of the source container.
    fn source(&self) -> &Path;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Open the source container read-only.
    fn open_source(&mut self) -> Result<(), CaroError>;

    /// Build the target container in memory.
    fn transform(&mut self) -> Result<(), CaroError>;

    /// Release the source. Must be safe to call more than once.
    fn close_source(&mut self) -> Result<(), CaroError>;

    /// Persist the target container at `target`.
    fn write(&mut self, target: &Path) -> Result<(), CaroError>;

    /// Run all phases. Returns true when the target was written.
    fn convert_to(&mut self, target: &Path) -> bool {
        run(self, target)
    }

    fn state(&self) -> ConversionState {
        self.lifecycle().state
    }

    fn notifications(&self) -> &Notifications {
        &self.lifecycle().notifications
    }

    fn has_errors(&self) -> bool {
        self.notifications().has_errors()
    }

    fn has_warnings(&self) -> bool {
        self.notifications().has_warnings()
    }
}

/// Drive `converter` through open, transform, close and write.
pub fn run<C: Converter + ?Sized>(converter: &mut C, target: &Path) -> bool {
    if converter.state() != ConversionState::Init {
        let message = format!(
            "conversion of {} already ran; create a new converter to retry",
            converter.source().display()
        );
        converter.lifecycle_mut().notifications.error(message);
        return false;
    }

    let steps: [(Phase, ConversionState); 4] = [
        (Phase::Open, ConversionState::Opened),
        (Phase::Transform, ConversionState::Transformed),
        (Phase::Close, ConversionState::Closed),
        (Phase::Write, ConversionState::Written),
    ];

    for (phase, reached) in steps {
        tracing::debug!(phase = %phase, source = %converter.source().display(), "conversion phase");
        let result = match phase {
            Phase::Open => converter.open_source(),
            Phase::Transform => converter.transform(),
            Phase::Close => converter.close_source(),
            Phase::Write => converter.write(target),
        };
        match result {
            Ok(()) => converter.lifecycle_mut().state = reached,
            Err(error) => {
                abort(converter, phase, target, &error);
                return false;
            }
        }
    }
    true
}

fn abort<C: Converter + ?Sized>(converter: &mut C, phase: Phase, target: &Path, error: &CaroError) {
    let message = format!(
        "{phase} phase failed converting {} to {}: {error}",
        converter.source().display(),
        target.display()
    );
    converter.lifecycle_mut().notifications.error(message);

    if let Err(close_error) = converter.close_source() {
        let message = format!(
            "cannot close {}: {close_error}",
            converter.source().display()
        );
        converter.lifecycle_mut().notifications.warn(message);
    }
    converter.lifecycle_mut().state = ConversionState::Failed;
}
