//! Sink for spell-authored log output.
//!
//! Designers can put log modifiers into a spell; what those modifiers print
//! is spell behaviour rather than engine diagnostics, so it goes through its
//! own capability. [`TracingSpellLog`] forwards lines to `tracing`;
//! [`RecordingLog`] keeps them for inspection.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Which hook produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    /// Emitted while the modifier itself was cast.
    Cast,
    /// Emitted in reaction to a subscribed cast event.
    Event,
    /// Emitted in reaction to a subscribed action event.
    Action,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cast => write!(f, "Cast"),
            Self::Event => write!(f, "Event"),
            Self::Action => write!(f, "Action"),
        }
    }
}

/// A single line of spell log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellLogLine {
    /// Name of the emitting modifier, e.g. `log#2`.
    pub source: String,
    /// The hook that produced the line.
    pub kind: LogKind,
    /// The message text.
    pub text: String,
}

/// Receives spell log lines.
pub trait SpellLog: Send + Sync {
    /// Emits one line.
    fn emit(&self, line: SpellLogLine);
}

/// Forwards spell log lines to `tracing` at `info` level under the
/// `spellforge::spell_log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpellLog;

impl SpellLog for TracingSpellLog {
    fn emit(&self, line: SpellLogLine) {
        tracing::info!(
            target: "spellforge::spell_log",
            source = %line.source,
            kind = %line.kind,
            "{}",
            line.text
        );
    }
}

/// Keeps every emitted line in memory.
///
/// # Example
///
/// ```
/// use spellforge_host::{LogKind, RecordingLog, SpellLog, SpellLogLine};
///
/// let log = RecordingLog::new();
/// log.emit(SpellLogLine {
///     source: "log#0".into(),
///     kind: LogKind::Cast,
///     text: "hello".into(),
/// });
///
/// assert_eq!(log.count(LogKind::Cast), 1);
/// assert_eq!(log.count(LogKind::Event), 0);
/// ```
#[derive(Debug, Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<SpellLogLine>>,
}

impl RecordingLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line recorded so far, in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<SpellLogLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded lines of the given kind.
    #[must_use]
    pub fn count(&self, kind: LogKind) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|line| line.kind == kind)
            .count()
    }

    /// Total number of recorded lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains and returns all recorded lines.
    pub fn take(&self) -> Vec<SpellLogLine> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl SpellLog for RecordingLog {
    fn emit(&self, line: SpellLogLine) {
        tracing::debug!(source = %line.source, kind = %line.kind, text = %line.text, "spell log");
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}
