//! Structured lifecycle records.
//!
//! Every free-list mutation the arena performs can be captured as an
//! [`ArenaLogRecord`]. Recording is off unless a [`LogLevel`] threshold is
//! configured. With the `verbose` feature each kept record is also written
//! to stderr as it is produced.

use serde::Serialize;

/// Severity of a lifecycle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a threshold (case-insensitive). `off` and unknown strings yield `None`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "all" | "verbose" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Arena counters captured alongside each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LogSnapshot {
    pub zone_count: usize,
    pub free_blocks: usize,
    pub current_zone_size: usize,
}

/// One allocator lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArenaLogRecord {
    /// Monotonic id, unique per arena.
    pub decision_id: u64,
    /// Correlation id (`zonealloc::<symbol>::<id>`).
    pub trace_id: String,
    pub level: LogLevel,
    /// Operation that produced the event (`allocate`, `release`, ...).
    pub symbol: &'static str,
    /// Event kind (`grow`, `split`, `consume`, `merge`, ...).
    pub event: &'static str,
    /// Descriptor address involved, if any.
    pub ptr: Option<usize>,
    /// Size involved, if any.
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    pub details: String,
    pub snapshot: LogSnapshot,
}

/// Append-only record sink owned by an arena.
#[derive(Debug, Default)]
pub(crate) struct LifecycleLog {
    threshold: Option<LogLevel>,
    next_decision_id: u64,
    records: Vec<ArenaLogRecord>,
}

/// Fields of a record before id assignment.
pub(crate) struct Event {
    pub level: LogLevel,
    pub symbol: &'static str,
    pub event: &'static str,
    pub ptr: Option<usize>,
    pub size: Option<usize>,
    pub outcome: &'static str,
    pub details: String,
}

impl LifecycleLog {
    pub(crate) fn new(threshold: Option<LogLevel>) -> Self {
        Self {
            threshold,
            next_decision_id: 1,
            records: Vec::new(),
        }
    }

    /// Whether a record at `level` would be kept. Callers check this before
    /// formatting details.
    #[inline]
    pub(crate) fn enabled(&self, level: LogLevel) -> bool {
        self.threshold.is_some_and(|min| level >= min)
    }

    pub(crate) fn record(&mut self, event: Event, snapshot: LogSnapshot) {
        if !self.enabled(event.level) {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        let record = ArenaLogRecord {
            decision_id,
            trace_id: format!("zonealloc::{}::{:016x}", event.symbol, decision_id),
            level: event.level,
            symbol: event.symbol,
            event: event.event,
            ptr: event.ptr,
            size: event.size,
            outcome: event.outcome,
            details: event.details,
            snapshot,
        };
        #[cfg(feature = "verbose")]
        eprintln!(
            "[{}] {} {} ptr={:#x?} size={:?} outcome={} {}",
            record.level.as_str(),
            record.trace_id,
            record.event,
            record.ptr,
            record.size,
            record.outcome,
            record.details
        );
        self.records.push(record);
    }

    pub(crate) fn records(&self) -> &[ArenaLogRecord] {
        &self.records
    }

    pub(crate) fn drain(&mut self) -> Vec<ArenaLogRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: LogLevel) -> Event {
        Event {
            level,
            symbol: "allocate",
            event: "split",
            ptr: Some(0x1000),
            size: Some(64),
            outcome: "success",
            details: String::new(),
        }
    }

    #[test]
    fn parse_levels_loosely() {
        assert_eq!(LogLevel::from_str_loose("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str_loose(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str_loose("off"), None);
        assert_eq!(LogLevel::from_str_loose("bogus"), None);
    }

    #[test]
    fn disabled_log_keeps_nothing() {
        let mut log = LifecycleLog::new(None);
        log.record(event(LogLevel::Error), LogSnapshot::default());
        assert!(log.records().is_empty());
    }

    #[test]
    fn threshold_filters_lower_levels() {
        let mut log = LifecycleLog::new(Some(LogLevel::Info));
        log.record(event(LogLevel::Debug), LogSnapshot::default());
        log.record(event(LogLevel::Warn), LogSnapshot::default());
        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].level, LogLevel::Warn);
    }

    #[test]
    fn ids_are_monotonic_and_drain_empties() {
        let mut log = LifecycleLog::new(Some(LogLevel::Trace));
        log.record(event(LogLevel::Trace), LogSnapshot::default());
        log.record(event(LogLevel::Trace), LogSnapshot::default());
        let drained = log.drain();
        assert_eq!(drained[0].decision_id, 1);
        assert_eq!(drained[1].decision_id, 2);
        assert_eq!(drained[1].trace_id, "zonealloc::allocate::0000000000000002");
        assert!(log.records().is_empty());
    }
}
