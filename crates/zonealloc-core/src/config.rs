//! Arena configuration.
//!
//! Defaults reproduce the classic behavior: a 100 KiB first zone, mapped
//! read/write/execute, with lifecycle recording switched off. Every knob can
//! be overridden from the environment:
//! - `ZONEALLOC_INITIAL_ZONE`: size in bytes of the lazily mapped first zone.
//! - `ZONEALLOC_EXEC`: `0` maps zones without `PROT_EXEC`.
//! - `ZONEALLOC_LOG`: `off`, `error`, `warn`, `info`, `debug` or `trace`.
//!
//! Unparseable values fall back to the default for that knob.

use crate::arena::zone::MIN_ZONE_SIZE;
use crate::log::LogLevel;

/// Size of the zone mapped on the first allocation.
pub const INITIAL_ZONE_SIZE: usize = 100 * 1024;

/// Environment variable for [`ArenaConfig::initial_zone_size`].
pub const ENV_INITIAL_ZONE: &str = "ZONEALLOC_INITIAL_ZONE";
/// Environment variable for [`ArenaConfig::executable`].
pub const ENV_EXEC: &str = "ZONEALLOC_EXEC";
/// Environment variable for [`ArenaConfig::log_level`].
pub const ENV_LOG: &str = "ZONEALLOC_LOG";

/// Tunables for one [`Arena`](crate::arena::Arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Bytes mapped for the first zone.
    pub initial_zone_size: usize,
    /// Whether zones are mapped with execute permission.
    pub executable: bool,
    /// Lowest level that gets recorded; `None` disables recording.
    pub log_level: Option<LogLevel>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_zone_size: INITIAL_ZONE_SIZE,
            executable: true,
            log_level: None,
        }
    }
}

impl ArenaConfig {
    /// Reads overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let initial_zone_size = lookup(ENV_INITIAL_ZONE)
            .and_then(|raw| parse_size(&raw))
            .unwrap_or(defaults.initial_zone_size);
        let executable = lookup(ENV_EXEC)
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(defaults.executable);
        let log_level = lookup(ENV_LOG)
            .map(|raw| LogLevel::from_str_loose(&raw))
            .unwrap_or(defaults.log_level);
        Self {
            initial_zone_size,
            executable,
            log_level,
        }
    }

    /// Returns a copy with a different first-zone size.
    ///
    /// Sizes below [`MIN_ZONE_SIZE`] are raised to it.
    #[must_use]
    pub const fn with_initial_zone_size(mut self, size: usize) -> Self {
        self.initial_zone_size = if size < MIN_ZONE_SIZE {
            MIN_ZONE_SIZE
        } else {
            size
        };
        self
    }

    /// Returns a copy recording lifecycle events at `level` and above.
    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Returns a copy mapping zones with or without execute permission.
    #[must_use]
    pub const fn with_executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }
}

// Smaller zones cannot hold their own header plus one block header.
fn parse_size(raw: &str) -> Option<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= MIN_ZONE_SIZE)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_classic_allocator() {
        let cfg = ArenaConfig::default();
        assert_eq!(cfg.initial_zone_size, 100 * 1024);
        assert!(cfg.executable);
        assert_eq!(cfg.log_level, None);
    }

    #[test]
    fn lookup_overrides_every_knob() {
        let cfg = ArenaConfig::from_lookup(lookup_from(&[
            (ENV_INITIAL_ZONE, "65536"),
            (ENV_EXEC, "0"),
            (ENV_LOG, "TRACE"),
        ]));
        assert_eq!(cfg.initial_zone_size, 65536);
        assert!(!cfg.executable);
        assert_eq!(cfg.log_level, Some(LogLevel::Trace));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = ArenaConfig::from_lookup(lookup_from(&[
            (ENV_INITIAL_ZONE, "lots"),
            (ENV_EXEC, "maybe"),
        ]));
        assert_eq!(cfg, ArenaConfig::default());
    }

    #[test]
    fn zero_initial_zone_is_rejected() {
        let cfg = ArenaConfig::from_lookup(lookup_from(&[(ENV_INITIAL_ZONE, "0")]));
        assert_eq!(cfg.initial_zone_size, INITIAL_ZONE_SIZE);
    }

    #[test]
    fn undersized_initial_zone_is_rejected() {
        let cfg = ArenaConfig::from_lookup(lookup_from(&[(ENV_INITIAL_ZONE, "16")]));
        assert_eq!(cfg.initial_zone_size, INITIAL_ZONE_SIZE);

        let below = (MIN_ZONE_SIZE - 1).to_string();
        let cfg = ArenaConfig::from_lookup(lookup_from(&[(ENV_INITIAL_ZONE, below.as_str())]));
        assert_eq!(cfg.initial_zone_size, INITIAL_ZONE_SIZE);

        let exact = MIN_ZONE_SIZE.to_string();
        let cfg = ArenaConfig::from_lookup(lookup_from(&[(ENV_INITIAL_ZONE, exact.as_str())]));
        assert_eq!(cfg.initial_zone_size, MIN_ZONE_SIZE);
    }

    #[test]
    fn builder_raises_undersized_initial_zone() {
        let cfg = ArenaConfig::default().with_initial_zone_size(16);
        assert_eq!(cfg.initial_zone_size, MIN_ZONE_SIZE);
    }

    #[test]
    fn undersized_env_zone_still_allocates() {
        let cfg = ArenaConfig::from_lookup(lookup_from(&[(ENV_INITIAL_ZONE, "16")]));
        let mut arena = crate::arena::Arena::with_config(cfg);
        for _ in 0..3 {
            assert!(arena.allocate(1).unwrap().is_some());
        }
        assert_eq!(arena.stats().zone_count, 1);
    }

    #[test]
    fn builders_chain() {
        let cfg = ArenaConfig::default()
            .with_initial_zone_size(8192)
            .with_log_level(LogLevel::Debug)
            .with_executable(false);
        assert_eq!(cfg.initial_zone_size, 8192);
        assert_eq!(cfg.log_level, Some(LogLevel::Debug));
        assert!(!cfg.executable);
    }
}
