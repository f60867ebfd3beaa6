//! Centralized logging configuration for the emulator.
//!
//! Emulation code never talks to a logging backend directly. Every diagnostic
//! goes through [`log()`], which checks the per-category level held in
//! [`LogConfig`], applies a per-category rate limit and then hands the message
//! to the [`log`](https://docs.rs/log) facade. Frontends pick the backend
//! (the CLI installs `env_logger`).
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Logging categories (CPU, Bus, VDP, IO, Interrupts)
//! - **log()**: Common logging function, lazily formatted
//!
//! Errors are enabled out of the box so bus faults reach whatever backend the
//! host installs; everything more verbose is opt-in.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Bus, LogLevel::Error, || {
//!     format!("68k attempted to read invalid memory at 0x{:06X}", 0xB00000)
//! });
//! ```

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// Matching `log` crate level; `Off` has none.
    pub fn to_log_level(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Global level a fresh configuration starts with
pub const DEFAULT_GLOBAL_LEVEL: LogLevel = LogLevel::Error;

const CATEGORY_COUNT: usize = 5;

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Primary CPU execution
    CPU,
    /// Address decoding and memory access
    Bus,
    /// Video display processor (ports, DMA)
    VDP,
    /// Joypad and I/O ports
    IO,
    /// Interrupt delivery (HINT, VINT)
    Interrupts,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::VDP,
        LogCategory::IO,
        LogCategory::Interrupts,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::CPU => 0,
            LogCategory::Bus => 1,
            LogCategory::VDP => 2,
            LogCategory::IO => 3,
            LogCategory::Interrupts => 4,
        }
    }

    /// `log` crate target used for records of this category.
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::CPU => "emu::cpu",
            LogCategory::Bus => "emu::bus",
            LogCategory::VDP => "emu::vdp",
            LogCategory::IO => "emu::io",
            LogCategory::Interrupts => "emu::interrupts",
        }
    }

    /// Parse a category name as used in filter specs (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Some(LogCategory::CPU),
            "bus" => Some(LogCategory::Bus),
            "vdp" => Some(LogCategory::VDP),
            "io" | "joypad" => Some(LogCategory::IO),
            "int" | "interrupts" => Some(LogCategory::Interrupts),
            _ => None,
        }
    }
}

/// Errors from parsing a log filter spec
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogSpecError {
    #[error("unknown log category '{0}'")]
    UnknownCategory(String),
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
}

#[derive(Default)]
struct Window {
    timestamps: std::collections::VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

/// Sliding-window limiter, one window per category.
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new(Default::default()),
        }
    }

    /// Returns whether this message may be emitted, and a count of dropped
    /// messages when one is due to be reported.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = &mut windows[category.index()];

        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > Self::WINDOW {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() < self.max_per_second.load(Ordering::Relaxed) {
            window.timestamps.push_back(now);
            let dropped = std::mem::take(&mut window.dropped);
            if dropped > 0 {
                window.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let report_due = window
            .last_drop_report
            .map_or(true, |last| now.duration_since(last) >= Self::WINDOW);
        if report_due {
            window.last_drop_report = Some(now);
            (false, Some(std::mem::take(&mut window.dropped)))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Applies to every category without its own level
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// Create a new LogConfig reporting errors only, with a 60 logs/second limit
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(DEFAULT_GLOBAL_LEVEL as u8),
            category_levels: Default::default(),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins; `Off` falls back to the global level.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.get_level(category) {
            LogLevel::Off => level <= self.get_global_level(),
            category_level => level <= category_level,
        }
    }

    /// Back to the defaults: errors only, no per-category levels
    pub fn reset(&self) {
        self.set_global_level(DEFAULT_GLOBAL_LEVEL);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Apply a comma-separated filter spec such as `"bus=error,vdp=debug,warn"`.
    ///
    /// A bare level sets the global level; `category=level` sets one category.
    /// Nothing is applied if any entry fails to parse.
    pub fn apply_spec(&self, spec: &str) -> Result<(), LogSpecError> {
        let mut global = None;
        let mut per_category = Vec::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((category, level)) => {
                    let category = LogCategory::from_str(category.trim())
                        .ok_or_else(|| LogSpecError::UnknownCategory(category.trim().to_string()))?;
                    let level = LogLevel::from_str(level.trim())
                        .ok_or_else(|| LogSpecError::UnknownLevel(level.trim().to_string()))?;
                    per_category.push((category, level));
                }
                None => {
                    global = Some(
                        LogLevel::from_str(entry)
                            .ok_or_else(|| LogSpecError::UnknownLevel(entry.to_string()))?,
                    );
                }
            }
        }

        if let Some(level) = global {
            self.set_global_level(level);
        }
        for (category, level) in per_category {
            self.set_level(category, level);
        }
        Ok(())
    }
}

fn emit(category: LogCategory, level: LogLevel, message: &str) {
    if let Some(level) = level.to_log_level() {
        log::log!(target: category.target(), level, "{}", message);
    }
}

/// Log a message with the specified category and level
///
/// The closure only runs when the category and level are enabled and the
/// category is under its rate limit. When messages have been dropped, a
/// warning with the drop count is emitted first.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        emit(
            category,
            LogLevel::Warn,
            &format!(
                "[{:?}] rate limit exceeded, {} log message(s) dropped in the last second",
                category, count
            ),
        );
    }

    if allowed {
        emit(category, level, &message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("OFF"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("err"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("Trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("invalid"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_log_level_maps_to_facade() {
        assert_eq!(LogLevel::Off.to_log_level(), None);
        assert_eq!(LogLevel::Error.to_log_level(), Some(log::Level::Error));
        assert_eq!(LogLevel::Trace.to_log_level(), Some(log::Level::Trace));
    }

    #[test]
    fn test_should_log_with_category_level() {
        let config = LogConfig::new();
        config.set_level(LogCategory::Bus, LogLevel::Info);

        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Info));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Debug));
        // Other categories fall back to the global default
        assert!(config.should_log(LogCategory::VDP, LogLevel::Error));
        assert!(!config.should_log(LogCategory::VDP, LogLevel::Info));
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::VDP, LogLevel::Debug);

        assert!(config.should_log(LogCategory::VDP, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_off_is_never_logged() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::CPU, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::IO, LogLevel::Debug);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Error);
        assert_eq!(config.get_level(LogCategory::IO), LogLevel::Off);
        assert!(!config.should_log(LogCategory::IO, LogLevel::Debug));
    }

    #[test]
    fn test_errors_enabled_by_default() {
        let config = LogConfig::new();
        for category in LogCategory::ALL {
            assert!(config.should_log(category, LogLevel::Error));
            assert!(!config.should_log(category, LogLevel::Warn));
        }
    }

    #[test]
    fn test_global_off_silences_errors() {
        let config = LogConfig::new();
        config.apply_spec("off").unwrap();
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_category_targets_share_prefix() {
        for category in LogCategory::ALL {
            assert!(category.target().starts_with("emu::"));
            assert_eq!(LogCategory::from_str(&category.target()[5..]), Some(category));
        }
    }

    #[test]
    fn test_apply_spec() {
        let config = LogConfig::new();
        config
            .apply_spec("bus=error, vdp=debug ,warn")
            .expect("valid spec");

        assert_eq!(config.get_global_level(), LogLevel::Warn);
        assert_eq!(config.get_level(LogCategory::Bus), LogLevel::Error);
        assert_eq!(config.get_level(LogCategory::VDP), LogLevel::Debug);
        assert_eq!(config.get_level(LogCategory::CPU), LogLevel::Off);
    }

    #[test]
    fn test_apply_spec_rejects_unknown_entries_atomically() {
        let config = LogConfig::new();
        assert_eq!(
            config.apply_spec("bus=debug,ppu=info"),
            Err(LogSpecError::UnknownCategory("ppu".to_string()))
        );
        assert_eq!(
            config.apply_spec("loud"),
            Err(LogSpecError::UnknownLevel("loud".to_string()))
        );
        assert_eq!(config.get_level(LogCategory::Bus), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(60);

        for _ in 0..60 {
            let (allowed, _) = limiter.should_allow(LogCategory::Bus);
            assert!(allowed, "Should allow logs within the rate limit");
        }

        let (allowed, dropped) = limiter.should_allow(LogCategory::Bus);
        assert!(!allowed, "Should block logs exceeding the rate limit");
        assert_eq!(dropped, Some(1));
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            limiter.should_allow(LogCategory::Bus);
        }

        assert!(!limiter.should_allow(LogCategory::Bus).0);
        assert!(limiter.should_allow(LogCategory::VDP).0);
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count_after_window() {
        let limiter = RateLimiter::new(2);
        for _ in 0..2 {
            limiter.should_allow(LogCategory::IO);
        }
        // First drop is reported immediately, the rest accumulate.
        for _ in 0..5 {
            limiter.should_allow(LogCategory::IO);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::IO);
        assert!(allowed);
        assert_eq!(dropped, Some(4));
    }
}
