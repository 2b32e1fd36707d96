//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::backoff::Backoff;

/// Environment variable selecting the threading mode.
pub const ENV_MODE: &str = "PROMETHEUS_RW_MODE";
/// Environment variable overriding the spin iteration count.
pub const ENV_SPIN_ITERATIONS: &str = "PROMETHEUS_RW_SPIN_ITERATIONS";
/// Environment variable overriding the park timeout in microseconds.
pub const ENV_PARK_TIMEOUT_MICROS: &str = "PROMETHEUS_RW_PARK_TIMEOUT_MICROS";
/// Environment variable overriding the dead-participant sweep interval in microseconds.
pub const ENV_GC_INTERVAL_MICROS: &str = "PROMETHEUS_RW_GC_INTERVAL_MICROS";
/// Environment variable toggling implicit reads on the write thread.
pub const ENV_ALLOW_IMPLICIT_READ: &str = "PROMETHEUS_RW_ALLOW_IMPLICIT_READ";

const DEFAULT_SPIN_ITERATIONS: u32 = 100;
const DEFAULT_PARK_TIMEOUT_MICROS: u64 = 1_000;
const DEFAULT_GC_INTERVAL_MICROS: u64 = 1_000;

/// Which coordinator implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// Writes happen only on one designated thread (a UI thread).
    WriteThread,
    /// Any thread may become the writer.
    AnyThread,
}

/// Tuning and policy for a coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Implementation to build.
    pub mode: ThreadingMode,
    /// Yield rounds before a waiter starts parking.
    pub spin_iterations: u32,
    /// Park timeout in microseconds; waiters re-poll after each park.
    pub park_timeout_micros: u64,
    /// Minimum spacing between dead-participant sweeps, in microseconds.
    pub gc_interval_micros: u64,
    /// Whether the write thread reads without taking a read lock.
    pub allow_implicit_read: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mode: ThreadingMode::AnyThread,
            spin_iterations: default_spin_iterations(),
            park_timeout_micros: DEFAULT_PARK_TIMEOUT_MICROS,
            gc_interval_micros: DEFAULT_GC_INTERVAL_MICROS,
            allow_implicit_read: true,
        }
    }
}

/// Spinning cannot make progress on a single CPU, so waiters park right away there.
fn default_spin_iterations() -> u32 {
    if num_cpus::get() > 1 {
        DEFAULT_SPIN_ITERATIONS
    } else {
        0
    }
}

impl CoordinatorConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threading mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ThreadingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the spin iteration count.
    #[must_use]
    pub const fn with_spin_iterations(mut self, spin_iterations: u32) -> Self {
        self.spin_iterations = spin_iterations;
        self
    }

    /// Set the park timeout.
    #[must_use]
    pub fn with_park_timeout(mut self, timeout: Duration) -> Self {
        self.park_timeout_micros = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Set the dead-participant sweep interval.
    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval_micros = u64::try_from(interval.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Set whether the write thread reads implicitly.
    #[must_use]
    pub const fn with_implicit_read(mut self, allow: bool) -> Self {
        self.allow_implicit_read = allow;
        self
    }

    /// Park timeout as a [`Duration`].
    #[must_use]
    pub const fn park_timeout(&self) -> Duration {
        Duration::from_micros(self.park_timeout_micros)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn gc_interval(&self) -> Duration {
        Duration::from_micros(self.gc_interval_micros)
    }

    pub(crate) const fn backoff(&self) -> Backoff {
        Backoff::new(self.spin_iterations, self.park_timeout())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.park_timeout_micros == 0 {
            return Err("park_timeout_micros must be greater than 0".into());
        }
        if self.park_timeout_micros > 1_000_000 {
            return Err("park_timeout_micros must not exceed one second".into());
        }
        if self.gc_interval_micros == 0 {
            return Err("gc_interval_micros must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading a `.env` file first
    /// if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(mode) = lookup(ENV_MODE) {
            cfg.mode = match mode.trim() {
                "write_thread" => ThreadingMode::WriteThread,
                "any_thread" => ThreadingMode::AnyThread,
                other => return Err(format!("{ENV_MODE}: unknown mode `{other}`")),
            };
        }
        if let Some(raw) = lookup(ENV_SPIN_ITERATIONS) {
            cfg.spin_iterations = parse_var(ENV_SPIN_ITERATIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PARK_TIMEOUT_MICROS) {
            cfg.park_timeout_micros = parse_var(ENV_PARK_TIMEOUT_MICROS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GC_INTERVAL_MICROS) {
            cfg.gc_interval_micros = parse_var(ENV_GC_INTERVAL_MICROS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_IMPLICIT_READ) {
            cfg.allow_implicit_read = parse_var(ENV_ALLOW_IMPLICIT_READ, &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))
}
