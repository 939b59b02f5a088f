//! Timing profiles.
//!
//! A timing level (T1-T5) selects a point on the stealth/speed trade-off.
//! Higher levels probe with shorter timeouts, more concurrent workers and
//! shorter pauses between probes.

use crate::error::{ScanError, ScanResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Concrete probe timing derived from a timing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingProfile {
    /// Timing level, 1 (slowest) to 5 (fastest).
    pub level: u8,
    /// Deadline for a single probe.
    #[serde(rename = "timeout_ms", serialize_with = "as_millis")]
    pub timeout: Duration,
    /// Upper bound on probes in flight at once.
    pub max_workers: usize,
    /// Pause a worker takes before each probe it issues.
    #[serde(rename = "inter_probe_delay_ms", serialize_with = "as_millis")]
    pub inter_probe_delay: Duration,
}

/// Default level when none is requested.
pub const DEFAULT_LEVEL: u8 = 3;

/// (timeout ms, workers, delay ms) for T1..T5.
const TIMING_TABLE: [(u64, usize, u64); 5] = [
    (2000, 20, 50),
    (1200, 50, 20),
    (800, 100, 5),
    (400, 200, 0),
    (200, 500, 0),
];

/// Look up the profile for a timing level.
pub fn resolve(level: u8) -> ScanResult<TimingProfile> {
    let index = usize::from(level)
        .checked_sub(1)
        .filter(|i| *i < TIMING_TABLE.len())
        .ok_or(ScanError::InvalidProfile(level))?;
    let (timeout_ms, max_workers, delay_ms) = TIMING_TABLE[index];

    Ok(TimingProfile {
        level,
        timeout: Duration::from_millis(timeout_ms),
        max_workers,
        inter_probe_delay: Duration::from_millis(delay_ms),
    })
}

impl TimingProfile {
    /// Every built-in profile, T1 first.
    pub fn all() -> impl Iterator<Item = TimingProfile> {
        (1..=TIMING_TABLE.len() as u8).filter_map(|level| resolve(level).ok())
    }

    /// Replace the worker count, keeping the rest of the profile.
    pub fn with_max_workers(mut self, workers: usize) -> ScanResult<Self> {
        if workers == 0 {
            return Err(ScanError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        self.max_workers = workers;
        Ok(self)
    }

    /// Short human name for the level.
    pub fn name(&self) -> &'static str {
        match self.level {
            1 => "sneaky",
            2 => "polite",
            3 => "normal",
            4 => "aggressive",
            _ => "insane",
        }
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        let (timeout_ms, max_workers, delay_ms) = TIMING_TABLE[usize::from(DEFAULT_LEVEL) - 1];
        Self {
            level: DEFAULT_LEVEL,
            timeout: Duration::from_millis(timeout_ms),
            max_workers,
            inter_probe_delay: Duration::from_millis(delay_ms),
        }
    }
}

impl fmt::Display for TimingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{} ({}): timeout {}ms, {} workers, {}ms delay",
            self.level,
            self.name(),
            self.timeout.as_millis(),
            self.max_workers,
            self.inter_probe_delay.as_millis()
        )
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
