use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CpuLevel, GameMode, Player};

/// Session configuration. Every field has a default so a host can send a
/// partial object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub mode: GameMode,
    /// Level of the first CPU (the only one in player-vs-CPU, black in CPU-vs-CPU).
    pub cpu_level: CpuLevel,
    /// Level of the white CPU in CPU-vs-CPU.
    pub cpu2_level: CpuLevel,
    /// Human colour in player-vs-CPU. `None` picks one at random on every restart.
    pub human_color: Option<Player>,
    pub timing: Timing,
    pub retry: RetryPolicy,
}

/// Delays in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timing {
    pub thinking_ms: u64,
    pub thinking_cpu_vs_cpu_ms: u64,
    /// Flip delay per unit of distance from the placed stone.
    pub flip_unit_delay_ms: u64,
    pub flip_duration_ms: u64,
    pub settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            thinking_ms: 1000,
            thinking_cpu_vs_cpu_ms: 800,
            flip_unit_delay_ms: 40,
            flip_duration_ms: 330,
            settle_ms: 300,
        }
    }
}

impl Timing {
    pub fn thinking_time(&self, mode: GameMode) -> Duration {
        match mode {
            GameMode::CpuVsCpu => Duration::from_millis(self.thinking_cpu_vs_cpu_ms),
            _ => Duration::from_millis(self.thinking_ms),
        }
    }
}

/// Model loading retries with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure (1-based): `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}
