#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power tiers, ordered from fully awake to deepest sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Everything on, full responsiveness.
    Active,
    /// Quiet but watching. Reached after a short stretch without activity.
    Idle,
    /// Display and camera off, presence polling continues.
    LightSleep,
    /// Everything off except the presence sensor.
    DeepSleep,
}

impl PowerState {
    /// Whether this tier counts as asleep. Sleep observers fire on entry
    /// into any tier for which this is true.
    pub fn is_sleep_tier(self) -> bool {
        !matches!(self, PowerState::Active)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerState::Active => "active",
            PowerState::Idle => "idle",
            PowerState::LightSleep => "light_sleep",
            PowerState::DeepSleep => "deep_sleep",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the controller, serializable for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct PowerInfo {
    pub state: PowerState,
    /// Seconds since the last reported activity.
    pub idle_seconds: f64,
    /// Seconds spent in the current tier.
    pub in_state_seconds: f64,
    /// Number of times the device woke from a sleep tier.
    pub wake_count: u64,
    /// Total seconds spent asleep, excluding any sleep still in progress.
    pub total_sleep_seconds: f64,
}
