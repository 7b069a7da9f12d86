#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Power {
    /// Whether the power controller runs at all.
    pub enabled: bool,

    /// Inactivity before leaving the active tier.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub idle_timeout: Duration,

    /// Inactivity before light sleep (display and camera off).
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub light_sleep_timeout: Duration,

    /// Inactivity before deep sleep (everything off except the presence sensor).
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub deep_sleep_timeout: Duration,

    /// How often the presence probe is sampled while asleep.
    #[serde_as(as = "serde_with::DurationSecondsWithFrac")]
    pub presence_poll_interval: Duration,

    /// How often idle time is evaluated while active.
    #[serde_as(as = "serde_with::DurationSecondsWithFrac")]
    pub evaluation_interval: Duration,
}

impl Default for Power {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout: Duration::from_secs(5 * 60),
            light_sleep_timeout: Duration::from_secs(15 * 60),
            deep_sleep_timeout: Duration::from_secs(60 * 60),
            presence_poll_interval: Duration::from_secs(1),
            evaluation_interval: Duration::from_secs(5),
        }
    }
}
