#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema tag written into every serialized record.
pub const STATE_VERSION: &str = "1.0";

/// Highest concern level the companion ever expresses.
pub const MAX_CONCERN: u8 = 10;

/// The single durable record of companion state.
///
/// Field names double as the on-disk JSON keys and stay stable across
/// versions. Decoding tolerates unknown keys and fills missing ones from
/// defaults, so older and newer files both load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    // timestamps
    pub last_hydration_reminder: DateTime<Utc>,
    pub last_movement_reminder: DateTime<Utc>,
    /// Last time a person was detected.
    pub last_seen: DateTime<Utc>,
    /// When the current session started.
    pub started_at: DateTime<Utc>,

    // mood
    pub current_mood: String,
    /// How worried the companion is, `0..=MAX_CONCERN`.
    pub concern_level: u8,
    pub is_sleeping: bool,

    // activity accumulators
    pub sitting_start: Option<DateTime<Utc>>,
    pub total_sitting_seconds: f64,
    pub total_standing_seconds: f64,
    pub total_moving_seconds: f64,

    // daily counters, zeroed once per calendar day
    pub reminders_sent_today: u32,
    pub hydration_count_today: u32,
    pub movement_count_today: u32,
    pub last_stats_reset: DateTime<Utc>,

    // persistence metadata, owned by the store
    pub version: String,
    pub last_save: Option<DateTime<Utc>>,
    /// True only in a record written by an orderly shutdown. A loaded
    /// record with this unset means the previous session crashed.
    pub clean_shutdown: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            last_hydration_reminder: now,
            last_movement_reminder: now,
            last_seen: now,
            started_at: now,
            current_mood: "content".to_owned(),
            concern_level: 0,
            is_sleeping: false,
            sitting_start: None,
            total_sitting_seconds: 0.0,
            total_standing_seconds: 0.0,
            total_moving_seconds: 0.0,
            reminders_sent_today: 0,
            hydration_count_today: 0,
            movement_count_today: 0,
            last_stats_reset: now,
            version: STATE_VERSION.to_owned(),
            last_save: None,
            clean_shutdown: false,
        }
    }
}

impl DeviceState {
    /// Raises the concern level by one step, saturating at [`MAX_CONCERN`].
    pub fn escalate_concern(&mut self) {
        self.concern_level = self.concern_level.saturating_add(1).min(MAX_CONCERN);
    }

    /// Lowers the concern level by one step, saturating at zero.
    pub fn ease_concern(&mut self) {
        self.concern_level = self.concern_level.saturating_sub(1);
    }

    /// Clamps values back into their documented ranges. Applied after
    /// decoding a file and after every mutation.
    pub fn normalize(&mut self) {
        self.concern_level = self.concern_level.min(MAX_CONCERN);
        self.total_sitting_seconds = self.total_sitting_seconds.max(0.0);
        self.total_standing_seconds = self.total_standing_seconds.max(0.0);
        self.total_moving_seconds = self.total_moving_seconds.max(0.0);
    }

    /// Zeroes the per-day counters and stamps the reset time.
    pub fn reset_daily_stats(&mut self, now: DateTime<Utc>) {
        self.reminders_sent_today = 0;
        self.hydration_count_today = 0;
        self.movement_count_today = 0;
        self.last_stats_reset = now;
    }
}
