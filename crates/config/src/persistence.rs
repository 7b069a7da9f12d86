#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Persistence {
    /// Interval between background saves. Zero disables the auto-save task.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub autosave_interval: Duration,

    /// Persist the record as part of every sleep/wake transition.
    pub save_on_transition: bool,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(60),
            save_on_transition: true,
        }
    }
}
