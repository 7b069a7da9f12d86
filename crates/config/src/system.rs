#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct System {
    /// Directory holding the state file and its backup.
    pub data_dir: PathBuf,
}

impl Default for System {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/sedum"),
        }
    }
}
