use std::path::PathBuf;

/// Represents all possible errors that can occur in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The state directory could not be created or accessed.
    #[error("failed to prepare state directory {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the temporary state file failed.
    #[error("failed to write state file {path}: {source}")]
    WriteState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rotating or promoting a state file failed.
    #[error("failed to replace state file {path}: {source}")]
    ReplaceState {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state record could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A manual override asked for a tier that is not a sleep tier.
    #[error("cannot force sleep into the {0} tier")]
    InvalidSleepTarget(crate::power::PowerState),
}
