//! Durable state and power-tier management for the companion.
//!
//! Two halves share this crate. [`StateStore`] owns the persistent
//! session record and keeps it crash-safe through atomic writes and a
//! one-generation backup. [`PowerController`] tracks activity and walks
//! the device down the sleep tiers, waking it the moment something moves.

#![forbid(unsafe_code)]

mod clock;
mod error;
pub mod power;
pub mod state;
mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use power::{PowerController, PowerInfo, PowerState};
pub use state::{
    DeviceState, FieldUpdateReport, LoadSource, RecoveryInfo, StateStore, MAX_CONCERN,
    STATE_VERSION,
};
