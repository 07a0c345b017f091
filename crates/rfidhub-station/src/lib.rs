//! Per-station protocol bridge.
//!
//! One [`Station`] exists per connected UI. It sequences each item through
//! scan, backend transaction and tag toggle, keeps tag ids of failed toggles
//! for user-initiated retries, and reports every outcome to the UI.
//!
//! - [`actor`]: the state machine itself, independent of any socket
//! - [`runner`]: reader connect plus the serialized event loop
//! - [`state`]: protocol states
//! - [`barcode`]: scan prefix handling

pub mod actor;
pub mod barcode;
pub mod runner;
pub mod state;

pub use actor::Station;
pub use runner::{run_station, ExitReason, StationContext};
pub use state::{Alarm, Mode, StationState};
