//! Station protocol states.

use std::fmt;

use rfidhub_core::Action;

/// Kind of scan batch in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Checkin,
    Checkout,
}

impl Mode {
    /// UI action that reports items of this batch.
    pub fn action(self) -> Action {
        match self {
            Mode::Checkin => Action::Checkin,
            Mode::Checkout => Action::Checkout,
        }
    }
}

/// Alarm polarity of a tag toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    On,
    Off,
}

/// Protocol state of a station.
///
/// Each state carries the context its device reply needs, so a reply can
/// only be interpreted against the batch and barcode it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StationState {
    #[default]
    Idle,
    /// Begin-scan sent, waiting for the reader to confirm
    AwaitScanStart { mode: Mode },
    /// Reader is scanning; every reply is a scan event
    Scanning { mode: Mode },
    /// Alarm-off sent for `barcode`
    AwaitAlarmOff { mode: Mode, barcode: String },
    /// Alarm-on sent for `barcode`
    AwaitAlarmOn { mode: Mode, barcode: String },
    /// End-scan sent
    AwaitScanEnd,
    /// Tag programming sent
    AwaitWrite { barcode: String },
}

impl StationState {
    pub fn name(&self) -> &'static str {
        match self {
            StationState::Idle => "idle",
            StationState::AwaitScanStart { .. } => "await_scan_start",
            StationState::Scanning { .. } => "scanning",
            StationState::AwaitAlarmOff { .. } => "await_alarm_off",
            StationState::AwaitAlarmOn { .. } => "await_alarm_on",
            StationState::AwaitScanEnd => "await_scan_end",
            StationState::AwaitWrite { .. } => "await_write",
        }
    }

    /// Batch mode while a scan batch is open.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            StationState::AwaitScanStart { mode }
            | StationState::Scanning { mode }
            | StationState::AwaitAlarmOff { mode, .. }
            | StationState::AwaitAlarmOn { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    /// Whether `END` may close the batch from here.
    pub fn accepts_end(&self) -> bool {
        matches!(
            self,
            StationState::Scanning { .. }
                | StationState::AwaitAlarmOff { .. }
                | StationState::AwaitAlarmOn { .. }
        )
    }
}

impl fmt::Display for StationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
