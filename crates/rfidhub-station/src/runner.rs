//! Station run loop.
//!
//! Connects the station's reader, then serializes UI messages and reader
//! events into the [`Station`] actor until the station terminates, the UI
//! goes away or the registry asks it to stop.

use std::sync::Arc;

use rfidhub_core::{Action, Circulation, DeviceConfig, Message, StationConfig};
use rfidhub_devices::{DeviceLink, DeviceReader, TcpDeviceWriter};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::actor::Station;

/// Everything a station needs besides its channels.
#[derive(Clone)]
pub struct StationContext {
    /// Station IP, used to reach its reader
    pub ip: String,
    pub device: DeviceConfig,
    pub station: StationConfig,
    pub circulation: Arc<dyn Circulation>,
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Reader link failure or unrecoverable backend error
    Terminated,
    /// The UI inbox closed
    UiClosed,
    /// The registry asked the station to stop
    Stopped,
}

/// Run one station to completion.
///
/// UI messages that arrive while the reader is still connecting wait in
/// `inbox`. Dropping `ui` on return closes the UI connection.
pub async fn run_station(
    ctx: StationContext,
    mut inbox: mpsc::UnboundedReceiver<Message>,
    ui: mpsc::UnboundedSender<Message>,
    mut shutdown: watch::Receiver<bool>,
) -> ExitReason {
    let ip = ctx.ip.clone();

    let connected = tokio::select! {
        result = connect(&ctx) => result,
        _ = shutdown.changed() => return ExitReason::Stopped,
    };
    let (writer, reader) = match connected {
        Ok(link) => link,
        Err(e) => {
            error!(station = %ip, error = %e, "RFID reader connect failed");
            let _ = ui.send(Message::rfid_error(Action::Connect, e.to_string()));
            return ExitReason::Terminated;
        }
    };
    info!(station = %ip, "RFID reader connected and initialized");
    let _ = ui.send(Message::new(Action::Connect));

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let reader_task = reader.spawn(events_tx);
    let mut station = Station::new(ip.clone(), writer, ctx.circulation, ui, ctx.station);

    let reason = loop {
        tokio::select! {
            msg = inbox.recv() => match msg {
                Some(msg) => station.handle_ui(msg).await,
                None => break ExitReason::UiClosed,
            },
            event = events.recv() => match event {
                Some(event) => station.handle_device(event).await,
                None => break ExitReason::Terminated,
            },
            _ = shutdown.changed() => break ExitReason::Stopped,
        }
        if station.is_terminated() {
            break ExitReason::Terminated;
        }
    };

    reader_task.abort();
    drop(station);
    info!(station = %ip, ?reason, "Station stopped");
    reason
}

async fn connect(
    ctx: &StationContext,
) -> Result<(TcpDeviceWriter, DeviceReader), rfidhub_devices::DeviceError> {
    let addr = if ctx.ip.contains(':') {
        format!("[{}]:{}", ctx.ip, ctx.device.port)
    } else {
        format!("{}:{}", ctx.ip, ctx.device.port)
    };
    DeviceLink::connect(
        &addr,
        ctx.device.connect_timeout(),
        ctx.device.handshake_timeout(),
    )
    .await
}
