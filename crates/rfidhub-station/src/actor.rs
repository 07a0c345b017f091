//! The per-station actor.
//!
//! [`Station`] owns the protocol state, the in-flight transaction context and
//! the retry maps of one station. It is driven one event at a time by the run
//! loop in [`crate::runner`], so none of its state needs locking.
//!
//! Reader replies carry no correlation id. The actor therefore keeps at most
//! one command in flight and interprets every reply against its current
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use rfidhub_core::{Action, BackendFailurePolicy, Circulation, Item, Message, StationConfig};
use rfidhub_devices::{DeviceCommand, DeviceError, DeviceEvent, DeviceResponse, DeviceWriter, TagId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::barcode;
use crate::state::{Alarm, Mode, StationState};

/// State machine bridging the UI, the reader and the backend for one station.
pub struct Station<W> {
    ip: String,
    state: StationState,
    /// Branch of the open checkin batch
    branch: String,
    /// Most recent backend result
    current: Option<Item>,
    /// Item context per normalized barcode, kept until its tag toggle succeeds
    pending: HashMap<String, Message>,
    /// Tags whose alarm must still be turned on, per normalized barcode
    failed_alarm_on: HashMap<String, Option<TagId>>,
    /// Tags whose alarm must still be turned off, per normalized barcode
    failed_alarm_off: HashMap<String, Option<TagId>>,
    /// Name of the command awaiting its reply
    in_flight: Option<&'static str>,
    /// END received while a toggle was in flight, sent once its reply lands
    end_requested: bool,
    circulation: Arc<dyn Circulation>,
    device: W,
    ui: mpsc::UnboundedSender<Message>,
    config: StationConfig,
    terminated: bool,
}

impl<W: DeviceWriter> Station<W> {
    pub fn new(
        ip: impl Into<String>,
        device: W,
        circulation: Arc<dyn Circulation>,
        ui: mpsc::UnboundedSender<Message>,
        config: StationConfig,
    ) -> Self {
        Self {
            ip: ip.into(),
            state: StationState::Idle,
            branch: String::new(),
            current: None,
            pending: HashMap::new(),
            failed_alarm_on: HashMap::new(),
            failed_alarm_off: HashMap::new(),
            in_flight: None,
            end_requested: false,
            circulation,
            device,
            ui,
            config,
            terminated: false,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn current(&self) -> Option<&Item> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> &HashMap<String, Message> {
        &self.pending
    }

    pub fn failed_alarm_on(&self) -> &HashMap<String, Option<TagId>> {
        &self.failed_alarm_on
    }

    pub fn failed_alarm_off(&self) -> &HashMap<String, Option<TagId>> {
        &self.failed_alarm_off
    }

    /// Command awaiting its reply, if any.
    pub fn in_flight(&self) -> Option<&'static str> {
        self.in_flight
    }

    /// Whether an END is waiting for the in-flight toggle to finish.
    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    /// Whether the station hit an unrecoverable error and must shut down.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    // ========================================================================
    // UI side
    // ========================================================================

    /// Process one message from the UI.
    pub async fn handle_ui(&mut self, msg: Message) {
        if self.terminated {
            return;
        }
        debug!(station = %self.ip, action = %msg.action, state = %self.state, "UI message");

        match msg.action {
            Action::Checkin => self.begin_batch(Mode::Checkin, msg).await,
            Action::Checkout => self.begin_batch(Mode::Checkout, msg).await,
            Action::End => self.end_batch().await,
            Action::RetryAlarmOn => self.retry_alarm(Alarm::On, msg).await,
            Action::RetryAlarmOff => self.retry_alarm(Alarm::Off, msg).await,
            Action::ItemInfo => self.item_info(msg).await,
            Action::Write => self.write_tag(msg).await,
            Action::Connect => self.ignore(Action::Connect),
        }
    }

    fn ignore(&self, action: Action) {
        debug!(
            station = %self.ip,
            action = %action,
            state = %self.state,
            in_flight = self.in_flight.unwrap_or("-"),
            "Action not accepted now, ignored"
        );
    }

    async fn begin_batch(&mut self, mode: Mode, msg: Message) {
        if self.state != StationState::Idle || self.in_flight.is_some() {
            return self.ignore(msg.action);
        }

        self.device.reset();
        self.branch = msg.branch.unwrap_or_default();
        self.current = None;
        self.pending.clear();
        self.failed_alarm_on.clear();
        self.failed_alarm_off.clear();
        self.end_requested = false;

        if self.send(DeviceCommand::BeginScan).await {
            info!(station = %self.ip, branch = %self.branch, ?mode, "Scan batch started");
            self.state = StationState::AwaitScanStart { mode };
        }
    }

    async fn end_batch(&mut self) {
        if !self.state.accepts_end() {
            return self.ignore(Action::End);
        }
        if let Some(busy) = self.in_flight {
            info!(station = %self.ip, in_flight = busy, "END deferred until the reader replies");
            self.end_requested = true;
            return;
        }
        self.end_requested = false;
        if self.send(DeviceCommand::EndScan).await {
            self.state = StationState::AwaitScanEnd;
        }
    }

    async fn retry_alarm(&mut self, alarm: Alarm, msg: Message) {
        let mode = match &self.state {
            StationState::Scanning { mode }
            | StationState::AwaitAlarmOn { mode, .. }
            | StationState::AwaitAlarmOff { mode, .. } => *mode,
            _ => return self.ignore(msg.action),
        };
        if self.in_flight.is_some() {
            return self.ignore(msg.action);
        }
        let Some(barcode) = msg.barcode().map(str::to_string) else {
            return self.ignore(msg.action);
        };

        let retries = match alarm {
            Alarm::On => &self.failed_alarm_on,
            Alarm::Off => &self.failed_alarm_off,
        };
        let Some(tag) = retries.get(&barcode).cloned() else {
            debug!(station = %self.ip, barcode = %barcode, ?alarm, "Nothing to retry");
            return;
        };

        info!(station = %self.ip, barcode = %barcode, ?alarm, "Retrying alarm toggle");
        self.toggle_alarm(mode, barcode, tag, alarm).await;
    }

    async fn item_info(&mut self, msg: Message) {
        let Some(barcode) = msg.barcode().filter(|b| !b.is_empty()).map(str::to_string) else {
            self.emit(Message::sip_error(
                Action::ItemInfo,
                "ITEM-INFO requires an item barcode",
            ));
            return;
        };

        match self.circulation.item_status(&barcode).await {
            Ok(result) => self.emit(Message::new(Action::ItemInfo).with_item(result.into())),
            Err(e) => {
                warn!(station = %self.ip, barcode = %barcode, error = %e, "Item status lookup failed");
                self.emit(Message::sip_error(Action::ItemInfo, e.message).with_item(bare_item(barcode)));
            }
        }
    }

    async fn write_tag(&mut self, msg: Message) {
        if self.state != StationState::Idle || self.in_flight.is_some() {
            return self.ignore(msg.action);
        }
        let Some(barcode) = msg.barcode().filter(|b| !b.is_empty()).map(str::to_string) else {
            self.emit(Message::rfid_error(Action::Write, "WRITE requires an item barcode"));
            return;
        };

        let command = DeviceCommand::Write {
            barcode: barcode::with_prefix(&barcode),
        };
        if self.send(command).await {
            self.state = StationState::AwaitWrite { barcode };
        }
    }

    // ========================================================================
    // Device side
    // ========================================================================

    /// Process one event from the reader task.
    pub async fn handle_device(&mut self, event: DeviceEvent) {
        if self.terminated {
            return;
        }
        let resp = match event {
            DeviceEvent::Response(resp) => resp,
            DeviceEvent::LinkFailed(e) => return self.link_failed(&e),
        };

        let command = self.in_flight.take();
        let state = std::mem::take(&mut self.state);
        debug!(
            station = %self.ip,
            state = %state,
            command = command.unwrap_or("-"),
            ok = resp.ok,
            "Reader reply"
        );

        // Outside a scan, a frame only means something as the reply to our command
        if command.is_none() && !matches!(state, StationState::Scanning { .. }) {
            debug!(station = %self.ip, state = %state, "No command in flight, frame dropped");
            self.state = state;
            return;
        }

        match state {
            StationState::Idle => {}
            StationState::AwaitScanStart { mode } => {
                if resp.ok {
                    self.state = StationState::Scanning { mode };
                } else {
                    error!(station = %self.ip, "RFID reader failed to start scanning");
                    self.fail(Message::rfid_error(
                        Action::Connect,
                        "RFID reader failed to start scanning",
                    ));
                }
            }
            StationState::Scanning { mode } => self.on_scan(mode, resp).await,
            StationState::AwaitAlarmOn { mode, barcode } => {
                self.on_alarm_reply(mode, barcode, Alarm::On, resp.ok).await
            }
            StationState::AwaitAlarmOff { mode, barcode } => {
                self.on_alarm_reply(mode, barcode, Alarm::Off, resp.ok).await
            }
            StationState::AwaitScanEnd => {
                let msg = if resp.ok {
                    Message::new(Action::End)
                } else {
                    warn!(station = %self.ip, "RFID reader failed to end scanning");
                    Message::rfid_error(Action::End, "RFID reader failed to end scanning")
                };
                info!(station = %self.ip, "Scan batch ended");
                self.emit(msg);
            }
            StationState::AwaitWrite { barcode } => {
                let msg = if resp.ok {
                    Message::new(Action::Write)
                } else {
                    warn!(station = %self.ip, barcode = %barcode, "RFID reader failed to write tag");
                    Message::rfid_error(Action::Write, "RFID reader failed to write tag")
                };
                self.emit(msg.with_item(bare_item(barcode)));
            }
        }
    }

    /// One physical scan event.
    async fn on_scan(&mut self, mode: Mode, resp: DeviceResponse) {
        self.state = StationState::Scanning { mode };

        let raw = resp.barcode.unwrap_or_default();
        let barcode = barcode::normalize(&raw).to_string();
        if barcode.is_empty() {
            warn!(station = %self.ip, ok = resp.ok, "Scan event without a barcode, ignored");
            return;
        }

        match (resp.ok, mode) {
            (true, Mode::Checkin) => self.checkin_item(barcode, resp.tag).await,
            (true, Mode::Checkout) => self.checkout_item(barcode, resp.tag).await,
            (false, _) => self.unreadable_item(mode, barcode, resp.tag).await,
        }
    }

    async fn checkin_item(&mut self, barcode: String, tag: Option<TagId>) {
        match self.circulation.checkin(&self.branch, &barcode).await {
            Ok(result) => {
                let item: Item = result.into();
                // A failed or unknown checkin must not arm the tag
                let alarm = if item.unknown || item.transaction_failed {
                    Alarm::Off
                } else {
                    Alarm::On
                };
                self.record(Mode::Checkin, &barcode, item);
                self.toggle_alarm(Mode::Checkin, barcode, tag, alarm).await;
            }
            Err(e) => {
                warn!(
                    station = %self.ip,
                    barcode = %barcode,
                    error = %e,
                    policy = ?self.config.backend_failure_policy,
                    "Checkin failed"
                );
                self.emit(
                    Message::sip_error(Action::Checkin, e.message)
                        .with_item(bare_item(barcode.clone())),
                );

                match self.config.backend_failure_policy {
                    BackendFailurePolicy::Continue => {}
                    BackendFailurePolicy::Release => {
                        let item = Item {
                            transaction_failed: true,
                            ..bare_item(barcode.clone())
                        };
                        self.record(Mode::Checkin, &barcode, item);
                        self.toggle_alarm(Mode::Checkin, barcode, tag, Alarm::Off)
                            .await;
                    }
                    BackendFailurePolicy::Abort => {
                        if self.send(DeviceCommand::EndScan).await {
                            self.state = StationState::AwaitScanEnd;
                        }
                    }
                }
            }
        }
    }

    async fn checkout_item(&mut self, barcode: String, tag: Option<TagId>) {
        match self.circulation.item_status(&barcode).await {
            Ok(result) => {
                let item: Item = result.into();
                let alarm = if item.unknown { Alarm::On } else { Alarm::Off };
                self.record(Mode::Checkout, &barcode, item);
                self.toggle_alarm(Mode::Checkout, barcode, tag, alarm).await;
            }
            Err(e) => {
                warn!(station = %self.ip, barcode = %barcode, error = %e, "Checkout lookup failed");
                self.emit(Message::sip_error(Action::Checkout, e.message).with_item(bare_item(barcode)));
            }
        }
    }

    /// The reader saw the item but could not read its tag set completely.
    async fn unreadable_item(&mut self, mode: Mode, barcode: String, tag: Option<TagId>) {
        let seen = self.current.as_ref().is_some_and(|c| c.barcode == barcode);
        if !seen {
            // Only needed for a title to display
            match self.circulation.item_status(&barcode).await {
                Ok(result) => self.current = Some(result.into()),
                Err(e) => {
                    error!(station = %self.ip, barcode = %barcode, error = %e, "Item status lookup failed");
                    self.fail(Message::sip_error(Action::Connect, e.message));
                    return;
                }
            }
        }

        let mut item = self.current.clone().unwrap_or_else(|| bare_item(barcode.clone()));
        item.transaction_failed = true;
        self.record(mode, &barcode, item);

        let alarm = match mode {
            Mode::Checkin => Alarm::Off,
            Mode::Checkout => Alarm::On,
        };
        self.toggle_alarm(mode, barcode, tag, alarm).await;
    }

    async fn on_alarm_reply(&mut self, mode: Mode, barcode: String, alarm: Alarm, ok: bool) {
        self.alarm_outcome(mode, barcode, alarm, ok);
        if std::mem::take(&mut self.end_requested) {
            self.end_batch().await;
        }
    }

    fn alarm_outcome(&mut self, mode: Mode, barcode: String, alarm: Alarm, ok: bool) {
        if ok {
            self.failed_alarm_on.remove(&barcode);
            self.failed_alarm_off.remove(&barcode);
            if let Some(msg) = self.pending.remove(&barcode) {
                self.emit(msg);
            }
            self.state = StationState::Scanning { mode };
            return;
        }

        let reason = match alarm {
            Alarm::On => "RFID reader failed to turn the alarm on",
            Alarm::Off => "RFID reader failed to turn the alarm off",
        };
        warn!(station = %self.ip, barcode = %barcode, "{}", reason);

        let item = self
            .pending
            .get(&barcode)
            .and_then(|m| m.item.clone())
            .unwrap_or_else(|| bare_item(barcode.clone()));
        self.emit(Message::rfid_error(mode.action(), reason).with_item(item));

        // The tag id stays in the retry map until a retry succeeds
        self.state = match alarm {
            Alarm::On => StationState::AwaitAlarmOn { mode, barcode },
            Alarm::Off => StationState::AwaitAlarmOff { mode, barcode },
        };
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn record(&mut self, mode: Mode, barcode: &str, item: Item) {
        self.current = Some(item.clone());
        self.pending
            .insert(barcode.to_string(), Message::new(mode.action()).with_item(item));
    }

    /// Store the tag for retry, then send the toggle.
    async fn toggle_alarm(&mut self, mode: Mode, barcode: String, tag: Option<TagId>, alarm: Alarm) {
        let command = match alarm {
            Alarm::On => {
                self.failed_alarm_on.insert(barcode.clone(), tag.clone());
                DeviceCommand::AlarmOn { tag }
            }
            Alarm::Off => {
                self.failed_alarm_off.insert(barcode.clone(), tag.clone());
                DeviceCommand::AlarmOff { tag }
            }
        };

        if self.send(command).await {
            self.state = match alarm {
                Alarm::On => StationState::AwaitAlarmOn { mode, barcode },
                Alarm::Off => StationState::AwaitAlarmOff { mode, barcode },
            };
        }
    }

    /// Send one command. Returns false when nothing was sent.
    async fn send(&mut self, command: DeviceCommand) -> bool {
        if let Some(busy) = self.in_flight {
            error!(
                station = %self.ip,
                command = command.name(),
                in_flight = busy,
                "{}",
                DeviceError::Busy(command.name())
            );
            return false;
        }

        match self.device.send(&command).await {
            Ok(()) => {
                self.in_flight = Some(command.name());
                true
            }
            Err(e) => {
                self.link_failed(&e);
                false
            }
        }
    }

    fn link_failed(&mut self, e: &DeviceError) {
        error!(station = %self.ip, error = %e, "RFID reader link failed");
        self.fail(Message::rfid_error(Action::Connect, e.to_string()));
    }

    /// Report an unrecoverable error once and mark the station for shutdown.
    fn fail(&mut self, msg: Message) {
        if self.terminated {
            return;
        }
        self.emit(msg);
        self.terminated = true;
    }

    fn emit(&self, msg: Message) {
        if self.ui.send(msg).is_err() {
            debug!(station = %self.ip, "UI channel closed, message dropped");
        }
    }
}

fn bare_item(barcode: String) -> Item {
    Item {
        barcode,
        ..Default::default()
    }
}
