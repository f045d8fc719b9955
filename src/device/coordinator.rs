use futures::channel::mpsc::{self, Receiver, Sender};
use futures::{future, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::spawn;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::backend::{DeviceDiscovery, SensorTransport};
use crate::device::classify::Classifier;
use crate::device::connector::Connector;
use crate::device::constants::EVENT_CHANNEL_CAPACITY;
use crate::device::scanner::{ScanControl, Scanner};
use crate::device::types::{
    AcquisitionEvent, DeviceCategory, DiscoveredDevice, LogLevel, LogLine, RetryPolicy,
    ScanState, ScanTiming, SessionStatus, StatusEvent, Update,
};
use crate::error::CoordinatorClosed;

#[derive(Debug, Clone, Copy)]
enum Command {
    Start(DeviceCategory),
    Pause(DeviceCategory),
    Resume(DeviceCategory),
    StopAll,
}

/// Cloneable control surface into a running coordinator task.
#[derive(Debug, Clone)]
pub struct AcquisitionHandle {
    commands: Sender<Command>,
}

impl AcquisitionHandle {
    pub async fn start_acquisition(
        &self,
        category: DeviceCategory,
    ) -> Result<(), CoordinatorClosed> {
        self.send(Command::Start(category)).await
    }

    pub async fn pause_category(&self, category: DeviceCategory) -> Result<(), CoordinatorClosed> {
        self.send(Command::Pause(category)).await
    }

    pub async fn resume_category(&self, category: DeviceCategory) -> Result<(), CoordinatorClosed> {
        self.send(Command::Resume(category)).await
    }

    pub async fn stop_all(&self) -> Result<(), CoordinatorClosed> {
        self.send(Command::StopAll).await
    }

    async fn send(&self, command: Command) -> Result<(), CoordinatorClosed> {
        self.commands
            .clone()
            .send(command)
            .await
            .map_err(|_| CoordinatorClosed)
    }
}

enum Input {
    Command(Command),
    Update(Update),
}

struct ConnectorHandle {
    cancel: CancellationToken,
    address: String,
}

/// Per-category ownership: at most one scanner and one connector at a time.
struct Slot {
    scan: Option<ScanControl>,
    connector: Option<ConnectorHandle>,
    acquired: bool,
}

impl Slot {
    fn new() -> Self {
        Slot { scan: None, connector: None, acquired: false }
    }
}

/// Orchestrates scanners and connectors: a scan batch pauses that category's
/// scanner and hands the first candidate to a connector; connector failure
/// resumes scanning; connector success freezes the category for the session.
/// All cross-component coordination runs through this task, scanners and
/// connectors never reference each other.
pub struct Coordinator<D, T>
where
    D: DeviceDiscovery + Clone,
    T: SensorTransport + Clone,
{
    state: State<D, T>,
    updates_rx: Receiver<Update>,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
}

impl<D, T> Coordinator<D, T>
where
    D: DeviceDiscovery + Clone,
    T: SensorTransport + Clone,
{
    pub fn new(discovery: D, transport: T, config: &Config) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(16);

        Coordinator {
            state: State {
                discovery,
                transport,
                classifier: config.classifier(),
                timing: config.scan_timing(),
                retry: config.retry_policy(),
                slots: [Slot::new(), Slot::new()],
                subscribers: Vec::new(),
                updates_tx,
            },
            updates_rx,
            commands_tx,
            commands_rx,
        }
    }

    pub fn handle(&self) -> AcquisitionHandle {
        AcquisitionHandle { commands: self.commands_tx.clone() }
    }

    /// Registers a bounded feed of status, reading and log events. A slow
    /// subscriber has events dropped rather than stalling acquisition; a
    /// dropped receiver unsubscribes itself.
    pub fn subscribe(&mut self) -> Receiver<AcquisitionEvent> {
        self.state.subscribe()
    }

    /// Processes commands and component updates until `stop_all` (or the last
    /// handle being dropped) halts acquisition.
    pub async fn run(self) {
        let Coordinator { mut state, updates_rx, commands_tx, commands_rx } = self;
        // once this clone is gone, all handles dropping ends the command stream
        drop(commands_tx);

        let commands = commands_rx
            .map(Input::Command)
            .chain(futures::stream::once(future::ready(Input::Command(
                Command::StopAll,
            ))));
        let mut inputs = futures::stream::select(commands, updates_rx.map(Input::Update));

        while let Some(input) = inputs.next().await {
            match input {
                Input::Command(Command::StopAll) => {
                    state.stop_all();
                    break;
                }
                Input::Command(command) => state.handle_command(command),
                Input::Update(update) => state.handle_update(update),
            }
        }
    }
}

struct State<D, T>
where
    D: DeviceDiscovery + Clone,
    T: SensorTransport + Clone,
{
    discovery: D,
    transport: T,
    classifier: Classifier,
    timing: ScanTiming,
    retry: RetryPolicy,
    slots: [Slot; 2],
    subscribers: Vec<Sender<AcquisitionEvent>>,
    updates_tx: Sender<Update>,
}

impl<D, T> State<D, T>
where
    D: DeviceDiscovery + Clone,
    T: SensorTransport + Clone,
{
    fn subscribe(&mut self) -> Receiver<AcquisitionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(category) => self.start_category(category),
            Command::Pause(category) => {
                if let Some(scan) = &self.slots[category.index()].scan {
                    scan.pause();
                }
                self.log(LogLevel::Info, format!("Paused {} scanning", category));
            }
            Command::Resume(category) => {
                if let Some(scan) = &self.slots[category.index()].scan {
                    scan.resume();
                }
                self.log(LogLevel::Info, format!("Resumed {} scanning", category));
            }
            Command::StopAll => self.stop_all(),
        }
    }

    fn start_category(&mut self, category: DeviceCategory) {
        match self.slots[category.index()].scan.as_ref().map(ScanControl::state) {
            Some(ScanState::Scanning) | Some(ScanState::Paused) => {
                debug!("Scanner for {} is already running", category);
                return;
            }
            Some(ScanState::Idle) => {
                if let Some(scan) = &self.slots[category.index()].scan {
                    scan.start();
                }
                return;
            }
            Some(ScanState::Stopped) | None => {}
        }

        self.log(LogLevel::Info, format!("Scanning for {} devices...", category));

        let control = ScanControl::new();
        control.start();
        let scanner = Scanner::new(
            category,
            self.discovery.clone(),
            self.classifier.clone(),
            self.timing,
            control.clone(),
            self.updates_tx.clone(),
        );
        spawn(scanner.run());
        self.slots[category.index()].scan = Some(control);
    }

    fn handle_update(&mut self, update: Update) {
        match update {
            Update::ScanBatch { category, devices } => self.handle_batch(category, devices),
            Update::Session { category, device, status } => {
                self.handle_session(category, device, status)
            }
            Update::Reading { category, reading } => {
                self.emit(AcquisitionEvent::Reading { category, reading });
            }
            Update::ConnectorDone { category, address } => {
                let slot = &mut self.slots[category.index()];
                if slot.connector.as_ref().map(|handle| handle.address == address) == Some(true) {
                    slot.connector = None;
                }
            }
        }
    }

    fn handle_batch(&mut self, category: DeviceCategory, devices: Vec<DiscoveredDevice>) {
        if self.slots[category.index()].acquired {
            debug!("Ignoring scan batch for {}: already acquired", category);
            return;
        }

        // first candidate in discovery order wins; the rest of the batch is discarded
        let Some(device) = devices.into_iter().next() else {
            return;
        };

        {
            let slot = &mut self.slots[category.index()];
            if let Some(handle) = &slot.connector {
                if handle.address == device.address {
                    // the live connector keeps retrying this device on its own
                    debug!("Connector for {} is already working {}", category, device.address);
                    return;
                }
            }
            // the scanner must be paused before its connector starts, so a
            // second candidate of the same category can never race this one
            if let Some(scan) = &slot.scan {
                scan.pause();
            }
            if let Some(stale) = slot.connector.take() {
                stale.cancel.cancel();
            }
        }

        self.log(
            LogLevel::Info,
            format!("Auto-connecting to {} ({})...", device.name, device.address),
        );

        let cancel = CancellationToken::new();
        self.slots[category.index()].connector = Some(ConnectorHandle {
            cancel: cancel.clone(),
            address: device.address.clone(),
        });
        let connector = Connector::new(
            category,
            device,
            self.transport.clone(),
            self.retry,
            cancel,
            self.updates_tx.clone(),
        );
        spawn(connector.run());
    }

    fn handle_session(
        &mut self,
        category: DeviceCategory,
        device: DiscoveredDevice,
        status: SessionStatus,
    ) {
        // a replaced connector may still flush its final reports; only the
        // device currently associated with the category may change its state
        if let Some(handle) = &self.slots[category.index()].connector {
            if handle.address != device.address {
                debug!("Ignoring stale session update from {}", device.address);
                return;
            }
        }

        match status {
            SessionStatus::Connecting => {
                self.log(
                    LogLevel::Info,
                    format!("Connecting to {} ({})...", device.name, device.address),
                );
            }
            SessionStatus::Connected => {
                self.slots[category.index()].acquired = true;
                // one sensor of each kind per session: discovery stays paused
                if let Some(scan) = &self.slots[category.index()].scan {
                    scan.pause();
                }
                self.log(LogLevel::Info, format!("{} connected", device.name));
                self.emit(AcquisitionEvent::Status(StatusEvent {
                    category,
                    name: device.name,
                    address: device.address,
                    connected: true,
                }));
            }
            SessionStatus::Disconnected | SessionStatus::Failed => {
                self.slots[category.index()].acquired = false;
                let message = match status {
                    SessionStatus::Failed => {
                        format!("Failed to connect to {}; scanning continues", device.name)
                    }
                    _ => format!("Lost connection to {}", device.name),
                };
                self.log(LogLevel::Warning, message);
                self.emit(AcquisitionEvent::Status(StatusEvent {
                    category,
                    name: device.name,
                    address: device.address,
                    connected: false,
                }));
                if let Some(scan) = &self.slots[category.index()].scan {
                    scan.resume();
                }
            }
        }
    }

    fn stop_all(&mut self) {
        self.log(LogLevel::Info, "Stopping acquisition".to_string());

        for slot in &mut self.slots {
            if let Some(scan) = slot.scan.take() {
                scan.stop();
            }
            if let Some(connector) = slot.connector.take() {
                connector.cancel.cancel();
            }
            slot.acquired = false;
        }
    }

    fn emit(&mut self, event: AcquisitionEvent) {
        self.subscribers.retain_mut(|subscriber| {
            match subscriber.try_send(event.clone()) {
                Ok(()) => true,
                Err(err) if err.is_full() => {
                    debug!("Subscriber queue is full; dropping event");
                    true
                }
                Err(_) => false,
            }
        });
    }

    fn log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.emit(AcquisitionEvent::Log(LogLine { level, message }));
    }
}
