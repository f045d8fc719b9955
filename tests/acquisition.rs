//! End-to-end acquisition tests against an in-memory radio double: scan,
//! classify, connect, relay readings and stop, without bluetooth hardware.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::{sleep, timeout};

use trainer_link::config::types::{Config, RetryConfig};
use trainer_link::device::backend::{DeviceDiscovery, SensorSession, SensorTransport};
use trainer_link::device::coordinator::Coordinator;
use trainer_link::device::types::{
    AcquisitionEvent, DeviceCategory, DiscoveredDevice, SensorReading, StatusEvent,
};
use trainer_link::error::ConnectError;

/// Radio double. Every sweep observes the same advertised "air"; connection
/// attempts succeed unless the address is on the refuse list, and a session
/// replays the payloads configured for its address, then stays up.
#[derive(Clone, Default)]
struct FakeRadio {
    air: Arc<Mutex<Vec<DiscoveredDevice>>>,
    sweeps: Arc<[AtomicU32; 2]>,
    opened: Arc<Mutex<Vec<String>>>,
    refuse: Arc<Mutex<HashSet<String>>>,
    payloads: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
}

impl FakeRadio {
    fn advertise(&self, name: &str, address: &str) {
        self.air.lock().unwrap().push(DiscoveredDevice {
            name: name.to_string(),
            address: address.to_string(),
        });
    }

    fn refuse(&self, address: &str) {
        self.refuse.lock().unwrap().insert(address.to_string());
    }

    fn set_payloads(&self, address: &str, payloads: Vec<Vec<u8>>) {
        self.payloads.lock().unwrap().insert(address.to_string(), payloads);
    }

    fn sweep_count(&self, category: DeviceCategory) -> u32 {
        let index = match category {
            DeviceCategory::HeartRate => 0,
            DeviceCategory::PowerSource => 1,
        };
        self.sweeps[index].load(Ordering::SeqCst)
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl DeviceDiscovery for FakeRadio {
    fn sweep(
        &self,
        category: DeviceCategory,
    ) -> BoxFuture<'_, Result<Vec<DiscoveredDevice>, trainer_link::error::ScanError>> {
        async move {
            let index = match category {
                DeviceCategory::HeartRate => 0,
                DeviceCategory::PowerSource => 1,
            };
            self.sweeps[index].fetch_add(1, Ordering::SeqCst);
            Ok(self.air.lock().unwrap().clone())
        }
        .boxed()
    }
}

impl SensorTransport for FakeRadio {
    type Session = FakeSession;

    fn open<'a>(
        &'a self,
        _category: DeviceCategory,
        address: &'a str,
    ) -> BoxFuture<'a, Result<FakeSession, ConnectError>> {
        async move {
            self.opened.lock().unwrap().push(address.to_string());

            if self.refuse.lock().unwrap().contains(address) {
                return Err(ConnectError::NotConnected);
            }

            let payloads = self
                .payloads
                .lock()
                .unwrap()
                .get(address)
                .cloned()
                .unwrap_or_default();
            Ok(FakeSession { payloads: Some(payloads) })
        }
        .boxed()
    }
}

struct FakeSession {
    payloads: Option<Vec<Vec<u8>>>,
}

impl SensorSession for FakeSession {
    type Notifications = BoxStream<'static, Vec<u8>>;

    fn subscribe(&mut self) -> BoxFuture<'_, Result<Self::Notifications, ConnectError>> {
        let payloads = self.payloads.take().unwrap_or_default();
        async move {
            // replay the script, then keep the link up
            Ok(stream::iter(payloads).chain(stream::pending()).boxed())
        }
        .boxed()
    }

    fn is_connected(&mut self) -> BoxFuture<'_, Result<bool, ConnectError>> {
        async move { Ok(true) }.boxed()
    }
}

fn test_config(max_attempts: Option<u32>) -> Config {
    Config {
        sweep_delay_ms: 5,
        pause_poll_ms: 5,
        retry: RetryConfig { max_attempts, backoff_ms: 5 },
        ..Config::default()
    }
}

async fn next_event(
    events: &mut futures::channel::mpsc::Receiver<AcquisitionEvent>,
) -> AcquisitionEvent {
    timeout(Duration::from_secs(5), events.next())
        .await
        .expect("timed out waiting for event")
        .expect("event feed closed")
}

async fn next_status(
    events: &mut futures::channel::mpsc::Receiver<AcquisitionEvent>,
) -> StatusEvent {
    loop {
        if let AcquisitionEvent::Status(status) = next_event(events).await {
            return status;
        }
    }
}

async fn next_reading(
    events: &mut futures::channel::mpsc::Receiver<AcquisitionEvent>,
    category: DeviceCategory,
) -> SensorReading {
    loop {
        if let AcquisitionEvent::Reading { category: got, reading } = next_event(events).await {
            if got == category {
                return reading;
            }
        }
    }
}

#[tokio::test]
async fn heart_rate_acquisition_end_to_end() {
    let radio = FakeRadio::default();
    radio.advertise("Polar H7", "AA:BB");
    radio.advertise("Unrelated Speaker", "99:99");
    radio.set_payloads("AA:BB", vec![vec![0x00, 60], vec![0x00, 61]]);

    let mut coordinator =
        Coordinator::new(radio.clone(), radio.clone(), &test_config(None));
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    handle.start_acquisition(DeviceCategory::HeartRate).await.unwrap();

    let status = next_status(&mut events).await;
    assert!(status.connected);
    assert_eq!(status.category, DeviceCategory::HeartRate);
    assert_eq!(status.name, "Polar H7");
    assert_eq!(status.address, "AA:BB");

    assert_eq!(
        next_reading(&mut events, DeviceCategory::HeartRate).await,
        SensorReading::HeartRate { bpm: 60 }
    );
    assert_eq!(
        next_reading(&mut events, DeviceCategory::HeartRate).await,
        SensorReading::HeartRate { bpm: 61 }
    );

    // discovery stays paused while the sensor is acquired
    sleep(Duration::from_millis(50)).await;
    let frozen = radio.sweep_count(DeviceCategory::HeartRate);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(radio.sweep_count(DeviceCategory::HeartRate), frozen);

    // the non-matching advertisement was never touched
    assert_eq!(radio.opened(), vec!["AA:BB".to_string()]);

    handle.stop_all().await.unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn first_discovered_candidate_wins() {
    let radio = FakeRadio::default();
    radio.advertise("Polar H7", "AA:BB");
    radio.advertise("Polar H10", "CC:DD");
    radio.set_payloads("AA:BB", vec![vec![0x00, 70]]);
    radio.set_payloads("CC:DD", vec![vec![0x00, 99]]);

    let mut coordinator =
        Coordinator::new(radio.clone(), radio.clone(), &test_config(None));
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    handle.start_acquisition(DeviceCategory::HeartRate).await.unwrap();

    let status = next_status(&mut events).await;
    assert!(status.connected);
    assert_eq!(status.address, "AA:BB");
    assert_eq!(
        next_reading(&mut events, DeviceCategory::HeartRate).await,
        SensorReading::HeartRate { bpm: 70 }
    );

    sleep(Duration::from_millis(50)).await;
    assert_eq!(radio.opened(), vec!["AA:BB".to_string()]);

    handle.stop_all().await.unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_category_keeps_scanning_while_the_other_is_acquired() {
    let radio = FakeRadio::default();
    radio.advertise("Polar H7", "AA:BB");
    radio.advertise("Think X Trainer", "CC:DD");
    radio.refuse("AA:BB");
    radio.set_payloads(
        "CC:DD",
        vec![vec![0x00, 0x00, 0xE8, 0x00, 0x3C, 0x00]],
    );

    let mut coordinator =
        Coordinator::new(radio.clone(), radio.clone(), &test_config(None));
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    handle.start_acquisition(DeviceCategory::HeartRate).await.unwrap();
    handle.start_acquisition(DeviceCategory::PowerSource).await.unwrap();

    loop {
        let status = next_status(&mut events).await;
        if status.category == DeviceCategory::PowerSource && status.connected {
            assert_eq!(status.address, "CC:DD");
            break;
        }
        // heart rate keeps failing against the refused device
        assert_eq!(status.category, DeviceCategory::HeartRate);
        assert!(!status.connected);
    }

    assert_eq!(
        next_reading(&mut events, DeviceCategory::PowerSource).await,
        SensorReading::PowerCadence { power_watts: 232, cadence_rpm: 60 }
    );

    // the acquired category stops sweeping; the failing one does not
    sleep(Duration::from_millis(50)).await;
    let power_frozen = radio.sweep_count(DeviceCategory::PowerSource);
    let heart_before = radio.sweep_count(DeviceCategory::HeartRate);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(radio.sweep_count(DeviceCategory::PowerSource), power_frozen);
    assert!(radio.sweep_count(DeviceCategory::HeartRate) > heart_before);

    handle.stop_all().await.unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_all_halts_scanning_and_sessions() {
    let radio = FakeRadio::default();
    radio.advertise("Polar H7", "AA:BB");
    radio.set_payloads("AA:BB", vec![vec![0x00, 80]]);

    let mut coordinator =
        Coordinator::new(radio.clone(), radio.clone(), &test_config(None));
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    handle.start_acquisition(DeviceCategory::HeartRate).await.unwrap();
    handle.start_acquisition(DeviceCategory::PowerSource).await.unwrap();

    let status = next_status(&mut events).await;
    assert!(status.connected);

    handle.stop_all().await.unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

    // scanners wind down; after a grace period nothing sweeps anymore
    sleep(Duration::from_millis(50)).await;
    let heart = radio.sweep_count(DeviceCategory::HeartRate);
    let power = radio.sweep_count(DeviceCategory::PowerSource);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(radio.sweep_count(DeviceCategory::HeartRate), heart);
    assert_eq!(radio.sweep_count(DeviceCategory::PowerSource), power);

    // the event feed drains its buffer and then ends
    loop {
        if timeout(Duration::from_secs(5), events.next()).await.unwrap().is_none() {
            break;
        }
    }
}

#[tokio::test]
async fn dropped_handles_stop_the_coordinator() {
    let radio = FakeRadio::default();

    let mut coordinator =
        Coordinator::new(radio.clone(), radio.clone(), &test_config(None));
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    handle.start_acquisition(DeviceCategory::HeartRate).await.unwrap();
    drop(handle);

    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
