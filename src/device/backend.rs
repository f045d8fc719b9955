use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::device::constants::SWEEP_DURATION;
use crate::device::types::{DeviceCategory, DiscoveredDevice};
use crate::error::{ConnectError, ScanError};

/// Performs one bounded discovery sweep. The category is advisory: the
/// production radio scans unfiltered (name classification happens afterwards),
/// test doubles key their scripts on it.
pub trait DeviceDiscovery: Send + Sync + 'static {
    fn sweep(
        &self,
        category: DeviceCategory,
    ) -> BoxFuture<'_, Result<Vec<DiscoveredDevice>, ScanError>>;
}

/// Opens a connection to one device and locates the characteristic relevant to
/// the category. Liveness is verified before `open` returns; subscription
/// happens afterwards, on the session.
pub trait SensorTransport: Send + Sync + 'static {
    type Session: SensorSession;

    fn open<'a>(
        &'a self,
        category: DeviceCategory,
        address: &'a str,
    ) -> BoxFuture<'a, Result<Self::Session, ConnectError>>;
}

/// One live connection. The notification stream ending means the link dropped.
pub trait SensorSession: Send + 'static {
    type Notifications: Stream<Item = Vec<u8>> + Send + Unpin;

    fn subscribe(&mut self) -> BoxFuture<'_, Result<Self::Notifications, ConnectError>>;

    fn is_connected(&mut self) -> BoxFuture<'_, Result<bool, ConnectError>>;
}

/// The real radio: btleplug discovery and transport over the first available
/// adapter. Clones share the adapter and the sweep lock.
#[derive(Clone)]
pub struct BleRadio {
    adapter: Adapter,
    // one physical radio serves both categories, so sweeps are serialized
    sweep_lock: Arc<Mutex<()>>,
}

impl BleRadio {
    pub async fn new() -> Result<Self, ScanError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters.into_iter().next().ok_or(ScanError::NoAdapter)?;

        info!(
            "Using bluetooth adapter {}",
            adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string())
        );

        Ok(BleRadio { adapter, sweep_lock: Arc::new(Mutex::new(())) })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, ConnectError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string() == address {
                return Ok(peripheral);
            }
        }

        Err(ConnectError::DeviceNotFound { address: address.to_string() })
    }
}

impl DeviceDiscovery for BleRadio {
    fn sweep(
        &self,
        category: DeviceCategory,
    ) -> BoxFuture<'_, Result<Vec<DiscoveredDevice>, ScanError>> {
        async move {
            let _sweep = self.sweep_lock.lock().await;

            info!("Searching for {} devices...", category);
            self.adapter.start_scan(ScanFilter::default()).await?;
            sleep(Duration::from_millis(SWEEP_DURATION)).await;
            self.adapter.stop_scan().await?;

            let mut found = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                match peripheral.properties().await {
                    Err(err) => {
                        warn!("Could not query peripheral for properties: {:?}", err);
                    }
                    Ok(None) => {}
                    Ok(Some(properties)) => {
                        if let Some(name) = properties.local_name {
                            found.push(DiscoveredDevice {
                                name,
                                address: peripheral.address().to_string(),
                            });
                        }
                    }
                }
            }

            Ok(found)
        }
        .boxed()
    }
}

impl SensorTransport for BleRadio {
    type Session = BleSession;

    fn open<'a>(
        &'a self,
        category: DeviceCategory,
        address: &'a str,
    ) -> BoxFuture<'a, Result<BleSession, ConnectError>> {
        async move {
            let peripheral = self.find_peripheral(address).await?;

            info!("Connecting to peripheral {}...", address);
            peripheral.connect().await?;

            if !peripheral.is_connected().await? {
                return Err(ConnectError::NotConnected);
            }

            info!("Connected; Discovering services...");
            peripheral.discover_services().await?;

            let service_uuid = category.service_uuid();
            let characteristic_uuid = category.characteristic_uuid();

            for service in peripheral.services() {
                if !service.uuid.eq(&service_uuid) {
                    continue;
                }

                for characteristic in &service.characteristics {
                    if characteristic.uuid.eq(&characteristic_uuid) {
                        return Ok(BleSession {
                            peripheral,
                            characteristic: characteristic.clone(),
                        });
                    }
                }
            }

            Err(ConnectError::MissingCharacteristic)
        }
        .boxed()
    }
}

pub struct BleSession {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl SensorSession for BleSession {
    type Notifications = BoxStream<'static, Vec<u8>>;

    fn subscribe(&mut self) -> BoxFuture<'_, Result<Self::Notifications, ConnectError>> {
        async move {
            info!(
                "Subscribing to characteristic {:?}",
                self.characteristic.uuid
            );
            self.peripheral.subscribe(&self.characteristic).await?;

            // Some environments deliver every subscribed characteristic over one
            // stream, so filter on the uuid again.
            let characteristic_uuid = self.characteristic.uuid;
            let notifications = self
                .peripheral
                .notifications()
                .await?
                .filter_map(move |data| async move {
                    if data.uuid.eq(&characteristic_uuid) {
                        Some(data.value)
                    } else {
                        None
                    }
                })
                .boxed();

            Ok(notifications)
        }
        .boxed()
    }

    fn is_connected(&mut self) -> BoxFuture<'_, Result<bool, ConnectError>> {
        async move { Ok(self.peripheral.is_connected().await?) }.boxed()
    }
}
