use std::time::Duration;

use futures::channel::mpsc::Sender;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::device::backend::{SensorSession, SensorTransport};
use crate::device::constants::{IS_CONNECTED_DEADLINE, LIVENESS_POLL_DELAY};
use crate::device::decode::decode;
use crate::device::types::{
    DeviceCategory, DiscoveredDevice, RetryPolicy, SensorReading, SessionStatus, Update,
};
use crate::error::ConnectError;

/// Owns the lifecycle of one device association: connect, subscribe, relay
/// decoded readings, detect disconnection. Failures restart the attempt from
/// the top under the retry policy; only the cancellation token (or an
/// exhausted bounded policy) ends the loop.
pub(crate) struct Connector<T: SensorTransport> {
    category: DeviceCategory,
    device: DiscoveredDevice,
    transport: T,
    retry: RetryPolicy,
    cancel: CancellationToken,
    updates: Sender<Update>,
}

enum LinkEnd {
    Dropped,
    Stopped,
    ConsumerGone,
}

impl<T: SensorTransport> Connector<T> {
    pub(crate) fn new(
        category: DeviceCategory,
        device: DiscoveredDevice,
        transport: T,
        retry: RetryPolicy,
        cancel: CancellationToken,
        updates: Sender<Update>,
    ) -> Self {
        Connector { category, device, transport, retry, cancel, updates }
    }

    pub(crate) async fn run(mut self) {
        self.attempt_loop().await;

        // lets the coordinator release this device association
        let done = Update::ConnectorDone {
            category: self.category,
            address: self.device.address.clone(),
        };
        let _ = self.updates.send(done).await;
    }

    async fn attempt_loop(&mut self) {
        // counts consecutive failures only; reset after every successful connection
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if let Some(max_attempts) = self.retry.max_attempts {
                if failures >= max_attempts {
                    warn!(
                        "Giving up on {} ({}) after {} failed attempts",
                        self.device.name, self.device.address, failures
                    );
                    break;
                }
            }

            info!("Connecting to {} ({})...", self.device.name, self.device.address);
            self.report(SessionStatus::Connecting).await;

            let opened = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.transport.open(self.category, &self.device.address) => result,
            };

            let mut session = match opened {
                Ok(session) => session,
                Err(err) => {
                    warn!(
                        "Failed to connect to {} ({}): {}",
                        self.device.name, self.device.address, err
                    );
                    failures += 1;
                    self.report(SessionStatus::Failed).await;
                    if !self.wait_retry().await {
                        break;
                    }
                    continue;
                }
            };

            info!("Connected to {} ({})", self.device.name, self.device.address);
            failures = 0;
            self.report(SessionStatus::Connected).await;

            let notifications = match session.subscribe().await {
                Ok(notifications) => notifications,
                Err(err) => {
                    warn!("Failed to subscribe to {}: {}", self.device.address, err);
                    failures += 1;
                    self.report(SessionStatus::Failed).await;
                    if !self.wait_retry().await {
                        break;
                    }
                    continue;
                }
            };

            match self.relay(&mut session, notifications).await {
                LinkEnd::Stopped | LinkEnd::ConsumerGone => {
                    self.report(SessionStatus::Disconnected).await;
                    break;
                }
                LinkEnd::Dropped => {
                    self.report(SessionStatus::Disconnected).await;
                    if !self.wait_retry().await {
                        break;
                    }
                }
            }
        }
    }

    /// Forwards decoded notifications until the link drops or stop is
    /// requested. A malformed frame is dropped while the connection stays up.
    async fn relay(
        &mut self,
        session: &mut T::Session,
        mut notifications: <T::Session as SensorSession>::Notifications,
    ) -> LinkEnd {
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return LinkEnd::Stopped;
                }
                notification = notifications.next() => match notification {
                    Some(payload) => match decode(self.category, &payload) {
                        Ok(reading) => {
                            if !self.forward(reading).await {
                                return LinkEnd::ConsumerGone;
                            }
                        }
                        Err(err) => {
                            warn!("Dropping notification from {}: {}", self.device.address, err);
                        }
                    },
                    None => {
                        warn!("Notification stream for {} ended", self.device.address);
                        return LinkEnd::Dropped;
                    }
                },
                _ = sleep(Duration::from_millis(LIVENESS_POLL_DELAY)) => {
                    match self.check_liveness(session).await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!("Connection to {} lost", self.device.address);
                            return LinkEnd::Dropped;
                        }
                        Err(err) => {
                            warn!("Error checking connection state: {}", err);
                            return LinkEnd::Dropped;
                        }
                    }
                }
            }
        }
    }

    async fn check_liveness(&self, session: &mut T::Session) -> Result<bool, ConnectError> {
        tokio::select! {
            _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
                // macOS: is_connected can hang indefinitely
                warn!("Checking for connection status took too long");
                Ok(false)
            }
            result = session.is_connected() => result,
        }
    }

    async fn forward(&mut self, reading: SensorReading) -> bool {
        let update = Update::Reading { category: self.category, reading };
        self.updates.send(update).await.is_ok()
    }

    async fn report(&mut self, status: SessionStatus) {
        let update = Update::Session {
            category: self.category,
            device: self.device.clone(),
            status,
        };
        // a closed channel means the coordinator is gone; run() exits shortly after
        let _ = self.updates.send(update).await;
    }

    /// Waits out the retry backoff; false means stop was requested meanwhile.
    async fn wait_retry(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(self.retry.backoff) => true,
        }
    }
}
