use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::channel::mpsc::Sender;
use futures::SinkExt;
use log::{debug, warn};
use tokio::time::sleep;

use crate::device::backend::DeviceDiscovery;
use crate::device::classify::Classifier;
use crate::device::types::{DeviceCategory, ScanState, ScanTiming, Update};

/// Shared pause/resume/stop switch for one category's discovery loop. All
/// transitions are cooperative; the loop observes them at its check points.
#[derive(Debug, Clone)]
pub(crate) struct ScanControl {
    state: Arc<AtomicU8>,
}

impl ScanControl {
    pub(crate) fn new() -> Self {
        ScanControl { state: Arc::new(AtomicU8::new(ScanState::Idle as u8)) }
    }

    pub(crate) fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn start(&self) {
        self.state.store(ScanState::Scanning as u8, Ordering::SeqCst);
    }

    /// Scanning -> Paused; a no-op in any other state.
    pub(crate) fn pause(&self) {
        let _ = self.state.compare_exchange(
            ScanState::Scanning as u8,
            ScanState::Paused as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Paused -> Scanning; a no-op in any other state, so a stopped scanner
    /// stays stopped.
    pub(crate) fn resume(&self) {
        let _ = self.state.compare_exchange(
            ScanState::Paused as u8,
            ScanState::Scanning as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn stop(&self) {
        self.state.store(ScanState::Stopped as u8, Ordering::SeqCst);
    }
}

/// Continuous discovery loop for one device category. Sweeps while Scanning,
/// idles while Paused, exits once Stopped; matching devices of one sweep are
/// reported as a single batch.
pub(crate) struct Scanner<D: DeviceDiscovery> {
    category: DeviceCategory,
    discovery: D,
    classifier: Classifier,
    timing: ScanTiming,
    control: ScanControl,
    updates: Sender<Update>,
}

impl<D: DeviceDiscovery> Scanner<D> {
    pub(crate) fn new(
        category: DeviceCategory,
        discovery: D,
        classifier: Classifier,
        timing: ScanTiming,
        control: ScanControl,
        updates: Sender<Update>,
    ) -> Self {
        Scanner { category, discovery, classifier, timing, control, updates }
    }

    pub(crate) async fn run(mut self) {
        debug!("Scanner for {} started", self.category);

        loop {
            match self.control.state() {
                ScanState::Stopped => break,
                ScanState::Idle | ScanState::Paused => {
                    sleep(self.timing.pause_poll).await;
                    continue;
                }
                ScanState::Scanning => {}
            }

            let matched = match self.discovery.sweep(self.category).await {
                Ok(devices) => devices
                    .into_iter()
                    .filter(|device| self.classifier.matches(self.category, &device.name))
                    .collect::<Vec<_>>(),
                Err(err) => {
                    // a failed sweep counts as an empty one; the loop carries on
                    warn!("Discovery sweep for {} failed: {}", self.category, err);
                    Vec::new()
                }
            };

            // a pause or stop issued mid-sweep suppresses the completed sweep's batch
            if !matched.is_empty() && self.control.state() == ScanState::Scanning {
                let batch = Update::ScanBatch { category: self.category, devices: matched };
                if self.updates.send(batch).await.is_err() {
                    break;
                }
            }

            sleep(self.timing.sweep_delay).await;
        }

        self.control.stop();
        debug!("Scanner for {} stopped", self.category);
    }
}
