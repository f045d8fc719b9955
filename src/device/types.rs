use std::time::Duration;
use uuid::Uuid;

use crate::device::constants::{
    make_fitness_machine_service_uuid, make_heart_rate_measurement_uuid,
    make_heart_rate_service_uuid, make_power_measurement_uuid, CONNECT_RETRY_DELAY,
    PAUSE_POLL_DELAY, SWEEP_DELAY,
};

/// The two kinds of sensors a session acquires. Each category maps to one GATT
/// service, one characteristic, one decoder and one name marker, so adding a
/// category is a data change rather than new branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    HeartRate,
    PowerSource,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 2] = [DeviceCategory::HeartRate, DeviceCategory::PowerSource];

    pub fn service_uuid(&self) -> Uuid {
        match self {
            DeviceCategory::HeartRate => make_heart_rate_service_uuid(),
            DeviceCategory::PowerSource => make_fitness_machine_service_uuid(),
        }
    }

    pub fn characteristic_uuid(&self) -> Uuid {
        match self {
            DeviceCategory::HeartRate => make_heart_rate_measurement_uuid(),
            DeviceCategory::PowerSource => make_power_measurement_uuid(),
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            DeviceCategory::HeartRate => 0,
            DeviceCategory::PowerSource => 1,
        }
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            DeviceCategory::HeartRate => "heart rate",
            DeviceCategory::PowerSource => "power source",
        };

        write!(f, "{}", result)
    }
}

/// One named advertisement seen during a discovery sweep. Unnamed
/// advertisements are never surfaced, they can never match a category marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
}

/// Per-category scanner state. Stopped is terminal (the loop has exited, or
/// will exit at its next check point); Paused keeps the loop alive without
/// performing discovery sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Scanning = 1,
    Paused = 2,
    Stopped = 3,
}

impl ScanState {
    pub(crate) fn from_u8(value: u8) -> ScanState {
        match value {
            1 => ScanState::Scanning,
            2 => ScanState::Paused,
            3 => ScanState::Stopped,
            _ => ScanState::Idle,
        }
    }
}

/// Lifecycle of one connection attempt and the session that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// One decoded notification. Produced per frame, consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading {
    HeartRate { bpm: u8 },
    PowerCadence { power_watts: i16, cadence_rpm: u16 },
}

/// Sweep cadence of a scanner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    pub sweep_delay: Duration,
    pub pause_poll: Duration,
}

impl Default for ScanTiming {
    fn default() -> Self {
        ScanTiming {
            sweep_delay: Duration::from_millis(SWEEP_DELAY),
            pause_poll: Duration::from_millis(PAUSE_POLL_DELAY),
        }
    }
}

/// Connection retry behavior. `max_attempts` counts consecutive failures; the
/// counter resets after every successful connection. `None` retries forever,
/// which preserves the favor-eventual-connection behavior of the original
/// hardware setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: None,
            backoff: Duration::from_millis(CONNECT_RETRY_DELAY),
        }
    }
}

/// A connection-status transition, as seen by external consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub category: DeviceCategory,
    pub name: String,
    pub address: String,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Free-text operator-visible log line, delivered over the event feed instead
/// of a process-global queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Everything the coordinator surfaces to the UI / session-recorder layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionEvent {
    Status(StatusEvent),
    Reading {
        category: DeviceCategory,
        reading: SensorReading,
    },
    Log(LogLine),
}

/// Internal messages from scanner and connector tasks to the coordinator.
#[derive(Debug, Clone)]
pub(crate) enum Update {
    ScanBatch {
        category: DeviceCategory,
        devices: Vec<DiscoveredDevice>,
    },
    Session {
        category: DeviceCategory,
        device: DiscoveredDevice,
        status: SessionStatus,
    },
    Reading {
        category: DeviceCategory,
        reading: SensorReading,
    },
    /// Final message of a connector task, whatever the exit path.
    ConnectorDone {
        category: DeviceCategory,
        address: String,
    },
}
