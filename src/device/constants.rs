use uuid::Uuid;

/**
 * How long (milliseconds) one discovery sweep lasts.
 */
pub const SWEEP_DURATION: u64 = 5000;

/**
 * Delay (milliseconds) between discovery sweeps, to bound radio and CPU usage.
 */
pub const SWEEP_DELAY: u64 = 3000;

/**
 * How often (milliseconds) a paused scanner checks whether it may resume.
 */
pub const PAUSE_POLL_DELAY: u64 = 1000;

/**
 * Default delay (milliseconds) between connection attempts to the same device.
 */
pub const CONNECT_RETRY_DELAY: u64 = 1000;

/**
 * How often (milliseconds) a live connection is checked for liveness while no
 * notifications arrive.
 */
pub const LIVENESS_POLL_DELAY: u64 = 1000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take.
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * Capacity of each subscriber's event queue and of the internal update channel.
 */
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/**
 * The UUID of the Heart Rate GATT service.
 */
pub const HEART_RATE_SERVICE: &str = "0000180d-0000-1000-8000-00805f9b34fb";

/**
 * The Heart Rate Measurement characteristic; notifies one measurement frame
 * per reported beat interval.
 */
pub const HEART_RATE_MEASUREMENT_CHARACTERISTIC: &str = "00002a37-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the Fitness Machine GATT service advertised by smart trainers.
 */
pub const FITNESS_MACHINE_SERVICE: &str = "00001826-0000-1000-8000-00805f9b34fb";

/**
 * The Cycling Power Measurement characteristic carrying power and cadence.
 */
pub const POWER_MEASUREMENT_CHARACTERISTIC: &str = "00002a63-0000-1000-8000-00805f9b34fb";

/**
 * Default advertised-name marker for heart-rate monitors (Polar straps).
 */
pub const HEART_RATE_MARKER: &str = "Polar";

/**
 * Default advertised-name marker for smart trainers (ThinkRider units).
 */
pub const POWER_SOURCE_MARKER: &str = "Think";

pub fn make_heart_rate_service_uuid() -> Uuid {
    Uuid::parse_str(HEART_RATE_SERVICE).unwrap()
}

pub fn make_heart_rate_measurement_uuid() -> Uuid {
    Uuid::parse_str(HEART_RATE_MEASUREMENT_CHARACTERISTIC).unwrap()
}

pub fn make_fitness_machine_service_uuid() -> Uuid {
    Uuid::parse_str(FITNESS_MACHINE_SERVICE).unwrap()
}

pub fn make_power_measurement_uuid() -> Uuid {
    Uuid::parse_str(POWER_MEASUREMENT_CHARACTERISTIC).unwrap()
}
