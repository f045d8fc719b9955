use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("notification payload too short: got {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Error during discovery (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("Device {address} is not known to the adapter")]
    DeviceNotFound { address: String },

    #[error("Peripheral did not reach the connected state")]
    NotConnected,

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("The acquisition coordinator is no longer running")]
pub struct CoordinatorClosed;

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start acquisition (config): {source}")]
    Config { #[from] source: ConfigError },

    #[error("Failed to start acquisition (bluetooth): {source}")]
    Scan { #[from] source: ScanError },

    #[error("Failed to control acquisition: {source}")]
    Coordinator { #[from] source: CoordinatorClosed },
}
