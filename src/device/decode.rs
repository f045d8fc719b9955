use crate::device::types::{DeviceCategory, SensorReading};
use crate::error::DecodeError;

/// Decodes a Heart Rate Measurement notification. Only the 8-bit BPM variant
/// of the flags format is handled; the extended 16-bit BPM encoding is a known
/// limitation and would be misread as its low byte.
pub fn decode_heart_rate(payload: &[u8]) -> Result<SensorReading, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::TooShort { len: payload.len(), need: 2 });
    }

    Ok(SensorReading::HeartRate { bpm: payload[1] })
}

/// Decodes a Cycling Power Measurement style notification: power is a signed
/// little-endian 16-bit value at offset 2, cadence an unsigned little-endian
/// 16-bit value at offset 4. The flag byte is ignored; this is a deliberate
/// simplification, not a full Fitness Machine Service parser.
pub fn decode_power_cadence(payload: &[u8]) -> Result<SensorReading, DecodeError> {
    if payload.len() < 6 {
        return Err(DecodeError::TooShort { len: payload.len(), need: 6 });
    }

    let power_watts = i16::from_le_bytes([payload[2], payload[3]]);
    let cadence_rpm = u16::from_le_bytes([payload[4], payload[5]]);

    Ok(SensorReading::PowerCadence { power_watts, cadence_rpm })
}

pub fn decode(category: DeviceCategory, payload: &[u8]) -> Result<SensorReading, DecodeError> {
    match category {
        DeviceCategory::HeartRate => decode_heart_rate(payload),
        DeviceCategory::PowerSource => decode_power_cadence(payload),
    }
}
