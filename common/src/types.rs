use serde::{Deserialize, Serialize};

use crate::time::TimeOfDay;

/// Value the one-wire temperature driver reports when the probe is disconnected.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// One tick's worth of sensor data. Built by the sensor reader and dropped at
/// the end of the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub temperature_c: f32,
    pub presence: bool,
    pub timestamp: String,
}

impl Reading {
    /// True for the driver's disconnect sentinel or a non-finite value.
    pub fn is_sensor_fault(&self) -> bool {
        !self.temperature_c.is_finite() || self.temperature_c == DEVICE_DISCONNECTED_C
    }

    pub fn time_of_day(&self) -> Result<TimeOfDay, crate::error::TimeParseError> {
        TimeOfDay::from_timestamp(&self.timestamp)
    }
}

/// Telemetry body posted to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub temperature: f32,
    pub presence: bool,
    pub datetime: String,
}

impl From<&Reading> for TelemetryPayload {
    fn from(reading: &Reading) -> Self {
        Self {
            temperature: reading.temperature_c,
            presence: reading.presence,
            datetime: reading.timestamp.clone(),
        }
    }
}

/// Per-user thresholds served by the settings endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_temp: f32,
    pub light_time_off: TimeOfDay,
    pub user_light: TimeOfDay,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_temp: 25.0,
            light_time_off: TimeOfDay::new(23, 0, 0),
            user_light: TimeOfDay::new(18, 0, 0),
        }
    }
}

/// Output intent for one tick. `None` leaves the output as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actuation {
    pub fan: Option<bool>,
    pub light: Option<bool>,
}

impl Actuation {
    pub fn is_noop(&self) -> bool {
        self.fan.is_none() && self.light.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reading(temperature_c: f32) -> Reading {
        Reading {
            temperature_c,
            presence: true,
            timestamp: "2024-03-09T18:22:28".to_string(),
        }
    }

    #[test]
    fn flags_sentinel_and_non_finite_readings() {
        assert!(reading(DEVICE_DISCONNECTED_C).is_sensor_fault());
        assert!(reading(f32::NAN).is_sensor_fault());
        assert!(!reading(21.5).is_sensor_fault());
        assert!(!reading(-10.0).is_sensor_fault());
    }

    #[test]
    fn telemetry_payload_has_exactly_three_fields() {
        let payload = TelemetryPayload::from(&reading(21.5));
        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 3);
        assert_eq!(value["temperature"], 21.5);
        assert_eq!(value["presence"], true);
        assert_eq!(value["datetime"], "2024-03-09T18:22:28");
    }
}
