//! Telemetry and status event payloads

use crate::sensor::Measurement;
use bytes::Bytes;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};

/// Out-of-band status events published on the events topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Sensor has no sample ready yet (warm-up or between intervals)
    SensorWaitingForData,
    /// Broker session re-established; `attempts` counts every reconnect
    /// attempt of the episode including the successful one
    MqttReconnected { attempts: u32 },
}

impl StatusEvent {
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Encode a measurement as `{"co2":..,"temp":..,"rh":..}`. Non-finite
/// values have no JSON number form and are rejected.
pub fn telemetry_payload(measurement: &Measurement) -> Result<Bytes, serde_json::Error> {
    if !measurement.temperature.is_finite() || !measurement.relative_humidity.is_finite() {
        return Err(serde_json::Error::custom(format!(
            "non-finite measurement: temp={} rh={}",
            measurement.temperature, measurement.relative_humidity
        )));
    }
    serde_json::to_vec(measurement).map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn decode(payload: &Bytes) -> Value {
        serde_json::from_slice(payload).unwrap()
    }

    #[test]
    fn test_telemetry_payload_fields() {
        let payload = telemetry_payload(&Measurement::new(845, 22.456, 38.1)).unwrap();
        assert_eq!(
            decode(&payload),
            json!({"co2": 845, "temp": 22.46, "rh": 38.1})
        );
    }

    #[test]
    fn test_telemetry_payload_is_deterministic() {
        let m = Measurement::new(845, 22.456, 38.1);
        assert_eq!(telemetry_payload(&m).unwrap(), telemetry_payload(&m).unwrap());
    }

    #[test]
    fn test_non_finite_measurement_is_rejected() {
        assert!(telemetry_payload(&Measurement::new(845, f64::NAN, 38.1)).is_err());
        assert!(telemetry_payload(&Measurement::new(845, 22.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_waiting_event_payload() {
        let payload = StatusEvent::SensorWaitingForData.to_payload().unwrap();
        assert_eq!(decode(&payload), json!({"event": "sensor_waiting_for_data"}));
    }

    #[test]
    fn test_reconnected_event_payload() {
        let payload = StatusEvent::MqttReconnected { attempts: 3 }.to_payload().unwrap();
        assert_eq!(
            decode(&payload),
            json!({"event": "mqtt_reconnected", "attempts": 3})
        );
    }

    #[test]
    fn test_event_parses_back() {
        let event: StatusEvent =
            serde_json::from_str(r#"{"event":"mqtt_reconnected","attempts":7}"#).unwrap();
        assert_eq!(event, StatusEvent::MqttReconnected { attempts: 7 });
    }
}
