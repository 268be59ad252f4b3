//! Environmental sensor boundary
//!
//! The supervisor only needs two things from the sensor: start periodic
//! measurement once at boot, and ask for the latest sample. Register-level
//! driver details stay behind [`SensorSource`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// I2C address of the SCD-40
pub const SCD40_I2C_ADDRESS: u8 = 0x62;

/// Sensor failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SensorError {
    #[error("Sensor not found on bus at address {address:#04x}")]
    DeviceAbsent { address: u8 },
    #[error("Sensor read fault: {0}")]
    ReadFault(String),
}

/// One sample: CO2 in ppm, temperature in °C and relative humidity in %
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub co2: u16,
    #[serde(rename = "temp")]
    pub temperature: f64,
    #[serde(rename = "rh")]
    pub relative_humidity: f64,
}

impl Measurement {
    /// Build a measurement; temperature and humidity are rounded to 2 decimals
    pub fn new(co2: u16, temperature: f64, relative_humidity: f64) -> Self {
        Self {
            co2,
            temperature: round2(temperature),
            relative_humidity: round2(relative_humidity),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Source of measurements
#[async_trait]
pub trait SensorSource: Send {
    /// Probe the device and start periodic measurement
    async fn start(&mut self) -> Result<(), SensorError>;

    /// Latest measurement. `Ok(None)` means no new data yet, never an error.
    async fn read(&mut self) -> Result<Option<Measurement>, SensorError>;
}

/// Deterministic SCD-40 stand-in for hosts without the sensor attached.
///
/// A new sample becomes ready once per measurement interval after the
/// warm-up; each sample is served at most once.
pub struct SimulatedScd40 {
    present: bool,
    warmup: Duration,
    interval: Duration,
    started_at: Option<Instant>,
    last_served: Option<u64>,
}

impl SimulatedScd40 {
    pub fn new(warmup: Duration, interval: Duration) -> Self {
        Self {
            present: true,
            warmup,
            interval,
            started_at: None,
            last_served: None,
        }
    }

    /// A sensor that never answers on the bus
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(Duration::ZERO, Duration::from_secs(5))
        }
    }

    fn sample(index: u64) -> Measurement {
        let phase = index as f64;
        let co2 = 600 + ((index * 37) % 400) as u16;
        let temperature = 21.0 + (phase * 0.1).sin() * 1.5;
        let humidity = 45.0 + (phase * 0.07).cos() * 5.0;
        Measurement::new(co2, temperature, humidity)
    }
}

#[async_trait]
impl SensorSource for SimulatedScd40 {
    async fn start(&mut self) -> Result<(), SensorError> {
        if !self.present {
            return Err(SensorError::DeviceAbsent {
                address: SCD40_I2C_ADDRESS,
            });
        }
        info!("SCD-40 detected, starting periodic measurement");
        self.started_at = Some(Instant::now());
        self.last_served = None;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Measurement>, SensorError> {
        let started_at = self.started_at.ok_or_else(|| {
            SensorError::ReadFault("periodic measurement not started".to_string())
        })?;

        let elapsed = started_at.elapsed();
        if elapsed < self.warmup {
            debug!("Sensor warming up ({:?} left)", self.warmup - elapsed);
            return Ok(None);
        }

        let index = ((elapsed - self.warmup).as_millis() / self.interval.as_millis().max(1)) as u64;
        if self.last_served == Some(index) {
            return Ok(None);
        }
        self.last_served = Some(index);
        Ok(Some(Self::sample(index)))
    }
}
