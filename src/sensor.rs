//! Sensor collaborator interface.
//!
//! The device reports a live temperature and humidity in its sysinfo
//! reply. The actual driver lives outside this crate; the dispatcher only
//! needs two zero-argument reads.
//!
//! # Contract
//!
//! A failed read degrades to `0.0` rather than signaling an error, and
//! callers cannot distinguish that from a legitimate zero reading. This
//! mirrors the device firmware's behavior and is accepted as a best-effort
//! display value.

use std::fmt;

/// Source of live temperature and humidity readings.
pub trait Sensors: Send + Sync {
    /// Current temperature, or `0.0` if the read failed.
    fn temperature(&self) -> f64;

    /// Current humidity, or `0.0` if the read failed.
    fn humidity(&self) -> f64;
}

/// Adapter wrapping two reader closures.
pub struct FnSensors<T, H>
where
    T: Fn() -> f64 + Send + Sync,
    H: Fn() -> f64 + Send + Sync,
{
    temperature: T,
    humidity: H,
}

impl<T, H> FnSensors<T, H>
where
    T: Fn() -> f64 + Send + Sync,
    H: Fn() -> f64 + Send + Sync,
{
    /// Wrap a temperature reader and a humidity reader.
    pub fn new(temperature: T, humidity: H) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

impl<T, H> Sensors for FnSensors<T, H>
where
    T: Fn() -> f64 + Send + Sync,
    H: Fn() -> f64 + Send + Sync,
{
    fn temperature(&self) -> f64 {
        (self.temperature)()
    }

    fn humidity(&self) -> f64 {
        (self.humidity)()
    }
}

impl<T, H> fmt::Debug for FnSensors<T, H>
where
    T: Fn() -> f64 + Send + Sync,
    H: Fn() -> f64 + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSensors").finish_non_exhaustive()
    }
}

/// Fixed readings, for tests and the demo binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSensors {
    /// Reported temperature.
    pub temperature: f64,
    /// Reported humidity.
    pub humidity: f64,
}

impl StaticSensors {
    /// Create a sensor source that always reports the given values.
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

impl Sensors for StaticSensors {
    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn humidity(&self) -> f64 {
        self.humidity
    }
}
