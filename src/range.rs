//! # Ultrasonic Range Sampling
//!
//! Turns the HC-SR04 reading into a calibrated distance from the mounting
//! reference to the water surface. The driver owns trigger/echo timing; this
//! module only converts and calibrates.

use thiserror::Error;

/// Speed of sound in cm per microsecond (~343 m/s at 20 °C).
const SOUND_CM_PER_US: f32 = 0.0343;

/// Longest echo the driver waits for (~5 m round trip).
pub const ECHO_TIMEOUT_US: u32 = 30_000;

/// Errors reported by a distance probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No echo within the timeout: nothing in range or a wiring fault
    #[error("echo timed out after {0} µs")]
    Timeout(u32),

    /// GPIO access failed
    #[error("probe I/O: {0}")]
    Io(String),
}

/// A source of raw (uncalibrated) distance readings in centimetres.
pub trait DistanceProbe {
    fn measure(&mut self) -> Result<f32, ProbeError>;
}

/// Convert an echo pulse width to a one-way distance in cm.
///
/// The pulse covers the trip out and back, hence the division by two.
pub fn time_of_flight_cm(echo_us: u32) -> f32 {
    (echo_us as f32 * SOUND_CM_PER_US) / 2.0
}

/// Apply the mounting offset and clamp to a non-negative distance.
///
/// Noise can push the difference below zero; a negative distance means nothing
/// physically, so it is clamped. `f32::max` also maps NaN to 0.
pub fn calibrate(raw_distance_cm: f32, offset_cm: f32) -> f32 {
    (raw_distance_cm - offset_cm).max(0.0)
}

/// Wraps a [`DistanceProbe`] with a fixed calibration offset.
pub struct RangeSampler<P> {
    probe: P,
    offset_cm: f32,
}

impl<P: DistanceProbe> RangeSampler<P> {
    pub fn new(probe: P, offset_cm: f32) -> Self {
        Self { probe, offset_cm }
    }

    /// Take one reading and return the calibrated distance.
    pub fn sample(&mut self) -> Result<f32, ProbeError> {
        let raw = self.probe.measure()?;
        Ok(calibrate(raw, self.offset_cm))
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }
}
