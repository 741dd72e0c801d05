//! # Tank Monitor Core Library
//!
//! This library provides the sensor-fusion and reporting logic for a single-board
//! rain and water-tank monitor. It is designed for small Linux boards such as the
//! Raspberry Pi Zero W, where everything runs on one cooperative thread of control.
//!
//! ## Design Philosophy
//!
//! ### Explicit State
//! - **No globals**: the water baseline, rain buffer and reconnect timestamp are plain
//!   structs ([`metrics::WaterState`], [`rain::RainBuffer`],
//!   [`connectivity::ConnectivityState`]) owned by the [`cycle::ReportingCycle`]
//! - **Tagged absence**: "no previous sample" is an `Option`, never a magic number
//! - **Pure cores**: [`range::calibrate`] and [`metrics::compute`] are pure functions
//!   that are trivially testable
//!
//! ### Failure Is Not Fatal
//! Every collaborator that touches hardware or the network returns a `Result` (or a
//! `bool` for link availability). The reporting cycle logs those outcomes and keeps
//! going; the only way out of the loop is an external shutdown request.
//!
//! ### Data Flow
//! 1. **Sample**: calibrated distance, smoothed rain ADC, temperature/humidity
//! 2. **Derive**: water height, percent full and cm/min rate from the previous baseline
//! 3. **Gate**: reuse the link, or try to reconnect once the cooldown has elapsed
//! 4. **Report**: upload six fields, refresh the LCD, blink the LED
//! 5. **Sleep**: wait for the report interval (or a shutdown signal)
//!
//! ## Core Types
//! - [`SensorFrame`]: one cycle's worth of sensor inputs
//! - [`Report`]: the six fields uploaded to the telemetry endpoint

use serde::Serialize;

// Module declarations
pub mod climate;
pub mod config;
pub mod connectivity;
pub mod cycle;
pub mod display;
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod hardware;
pub mod indicator;
pub mod metrics;
pub mod rain;
pub mod range;
pub mod simulate;
pub mod sysfs;
pub mod telemetry;

/// Sensor inputs gathered at the start of one cycle.
///
/// Produced fresh every cycle and consumed immediately; nothing here is persisted.
/// `distance_cm` is `None` when the ultrasonic probe timed out, in which case the
/// water fields are skipped for this cycle.
///
/// # Example
/// ```
/// use tank_monitor_lib::SensorFrame;
///
/// let frame = SensorFrame {
///     distance_cm: Some(5.0),
///     rain_avg: 512,
///     temperature_c: 28.0,
///     humidity_pct: 74.0,
/// };
/// assert!(frame.distance_cm.is_some());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SensorFrame {
    /// Calibrated distance from sensor to water surface in cm
    pub distance_cm: Option<f32>,
    /// Moving average of the rain sensor ADC (0..1023)
    pub rain_avg: u16,
    /// Air temperature in °C (0 when the probe gave up)
    pub temperature_c: f32,
    /// Relative humidity in % (0 when the probe gave up)
    pub humidity_pct: f32,
}

/// The six fields uploaded to the telemetry endpoint each cycle.
///
/// The water fields are optional because a distance fault skips them for one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Report {
    /// Tank fill level, 0..=100
    pub percent: Option<f32>,
    /// Water column height in cm
    pub height_cm: Option<f32>,
    /// Height change per minute since the previous sample
    pub rate_cm_per_min: Option<f32>,
    /// Smoothed rain ADC reading
    pub rain_avg: u16,
    /// Relative humidity in %
    pub humidity_pct: f32,
    /// Air temperature in °C
    pub temperature_c: f32,
}

impl Report {
    /// Combine a frame with the metrics derived from it (if any).
    pub fn new(frame: &SensorFrame, metrics: Option<&metrics::WaterMetrics>) -> Self {
        Report {
            percent: metrics.map(|m| m.percent),
            height_cm: metrics.map(|m| m.height_cm),
            rate_cm_per_min: metrics.map(|m| m.rate_cm_per_min),
            rain_avg: frame.rain_avg,
            humidity_pct: frame.humidity_pct,
            temperature_c: frame.temperature_c,
        }
    }
}
