//! # Simulated Site
//!
//! This module provides a time-driven stand-in for the real sensors so the full
//! reporting loop can run on a desktop (`--simulate`). The model is deliberately
//! simple, but it moves with the wall clock so rates and averages change from
//! cycle to cycle.
//!
//! ## Model Characteristics
//!
//! ### Tank Level
//! - **Cycle**: the tank fills and drains over a 6-hour period
//! - **Range**: between 20 % and 90 % of the configured depth
//! - **Jitter**: a few millimetres of deterministic ripple on the distance reading
//!
//! ### Rain Sensor
//! - Reads ~1000 when dry; drops toward ~400 while the tank is filling (it is raining)
//!
//! ### Climate
//! - Diurnal temperature curve peaking mid-afternoon, humidity moving opposite
//!
//! ### Faults
//! - The climate probe fails every 4th transaction and the range probe times out
//!   every 10th reading, so retry and skip paths get exercised

use crate::climate::{ClimateError, ClimateProbe, ClimateReading};
use crate::connectivity::LinkStatus;
use crate::rain::{AdcError, RainAdc};
use crate::range::{DistanceProbe, ProbeError, ECHO_TIMEOUT_US};
use chrono::{DateTime, Timelike, Utc};
use std::time::Duration;

const TAU: f32 = std::f32::consts::TAU;

/// Fill/drain period of the simulated tank.
const FILL_PERIOD_SECS: f32 = 6.0 * 3600.0;

/// Shared model of the simulated site.
#[derive(Debug, Clone, Copy)]
pub struct SiteModel {
    depth_cm: f32,
}

impl SiteModel {
    pub fn new(depth_cm: f32) -> Self {
        Self {
            depth_cm: depth_cm.max(0.0),
        }
    }

    fn fill_phase(&self, at: DateTime<Utc>) -> f32 {
        let secs = at.timestamp().rem_euclid(FILL_PERIOD_SECS as i64) as f32;
        secs / FILL_PERIOD_SECS * TAU
    }

    /// Water column height at the given instant.
    pub fn height_cm(&self, at: DateTime<Utc>) -> f32 {
        self.depth_cm * (0.55 + 0.35 * self.fill_phase(at).sin())
    }

    /// 10-bit rain sensor reading at the given instant.
    pub fn rain_adc(&self, at: DateTime<Utc>) -> u16 {
        // d/dt sin = cos: positive while filling
        let wetness = self.fill_phase(at).cos().max(0.0);
        (1000.0 - 600.0 * wetness).round() as u16
    }

    /// Temperature and humidity at the given instant.
    pub fn climate(&self, at: DateTime<Utc>) -> ClimateReading {
        let hour = at.hour() as f32 + at.minute() as f32 / 60.0;
        // Peak at 15:00
        let diurnal = ((hour - 9.0) / 24.0 * TAU).sin();
        ClimateReading {
            temperature_c: (27.0 + 4.0 * diurnal).round(),
            humidity_pct: (75.0 - 15.0 * diurnal).round(),
        }
    }
}

/// Ultrasonic probe above the simulated tank.
pub struct SimulatedRange {
    model: SiteModel,
    offset_cm: f32,
    readings: u32,
}

impl SimulatedRange {
    pub fn new(model: SiteModel, offset_cm: f32) -> Self {
        Self {
            model,
            offset_cm,
            readings: 0,
        }
    }

    /// Raw distance the probe would report at `at`.
    pub fn distance_at(&self, at: DateTime<Utc>) -> f32 {
        let ripple = 0.3 * (at.timestamp() as f32 * 1.7).sin();
        self.offset_cm + self.model.depth_cm - self.model.height_cm(at) + ripple
    }
}

impl DistanceProbe for SimulatedRange {
    fn measure(&mut self) -> Result<f32, ProbeError> {
        self.readings = self.readings.wrapping_add(1);
        if self.readings % 10 == 0 {
            return Err(ProbeError::Timeout(ECHO_TIMEOUT_US));
        }
        Ok(self.distance_at(Utc::now()))
    }
}

/// Rain sensor on the simulated site.
pub struct SimulatedRain {
    model: SiteModel,
}

impl SimulatedRain {
    pub fn new(model: SiteModel) -> Self {
        Self { model }
    }
}

/// Reports left-aligned 16-bit conversions, like a microcontroller's `read_u16`.
impl RainAdc for SimulatedRain {
    fn read_raw(&mut self) -> Result<u16, AdcError> {
        Ok(self.model.rain_adc(Utc::now()) << 6)
    }

    fn resolution_bits(&self) -> u32 {
        16
    }
}

/// DHT11 on the simulated site.
pub struct SimulatedClimate {
    model: SiteModel,
    transactions: u32,
}

impl SimulatedClimate {
    pub fn new(model: SiteModel) -> Self {
        Self {
            model,
            transactions: 0,
        }
    }
}

impl ClimateProbe for SimulatedClimate {
    fn measure(&mut self) -> Result<ClimateReading, ClimateError> {
        self.transactions = self.transactions.wrapping_add(1);
        if self.transactions % 4 == 0 {
            return Err(ClimateError::Bus("checksum mismatch".to_string()));
        }
        Ok(self.model.climate(Utc::now()))
    }
}

/// A link that is always up.
#[derive(Debug, Default)]
pub struct SimulatedLink;

impl LinkStatus for SimulatedLink {
    fn is_connected(&mut self) -> bool {
        true
    }

    async fn reconnect(&mut self, _timeout: Duration) -> bool {
        true
    }
}
