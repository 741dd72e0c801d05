//! # Temperature / Humidity Probe
//!
//! The DHT11 is slow and flaky: a read fails now and then with a checksum or
//! timing error. [`ClimateReader`] retries a bounded number of times and leaves
//! the fallback decision to the caller.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reported by the climate probe.
#[derive(Error, Debug)]
pub enum ClimateError {
    /// Single transaction failed (timing, checksum, missing device)
    #[error("probe bus error: {0}")]
    Bus(String),

    /// Every attempt failed
    #[error("no reading after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// One temperature/humidity measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl ClimateReading {
    /// Value reported when the probe gave up.
    pub const ZERO: ClimateReading = ClimateReading {
        temperature_c: 0.0,
        humidity_pct: 0.0,
    };
}

/// A single probe transaction.
pub trait ClimateProbe {
    fn measure(&mut self) -> Result<ClimateReading, ClimateError>;
}

/// Bounded-retry wrapper around a [`ClimateProbe`].
pub struct ClimateReader<P> {
    probe: P,
}

impl<P: ClimateProbe> ClimateReader<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Try up to `max_attempts` times, sleeping `backoff` between attempts.
    ///
    /// The sleep only suspends the calling task. `max_attempts` of 0 is treated as 1.
    pub async fn read_with_retry(
        &mut self,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<ClimateReading, ClimateError> {
        let attempts = max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.probe.measure() {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    debug!(attempt, "climate probe failed: {}", e);
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(ClimateError::Exhausted { attempts })
    }

    /// Like [`read_with_retry`](Self::read_with_retry) but substitutes
    /// [`ClimateReading::ZERO`] on exhaustion.
    pub async fn read_or_zero(&mut self, max_attempts: u32, backoff: Duration) -> ClimateReading {
        self.read_with_retry(max_attempts, backoff)
            .await
            .unwrap_or_else(|e| {
                warn!("Climate probe unavailable ({}), reporting zeros", e);
                ClimateReading::ZERO
            })
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }
}
