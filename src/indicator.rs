//! # Status LED
//!
//! Cycle outcomes are signalled with short blink patterns so the board can be
//! read at a glance without the LCD.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("indicator I/O: {0}")]
    Io(String),
}

/// A blink pattern: `count` pulses of `on` followed by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulsePattern {
    pub count: u32,
    pub on: Duration,
    pub off: Duration,
}

impl PulsePattern {
    pub const fn new(count: u32, on_ms: u64, off_ms: u64) -> Self {
        Self {
            count,
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
        }
    }

    /// Startup finished
    pub const BOOT: PulsePattern = PulsePattern::new(5, 40, 40);
    /// Report uploaded
    pub const SUCCESS: PulsePattern = PulsePattern::new(2, 50, 50);
    /// No uplink this cycle
    pub const OFFLINE: PulsePattern = PulsePattern::new(1, 30, 30);

    /// Total time the pattern takes to play.
    pub fn duration(&self) -> Duration {
        (self.on + self.off) * self.count
    }
}

/// A single on/off light.
#[allow(async_fn_in_trait)]
pub trait Indicator {
    fn set_lit(&mut self, lit: bool) -> Result<(), IndicatorError>;

    /// Play a pattern. The light is left off afterwards.
    async fn pulse(&mut self, pattern: PulsePattern) -> Result<(), IndicatorError> {
        for _ in 0..pattern.count {
            self.set_lit(true)?;
            tokio::time::sleep(pattern.on).await;
            self.set_lit(false)?;
            tokio::time::sleep(pattern.off).await;
        }
        Ok(())
    }

    /// Switch off for shutdown.
    fn release(&mut self) -> Result<(), IndicatorError> {
        self.set_lit(false)
    }
}

/// Indicator that only logs, for boards without an LED and for development.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
}

impl LogIndicator {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Indicator for LogIndicator {
    fn set_lit(&mut self, lit: bool) -> Result<(), IndicatorError> {
        if self.lit != lit {
            debug!(lit, "LED");
        }
        self.lit = lit;
        Ok(())
    }
}
