//! # Rain Sensor Smoothing
//!
//! The resistive rain sensor is noisy, so readings go through a small circular
//! buffer and the reported value is the integer mean of what the buffer holds.
//!
//! Cold start: until the buffer has filled, the mean only covers the slots that
//! have actually been written. Unwritten zero slots never dilute the average.

use thiserror::Error;
use tracing::{debug, warn};

/// Default moving-average window.
pub const DEFAULT_WINDOW: usize = 5;

/// Errors reported by the rain ADC.
#[derive(Error, Debug)]
pub enum AdcError {
    #[error("ADC read failed: {0}")]
    Read(String),
}

/// A source of raw rain sensor readings.
///
/// Converters differ in width: the MCP3008 is natively 10-bit, others hand back
/// a 16-bit left-aligned value. The averager only ever sees [`read_10bit`].
///
/// [`read_10bit`]: RainAdc::read_10bit
pub trait RainAdc {
    /// One conversion, `resolution_bits()` wide.
    fn read_raw(&mut self) -> Result<u16, AdcError>;

    fn resolution_bits(&self) -> u32 {
        10
    }

    /// One conversion reduced to the 0..1023 range.
    fn read_10bit(&mut self) -> Result<u16, AdcError> {
        let raw = self.read_raw()?;
        Ok(scale_to_10bit(raw, self.resolution_bits()))
    }
}

/// Reduce a `bits`-wide ADC reading to the 0..1023 range (`>> 6` for 16-bit).
pub fn scale_to_10bit(raw: u16, bits: u32) -> u16 {
    let bits = bits.clamp(1, 16);
    if bits >= 10 {
        raw >> (bits - 10)
    } else {
        raw << (10 - bits)
    }
}

/// Fixed-capacity circular buffer of rain readings.
#[derive(Clone, Debug)]
pub struct RainBuffer {
    samples: Vec<u16>,
    write_index: usize,
    filled_count: usize,
}

impl RainBuffer {
    /// Create an empty buffer. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity.max(1)],
            write_index: 0,
            filled_count: 0,
        }
    }

    /// Store a reading and return the new rolling average.
    pub fn push(&mut self, raw_reading: u16) -> u16 {
        let capacity = self.samples.len();
        self.samples[self.write_index] = raw_reading;
        self.write_index = (self.write_index + 1) % capacity;
        if self.filled_count < capacity {
            self.filled_count += 1;
        }
        self.mean()
    }

    /// Rolling average, or `None` before the first push.
    pub fn average(&self) -> Option<u16> {
        (self.filled_count > 0).then(|| self.mean())
    }

    fn mean(&self) -> u16 {
        if self.filled_count == 0 {
            return 0;
        }
        // The first `filled_count` slots are exactly the written ones: the write
        // index only wraps after the buffer is full.
        let sum: u32 = self.samples[..self.filled_count]
            .iter()
            .map(|&s| u32::from(s))
            .sum();
        (sum / self.filled_count as u32) as u16
    }

    pub fn len(&self) -> usize {
        self.filled_count
    }

    pub fn is_empty(&self) -> bool {
        self.filled_count == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}

/// Reads the rain ADC and feeds the smoothing buffer.
pub struct RainAverager<A> {
    adc: A,
    buffer: RainBuffer,
}

impl<A: RainAdc> RainAverager<A> {
    pub fn new(adc: A, window: usize) -> Self {
        Self {
            adc,
            buffer: RainBuffer::new(window),
        }
    }

    /// Take one reading and return the smoothed value.
    ///
    /// A failed read leaves the buffer untouched and reports the previous
    /// average (0 if nothing has been read yet).
    pub fn sample(&mut self) -> u16 {
        match self.adc.read_10bit() {
            Ok(raw) => {
                let avg = self.buffer.push(raw);
                debug!(raw, avg, "rain sample");
                avg
            }
            Err(e) => {
                warn!("Rain ADC read failed: {}", e);
                self.buffer.average().unwrap_or(0)
            }
        }
    }

    pub fn buffer(&self) -> &RainBuffer {
        &self.buffer
    }
}
