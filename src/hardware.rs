//! # Board Drivers (Raspberry Pi)
//!
//! GPIO/SPI drivers built on rppal, compiled only with `--features hardware`
//! on Linux:
//! - [`HcSr04`]: ultrasonic ranger (trigger/echo on GPIO)
//! - [`Mcp3008`]: 10-bit ADC on SPI0 for the rain sensor (the Pi has no ADC)
//! - [`GpioLed`]: status LED
//! - [`I2cBackpack`]: PCF8574 expander in front of the 16x2 LCD

use crate::display::{DisplayError, LcdBus};
use crate::indicator::{Indicator, IndicatorError};
use crate::rain::{AdcError, RainAdc};
use crate::range::{time_of_flight_cm, DistanceProbe, ProbeError, ECHO_TIMEOUT_US};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::time::{Duration, Instant};

/// MCP3008 clock; the part is rated to 1.35 MHz at 2.7 V.
const MCP3008_CLOCK_HZ: u32 = 1_350_000;

/// HC-SR04 on two GPIO lines.
pub struct HcSr04 {
    trig: OutputPin,
    echo: InputPin,
}

impl HcSr04 {
    pub fn new(gpio: &Gpio, trig_pin: u8, echo_pin: u8) -> Result<Self, rppal::gpio::Error> {
        Ok(Self {
            trig: gpio.get(trig_pin)?.into_output_low(),
            echo: gpio.get(echo_pin)?.into_input(),
        })
    }

    /// Spin until the echo line reaches `high`, bounded by the echo timeout.
    fn wait_for(&self, high: bool, since: Instant) -> Result<Instant, ProbeError> {
        let limit = Duration::from_micros(ECHO_TIMEOUT_US as u64);
        while self.echo.is_high() != high {
            if since.elapsed() > limit {
                return Err(ProbeError::Timeout(ECHO_TIMEOUT_US));
            }
        }
        Ok(Instant::now())
    }
}

impl DistanceProbe for HcSr04 {
    fn measure(&mut self) -> Result<f32, ProbeError> {
        // 10 µs trigger pulse
        self.trig.set_low();
        std::thread::sleep(Duration::from_micros(2));
        self.trig.set_high();
        std::thread::sleep(Duration::from_micros(10));
        self.trig.set_low();

        let start = self.wait_for(true, Instant::now())?;
        let end = self.wait_for(false, start)?;
        let echo_us = end.duration_since(start).as_micros() as u32;
        Ok(time_of_flight_cm(echo_us))
    }
}

/// MCP3008 single-ended read on one channel.
pub struct Mcp3008 {
    spi: Spi,
    channel: u8,
}

impl Mcp3008 {
    pub fn new(channel: u8) -> Result<Self, rppal::spi::Error> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, MCP3008_CLOCK_HZ, Mode::Mode0)?;
        Ok(Self {
            spi,
            channel: channel & 0x07,
        })
    }
}

impl RainAdc for Mcp3008 {
    fn read_raw(&mut self) -> Result<u16, AdcError> {
        // Start bit, then single-ended mode + channel in the high nibble
        let tx = [0x01, 0x80 | (self.channel << 4), 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| AdcError::Read(e.to_string()))?;
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }
}

/// Status LED on a GPIO line.
pub struct GpioLed {
    pin: OutputPin,
}

impl GpioLed {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self, rppal::gpio::Error> {
        Ok(Self {
            pin: gpio.get(pin)?.into_output_low(),
        })
    }
}

impl Indicator for GpioLed {
    fn set_lit(&mut self, lit: bool) -> Result<(), IndicatorError> {
        if lit {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

/// PCF8574 LCD backpack on an I2C bus.
pub struct I2cBackpack {
    i2c: I2c,
}

impl I2cBackpack {
    pub fn new(bus: u8, address: u16) -> Result<Self, rppal::i2c::Error> {
        let mut i2c = I2c::with_bus(bus)?;
        i2c.set_slave_address(address)?;
        Ok(Self { i2c })
    }
}

impl LcdBus for I2cBackpack {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        self.i2c
            .write(bytes)
            .map(|_| ())
            .map_err(|e| DisplayError::Bus(e.to_string()))
    }
}
