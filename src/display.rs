//! # Character LCD Status Display
//!
//! The board carries a 16x2 HD44780-style LCD behind a PCF8574 I2C backpack.
//! Lines wider than the panel scroll horizontally one column per frame. This
//! module builds the frames and ships two renderers:
//! - [`Hd44780`]: the panel itself, driven in 4-bit mode over any [`LcdBus`]
//! - [`ConsoleDisplay`]: text rendering used in development mode
//!
//! Display faults are never fatal: every operation returns a `Result` that the
//! reporting cycle logs and drops.

use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

/// Panel width in characters.
pub const LCD_WIDTH: usize = 16;

/// Panel height in rows.
pub const LCD_ROWS: usize = 2;

/// Delay between scroll frames.
pub const SCROLL_DELAY: Duration = Duration::from_millis(300);

/// Errors raised by a display backend.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("display I/O: {0}")]
    Io(#[from] io::Error),

    #[error("row {0} is outside the panel")]
    Row(usize),

    #[error("LCD bus: {0}")]
    Bus(String),
}

/// The status display collaborator.
#[allow(async_fn_in_trait)]
pub trait StatusDisplay {
    /// Clear the panel and show a (possibly scrolling) message on the first row.
    async fn show_alert(&mut self, text: &str) -> Result<(), DisplayError>;

    /// Clear the panel and show the latest readings on both rows.
    async fn show_readings(
        &mut self,
        temperature_c: f32,
        humidity_pct: f32,
        height_cm: Option<f32>,
    ) -> Result<(), DisplayError>;

    async fn clear(&mut self) -> Result<(), DisplayError>;
}

/// Frames needed to show `line` on a panel `width` characters wide.
///
/// A line that fits yields one frame, padded to the full width. A longer line
/// is padded with one screen of blanks and windowed one column at a time, so
/// the text scrolls fully off the left edge.
pub fn scroll_frames(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= width {
        return vec![format!("{:<width$}", line, width = width)];
    }

    let padded: Vec<char> = chars
        .into_iter()
        .chain(std::iter::repeat(' ').take(width))
        .collect();
    padded
        .windows(width)
        .map(|w| w.iter().collect())
        .collect()
}

/// The two lines of the readings screen.
pub fn readings_lines(temperature_c: f32, humidity_pct: f32, height_cm: Option<f32>) -> [String; 2] {
    let level = match height_cm {
        Some(h) => format!("{:.1}cm", h),
        None => "--.-cm".to_string(),
    };
    [
        format!("Temp:{:.0}C Level:", temperature_c),
        format!("Hum:{:.0}%   {}", humidity_pct, level),
    ]
}

/// Renders LCD frames as text lines on any writer (stdout in development mode).
///
/// Each frame is written as `|<row>|<frame>|`, and scroll frames are paced with
/// the same delay as the real panel.
pub struct ConsoleDisplay<W> {
    out: W,
    width: usize,
    frame_delay: Duration,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout(width: usize, frame_delay: Duration) -> Self {
        Self::new(io::stdout(), width, frame_delay)
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, width: usize, frame_delay: Duration) -> Self {
        Self {
            out,
            width: width.max(1),
            frame_delay,
        }
    }

    async fn scroll_row(&mut self, line: &str, row: usize) -> Result<(), DisplayError> {
        if row >= LCD_ROWS {
            return Err(DisplayError::Row(row));
        }
        let frames = scroll_frames(line, self.width);
        let last = frames.len() - 1;
        for (i, frame) in frames.iter().enumerate() {
            writeln!(self.out, "|{}|{}|", row, frame)?;
            self.out.flush()?;
            if i < last {
                tokio::time::sleep(self.frame_delay).await;
            }
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> StatusDisplay for ConsoleDisplay<W> {
    async fn show_alert(&mut self, text: &str) -> Result<(), DisplayError> {
        self.clear().await?;
        self.scroll_row(text, 0).await
    }

    async fn show_readings(
        &mut self,
        temperature_c: f32,
        humidity_pct: f32,
        height_cm: Option<f32>,
    ) -> Result<(), DisplayError> {
        self.clear().await?;
        let [first, second] = readings_lines(temperature_c, humidity_pct, height_cm);
        self.scroll_row(&first, 0).await?;
        self.scroll_row(&second, 1).await
    }

    async fn clear(&mut self) -> Result<(), DisplayError> {
        writeln!(self.out, "+{}+", "-".repeat(self.width + 2))?;
        Ok(())
    }
}

// PCF8574 backpack wiring: P0=RS, P1=RW, P2=E, P3=backlight, P4..P7=D4..D7
const LCD_RS: u8 = 0x01;
const LCD_ENABLE: u8 = 0x04;
const LCD_BACKLIGHT: u8 = 0x08;

// HD44780 instructions
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_LEFT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM address of the first column of each row.
const ROW_OFFSETS: [u8; LCD_ROWS] = [0x00, 0x40];

/// Byte sink for the I/O expander in front of the panel.
pub trait LcdBus {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DisplayError>;
}

/// Map a character onto the HD44780 A00 character ROM.
fn rom_code(c: char) -> u8 {
    match c {
        ' '..='}' => c as u8,
        '°' => 0xDF,
        _ => b'?',
    }
}

/// HD44780 character LCD in 4-bit mode behind a PCF8574 backpack.
pub struct Hd44780<B> {
    bus: B,
    width: usize,
    frame_delay: Duration,
}

impl<B: LcdBus> Hd44780<B> {
    pub fn new(bus: B, width: usize, frame_delay: Duration) -> Self {
        Self {
            bus,
            width: width.max(1),
            frame_delay,
        }
    }

    /// Power-on initialisation into 4-bit, two-line mode.
    pub async fn init(&mut self) -> Result<(), DisplayError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Three 8-bit function sets resynchronise the controller from any state
        self.write_nibble(0x30, 0)?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.write_nibble(0x30, 0)?;
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.write_nibble(0x30, 0)?;
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.write_nibble(0x20, 0)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.clear_panel().await?;
        self.command(CMD_ENTRY_LEFT)
    }

    /// Latch the high nibble of `bits` on the falling edge of E.
    fn write_nibble(&mut self, bits: u8, mode: u8) -> Result<(), DisplayError> {
        let byte = (bits & 0xF0) | mode | LCD_BACKLIGHT;
        self.bus.write(&[byte | LCD_ENABLE, byte])
    }

    fn send(&mut self, value: u8, mode: u8) -> Result<(), DisplayError> {
        self.write_nibble(value, mode)?;
        self.write_nibble(value << 4, mode)
    }

    fn command(&mut self, cmd: u8) -> Result<(), DisplayError> {
        self.send(cmd, 0)
    }

    async fn clear_panel(&mut self) -> Result<(), DisplayError> {
        self.command(CMD_CLEAR)?;
        // Clear is the one slow instruction (1.52 ms)
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(())
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> Result<(), DisplayError> {
        let offset = *ROW_OFFSETS.get(row).ok_or(DisplayError::Row(row))?;
        self.command(CMD_SET_DDRAM | (offset + col as u8))
    }

    async fn scroll_row(&mut self, line: &str, row: usize) -> Result<(), DisplayError> {
        let frames = scroll_frames(line, self.width);
        let last = frames.len() - 1;
        for (i, frame) in frames.iter().enumerate() {
            self.set_cursor(row, 0)?;
            for c in frame.chars() {
                self.send(rom_code(c), LCD_RS)?;
            }
            if i < last {
                tokio::time::sleep(self.frame_delay).await;
            }
        }
        Ok(())
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: LcdBus> StatusDisplay for Hd44780<B> {
    async fn show_alert(&mut self, text: &str) -> Result<(), DisplayError> {
        self.clear_panel().await?;
        self.scroll_row(text, 0).await
    }

    async fn show_readings(
        &mut self,
        temperature_c: f32,
        humidity_pct: f32,
        height_cm: Option<f32>,
    ) -> Result<(), DisplayError> {
        self.clear_panel().await?;
        let [first, second] = readings_lines(temperature_c, humidity_pct, height_cm);
        self.scroll_row(&first, 0).await?;
        self.scroll_row(&second, 1).await
    }

    async fn clear(&mut self) -> Result<(), DisplayError> {
        self.clear_panel().await
    }
}
