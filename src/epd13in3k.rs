//! Waveshare 13.3" (K) 960x680 black/white EPD driver
//!
//! This implementation follows the Waveshare epd13in3k reference sequence:
//! full init with the booster soft-start table, the 0xF7 full update and
//! the 0xFF partial update, and RAM windowing for partial refreshes.
//!
//! The controller is talked to through three tiny traits so the same driver runs
//! on the kernel spidev + gpio-cdev stack, on a bit-banged bus, or on a mock in
//! tests.

use crate::driver::{DisplayDriver, HardwareFault};
use crate::frame::{Frame, Region};
use log::{debug, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Display dimensions
pub const EPD_WIDTH: u32 = 960;
pub const EPD_HEIGHT: u32 = 680;

/// How long BUSY may stay high before the call is abandoned
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Controller commands used by this driver
mod cmd {
    pub const DRIVER_OUTPUT: u8 = 0x01;
    pub const BOOSTER_SOFT_START: u8 = 0x0C;
    pub const DEEP_SLEEP: u8 = 0x10;
    pub const DATA_ENTRY_MODE: u8 = 0x11;
    pub const SW_RESET: u8 = 0x12;
    pub const TEMPERATURE_SENSOR: u8 = 0x18;
    pub const MASTER_ACTIVATION: u8 = 0x20;
    pub const UPDATE_CONTROL_2: u8 = 0x22;
    pub const WRITE_RAM_BW: u8 = 0x24;
    pub const BORDER_WAVEFORM: u8 = 0x3C;
    pub const RAM_X_RANGE: u8 = 0x44;
    pub const RAM_Y_RANGE: u8 = 0x45;
    pub const RAM_X_COUNTER: u8 = 0x4E;
    pub const RAM_Y_COUNTER: u8 = 0x4F;
}

/// Byte-oriented SPI transport
pub trait SoftwareSpi {
    fn write_byte(&mut self, data: u8) -> Result<(), HardwareFault>;

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), HardwareFault> {
        for byte in data {
            self.write_byte(*byte)?;
        }
        Ok(())
    }
}

/// Output pin (DC, RST, optional CS)
pub trait GpioPin {
    fn set_high(&mut self) -> Result<(), HardwareFault>;
    fn set_low(&mut self) -> Result<(), HardwareFault>;
}

/// Input pin (BUSY)
pub trait InputPin {
    fn is_high(&self) -> Result<bool, HardwareFault>;
}

/// No pin: chip select handled by the kernel SPI driver
impl<P: GpioPin> GpioPin for Option<P> {
    fn set_high(&mut self) -> Result<(), HardwareFault> {
        match self {
            Some(pin) => pin.set_high(),
            None => Ok(()),
        }
    }

    fn set_low(&mut self) -> Result<(), HardwareFault> {
        match self {
            Some(pin) => pin.set_low(),
            None => Ok(()),
        }
    }
}

/// EPD 13.3" K display driver
pub struct Epd13in3k<SPI, CS, DC, RST, BUSY> {
    spi: SPI,
    cs_pin: CS,
    dc_pin: DC,
    rst_pin: RST,
    busy_pin: BUSY,
    width: u32,
    height: u32,
    busy_timeout: Duration,
}

impl<SPI, CS, DC, RST, BUSY> Epd13in3k<SPI, CS, DC, RST, BUSY>
where
    SPI: SoftwareSpi,
    CS: GpioPin,
    DC: GpioPin,
    RST: GpioPin,
    BUSY: InputPin,
{
    /// Create a new EPD instance
    pub fn new(spi: SPI, cs_pin: CS, dc_pin: DC, rst_pin: RST, busy_pin: BUSY) -> Self {
        Self {
            spi,
            cs_pin,
            dc_pin,
            rst_pin,
            busy_pin,
            width: EPD_WIDTH,
            height: EPD_HEIGHT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Hardware reset pulse
    fn reset(&mut self) -> Result<(), HardwareFault> {
        self.rst_pin.set_high()?;
        thread::sleep(Duration::from_millis(20));
        self.rst_pin.set_low()?;
        thread::sleep(Duration::from_millis(2));
        self.rst_pin.set_high()?;
        thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), HardwareFault> {
        self.dc_pin.set_low()?; // Command mode
        self.cs_pin.set_low()?;
        self.spi.write_byte(command)?;
        self.cs_pin.set_high()?;
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), HardwareFault> {
        self.dc_pin.set_high()?; // Data mode
        self.cs_pin.set_low()?;
        let result = self.spi.write_bytes(data);
        self.cs_pin.set_high()?;
        result
    }

    fn command_with(&mut self, command: u8, data: &[u8]) -> Result<(), HardwareFault> {
        self.send_command(command)?;
        self.send_data(data)
    }

    /// Wait while BUSY is high
    fn read_busy(&mut self) -> Result<(), HardwareFault> {
        let started = Instant::now();
        while self.busy_pin.is_high()? {
            if started.elapsed() > self.busy_timeout {
                warn!("BUSY still high after {:?}", self.busy_timeout);
                return Err(HardwareFault::new(format!(
                    "BUSY timeout after {:?}",
                    self.busy_timeout
                )));
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    fn set_window(&mut self, region: Region) -> Result<(), HardwareFault> {
        let x_end = region.x1 - 1;
        let y_end = region.y1 - 1;
        self.command_with(
            cmd::RAM_X_RANGE,
            &[
                (region.x0 % 256) as u8,
                (region.x0 / 256) as u8,
                (x_end % 256) as u8,
                (x_end / 256) as u8,
            ],
        )?;
        self.command_with(
            cmd::RAM_Y_RANGE,
            &[
                (region.y0 % 256) as u8,
                (region.y0 / 256) as u8,
                (y_end % 256) as u8,
                (y_end / 256) as u8,
            ],
        )?;
        self.command_with(
            cmd::RAM_X_COUNTER,
            &[(region.x0 % 256) as u8, (region.x0 / 256) as u8],
        )?;
        self.command_with(
            cmd::RAM_Y_COUNTER,
            &[(region.y0 % 256) as u8, (region.y0 / 256) as u8],
        )
    }

    fn full_window(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    fn turn_on_display(&mut self) -> Result<(), HardwareFault> {
        self.command_with(cmd::UPDATE_CONTROL_2, &[0xF7])?;
        self.send_command(cmd::MASTER_ACTIVATION)?;
        self.read_busy()
    }

    fn turn_on_display_partial(&mut self) -> Result<(), HardwareFault> {
        self.command_with(cmd::UPDATE_CONTROL_2, &[0xFF])?;
        self.send_command(cmd::MASTER_ACTIVATION)?;
        self.read_busy()
    }

    fn check_frame(&self, frame: &Frame) -> Result<(), HardwareFault> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(HardwareFault::new(format!(
                "frame is {}x{}, panel is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

impl<SPI, CS, DC, RST, BUSY> DisplayDriver for Epd13in3k<SPI, CS, DC, RST, BUSY>
where
    SPI: SoftwareSpi,
    CS: GpioPin,
    DC: GpioPin,
    RST: GpioPin,
    BUSY: InputPin,
{
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn init(&mut self) -> Result<(), HardwareFault> {
        debug!("EPD full init");
        self.reset()?;
        self.read_busy()?;
        self.send_command(cmd::SW_RESET)?;
        self.read_busy()?;

        self.command_with(cmd::BOOSTER_SOFT_START, &[0xAE, 0xC7, 0xC3, 0xC0, 0x80])?;
        let last_row = self.height - 1;
        self.command_with(
            cmd::DRIVER_OUTPUT,
            &[(last_row % 256) as u8, (last_row / 256) as u8, 0x02],
        )?;
        self.command_with(cmd::BORDER_WAVEFORM, &[0x01])?;
        self.command_with(cmd::DATA_ENTRY_MODE, &[0x03])?;
        let window = self.full_window();
        self.set_window(window)?;
        self.command_with(cmd::TEMPERATURE_SENSOR, &[0x80])?;
        self.read_busy()
    }

    fn clear(&mut self) -> Result<(), HardwareFault> {
        debug!("EPD clear");
        let window = self.full_window();
        self.set_window(window)?;
        let blank = vec![0xFF; (self.width.div_ceil(8) * self.height) as usize];
        self.command_with(cmd::WRITE_RAM_BW, &blank)?;
        self.turn_on_display()
    }

    fn display(&mut self, frame: &Frame) -> Result<(), HardwareFault> {
        self.check_frame(frame)?;
        debug!("EPD full refresh ({} black pixels)", frame.black_pixels());
        let window = self.full_window();
        self.set_window(window)?;
        self.command_with(cmd::WRITE_RAM_BW, frame.bytes())?;
        self.turn_on_display()
    }

    fn init_partial(&mut self) -> Result<(), HardwareFault> {
        debug!("EPD partial init");
        self.reset()?;
        self.read_busy()?;
        self.command_with(cmd::BORDER_WAVEFORM, &[0x80])?;
        self.command_with(cmd::DATA_ENTRY_MODE, &[0x03])?;
        self.command_with(cmd::TEMPERATURE_SENSOR, &[0x80])?;
        self.read_busy()
    }

    fn display_partial(&mut self, frame: &Frame, region: Region) -> Result<(), HardwareFault> {
        self.check_frame(frame)?;
        let window = region.aligned_to_bytes().clamped(self.width, self.height);
        if window.is_empty() {
            return Ok(());
        }
        debug!("EPD partial refresh {:?}", window);
        self.set_window(window)?;
        self.command_with(cmd::WRITE_RAM_BW, &frame.window_bytes(window))?;
        self.turn_on_display_partial()
    }

    fn sleep(&mut self) -> Result<(), HardwareFault> {
        debug!("EPD deep sleep");
        self.command_with(cmd::DEEP_SLEEP, &[0x03])?;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }
}
