//! GPIO lines for the panel's DC, RST and BUSY pins via the gpio character device.
use linux_embedded_hal::gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use wall_calendar_lib::driver::HardwareFault;
use wall_calendar_lib::epd13in3k::{GpioPin, InputPin};

const CONSUMER: &str = "epaper-calendar";

pub struct CdevOutputPin {
    line: LineHandle,
}
pub struct CdevInputPin {
    line: LineHandle,
}

fn fault(e: impl std::fmt::Display) -> HardwareFault {
    HardwareFault::new(e.to_string())
}

impl CdevOutputPin {
    pub fn new(chip: &mut Chip, offset: u32) -> Result<Self, HardwareFault> {
        let line = chip
            .get_line(offset)
            .map_err(fault)?
            .request(LineRequestFlags::OUTPUT, 0, CONSUMER)
            .map_err(fault)?;
        Ok(Self { line })
    }
}
impl CdevInputPin {
    pub fn new(chip: &mut Chip, offset: u32) -> Result<Self, HardwareFault> {
        let line = chip
            .get_line(offset)
            .map_err(fault)?
            .request(LineRequestFlags::INPUT, 0, CONSUMER)
            .map_err(fault)?;
        Ok(Self { line })
    }
}

impl GpioPin for CdevOutputPin {
    fn set_high(&mut self) -> Result<(), HardwareFault> {
        self.line.set_value(1).map_err(fault)
    }
    fn set_low(&mut self) -> Result<(), HardwareFault> {
        self.line.set_value(0).map_err(fault)
    }
}
impl InputPin for CdevInputPin {
    fn is_high(&self) -> Result<bool, HardwareFault> {
        Ok(self.line.get_value().map_err(fault)? == 1)
    }
}
