//! Kernel spidev transport; chip select is driven by the kernel.
use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};
use std::io::Write;
use wall_calendar_lib::driver::HardwareFault;
use wall_calendar_lib::epd13in3k::SoftwareSpi;

/// spidev rejects transfers larger than its buffer (4096 bytes by default)
const MAX_TRANSFER: usize = 4096;

pub struct SpidevHwSpi {
    dev: Spidev,
}

impl SpidevHwSpi {
    pub fn new(path: &str) -> Result<Self, HardwareFault> {
        let mut dev = Spidev::open(path)
            .map_err(|e| HardwareFault::new(format!("open {path}: {e}")))?;

        let opts = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(4_000_000)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        dev.configure(&opts)
            .map_err(|e| HardwareFault::new(e.to_string()))?;
        Ok(Self { dev })
    }
}

impl SoftwareSpi for SpidevHwSpi {
    fn write_byte(&mut self, data: u8) -> Result<(), HardwareFault> {
        self.write_bytes(&[data])
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), HardwareFault> {
        for chunk in data.chunks(MAX_TRANSFER) {
            self.dev
                .write_all(chunk)
                .map_err(|e| HardwareFault::new(e.to_string()))?;
        }
        Ok(())
    }
}
