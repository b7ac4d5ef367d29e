//! Display driver contract.
//!
//! Anything that can put a [`Frame`] on a panel implements [`DisplayDriver`]:
//! the SPI driver for the real 13.3" panel and the in-memory simulator. The
//! primitives are deliberately dumb; ordering rules (clear before partial,
//! re-init after sleep) are enforced one level up in
//! [`crate::session::DisplaySession`].

use crate::frame::{Frame, Region};
use thiserror::Error;

/// Any failure talking to the panel.
///
/// Every fault is treated as recoverable: the caller logs it and tries again on
/// the next refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("display hardware fault: {0}")]
pub struct HardwareFault(pub String);

impl HardwareFault {
    pub fn new(message: impl Into<String>) -> Self {
        HardwareFault(message.into())
    }
}

/// Low-level panel primitives
pub trait DisplayDriver {
    /// Panel size in pixels (width, height)
    fn size(&self) -> (u32, u32);

    /// Full power-on initialization for full-refresh mode
    fn init(&mut self) -> Result<(), HardwareFault>;

    /// Drive the whole panel white with a full refresh
    fn clear(&mut self) -> Result<(), HardwareFault>;

    /// Full refresh with `frame`
    fn display(&mut self, frame: &Frame) -> Result<(), HardwareFault>;

    /// Switch the controller to the partial-refresh waveform
    fn init_partial(&mut self) -> Result<(), HardwareFault>;

    /// Partial refresh of `region` using the matching pixels of `frame`
    fn display_partial(&mut self, frame: &Frame, region: Region) -> Result<(), HardwareFault>;

    /// Deep sleep; only `init` wakes the panel again
    fn sleep(&mut self) -> Result<(), HardwareFault>;
}

impl<D: DisplayDriver + ?Sized> DisplayDriver for Box<D> {
    fn size(&self) -> (u32, u32) {
        (**self).size()
    }

    fn init(&mut self) -> Result<(), HardwareFault> {
        (**self).init()
    }

    fn clear(&mut self) -> Result<(), HardwareFault> {
        (**self).clear()
    }

    fn display(&mut self, frame: &Frame) -> Result<(), HardwareFault> {
        (**self).display(frame)
    }

    fn init_partial(&mut self) -> Result<(), HardwareFault> {
        (**self).init_partial()
    }

    fn display_partial(&mut self, frame: &Frame, region: Region) -> Result<(), HardwareFault> {
        (**self).display_partial(frame, region)
    }

    fn sleep(&mut self) -> Result<(), HardwareFault> {
        (**self).sleep()
    }
}
