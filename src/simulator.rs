//! In-memory panel for development and tests.
//!
//! [`VirtualPanel`] behaves like the real controller where it matters: it
//! refuses to draw while asleep, refuses partial updates until the partial
//! waveform is loaded, and only changes the pixels inside a partial window.
//! Every successful call is recorded so tests can assert on the exact sequence,
//! and faults can be injected per operation.
//!
//! With a preview path set, the visible image is written as a PBM file after
//! every refresh so it can be opened in any image viewer.

use crate::driver::{DisplayDriver, HardwareFault};
use crate::frame::{Frame, Region};
use log::{debug, warn};
use std::fs;
use std::mem::discriminant;
use std::path::PathBuf;

/// One driver call as seen by the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelOp {
    Init,
    Clear,
    Display,
    InitPartial,
    DisplayPartial(Region),
    Sleep,
}

/// Simulated e-paper panel
pub struct VirtualPanel {
    width: u32,
    height: u32,
    screen: Frame,
    initialized: bool,
    asleep: bool,
    partial_mode: bool,
    ops: Vec<PanelOp>,
    failures: Vec<PanelOp>,
    preview: Option<PathBuf>,
}

impl VirtualPanel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            screen: Frame::new(width, height),
            initialized: false,
            asleep: false,
            partial_mode: false,
            ops: Vec::new(),
            failures: Vec::new(),
            preview: None,
        }
    }

    /// Write the visible image to `path` (PBM) after every refresh
    pub fn with_preview<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.preview = Some(path.into());
        self
    }

    /// What the panel currently shows
    pub fn screen(&self) -> &Frame {
        &self.screen
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Calls that succeeded, oldest first
    pub fn ops(&self) -> &[PanelOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<PanelOp> {
        std::mem::take(&mut self.ops)
    }

    /// Make the next call of the same kind as `op` fail once
    pub fn fail_next(&mut self, op: PanelOp) {
        self.failures.push(op);
    }

    pub fn count(&self, op: PanelOp) -> usize {
        self.ops
            .iter()
            .filter(|recorded| discriminant(*recorded) == discriminant(&op))
            .count()
    }

    fn check(&mut self, op: PanelOp) -> Result<(), HardwareFault> {
        if let Some(index) = self
            .failures
            .iter()
            .position(|failing| discriminant(failing) == discriminant(&op))
        {
            self.failures.remove(index);
            return Err(HardwareFault::new(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn require_awake(&self, op: PanelOp) -> Result<(), HardwareFault> {
        if !self.initialized || self.asleep {
            return Err(HardwareFault::new(format!("{op:?} sent to a panel that is not awake")));
        }
        Ok(())
    }

    fn dump_preview(&self) {
        if let Some(path) = &self.preview {
            if let Err(e) = fs::write(path, self.screen.to_pbm()) {
                warn!("Could not write preview {}: {}", path.display(), e);
            } else {
                debug!("Preview written to {}", path.display());
            }
        }
    }
}

impl DisplayDriver for VirtualPanel {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn init(&mut self) -> Result<(), HardwareFault> {
        self.check(PanelOp::Init)?;
        self.initialized = true;
        self.asleep = false;
        self.partial_mode = false;
        self.ops.push(PanelOp::Init);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareFault> {
        self.check(PanelOp::Clear)?;
        self.require_awake(PanelOp::Clear)?;
        self.screen.clear();
        self.ops.push(PanelOp::Clear);
        self.dump_preview();
        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<(), HardwareFault> {
        self.check(PanelOp::Display)?;
        self.require_awake(PanelOp::Display)?;
        self.screen = frame.clone();
        self.ops.push(PanelOp::Display);
        self.dump_preview();
        Ok(())
    }

    fn init_partial(&mut self) -> Result<(), HardwareFault> {
        self.check(PanelOp::InitPartial)?;
        self.require_awake(PanelOp::InitPartial)?;
        self.partial_mode = true;
        self.ops.push(PanelOp::InitPartial);
        Ok(())
    }

    fn display_partial(&mut self, frame: &Frame, region: Region) -> Result<(), HardwareFault> {
        let op = PanelOp::DisplayPartial(region);
        self.check(op)?;
        self.require_awake(op)?;
        if !self.partial_mode {
            return Err(HardwareFault::new("partial update without partial waveform"));
        }
        let window = region.aligned_to_bytes().clamped(self.width, self.height);
        self.screen.copy_region_from(frame, window);
        self.ops.push(op);
        self.dump_preview();
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), HardwareFault> {
        self.check(PanelOp::Sleep)?;
        self.asleep = true;
        self.partial_mode = false;
        self.ops.push(PanelOp::Sleep);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refuses_drawing_before_init() {
        let mut panel = VirtualPanel::new(16, 16);
        assert!(panel.display(&Frame::new(16, 16)).is_err());
        assert!(panel.ops().is_empty());
    }

    #[test]
    fn test_partial_only_touches_window() {
        let mut panel = VirtualPanel::new(32, 8);
        panel.init().unwrap();
        panel.init_partial().unwrap();

        let mut frame = Frame::new(32, 8);
        frame.fill_region(frame.bounds(), true);
        panel
            .display_partial(&frame, Region::new(9, 0, 12, 8))
            .unwrap();

        // Aligned out to the 8..16 byte column
        assert_eq!(panel.screen().black_pixels(), 64);
        assert!(panel.screen().is_black(8, 0));
        assert!(!panel.screen().is_black(16, 0));
    }

    #[test]
    fn test_partial_requires_partial_waveform() {
        let mut panel = VirtualPanel::new(16, 16);
        panel.init().unwrap();
        assert!(panel
            .display_partial(&Frame::new(16, 16), Region::new(0, 0, 8, 8))
            .is_err());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let mut panel = VirtualPanel::new(16, 16);
        panel.fail_next(PanelOp::Init);
        assert!(panel.init().is_err());
        assert!(panel.init().is_ok());
        assert_eq!(panel.count(PanelOp::Init), 1);
    }

    #[test]
    fn test_preview_written_as_pbm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.pbm");
        let mut panel = VirtualPanel::new(16, 2).with_preview(&path);
        panel.init().unwrap();
        panel.display(&Frame::new(16, 2)).unwrap();

        let written = fs::read(&path).unwrap();
        assert!(written.starts_with(b"P4\n16 2\n"));
    }
}
