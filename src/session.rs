//! # Panel Power and Refresh-Mode State Machine
//!
//! E-paper controllers have a few rules that are easy to break from a call site:
//! - after power-on or deep sleep the panel must be initialized and cleared
//! - partial refresh is only valid once a full clear has happened since wake
//! - nothing may be sent to a sleeping controller except a fresh init
//!
//! [`DisplaySession`] owns the driver and enforces these:
//!
//! ```text
//! Uninitialized --wake--> AwakeFull --enter_partial_mode--> AwakePartial
//!                          ^   |                                 |
//!                 wake     |   +------------sleep----------------+
//!                          |                  v
//!                          +------------- Asleep
//! ```
//!
//! A partial refresh requested while the panel is down is degraded to a wake and
//! a full refresh for that one call. If a driver call fails the state is left
//! where it was before the call, so the next attempt starts from a known state.

use crate::driver::{DisplayDriver, HardwareFault};
use crate::frame::{Frame, Region};
use log::{debug, info};
use thiserror::Error;

/// Power / waveform state of the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    Uninitialized,
    AwakeFull,
    AwakePartial,
    Asleep,
}

/// Which kind of refresh actually reached the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshKind {
    Full,
    Partial,
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// Partial mode requested on a panel that has not been woken and cleared
    #[error("panel is {0:?}; partial mode needs a full clear since wake")]
    NotAwake(PanelState),

    #[error(transparent)]
    Hardware(#[from] HardwareFault),
}

/// Wraps a [`DisplayDriver`] and tracks its power and refresh mode.
pub struct DisplaySession<D> {
    driver: D,
    state: PanelState,
    /// A clear has run since the last image was pushed
    fresh_clear: bool,
}

impl<D: DisplayDriver> DisplaySession<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: PanelState::Uninitialized,
            fresh_clear: false,
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_awake(&self) -> bool {
        matches!(self.state, PanelState::AwakeFull | PanelState::AwakePartial)
    }

    pub fn size(&self) -> (u32, u32) {
        self.driver.size()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Initialize and clear the panel if it is not awake. No-op when awake.
    pub fn wake(&mut self) -> Result<(), SessionError> {
        match self.state {
            PanelState::AwakeFull | PanelState::AwakePartial => Ok(()),
            PanelState::Uninitialized | PanelState::Asleep => {
                info!("Waking panel from {:?}", self.state);
                self.driver.init()?;
                self.driver.clear()?;
                self.state = PanelState::AwakeFull;
                self.fresh_clear = true;
                Ok(())
            }
        }
    }

    /// Load the partial-refresh waveform. Rejected unless the panel is awake.
    pub fn enter_partial_mode(&mut self) -> Result<(), SessionError> {
        match self.state {
            PanelState::AwakePartial => Ok(()),
            PanelState::AwakeFull => {
                debug!("Entering partial refresh mode");
                self.driver.init_partial()?;
                self.state = PanelState::AwakePartial;
                Ok(())
            }
            state @ (PanelState::Uninitialized | PanelState::Asleep) => {
                Err(SessionError::NotAwake(state))
            }
        }
    }

    /// Clear and fully refresh with `frame`, waking the panel first if needed.
    pub fn render_full(&mut self, frame: &Frame) -> Result<RefreshKind, SessionError> {
        self.wake()?;
        if self.state == PanelState::AwakePartial {
            self.driver.init()?;
            self.state = PanelState::AwakeFull;
            self.fresh_clear = false;
        }
        if !self.fresh_clear {
            self.driver.clear()?;
            self.fresh_clear = true;
        }
        self.driver.display(frame)?;
        self.fresh_clear = false;
        Ok(RefreshKind::Full)
    }

    /// Partially refresh `region` from `frame`.
    ///
    /// From `Uninitialized` or `Asleep` this wakes the panel and performs a full
    /// refresh of `frame` instead; the returned kind says which one happened.
    pub fn render_partial(
        &mut self,
        frame: &Frame,
        region: Region,
    ) -> Result<RefreshKind, SessionError> {
        match self.state {
            PanelState::Uninitialized | PanelState::Asleep => {
                debug!("Partial refresh requested while {:?}; doing a full refresh", self.state);
                return self.render_full(frame);
            }
            PanelState::AwakeFull => self.enter_partial_mode()?,
            PanelState::AwakePartial => {}
        }
        self.driver.display_partial(frame, region)?;
        Ok(RefreshKind::Partial)
    }

    /// Put the panel into deep sleep. No-op when it is not awake.
    pub fn sleep(&mut self) -> Result<(), SessionError> {
        if !self.is_awake() {
            return Ok(());
        }
        self.driver.sleep()?;
        self.state = PanelState::Asleep;
        self.fresh_clear = false;
        info!("Panel asleep");
        Ok(())
    }
}
