//! # Refresh Scheduling
//!
//! Bursts of key presses must not turn into bursts of e-paper refreshes. The
//! [`RefreshScheduler`] sits between the calendar state and the
//! [`DisplaySession`] and decides *when* to draw and *how*:
//!
//! - `Interactive` requests (cursor moves, mark toggles) re-arm a debounce
//!   timer. Only when it expires is one render done, covering everything that
//!   changed in the meantime.
//! - `Immediate` requests (year change, view switch, shape change) cancel the
//!   debounce timer and draw straight away, taking pending changes with them.
//! - The first render after start-up or sleep is a full refresh. While the
//!   panel stays awake every later render is partial, limited to the union of
//!   the cells that changed plus the old and new ring positions.
//! - Every input and every render restarts the idle timer. When it fires the
//!   scene is reverted to today, drawn with a full refresh, and the panel is
//!   put to sleep.
//!
//! There are exactly two timers and arming one replaces its previous deadline.
//! Nothing here blocks or spawns: the event loop calls [`RefreshScheduler::poll`]
//! with the current time and sleeps until [`RefreshScheduler::next_deadline`].
//!
//! Hardware faults are logged and swallowed. What failed to reach the panel is
//! kept and goes out with the next render.

use crate::driver::DisplayDriver;
use crate::frame::{Frame, Region};
use crate::session::{DisplaySession, RefreshKind, SessionError};
use crate::MonthDay;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// How soon a state change should reach the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    /// Coalesced through the debounce window
    Interactive,
    /// Drawn synchronously
    Immediate,
}

/// Part of the picture that no longer matches the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dirty {
    Cell(MonthDay),
    Header,
    /// Needs a full refresh
    Everything,
}

/// One-shot deadline. Arming replaces, never stacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Left disarmed if `now + after` is not representable
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = now.checked_add(after);
        if self.deadline.is_none() {
            warn!("Timer of {:?} is out of range, not arming", after);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// What the scheduler draws.
///
/// Implemented by the application state; the scheduler never looks at the
/// calendar itself.
pub trait Scene {
    /// The complete picture for a full refresh
    fn render(&self) -> Frame;

    /// Repaint `item` onto `frame` and return the area touched, or `None` if the
    /// item is not part of the current picture
    fn redraw(&self, frame: &mut Frame, item: Dirty) -> Option<Region>;

    /// Cell currently carrying the selection ring
    fn ring_cell(&self) -> Option<MonthDay>;

    /// Go back to the resting picture: today's cell, ring shown
    fn revert_to_today(&mut self);
}

/// Debounces render requests and picks full or partial refreshes.
pub struct RefreshScheduler<D> {
    session: DisplaySession<D>,
    debounce: Duration,
    idle_timeout: Duration,
    debounce_timer: Timer,
    idle_timer: Timer,
    dirty: Vec<Dirty>,
    last_refresh: Option<RefreshKind>,
    /// What the panel shows, as far as we know
    last_frame: Option<Frame>,
    /// Ring position in `last_frame`
    shown_ring: Option<MonthDay>,
    /// A full refresh failed half way; the panel content is unknown
    needs_full: bool,
    renders: u64,
}

impl<D: DisplayDriver> RefreshScheduler<D> {
    pub fn new(session: DisplaySession<D>, debounce: Duration, idle_timeout: Duration) -> Self {
        Self {
            session,
            debounce,
            idle_timeout,
            debounce_timer: Timer::default(),
            idle_timer: Timer::default(),
            dirty: Vec::new(),
            last_refresh: None,
            last_frame: None,
            shown_ring: None,
            needs_full: false,
            renders: 0,
        }
    }

    pub fn session(&self) -> &DisplaySession<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DisplaySession<D> {
        &mut self.session
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Kind of the last refresh that reached the panel
    pub fn last_refresh(&self) -> Option<RefreshKind> {
        self.last_refresh
    }

    /// A debounced render is waiting for its window to close
    pub fn pending_render(&self) -> bool {
        self.debounce_timer.is_armed()
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_timer.deadline()
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_timer.deadline()
    }

    /// Successful refreshes since start-up
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Earliest instant at which [`RefreshScheduler::poll`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_timer.deadline(), self.idle_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// User activity that changes nothing on screen still keeps the panel awake
    pub fn note_activity(&mut self, now: Instant) {
        self.idle_timer.arm(now, self.idle_timeout);
    }

    /// Ask for `dirty` to be drawn.
    ///
    /// Returns the refresh that reached the panel, if one happened during this
    /// call (only ever for `Immediate`).
    pub fn request_render<S: Scene + ?Sized>(
        &mut self,
        urgency: Urgency,
        dirty: &[Dirty],
        now: Instant,
        scene: &S,
    ) -> Option<RefreshKind> {
        for item in dirty {
            self.mark_dirty(*item);
        }
        self.note_activity(now);

        match urgency {
            Urgency::Interactive => {
                self.debounce_timer.arm(now, self.debounce);
                debug!("Render debounced for {:?}", self.debounce);
                None
            }
            Urgency::Immediate => {
                self.debounce_timer.cancel();
                self.render(now, scene)
            }
        }
    }

    /// Fire whichever timers are due.
    pub fn poll<S: Scene + ?Sized>(&mut self, now: Instant, scene: &mut S) -> Option<RefreshKind> {
        if self.idle_timer.is_due(now) {
            return self.expire_idle(now, scene);
        }
        if self.debounce_timer.is_due(now) {
            self.debounce_timer.cancel();
            return self.render(now, &*scene);
        }
        None
    }

    fn mark_dirty(&mut self, item: Dirty) {
        if !self.dirty.contains(&item) {
            self.dirty.push(item);
        }
    }

    fn wants_full(&self) -> bool {
        self.needs_full
            || self.last_frame.is_none()
            || !self.session.is_awake()
            || self.dirty.contains(&Dirty::Everything)
    }

    fn render<S: Scene + ?Sized>(&mut self, now: Instant, scene: &S) -> Option<RefreshKind> {
        let result = if self.wants_full() {
            self.render_full(scene)
        } else {
            self.render_partial(scene)
        };

        match result {
            Ok(Some(kind)) => {
                debug!("{:?} refresh done", kind);
                self.renders += 1;
                self.last_refresh = Some(kind);
                self.dirty.clear();
                self.idle_timer.arm(now, self.idle_timeout);
                Some(kind)
            }
            Ok(None) => {
                self.dirty.clear();
                None
            }
            Err(e) => {
                warn!("Render failed, keeping {} pending change(s): {}", self.dirty.len(), e);
                None
            }
        }
    }

    fn render_full<S: Scene + ?Sized>(
        &mut self,
        scene: &S,
    ) -> Result<Option<RefreshKind>, SessionError> {
        let frame = scene.render();
        match self.session.render_full(&frame) {
            Ok(kind) => {
                self.needs_full = false;
                self.shown_ring = scene.ring_cell();
                self.last_frame = Some(frame);
                Ok(Some(kind))
            }
            Err(e) => {
                self.needs_full = true;
                Err(e)
            }
        }
    }

    fn render_partial<S: Scene + ?Sized>(
        &mut self,
        scene: &S,
    ) -> Result<Option<RefreshKind>, SessionError> {
        let Some(mut frame) = self.last_frame.clone() else {
            return self.render_full(scene);
        };

        let ring = scene.ring_cell();
        let mut items = self.dirty.clone();
        for cell in [self.shown_ring, ring].into_iter().flatten() {
            if !items.contains(&Dirty::Cell(cell)) {
                items.push(Dirty::Cell(cell));
            }
        }

        let region = items
            .into_iter()
            .filter_map(|item| scene.redraw(&mut frame, item))
            .reduce(|a, b| a.union(&b));
        let Some(region) = region else {
            debug!("Nothing visible changed, skipping refresh");
            return Ok(None);
        };

        let kind = self.session.render_partial(&frame, region)?;
        self.shown_ring = ring;
        self.last_frame = Some(frame);
        Ok(Some(kind))
    }

    /// Revert, full refresh, sleep. If the refresh fails the panel stays awake
    /// and the whole sequence is retried one idle period later.
    fn expire_idle<S: Scene + ?Sized>(
        &mut self,
        now: Instant,
        scene: &mut S,
    ) -> Option<RefreshKind> {
        info!("Idle timeout, reverting to today");
        self.idle_timer.cancel();
        self.debounce_timer.cancel();
        scene.revert_to_today();

        self.mark_dirty(Dirty::Everything);
        let kind = match self.render_full(&*scene) {
            Ok(kind) => {
                self.renders += 1;
                self.last_refresh = kind;
                self.dirty.clear();
                kind
            }
            Err(e) => {
                warn!("Idle refresh failed, staying awake to retry: {}", e);
                self.idle_timer.arm(now, self.idle_timeout);
                return None;
            }
        };

        if let Err(e) = self.session.sleep() {
            warn!("Could not put panel to sleep: {}", e);
        }
        kind
    }
}
