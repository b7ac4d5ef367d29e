//! # Application State and Event Handling
//!
//! [`CalendarApp`] owns everything the device needs at run time and turns one
//! [`InputEvent`] at a time into model changes and render requests:
//!
//! | event          | calendar view                         | plot view               |
//! |----------------|---------------------------------------|-------------------------|
//! | move           | ring reveal / move, debounced partial | ignored (keeps awake)   |
//! | toggle mark    | persist, then debounced partial       | ignored (keeps awake)   |
//! | set shape      | immediate header refresh              | immediate full redraw   |
//! | change year    | reload marks, immediate full          | reload, immediate full  |
//! | switch view    | immediate full                        | immediate full          |
//!
//! The pieces the scheduler draws from live in [`Workspace`], which implements
//! [`Scene`]. Keeping it apart from the scheduler lets both be borrowed at once.

use crate::config::Config;
use crate::driver::DisplayDriver;
use crate::frame::{Frame, Region};
use crate::input::InputEvent;
use crate::mark_store::MarkStore;
use crate::renderer::{RenderAdapter, RenderInput};
use crate::scheduler::{Dirty, RefreshScheduler, Scene, Urgency};
use crate::selection::{Direction, MoveOutcome, SelectionModel};
use crate::session::DisplaySession;
use crate::{Marks, MonthDay};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::time::Instant;

/// Source of "today"
pub type Clock = Box<dyn Fn() -> NaiveDate>;

/// Today according to the local wall clock
pub fn system_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Which picture is on the panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Calendar,
    Chart,
}

/// Calendar state plus the renderer that draws it
pub struct Workspace<R> {
    selection: SelectionModel,
    store: MarkStore,
    renderer: R,
    view: View,
    clock: Clock,
    no_marks: Marks,
}

impl<R: RenderAdapter> Workspace<R> {
    pub fn new(selection: SelectionModel, store: MarkStore, renderer: R, clock: Clock) -> Self {
        Self {
            selection,
            store,
            renderer,
            view: View::Calendar,
            clock,
            no_marks: Marks::new(),
        }
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn store(&self) -> &MarkStore {
        &self.store
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Marks of the active year. Empty if that year could not be loaded.
    pub fn marks(&self) -> &Marks {
        if self.store.year() == Some(self.selection.active_year()) {
            self.store.marks()
        } else {
            &self.no_marks
        }
    }

    /// Replace the cached marks with the active year's file
    fn load_active_year(&mut self) {
        let year = self.selection.active_year();
        match self.store.load(year) {
            Ok(marks) => info!("Loaded {} marks for {}", marks.len(), year),
            Err(e) => warn!("Could not load marks for {}: {}", year, e),
        }
    }

    /// Current state as the renderer sees it
    pub fn render_input(&self) -> RenderInput<'_> {
        RenderInput {
            year: self.selection.active_year(),
            selection: &self.selection,
            marks: self.marks(),
            today: self.today(),
        }
    }
}

impl<R: RenderAdapter> Scene for Workspace<R> {
    fn render(&self) -> Frame {
        match self.view {
            View::Calendar => self.renderer.render(&self.render_input()),
            View::Chart => self.renderer.render_chart(
                self.selection.active_year(),
                self.selection.current_shape(),
                self.marks(),
            ),
        }
    }

    fn redraw(&self, frame: &mut Frame, item: Dirty) -> Option<Region> {
        if item == Dirty::Everything {
            *frame = self.render();
            return Some(frame.bounds());
        }
        if self.view == View::Chart {
            return None;
        }
        match item {
            Dirty::Cell(cell) => self.renderer.render_cell(frame, &self.render_input(), cell),
            Dirty::Header => Some(self.renderer.render_header(frame, &self.render_input())),
            Dirty::Everything => None,
        }
    }

    fn ring_cell(&self) -> Option<MonthDay> {
        match self.view {
            View::Calendar => self.selection.ring_cell(),
            View::Chart => None,
        }
    }

    fn revert_to_today(&mut self) {
        self.view = View::Calendar;
        let today = self.today();
        if self.selection.revert_to_today(today) {
            self.load_active_year();
        }
    }
}

/// The running calendar: model, renderer and panel.
pub struct CalendarApp<D, R> {
    workspace: Workspace<R>,
    scheduler: RefreshScheduler<D>,
}

impl<D: DisplayDriver, R: RenderAdapter> CalendarApp<D, R> {
    pub fn new(config: &Config, driver: D, renderer: R, clock: Clock) -> Self {
        let today = clock();
        let selection =
            SelectionModel::new(today).with_year_rollover(config.navigation.year_rollover);
        let store = MarkStore::new(config.storage.data_dir.clone());
        let scheduler = RefreshScheduler::new(
            DisplaySession::new(driver),
            config.timing.debounce(),
            config.timing.idle_timeout(),
        );
        Self {
            workspace: Workspace::new(selection, store, renderer, clock),
            scheduler,
        }
    }

    /// Start in `year` instead of the current one. Call before [`CalendarApp::start`].
    pub fn with_year(mut self, year: i32) -> Self {
        let delta = year - self.workspace.selection.active_year();
        if delta != 0 {
            let today = self.workspace.today();
            self.workspace.selection.change_year(delta, today);
        }
        self
    }

    pub fn workspace(&self) -> &Workspace<R> {
        &self.workspace
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.workspace.selection
    }

    pub fn view(&self) -> View {
        self.workspace.view
    }

    pub fn scheduler(&self) -> &RefreshScheduler<D> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut RefreshScheduler<D> {
        &mut self.scheduler
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Load the active year and draw it with a full refresh.
    pub fn start(&mut self, now: Instant) {
        info!(
            "Starting calendar for {} (debounce {:?}, idle timeout {:?})",
            self.workspace.selection.active_year(),
            self.scheduler.debounce(),
            self.scheduler.idle_timeout(),
        );
        self.workspace.load_active_year();
        self.immediate(&[Dirty::Everything], now);
    }

    /// Apply one event. Returns false when the app should quit.
    pub fn handle(&mut self, event: InputEvent, now: Instant) -> bool {
        debug!("Input: {}", event);
        match event {
            InputEvent::Quit => return false,
            InputEvent::MoveNext => self.move_cursor(Direction::Next, now),
            InputEvent::MovePrevious => self.move_cursor(Direction::Previous, now),
            InputEvent::ToggleMark => self.toggle_mark(now),
            InputEvent::SetShape(shape) => {
                if !self.workspace.selection.set_shape(shape) {
                    self.scheduler.note_activity(now);
                    return true;
                }
                info!("Shape is now {}", shape);
                match self.workspace.view {
                    View::Calendar => self.immediate(&[Dirty::Header], now),
                    View::Chart => self.immediate(&[Dirty::Everything], now),
                }
            }
            InputEvent::ChangeYear(delta) => {
                let today = self.workspace.today();
                self.workspace.selection.change_year(delta, today);
                self.workspace.load_active_year();
                self.immediate(&[Dirty::Everything], now);
            }
            InputEvent::SwitchView => {
                self.workspace.view = match self.workspace.view {
                    View::Calendar => View::Chart,
                    View::Chart => View::Calendar,
                };
                info!("Switched to {:?} view", self.workspace.view);
                self.immediate(&[Dirty::Everything], now);
            }
        }
        true
    }

    /// Let due timers fire
    pub fn poll(&mut self, now: Instant) {
        self.scheduler.poll(now, &mut self.workspace);
    }

    /// Draw anything still waiting in the debounce window, then sleep the panel.
    pub fn shutdown(&mut self, now: Instant) {
        if self.scheduler.pending_render() {
            self.immediate(&[], now);
        }
        if let Err(e) = self.scheduler.session_mut().sleep() {
            warn!("Could not put panel to sleep on exit: {}", e);
        }
        info!("Calendar stopped");
    }

    fn move_cursor(&mut self, direction: Direction, now: Instant) {
        if self.workspace.view == View::Chart {
            debug!("Navigation ignored in plot view");
            self.scheduler.note_activity(now);
            return;
        }
        match self.workspace.selection.move_cursor(direction) {
            MoveOutcome::Revealed => self.interactive(&[], now),
            MoveOutcome::Moved {
                year_changed: true,
                to,
                ..
            } => {
                info!("Crossed into {} at {}", self.workspace.selection.active_year(), to);
                self.workspace.load_active_year();
                self.immediate(&[Dirty::Everything], now);
            }
            // The scheduler repaints the old and new ring cells itself
            MoveOutcome::Moved { .. } => self.interactive(&[], now),
            MoveOutcome::Blocked => {
                debug!("Cursor at the edge of the year");
                self.scheduler.note_activity(now);
            }
        }
    }

    fn toggle_mark(&mut self, now: Instant) {
        if self.workspace.view == View::Chart {
            debug!("Toggle ignored in plot view");
            self.scheduler.note_activity(now);
            return;
        }
        let workspace = &mut self.workspace;
        match workspace.selection.toggle_mark(&mut workspace.store) {
            Ok(cell) => self.interactive(&[Dirty::Cell(cell)], now),
            Err(e) => {
                warn!("Mark not saved, display left unchanged: {}", e);
                self.scheduler.note_activity(now);
            }
        }
    }

    fn interactive(&mut self, dirty: &[Dirty], now: Instant) {
        self.scheduler
            .request_render(Urgency::Interactive, dirty, now, &self.workspace);
    }

    fn immediate(&mut self, dirty: &[Dirty], now: Instant) {
        self.scheduler
            .request_render(Urgency::Immediate, dirty, now, &self.workspace);
    }
}
