//! # Calendar Selection
//!
//! Tracks the cursor (the "ring") the user moves across the year, whether the
//! ring is currently shown, and which shape a toggle will place.
//!
//! Indices are zero-based internally (`month_index` 0..=11, `day_index`
//! 0..days_in_month) and the day index is always valid for the month it sits
//! in. None of these operations touch the display; the caller turns every
//! state change into a render request.

use crate::mark_store::{MarkStore, StoreError};
use crate::{days_in_month, MonthDay, ShapeKind};
use chrono::{Datelike, NaiveDate};
use log::debug;

/// Cursor movement direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// What a call to [`SelectionModel::move_cursor`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The ring was hidden; it is now shown at the unchanged cursor
    Revealed,
    /// The cursor moved one day
    Moved {
        from: MonthDay,
        to: MonthDay,
        /// True when the move crossed into another year
        year_changed: bool,
    },
    /// At a year boundary with rollover disabled; nothing changed
    Blocked,
}

/// Current year, cursor, ring visibility and mark shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionModel {
    active_year: i32,
    month_index: u32,
    day_index: u32,
    ring_visible: bool,
    current_shape: ShapeKind,
    year_rollover: bool,
}

impl SelectionModel {
    /// Cursor on `today`, ring hidden, default shape.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            active_year: today.year(),
            month_index: today.month0(),
            day_index: today.day0(),
            ring_visible: false,
            current_shape: ShapeKind::default(),
            year_rollover: false,
        }
    }

    /// Cursor at an explicit date. Returns `None` if `cell` does not exist in `year`.
    pub fn at(year: i32, cell: MonthDay) -> Option<Self> {
        cell.is_valid_in(year).then(|| Self {
            active_year: year,
            month_index: cell.month - 1,
            day_index: cell.day - 1,
            ring_visible: false,
            current_shape: ShapeKind::default(),
            year_rollover: false,
        })
    }

    /// Allow the cursor to walk across Dec 31 / Jan 1 into the adjacent year.
    pub fn with_year_rollover(mut self, allowed: bool) -> Self {
        self.year_rollover = allowed;
        self
    }

    pub fn active_year(&self) -> i32 {
        self.active_year
    }

    pub fn month_index(&self) -> u32 {
        self.month_index
    }

    pub fn day_index(&self) -> u32 {
        self.day_index
    }

    pub fn ring_visible(&self) -> bool {
        self.ring_visible
    }

    pub fn current_shape(&self) -> ShapeKind {
        self.current_shape
    }

    /// The cursor as a 1-based date
    pub fn cursor(&self) -> MonthDay {
        MonthDay {
            month: self.month_index + 1,
            day: self.day_index + 1,
        }
    }

    /// The cell the ring is drawn on, if it is shown
    pub fn ring_cell(&self) -> Option<MonthDay> {
        self.ring_visible.then(|| self.cursor())
    }

    fn days_in_current_month(&self) -> u32 {
        days_in_month(self.active_year, self.month_index + 1)
    }

    /// Move the cursor one day.
    ///
    /// A hidden ring is only revealed by the first call. Months wrap in both
    /// directions; the year boundary is crossed only when rollover is allowed.
    pub fn move_cursor(&mut self, direction: Direction) -> MoveOutcome {
        if !self.ring_visible {
            self.ring_visible = true;
            return MoveOutcome::Revealed;
        }

        let from = self.cursor();
        let mut year_changed = false;
        match direction {
            Direction::Next => {
                if self.day_index + 1 < self.days_in_current_month() {
                    self.day_index += 1;
                } else if self.month_index < 11 {
                    self.month_index += 1;
                    self.day_index = 0;
                } else if self.year_rollover {
                    self.active_year += 1;
                    self.month_index = 0;
                    self.day_index = 0;
                    year_changed = true;
                } else {
                    return MoveOutcome::Blocked;
                }
            }
            Direction::Previous => {
                if self.day_index > 0 {
                    self.day_index -= 1;
                } else if self.month_index > 0 {
                    self.month_index -= 1;
                    self.day_index = self.days_in_current_month() - 1;
                } else if self.year_rollover {
                    self.active_year -= 1;
                    self.month_index = 11;
                    self.day_index = 30;
                    year_changed = true;
                } else {
                    return MoveOutcome::Blocked;
                }
            }
        }

        let to = self.cursor();
        debug!("Cursor {:?}: {} -> {}", direction, from, to);
        MoveOutcome::Moved {
            from,
            to,
            year_changed,
        }
    }

    /// Toggle the cursor's day with the current shape and persist it.
    ///
    /// Returns the toggled day. The store decides between set and clear by
    /// comparing the existing shape with [`SelectionModel::current_shape`].
    pub fn toggle_mark(&self, store: &mut MarkStore) -> Result<MonthDay, StoreError> {
        let cell = self.cursor();
        store.toggle(self.active_year, cell.month, cell.day, self.current_shape)?;
        Ok(cell)
    }

    /// Change the shape future toggles place. Returns true if it changed.
    pub fn set_shape(&mut self, shape: ShapeKind) -> bool {
        let changed = self.current_shape != shape;
        self.current_shape = shape;
        changed
    }

    /// Put the cursor on `today` and show the ring.
    ///
    /// Returns true when this moved the selection into a different year.
    pub fn revert_to_today(&mut self, today: NaiveDate) -> bool {
        let year_changed = self.active_year != today.year();
        self.active_year = today.year();
        self.month_index = today.month0();
        self.day_index = today.day0();
        self.ring_visible = true;
        year_changed
    }

    /// Switch the active year by `delta` and reset the cursor.
    ///
    /// The cursor lands on today when the new year is the current one and on
    /// January 1st otherwise. The ring is hidden again.
    pub fn change_year(&mut self, delta: i32, today: NaiveDate) {
        self.active_year += delta;
        if self.active_year == today.year() {
            self.month_index = today.month0();
            self.day_index = today.day0();
        } else {
            self.month_index = 0;
            self.day_index = 0;
        }
        self.ring_visible = false;
    }
}
