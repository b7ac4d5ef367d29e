//! # E-Paper Wall Calendar Core Library
//!
//! This library drives a year-at-a-glance wall calendar on a 13.3" monochrome
//! e-paper panel. The user walks a selection ring across the days with arrow
//! keys, marks days with one of a small set of shapes, and can flip to a
//! per-month bar chart of those marks.
//!
//! ## Design Philosophy
//!
//! ### The panel is slow and fragile
//! - **Full refreshes** flash the whole panel and are the only way to get rid
//!   of ghosting, so they happen after every wake and on layout changes
//! - **Partial refreshes** only touch the cells that changed and are used for
//!   everything else while the panel stays awake
//! - **Bursts of key presses** are coalesced into a single refresh
//!
//! ### State on disk and state on screen agree
//! Every mark toggle is written to the per-year mark file before it is drawn.
//! A failed write is rolled back and never reaches the panel.
//!
//! ### Nothing is fatal after start-up
//! Hardware faults, malformed mark records and missing files are logged and the
//! input loop keeps running.
//!
//! ## Data Flow
//! 1. **Input**: [`input::InputEvent`] arrives from the terminal or buttons
//! 2. **Model**: [`selection::SelectionModel`] and [`mark_store::MarkStore`] mutate
//! 3. **Schedule**: [`scheduler::RefreshScheduler`] debounces and picks full or partial
//! 4. **Render**: [`renderer::CalendarRenderer`] rasterizes into a [`frame::Frame`]
//! 5. **Display**: [`session::DisplaySession`] pushes pixels through a [`driver::DisplayDriver`]
//!
//! ## Core Types
//! - [`ShapeKind`]: the shape a day is marked with
//! - [`MonthDay`]: a validated (month, day) pair within a year
//! - [`Marks`]: all marks of one year, ordered by date

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;

// Module declarations
pub mod app;
pub mod chart;
pub mod config;
pub mod driver;
pub mod epd13in3k;
pub mod frame;
pub mod input;
pub mod mark_store;
pub mod renderer;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod simulator;

/// Shape used to mark ("shade") a day.
///
/// The numeric codes are what the mark files store, so they must never be
/// renumbered. New shapes get the next free code and an entry in [`ShapeKind::ALL`].
///
/// # Example
/// ```
/// use wall_calendar_lib::ShapeKind;
///
/// assert_eq!(ShapeKind::from_code(2), Some(ShapeKind::Square));
/// assert_eq!(ShapeKind::default().code(), 1);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    Triangle,
}

impl ShapeKind {
    /// Every shape in code order.
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Circle, ShapeKind::Square, ShapeKind::Triangle];

    /// Code written to the mark file.
    pub fn code(self) -> u8 {
        match self {
            ShapeKind::Circle => 1,
            ShapeKind::Square => 2,
            ShapeKind::Triangle => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|shape| shape.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Circle => "Circle",
            ShapeKind::Square => "Square",
            ShapeKind::Triangle => "Triangle",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A day of the year, 1-based like a wall calendar.
///
/// Ordering is by month then day, which is the order mark files are written in.
///
/// # Example
/// ```
/// use wall_calendar_lib::MonthDay;
///
/// assert!(MonthDay::new(2024, 2, 29).is_some());
/// assert!(MonthDay::new(2023, 2, 29).is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthDay {
    /// Month, 1..=12
    pub month: u32,
    /// Day of month, 1..=days_in_month
    pub day: u32,
}

impl MonthDay {
    /// Build a date that is valid in `year`.
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        let candidate = MonthDay { month, day };
        candidate.is_valid_in(year).then_some(candidate)
    }

    pub fn is_valid_in(&self, year: i32) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(year, self.month)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        MonthDay {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

/// All marks of one year. At most one shape per day.
pub type Marks = BTreeMap<MonthDay, ShapeKind>;

/// Proleptic Gregorian leap year rule.
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1..=12) of `year`; 0 for an out-of-range month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Weekday of the first of `month`, 0 = Monday .. 6 = Sunday.
pub fn first_weekday(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| date.weekday().num_days_from_monday())
        .unwrap_or(0)
}

/// Three-letter English month abbreviation for `month` (1..=12).
pub fn month_abbr(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    month
        .checked_sub(1)
        .and_then(|index| NAMES.get(index as usize))
        .copied()
        .unwrap_or("???")
}
