//! # Calendar Rendering
//!
//! Turns the calendar state into a 1-bit [`Frame`] for the panel, and into a
//! plain text grid for development mode.
//!
//! ## Layout
//! ```text
//!                        2024                      Shape: Circle
//!      M T W T F S S M T W T F S S M T ...
//! Jan  [01][02][03]...
//! Feb           [01][02]...
//! ```
//! - One row per month. Day boxes are shifted by the weekday of the 1st so that
//!   every column lines up with the weekday letters across the top.
//! - Today gets a 2px box, the selection ring a 2px frame just outside the box.
//! - Marks are drawn as small filled shapes in the lower half of the box.
//!
//! All geometry comes from [`LayoutConfig`], so the same code serves any panel
//! the layout fits on.

use crate::config::LayoutConfig;
use crate::frame::{Frame, Region};
use crate::selection::SelectionModel;
use crate::{days_in_month, first_weekday, month_abbr, MonthDay, Marks, ShapeKind};
use chrono::{Datelike, NaiveDate};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{
        Circle, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment, Triangle,
    },
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

/// Weekday letters, Monday first
const WEEKDAYS: [char; 7] = ['M', 'T', 'W', 'T', 'F', 'S', 'S'];

/// Ring drawn this far outside the day box
const RING_MARGIN: u32 = 2;

/// Everything a render needs to know about the calendar state
#[derive(Clone, Copy, Debug)]
pub struct RenderInput<'a> {
    pub year: i32,
    pub selection: &'a SelectionModel,
    pub marks: &'a Marks,
    pub today: NaiveDate,
}

/// Pure rasterization of calendar state.
///
/// Implementations must be deterministic: the same input always gives the same
/// pixels. The `render_*` variants that take a frame repaint only their own
/// area and report it, which is what partial refreshes are built from.
pub trait RenderAdapter {
    /// Panel size this adapter renders for
    fn size(&self) -> (u32, u32);

    /// The whole year view
    fn render(&self, input: &RenderInput<'_>) -> Frame;

    /// Repaint one day cell onto `frame`; `None` if the day is not in `input.year`
    fn render_cell(&self, frame: &mut Frame, input: &RenderInput<'_>, cell: MonthDay)
        -> Option<Region>;

    /// Repaint the header strip (year and current shape) onto `frame`
    fn render_header(&self, frame: &mut Frame, input: &RenderInput<'_>) -> Region;

    /// Bar chart of `shape` marks per month
    fn render_chart(&self, year: i32, shape: ShapeKind, marks: &Marks) -> Frame;
}

/// Year-at-a-glance renderer for the e-paper panel
#[derive(Clone, Debug)]
pub struct CalendarRenderer {
    width: u32,
    height: u32,
    layout: LayoutConfig,
}

impl CalendarRenderer {
    pub fn new(width: u32, height: u32, layout: LayoutConfig) -> Self {
        Self {
            width,
            height,
            layout,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    fn start_x(&self) -> u32 {
        self.layout.padding + self.layout.label_width
    }

    fn first_month_y(&self) -> u32 {
        self.layout.weekday_row_y + self.layout.day_height + self.layout.row_gap
    }

    fn column_pitch(&self) -> u32 {
        self.layout.day_width + self.layout.padding
    }

    fn month_y(&self, month: u32) -> u32 {
        let row_pitch = self.layout.day_height + self.layout.padding + self.layout.row_gap;
        self.first_month_y() + (month - 1) * row_pitch
    }

    /// Top-left corner of the day box
    pub fn cell_origin(&self, year: i32, cell: MonthDay) -> Option<(u32, u32)> {
        if !cell.is_valid_in(year) {
            return None;
        }
        let column = first_weekday(year, cell.month) + cell.day - 1;
        Some((
            self.start_x() + column * self.column_pitch(),
            self.month_y(cell.month),
        ))
    }

    /// Pixels owned by a day cell, ring included
    pub fn cell_region(&self, year: i32, cell: MonthDay) -> Option<Region> {
        let (x, y) = self.cell_origin(year, cell)?;
        let region = Region::new(
            x.saturating_sub(RING_MARGIN),
            y.saturating_sub(RING_MARGIN),
            x + self.layout.day_width + 1 + RING_MARGIN,
            y + self.layout.day_height + 1 + RING_MARGIN,
        );
        Some(region.clamped(self.width, self.height))
    }

    /// Strip above the weekday letters holding the year and the shape indicator
    pub fn header_region(&self) -> Region {
        Region::new(0, 0, self.width, self.layout.weekday_row_y).clamped(self.width, self.height)
    }

    fn draw_header(&self, frame: &mut Frame, input: &RenderInput<'_>) {
        let big = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let centered = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Top)
            .build();

        Text::with_text_style(
            &input.year.to_string(),
            Point::new(self.width as i32 / 2, self.layout.header_y as i32),
            big,
            centered,
        )
        .draw(frame)
        .ok();

        // Shape indicator, right-aligned: "Shape: Circle" followed by a glyph
        let shape = input.selection.current_shape();
        let label = format!("Shape: {}", shape.name());
        let glyph_size = 12;
        let right = self.width.saturating_sub(self.layout.padding + glyph_size) as i32;
        let label_x = right - 6 - (label.len() as i32 * 6);
        Text::with_baseline(
            &label,
            Point::new(label_x, self.layout.header_y as i32 + 4),
            small,
            Baseline::Top,
        )
        .draw(frame)
        .ok();
        draw_shape(
            frame,
            shape,
            Point::new(
                right + glyph_size as i32 / 2,
                self.layout.header_y as i32 + 9,
            ),
            glyph_size,
        );
    }

    fn draw_weekday_row(&self, frame: &mut Frame, year: i32) {
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let january_start = first_weekday(year, 1);
        for column in 0..self.layout.weekday_columns {
            let letter = WEEKDAYS[((january_start + column) % 7) as usize];
            let x = self.start_x() + column * self.column_pitch() + self.layout.day_width / 2 - 3;
            Text::with_baseline(
                &letter.to_string(),
                Point::new(x as i32, self.layout.weekday_row_y as i32),
                small,
                Baseline::Top,
            )
            .draw(frame)
            .ok();
        }
    }

    fn draw_month_labels(&self, frame: &mut Frame) {
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        for month in 1..=12 {
            let y = self.month_y(month) + self.layout.day_height / 2 - 5;
            Text::with_baseline(
                month_abbr(month),
                Point::new(self.layout.padding as i32, y as i32),
                small,
                Baseline::Top,
            )
            .draw(frame)
            .ok();
        }
    }

    fn draw_cell(
        &self,
        frame: &mut Frame,
        input: &RenderInput<'_>,
        cell: MonthDay,
    ) -> Option<Region> {
        let (x, y) = self.cell_origin(input.year, cell)?;
        let region = self.cell_region(input.year, cell)?;
        frame.fill_region(region, false);

        let origin = Point::new(x as i32, y as i32);
        let size = Size::new(self.layout.day_width + 1, self.layout.day_height + 1);
        let is_today = input.today.year() == input.year && MonthDay::from_date(input.today) == cell;
        let box_style = PrimitiveStyleBuilder::new()
            .stroke_color(BinaryColor::On)
            .stroke_width(if is_today { 2 } else { 1 })
            .stroke_alignment(StrokeAlignment::Inside)
            .build();
        Rectangle::new(origin, size)
            .into_styled(box_style)
            .draw(frame)
            .ok();

        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let number_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Top)
            .build();
        Text::with_text_style(
            &format!("{:02}", cell.day),
            Point::new((x + self.layout.day_width / 2) as i32 + 1, y as i32 + 3),
            small,
            number_style,
        )
        .draw(frame)
        .ok();

        if let Some(shape) = input.marks.get(&cell) {
            let mark_size = (self.layout.day_width.min(self.layout.day_height) / 2).max(4);
            let center = Point::new(
                (x + self.layout.day_width / 2) as i32,
                (y + self.layout.day_height) as i32 - mark_size as i32 / 2 - 3,
            );
            draw_shape(frame, *shape, center, mark_size);
        }

        if input.selection.ring_cell() == Some(cell) {
            let ring_style = PrimitiveStyleBuilder::new()
                .stroke_color(BinaryColor::On)
                .stroke_width(RING_MARGIN)
                .stroke_alignment(StrokeAlignment::Inside)
                .build();
            Rectangle::new(
                origin - Point::new(RING_MARGIN as i32, RING_MARGIN as i32),
                size + Size::new(2 * RING_MARGIN, 2 * RING_MARGIN),
            )
            .into_styled(ring_style)
            .draw(frame)
            .ok();
        }

        Some(region)
    }
}

/// Filled shape of roughly `size` pixels across, centered on `center`
pub fn draw_shape(frame: &mut Frame, shape: ShapeKind, center: Point, size: u32) {
    let fill = PrimitiveStyle::with_fill(BinaryColor::On);
    match shape {
        ShapeKind::Circle => {
            Circle::with_center(center, size)
                .into_styled(fill)
                .draw(frame)
                .ok();
        }
        ShapeKind::Square => {
            let side = size.saturating_sub(1).max(1);
            Rectangle::with_center(center, Size::new(side, side))
                .into_styled(fill)
                .draw(frame)
                .ok();
        }
        ShapeKind::Triangle => {
            let half = size as i32 / 2;
            Triangle::new(
                center + Point::new(0, -half),
                center + Point::new(-half, half),
                center + Point::new(half, half),
            )
            .into_styled(fill)
            .draw(frame)
            .ok();
        }
    }
}

impl RenderAdapter for CalendarRenderer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&self, input: &RenderInput<'_>) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        self.draw_header(&mut frame, input);
        self.draw_weekday_row(&mut frame, input.year);
        self.draw_month_labels(&mut frame);
        for month in 1..=12 {
            for day in 1..=days_in_month(input.year, month) {
                self.draw_cell(&mut frame, input, MonthDay { month, day });
            }
        }
        frame
    }

    fn render_cell(
        &self,
        frame: &mut Frame,
        input: &RenderInput<'_>,
        cell: MonthDay,
    ) -> Option<Region> {
        self.draw_cell(frame, input, cell)
    }

    fn render_header(&self, frame: &mut Frame, input: &RenderInput<'_>) -> Region {
        let region = self.header_region();
        frame.fill_region(region, false);
        self.draw_header(frame, input);
        region
    }

    fn render_chart(&self, year: i32, shape: ShapeKind, marks: &Marks) -> Frame {
        crate::chart::render_chart(self.width, self.height, year, shape, marks)
    }
}

/// Year grid as text, for development mode.
///
/// Each day is five characters: `*` for today, `[`/`]` around the ring, and
/// `o`, `#` or `^` after the number for circle, square and triangle marks.
pub fn ascii_calendar(input: &RenderInput<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:^40}   shape: {}\n",
        input.year,
        input.selection.current_shape()
    ));

    let january_start = first_weekday(input.year, 1);
    let header: String = (0..37)
        .map(|column| format!("  {}  ", WEEKDAYS[((january_start + column) % 7) as usize]))
        .collect();
    out.push_str(&format!("    {}\n", header.trim_end()));

    for month in 1..=12 {
        let mut row = format!("{} ", month_abbr(month));
        row.push_str(&"     ".repeat(first_weekday(input.year, month) as usize));
        for day in 1..=days_in_month(input.year, month) {
            let cell = MonthDay { month, day };
            let ringed = input.selection.ring_cell() == Some(cell);
            let is_today =
                input.today.year() == input.year && MonthDay::from_date(input.today) == cell;
            let open = if ringed {
                '['
            } else if is_today {
                '*'
            } else {
                ' '
            };
            let mark = match input.marks.get(&cell) {
                Some(ShapeKind::Circle) => 'o',
                Some(ShapeKind::Square) => '#',
                Some(ShapeKind::Triangle) => '^',
                None => ' ',
            };
            let close = if ringed { ']' } else { ' ' };
            row.push_str(&format!("{open}{day:02}{mark}{close}"));
        }
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

/// Print the year grid to stdout
pub fn draw_ascii(input: &RenderInput<'_>) {
    println!("{}", ascii_calendar(input));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn renderer() -> CalendarRenderer {
        let config = Config::default();
        CalendarRenderer::new(config.display.width, config.display.height, config.layout)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn selection_at(month: u32, day: u32, ring: bool) -> SelectionModel {
        let mut selection = SelectionModel::at(2024, MonthDay { month, day }).unwrap();
        if ring {
            selection.move_cursor(crate::selection::Direction::Next);
        }
        selection
    }

    /// 2024 as drawn for `selection` and `marks`
    fn input_2024<'a>(
        selection: &'a SelectionModel,
        marks: &'a Marks,
        today: NaiveDate,
    ) -> RenderInput<'a> {
        RenderInput {
            year: 2024,
            selection,
            marks,
            today,
        }
    }

    #[test]
    fn test_every_cell_fits_on_panel() {
        let renderer = renderer();
        for year in [2023, 2024, 2026, 2028] {
            for month in 1..=12 {
                for day in 1..=days_in_month(year, month) {
                    let region = renderer.cell_region(year, MonthDay { month, day }).unwrap();
                    assert!(region.x1 <= 960 && region.y1 <= 680, "{year}-{month}-{day}");
                    assert!(!region.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_cells_do_not_overlap() {
        let renderer = renderer();
        let a = renderer.cell_region(2024, MonthDay { month: 3, day: 15 }).unwrap();
        let b = renderer.cell_region(2024, MonthDay { month: 3, day: 16 }).unwrap();
        let below = renderer.cell_region(2024, MonthDay { month: 4, day: 15 }).unwrap();
        assert!(a.x1 <= b.x0);
        assert!(a.y1 <= below.y0);
        assert!(renderer.header_region().y1 <= a.y0);
    }

    #[test]
    fn test_invalid_cell_has_no_region() {
        let renderer = renderer();
        assert!(renderer.cell_region(2023, MonthDay { month: 2, day: 29 }).is_none());
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = renderer();
        let selection = selection_at(3, 15, true);
        let marks = Marks::new();
        let input = RenderInput {
            year: 2024,
            selection: &selection,
            marks: &marks,
            today: date(2024, 3, 10),
        };
        let first = renderer.render(&input);
        assert!(first.black_pixels() > 0);
        assert_eq!(first, renderer.render(&input));
    }

    #[test]
    fn test_mark_changes_only_its_cell() {
        let renderer = renderer();
        let selection = selection_at(3, 15, false);
        let empty = Marks::new();
        let mut marked = Marks::new();
        let cell = MonthDay { month: 5, day: 20 };
        marked.insert(cell, ShapeKind::Triangle);
        let today = date(2024, 1, 1);

        let before = renderer.render(&input_2024(&selection, &empty, today));
        let after = renderer.render(&input_2024(&selection, &marked, today));

        let diff = after.diff_bounds(&before).unwrap();
        let region = renderer.cell_region(2024, cell).unwrap();
        assert_eq!(diff.union(&region), region, "diff {diff:?} outside {region:?}");
    }

    #[test]
    fn test_render_cell_matches_full_render() {
        let renderer = renderer();
        let today = date(2024, 1, 1);
        let hidden = selection_at(3, 15, false);
        let ringed = selection_at(3, 15, true);
        let mut marks = Marks::new();
        marks.insert(MonthDay { month: 3, day: 15 }, ShapeKind::Square);

        let unmarked = Marks::new();
        let old = input_2024(&hidden, &unmarked, today);
        let new = input_2024(&ringed, &marks, today);

        let mut patched = renderer.render(&old);
        renderer
            .render_cell(&mut patched, &new, MonthDay { month: 3, day: 15 })
            .unwrap();
        assert_eq!(patched, renderer.render(&new));
    }

    #[test]
    fn test_render_header_matches_full_render() {
        let renderer = renderer();
        let today = date(2024, 1, 1);
        let circle = selection_at(3, 15, false);
        let mut triangle = circle.clone();
        triangle.set_shape(ShapeKind::Triangle);
        let marks = Marks::new();

        let mut patched = renderer.render(&input_2024(&circle, &marks, today));
        let new = input_2024(&triangle, &marks, today);
        renderer.render_header(&mut patched, &new);
        assert_eq!(patched, renderer.render(&new));
    }

    #[test]
    fn test_ascii_calendar_marks_ring_and_today() {
        let selection = selection_at(3, 15, true);
        let mut marks = Marks::new();
        marks.insert(MonthDay { month: 3, day: 16 }, ShapeKind::Circle);
        let text = ascii_calendar(&RenderInput {
            year: 2024,
            selection: &selection,
            marks: &marks,
            today: date(2024, 3, 10),
        });

        assert_eq!(text.lines().count(), 14);
        let march = text.lines().find(|line| line.starts_with("Mar")).unwrap();
        assert!(march.contains("[15 ]"));
        assert!(march.contains(" 16o "));
        assert!(march.contains("*10 "));
    }
}
