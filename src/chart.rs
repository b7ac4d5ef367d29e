//! Plot view: how many days were marked with one shape, per month.

use crate::frame::Frame;
use crate::{month_abbr, Marks, ShapeKind};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

const MARGIN_LEFT: i32 = 70;
const MARGIN_RIGHT: i32 = 30;
const MARGIN_TOP: i32 = 60;
const MARGIN_BOTTOM: i32 = 60;

/// Count of `shape` marks in each month, January first
pub fn monthly_counts(marks: &Marks, shape: ShapeKind) -> [u32; 12] {
    let mut counts = [0u32; 12];
    for (cell, _) in marks.iter().filter(|(_, marked)| **marked == shape) {
        let slot = cell
            .month
            .checked_sub(1)
            .and_then(|index| counts.get_mut(index as usize));
        if let Some(slot) = slot {
            *slot += 1;
        }
    }
    counts
}

/// Tick spacing giving at most about six ticks up to `max`
fn tick_step(max: u32) -> u32 {
    match max {
        0..=6 => 1,
        7..=12 => 2,
        13..=30 => 5,
        _ => 10,
    }
}

/// Render the per-month bar chart for `shape` in `year`.
///
/// With no marks the axes are still drawn so the view never looks blank.
pub fn render_chart(width: u32, height: u32, year: i32, shape: ShapeKind, marks: &Marks) -> Frame {
    let mut frame = Frame::new(width, height);
    let counts = monthly_counts(marks, shape);
    let max = counts.iter().copied().max().unwrap_or(0);
    let step = tick_step(max);
    let axis_max = max.div_ceil(step).max(1) * step;

    let big = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
    let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let centered = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Top)
        .build();
    let right_aligned = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Middle)
        .build();
    let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 2);

    Text::with_text_style(
        &format!("{} Shaded Days in {}", shape.name(), year),
        Point::new(width as i32 / 2, 15),
        big,
        centered,
    )
    .draw(&mut frame)
    .ok();

    let plot_left = MARGIN_LEFT;
    let plot_right = width as i32 - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = height as i32 - MARGIN_BOTTOM;
    let plot_height = (plot_bottom - plot_top).max(1);

    // Axes
    Line::new(Point::new(plot_left, plot_top), Point::new(plot_left, plot_bottom))
        .into_styled(stroke)
        .draw(&mut frame)
        .ok();
    Line::new(Point::new(plot_left, plot_bottom), Point::new(plot_right, plot_bottom))
        .into_styled(stroke)
        .draw(&mut frame)
        .ok();

    // Y ticks and labels
    let value_to_y = |value: u32| plot_bottom - (value as i32 * plot_height / axis_max as i32);
    let mut value = 0;
    while value <= axis_max {
        let y = value_to_y(value);
        Line::new(Point::new(plot_left - 6, y), Point::new(plot_left, y))
            .into_styled(stroke)
            .draw(&mut frame)
            .ok();
        Text::with_text_style(
            &value.to_string(),
            Point::new(plot_left - 10, y),
            small,
            right_aligned,
        )
        .draw(&mut frame)
        .ok();
        value += step;
    }
    Text::with_baseline("Days", Point::new(10, plot_top - 20), small, Baseline::Top)
        .draw(&mut frame)
        .ok();

    // Bars and month labels
    let slot = (plot_right - plot_left) / 12;
    let bar_width = (slot * 3 / 5).max(1);
    for (index, count) in counts.iter().enumerate() {
        let center_x = plot_left + slot * index as i32 + slot / 2;
        if *count > 0 {
            let top = value_to_y(*count);
            Rectangle::new(
                Point::new(center_x - bar_width / 2, top),
                Size::new(bar_width as u32, (plot_bottom - top) as u32),
            )
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .ok();
        }
        Text::with_text_style(
            month_abbr(index as u32 + 1),
            Point::new(center_x, plot_bottom + 8),
            small,
            centered,
        )
        .draw(&mut frame)
        .ok();
    }
    Text::with_text_style(
        "Month",
        Point::new((plot_left + plot_right) / 2, plot_bottom + 30),
        small,
        centered,
    )
    .draw(&mut frame)
    .ok();

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Region;
    use crate::MonthDay;

    fn marks() -> Marks {
        let mut marks = Marks::new();
        marks.insert(MonthDay { month: 1, day: 3 }, ShapeKind::Circle);
        marks.insert(MonthDay { month: 1, day: 4 }, ShapeKind::Circle);
        marks.insert(MonthDay { month: 1, day: 5 }, ShapeKind::Square);
        marks.insert(MonthDay { month: 12, day: 25 }, ShapeKind::Circle);
        marks
    }

    #[test]
    fn test_monthly_counts_filter_by_shape() {
        let counts = monthly_counts(&marks(), ShapeKind::Circle);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[11], 1);
        assert_eq!(counts.iter().sum::<u32>(), 3);

        let squares = monthly_counts(&marks(), ShapeKind::Square);
        assert_eq!(squares[0], 1);
        assert_eq!(monthly_counts(&marks(), ShapeKind::Triangle), [0; 12]);
    }

    #[test]
    fn test_monthly_counts_ignore_out_of_range_months() {
        let mut marks = marks();
        marks.insert(MonthDay { month: 0, day: 1 }, ShapeKind::Circle);
        marks.insert(MonthDay { month: 13, day: 1 }, ShapeKind::Circle);
        let counts = monthly_counts(&marks, ShapeKind::Circle);
        assert_eq!(counts.iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_tick_step() {
        assert_eq!(tick_step(0), 1);
        assert_eq!(tick_step(10), 2);
        assert_eq!(tick_step(31), 10);
    }

    #[test]
    fn test_chart_draws_bars_for_marked_months_only() {
        let frame = render_chart(960, 680, 2024, ShapeKind::Circle, &marks());
        let slot = (960 - MARGIN_RIGHT - MARGIN_LEFT) / 12;
        let bar_area = |month: i32| {
            let center = MARGIN_LEFT + slot * month + slot / 2;
            Region::new(
                center as u32 - 2,
                MARGIN_TOP as u32 + 10,
                center as u32 + 2,
                680 - MARGIN_BOTTOM as u32 - 4,
            )
        };
        // January is the tallest bar and reaches the top tick
        assert!(frame.black_pixels_in(bar_area(0)) > 0);
        // March has no circles
        assert_eq!(frame.black_pixels_in(bar_area(2)), 0);
    }

    #[test]
    fn test_empty_chart_still_has_axes() {
        let frame = render_chart(960, 680, 2024, ShapeKind::Triangle, &Marks::new());
        assert!(frame.black_pixels() > 0);
    }
}
