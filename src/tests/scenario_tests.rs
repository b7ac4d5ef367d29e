//! # End-to-End Calendar Scenarios
//!
//! These tests drive the same pieces the binary wires together (config,
//! mark store, renderer, scheduler and the simulated panel) through the
//! situations a wall calendar actually meets: a first boot with no data, a
//! burst of key presses, an old mark file, and a night of idling.

use std::fs;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tempfile::TempDir;
use wall_calendar_lib::app::CalendarApp;
use wall_calendar_lib::config::Config;
use wall_calendar_lib::frame::Region;
use wall_calendar_lib::input::parse_command;
use wall_calendar_lib::mark_store::MarkStore;
use wall_calendar_lib::renderer::{CalendarRenderer, RenderAdapter};
use wall_calendar_lib::session::{PanelState, RefreshKind};
use wall_calendar_lib::simulator::{PanelOp, VirtualPanel};
use wall_calendar_lib::{days_in_month, Marks, MonthDay, ShapeKind};

type App = CalendarApp<VirtualPanel, CalendarRenderer>;

fn march_15() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn boot(dir: &TempDir) -> App {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("CalendarDatabase");
    let renderer = CalendarRenderer::new(
        config.display.width,
        config.display.height,
        config.layout.clone(),
    );
    let panel = VirtualPanel::new(config.display.width, config.display.height);
    CalendarApp::new(&config, panel, renderer, Box::new(march_15))
}

fn send(app: &mut App, commands: &[&str], at: Instant) {
    for command in commands {
        let event = parse_command(command).unwrap();
        assert!(app.handle(event, at));
    }
}

fn refreshes(app: &App) -> usize {
    let panel = app.scheduler().session().driver();
    panel.count(PanelOp::Display) + panel.count(PanelOp::DisplayPartial(Region::default()))
}

/// First boot on an empty SD card: the data directory and the year file are
/// created and the first picture is a full refresh.
#[test]
fn first_boot_creates_storage_and_full_refreshes() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    app.start(Instant::now());

    let year_file = dir.path().join("CalendarDatabase").join("2024.txt");
    assert_eq!(fs::read_to_string(year_file).unwrap(), "");
    assert_eq!(
        app.scheduler().session().driver().ops(),
        &[PanelOp::Init, PanelOp::Clear, PanelOp::Display]
    );
}

/// The first arrow press only shows the ring on today; the second moves it.
#[test]
fn first_press_reveals_ring_then_moves() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    let t0 = Instant::now();
    app.start(t0);

    send(&mut app, &["right"], t0);
    assert!(app.selection().ring_visible());
    assert_eq!(app.selection().cursor(), MonthDay { month: 3, day: 15 });
    assert!(app.scheduler().pending_render());

    send(&mut app, &["right"], t0);
    assert_eq!(app.selection().month_index(), 2);
    assert_eq!(app.selection().day_index(), 15);
}

/// Six quick presses inside the debounce window become one partial refresh
/// covering where the ring was and where it ended up.
#[test]
fn key_burst_becomes_one_partial_refresh() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    let t0 = Instant::now();
    app.start(t0);
    let after_start = refreshes(&app);

    for i in 0..6 {
        let at = t0 + Duration::from_millis(150 * i);
        send(&mut app, &["n"], at);
        app.poll(at);
    }
    assert_eq!(refreshes(&app), after_start);

    app.poll(t0 + Duration::from_millis(750 + 1000));
    assert_eq!(refreshes(&app), after_start + 1);
    assert_eq!(app.scheduler().last_refresh(), Some(RefreshKind::Partial));
    assert_eq!(app.selection().cursor(), MonthDay { month: 3, day: 20 });
}

/// Marking a day writes it, marking it again with the same shape clears it,
/// and a different shape replaces rather than clears.
#[test]
fn toggle_marks_follow_the_current_shape() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    let t0 = Instant::now();
    app.start(t0);
    let year_file = dir.path().join("CalendarDatabase").join("2024.txt");

    send(&mut app, &["t"], t0);
    assert_eq!(fs::read_to_string(&year_file).unwrap(), "3,15,1\n");

    send(&mut app, &["2", "t"], t0);
    assert_eq!(fs::read_to_string(&year_file).unwrap(), "3,15,2\n");
    assert_eq!(
        app.workspace().marks().get(&MonthDay { month: 3, day: 15 }),
        Some(&ShapeKind::Square)
    );

    send(&mut app, &["t"], t0);
    assert_eq!(fs::read_to_string(&year_file).unwrap(), "");
    assert!(app.workspace().marks().is_empty());
}

/// Files written before shapes existed only carry `month,day`.
#[test]
fn legacy_two_field_file_loads_as_circles() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("CalendarDatabase");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("2024.txt"), "3,15\nnot a record\n12,25,3\n").unwrap();

    let mut app = boot(&dir);
    app.start(Instant::now());

    let marks = app.workspace().marks();
    assert_eq!(marks.len(), 2);
    assert_eq!(marks.get(&MonthDay { month: 3, day: 15 }), Some(&ShapeKind::Circle));
    assert_eq!(marks.get(&MonthDay { month: 12, day: 25 }), Some(&ShapeKind::Triangle));
}

/// Whatever is saved comes back unchanged.
#[test]
fn saved_marks_load_back() {
    let dir = TempDir::new().unwrap();
    let mut store = MarkStore::new(dir.path());
    let mut marks = Marks::new();
    for month in 1..=12 {
        let last = days_in_month(2024, month);
        marks.insert(MonthDay { month, day: last }, ShapeKind::ALL[(month % 3) as usize]);
    }

    store.save(2024, &marks).unwrap();
    assert_eq!(store.load(2024).unwrap(), &marks);
}

/// Left alone, the calendar goes back to today, redraws in full and sleeps.
/// The next key press wakes it with a full refresh.
#[test]
fn idle_night_then_morning_press() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    let t0 = Instant::now();
    app.start(t0);
    send(&mut app, &["n", "n", "n"], t0);
    app.poll(t0 + Duration::from_secs(1));

    app.poll(t0 + Duration::from_secs(61));
    assert_eq!(app.selection().cursor(), MonthDay { month: 3, day: 15 });
    assert!(app.selection().ring_visible());
    assert_eq!(app.scheduler().session().state(), PanelState::Asleep);
    assert_eq!(app.next_deadline(), None);

    let morning = t0 + Duration::from_secs(8 * 3600);
    send(&mut app, &["n"], morning);
    app.poll(morning + Duration::from_secs(1));
    assert_eq!(app.scheduler().last_refresh(), Some(RefreshKind::Full));
    assert!(app.scheduler().session().is_awake());
}

/// A panel that fails once does not take the calendar down with it.
#[test]
fn hardware_fault_does_not_stop_input() {
    let dir = TempDir::new().unwrap();
    let mut app = boot(&dir);
    let t0 = Instant::now();
    app.start(t0);

    app.scheduler_mut()
        .session_mut()
        .driver_mut()
        .fail_next(PanelOp::DisplayPartial(Region::default()));
    send(&mut app, &["t"], t0);
    app.poll(t0 + Duration::from_secs(1));
    let before = app.scheduler().render_count();

    send(&mut app, &["n"], t0 + Duration::from_secs(2));
    app.poll(t0 + Duration::from_secs(3));
    assert_eq!(app.scheduler().render_count(), before + 1);

    // The mark that failed to show is on the panel now
    let renderer = CalendarRenderer::new(960, 680, Config::default().layout);
    let expected = renderer.render(&app.workspace().render_input());
    assert_eq!(app.scheduler().session().driver().screen(), &expected);
}
