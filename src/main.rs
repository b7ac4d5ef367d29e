//! # E-Paper Calendar Entry Point
//!
//! Reads one command per line from stdin and drives the calendar. On a
//! Raspberry Pi built with `--features hardware` the 13.3" panel is used;
//! otherwise (or with `--simulate`) an in-memory panel stands in, optionally
//! writing what it shows to a PBM file after every refresh.

// Test modules
#[cfg(test)]
mod tests;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod gpio_sysfs;
#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_spi_spidev;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use wall_calendar_lib::app::{system_today, CalendarApp};
use wall_calendar_lib::config::Config;
use wall_calendar_lib::driver::DisplayDriver;
use wall_calendar_lib::input::{help, parse_command};
use wall_calendar_lib::renderer::{draw_ascii, CalendarRenderer, RenderAdapter};
use wall_calendar_lib::simulator::VirtualPanel;

/// E-paper wall calendar
#[derive(Parser)]
#[command(name = "epaper-calendar")]
#[command(version)]
#[command(about = "Year-at-a-glance e-paper wall calendar with day marking")]
struct Cli {
    /// Configuration file (default: calendar-config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the in-memory panel even when built with hardware support
    #[arg(long)]
    simulate: bool,

    /// Write the simulated panel to this PBM file after every refresh
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Start in this year instead of the current one
    #[arg(long)]
    year: Option<i32>,

    /// Print the calendar as text after every command
    #[arg(long)]
    ascii: bool,
}

/// Open the SPI panel: DC, RST and BUSY via gpio-cdev, CS left to the kernel.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn open_panel(config: &Config) -> Result<Box<dyn DisplayDriver>> {
    use anyhow::Context;
    use gpio_sysfs::{CdevInputPin, CdevOutputPin};
    use hw_spi_spidev::SpidevHwSpi;
    use linux_embedded_hal::gpio_cdev::Chip;
    use wall_calendar_lib::epd13in3k::{Epd13in3k, EPD_HEIGHT, EPD_WIDTH};

    let hw = &config.hardware;
    info!(
        "Opening panel on {} (DC {}, RST {}, BUSY {})",
        hw.spi_device, hw.dc_pin, hw.rst_pin, hw.busy_pin
    );
    if (config.display.width, config.display.height) != (EPD_WIDTH, EPD_HEIGHT) {
        warn!(
            "Configured size {}x{} does not match the {}x{} panel",
            config.display.width, config.display.height, EPD_WIDTH, EPD_HEIGHT
        );
    }

    let mut chip = Chip::new("/dev/gpiochip0").context("open gpiochip0")?;
    let dc = CdevOutputPin::new(&mut chip, hw.dc_pin)?;
    let rst = CdevOutputPin::new(&mut chip, hw.rst_pin)?;
    let busy = CdevInputPin::new(&mut chip, hw.busy_pin)?;
    let spi = SpidevHwSpi::new(&hw.spi_device)?;

    Ok(Box::new(Epd13in3k::new(spi, None::<CdevOutputPin>, dc, rst, busy)))
}

fn build_driver(cli: &Cli, config: &Config) -> Result<Box<dyn DisplayDriver>> {
    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        if !cli.simulate {
            return open_panel(config);
        }
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        if !cli.simulate {
            info!("Built without hardware support, using the simulated panel");
        }
    }

    let mut panel = VirtualPanel::new(config.display.width, config.display.height);
    if let Some(path) = &cli.preview {
        info!("Simulated panel preview at {}", path.display());
        panel = panel.with_preview(path);
    }
    Ok(Box::new(panel))
}

/// Resolves at `deadline`, or never when there is none
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn run<D, R>(app: &mut CalendarApp<D, R>, ascii: bool)
where
    D: DisplayDriver,
    R: RenderAdapter,
{
    println!("{}", help());
    app.start(Instant::now());
    if ascii {
        draw_ascii(&app.workspace().render_input());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = app.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Reading input failed: {}", e);
                        break;
                    }
                };
                let Some(event) = parse_command(&line) else {
                    warn!("Unknown command {:?}", line);
                    continue;
                };
                if !app.handle(event, Instant::now()) {
                    break;
                }
                if ascii {
                    draw_ascii(&app.workspace().render_input());
                }
            }
            _ = wait_for(deadline) => app.poll(Instant::now()),
        }
    }

    app.shutdown(Instant::now());
}

/// Main application entry point.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let driver = build_driver(&cli, &config)?;
    let renderer = CalendarRenderer::new(
        config.display.width,
        config.display.height,
        config.layout.clone(),
    );
    let mut app = CalendarApp::new(&config, driver, renderer, Box::new(system_today));
    if let Some(year) = cli.year {
        app = app.with_year(year);
    }

    // Single thread: input, timers and rendering never overlap
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(&mut app, cli.ascii));
    Ok(())
}
