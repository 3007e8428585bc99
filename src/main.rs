//! screen-zones CLI
//!
//! Lists capture backends and displays, and runs capture loops that print
//! the average color and black bars of each registered zone.

use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use screen_zones::api::config_store::{load_config, save_config};
use screen_zones::{
    list_backends, BlackBarEdges, BlackBars, CaptureBackend, CaptureConfig, CaptureZone,
    ColorBgra, FrameFeed, Image, MemoryCaptureBackend, Pixel, ScreenCapture,
    ScreenCaptureService,
};

#[derive(Parser)]
#[command(name = "screen-zones")]
#[command(about = "Capture display regions and inspect their pixels")]
#[command(version)]
struct Cli {
    /// Capture config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend id, overrides the config
    #[arg(short, long)]
    backend: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered capture backends
    Backends,

    /// List displays of the selected backend
    Displays,

    /// Capture zones of a display
    Capture {
        /// Display index
        #[arg(short, long, default_value_t = 0)]
        display: usize,

        /// Zone as x,y,width,height[@level]; repeatable
        #[arg(short, long = "zone", required = true)]
        zones: Vec<ZoneSpec>,

        /// Number of capture cycles
        #[arg(short = 'n', long, default_value_t = 10)]
        cycles: u32,

        /// Delay between cycles in milliseconds
        #[arg(short, long, default_value_t = 100)]
        interval: u64,
    },

    /// Capture synthetic letterboxed frames from memory
    Demo {
        #[arg(long, default_value_t = 320)]
        width: u32,

        #[arg(long, default_value_t = 180)]
        height: u32,

        /// Downscale level of the full-frame zone
        #[arg(short, long, default_value_t = 2)]
        level: u32,

        #[arg(short = 'n', long, default_value_t = 3)]
        cycles: u32,
    },

    /// Write the effective config to a file
    SaveConfig {
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug)]
struct ZoneSpec {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    level: u32,
}

impl FromStr for ZoneSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rect, level) = match s.split_once('@') {
            Some((rect, level)) => (
                rect,
                level
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid downscale level in '{}'", s))?,
            ),
            None => (s, 0),
        };

        let parts = rect
            .split(',')
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("Invalid zone '{}'", s))?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(ZoneSpec {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                level,
            }),
            _ => Err(format!("Zone '{}' needs x,y,width,height", s)),
        }
    }
}

#[derive(Serialize)]
struct ZoneReport {
    cycle: u64,
    zone: usize,
    width: usize,
    height: usize,
    level: u32,
    average: [u8; 3],
    black_bars: [usize; 4],
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CaptureConfig::default_for_platform(),
    };
    if cli.backend.is_some() {
        config.backend = cli.backend.clone();
    }

    match cli.command {
        Commands::Backends => {
            for backend in list_backends() {
                match cli.format {
                    OutputFormat::Text => {
                        println!("{:<12} {:<16} {}", backend.id, backend.name, backend.description)
                    }
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::json!({
                            "id": backend.id,
                            "name": backend.name,
                            "description": backend.description,
                        })
                    ),
                }
            }
        }

        Commands::Displays => {
            let service = ScreenCaptureService::new(config)?;
            let displays = service.displays()?;
            match cli.format {
                OutputFormat::Text => {
                    for display in &displays {
                        println!(
                            "#{} {} {}x{} ({})",
                            display.index,
                            display.name,
                            display.width,
                            display.height,
                            display.graphics_card.name
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&displays)?),
            }
        }

        Commands::Capture {
            display,
            zones,
            cycles,
            interval,
        } => {
            let service = ScreenCaptureService::new(config)?;
            let target = service
                .displays()?
                .into_iter()
                .find(|d| d.index == display)
                .ok_or_else(|| format!("Display {} not found", display))?;

            let capture = service.screen_capture(&target)?;
            let zones = zones
                .iter()
                .map(|z| capture.register_capture_zone(z.x, z.y, z.width, z.height, z.level))
                .collect::<Result<Vec<_>, _>>()?;

            run_cycles(&*capture, &zones, cycles, Duration::from_millis(interval), cli.format)?;
            service.dispose();
        }

        Commands::Demo {
            width,
            height,
            level,
            cycles,
        } => {
            let feed = FrameFeed::<ColorBgra>::new();
            let display = screen_zones::Display {
                index: 0,
                name: "Memory".to_string(),
                width: width as usize,
                height: height as usize,
                rotation: Default::default(),
                graphics_card: screen_zones::GraphicsCard {
                    index: 0,
                    name: "Memory".to_string(),
                    vendor_id: 0,
                    device_id: 0,
                },
            };
            let timeout = Duration::from_millis(config.timeout_ms as u64);
            let backend = MemoryCaptureBackend::with_timeout(feed.clone(), timeout);
            let capture = ScreenCapture::new(display, backend, config);
            let zones = vec![capture.register_capture_zone(
                0,
                0,
                width as usize,
                height as usize,
                level,
            )?];

            for cycle in 0..cycles {
                feed.push(width, height, &letterboxed_frame(width, height, cycle))?;
                run_cycles(&capture, &zones, 1, Duration::ZERO, cli.format)?;
            }
        }

        Commands::SaveConfig { path } => {
            save_config(&path, &config)?;
            println!("Config written to {}", path.display());
        }
    }

    Ok(())
}

fn run_cycles<B: CaptureBackend>(
    capture: &ScreenCapture<B>,
    zones: &[Arc<CaptureZone<B::Color>>],
    cycles: u32,
    interval: Duration,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..cycles {
        if !capture.capture_screen()? {
            log::info!(cycle = capture.cycles(); "No frame captured");
        } else {
            for zone in zones {
                let report = report_zone(capture.cycles(), zone)?;
                print_report(&report, format)?;
            }
        }

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    Ok(())
}

fn report_zone<C: Pixel>(
    cycle: u64,
    zone: &CaptureZone<C>,
) -> Result<ZoneReport, Box<dyn std::error::Error>> {
    let mut lock = zone.lock()?;
    let geometry = lock.geometry()?;
    let average = average_color(&lock.image()?);
    let BlackBars {
        top,
        bottom,
        left,
        right,
    } = lock.black_bars()?;
    let content = lock.remove_black_bars(BlackBarEdges::ALL)?;
    log::debug!(
        zone = zone.id(),
        content_width = content.width(),
        content_height = content.height();
        "Content area"
    );

    Ok(ZoneReport {
        cycle,
        zone: zone.id(),
        width: geometry.width,
        height: geometry.height,
        level: geometry.downscale_level,
        average,
        black_bars: [top, bottom, left, right],
    })
}

fn average_color<C: Pixel>(image: &Image<'_, C>) -> [u8; 3] {
    if image.is_empty() {
        return [0; 3];
    }

    let mut sums = [0u64; 3];
    for pixel in image {
        sums[0] += pixel.r() as u64;
        sums[1] += pixel.g() as u64;
        sums[2] += pixel.b() as u64;
    }
    let count = image.len() as u64;
    sums.map(|sum| ((sum + count / 2) / count) as u8)
}

fn print_report(report: &ZoneReport, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Text => println!(
            "cycle {:>4} zone {:>2} {}x{}@{} avg rgb({}, {}, {}) bars t{} b{} l{} r{}",
            report.cycle,
            report.zone,
            report.width,
            report.height,
            report.level,
            report.average[0],
            report.average[1],
            report.average[2],
            report.black_bars[0],
            report.black_bars[1],
            report.black_bars[2],
            report.black_bars[3],
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
    }
    Ok(())
}

/// A moving gradient with black bars covering the top and bottom eighth.
fn letterboxed_frame(width: u32, height: u32, cycle: u32) -> Vec<ColorBgra> {
    let bar = height / 8;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            if y < bar || y >= height - bar {
                pixels.push(ColorBgra::from_rgb(0, 0, 0));
            } else {
                let r = ((x * 255) / width.max(1)) as u8;
                let g = ((y * 255) / height.max(1)) as u8;
                let b = (cycle.wrapping_mul(40) % 256) as u8;
                pixels.push(ColorBgra::from_rgb(r, g, b));
            }
        }
    }
    pixels
}
