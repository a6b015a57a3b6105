//! Runs the watch face against an emulated panel in a desktop window.
//!
//! Pass `--dither` to dither flushed rectangles instead of thresholding and diffing them. The
//! window can be resized to emulate other panel resolutions. Press `R` to force a full redraw and
//! `Escape` to quit.

use std::time::{Duration, Instant};

use embassy_futures::block_on;
use embedded_graphics::{
    pixelcolor::{Gray8, GrayColor},
    prelude::Size,
};
use log::{debug, info, warn};
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};
use thiserror::Error as ThisError;
use watchy_epd::{
    battery::{BatteryAdc, BatteryMonitor},
    canvas::Canvas,
    config::{RendererConfig, Strategy},
    face::{FaceState, WatchFace},
    gdeh0154d67::DISPLAY_SIZE,
    renderer::{FlushOutcome, FrameDiffRenderer},
    sim::SimPanel,
};

const TARGET_FPS: usize = 10;

#[derive(Debug, ThisError)]
enum Error {
    #[error("window error: {0}")]
    Window(#[from] minifb::Error),
    #[error(transparent)]
    Render(#[from] watchy_epd::Error),
}

/// A battery that loses a little charge every minute.
struct SimulatedBattery {
    start: Instant,
}

impl BatteryAdc for SimulatedBattery {
    type Error = core::convert::Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let minutes = self.start.elapsed().as_secs() / 60;
        Ok(2600u16.saturating_sub(minutes.min(u16::MAX as u64) as u16))
    }
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let strategy = if std::env::args().any(|arg| arg == "--dither") {
        Strategy::Dither
    } else {
        Strategy::ThresholdDiff
    };
    info!("Rendering with {:?}", strategy);

    let mut size = DISPLAY_SIZE;
    let mut window = Window::new(
        "Watchy",
        size.width as usize,
        size.height as usize,
        WindowOptions {
            resize: true,
            scale_mode: ScaleMode::UpperLeft,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(TARGET_FPS);

    let mut panel = SimPanel::new(size)?;
    let mut canvas = Canvas::new(size, Gray8::WHITE)?;
    let mut renderer = FrameDiffRenderer::new(RendererConfig::default().with_strategy(strategy));
    let mut face = WatchFace::new();

    let start = Instant::now();
    let mut battery = match BatteryMonitor::new(SimulatedBattery { start }, Duration::ZERO) {
        Ok(battery) => battery,
        Err(never) => match never {},
    };
    let mut pixels = vec![0u32; size.width as usize * size.height as usize];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let (width, height) = window.get_size();
        let new_size = Size::new(width as u32, height as u32);
        if new_size != size && width > 0 && height > 0 {
            info!("Resized to {}x{}", width, height);
            size = new_size;
            panel.set_size(size)?;
            canvas.resize(size, Gray8::WHITE)?;
            face.invalidate();
            pixels = vec![0u32; width * height];
        }

        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            info!("Forcing a full redraw");
            face.invalidate();
            renderer.invalidate();
        }

        let now = start.elapsed();
        if let Ok(true) = battery.poll(now) {
            debug!("Battery now {}", battery.voltage());
        }
        let state = FaceState {
            battery: battery.voltage(),
            uptime: now,
        };
        if let Err(never) = face.draw(&mut canvas, state) {
            match never {}
        }

        if let Some(region) = canvas.take_dirty() {
            let report = block_on(renderer.flush(&mut panel, region));
            match report.outcome {
                FlushOutcome::Drawn => debug!(
                    "Drew {:?}, {} pixels changed",
                    report.changes.bounds, report.changes.changed
                ),
                FlushOutcome::Skipped => debug!("Nothing changed"),
                FlushOutcome::Dropped(e) => warn!("Flush dropped: {}", e),
            }
        }

        panel.to_argb(&mut pixels);
        window.update_with_buffer(&pixels, size.width as usize, size.height as usize)?;
    }

    info!("Panel stats: {:?}", panel.stats());
    Ok(())
}
