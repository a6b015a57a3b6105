//! Shows the watch face on a GDEH0154D67 panel wired to a Raspberry Pi Pico.
//!
//! The face is redrawn every second. Only rectangles that changed reach the panel, and the panel
//! sleeps between updates.

#![no_std]
#![no_main]

mod hw;

use core::mem::MaybeUninit;
use core::time::Duration;

use defmt::{debug, expect, info, warn};
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::spi::{self, Spi};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Instant, Timer};
use embedded_alloc::LlffHeap as Heap;
use embedded_graphics::pixelcolor::{Gray8, GrayColor};
use hw::*;
use watchy_epd::{
    battery::BatteryMonitor,
    canvas::Canvas,
    config::RendererConfig,
    face::{FaceState, WatchFace},
    gdeh0154d67::{self, Gdeh0154d67, RECOMMENDED_MAX_PARTIAL_REFRESHES},
    renderer::{FlushOutcome, FrameDiffRenderer},
};
use {defmt_rtt as _, panic_probe as _};

/// Room for the canvas, its staging copy, the shadow buffer and the driver's frame.
const HEAP_SIZE: usize = 160 * 1024;

#[global_allocator]
static HEAP: Heap = Heap::empty();

fn uptime() -> Duration {
    Duration::from_millis(Instant::now().as_millis())
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    {
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        // Safety: called once, before anything allocates.
        unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
    }

    let p = embassy_rp::init(Default::default());

    let resources = split_resources!(p);
    let mut config = spi::Config::default();
    config.frequency = gdeh0154d67::RECOMMENDED_SPI_HZ;
    // embassy-rp uses the synchronous phase and polarity enums, so we have to map these.
    config.phase = match gdeh0154d67::RECOMMENDED_SPI_PHASE {
        embedded_hal_async::spi::Phase::CaptureOnFirstTransition => {
            spi::Phase::CaptureOnFirstTransition
        }
        embedded_hal_async::spi::Phase::CaptureOnSecondTransition => {
            spi::Phase::CaptureOnSecondTransition
        }
    };
    config.polarity = match gdeh0154d67::RECOMMENDED_SPI_POLARITY {
        embedded_hal_async::spi::Polarity::IdleHigh => spi::Polarity::IdleHigh,
        embedded_hal_async::spi::Polarity::IdleLow => spi::Polarity::IdleLow,
    };

    let raw_spi: Mutex<NoopRawMutex, _> = Mutex::new(Spi::new_txonly(
        resources.spi_hw.spi,
        resources.spi_hw.clk,
        resources.spi_hw.tx,
        resources.spi_hw.dma_tx,
        config,
    ));
    // CS is active low.
    let cs_pin = Output::new(resources.spi_hw.cs, Level::High);
    let mut spi = SpiDevice::new(&raw_spi, cs_pin);

    let epd = expect!(
        Gdeh0154d67::new(DisplayHw::new(resources.epd_hw)),
        "Failed to allocate the EPD frame"
    );
    info!("Initializing EPD");
    let mut epd = expect!(epd.init(&mut spi).await, "Failed to initialize EPD");
    expect!(epd.clear(&mut spi).await, "Failed to clear EPD");

    let mut canvas = expect!(
        Canvas::new(gdeh0154d67::DISPLAY_SIZE, Gray8::WHITE),
        "Failed to allocate the canvas"
    );
    let mut renderer = FrameDiffRenderer::new(RendererConfig::default());
    let mut face = WatchFace::new();
    let mut battery = expect!(
        BatteryMonitor::new(BatteryHw::new(resources.battery_hw), uptime()),
        "Failed to read the battery"
    );
    info!("Battery at {} mV", battery.voltage().millivolts());

    loop {
        let now = uptime();
        if let Err(e) = battery.poll(now) {
            warn!("Battery read failed: {}", e);
        }
        let state = FaceState {
            battery: battery.voltage(),
            uptime: now,
        };
        face.draw(&mut canvas, state).unwrap();

        if let Some(region) = canvas.take_dirty() {
            let report = renderer.flush(&mut epd.port(&mut spi), region).await;
            match report.outcome {
                FlushOutcome::Drawn => debug!("Drew {} changed pixels", report.changes.changed),
                FlushOutcome::Skipped => debug!("Nothing changed"),
                FlushOutcome::Dropped(e) => warn!("Flush dropped: {}", e),
            }
        }

        if epd.partial_refreshes() >= RECOMMENDED_MAX_PARTIAL_REFRESHES {
            info!("Full refresh to clear ghosting");
            expect!(epd.display_frame(&mut spi).await, "Failed to refresh EPD");
        }

        let asleep = expect!(epd.sleep(&mut spi).await, "Failed to put EPD to sleep");
        Timer::after_secs(1).await;
        epd = expect!(asleep.wake(&mut spi).await, "Failed to wake EPD");
    }
}
