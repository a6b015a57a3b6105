use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals;
use embassy_rp::spi::{self, Spi};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Delay;
use embedded_hal::digital::PinState;
use rp_samples::Error;
use watchy_epd::battery::BatteryAdc;
use watchy_epd::gdeh0154d67::DEFAULT_BUSY_WHEN;
use watchy_epd::hw::{BusyHw, DcHw, DelayHw, ErrorHw, ResetHw, SpiHw};

// Define the resources needed to communicate with the display and read the battery.
assign_resources::assign_resources! {
    spi_hw: SpiP {
        spi: SPI0,
        clk: PIN_2,
        tx: PIN_3,
        dma_tx: DMA_CH1,
        cs: PIN_5,
    },
    epd_hw: DisplayP {
        reset: PIN_7,
        dc: PIN_6,
        busy: PIN_8,
    },
    battery_hw: BatteryP {
        adc: ADC,
        // Behind a 1:2 divider, as on the Watchy.
        sense: PIN_26,
    },
}

/// Defines the hardware to use for connecting to the display.
pub struct DisplayHw<'a> {
    dc: Output<'a>,
    reset: Output<'a>,
    busy: Input<'a>,
    delay: Delay,
}

impl DisplayHw<'_> {
    pub fn new(p: DisplayP) -> Self {
        let dc = Output::new(p.dc, Level::Low);
        let reset = Output::new(p.reset, Level::High);
        let busy = Input::new(p.busy, Pull::Down);

        Self {
            dc,
            reset,
            busy,
            delay: Delay,
        }
    }
}

pub type EpdSpiDevice<'a> =
    SpiDevice<'a, NoopRawMutex, Spi<'a, peripherals::SPI0, spi::Async>, Output<'a>>;

impl ErrorHw for DisplayHw<'_> {
    type Error = Error;
}

impl<'a> SpiHw for DisplayHw<'a> {
    type Spi = EpdSpiDevice<'a>;
}

impl<'a> DcHw for DisplayHw<'a> {
    type Dc = Output<'a>;

    fn dc(&mut self) -> &mut Self::Dc {
        &mut self.dc
    }
}

impl<'a> ResetHw for DisplayHw<'a> {
    type Reset = Output<'a>;

    fn reset(&mut self) -> &mut Self::Reset {
        &mut self.reset
    }
}

impl<'a> BusyHw for DisplayHw<'a> {
    type Busy = Input<'a>;

    fn busy(&mut self) -> &mut Self::Busy {
        &mut self.busy
    }

    fn busy_when(&self) -> PinState {
        DEFAULT_BUSY_WHEN
    }
}

impl DelayHw for DisplayHw<'_> {
    type Delay = Delay;

    fn delay(&mut self) -> &mut Self::Delay {
        &mut self.delay
    }
}

/// Reads the battery voltage through the RP2040's 12-bit ADC.
pub struct BatteryHw<'a> {
    adc: Adc<'a, adc::Blocking>,
    sense: Channel<'a>,
}

impl BatteryHw<'_> {
    pub fn new(p: BatteryP) -> Self {
        Self {
            adc: Adc::new_blocking(p.adc, adc::Config::default()),
            sense: Channel::new_pin(p.sense, Pull::None),
        }
    }
}

impl BatteryAdc for BatteryHw<'_> {
    type Error = adc::Error;

    fn read_raw(&mut self) -> Result<u16, adc::Error> {
        self.adc.blocking_read(&mut self.sense)
    }
}
