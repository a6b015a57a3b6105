use alloc::vec::Vec;

use bitflags::bitflags;
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{Dimensions, Point, Size},
    primitives::Rectangle,
};
use embedded_hal::{
    digital::{ErrorType as PinErrorType, PinState},
    spi::{ErrorType as SpiErrorType, Phase, Polarity},
};
use thiserror::Error as ThisError;

use crate::{
    buffer::{binary_buffer_length, byte_aligned, split_low_and_high, BinaryBuffer},
    hw::{
        BusyHw, BusyWait as _, CommandDataSend as _, DcHw, DelayHw, ErrorHw, HardwareReset as _,
        ResetHw, SpiHw,
    },
    log::{debug, debug_assert, info, trace},
    Error, Panel,
};

/// The height of the display.
pub const DISPLAY_HEIGHT: u16 = 200;
/// The width of the display.
pub const DISPLAY_WIDTH: u16 = 200;
/// The size of the display, for convenience.
pub const DISPLAY_SIZE: Size = Size::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32);
/// The length of a packed frame for the whole display.
pub const BINARY_BUFFER_LENGTH: usize = binary_buffer_length(DISPLAY_SIZE);
pub const RECOMMENDED_SPI_HZ: u32 = 4_000_000; // 4 MHz
/// Use this phase in conjunction with [RECOMMENDED_SPI_POLARITY] so that the controller captures
/// data on the rising edge.
pub const RECOMMENDED_SPI_PHASE: Phase = Phase::CaptureOnFirstTransition;
/// Use this polarity in conjunction with [RECOMMENDED_SPI_PHASE] so that the controller captures
/// data on the rising edge.
pub const RECOMMENDED_SPI_POLARITY: Polarity = Polarity::IdleLow;
/// The SSD1681 holds busy high while it works.
pub const DEFAULT_BUSY_WHEN: PinState = PinState::High;
/// Partial refreshes slowly accumulate ghosting. A full refresh at least this often keeps the
/// panel clean.
pub const RECOMMENDED_MAX_PARTIAL_REFRESHES: u32 = 100;

/// Low-level commands for the SSD1681 controller. Most uses are covered by the methods on
/// [Gdeh0154d67], but commands can be sent directly with [Gdeh0154d67::send].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Sets the number of gate lines (MUX) and the scanning order.
    DriverOutputControl = 0x01,
    /// Enters deep sleep. Only a hardware reset wakes the controller.
    DeepSleepMode = 0x10,
    /// Sets the direction the address counter moves after each byte.
    DataEntryModeSetting = 0x11,
    /// Resets every register except deep sleep to its default. Busy stays high until it's done.
    SwReset = 0x12,
    /// Selects the internal or an external temperature sensor.
    TemperatureSensorControl = 0x18,
    /// Runs the sequence configured with [Command::DisplayUpdateControl2]. Must not be
    /// interrupted.
    MasterActivation = 0x20,
    /// Configures RAM bypass and inversion for the update.
    DisplayUpdateControl1 = 0x21,
    /// Configures the update sequence. See [UpdateSequence].
    DisplayUpdateControl2 = 0x22,
    /// Writes to the RAM that holds the frame being displayed next.
    WriteRam = 0x24,
    /// Writes to the RAM that partial refreshes diff against.
    WriteOldRam = 0x26,
    /// Sets how the border is driven.
    BorderWaveformControl = 0x3C,
    /// Sets the inclusive start and end of the x window, in bytes.
    SetRamXStartEnd = 0x44,
    /// Sets the inclusive start and end of the y window, in rows.
    SetRamYStartEnd = 0x45,
    /// Sets the x address counter, in bytes.
    SetRamX = 0x4E,
    /// Sets the y address counter.
    SetRamY = 0x4F,
    Nop = 0x7F,
}

impl Command {
    /// Returns the register address for this command.
    fn register(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    /// The steps run by [Command::MasterActivation], as sent with
    /// [Command::DisplayUpdateControl2].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UpdateSequence: u8 {
        const CLOCK_ON = 0x80;
        const ANALOG_ON = 0x40;
        const LOAD_TEMPERATURE = 0x20;
        const LOAD_LUT = 0x10;
        /// Use the differential waveform, which only drives changed pixels.
        const DISPLAY_MODE_2 = 0x08;
        const DISPLAY = 0x04;
        const ANALOG_OFF = 0x02;
        const CLOCK_OFF = 0x01;

        /// Full refresh, powering down the analog circuits afterwards.
        const FULL = Self::CLOCK_ON.bits()
            | Self::ANALOG_ON.bits()
            | Self::LOAD_TEMPERATURE.bits()
            | Self::LOAD_LUT.bits()
            | Self::DISPLAY.bits()
            | Self::ANALOG_OFF.bits()
            | Self::CLOCK_OFF.bits();
        /// Partial refresh. The analog circuits stay on for the next one.
        const PARTIAL = Self::CLOCK_ON.bits()
            | Self::ANALOG_ON.bits()
            | Self::LOAD_TEMPERATURE.bits()
            | Self::LOAD_LUT.bits()
            | Self::DISPLAY_MODE_2.bits()
            | Self::DISPLAY.bits();
        const POWER_OFF = Self::CLOCK_ON.bits() | Self::ANALOG_OFF.bits() | Self::CLOCK_OFF.bits();
    }
}

/// Selects which of the controller's RAM banks to write.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ram {
    /// The frame shown by the next refresh.
    Current,
    /// The frame a partial refresh diffs against.
    Previous,
}

impl Ram {
    fn command(&self) -> Command {
        match self {
            Ram::Current => Command::WriteRam,
            Ram::Previous => Command::WriteOldRam,
        }
    }
}

/// Sent with [Command::DriverOutputControl]: 200 gate lines (MUX = 199), default scan order.
const DRIVER_OUTPUT_INIT_DATA: [u8; 3] = [0xC7, 0x00, 0x00];
/// Follow the LUT, with the border held at VSH.
const BORDER_WAVEFORM: u8 = 0x05;
const INTERNAL_TEMPERATURE_SENSOR: u8 = 0x80;
/// X then Y increment, with the address counter moving along x first.
const DATA_ENTRY_X_THEN_Y: u8 = 0x03;
const DEEP_SLEEP_RETAIN_RAM: u8 = 0x01;

/// Errors from drawing through a [PanelPort].
#[derive(Debug, ThisError)]
pub enum PortError<E> {
    #[error("panel hardware error")]
    Hardware(E),
    #[error(transparent)]
    Frame(#[from] Error),
}

/// Controls the GoodDisplay GDEH0154D67 1.54" panel fitted to the Watchy, which uses an SSD1681
/// controller.
///
/// The driver keeps a packed copy of the whole frame, so that partial windows can be widened to
/// whole bytes without disturbing the pixels around them. `BinaryColor::Off` is black and `On` is
/// white.
pub struct Gdeh0154d67<HW, STATE> {
    hw: HW,
    frame: BinaryBuffer,
    window_data: Vec<u8>,
    state: STATE,
}

trait StateInternal {}
#[allow(private_bounds)]
pub trait State: StateInternal {}
pub trait StateAwake: State {}

macro_rules! impl_base_state {
    ($state:ident) => {
        impl StateInternal for $state {}
        impl State for $state {}
    };
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateUninitialized();
impl_base_state!(StateUninitialized);
impl StateAwake for StateUninitialized {}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateReady {
    partial_refreshes: u32,
}
impl_base_state!(StateReady);
impl StateAwake for StateReady {}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateAsleep {
    partial_refreshes: u32,
}
impl_base_state!(StateAsleep);

impl<HW> Gdeh0154d67<HW, StateUninitialized> {
    /// Creates a new driver with a white frame. Call [Gdeh0154d67::init] before use.
    pub fn new(hw: HW) -> Result<Self, Error> {
        let frame = BinaryBuffer::new(DISPLAY_SIZE, BinaryColor::On)?;
        let mut window_data = Vec::new();
        window_data
            .try_reserve_exact(BINARY_BUFFER_LENGTH)
            .map_err(|_| Error::AllocationFailed {
                bytes: BINARY_BUFFER_LENGTH,
            })?;
        Ok(Self {
            hw,
            frame,
            window_data,
            state: StateUninitialized(),
        })
    }
}

impl<HW, STATE> Gdeh0154d67<HW, STATE> {
    /// The driver's copy of the frame.
    pub fn frame(&self) -> &BinaryBuffer {
        &self.frame
    }
}

impl<HW, STATE> Gdeh0154d67<HW, STATE>
where
    HW: BusyHw + DcHw + ResetHw + DelayHw + SpiHw + ErrorHw,
    HW::Error: From<<HW::Busy as PinErrorType>::Error>
        + From<<HW::Dc as PinErrorType>::Error>
        + From<<HW::Reset as PinErrorType>::Error>
        + From<<HW::Spi as SpiErrorType>::Error>,
    STATE: StateAwake,
{
    /// Resets and configures the controller, leaving the address window covering the whole
    /// display.
    ///
    /// The panel itself isn't refreshed. Call [Gdeh0154d67::clear] to start from a known state.
    pub async fn init(
        mut self,
        spi: &mut HW::Spi,
    ) -> Result<Gdeh0154d67<HW, StateReady>, HW::Error> {
        debug!("Initialising panel");
        self.hw.hardware_reset().await?;
        self.send(spi, Command::SwReset, &[]).await?;
        self.send(spi, Command::DriverOutputControl, &DRIVER_OUTPUT_INIT_DATA)
            .await?;
        self.send(spi, Command::BorderWaveformControl, &[BORDER_WAVEFORM])
            .await?;
        self.send(
            spi,
            Command::TemperatureSensorControl,
            &[INTERNAL_TEMPERATURE_SENSOR],
        )
        .await?;

        let mut epd = Gdeh0154d67 {
            hw: self.hw,
            frame: self.frame,
            window_data: self.window_data,
            state: StateReady {
                partial_refreshes: 0,
            },
        };
        let bounds = epd.frame.bounding_box();
        epd.set_window(spi, bounds).await?;
        epd.set_cursor(spi, bounds.top_left).await?;
        Ok(epd)
    }

    /// Sends the given command and data to the controller, once it isn't busy.
    pub async fn send(
        &mut self,
        spi: &mut HW::Spi,
        command: Command,
        data: &[u8],
    ) -> Result<(), HW::Error> {
        self.hw.send(spi, command.register(), data).await
    }
}

impl<HW> Gdeh0154d67<HW, StateReady>
where
    HW: BusyHw + DcHw + ResetHw + DelayHw + SpiHw + ErrorHw,
    HW::Error: From<<HW::Busy as PinErrorType>::Error>
        + From<<HW::Dc as PinErrorType>::Error>
        + From<<HW::Reset as PinErrorType>::Error>
        + From<<HW::Spi as SpiErrorType>::Error>,
{
    /// The number of partial refreshes since the last full refresh.
    pub fn partial_refreshes(&self) -> u32 {
        self.state.partial_refreshes
    }

    /// Sets the window that the next RAM writes fill, and the direction the address counter
    /// moves within it.
    ///
    /// The x-axis only supports multiples of 8; anything else panics in debug builds, or shifts
    /// the content otherwise. See [byte_aligned].
    pub async fn set_window(
        &mut self,
        spi: &mut HW::Spi,
        window: Rectangle,
    ) -> Result<(), HW::Error> {
        let x_start = window.top_left.x;
        let x_end = x_start + window.size.width as i32 - 1;
        debug_assert!(
            x_start % 8 == 0 && x_end % 8 == 7,
            "window's top_left.x and width must be byte aligned"
        );
        self.send(spi, Command::DataEntryModeSetting, &[DATA_ENTRY_X_THEN_Y])
            .await?;
        self.send(
            spi,
            Command::SetRamXStartEnd,
            &[(x_start >> 3) as u8, (x_end >> 3) as u8],
        )
        .await?;

        let (y_start_low, y_start_high) = split_low_and_high(window.top_left.y as u16);
        let (y_end_low, y_end_high) =
            split_low_and_high((window.top_left.y + window.size.height as i32 - 1) as u16);
        self.send(
            spi,
            Command::SetRamYStartEnd,
            &[y_start_low, y_start_high, y_end_low, y_end_high],
        )
        .await
    }

    /// Moves the address counter. The x position must be a multiple of 8.
    pub async fn set_cursor(
        &mut self,
        spi: &mut HW::Spi,
        position: Point,
    ) -> Result<(), HW::Error> {
        debug_assert!(position.x % 8 == 0, "position.x must be byte aligned");
        self.send(spi, Command::SetRamX, &[(position.x >> 3) as u8])
            .await?;
        let (y_low, y_high) = split_low_and_high(position.y as u16);
        self.send(spi, Command::SetRamY, &[y_low, y_high]).await
    }

    /// Writes packed rows into one of the RAM banks, starting at the cursor.
    pub async fn write_ram(
        &mut self,
        spi: &mut HW::Spi,
        ram: Ram,
        data: &[u8],
    ) -> Result<(), HW::Error> {
        self.send(spi, ram.command(), data).await
    }

    /// Refreshes the whole panel from the current RAM, and waits until it's done.
    pub async fn update_full(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        info!("Full refresh after {} partial refreshes", self.state.partial_refreshes);
        self.run_sequence(spi, UpdateSequence::FULL).await?;
        self.state.partial_refreshes = 0;
        Ok(())
    }

    /// Refreshes only the pixels that differ between the two RAM banks, and waits until it's
    /// done.
    pub async fn update_partial(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        trace!("Partial refresh");
        self.run_sequence(spi, UpdateSequence::PARTIAL).await?;
        self.state.partial_refreshes = self.state.partial_refreshes.saturating_add(1);
        Ok(())
    }

    /// Turns the panel white with a full refresh.
    pub async fn clear(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        self.frame.fill(BinaryColor::On);
        self.display_frame(spi).await
    }

    /// Writes the whole frame to both RAM banks and does a full refresh.
    pub async fn display_frame(&mut self, spi: &mut HW::Spi) -> Result<(), HW::Error> {
        let bounds = self.frame.bounding_box();
        for ram in [Ram::Current, Ram::Previous] {
            self.set_window(spi, bounds).await?;
            self.set_cursor(spi, bounds.top_left).await?;
            self.hw
                .send(spi, ram.command().register(), self.frame.data())
                .await?;
        }
        self.update_full(spi).await
    }

    /// Borrows the driver as a [Panel] for a flush.
    pub fn port<'a>(&'a mut self, spi: &'a mut HW::Spi) -> PanelPort<'a, HW> {
        PanelPort {
            epd: self,
            spi,
            window: Rectangle::zero(),
        }
    }

    /// Powers down the analog circuits and enters deep sleep. RAM is retained.
    pub async fn sleep(
        mut self,
        spi: &mut HW::Spi,
    ) -> Result<Gdeh0154d67<HW, StateAsleep>, HW::Error> {
        debug!("Sleeping panel");
        self.run_sequence(spi, UpdateSequence::POWER_OFF).await?;
        self.send(spi, Command::DeepSleepMode, &[DEEP_SLEEP_RETAIN_RAM])
            .await?;
        Ok(Gdeh0154d67 {
            hw: self.hw,
            frame: self.frame,
            window_data: self.window_data,
            state: StateAsleep {
                partial_refreshes: self.state.partial_refreshes,
            },
        })
    }

    /// Writes a window of the frame to both RAM banks, refreshing it in between.
    async fn refresh_window(
        &mut self,
        spi: &mut HW::Spi,
        window: Rectangle,
    ) -> Result<(), PortError<HW::Error>> {
        let aligned = byte_aligned(window);
        self.frame.window_bytes(aligned, &mut self.window_data)?;
        if self.window_data.is_empty() {
            return Ok(());
        }

        self.set_window(spi, aligned)
            .await
            .map_err(PortError::Hardware)?;
        self.write_window(spi, aligned, Ram::Current)
            .await
            .map_err(PortError::Hardware)?;
        self.update_partial(spi)
            .await
            .map_err(PortError::Hardware)?;
        // The next partial refresh diffs against what is on screen now.
        self.write_window(spi, aligned, Ram::Previous)
            .await
            .map_err(PortError::Hardware)
    }

    async fn write_window(
        &mut self,
        spi: &mut HW::Spi,
        window: Rectangle,
        ram: Ram,
    ) -> Result<(), HW::Error> {
        self.set_cursor(spi, window.top_left).await?;
        self.hw
            .send(spi, ram.command().register(), &self.window_data)
            .await
    }

    async fn run_sequence(
        &mut self,
        spi: &mut HW::Spi,
        sequence: UpdateSequence,
    ) -> Result<(), HW::Error> {
        self.send(spi, Command::DisplayUpdateControl2, &[sequence.bits()])
            .await?;
        self.send(spi, Command::MasterActivation, &[]).await?;
        self.hw.wait_if_busy().await
    }
}

impl<HW> Gdeh0154d67<HW, StateAsleep>
where
    HW: BusyHw + DcHw + ResetHw + DelayHw + SpiHw + ErrorHw,
    HW::Error: From<<HW::Busy as PinErrorType>::Error>
        + From<<HW::Dc as PinErrorType>::Error>
        + From<<HW::Reset as PinErrorType>::Error>
        + From<<HW::Spi as SpiErrorType>::Error>,
{
    /// Wakes the controller with a hardware reset and reinitialises it. The panel keeps showing
    /// its last frame.
    pub async fn wake(
        self,
        spi: &mut HW::Spi,
    ) -> Result<Gdeh0154d67<HW, StateReady>, HW::Error> {
        debug!("Waking panel");
        let partial_refreshes = self.state.partial_refreshes;
        let uninitialized = Gdeh0154d67 {
            hw: self.hw,
            frame: self.frame,
            window_data: self.window_data,
            state: StateUninitialized(),
        };
        let mut epd = uninitialized.init(spi).await?;
        epd.state.partial_refreshes = partial_refreshes;
        Ok(epd)
    }
}

/// A [Panel] that draws into a [Gdeh0154d67]'s frame and refreshes the panel with a single
/// partial update per window.
pub struct PanelPort<'a, HW: SpiHw> {
    epd: &'a mut Gdeh0154d67<HW, StateReady>,
    spi: &'a mut HW::Spi,
    window: Rectangle,
}

impl<HW> Panel for PanelPort<'_, HW>
where
    HW: BusyHw + DcHw + ResetHw + DelayHw + SpiHw + ErrorHw,
    HW::Error: From<<HW::Busy as PinErrorType>::Error>
        + From<<HW::Dc as PinErrorType>::Error>
        + From<<HW::Reset as PinErrorType>::Error>
        + From<<HW::Spi as SpiErrorType>::Error>,
{
    type Error = PortError<HW::Error>;

    fn size(&self) -> Size {
        self.epd.frame.size()
    }

    fn begin_partial_window(&mut self, window: Rectangle) {
        self.window = self.epd.frame.bounding_box().intersection(&window);
    }

    fn draw_pixel(&mut self, point: Point, color: BinaryColor) {
        if self.window.contains(point) {
            self.epd.frame.set_pixel(point, color);
        }
    }

    async fn end_page(&mut self) -> Result<bool, Self::Error> {
        if !self.window.is_zero_sized() {
            self.epd.refresh_window(self.spi, self.window).await?;
        }
        Ok(false)
    }

    fn flush_complete(&mut self) {
        trace!("Flush complete");
        self.window = Rectangle::zero();
    }
}
