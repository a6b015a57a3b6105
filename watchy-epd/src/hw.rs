//! Hardware traits for wiring the Watchy's e-paper panel to your chosen peripherals.
//!
//! Each trait covers one resource, so the same driver works with owned pins, shared SPI buses, or
//! anything else that implements the `embedded-hal` traits. The SPI device itself is not owned by
//! the hardware: drivers borrow it per call, so that it can be shared with other peripherals.

use embedded_hal::{
    digital::{ErrorType as PinErrorType, InputPin, OutputPin, PinState},
    spi::ErrorType as SpiErrorType,
};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};

use crate::log::trace;

/// A single error type for the whole panel.
///
/// Drivers require [From] conversions into this type from every pin, delay and SPI error.
pub trait ErrorHw {
    type Error;
}

/// The SPI device connected to the panel's controller.
pub trait SpiHw {
    type Spi: SpiDevice;
}

/// The Data/Command select pin. Low selects a command byte, high selects data.
pub trait DcHw {
    type Dc: OutputPin;

    fn dc(&mut self) -> &mut Self::Dc;
}

/// The active-low reset pin.
pub trait ResetHw {
    type Reset: OutputPin;

    fn reset(&mut self) -> &mut Self::Reset;
}

/// The panel's busy output.
pub trait BusyHw {
    type Busy: InputPin + Wait;

    fn busy(&mut self) -> &mut Self::Busy;

    /// The level of the busy pin while the controller is busy.
    ///
    /// The SSD1681 holds busy high, but this is left to the wiring in case it is inverted.
    fn busy_when(&self) -> PinState;
}

pub trait DelayHw {
    type Delay: DelayNs;

    fn delay(&mut self) -> &mut Self::Delay;
}

/// Waits for the controller to finish its current operation.
pub(crate) trait BusyWait: ErrorHw {
    /// Returns immediately if the controller isn't busy.
    ///
    /// This never returns if the controller is in deep sleep, since busy stays asserted.
    async fn wait_if_busy(&mut self) -> Result<(), Self::Error>;
}

/// Sends a command byte followed by its data bytes.
pub(crate) trait CommandDataSend: SpiHw + ErrorHw {
    /// Waits until the controller is idle, then sends `command` and `data`.
    async fn send(
        &mut self,
        spi: &mut Self::Spi,
        command: u8,
        data: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Pulses the reset pin.
pub(crate) trait HardwareReset: ErrorHw {
    async fn hardware_reset(&mut self) -> Result<(), Self::Error>;
}

/// How long reset is held low, and how long the controller needs afterwards.
const RESET_PULSE_MS: u32 = 10;

impl<HW> BusyWait for HW
where
    HW: BusyHw + ErrorHw,
    HW::Error: From<<HW::Busy as PinErrorType>::Error>,
{
    async fn wait_if_busy(&mut self) -> Result<(), HW::Error> {
        let busy_when = self.busy_when();
        let busy = self.busy();
        let is_busy = match busy_when {
            PinState::High => busy.is_high()?,
            PinState::Low => busy.is_low()?,
        };
        if is_busy {
            trace!("Waiting for busy panel");
            match busy_when {
                PinState::High => busy.wait_for_low().await?,
                PinState::Low => busy.wait_for_high().await?,
            }
        }
        Ok(())
    }
}

impl<HW> CommandDataSend for HW
where
    HW: DcHw + BusyWait + SpiHw + ErrorHw,
    HW::Error: From<<HW::Spi as SpiErrorType>::Error> + From<<HW::Dc as PinErrorType>::Error>,
{
    async fn send(
        &mut self,
        spi: &mut Self::Spi,
        command: u8,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        trace!("Sending command {:#x} with {} data bytes", command, data.len());
        self.wait_if_busy().await?;

        self.dc().set_low()?;
        spi.write(&[command]).await?;

        if !data.is_empty() {
            self.dc().set_high()?;
            spi.write(data).await?;
        }

        Ok(())
    }
}

impl<HW> HardwareReset for HW
where
    HW: ResetHw + DelayHw + ErrorHw,
    HW::Error: From<<HW::Reset as PinErrorType>::Error>,
{
    async fn hardware_reset(&mut self) -> Result<(), Self::Error> {
        trace!("Resetting panel");
        self.reset().set_low()?;
        self.delay().delay_ms(RESET_PULSE_MS).await;
        self.reset().set_high()?;
        self.delay().delay_ms(RESET_PULSE_MS).await;
        Ok(())
    }
}
