//! Recording stand-ins for the panel's hardware, used by driver tests.

use core::{cell::RefCell, convert::Infallible};
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin, PinState};
use embedded_hal_async::{
    delay::DelayNs,
    digital::Wait,
    spi::{ErrorType as SpiErrorType, Operation, SpiDevice},
};

use crate::hw::{BusyHw, DcHw, DelayHw, ErrorHw, ResetHw, SpiHw};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Command(u8),
    Data(Vec<u8>),
    Reset(bool),
    DelayNs(u32),
}

#[derive(Default)]
struct Bus {
    dc_high: bool,
    events: Vec<Event>,
}

/// A shared record of everything sent to the panel.
#[derive(Clone, Default)]
pub(crate) struct Recorder(Rc<RefCell<Bus>>);

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    /// Groups the recorded bytes into `(command, data)` pairs.
    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        let mut commands: Vec<(u8, Vec<u8>)> = Vec::new();
        for event in self.0.borrow().events.iter() {
            match event {
                Event::Command(command) => commands.push((*command, Vec::new())),
                Event::Data(data) => {
                    if let Some((_, bytes)) = commands.last_mut() {
                        bytes.extend_from_slice(data);
                    }
                }
                _ => {}
            }
        }
        commands
    }

    pub fn clear(&self) {
        self.0.borrow_mut().events.clear();
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().events.push(event);
    }
}

pub(crate) struct MockSpi(Recorder);

impl SpiErrorType for MockSpi {
    type Error = Infallible;
}

impl SpiDevice for MockSpi {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        for operation in operations.iter() {
            if let Operation::Write(bytes) = operation {
                if self.0 .0.borrow().dc_high {
                    self.0.push(Event::Data(bytes.to_vec()));
                } else {
                    for &byte in bytes.iter() {
                        self.0.push(Event::Command(byte));
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) struct MockDc(Recorder);

impl PinErrorType for MockDc {
    type Error = Infallible;
}

impl OutputPin for MockDc {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0 .0.borrow_mut().dc_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0 .0.borrow_mut().dc_high = true;
        Ok(())
    }
}

pub(crate) struct MockReset(Recorder);

impl PinErrorType for MockReset {
    type Error = Infallible;
}

impl OutputPin for MockReset {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.push(Event::Reset(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.push(Event::Reset(true));
        Ok(())
    }
}

/// A busy pin that is never busy.
pub(crate) struct MockBusy;

impl PinErrorType for MockBusy {
    type Error = Infallible;
}

impl InputPin for MockBusy {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }
}

impl Wait for MockBusy {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub(crate) struct MockDelay(Recorder);

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.push(Event::DelayNs(ns));
    }
}

pub(crate) struct MockHw {
    dc: MockDc,
    reset: MockReset,
    busy: MockBusy,
    delay: MockDelay,
}

/// Creates mock hardware and its SPI device, both recording into the returned [Recorder].
pub(crate) fn mock_hw() -> (MockHw, MockSpi, Recorder) {
    let recorder = Recorder::default();
    let hw = MockHw {
        dc: MockDc(recorder.clone()),
        reset: MockReset(recorder.clone()),
        busy: MockBusy,
        delay: MockDelay(recorder.clone()),
    };
    (hw, MockSpi(recorder.clone()), recorder)
}

impl ErrorHw for MockHw {
    type Error = Infallible;
}

impl SpiHw for MockHw {
    type Spi = MockSpi;
}

impl DcHw for MockHw {
    type Dc = MockDc;

    fn dc(&mut self) -> &mut MockDc {
        &mut self.dc
    }
}

impl ResetHw for MockHw {
    type Reset = MockReset;

    fn reset(&mut self) -> &mut MockReset {
        &mut self.reset
    }
}

impl BusyHw for MockHw {
    type Busy = MockBusy;

    fn busy(&mut self) -> &mut MockBusy {
        &mut self.busy
    }

    fn busy_when(&self) -> PinState {
        PinState::High
    }
}

impl DelayHw for MockHw {
    type Delay = MockDelay;

    fn delay(&mut self) -> &mut MockDelay {
        &mut self.delay
    }
}
