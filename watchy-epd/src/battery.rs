//! Battery voltage monitoring for the watch face.

use core::{fmt, time::Duration};

use crate::log::debug;

/// How often the battery is re-read.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Full scale of the 12-bit ADC.
const ADC_MAX: u32 = 4095;
/// The ADC reference (3.3 V), doubled by the Watchy's resistor divider.
const FULL_SCALE_MILLIVOLTS: u32 = 6600;

/// Reads the raw battery ADC value.
pub trait BatteryAdc {
    type Error;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// A battery voltage, displayed as e.g. `4.12V`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Voltage {
    millivolts: u32,
}

impl Voltage {
    pub const fn from_millivolts(millivolts: u32) -> Self {
        Self { millivolts }
    }

    /// Converts a raw 12-bit reading. Readings above full scale are clamped.
    pub const fn from_raw(raw: u16) -> Self {
        let raw = if raw as u32 > ADC_MAX {
            ADC_MAX
        } else {
            raw as u32
        };
        Self::from_millivolts(raw * FULL_SCALE_MILLIVOLTS / ADC_MAX)
    }

    pub const fn millivolts(&self) -> u32 {
        self.millivolts
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}V",
            self.millivolts / 1000,
            (self.millivolts % 1000) / 10
        )
    }
}

/// Keeps the latest battery voltage, re-reading the ADC once per interval.
///
/// ```
/// use core::{convert::Infallible, time::Duration};
/// use watchy_epd::battery::{BatteryAdc, BatteryMonitor};
///
/// struct FixedAdc(u16);
///
/// impl BatteryAdc for FixedAdc {
///     type Error = Infallible;
///
///     fn read_raw(&mut self) -> Result<u16, Infallible> {
///         Ok(self.0)
///     }
/// }
///
/// let mut monitor = BatteryMonitor::new(FixedAdc(2600), Duration::ZERO).unwrap();
/// assert_eq!(monitor.voltage().to_string(), "4.19V");
/// assert!(!monitor.poll(Duration::from_secs(30)).unwrap());
/// assert!(monitor.poll(Duration::from_secs(60)).unwrap());
/// ```
pub struct BatteryMonitor<A> {
    adc: A,
    interval: Duration,
    last_read: Duration,
    voltage: Voltage,
}

impl<A: BatteryAdc> BatteryMonitor<A> {
    /// Takes a first reading at `now`.
    pub fn new(adc: A, now: Duration) -> Result<Self, A::Error> {
        let mut monitor = Self {
            adc,
            interval: DEFAULT_INTERVAL,
            last_read: now,
            voltage: Voltage::default(),
        };
        monitor.read(now)?;
        Ok(monitor)
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// The most recent reading.
    pub fn voltage(&self) -> Voltage {
        self.voltage
    }

    /// Re-reads the battery if at least one interval has passed since the last reading.
    ///
    /// Returns whether a new reading was taken. `now` is any monotonic clock, such as uptime.
    pub fn poll(&mut self, now: Duration) -> Result<bool, A::Error> {
        if now.saturating_sub(self.last_read) < self.interval {
            return Ok(false);
        }
        self.read(now)?;
        Ok(true)
    }

    fn read(&mut self, now: Duration) -> Result<(), A::Error> {
        self.voltage = Voltage::from_raw(self.adc.read_raw()?);
        self.last_read = now;
        debug!("Battery at {} mV", self.voltage.millivolts());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;
    use std::collections::VecDeque;

    use super::*;

    struct ScriptedAdc(VecDeque<Result<u16, ()>>);

    impl BatteryAdc for ScriptedAdc {
        type Error = ();

        fn read_raw(&mut self) -> Result<u16, ()> {
            self.0.pop_front().unwrap_or(Err(()))
        }
    }

    struct FixedAdc(u16);

    impl BatteryAdc for FixedAdc {
        type Error = Infallible;

        fn read_raw(&mut self) -> Result<u16, Infallible> {
            Ok(self.0)
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_conversion() {
        assert_eq!(Voltage::from_raw(0).millivolts(), 0);
        assert_eq!(Voltage::from_raw(4095).millivolts(), 6600);
        assert_eq!(Voltage::from_raw(2048).millivolts(), 3300);
        assert_eq!(Voltage::from_raw(u16::MAX).millivolts(), 6600);
    }

    #[test]
    fn test_display() {
        assert_eq!(Voltage::from_millivolts(4123).to_string(), "4.12V");
        assert_eq!(Voltage::from_millivolts(3005).to_string(), "3.00V");
        assert_eq!(Voltage::from_millivolts(999).to_string(), "0.99V");
    }

    #[test]
    fn test_polls_once_per_interval() {
        let adc = ScriptedAdc(VecDeque::from([Ok(2500), Ok(2400), Ok(2300)]));
        let mut monitor = BatteryMonitor::new(adc, secs(5)).unwrap();
        assert_eq!(monitor.voltage(), Voltage::from_raw(2500));

        assert_eq!(monitor.poll(secs(64)), Ok(false));
        assert_eq!(monitor.poll(secs(65)), Ok(true));
        assert_eq!(monitor.voltage(), Voltage::from_raw(2400));
        assert_eq!(monitor.poll(secs(100)), Ok(false));
        assert_eq!(monitor.poll(secs(200)), Ok(true));
        assert_eq!(monitor.voltage(), Voltage::from_raw(2300));
    }

    #[test]
    fn test_custom_interval() {
        let mut monitor = BatteryMonitor::new(FixedAdc(1000), secs(0))
            .unwrap()
            .with_interval(secs(1));
        assert_eq!(monitor.poll(secs(1)), Ok(true));
    }

    #[test]
    fn test_failed_read_keeps_last_voltage() {
        let adc = ScriptedAdc(VecDeque::from([Ok(2500), Err(())]));
        let mut monitor = BatteryMonitor::new(adc, secs(0)).unwrap();

        assert_eq!(monitor.poll(secs(60)), Err(()));
        assert_eq!(monitor.voltage(), Voltage::from_raw(2500));
        // The failed read is retried on the next poll.
        assert_eq!(monitor.poll(secs(61)), Err(()));
    }

    #[test]
    fn test_clock_going_backwards_doesnt_read() {
        let mut monitor = BatteryMonitor::new(FixedAdc(1000), secs(100)).unwrap();
        assert_eq!(monitor.poll(secs(10)), Ok(false));
    }

    #[test]
    fn test_initial_read_failure() {
        let adc = ScriptedAdc(VecDeque::from([Err(())]));
        assert!(BatteryMonitor::new(adc, secs(0)).is_err());
    }
}
