//! Engine configuration

use bitflags::bitflags;

bitflags! {
    /// Controller options applied by [`init`](crate::lifecycle::init)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options : u8 {
        /// Leave the USB pad regulator off
        ///
        /// Use this when the device is supplied with 3.3V.
        const REGULATOR_DISABLED = 1 << 1;
        /// The application manages the USB PLL
        ///
        /// When set, the engine never turns the PLL on or off, and never
        /// waits for it to lock.
        const MANUAL_PLL = 1 << 2;
    }
}

/// Bus speed
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Speed {
    Low,
    #[default]
    Full,
}

/// Frequency of the clock feeding the USB PLL
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum InputClock {
    Mhz8,
    #[default]
    Mhz16,
}

/// Default string descriptor index of the internal serial number
pub const INTERNAL_SERIAL_INDEX: u8 = 0xDC;

/// Engine configuration
///
/// Use [`Default`] and adjust what you need:
///
/// ```
/// use avr_usbd::{Config, Options, Speed};
///
/// let config = Config {
///     options: Options::REGULATOR_DISABLED,
///     speed: Speed::Full,
///     max_configurations: 2,
///     ..Config::default()
/// };
/// assert_eq!(config.stream_timeout_ms, 100);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
    pub options: Options,
    pub speed: Speed,
    pub input_clock: InputClock,
    /// Highest configuration number accepted by SetConfiguration
    pub max_configurations: u8,
    /// String index answered with the factory serial number
    ///
    /// `None` disables the internal serial number. It's also skipped when
    /// the hardware can't read its signature row.
    pub internal_serial: Option<u8>,
    /// How long a control data or status stage may stall, in frames (ms)
    pub stream_timeout_ms: u16,
    /// How many times to poll the PLL lock, or resume completion, before
    /// giving up
    pub spin_limit: u32,
    /// Control endpoint size used when the device descriptor can't be
    /// resolved
    pub control_endpoint_size: u8,
    /// Handle SETUP packets from the control endpoint interrupt, instead of
    /// from [`task`](crate::lifecycle::task)
    pub interrupt_control_endpoint: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            options: Options::empty(),
            speed: Speed::Full,
            input_clock: InputClock::Mhz16,
            max_configurations: 1,
            internal_serial: Some(INTERNAL_SERIAL_INDEX),
            stream_timeout_ms: 100,
            spin_limit: 100_000,
            control_endpoint_size: 8,
            interrupt_control_endpoint: false,
        }
    }
}

impl Config {
    /// Returns `true` if the engine controls the PLL
    pub fn automatic_pll(&self) -> bool {
        !self.options.contains(Options::MANUAL_PLL)
    }
}
