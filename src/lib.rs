//! A USB device engine for AVR8 USB controllers
//!
//! `avr-usbd` turns the USB controller of an ATmega16U4 / ATmega32U4 into
//! an enumerable USB device. It tracks the device state through bus
//! events, and answers the chapter 9 standard control requests. Your
//! application supplies the descriptors, and may handle class or vendor
//! requests before the standard handlers run.
//!
//! The engine has three parts:
//!
//! - the [`lifecycle`], which powers the controller up and down,
//! - the event router in [`interrupt`], called from the USB interrupts,
//! - the dispatcher in [`control`], which answers SETUP packets.
//!
//! All three act on a [`DeviceContext`], and reach the hardware through the
//! [`Controller`] and [`Endpoints`] traits. [`Usb`] implements both traits
//! on the real registers. [`Device`] bundles everything together.
//!
//! To use the driver, you must define a safe implementation of
//! [`Peripherals`]. See the peripherals documentation for more information.
//!
//! Types that appear in this API derive `defmt::Format` when the `defmt-03`
//! feature is enabled. The same feature turns on the engine's log messages.

#![no_std]

#[cfg(test)]
extern crate std;

// The defmt macros expand to `defmt::` paths.
#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod application;
mod config;
mod controller;
mod device;
mod driver;
mod endpoint;
mod error;
mod pll;
mod ral;
mod request;
mod state;
mod vcell;

pub mod control;
pub mod descriptor;
pub mod interrupt;
pub mod lifecycle;
pub mod stream;

#[cfg(test)]
mod mock;

pub use application::Application;
pub use config::{Config, InputClock, Options, Speed, INTERNAL_SERIAL_INDEX};
pub use controller::{interrupt_free, Controller, Interrupts};
pub use device::Device;
pub use driver::{Usb, ENDPOINT_COUNT};
pub use endpoint::{Endpoints, Kind, CONTROL_ENDPOINT, ENDPOINT_NUMBER_MASK};
pub use error::Error;
pub use request::{request_type, ControlRequest};
pub use state::{DeviceContext, DeviceState, DeviceStatus};

/// A type that owns the USB register blocks
///
/// An implementation of `Peripherals` is expected to own
///
/// - the USB controller registers, `UHWCON` through `UEINT`
/// - the PLL registers, `PLLCSR` through `PLLFRQ`
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that
/// owns the various register blocks required for all USB
/// operation. The pointer returned by the methods are
/// assumed to be valid, and will be cast to a register
/// definition.
///
/// # Example
///
/// A safe implementation of `Peripherals` for the ATmega32U4, which
/// takes the registers once.
///
/// ```
/// use avr_usbd::Peripherals;
/// use core::sync::atomic::{AtomicBool, Ordering};
///
/// struct Registers(());
///
/// impl Registers {
///     /// Returns `None` if the registers are already taken
///     pub fn take() -> Option<Registers> {
///         static TAKEN: AtomicBool = AtomicBool::new(false);
///         (!TAKEN.swap(true, Ordering::Relaxed)).then_some(Registers(()))
///     }
/// }
///
/// unsafe impl Peripherals for Registers {
///     fn usb(&self) -> *const () {
///         0xD7 as _
///     }
///     fn pll(&self) -> *const () {
///         0x49 as _
///     }
/// }
///
/// let registers = Registers::take().unwrap();
/// assert_eq!(registers.usb(), 0xD7 as *const ());
/// assert!(Registers::take().is_none());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the USB controller registers
    fn usb(&self) -> *const ();
    /// Returns the address of the PLL registers
    fn pll(&self) -> *const ();
    /// Read a byte of the signature row
    ///
    /// Implement this to enable the internal serial number. The default
    /// returns `None`.
    fn signature_byte(&self, address: u8) -> Option<u8> {
        let _ = address;
        None
    }
}
