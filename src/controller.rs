//! Controller capability
//!
//! Controller-wide registers: power, clocks, bus attachment, addressing and
//! interrupt flags. The lifecycle and event router only touch hardware
//! through [`Controller`] and [`Endpoints`](crate::Endpoints).

use crate::{config::InputClock, config::Speed, error::Error};
use bitflags::bitflags;

bitflags! {
    /// Controller interrupt sources
    ///
    /// `SETUP` is the control endpoint's SETUP interrupt. Implementations
    /// handle it on endpoint 0, regardless of the selected endpoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts : u8 {
        const START_OF_FRAME = 1 << 0;
        const VBUS = 1 << 1;
        const SUSPEND = 1 << 2;
        const WAKE_UP = 1 << 3;
        const END_OF_RESET = 1 << 4;
        const SETUP = 1 << 5;
    }
}

/// Access to the USB controller
pub trait Controller {
    /// Turn the USB pad regulator on or off
    fn set_regulator(&mut self, enabled: bool);
    /// Turn the OTG pad (VBUS detection) on or off
    fn set_otg_pad(&mut self, enabled: bool);

    /// Program the PLL for a 48MHz USB clock from `input`
    fn configure_pll(&mut self, input: InputClock);
    fn pll_on(&mut self);
    fn pll_off(&mut self);
    fn is_pll_locked(&self) -> bool;

    /// Freeze or un-freeze the USB clock
    fn set_clock_frozen(&mut self, frozen: bool);
    fn set_controller_enabled(&mut self, enabled: bool);
    /// Reset the controller by cycling its enable
    fn reset_controller(&mut self);

    /// Connect the pull-up, attaching to the bus
    fn attach(&mut self);
    fn detach(&mut self);
    fn set_speed(&mut self, speed: Speed);
    fn is_vbus_present(&self) -> bool;

    /// Program the device address
    ///
    /// An address of 0 disables address filtering.
    fn set_device_address(&mut self, address: u8);
    fn is_address_set(&self) -> bool;
    /// Returns the last 11-bit frame number
    fn frame_number(&self) -> u16;

    /// Start resume signalling
    fn start_remote_wakeup(&mut self);
    /// Returns `true` while resume signalling is in progress
    fn is_remote_wakeup_pending(&self) -> bool;

    fn pending_interrupts(&self) -> Interrupts;
    fn enabled_interrupts(&self) -> Interrupts;
    fn enable_interrupts(&mut self, interrupts: Interrupts);
    fn disable_interrupts(&mut self, interrupts: Interrupts);
    fn clear_interrupts(&mut self, interrupts: Interrupts);

    /// Run `f` with the CPU's global interrupts disabled
    ///
    /// The previous global interrupt state is restored when `f` returns.
    fn interrupt_free<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R;

    /// Read one byte of the factory signature row
    ///
    /// Returns `None` if the hardware can't read the signature row.
    fn signature_byte(&self, address: u8) -> Option<u8> {
        let _ = address;
        None
    }
}

/// Returns `true` if the interrupt is both pending and enabled
pub(crate) fn is_triggered<C: Controller + ?Sized>(controller: &C, interrupt: Interrupts) -> bool {
    (controller.pending_interrupts() & controller.enabled_interrupts()).contains(interrupt)
}

/// Run `f` with global interrupts disabled
///
/// The previous global interrupt state is restored afterwards.
pub fn interrupt_free<C, R>(controller: &mut C, f: impl FnOnce(&mut C) -> R) -> R
where
    C: Controller,
{
    controller.interrupt_free(f)
}

/// Poll the PLL lock at most `spin_limit` times
pub(crate) fn wait_for_pll_lock<C: Controller>(controller: &C, spin_limit: u32) -> Result<(), Error> {
    for _ in 0..spin_limit.max(1) {
        if controller.is_pll_locked() {
            return Ok(());
        }
    }
    warn!("PLL did not lock");
    Err(Error::ClockLockTimeout)
}

#[cfg(test)]
mod test {
    use super::{interrupt_free, wait_for_pll_lock, Controller};
    use crate::{error::Error, mock::Hardware};

    #[test]
    fn interrupt_free_restores_mask() {
        let mut hw = Hardware::new();
        hw.global_interrupts = true;
        let inside = interrupt_free(&mut hw, |hw| hw.global_interrupts);
        assert!(!inside);
        assert!(hw.global_interrupts);

        hw.global_interrupts = false;
        interrupt_free(&mut hw, |_| ());
        assert!(!hw.global_interrupts);
    }

    #[test]
    fn pll_lock() {
        let mut hw = Hardware::new();
        hw.pll_on();
        assert_eq!(wait_for_pll_lock(&hw, 10), Ok(()));
        hw.pll_locks = false;
        assert_eq!(wait_for_pll_lock(&hw, 10), Err(Error::ClockLockTimeout));
    }
}
