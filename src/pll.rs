//! USB PLL support
//!
//! The USB clock is the PLL output divided down to 48MHz. The PLL runs at
//! 96MHz from either an 8MHz or a 16MHz input.

use crate::{config::InputClock, ral};

/// `PDIV` setting for a 96MHz PLL output
const PDIV_96MHZ: u8 = 0b0100;

/// Program the PLL output frequency
pub fn configure(pll: &ral::pll::RegisterBlock) {
    ral::write_reg!(ral::pll, pll, PLLFRQ, PDIV: PDIV_96MHZ);
}

/// `PINDIV` divides a 16MHz input down to 8MHz
fn input_divider(input: InputClock) -> u8 {
    match input {
        InputClock::Mhz8 => 0,
        InputClock::Mhz16 => 1,
    }
}

/// Turn the PLL on
///
/// The input divider is programmed before the enable.
pub fn enable(pll: &ral::pll::RegisterBlock, input: InputClock) {
    let pindiv = input_divider(input);
    ral::write_reg!(ral::pll, pll, PLLCSR, PINDIV: pindiv);
    ral::write_reg!(ral::pll, pll, PLLCSR, PINDIV: pindiv, PLLE: 1);
}

pub fn disable(pll: &ral::pll::RegisterBlock) {
    ral::write_reg!(ral::pll, pll, PLLCSR, 0);
}

pub fn is_locked(pll: &ral::pll::RegisterBlock) -> bool {
    ral::read_reg!(ral::pll, pll, PLLCSR, PLOCK == 1)
}
