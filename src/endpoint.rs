//! Endpoint capability
//!
//! The AVR8 controller exposes one endpoint at a time through a window of
//! registers. Callers select an endpoint, then operate on its FIFO and
//! handshake flags. [`Endpoints`] describes that window, so the dispatcher
//! can run against real registers or a simulation.

use usb_device::endpoint::EndpointAddress;

/// Endpoint number of the control endpoint
pub const CONTROL_ENDPOINT: u8 = 0;

/// Mask for the endpoint number within a `wIndex` or endpoint address
pub const ENDPOINT_NUMBER_MASK: u8 = 0x0F;

/// Endpoint transfer type, as programmed into the controller
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum Kind {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// Access to the currently selected endpoint
///
/// Every method other than [`select_endpoint`](Endpoints::select_endpoint),
/// [`configure_endpoint`](Endpoints::configure_endpoint) and
/// [`reset_endpoint`](Endpoints::reset_endpoint) acts on the endpoint
/// selected last.
pub trait Endpoints {
    /// Number of endpoints, including the control endpoint
    ///
    /// Valid endpoint numbers are `0..endpoint_count()`.
    fn endpoint_count(&self) -> u8;
    /// Returns the number of the selected endpoint
    fn current_endpoint(&self) -> u8;
    /// Select an endpoint by number
    fn select_endpoint(&mut self, number: u8);
    /// Configure and enable an endpoint
    ///
    /// Returns `false` if the controller rejected the configuration. The
    /// configured endpoint is selected on return.
    fn configure_endpoint(
        &mut self,
        address: EndpointAddress,
        kind: Kind,
        size: u16,
        banks: u8,
    ) -> bool;
    /// Returns `true` if the selected endpoint is enabled
    fn is_enabled(&self) -> bool;

    /// Read one byte from the endpoint bank
    fn read_u8(&mut self) -> u8;
    /// Write one byte to the endpoint bank
    fn write_u8(&mut self, byte: u8);
    /// Number of bytes currently held in the endpoint bank
    fn bytes_in_endpoint(&self) -> u16;

    fn is_setup_received(&self) -> bool;
    /// Returns `true` if the IN bank can accept data
    fn is_in_ready(&self) -> bool;
    fn is_out_received(&self) -> bool;
    fn is_stalled(&self) -> bool;

    /// Acknowledge a SETUP packet, freeing the bank
    fn clear_setup(&mut self);
    /// Send the IN bank to the host
    ///
    /// An empty bank sends a zero-length packet.
    fn clear_in(&mut self);
    /// Acknowledge an OUT packet, freeing the bank
    fn clear_out(&mut self);
    fn stall(&mut self);
    fn clear_stall(&mut self);
    /// Reset the FIFO of endpoint `number`
    fn reset_endpoint(&mut self, number: u8);
    /// Reset the data toggle of the selected endpoint
    fn reset_data_toggle(&mut self);

    /// Write a little-endian `u16` to the endpoint bank
    fn write_u16_le(&mut self, value: u16) {
        for byte in value.to_le_bytes() {
            self.write_u8(byte);
        }
    }
}

/// Encode an endpoint size as the controller's `EPSIZE` code
///
/// Sizes round up to the next power of two, starting at 8 bytes.
pub(crate) const fn size_code(size: u16) -> u8 {
    let mut code = 0;
    let mut checked: u16 = 8;
    while checked < size && code < 6 {
        code += 1;
        checked <<= 1;
    }
    code
}
