//! Descriptors synthesized by the engine

use crate::controller::{interrupt_free, Controller};
use usb_device::descriptor::descriptor_type;

/// Signature row address of the first serial number byte
pub const SERIAL_START_ADDRESS: u8 = 0x0E;
/// Length of the factory serial number
pub const SERIAL_BITS: usize = 80;

const SERIAL_CHARACTERS: usize = SERIAL_BITS / 4;

/// Size of the internal serial string descriptor
pub const SERIAL_DESCRIPTOR_LEN: usize = 2 + 2 * SERIAL_CHARACTERS;

/// Offset of `bMaxPacketSize0` in the device descriptor
pub(crate) const MAX_PACKET_SIZE_0: usize = 7;

/// Build the string descriptor of the factory serial number
///
/// Each signature byte contributes two hex digits, low nibble first. The
/// signature row is read with interrupts disabled. Returns `None` if the
/// hardware can't read its signature row.
pub fn internal_serial<C: Controller>(controller: &mut C) -> Option<[u8; SERIAL_DESCRIPTOR_LEN]> {
    interrupt_free(controller, |controller| {
        let mut descriptor = [0; SERIAL_DESCRIPTOR_LEN];
        descriptor[0] = SERIAL_DESCRIPTOR_LEN as u8;
        descriptor[1] = descriptor_type::STRING;

        let mut address = SERIAL_START_ADDRESS;
        for (n, character) in descriptor[2..].chunks_exact_mut(2).enumerate() {
            let mut byte = controller.signature_byte(address)?;
            if n % 2 != 0 {
                byte >>= 4;
                address += 1;
            }
            let digit = u16::from(hex_digit(byte & 0x0F));
            character.copy_from_slice(&digit.to_le_bytes());
        }
        Some(descriptor)
    })
}

fn hex_digit(nibble: u8) -> u8 {
    if nibble >= 10 {
        b'A' + nibble - 10
    } else {
        b'0' + nibble
    }
}
