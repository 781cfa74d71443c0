//! SETUP packet decoding

use crate::endpoint::{Endpoints, ENDPOINT_NUMBER_MASK};
use usb_device::{
    control::{Recipient, RequestType},
    UsbDirection,
};

/// Build a `bmRequestType` value from its parts
pub const fn request_type(direction: UsbDirection, kind: RequestType, recipient: Recipient) -> u8 {
    direction as u8 | (kind as u8) << 5 | recipient as u8
}

/// A control request, decoded from an 8-byte SETUP packet
///
/// Multi-byte fields are little endian on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ControlRequest {
    /// Raw `bmRequestType`
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    /// Number of bytes the host expects in the data stage
    pub length: u16,
}

impl ControlRequest {
    /// Size of a SETUP packet
    pub const SIZE: usize = 8;

    pub fn parse(packet: &[u8; Self::SIZE]) -> Self {
        ControlRequest {
            request_type: packet[0],
            request: packet[1],
            value: u16::from_le_bytes([packet[2], packet[3]]),
            index: u16::from_le_bytes([packet[4], packet[5]]),
            length: u16::from_le_bytes([packet[6], packet[7]]),
        }
    }

    /// Read a SETUP packet from the selected endpoint
    pub fn read<E: Endpoints + ?Sized>(endpoints: &mut E) -> Self {
        let mut packet = [0; Self::SIZE];
        for byte in packet.iter_mut() {
            *byte = endpoints.read_u8();
        }
        Self::parse(&packet)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let [value_lo, value_hi] = self.value.to_le_bytes();
        let [index_lo, index_hi] = self.index.to_le_bytes();
        let [length_lo, length_hi] = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value_lo,
            value_hi,
            index_lo,
            index_hi,
            length_lo,
            length_hi,
        ]
    }

    pub fn direction(&self) -> UsbDirection {
        self.request_type.into()
    }

    pub fn kind(&self) -> RequestType {
        match (self.request_type >> 5) & 0b11 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0b1_1111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }

    /// Descriptor type and index of a GET_DESCRIPTOR request
    pub fn descriptor_type_index(&self) -> (u8, u8) {
        let [index, descriptor_type] = self.value.to_le_bytes();
        (descriptor_type, index)
    }

    /// Endpoint number targeted by an endpoint-recipient request
    pub fn endpoint_number(&self) -> u8 {
        self.index as u8 & ENDPOINT_NUMBER_MASK
    }
}
