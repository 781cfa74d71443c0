//! Register access layer for the AVR8 USB controller
//!
//! Register blocks are plain `#[repr(C)]` structs of [`VCell`]s, laid out
//! to match the data-space addresses of the ATmega16U4 / ATmega32U4.
//! Each register module carries RAL-compatible field definitions, so the
//! `ral-registers` macros work on them.

#![allow(non_snake_case, non_upper_case_globals, dead_code)]

use crate::{vcell::VCell, Peripherals};

pub use ral_registers::{modify_reg, read_reg, write_reg};

/// Defines a register module with RAL field descriptions
///
/// Fields are `NAME: offset, width`.
macro_rules! register {
    ($reg:ident { $($field:ident: $offset:literal, $width:literal;)* }) => {
        pub mod $reg {
            $(
                pub mod $field {
                    pub const offset: u8 = $offset;
                    pub const mask: u8 = (((1u16 << $width) - 1) as u8) << offset;
                    pub mod R {}
                    pub mod W {}
                    pub mod RW {}
                }
            )*
        }
    };
}

/// USB controller registers, `UHWCON` (0xD7) through `UEINT` (0xF4)
pub mod usb {
    use super::VCell;

    #[repr(C)]
    pub struct RegisterBlock {
        pub UHWCON: VCell<u8>,
        pub USBCON: VCell<u8>,
        pub USBSTA: VCell<u8>,
        pub USBINT: VCell<u8>,
        _reserved0: [u8; 5],
        pub UDCON: VCell<u8>,
        pub UDINT: VCell<u8>,
        pub UDIEN: VCell<u8>,
        pub UDADDR: VCell<u8>,
        pub UDFNUML: VCell<u8>,
        pub UDFNUMH: VCell<u8>,
        pub UDMFN: VCell<u8>,
        _reserved1: [u8; 1],
        pub UEINTX: VCell<u8>,
        pub UENUM: VCell<u8>,
        pub UERST: VCell<u8>,
        pub UECONX: VCell<u8>,
        pub UECFG0X: VCell<u8>,
        pub UECFG1X: VCell<u8>,
        pub UESTA0X: VCell<u8>,
        pub UESTA1X: VCell<u8>,
        pub UEIENX: VCell<u8>,
        pub UEDATX: VCell<u8>,
        pub UEBCLX: VCell<u8>,
        pub UEBCHX: VCell<u8>,
        pub UEINT: VCell<u8>,
    }

    impl RegisterBlock {
        pub const fn new() -> Self {
            RegisterBlock {
                UHWCON: VCell::new(0),
                USBCON: VCell::new(0),
                USBSTA: VCell::new(0),
                USBINT: VCell::new(0),
                _reserved0: [0; 5],
                UDCON: VCell::new(0),
                UDINT: VCell::new(0),
                UDIEN: VCell::new(0),
                UDADDR: VCell::new(0),
                UDFNUML: VCell::new(0),
                UDFNUMH: VCell::new(0),
                UDMFN: VCell::new(0),
                _reserved1: [0; 1],
                UEINTX: VCell::new(0),
                UENUM: VCell::new(0),
                UERST: VCell::new(0),
                UECONX: VCell::new(0),
                UECFG0X: VCell::new(0),
                UECFG1X: VCell::new(0),
                UESTA0X: VCell::new(0),
                UESTA1X: VCell::new(0),
                UEIENX: VCell::new(0),
                UEDATX: VCell::new(0),
                UEBCLX: VCell::new(0),
                UEBCHX: VCell::new(0),
                UEINT: VCell::new(0),
            }
        }
    }

    const _: [(); 1] = [(); (core::mem::size_of::<RegisterBlock>() == 0xF4 - 0xD7 + 1) as usize];

    register!(UHWCON { UVREGE: 0, 1; });
    register!(USBCON { USBE: 7, 1; FRZCLK: 5, 1; OTGPADE: 4, 1; VBUSTE: 0, 1; });
    register!(USBSTA { SPEED: 3, 1; ID: 1, 1; VBUS: 0, 1; });
    register!(USBINT { VBUSTI: 0, 1; });
    register!(UDCON { RSTCPU: 3, 1; LSM: 2, 1; RMWKUP: 1, 1; DETACH: 0, 1; });
    register!(UDINT { UPRSMI: 6, 1; EORSMI: 5, 1; WAKEUPI: 4, 1; EORSTI: 3, 1; SOFI: 2, 1; SUSPI: 0, 1; });
    register!(UDIEN { UPRSME: 6, 1; EORSME: 5, 1; WAKEUPE: 4, 1; EORSTE: 3, 1; SOFE: 2, 1; SUSPE: 0, 1; });
    register!(UDADDR { ADDEN: 7, 1; UADD: 0, 7; });
    register!(UDFNUML { FNUM: 0, 8; });
    register!(UDFNUMH { FNUM: 0, 3; });
    register!(UEINTX {
        FIFOCON: 7, 1;
        NAKINI: 6, 1;
        RWAL: 5, 1;
        NAKOUTI: 4, 1;
        RXSTPI: 3, 1;
        RXOUTI: 2, 1;
        STALLEDI: 1, 1;
        TXINI: 0, 1;
    });
    register!(UENUM { EPNUM: 0, 3; });
    register!(UERST { EPRST: 0, 7; });
    register!(UECONX { STALLRQ: 5, 1; STALLRQC: 4, 1; RSTDT: 3, 1; EPEN: 0, 1; });
    register!(UECFG0X { EPTYPE: 6, 2; EPDIR: 0, 1; });
    register!(UECFG1X { EPSIZE: 4, 3; EPBK: 2, 2; ALLOC: 1, 1; });
    register!(UESTA0X { CFGOK: 7, 1; OVERFI: 6, 1; UNDERFI: 5, 1; DTSEQ: 2, 2; NBUSYBK: 0, 2; });
    register!(UEIENX {
        FLERRE: 7, 1;
        NAKINE: 6, 1;
        NAKOUTE: 4, 1;
        RXSTPE: 3, 1;
        RXOUTE: 2, 1;
        STALLEDE: 1, 1;
        TXINE: 0, 1;
    });
    register!(UEBCLX { BYCT: 0, 8; });
    register!(UEBCHX { BYCT: 0, 3; });
}

/// PLL registers, `PLLCSR` (0x49) through `PLLFRQ` (0x52)
pub mod pll {
    use super::VCell;

    #[repr(C)]
    pub struct RegisterBlock {
        pub PLLCSR: VCell<u8>,
        _reserved0: [u8; 8],
        pub PLLFRQ: VCell<u8>,
    }

    impl RegisterBlock {
        pub const fn new() -> Self {
            RegisterBlock {
                PLLCSR: VCell::new(0),
                _reserved0: [0; 8],
                PLLFRQ: VCell::new(0),
            }
        }
    }

    const _: [(); 1] = [(); (core::mem::size_of::<RegisterBlock>() == 0x52 - 0x49 + 1) as usize];

    register!(PLLCSR { PINDIV: 4, 1; PLLE: 1, 1; PLOCK: 0, 1; });
    register!(PLLFRQ { PINMUX: 7, 1; PLLUSB: 6, 1; PLLTM: 4, 2; PDIV: 0, 4; });
}

/// All register blocks used by the driver
pub struct Instances {
    pub usb: &'static usb::RegisterBlock,
    pub pll: &'static pll::RegisterBlock,
}

/// Cast the peripheral addresses into register blocks
pub fn instances<P: Peripherals>(peripherals: &P) -> Instances {
    // Safety: the implementer of Peripherals guarantees that the
    // addresses are valid, and owned by the driver.
    unsafe {
        Instances {
            usb: &*(peripherals.usb() as *const usb::RegisterBlock),
            pll: &*(peripherals.pll() as *const pll::RegisterBlock),
        }
    }
}
