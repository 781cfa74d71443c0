//! AVR8 USB controller driver
//!
//! [`Usb`] implements [`Controller`] and [`Endpoints`] with the USB
//! controller registers of the ATmega16U4 and ATmega32U4.

use crate::{
    config::{InputClock, Speed},
    controller::{Controller, Interrupts},
    endpoint::{size_code, Endpoints, Kind, CONTROL_ENDPOINT},
    pll, ral, Peripherals,
};
use usb_device::endpoint::EndpointAddress;

/// Number of hardware endpoints, including the control endpoint
pub const ENDPOINT_COUNT: u8 = 7;

/// The USB controller
///
/// `Usb` owns the register blocks described by a [`Peripherals`]
/// implementation. Pass it to a [`Device`](crate::Device), or use it with
/// the free functions of the engine.
pub struct Usb<P> {
    peripherals: P,
    usb: &'static ral::usb::RegisterBlock,
    pll: &'static ral::pll::RegisterBlock,
    input: InputClock,
}

impl<P: Peripherals> Usb<P> {
    /// Create a driver
    ///
    /// Creation doesn't touch the registers.
    pub fn new(peripherals: P) -> Self {
        let ral::Instances { usb, pll } = ral::instances(&peripherals);
        Usb {
            peripherals,
            usb,
            pll,
            input: InputClock::default(),
        }
    }

    /// Release the peripherals
    pub fn release(self) -> P {
        self.peripherals
    }

    /// Run `f` with the control endpoint selected, then restore the
    /// selection
    fn on_control_endpoint<R>(&self, f: impl FnOnce(&ral::usb::RegisterBlock) -> R) -> R {
        let previous = ral::read_reg!(ral::usb, self.usb, UENUM, EPNUM);
        ral::write_reg!(ral::usb, self.usb, UENUM, EPNUM: CONTROL_ENDPOINT);
        let result = f(self.usb);
        ral::write_reg!(ral::usb, self.usb, UENUM, EPNUM: previous);
        result
    }
}

/// `UDINT` / `UDIEN` bits for the device interrupts
///
/// Both registers share the same layout.
fn device_mask(interrupts: Interrupts) -> u8 {
    use ral::usb::UDINT;
    let mut mask = 0;
    if interrupts.contains(Interrupts::START_OF_FRAME) {
        mask |= UDINT::SOFI::mask;
    }
    if interrupts.contains(Interrupts::SUSPEND) {
        mask |= UDINT::SUSPI::mask;
    }
    if interrupts.contains(Interrupts::WAKE_UP) {
        mask |= UDINT::WAKEUPI::mask;
    }
    if interrupts.contains(Interrupts::END_OF_RESET) {
        mask |= UDINT::EORSTI::mask;
    }
    mask
}

/// Inverse of [`device_mask`]
fn device_interrupts(bits: u8) -> Interrupts {
    use ral::usb::UDINT;
    let mut interrupts = Interrupts::empty();
    interrupts.set(Interrupts::START_OF_FRAME, bits & UDINT::SOFI::mask != 0);
    interrupts.set(Interrupts::SUSPEND, bits & UDINT::SUSPI::mask != 0);
    interrupts.set(Interrupts::WAKE_UP, bits & UDINT::WAKEUPI::mask != 0);
    interrupts.set(Interrupts::END_OF_RESET, bits & UDINT::EORSTI::mask != 0);
    interrupts
}

/// The two `UDADDR` writes that program `address`
///
/// The address must be in place before `ADDEN` is set. The first write
/// keeps the current enable bit, and the second sets it.
fn address_sequence(udaddr: u8, address: u8) -> [u8; 2] {
    use ral::usb::UDADDR;
    let first = (udaddr & UDADDR::ADDEN::mask) | (address & UDADDR::UADD::mask);
    [first, first | UDADDR::ADDEN::mask]
}

impl<P: Peripherals> Controller for Usb<P> {
    fn set_regulator(&mut self, enabled: bool) {
        ral::modify_reg!(ral::usb, self.usb, UHWCON, UVREGE: enabled as u8);
    }

    fn set_otg_pad(&mut self, enabled: bool) {
        ral::modify_reg!(ral::usb, self.usb, USBCON, OTGPADE: enabled as u8);
    }

    fn configure_pll(&mut self, input: InputClock) {
        self.input = input;
        pll::configure(self.pll);
    }

    fn pll_on(&mut self) {
        pll::enable(self.pll, self.input);
    }

    fn pll_off(&mut self) {
        pll::disable(self.pll);
    }

    fn is_pll_locked(&self) -> bool {
        pll::is_locked(self.pll)
    }

    fn set_clock_frozen(&mut self, frozen: bool) {
        ral::modify_reg!(ral::usb, self.usb, USBCON, FRZCLK: frozen as u8);
    }

    fn set_controller_enabled(&mut self, enabled: bool) {
        ral::modify_reg!(ral::usb, self.usb, USBCON, USBE: enabled as u8);
    }

    fn reset_controller(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, USBCON, USBE: 0);
        ral::modify_reg!(ral::usb, self.usb, USBCON, USBE: 1);
    }

    fn attach(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UDCON, DETACH: 0);
    }

    fn detach(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UDCON, DETACH: 1);
    }

    fn set_speed(&mut self, speed: Speed) {
        ral::modify_reg!(ral::usb, self.usb, UDCON, LSM: (speed == Speed::Low) as u8);
    }

    fn is_vbus_present(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, USBSTA, VBUS == 1)
    }

    fn set_device_address(&mut self, address: u8) {
        if address == 0 {
            ral::write_reg!(ral::usb, self.usb, UDADDR, 0);
            return;
        }
        let udaddr = ral::read_reg!(ral::usb, self.usb, UDADDR);
        for value in address_sequence(udaddr, address) {
            ral::write_reg!(ral::usb, self.usb, UDADDR, value);
        }
    }

    fn is_address_set(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UDADDR, ADDEN == 1)
    }

    fn frame_number(&self) -> u16 {
        let (low, high) = (
            ral::read_reg!(ral::usb, self.usb, UDFNUML),
            ral::read_reg!(ral::usb, self.usb, UDFNUMH, FNUM),
        );
        u16::from(high) << 8 | u16::from(low)
    }

    fn start_remote_wakeup(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UDCON, RMWKUP: 1);
    }

    fn is_remote_wakeup_pending(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UDCON, RMWKUP == 1)
    }

    fn pending_interrupts(&self) -> Interrupts {
        let mut pending = device_interrupts(ral::read_reg!(ral::usb, self.usb, UDINT));
        pending.set(
            Interrupts::VBUS,
            ral::read_reg!(ral::usb, self.usb, USBINT, VBUSTI == 1),
        );
        let setup = self.on_control_endpoint(|usb| ral::read_reg!(ral::usb, usb, UEINTX, RXSTPI == 1));
        pending.set(Interrupts::SETUP, setup);
        pending
    }

    fn enabled_interrupts(&self) -> Interrupts {
        let mut enabled = device_interrupts(ral::read_reg!(ral::usb, self.usb, UDIEN));
        enabled.set(
            Interrupts::VBUS,
            ral::read_reg!(ral::usb, self.usb, USBCON, VBUSTE == 1),
        );
        let setup = self.on_control_endpoint(|usb| ral::read_reg!(ral::usb, usb, UEIENX, RXSTPE == 1));
        enabled.set(Interrupts::SETUP, setup);
        enabled
    }

    fn enable_interrupts(&mut self, interrupts: Interrupts) {
        let mask = device_mask(interrupts);
        ral::modify_reg!(ral::usb, self.usb, UDIEN, |udien| udien | mask);
        if interrupts.contains(Interrupts::VBUS) {
            ral::modify_reg!(ral::usb, self.usb, USBCON, VBUSTE: 1);
        }
        if interrupts.contains(Interrupts::SETUP) {
            self.on_control_endpoint(|usb| ral::modify_reg!(ral::usb, usb, UEIENX, RXSTPE: 1));
        }
    }

    fn disable_interrupts(&mut self, interrupts: Interrupts) {
        let mask = device_mask(interrupts);
        ral::modify_reg!(ral::usb, self.usb, UDIEN, |udien| udien & !mask);
        if interrupts.contains(Interrupts::VBUS) {
            ral::modify_reg!(ral::usb, self.usb, USBCON, VBUSTE: 0);
        }
        if interrupts.contains(Interrupts::SETUP) {
            self.on_control_endpoint(|usb| ral::modify_reg!(ral::usb, usb, UEIENX, RXSTPE: 0));
        }
    }

    fn clear_interrupts(&mut self, interrupts: Interrupts) {
        // Flags clear by writing zero; writing one has no effect.
        let mask = device_mask(interrupts);
        ral::modify_reg!(ral::usb, self.usb, UDINT, |udint| udint & !mask);
        if interrupts.contains(Interrupts::VBUS) {
            ral::modify_reg!(ral::usb, self.usb, USBINT, VBUSTI: 0);
        }
        if interrupts.contains(Interrupts::SETUP) {
            self.on_control_endpoint(|usb| ral::modify_reg!(ral::usb, usb, UEINTX, RXSTPI: 0));
        }
    }

    fn interrupt_free<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        #[cfg(target_arch = "avr")]
        {
            avr_device::interrupt::free(|_| f(self))
        }
        // Hosted builds have no AVR interrupts to mask.
        #[cfg(not(target_arch = "avr"))]
        {
            f(self)
        }
    }

    fn signature_byte(&self, address: u8) -> Option<u8> {
        self.peripherals.signature_byte(address)
    }
}

impl<P: Peripherals> Endpoints for Usb<P> {
    fn endpoint_count(&self) -> u8 {
        ENDPOINT_COUNT
    }

    fn current_endpoint(&self) -> u8 {
        ral::read_reg!(ral::usb, self.usb, UENUM, EPNUM)
    }

    fn select_endpoint(&mut self, number: u8) {
        ral::write_reg!(ral::usb, self.usb, UENUM, EPNUM: number);
    }

    fn configure_endpoint(
        &mut self,
        address: EndpointAddress,
        kind: Kind,
        size: u16,
        banks: u8,
    ) -> bool {
        let number = address.index() as u8;
        if number >= ENDPOINT_COUNT {
            return false;
        }

        let cfg0 = (kind as u8) << ral::usb::UECFG0X::EPTYPE::offset | address.is_in() as u8;
        let cfg1 = size_code(size) << ral::usb::UECFG1X::EPSIZE::offset
            | u8::from(banks > 1) << ral::usb::UECFG1X::EPBK::offset
            | ral::usb::UECFG1X::ALLOC::mask;

        // Endpoint memory is allocated in order, so reconfiguring one
        // endpoint reallocates every endpoint above it.
        for ep in number..ENDPOINT_COUNT {
            self.select_endpoint(ep);
            let (cfg0, cfg1, ienx) = if ep == number {
                (cfg0, cfg1, 0)
            } else if ral::read_reg!(ral::usb, self.usb, UECFG1X, ALLOC == 1) {
                (
                    ral::read_reg!(ral::usb, self.usb, UECFG0X),
                    ral::read_reg!(ral::usb, self.usb, UECFG1X),
                    ral::read_reg!(ral::usb, self.usb, UEIENX),
                )
            } else {
                continue;
            };

            ral::modify_reg!(ral::usb, self.usb, UECONX, EPEN: 0);
            ral::modify_reg!(ral::usb, self.usb, UECFG1X, ALLOC: 0);
            ral::modify_reg!(ral::usb, self.usb, UECONX, EPEN: 1);
            ral::write_reg!(ral::usb, self.usb, UECFG0X, cfg0);
            ral::write_reg!(ral::usb, self.usb, UECFG1X, cfg1);
            ral::write_reg!(ral::usb, self.usb, UEIENX, ienx);

            if ral::read_reg!(ral::usb, self.usb, UESTA0X, CFGOK == 0) {
                warn!("EP{=u8} configuration rejected", ep);
                return false;
            }
        }

        self.select_endpoint(number);
        true
    }

    fn is_enabled(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UECONX, EPEN == 1)
    }

    fn read_u8(&mut self) -> u8 {
        ral::read_reg!(ral::usb, self.usb, UEDATX)
    }

    fn write_u8(&mut self, byte: u8) {
        ral::write_reg!(ral::usb, self.usb, UEDATX, byte);
    }

    fn bytes_in_endpoint(&self) -> u16 {
        let (low, high) = (
            ral::read_reg!(ral::usb, self.usb, UEBCLX),
            ral::read_reg!(ral::usb, self.usb, UEBCHX, BYCT),
        );
        u16::from(high) << 8 | u16::from(low)
    }

    fn is_setup_received(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UEINTX, RXSTPI == 1)
    }

    fn is_in_ready(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UEINTX, TXINI == 1)
    }

    fn is_out_received(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UEINTX, RXOUTI == 1)
    }

    fn is_stalled(&self) -> bool {
        ral::read_reg!(ral::usb, self.usb, UECONX, STALLRQ == 1)
    }

    fn clear_setup(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UEINTX, RXSTPI: 0);
    }

    fn clear_in(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UEINTX, TXINI: 0, FIFOCON: 0);
    }

    fn clear_out(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UEINTX, RXOUTI: 0, FIFOCON: 0);
    }

    fn stall(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UECONX, STALLRQ: 1);
    }

    fn clear_stall(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UECONX, STALLRQC: 1);
    }

    fn reset_endpoint(&mut self, number: u8) {
        ral::write_reg!(ral::usb, self.usb, UERST, EPRST: 1 << number);
        ral::write_reg!(ral::usb, self.usb, UERST, 0);
    }

    fn reset_data_toggle(&mut self) {
        ral::modify_reg!(ral::usb, self.usb, UECONX, RSTDT: 1);
    }
}

#[cfg(test)]
mod test {
    use super::{address_sequence, Usb};
    use crate::{
        config::{InputClock, Speed},
        controller::{Controller, Interrupts},
        endpoint::{Endpoints, Kind},
        ral, Peripherals,
    };
    use std::boxed::Box;
    use usb_device::{endpoint::EndpointAddress, UsbDirection};

    /// Register blocks in ordinary memory
    struct Memory {
        usb: &'static ral::usb::RegisterBlock,
        pll: &'static ral::pll::RegisterBlock,
    }

    unsafe impl Peripherals for Memory {
        fn usb(&self) -> *const () {
            self.usb as *const _ as _
        }
        fn pll(&self) -> *const () {
            self.pll as *const _ as _
        }
        fn signature_byte(&self, address: u8) -> Option<u8> {
            Some(address)
        }
    }

    fn usb() -> (Usb<Memory>, &'static ral::usb::RegisterBlock) {
        let memory = Memory {
            usb: Box::leak(Box::new(ral::usb::RegisterBlock::new())),
            pll: Box::leak(Box::new(ral::pll::RegisterBlock::new())),
        };
        let regs = memory.usb;
        (Usb::new(memory), regs)
    }

    #[test]
    fn device_address() {
        let (mut usb, regs) = usb();
        usb.set_device_address(5);
        assert_eq!(regs.UDADDR.read(), 0x85);
        assert!(usb.is_address_set());
        usb.set_device_address(0x7F);
        assert_eq!(regs.UDADDR.read(), 0xFF);
        usb.set_device_address(0);
        assert_eq!(regs.UDADDR.read(), 0);
        assert!(!usb.is_address_set());
    }

    #[test]
    fn address_before_enable() {
        assert_eq!(address_sequence(0x00, 5), [0x05, 0x85]);
        assert_eq!(address_sequence(0x83, 5), [0x85, 0x85]);
        assert_eq!(address_sequence(0x00, 0xFF), [0x7F, 0xFF]);
    }

    #[test]
    fn controller_bits() {
        let (mut usb, regs) = usb();
        usb.set_controller_enabled(true);
        usb.set_otg_pad(true);
        usb.set_clock_frozen(true);
        assert_eq!(regs.USBCON.read(), 0b1011_0000);
        usb.set_clock_frozen(false);
        assert_eq!(regs.USBCON.read(), 0b1001_0000);
        usb.set_regulator(true);
        assert_eq!(regs.UHWCON.read(), 1);

        usb.detach();
        usb.set_speed(Speed::Low);
        assert_eq!(regs.UDCON.read(), 0b0000_0101);
        usb.attach();
        usb.set_speed(Speed::Full);
        assert_eq!(regs.UDCON.read(), 0);
    }

    #[test]
    fn vbus_and_frame_number() {
        let (usb, regs) = usb();
        assert!(!usb.is_vbus_present());
        regs.USBSTA.write(1);
        assert!(usb.is_vbus_present());
        regs.UDFNUML.write(0x34);
        regs.UDFNUMH.write(0xFA);
        assert_eq!(usb.frame_number(), 0x234);
    }

    #[test]
    fn interrupt_mapping() {
        let (mut usb, regs) = usb();
        usb.enable_interrupts(Interrupts::VBUS | Interrupts::SUSPEND | Interrupts::END_OF_RESET);
        assert_eq!(regs.UDIEN.read(), 0b0000_1001);
        assert_eq!(regs.USBCON.read(), 0b0000_0001);
        assert_eq!(
            usb.enabled_interrupts(),
            Interrupts::VBUS | Interrupts::SUSPEND | Interrupts::END_OF_RESET
        );
        usb.disable_interrupts(Interrupts::SUSPEND);
        assert_eq!(regs.UDIEN.read(), 0b0000_1000);

        regs.UDINT.write(0b0001_0101);
        regs.USBINT.write(1);
        assert_eq!(
            usb.pending_interrupts(),
            Interrupts::VBUS | Interrupts::SUSPEND | Interrupts::START_OF_FRAME | Interrupts::WAKE_UP
        );
        usb.clear_interrupts(Interrupts::SUSPEND | Interrupts::VBUS);
        assert_eq!(regs.UDINT.read(), 0b0001_0100);
        assert_eq!(regs.USBINT.read(), 0);
    }

    #[test]
    fn setup_interrupt_on_control_endpoint() {
        let (mut usb, regs) = usb();
        usb.select_endpoint(3);
        usb.enable_interrupts(Interrupts::SETUP);
        // Without endpoint memory, the selection is shared. It must
        // still be restored.
        assert_eq!(usb.current_endpoint(), 3);
        assert_eq!(regs.UEIENX.read(), 0b0000_1000);
        assert!(usb.enabled_interrupts().contains(Interrupts::SETUP));
    }

    #[test]
    fn endpoint_flags() {
        let (mut usb, regs) = usb();
        regs.UEINTX.write(0b1000_1101);
        assert!(usb.is_setup_received());
        assert!(usb.is_out_received());
        assert!(usb.is_in_ready());
        usb.clear_setup();
        assert_eq!(regs.UEINTX.read(), 0b1000_0101);
        usb.clear_in();
        assert_eq!(regs.UEINTX.read(), 0b0000_0100);
        regs.UEINTX.write(0b1000_0100);
        usb.clear_out();
        assert_eq!(regs.UEINTX.read(), 0);
    }

    #[test]
    fn stall_and_toggle() {
        let (mut usb, regs) = usb();
        regs.UECONX.write(1);
        assert!(usb.is_enabled());
        usb.stall();
        assert!(usb.is_stalled());
        usb.reset_data_toggle();
        assert_eq!(regs.UECONX.read(), 0b0010_1001);
    }

    #[test]
    fn endpoint_fifo() {
        let (mut usb, regs) = usb();
        usb.write_u8(0xA5);
        assert_eq!(regs.UEDATX.read(), 0xA5);
        assert_eq!(usb.read_u8(), 0xA5);
        regs.UEBCLX.write(0x40);
        regs.UEBCHX.write(0x01);
        assert_eq!(usb.bytes_in_endpoint(), 0x140);
        usb.reset_endpoint(4);
        assert_eq!(regs.UERST.read(), 0);
    }

    #[test]
    fn configure_endpoint_registers() {
        let (mut usb, regs) = usb();
        // Memory never reports CFGOK
        let address = EndpointAddress::from_parts(2, UsbDirection::In);
        assert!(!usb.configure_endpoint(address, Kind::Bulk, 64, 2));
        assert_eq!(usb.current_endpoint(), 2);
        assert_eq!(regs.UECFG0X.read(), 0b1000_0001);
        assert_eq!(regs.UECFG1X.read(), 0b0011_0110);
        assert_eq!(regs.UECONX.read(), 1);

        regs.UESTA0X.write(0x80);
        assert!(usb.configure_endpoint(EndpointAddress::from(0), Kind::Control, 8, 1));
        assert_eq!(regs.UECFG0X.read(), 0);
        assert_eq!(regs.UECFG1X.read(), 0b0000_0010);
    }

    #[test]
    fn configure_endpoint_out_of_range() {
        let (mut usb, _) = usb();
        let address = EndpointAddress::from_parts(7, UsbDirection::Out);
        assert!(!usb.configure_endpoint(address, Kind::Interrupt, 8, 1));
    }

    #[test]
    fn pll_and_interrupt_free() {
        let (mut usb, _) = usb();
        usb.configure_pll(InputClock::Mhz8);
        usb.pll_on();
        assert!(!usb.is_pll_locked());
        usb.pll_off();

        let selected = usb.interrupt_free(|usb| {
            usb.select_endpoint(2);
            usb.current_endpoint()
        });
        assert_eq!(selected, 2);
        assert_eq!(usb.signature_byte(0x0E), Some(0x0E));
    }
}
