//! Simulated controller, endpoints and host for unit tests
//!
//! The host side is minimal: after a SETUP packet, it drains IN packets and
//! moves to the status stage once it receives a short packet, or all the
//! bytes it asked for.

use crate::{
    application::Application,
    config::{InputClock, Speed},
    controller::{Controller, Interrupts},
    endpoint::{Endpoints, Kind},
    request::ControlRequest,
};
use core::cell::Cell;
use std::{collections::VecDeque, vec::Vec};
use usb_device::{descriptor::descriptor_type, endpoint::EndpointAddress, UsbDirection};

pub const ENDPOINT_COUNT: usize = 7;

#[derive(Default, Debug)]
pub struct Endpoint {
    pub configuration: Option<(Kind, u16, u8)>,
    pub enabled: bool,
    pub stalled: bool,
    pub setup: bool,
    pub in_ready: bool,
    pub out_received: bool,
    pub resets: usize,
    pub toggle_resets: usize,
    pub fifo: VecDeque<u8>,
    pub bank: Vec<u8>,
    /// IN packets sent to the host, since the last SETUP
    pub packets: Vec<Vec<u8>>,
}

pub struct Hardware {
    pub endpoints: [Endpoint; ENDPOINT_COUNT],
    pub selected: u8,
    pub regulator: bool,
    pub otg_pad: bool,
    pub pll_input: Option<InputClock>,
    pub pll_enabled: bool,
    /// When `false`, the PLL never locks
    pub pll_locks: bool,
    pub clock_frozen: bool,
    pub controller_enabled: bool,
    pub controller_resets: usize,
    pub attached: bool,
    pub speed: Option<Speed>,
    pub vbus: bool,
    pub address: u8,
    pub address_enabled: bool,
    /// Every address write, with the global interrupt state at the time
    pub address_writes: Vec<(u8, bool)>,
    pub frame: Cell<u16>,
    /// When `true`, the frame number stops, as on an idle bus
    pub frame_frozen: bool,
    pub remote_wakeups: usize,
    pub pending: Interrupts,
    pub enabled: Interrupts,
    pub global_interrupts: bool,
    pub signature: Option<[u8; 10]>,
    /// When `true`, the host stops reading IN packets
    pub host_silent: bool,
    /// When `false`, endpoint configuration is rejected
    pub config_ok: bool,
    control_size: u16,
    host_direction: UsbDirection,
    host_length: u16,
    host_received: usize,
}

impl Hardware {
    pub fn new() -> Self {
        Hardware {
            endpoints: Default::default(),
            selected: 0,
            regulator: false,
            otg_pad: false,
            pll_input: None,
            pll_enabled: false,
            pll_locks: true,
            clock_frozen: true,
            controller_enabled: false,
            controller_resets: 0,
            attached: false,
            speed: None,
            vbus: true,
            address: 0,
            address_enabled: false,
            address_writes: Vec::new(),
            frame: Cell::new(0),
            frame_frozen: false,
            remote_wakeups: 0,
            pending: Interrupts::empty(),
            enabled: Interrupts::empty(),
            global_interrupts: true,
            signature: None,
            host_silent: false,
            config_ok: true,
            control_size: 8,
            host_direction: UsbDirection::Out,
            host_length: 0,
            host_received: 0,
        }
    }

    /// A controller with endpoint 0 configured, and `others` enabled
    pub fn with_endpoints(others: &[u8]) -> Self {
        let mut hw = Self::new();
        hw.configure_endpoint(EndpointAddress::from(0), Kind::Control, 8, 1);
        for &number in others {
            hw.configure_endpoint(
                EndpointAddress::from_parts(number as usize, UsbDirection::In),
                Kind::Bulk,
                64,
                1,
            );
        }
        hw.select_endpoint(0);
        hw
    }

    /// The host sends a SETUP packet to endpoint 0
    pub fn setup(&mut self, request: ControlRequest) {
        self.host_direction = request.direction();
        self.host_length = request.length;
        self.host_received = 0;
        let ep0 = &mut self.endpoints[0];
        ep0.fifo = request.to_bytes().into_iter().collect();
        ep0.bank.clear();
        ep0.packets.clear();
        ep0.setup = true;
        ep0.in_ready = true;
        ep0.out_received = false;
    }

    pub fn ep0(&self) -> &Endpoint {
        &self.endpoints[0]
    }

    /// Bytes sent on endpoint 0 since the last SETUP
    pub fn sent(&self) -> Vec<u8> {
        self.ep0().packets.concat()
    }

    fn ep(&self) -> &Endpoint {
        &self.endpoints[self.selected as usize]
    }

    fn ep_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoints[self.selected as usize]
    }
}

impl Endpoints for Hardware {
    fn endpoint_count(&self) -> u8 {
        ENDPOINT_COUNT as u8
    }
    fn current_endpoint(&self) -> u8 {
        self.selected
    }
    fn select_endpoint(&mut self, number: u8) {
        self.selected = number;
    }
    fn configure_endpoint(
        &mut self,
        address: EndpointAddress,
        kind: Kind,
        size: u16,
        banks: u8,
    ) -> bool {
        let number = address.index();
        self.selected = number as u8;
        if number == 0 {
            self.control_size = size;
        }
        let ep = self.ep_mut();
        ep.configuration = Some((kind, size, banks));
        ep.enabled = true;
        ep.in_ready = true;
        self.config_ok
    }
    fn is_enabled(&self) -> bool {
        self.ep().enabled
    }
    fn read_u8(&mut self) -> u8 {
        self.ep_mut().fifo.pop_front().unwrap_or(0)
    }
    fn write_u8(&mut self, byte: u8) {
        self.ep_mut().bank.push(byte);
    }
    fn bytes_in_endpoint(&self) -> u16 {
        self.ep().bank.len() as u16
    }
    fn is_setup_received(&self) -> bool {
        self.ep().setup
    }
    fn is_in_ready(&self) -> bool {
        self.ep().in_ready
    }
    fn is_out_received(&self) -> bool {
        self.ep().out_received
    }
    fn is_stalled(&self) -> bool {
        self.ep().stalled
    }
    fn clear_setup(&mut self) {
        let ep = self.ep_mut();
        ep.setup = false;
        ep.fifo.clear();
    }
    fn clear_in(&mut self) {
        let selected = self.selected;
        let silent = self.host_silent;
        let ep = self.ep_mut();
        let packet = core::mem::take(&mut ep.bank);
        let len = packet.len();
        ep.packets.push(packet);
        if silent {
            ep.in_ready = false;
            return;
        }
        if selected == 0 && self.host_direction == UsbDirection::In {
            self.host_received += len;
            if len < usize::from(self.control_size) || self.host_received >= usize::from(self.host_length)
            {
                self.endpoints[0].out_received = true;
            }
        }
    }
    fn clear_out(&mut self) {
        self.ep_mut().out_received = false;
    }
    fn stall(&mut self) {
        self.ep_mut().stalled = true;
    }
    fn clear_stall(&mut self) {
        self.ep_mut().stalled = false;
    }
    fn reset_endpoint(&mut self, number: u8) {
        let ep = &mut self.endpoints[number as usize];
        ep.resets += 1;
        ep.fifo.clear();
        ep.bank.clear();
    }
    fn reset_data_toggle(&mut self) {
        self.ep_mut().toggle_resets += 1;
    }
}

impl Controller for Hardware {
    fn set_regulator(&mut self, enabled: bool) {
        self.regulator = enabled;
    }
    fn set_otg_pad(&mut self, enabled: bool) {
        self.otg_pad = enabled;
    }
    fn configure_pll(&mut self, input: InputClock) {
        self.pll_input = Some(input);
    }
    fn pll_on(&mut self) {
        self.pll_enabled = true;
    }
    fn pll_off(&mut self) {
        self.pll_enabled = false;
    }
    fn is_pll_locked(&self) -> bool {
        self.pll_enabled && self.pll_locks
    }
    fn set_clock_frozen(&mut self, frozen: bool) {
        self.clock_frozen = frozen;
    }
    fn set_controller_enabled(&mut self, enabled: bool) {
        self.controller_enabled = enabled;
    }
    fn reset_controller(&mut self) {
        self.controller_resets += 1;
        self.controller_enabled = true;
        self.address = 0;
        self.address_enabled = false;
    }
    fn attach(&mut self) {
        self.attached = true;
    }
    fn detach(&mut self) {
        self.attached = false;
    }
    fn set_speed(&mut self, speed: Speed) {
        self.speed = Some(speed);
    }
    fn is_vbus_present(&self) -> bool {
        self.vbus
    }
    fn set_device_address(&mut self, address: u8) {
        self.address_writes.push((address, self.global_interrupts));
        self.address = address;
        self.address_enabled = address != 0;
    }
    fn is_address_set(&self) -> bool {
        self.address_enabled
    }
    fn frame_number(&self) -> u16 {
        let frame = self.frame.get();
        if !self.frame_frozen {
            self.frame.set((frame + 1) & 0x7FF);
        }
        frame
    }
    fn start_remote_wakeup(&mut self) {
        self.remote_wakeups += 1;
    }
    fn is_remote_wakeup_pending(&self) -> bool {
        false
    }
    fn pending_interrupts(&self) -> Interrupts {
        let mut pending = self.pending;
        pending.set(Interrupts::SETUP, self.endpoints[0].setup);
        pending
    }
    fn enabled_interrupts(&self) -> Interrupts {
        self.enabled
    }
    fn enable_interrupts(&mut self, interrupts: Interrupts) {
        self.enabled.insert(interrupts);
    }
    fn disable_interrupts(&mut self, interrupts: Interrupts) {
        self.enabled.remove(interrupts);
    }
    fn clear_interrupts(&mut self, interrupts: Interrupts) {
        self.pending.remove(interrupts);
        if interrupts.contains(Interrupts::SETUP) {
            self.endpoints[0].setup = false;
        }
    }
    fn interrupt_free<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let enabled = self.global_interrupts;
        self.global_interrupts = false;
        let result = f(self);
        self.global_interrupts = enabled;
        result
    }
    fn signature_byte(&self, address: u8) -> Option<u8> {
        let offset = address.checked_sub(0x0E)?;
        self.signature?.get(usize::from(offset)).copied()
    }
}

/// Application notifications, as recorded by [`App`]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    Connect,
    Disconnect,
    ConfigurationChanged(u8),
    Suspend,
    WakeUp,
    Reset,
    StartOfFrame,
}

pub const DEVICE_DESCRIPTOR: [u8; 18] = [
    18, 1, 0x00, 0x02, 0xEF, 0x02, 0x01, 16, 0xEB, 0x03, 0x4F, 0x20, 0x01, 0x00, 1, 2, 3, 1,
];

pub const CONFIGURATION_DESCRIPTOR: [u8; 9] = [9, 2, 9, 0, 0, 1, 0, 0x80, 50];

pub const LANGUAGES: [u8; 4] = [4, 3, 0x09, 0x04];

/// Test application with fixed descriptors
pub struct App {
    pub events: Vec<Event>,
    pub requests: Vec<ControlRequest>,
    /// When `true`, descriptor lookups miss
    pub no_descriptors: bool,
    /// When `true`, the control hook handles vendor requests
    pub handle_vendor: bool,
}

impl App {
    pub fn new() -> Self {
        App {
            events: Vec::new(),
            requests: Vec::new(),
            no_descriptors: false,
            handle_vendor: false,
        }
    }
}

impl Application for App {
    fn descriptor(&self, value: u16, index: u16) -> Option<&[u8]> {
        if self.no_descriptors {
            return None;
        }
        let [descriptor_index, descriptor] = value.to_le_bytes();
        match (descriptor, descriptor_index) {
            (descriptor_type::DEVICE, 0) => Some(&DEVICE_DESCRIPTOR),
            (descriptor_type::CONFIGURATION, 0) => Some(&CONFIGURATION_DESCRIPTOR),
            (descriptor_type::STRING, 0) if index == 0 => Some(&LANGUAGES),
            _ => None,
        }
    }

    fn control_request<E: Endpoints>(&mut self, request: &ControlRequest, endpoints: &mut E) {
        self.requests.push(*request);
        if self.handle_vendor && request.kind() == usb_device::control::RequestType::Vendor {
            endpoints.clear_setup();
            endpoints.clear_in();
        }
    }

    fn connect(&mut self) {
        self.events.push(Event::Connect);
    }
    fn disconnect(&mut self) {
        self.events.push(Event::Disconnect);
    }
    fn configuration_changed(&mut self, configuration: u8) {
        self.events.push(Event::ConfigurationChanged(configuration));
    }
    fn suspend(&mut self) {
        self.events.push(Event::Suspend);
    }
    fn wake_up(&mut self) {
        self.events.push(Event::WakeUp);
    }
    fn reset(&mut self) {
        self.events.push(Event::Reset);
    }
    fn start_of_frame(&mut self) {
        self.events.push(Event::StartOfFrame);
    }
}
