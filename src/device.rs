//! A USB device
//!
//! [`Device`] owns the hardware, the application and the device context,
//! and forwards to the lifecycle, router and dispatcher. Share it between
//! the USB interrupt handlers and the main loop the way your runtime
//! shares other interrupt state.

use crate::{
    application::Application,
    config::Config,
    controller::Controller,
    endpoint::Endpoints,
    error::Error,
    interrupt, lifecycle,
    state::{DeviceContext, DeviceState},
};

/// A USB device
///
/// ```no_run
/// use avr_usbd::{Application, Config, Device, Usb, Peripherals};
///
/// # struct Registers;
/// # unsafe impl Peripherals for Registers {
/// #     fn usb(&self) -> *const () { 0xD7 as _ }
/// #     fn pll(&self) -> *const () { 0x49 as _ }
/// # }
/// static DEVICE_DESCRIPTOR: [u8; 18] = [
///     18, 1, 0x00, 0x02, 0, 0, 0, 64, 0xEB, 0x03, 0x4F, 0x20, 0x01, 0x00, 0, 0, 0, 1,
/// ];
///
/// struct Descriptors;
///
/// impl Application for Descriptors {
///     fn descriptor(&self, value: u16, _: u16) -> Option<&[u8]> {
///         match value {
///             0x0100 => Some(&DEVICE_DESCRIPTOR),
///             _ => None,
///         }
///     }
/// }
///
/// let mut device = Device::new(Usb::new(Registers), Descriptors, Config::default());
/// device.init().unwrap();
/// loop {
///     // Normally from the USB_GEN interrupt
///     device.on_general_interrupt().unwrap();
///     device.task().unwrap();
/// }
/// ```
pub struct Device<H, A> {
    hardware: H,
    application: A,
    context: DeviceContext,
}

impl<H, A> Device<H, A>
where
    H: Controller + Endpoints,
    A: Application,
{
    /// Create a device
    ///
    /// Nothing happens until [`init`](Device::init).
    pub fn new(hardware: H, application: A, config: Config) -> Self {
        Device {
            hardware,
            application,
            context: DeviceContext::new(config),
        }
    }

    /// Power up the controller and attach to the bus
    pub fn init(&mut self) -> Result<(), Error> {
        lifecycle::init(&mut self.context, &mut self.hardware, &mut self.application)
    }

    /// Reset the controller, and re-attach to the bus
    pub fn reset(&mut self) -> Result<(), Error> {
        lifecycle::reset(&mut self.context, &mut self.hardware, &mut self.application)
    }

    /// Detach from the bus, and turn the controller off
    pub fn disable(&mut self) {
        lifecycle::disable(&mut self.context, &mut self.hardware)
    }

    /// Service a SETUP packet from the main loop
    ///
    /// Does nothing when [`Config::interrupt_control_endpoint`] is set,
    /// since the control endpoint interrupt handles SETUP packets.
    pub fn task(&mut self) -> Result<(), Error> {
        if self.context.config.interrupt_control_endpoint {
            return Ok(());
        }
        lifecycle::task(&mut self.context, &mut self.hardware, &mut self.application)
    }

    /// Call from the general USB interrupt
    pub fn on_general_interrupt(&mut self) -> Result<(), Error> {
        interrupt::on_general_interrupt(&mut self.context, &mut self.hardware, &mut self.application)
    }

    /// Call from the USB endpoint interrupt
    pub fn on_control_interrupt(&mut self) -> Result<(), Error> {
        interrupt::on_control_interrupt(&mut self.context, &mut self.hardware, &mut self.application)
    }

    /// Wake a suspended host
    pub fn send_remote_wakeup(&mut self) -> Result<(), Error> {
        lifecycle::send_remote_wakeup(&mut self.context, &mut self.hardware)
    }

    /// Enable or disable the start of frame notification
    pub fn set_start_of_frame_events(&mut self, enabled: bool) {
        lifecycle::set_start_of_frame_events(&mut self.hardware, enabled)
    }

    pub fn frame_number(&self) -> u16 {
        self.hardware.frame_number()
    }

    pub fn state(&self) -> DeviceState {
        self.context.state()
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DeviceContext {
        &mut self.context
    }

    pub fn application(&self) -> &A {
        &self.application
    }

    pub fn application_mut(&mut self) -> &mut A {
        &mut self.application
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Release the hardware and the application
    pub fn release(self) -> (H, A) {
        (self.hardware, self.application)
    }
}
