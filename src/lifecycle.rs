//! Controller lifecycle
//!
//! Power up, reset, tear down, and the periodic task. These functions take
//! the same three parts as the event router: the device context, the
//! hardware and the application.

use crate::{
    application::Application,
    config::Options,
    control,
    controller::{wait_for_pll_lock, Controller, Interrupts},
    descriptor::MAX_PACKET_SIZE_0,
    endpoint::{Endpoints, Kind, CONTROL_ENDPOINT},
    error::Error,
    state::{DeviceContext, DeviceState},
};
use usb_device::{descriptor::descriptor_type, endpoint::EndpointAddress};

/// Power up the controller, then [`reset`] it
pub fn init<H, A>(context: &mut DeviceContext, hardware: &mut H, application: &mut A) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let config = context.config;
    debug!("INIT {:?}", config.speed);

    hardware.set_otg_pad(false);
    hardware.set_regulator(!config.options.contains(Options::REGULATOR_DISABLED));
    if config.automatic_pll() {
        hardware.configure_pll(config.input_clock);
    }

    context.initialized = true;
    reset(context, hardware, application)
}

/// Reset the controller, and return to the unattached state
///
/// The device is attached to the bus when this returns.
pub fn reset<H, A>(context: &mut DeviceContext, hardware: &mut H, application: &mut A) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    hardware.disable_interrupts(Interrupts::all());
    hardware.clear_interrupts(Interrupts::all());

    hardware.reset_controller();
    hardware.set_clock_frozen(false);

    if context.config.automatic_pll() {
        hardware.pll_on();
        wait_for_pll_lock(hardware, context.config.spin_limit)?;
    }

    init_device(context, hardware, application)?;
    hardware.set_otg_pad(true);
    Ok(())
}

/// Device-mode initialization
fn init_device<H, A>(context: &mut DeviceContext, hardware: &mut H, application: &A) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    context.reset();

    let device = u16::from(descriptor_type::DEVICE) << 8;
    match application.descriptor(device, 0).and_then(|d| d.get(MAX_PACKET_SIZE_0)) {
        Some(&size) => context.control_endpoint_size = size,
        None => {
            warn!(
                "No device descriptor; control endpoint size stays {=u8}",
                context.control_endpoint_size
            );
        }
    }

    hardware.set_speed(context.config.speed);
    hardware.enable_interrupts(Interrupts::VBUS);

    configure_control_endpoint(context, hardware)?;

    hardware.clear_interrupts(Interrupts::SUSPEND);
    hardware.enable_interrupts(Interrupts::SUSPEND | Interrupts::END_OF_RESET);
    hardware.attach();
    Ok(())
}

/// Configure endpoint 0 with the control endpoint size
pub(crate) fn configure_control_endpoint<H>(context: &DeviceContext, hardware: &mut H) -> Result<(), Error>
where
    H: Endpoints,
{
    let address = EndpointAddress::from(CONTROL_ENDPOINT);
    let size = u16::from(context.control_endpoint_size);
    if hardware.configure_endpoint(address, Kind::Control, size, 1) {
        Ok(())
    } else {
        warn!("Control endpoint configuration rejected");
        Err(Error::EndpointConfiguration)
    }
}

/// Detach from the bus, and turn the controller off
pub fn disable<H>(context: &mut DeviceContext, hardware: &mut H)
where
    H: Controller,
{
    hardware.disable_interrupts(Interrupts::all());
    hardware.clear_interrupts(Interrupts::all());

    hardware.detach();
    hardware.set_controller_enabled(false);

    if context.config.automatic_pll() {
        hardware.pll_off();
    }
    hardware.set_regulator(false);
    hardware.set_otg_pad(false);

    context.state = DeviceState::Unattached;
    context.initialized = false;
}

/// Periodic task
///
/// Services a SETUP packet on the control endpoint, unless the device is
/// unattached. Call this from the main loop when SETUP packets aren't
/// handled from the control endpoint interrupt.
pub fn task<H, A>(context: &mut DeviceContext, hardware: &mut H, application: &mut A) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    if context.state == DeviceState::Unattached {
        return Ok(());
    }

    let previous = hardware.current_endpoint();
    hardware.select_endpoint(CONTROL_ENDPOINT);
    let result = if hardware.is_setup_received() {
        control::process_control_request(context, hardware, application)
    } else {
        Ok(())
    };
    hardware.select_endpoint(previous);
    result
}

/// Signal resume to a suspended host
///
/// The host must have enabled remote wakeup with SET_FEATURE.
pub fn send_remote_wakeup<H>(context: &mut DeviceContext, hardware: &mut H) -> Result<(), Error>
where
    H: Controller,
{
    if !context.remote_wakeup_enabled {
        return Err(Error::RemoteWakeupDisabled);
    }

    if context.config.automatic_pll() {
        hardware.pll_on();
        wait_for_pll_lock(hardware, context.config.spin_limit)?;
    }
    hardware.set_clock_frozen(false);

    hardware.start_remote_wakeup();
    for _ in 0..context.config.spin_limit.max(1) {
        if !hardware.is_remote_wakeup_pending() {
            return Ok(());
        }
    }
    Err(Error::Timeout)
}

/// Turn the start of frame notification on or off
pub fn set_start_of_frame_events<H: Controller>(hardware: &mut H, enabled: bool) {
    if enabled {
        hardware.enable_interrupts(Interrupts::START_OF_FRAME);
    } else {
        hardware.disable_interrupts(Interrupts::START_OF_FRAME);
    }
}
