//! Event router
//!
//! [`on_general_interrupt`] services the controller's bus events, and
//! [`on_control_interrupt`] services SETUP packets when the control endpoint
//! is interrupt driven. Call them from the `USB_GEN` and `USB_COM`
//! interrupt handlers.

use crate::{
    application::Application,
    control,
    controller::{is_triggered, wait_for_pll_lock, Controller, Interrupts},
    endpoint::{Endpoints, CONTROL_ENDPOINT},
    error::Error,
    lifecycle,
    state::{DeviceContext, DeviceState},
};

/// Service pending bus events
///
/// Events are checked in a fixed order: start of frame, VBUS, suspend,
/// wake up, end of reset. Each event that's both pending and enabled is
/// cleared, applied to the device state, and passed to the application.
///
/// If the PLL doesn't lock for a VBUS or wake up event, that event stays
/// pending so the next call retries it. The remaining events are still
/// serviced, and the first error is returned.
pub fn on_general_interrupt<H, A>(
    context: &mut DeviceContext,
    hardware: &mut H,
    application: &mut A,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let automatic_pll = context.config.automatic_pll();
    let spin_limit = context.config.spin_limit;
    let mut result = Ok(());

    if is_triggered(hardware, Interrupts::START_OF_FRAME) {
        hardware.clear_interrupts(Interrupts::START_OF_FRAME);
        application.start_of_frame();
    }

    if is_triggered(hardware, Interrupts::VBUS) {
        if hardware.is_vbus_present() {
            debug!("VBUS on");
            let locked = if automatic_pll {
                hardware.pll_on();
                wait_for_pll_lock(hardware, spin_limit)
            } else {
                Ok(())
            };
            if locked.is_ok() {
                hardware.clear_interrupts(Interrupts::VBUS);
                context.state = DeviceState::Powered;
                application.connect();
            }
            result = result.and(locked);
        } else {
            debug!("VBUS off");
            hardware.clear_interrupts(Interrupts::VBUS);
            if automatic_pll {
                hardware.pll_off();
            }
            context.state = DeviceState::Unattached;
            application.disconnect();
        }
    }

    if is_triggered(hardware, Interrupts::SUSPEND) {
        debug!("SUSPEND");
        hardware.clear_interrupts(Interrupts::SUSPEND);
        hardware.disable_interrupts(Interrupts::SUSPEND);
        hardware.enable_interrupts(Interrupts::WAKE_UP);

        hardware.set_clock_frozen(true);
        if automatic_pll {
            hardware.pll_off();
        }

        if context.state != DeviceState::Unattached {
            context.state = DeviceState::Suspended;
        }
        application.suspend();
    }

    if is_triggered(hardware, Interrupts::WAKE_UP) {
        debug!("WAKE UP");
        let locked = if automatic_pll {
            hardware.pll_on();
            wait_for_pll_lock(hardware, spin_limit)
        } else {
            Ok(())
        };
        if locked.is_ok() {
            hardware.set_clock_frozen(false);

            hardware.clear_interrupts(Interrupts::WAKE_UP);
            hardware.disable_interrupts(Interrupts::WAKE_UP);
            hardware.enable_interrupts(Interrupts::SUSPEND);

            if context.state == DeviceState::Suspended {
                context.state = context.derived_state(hardware.is_address_set());
            }
            application.wake_up();
        }
        result = result.and(locked);
    }

    if is_triggered(hardware, Interrupts::END_OF_RESET) {
        debug!("RESET");
        hardware.clear_interrupts(Interrupts::END_OF_RESET);

        context.state = DeviceState::Default;
        context.configuration = 0;

        hardware.clear_interrupts(Interrupts::SUSPEND);
        hardware.disable_interrupts(Interrupts::SUSPEND);
        hardware.enable_interrupts(Interrupts::WAKE_UP);

        let configured = lifecycle::configure_control_endpoint(context, hardware);
        if context.config.interrupt_control_endpoint {
            hardware.enable_interrupts(Interrupts::SETUP);
        }

        application.reset();
        result = result.and(configured);
    }

    result
}

/// Service a SETUP packet from the control endpoint interrupt
///
/// The SETUP interrupt is masked while the request is processed, and the
/// previously selected endpoint is restored afterwards.
pub fn on_control_interrupt<H, A>(
    context: &mut DeviceContext,
    hardware: &mut H,
    application: &mut A,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let previous = hardware.current_endpoint();

    hardware.select_endpoint(CONTROL_ENDPOINT);
    hardware.disable_interrupts(Interrupts::SETUP);

    let result = control::process_control_request(context, hardware, application);

    hardware.select_endpoint(CONTROL_ENDPOINT);
    hardware.enable_interrupts(Interrupts::SETUP);
    hardware.select_endpoint(previous);

    result
}
