//! Standard control request dispatcher
//!
//! [`process_control_request`] reads the SETUP packet from the control
//! endpoint, gives the application the first chance to handle it, and then
//! answers the chapter 9 standard requests. Requests that nobody claims
//! are stalled.

use crate::{
    application::Application,
    controller::{interrupt_free, Controller},
    descriptor,
    endpoint::{Endpoints, CONTROL_ENDPOINT},
    error::Error,
    request::{request_type, ControlRequest},
    state::{DeviceContext, DeviceState},
    stream,
};
use usb_device::{
    control::{Recipient, Request, RequestType},
    descriptor::descriptor_type,
    UsbDirection,
};

const IN_DEVICE: u8 = request_type(UsbDirection::In, RequestType::Standard, Recipient::Device);
const IN_INTERFACE: u8 = request_type(UsbDirection::In, RequestType::Standard, Recipient::Interface);
const IN_ENDPOINT: u8 = request_type(UsbDirection::In, RequestType::Standard, Recipient::Endpoint);
const OUT_DEVICE: u8 = request_type(UsbDirection::Out, RequestType::Standard, Recipient::Device);
const OUT_ENDPOINT: u8 = request_type(UsbDirection::Out, RequestType::Standard, Recipient::Endpoint);

/// Address bits of SET_ADDRESS
const ADDRESS_MASK: u16 = 0x7F;

/// Handle the SETUP packet waiting on the control endpoint
///
/// The control endpoint must be selected. If no handler completes the
/// request, the control endpoint is stalled and the SETUP packet is
/// cleared.
pub fn process_control_request<H, A>(
    context: &mut DeviceContext,
    hardware: &mut H,
    application: &mut A,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let request = ControlRequest::read(hardware);
    debug!(
        "SETUP {=u8:#x} {=u8} {=u16:#x} {=u16:#x} {=u16}",
        request.request_type,
        request.request,
        request.value,
        request.index,
        request.length
    );

    application.control_request(&request, hardware);

    let result = if hardware.is_setup_received() {
        dispatch(context, hardware, application, &request)
    } else {
        Ok(())
    };

    if hardware.is_setup_received() {
        debug!("STALL {=u8}", request.request);
        hardware.stall();
        hardware.clear_setup();
    }

    result
}

fn dispatch<H, A>(
    context: &mut DeviceContext,
    hardware: &mut H,
    application: &mut A,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let request_type = request.request_type;
    match request.request {
        Request::GET_STATUS if matches!(request_type, IN_DEVICE | IN_ENDPOINT) => {
            get_status(context, hardware, request)
        }
        Request::CLEAR_FEATURE | Request::SET_FEATURE
            if matches!(request_type, OUT_DEVICE | OUT_ENDPOINT) =>
        {
            clear_set_feature(context, hardware, request)
        }
        Request::SET_ADDRESS if request_type == OUT_DEVICE => {
            set_address(context, hardware, request)
        }
        Request::GET_DESCRIPTOR if matches!(request_type, IN_DEVICE | IN_INTERFACE) => {
            get_descriptor(context, hardware, application, request)
        }
        Request::GET_CONFIGURATION if request_type == IN_DEVICE => {
            get_configuration(context, hardware, request)
        }
        Request::SET_CONFIGURATION if request_type == OUT_DEVICE => {
            set_configuration(context, hardware, application, request)
        }
        _ => Ok(()),
    }
}

fn get_status<H>(
    context: &DeviceContext,
    hardware: &mut H,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let status = match request.recipient() {
        Recipient::Device => u16::from(context.status().bits()),
        Recipient::Endpoint => {
            let number = request.endpoint_number();
            if number >= hardware.endpoint_count() {
                return Ok(());
            }
            hardware.select_endpoint(number);
            let halted = hardware.is_stalled();
            hardware.select_endpoint(CONTROL_ENDPOINT);
            u16::from(halted)
        }
        _ => return Ok(()),
    };

    hardware.clear_setup();
    hardware.write_u16_le(status);
    hardware.clear_in();
    stream::clear_status_stage(hardware, request, &context.config)
}

fn clear_set_feature<H>(
    context: &mut DeviceContext,
    hardware: &mut H,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let set = request.request == Request::SET_FEATURE;
    match request.recipient() {
        Recipient::Device => {
            if request.value != Request::FEATURE_DEVICE_REMOTE_WAKEUP {
                return Ok(());
            }
            context.remote_wakeup_enabled = set;
        }
        Recipient::Endpoint => {
            let number = request.endpoint_number();
            if request.value != Request::FEATURE_ENDPOINT_HALT
                || number == CONTROL_ENDPOINT
                || number >= hardware.endpoint_count()
            {
                return Ok(());
            }
            hardware.select_endpoint(number);
            let enabled = hardware.is_enabled();
            if enabled && set {
                hardware.stall();
            } else if enabled {
                hardware.clear_stall();
                hardware.reset_endpoint(number);
                hardware.reset_data_toggle();
            }
            hardware.select_endpoint(CONTROL_ENDPOINT);
            if !enabled {
                return Ok(());
            }
        }
        _ => return Ok(()),
    }

    hardware.clear_setup();
    stream::clear_status_stage(hardware, request, &context.config)
}

fn set_address<H>(
    context: &mut DeviceContext,
    hardware: &mut H,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let address = (request.value & ADDRESS_MASK) as u8;
    let config = context.config;

    interrupt_free(hardware, |hardware| -> Result<(), Error> {
        hardware.clear_setup();
        stream::clear_status_stage(hardware, request, &config)?;
        stream::wait_for_in_ready(hardware, &config)?;
        hardware.set_device_address(address);
        context.state = if address != 0 {
            DeviceState::Addressed
        } else {
            DeviceState::Default
        };
        Ok(())
    })?;

    debug!("ADDRESS {=u8}", address);
    Ok(())
}

fn get_descriptor<H, A>(
    context: &DeviceContext,
    hardware: &mut H,
    application: &A,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let (kind, index) = request.descriptor_type_index();
    let packet_size = context.control_endpoint_size;
    let config = &context.config;

    if kind == descriptor_type::STRING && Some(index) == context.config.internal_serial {
        if let Some(serial) = descriptor::internal_serial(hardware) {
            hardware.clear_setup();
            stream::write_control_stream(hardware, &serial, request.length, packet_size, config)?;
            hardware.clear_out();
            return Ok(());
        }
    }

    let Some(data) = application.descriptor(request.value, request.index) else {
        debug!("No descriptor {=u8} {=u8}", kind, index);
        return Ok(());
    };

    hardware.clear_setup();
    stream::write_control_stream(hardware, data, request.length, packet_size, config)?;
    hardware.clear_out();
    Ok(())
}

fn get_configuration<H>(
    context: &DeviceContext,
    hardware: &mut H,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    hardware.clear_setup();
    hardware.write_u8(context.configuration);
    hardware.clear_in();
    stream::clear_status_stage(hardware, request, &context.config)
}

fn set_configuration<H, A>(
    context: &mut DeviceContext,
    hardware: &mut H,
    application: &mut A,
    request: &ControlRequest,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
    A: Application,
{
    let configuration = request.value as u8;
    if configuration > context.config.max_configurations {
        debug!("Configuration {=u8} out of range", configuration);
        return Ok(());
    }

    hardware.clear_setup();
    context.configuration = configuration;
    let status = stream::clear_status_stage(hardware, request, &context.config);

    let address_set = hardware.is_address_set();
    if configuration != 0 && !address_set {
        warn!("Configured without an address");
    }
    context.state = context.derived_state(address_set);
    application.configuration_changed(configuration);
    status
}
