//! Control endpoint data and status stages

use crate::{
    config::Config,
    controller::{is_triggered, Controller, Interrupts},
    endpoint::Endpoints,
    error::Error,
    request::ControlRequest,
};
use usb_device::UsbDirection;

/// Frame-counted timeout
///
/// The host sends a start of frame every millisecond, so a change of frame
/// number is a millisecond tick. Frames stop on an idle bus, so the number
/// of polls is capped by `Config::spin_limit` as well.
pub(crate) struct Timeout {
    frame: u16,
    remaining_ms: u16,
    remaining_polls: u32,
}

impl Timeout {
    pub fn start<C: Controller>(controller: &C, config: &Config) -> Self {
        Timeout {
            frame: controller.frame_number(),
            remaining_ms: config.stream_timeout_ms,
            remaining_polls: config.spin_limit.max(1),
        }
    }

    pub fn poll<C: Controller>(&mut self, controller: &C) -> Result<(), Error> {
        if self.remaining_polls == 0 {
            return Err(Error::Timeout);
        }
        self.remaining_polls -= 1;

        let frame = controller.frame_number();
        if frame != self.frame {
            self.frame = frame;
            if self.remaining_ms == 0 {
                return Err(Error::Timeout);
            }
            self.remaining_ms -= 1;
        }
        Ok(())
    }
}

/// Fails if the bus went away underneath a transfer
fn check_bus<C: Controller>(controller: &C) -> Result<(), Error> {
    if !controller.is_vbus_present() {
        Err(Error::DeviceDisconnected)
    } else if is_triggered(controller, Interrupts::SUSPEND) {
        Err(Error::BusSuspended)
    } else {
        Ok(())
    }
}

/// Wait until the selected endpoint's IN bank is free
pub(crate) fn wait_for_in_ready<H>(hardware: &H, config: &Config) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let mut timeout = Timeout::start(hardware, config);
    while !hardware.is_in_ready() {
        check_bus(hardware)?;
        timeout.poll(hardware)?;
    }
    Ok(())
}

fn wait_for_out_received<H>(hardware: &H, config: &Config) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let mut timeout = Timeout::start(hardware, config);
    while !hardware.is_out_received() {
        check_bus(hardware)?;
        if hardware.is_setup_received() {
            return Err(Error::HostAborted);
        }
        timeout.poll(hardware)?;
    }
    Ok(())
}

/// Complete the status stage of a control transfer
///
/// A device-to-host transfer ends with the host's zero-length OUT packet.
/// A host-to-device transfer ends with the device's zero-length IN packet.
pub fn clear_status_stage<H>(
    hardware: &mut H,
    request: &ControlRequest,
    config: &Config,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    if request.direction() == UsbDirection::In {
        wait_for_out_received(hardware, config)?;
        hardware.clear_out();
    } else {
        wait_for_in_ready(hardware, config)?;
        hardware.clear_in();
    }
    Ok(())
}

/// Send `data` in the data stage of a control read
///
/// At most `requested` bytes are sent, in packets of `packet_size`. A
/// zero-length packet terminates a transfer that ends on a full packet. If
/// the host starts the status stage early, the data stage ends there.
///
/// On success, the host's status stage OUT packet is pending. The caller
/// acknowledges it with [`clear_out`](Endpoints::clear_out). Waits give up
/// after `config.stream_timeout_ms` frames, or `config.spin_limit` polls.
pub fn write_control_stream<H>(
    hardware: &mut H,
    data: &[u8],
    requested: u16,
    packet_size: u8,
    config: &Config,
) -> Result<(), Error>
where
    H: Controller + Endpoints,
{
    let mut remaining = &data[..data.len().min(usize::from(requested))];
    if remaining.is_empty() {
        hardware.clear_in();
    }

    let packet_size = u16::from(packet_size);
    let mut last_packet_full = false;
    let mut timeout = Timeout::start(hardware, config);

    while !remaining.is_empty() || last_packet_full {
        check_bus(hardware)?;
        if hardware.is_setup_received() {
            return Err(Error::HostAborted);
        }
        if hardware.is_out_received() {
            break;
        }
        if hardware.is_in_ready() {
            let mut in_bank = hardware.bytes_in_endpoint();
            while in_bank < packet_size {
                let Some((&byte, rest)) = remaining.split_first() else {
                    break;
                };
                hardware.write_u8(byte);
                remaining = rest;
                in_bank += 1;
            }
            last_packet_full = in_bank == packet_size;
            trace!("CTRL IN {=u16} bytes", in_bank);
            hardware.clear_in();
            timeout = Timeout::start(hardware, config);
        } else {
            timeout.poll(hardware)?;
        }
    }

    wait_for_out_received(hardware, config)
}
