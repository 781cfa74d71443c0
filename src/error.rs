//! Engine errors
//!
//! A request the device won't service is answered with a stall, and is
//! never reported here. These errors describe hardware that didn't respond,
//! or a bus that changed underneath a control transfer.

use core::fmt;

/// Errors returned by the lifecycle, router and dispatcher entry points
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    /// The USB PLL didn't lock within the spin limit
    ClockLockTimeout,
    /// The host didn't complete a control stage within the stream timeout,
    /// or the controller didn't finish resume signalling
    Timeout,
    /// The host sent a new SETUP packet during a data stage
    HostAborted,
    /// VBUS was lost during a control transfer
    DeviceDisconnected,
    /// The bus was suspended during a control transfer
    BusSuspended,
    /// The controller rejected an endpoint configuration
    EndpointConfiguration,
    /// Remote wakeup was requested, but the host hasn't enabled it
    RemoteWakeupDisabled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::ClockLockTimeout => "USB PLL did not lock",
            Error::Timeout => "timed out waiting for the host",
            Error::HostAborted => "host aborted the control transfer",
            Error::DeviceDisconnected => "device disconnected from the bus",
            Error::BusSuspended => "bus suspended",
            Error::EndpointConfiguration => "endpoint configuration rejected",
            Error::RemoteWakeupDisabled => "remote wakeup not enabled by host",
        };
        f.write_str(msg)
    }
}
