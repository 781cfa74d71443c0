//! Device state
//!
//! [`DeviceContext`] holds everything the engine knows about the device:
//! the enumeration state, the configuration, the feature flags and the
//! configuration the engine was started with. The router and dispatcher
//! take it by exclusive reference.

use crate::config::Config;
use bitflags::bitflags;
use usb_device::device::UsbDeviceState;

/// USB device enumeration state
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum DeviceState {
    /// Not connected to a host
    #[default]
    Unattached,
    /// VBUS present, but not yet reset by the host
    Powered,
    /// Reset by the host, answering at address 0
    Default,
    /// The host assigned an address
    Addressed,
    /// The host selected a configuration
    Configured,
    /// The bus went idle
    Suspended,
}

impl From<DeviceState> for UsbDeviceState {
    fn from(state: DeviceState) -> Self {
        match state {
            DeviceState::Unattached | DeviceState::Powered | DeviceState::Default => {
                UsbDeviceState::Default
            }
            DeviceState::Addressed => UsbDeviceState::Addressed,
            DeviceState::Configured => UsbDeviceState::Configured,
            DeviceState::Suspended => UsbDeviceState::Suspend,
        }
    }
}

bitflags! {
    /// Device GET_STATUS reply
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus : u8 {
        const SELF_POWERED = 1 << 0;
        const REMOTE_WAKEUP = 1 << 1;
    }
}

/// The engine's view of the device
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) state: DeviceState,
    pub(crate) configuration: u8,
    pub(crate) remote_wakeup_enabled: bool,
    pub(crate) self_powered: bool,
    pub(crate) control_endpoint_size: u8,
    pub(crate) initialized: bool,
    pub(crate) config: Config,
}

impl DeviceContext {
    pub fn new(config: Config) -> Self {
        DeviceContext {
            state: DeviceState::Unattached,
            configuration: 0,
            remote_wakeup_enabled: false,
            self_powered: false,
            control_endpoint_size: config.control_endpoint_size,
            initialized: false,
            config,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The selected configuration, or 0 when unconfigured
    pub fn configuration(&self) -> u8 {
        self.configuration
    }

    pub fn remote_wakeup_enabled(&self) -> bool {
        self.remote_wakeup_enabled
    }

    pub fn self_powered(&self) -> bool {
        self.self_powered
    }

    /// Report whether the device currently runs from its own supply
    pub fn set_self_powered(&mut self, self_powered: bool) {
        self.self_powered = self_powered;
    }

    /// Packet size of the control endpoint
    pub fn control_endpoint_size(&self) -> u8 {
        self.control_endpoint_size
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> DeviceStatus {
        let mut status = DeviceStatus::empty();
        status.set(DeviceStatus::SELF_POWERED, self.self_powered);
        status.set(DeviceStatus::REMOTE_WAKEUP, self.remote_wakeup_enabled);
        status
    }

    /// The state implied by the configuration and the address register
    pub(crate) fn derived_state(&self, address_set: bool) -> DeviceState {
        if self.configuration != 0 {
            DeviceState::Configured
        } else if address_set {
            DeviceState::Addressed
        } else {
            DeviceState::Powered
        }
    }

    /// Forget everything learned from the host
    pub(crate) fn reset(&mut self) {
        self.state = DeviceState::Unattached;
        self.configuration = 0;
        self.remote_wakeup_enabled = false;
        self.self_powered = false;
    }
}
