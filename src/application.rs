//! The application side of the engine

use crate::{endpoint::Endpoints, request::ControlRequest};

/// Descriptors, class requests and bus notifications
///
/// Notifications run in interrupt or task context. Keep them short, and
/// don't block.
pub trait Application {
    /// Look up a descriptor
    ///
    /// `value` packs the descriptor type in the high byte and the
    /// descriptor index in the low byte. `index` is the language ID for
    /// string descriptors, and zero otherwise. Return `None` if there's no
    /// such descriptor; the request will be stalled.
    fn descriptor(&self, value: u16, index: u16) -> Option<&[u8]>;

    /// Handle a control request before the standard requests
    ///
    /// The control endpoint is selected. To claim the request, clear the
    /// SETUP packet and complete the transfer; the engine then does
    /// nothing more. Otherwise, leave the endpoint untouched.
    fn control_request<E: Endpoints>(&mut self, request: &ControlRequest, endpoints: &mut E) {
        let _ = (request, endpoints);
    }

    /// VBUS appeared
    fn connect(&mut self) {}
    /// VBUS went away
    fn disconnect(&mut self) {}
    /// The host selected a configuration; 0 means unconfigured
    ///
    /// Configure the class endpoints here.
    fn configuration_changed(&mut self, configuration: u8) {
        let _ = configuration;
    }
    fn suspend(&mut self) {}
    fn wake_up(&mut self) {}
    /// The host reset the bus
    fn reset(&mut self) {}
    /// Start of frame, when enabled
    fn start_of_frame(&mut self) {}
}
