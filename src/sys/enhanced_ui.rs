//! `AXEnhancedUserInterface` is set by assistive apps and makes some
//! applications (Chromium, Electron) animate every frame write. It is turned
//! off around a batch of writes and restored afterwards, see
//! [`crate::actor::actuator`].

use super::axuielement::{self, AXUIElement, AXUIElementExt};
use crate::model::pid_t;
use crate::platform::AutomationError;

const ENHANCED_USER_INTERFACE: &str = "AXEnhancedUserInterface";

/// `None` when the element does not expose the attribute.
pub fn get_enhanced_user_interface(element: &AXUIElement) -> Option<bool> {
    element.bool_value(ENHANCED_USER_INTERFACE).ok()
}

pub fn set_enhanced_user_interface(
    element: &AXUIElement,
    enabled: bool,
) -> Result<(), AutomationError> {
    element.set_bool_value(ENHANCED_USER_INTERFACE, enabled)
}

pub fn get(pid: pid_t) -> Option<bool> {
    get_enhanced_user_interface(&axuielement::application(pid))
}

pub fn set(pid: pid_t, enabled: bool) -> Result<(), AutomationError> {
    set_enhanced_user_interface(&axuielement::application(pid), enabled)
}
