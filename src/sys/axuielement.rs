//! Extensions to [`AXUIElement`] for the attributes tiling needs.

use std::ffi::c_void;

pub use accessibility::AXUIElement;
use accessibility::AXAttribute;
use accessibility_sys::{
    AXError, AXUIElementIsAttributeSettable, AXUIElementRef, AXUIElementSetMessagingTimeout,
    AXValueCreate, AXValueGetValue, AXValueRef, kAXErrorSuccess, kAXValueTypeCGPoint,
    kAXValueTypeCGSize,
};
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{Boolean, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;
use objc2_core_foundation::{CGPoint, CGSize};

use crate::model::{Point, Rect, Size, pid_t};
use crate::platform::AutomationError;

pub const ROLE: &str = "AXRole";
pub const SUBROLE: &str = "AXSubrole";
pub const TITLE: &str = "AXTitle";
pub const WINDOWS: &str = "AXWindows";
pub const POSITION: &str = "AXPosition";
pub const SIZE: &str = "AXSize";
pub const MINIMIZED: &str = "AXMinimized";

/// Seconds an application may take to answer before a request fails.
/// Hung applications otherwise stall a reflow for the system default of 6s.
const MESSAGING_TIMEOUT: f32 = 1.0;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn _AXUIElementGetWindow(element: AXUIElementRef, window_id: *mut u32) -> AXError;
}

impl From<accessibility::Error> for AutomationError {
    fn from(err: accessibility::Error) -> Self {
        match err {
            accessibility::Error::Ax(code) => AutomationError::Api(code),
            _ => AutomationError::NotFound,
        }
    }
}

pub fn check(err: AXError) -> Result<(), AutomationError> {
    if err == kAXErrorSuccess {
        Ok(())
    } else {
        Err(AutomationError::Api(err))
    }
}

/// The application element of `pid`, with a short messaging timeout.
pub fn application(pid: pid_t) -> AXUIElement {
    let element = AXUIElement::application(pid);
    unsafe { AXUIElementSetMessagingTimeout(element.as_concrete_TypeRef(), MESSAGING_TIMEOUT) };
    element
}

pub trait AXUIElementExt {
    /// The window server id backing a window element.
    fn window_server_id(&self) -> Result<u32, AutomationError>;
    fn string_value(&self, name: &'static str) -> Result<String, AutomationError>;
    fn bool_value(&self, name: &'static str) -> Result<bool, AutomationError>;
    fn set_bool_value(&self, name: &'static str, enabled: bool) -> Result<(), AutomationError>;
    fn window_elements(&self) -> Result<Vec<AXUIElement>, AutomationError>;
    fn current_frame(&self) -> Result<Rect, AutomationError>;
    fn move_to(&self, origin: Point) -> Result<(), AutomationError>;
    fn resize_to(&self, size: Size) -> Result<(), AutomationError>;
    fn can_set(&self, name: &'static str) -> bool;
}

impl AXUIElementExt for AXUIElement {
    fn window_server_id(&self) -> Result<u32, AutomationError> {
        let mut id = 0u32;
        check(unsafe { _AXUIElementGetWindow(self.as_concrete_TypeRef(), &mut id) })?;
        Ok(id)
    }

    fn string_value(&self, name: &'static str) -> Result<String, AutomationError> {
        copy(self, name)?
            .downcast_into::<CFString>()
            .map(|s| s.to_string())
            .ok_or(AutomationError::NotFound)
    }

    fn bool_value(&self, name: &'static str) -> Result<bool, AutomationError> {
        copy(self, name)?
            .downcast_into::<CFBoolean>()
            .map(bool::from)
            .ok_or(AutomationError::NotFound)
    }

    fn set_bool_value(&self, name: &'static str, enabled: bool) -> Result<(), AutomationError> {
        store(self, name, CFBoolean::from(enabled).as_CFType())
    }

    fn window_elements(&self) -> Result<Vec<AXUIElement>, AutomationError> {
        let value = copy(self, WINDOWS)?;
        if !value.instance_of::<CFArray>() {
            return Err(AutomationError::NotFound);
        }
        let array = unsafe {
            CFArray::<AXUIElement>::wrap_under_get_rule(value.as_CFTypeRef() as CFArrayRef)
        };
        Ok(array.iter().map(|element| (*element).clone()).collect())
    }

    fn current_frame(&self) -> Result<Rect, AutomationError> {
        let mut origin = CGPoint::default();
        read_value(self, POSITION, kAXValueTypeCGPoint, &mut origin as *mut CGPoint as *mut c_void)?;
        let mut size = CGSize::default();
        read_value(self, SIZE, kAXValueTypeCGSize, &mut size as *mut CGSize as *mut c_void)?;
        Ok(Rect {
            origin: Point::new(origin.x, origin.y),
            size: Size::new(size.width, size.height),
        })
    }

    fn move_to(&self, origin: Point) -> Result<(), AutomationError> {
        let point = CGPoint::new(origin.x, origin.y);
        write_value(self, POSITION, kAXValueTypeCGPoint, &point as *const CGPoint as *const c_void)
    }

    fn resize_to(&self, size: Size) -> Result<(), AutomationError> {
        let size = CGSize::new(size.width, size.height);
        write_value(self, SIZE, kAXValueTypeCGSize, &size as *const CGSize as *const c_void)
    }

    fn can_set(&self, name: &'static str) -> bool {
        let attribute = CFString::from_static_string(name);
        let mut settable: Boolean = 0;
        let err = unsafe {
            AXUIElementIsAttributeSettable(
                self.as_concrete_TypeRef(),
                attribute.as_concrete_TypeRef(),
                &mut settable,
            )
        };
        err == kAXErrorSuccess && settable != 0
    }
}

fn attribute(name: &'static str) -> AXAttribute<CFType> {
    AXAttribute::new(&CFString::from_static_string(name))
}

fn copy(element: &AXUIElement, name: &'static str) -> Result<CFType, AutomationError> {
    Ok(element.attribute(&attribute(name))?)
}

fn store(element: &AXUIElement, name: &'static str, value: CFType) -> Result<(), AutomationError> {
    Ok(element.set_attribute(&attribute(name), value)?)
}

fn read_value(
    element: &AXUIElement,
    name: &'static str,
    ty: u32,
    out: *mut c_void,
) -> Result<(), AutomationError> {
    let value = copy(element, name)?;
    let ok = unsafe { AXValueGetValue(value.as_CFTypeRef() as AXValueRef, ty, out) };
    if ok as u8 == 0 {
        return Err(AutomationError::NotFound);
    }
    Ok(())
}

fn write_value(
    element: &AXUIElement,
    name: &'static str,
    ty: u32,
    raw: *const c_void,
) -> Result<(), AutomationError> {
    let value = unsafe { AXValueCreate(ty, raw) };
    if value.is_null() {
        return Err(AutomationError::NotFound);
    }
    let value = unsafe { CFType::wrap_under_create_rule(value as CFTypeRef) };
    store(element, name, value)
}

#[cfg(test)]
mod tests {
    use accessibility_sys::kAXErrorCannotComplete;
    use test_log::test;

    use super::*;

    #[test]
    fn accessibility_errors_keep_their_code() {
        let err = AutomationError::from(accessibility::Error::Ax(kAXErrorCannotComplete));
        assert!(matches!(err, AutomationError::Api(code) if code == kAXErrorCannotComplete));
        assert!(check(kAXErrorSuccess).is_ok());
        assert!(matches!(check(kAXErrorCannotComplete), Err(AutomationError::Api(_))));
    }
}
