//! Listen-only mouse tap feeding the reactor.

use std::ffi::c_void;
use std::ptr::NonNull;

use objc2_core_foundation::{
    CFMachPort, CFRetained, CFRunLoop, CFRunLoopSource, kCFRunLoopDefaultMode,
};
use objc2_core_graphics as ocg;
use ocg::{
    CGEventMask, CGEventTapLocation as CGTapLoc, CGEventTapOptions as CGTapOpt,
    CGEventTapPlacement as CGTapPlace, CGEventType,
};
use tracing::{debug, warn};

use crate::actor::reactor;
use crate::model::Point;

const MOUSE_EVENTS: [CGEventType; 4] = [
    CGEventType::LeftMouseDown,
    CGEventType::LeftMouseUp,
    CGEventType::LeftMouseDragged,
    CGEventType::MouseMoved,
];

fn mask() -> CGEventMask {
    MOUSE_EVENTS.iter().fold(0u64, |m, ty| m | (1u64 << (ty.0 as u64)))
}

/// Event tap locations are already in the top-left origin space used by
/// the accessibility API.
pub fn translate(event_type: CGEventType, location: Point) -> Option<reactor::Event> {
    match event_type {
        CGEventType::LeftMouseDown => Some(reactor::Event::MouseDown(location)),
        CGEventType::LeftMouseUp => Some(reactor::Event::MouseUp(location)),
        CGEventType::LeftMouseDragged | CGEventType::MouseMoved => {
            Some(reactor::Event::MouseMoved(location))
        }
        _ => None,
    }
}

struct Context {
    events_tx: reactor::Sender,
}

/// Owns the tap and its run loop source. Created on, and dropped from, the
/// main thread.
pub struct MouseTap {
    port: CFRetained<CFMachPort>,
    source: CFRetained<CFRunLoopSource>,
    ctx: *mut Context,
}

impl MouseTap {
    /// Fails when the process lacks accessibility permission.
    pub fn install(events_tx: reactor::Sender) -> Option<Self> {
        let ctx = Box::into_raw(Box::new(Context { events_tx }));
        let port = unsafe {
            ocg::CGEvent::tap_create(
                CGTapLoc::SessionEventTap,
                CGTapPlace::HeadInsertEventTap,
                CGTapOpt::ListenOnly,
                mask(),
                Some(mouse_callback),
                ctx as *mut c_void,
            )
        };
        let Some(port) = port else {
            drop(unsafe { Box::from_raw(ctx) });
            return None;
        };
        let Some(source) = CFMachPort::new_run_loop_source(None, Some(&port), 0) else {
            drop(unsafe { Box::from_raw(ctx) });
            return None;
        };
        if let Some(rl) = CFRunLoop::current() {
            unsafe { rl.add_source(Some(&source), kCFRunLoopDefaultMode) };
        }
        unsafe { ocg::CGEvent::tap_enable(&port, true) };
        debug!("mouse tap installed");
        Some(Self { port, source, ctx })
    }

    /// The system disables taps whose callbacks are slow; turn it back on.
    pub fn ensure_enabled(&self) {
        if !unsafe { ocg::CGEvent::tap_is_enabled(&self.port) } {
            warn!("mouse tap was disabled by the system, re-enabling");
            unsafe { ocg::CGEvent::tap_enable(&self.port, true) };
        }
    }
}

impl Drop for MouseTap {
    fn drop(&mut self) {
        unsafe { ocg::CGEvent::tap_enable(&self.port, false) };
        if let Some(rl) = CFRunLoop::current() {
            unsafe { rl.remove_source(Some(&self.source), kCFRunLoopDefaultMode) };
        }
        drop(unsafe { Box::from_raw(self.ctx) });
    }
}

unsafe extern "C-unwind" fn mouse_callback(
    _proxy: ocg::CGEventTapProxy,
    event_type: CGEventType,
    event_ref: NonNull<ocg::CGEvent>,
    user_info: *mut c_void,
) -> *mut ocg::CGEvent {
    let ctx = unsafe { &*(user_info as *const Context) };
    let event = unsafe { event_ref.as_ref() };
    let location = unsafe { ocg::CGEvent::location(Some(event)) };
    if let Some(ev) = translate(event_type, Point::new(location.x, location.y)) {
        ctx.events_tx.send(ev);
    }
    event_ref.as_ptr()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn drags_and_moves_both_report_motion() {
        let at = Point::new(10.0, 20.0);
        assert_eq!(translate(CGEventType::LeftMouseDragged, at), Some(reactor::Event::MouseMoved(at)));
        assert_eq!(translate(CGEventType::MouseMoved, at), Some(reactor::Event::MouseMoved(at)));
        assert_eq!(translate(CGEventType::LeftMouseDown, at), Some(reactor::Event::MouseDown(at)));
        assert_eq!(translate(CGEventType::RightMouseDown, at), None);
    }
}
