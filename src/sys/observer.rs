//! Per-process `AXObserver` subscriptions delivered on the main run loop.

use std::ffi::c_void;
use std::ptr;

use accessibility_sys::{
    AXObserverAddNotification, AXObserverCreate, AXObserverGetRunLoopSource, AXObserverRef,
    AXUIElementRef, kAXErrorNotificationAlreadyRegistered,
};
use core_foundation::base::{CFRelease, TCFType};
use core_foundation::runloop::{CFRunLoop, CFRunLoopSource, kCFRunLoopDefaultMode};
use core_foundation::string::{CFString, CFStringRef};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::axuielement::{self as ax, AXUIElement, AXUIElementExt};
use crate::actor::lifecycle::{WindowEventKind, WindowEventSender};
use crate::model::pid_t;
use crate::platform::{ObserveError, ProcessObserver, Subscription};

const WINDOW_CREATED: &str = "AXWindowCreated";
const ELEMENT_DESTROYED: &str = "AXUIElementDestroyed";
const WINDOW_RESIZED: &str = "AXWindowResized";
const WINDOW_MINIATURIZED: &str = "AXWindowMiniaturized";
const WINDOW_DEMINIATURIZED: &str = "AXWindowDeminiaturized";

/// Registered on the application element; the others propagate from its
/// windows. Destruction has to be watched per window.
const APP_NOTIFICATIONS: [&str; 4] =
    [WINDOW_CREATED, WINDOW_RESIZED, WINDOW_MINIATURIZED, WINDOW_DEMINIATURIZED];

fn kind_for(notification: &str) -> Option<WindowEventKind> {
    match notification {
        WINDOW_CREATED => Some(WindowEventKind::Created),
        ELEMENT_DESTROYED => Some(WindowEventKind::Destroyed),
        WINDOW_RESIZED => Some(WindowEventKind::Resized),
        WINDOW_MINIATURIZED => Some(WindowEventKind::Minimized),
        WINDOW_DEMINIATURIZED => Some(WindowEventKind::Deminiaturized),
        _ => None,
    }
}

struct Context {
    pid: pid_t,
    observer: AXObserverRef,
    events: WindowEventSender,
}

/// Contexts of dropped subscriptions. A callback may still be running on
/// the main thread when a subscription is dropped elsewhere, so contexts
/// are only freed from the main loop via [`reap_released`].
static RELEASED: Mutex<Vec<SendPtr>> = Mutex::new(Vec::new());

struct SendPtr(*mut Context);

// SAFETY: the pointer is only dereferenced on the main thread.
unsafe impl Send for SendPtr {}

/// Frees contexts of dropped subscriptions. Must be called on the thread
/// running the main run loop, between run loop iterations.
pub fn reap_released() {
    let released = std::mem::take(&mut *RELEASED.lock());
    for SendPtr(ctx) in released {
        drop(unsafe { Box::from_raw(ctx) });
    }
}

unsafe extern "C" fn observer_callback(
    _observer: AXObserverRef,
    element: AXUIElementRef,
    notification: CFStringRef,
    refcon: *mut c_void,
) {
    let ctx = unsafe { &*(refcon as *const Context) };
    let notification = unsafe { CFString::wrap_under_get_rule(notification) }.to_string();
    let Some(kind) = kind_for(&notification) else {
        return;
    };
    trace!(pid = ctx.pid, ?kind, "accessibility notification");
    if kind == WindowEventKind::Created {
        let window = unsafe { AXUIElement::wrap_under_get_rule(element) };
        watch_destruction(ctx, &window);
    }
    ctx.events.send(ctx.pid, kind);
}

fn add_notification(ctx: &Context, element: &AXUIElement, name: &'static str) -> Result<(), i32> {
    let name = CFString::from_static_string(name);
    let err = unsafe {
        AXObserverAddNotification(
            ctx.observer,
            element.as_concrete_TypeRef(),
            name.as_concrete_TypeRef(),
            ctx as *const Context as *mut c_void,
        )
    };
    ax::check(err).or_else(|_| {
        if err == kAXErrorNotificationAlreadyRegistered { Ok(()) } else { Err(err) }
    })
}

fn watch_destruction(ctx: &Context, window: &AXUIElement) {
    if let Err(err) = add_notification(ctx, window, ELEMENT_DESTROYED) {
        trace!(pid = ctx.pid, err, "window destruction cannot be observed");
    }
}

/// [`ProcessObserver`] adding one `AXObserver` per process to the main run
/// loop.
#[derive(Debug, Default)]
pub struct AxProcessObserver;

impl AxProcessObserver {
    pub fn new() -> Self { Self }
}

pub struct AxSubscription {
    pid: pid_t,
    source: CFRunLoopSource,
    ctx: *mut Context,
}

// SAFETY: CFRunLoopSource and AXObserver are CF objects safe to release and
// remove from any thread; the context is only freed on the main thread.
unsafe impl Send for AxSubscription {}

impl Subscription for AxSubscription {}

impl Drop for AxSubscription {
    fn drop(&mut self) {
        CFRunLoop::get_main().remove_source(&self.source, unsafe { kCFRunLoopDefaultMode });
        let observer = unsafe { (*self.ctx).observer };
        unsafe { CFRelease(observer as *const c_void) };
        RELEASED.lock().push(SendPtr(self.ctx));
        debug!(pid = self.pid, "observer removed");
    }
}

impl ProcessObserver for AxProcessObserver {
    fn observe(
        &self,
        pid: pid_t,
        events: WindowEventSender,
    ) -> Result<Box<dyn Subscription>, ObserveError> {
        let unavailable = |what: String| ObserveError::Unavailable(pid, what);

        let mut observer: AXObserverRef = ptr::null_mut();
        ax::check(unsafe { AXObserverCreate(pid, observer_callback, &mut observer) })
            .map_err(|err| unavailable(err.to_string()))?;

        let ctx = Box::into_raw(Box::new(Context { pid, observer, events }));
        let subscribe = || -> Result<CFRunLoopSource, ObserveError> {
            let ctx = unsafe { &*ctx };
            let app = ax::application(pid);
            for name in APP_NOTIFICATIONS {
                add_notification(ctx, &app, name)
                    .map_err(|err| unavailable(format!("{name} returned {err}")))?;
            }
            match app.window_elements() {
                Ok(windows) => windows.iter().for_each(|w| watch_destruction(ctx, w)),
                Err(err) => warn!(pid, %err, "could not list windows to observe"),
            }
            let source = unsafe { AXObserverGetRunLoopSource(observer) };
            if source.is_null() {
                return Err(unavailable("no run loop source".into()));
            }
            Ok(unsafe { CFRunLoopSource::wrap_under_get_rule(source) })
        };

        match subscribe() {
            Ok(source) => {
                CFRunLoop::get_main().add_source(&source, unsafe { kCFRunLoopDefaultMode });
                Ok(Box::new(AxSubscription { pid, source, ctx }))
            }
            Err(err) => {
                // Nothing was added to a run loop, so no callback can see ctx.
                unsafe {
                    CFRelease(observer as *const c_void);
                    drop(Box::from_raw(ctx));
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn notifications_map_to_window_events() {
        assert_eq!(kind_for("AXWindowCreated"), Some(WindowEventKind::Created));
        assert_eq!(kind_for("AXUIElementDestroyed"), Some(WindowEventKind::Destroyed));
        assert_eq!(kind_for("AXWindowResized"), Some(WindowEventKind::Resized));
        assert_eq!(kind_for("AXFocusedWindowChanged"), None);
    }
}
