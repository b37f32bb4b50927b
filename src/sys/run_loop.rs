//! The main thread's run loop.
//!
//! Accessibility observers and the mouse tap deliver their callbacks here,
//! and AppKit state such as the screen list may only be read here. Work
//! that has to happen on the main thread is done between slices.

use std::time::Duration;

use core_foundation::runloop::{CFRunLoop, kCFRunLoopDefaultMode};
use objc2_foundation::MainThreadMarker;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::observer;

pub struct MainLoop {
    mtm: MainThreadMarker,
    slice: Duration,
}

impl MainLoop {
    pub fn new(mtm: MainThreadMarker, slice: Duration) -> Self { Self { mtm, slice } }

    /// Runs until `cancel` fires, calling `tick` after every slice.
    pub fn run(&self, cancel: &CancellationToken, mut tick: impl FnMut(MainThreadMarker)) {
        debug!(slice = ?self.slice, "main loop running");
        while !cancel.is_cancelled() {
            CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, self.slice, false);
            observer::reap_released();
            tick(self.mtm);
        }
        observer::reap_released();
        debug!("main loop stopped");
    }
}
