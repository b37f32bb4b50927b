//! macOS implementations of the [`crate::platform`] traits.
//!
//! Window state is read and written through the accessibility API; screens
//! come from AppKit and mouse input from a listen-only event tap. Anything
//! that must touch AppKit runs on the main thread's run loop, see
//! [`run_loop::MainLoop`].

pub mod accessibility;
pub mod automation;
pub mod axuielement;
pub mod discovery;
pub mod enhanced_ui;
pub mod event_tap;
pub mod observer;
pub mod process;
pub mod run_loop;
pub mod screen;
