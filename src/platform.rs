//! Boundaries to the collaborators the tiling core drives but does not own.
//!
//! Everything here is a trait so the core can be exercised against fakes;
//! the macOS implementations live in [`crate::sys`].

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use thiserror::Error;

use crate::actor::lifecycle::WindowEventSender;
use crate::common::collections::HashMap;
use crate::model::{DisplayId, Point, Rect, Size, Window, WindowId, WindowTraits, WorkspaceId, pid_t};

/// Enumerates on-screen windows.
///
/// Implementations exclude the tiler's own windows and anything below the
/// platform's minimum window size.
pub trait WindowDiscovery: Send + Sync {
    fn fetch_visible_windows(&self) -> Vec<Window>;

    /// Cheap partial refresh used while sampling a gesture. Handles that no
    /// longer exist are simply absent from the result.
    fn fetch_window_frames(&self, windows: &[WindowId]) -> HashMap<WindowId, Rect>;
}

/// Read-only view of the user's persisted rules.
pub trait RuleStore: Send + Sync {
    fn is_app_forced_floating(&self, app_name: &str) -> bool;
    fn is_type_forced_floating(&self, descriptor: &str) -> bool;
    fn is_bundle_excluded(&self, bundle_id: &str) -> bool;
}

/// Hands out a fresh [`RuleStore`] snapshot for every reflow so edits made
/// elsewhere are picked up without the core observing them directly.
pub trait RuleProvider: Send + Sync {
    fn snapshot(&self) -> Arc<dyn RuleStore>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    #[error("no live automation handle for window")]
    NotFound,
    #[error("attribute {0} is not settable")]
    NotSettable(&'static str),
    #[error("automation api returned error {0}")]
    Api(i32),
}

/// One live window as seen by the automation API.
pub trait AutomationWindow {
    fn frame(&self) -> Result<Rect, AutomationError>;
    fn is_size_settable(&self) -> bool;
    fn is_position_settable(&self) -> bool;
    fn set_size(&self, size: Size) -> Result<(), AutomationError>;
    fn set_position(&self, origin: Point) -> Result<(), AutomationError>;
}

pub trait AutomationApi: Send + Sync {
    /// All live windows of a process. There is no guaranteed mapping from
    /// [`WindowId`] to these handles; callers match on geometry.
    fn windows_for_process(
        &self,
        pid: pid_t,
    ) -> Result<Vec<Box<dyn AutomationWindow>>, AutomationError>;

    fn window_traits(&self, window: &Window) -> Result<WindowTraits, AutomationError>;

    /// `None` when the application does not expose the flag at all.
    fn accelerated_rendering(&self, pid: pid_t) -> Option<bool>;

    fn set_accelerated_rendering(&self, pid: pid_t, enabled: bool) -> Result<(), AutomationError>;
}

pub trait DisplayService: Send + Sync {
    fn display_at(&self, point: Point) -> Option<DisplayId>;

    /// The display with the largest overlap with `rect`.
    fn display_for_rect(&self, rect: Rect) -> Option<DisplayId>;

    /// Usable bounds, excluding the menu bar and dock.
    fn visible_bounds(&self, display: DisplayId) -> Option<Rect>;

    fn current_workspace(&self, display: DisplayId) -> Option<WorkspaceId>;

    fn workspace_for_window(&self, window: WindowId) -> Option<WorkspaceId>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    #[error("process {0} cannot be observed: {1}")]
    Unavailable(pid_t, String),
}

/// A live change subscription. Dropping it unsubscribes.
pub trait Subscription: Send {}

pub trait ProcessObserver: Send + Sync {
    /// Subscribes to window created, destroyed, resized, minimized and
    /// deminiaturized events of `pid`.
    fn observe(
        &self,
        pid: pid_t,
        events: WindowEventSender,
    ) -> Result<Box<dyn Subscription>, ObserveError>;
}

/// Receives live feedback while a gesture is in flight.
pub trait OverlaySink: Send + Sync {
    fn show(&self, display: DisplayId, slots: &[Rect], hovered: Option<usize>);
    fn hide(&self);
}

/// Overlay that only logs; used when no renderer is attached.
#[derive(Debug, Default)]
pub struct TracingOverlay;

impl OverlaySink for TracingOverlay {
    fn show(&self, display_id: DisplayId, slots: &[Rect], hovered: Option<usize>) {
        tracing::trace!(display = ?display_id, slots = slots.len(), ?hovered, "overlay show");
    }

    fn hide(&self) {
        tracing::trace!("overlay hide");
    }
}

/// The collaborators a reflow needs, bundled so they can be threaded
/// through constructors together.
#[derive(Clone)]
pub struct Services {
    pub discovery: Arc<dyn WindowDiscovery>,
    pub displays: Arc<dyn DisplayService>,
    pub rules: Arc<dyn RuleProvider>,
    pub automation: Arc<dyn AutomationApi>,
}
