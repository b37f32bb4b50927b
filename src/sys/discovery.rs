use std::sync::Arc;

use objc2::msg_send;
use objc2_app_kit::{NSApplicationActivationPolicy, NSWorkspace};
use parking_lot::Mutex;
use tracing::{instrument, trace};

use super::axuielement::{self as ax, AXUIElement, AXUIElementExt};
use super::screen::ScreenService;
use crate::common::collections::{HashMap, HashSet};
use crate::common::log::timed;
use crate::model::{Rect, Window, WindowId, pid_t};
use crate::platform::{DisplayService, WindowDiscovery};

/// Windows smaller than this on either axis are popovers, tooltips or
/// other chrome and are never reported.
const MIN_WINDOW_EXTENT: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct RunningApp {
    pub pid: pid_t,
    pub name: String,
    pub bundle_id: Option<String>,
}

/// Regular (dock-visible) applications other than this process.
pub fn running_apps() -> Vec<RunningApp> {
    let own = std::process::id() as pid_t;
    NSWorkspace::sharedWorkspace()
        .runningApplications()
        .iter()
        .filter(|app| app.activationPolicy() == NSApplicationActivationPolicy::Regular)
        .map(|app| RunningApp {
            pid: unsafe { msg_send![&*app, processIdentifier] },
            name: app.localizedName().map(|n| n.to_string()).unwrap_or_default(),
            bundle_id: app.bundleIdentifier().map(|b| b.to_string()),
        })
        .filter(|app| app.pid != own && app.pid > 0)
        .collect()
}

/// [`WindowDiscovery`] over the accessibility window lists of every running
/// application.
pub struct AxDiscovery {
    screens: Arc<ScreenService>,
    /// Owner of each window seen by the last full discovery.
    owners: Mutex<HashMap<WindowId, pid_t>>,
}

impl AxDiscovery {
    pub fn new(screens: Arc<ScreenService>) -> Self {
        Self { screens, owners: Mutex::default() }
    }

    fn app_windows(&self, app: &RunningApp) -> Vec<Window> {
        let Ok(elements) = ax::application(app.pid).window_elements() else {
            return vec![];
        };
        elements
            .iter()
            .filter_map(|element| self.describe(app, element))
            .collect()
    }

    fn describe(&self, app: &RunningApp, element: &AXUIElement) -> Option<Window> {
        let id = WindowId::new(element.window_server_id().ok()?);
        if element.bool_value(ax::MINIMIZED).unwrap_or(false) {
            return None;
        }
        let frame = element.current_frame().ok()?;
        if frame.size.width < MIN_WINDOW_EXTENT || frame.size.height < MIN_WINDOW_EXTENT {
            return None;
        }
        let display = self
            .screens
            .display_for_rect(frame)
            .or_else(|| self.screens.display_at(frame.mid()))?;
        Some(Window {
            id,
            pid: app.pid,
            display,
            frame,
            title: element.string_value(ax::TITLE).unwrap_or_default(),
            app_name: app.name.clone(),
            bundle_id: app.bundle_id.clone(),
            workspace: self.screens.current_workspace(display),
        })
    }
}

impl WindowDiscovery for AxDiscovery {
    #[instrument(skip_all)]
    fn fetch_visible_windows(&self) -> Vec<Window> {
        let windows: Vec<Window> = timed("fetch_visible_windows", || {
            running_apps().iter().flat_map(|app| self.app_windows(app)).collect()
        });
        trace!(count = windows.len(), "discovered windows");

        *self.owners.lock() = windows.iter().map(|w| (w.id, w.pid)).collect();
        self.screens
            .record_placements(windows.iter().filter_map(|w| Some((w.id, w.workspace?))));
        windows
    }

    fn fetch_window_frames(&self, windows: &[WindowId]) -> HashMap<WindowId, Rect> {
        let wanted: HashSet<WindowId> = windows.iter().copied().collect();
        let pids: HashSet<pid_t> = {
            let owners = self.owners.lock();
            windows.iter().filter_map(|id| owners.get(id).copied()).collect()
        };

        let mut frames = HashMap::default();
        for pid in pids {
            let Ok(elements) = ax::application(pid).window_elements() else {
                continue;
            };
            for element in elements {
                let Ok(id) = element.window_server_id().map(WindowId::new) else {
                    continue;
                };
                if !wanted.contains(&id) {
                    continue;
                }
                if let Ok(frame) = element.current_frame() {
                    frames.insert(id, frame);
                }
            }
        }
        frames
    }
}
