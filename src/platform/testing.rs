//! In-memory collaborators for tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::actor::lifecycle::WindowEventSender;
use crate::common::collections::HashSet;

pub fn make_window(id: u32, pid: pid_t, frame: Rect) -> Window {
    Window {
        id: WindowId::new(id),
        pid,
        display: DisplayId::new(1),
        frame,
        title: format!("window {id}"),
        app_name: format!("app{pid}"),
        bundle_id: Some(format!("com.example.app{pid}")),
        workspace: Some(WorkspaceId::new(1)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Write {
    Size(Size),
    Position(Point),
}

#[derive(Default)]
pub struct WorldState {
    pub windows: Vec<Window>,
    pub displays: Vec<(DisplayId, Rect, Option<WorkspaceId>)>,
    pub unsettable: HashSet<WindowId>,
    pub failing: HashSet<WindowId>,
    pub min_width: HashMap<WindowId, f64>,
    pub traits: HashMap<WindowId, WindowTraits>,
    pub accelerated: HashMap<pid_t, bool>,
    pub accelerated_log: Vec<(pid_t, bool)>,
    pub writes: Vec<(WindowId, Write)>,
    pub trait_queries: usize,
    pub trait_failures: HashSet<WindowId>,
}

/// A fake desktop implementing discovery, displays and automation over one
/// shared window list, so frames written through automation are what the
/// next discovery snapshot reports.
#[derive(Clone, Default)]
pub struct FakeWorld {
    pub state: Arc<Mutex<WorldState>>,
}

impl FakeWorld {
    pub fn with_display(bounds: Rect) -> FakeWorld {
        let world = FakeWorld::default();
        world.add_display(DisplayId::new(1), bounds, Some(WorkspaceId::new(1)));
        world
    }

    pub fn add_display(&self, id: DisplayId, bounds: Rect, workspace: Option<WorkspaceId>) {
        self.state.lock().displays.push((id, bounds, workspace));
    }

    pub fn add_window(&self, window: Window) { self.state.lock().windows.push(window); }

    pub fn remove_window(&self, id: WindowId) {
        self.state.lock().windows.retain(|w| w.id != id);
    }

    pub fn set_frame(&self, id: WindowId, frame: Rect) {
        let mut state = self.state.lock();
        if let Some(w) = state.windows.iter_mut().find(|w| w.id == id) {
            w.frame = frame;
        }
    }

    pub fn frame(&self, id: WindowId) -> Option<Rect> {
        self.state.lock().windows.iter().find(|w| w.id == id).map(|w| w.frame)
    }

    pub fn writes(&self) -> Vec<(WindowId, Write)> { self.state.lock().writes.clone() }

    pub fn clear_writes(&self) { self.state.lock().writes.clear(); }

    pub fn services(&self, rules: FakeRules) -> Services {
        Services {
            discovery: Arc::new(self.clone()),
            displays: Arc::new(self.clone()),
            rules: Arc::new(rules),
            automation: Arc::new(self.clone()),
        }
    }
}

impl WindowDiscovery for FakeWorld {
    fn fetch_visible_windows(&self) -> Vec<Window> { self.state.lock().windows.clone() }

    fn fetch_window_frames(&self, windows: &[WindowId]) -> HashMap<WindowId, Rect> {
        let state = self.state.lock();
        state
            .windows
            .iter()
            .filter(|w| windows.contains(&w.id))
            .map(|w| (w.id, w.frame))
            .collect()
    }
}

impl DisplayService for FakeWorld {
    fn display_at(&self, point: Point) -> Option<DisplayId> {
        let state = self.state.lock();
        state.displays.iter().find(|(_, b, _)| b.contains(point)).map(|(id, ..)| *id)
    }

    fn display_for_rect(&self, rect: Rect) -> Option<DisplayId> {
        let state = self.state.lock();
        state
            .displays
            .iter()
            .map(|(id, b, _)| (*id, b.intersection(&rect).area()))
            .filter(|(_, area)| *area > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn visible_bounds(&self, display: DisplayId) -> Option<Rect> {
        let state = self.state.lock();
        state.displays.iter().find(|(id, ..)| *id == display).map(|(_, b, _)| *b)
    }

    fn current_workspace(&self, display: DisplayId) -> Option<WorkspaceId> {
        let state = self.state.lock();
        state.displays.iter().find(|(id, ..)| *id == display).and_then(|(.., ws)| *ws)
    }

    fn workspace_for_window(&self, window: WindowId) -> Option<WorkspaceId> {
        let state = self.state.lock();
        state.windows.iter().find(|w| w.id == window).and_then(|w| w.workspace)
    }
}

struct FakeHandle {
    id: WindowId,
    state: Arc<Mutex<WorldState>>,
}

impl AutomationWindow for FakeHandle {
    fn frame(&self) -> Result<Rect, AutomationError> {
        let state = self.state.lock();
        state
            .windows
            .iter()
            .find(|w| w.id == self.id)
            .map(|w| w.frame)
            .ok_or(AutomationError::NotFound)
    }

    fn is_size_settable(&self) -> bool { !self.state.lock().unsettable.contains(&self.id) }

    fn is_position_settable(&self) -> bool { !self.state.lock().unsettable.contains(&self.id) }

    fn set_size(&self, size: Size) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        if state.failing.contains(&self.id) {
            return Err(AutomationError::Api(-25200));
        }
        let min_width = state.min_width.get(&self.id).copied().unwrap_or(0.0);
        state.writes.push((self.id, Write::Size(size)));
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == self.id)
            .ok_or(AutomationError::NotFound)?;
        window.frame.size = Size::new(size.width.max(min_width), size.height);
        Ok(())
    }

    fn set_position(&self, origin: Point) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        if state.failing.contains(&self.id) {
            return Err(AutomationError::Api(-25200));
        }
        state.writes.push((self.id, Write::Position(origin)));
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == self.id)
            .ok_or(AutomationError::NotFound)?;
        window.frame.origin = origin;
        Ok(())
    }
}

impl AutomationApi for FakeWorld {
    fn windows_for_process(
        &self,
        pid: pid_t,
    ) -> Result<Vec<Box<dyn AutomationWindow>>, AutomationError> {
        let ids: Vec<WindowId> = {
            let state = self.state.lock();
            state.windows.iter().filter(|w| w.pid == pid).map(|w| w.id).collect()
        };
        Ok(ids
            .into_iter()
            .map(|id| {
                Box::new(FakeHandle {
                    id,
                    state: self.state.clone(),
                }) as Box<dyn AutomationWindow>
            })
            .collect())
    }

    fn window_traits(&self, window: &Window) -> Result<WindowTraits, AutomationError> {
        let mut state = self.state.lock();
        state.trait_queries += 1;
        if state.trait_failures.contains(&window.id) {
            return Err(AutomationError::NotFound);
        }
        Ok(state.traits.get(&window.id).cloned().unwrap_or_else(WindowTraits::standard))
    }

    fn accelerated_rendering(&self, pid: pid_t) -> Option<bool> {
        self.state.lock().accelerated.get(&pid).copied()
    }

    fn set_accelerated_rendering(&self, pid: pid_t, enabled: bool) -> Result<(), AutomationError> {
        let mut state = self.state.lock();
        state.accelerated.insert(pid, enabled);
        state.accelerated_log.push((pid, enabled));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeRules {
    pub floating_apps: HashSet<String>,
    pub floating_types: HashSet<String>,
    pub excluded_bundles: HashSet<String>,
}

impl RuleStore for FakeRules {
    fn is_app_forced_floating(&self, app_name: &str) -> bool {
        self.floating_apps.contains(app_name)
    }

    fn is_type_forced_floating(&self, descriptor: &str) -> bool {
        self.floating_types.contains(descriptor)
    }

    fn is_bundle_excluded(&self, bundle_id: &str) -> bool {
        self.excluded_bundles.contains(bundle_id)
    }
}

impl RuleProvider for FakeRules {
    fn snapshot(&self) -> Arc<dyn RuleStore> { Arc::new(self.clone()) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCall {
    Show(DisplayId, Vec<Rect>, Option<usize>),
    Hide,
}

#[derive(Default)]
pub struct RecordingOverlay {
    pub calls: Mutex<Vec<OverlayCall>>,
}

impl OverlaySink for RecordingOverlay {
    fn show(&self, display: DisplayId, slots: &[Rect], hovered: Option<usize>) {
        self.calls.lock().push(OverlayCall::Show(display, slots.to_vec(), hovered));
    }

    fn hide(&self) { self.calls.lock().push(OverlayCall::Hide); }
}

/// Observer that hands back the event senders so tests can inject window
/// events for a process.
#[derive(Clone, Default)]
pub struct FakeObserver {
    pub active: Arc<Mutex<HashMap<pid_t, WindowEventSender>>>,
    pub refuse: Arc<Mutex<HashSet<pid_t>>>,
}

struct FakeSubscription {
    pid: pid_t,
    active: Arc<Mutex<HashMap<pid_t, WindowEventSender>>>,
}

impl Subscription for FakeSubscription {}

impl Drop for FakeSubscription {
    fn drop(&mut self) { self.active.lock().remove(&self.pid); }
}

impl ProcessObserver for FakeObserver {
    fn observe(
        &self,
        pid: pid_t,
        events: WindowEventSender,
    ) -> Result<Box<dyn Subscription>, ObserveError> {
        if self.refuse.lock().contains(&pid) {
            return Err(ObserveError::Unavailable(pid, "refused".into()));
        }
        self.active.lock().insert(pid, events);
        Ok(Box::new(FakeSubscription {
            pid,
            active: self.active.clone(),
        }))
    }
}

impl FakeObserver {
    pub fn subscribed(&self) -> Vec<pid_t> {
        let mut pids: Vec<_> = self.active.lock().keys().copied().collect();
        pids.sort();
        pids
    }

    pub fn sender(&self, pid: pid_t) -> Option<WindowEventSender> {
        self.active.lock().get(&pid).cloned()
    }
}
