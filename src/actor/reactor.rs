//! The reactor owns the gesture state and turns input into reflow requests.
//!
//! Pointer events, debounced window changes and user commands all arrive on
//! one mailbox, so gesture transitions never race each other. Anything that
//! needs settled window state is handed to the [`ReflowScheduler`] instead
//! of being done inline.

mod gesture;

use std::ops::ControlFlow;
use std::sync::Arc;

pub use gesture::{
    Candidate, DragInfo, FinishedGesture, GestureActivity, GestureState, GestureTracker,
    ResizeInfo,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, instrument, trace, warn};

use super::lifecycle::{self, ChangeKind};
use super::reflow::executor::{Reflower, tileable_windows};
use super::reflow::{ReflowRequest, ReflowScheduler};
use super::stabilize::StabilizationProbe;
use crate::actor;
use crate::common::config::Settings;
use crate::layout_engine::{LayoutPlan, ResizeSample, TilingState, slot_index};
use crate::model::{Point, Rect, Window, WindowId};
use crate::platform::{OverlaySink, Services};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Primary button pressed.
    MouseDown(Point),
    /// Pointer moved with the primary button held.
    MouseMoved(Point),
    MouseUp(Point),
    /// The gesture was interrupted, e.g. by the event tap being disabled.
    Cancel,
    /// A debounced burst of window notifications.
    WindowsChanged(ChangeKind),
    RulesChanged,
    ToggleFloating(WindowId),
    SetEnabled(bool),
    Stop,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

pub struct Reactor {
    services: Services,
    state: Arc<Mutex<TilingState>>,
    overlay: Arc<dyn OverlaySink>,
    gesture: GestureTracker,
    activity_tx: watch::Sender<GestureActivity>,
    scheduler: ReflowScheduler,
    lifecycle_tx: Option<lifecycle::Sender>,
    enabled: bool,
    /// Tileable windows as of the last press. Previews are planned against
    /// it so the layout does not shift under the pointer mid-gesture.
    press_snapshot: Vec<Window>,
}

impl Reactor {
    /// Must be called from within a tokio runtime; the reflow worker is
    /// spawned here.
    pub fn new(
        services: Services,
        state: Arc<Mutex<TilingState>>,
        overlay: Arc<dyn OverlaySink>,
        settings: &Settings,
    ) -> Self {
        let (activity_tx, activity_rx) = watch::channel(GestureActivity::Idle);
        let executor = Reflower::new(services.clone(), state.clone(), settings.actuator.clone());
        let probe = StabilizationProbe::new(settings.stabilization.clone());
        let scheduler = ReflowScheduler::spawn(executor, probe, activity_rx);
        Reactor {
            services,
            state,
            overlay,
            gesture: GestureTracker::new(settings.gesture.clone()),
            activity_tx,
            scheduler,
            lifecycle_tx: None,
            enabled: settings.enabled,
            press_snapshot: vec![],
        }
    }

    /// Stopping the reactor also stops the lifecycle monitor behind `tx`.
    pub fn with_lifecycle(mut self, tx: lifecycle::Sender) -> Self {
        self.lifecycle_tx = Some(tx);
        self
    }

    pub fn activity(&self) -> watch::Receiver<GestureActivity> { self.activity_tx.subscribe() }

    pub async fn run(mut self, mut events: Receiver) {
        if self.enabled {
            self.request_full("startup");
        }
        while let Some((span, event)) = events.recv().await {
            if self.dispatch(event).instrument(span).await.is_break() {
                break;
            }
        }
        info!("reactor stopped");
    }

    /// Handles one event. A press first snapshots the tileable windows on
    /// the blocking pool, since discovery talks to every running application.
    async fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        if self.enabled && matches!(event, Event::MouseDown(_)) {
            self.press_snapshot =
                Self::discover_tileable(self.services.clone(), self.state.clone()).await;
        }
        self.handle_event(event)
    }

    async fn discover_tileable(services: Services, state: Arc<Mutex<TilingState>>) -> Vec<Window> {
        match tokio::task::spawn_blocking(move || tileable_windows(&services, &state)).await {
            Ok(windows) => windows,
            Err(err) => {
                warn!(%err, "window discovery failed");
                vec![]
            }
        }
    }

    fn log_event(&self, event: &Event) {
        match event {
            Event::MouseMoved(_) => trace!(?event, "Event"),
            _ => debug!(?event, "Event"),
        }
    }

    #[instrument(name = "reactor::handle_event", skip(self), fields(event=?event))]
    fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        self.log_event(&event);
        match event {
            Event::MouseDown(point) => self.on_mouse_down(point),
            Event::MouseMoved(point) => self.on_mouse_moved(point),
            Event::MouseUp(point) => self.on_mouse_up(point),
            Event::Cancel => self.abandon_gesture(),
            Event::WindowsChanged(ChangeKind::GeometryOnly) => {
                // Usually our own frame writes echoing back. Only a resize in
                // flight cares about them.
                if let GestureState::Resizing(resize) = self.gesture.state().clone() {
                    self.refresh_resize(&resize);
                } else {
                    trace!("ignoring geometry-only change");
                }
            }
            Event::WindowsChanged(ChangeKind::Structural) => self.request_full("windows changed"),
            Event::RulesChanged => self.request_full("rules changed"),
            Event::ToggleFloating(window) => {
                let floating = {
                    let mut state = self.state.lock();
                    let currently = state.classifier.is_floating(window);
                    state.classifier.toggle(window, currently)
                };
                info!(%window, floating, "floating toggled");
                self.request_full("floating toggled");
            }
            Event::SetEnabled(enabled) => self.set_enabled(enabled),
            Event::Stop => {
                self.scheduler.stop();
                if let Some(tx) = &self.lifecycle_tx {
                    tx.send(lifecycle::Request::Stop);
                }
                self.abandon_gesture();
                return ControlFlow::Break(());
            }
        }
        self.publish_activity();
        ControlFlow::Continue(())
    }

    fn on_mouse_down(&mut self, point: Point) {
        if !self.enabled {
            return;
        }
        if !self.gesture.pointer_down(point, &self.press_snapshot) {
            self.press_snapshot.clear();
        }
    }

    fn on_mouse_moved(&mut self, point: Point) {
        let watched = self.gesture.watched_windows();
        if watched.is_empty() {
            return;
        }
        let live = self.services.discovery.fetch_window_frames(&watched);
        self.gesture.pointer_moved(point, &live);

        match self.gesture.state().clone() {
            GestureState::Dragging(drag) => self.update_drag_preview(point, drag.window),
            GestureState::Resizing(resize) => {
                if let Some(frame) = live.get(&resize.window) {
                    self.update_resize_preview(&resize, *frame);
                }
            }
            GestureState::Idle | GestureState::Pending { .. } => {}
        }
    }

    fn on_mouse_up(&mut self, point: Point) {
        match self.gesture.pointer_up(point) {
            Some(FinishedGesture::Drop { drag, at }) => {
                self.overlay.hide();
                debug!(window = %drag.window, hovered = ?drag.hovered_slot, "drop");
                self.scheduler.enqueue(ReflowRequest::Drop {
                    point: at,
                    window: drag.window,
                    hovered_slot: drag.hovered_slot,
                });
            }
            Some(FinishedGesture::Resize { resize, .. }) => {
                let live = self.services.discovery.fetch_window_frames(&[resize.window]);
                if let Some(frame) = live.get(&resize.window) {
                    self.sync_resize(&resize, *frame);
                }
                self.state.lock().planner.finish_resize();
                self.overlay.hide();
                self.request_full("resize finished");
            }
            None => {}
        }
        self.press_snapshot.clear();
    }

    fn update_drag_preview(&mut self, point: Point, dragged: WindowId) {
        let displays = self.services.displays.as_ref();
        let preferred = displays.display_at(point).and_then(|d| displays.current_workspace(d));
        let preview = self.state.lock().planner.build_drag_preview_plan(
            point,
            &self.press_snapshot,
            dragged,
            preferred,
            displays,
        );
        match preview {
            Some(plan) => {
                let hovered = slot_index(point, &plan);
                self.gesture.set_hovered_slot(hovered);
                self.overlay.show(plan.scope.display, &plan.slots, hovered);
            }
            None => {
                self.gesture.set_hovered_slot(None);
                self.overlay.hide();
            }
        }
    }

    fn refresh_resize(&mut self, resize: &ResizeInfo) {
        let live = self.services.discovery.fetch_window_frames(&[resize.window]);
        if let Some(frame) = live.get(&resize.window) {
            self.update_resize_preview(resize, *frame);
        }
    }

    fn update_resize_preview(&mut self, resize: &ResizeInfo, current: Rect) {
        let plans = self.sync_resize(resize, current);
        let plan = plans.iter().find(|p| p.slot_for(resize.window).is_some());
        match plan {
            Some(plan) => {
                self.overlay.show(plan.scope.display, &plan.slots, plan.slot_for(resize.window))
            }
            None => self.overlay.hide(),
        }
    }

    /// Feeds the resized window's frame into ratio memory and returns the
    /// plans it now implies.
    fn sync_resize(&self, resize: &ResizeInfo, current: Rect) -> Vec<LayoutPlan> {
        let windows: Vec<Window> = self
            .press_snapshot
            .iter()
            .map(|w| if w.id == resize.window { w.with_frame(current) } else { w.clone() })
            .collect();
        let sample = ResizeSample {
            window: resize.window,
            original_frame: resize.original_frame,
            current_frame: current,
        };
        let displays = self.services.displays.as_ref();
        let mut state = self.state.lock();
        state.planner.sync_ratios_from_observed(&windows, Some(&sample), displays);
        state.planner.build_reflow_plans(&windows, displays)
    }

    fn abandon_gesture(&mut self) {
        self.gesture.reset();
        self.state.lock().planner.finish_resize();
        self.overlay.hide();
        self.press_snapshot.clear();
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        info!(enabled, "tiling toggled");
        if enabled {
            self.request_full("enabled");
        } else {
            self.abandon_gesture();
            self.scheduler.clear();
        }
    }

    fn request_full(&self, reason: &str) {
        if !self.enabled {
            trace!(reason, "tiling disabled, not reflowing");
            return;
        }
        self.scheduler.enqueue(ReflowRequest::Full { reason: reason.into() });
    }

    fn publish_activity(&self) {
        let activity = self.gesture.activity();
        self.activity_tx.send_if_modified(|current| {
            if *current == activity {
                return false;
            }
            *current = activity;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::DisplayId;
    use crate::platform::testing::{
        FakeRules, FakeWorld, OverlayCall, RecordingOverlay, make_window,
    };

    const MASTER: Rect = Rect::new(8.0, 8.0, 584.0, 784.0);
    const STACK_TOP: Rect = Rect::new(608.0, 8.0, 584.0, 384.0);
    const STACK_BOTTOM: Rect = Rect::new(608.0, 408.0, 584.0, 384.0);

    struct Harness {
        world: FakeWorld,
        overlay: Arc<RecordingOverlay>,
        reactor: Reactor,
    }

    fn harness(windows: Vec<Window>) -> Harness {
        let world = FakeWorld::with_display(Rect::new(0.0, 0.0, 1200.0, 800.0));
        for window in windows {
            world.add_window(window);
        }
        let settings = Settings::default();
        let state = Arc::new(Mutex::new(TilingState::new(&settings)));
        let overlay = Arc::new(RecordingOverlay::default());
        let reactor =
            Reactor::new(world.services(FakeRules::default()), state, overlay.clone(), &settings);
        Harness { world, overlay, reactor }
    }

    fn tiled() -> Vec<Window> {
        vec![
            make_window(1, 10, MASTER),
            make_window(2, 10, STACK_TOP),
            make_window(3, 11, STACK_BOTTOM),
        ]
    }

    fn scattered() -> Vec<Window> {
        vec![
            make_window(1, 10, Rect::new(0.0, 0.0, 500.0, 500.0)),
            make_window(2, 10, Rect::new(700.0, 0.0, 400.0, 300.0)),
            make_window(3, 11, Rect::new(700.0, 500.0, 400.0, 300.0)),
        ]
    }

    async fn settle() { tokio::time::sleep(Duration::from_secs(5)).await; }

    fn offset(rect: Rect, dx: f64, dy: f64) -> Rect {
        Rect::new(rect.origin.x + dx, rect.origin.y + dy, rect.size.width, rect.size.height)
    }

    #[tokio::test(start_paused = true)]
    async fn drag_onto_master_swaps_windows() {
        let mut h = harness(tiled());
        let w3 = WindowId::new(3);
        let activity = h.reactor.activity();

        h.reactor.dispatch(Event::MouseDown(Point::new(700.0, 420.0))).await;
        assert_eq!(*activity.borrow(), GestureActivity::Pending);

        for (step, point) in [(1.0, Point::new(600.0, 420.0)), (2.0, Point::new(300.0, 400.0))] {
            h.world.set_frame(w3, offset(STACK_BOTTOM, -100.0 * step, 10.0));
            h.reactor.handle_event(Event::MouseMoved(point));
        }
        assert_eq!(*activity.borrow(), GestureActivity::Dragging);

        let calls = h.overlay.calls.lock().clone();
        let Some(OverlayCall::Show(display, slots, hovered)) = calls.last() else {
            panic!("expected a preview, got {calls:?}");
        };
        assert_eq!(*display, DisplayId::new(1));
        assert_eq!(slots, &vec![MASTER, STACK_TOP, STACK_BOTTOM]);
        assert_eq!(*hovered, Some(0));

        h.reactor.handle_event(Event::MouseUp(Point::new(300.0, 400.0)));
        assert_eq!(h.overlay.calls.lock().last(), Some(&OverlayCall::Hide));
        assert_eq!(*activity.borrow(), GestureActivity::Idle);

        settle().await;
        assert_eq!(h.world.frame(w3), Some(MASTER));
        assert_eq!(h.world.frame(WindowId::new(1)), Some(STACK_BOTTOM));
        assert_eq!(h.world.frame(WindowId::new(2)), Some(STACK_TOP));
    }

    #[tokio::test(start_paused = true)]
    async fn click_does_not_reflow() {
        let mut h = harness(tiled());
        h.reactor.dispatch(Event::MouseDown(Point::new(300.0, 300.0))).await;
        h.reactor.handle_event(Event::MouseMoved(Point::new(301.0, 300.0)));
        h.reactor.handle_event(Event::MouseUp(Point::new(301.0, 300.0)));
        assert_eq!(h.reactor.scheduler.pending(), 0);
        settle().await;
        assert!(h.world.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn press_on_empty_desktop_stays_idle() {
        let mut h = harness(vec![make_window(1, 10, Rect::new(0.0, 0.0, 300.0, 300.0))]);
        h.reactor.dispatch(Event::MouseDown(Point::new(900.0, 700.0))).await;
        assert_eq!(h.reactor.gesture.state(), &GestureState::Idle);
        assert!(h.reactor.press_snapshot.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resizing_master_moves_the_split() {
        let mut h = harness(tiled());
        let w1 = WindowId::new(1);
        h.reactor.dispatch(Event::MouseDown(Point::new(590.0, 400.0))).await;

        let wider = Rect::new(8.0, 8.0, 704.0, 784.0);
        h.world.set_frame(w1, wider);
        h.reactor.handle_event(Event::MouseMoved(Point::new(710.0, 400.0)));
        assert!(matches!(h.reactor.gesture.state(), GestureState::Resizing(_)));

        let calls = h.overlay.calls.lock().clone();
        assert_eq!(
            calls.last(),
            Some(&OverlayCall::Show(
                DisplayId::new(1),
                vec![
                    wider,
                    Rect::new(728.0, 8.0, 464.0, 384.0),
                    Rect::new(728.0, 408.0, 464.0, 384.0),
                ],
                Some(0),
            ))
        );

        h.reactor.handle_event(Event::MouseUp(Point::new(710.0, 400.0)));
        assert!(!h.reactor.state.lock().planner.ratios().is_resizing());
        settle().await;
        assert_eq!(h.world.frame(w1), Some(wider));
        assert_eq!(h.world.frame(WindowId::new(2)), Some(Rect::new(728.0, 8.0, 464.0, 384.0)));
        assert_eq!(h.world.frame(WindowId::new(3)), Some(Rect::new(728.0, 408.0, 464.0, 384.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn geometry_only_changes_are_ignored_when_idle() {
        let mut h = harness(scattered());
        h.reactor.handle_event(Event::WindowsChanged(ChangeKind::GeometryOnly));
        assert_eq!(h.reactor.scheduler.pending(), 0);

        h.reactor.handle_event(Event::WindowsChanged(ChangeKind::Structural));
        assert_eq!(h.reactor.scheduler.pending(), 1);
        settle().await;
        assert_eq!(h.world.frame(WindowId::new(1)), Some(MASTER));
        assert_eq!(h.world.frame(WindowId::new(3)), Some(STACK_BOTTOM));
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_floating_retiles_the_rest() {
        let mut h = harness(tiled());
        h.reactor.handle_event(Event::RulesChanged);
        settle().await;

        h.reactor.handle_event(Event::ToggleFloating(WindowId::new(3)));
        settle().await;
        assert_eq!(h.world.frame(WindowId::new(2)), Some(Rect::new(608.0, 8.0, 584.0, 784.0)));
        assert_eq!(h.world.frame(WindowId::new(3)), Some(STACK_BOTTOM));
        assert!(h.reactor.state.lock().classifier.is_floating(WindowId::new(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_reactor_ignores_changes() {
        let mut h = harness(scattered());
        h.reactor.handle_event(Event::SetEnabled(false));
        h.reactor.handle_event(Event::WindowsChanged(ChangeKind::Structural));
        h.reactor.dispatch(Event::MouseDown(Point::new(100.0, 100.0))).await;
        assert_eq!(h.reactor.gesture.state(), &GestureState::Idle);
        settle().await;
        assert!(h.world.writes().is_empty());

        h.reactor.handle_event(Event::SetEnabled(true));
        settle().await;
        assert_eq!(h.world.frame(WindowId::new(1)), Some(MASTER));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_tears_everything_down() {
        let mut h = harness(scattered());
        let (lifecycle_tx, mut lifecycle_rx) = actor::channel();
        h.reactor = h.reactor.with_lifecycle(lifecycle_tx);

        h.reactor.handle_event(Event::WindowsChanged(ChangeKind::Structural));
        assert!(h.reactor.handle_event(Event::Stop).is_break());
        assert_eq!(h.reactor.scheduler.pending(), 0);
        assert!(matches!(lifecycle_rx.try_recv(), Ok((_, lifecycle::Request::Stop))));

        settle().await;
        assert!(h.world.writes().is_empty());
    }
}
