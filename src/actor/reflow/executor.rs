use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, trace};

use super::{ReflowError, ReflowExecutor, ReflowReport, ReflowRequest};
use crate::actor::actuator::FrameActuator;
use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::common::config::ActuatorSettings;
use crate::layout_engine::{DropError, LayoutPlan, TilingState, fetch_traits, slot_index};
use crate::model::{DisplayId, Point, Window, WindowId, WorkspaceId};
use crate::platform::Services;

/// Discovers the on-screen windows and returns the ones that should be
/// tiled, refreshing the classifier's view of which windows are alive.
///
/// The automation API is only queried while `state` is unlocked.
pub fn tileable_windows(services: &Services, state: &Mutex<TilingState>) -> Vec<Window> {
    let windows = services.discovery.fetch_visible_windows();
    let rules = services.rules.snapshot();
    let live: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();

    let missing = {
        let mut state = state.lock();
        state.classifier.prune(&live);
        state.classifier.missing_traits(&windows, rules.as_ref())
    };
    let fetched = fetch_traits(&missing, services.automation.as_ref());

    let mut state = state.lock();
    state.classifier.record_traits(fetched);
    let (tiled, floating) = state.classifier.partition(windows, rules.as_ref());
    trace!(tiled = tiled.len(), floating = floating.len(), "classified windows");
    tiled
}

pub struct Reflower {
    services: Services,
    state: Arc<Mutex<TilingState>>,
    actuator: FrameActuator,
}

impl Reflower {
    pub fn new(services: Services, state: Arc<Mutex<TilingState>>, settings: ActuatorSettings) -> Self {
        let actuator = FrameActuator::new(services.automation.clone(), settings);
        Self { services, state, actuator }
    }

    fn full(&self, reason: &str) -> ReflowReport {
        let windows = tileable_windows(&self.services, &self.state);
        let plans = self
            .state
            .lock()
            .planner
            .build_reflow_plans(&windows, self.services.displays.as_ref());
        debug!(reason, plans = plans.len(), "full reflow");
        self.apply_plans(&plans, &windows)
    }

    /// The preview is rebuilt from fresh window state rather than reusing
    /// whatever was shown while dragging.
    fn drop(
        &self,
        point: Point,
        window: WindowId,
        hovered_slot: Option<usize>,
    ) -> Result<ReflowReport, ReflowError> {
        let displays = self.services.displays.as_ref();
        let windows = tileable_windows(&self.services, &self.state);
        let preferred = displays.display_at(point).and_then(|d| displays.current_workspace(d));

        let resolution = {
            let state = self.state.lock();
            let preview = state
                .planner
                .build_drag_preview_plan(point, &windows, window, preferred, displays)
                .ok_or(DropError::MissingPlan)?;
            let Some(destination) = slot_index(point, &preview).or(hovered_slot) else {
                return Err(DropError::MissingDestination(preview.slots.len()).into());
            };
            trace!(%window, destination, "resolving drop");
            state.planner.resolve_drop(&preview, window, destination, &windows, displays)?
        };

        if !resolution.should_apply {
            debug!(%window, "drop leaves every window in place");
            return Ok(ReflowReport {
                plans: resolution.plans.len(),
                skipped: resolution.plans.len(),
                ..Default::default()
            });
        }
        if let Some(displaced) = resolution.displaced {
            debug!(%window, %displaced, "drop swaps windows");
        }
        Ok(self.apply_plans(&resolution.plans, &windows))
    }

    fn apply_plans(&self, plans: &[LayoutPlan], windows: &[Window]) -> ReflowReport {
        let tolerance = self.state.lock().planner.settings().frame_tolerance;
        let mut targets = BTreeMap::new();
        let mut skipped = 0;
        for plan in plans {
            if plan.is_noop(tolerance) {
                trace!(scope = ?plan.scope, "plan already applied");
                skipped += 1;
                continue;
            }
            targets.extend(plan.target_frames());
        }

        let apply = if targets.is_empty() {
            Default::default()
        } else {
            let by_id: HashMap<WindowId, Window> =
                windows.iter().map(|w| (w.id, w.clone())).collect();
            self.actuator.apply(&targets, &by_id)
        };
        ReflowReport {
            plans: plans.len(),
            skipped,
            apply,
        }
    }
}

impl ReflowExecutor for Reflower {
    fn settle_snapshot(&self) -> Vec<(WindowId, DisplayId, Option<WorkspaceId>)> {
        let mut snapshot: Vec<_> = self
            .services
            .discovery
            .fetch_visible_windows()
            .into_iter()
            .map(|w| (w.id, w.display, w.workspace))
            .collect();
        snapshot.sort();
        snapshot
    }

    #[instrument(skip_all, fields(?request))]
    fn execute(&self, request: &ReflowRequest) -> Result<ReflowReport, ReflowError> {
        match request {
            ReflowRequest::Full { reason } => Ok(self.full(reason)),
            ReflowRequest::Drop {
                point,
                window,
                hovered_slot,
            } => self.drop(*point, *window, *hovered_slot),
        }
    }
}
