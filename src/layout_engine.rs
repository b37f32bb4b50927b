//! Master/stack layout planning.
//!
//! Planning is pure: it takes window snapshots and the display service and
//! produces [`LayoutPlan`]s. The only state kept between calls is the
//! adaptive ratio memory in [`RatioStore`].

mod assign;
mod drop;
mod floating;
mod plan;
mod ratios;
mod slots;

pub use assign::assign_windows_to_nearest_slots;
pub use drop::{DropError, DropResolution};
pub use floating::{Classification, FloatReason, FloatingClassifier, fetch_traits};
pub use plan::{LayoutPlan, ScopeKey, slot_index};
pub use ratios::{
    MAX_MASTER_RATIO, MIN_MASTER_RATIO, RatioStore, ResizeSample, ResizeTarget, ScopeRatios,
};
pub use slots::make_slots;
use tracing::{trace, warn};

use crate::common::collections::{BTreeMap, HashMap};
use crate::common::config::{LayoutSettings, Settings};
use crate::model::{DisplayId, Point, Window, WindowId, WorkspaceId};
use crate::platform::DisplayService;

pub struct LayoutPlanner {
    settings: LayoutSettings,
    ratios: RatioStore,
}

impl LayoutPlanner {
    pub fn new(settings: LayoutSettings) -> Self {
        let ratios = RatioStore::new(settings.default_master_ratio);
        Self { settings, ratios }
    }

    pub fn settings(&self) -> &LayoutSettings { &self.settings }

    pub fn ratios(&self) -> &RatioStore { &self.ratios }

    /// One plan per (display, workspace) with at least one window, ordered by
    /// scope. Displays without known bounds are skipped.
    pub fn build_reflow_plans(
        &self,
        windows: &[Window],
        displays: &dyn DisplayService,
    ) -> Vec<LayoutPlan> {
        let mut plans = Vec::new();
        for (scope, group) in group_by_scope(windows, displays) {
            let Some(bounds) = displays.visible_bounds(scope.display) else {
                warn!(display = ?scope.display, "no bounds for display, skipping its windows");
                continue;
            };
            let ratios = self.ratios.get(scope);
            let slots = make_slots(group.len(), bounds, &ratios, &self.settings);
            plans.push(LayoutPlan::new(scope, bounds, slots, group));
        }
        plans
    }

    /// A preview of the display under `at` with `dragged` taken out and an
    /// empty slot reserved for it. Does not touch ratio memory.
    pub fn build_drag_preview_plan(
        &self,
        at: Point,
        windows: &[Window],
        dragged: WindowId,
        preferred_workspace: Option<WorkspaceId>,
        displays: &dyn DisplayService,
    ) -> Option<LayoutPlan> {
        let display = displays
            .display_at(at)
            .or_else(|| windows.iter().find(|w| w.id == dragged).map(|w| w.display))?;
        let bounds = displays.visible_bounds(display)?;

        let others: Vec<&Window> =
            windows.iter().filter(|w| w.id != dragged && w.display == display).collect();
        let workspace = preferred_workspace
            .or_else(|| majority_workspace(others.iter().copied()))
            .or_else(|| displays.current_workspace(display));
        let mut members: Vec<Window> = others
            .into_iter()
            .filter(|w| w.workspace.is_none() || w.workspace == workspace)
            .cloned()
            .collect();
        members.sort_by_key(|w| w.id);

        let scope = ScopeKey { display, workspace };
        let ratios = self.ratios.get(scope);
        let slots = make_slots(members.len() + 1, bounds, &ratios, &self.settings);
        trace!(?scope, slots = slots.len(), "drag preview");
        Some(LayoutPlan::new(scope, bounds, slots, members))
    }

    /// Updates ratio memory from observed frames. With a `resizing` sample
    /// only the boundary that window dragged moves; otherwise the ratios of
    /// every scope are inferred from where its windows sit.
    ///
    /// The reactor only passes resize samples. Inferring from idle frames
    /// after a resize would read the untouched master window and undo a
    /// split moved from a stack row.
    pub fn sync_ratios_from_observed(
        &mut self,
        windows: &[Window],
        resizing: Option<&ResizeSample>,
        displays: &dyn DisplayService,
    ) {
        let Some(sample) = resizing else {
            for plan in self.build_reflow_plans(windows, displays) {
                self.ratios.observe_idle(&plan, &self.settings);
            }
            return;
        };

        let target = self.ratios.resize_target(sample.window).or_else(|| {
            // Plan with the window where it was before the gesture started so
            // it is matched to the slot it was tiled in.
            let before: Vec<Window> = windows
                .iter()
                .map(|w| {
                    if w.id == sample.window {
                        w.with_frame(sample.original_frame)
                    } else {
                        w.clone()
                    }
                })
                .collect();
            self.build_reflow_plans(&before, displays).into_iter().find_map(|plan| {
                plan.slot_for(sample.window).map(|slot| ResizeTarget {
                    scope: plan.scope,
                    bounds: plan.bounds,
                    slot,
                    rows: plan.slots.len().saturating_sub(1),
                })
            })
        });

        match target {
            Some(target) => self.ratios.observe_resize(target, sample, &self.settings),
            None => trace!(window = %sample.window, "resized window is not tiled"),
        }
    }

    pub fn finish_resize(&mut self) { self.ratios.finish_resize(); }
}

/// Groups windows by display and workspace. Each display's windows without
/// a known workspace join the workspace most of its other windows are on,
/// ties going to the higher id.
fn group_by_scope(
    windows: &[Window],
    displays: &dyn DisplayService,
) -> BTreeMap<ScopeKey, Vec<Window>> {
    let mut by_display: BTreeMap<DisplayId, Vec<&Window>> = BTreeMap::new();
    for window in windows {
        by_display.entry(window.display).or_default().push(window);
    }

    let mut groups: BTreeMap<ScopeKey, Vec<Window>> = BTreeMap::new();
    for (display, members) in by_display {
        let majority = majority_workspace(members.iter().copied())
            .or_else(|| displays.current_workspace(display));
        for window in members {
            let scope = ScopeKey {
                display,
                workspace: window.workspace.or(majority),
            };
            groups.entry(scope).or_default().push(window.clone());
        }
    }
    for group in groups.values_mut() {
        group.sort_by_key(|w| w.id);
    }
    groups
}

fn majority_workspace<'a>(windows: impl Iterator<Item = &'a Window>) -> Option<WorkspaceId> {
    let mut counts: HashMap<WorkspaceId, usize> = HashMap::default();
    for workspace in windows.filter_map(|w| w.workspace) {
        *counts.entry(workspace).or_default() += 1;
    }
    counts.into_iter().max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0))).map(|(ws, _)| ws)
}

/// Layout state shared between the reactor, which mutates it in response
/// to gestures and toggles, and the reflow worker, which reads it.
pub struct TilingState {
    pub planner: LayoutPlanner,
    pub classifier: FloatingClassifier,
}

impl TilingState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            planner: LayoutPlanner::new(settings.layout.clone()),
            classifier: FloatingClassifier::new(settings.floating.clone()),
        }
    }
}
