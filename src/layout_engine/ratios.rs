//! Adaptive master/stack proportions, remembered per scope.

use super::plan::{LayoutPlan, ScopeKey};
use crate::common::collections::HashMap;
use crate::common::config::LayoutSettings;
use crate::model::{Rect, WindowId};

pub const MIN_MASTER_RATIO: f64 = 0.2;
pub const MAX_MASTER_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeRatios {
    pub master_ratio: f64,
    /// Relative row heights of the stack pane. Ignored when the row count
    /// no longer matches.
    pub stack_weights: Vec<f64>,
}

impl ScopeRatios {
    pub fn new(master_ratio: f64) -> Self {
        Self {
            master_ratio,
            stack_weights: vec![],
        }
    }

    /// The master ratio clamped to its allowed range, further narrowed so
    /// both panes keep `min_extent` when `width` allows it.
    pub fn clamped_master_ratio(&self, width: f64, min_extent: f64) -> f64 {
        let mut lo = MIN_MASTER_RATIO;
        let mut hi = MAX_MASTER_RATIO;
        if width > 0.0 && width >= 2.0 * min_extent {
            lo = lo.max(min_extent / width);
            hi = hi.min(1.0 - min_extent / width);
        }
        let ratio = if self.master_ratio.is_finite() { self.master_ratio } else { 0.5 };
        ratio.clamp(lo, hi.max(lo))
    }
}

/// Weights scaled to sum to one. Anything unusable (wrong length, negative,
/// non-finite, all zero) yields equal weights.
pub(crate) fn normalized_weights(weights: &[f64], count: usize) -> Vec<f64> {
    if count == 0 {
        return vec![];
    }
    let equal = || vec![1.0 / count as f64; count];
    if weights.len() != count || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return equal();
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return equal();
    }
    weights.iter().map(|w| w / sum).collect()
}

/// Where a resized window sits in the layout it was tiled by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeTarget {
    pub scope: ScopeKey,
    pub bounds: Rect,
    pub slot: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSample {
    pub window: WindowId,
    pub original_frame: Rect,
    pub current_frame: Rect,
}

#[derive(Debug, Clone)]
struct ResizeBaseline {
    window: WindowId,
    target: ResizeTarget,
    ratios: ScopeRatios,
}

#[derive(Debug)]
pub struct RatioStore {
    default_master_ratio: f64,
    scopes: HashMap<ScopeKey, ScopeRatios>,
    baseline: Option<ResizeBaseline>,
}

impl RatioStore {
    pub fn new(default_master_ratio: f64) -> Self {
        Self {
            default_master_ratio,
            scopes: HashMap::default(),
            baseline: None,
        }
    }

    pub fn get(&self, scope: ScopeKey) -> ScopeRatios {
        self.scopes
            .get(&scope)
            .cloned()
            .unwrap_or_else(|| ScopeRatios::new(self.default_master_ratio))
    }

    pub fn is_resizing(&self) -> bool { self.baseline.is_some() }

    /// The target captured by the first sample of the resize in progress.
    pub fn resize_target(&self, window: WindowId) -> Option<ResizeTarget> {
        self.baseline.as_ref().filter(|b| b.window == window).map(|b| b.target)
    }

    /// Infers proportions from where the user left the windows of `plan`.
    pub(crate) fn observe_idle(&mut self, plan: &LayoutPlan, settings: &LayoutSettings) {
        let count = plan.slots.len();
        if count < 2 {
            return;
        }
        let Some(master) = plan.window_in(0).and_then(|id| plan.window(id)) else {
            return;
        };

        let bounds = plan.bounds;
        let margin = settings.slot_margin;
        let mut ratios = self.get(plan.scope);
        ratios.master_ratio = if bounds.size.width > 0.0 {
            (master.frame.max_x() + margin - bounds.min_x()) / bounds.size.width
        } else {
            self.default_master_ratio
        };
        ratios.master_ratio = ratios.clamped_master_ratio(bounds.size.width, settings.min_extent);

        let heights: Option<Vec<f64>> = (1..count)
            .map(|slot| {
                let id = plan.window_in(slot)?;
                plan.window(id).map(|w| w.frame.size.height.max(0.0) + 2.0 * margin)
            })
            .collect();
        if let Some(heights) = heights {
            ratios.stack_weights = normalized_weights(&heights, count - 1);
        }

        tracing::trace!(scope = ?plan.scope, ratio = ratios.master_ratio, "ratios inferred");
        self.scopes.insert(plan.scope, ratios);
    }

    /// Moves only the boundary the resized window dragged, relative to the
    /// proportions captured at the first sample of the gesture.
    pub(crate) fn observe_resize(
        &mut self,
        target: ResizeTarget,
        sample: &ResizeSample,
        settings: &LayoutSettings,
    ) {
        let stale = match &self.baseline {
            Some(b) => b.window != sample.window || b.target.scope != target.scope,
            None => true,
        };
        if stale {
            let current = self.get(target.scope);
            self.baseline = Some(ResizeBaseline {
                window: sample.window,
                target,
                ratios: ScopeRatios {
                    master_ratio: current
                        .clamped_master_ratio(target.bounds.size.width, settings.min_extent),
                    stack_weights: normalized_weights(&current.stack_weights, target.rows),
                },
            });
        }
        let Some(baseline) = &self.baseline else { return };

        let original = sample.original_frame;
        let current = sample.current_frame;
        let bounds = baseline.target.bounds;
        let slot = baseline.target.slot;
        let mut ratios = baseline.ratios.clone();
        let width = bounds.size.width;

        if slot == 0 {
            if width > 0.0 {
                ratios.master_ratio += (current.max_x() - original.max_x()) / width;
            }
        } else {
            if width > 0.0 {
                ratios.master_ratio += (current.min_x() - original.min_x()) / width;
            }
            let row = slot - 1;
            let rows = baseline.target.rows;
            let height = bounds.size.height;
            let mut extents: Vec<f64> = ratios.stack_weights.iter().map(|w| w * height).collect();

            let top = current.min_y() - original.min_y();
            if row > 0 && top != 0.0 {
                move_boundary(&mut extents, row - 1, top, settings.min_extent);
            }
            let bottom = current.max_y() - original.max_y();
            if row + 1 < rows && bottom != 0.0 {
                move_boundary(&mut extents, row, bottom, settings.min_extent);
            }
            ratios.stack_weights = normalized_weights(&extents, rows);
        }

        ratios.master_ratio = ratios.clamped_master_ratio(width, settings.min_extent);
        let scope = baseline.target.scope;
        tracing::trace!(?scope, slot, ratio = ratios.master_ratio, "ratios adjusted by resize");
        self.scopes.insert(scope, ratios);
    }

    pub fn finish_resize(&mut self) { self.baseline = None; }
}

/// Shifts the boundary below `upper` by `delta`, growing `upper` and
/// shrinking the row after it, without taking either below `min`.
fn move_boundary(extents: &mut [f64], upper: usize, delta: f64, min: f64) {
    let lower = upper + 1;
    if lower >= extents.len() || !delta.is_finite() {
        return;
    }
    let (a, b) = (extents[upper], extents[lower]);
    if a + b < 2.0 * min {
        return;
    }
    let delta = delta.clamp(min - a, b - min);
    extents[upper] = a + delta;
    extents[lower] = b - delta;
}
