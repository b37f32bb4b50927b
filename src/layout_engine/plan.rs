use serde::{Deserialize, Serialize};

use super::assign::assign_windows_to_nearest_slots;
use crate::common::collections::{BTreeMap, HashMap};
use crate::model::geometry::SameAs;
use crate::model::{DisplayId, Point, Rect, Window, WindowId, WorkspaceId};

/// The unit a layout is computed for: one display showing one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub display: DisplayId,
    pub workspace: Option<WorkspaceId>,
}

/// Slots for one scope and the windows assigned to them.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub scope: ScopeKey,
    pub bounds: Rect,
    pub slots: Vec<Rect>,
    assignments: BTreeMap<usize, WindowId>,
    slot_of: HashMap<WindowId, usize>,
    pub windows: Vec<Window>,
    /// The slot left empty for a window being dragged in.
    pub reserved_slot: Option<usize>,
}

impl LayoutPlan {
    /// Assigns `windows` to `slots` by proximity. When there are more slots
    /// than windows the first empty one is reserved.
    pub fn new(scope: ScopeKey, bounds: Rect, slots: Vec<Rect>, windows: Vec<Window>) -> Self {
        let mut plan = LayoutPlan {
            scope,
            bounds,
            slots,
            assignments: BTreeMap::new(),
            slot_of: HashMap::default(),
            windows,
            reserved_slot: None,
        };
        for (slot, window) in assign_windows_to_nearest_slots(&plan.slots, &plan.windows) {
            plan.place(window, slot);
        }
        let reserved = plan.free_slots().next();
        plan.reserved_slot = reserved;
        plan
    }

    pub fn window_in(&self, slot: usize) -> Option<WindowId> { self.assignments.get(&slot).copied() }

    pub fn slot_for(&self, window: WindowId) -> Option<usize> { self.slot_of.get(&window).copied() }

    pub fn window(&self, id: WindowId) -> Option<&Window> { self.windows.iter().find(|w| w.id == id) }

    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.slots.len()).filter(|slot| !self.assignments.contains_key(slot))
    }

    /// Puts `window` into `slot`, evicting whatever was there. Returns the
    /// evicted window, which is left unassigned.
    pub(crate) fn place(&mut self, window: WindowId, slot: usize) -> Option<WindowId> {
        if let Some(previous) = self.slot_of.remove(&window) {
            self.assignments.remove(&previous);
        }
        let evicted = self.assignments.insert(slot, window);
        if let Some(evicted) = evicted {
            self.slot_of.remove(&evicted);
        }
        self.slot_of.insert(window, slot);
        if self.reserved_slot == Some(slot) {
            self.reserved_slot = None;
        }
        evicted.filter(|e| *e != window)
    }

    /// Target frame for every assigned window.
    pub fn target_frames(&self) -> BTreeMap<WindowId, Rect> {
        self.assignments.iter().map(|(slot, window)| (*window, self.slots[*slot])).collect()
    }

    /// True when every assigned window already sits on its slot.
    pub fn is_noop(&self, tolerance: f64) -> bool {
        self.assignments.iter().all(|(slot, id)| {
            self.window(*id).is_some_and(|w| w.frame.same_as(&self.slots[*slot], tolerance))
        })
    }
}

/// The slot under `at`, or the nearest one when `at` falls in a gap or
/// outside the plan.
pub fn slot_index(at: Point, plan: &LayoutPlan) -> Option<usize> {
    if let Some(slot) = plan.slots.iter().position(|s| s.contains(at)) {
        return Some(slot);
    }
    plan.slots
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.clamped_distance(at)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(i, _)| i)
}
