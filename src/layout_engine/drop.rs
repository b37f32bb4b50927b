//! Resolving a finished drag into concrete plans.

use thiserror::Error;
use tracing::debug;

use super::LayoutPlanner;
use super::plan::LayoutPlan;
use crate::model::geometry::SameAs;
use crate::model::{Window, WindowId};
use crate::platform::DisplayService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropError {
    #[error("dragged window {0} is no longer on screen")]
    MissingWindow(WindowId),
    #[error("no plan covers the drop location")]
    MissingPlan,
    #[error("slot {0} does not exist in the drop plan")]
    MissingDestination(usize),
}

#[derive(Debug, Clone)]
pub struct DropResolution {
    /// The plan for the drop scope followed by plans for every other scope.
    pub plans: Vec<LayoutPlan>,
    /// False when the drop would leave every window where it already is.
    pub should_apply: bool,
    pub displaced: Option<WindowId>,
}

impl LayoutPlanner {
    /// Places `dragged` into `destination` of `preview`.
    ///
    /// A window already occupying the destination moves to the slot the
    /// preview reserved for the dragged window, or to the first free slot if
    /// the destination is that reserved slot. Scopes other than the drop
    /// scope are re-planned without the dragged window.
    pub fn resolve_drop(
        &self,
        preview: &LayoutPlan,
        dragged: WindowId,
        destination: usize,
        all_windows: &[Window],
        displays: &dyn DisplayService,
    ) -> Result<DropResolution, DropError> {
        if destination >= preview.slots.len() {
            return Err(DropError::MissingDestination(destination));
        }
        let dragged_window = all_windows
            .iter()
            .find(|w| w.id == dragged)
            .ok_or(DropError::MissingWindow(dragged))?;

        let mut plan = preview.clone();
        let gap = plan.reserved_slot;
        let mut moved = dragged_window.clone();
        moved.display = plan.scope.display;
        moved.workspace = plan.scope.workspace;
        plan.windows.retain(|w| w.id != dragged);
        plan.windows.push(moved);

        let displaced = plan.place(dragged, destination);
        if let Some(displaced) = displaced {
            let fallback = gap.filter(|g| *g != destination).or_else(|| plan.free_slots().next());
            match fallback {
                Some(slot) => {
                    plan.place(displaced, slot);
                }
                None => debug!(window = %displaced, "no free slot for displaced window"),
            }
        }
        plan.reserved_slot = None;

        let tolerance = self.settings.frame_tolerance;
        let should_apply = displaced.is_some()
            || !dragged_window.frame.same_as(&plan.slots[destination], tolerance);

        let remaining: Vec<Window> = all_windows.iter().filter(|w| w.id != dragged).cloned().collect();
        let scope = plan.scope;
        let mut plans = vec![plan];
        plans.extend(
            self.build_reflow_plans(&remaining, displays)
                .into_iter()
                .filter(|p| p.scope != scope),
        );

        debug!(window = %dragged, destination, ?displaced, should_apply, "drop resolved");
        Ok(DropResolution {
            plans,
            should_apply,
            displaced,
        })
    }
}
