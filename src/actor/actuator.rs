//! Applies target frames to live windows through the automation API.

use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::common::collections::{BTreeMap, HashMap};
use crate::common::config::ActuatorSettings;
use crate::common::log::timed;
use crate::model::geometry::SameAs;
use crate::model::{Rect, Window, WindowId, pid_t};
use crate::platform::{AutomationApi, AutomationError, AutomationWindow};

/// Per-window outcome of an apply. Every target ends up in exactly one list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<WindowId>,
    pub unchanged: Vec<WindowId>,
    /// No live handle, an attribute that cannot be set, or a rejected write.
    pub failed: Vec<WindowId>,
    /// Written, but the application kept the window off target.
    pub clamped: Vec<WindowId>,
}

impl ApplyReport {
    fn sort(&mut self) {
        self.applied.sort();
        self.unchanged.sort();
        self.failed.sort();
        self.clamped.sort();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Unchanged,
    Applied,
    Clamped(Rect),
    Failed(AutomationError),
}

pub struct FrameActuator {
    automation: Arc<dyn AutomationApi>,
    settings: ActuatorSettings,
}

impl FrameActuator {
    pub fn new(automation: Arc<dyn AutomationApi>, settings: ActuatorSettings) -> Self {
        Self { automation, settings }
    }

    /// Moves every window in `targets` to its frame. `windows` supplies the
    /// owning process and last known frame used to find the live handle.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub fn apply(
        &self,
        targets: &BTreeMap<WindowId, Rect>,
        windows: &HashMap<WindowId, Window>,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut by_pid: BTreeMap<pid_t, Vec<(&Window, Rect)>> = BTreeMap::new();
        for (id, target) in targets {
            match windows.get(id) {
                Some(window) => by_pid.entry(window.pid).or_default().push((window, *target)),
                None => {
                    warn!(window = %id, "no snapshot for target window");
                    report.failed.push(*id);
                }
            }
        }

        for (pid, batch) in by_pid {
            timed("apply_process", || self.apply_process(pid, &batch, &mut report));
        }

        report.sort();
        if !report.failed.is_empty() || !report.clamped.is_empty() {
            warn!(failed = ?report.failed, clamped = ?report.clamped, "some windows missed their frames");
        }
        debug!(applied = report.applied.len(), unchanged = report.unchanged.len(), "apply finished");
        report
    }

    fn apply_process(&self, pid: pid_t, batch: &[(&Window, Rect)], report: &mut ApplyReport) {
        let handles = match self.automation.windows_for_process(pid) {
            Ok(handles) => handles,
            Err(err) => {
                warn!(pid, %err, "cannot reach process windows");
                report.failed.extend(batch.iter().map(|(w, _)| w.id));
                return;
            }
        };
        let resolved = resolve_handles(&handles, batch);

        let restore = self.settings.disable_accelerated_rendering
            && self.automation.accelerated_rendering(pid) == Some(true);
        if restore {
            if let Err(err) = self.automation.set_accelerated_rendering(pid, false) {
                debug!(pid, %err, "could not disable accelerated rendering");
            }
        }

        for ((window, target), handle) in batch.iter().zip(resolved) {
            let Some(handle) = handle else {
                warn!(window = %window.id, "no live handle matches window");
                report.failed.push(window.id);
                continue;
            };
            match self.apply_one(handles[handle].as_ref(), *target) {
                Outcome::Unchanged => report.unchanged.push(window.id),
                Outcome::Applied => report.applied.push(window.id),
                Outcome::Clamped(actual) => {
                    debug!(window = %window.id, ?target, ?actual, "window clamped its frame");
                    report.clamped.push(window.id);
                }
                Outcome::Failed(err) => {
                    warn!(window = %window.id, %err, "frame write failed");
                    report.failed.push(window.id);
                }
            }
        }

        if restore {
            if let Err(err) = self.automation.set_accelerated_rendering(pid, true) {
                debug!(pid, %err, "could not restore accelerated rendering");
            }
        }
    }

    fn apply_one(&self, handle: &dyn AutomationWindow, target: Rect) -> Outcome {
        let size_tolerance = self.settings.size_tolerance;
        let position_tolerance = self.settings.position_tolerance;
        let mut wrote = false;

        for attempt in 0..self.settings.max_attempts.max(1) {
            let current = match handle.frame() {
                Ok(frame) => frame,
                Err(err) => return Outcome::Failed(err),
            };
            let size_ok = current.size.same_as(&target.size, size_tolerance);
            let position_ok = current.origin.same_as(&target.origin, position_tolerance);
            if size_ok && position_ok {
                return if wrote { Outcome::Applied } else { Outcome::Unchanged };
            }
            if !size_ok && !handle.is_size_settable() {
                return Outcome::Failed(AutomationError::NotSettable("size"));
            }
            if !position_ok && !handle.is_position_settable() {
                return Outcome::Failed(AutomationError::NotSettable("position"));
            }

            trace!(attempt, ?current, ?target, "writing frame");
            // Size first so the position is not clamped against the old size,
            // then size again in case the move changed what the app allows.
            let result = (|| {
                if !size_ok {
                    handle.set_size(target.size)?;
                }
                if !position_ok {
                    handle.set_position(target.origin)?;
                }
                if !size_ok && !position_ok {
                    handle.set_size(target.size)?;
                }
                Ok(())
            })();
            if let Err(err) = result {
                return Outcome::Failed(err);
            }
            wrote = true;
        }

        match handle.frame() {
            Ok(actual)
                if actual.size.same_as(&target.size, size_tolerance)
                    && actual.origin.same_as(&target.origin, position_tolerance) =>
            {
                Outcome::Applied
            }
            Ok(actual) => Outcome::Clamped(actual),
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Pairs each window of `batch` with the unused live handle whose frame is
/// closest to the window's last known frame.
fn resolve_handles(handles: &[Box<dyn AutomationWindow>], batch: &[(&Window, Rect)]) -> Vec<Option<usize>> {
    let frames: Vec<Option<Rect>> = handles.iter().map(|h| h.frame().ok()).collect();
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, (window, _)) in batch.iter().enumerate() {
        for (h, frame) in frames.iter().enumerate() {
            if let Some(frame) = frame {
                let distance = frame.center_distance(&window.frame)
                    + (frame.size.width - window.frame.size.width).abs()
                    + (frame.size.height - window.frame.size.height).abs();
                pairs.push((distance, i, h));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut resolved = vec![None; batch.len()];
    let mut used = vec![false; handles.len()];
    for (_, i, h) in pairs {
        if resolved[i].is_none() && !used[h] {
            resolved[i] = Some(h);
            used[h] = true;
        }
    }
    resolved
}
