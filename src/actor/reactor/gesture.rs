//! Classifies a pointer press as a click, a drag or a resize.
//!
//! Both drags and resizes start as a press over a window, so the decision
//! is deferred until the window's frame is seen to change. A size change
//! wins immediately; a position change has to persist for several samples
//! before it counts as a drag, which filters out applications nudging their
//! windows by a pixel or two.

use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::common::config::GestureSettings;
use crate::model::{Point, Rect, Window, WindowId};

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub window: WindowId,
    pub original_frame: Rect,
    streak: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragInfo {
    pub window: WindowId,
    pub start: Point,
    pub current: Point,
    /// The window's frame when the drag was recognised.
    pub origin_frame: Rect,
    pub hovered_slot: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeInfo {
    pub window: WindowId,
    pub original_frame: Rect,
    pub press_point: Point,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Pending {
        press_point: Point,
        candidates: Vec<Candidate>,
    },
    Dragging(DragInfo),
    Resizing(ResizeInfo),
}

/// What a gesture amounted to once the pointer was released.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishedGesture {
    Drop { drag: DragInfo, at: Point },
    Resize { resize: ResizeInfo, at: Point },
}

/// Coarse state published to other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureActivity {
    #[default]
    Idle,
    Pending,
    Dragging,
    Resizing,
}

impl GestureActivity {
    /// Whether windows are being moved by the user right now.
    pub fn is_active(self) -> bool {
        matches!(self, GestureActivity::Dragging | GestureActivity::Resizing)
    }
}

pub struct GestureTracker {
    settings: GestureSettings,
    state: GestureState,
}

impl GestureTracker {
    pub fn new(settings: GestureSettings) -> Self {
        Self {
            settings,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> &GestureState { &self.state }

    pub fn activity(&self) -> GestureActivity {
        match self.state {
            GestureState::Idle => GestureActivity::Idle,
            GestureState::Pending { .. } => GestureActivity::Pending,
            GestureState::Dragging(_) => GestureActivity::Dragging,
            GestureState::Resizing(_) => GestureActivity::Resizing,
        }
    }

    /// Windows whose frames should be sampled on the next move.
    pub fn watched_windows(&self) -> Vec<WindowId> {
        match &self.state {
            GestureState::Idle => vec![],
            GestureState::Pending { candidates, .. } => {
                candidates.iter().map(|c| c.window).collect()
            }
            GestureState::Dragging(drag) => vec![drag.window],
            GestureState::Resizing(resize) => vec![resize.window],
        }
    }

    /// Starts tracking every window under `point`. Returns false, staying
    /// idle, when there is none.
    pub fn pointer_down(&mut self, point: Point, windows: &[Window]) -> bool {
        let slop = self.settings.hit_slop;
        let candidates: Vec<Candidate> = windows
            .iter()
            .filter(|w| w.frame.contains_with_slop(point, slop))
            .map(|w| Candidate {
                window: w.id,
                original_frame: w.frame,
                streak: 0,
            })
            .collect();

        if candidates.is_empty() {
            trace!(?point, "press outside any window");
            self.state = GestureState::Idle;
            return false;
        }
        trace!(?point, candidates = candidates.len(), "press");
        self.state = GestureState::Pending {
            press_point: point,
            candidates,
        };
        true
    }

    /// Feeds a pointer sample along with the latest frames of the watched
    /// windows. Windows missing from `live` are assumed gone.
    pub fn pointer_moved(&mut self, point: Point, live: &HashMap<WindowId, Rect>) {
        let threshold = self.settings.move_threshold;
        let required = self.settings.required_move_only_samples.max(1);

        match &mut self.state {
            GestureState::Idle | GestureState::Resizing(_) => {}
            GestureState::Dragging(drag) => drag.current = point,
            GestureState::Pending {
                press_point,
                candidates,
            } => {
                candidates.retain(|c| live.contains_key(&c.window));
                if candidates.is_empty() {
                    debug!("all pressed windows vanished");
                    self.state = GestureState::Idle;
                    return;
                }

                let resized = candidates.iter().find(|c| {
                    let frame = live[&c.window];
                    size_delta(&c.original_frame, &frame) >= threshold
                });
                if let Some(c) = resized {
                    debug!(window = %c.window, "resize recognised");
                    self.state = GestureState::Resizing(ResizeInfo {
                        window: c.window,
                        original_frame: c.original_frame,
                        press_point: *press_point,
                    });
                    return;
                }

                let mut dragged = None;
                for c in candidates.iter_mut() {
                    let frame = live[&c.window];
                    if position_delta(&c.original_frame, &frame) >= threshold {
                        c.streak += 1;
                        if c.streak >= required && dragged.is_none() {
                            dragged = Some((c.window, frame));
                        }
                    } else {
                        c.streak = 0;
                    }
                }
                if let Some((window, frame)) = dragged {
                    debug!(%window, "drag recognised");
                    self.state = GestureState::Dragging(DragInfo {
                        window,
                        start: *press_point,
                        current: point,
                        origin_frame: frame,
                        hovered_slot: None,
                    });
                }
            }
        }
    }

    pub fn set_hovered_slot(&mut self, slot: Option<usize>) {
        if let GestureState::Dragging(drag) = &mut self.state {
            drag.hovered_slot = slot;
        }
    }

    /// Ends the gesture. A press that never became a drag or resize was a
    /// click and yields nothing.
    pub fn pointer_up(&mut self, point: Point) -> Option<FinishedGesture> {
        match std::mem::take(&mut self.state) {
            GestureState::Dragging(mut drag) => {
                drag.current = point;
                Some(FinishedGesture::Drop { drag, at: point })
            }
            GestureState::Resizing(resize) => Some(FinishedGesture::Resize { resize, at: point }),
            GestureState::Idle | GestureState::Pending { .. } => None,
        }
    }

    pub fn reset(&mut self) {
        if self.state != GestureState::Idle {
            debug!("gesture reset");
        }
        self.state = GestureState::Idle;
    }
}

fn size_delta(a: &Rect, b: &Rect) -> f64 {
    (a.size.width - b.size.width).abs().max((a.size.height - b.size.height).abs())
}

fn position_delta(a: &Rect, b: &Rect) -> f64 {
    (a.origin.x - b.origin.x).abs().max((a.origin.y - b.origin.y).abs())
}
