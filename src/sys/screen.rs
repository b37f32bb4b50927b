use objc2::{ClassType, msg_send};
use objc2_app_kit::NSScreen;
use objc2_core_foundation::CGRect;
use objc2_foundation::{MainThreadMarker, NSNumber, ns_string};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::common::collections::HashMap;
use crate::model::{DisplayId, Point, Rect, WindowId, WorkspaceId};
use crate::platform::DisplayService;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenInfo {
    pub id: DisplayId,
    /// Full frame in accessibility coordinates.
    pub frame: Rect,
    /// Frame minus the menu bar and dock.
    pub visible: Rect,
}

/// AppKit reports screens with a bottom-left origin on the main screen;
/// the accessibility API uses a top-left one.
fn to_accessibility(rect: CGRect, main_height: f64) -> Rect {
    Rect::new(
        rect.origin.x,
        main_height - (rect.origin.y + rect.size.height),
        rect.size.width,
        rect.size.height,
    )
}

/// Converts raw AppKit frames, main screen first, into [`ScreenInfo`]s.
fn screens_from_frames(raw: &[(DisplayId, CGRect, CGRect)]) -> Vec<ScreenInfo> {
    let Some((_, main, _)) = raw.first() else {
        return vec![];
    };
    let main_height = main.size.height;
    raw.iter()
        .map(|&(id, frame, visible)| ScreenInfo {
            id,
            frame: to_accessibility(frame, main_height),
            visible: to_accessibility(visible, main_height),
        })
        .collect()
}

/// [`DisplayService`] over `NSScreen`.
///
/// Screens can only be enumerated on the main thread, so the service keeps
/// the last snapshot and the main loop calls [`ScreenService::refresh`].
/// Each display has exactly one workspace, identified by the display id.
#[derive(Debug, Default)]
pub struct ScreenService {
    screens: RwLock<Vec<ScreenInfo>>,
    placements: RwLock<HashMap<WindowId, WorkspaceId>>,
}

impl ScreenService {
    pub fn new(mtm: MainThreadMarker) -> Self {
        let service = Self::default();
        service.refresh(mtm);
        service
    }

    /// Returns whether the screen configuration changed.
    pub fn refresh(&self, mtm: MainThreadMarker) -> bool {
        let raw: Vec<_> = NSScreen::screens(mtm)
            .iter()
            .filter_map(|screen| Some((screen_number(&screen)?, screen.frame(), screen.visibleFrame())))
            .collect();
        self.replace(screens_from_frames(&raw))
    }

    fn replace(&self, screens: Vec<ScreenInfo>) -> bool {
        let mut current = self.screens.write();
        if *current == screens {
            return false;
        }
        debug!(?screens, "screen configuration changed");
        *current = screens;
        true
    }

    pub fn screens(&self) -> Vec<ScreenInfo> { self.screens.read().clone() }

    /// Remembers where discovery last saw each window; earlier placements
    /// are forgotten.
    pub fn record_placements(&self, windows: impl IntoIterator<Item = (WindowId, WorkspaceId)>) {
        let placements: HashMap<_, _> = windows.into_iter().collect();
        *self.placements.write() = placements;
    }
}

impl DisplayService for ScreenService {
    fn display_at(&self, point: Point) -> Option<DisplayId> {
        self.screens.read().iter().find(|s| s.frame.contains(point)).map(|s| s.id)
    }

    fn display_for_rect(&self, rect: Rect) -> Option<DisplayId> {
        self.screens
            .read()
            .iter()
            .map(|s| (s.id, s.frame.intersection(&rect).area()))
            .filter(|(_, area)| *area > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn visible_bounds(&self, display: DisplayId) -> Option<Rect> {
        self.screens.read().iter().find(|s| s.id == display).map(|s| s.visible)
    }

    fn current_workspace(&self, display: DisplayId) -> Option<WorkspaceId> {
        self.screens
            .read()
            .iter()
            .any(|s| s.id == display)
            .then(|| WorkspaceId::new(u64::from(display.get())))
    }

    fn workspace_for_window(&self, window: WindowId) -> Option<WorkspaceId> {
        self.placements.read().get(&window).copied()
    }
}

fn screen_number(screen: &NSScreen) -> Option<DisplayId> {
    let desc = screen.deviceDescription();
    match desc.objectForKey(ns_string!("NSScreenNumber")) {
        Some(val) if unsafe { msg_send![&*val, isKindOfClass: NSNumber::class()] } => {
            let number: &NSNumber = unsafe { &*(&*val as *const _ as *const NSNumber) };
            Some(DisplayId::new(number.as_u32()))
        }
        val => {
            warn!(name = ?screen.localizedName(), ?val, "screen has no NSScreenNumber");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use objc2_core_foundation::{CGPoint, CGSize};
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn cg(x: f64, y: f64, w: f64, h: f64) -> CGRect {
        CGRect::new(CGPoint::new(x, y), CGSize::new(w, h))
    }

    fn two_screens() -> ScreenService {
        let service = ScreenService::default();
        service.replace(screens_from_frames(&[
            (DisplayId::new(1), cg(0.0, 0.0, 1440.0, 900.0), cg(0.0, 70.0, 1440.0, 805.0)),
            (DisplayId::new(2), cg(1440.0, 100.0, 1920.0, 1080.0), cg(1440.0, 100.0, 1920.0, 1080.0)),
        ]));
        service
    }

    #[test]
    fn frames_flip_to_top_left_origin() {
        let service = two_screens();
        let screens = service.screens();
        assert_eq!(screens[0].frame, Rect::new(0.0, 0.0, 1440.0, 900.0));
        // 25pt menu bar on top, 70pt dock at the bottom.
        assert_eq!(screens[0].visible, Rect::new(0.0, 25.0, 1440.0, 805.0));
        assert_eq!(screens[1].frame, Rect::new(1440.0, -280.0, 1920.0, 1080.0));
    }

    #[test]
    fn windows_belong_to_the_display_they_overlap_most() {
        let service = two_screens();
        let rect = Rect::new(1300.0, 100.0, 400.0, 300.0);
        assert_eq!(service.display_for_rect(rect), Some(DisplayId::new(2)));
        assert_eq!(service.display_at(Point::new(10.0, 10.0)), Some(DisplayId::new(1)));
        assert_eq!(service.display_at(Point::new(-10.0, 10.0)), None);
    }

    #[test]
    fn one_workspace_per_display() {
        let service = two_screens();
        assert_eq!(service.current_workspace(DisplayId::new(2)), Some(WorkspaceId::new(2)));
        assert_eq!(service.current_workspace(DisplayId::new(3)), None);
    }

    #[test]
    fn unchanged_configuration_is_not_a_change() {
        let service = two_screens();
        let screens = service.screens();
        assert!(!service.replace(screens));
        assert!(service.replace(vec![]));
    }
}
