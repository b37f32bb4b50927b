use tracing::trace;

use super::axuielement::{self as ax, AXUIElement, AXUIElementExt};
use super::enhanced_ui;
use crate::model::{Point, Rect, Role, Size, Subrole, Window, WindowTraits, pid_t};
use crate::platform::{AutomationApi, AutomationError, AutomationWindow};

/// [`AutomationApi`] over the accessibility API.
#[derive(Debug, Default)]
pub struct AxAutomation;

impl AxAutomation {
    pub fn new() -> Self { Self }

    /// The element whose window server id is `window.id`.
    fn element_for(&self, window: &Window) -> Result<AXUIElement, AutomationError> {
        ax::application(window.pid)
            .window_elements()?
            .into_iter()
            .find(|element| element.window_server_id().ok() == Some(window.id.get()))
            .ok_or(AutomationError::NotFound)
    }
}

struct AxWindow(AXUIElement);

impl AutomationWindow for AxWindow {
    fn frame(&self) -> Result<Rect, AutomationError> { self.0.current_frame() }

    fn is_size_settable(&self) -> bool { self.0.can_set(ax::SIZE) }

    fn is_position_settable(&self) -> bool { self.0.can_set(ax::POSITION) }

    fn set_size(&self, size: Size) -> Result<(), AutomationError> { self.0.resize_to(size) }

    fn set_position(&self, origin: Point) -> Result<(), AutomationError> {
        self.0.move_to(origin)
    }
}

impl AutomationApi for AxAutomation {
    fn windows_for_process(
        &self,
        pid: pid_t,
    ) -> Result<Vec<Box<dyn AutomationWindow>>, AutomationError> {
        let windows = ax::application(pid).window_elements()?;
        trace!(pid, count = windows.len(), "automation handles");
        Ok(windows
            .into_iter()
            .map(|element| Box::new(AxWindow(element)) as Box<dyn AutomationWindow>)
            .collect())
    }

    fn window_traits(&self, window: &Window) -> Result<WindowTraits, AutomationError> {
        let element = self.element_for(window)?;
        let role = Role::parse(&element.string_value(ax::ROLE)?);
        let subrole = element.string_value(ax::SUBROLE).ok().map(|raw| Subrole::parse(&raw));
        Ok(WindowTraits {
            role,
            subrole,
            position_settable: element.can_set(ax::POSITION),
        })
    }

    fn accelerated_rendering(&self, pid: pid_t) -> Option<bool> { enhanced_ui::get(pid) }

    fn set_accelerated_rendering(&self, pid: pid_t, enabled: bool) -> Result<(), AutomationError> {
        enhanced_ui::set(pid, enabled)
    }
}
