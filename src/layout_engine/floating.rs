//! Decides which windows take part in tiling.

use crate::common::collections::{HashMap, HashSet};
use crate::common::config::FloatingSettings;
use crate::model::{Window, WindowId, WindowTraits};
use crate::platform::{AutomationApi, RuleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatReason {
    UserOverride,
    ExcludedBundle,
    ExcludedApp,
    ExcludedType,
    Role,
    NotMovable,
    TooSmall,
    DialogLike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Tiled,
    Floating(FloatReason),
}

impl Classification {
    pub fn is_floating(&self) -> bool { matches!(self, Classification::Floating(_)) }
}

pub struct FloatingClassifier {
    settings: FloatingSettings,
    forced_floating: HashSet<WindowId>,
    forced_tiled: HashSet<WindowId>,
    traits: HashMap<WindowId, WindowTraits>,
    last: HashMap<WindowId, Classification>,
}

impl FloatingClassifier {
    pub fn new(settings: FloatingSettings) -> Self {
        Self {
            settings,
            forced_floating: HashSet::default(),
            forced_tiled: HashSet::default(),
            traits: HashMap::default(),
            last: HashMap::default(),
        }
    }

    /// Classifies `window` from the rules and the cached traits. Windows
    /// without cached traits are treated as standard windows; see
    /// [`FloatingClassifier::missing_traits`].
    pub fn classify(&mut self, window: &Window, rules: &dyn RuleStore) -> Classification {
        let class = self
            .rule_verdict(window, rules)
            .unwrap_or_else(|| self.trait_verdict(window, rules));
        self.last.insert(window.id, class);
        class
    }

    /// The verdict that does not need the automation API, if any.
    fn rule_verdict(&self, window: &Window, rules: &dyn RuleStore) -> Option<Classification> {
        use Classification::*;

        if self.forced_floating.contains(&window.id) {
            return Some(Floating(FloatReason::UserOverride));
        }
        if self.forced_tiled.contains(&window.id) {
            return Some(Tiled);
        }
        if window.bundle_id.as_deref().is_some_and(|b| rules.is_bundle_excluded(b)) {
            return Some(Floating(FloatReason::ExcludedBundle));
        }
        if rules.is_app_forced_floating(&window.app_name) {
            return Some(Floating(FloatReason::ExcludedApp));
        }
        None
    }

    fn trait_verdict(&self, window: &Window, rules: &dyn RuleStore) -> Classification {
        use Classification::*;

        let traits = self.traits.get(&window.id).cloned().unwrap_or_else(WindowTraits::standard);
        let type_excluded = rules.is_type_forced_floating(traits.role.as_str())
            || traits.subrole.as_ref().is_some_and(|s| rules.is_type_forced_floating(s.as_str()))
            || rules.is_type_forced_floating(&traits.descriptor());
        if type_excluded {
            return Floating(FloatReason::ExcludedType);
        }

        if traits.role.is_always_floating()
            || traits.subrole.as_ref().is_some_and(|s| s.is_always_floating())
        {
            return Floating(FloatReason::Role);
        }
        if !traits.position_settable {
            return Floating(FloatReason::NotMovable);
        }

        let size = window.frame.size;
        if size.width < self.settings.min_width || size.height < self.settings.min_height {
            return Floating(FloatReason::TooSmall);
        }
        if window.title.trim().is_empty()
            && size.width <= self.settings.dialog_max_width
            && size.height <= self.settings.dialog_max_height
        {
            return Floating(FloatReason::DialogLike);
        }

        Tiled
    }

    /// Windows whose classification depends on traits that are not cached
    /// yet. Query them with [`fetch_traits`] without holding any lock, then
    /// hand the result to [`FloatingClassifier::record_traits`].
    pub fn missing_traits<'a>(
        &self,
        windows: &'a [Window],
        rules: &dyn RuleStore,
    ) -> Vec<&'a Window> {
        windows
            .iter()
            .filter(|w| !self.traits.contains_key(&w.id))
            .filter(|w| self.rule_verdict(w, rules).is_none())
            .collect()
    }

    pub fn record_traits(&mut self, fetched: impl IntoIterator<Item = (WindowId, WindowTraits)>) {
        self.traits.extend(fetched);
    }

    /// Splits `windows` into the ones to tile and the ids of the floating
    /// ones, preserving order.
    pub fn partition(
        &mut self,
        windows: Vec<Window>,
        rules: &dyn RuleStore,
    ) -> (Vec<Window>, Vec<WindowId>) {
        let mut tiled = Vec::with_capacity(windows.len());
        let mut floating = Vec::new();
        for window in windows {
            match self.classify(&window, rules) {
                Classification::Tiled => tiled.push(window),
                Classification::Floating(reason) => {
                    tracing::trace!(window = %window.id, ?reason, "floating");
                    floating.push(window.id);
                }
            }
        }
        (tiled, floating)
    }

    /// Forgets cached traits and overrides of windows not in `live`.
    pub fn prune(&mut self, live: &HashSet<WindowId>) {
        self.traits.retain(|id, _| live.contains(id));
        self.last.retain(|id, _| live.contains(id));
        self.forced_floating.retain(|id| live.contains(id));
        self.forced_tiled.retain(|id| live.contains(id));
    }

    /// Flips the user override for `window`. Returns whether it now floats.
    pub fn toggle(&mut self, window: WindowId, currently_floating: bool) -> bool {
        if currently_floating {
            self.forced_floating.remove(&window);
            self.forced_tiled.insert(window);
        } else {
            self.forced_tiled.remove(&window);
            self.forced_floating.insert(window);
        }
        !currently_floating
    }

    /// The verdict from the most recent classification of `window`.
    pub fn is_floating(&self, window: WindowId) -> bool {
        self.last.get(&window).is_some_and(|c| c.is_floating())
    }
}

/// Asks the automation API for the traits of `windows`. Failures are
/// logged and left out so the next snapshot asks again.
pub fn fetch_traits(
    windows: &[&Window],
    automation: &dyn AutomationApi,
) -> Vec<(WindowId, WindowTraits)> {
    windows
        .iter()
        .filter_map(|window| match automation.window_traits(window) {
            Ok(traits) => Some((window.id, traits)),
            Err(err) => {
                tracing::debug!(window = %window.id, %err, "window traits unavailable");
                None
            }
        })
        .collect()
}
