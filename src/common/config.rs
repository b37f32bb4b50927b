use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::platform::{RuleProvider, RuleStore};

pub fn config_file() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tessera.toml")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rules: RuleSet,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Start with tiling active. Gestures and reflows are ignored while
    /// disabled.
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub gesture: GestureSettings,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
    #[serde(default)]
    pub stabilization: StabilizationSettings,
    #[serde(default)]
    pub actuator: ActuatorSettings,
    #[serde(default)]
    pub floating: FloatingSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Inset applied to every slot on all four sides.
    #[serde(default = "default_slot_margin")]
    pub slot_margin: f64,
    /// Smallest extent a master/stack pane or a stack row may shrink to.
    #[serde(default = "default_min_extent")]
    pub min_extent: f64,
    #[serde(default = "default_master_ratio")]
    pub default_master_ratio: f64,
    /// Two frames closer than this on every edge are considered equal.
    #[serde(default = "default_frame_tolerance")]
    pub frame_tolerance: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GestureSettings {
    /// Extra pixels around a window that still count as a hit on press.
    #[serde(default = "default_hit_slop")]
    pub hit_slop: f64,
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,
    /// Consecutive move-only samples needed before a press becomes a drag.
    #[serde(default = "default_required_move_only_samples")]
    pub required_move_only_samples: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LifecycleSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StabilizationSettings {
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_stable_samples")]
    pub stable_samples: u32,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActuatorSettings {
    #[serde(default = "default_actuator_tolerance")]
    pub size_tolerance: f64,
    #[serde(default = "default_actuator_tolerance")]
    pub position_tolerance: f64,
    /// Write passes per window before giving up on convergence.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "yes")]
    pub disable_accelerated_rendering: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FloatingSettings {
    #[serde(default = "default_min_width")]
    pub min_width: f64,
    #[serde(default = "default_min_height")]
    pub min_height: f64,
    /// Untitled windows smaller than this are treated as dialogs.
    #[serde(default = "default_dialog_max_width")]
    pub dialog_max_width: f64,
    #[serde(default = "default_dialog_max_height")]
    pub dialog_max_height: f64,
}

/// User rules read from the `[rules]` table.
///
/// Bundle entries ending in `.` match every bundle id with that prefix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    #[serde(default)]
    pub floating_apps: Vec<String>,
    #[serde(default)]
    pub floating_types: Vec<String>,
    #[serde(default)]
    pub excluded_bundles: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            layout: LayoutSettings::default(),
            gesture: GestureSettings::default(),
            lifecycle: LifecycleSettings::default(),
            stabilization: StabilizationSettings::default(),
            actuator: ActuatorSettings::default(),
            floating: FloatingSettings::default(),
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            slot_margin: default_slot_margin(),
            min_extent: default_min_extent(),
            default_master_ratio: default_master_ratio(),
            frame_tolerance: default_frame_tolerance(),
        }
    }
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            hit_slop: default_hit_slop(),
            move_threshold: default_move_threshold(),
            required_move_only_samples: default_required_move_only_samples(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

impl Default for StabilizationSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_probe_interval_ms(),
            stable_samples: default_stable_samples(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            size_tolerance: default_actuator_tolerance(),
            position_tolerance: default_actuator_tolerance(),
            max_attempts: default_max_attempts(),
            disable_accelerated_rendering: true,
        }
    }
}

impl Default for FloatingSettings {
    fn default() -> Self {
        Self {
            min_width: default_min_width(),
            min_height: default_min_height(),
            dialog_max_width: default_dialog_max_width(),
            dialog_max_height: default_dialog_max_height(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.layout.validate());
        issues.extend(self.gesture.validate());
        issues.extend(self.stabilization.validate());
        issues.extend(self.actuator.validate());
        issues.extend(self.floating.validate());
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        self.layout.auto_fix_values()
            + self.gesture.auto_fix_values()
            + self.stabilization.auto_fix_values()
            + self.actuator.auto_fix_values()
            + self.floating.auto_fix_values()
    }
}

/// False for negative values, NaN and infinities.
fn is_non_negative(value: f64) -> bool { value.is_finite() && value >= 0.0 }

fn is_positive(value: f64) -> bool { value.is_finite() && value > 0.0 }

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !is_non_negative(self.slot_margin) {
            issues.push(format!("slot_margin must be non-negative, got {}", self.slot_margin));
        }

        if !is_non_negative(self.min_extent) {
            issues.push(format!("min_extent must be non-negative, got {}", self.min_extent));
        }

        if !(0.2..=0.8).contains(&self.default_master_ratio) {
            issues.push(format!(
                "default_master_ratio must be within [0.2, 0.8], got {}",
                self.default_master_ratio
            ));
        }

        if !is_non_negative(self.frame_tolerance) {
            issues.push(format!(
                "frame_tolerance must be non-negative, got {}",
                self.frame_tolerance
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !is_non_negative(self.slot_margin) {
            self.slot_margin = default_slot_margin();
            fixes += 1;
        }

        if !is_non_negative(self.min_extent) {
            self.min_extent = default_min_extent();
            fixes += 1;
        }

        if !(0.2..=0.8).contains(&self.default_master_ratio) {
            self.default_master_ratio = if self.default_master_ratio.is_finite() {
                self.default_master_ratio.clamp(0.2, 0.8)
            } else {
                default_master_ratio()
            };
            fixes += 1;
        }

        if !is_non_negative(self.frame_tolerance) {
            self.frame_tolerance = default_frame_tolerance();
            fixes += 1;
        }

        fixes
    }
}

impl GestureSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !is_non_negative(self.hit_slop) {
            issues.push(format!("hit_slop must be non-negative, got {}", self.hit_slop));
        }

        if !is_positive(self.move_threshold) {
            issues.push(format!("move_threshold must be positive, got {}", self.move_threshold));
        }

        if self.required_move_only_samples == 0 {
            issues.push("required_move_only_samples must be at least 1".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !is_non_negative(self.hit_slop) {
            self.hit_slop = default_hit_slop();
            fixes += 1;
        }

        if !is_positive(self.move_threshold) {
            self.move_threshold = default_move_threshold();
            fixes += 1;
        }

        if self.required_move_only_samples == 0 {
            self.required_move_only_samples = 1;
            fixes += 1;
        }

        fixes
    }
}

impl LifecycleSettings {
    pub fn debounce(&self) -> Duration { Duration::from_millis(self.debounce_ms) }
}

impl StabilizationSettings {
    pub fn interval(&self) -> Duration { Duration::from_millis(self.interval_ms) }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.interval_ms == 0 {
            issues.push("stabilization interval_ms must be positive".to_string());
        }

        if self.stable_samples == 0 {
            issues.push("stable_samples must be at least 1".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.interval_ms == 0 {
            self.interval_ms = default_probe_interval_ms();
            fixes += 1;
        }

        if self.stable_samples == 0 {
            self.stable_samples = default_stable_samples();
            fixes += 1;
        }

        fixes
    }
}

impl ActuatorSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !is_non_negative(self.size_tolerance) || !is_non_negative(self.position_tolerance) {
            issues.push("actuator tolerances must be non-negative".to_string());
        }

        if self.max_attempts == 0 {
            issues.push("max_attempts must be at least 1".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !is_non_negative(self.size_tolerance) {
            self.size_tolerance = default_actuator_tolerance();
            fixes += 1;
        }

        if !is_non_negative(self.position_tolerance) {
            self.position_tolerance = default_actuator_tolerance();
            fixes += 1;
        }

        if self.max_attempts == 0 {
            self.max_attempts = default_max_attempts();
            fixes += 1;
        }

        fixes
    }
}

impl FloatingSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (name, value) in [
            ("min_width", self.min_width),
            ("min_height", self.min_height),
            ("dialog_max_width", self.dialog_max_width),
            ("dialog_max_height", self.dialog_max_height),
        ] {
            if !is_non_negative(value) {
                issues.push(format!("floating.{name} must be non-negative, got {value}"));
            }
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;
        let defaults = FloatingSettings::default();

        for (value, default) in [
            (&mut self.min_width, defaults.min_width),
            (&mut self.min_height, defaults.min_height),
            (&mut self.dialog_max_width, defaults.dialog_max_width),
            (&mut self.dialog_max_height, defaults.dialog_max_height),
        ] {
            if !is_non_negative(*value) {
                *value = default;
                fixes += 1;
            }
        }

        fixes
    }
}

impl RuleStore for RuleSet {
    fn is_app_forced_floating(&self, app_name: &str) -> bool {
        self.floating_apps.iter().any(|name| name.eq_ignore_ascii_case(app_name))
    }

    fn is_type_forced_floating(&self, descriptor: &str) -> bool {
        self.floating_types.iter().any(|ty| ty == descriptor)
    }

    fn is_bundle_excluded(&self, bundle_id: &str) -> bool {
        self.excluded_bundles.iter().any(|rule| {
            if rule.ends_with('.') {
                bundle_id.starts_with(rule.as_str())
            } else {
                rule == bundle_id
            }
        })
    }
}

/// Rules backed by the config file. Reloading swaps the snapshot handed out
/// to subsequent reflows; snapshots already taken are unaffected.
pub struct ConfigRules {
    current: RwLock<Arc<RuleSet>>,
}

impl ConfigRules {
    pub fn new(rules: RuleSet) -> Self {
        Self { current: RwLock::new(Arc::new(rules)) }
    }

    pub fn replace(&self, rules: RuleSet) { *self.current.write() = Arc::new(rules); }

    pub fn reload(&self, path: &Path) -> anyhow::Result<()> {
        let config = Config::read(path)?;
        self.replace(config.rules);
        Ok(())
    }

    pub fn current(&self) -> Arc<RuleSet> { self.current.read().clone() }
}

impl RuleProvider for ConfigRules {
    fn snapshot(&self) -> Arc<dyn RuleStore> { self.current() }
}

fn yes() -> bool { true }

fn default_slot_margin() -> f64 { 8.0 }

fn default_min_extent() -> f64 { 120.0 }

fn default_master_ratio() -> f64 { 0.5 }

fn default_frame_tolerance() -> f64 { 2.0 }

fn default_hit_slop() -> f64 { 4.0 }

fn default_move_threshold() -> f64 { 3.0 }

fn default_required_move_only_samples() -> u32 { 2 }

fn default_debounce_ms() -> u64 { 180 }

fn default_probe_interval_ms() -> u64 { 100 }

fn default_stable_samples() -> u32 { 3 }

fn default_probe_timeout_ms() -> u64 { 1500 }

fn default_actuator_tolerance() -> f64 { 1.0 }

fn default_max_attempts() -> u32 { 2 }

fn default_min_width() -> f64 { 160.0 }

fn default_min_height() -> f64 { 120.0 }

fn default_dialog_max_width() -> f64 { 520.0 }

fn default_dialog_max_height() -> f64 { 420.0 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn default() -> Config { Self::parse(include_str!("../../tessera.default.toml")).unwrap() }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> { self.settings.validate() }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize { self.settings.auto_fix_values() }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert!(config.settings.enabled);
        assert_eq!(config.settings.layout.slot_margin, 8.0);
        assert_eq!(config.settings.lifecycle.debounce(), Duration::from_millis(180));
        assert_eq!(config.settings.stabilization.stable_samples, 3);
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let config = Config::parse("[settings.layout]\nslot_margin = 4.0\n").unwrap();
        assert_eq!(config.settings.layout.slot_margin, 4.0);
        assert_eq!(config.settings.layout.min_extent, 120.0);
        assert_eq!(config.settings.gesture, GestureSettings::default());
        assert_eq!(config.rules, RuleSet::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::parse("[settings]\nanimate = true\n").is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        let issues = config.validate();
        assert!(issues.is_empty());

        config.settings.layout.default_master_ratio = 0.95;
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("default_master_ratio"));

        let fixes = config.auto_fix_values();
        assert_eq!(fixes, 1);
        assert_eq!(config.settings.layout.default_master_ratio, 0.8);

        config.settings.gesture.required_move_only_samples = 0;
        config.settings.actuator.max_attempts = 0;
        assert_eq!(config.validate().len(), 2);
        assert_eq!(config.auto_fix_values(), 2);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn nan_and_infinite_values_are_caught() {
        let mut config = Config::parse(
            "[settings.layout]\nslot_margin = nan\nmin_extent = inf\n\n\
             [settings.gesture]\nmove_threshold = nan\n",
        )
        .unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 3, "{issues:?}");

        assert_eq!(config.auto_fix_values(), 3);
        assert_eq!(config.settings.layout.slot_margin, 8.0);
        assert_eq!(config.settings.layout.min_extent, 120.0);
        assert_eq!(
            config.settings.gesture.move_threshold,
            GestureSettings::default().move_threshold
        );
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bundle_rules_support_prefixes() {
        let rules = RuleSet {
            floating_apps: vec!["Calculator".into()],
            floating_types: vec!["AXWindow/AXQuickLook".into()],
            excluded_bundles: vec!["com.jetbrains.".into(), "com.apple.finder".into()],
        };
        assert!(rules.is_bundle_excluded("com.jetbrains.intellij"));
        assert!(rules.is_bundle_excluded("com.apple.finder"));
        assert!(!rules.is_bundle_excluded("com.apple.finderx"));
        assert!(rules.is_app_forced_floating("calculator"));
        assert!(rules.is_type_forced_floating("AXWindow/AXQuickLook"));
    }

    #[test]
    fn config_rules_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        std::fs::write(&path, "[rules]\nfloating_apps = [\"Finder\"]\n").unwrap();

        let provider = ConfigRules::new(RuleSet::default());
        let before = provider.snapshot();
        provider.reload(&path).unwrap();
        let after = provider.snapshot();

        assert!(!before.is_app_forced_floating("Finder"));
        assert!(after.is_app_forced_floating("Finder"));
    }
}
