//! Accessibility role semantics used by the floating classifier.
//!
//! Role strings reported by applications are open-ended, so every enum here
//! has an `Unknown` variant carrying the raw string.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, AsRefStr, Serialize, Deserialize)]
pub enum Role {
    #[strum(serialize = "AXWindow")]
    Window,
    #[strum(serialize = "AXSheet")]
    Sheet,
    #[strum(serialize = "AXDrawer")]
    Drawer,
    #[strum(serialize = "AXPopover")]
    Popover,
    #[strum(default)]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, AsRefStr, Serialize, Deserialize)]
pub enum Subrole {
    #[strum(serialize = "AXStandardWindow")]
    Standard,
    #[strum(serialize = "AXDialog")]
    Dialog,
    #[strum(serialize = "AXSystemDialog")]
    SystemDialog,
    #[strum(serialize = "AXFloatingWindow")]
    Floating,
    #[strum(serialize = "AXSystemFloatingWindow")]
    SystemFloating,
    #[strum(default)]
    Unknown(String),
}

impl Role {
    pub fn parse(raw: &str) -> Role { raw.parse().unwrap_or_else(|_| Role::Unknown(raw.to_owned())) }

    /// The raw accessibility string; `AsRefStr` would print the variant name
    /// for `Unknown`.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Unknown(raw) => raw,
            known => known.as_ref(),
        }
    }

    pub fn is_always_floating(&self) -> bool {
        matches!(self, Role::Sheet | Role::Drawer | Role::Popover)
    }
}

impl Subrole {
    pub fn parse(raw: &str) -> Subrole {
        raw.parse().unwrap_or_else(|_| Subrole::Unknown(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Subrole::Unknown(raw) => raw,
            known => known.as_ref(),
        }
    }

    pub fn is_always_floating(&self) -> bool {
        matches!(
            self,
            Subrole::Dialog | Subrole::SystemDialog | Subrole::Floating | Subrole::SystemFloating
        )
    }
}

/// Live accessibility facts about a window, as far as classification cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTraits {
    pub role: Role,
    pub subrole: Option<Subrole>,
    pub position_settable: bool,
}

impl WindowTraits {
    pub fn standard() -> WindowTraits {
        WindowTraits {
            role: Role::Window,
            subrole: Some(Subrole::Standard),
            position_settable: true,
        }
    }

    /// `role/subrole` descriptor matched against type exclusion rules.
    pub fn descriptor(&self) -> String {
        match &self.subrole {
            Some(subrole) => format!("{}/{}", self.role.as_str(), subrole.as_str()),
            None => self.role.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn known_strings_map_to_variants() {
        assert_eq!(Role::parse("AXSheet"), Role::Sheet);
        assert_eq!(Subrole::parse("AXDialog"), Subrole::Dialog);
        assert!(Subrole::parse("AXSystemFloatingWindow").is_always_floating());
    }

    #[test]
    fn unknown_strings_round_trip() {
        let role = Role::parse("AXMagicPanel");
        assert_eq!(role, Role::Unknown("AXMagicPanel".into()));
        assert_eq!(role.as_str(), "AXMagicPanel");
        assert!(!role.is_always_floating());
    }

    #[test]
    fn descriptor_joins_role_and_subrole() {
        let traits = WindowTraits {
            role: Role::Window,
            subrole: Some(Subrole::Unknown("AXQuickLook".into())),
            position_settable: true,
        };
        assert_eq!(traits.descriptor(), "AXWindow/AXQuickLook");
    }
}
