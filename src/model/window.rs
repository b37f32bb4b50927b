use std::fmt;

pub use nix::libc::pid_t;
use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Opaque window handle, stable for the lifetime of the window.
///
/// On macOS this is the window server id; it is the only identity a window
/// carries between discovery snapshots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(id: u32) -> WindowId { WindowId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "w{}", self.0) }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DisplayId(u32);

impl DisplayId {
    pub const fn new(id: u32) -> DisplayId { DisplayId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

/// An OS virtual desktop ("space").
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WorkspaceId(u64);

impl WorkspaceId {
    pub const fn new(id: u64) -> WorkspaceId { WorkspaceId(id) }

    pub fn get(&self) -> u64 { self.0 }
}

/// A snapshot of one on-screen window.
///
/// Values are produced by discovery and never mutated; refetch to observe
/// new geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    pub pid: pid_t,
    pub display: DisplayId,
    pub frame: Rect,
    pub title: String,
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub workspace: Option<WorkspaceId>,
}

impl Window {
    pub fn with_frame(&self, frame: Rect) -> Window {
        Window { frame, ..self.clone() }
    }
}
