pub mod geometry;
pub mod role;
pub mod window;

pub use geometry::{Point, Rect, Size};
pub use role::{Role, Subrole, WindowTraits};
pub use window::{DisplayId, Window, WindowId, WorkspaceId, pid_t};
