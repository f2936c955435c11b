//! Types shared by the movement server and its clients: the wire message
//! catalog, the player registry both roles keep, the presentation seam and
//! the frame transport helpers.

pub mod error;
pub mod presentation;
pub mod protocol;
pub mod registry;
pub mod transport;

use std::fmt;

pub use error::{CodecError, RegistryError};
pub use presentation::{HeadlessPresentation, Presentation, VisualHandle};
pub use protocol::{
    BoundedStr, Heartbeat, HorizontalDirection, Message, MovementIntent, MsgKind, UserDisconnect,
    UserSetup, UserUpdate, VerticalDirection, FRAME_LEN, MSG_APP_CAPACITY,
};
pub use registry::{PlayerKey, PlayerRegistry, PlayerState};
pub use transport::TransportEvent;

/// Displacement applied along an axis for every resolved movement intent.
pub const MOVE_STEP: f32 = 0.01;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Server-side handle of a single connection.
///
/// Handles are assigned by the server transport, never reused while the
/// connection lives, and travel to clients inside `UserSetup` so both roles
/// key players the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u32);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Absolute player position. Movement never touches `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }

    /// Linear blend towards `target`; `alpha` is clamped to `[0, 1]`.
    pub fn lerp(self, target: Position, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        Self {
            x: self.x + (target.x - self.x) * alpha,
            y: self.y + (target.y - self.y) * alpha,
            z: self.z + (target.z - self.z) * alpha,
        }
    }
}
