pub mod autopilot;
pub mod manual;

pub use autopilot::{Autopilot, AutopilotConfig};
pub use manual::{KeySet, ManualController};

use nalgebra::Vector3;

use crate::flight::state::ControlSource;

// ---------------------------------------------------------------------------
// Controller contribution
// ---------------------------------------------------------------------------

/// What a controller wants done to the flight state this tick.
///
/// Exactly one `Exclusive` contribution is applied per tick (the supervisor
/// picks the owner); `Additive` contributions are blended on top of it.
/// Controllers return values instead of mutating shared state, so the
/// composition rule is a visible contract rather than a convention.
#[derive(Debug, Clone)]
pub enum Contribution {
    /// Replaces both velocity vectors outright. Carries the full
    /// post-contribution values, computed from the current state.
    Exclusive {
        source: ControlSource,
        velocity: Vector3<f64>,
        rotation_velocity: Vector3<f64>,
    },
    /// A velocity delta added after the exclusive owner has written.
    Additive { velocity: Vector3<f64> },
}
