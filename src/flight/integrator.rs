use nalgebra::Vector3;

use super::state::{
    ControlSource, DronePose, FlightConfig, FlightState, CEILING_ALTITUDE, FLOOR_ALTITUDE,
    HORIZONTAL_BOUND,
};

// ---------------------------------------------------------------------------
// Per-tick command
// ---------------------------------------------------------------------------

/// The arbitration result fed into one integration step: at most one
/// exclusive owner's velocities plus an optional additive blend.
#[derive(Debug, Clone, Default)]
pub struct TickCommand {
    pub exclusive: Option<ExclusiveCommand>,
    pub additive: Option<Vector3<f64>>,
    /// Raises the velocity clamp; only set for manual flight with the
    /// boost key held.
    pub boost: bool,
    /// The drone is parked on a pad: rotors idle, so the flight model
    /// (gravity, lift, wind) does not apply and both velocities hold at
    /// zero.
    pub grounded: bool,
}

#[derive(Debug, Clone)]
pub struct ExclusiveCommand {
    pub source: ControlSource,
    pub velocity: Vector3<f64>,
    pub rotation_velocity: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// Integration step
// ---------------------------------------------------------------------------

/// Advance pose and flight state by one tick.
///
/// `dt` is frame-normalized (1.0 = 1/60 s); `time` is total elapsed
/// seconds, used only for the cosmetic hover jitter. The command is
/// written before the ambient forces: an exclusive owner computes its
/// velocities from the previous tick's state, so writing it later would
/// erase this tick's gravity and lift. The clamp runs once, after every
/// contribution for the step has been summed. Cannot fail — all inputs
/// are finite by construction.
pub fn step(
    pose: &mut DronePose,
    state: &mut FlightState,
    cmd: &TickCommand,
    config: &FlightConfig,
    dt: f64,
    time: f64,
) {
    // Controller command.
    if let Some(ex) = &cmd.exclusive {
        state.velocity = ex.velocity;
        state.rotation_velocity = ex.rotation_velocity;
        state.control_source = ex.source;
    }

    if cmd.grounded {
        state.halt();
        pose.hover_offset = 0.0;
        return;
    }

    // Gravity.
    state.velocity.y -= config.gravity * dt;

    // Lift, boosted near the floor by ground effect.
    if pose.position.y < config.ground_effect_height {
        let multiplier = 1.0
            + (config.ground_effect_height - pose.position.y) / config.ground_effect_height
                * config.ground_effect;
        state.velocity.y += config.lift * multiplier * dt;
    } else {
        state.velocity.y += config.lift * dt;
    }

    // Avoidance blend.
    if let Some(add) = &cmd.additive {
        state.velocity += add;
    }

    // Velocity clamps.
    let max_v = config.max_velocity * if cmd.boost { config.boost_multiplier } else { 1.0 };
    state.velocity.x = state.velocity.x.clamp(-max_v, max_v);
    state.velocity.y = state.velocity.y.clamp(-max_v, max_v);
    state.velocity.z = state.velocity.z.clamp(-max_v, max_v);

    let max_r = config.max_rot_velocity;
    state.rotation_velocity.x = state.rotation_velocity.x.clamp(-max_r, max_r);
    state.rotation_velocity.y = state.rotation_velocity.y.clamp(-max_r, max_r);
    state.rotation_velocity.z = state.rotation_velocity.z.clamp(-max_r, max_r);

    // Wind, then momentum decay.
    state.velocity += state.wind * dt;
    state.velocity *= config.deceleration;

    // Integrate pose.
    pose.position += state.velocity * dt;
    pose.rotation += state.rotation_velocity * dt;

    // Cage constraints. Non-negotiable: no controller may push through.
    if pose.position.y < FLOOR_ALTITUDE {
        pose.position.y = FLOOR_ALTITUDE;
        state.velocity.y = 0.0;
    }
    if pose.position.y > CEILING_ALTITUDE {
        pose.position.y = CEILING_ALTITUDE;
        state.velocity.y = 0.0;
    }
    if pose.position.x.abs() > HORIZONTAL_BOUND {
        pose.position.x = pose.position.x.signum() * HORIZONTAL_BOUND;
        state.velocity.x = 0.0;
    }
    if pose.position.z.abs() > HORIZONTAL_BOUND {
        pose.position.z = pose.position.z.signum() * HORIZONTAL_BOUND;
        state.velocity.z = 0.0;
    }

    // Idle hover jitter, display only.
    pose.hover_offset = (time).sin() * 0.001;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
