use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::Contribution;
use crate::flight::state::{ControlSource, DronePose, FlightConfig, FlightState};

// ---------------------------------------------------------------------------
// Key state
// ---------------------------------------------------------------------------

/// Held-state of the piloting keys, fed in by the input layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySet {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub boost: bool,
}

// ---------------------------------------------------------------------------
// Manual controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    /// Yaw rate command per held yaw key, rad per tick.
    pub rotation_speed: f64,
    /// Cosmetic pitch/roll tilt while translating, rad per tick.
    pub tilt_rate: f64,
    /// Vertical axis responsiveness relative to horizontal.
    pub vertical_gain: f64,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 0.005,
            tilt_rate: 0.02,
            vertical_gain: 1.2,
        }
    }
}

/// Translates the held-key set into a velocity command. Forward/strafe act
/// along the drone's yaw-rotated axes; pitch/roll tilt is cosmetic and
/// decays geometrically once the key is released.
#[derive(Debug, Clone, Default)]
pub struct ManualController {
    pub config: ManualConfig,
}

impl ManualController {
    pub fn new(config: ManualConfig) -> Self {
        Self { config }
    }

    /// Compute this tick's command from the current state. `dt` is
    /// frame-normalized (1.0 = 1/60 s).
    pub fn contribution(
        &self,
        pose: &DronePose,
        state: &FlightState,
        keys: &KeySet,
        flight: &FlightConfig,
        dt: f64,
    ) -> Contribution {
        let mult = if keys.boost { flight.boost_multiplier } else { 1.0 };
        let accel = flight.acceleration * mult;
        let yaw = pose.yaw();

        let mut vel = state.velocity;
        let mut rot = state.rotation_velocity;

        // Forward/back along the yaw-rotated forward axis, with a
        // proportional nose tilt.
        if keys.forward {
            vel.x += yaw.sin() * accel * dt;
            vel.z -= yaw.cos() * accel * dt;
            rot.x = -self.config.tilt_rate * mult;
        } else if keys.back {
            vel.x -= yaw.sin() * accel * dt;
            vel.z += yaw.cos() * accel * dt;
            rot.x = self.config.tilt_rate * mult;
        } else {
            rot.x *= 0.9;
        }

        // Strafe, with a proportional roll.
        if keys.left {
            vel.x -= yaw.cos() * accel * dt;
            vel.z -= yaw.sin() * accel * dt;
            rot.z = self.config.tilt_rate * mult;
        } else if keys.right {
            vel.x += yaw.cos() * accel * dt;
            vel.z += yaw.sin() * accel * dt;
            rot.z = -self.config.tilt_rate * mult;
        } else {
            rot.z *= 0.9;
        }

        // Vertical is more responsive than horizontal.
        if keys.up {
            vel.y += accel * self.config.vertical_gain * dt;
        } else if keys.down {
            vel.y -= accel * self.config.vertical_gain * dt;
        }

        // Yaw command, decaying when released.
        if keys.yaw_left {
            rot.y += self.config.rotation_speed * 0.3 * dt;
        } else if keys.yaw_right {
            rot.y -= self.config.rotation_speed * 0.3 * dt;
        } else {
            rot.y *= 0.95;
        }

        Contribution::Exclusive {
            source: ControlSource::Manual,
            velocity: vel,
            rotation_velocity: rot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ManualController, DronePose, FlightState, FlightConfig) {
        (
            ManualController::default(),
            DronePose::new(Vector3::new(0.0, 2.0, 0.0)),
            FlightState::default(),
            FlightConfig::default(),
        )
    }

    #[test]
    fn forward_key_accelerates_along_negative_z_at_zero_yaw() {
        let (ctrl, pose, state, flight) = setup();
        let keys = KeySet { forward: true, ..KeySet::default() };
        let c = ctrl.contribution(&pose, &state, &keys, &flight, 1.0);
        match c {
            Contribution::Exclusive { velocity, rotation_velocity, .. } => {
                assert!(velocity.z < 0.0, "forward is -z at yaw 0");
                assert!(velocity.x.abs() < 1e-12);
                assert!(rotation_velocity.x < 0.0, "nose tilts down going forward");
            }
            _ => panic!("manual control is exclusive"),
        }
    }

    #[test]
    fn forward_follows_yaw() {
        let (ctrl, mut pose, state, flight) = setup();
        pose.rotation.y = std::f64::consts::FRAC_PI_2;
        let keys = KeySet { forward: true, ..KeySet::default() };
        match ctrl.contribution(&pose, &state, &keys, &flight, 1.0) {
            Contribution::Exclusive { velocity, .. } => {
                assert!(velocity.x > 0.0, "90 deg yaw turns forward into +x");
                assert!(velocity.z.abs() < 1e-9);
            }
            _ => panic!("manual control is exclusive"),
        }
    }

    #[test]
    fn boost_scales_acceleration() {
        let (ctrl, pose, state, flight) = setup();
        let plain = KeySet { up: true, ..KeySet::default() };
        let boosted = KeySet { up: true, boost: true, ..KeySet::default() };
        let (v_plain, v_boost) = match (
            ctrl.contribution(&pose, &state, &plain, &flight, 1.0),
            ctrl.contribution(&pose, &state, &boosted, &flight, 1.0),
        ) {
            (
                Contribution::Exclusive { velocity: a, .. },
                Contribution::Exclusive { velocity: b, .. },
            ) => (a.y, b.y),
            _ => panic!("manual control is exclusive"),
        };
        assert!((v_boost / v_plain - flight.boost_multiplier).abs() < 1e-9);
    }

    #[test]
    fn released_keys_decay_tilt() {
        let (ctrl, pose, mut state, flight) = setup();
        state.rotation_velocity = Vector3::new(0.02, 0.01, -0.02);
        let keys = KeySet::default();
        match ctrl.contribution(&pose, &state, &keys, &flight, 1.0) {
            Contribution::Exclusive { rotation_velocity, .. } => {
                assert!((rotation_velocity.x - 0.02 * 0.9).abs() < 1e-12);
                assert!((rotation_velocity.y - 0.01 * 0.95).abs() < 1e-12);
                assert!((rotation_velocity.z + 0.02 * 0.9).abs() < 1e-12);
            }
            _ => panic!("manual control is exclusive"),
        }
    }
}
