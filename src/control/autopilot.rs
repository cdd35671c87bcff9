use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::Contribution;
use crate::flight::state::{ControlSource, DronePose, FlightState};
use crate::flight::wrap_angle;

// ---------------------------------------------------------------------------
// Waypoint-following autopilot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Horizontal velocity nudge toward the target per tick.
    pub move_speed: f64,
    /// Vertical velocity nudge per tick.
    pub vertical_speed: f64,
    /// Altitude error below which no vertical correction is applied, m.
    pub vertical_deadband: f64,
    /// Proportional yaw correction toward the travel direction.
    pub yaw_gain: f64,
    /// Distance at which a waypoint counts as reached, m.
    pub waypoint_tolerance: f64,
    /// Wrap back to the first waypoint at route end instead of stopping.
    pub loop_mode: bool,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            move_speed: 0.0015,
            vertical_speed: 0.001,
            vertical_deadband: 0.2,
            yaw_gain: 0.01,
            waypoint_tolerance: 1.0,
            loop_mode: true,
        }
    }
}

/// Flies an ordered waypoint list, yawing to face the direction of travel.
/// Deactivates itself (handing control back to the pilot) when a
/// non-looping route completes.
#[derive(Debug, Clone)]
pub struct Autopilot {
    pub config: AutopilotConfig,
    pub active: bool,
    pub waypoints: Vec<Vector3<f64>>,
    pub current: usize,
}

impl Autopilot {
    pub fn new(config: AutopilotConfig) -> Self {
        Self {
            config,
            active: false,
            waypoints: Vec::new(),
            current: 0,
        }
    }

    /// Serpentine perimeter sweep of the barn: four points per wall at
    /// patrol height, 10 m in from the walls.
    pub fn patrol_route() -> Vec<Vector3<f64>> {
        let height = 3.5;
        let half = 35.0;
        let mut route = Vec::with_capacity(16);
        for i in 0..4 {
            let t = -half + i as f64 * half / 2.0;
            route.push(Vector3::new(t, height, -half));
        }
        for i in 0..4 {
            let t = -half + i as f64 * half / 2.0;
            route.push(Vector3::new(half, height, t));
        }
        for i in 0..4 {
            let t = half - i as f64 * half / 2.0;
            route.push(Vector3::new(t, height, half));
        }
        for i in 0..4 {
            let t = half - i as f64 * half / 2.0;
            route.push(Vector3::new(-half, height, t));
        }
        route
    }

    pub fn engage(&mut self, waypoints: Vec<Vector3<f64>>) {
        self.waypoints = waypoints;
        self.current = 0;
        self.active = !self.waypoints.is_empty();
        if self.active {
            info!("[Autopilot] engaged with {} waypoints", self.waypoints.len());
        }
    }

    pub fn disengage(&mut self) {
        self.active = false;
    }

    /// Compute this tick's command. `None` when inactive, when the route is
    /// empty, or on the tick a waypoint is reached (the advance consumes
    /// the tick, as a reached waypoint needs no correction).
    pub fn contribution(
        &mut self,
        pose: &DronePose,
        state: &FlightState,
        dt: f64,
    ) -> Option<Contribution> {
        if !self.active || self.waypoints.is_empty() {
            return None;
        }

        let target = self.waypoints[self.current];
        let delta = target - pose.position;

        if delta.norm() < self.config.waypoint_tolerance {
            self.current = (self.current + 1) % self.waypoints.len();
            if self.current == 0 && !self.config.loop_mode {
                info!("[Autopilot] route complete, disengaging");
                self.active = false;
            }
            return None;
        }

        let mut vel = state.velocity;
        let mut rot = state.rotation_velocity;

        // Horizontal steering toward the target.
        let horizontal = (delta.x * delta.x + delta.z * delta.z).sqrt();
        let (dir_x, dir_z) = if horizontal > 1e-3 {
            (delta.x / horizontal, delta.z / horizontal)
        } else {
            (0.0, 0.0)
        };
        vel.x += dir_x * self.config.move_speed * dt;
        vel.z += dir_z * self.config.move_speed * dt;

        // Altitude correction outside the dead band.
        if delta.y.abs() > self.config.vertical_deadband {
            vel.y += delta.y.signum() * self.config.vertical_speed * dt;
        }

        // Face the direction of travel.
        if horizontal > 1e-3 {
            let target_yaw = (-dir_x).atan2(-dir_z);
            let yaw_diff = wrap_angle(target_yaw - pose.rotation.y);
            rot.y += yaw_diff * self.config.yaw_gain * dt;
        }

        Some(Contribution::Exclusive {
            source: ControlSource::Autopilot,
            velocity: vel,
            rotation_velocity: rot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autopilot_with(waypoints: Vec<Vector3<f64>>) -> Autopilot {
        let mut ap = Autopilot::new(AutopilotConfig::default());
        ap.engage(waypoints);
        ap
    }

    #[test]
    fn steers_toward_waypoint() {
        let mut ap = autopilot_with(vec![Vector3::new(10.0, 3.0, 0.0)]);
        let pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        let state = FlightState::default();
        match ap.contribution(&pose, &state, 1.0) {
            Some(Contribution::Exclusive { velocity, .. }) => {
                assert!(velocity.x > 0.0, "target is at +x");
                assert!(velocity.z.abs() < 1e-12);
            }
            other => panic!("expected exclusive contribution, got {:?}", other),
        }
    }

    #[test]
    fn climbs_outside_dead_band() {
        let mut ap = autopilot_with(vec![Vector3::new(10.0, 6.0, 0.0)]);
        let pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        let state = FlightState::default();
        match ap.contribution(&pose, &state, 1.0) {
            Some(Contribution::Exclusive { velocity, .. }) => {
                assert!(velocity.y > 0.0, "target is above the drone")
            }
            other => panic!("expected exclusive contribution, got {:?}", other),
        }
    }

    #[test]
    fn advances_waypoint_within_tolerance() {
        let mut ap = autopilot_with(vec![
            Vector3::new(0.5, 3.0, 0.0),
            Vector3::new(20.0, 3.0, 0.0),
        ]);
        let pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        let state = FlightState::default();
        assert!(ap.contribution(&pose, &state, 1.0).is_none());
        assert_eq!(ap.current, 1);
        assert!(ap.active);
    }

    #[test]
    fn non_looping_route_disengages_at_end() {
        let mut ap = autopilot_with(vec![Vector3::new(0.5, 3.0, 0.0)]);
        ap.config.loop_mode = false;
        let pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        let state = FlightState::default();
        assert!(ap.contribution(&pose, &state, 1.0).is_none());
        assert!(!ap.active, "route end without loop mode stops the autopilot");
    }

    #[test]
    fn patrol_route_stays_inside_cage() {
        for p in Autopilot::patrol_route() {
            assert!(p.x.abs() <= 45.0 && p.z.abs() <= 45.0);
            assert!(p.y > 0.5 && p.y < 10.0);
        }
    }
}
