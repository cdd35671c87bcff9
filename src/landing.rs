use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::Contribution;
use crate::flight::state::{ControlSource, DronePose, FlightState, SensorData, FLOOR_ALTITUDE};
use crate::flight::wrap_angle;

// ---------------------------------------------------------------------------
// Landing pads
// ---------------------------------------------------------------------------

/// Static pad in the barn, optionally hosting a charging station.
#[derive(Debug, Clone)]
pub struct LandingPad {
    pub id: usize,
    pub position: Vector3<f64>,
    pub has_charger: bool,
    pub charger_active: bool,
}

impl LandingPad {
    pub fn new(id: usize, position: Vector3<f64>, has_charger: bool) -> Self {
        Self { id, position, has_charger, charger_active: false }
    }
}

/// The stock barn layout: one pad in each of two opposite corners, both
/// with chargers.
pub fn default_pads() -> Vec<LandingPad> {
    vec![
        LandingPad::new(0, Vector3::new(-40.0, 0.01, -40.0), true),
        LandingPad::new(1, Vector3::new(40.0, 0.01, 40.0), true),
    ]
}

// ---------------------------------------------------------------------------
// Phases and configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingPhase {
    Idle,
    Approach,
    Descent,
    Landed,
}

impl LandingPhase {
    pub fn label(self) -> &'static str {
        match self {
            LandingPhase::Idle => "idle",
            LandingPhase::Approach => "approach",
            LandingPhase::Descent => "descent",
            LandingPhase::Landed => "landed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingConfig {
    pub enabled: bool,
    /// Altitude held while moving over the pad, m.
    pub approach_height: f64,
    /// Descent rate, m/s before tick scaling.
    pub descent_speed: f64,
    pub charging_enabled: bool,
    /// Land and charge automatically when the battery runs low.
    pub auto_charge: bool,
    /// Battery percentage that triggers auto-charge.
    pub low_battery_threshold: f64,
    /// Charge restored per minute on a pad, percent.
    pub charging_rate: f64,
    /// Seconds between coordinator updates.
    pub update_interval: f64,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            approach_height: 3.0,
            descent_speed: 0.5,
            charging_enabled: true,
            auto_charge: false,
            low_battery_threshold: 20.0,
            charging_rate: 10.0,
            update_interval: 0.1,
        }
    }
}

impl LandingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.approach_height <= FLOOR_ALTITUDE {
            return Err(format!(
                "approach_height {} must clear the floor altitude {}",
                self.approach_height, FLOOR_ALTITUDE
            ));
        }
        if self.descent_speed <= 0.0 || self.charging_rate <= 0.0 {
            return Err("descent_speed and charging_rate must be positive".into());
        }
        Ok(())
    }
}

// Control gains for the landing sequence.
const APPROACH_GAIN: f64 = 0.001;
const APPROACH_DAMPING: f64 = 0.99;
const DESCENT_GAIN: f64 = 0.002;
const YAW_GAIN: f64 = 0.01;
// Approach completes when the drone is this close to the pad column.
const APPROACH_CAPTURE_RADIUS: f64 = 0.3;
const APPROACH_HEIGHT_TOLERANCE: f64 = 0.2;
const CHARGE_COMPLETE_PERCENT: f64 = 99.9;
const TAKEOFF_IMPULSE: f64 = 0.05;

// ---------------------------------------------------------------------------
// Landing system
// ---------------------------------------------------------------------------

/// Phased autoland: fly over the nearest pad, descend, settle, charge.
///
/// An in-flight approach or descent cannot be cancelled — only completed,
/// or re-targeted by a fresh initiation. A committed landing runs to
/// touchdown; control returns to the pilot via `takeoff` or when charging
/// completes.
#[derive(Debug, Clone)]
pub struct LandingSystem {
    pub config: LandingConfig,
    pads: Vec<LandingPad>,
    is_landing: bool,
    is_charging: bool,
    phase: LandingPhase,
    target_pad: Option<usize>,
    progress: f64,
    charging_progress: f64,
}

impl LandingSystem {
    pub fn new(config: LandingConfig, pads: Vec<LandingPad>) -> Self {
        Self {
            config,
            pads,
            is_landing: false,
            is_charging: false,
            phase: LandingPhase::Idle,
            target_pad: None,
            progress: 0.0,
            charging_progress: 0.0,
        }
    }

    pub fn pads(&self) -> &[LandingPad] {
        &self.pads
    }

    pub fn phase(&self) -> LandingPhase {
        self.phase
    }

    pub fn is_landing(&self) -> bool {
        self.is_landing
    }

    pub fn is_charging(&self) -> bool {
        self.is_charging
    }

    /// Landing progress, 0-100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn charging_progress(&self) -> f64 {
        self.charging_progress
    }

    pub fn target_pad(&self) -> Option<&LandingPad> {
        self.target_pad.map(|i| &self.pads[i])
    }

    /// Nearest pad by planar distance, `None` with no pads registered.
    pub fn nearest_pad(&self, position: &Vector3<f64>) -> Option<usize> {
        let mut nearest = None;
        let mut min_distance = f64::INFINITY;
        for (idx, pad) in self.pads.iter().enumerate() {
            let dx = pad.position.x - position.x;
            let dz = pad.position.z - position.z;
            let distance = (dx * dx + dz * dz).sqrt();
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(idx);
            }
        }
        nearest
    }

    /// Begin (or re-target) an automatic landing. Returns false when the
    /// system is disabled or the pad index is unknown. The caller is
    /// responsible for revoking manual/autopilot control.
    pub fn initiate_landing(&mut self, pad_idx: usize) -> bool {
        if !self.config.enabled || pad_idx >= self.pads.len() {
            return false;
        }
        self.is_landing = true;
        self.target_pad = Some(pad_idx);
        self.phase = LandingPhase::Approach;
        self.progress = 0.0;
        info!("[Landing] initiating automatic landing to pad {}", self.pads[pad_idx].id);
        true
    }

    /// One coordinator tick. `elapsed` is wall seconds since the previous
    /// tick (drives charging). Returns the velocity command while the
    /// coordinator owns the drone, `None` otherwise.
    pub fn update(
        &mut self,
        pose: &DronePose,
        state: &FlightState,
        sensors: &mut SensorData,
        elapsed: f64,
    ) -> Option<Contribution> {
        if !self.config.enabled {
            return None;
        }

        // Low battery: head for the nearest charger on our own.
        if self.config.auto_charge
            && sensors.battery < self.config.low_battery_threshold
            && !self.is_landing
            && !self.is_charging
        {
            if let Some(idx) = self.nearest_pad(&pose.position) {
                self.initiate_landing(idx);
            }
        }

        let contribution = if self.is_landing {
            self.update_sequence(pose, state)
        } else {
            None
        };

        if self.is_charging {
            self.update_charging(sensors, elapsed);
        }

        contribution
    }

    fn update_sequence(&mut self, pose: &DronePose, state: &FlightState) -> Option<Contribution> {
        let pad_idx = self.target_pad?;
        let pad_position = self.pads[pad_idx].position;

        match self.phase {
            LandingPhase::Approach => {
                let dx = pad_position.x - pose.position.x;
                let dz = pad_position.z - pose.position.z;
                let horizontal = (dx * dx + dz * dz).sqrt();
                let dy = self.config.approach_height - pose.position.y;

                let mut vel = state.velocity;
                vel.x += dx * APPROACH_GAIN;
                vel.z += dz * APPROACH_GAIN;
                vel.y += dy * APPROACH_GAIN;
                vel.x *= APPROACH_DAMPING;
                vel.z *= APPROACH_DAMPING;

                let mut rot = state.rotation_velocity;
                let target_yaw = dz.atan2(dx) - std::f64::consts::FRAC_PI_2;
                rot.y += wrap_angle(target_yaw - pose.rotation.y) * YAW_GAIN;

                self.progress = (1.0 - (horizontal / 20.0).min(1.0)) * 50.0;

                if horizontal < APPROACH_CAPTURE_RADIUS && dy.abs() < APPROACH_HEIGHT_TOLERANCE {
                    self.phase = LandingPhase::Descent;
                    info!("[Landing] over the pad, transitioning to descent");
                }

                Some(Contribution::Exclusive {
                    source: ControlSource::Landing,
                    velocity: vel,
                    rotation_velocity: rot,
                })
            }

            LandingPhase::Descent => {
                let dx = pad_position.x - pose.position.x;
                let dz = pad_position.z - pose.position.z;

                let mut vel = state.velocity;
                vel.x += dx * DESCENT_GAIN;
                vel.z += dz * DESCENT_GAIN;
                vel.y = -self.config.descent_speed * 0.01;

                let altitude_progress =
                    1.0 - (pose.position.y / self.config.approach_height).min(1.0);
                self.progress = 50.0 + altitude_progress * 50.0;

                if pose.position.y <= FLOOR_ALTITUDE {
                    // Touchdown. The integrator's floor clamp has already
                    // snapped the altitude; hold everything at zero.
                    self.phase = LandingPhase::Landed;
                    self.progress = 100.0;
                    info!("[Landing] touchdown");

                    if self.config.charging_enabled && self.pads[pad_idx].has_charger {
                        self.start_charging(pad_idx);
                    }

                    return Some(Contribution::Exclusive {
                        source: ControlSource::Landing,
                        velocity: Vector3::zeros(),
                        rotation_velocity: Vector3::zeros(),
                    });
                }

                Some(Contribution::Exclusive {
                    source: ControlSource::Landing,
                    velocity: vel,
                    rotation_velocity: state.rotation_velocity,
                })
            }

            LandingPhase::Landed => Some(Contribution::Exclusive {
                source: ControlSource::Landing,
                velocity: Vector3::zeros(),
                rotation_velocity: Vector3::zeros(),
            }),

            LandingPhase::Idle => None,
        }
    }

    fn start_charging(&mut self, pad_idx: usize) {
        self.is_charging = true;
        self.charging_progress = 0.0;
        if let Some(pad) = self.pads.get_mut(pad_idx) {
            pad.charger_active = true;
        }
        info!("[Landing] charging started on pad {}", pad_idx);
    }

    fn update_charging(&mut self, sensors: &mut SensorData, elapsed: f64) {
        let increment = (self.config.charging_rate / 60.0) * elapsed;
        sensors.battery = (sensors.battery + increment).min(100.0);
        self.charging_progress = sensors.battery;

        if sensors.battery >= CHARGE_COMPLETE_PERCENT {
            info!("[Landing] charging complete at {:.1}%", sensors.battery);
            self.is_charging = false;
            if let Some(pad) = self.target_pad.and_then(|i| self.pads.get_mut(i)) {
                pad.charger_active = false;
            }
            // Landing session is over; the drone is free to fly again.
            self.is_landing = false;
            self.phase = LandingPhase::Idle;
            self.target_pad = None;
        }
    }

    /// Lift off from a pad. Only legal once landed with charging finished;
    /// returns the takeoff velocity impulse on success, `None` (and no
    /// state change) otherwise. The caller restores manual control.
    pub fn takeoff(&mut self) -> Option<f64> {
        if !self.is_landing || self.phase != LandingPhase::Landed || self.is_charging {
            info!("[Landing] takeoff refused - not landed or still charging");
            return None;
        }
        self.is_landing = false;
        self.phase = LandingPhase::Idle;
        self.target_pad = None;
        info!("[Landing] takeoff");
        Some(TAKEOFF_IMPULSE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::integrator::{step, ExclusiveCommand, TickCommand};
    use crate::flight::state::FlightConfig;

    fn pad_at_origin() -> Vec<LandingPad> {
        vec![LandingPad::new(0, Vector3::new(0.0, 0.01, 0.0), true)]
    }

    fn system() -> LandingSystem {
        LandingSystem::new(LandingConfig::default(), pad_at_origin())
    }

    // Run the coordinator against the real integrator until the phase
    // stops changing or the step budget runs out.
    fn fly_to_completion(
        landing: &mut LandingSystem,
        pose: &mut DronePose,
        state: &mut FlightState,
        sensors: &mut SensorData,
        max_steps: usize,
    ) {
        let config = FlightConfig::default();
        for i in 0..max_steps {
            let contribution = landing.update(pose, state, sensors, 1.0 / 60.0);
            let mut cmd = match contribution {
                Some(Contribution::Exclusive { source, velocity, rotation_velocity }) => {
                    TickCommand {
                        exclusive: Some(ExclusiveCommand { source, velocity, rotation_velocity }),
                        ..TickCommand::default()
                    }
                }
                _ => TickCommand::default(),
            };
            cmd.grounded = landing.phase() == LandingPhase::Landed;
            step(pose, state, &cmd, &config, 1.0, i as f64 / 60.0);
            if landing.phase() == LandingPhase::Landed && !landing.is_charging() {
                break;
            }
        }
    }

    #[test]
    fn nearest_pad_is_planar_euclidean() {
        let landing = LandingSystem::new(LandingConfig::default(), default_pads());
        let idx = landing.nearest_pad(&Vector3::new(-30.0, 9.0, -30.0)).unwrap();
        assert_eq!(landing.pads()[idx].id, 0, "corner pad (-40,-40) is closer");
        let idx = landing.nearest_pad(&Vector3::new(30.0, 1.0, 30.0)).unwrap();
        assert_eq!(landing.pads()[idx].id, 1);
    }

    #[test]
    fn no_pads_means_no_landing() {
        let mut landing = LandingSystem::new(LandingConfig::default(), Vec::new());
        let pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        assert!(landing.nearest_pad(&pose.position).is_none());
        assert!(!landing.initiate_landing(0));
        assert!(!landing.is_landing());
    }

    #[test]
    fn landing_progresses_through_phases_to_touchdown() {
        let mut landing = system();
        let mut pose = DronePose::new(Vector3::new(10.0, 3.0, 10.0));
        let mut state = FlightState::default();
        let mut sensors = SensorData::default();

        assert!(landing.initiate_landing(0));
        assert_eq!(landing.phase(), LandingPhase::Approach);

        let config = FlightConfig::default();
        let mut prev_horizontal = f64::INFINITY;
        let mut prev_altitude = f64::INFINITY;
        let mut reached_descent = false;

        for i in 0..200_000 {
            let contribution = landing.update(&pose, &state, &mut sensors, 1.0 / 60.0);
            let mut cmd = match contribution {
                Some(Contribution::Exclusive { source, velocity, rotation_velocity }) => {
                    TickCommand {
                        exclusive: Some(ExclusiveCommand { source, velocity, rotation_velocity }),
                        ..TickCommand::default()
                    }
                }
                _ => TickCommand::default(),
            };
            cmd.grounded = landing.phase() == LandingPhase::Landed;
            step(&mut pose, &mut state, &cmd, &config, 1.0, i as f64 / 60.0);

            match landing.phase() {
                LandingPhase::Approach => {
                    let horizontal = (pose.position.x.powi(2) + pose.position.z.powi(2)).sqrt();
                    assert!(
                        horizontal <= prev_horizontal + 1e-6,
                        "approach should close on the pad: {} then {}",
                        prev_horizontal,
                        horizontal
                    );
                    prev_horizontal = horizontal;
                }
                LandingPhase::Descent => {
                    reached_descent = true;
                    assert!(
                        pose.position.y <= prev_altitude + 1e-6,
                        "descent should sink monotonically"
                    );
                    prev_altitude = pose.position.y;
                }
                LandingPhase::Landed => break,
                LandingPhase::Idle => panic!("landing must not abort mid-sequence"),
            }
        }

        assert!(reached_descent, "sequence should pass through descent");
        assert_eq!(landing.phase(), LandingPhase::Landed);
        assert!((landing.progress() - 100.0).abs() < 1e-9);
        assert!((pose.position.y - FLOOR_ALTITUDE).abs() < 1e-9);
        assert!(state.velocity.norm() < 1e-9, "touchdown zeroes velocity");
        assert!(landing.is_charging(), "pad has a charger, so charging starts");
    }

    #[test]
    fn charging_tops_out_and_releases() {
        let mut landing = system();
        let mut pose = DronePose::new(Vector3::new(0.0, 3.0, 0.0));
        let mut state = FlightState::default();
        let mut sensors = SensorData::default();
        sensors.battery = 95.0;

        assert!(landing.initiate_landing(0));
        fly_to_completion(&mut landing, &mut pose, &mut state, &mut sensors, 500_000);

        assert!(!landing.is_charging(), "charging stops once the battery is full");
        assert!(!landing.is_landing());
        assert_eq!(landing.phase(), LandingPhase::Idle);
        assert!(sensors.battery <= 100.0, "battery never exceeds 100");
        assert!(
            (sensors.battery - 100.0).abs() < 0.15,
            "10%/min for ~30 s tops a 95% battery out, got {:.2}",
            sensors.battery
        );
    }

    #[test]
    fn charging_rate_matches_configured_percent_per_minute() {
        let mut landing = system();
        landing.is_landing = true;
        landing.is_charging = true;
        landing.phase = LandingPhase::Landed;
        landing.target_pad = Some(0);
        let mut sensors = SensorData::default();
        sensors.battery = 50.0;

        // 60 s of 100 ms ticks at 10%/min.
        let pose = DronePose::new(Vector3::new(0.0, FLOOR_ALTITUDE, 0.0));
        let state = FlightState::default();
        for _ in 0..600 {
            landing.update(&pose, &state, &mut sensors, 0.1);
        }
        assert!((sensors.battery - 60.0).abs() < 1e-6, "got {:.3}", sensors.battery);
    }

    #[test]
    fn takeoff_refused_mid_approach() {
        let mut landing = system();
        assert!(landing.initiate_landing(0));
        assert_eq!(landing.phase(), LandingPhase::Approach);
        assert!(landing.takeoff().is_none());
        assert_eq!(landing.phase(), LandingPhase::Approach, "refusal leaves state alone");
        assert!(landing.is_landing());
    }

    #[test]
    fn takeoff_refused_while_charging() {
        let mut landing = system();
        landing.is_landing = true;
        landing.is_charging = true;
        landing.phase = LandingPhase::Landed;
        assert!(landing.takeoff().is_none());
        assert_eq!(landing.phase(), LandingPhase::Landed);
        assert!(landing.is_charging());
    }

    #[test]
    fn takeoff_from_landed_pad_succeeds() {
        let mut landing = system();
        landing.is_landing = true;
        landing.phase = LandingPhase::Landed;
        landing.target_pad = Some(0);
        let impulse = landing.takeoff().expect("landed and not charging");
        assert!(impulse > 0.0);
        assert_eq!(landing.phase(), LandingPhase::Idle);
        assert!(!landing.is_landing());
        assert!(landing.target_pad().is_none());
    }

    #[test]
    fn auto_charge_triggers_below_threshold() {
        let mut config = LandingConfig::default();
        config.auto_charge = true;
        let mut landing = LandingSystem::new(config, pad_at_origin());
        let pose = DronePose::new(Vector3::new(5.0, 3.0, 5.0));
        let state = FlightState::default();
        let mut sensors = SensorData::default();
        sensors.battery = 15.0;

        landing.update(&pose, &state, &mut sensors, 0.1);
        assert!(landing.is_landing(), "low battery starts an automatic landing");
        assert_eq!(landing.phase(), LandingPhase::Approach);
    }

    #[test]
    fn auto_charge_disabled_ignores_low_battery() {
        let mut landing = system();
        let pose = DronePose::new(Vector3::new(5.0, 3.0, 5.0));
        let state = FlightState::default();
        let mut sensors = SensorData::default();
        sensors.battery = 15.0;
        landing.update(&pose, &state, &mut sensors, 0.1);
        assert!(!landing.is_landing());
    }

    #[test]
    fn reinitiation_retargets_and_resets_phase() {
        let mut landing = LandingSystem::new(LandingConfig::default(), default_pads());
        assert!(landing.initiate_landing(0));
        landing.phase = LandingPhase::Descent;
        assert!(landing.initiate_landing(1));
        assert_eq!(landing.phase(), LandingPhase::Approach);
        assert_eq!(landing.target_pad().unwrap().id, 1);
    }
}
