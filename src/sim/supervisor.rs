use log::{info, warn};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::avoidance::{AvoidanceConfig, AvoidanceOutput, AvoidanceSystem};
use crate::control::manual::ManualConfig;
use crate::control::{Autopilot, AutopilotConfig, Contribution, KeySet, ManualController};
use crate::flight::integrator::{step, ExclusiveCommand, TickCommand};
use crate::flight::state::{DronePose, FlightConfig, FlightState, SensorData};
use crate::landing::{LandingConfig, LandingPad, LandingPhase, LandingSystem};
use crate::positioning::{PositionEstimate, PositioningConfig, PositioningSystem};
use crate::scene::SceneIndex;

// ---------------------------------------------------------------------------
// Battery policy
// ---------------------------------------------------------------------------

/// Display status derived from the battery level. The one-shot emergency
/// trigger is a separate latch, not a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStatus {
    Normal,
    Low,
    Critical,
}

impl BatteryStatus {
    pub fn label(self) -> &'static str {
        match self {
            BatteryStatus::Normal => "normal",
            BatteryStatus::Low => "low",
            BatteryStatus::Critical => "critical",
        }
    }
}

const BATTERY_LOW_PERCENT: f64 = 20.0;
const BATTERY_CRITICAL_PERCENT: f64 = 10.0;
const BATTERY_EMERGENCY_PERCENT: f64 = 5.0;

// ---------------------------------------------------------------------------
// Warnings and subsystem errors
// ---------------------------------------------------------------------------

const WARNING_EXPIRY: f64 = 5.0;

/// Advisory warning for the UI layer, deduplicated by id.
#[derive(Debug, Clone)]
pub struct Warning {
    pub id: &'static str,
    pub message: String,
    pub age: f64,
}

/// A subsystem that failed construction-time validation and is running
/// absent (degraded mode).
#[derive(Debug, Clone)]
pub struct SystemError {
    pub subsystem: &'static str,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Aggregate configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub flight: FlightConfig,
    pub manual: ManualConfig,
    pub autopilot: AutopilotConfig,
    pub avoidance: AvoidanceConfig,
    pub positioning: PositioningConfig,
    pub landing: LandingConfig,
}

// ---------------------------------------------------------------------------
// Flight supervisor
// ---------------------------------------------------------------------------

/// The single arbitration point over the shared flight state.
///
/// One `tick` call sequences wind resampling, positioning fusion, obstacle
/// scanning, battery monitoring, the landing coordinator, the active
/// controller and finally the integrator — in that order, so writes cannot
/// race. Each subsystem runs at its own cadence off accumulators driven by
/// the tick clock.
pub struct Supervisor<S: SceneIndex> {
    scene: S,
    flight_config: FlightConfig,

    manual: ManualController,
    pub autopilot: Autopilot,
    avoidance: Option<AvoidanceSystem>,
    positioning: Option<PositioningSystem>,
    landing: Option<LandingSystem>,

    pub keys: KeySet,
    pub manual_control_enabled: bool,

    state: FlightState,
    pose: DronePose,
    sensors: SensorData,
    rng: StdRng,

    time: f64,
    wind_timer: f64,
    positioning_timer: f64,
    avoidance_timer: f64,
    landing_timer: f64,

    battery_status: BatteryStatus,
    emergency_landing_triggered: bool,
    warnings: Vec<Warning>,
    errors: Vec<SystemError>,
}

impl<S: SceneIndex> Supervisor<S> {
    /// Build the supervisor and its subsystems. A subsystem whose config
    /// fails validation is recorded in the error log and left out of
    /// arbitration; the rest of the simulation runs without it.
    pub fn new(scene: S, config: SimulationConfig, pads: Vec<LandingPad>, seed: u64) -> Self {
        let mut errors = Vec::new();

        let avoidance = match config.avoidance.validate() {
            Ok(()) => Some(AvoidanceSystem::new(config.avoidance)),
            Err(message) => {
                warn!("[Supervisor] avoidance disabled: {}", message);
                errors.push(SystemError { subsystem: "avoidance", message });
                None
            }
        };
        let positioning = match config.positioning.validate() {
            Ok(()) => Some(PositioningSystem::new(config.positioning)),
            Err(message) => {
                warn!("[Supervisor] positioning disabled: {}", message);
                errors.push(SystemError { subsystem: "positioning", message });
                None
            }
        };
        let landing = match config.landing.validate() {
            Ok(()) => Some(LandingSystem::new(config.landing, pads)),
            Err(message) => {
                warn!("[Supervisor] landing disabled: {}", message);
                errors.push(SystemError { subsystem: "landing", message });
                None
            }
        };

        info!(
            "[Supervisor] online with {} subsystem(s) degraded",
            errors.len()
        );

        Self {
            scene,
            flight_config: config.flight,
            manual: ManualController::new(config.manual),
            autopilot: Autopilot::new(config.autopilot),
            avoidance,
            positioning,
            landing,
            keys: KeySet::default(),
            manual_control_enabled: true,
            state: FlightState::default(),
            pose: DronePose::new(Vector3::new(0.0, 2.0, 0.0)),
            sensors: SensorData::default(),
            rng: StdRng::seed_from_u64(seed),
            time: 0.0,
            wind_timer: 0.0,
            positioning_timer: 0.0,
            avoidance_timer: 0.0,
            landing_timer: 0.0,
            battery_status: BatteryStatus::Normal,
            emergency_landing_triggered: false,
            warnings: Vec::new(),
            errors,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn pose(&self) -> &DronePose {
        &self.pose
    }

    pub fn flight_state(&self) -> &FlightState {
        &self.state
    }

    pub fn sensors(&self) -> &SensorData {
        &self.sensors
    }

    /// Mutable sensor access for the host's power model.
    pub fn sensors_mut(&mut self) -> &mut SensorData {
        &mut self.sensors
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn avoidance_output(&self) -> Option<&AvoidanceOutput> {
        self.avoidance.as_ref().map(|a| a.output())
    }

    pub fn position_estimate(&self) -> Option<&PositionEstimate> {
        self.positioning.as_ref().map(|p| p.estimate())
    }

    pub fn landing(&self) -> Option<&LandingSystem> {
        self.landing.as_ref()
    }

    pub fn battery_status(&self) -> BatteryStatus {
        self.battery_status
    }

    pub fn emergency_landing_triggered(&self) -> bool {
        self.emergency_landing_triggered
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn errors(&self) -> &[SystemError] {
        &self.errors
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    // -- commands -----------------------------------------------------------

    /// Hand the drone to the waypoint follower.
    pub fn engage_autopilot(&mut self, waypoints: Vec<Vector3<f64>>) {
        self.autopilot.engage(waypoints);
        if self.autopilot.active {
            self.manual_control_enabled = false;
        }
    }

    pub fn disengage_autopilot(&mut self) {
        self.autopilot.disengage();
        self.manual_control_enabled = true;
    }

    /// Commanded landing on the nearest pad. Revokes manual and autopilot
    /// control for the duration of the sequence.
    pub fn land_at_nearest(&mut self) -> bool {
        let Some(landing) = self.landing.as_mut() else {
            return false;
        };
        let Some(idx) = landing.nearest_pad(&self.pose.position) else {
            return false;
        };
        if landing.initiate_landing(idx) {
            self.manual_control_enabled = false;
            self.autopilot.disengage();
            true
        } else {
            false
        }
    }

    /// Lift off from a pad; restores manual control on success.
    pub fn takeoff(&mut self) -> bool {
        let Some(landing) = self.landing.as_mut() else {
            return false;
        };
        match landing.takeoff() {
            Some(impulse) => {
                self.state.velocity.y = impulse;
                self.manual_control_enabled = true;
                true
            }
            None => false,
        }
    }

    // -- the tick -----------------------------------------------------------

    /// Advance the whole simulation by `dt` wall seconds.
    pub fn tick(&mut self, dt: f64) {
        let dt_frames = dt * 60.0;
        self.time += dt;
        self.sensors.sanitize_battery();

        self.resample_wind(dt);
        self.update_positioning(dt);
        self.update_avoidance(dt);
        self.monitor_battery();

        let landing_contribution = self.update_landing(dt);
        let landing_active = self.landing.as_ref().map_or(false, |l| l.is_landing());
        let grounded = self
            .landing
            .as_ref()
            .map_or(false, |l| l.phase() == LandingPhase::Landed);

        // While a landing runs, nobody else flies.
        if landing_active {
            self.manual_control_enabled = false;
            self.autopilot.disengage();
        }

        let mut cmd = TickCommand::default();
        cmd.grounded = grounded;

        let exclusive = if landing_active {
            landing_contribution
        } else if self.autopilot.active {
            self.autopilot.contribution(&self.pose, &self.state, dt_frames)
        } else if self.manual_control_enabled {
            cmd.boost = self.keys.boost;
            Some(self.manual.contribution(
                &self.pose,
                &self.state,
                &self.keys,
                &self.flight_config,
                dt_frames,
            ))
        } else {
            None
        };

        if let Some(Contribution::Exclusive { source, velocity, rotation_velocity }) = exclusive {
            cmd.exclusive = Some(ExclusiveCommand { source, velocity, rotation_velocity });
        }

        // Highest priority, but a modifier rather than an owner: always
        // blended on top of whoever is flying.
        if let Some(Contribution::Additive { velocity }) =
            self.avoidance.as_ref().and_then(|a| a.contribution())
        {
            cmd.additive = Some(velocity);
        }

        step(
            &mut self.pose,
            &mut self.state,
            &cmd,
            &self.flight_config,
            dt_frames,
            self.time,
        );

        self.mirror_sensors(dt, grounded);
        self.expire_warnings(dt);
    }

    fn resample_wind(&mut self, dt: f64) {
        self.wind_timer += dt;
        if self.wind_timer < self.flight_config.wind_interval {
            return;
        }
        self.wind_timer = 0.0;
        let h = self.flight_config.wind_horizontal;
        let v = self.flight_config.wind_vertical;
        self.state.wind = Vector3::new(
            (self.rng.gen::<f64>() - 0.5) * h,
            (self.rng.gen::<f64>() - 0.5) * v,
            (self.rng.gen::<f64>() - 0.5) * h,
        );
    }

    fn update_positioning(&mut self, dt: f64) {
        let Some(positioning) = self.positioning.as_mut() else {
            return;
        };
        self.positioning_timer += dt;
        if self.positioning_timer < positioning.config.update_interval {
            return;
        }
        self.positioning_timer = 0.0;
        positioning.update(&self.scene, &self.pose, &mut self.rng);
        let estimate = positioning.estimate();
        self.sensors.position_accuracy = estimate.accuracy;
        self.sensors.position_source = estimate.source.label();
    }

    fn update_avoidance(&mut self, dt: f64) {
        let Some(avoidance) = self.avoidance.as_mut() else {
            return;
        };
        self.avoidance_timer += dt;
        if self.avoidance_timer < avoidance.config.update_interval {
            return;
        }
        self.avoidance_timer = 0.0;
        avoidance.scan(&self.scene, &self.pose, &self.state.velocity);

        let output = avoidance.output();
        if output.active && output.nearest_distance < 1.0 {
            let message = format!("Obstacle {:.2} m away", output.nearest_distance);
            self.add_warning("obstacle_proximity", message);
        }
    }

    fn monitor_battery(&mut self) {
        let battery = self.sensors.battery;
        if battery < BATTERY_CRITICAL_PERCENT {
            self.battery_status = BatteryStatus::Critical;
            self.add_warning(
                "battery_critical",
                format!("Battery level critical: {:.1}%", battery),
            );
            if battery < BATTERY_EMERGENCY_PERCENT && !self.emergency_landing_triggered {
                if let Some(landing) = self.landing.as_mut() {
                    if let Some(idx) = landing.nearest_pad(&self.pose.position) {
                        self.emergency_landing_triggered = true;
                        warn!("[Supervisor] battery critical, forcing emergency landing");
                        landing.initiate_landing(idx);
                        self.manual_control_enabled = false;
                        self.autopilot.disengage();
                    }
                }
            }
        } else if battery < BATTERY_LOW_PERCENT {
            self.battery_status = BatteryStatus::Low;
            self.add_warning("battery_low", format!("Battery level low: {:.1}%", battery));
            self.emergency_landing_triggered = false;
        } else {
            self.battery_status = BatteryStatus::Normal;
            self.emergency_landing_triggered = false;
        }
    }

    fn update_landing(&mut self, dt: f64) -> Option<Contribution> {
        let landing = self.landing.as_mut()?;
        self.landing_timer += dt;
        if self.landing_timer < landing.config.update_interval {
            return None;
        }
        let elapsed = self.landing_timer;
        self.landing_timer = 0.0;

        let was_landing = landing.is_landing();
        let contribution = landing.update(&self.pose, &self.state, &mut self.sensors, elapsed);

        // Charging completion clears the landing session; hand the drone
        // back to the pilot.
        if was_landing && !landing.is_landing() {
            self.manual_control_enabled = true;
        }
        // An auto-charge initiation inside the update revokes control the
        // same way a commanded landing does.
        if !was_landing && landing.is_landing() {
            self.manual_control_enabled = false;
            self.autopilot.disengage();
        }

        contribution
    }

    fn mirror_sensors(&mut self, dt: f64, grounded: bool) {
        self.sensors.altitude = self.pose.position.y;
        self.sensors.orientation_deg = self.pose.rotation.map(|r| r.to_degrees());
        if !grounded {
            self.sensors.flight_time += dt;
        }
        let planar =
            (self.pose.position.x.powi(2) + self.pose.position.z.powi(2)).sqrt();
        let noise = self.rng.gen::<f64>() - 0.5;
        self.sensors.signal_strength = (95.0 - planar * 0.2 + noise).clamp(0.0, 100.0);
    }

    fn add_warning(&mut self, id: &'static str, message: String) {
        if let Some(existing) = self.warnings.iter_mut().find(|w| w.id == id) {
            existing.message = message;
            existing.age = 0.0;
        } else {
            self.warnings.push(Warning { id, message, age: 0.0 });
        }
    }

    fn expire_warnings(&mut self, dt: f64) {
        for warning in &mut self.warnings {
            warning.age += dt;
        }
        self.warnings.retain(|w| w.age < WARNING_EXPIRY);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::state::ControlSource;
    use crate::landing::default_pads;
    use crate::scene::{Obstacle, StaticScene};

    const TICK: f64 = 1.0 / 60.0;

    fn supervisor_with(scene: StaticScene) -> Supervisor<StaticScene> {
        Supervisor::new(scene, SimulationConfig::default(), default_pads(), 42)
    }

    #[test]
    fn manual_is_default_owner() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.keys.forward = true;
        for _ in 0..10 {
            sup.tick(TICK);
        }
        assert_eq!(sup.flight_state().control_source, ControlSource::Manual);
        assert!(sup.flight_state().velocity.z < 0.0, "forward is -z at zero yaw");
    }

    #[test]
    fn landing_takes_exclusive_ownership() {
        let mut sup = supervisor_with(StaticScene::empty());
        assert!(sup.land_at_nearest());
        assert!(!sup.manual_control_enabled);
        // Hold the forward key; the landing coordinator must win anyway.
        sup.keys.forward = true;
        for _ in 0..30 {
            sup.tick(TICK);
        }
        assert_eq!(sup.flight_state().control_source, ControlSource::Landing);
    }

    #[test]
    fn avoidance_blends_on_top_of_manual_flight() {
        // Wall dead ahead of the spawn point.
        let scene = StaticScene {
            obstacles: vec![Obstacle::new(
                "wall",
                Vector3::new(-5.0, 0.0, 1.0),
                Vector3::new(5.0, 5.0, 2.0),
            )],
            ..StaticScene::empty()
        };
        let mut sup = supervisor_with(scene);
        for _ in 0..10 {
            sup.tick(TICK);
        }
        let output = sup.avoidance_output().expect("avoidance subsystem is enabled");
        assert!(output.active, "wall at 1 m is inside the threshold");
        // Manual still owns the state; avoidance only modified it.
        assert_eq!(sup.flight_state().control_source, ControlSource::Manual);
        assert!(
            sup.flight_state().velocity.z < 0.0,
            "repulsion pushes away from the wall: {:?}",
            sup.flight_state().velocity
        );
    }

    #[test]
    fn emergency_landing_fires_once_per_episode() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.sensors_mut().battery = 4.0;
        sup.tick(TICK);
        assert!(sup.emergency_landing_triggered());
        assert_eq!(sup.battery_status(), BatteryStatus::Critical);
        let landing = sup.landing().expect("landing subsystem is enabled");
        assert!(landing.is_landing());

        // Still critical: the latch must hold, not re-fire.
        sup.tick(TICK);
        assert!(sup.emergency_landing_triggered());

        // Recovered battery ends the episode and clears the latch.
        sup.sensors_mut().battery = 50.0;
        sup.tick(TICK);
        assert!(!sup.emergency_landing_triggered());
        assert_eq!(sup.battery_status(), BatteryStatus::Normal);
    }

    #[test]
    fn battery_status_tracks_thresholds() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.sensors_mut().battery = 15.0;
        sup.tick(TICK);
        assert_eq!(sup.battery_status(), BatteryStatus::Low);
        assert!(sup.warnings().iter().any(|w| w.id == "battery_low"));

        sup.sensors_mut().battery = 8.0;
        sup.tick(TICK);
        assert_eq!(sup.battery_status(), BatteryStatus::Critical);
    }

    #[test]
    fn nan_battery_is_sanitized_before_policy_runs() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.sensors_mut().battery = f64::NAN;
        sup.tick(TICK);
        assert!((sup.sensors().battery - 85.0).abs() < 1e-12);
        assert_eq!(sup.battery_status(), BatteryStatus::Normal);
    }

    #[test]
    fn warnings_deduplicate_and_expire() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.sensors_mut().battery = 15.0;
        for _ in 0..10 {
            sup.tick(TICK);
        }
        let low_warnings = sup.warnings().iter().filter(|w| w.id == "battery_low").count();
        assert_eq!(low_warnings, 1, "repeated warnings collapse into one");

        // Battery recovers; the stale warning ages out.
        sup.sensors_mut().battery = 90.0;
        for _ in 0..400 {
            sup.tick(TICK);
        }
        assert!(sup.warnings().is_empty());
    }

    #[test]
    fn invalid_subsystem_config_degrades_instead_of_failing() {
        let mut config = SimulationConfig::default();
        config.avoidance.influence = 7.0;
        let mut sup = Supervisor::new(StaticScene::barn(), config, default_pads(), 1);
        assert_eq!(sup.errors().len(), 1);
        assert_eq!(sup.errors()[0].subsystem, "avoidance");
        assert!(sup.avoidance_output().is_none());
        // The rest of the stack still ticks.
        for _ in 0..10 {
            sup.tick(TICK);
        }
        assert!(sup.position_estimate().is_some());
    }

    #[test]
    fn wind_resamples_on_schedule() {
        let mut sup = supervisor_with(StaticScene::empty());
        assert_eq!(sup.flight_state().wind, Vector3::zeros());
        for _ in 0..((5.5 / TICK) as usize) {
            sup.tick(TICK);
        }
        assert!(sup.flight_state().wind.norm() > 0.0, "wind resampled after 5 s");
        let h = sup.flight_config.wind_horizontal;
        assert!(sup.flight_state().wind.x.abs() <= h / 2.0);
    }

    #[test]
    fn autopilot_engagement_is_mutually_exclusive_with_manual() {
        let mut sup = supervisor_with(StaticScene::empty());
        sup.engage_autopilot(vec![Vector3::new(10.0, 3.0, 10.0)]);
        assert!(!sup.manual_control_enabled);
        for _ in 0..30 {
            sup.tick(TICK);
        }
        assert_eq!(sup.flight_state().control_source, ControlSource::Autopilot);
        sup.disengage_autopilot();
        assert!(sup.manual_control_enabled);
    }

    #[test]
    fn takeoff_restores_manual_control() {
        // Charging disabled so takeoff is legal immediately after touchdown.
        let mut config = SimulationConfig::default();
        config.landing.charging_enabled = false;
        let mut sup = Supervisor::new(StaticScene::empty(), config, default_pads(), 9);
        assert!(sup.land_at_nearest());
        for _ in 0..200_000 {
            sup.tick(TICK);
            if sup.landing().map_or(false, |l| l.phase() == LandingPhase::Landed) {
                break;
            }
        }
        assert_eq!(
            sup.landing().map(|l| l.phase()),
            Some(LandingPhase::Landed),
            "sequence should reach touchdown"
        );
        assert!(sup.takeoff());
        assert!(sup.manual_control_enabled);
        assert!(sup.flight_state().velocity.y > 0.0);
    }

    #[test]
    fn sensor_mirror_tracks_pose() {
        let mut sup = supervisor_with(StaticScene::empty());
        for _ in 0..60 {
            sup.tick(TICK);
        }
        assert!((sup.sensors().altitude - sup.pose().position.y).abs() < 1e-12);
        assert!((sup.sensors().flight_time - 1.0).abs() < 1e-9);
    }
}
