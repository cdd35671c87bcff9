use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::Contribution;
use crate::flight::state::DronePose;
use crate::scene::{nearest_hit, SceneIndex};

// ---------------------------------------------------------------------------
// Ranging sensors
// ---------------------------------------------------------------------------

pub const SENSOR_COUNT: usize = 6;

/// Body-frame ranging directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDirection {
    Front,
    Back,
    Right,
    Left,
    Up,
    Down,
}

impl SensorDirection {
    pub const ALL: [SensorDirection; SENSOR_COUNT] = [
        SensorDirection::Front,
        SensorDirection::Back,
        SensorDirection::Right,
        SensorDirection::Left,
        SensorDirection::Up,
        SensorDirection::Down,
    ];

    pub fn axis(self) -> Vector3<f64> {
        match self {
            SensorDirection::Front => Vector3::new(0.0, 0.0, 1.0),
            SensorDirection::Back => Vector3::new(0.0, 0.0, -1.0),
            SensorDirection::Right => Vector3::new(1.0, 0.0, 0.0),
            SensorDirection::Left => Vector3::new(-1.0, 0.0, 0.0),
            SensorDirection::Up => Vector3::new(0.0, 1.0, 0.0),
            SensorDirection::Down => Vector3::new(0.0, -1.0, 0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SensorDirection::Front => "front",
            SensorDirection::Back => "back",
            SensorDirection::Right => "right",
            SensorDirection::Left => "left",
            SensorDirection::Up => "up",
            SensorDirection::Down => "down",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidanceStrategy {
    /// Back straight away from the single closest sensor.
    Simple,
    /// Sum quadratic repulsion over every close sensor, normalized.
    Vector,
    /// Velocity-lookahead ray with reflection, blended with `Vector`.
    Predictive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceConfig {
    pub enabled: bool,
    /// Sensor range, m.
    pub sensor_range: f64,
    /// Seconds between scans.
    pub update_interval: f64,
    /// Readings below this are close enough to react to, m.
    pub proximity_threshold: f64,
    /// Readings below this rate an emergency-grade warning, m.
    pub critical_threshold: f64,
    pub strategy: AvoidanceStrategy,
    /// How strongly the repulsion bleeds into the flight state, 0-1.
    pub influence: f64,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensor_range: 4.0,
            update_interval: 0.03,
            proximity_threshold: 2.0,
            critical_threshold: 0.8,
            strategy: AvoidanceStrategy::Vector,
            influence: 0.8,
        }
    }
}

impl AvoidanceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sensor_range <= 0.0 {
            return Err(format!("sensor_range must be positive, got {}", self.sensor_range));
        }
        if self.proximity_threshold <= 0.0 || self.proximity_threshold > self.sensor_range {
            return Err(format!(
                "proximity_threshold {} outside (0, sensor_range {}]",
                self.proximity_threshold, self.sensor_range
            ));
        }
        if !(0.0..=1.0).contains(&self.influence) {
            return Err(format!("influence {} outside [0, 1]", self.influence));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One scan's worth of sensor state, recomputed in full every scan.
/// `f64::INFINITY` means no return within sensor range.
#[derive(Debug, Clone)]
pub struct AvoidanceOutput {
    pub active: bool,
    /// Repulsion direction (body-frame axes), pre-scaling.
    pub avoidance_vector: Vector3<f64>,
    pub nearest_distance: f64,
    /// Index into the scene's obstacle list.
    pub nearest_obstacle: Option<usize>,
    pub readings: [f64; SENSOR_COUNT],
}

impl Default for AvoidanceOutput {
    fn default() -> Self {
        Self {
            active: false,
            avoidance_vector: Vector3::zeros(),
            nearest_distance: f64::INFINITY,
            nearest_obstacle: None,
            readings: [f64::INFINITY; SENSOR_COUNT],
        }
    }
}

impl AvoidanceOutput {
    pub fn reading(&self, direction: SensorDirection) -> f64 {
        // Discriminant order matches `SensorDirection::ALL`.
        self.readings[direction as usize]
    }
}

// ---------------------------------------------------------------------------
// Avoidance system
// ---------------------------------------------------------------------------

/// Six-direction obstacle ranging plus repulsion-vector computation.
/// The scan never fails: ray misses read infinite and an empty obstacle
/// set degrades to inactive.
#[derive(Debug, Clone)]
pub struct AvoidanceSystem {
    pub config: AvoidanceConfig,
    output: AvoidanceOutput,
}

impl AvoidanceSystem {
    pub fn new(config: AvoidanceConfig) -> Self {
        Self { config, output: AvoidanceOutput::default() }
    }

    pub fn output(&self) -> &AvoidanceOutput {
        &self.output
    }

    /// Re-scan every sensor against the scene and recompute the repulsion
    /// vector. `velocity` feeds the predictive lookahead only.
    pub fn scan(&mut self, scene: &dyn SceneIndex, pose: &DronePose, velocity: &Vector3<f64>) {
        if !self.config.enabled {
            self.output = AvoidanceOutput::default();
            return;
        }

        let mut output = AvoidanceOutput::default();
        let obstacles = scene.obstacles();
        let orientation = pose.orientation();

        for (i, direction) in SensorDirection::ALL.iter().enumerate() {
            let world_dir = orientation * direction.axis();
            if let Some((idx, hit)) =
                nearest_hit(obstacles, &pose.position, &world_dir, self.config.sensor_range)
            {
                output.readings[i] = hit.distance;
                if hit.distance < output.nearest_distance {
                    output.nearest_distance = hit.distance;
                    output.nearest_obstacle = Some(idx);
                }
            }
        }

        output.active = output.nearest_distance < self.config.proximity_threshold;
        if output.active {
            output.avoidance_vector = match self.config.strategy {
                AvoidanceStrategy::Simple => self.simple_repulsion(&output),
                AvoidanceStrategy::Vector => self.vector_repulsion(&output),
                AvoidanceStrategy::Predictive => {
                    self.predictive_repulsion(scene, pose, velocity, &output)
                }
            };
            debug!(
                "[Avoidance] active, nearest {:.2} m, vector {:?}",
                output.nearest_distance, output.avoidance_vector
            );
        }

        self.output = output;
    }

    /// The blend-in command for this scan: an additive velocity delta, or
    /// `None` while clear or disabled. The caller owns the decision to
    /// apply it and the control-source bookkeeping.
    pub fn contribution(&self) -> Option<Contribution> {
        if !self.config.enabled || !self.output.active {
            return None;
        }
        Some(Contribution::Additive {
            velocity: self.output.avoidance_vector * self.config.influence * 0.01,
        })
    }

    // Back away from the single closest sensor, harder the closer it is.
    fn simple_repulsion(&self, output: &AvoidanceOutput) -> Vector3<f64> {
        let mut closest = None;
        let mut min_distance = f64::INFINITY;
        for (i, direction) in SensorDirection::ALL.iter().enumerate() {
            if output.readings[i] < min_distance {
                min_distance = output.readings[i];
                closest = Some(*direction);
            }
        }
        match closest {
            Some(direction) if min_distance < self.config.proximity_threshold => {
                let strength = 1.0 - min_distance / self.config.proximity_threshold;
                -direction.axis() * strength
            }
            _ => Vector3::zeros(),
        }
    }

    // Quadratic repulsion from every close sensor, normalized to unit
    // length so the influence factor sets the final magnitude.
    fn vector_repulsion(&self, output: &AvoidanceOutput) -> Vector3<f64> {
        let mut sum = Vector3::zeros();
        let mut any = false;
        for (i, direction) in SensorDirection::ALL.iter().enumerate() {
            let reading = output.readings[i];
            if reading < self.config.proximity_threshold {
                let strength = (1.0 - reading / self.config.proximity_threshold).powi(2);
                sum -= direction.axis() * strength;
                any = true;
            }
        }
        if any && sum.norm() > 0.0 {
            sum.normalize()
        } else {
            sum
        }
    }

    // Cast one extra ray along the travel direction, scaled out by speed;
    // on a predicted impact, reflect the travel direction about the hit
    // surface and blend 70/30 with the all-sensor repulsion.
    fn predictive_repulsion(
        &self,
        scene: &dyn SceneIndex,
        pose: &DronePose,
        velocity: &Vector3<f64>,
        output: &AvoidanceOutput,
    ) -> Vector3<f64> {
        let speed = velocity.norm();
        if speed < 1e-3 {
            return self.vector_repulsion(output);
        }

        let travel = velocity / speed;
        let lookahead = self.config.proximity_threshold + speed * 1.5;
        match nearest_hit(scene.obstacles(), &pose.position, &travel, lookahead) {
            Some((_, hit)) => {
                let reflection = travel - 2.0 * travel.dot(&hit.normal) * hit.normal;
                let strength =
                    1.0 - hit.distance / (self.config.proximity_threshold + speed);
                reflection * strength * 0.7 + self.vector_repulsion(output) * 0.3
            }
            None => self.vector_repulsion(output),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
