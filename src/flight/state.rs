use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cage constants
// ---------------------------------------------------------------------------

/// Lowest altitude the drone body can occupy (landing-gear height), m.
pub const FLOOR_ALTITUDE: f64 = 0.5;
/// Barn ceiling clearance, m.
pub const CEILING_ALTITUDE: f64 = 10.0;
/// Half-extent of the flyable area on each horizontal axis, m.
pub const HORIZONTAL_BOUND: f64 = 45.0;

// ---------------------------------------------------------------------------
// Control source
// ---------------------------------------------------------------------------

/// Advisory tag identifying which logical controller last drove the
/// flight state. Display-only; exclusivity is enforced by the supervisor,
/// not by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSource {
    Manual,
    Autopilot,
    ObstacleAvoidance,
    Landing,
}

impl ControlSource {
    pub fn label(self) -> &'static str {
        match self {
            ControlSource::Manual => "manual",
            ControlSource::Autopilot => "autopilot",
            ControlSource::ObstacleAvoidance => "obstacle_avoidance",
            ControlSource::Landing => "landing",
        }
    }
}

// ---------------------------------------------------------------------------
// Shared flight state
// ---------------------------------------------------------------------------

/// The shared velocity bus between controllers and the integrator.
/// One instance per drone; the supervisor is its only writer.
#[derive(Debug, Clone)]
pub struct FlightState {
    pub velocity: Vector3<f64>,          // world frame, units per tick
    pub rotation_velocity: Vector3<f64>, // rad per tick (pitch, yaw, roll axes)
    pub wind: Vector3<f64>,              // ambient disturbance, resampled every 5 s
    pub control_source: ControlSource,
}

impl Default for FlightState {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            rotation_velocity: Vector3::zeros(),
            wind: Vector3::zeros(),
            control_source: ControlSource::Manual,
        }
    }
}

impl FlightState {
    /// Zero both velocity vectors (touchdown hold).
    pub fn halt(&mut self) {
        self.velocity = Vector3::zeros();
        self.rotation_velocity = Vector3::zeros();
    }
}

// ---------------------------------------------------------------------------
// Drone pose
// ---------------------------------------------------------------------------

/// World-frame pose. Position is y-up; rotation is Euler (x = pitch,
/// y = yaw, z = roll) in radians. Mutated only by the integrator.
#[derive(Debug, Clone)]
pub struct DronePose {
    pub position: Vector3<f64>,
    pub rotation: Vector3<f64>,
    /// Idle-hover jitter, display only. Kept out of `position` so the
    /// landing coordinator sees the true physical altitude.
    pub hover_offset: f64,
}

impl DronePose {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            rotation: Vector3::zeros(),
            hover_offset: 0.0,
        }
    }

    pub fn yaw(&self) -> f64 {
        self.rotation.y
    }

    pub fn altitude(&self) -> f64 {
        self.position.y
    }

    /// Body-to-world orientation, yaw-pitch-roll composition about the
    /// y, x and z world axes.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.rotation.y)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.rotation.x)
            * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.rotation.z)
    }

    /// Position with the cosmetic hover jitter applied — what a render
    /// layer should draw.
    pub fn display_position(&self) -> Vector3<f64> {
        self.position + Vector3::new(0.0, self.hover_offset, 0.0)
    }
}

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

/// Telemetry record owned by the drone host. The supervisor mirrors pose
/// into it each tick; the landing coordinator writes battery while charging.
#[derive(Debug, Clone)]
pub struct SensorData {
    pub battery: f64,          // percent, 0-100
    pub altitude: f64,         // m
    pub orientation_deg: Vector3<f64>, // pitch, yaw, roll in degrees
    pub signal_strength: f64,  // percent
    pub flight_time: f64,      // s
    pub position_accuracy: f64, // m, from the positioning fusion
    pub position_source: &'static str,
}

impl Default for SensorData {
    fn default() -> Self {
        Self {
            battery: 85.0,
            altitude: FLOOR_ALTITUDE,
            orientation_deg: Vector3::zeros(),
            signal_strength: 95.0,
            flight_time: 0.0,
            position_accuracy: 0.0,
            position_source: "imu",
        }
    }
}

impl SensorData {
    /// Reset a corrupted battery reading to the last-known-good default.
    pub fn sanitize_battery(&mut self) {
        if !self.battery.is_finite() {
            self.battery = 85.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Flight dynamics configuration
// ---------------------------------------------------------------------------

/// Empirical flight-model constants. Velocities are in scene units per
/// normalized tick (1.0 tick = 1/60 s).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub max_velocity: f64,
    pub max_rot_velocity: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    pub gravity: f64,
    pub lift: f64,
    pub ground_effect: f64,
    pub ground_effect_height: f64,
    pub boost_multiplier: f64,
    /// Wind disturbance scale on the horizontal axes (samples span half
    /// this value either way).
    pub wind_horizontal: f64,
    /// Wind disturbance scale on the vertical axis.
    pub wind_vertical: f64,
    /// Seconds between wind resamples.
    pub wind_interval: f64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            max_velocity: 0.1,
            max_rot_velocity: 0.02,
            acceleration: 0.003,
            deceleration: 0.98,
            gravity: 0.001,
            lift: 0.0011,
            ground_effect: 1.5,
            ground_effect_height: 2.0,
            boost_multiplier: 1.3,
            wind_horizontal: 0.0002,
            wind_vertical: 0.0001,
            wind_interval: 5.0,
        }
    }
}
