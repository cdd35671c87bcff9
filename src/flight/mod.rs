pub mod integrator;
pub mod state;

pub use integrator::{step, TickCommand};
pub use state::{
    ControlSource, DronePose, FlightConfig, FlightState, SensorData, CEILING_ALTITUDE,
    FLOOR_ALTITUDE, HORIZONTAL_BOUND,
};

use std::f64::consts::PI;

/// Normalize an angle to [-pi, pi] (shortest-turn form).
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
