pub mod avoidance;
pub mod control;
pub mod flight;
pub mod io;
pub mod landing;
pub mod positioning;
pub mod scene;
pub mod sim;

// One-stop imports for hosts embedding the simulation core.
pub mod types {
    pub use crate::avoidance::{AvoidanceOutput, AvoidanceStrategy, SensorDirection};
    pub use crate::control::{Contribution, KeySet};
    pub use crate::flight::state::{
        ControlSource, DronePose, FlightConfig, FlightState, SensorData,
    };
    pub use crate::landing::{LandingPad, LandingPhase};
    pub use crate::positioning::{EstimateSource, PositionEstimate};
    pub use crate::scene::{Obstacle, SceneIndex, StaticScene};
    pub use crate::sim::{BatteryStatus, ScenarioConfig, SimulationConfig, Supervisor};
}
