pub mod runner;
pub mod supervisor;

pub use runner::{run_scenario, ScenarioConfig, Snapshot};
pub use supervisor::{BatteryStatus, SimulationConfig, Supervisor, SystemError, Warning};
