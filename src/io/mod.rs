pub mod csv;
pub mod json;

pub use csv::{write_telemetry, write_telemetry_file};
pub use json::{config_from_json, read_config_file, write_summary, FlightSummary};
