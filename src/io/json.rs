use std::io::{self, Write};

use crate::landing::LandingPhase;
use crate::sim::runner::Snapshot;
use crate::sim::supervisor::{BatteryStatus, SimulationConfig};

// ---------------------------------------------------------------------------
// Flight summary
// ---------------------------------------------------------------------------

/// Summary statistics computed from a telemetry trace.
#[derive(Debug, Clone)]
pub struct FlightSummary {
    pub duration_s: f64,
    pub distance_m: f64,
    pub max_speed: f64,
    pub min_battery: f64,
    pub final_battery: f64,
    pub landings: usize,
    pub time_charging_s: f64,
    pub time_battery_critical_s: f64,
}

impl FlightSummary {
    /// Compute summary from telemetry.
    pub fn from_telemetry(telemetry: &[Snapshot]) -> Self {
        let duration_s = telemetry.last().map_or(0.0, |s| s.time);

        let distance_m = telemetry
            .windows(2)
            .map(|w| (w[1].position - w[0].position).norm())
            .sum();

        let max_speed = telemetry.iter().map(|s| s.speed).fold(0.0_f64, f64::max);
        let min_battery = telemetry
            .iter()
            .map(|s| s.battery)
            .fold(100.0_f64, f64::min);
        let final_battery = telemetry.last().map_or(0.0, |s| s.battery);

        let landings = telemetry
            .windows(2)
            .filter(|w| {
                w[0].landing_phase != LandingPhase::Landed
                    && w[1].landing_phase == LandingPhase::Landed
            })
            .count();

        let sample_time = |pred: &dyn Fn(&Snapshot) -> bool| -> f64 {
            telemetry
                .windows(2)
                .filter(|w| pred(&w[1]))
                .map(|w| w[1].time - w[0].time)
                .sum()
        };
        let time_charging_s = sample_time(&|s| s.charging);
        let time_battery_critical_s =
            sample_time(&|s| s.battery_status == BatteryStatus::Critical);

        FlightSummary {
            duration_s,
            distance_m,
            max_speed,
            min_battery,
            final_battery,
            landings,
            time_charging_s,
            time_battery_critical_s,
        }
    }
}

/// Write a flight summary as JSON to a writer.
pub fn write_summary<W: Write>(writer: &mut W, summary: &FlightSummary) -> io::Result<()> {
    writeln!(writer, "{{")?;
    writeln!(writer, "  \"flight\": {{")?;
    writeln!(writer, "    \"duration_s\": {:.2},", summary.duration_s)?;
    writeln!(writer, "    \"distance_m\": {:.2},", summary.distance_m)?;
    writeln!(writer, "    \"max_speed\": {:.4},", summary.max_speed)?;
    writeln!(writer, "    \"landings\": {}", summary.landings)?;
    writeln!(writer, "  }},")?;
    writeln!(writer, "  \"power\": {{")?;
    writeln!(writer, "    \"min_battery_pct\": {:.2},", summary.min_battery)?;
    writeln!(writer, "    \"final_battery_pct\": {:.2},", summary.final_battery)?;
    writeln!(writer, "    \"time_charging_s\": {:.2},", summary.time_charging_s)?;
    writeln!(
        writer,
        "    \"time_battery_critical_s\": {:.2}",
        summary.time_battery_critical_s
    )?;
    writeln!(writer, "  }}")?;
    writeln!(writer, "}}")?;
    Ok(())
}

/// Write a flight summary JSON to a file.
pub fn write_summary_file(path: &str, summary: &FlightSummary) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, summary)
}

// ---------------------------------------------------------------------------
// Configuration loading
// ---------------------------------------------------------------------------

/// Parse a `SimulationConfig` from JSON. Absent fields fall back to their
/// defaults, so a partial override file is enough.
pub fn config_from_json(json: &str) -> serde_json::Result<SimulationConfig> {
    serde_json::from_str(json)
}

/// Load a `SimulationConfig` from a JSON file.
pub fn read_config_file(path: &str) -> io::Result<SimulationConfig> {
    let text = std::fs::read_to_string(path)?;
    config_from_json(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
