use std::io::{self, Write};

use crate::sim::runner::Snapshot;

/// Write telemetry to CSV format.
///
/// Columns: time, pos_x, pos_y, pos_z, speed, battery, battery_status,
///          control_source, landing_phase, landing_progress, charging,
///          avoidance_active, nearest_obstacle, position_accuracy,
///          position_source
pub fn write_telemetry<W: Write>(writer: &mut W, telemetry: &[Snapshot]) -> io::Result<()> {
    writeln!(
        writer,
        "time,pos_x,pos_y,pos_z,speed,battery,battery_status,\
         control_source,landing_phase,landing_progress,charging,\
         avoidance_active,nearest_obstacle,position_accuracy,position_source"
    )?;

    for s in telemetry {
        writeln!(
            writer,
            "{:.3},{:.4},{:.4},{:.4},{:.5},{:.2},{},{},{},{:.1},{},{},{:.3},{:.4},{}",
            s.time,
            s.position.x,
            s.position.y,
            s.position.z,
            s.speed,
            s.battery,
            s.battery_status.label(),
            s.control_source.label(),
            s.landing_phase.label(),
            s.landing_progress,
            s.charging,
            s.avoidance_active,
            s.nearest_obstacle,
            s.position_accuracy,
            s.position_source,
        )?;
    }

    Ok(())
}

/// Write telemetry to a CSV file at the given path.
pub fn write_telemetry_file(path: &str, telemetry: &[Snapshot]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_telemetry(&mut file, telemetry)
}
