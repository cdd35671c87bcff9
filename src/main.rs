use env_logger::Env;

use barn_drone_sim::control::Autopilot;
use barn_drone_sim::io::{write_telemetry_file, FlightSummary};
use barn_drone_sim::landing::default_pads;
use barn_drone_sim::scene::StaticScene;
use barn_drone_sim::sim::runner::{run_scenario, ScenarioConfig, Snapshot};
use barn_drone_sim::sim::supervisor::{SimulationConfig, Supervisor};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // -----------------------------------------------------------------------
    // Scenario: patrol sweep on a weak battery
    // -----------------------------------------------------------------------
    // The drone starts its inspection round at 24% charge. The patrol runs
    // until the battery policy forces an emergency landing on the nearest
    // pad, where the charger takes over.
    let scene = StaticScene::barn();
    let config = SimulationConfig::default();
    let mut supervisor = Supervisor::new(scene, config, default_pads(), 2024);

    supervisor.sensors_mut().battery = 24.0;
    supervisor.engage_autopilot(Autopilot::patrol_route());

    let scenario = ScenarioConfig {
        duration: 150.0,
        battery_drain: 0.25, // %/s, compressed for the demo
        ..ScenarioConfig::default()
    };

    // -----------------------------------------------------------------------
    // Run simulation
    // -----------------------------------------------------------------------
    let telemetry = run_scenario(&mut supervisor, &scenario);
    let summary = FlightSummary::from_telemetry(&telemetry);

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  BARN DRONE SIMULATION — inspection patrol");
    println!("====================================================================");
    println!();

    println!("  Flight Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    for event in detect_events(&telemetry) {
        println!("  {}", event);
    }
    println!();

    println!("  Performance Summary");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Flight time:   {:>8.1} s     Distance:     {:>8.1} m",
        summary.duration_s, summary.distance_m
    );
    println!(
        "  Max speed:     {:>8.3}       Landings:     {:>8}",
        summary.max_speed, summary.landings
    );
    println!(
        "  Min battery:   {:>7.1} %     Final:        {:>7.1} %",
        summary.min_battery, summary.final_battery
    );
    println!(
        "  Charging:      {:>8.1} s     Critical:     {:>8.1} s",
        summary.time_charging_s, summary.time_battery_critical_s
    );
    println!();

    println!("  Telemetry");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  {:>7}  {:>7}  {:>7}  {:>7}  {:>8}  {:>10}  {:>9}",
        "t (s)", "x (m)", "alt (m)", "z (m)", "batt (%)", "control", "phase"
    );
    println!("  {}", "─".repeat(66));

    let sample_interval = (telemetry.len() / 25).max(1);
    for (i, s) in telemetry.iter().enumerate() {
        if i % sample_interval != 0 && i != telemetry.len() - 1 {
            continue;
        }
        println!(
            "  {:>7.1}  {:>7.1}  {:>7.2}  {:>7.1}  {:>8.1}  {:>10}  {:>9}",
            s.time,
            s.position.x,
            s.position.y,
            s.position.z,
            s.battery,
            s.control_source.label(),
            s.landing_phase.label(),
        );
    }
    println!();

    // Optional CSV export: barn-drone-sim <path.csv>
    if let Some(path) = std::env::args().nth(1) {
        match write_telemetry_file(&path, &telemetry) {
            Ok(()) => println!("  Telemetry written to {}", path),
            Err(e) => eprintln!("  Failed to write {}: {}", path, e),
        }
    }

    println!("  Simulation: {} samples, tick={:.4} s", telemetry.len(), scenario.tick);
    println!("====================================================================");
    println!();
}

/// Scan telemetry for state transitions worth reporting.
fn detect_events(telemetry: &[Snapshot]) -> Vec<String> {
    let mut events = Vec::new();
    for w in telemetry.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        if prev.battery_status != curr.battery_status {
            events.push(format!(
                "BATTERY {:<9} t={:>6.1}s   {:.1}%",
                curr.battery_status.label().to_uppercase(),
                curr.time,
                curr.battery
            ));
        }
        if prev.control_source != curr.control_source {
            events.push(format!(
                "CONTROL → {:<8} t={:>6.1}s",
                curr.control_source.label(),
                curr.time
            ));
        }
        if prev.landing_phase != curr.landing_phase {
            events.push(format!(
                "PHASE   → {:<8} t={:>6.1}s   alt={:.2}m  progress={:.0}%",
                curr.landing_phase.label(),
                curr.time,
                curr.position.y,
                curr.landing_progress
            ));
        }
        if !prev.charging && curr.charging {
            events.push(format!(
                "CHARGING started     t={:>6.1}s   {:.1}%",
                curr.time, curr.battery
            ));
        }
    }
    events
}
