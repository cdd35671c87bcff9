use nalgebra::Vector3;

use super::supervisor::{BatteryStatus, Supervisor};
use crate::flight::state::ControlSource;
use crate::landing::LandingPhase;
use crate::scene::SceneIndex;

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// One sampled row of simulation telemetry.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time: f64,
    pub position: Vector3<f64>,
    pub speed: f64,
    pub battery: f64,
    pub battery_status: BatteryStatus,
    pub control_source: ControlSource,
    pub landing_phase: LandingPhase,
    pub landing_progress: f64,
    pub charging: bool,
    pub avoidance_active: bool,
    pub nearest_obstacle: f64,
    pub position_accuracy: f64,
    pub position_source: &'static str,
}

// ---------------------------------------------------------------------------
// Scenario configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Simulated wall time, s.
    pub duration: f64,
    /// Tick length, s.
    pub tick: f64,
    /// Stand-in power model: battery percent lost per airborne second.
    pub battery_drain: f64,
    /// Seconds between telemetry samples.
    pub sample_interval: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            duration: 120.0,
            tick: 1.0 / 60.0,
            battery_drain: 0.0,
            sample_interval: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario driver
// ---------------------------------------------------------------------------

/// Drive a supervisor for a fixed duration and collect telemetry.
///
/// The drain model is deliberately simple (linear while airborne, off on
/// the pad) — enough to exercise the battery policy without simulating
/// motor current.
pub fn run_scenario<S: SceneIndex>(
    supervisor: &mut Supervisor<S>,
    config: &ScenarioConfig,
) -> Vec<Snapshot> {
    let steps = (config.duration / config.tick).ceil() as usize;
    let samples = (config.duration / config.sample_interval).ceil() as usize;
    let mut telemetry = Vec::with_capacity(samples + 1);
    let mut sample_timer = config.sample_interval;

    for _ in 0..steps {
        if config.battery_drain > 0.0 {
            let on_pad = supervisor
                .landing()
                .map_or(false, |l| l.phase() == LandingPhase::Landed);
            if !on_pad {
                let drop = config.battery_drain * config.tick;
                let sensors = supervisor.sensors_mut();
                sensors.battery = (sensors.battery - drop).max(0.0);
            }
        }

        supervisor.tick(config.tick);

        sample_timer += config.tick;
        if sample_timer >= config.sample_interval {
            sample_timer = 0.0;
            telemetry.push(snapshot(supervisor));
        }
    }

    telemetry
}

fn snapshot<S: SceneIndex>(supervisor: &Supervisor<S>) -> Snapshot {
    let landing = supervisor.landing();
    let avoidance = supervisor.avoidance_output();
    Snapshot {
        time: supervisor.time(),
        position: supervisor.pose().position,
        speed: supervisor.flight_state().velocity.norm(),
        battery: supervisor.sensors().battery,
        battery_status: supervisor.battery_status(),
        control_source: supervisor.flight_state().control_source,
        landing_phase: landing.map_or(LandingPhase::Idle, |l| l.phase()),
        landing_progress: landing.map_or(0.0, |l| l.progress()),
        charging: landing.map_or(false, |l| l.is_charging()),
        avoidance_active: avoidance.map_or(false, |a| a.active),
        nearest_obstacle: avoidance.map_or(f64::INFINITY, |a| a.nearest_distance),
        position_accuracy: supervisor.sensors().position_accuracy,
        position_source: supervisor.sensors().position_source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
