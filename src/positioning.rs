use log::debug;
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::flight::state::DronePose;
use crate::scene::SceneIndex;

// ---------------------------------------------------------------------------
// Position estimate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
    Uwb,
    Visual,
    Fusion,
    Imu,
}

impl EstimateSource {
    pub fn label(self) -> &'static str {
        match self {
            EstimateSource::Uwb => "uwb",
            EstimateSource::Visual => "visual",
            EstimateSource::Fusion => "fusion",
            EstimateSource::Imu => "imu",
        }
    }
}

/// Best-estimate position with its expected error. Recomputed every
/// positioning tick; not retained.
#[derive(Debug, Clone, Copy)]
pub struct PositionEstimate {
    pub position: Vector3<f64>,
    /// Expected error in meters; lower is better.
    pub accuracy: f64,
    pub source: EstimateSource,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub use_uwb: bool,
    pub use_visual: bool,
    /// UWB multilateration error bound per axis, m.
    pub max_error_uwb: f64,
    /// Visual-marker triangulation error bound per axis, m.
    pub max_error_visual: f64,
    /// Seconds between fusion updates.
    pub update_interval: f64,
    /// Max planar distance at which a ceiling marker is usable, m.
    pub visual_range: f64,
    /// Max vertical clearance to a marker, m.
    pub visual_clearance: f64,
    /// Accuracy assigned to the dead-reckoning fallback, m.
    pub dead_reckoning_accuracy: f64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            use_uwb: true,
            use_visual: true,
            max_error_uwb: 0.15,
            max_error_visual: 0.05,
            update_interval: 0.02,
            visual_range: 15.0,
            visual_clearance: 10.0,
            dead_reckoning_accuracy: 0.5,
        }
    }
}

// Accuracies are sampled away from zero so inverse-accuracy weights stay
// finite.
const MIN_ACCURACY: f64 = 1e-3;

impl PositioningConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_error_uwb <= MIN_ACCURACY || self.max_error_visual <= MIN_ACCURACY {
            return Err(format!(
                "sensor error bounds must exceed the {} m accuracy floor",
                MIN_ACCURACY
            ));
        }
        if self.visual_range <= 0.0 || self.visual_clearance <= 0.0 {
            return Err("visual marker geometry limits must be positive".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fusion rule
// ---------------------------------------------------------------------------

/// Inverse-accuracy weighted average of up to two estimates, falling back
/// to dead reckoning when neither is available. The lower-error source
/// always dominates; the fused accuracy `1/Σw` never exceeds the best
/// input's.
pub fn fuse_estimates(
    uwb: Option<PositionEstimate>,
    visual: Option<PositionEstimate>,
    fallback: &Vector3<f64>,
    fallback_accuracy: f64,
) -> PositionEstimate {
    match (uwb, visual) {
        (Some(u), Some(v)) => {
            let w_u = 1.0 / u.accuracy;
            let w_v = 1.0 / v.accuracy;
            let total = w_u + w_v;
            PositionEstimate {
                position: (u.position * w_u + v.position * w_v) / total,
                accuracy: 1.0 / total,
                source: EstimateSource::Fusion,
            }
        }
        (Some(u), None) => u,
        (None, Some(v)) => v,
        (None, None) => PositionEstimate {
            position: *fallback,
            accuracy: fallback_accuracy,
            source: EstimateSource::Imu,
        },
    }
}

// ---------------------------------------------------------------------------
// Positioning system
// ---------------------------------------------------------------------------

/// Simulated indoor positioning: noisy UWB multilateration fused with
/// noisy visual-marker triangulation, dead reckoning when both drop out.
#[derive(Debug, Clone)]
pub struct PositioningSystem {
    pub config: PositioningConfig,
    estimate: PositionEstimate,
}

impl PositioningSystem {
    pub fn new(config: PositioningConfig) -> Self {
        let dead_reckoning_accuracy = config.dead_reckoning_accuracy;
        Self {
            config,
            estimate: PositionEstimate {
                position: Vector3::zeros(),
                accuracy: dead_reckoning_accuracy,
                source: EstimateSource::Imu,
            },
        }
    }

    pub fn estimate(&self) -> &PositionEstimate {
        &self.estimate
    }

    /// One fusion tick: sample both estimators against the true pose and
    /// combine.
    pub fn update<R: Rng>(&mut self, scene: &dyn SceneIndex, pose: &DronePose, rng: &mut R) {
        let uwb = self.uwb_estimate(pose, rng);
        let visual = self.visual_estimate(scene, pose, rng);
        self.estimate = fuse_estimates(
            uwb,
            visual,
            &pose.position,
            self.config.dead_reckoning_accuracy,
        );
        debug!(
            "[Positioning] {} estimate, accuracy {:.3} m",
            self.estimate.source.label(),
            self.estimate.accuracy
        );
    }

    // True position plus bounded uniform noise, standing in for the
    // anchor-range multilateration solve.
    fn uwb_estimate<R: Rng>(&self, pose: &DronePose, rng: &mut R) -> Option<PositionEstimate> {
        if !self.config.use_uwb {
            return None;
        }
        let bound = self.config.max_error_uwb;
        let mut noise = || (rng.gen::<f64>() - 0.5) * 2.0 * bound;
        let position = pose.position + Vector3::new(noise(), noise(), noise());
        Some(PositionEstimate {
            position,
            accuracy: rng.gen_range(MIN_ACCURACY..bound),
            source: EstimateSource::Uwb,
        })
    }

    // Valid only with a ceiling marker overhead: nearest by planar
    // distance, above the drone, within clearance and range.
    fn visual_estimate<R: Rng>(
        &self,
        scene: &dyn SceneIndex,
        pose: &DronePose,
        rng: &mut R,
    ) -> Option<PositionEstimate> {
        if !self.config.use_visual {
            return None;
        }

        let mut min_planar = f64::INFINITY;
        let mut visible = false;
        for marker in scene.markers() {
            let dx = pose.position.x - marker.x;
            let dz = pose.position.z - marker.z;
            let planar = (dx * dx + dz * dz).sqrt();
            let clearance = marker.y - pose.position.y;
            if planar < min_planar && clearance > 0.0 && clearance <= self.config.visual_clearance
            {
                min_planar = planar;
                visible = true;
            }
        }
        if !visible || min_planar > self.config.visual_range {
            return None;
        }

        let bound = self.config.max_error_visual;
        let mut noise = || (rng.gen::<f64>() - 0.5) * 2.0 * bound;
        let position = pose.position + Vector3::new(noise(), noise(), noise());
        Some(PositionEstimate {
            position,
            accuracy: rng.gen_range(MIN_ACCURACY..bound),
            source: EstimateSource::Visual,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
