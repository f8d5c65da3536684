// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{FdmError, FdmResult};

/// Tuning for the sensor blending engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// A sensor whose valid samples span no more than this range is
    /// treated as stalled and left out of a blend while another varies.
    /// Default: 1e-9 (exactly constant within float noise).
    pub stall_epsilon: f64,

    /// Weight given to a valid sample adjacent to a masked one.
    /// Default: 0.05.
    pub boundary_weight: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            stall_epsilon: 1e-9,
            boundary_weight: 0.05,
        }
    }
}

/// Runtime configuration for the derivation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest masked run (seconds) that `repair_mask` fills when a
    /// formula repairs with the engine default.
    /// Default: 10.0.
    pub repair_duration_s: f64,

    /// Fractional sample positions closer than this to an integer are
    /// treated as landing exactly on a sample.
    /// Default: 1e-9.
    pub snap_tolerance: f64,

    /// Evaluate independent nodes of one graph level concurrently.
    /// Default: true.
    pub parallel: bool,

    /// Worker threads for parallel evaluation; 0 lets rayon decide.
    /// Default: 0.
    pub max_workers: usize,

    /// Fail a node whose output length disagrees with the recording
    /// duration by more than one sample.
    /// Default: true.
    pub check_duration: bool,

    pub blend: BlendConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repair_duration_s: 10.0,
            snap_tolerance: 1e-9,
            parallel: true,
            max_workers: 0,
            check_duration: true,
            blend: BlendConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> FdmResult<()> {
        if !self.repair_duration_s.is_finite() || self.repair_duration_s < 0.0 {
            return Err(FdmError::Config(format!(
                "repair_duration_s must be finite and >= 0, got {}",
                self.repair_duration_s
            )));
        }
        if !(0.0..0.5).contains(&self.snap_tolerance) {
            return Err(FdmError::Config(format!(
                "snap_tolerance must be in [0, 0.5), got {}",
                self.snap_tolerance
            )));
        }
        if !self.blend.stall_epsilon.is_finite() || self.blend.stall_epsilon < 0.0 {
            return Err(FdmError::Config(format!(
                "blend.stall_epsilon must be finite and >= 0, got {}",
                self.blend.stall_epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.blend.boundary_weight) {
            return Err(FdmError::Config(format!(
                "blend.boundary_weight must be in [0, 1], got {}",
                self.blend.boundary_weight
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> FdmResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FdmError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
