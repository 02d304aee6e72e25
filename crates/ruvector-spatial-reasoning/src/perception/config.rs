//! Configuration types for point-cloud reconstruction and pose estimation.

use serde::{Deserialize, Serialize};

use crate::bridge::ConfigError;

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Tuning parameters for depth-frame back-projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Depth readings beyond this range are invalid (metres).
    pub max_depth: f32,
    /// Horizontal field of view used for default intrinsics (degrees).
    pub fov_degrees: f64,
    /// Smooth depth with a 3x3 median over valid neighbours.
    pub median_filter: bool,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            max_depth: 20.0,
            fov_degrees: 90.0,
            median_filter: true,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_depth > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_depth must be positive, got {}",
                self.max_depth
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_degrees must lie in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pose estimation
// ---------------------------------------------------------------------------

/// How the centre of a point cloud is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterMethod {
    #[default]
    Mean,
    /// Per-axis median.
    Median,
    /// Weiszfeld iteration; robust to outliers.
    GeometricMedian,
}

impl CenterMethod {
    /// Centre method suited to an object type. Large soft furniture uses the
    /// geometric median; chairs and tables use the mean; other types get
    /// `fallback`.
    pub fn for_object_type(object_type: &str, fallback: CenterMethod) -> CenterMethod {
        match object_type.to_lowercase().as_str() {
            "sofa" | "couch" => CenterMethod::GeometricMedian,
            "chair" | "stool" | "table" | "desk" | "diningtable" => CenterMethod::Mean,
            _ => fallback,
        }
    }
}

/// Tuning parameters for PCA pose estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Clouds smaller than this yield the identity pose with zero confidence.
    pub min_points: usize,
    pub center_method: CenterMethod,
    pub geometric_median_max_iterations: usize,
    pub geometric_median_tolerance: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            center_method: CenterMethod::Mean,
            geometric_median_max_iterations: 100,
            geometric_median_tolerance: 1e-6,
        }
    }
}

impl PoseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometric_median_max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "geometric_median_max_iterations must be at least 1".into(),
            ));
        }
        if !(self.geometric_median_tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "geometric_median_tolerance must be positive, got {}",
                self.geometric_median_tolerance
            )));
        }
        Ok(())
    }
}
