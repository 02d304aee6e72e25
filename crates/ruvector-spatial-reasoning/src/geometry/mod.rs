//! Object geometry classification and observation strategies.
//!
//! Everything here works from the axis-aligned bounding box alone; no mesh
//! or point data is needed.

pub mod analyzer;

pub use analyzer::GeometricAnalyzer;

use serde::{Deserialize, Serialize};

use crate::bridge::{CandidateObject, GeometryConfig, Point3D};

/// Coarse shape class derived from the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Compact,
    Elongated,
    Linear,
}

impl ShapeType {
    /// `ar <= compact` is compact, `ar <= linear` is elongated, anything
    /// larger is linear.
    pub fn classify(aspect_ratio: f64, compact: f64, linear: f64) -> Self {
        if aspect_ratio <= compact {
            Self::Compact
        } else if aspect_ratio <= linear {
            Self::Elongated
        } else {
            Self::Linear
        }
    }
}

/// Derived AABB measurements of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectGeometry {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub volume: f64,
    pub surface_area: f64,
    pub max_dimension: f64,
    pub min_dimension: f64,
    /// `max / min`, or 1.0 when the smallest side is not positive.
    pub aspect_ratio: f64,
    pub shape_type: ShapeType,
}

impl ObjectGeometry {
    pub fn from_size(width: f64, height: f64, depth: f64, config: &GeometryConfig) -> Self {
        let max_dimension = width.max(height).max(depth);
        let min_dimension = width.min(height).min(depth);
        let aspect_ratio = if min_dimension > 0.0 {
            max_dimension / min_dimension
        } else {
            1.0
        };
        Self {
            width,
            height,
            depth,
            volume: width * height * depth,
            surface_area: 2.0 * (width * height + width * depth + height * depth),
            max_dimension,
            min_dimension,
            aspect_ratio,
            shape_type: ShapeType::classify(
                aspect_ratio,
                config.compact_aspect_ratio,
                config.linear_aspect_ratio,
            ),
        }
    }

    pub fn from_object(object: &CandidateObject, config: &GeometryConfig) -> Self {
        let s = object.aabb.size;
        Self::from_size(s.x, s.y, s.z, config)
    }
}

/// Observation regime chosen for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SingleView,
    MultiView,
    Adaptive,
}

/// How close to get and from which bearings to look.
///
/// `optimal_angles.len() == viewpoint_count` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationStrategy {
    pub strategy_type: StrategyType,
    pub optimal_distance: f64,
    /// Degrees around the object.
    pub optimal_angles: Vec<f64>,
    pub viewpoint_count: usize,
    pub coverage_threshold: f64,
    /// Target ground distance for the navigation stop.
    pub approach_distance: f64,
}

/// A reachable position annotated with its suitability for observing an
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosition {
    pub position: Point3D,
    pub distance_to_object: f64,
    /// In `[0, 1]`; 1.0 exactly at the approach distance.
    pub distance_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_thresholds_inclusive_on_lower_class() {
        assert_eq!(ShapeType::classify(1.5, 1.5, 3.0), ShapeType::Compact);
        assert_eq!(ShapeType::classify(1.5001, 1.5, 3.0), ShapeType::Elongated);
        assert_eq!(ShapeType::classify(3.0, 1.5, 3.0), ShapeType::Elongated);
        assert_eq!(ShapeType::classify(3.0001, 1.5, 3.0), ShapeType::Linear);
    }

    #[test]
    fn test_geometry_measurements() {
        let g = ObjectGeometry::from_size(2.5, 0.8, 1.2, &GeometryConfig::default());
        assert!((g.volume - 2.4).abs() < 1e-9);
        assert!((g.surface_area - 11.92).abs() < 1e-9);
        assert!((g.aspect_ratio - 3.125).abs() < 1e-9);
        assert_eq!(g.shape_type, ShapeType::Linear);
    }

    #[test]
    fn test_degenerate_side_gives_unit_aspect() {
        let g = ObjectGeometry::from_size(1.0, 0.0, 2.0, &GeometryConfig::default());
        assert!((g.aspect_ratio - 1.0).abs() < 1e-12);
        assert_eq!(g.shape_type, ShapeType::Compact);
    }
}
