//! Geometry-driven observation planning.

use std::cmp::Ordering;

use crate::bridge::{CandidateObject, GeometryConfig, Point3D};

use super::{ObjectGeometry, ObservationStrategy, ScoredPosition, ShapeType, StrategyType};

/// Chooses an [`ObservationStrategy`] from an object's bounding box and ranks
/// candidate navigation positions against it.
#[derive(Debug, Clone, Default)]
pub struct GeometricAnalyzer {
    config: GeometryConfig,
}

impl GeometricAnalyzer {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn geometry(&self, object: &CandidateObject) -> ObjectGeometry {
        ObjectGeometry::from_object(object, &self.config)
    }

    /// Classify the object as small, large/complex or in between and build
    /// the matching strategy.
    pub fn analyze_observation_requirements(&self, object: &CandidateObject) -> ObservationStrategy {
        let g = self.geometry(object);
        let strategy = if self.is_small(&g) {
            self.single_view(&g)
        } else if self.is_large_or_complex(&g) {
            self.multi_view(&g)
        } else {
            self.adaptive(&g)
        };
        tracing::debug!(
            object_id = %object.object_id,
            strategy = ?strategy.strategy_type,
            views = strategy.viewpoint_count,
            distance = strategy.optimal_distance,
            "observation strategy"
        );
        strategy
    }

    pub fn should_use_multiview_observation(&self, object: &CandidateObject) -> bool {
        let s = self.analyze_observation_requirements(object);
        matches!(s.strategy_type, StrategyType::MultiView | StrategyType::Adaptive)
            && s.viewpoint_count > 1
    }

    fn is_small(&self, g: &ObjectGeometry) -> bool {
        g.volume <= self.config.small_volume && g.surface_area <= self.config.small_surface_area
    }

    fn is_large_or_complex(&self, g: &ObjectGeometry) -> bool {
        g.volume > self.config.large_volume
            || g.surface_area > self.config.large_surface_area
            || g.max_dimension > self.config.large_max_dimension
            || g.aspect_ratio > self.config.linear_aspect_ratio
    }

    fn single_view(&self, g: &ObjectGeometry) -> ObservationStrategy {
        let optimal_distance = self.optimal_distance(g);
        ObservationStrategy {
            strategy_type: StrategyType::SingleView,
            optimal_distance,
            optimal_angles: vec![0.0],
            viewpoint_count: 1,
            coverage_threshold: self.config.single_view_coverage,
            approach_distance: (optimal_distance * self.config.single_view_approach_factor)
                .max(self.config.min_distance),
        }
    }

    fn multi_view(&self, g: &ObjectGeometry) -> ObservationStrategy {
        let optimal_distance = self.optimal_distance(g);
        let optimal_angles = self.viewing_angles(g, self.required_viewpoints(g));
        ObservationStrategy {
            strategy_type: StrategyType::MultiView,
            optimal_distance,
            viewpoint_count: optimal_angles.len(),
            optimal_angles,
            coverage_threshold: self.config.multi_view_coverage,
            approach_distance: (optimal_distance * self.config.multi_view_approach_factor)
                .max(self.config.multi_view_min_approach),
        }
    }

    fn adaptive(&self, g: &ObjectGeometry) -> ObservationStrategy {
        let optimal_distance = self.optimal_distance(g);
        let optimal_angles = if g.aspect_ratio > self.config.adaptive_three_view_aspect {
            vec![0.0, 90.0, 270.0]
        } else {
            vec![0.0, 180.0]
        };
        ObservationStrategy {
            strategy_type: StrategyType::Adaptive,
            optimal_distance,
            viewpoint_count: optimal_angles.len(),
            optimal_angles,
            coverage_threshold: self.config.adaptive_coverage,
            approach_distance: optimal_distance * self.config.adaptive_approach_factor,
        }
    }

    /// Footprint-proportional distance, stretched for tall and linear
    /// objects, clamped to the configured range.
    pub fn optimal_distance(&self, g: &ObjectGeometry) -> f64 {
        let mut d = g.width.max(g.depth) * self.config.base_distance_factor;
        let c = &self.config;
        if g.height > c.tall_height {
            d *= 1.0 + (g.height - c.tall_height) * c.height_distance_slope;
        }
        match g.shape_type {
            ShapeType::Linear => d *= c.linear_distance_factor,
            ShapeType::Compact => d *= c.compact_distance_factor,
            ShapeType::Elongated => {}
        }
        d.clamp(c.min_distance, c.max_distance)
    }

    fn required_viewpoints(&self, g: &ObjectGeometry) -> usize {
        let c = &self.config;
        let mut count = c.base_viewpoints;
        if g.volume > c.very_large_volume {
            count += 2;
        } else if g.volume > c.large_volume {
            count += 1;
        }
        if g.aspect_ratio > c.high_aspect_ratio {
            count += 2;
        } else if g.aspect_ratio > c.moderate_aspect_ratio {
            count += 1;
        }
        if g.height > c.extra_view_height {
            count += 1;
        }
        count.min(c.max_viewpoints)
    }

    /// Cardinal subsets for linear shapes, an even spread otherwise. The
    /// linear sets top out at four, so the caller takes the returned length
    /// as the viewpoint count.
    fn viewing_angles(&self, g: &ObjectGeometry, count: usize) -> Vec<f64> {
        if count <= 1 {
            return vec![0.0];
        }
        if g.shape_type == ShapeType::Linear {
            return match count {
                2 => vec![0.0, 180.0],
                3 => vec![0.0, 90.0, 270.0],
                _ => vec![0.0, 90.0, 180.0, 270.0],
            };
        }
        let step = 360.0 / count as f64;
        (0..count).map(|i| i as f64 * step).collect()
    }

    // -- positioning ----------------------------------------------------------

    /// Rank reachable positions for observing `object`.
    ///
    /// Positions whose ground distance lies within the configured band around
    /// the approach distance are kept; if none qualify, every position is
    /// scored. The result is sorted by score, best first, keeping input order
    /// among equal scores.
    pub fn get_enhanced_positioning_strategy(
        &self,
        object: &CandidateObject,
        positions: &[Point3D],
    ) -> Vec<ScoredPosition> {
        let strategy = self.analyze_observation_requirements(object);
        let approach = strategy.approach_distance;
        let (low, high) = self.config.positioning_band;

        let score = |p: &Point3D| {
            let d = p.ground_distance_to(&object.position);
            ScoredPosition {
                position: *p,
                distance_to_object: d,
                distance_score: distance_score(d, approach),
            }
        };

        let mut scored: Vec<ScoredPosition> = positions
            .iter()
            .map(score)
            .filter(|s| {
                s.distance_to_object >= approach * low && s.distance_to_object <= approach * high
            })
            .collect();

        if scored.is_empty() {
            tracing::debug!(
                "No position within [{:.2}, {:.2}] of {}, scoring all {}",
                approach * low,
                approach * high,
                object.object_id,
                positions.len()
            );
            scored = positions.iter().map(score).collect();
        }

        scored.sort_by(|a, b| {
            b.distance_score
                .partial_cmp(&a.distance_score)
                .unwrap_or(Ordering::Equal)
        });
        scored
    }
}

/// Peak of 1.0 at the approach distance, linear falloff on either side
/// (twice as steep beyond it).
fn distance_score(actual: f64, approach: f64) -> f64 {
    if actual <= 0.0 || approach <= 0.0 {
        return 0.0;
    }
    let ratio = actual / approach;
    if ratio <= 1.0 {
        ratio
    } else {
        (2.0 - ratio).max(0.0)
    }
}
