//! Configuration: every threshold the reasoning components use.
//!
//! Each component gets its own sub-config whose `Default` reproduces the
//! tuned constants. [`SpatialReasoningConfig`] bundles them and is passed to
//! constructors; nothing reads thresholds from globals.

use serde::{Deserialize, Serialize};

use crate::perception::config::{PoseConfig, ReconstructionConfig};

/// Errors raised while parsing or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Relation calculator
// ---------------------------------------------------------------------------

/// Tuning parameters for agent-relative relations and constraint scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    /// Below this ground distance a landmark is `near` and a `near`
    /// constraint scores 1.0.
    pub near_distance: f64,
    /// Above this ground distance a landmark is `far` and a `far`
    /// constraint scores 1.0.
    pub far_distance: f64,
    /// Added to the averaged constraint score of a visible candidate.
    pub visibility_bonus: f64,
    /// Score returned when an instruction carries no constraints.
    pub neutral_score: f64,
    /// Confidence when no constraints exist and the closest visible candidate
    /// is chosen.
    pub closest_visible_confidence: f64,
    /// Confidence when no constraints exist and nothing is visible.
    pub closest_any_confidence: f64,
    /// Scene object types that act as landmarks.
    pub landmark_types: Vec<String>,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            near_distance: 1.5,
            far_distance: 3.0,
            visibility_bonus: 0.1,
            neutral_score: 0.5,
            closest_visible_confidence: 0.6,
            closest_any_confidence: 0.3,
            landmark_types: ["Window", "Door", "DoorFrame", "Wall"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ambiguity detection and resolution
// ---------------------------------------------------------------------------

/// Thresholds for the ambiguity detector, heuristic selection and the
/// numbered-reference resolver. The three call sites keep separate cutoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbiguityConfig {
    /// Spatial confidence above which `detect_ambiguity` resolves.
    pub resolved_threshold: f64,
    /// Spatial confidence above which `detect_ambiguity` recommends a
    /// candidate while still asking.
    pub recommend_threshold: f64,
    /// Spatial confidence above which heuristic selection resolves.
    pub heuristic_spatial_threshold: f64,
    pub single_visible_confidence: f64,
    pub closest_confidence: f64,
    pub default_selection_confidence: f64,
    /// Candidates closer than this are described as "nearby".
    pub nearby_distance: f64,
    /// Largest candidate count enumerated in a simple clarification.
    pub max_enumerated: usize,
    /// Confidence for a resolved numbered model reference.
    pub numbered_response_confidence: f64,
    /// Confidence for the first element of a spatial fallback sort.
    pub spatial_fallback_confidence: f64,
}

impl Default for AmbiguityConfig {
    fn default() -> Self {
        Self {
            resolved_threshold: 0.7,
            recommend_threshold: 0.4,
            heuristic_spatial_threshold: 0.5,
            single_visible_confidence: 0.8,
            closest_confidence: 0.4,
            default_selection_confidence: 0.3,
            nearby_distance: 2.0,
            max_enumerated: 3,
            numbered_response_confidence: 0.8,
            spatial_fallback_confidence: 0.6,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometric analysis
// ---------------------------------------------------------------------------

/// Tuning parameters for shape classification and observation strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Aspect ratio at or below which a shape is compact.
    pub compact_aspect_ratio: f64,
    /// Aspect ratio at or below which a shape is elongated; above it, linear.
    pub linear_aspect_ratio: f64,
    pub small_volume: f64,
    pub small_surface_area: f64,
    pub large_volume: f64,
    pub large_surface_area: f64,
    pub large_max_dimension: f64,
    /// Volume above which two extra viewpoints are added instead of one.
    pub very_large_volume: f64,
    /// Multiplier from footprint size to observation distance.
    pub base_distance_factor: f64,
    /// Objects taller than this are observed from further away.
    pub tall_height: f64,
    /// Relative distance increase per metre above `tall_height`.
    pub height_distance_slope: f64,
    pub linear_distance_factor: f64,
    pub compact_distance_factor: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Viewpoint count before volume, aspect and height bonuses.
    pub base_viewpoints: usize,
    /// Aspect ratio above which two extra viewpoints are added.
    pub high_aspect_ratio: f64,
    /// Aspect ratio above which one extra viewpoint is added.
    pub moderate_aspect_ratio: f64,
    /// Height above which one extra viewpoint is added.
    pub extra_view_height: f64,
    pub max_viewpoints: usize,
    pub single_view_coverage: f64,
    pub multi_view_coverage: f64,
    pub adaptive_coverage: f64,
    /// Approach distance as a multiple of the optimal distance, per regime.
    pub single_view_approach_factor: f64,
    pub multi_view_approach_factor: f64,
    pub adaptive_approach_factor: f64,
    /// Lower bound on the multi-view approach distance.
    pub multi_view_min_approach: f64,
    /// Adaptive objects above this aspect ratio get three bearings instead
    /// of two.
    pub adaptive_three_view_aspect: f64,
    /// Accepted ground-distance band around the approach distance, as
    /// multipliers `(low, high)`.
    pub positioning_band: (f64, f64),
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            compact_aspect_ratio: 1.5,
            linear_aspect_ratio: 3.0,
            small_volume: 0.2,
            small_surface_area: 0.5,
            large_volume: 1.0,
            large_surface_area: 1.0,
            large_max_dimension: 2.0,
            very_large_volume: 2.0,
            base_distance_factor: 1.5,
            tall_height: 1.5,
            height_distance_slope: 0.3,
            linear_distance_factor: 1.3,
            compact_distance_factor: 0.9,
            min_distance: 0.5,
            max_distance: 3.0,
            base_viewpoints: 2,
            high_aspect_ratio: 4.0,
            moderate_aspect_ratio: 2.5,
            extra_view_height: 2.0,
            max_viewpoints: 6,
            single_view_coverage: 0.95,
            multi_view_coverage: 0.85,
            adaptive_coverage: 0.80,
            single_view_approach_factor: 0.8,
            multi_view_approach_factor: 1.2,
            adaptive_approach_factor: 0.9,
            multi_view_min_approach: 1.0,
            adaptive_three_view_aspect: 2.0,
            positioning_band: (0.8, 1.5),
        }
    }
}

// ---------------------------------------------------------------------------
// User interaction
// ---------------------------------------------------------------------------

/// Parameters of the clarification dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// How long to wait for a user reply before taking the recommendation.
    pub reply_timeout_ms: u64,
    /// Confidence gap, in percentage points, between the two best candidates
    /// above which the best one is picked without asking.
    pub auto_select_gap: f64,
    /// Landmarks within this distance appear in spatial descriptions.
    pub landmark_radius: f64,
    pub landmark_types: Vec<String>,
    /// Confidence percentage assumed when a model reply carries none.
    pub default_confidence: u32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 30_000,
            auto_select_gap: 30.0,
            landmark_radius: 2.0,
            landmark_types: ["Window", "Door", "Sink", "Stove"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_confidence: 25,
        }
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Switches and timeouts for the navigation planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// When false the planner takes the first candidate and skips
    /// disambiguation and geometric positioning.
    pub enable_enhancements: bool,
    pub use_spatial_reasoning: bool,
    pub use_geometric_analysis: bool,
    /// A detector selection is followed only above this confidence;
    /// otherwise the planner falls back to the closest candidate.
    pub accept_confidence: f64,
    /// Timeout passed to the model service.
    pub model_timeout_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            enable_enhancements: true,
            use_spatial_reasoning: true,
            use_geometric_analysis: true,
            accept_confidence: 0.5,
            model_timeout_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Aggregated configuration for every spatial-reasoning component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialReasoningConfig {
    pub relation: RelationConfig,
    pub ambiguity: AmbiguityConfig,
    pub geometry: GeometryConfig,
    pub reconstruction: ReconstructionConfig,
    pub pose: PoseConfig,
    pub interaction: InteractionConfig,
    pub navigation: NavigationConfig,
}

impl SpatialReasoningConfig {
    /// Parse a (possibly partial) JSON document; missing fields take their
    /// defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject threshold combinations that would make the rule chains
    /// inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.relation;
        if !(r.near_distance > 0.0 && r.near_distance < r.far_distance) {
            return Err(ConfigError::Invalid(format!(
                "relation.near_distance ({}) must be positive and below far_distance ({})",
                r.near_distance, r.far_distance
            )));
        }

        let a = &self.ambiguity;
        let unit = [
            ("relation.visibility_bonus", r.visibility_bonus),
            ("relation.neutral_score", r.neutral_score),
            ("relation.closest_visible_confidence", r.closest_visible_confidence),
            ("relation.closest_any_confidence", r.closest_any_confidence),
            ("ambiguity.resolved_threshold", a.resolved_threshold),
            ("ambiguity.recommend_threshold", a.recommend_threshold),
            ("ambiguity.heuristic_spatial_threshold", a.heuristic_spatial_threshold),
            ("ambiguity.single_visible_confidence", a.single_visible_confidence),
            ("ambiguity.closest_confidence", a.closest_confidence),
            ("ambiguity.default_selection_confidence", a.default_selection_confidence),
            ("ambiguity.numbered_response_confidence", a.numbered_response_confidence),
            ("ambiguity.spatial_fallback_confidence", a.spatial_fallback_confidence),
            ("navigation.accept_confidence", self.navigation.accept_confidence),
            ("geometry.single_view_coverage", self.geometry.single_view_coverage),
            ("geometry.multi_view_coverage", self.geometry.multi_view_coverage),
            ("geometry.adaptive_coverage", self.geometry.adaptive_coverage),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if a.recommend_threshold >= a.resolved_threshold {
            return Err(ConfigError::Invalid(format!(
                "ambiguity.recommend_threshold ({}) must be below resolved_threshold ({})",
                a.recommend_threshold, a.resolved_threshold
            )));
        }

        let g = &self.geometry;
        if g.compact_aspect_ratio < 1.0 || g.compact_aspect_ratio >= g.linear_aspect_ratio {
            return Err(ConfigError::Invalid(format!(
                "geometry aspect thresholds must satisfy 1 <= compact ({}) < linear ({})",
                g.compact_aspect_ratio, g.linear_aspect_ratio
            )));
        }
        if !(g.min_distance > 0.0 && g.min_distance <= g.max_distance) {
            return Err(ConfigError::Invalid(format!(
                "geometry distance clamp [{}, {}] is empty",
                g.min_distance, g.max_distance
            )));
        }
        if g.max_viewpoints == 0 {
            return Err(ConfigError::Invalid(
                "geometry.max_viewpoints must be at least 1".into(),
            ));
        }
        if g.large_volume > g.very_large_volume {
            return Err(ConfigError::Invalid(format!(
                "geometry.large_volume ({}) must not exceed very_large_volume ({})",
                g.large_volume, g.very_large_volume
            )));
        }
        if g.moderate_aspect_ratio > g.high_aspect_ratio {
            return Err(ConfigError::Invalid(format!(
                "geometry.moderate_aspect_ratio ({}) must not exceed high_aspect_ratio ({})",
                g.moderate_aspect_ratio, g.high_aspect_ratio
            )));
        }
        let positive = [
            ("geometry.base_distance_factor", g.base_distance_factor),
            ("geometry.linear_distance_factor", g.linear_distance_factor),
            ("geometry.compact_distance_factor", g.compact_distance_factor),
            ("geometry.single_view_approach_factor", g.single_view_approach_factor),
            ("geometry.multi_view_approach_factor", g.multi_view_approach_factor),
            ("geometry.adaptive_approach_factor", g.adaptive_approach_factor),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if g.height_distance_slope < 0.0 || g.multi_view_min_approach < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "geometry.height_distance_slope ({}) and multi_view_min_approach ({}) must not be negative",
                g.height_distance_slope, g.multi_view_min_approach
            )));
        }
        if self.interaction.default_confidence > 100 {
            return Err(ConfigError::Invalid(format!(
                "interaction.default_confidence ({}) is a percentage",
                self.interaction.default_confidence
            )));
        }
        if g.positioning_band.0 > g.positioning_band.1 {
            return Err(ConfigError::Invalid(format!(
                "geometry.positioning_band ({}, {}) is inverted",
                g.positioning_band.0, g.positioning_band.1
            )));
        }

        self.reconstruction.validate()?;
        self.pose.validate()?;
        Ok(())
    }
}
