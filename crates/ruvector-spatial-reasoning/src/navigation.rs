//! Navigation planning: which object to approach, from where, facing how.
//!
//! [`NavigationPlanner`] composes the reasoning components. For a requested
//! object type it gathers candidates from the scene, disambiguates when more
//! than one exists, derives an observation strategy and ranks the reachable
//! stand-off positions. Execution (teleporting, camera control) belongs to
//! the caller.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bridge::{CandidateObject, NavigationConfig, Point3D, SceneView, SpatialReasoningConfig};
use crate::disambiguation::{
    EnhancedAmbiguityResolver, HeuristicAmbiguityDetector, ResolutionMethod,
};
use crate::geometry::{GeometricAnalyzer, ObservationStrategy, ScoredPosition};
use crate::perception::{
    slice_regions, BoxSignature, PointCloudReconstructor, PoseEstimator, RegionSchema, SensorFrame,
    SpatialSignature,
};
use crate::relations::{bearing_degrees, SpatialRelationCalculator};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// How the planner arrived at its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    SingleCandidate,
    /// Enhancements are off; the first candidate is used as-is.
    Baseline,
    /// The detector's selection was confident enough to follow.
    Disambiguated,
    /// The detector asked for clarification; the closest candidate is used.
    ClosestFallback,
    FirstCandidate,
    /// A model reply named or implied the target.
    ModelResponse(ResolutionMethod),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPlan {
    pub object_id: String,
    pub object_type: String,
    pub source: PlanSource,
    pub confidence: f64,
    pub strategy: ObservationStrategy,
    /// Best-ranked reachable position, when positions were supplied and
    /// geometric analysis is on.
    pub best_position: Option<ScoredPosition>,
    /// Yaw that faces the object from `best_position`, in `[0, 360)`.
    pub facing_yaw: Option<f64>,
    /// Question the detector would have asked, kept for the caller.
    pub clarification_question: Option<String>,
}

/// Counters of how often each enhancement ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementStats {
    pub ambiguity_resolutions: u64,
    pub spatial_calculations: u64,
    pub geometric_optimizations: u64,
    pub fallback_uses: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    ambiguity_resolutions: AtomicU64,
    spatial_calculations: AtomicU64,
    geometric_optimizations: AtomicU64,
    fallback_uses: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> EnhancementStats {
        EnhancementStats {
            ambiguity_resolutions: self.ambiguity_resolutions.load(Ordering::Relaxed),
            spatial_calculations: self.spatial_calculations.load(Ordering::Relaxed),
            geometric_optimizations: self.geometric_optimizations.load(Ordering::Relaxed),
            fallback_uses: self.fallback_uses.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for c in [
            &self.ambiguity_resolutions,
            &self.spatial_calculations,
            &self.geometric_optimizations,
            &self.fallback_uses,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Yaw for an agent at `from` to face `target`, in `[0, 360)`.
pub fn facing_yaw(from: &Point3D, target: &Point3D) -> f64 {
    bearing_degrees(from, target)
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

pub struct NavigationPlanner {
    config: SpatialReasoningConfig,
    scene: Arc<dyn SceneView>,
    calculator: SpatialRelationCalculator,
    detector: HeuristicAmbiguityDetector,
    analyzer: GeometricAnalyzer,
    resolver: EnhancedAmbiguityResolver,
    reconstructor: PointCloudReconstructor,
    pose: PoseEstimator,
    enhancements: AtomicBool,
    stats: StatCounters,
}

impl std::fmt::Debug for NavigationPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationPlanner")
            .field("enhancements", &self.enhancements_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl NavigationPlanner {
    pub fn new(config: SpatialReasoningConfig, scene: Arc<dyn SceneView>) -> Self {
        let calculator =
            SpatialRelationCalculator::new(config.relation.clone()).with_scene(Arc::clone(&scene));
        let detector_calculator = config
            .navigation
            .use_spatial_reasoning
            .then(|| calculator.clone());
        Self {
            detector: HeuristicAmbiguityDetector::new(config.ambiguity.clone(), detector_calculator),
            analyzer: GeometricAnalyzer::new(config.geometry.clone()),
            resolver: EnhancedAmbiguityResolver::new(config.ambiguity.clone()),
            reconstructor: PointCloudReconstructor::new(config.reconstruction.clone()),
            pose: PoseEstimator::new(config.pose.clone()),
            enhancements: AtomicBool::new(config.navigation.enable_enhancements),
            stats: StatCounters::default(),
            calculator,
            scene,
            config,
        }
    }

    pub fn navigation_config(&self) -> &NavigationConfig {
        &self.config.navigation
    }

    pub fn enhancements_enabled(&self) -> bool {
        self.enhancements.load(Ordering::Relaxed)
    }

    pub fn set_enhancements_enabled(&self, enabled: bool) {
        self.enhancements.store(enabled, Ordering::Relaxed);
        tracing::info!("Spatial enhancements {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn stats(&self) -> EnhancementStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Scene objects of `object_type`, first occurrence of each id kept.
    pub fn candidates(&self, object_type: &str) -> Vec<CandidateObject> {
        let mut seen = HashSet::new();
        self.scene
            .objects_of_type(object_type)
            .into_iter()
            .filter(|o| seen.insert(o.object_id.clone()))
            .cloned()
            .collect()
    }

    /// Plan an approach to an object of `object_type`. `instruction`
    /// defaults to `"navigate to <type>"`. `None` when the scene has no
    /// such object.
    pub fn plan(
        &self,
        object_type: &str,
        instruction: Option<&str>,
        reachable: &[Point3D],
    ) -> Option<NavigationPlan> {
        let candidates = self.candidates(object_type);
        let Some(first) = candidates.first() else {
            tracing::warn!("No {} in the scene", object_type);
            return None;
        };

        if !self.enhancements_enabled() {
            let confidence = if candidates.len() == 1 {
                1.0
            } else {
                self.config.ambiguity.default_selection_confidence
            };
            return Some(self.plan_for(first, PlanSource::Baseline, confidence, None, reachable));
        }
        if candidates.len() == 1 {
            return Some(self.plan_for(first, PlanSource::SingleCandidate, 1.0, None, reachable));
        }

        self.stats.ambiguity_resolutions.fetch_add(1, Ordering::Relaxed);
        let default_instruction = format!("navigate to {}", object_type.to_lowercase());
        let instruction = instruction.unwrap_or(&default_instruction);
        let result = self.detector.detect_ambiguity(instruction, &candidates);

        if result.confidence > self.config.navigation.accept_confidence {
            if let Some(target) = result
                .selected_object_id
                .as_deref()
                .and_then(|id| candidates.iter().find(|c| c.object_id == id))
            {
                return Some(self.plan_for(
                    target,
                    PlanSource::Disambiguated,
                    result.confidence,
                    None,
                    reachable,
                ));
            }
        }

        self.stats.fallback_uses.fetch_add(1, Ordering::Relaxed);
        if let Some(question) = result.clarification_question {
            tracing::info!("Ambiguity for '{}': {}", instruction, question);
            self.stats.spatial_calculations.fetch_add(1, Ordering::Relaxed);
            let relations = self.calculator.calculate_relative_positions(&candidates, None);
            let closest = relations
                .iter()
                .min_by(|a, b| {
                    a.distance_to_agent
                        .partial_cmp(&b.distance_to_agent)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .and_then(|r| candidates.iter().find(|c| c.object_id == r.object_id));
            if let Some(target) = closest {
                return Some(self.plan_for(
                    target,
                    PlanSource::ClosestFallback,
                    self.config.ambiguity.closest_confidence,
                    Some(question),
                    reachable,
                ));
            }
        }

        Some(self.plan_for(
            first,
            PlanSource::FirstCandidate,
            self.config.ambiguity.default_selection_confidence,
            None,
            reachable,
        ))
    }

    /// Plan toward the object a model reply refers to, such as
    /// `"navigate to vase2"`. `None` when enhancements are off or nothing
    /// could be resolved.
    pub fn plan_with_model_response(
        &self,
        object_type: &str,
        model_response: &str,
        instruction: &str,
        reachable: &[Point3D],
    ) -> Option<NavigationPlan> {
        if !self.enhancements_enabled() {
            return None;
        }
        let candidates = self.candidates(object_type);
        let agent = self.scene.agent_pose();
        let resolved =
            self.resolver
                .resolve_object_reference(instruction, &candidates, model_response, Some(&agent));
        let id = resolved.selected_object_id?;
        let target = candidates.iter().find(|c| c.object_id == id)?;
        tracing::info!("Model reply resolved by {}: {}", resolved.method, resolved.reasoning);
        Some(self.plan_for(
            target,
            PlanSource::ModelResponse(resolved.method),
            resolved.confidence,
            None,
            reachable,
        ))
    }

    fn plan_for(
        &self,
        target: &CandidateObject,
        source: PlanSource,
        confidence: f64,
        clarification_question: Option<String>,
        reachable: &[Point3D],
    ) -> NavigationPlan {
        let strategy = self.analyzer.analyze_observation_requirements(target);
        let use_geometry = self.enhancements_enabled() && self.config.navigation.use_geometric_analysis;

        let best_position = if use_geometry && !reachable.is_empty() {
            self.stats.geometric_optimizations.fetch_add(1, Ordering::Relaxed);
            self.analyzer
                .get_enhanced_positioning_strategy(target, reachable)
                .into_iter()
                .next()
        } else {
            None
        };
        let facing_yaw = best_position
            .as_ref()
            .map(|p| facing_yaw(&p.position, &target.position));

        tracing::debug!(
            object_id = %target.object_id,
            source = ?source,
            confidence,
            viewpoints = strategy.viewpoint_count,
            "navigation planned"
        );
        NavigationPlan {
            object_id: target.object_id.clone(),
            object_type: target.object_type.clone(),
            source,
            confidence,
            strategy,
            best_position,
            facing_yaw,
            clarification_question,
        }
    }

    /// Region centres of the planned target when its type has a schema.
    pub fn target_regions(&self, plan: &NavigationPlan) -> Option<BTreeMap<String, Vector3<f64>>> {
        let schema = RegionSchema::for_object_type(&plan.object_type)?;
        let obj = self.scene.object_by_id(&plan.object_id)?;
        Some(slice_regions(&BoxSignature::from_candidate(obj), schema))
    }

    /// Reconstruct the planned target from a frame and fit its pose.
    /// `instance_ids` maps object ids to instance-map values.
    pub fn ground_target(
        &self,
        plan: &NavigationPlan,
        frame: &SensorFrame,
        instance_ids: &BTreeMap<String, u32>,
    ) -> crate::perception::Result<SpatialSignature> {
        let (cloud, report) = self
            .reconstructor
            .reconstruct_object(frame, &plan.object_id, instance_ids);
        tracing::debug!(
            object_id = %report.object_id,
            n_points = report.n_points,
            "target reconstructed"
        );
        let bbox = self.scene.object_by_id(&plan.object_id).map(|o| o.aabb);
        self.pose
            .create_spatial_signature_from_pose(&plan.object_id, &plan.object_type, &cloud, bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{AgentPose, SceneSnapshot};
    use crate::disambiguation::SortStrategy;

    fn book(id: &str, x: f64, z: f64) -> CandidateObject {
        CandidateObject::new(id, "Book", Point3D::new(x, 0.8, z)).with_size(0.2, 0.05, 0.3)
    }

    fn scene() -> Arc<dyn SceneView> {
        Arc::new(SceneSnapshot::new(
            AgentPose::default(),
            vec![
                book("Book|L", -0.47, 0.0),
                book("Book|R", 0.42, 1.5),
                CandidateObject::new("Sofa|1", "Sofa", Point3D::new(0.0, 0.4, 3.0))
                    .with_size(2.5, 0.8, 1.2),
            ],
        ))
    }

    fn planner() -> NavigationPlanner {
        NavigationPlanner::new(SpatialReasoningConfig::default(), scene())
    }

    #[test]
    fn test_single_candidate_plan() {
        let p = planner();
        let reachable = [Point3D::new(0.0, 0.0, 0.5), Point3D::new(0.0, 0.0, 10.0)];
        let plan = p.plan("Sofa", None, &reachable).unwrap();
        assert_eq!(plan.source, PlanSource::SingleCandidate);
        assert_eq!(plan.confidence, 1.0);
        assert_eq!(plan.strategy.viewpoint_count, 4);
        let best = plan.best_position.unwrap();
        assert_eq!(best.position, reachable[0]);
        // object straight ahead along +z
        assert!(plan.facing_yaw.unwrap().abs() < 1e-9);
        assert_eq!(p.stats().ambiguity_resolutions, 0);
        assert_eq!(p.stats().geometric_optimizations, 1);
    }

    #[test]
    fn test_spatial_instruction_disambiguates() {
        let p = planner();
        let plan = p.plan("Book", Some("pick up the book on the left"), &[]).unwrap();
        assert_eq!(plan.object_id, "Book|L");
        assert_eq!(plan.source, PlanSource::Disambiguated);
        assert!(plan.confidence >= 0.7);
        assert!(plan.best_position.is_none());
        assert_eq!(p.stats().ambiguity_resolutions, 1);
        assert_eq!(p.stats().fallback_uses, 0);
    }

    #[test]
    fn test_unconstrained_falls_back_to_closest() {
        let p = planner();
        let plan = p.plan("Book", None, &[]).unwrap();
        assert_eq!(plan.source, PlanSource::ClosestFallback);
        assert_eq!(plan.object_id, "Book|L");
        assert!(plan.clarification_question.unwrap().contains("Book"));
        let stats = p.stats();
        assert_eq!(stats.fallback_uses, 1);
        assert_eq!(stats.spatial_calculations, 1);

        p.reset_stats();
        assert_eq!(p.stats(), EnhancementStats::default());
    }

    #[test]
    fn test_disabled_enhancements_use_baseline() {
        let p = planner();
        p.set_enhancements_enabled(false);
        let plan = p
            .plan("Book", Some("the right book"), &[Point3D::new(1.0, 0.0, 1.0)])
            .unwrap();
        assert_eq!(plan.source, PlanSource::Baseline);
        assert_eq!(plan.object_id, "Book|L");
        assert!(plan.best_position.is_none());
        assert_eq!(p.stats(), EnhancementStats::default());
        assert!(p.plan_with_model_response("Book", "book1", "", &[]).is_none());
    }

    #[test]
    fn test_missing_type() {
        assert!(planner().plan("Television", None, &[]).is_none());
    }

    #[test]
    fn test_model_response_plan() {
        let p = planner();
        let plan = p
            .plan_with_model_response("Book", "navigate to book2", "find a book", &[])
            .unwrap();
        assert_eq!(plan.object_id, "Book|R");
        assert_eq!(plan.source, PlanSource::ModelResponse(ResolutionMethod::NumberedResponse));
        assert!((plan.confidence - 0.8).abs() < 1e-12);

        let plan = p
            .plan_with_model_response("Book", "I think it's over there", "the closest book", &[])
            .unwrap();
        assert_eq!(
            plan.source,
            PlanSource::ModelResponse(ResolutionMethod::SpatialFallback(SortStrategy::DistanceBased))
        );
        assert_eq!(plan.object_id, "Book|L");
    }

    #[test]
    fn test_facing_yaw_quadrants() {
        let o = Point3D::origin();
        assert!((facing_yaw(&o, &Point3D::new(1.0, 0.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((facing_yaw(&o, &Point3D::new(0.0, 0.0, -1.0)) - 180.0).abs() < 1e-9);
        assert!((facing_yaw(&o, &Point3D::new(-1.0, 0.0, 0.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_regions() {
        let p = planner();
        let plan = p.plan("Sofa", None, &[]).unwrap();
        let regions = p.target_regions(&plan).unwrap();
        assert!(regions.contains_key("left_arm"));
        let book_plan = p.plan("Book", Some("the left book"), &[]).unwrap();
        assert!(p.target_regions(&book_plan).is_none());
    }

    #[test]
    fn test_ground_target() {
        let p = planner();
        let plan = p.plan("Sofa", None, &[]).unwrap();
        let (w, h) = (8, 8);
        let depth = (0..w * h).map(|i| 2.0 + 0.01 * (i % w) as f32).collect();
        let frame = SensorFrame::new(w, h, depth, vec![[120, 80, 40]; w * h])
            .unwrap()
            .with_instances((0..w * h).map(|i| if i % w < 6 { 5 } else { 0 }).collect())
            .unwrap();
        let mut ids = BTreeMap::new();
        ids.insert("Sofa|1".to_string(), 5);
        let sig = p.ground_target(&plan, &frame, &ids).unwrap();
        assert_eq!(sig.object_id, "Sofa|1");
        assert_eq!(sig.point_cloud.len(), 48);
        assert!(sig.bounding_box.is_some());
        assert!(sig.confidence > 0.0);
    }
}
