//! Spatial relation calculator: relations, constraint scoring and matching.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bridge::{CandidateObject, Point3D, RelationConfig, SceneView};

use super::keywords::{ConstraintKind, KeywordTable, SpatialConstraints};
use super::{
    bearing_degrees, ContainerRelation, Direction, LandmarkProximity, SpatialRelation,
    SpatialRelations,
};

/// Computes agent-relative relations for candidate objects and picks the
/// candidate that best satisfies an instruction's spatial constraints.
///
/// The optional scene supplies the agent position and the landmark objects.
/// Without a scene the agent is assumed at the origin and landmarks are
/// looked up among the candidates themselves.
#[derive(Clone)]
pub struct SpatialRelationCalculator {
    config: RelationConfig,
    keywords: KeywordTable,
    scene: Option<Arc<dyn SceneView>>,
}

impl std::fmt::Debug for SpatialRelationCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialRelationCalculator")
            .field("config", &self.config)
            .field("has_scene", &self.scene.is_some())
            .finish()
    }
}

impl Default for SpatialRelationCalculator {
    fn default() -> Self {
        Self::new(RelationConfig::default())
    }
}

impl SpatialRelationCalculator {
    pub fn new(config: RelationConfig) -> Self {
        Self {
            config,
            keywords: KeywordTable::default(),
            scene: None,
        }
    }

    /// Attach a scene collaborator.
    pub fn with_scene(mut self, scene: Arc<dyn SceneView>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn config(&self) -> &RelationConfig {
        &self.config
    }

    /// Agent position from the scene, or the origin when there is none.
    pub fn agent_position(&self) -> Point3D {
        self.scene
            .as_ref()
            .map(|s| s.agent_pose().position)
            .unwrap_or_default()
    }

    // -- relations ----------------------------------------------------------

    /// Compute a relation for every candidate, in candidate order.
    pub fn calculate_relative_positions(
        &self,
        candidates: &[CandidateObject],
        agent_position: Option<Point3D>,
    ) -> SpatialRelations {
        let agent = agent_position.unwrap_or_else(|| self.agent_position());
        let landmarks: Vec<&CandidateObject> = match &self.scene {
            Some(scene) => scene
                .objects()
                .iter()
                .filter(|o| self.is_landmark(o))
                .collect(),
            None => candidates.iter().filter(|o| self.is_landmark(o)).collect(),
        };

        let mut relations = SpatialRelations::default();
        for obj in candidates {
            let angle = bearing_degrees(&agent, &obj.position);
            relations.push(SpatialRelation {
                object_id: obj.object_id.clone(),
                distance_to_agent: agent.ground_distance_to(&obj.position),
                relative_direction: Direction::from_angle(angle),
                angle_to_agent: angle,
                is_visible: obj.visible,
                landmark_relations: self.landmark_relations(obj, &landmarks),
                container_relations: container_relations(obj),
            });
        }
        relations
    }

    fn is_landmark(&self, obj: &CandidateObject) -> bool {
        self.config
            .landmark_types
            .iter()
            .any(|t| *t == obj.object_type)
    }

    /// Band to the nearest landmark of each type. An object is never its
    /// own landmark.
    fn landmark_relations(
        &self,
        obj: &CandidateObject,
        landmarks: &[&CandidateObject],
    ) -> BTreeMap<String, LandmarkProximity> {
        let mut nearest: BTreeMap<String, f64> = BTreeMap::new();
        for lm in landmarks {
            if lm.object_id == obj.object_id {
                continue;
            }
            let d = obj.position.ground_distance_to(&lm.position);
            nearest
                .entry(lm.object_type.to_lowercase())
                .and_modify(|best| *best = best.min(d))
                .or_insert(d);
        }
        nearest
            .into_iter()
            .map(|(t, d)| {
                let band = if d < self.config.near_distance {
                    LandmarkProximity::Near
                } else if d > self.config.far_distance {
                    LandmarkProximity::Far
                } else {
                    LandmarkProximity::Medium
                };
                (t, band)
            })
            .collect()
    }

    // -- constraints ----------------------------------------------------------

    pub fn extract_spatial_constraints(&self, instruction: &str) -> SpatialConstraints {
        self.keywords.extract(instruction)
    }

    /// Score a relation against constraints, in `[0, 1]`.
    ///
    /// Each constraint contributes 1.0, 0.5 or 0.0; the contributions are
    /// averaged, the visibility bonus is added and the result clamped. An
    /// empty constraint set yields the neutral score.
    pub fn score_spatial_match(
        &self,
        relation: &SpatialRelation,
        constraints: &SpatialConstraints,
    ) -> f64 {
        if constraints.is_empty() {
            return self.config.neutral_score;
        }
        let near = self.config.near_distance;
        let far = self.config.far_distance;
        let d = relation.distance_to_agent;

        let total: f64 = constraints
            .keys()
            .map(|kind| match (kind, kind.direction()) {
                (_, Some(dir)) => {
                    if relation.relative_direction == dir {
                        1.0
                    } else {
                        0.0
                    }
                }
                (ConstraintKind::Near, None) => {
                    if d < near {
                        1.0
                    } else if d < far {
                        0.5
                    } else {
                        0.0
                    }
                }
                (_, None) => {
                    if d > far {
                        1.0
                    } else if d > near {
                        0.5
                    } else {
                        0.0
                    }
                }
            })
            .sum();

        let mut score = total / constraints.len() as f64;
        if relation.is_visible {
            score += self.config.visibility_bonus;
        }
        score.clamp(0.0, 1.0)
    }

    /// Pick the candidate best matching the instruction.
    ///
    /// Returns `(None, 0.0)` for an empty candidate list. Without
    /// constraints the closest visible candidate wins (or the closest
    /// overall at lower confidence). Ties go to the earliest candidate.
    pub fn find_best_spatial_match(
        &self,
        candidates: &[CandidateObject],
        instruction: &str,
    ) -> (Option<String>, f64) {
        if candidates.is_empty() {
            return (None, 0.0);
        }
        let relations = self.calculate_relative_positions(candidates, None);
        let constraints = self.extract_spatial_constraints(instruction);

        if constraints.is_empty() {
            let by_distance = |a: &&SpatialRelation, b: &&SpatialRelation| {
                a.distance_to_agent
                    .partial_cmp(&b.distance_to_agent)
                    .unwrap_or(Ordering::Equal)
            };
            if let Some(rel) = relations.iter().filter(|r| r.is_visible).min_by(by_distance) {
                tracing::debug!("No spatial constraints, closest visible is {}", rel.object_id);
                return (
                    Some(rel.object_id.clone()),
                    self.config.closest_visible_confidence,
                );
            }
            return match relations.iter().min_by(by_distance) {
                Some(rel) => (Some(rel.object_id.clone()), self.config.closest_any_confidence),
                None => (None, 0.0),
            };
        }

        let mut best: Option<(&SpatialRelation, f64)> = None;
        for rel in &relations {
            let score = self.score_spatial_match(rel, &constraints);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((rel, score));
            }
        }

        match best {
            Some((rel, score)) => {
                tracing::debug!(
                    object_id = %rel.object_id,
                    score,
                    constraints = constraints.len(),
                    "best spatial match"
                );
                (Some(rel.object_id.clone()), score)
            }
            None => (None, 0.0),
        }
    }
}

/// `in` for cabinets and drawers, `on` for every other receptacle.
fn container_relations(obj: &CandidateObject) -> BTreeMap<String, ContainerRelation> {
    let mut out = BTreeMap::new();
    for receptacle in &obj.parent_receptacles {
        if let Some((prefix, _)) = receptacle.split_once('|') {
            let relation = if receptacle.contains("Cabinet") || receptacle.contains("Drawer") {
                ContainerRelation::In
            } else {
                ContainerRelation::On
            };
            out.insert(prefix.to_lowercase(), relation);
        }
    }
    out
}
