//! Agent-relative spatial relations and instruction constraints.
//!
//! [`SpatialRelationCalculator`] turns candidate positions into
//! [`SpatialRelation`]s (distance, direction sector, landmark and container
//! relations) and scores them against the constraints found in an
//! instruction by the bilingual [`KeywordTable`].

pub mod calculator;
pub mod keywords;

pub use calculator::SpatialRelationCalculator;
pub use keywords::{ConstraintKind, KeywordTable, SpatialConstraints};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Relation value types
// ---------------------------------------------------------------------------

/// Direction sector of an object as seen from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Front,
    Right,
    Back,
    Left,
}

impl Direction {
    /// Map an angle in `[0, 360)` to its half-open sector:
    /// `[315, 45)` front, `[45, 135)` right, `[135, 225)` back,
    /// `[225, 315)` left.
    pub fn from_angle(angle_deg: f64) -> Self {
        let a = normalize_degrees(angle_deg);
        if !(45.0..315.0).contains(&a) {
            Self::Front
        } else if a < 135.0 {
            Self::Right
        } else if a < 225.0 {
            Self::Back
        } else {
            Self::Left
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Right => "right",
            Self::Back => "back",
            Self::Left => "left",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse distance band between an object and a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkProximity {
    Near,
    Medium,
    Far,
}

/// How an object sits in its parent receptacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRelation {
    In,
    On,
}

/// Relation of one candidate to the agent, landmarks and receptacles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRelation {
    pub object_id: String,
    /// Ground-plane distance to the agent.
    pub distance_to_agent: f64,
    pub relative_direction: Direction,
    /// Bearing from the agent in degrees, `[0, 360)`, measured from +z
    /// towards +x.
    pub angle_to_agent: f64,
    pub is_visible: bool,
    /// Keyed by lower-cased landmark type.
    pub landmark_relations: BTreeMap<String, LandmarkProximity>,
    /// Keyed by lower-cased receptacle type.
    pub container_relations: BTreeMap<String, ContainerRelation>,
}

/// Relations for a candidate set, in candidate order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialRelations {
    entries: Vec<SpatialRelation>,
}

impl SpatialRelations {
    pub fn get(&self, object_id: &str) -> Option<&SpatialRelation> {
        self.entries.iter().find(|r| r.object_id == object_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpatialRelation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, relation: SpatialRelation) {
        // Object ids are unique within a scene; a repeat replaces the entry.
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|r| r.object_id == relation.object_id)
        {
            *existing = relation;
        } else {
            self.entries.push(relation);
        }
    }
}

impl<'a> IntoIterator for &'a SpatialRelations {
    type Item = &'a SpatialRelation;
    type IntoIter = std::slice::Iter<'a, SpatialRelation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Normalize degrees into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let a = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Bearing from `from` to `to` on the ground plane: `atan2(dx, dz)` in
/// degrees, normalized to `[0, 360)`.
pub fn bearing_degrees(from: &crate::bridge::Point3D, to: &crate::bridge::Point3D) -> f64 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    normalize_degrees(dx.atan2(dz).to_degrees())
}
