//! Spatial signatures: the grounded description of one object.
//!
//! A [`SpatialSignature`] owns the object's point cloud and PCA pose, plus
//! named [`RegionSignature`]s and [`AffordancePoint`]s. The pose defines an
//! object frame: `local = Rᵀ (p - position) / scale`, where the columns
//! of the orientation `R` are the principal directions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::pose::PoseMetadata;
use super::{PerceptionError, Result};
use crate::bridge::BoundingBox;

const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

/// Region names with a known meaning. Others are accepted but logged.
pub const STANDARD_REGION_NAMES: &[&str] = &[
    "seat", "back", "left_arm", "right_arm", "cushion", "top", "top_center", "left_edge",
    "right_edge", "front_edge", "back_edge", "corner", "top_shelf", "middle_shelf",
    "bottom_shelf", "door", "handle", "left_armrest", "right_armrest", "legs", "surface", "edge",
    "side", "front", "bottom",
];

// ---------------------------------------------------------------------------
// Affordances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Pickup,
    Place,
    Press,
    Grasp,
    Open,
    Close,
    Toggle,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Place => "place",
            Self::Press => "press",
            Self::Grasp => "grasp",
            Self::Open => "open",
            Self::Close => "close",
            Self::Toggle => "toggle",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = PerceptionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pickup" => Ok(Self::Pickup),
            "place" => Ok(Self::Place),
            "press" => Ok(Self::Press),
            "grasp" => Ok(Self::Grasp),
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            "toggle" => Ok(Self::Toggle),
            other => Err(PerceptionError::InvalidInput(format!(
                "unknown interaction type '{other}'"
            ))),
        }
    }
}

/// A point on the object surface where an interaction can happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordancePoint {
    pub position: Vector3<f64>,
    /// Outward unit normal.
    pub normal: Vector3<f64>,
    pub interaction_type: InteractionType,
    pub confidence: f64,
    /// Unit direction an effector should approach along.
    pub approach_direction: Vector3<f64>,
}

impl AffordancePoint {
    /// Normalises `normal` and `approach_direction`; rejects zero vectors
    /// and confidences outside `[0, 1]`.
    pub fn new(
        position: Vector3<f64>,
        normal: Vector3<f64>,
        interaction_type: InteractionType,
        confidence: f64,
        approach_direction: Vector3<f64>,
    ) -> Result<Self> {
        check_unit_range("confidence", confidence)?;
        Ok(Self {
            position,
            normal: unit(normal, "normal")?,
            interaction_type,
            confidence,
            approach_direction: unit(approach_direction, "approach_direction")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// A named part of an object such as a sofa arm or a table edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSignature {
    pub name: String,
    /// Indices into the owning signature's point cloud.
    pub point_indices: Vec<usize>,
    pub center: Vector3<f64>,
    /// Unit normal of the dominant surface.
    pub normal: Vector3<f64>,
    pub extent: Vector3<f64>,
    pub accessibility: f64,
    pub stability: f64,
    pub surface_quality: f64,
    /// `(min, max)` once [`RegionSignature::compute_bounding_box`] ran.
    pub bounding_box: Option<(Vector3<f64>, Vector3<f64>)>,
    pub affordances: Vec<AffordancePoint>,
}

impl RegionSignature {
    /// Region with neutral scores of 0.5.
    pub fn new(
        name: impl Into<String>,
        point_indices: Vec<usize>,
        center: Vector3<f64>,
        normal: Vector3<f64>,
        extent: Vector3<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if !STANDARD_REGION_NAMES.contains(&name.as_str()) {
            tracing::debug!(region = %name, "custom region name");
        }
        Ok(Self {
            name,
            point_indices,
            center,
            normal: unit(normal, "normal")?,
            extent,
            accessibility: 0.5,
            stability: 0.5,
            surface_quality: 0.5,
            bounding_box: None,
            affordances: Vec::new(),
        })
    }

    pub fn with_scores(mut self, accessibility: f64, stability: f64, surface_quality: f64) -> Result<Self> {
        check_unit_range("accessibility", accessibility)?;
        check_unit_range("stability", stability)?;
        check_unit_range("surface_quality", surface_quality)?;
        self.accessibility = accessibility;
        self.stability = stability;
        self.surface_quality = surface_quality;
        Ok(self)
    }

    pub fn add_affordance(&mut self, affordance: AffordancePoint) {
        self.affordances.push(affordance);
    }

    /// Affordances of one type, or all of them.
    pub fn interaction_points(&self, filter: Option<InteractionType>) -> Vec<&AffordancePoint> {
        self.affordances
            .iter()
            .filter(|a| filter.map_or(true, |t| a.interaction_type == t))
            .collect()
    }

    /// Bounds of this region's points within `cloud`. Out-of-range indices
    /// are ignored; no valid index leaves the box at the origin.
    pub fn compute_bounding_box(&mut self, cloud: &[Vector3<f64>]) -> (Vector3<f64>, Vector3<f64>) {
        let bounds = bounds(self.point_indices.iter().filter_map(|&i| cloud.get(i)))
            .unwrap_or((Vector3::zeros(), Vector3::zeros()));
        self.bounding_box = Some(bounds);
        bounds
    }
}

// ---------------------------------------------------------------------------
// Spatial signature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialSignature {
    pub object_id: String,
    pub object_type: String,
    pub bounding_box: Option<BoundingBox>,
    pub point_cloud: Vec<Vector3<f64>>,
    pub point_colors: Option<Vec<[u8; 3]>>,
    pub position: Vector3<f64>,
    /// Orthogonal; columns are the object axes expressed in world space.
    pub orientation: Matrix3<f64>,
    /// Principal directions, one per row, largest variance first.
    pub principal_axes: Matrix3<f64>,
    pub scale: Vector3<f64>,
    pub confidence: f64,
    pub semantic_regions: BTreeMap<String, RegionSignature>,
    pub affordances: Vec<AffordancePoint>,
    pub pose_metadata: Option<PoseMetadata>,
}

/// Counts and bounding measures of a signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub object_id: String,
    pub object_type: String,
    pub n_points: usize,
    pub n_regions: usize,
    pub n_affordances: usize,
    pub surface_area: f64,
    pub volume: f64,
    pub confidence: f64,
}

impl SpatialSignature {
    /// Signature with an identity pose centred at `position`.
    pub fn new(
        object_id: impl Into<String>,
        object_type: impl Into<String>,
        point_cloud: Vec<Vector3<f64>>,
        position: Vector3<f64>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            object_type: object_type.into(),
            bounding_box: None,
            point_cloud,
            point_colors: None,
            position,
            orientation: Matrix3::identity(),
            principal_axes: Matrix3::identity(),
            scale: Vector3::repeat(1.0),
            confidence: 1.0,
            semantic_regions: BTreeMap::new(),
            affordances: Vec::new(),
            pose_metadata: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<[u8; 3]>) -> Result<Self> {
        if colors.len() != self.point_cloud.len() {
            return Err(PerceptionError::ShapeMismatch(format!(
                "{} colors for {} points",
                colors.len(),
                self.point_cloud.len()
            )));
        }
        self.point_colors = Some(colors);
        Ok(self)
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    /// Install a pose. A non-orthogonal orientation is replaced by its
    /// nearest orthogonal matrix.
    pub fn with_pose(
        mut self,
        orientation: Matrix3<f64>,
        principal_axes: Matrix3<f64>,
        scale: Vector3<f64>,
        confidence: f64,
    ) -> Result<Self> {
        if scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(PerceptionError::InvalidInput(format!(
                "scale must be positive, got {scale:?}"
            )));
        }
        check_unit_range("confidence", confidence)?;
        self.orientation = if is_orthogonal(&orientation) {
            orientation
        } else {
            tracing::warn!("Orientation of {} is not orthogonal, re-orthogonalising", self.object_id);
            orthogonalize(&orientation)
        };
        self.principal_axes = principal_axes;
        self.scale = scale;
        self.confidence = confidence;
        Ok(self)
    }

    pub fn add_region(&mut self, region: RegionSignature) {
        tracing::debug!(object_id = %self.object_id, region = %region.name, "region added");
        self.semantic_regions.insert(region.name.clone(), region);
    }

    pub fn region(&self, name: &str) -> Option<&RegionSignature> {
        self.semantic_regions.get(name)
    }

    /// Signature-level affordances followed by every region's, optionally
    /// restricted to one interaction type.
    pub fn all_affordances(&self, filter: Option<InteractionType>) -> Vec<&AffordancePoint> {
        let own = self
            .affordances
            .iter()
            .filter(move |a| filter.map_or(true, |t| a.interaction_type == t));
        own.chain(
            self.semantic_regions
                .values()
                .flat_map(move |r| r.interaction_points(filter)),
        )
        .collect()
    }

    fn extent(&self) -> Vector3<f64> {
        bounds(self.point_cloud.iter())
            .map(|(lo, hi)| hi - lo)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Surface area of the point bounds.
    pub fn surface_area(&self) -> f64 {
        let d = self.extent();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Volume of the point bounds.
    pub fn volume(&self) -> f64 {
        let d = self.extent();
        d.x * d.y * d.z
    }

    pub fn world_to_local(&self, p: &Vector3<f64>) -> Vector3<f64> {
        (self.orientation.transpose() * (p - self.position)).component_div(&self.scale)
    }

    pub fn local_to_world(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * p.component_mul(&self.scale) + self.position
    }

    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            object_id: self.object_id.clone(),
            object_type: self.object_type.clone(),
            n_points: self.point_cloud.len(),
            n_regions: self.semantic_regions.len(),
            n_affordances: self.all_affordances(None).len(),
            surface_area: self.surface_area(),
            volume: self.volume(),
            confidence: self.confidence,
        }
    }
}

impl fmt::Display for SpatialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpatialSignature({}): {} points, {} regions, {} affordances",
            self.object_type,
            self.point_cloud.len(),
            self.semantic_regions.len(),
            self.all_affordances(None).len()
        )
    }
}

/// Combine several signatures into one composite object. Regions are
/// prefixed with their source object id; the pose is reset to identity at
/// the centroid of all points.
pub fn merge_signatures(signatures: &[SpatialSignature]) -> Result<SpatialSignature> {
    match signatures {
        [] => Err(PerceptionError::InvalidInput(
            "at least one signature is required to merge".into(),
        )),
        [single] => Ok(single.clone()),
        many => {
            let points: Vec<Vector3<f64>> = many
                .iter()
                .flat_map(|s| s.point_cloud.iter().copied())
                .collect();
            let center = if points.is_empty() {
                Vector3::zeros()
            } else {
                points.iter().sum::<Vector3<f64>>() / points.len() as f64
            };
            let id = many
                .iter()
                .map(|s| s.object_id.as_str())
                .collect::<Vec<_>>()
                .join("_");

            let colors = many
                .iter()
                .map(|s| s.point_colors.as_ref())
                .collect::<Option<Vec<_>>>()
                .map(|all| all.into_iter().flatten().copied().collect::<Vec<_>>());

            let mut merged = SpatialSignature::new(id, "Composite", points, center);
            merged.point_colors = colors;
            let mut offset = 0;
            for s in many {
                for (name, region) in &s.semantic_regions {
                    let key = format!("{}_{}", s.object_id, name);
                    let mut region = region.clone();
                    region.name = key.clone();
                    for i in &mut region.point_indices {
                        *i += offset;
                    }
                    merged.semantic_regions.insert(key, region);
                }
                merged.affordances.extend(s.affordances.iter().cloned());
                offset += s.point_cloud.len();
            }
            Ok(merged)
        }
    }
}

/// Nearest orthogonal matrix by SVD: `U Vᵀ`.
pub fn orthogonalize(m: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = m.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => u * v_t,
        _ => Matrix3::identity(),
    }
}

pub fn is_orthogonal(m: &Matrix3<f64>) -> bool {
    (m * m.transpose() - Matrix3::identity()).abs().max() < ORTHOGONALITY_TOLERANCE
}

fn bounds<'a>(points: impl Iterator<Item = &'a Vector3<f64>>) -> Option<(Vector3<f64>, Vector3<f64>)> {
    points.fold(None, |acc, p| match acc {
        None => Some((*p, *p)),
        Some((lo, hi)) => Some((lo.inf(p), hi.sup(p))),
    })
}

fn unit(v: Vector3<f64>, what: &str) -> Result<Vector3<f64>> {
    let n = v.norm();
    if !(n.is_finite() && n > 0.0) {
        return Err(PerceptionError::InvalidInput(format!("{what} must be non-zero")));
    }
    Ok(v / n)
}

fn check_unit_range(what: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PerceptionError::InvalidInput(format!(
            "{what} must lie in [0, 1], got {value}"
        )));
    }
    Ok(())
}
