//! Semantic sub-regions of large furniture sliced from the bounding box.
//!
//! [`BoxSignature`] is the lightweight frame built from simulator metadata
//! alone: AABB centre and size plus the object's yaw. Region centres are
//! fixed offsets in that frame, expressed as fractions of the box size.

use std::collections::BTreeMap;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::{PerceptionError, Result};
use crate::bridge::CandidateObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSchema {
    Sofa,
    Table,
    Cabinet,
}

impl RegionSchema {
    /// Schema that fits an object type, if any.
    pub fn for_object_type(object_type: &str) -> Option<Self> {
        match object_type.to_lowercase().as_str() {
            "sofa" | "couch" | "armchair" => Some(Self::Sofa),
            "table" | "diningtable" | "coffeetable" | "sidetable" | "desk" => Some(Self::Table),
            "cabinet" | "dresser" | "shelvingunit" => Some(Self::Cabinet),
            _ => None,
        }
    }

    /// Region names with their offsets, in slicing order.
    pub fn offsets(&self) -> &'static [(&'static str, [f64; 3])] {
        match self {
            Self::Sofa => &[
                ("seat", [0.0, 0.0, 0.0]),
                ("left_arm", [-0.4, 0.25, 0.0]),
                ("right_arm", [0.4, 0.25, 0.0]),
                ("back", [0.0, 0.4, 0.4]),
            ],
            Self::Table => &[
                ("top_center", [0.0, 0.5, 0.0]),
                ("left_edge", [-0.45, 0.5, 0.0]),
                ("right_edge", [0.45, 0.5, 0.0]),
                ("front_edge", [0.0, 0.5, 0.45]),
                ("back_edge", [0.0, 0.5, -0.45]),
            ],
            Self::Cabinet => &[
                ("top_shelf", [0.0, 0.4, 0.0]),
                ("middle_shelf", [0.0, 0.0, 0.0]),
                ("bottom_shelf", [0.0, -0.4, 0.0]),
            ],
        }
    }
}

impl FromStr for RegionSchema {
    type Err = PerceptionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sofa" => Ok(Self::Sofa),
            "table" => Ok(Self::Table),
            "cabinet" => Ok(Self::Cabinet),
            _ => Err(PerceptionError::UnknownSchema(s.to_string())),
        }
    }
}

/// Rotation about +y by `degrees`, object frame to world.
pub fn rotation_y(degrees: f64) -> Matrix3<f64> {
    let (s, c) = degrees.to_radians().sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

/// Object frame from bounding box and yaw only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSignature {
    pub object_id: String,
    pub object_type: String,
    pub center: Vector3<f64>,
    pub size: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl BoxSignature {
    pub fn from_candidate(obj: &CandidateObject) -> Self {
        Self {
            object_id: obj.object_id.clone(),
            object_type: obj.object_type.clone(),
            center: obj.aabb.center.to_vector(),
            size: obj.aabb.size.to_vector(),
            rotation: rotation_y(obj.rotation.y),
        }
    }

    pub fn half_size(&self) -> Vector3<f64> {
        self.size / 2.0
    }

    pub fn world_to_local(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (p - self.center)
    }

    pub fn local_to_world(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.center
    }

    /// World position of an offset given as a fraction of the box size,
    /// each component in `[-0.5, 0.5]`.
    pub fn region_center(&self, fraction: &Vector3<f64>) -> Vector3<f64> {
        self.local_to_world(&fraction.component_mul(&self.size))
    }
}

/// World-space centre of every region the schema defines.
pub fn slice_regions(signature: &BoxSignature, schema: RegionSchema) -> BTreeMap<String, Vector3<f64>> {
    schema
        .offsets()
        .iter()
        .map(|(name, [x, y, z])| {
            let center = signature.region_center(&Vector3::new(*x, *y, *z));
            (name.to_string(), center)
        })
        .collect()
}
