//! Core scene types shared by every spatial-reasoning module.
//!
//! This module provides the foundational types that all other modules build
//! upon: positions, bounding boxes, candidate objects as reported by the scene
//! simulator, the agent pose, and the [`SceneView`] collaborator seam.

pub mod config;
pub mod converters;
pub mod indexing;

use nalgebra::Vector3;
use serde::{Deserialize, Deserializer, Serialize};

// Re-exports
pub use config::{
    AmbiguityConfig, ConfigError, GeometryConfig, InteractionConfig, NavigationConfig,
    RelationConfig, SpatialReasoningConfig,
};
pub use converters::ConversionError;
pub use indexing::{index_duplicate_objects, IndexedObject, ObjectIndex};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// 3D point in scene units (metres in the simulator).
///
/// Missing coordinates deserialize as `0.0`, matching how the simulator omits
/// zero components in some payloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn distance_to(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance on the ground plane (x, z), ignoring height.
    pub fn ground_distance_to(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

fn unit_size() -> Point3D {
    Point3D::new(1.0, 1.0, 1.0)
}

/// Axis-aligned bounding box as reported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub center: Point3D,
    #[serde(default = "unit_size")]
    pub size: Point3D,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            center: Point3D::origin(),
            size: unit_size(),
        }
    }
}

impl BoundingBox {
    pub fn new(center: Point3D, size: Point3D) -> Self {
        Self { center, size }
    }
}

/// Euler rotation in degrees. Only the yaw (`y`) component is meaningful for
/// objects and the agent in a household scene.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Rotation {
    pub fn yaw(degrees: f64) -> Self {
        Self { x: 0.0, y: degrees, z: 0.0 }
    }
}

fn default_visible() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One object in the scene, as an immutable snapshot taken for a single
/// decision. Several candidates usually share the same `object_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateObject {
    pub object_id: String,
    pub object_type: String,
    #[serde(default)]
    pub position: Point3D,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, rename = "axisAlignedBoundingBox")]
    pub aabb: BoundingBox,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parent_receptacles: Vec<String>,
}

impl CandidateObject {
    /// Create a visible candidate with a unit bounding box centred on
    /// `position`.
    pub fn new(object_id: impl Into<String>, object_type: impl Into<String>, position: Point3D) -> Self {
        Self {
            object_id: object_id.into(),
            object_type: object_type.into(),
            position,
            rotation: Rotation::default(),
            visible: true,
            aabb: BoundingBox::new(position, unit_size()),
            parent_receptacles: Vec::new(),
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64, depth: f64) -> Self {
        self.aabb.size = Point3D::new(width, height, depth);
        self
    }

    pub fn with_receptacles<I, S>(mut self, receptacles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_receptacles = receptacles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_yaw(mut self, degrees: f64) -> Self {
        self.rotation = Rotation::yaw(degrees);
        self
    }
}

/// Agent position and heading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentPose {
    #[serde(default)]
    pub position: Point3D,
    #[serde(default)]
    pub rotation: Rotation,
}

impl AgentPose {
    pub fn new(position: Point3D, yaw_degrees: f64) -> Self {
        Self {
            position,
            rotation: Rotation::yaw(yaw_degrees),
        }
    }

    pub fn at(position: Point3D) -> Self {
        Self::new(position, 0.0)
    }

    pub fn yaw(&self) -> f64 {
        self.rotation.y
    }
}

// ---------------------------------------------------------------------------
// Scene collaborator
// ---------------------------------------------------------------------------

/// Read-only view of the simulated scene.
///
/// The simulator itself lives outside this crate; anything that can report
/// the agent pose and the current object list can drive the relation
/// calculator and the navigation planner.
pub trait SceneView: Send + Sync {
    /// Current agent pose.
    fn agent_pose(&self) -> AgentPose;

    /// Every object currently known in the scene.
    fn objects(&self) -> &[CandidateObject];

    /// Objects whose type equals `object_type` exactly, in scene order.
    fn objects_of_type(&self, object_type: &str) -> Vec<&CandidateObject> {
        self.objects()
            .iter()
            .filter(|o| o.object_type == object_type)
            .collect()
    }

    fn object_by_id(&self, object_id: &str) -> Option<&CandidateObject> {
        self.objects().iter().find(|o| o.object_id == object_id)
    }
}

/// In-memory [`SceneView`] captured at one instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub agent: AgentPose,
    pub objects: Vec<CandidateObject>,
}

impl SceneSnapshot {
    pub fn new(agent: AgentPose, objects: Vec<CandidateObject>) -> Self {
        Self { agent, objects }
    }
}

impl SceneView for SceneSnapshot {
    fn agent_pose(&self) -> AgentPose {
        self.agent
    }

    fn objects(&self) -> &[CandidateObject] {
        &self.objects
    }
}

/// Bridge error type.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Conversion error: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point3d_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_ground_distance_ignores_height() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(3.0, 100.0, 4.0);
        assert!((a.ground_distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_candidate_from_simulator_json() {
        let json = r#"{
            "objectId": "Book|+01.23|+00.50|-00.20",
            "objectType": "Book",
            "position": {"x": 1.23, "y": 0.5, "z": -0.2},
            "rotation": {"x": 0.0, "y": 90.0, "z": 0.0},
            "visible": false,
            "axisAlignedBoundingBox": {
                "center": {"x": 1.23, "y": 0.55, "z": -0.2},
                "size": {"x": 0.2, "y": 0.05, "z": 0.3}
            },
            "parentReceptacles": ["Shelf|+01.20|+00.40|-00.20"]
        }"#;
        let obj: CandidateObject = serde_json::from_str(json).unwrap();
        assert_eq!(obj.object_type, "Book");
        assert!(!obj.visible);
        assert!((obj.rotation.y - 90.0).abs() < 1e-12);
        assert!((obj.aabb.size.z - 0.3).abs() < 1e-12);
        assert_eq!(obj.parent_receptacles.len(), 1);
    }

    #[test]
    fn test_candidate_json_defaults() {
        let json = r#"{"objectId": "Cup|1", "objectType": "Cup", "parentReceptacles": null}"#;
        let obj: CandidateObject = serde_json::from_str(json).unwrap();
        assert!(obj.visible);
        assert_eq!(obj.position, Point3D::origin());
        assert_eq!(obj.aabb.size, Point3D::new(1.0, 1.0, 1.0));
        assert!(obj.parent_receptacles.is_empty());
    }

    #[test]
    fn test_candidate_builder() {
        let obj = CandidateObject::new("Vase|1", "Vase", Point3D::new(1.0, 0.0, 2.0))
            .with_visible(false)
            .with_size(0.2, 0.4, 0.2)
            .with_receptacles(["CounterTop|1"])
            .with_yaw(45.0);
        assert!(!obj.visible);
        assert_eq!(obj.aabb.size, Point3D::new(0.2, 0.4, 0.2));
        assert_eq!(obj.parent_receptacles, vec!["CounterTop|1".to_string()]);
        assert!((obj.rotation.y - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_scene_snapshot_lookup() {
        let scene = SceneSnapshot::new(
            AgentPose::at(Point3D::new(1.0, 0.9, 1.0)),
            vec![
                CandidateObject::new("Book|1", "Book", Point3D::origin()),
                CandidateObject::new("Window|1", "Window", Point3D::new(2.0, 1.0, 0.0)),
                CandidateObject::new("Book|2", "Book", Point3D::new(1.0, 0.0, 0.0)),
            ],
        );
        assert_eq!(scene.objects_of_type("Book").len(), 2);
        assert!(scene.object_by_id("Window|1").is_some());
        assert!(scene.object_by_id("Door|1").is_none());
        assert!((scene.agent_pose().position.y - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_vector_roundtrip() {
        let p = Point3D::new(1.5, -2.0, 3.25);
        assert_eq!(Point3D::from_vector(&p.to_vector()), p);
    }
}
