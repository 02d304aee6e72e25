//! Conversions between simulator JSON, flat coordinate rows and `nalgebra`
//! types used by the geometry and perception code.

use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;

use crate::bridge::{AgentPose, BridgeError, CandidateObject, SceneSnapshot};

use std::fmt;

/// Errors that can occur during type conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// A coordinate row does not have the expected number of columns.
    LengthMismatch { expected: usize, got: usize },
    /// A coordinate was NaN or infinite.
    NonFinite { row: usize },
    /// The input collection was empty when a non-empty one was required.
    EmptyInput,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { expected, got } => {
                write!(f, "length mismatch: expected {expected}, got {got}")
            }
            Self::NonFinite { row } => write!(f, "non-finite coordinate in row {row}"),
            Self::EmptyInput => write!(f, "empty input"),
        }
    }
}

impl std::error::Error for ConversionError {}

// ---------------------------------------------------------------------------
// Simulator JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum CandidatePayload {
    List(Vec<CandidateObject>),
    Wrapped { objects: Vec<CandidateObject> },
}

#[derive(Deserialize)]
struct ScenePayload {
    #[serde(default)]
    agent: AgentPose,
    #[serde(default)]
    objects: Vec<CandidateObject>,
}

/// Parse candidates from either a bare JSON array or an object carrying an
/// `objects` array, as the simulator metadata does.
pub fn candidates_from_json(json: &str) -> crate::bridge::Result<Vec<CandidateObject>> {
    let payload: CandidatePayload = serde_json::from_str(json)?;
    let objects = match payload {
        CandidatePayload::List(v) => v,
        CandidatePayload::Wrapped { objects } => objects,
    };
    if let Some(bad) = objects.iter().find(|o| o.object_id.is_empty()) {
        return Err(BridgeError::InvalidData(format!(
            "candidate of type '{}' has an empty objectId",
            bad.object_type
        )));
    }
    Ok(objects)
}

/// Parse a full scene snapshot (`agent` pose plus `objects`).
pub fn scene_from_json(json: &str) -> crate::bridge::Result<SceneSnapshot> {
    let payload: ScenePayload = serde_json::from_str(json)?;
    Ok(SceneSnapshot::new(payload.agent, payload.objects))
}

// ---------------------------------------------------------------------------
// Coordinate rows
// ---------------------------------------------------------------------------

/// Convert `[x, y, z]` rows into vectors, rejecting ragged or non-finite rows.
pub fn rows_to_vectors(rows: &[Vec<f64>]) -> Result<Vec<Vector3<f64>>, ConversionError> {
    if rows.is_empty() {
        return Err(ConversionError::EmptyInput);
    }
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            if r.len() != 3 {
                return Err(ConversionError::LengthMismatch {
                    expected: 3,
                    got: r.len(),
                });
            }
            if r.iter().any(|c| !c.is_finite()) {
                return Err(ConversionError::NonFinite { row: i });
            }
            Ok(Vector3::new(r[0], r[1], r[2]))
        })
        .collect()
}

pub fn arrays_to_vectors(rows: &[[f64; 3]]) -> Vec<Vector3<f64>> {
    rows.iter().map(|r| Vector3::new(r[0], r[1], r[2])).collect()
}

pub fn vectors_to_arrays(points: &[Vector3<f64>]) -> Vec<[f64; 3]> {
    points.iter().map(|p| [p.x, p.y, p.z]).collect()
}

/// Row-major array form of a 3×3 matrix.
pub fn matrix_to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    out
}

pub fn rows_to_matrix(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| rows[r][c])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_from_bare_array() {
        let json = r#"[
            {"objectId": "Book|1", "objectType": "Book", "position": {"x": -0.47, "y": 0.5, "z": 0.0}},
            {"objectId": "Book|2", "objectType": "Book", "position": {"x": 0.42, "y": 0.5, "z": 0.0}}
        ]"#;
        let objects = candidates_from_json(json).unwrap();
        assert_eq!(objects.len(), 2);
        assert!((objects[0].position.x + 0.47).abs() < 1e-12);
    }

    #[test]
    fn test_candidates_from_wrapped_object() {
        let json = r#"{"objects": [{"objectId": "Cup|1", "objectType": "Cup"}]}"#;
        let objects = candidates_from_json(json).unwrap();
        assert_eq!(objects[0].object_id, "Cup|1");
    }

    #[test]
    fn test_candidates_reject_empty_id() {
        let json = r#"[{"objectId": "", "objectType": "Cup"}]"#;
        assert!(matches!(
            candidates_from_json(json),
            Err(BridgeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_candidates_malformed_json() {
        assert!(matches!(
            candidates_from_json("[{"),
            Err(BridgeError::SerializationError(_))
        ));
    }

    #[test]
    fn test_scene_from_json() {
        let json = r#"{
            "agent": {"position": {"x": 1.0, "y": 0.9, "z": -1.0}, "rotation": {"y": 180.0}},
            "objects": [{"objectId": "Window|1", "objectType": "Window"}]
        }"#;
        let scene = scene_from_json(json).unwrap();
        assert!((scene.agent.yaw() - 180.0).abs() < 1e-12);
        assert_eq!(scene.objects.len(), 1);
    }

    #[test]
    fn test_rows_to_vectors_errors() {
        assert_eq!(rows_to_vectors(&[]), Err(ConversionError::EmptyInput));
        assert_eq!(
            rows_to_vectors(&[vec![1.0, 2.0]]),
            Err(ConversionError::LengthMismatch { expected: 3, got: 2 })
        );
        assert_eq!(
            rows_to_vectors(&[vec![0.0, 0.0, 0.0], vec![1.0, f64::NAN, 0.0]]),
            Err(ConversionError::NonFinite { row: 1 })
        );
    }

    #[test]
    fn test_matrix_rows_layout() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let rows = matrix_to_rows(&m);
        assert_eq!(rows[0], [1.0, 2.0, 3.0]);
        assert_eq!(rows[2], [7.0, 8.0, 9.0]);
        assert_eq!(rows_to_matrix(&rows), m);
    }

    #[test]
    fn test_conversion_error_display() {
        let e = ConversionError::LengthMismatch { expected: 3, got: 4 };
        assert_eq!(e.to_string(), "length mismatch: expected 3, got 4");
        assert_eq!(ConversionError::EmptyInput.to_string(), "empty input");
    }
}
