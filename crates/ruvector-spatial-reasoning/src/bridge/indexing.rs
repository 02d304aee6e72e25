//! Stable indexed names for duplicate objects.
//!
//! When a scene holds several objects of one type, each gets a name
//! `Type_1..Type_n` assigned in ascending `(x, z)` order, so a reference such
//! as `Sofa_2` means the same object on every call for the same scene.

use std::cmp::Ordering;

use crate::bridge::CandidateObject;

/// One object together with its indexed name.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedObject {
    pub name: String,
    pub object: CandidateObject,
}

/// Lookup table from indexed names to objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectIndex {
    entries: Vec<IndexedObject>,
}

impl ObjectIndex {
    pub fn get(&self, name: &str) -> Option<&CandidateObject> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedObject> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Order used for every "canonical" numbering: `x` ascending, then `z`.
pub(crate) fn canonical_order(a: &CandidateObject, b: &CandidateObject) -> Ordering {
    a.position
        .x
        .partial_cmp(&b.position.x)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.position
                .z
                .partial_cmp(&b.position.z)
                .unwrap_or(Ordering::Equal)
        })
}

/// Index every object type that occurs more than once.
///
/// Types are visited in order of first appearance; singletons are not
/// indexed.
pub fn index_duplicate_objects(objects: &[CandidateObject]) -> ObjectIndex {
    let mut types: Vec<&str> = Vec::new();
    for obj in objects {
        if !types.contains(&obj.object_type.as_str()) {
            types.push(&obj.object_type);
        }
    }

    let mut entries = Vec::new();
    for t in types {
        let mut group: Vec<&CandidateObject> =
            objects.iter().filter(|o| o.object_type == t).collect();
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| canonical_order(a, b));
        for (i, obj) in group.into_iter().enumerate() {
            let name = format!("{}_{}", t, i + 1);
            tracing::debug!(
                name = %name,
                x = obj.position.x,
                z = obj.position.z,
                "indexed duplicate object"
            );
            entries.push(IndexedObject {
                name,
                object: obj.clone(),
            });
        }
    }
    ObjectIndex { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Point3D;

    fn obj(id: &str, t: &str, x: f64, z: f64) -> CandidateObject {
        CandidateObject::new(id, t, Point3D::new(x, 0.0, z))
    }

    #[test]
    fn test_duplicates_sorted_by_x_then_z() {
        let objects = vec![
            obj("Sofa|b", "Sofa", 2.0, 0.0),
            obj("Sofa|a", "Sofa", -1.0, 3.0),
            obj("Sofa|c", "Sofa", -1.0, -2.0),
        ];
        let index = index_duplicate_objects(&objects);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("Sofa_1").unwrap().object_id, "Sofa|c");
        assert_eq!(index.get("Sofa_2").unwrap().object_id, "Sofa|a");
        assert_eq!(index.get("Sofa_3").unwrap().object_id, "Sofa|b");
    }

    #[test]
    fn test_singletons_not_indexed() {
        let objects = vec![
            obj("Sofa|1", "Sofa", 0.0, 0.0),
            obj("Cup|1", "Cup", 1.0, 0.0),
            obj("Cup|2", "Cup", 0.5, 0.0),
        ];
        let index = index_duplicate_objects(&objects);
        assert_eq!(index.len(), 2);
        assert!(index.get("Sofa_1").is_none());
        assert_eq!(index.get("Cup_1").unwrap().object_id, "Cup|2");
    }

    #[test]
    fn test_empty_scene() {
        let index = index_duplicate_objects(&[]);
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
    }
}
