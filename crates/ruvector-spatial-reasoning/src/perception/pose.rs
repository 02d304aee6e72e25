//! PCA pose estimation.
//!
//! The cloud is centred, its sample covariance decomposed, and the principal
//! directions become the object axes. Axis signs are chosen so the frame is
//! right-handed and each axis points toward the bulk of the points.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};

use super::config::{CenterMethod, PoseConfig};
use super::point_cloud::ColoredPointCloud;
use super::signature::SpatialSignature;
use super::Result;
use crate::bridge::BoundingBox;

const DISTANCE_FLOOR: f64 = 1e-8;
const SCALE_FLOOR: f64 = 1e-6;
const STABLE_POSITION_NORM: f64 = 100.0;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Per-criterion quality scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationScores {
    pub point_sufficiency: f64,
    pub pca_quality: f64,
    pub orthogonality: f64,
    pub direction_clarity: f64,
    pub numerical_stability: f64,
}

impl ValidationScores {
    const WEIGHTS: [f64; 5] = [0.2, 0.3, 0.2, 0.2, 0.1];

    /// Weighted sum, clamped to `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        let scores = [
            self.point_sufficiency,
            self.pca_quality,
            self.orthogonality,
            self.direction_clarity,
            self.numerical_stability,
        ];
        scores
            .iter()
            .zip(Self::WEIGHTS)
            .map(|(s, w)| s * w)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMetadata {
    pub n_points: usize,
    pub success: bool,
    pub error_message: Option<String>,
    pub center_method: CenterMethod,
    /// Covariance eigenvalues, descending.
    pub eigenvalues: [f64; 3],
    pub explained_variance_ratio: [f64; 3],
    pub validation: Option<ValidationScores>,
    pub object_type: Option<String>,
}

/// 6-DoF pose of a point cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub position: Vector3<f64>,
    /// Transpose of `principal_axes`: columns are the principal directions,
    /// so it maps object-frame offsets into the world.
    pub orientation: Matrix3<f64>,
    /// One principal direction per row, largest variance first.
    pub principal_axes: Matrix3<f64>,
    /// Extent of the cloud along each principal axis.
    pub scale: Vector3<f64>,
    pub confidence: f64,
    pub metadata: PoseMetadata,
}

impl PoseEstimate {
    fn failed(n_points: usize, center_method: CenterMethod, message: String) -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: Matrix3::identity(),
            principal_axes: Matrix3::identity(),
            scale: Vector3::repeat(1.0),
            confidence: 0.0,
            metadata: PoseMetadata {
                n_points,
                success: false,
                error_message: Some(message),
                center_method,
                eigenvalues: [0.0; 3],
                explained_variance_ratio: [0.0; 3],
                validation: None,
                object_type: None,
            },
        }
    }
}

/// Difference between two pose estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseComparison {
    pub position_difference: f64,
    pub rotation_difference_degrees: f64,
    pub confidence_difference: f64,
}

/// Position distance and relative rotation angle between two estimates.
pub fn compare_pose_estimates(a: &PoseEstimate, b: &PoseEstimate) -> PoseComparison {
    let relative = a.orientation * b.orientation.transpose();
    let cos = ((relative.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    PoseComparison {
        position_difference: (a.position - b.position).norm(),
        rotation_difference_degrees: cos.acos().to_degrees(),
        confidence_difference: a.confidence - b.confidence,
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Principal components of a centred cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pca {
    /// One component per row, by descending eigenvalue.
    pub components: Matrix3<f64>,
    pub eigenvalues: Vector3<f64>,
    pub explained_variance_ratio: Vector3<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PoseEstimator {
    config: PoseConfig,
}

impl PoseEstimator {
    pub fn new(config: PoseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    pub fn compute_center(&self, points: &[Vector3<f64>], method: CenterMethod) -> Vector3<f64> {
        if points.is_empty() {
            return Vector3::zeros();
        }
        match method {
            CenterMethod::Mean => mean(points),
            CenterMethod::Median => {
                let mut out = Vector3::<f64>::zeros();
                for k in 0..3 {
                    let mut axis: Vec<f64> = points.iter().map(|p| p[k]).collect();
                    axis.sort_by(|a, b| a.total_cmp(b));
                    let mid = axis.len() / 2;
                    out[k] = if axis.len() % 2 == 1 {
                        axis[mid]
                    } else {
                        (axis[mid - 1] + axis[mid]) / 2.0
                    };
                }
                out
            }
            CenterMethod::GeometricMedian => self.geometric_median(points),
        }
    }

    /// Weiszfeld iteration started from the mean.
    fn geometric_median(&self, points: &[Vector3<f64>]) -> Vector3<f64> {
        if let [only] = points {
            return *only;
        }
        let mut median = mean(points);
        for _ in 0..self.config.geometric_median_max_iterations {
            let mut weighted = Vector3::<f64>::zeros();
            let mut total = 0.0;
            for p in points {
                let w = 1.0 / (p - median).norm().max(DISTANCE_FLOOR);
                weighted += p * w;
                total += w;
            }
            let next = weighted / total;
            let step = (next - median).norm();
            median = next;
            if step < self.config.geometric_median_tolerance {
                break;
            }
        }
        median
    }

    /// PCA of already-centred points using the sample covariance. Fewer
    /// than three points give the identity with equal variance.
    pub fn compute_pca(&self, centered: &[Vector3<f64>]) -> Pca {
        if centered.len() < 3 {
            return Pca {
                components: Matrix3::identity(),
                eigenvalues: Vector3::repeat(1.0),
                explained_variance_ratio: Vector3::repeat(1.0 / 3.0),
            };
        }
        let mut cov = Matrix3::<f64>::zeros();
        for p in centered {
            cov += p * p.transpose();
        }
        cov /= (centered.len() - 1) as f64;

        let eigen = SymmetricEigen::new(cov);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let mut components = Matrix3::<f64>::zeros();
        let mut eigenvalues = Vector3::<f64>::zeros();
        for (row, &k) in order.iter().enumerate() {
            components.set_row(row, &eigen.eigenvectors.column(k).transpose());
            eigenvalues[row] = eigen.eigenvalues[k].max(0.0);
        }
        let total = eigenvalues.sum();
        let explained_variance_ratio = if total > 0.0 {
            eigenvalues / total
        } else {
            Vector3::repeat(1.0 / 3.0)
        };
        Pca {
            components,
            eigenvalues,
            explained_variance_ratio,
        }
    }

    /// Right-handed fix, then flip any axis whose mean projection is
    /// negative, then restore right-handedness on the third axis.
    pub fn align_principal_axes(&self, components: &Matrix3<f64>, centered: &[Vector3<f64>]) -> Matrix3<f64> {
        let mut aligned = *components;
        if aligned.determinant() < 0.0 {
            flip_row(&mut aligned, 2);
        }
        if !centered.is_empty() {
            let n = centered.len() as f64;
            for i in 0..3 {
                let axis = aligned.row(i).transpose();
                let mean_projection = centered.iter().map(|p| p.dot(&axis)).sum::<f64>() / n;
                if mean_projection < 0.0 {
                    flip_row(&mut aligned, i);
                }
            }
        }
        if aligned.determinant() < 0.0 {
            flip_row(&mut aligned, 2);
        }
        aligned
    }

    /// Projected range along each axis, floored to stay positive.
    pub fn estimate_scale(&self, centered: &[Vector3<f64>], axes: &Matrix3<f64>) -> Vector3<f64> {
        if centered.is_empty() {
            return Vector3::repeat(1.0);
        }
        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for p in centered {
            let q = axes * p;
            lo = lo.inf(&q);
            hi = hi.sup(&q);
        }
        (hi - lo).map(|s| s.max(SCALE_FLOOR))
    }

    pub fn validate_pose(
        &self,
        position: &Vector3<f64>,
        orientation: &Matrix3<f64>,
        explained_variance_ratio: &Vector3<f64>,
        n_points: usize,
    ) -> ValidationScores {
        let orthogonality_error = (orientation * orientation.transpose() - Matrix3::identity()).norm();
        let variance_ratio = explained_variance_ratio[0] / (explained_variance_ratio[1] + DISTANCE_FLOOR);
        ValidationScores {
            point_sufficiency: (n_points as f64 / 100.0).min(1.0),
            pca_quality: (explained_variance_ratio[0] + explained_variance_ratio[1]).clamp(0.0, 1.0),
            orthogonality: (1.0 - orthogonality_error * 10.0).max(0.0),
            direction_clarity: (variance_ratio / 3.0).min(1.0),
            numerical_stability: if position.norm() < STABLE_POSITION_NORM {
                1.0
            } else {
                0.5
            },
        }
    }

    /// Pose with the configured centre method.
    pub fn estimate_6d_pose(&self, points: &[Vector3<f64>]) -> PoseEstimate {
        self.estimate_with(points, self.config.center_method)
    }

    /// Pose with a centre method chosen for `object_type`.
    pub fn estimate_pose_for_object_type(&self, points: &[Vector3<f64>], object_type: &str) -> PoseEstimate {
        let method = CenterMethod::for_object_type(object_type, self.config.center_method);
        let mut estimate = self.estimate_with(points, method);
        estimate.metadata.object_type = Some(object_type.to_string());
        estimate
    }

    fn estimate_with(&self, points: &[Vector3<f64>], method: CenterMethod) -> PoseEstimate {
        let n = points.len();
        if n < self.config.min_points {
            tracing::debug!(n_points = n, min_points = self.config.min_points, "too few points for pose");
            return PoseEstimate::failed(
                n,
                method,
                format!("insufficient points: {} < {}", n, self.config.min_points),
            );
        }
        if points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return PoseEstimate::failed(n, method, "point cloud contains non-finite values".into());
        }

        let position = self.compute_center(points, method);
        let centered: Vec<Vector3<f64>> = points.iter().map(|p| p - position).collect();
        let pca = self.compute_pca(&centered);
        let axes = self.align_principal_axes(&pca.components, &centered);
        let orientation = axes.transpose();
        let scale = self.estimate_scale(&centered, &axes);
        let scores = self.validate_pose(&position, &orientation, &pca.explained_variance_ratio, n);
        let confidence = scores.confidence();

        tracing::debug!(
            n_points = n,
            confidence,
            lambda1 = pca.eigenvalues[0],
            "pose estimated"
        );
        PoseEstimate {
            position,
            orientation,
            principal_axes: axes,
            scale,
            confidence,
            metadata: PoseMetadata {
                n_points: n,
                success: true,
                error_message: None,
                center_method: method,
                eigenvalues: pca.eigenvalues.into(),
                explained_variance_ratio: pca.explained_variance_ratio.into(),
                validation: Some(scores),
                object_type: None,
            },
        }
    }

    /// Estimate a pose for `cloud` and wrap everything into a signature.
    pub fn create_spatial_signature_from_pose(
        &self,
        object_id: &str,
        object_type: &str,
        cloud: &ColoredPointCloud,
        bounding_box: Option<BoundingBox>,
    ) -> Result<SpatialSignature> {
        let points = cloud.positions();
        let estimate = self.estimate_pose_for_object_type(&points, object_type);
        let mut signature = SpatialSignature::new(object_id, object_type, points, estimate.position)
            .with_colors(cloud.colors())?
            .with_pose(
                estimate.orientation,
                estimate.principal_axes,
                estimate.scale,
                estimate.confidence,
            )?;
        signature.bounding_box = bounding_box;
        signature.pose_metadata = Some(estimate.metadata);
        tracing::info!(
            "Spatial signature for {} built from {} points (confidence {:.2})",
            object_id,
            signature.point_cloud.len(),
            signature.confidence
        );
        Ok(signature)
    }
}

fn flip_row(m: &mut Matrix3<f64>, row: usize) {
    let flipped = -m.row(row);
    m.set_row(row, &flipped);
}

fn mean(points: &[Vector3<f64>]) -> Vector3<f64> {
    points.iter().sum::<Vector3<f64>>() / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20 x 10 x 5 grid filling a 2 x 1 x 1 box, yawed about +y and moved.
    fn yawed_box(yaw_deg: f64, offset: Vector3<f64>) -> Vec<Vector3<f64>> {
        let (s, c) = yaw_deg.to_radians().sin_cos();
        let mut pts = Vec::with_capacity(1000);
        for i in 0..20 {
            for j in 0..10 {
                for k in 0..5 {
                    let x = -0.95 + 0.1 * i as f64;
                    let y = -0.45 + 0.1 * j as f64;
                    let z = -0.4 + 0.2 * k as f64;
                    pts.push(Vector3::new(c * x + s * z, y, -s * x + c * z) + offset);
                }
            }
        }
        pts
    }

    #[test]
    fn test_recovers_yawed_box() {
        let offset = Vector3::new(3.0, 1.0, 2.0);
        let pts = yawed_box(30.0, offset);
        assert_eq!(pts.len(), 1000);
        let est = PoseEstimator::default().estimate_6d_pose(&pts);

        assert!(est.metadata.success);
        assert!(est.confidence > 0.8, "confidence {}", est.confidence);
        assert!((est.position - offset).norm() < 1e-9);

        let (s, c) = 30f64.to_radians().sin_cos();
        let long_axis = Vector3::new(c, 0.0, -s);
        let first = est.principal_axes.row(0).transpose();
        assert!(first.dot(&long_axis).abs() > 0.99);
        assert!((est.scale[0] - 1.9).abs() < 1e-6);

        assert!((est.orientation.determinant() - 1.0).abs() < 1e-9);
        assert!((est.orientation * est.orientation.transpose() - Matrix3::identity()).norm() < 1e-9);
        assert_eq!(est.orientation, est.principal_axes.transpose());
    }

    #[test]
    fn test_too_few_points() {
        let pts = vec![Vector3::new(1.0, 2.0, 3.0); 9];
        let est = PoseEstimator::default().estimate_6d_pose(&pts);
        assert_eq!(est.confidence, 0.0);
        assert_eq!(est.position, Vector3::zeros());
        assert_eq!(est.orientation, Matrix3::identity());
        assert_eq!(est.scale, Vector3::repeat(1.0));
        assert!(!est.metadata.success);
        assert!(est.metadata.error_message.unwrap().contains("9 < 10"));
    }

    #[test]
    fn test_degenerate_pca() {
        let e = PoseEstimator::default();
        let pca = e.compute_pca(&[Vector3::zeros(), Vector3::x()]);
        assert_eq!(pca.components, Matrix3::identity());
        assert_eq!(pca.eigenvalues, Vector3::repeat(1.0));
    }

    #[test]
    fn test_center_methods() {
        let mut pts = vec![Vector3::zeros(); 6];
        pts[5] = Vector3::new(100.0, 0.0, 0.0);
        let e = PoseEstimator::default();
        let mean = e.compute_center(&pts, CenterMethod::Mean);
        let median = e.compute_center(&pts, CenterMethod::Median);
        let geo = e.compute_center(&pts, CenterMethod::GeometricMedian);
        assert!((mean.x - 100.0 / 6.0).abs() < 1e-9);
        assert_eq!(median, Vector3::zeros());
        assert!(geo.x < 1.0, "geometric median {geo:?}");
        assert_eq!(e.compute_center(&[], CenterMethod::Mean), Vector3::zeros());
    }

    #[test]
    fn test_object_type_adaptation() {
        let pts = yawed_box(0.0, Vector3::zeros());
        let e = PoseEstimator::default();
        let sofa = e.estimate_pose_for_object_type(&pts, "Sofa");
        assert_eq!(sofa.metadata.center_method, CenterMethod::GeometricMedian);
        assert_eq!(sofa.metadata.object_type.as_deref(), Some("Sofa"));
        let table = e.estimate_pose_for_object_type(&pts, "DiningTable");
        assert_eq!(table.metadata.center_method, CenterMethod::Mean);
    }

    #[test]
    fn test_compare_estimates() {
        let e = PoseEstimator::default();
        let a = e.estimate_6d_pose(&yawed_box(0.0, Vector3::zeros()));
        let mut b = a.clone();
        b.position += Vector3::new(0.0, 0.0, 2.0);
        let cmp = compare_pose_estimates(&a, &b);
        assert!((cmp.position_difference - 2.0).abs() < 1e-9);
        assert!(cmp.rotation_difference_degrees < 1e-3);
        assert!(cmp.confidence_difference.abs() < 1e-12);

        let mut rotated = a.clone();
        let (s, c) = 90f64.to_radians().sin_cos();
        rotated.orientation = a.orientation * Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c);
        let cmp = compare_pose_estimates(&a, &rotated);
        assert!((cmp.rotation_difference_degrees - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_signature_from_pose() {
        let pts = yawed_box(15.0, Vector3::new(1.0, 0.0, 0.0));
        let cloud = ColoredPointCloud::from_positions(&pts);
        let sig = PoseEstimator::default()
            .create_spatial_signature_from_pose("Sofa|1", "Sofa", &cloud, None)
            .unwrap();
        assert_eq!(sig.point_cloud.len(), 1000);
        assert!(sig.confidence > 0.8);
        assert_eq!(sig.point_colors.as_ref().map(Vec::len), Some(1000));
        let meta = sig.pose_metadata.as_ref().unwrap();
        assert_eq!(meta.center_method, CenterMethod::GeometricMedian);
    }

    #[test]
    fn test_confidence_weights() {
        let s = ValidationScores {
            point_sufficiency: 1.0,
            pca_quality: 1.0,
            orthogonality: 1.0,
            direction_clarity: 1.0,
            numerical_stability: 1.0,
        };
        assert!((s.confidence() - 1.0).abs() < 1e-12);
        assert_eq!(ValidationScores::default().confidence(), 0.0);
    }
}
