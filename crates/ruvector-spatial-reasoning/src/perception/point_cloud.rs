//! Depth-frame back-projection into colored point clouds.
//!
//! The camera frame is pinhole with `x` right, `y` up and `z` forward; image
//! rows grow downward so the back-projected `y` is negated. Color and
//! instance lookups re-project each point into the image.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use super::config::ReconstructionConfig;
use super::{PerceptionError, Result};
use crate::bridge::Point3D;

// ---------------------------------------------------------------------------
// Camera and frames
// ---------------------------------------------------------------------------

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: usize,
    pub height: usize,
}

impl CameraIntrinsics {
    /// Square-pixel intrinsics from a horizontal field of view, principal
    /// point at the image centre.
    pub fn from_fov(width: usize, height: usize, fov_degrees: f64) -> Self {
        let f = (width as f64 / 2.0) / (fov_degrees.to_radians() / 2.0).tan();
        Self {
            fx: f,
            fy: f,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            width,
            height,
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Camera-frame point for pixel `(u, v)` at `depth`.
    pub fn back_project(&self, u: usize, v: usize, depth: f64) -> Vector3<f64> {
        let x = (u as f64 - self.cx) * depth / self.fx;
        let y = (v as f64 - self.cy) * depth / self.fy;
        Vector3::new(x, -y, depth)
    }

    /// Pixel a camera-frame point falls on, or `None` when it is behind the
    /// camera or outside the image.
    pub fn project(&self, p: &Vector3<f64>) -> Option<(usize, usize)> {
        if p.z <= 0.0 || !p.z.is_finite() {
            return None;
        }
        let u = (p.x * self.fx / p.z + self.cx).round();
        let v = (-p.y * self.fy / p.z + self.cy).round();
        if u < 0.0 || v < 0.0 || u >= self.width as f64 || v >= self.height as f64 {
            return None;
        }
        Some((u as usize, v as usize))
    }
}

/// One synchronised capture: depth in metres, RGB, and an optional instance
/// id per pixel. All buffers are row-major.
///
/// Frames built through [`SensorFrame::new`] are shape-checked; the fields
/// stay public, so consumers call [`SensorFrame::validate`] before indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub width: usize,
    pub height: usize,
    pub depth: Vec<f32>,
    pub color: Vec<[u8; 3]>,
    pub instances: Option<Vec<u32>>,
}

impl SensorFrame {
    pub fn new(width: usize, height: usize, depth: Vec<f32>, color: Vec<[u8; 3]>) -> Result<Self> {
        let frame = Self {
            width,
            height,
            depth,
            color,
            instances: None,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Attach an instance segmentation map of the same shape.
    pub fn with_instances(mut self, instances: Vec<u32>) -> Result<Self> {
        self.instances = Some(instances);
        self.validate()?;
        Ok(self)
    }

    /// Every buffer must hold exactly `width * height` entries.
    pub fn validate(&self) -> Result<()> {
        let expected = self.width * self.height;
        let buffers = [
            ("depth", Some(self.depth.len())),
            ("color", Some(self.color.len())),
            ("instance map", self.instances.as_ref().map(Vec::len)),
        ];
        for (name, len) in buffers {
            if let Some(len) = len.filter(|&len| len != expected) {
                return Err(PerceptionError::ShapeMismatch(format!(
                    "{} has {} values, expected {}x{}",
                    name, len, self.width, self.height
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn index(&self, u: usize, v: usize) -> usize {
        v * self.width + u
    }
}

// ---------------------------------------------------------------------------
// Point cloud
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredPoint {
    pub position: Point3D,
    pub color: [u8; 3],
}

/// Points with RGB, one row per point as `[x, y, z, r, g, b]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColoredPointCloud {
    pub points: Vec<ColoredPoint>,
}

impl ColoredPointCloud {
    pub fn new(points: Vec<ColoredPoint>) -> Self {
        Self { points }
    }

    /// Uncolored cloud; every point gets black.
    pub fn from_positions(positions: &[Vector3<f64>]) -> Self {
        Self {
            points: positions
                .iter()
                .map(|p| ColoredPoint {
                    position: Point3D::from_vector(p),
                    color: [0, 0, 0],
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.points.iter().map(|p| p.position.to_vector()).collect()
    }

    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.points.iter().map(|p| p.color).collect()
    }

    pub fn rows(&self) -> Vec<[f64; 6]> {
        self.points
            .iter()
            .map(|p| {
                let [r, g, b] = p.color;
                [
                    p.position.x,
                    p.position.y,
                    p.position.z,
                    r as f64,
                    g as f64,
                    b as f64,
                ]
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reconstructor
// ---------------------------------------------------------------------------

/// Outcome of reconstructing a named object from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionReport {
    pub object_id: String,
    pub success: bool,
    pub n_points: usize,
    pub error_message: Option<String>,
}

/// Builds colored point clouds from [`SensorFrame`]s.
#[derive(Debug, Clone, Default)]
pub struct PointCloudReconstructor {
    config: ReconstructionConfig,
    intrinsics: Option<CameraIntrinsics>,
}

impl PointCloudReconstructor {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self {
            config,
            intrinsics: None,
        }
    }

    /// Fixed intrinsics instead of the field-of-view default.
    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    pub fn default_intrinsics(&self, width: usize, height: usize) -> CameraIntrinsics {
        CameraIntrinsics::from_fov(width, height, self.config.fov_degrees)
    }

    /// Depth in metres per pixel; `None` where the reading is invalid.
    /// A frame whose buffers disagree with its size gives an empty result.
    pub fn preprocess_depth(&self, frame: &SensorFrame) -> Vec<Option<f32>> {
        if let Err(e) = frame.validate() {
            tracing::warn!("Skipping depth preprocessing: {}", e);
            return Vec::new();
        }
        let max = self.config.max_depth;
        let valid: Vec<Option<f32>> = frame
            .depth
            .iter()
            .map(|&d| (d.is_finite() && d > 0.0 && d <= max).then_some(d))
            .collect();
        if !self.config.median_filter {
            return valid;
        }

        let (w, h) = (frame.width, frame.height);
        let mut out = valid.clone();
        let mut window = Vec::with_capacity(9);
        for v in 0..h {
            for u in 0..w {
                if valid[v * w + u].is_none() {
                    continue;
                }
                window.clear();
                for nv in v.saturating_sub(1)..=(v + 1).min(h - 1) {
                    for nu in u.saturating_sub(1)..=(u + 1).min(w - 1) {
                        if let Some(d) = valid[nv * w + nu] {
                            window.push(d);
                        }
                    }
                }
                out[v * w + u] = median(&mut window);
            }
        }
        out
    }

    /// Back-project `frame` into a colored cloud. With `target_instance`
    /// set and an instance map present, only that instance's points are
    /// kept. Frames with no valid depth, or with buffers that disagree with
    /// the frame size, give an empty cloud.
    pub fn reconstruct_pointcloud(
        &self,
        frame: &SensorFrame,
        target_instance: Option<u32>,
        intrinsics: Option<&CameraIntrinsics>,
    ) -> ColoredPointCloud {
        if frame.width == 0 || frame.height == 0 {
            return ColoredPointCloud::default();
        }
        if let Err(e) = frame.validate() {
            tracing::warn!("Skipping reconstruction: {}", e);
            return ColoredPointCloud::default();
        }
        let cam = intrinsics
            .copied()
            .or(self.intrinsics)
            .unwrap_or_else(|| self.default_intrinsics(frame.width, frame.height));
        let depth = self.preprocess_depth(frame);

        let filter = match (&frame.instances, target_instance) {
            (Some(map), Some(id)) => Some((map, id)),
            _ => None,
        };

        let mut points = Vec::new();
        for v in 0..frame.height {
            for u in 0..frame.width {
                let Some(d) = depth[frame.index(u, v)] else {
                    continue;
                };
                let p = cam.back_project(u, v, d as f64);
                let pixel = cam.project(&p);
                if let Some((map, id)) = filter {
                    let hit = pixel.map(|(pu, pv)| map[frame.index(pu, pv)] == id);
                    if hit != Some(true) {
                        continue;
                    }
                }
                let color = pixel
                    .map(|(pu, pv)| frame.color[frame.index(pu, pv)])
                    .unwrap_or([0, 0, 0]);
                points.push(ColoredPoint {
                    position: Point3D::from_vector(&p),
                    color,
                });
            }
        }

        tracing::debug!(
            points = points.len(),
            width = frame.width,
            height = frame.height,
            filtered = filter.is_some(),
            "point cloud reconstructed"
        );
        ColoredPointCloud::new(points)
    }

    /// Reconstruct the cloud of `object_id`, resolving its instance id
    /// through `instance_ids`. Without a resolvable instance the whole frame
    /// is reconstructed and the report says why.
    pub fn reconstruct_object(
        &self,
        frame: &SensorFrame,
        object_id: &str,
        instance_ids: &BTreeMap<String, u32>,
    ) -> (ColoredPointCloud, ReconstructionReport) {
        let mut error_message = None;
        let target = match (&frame.instances, instance_ids.get(object_id)) {
            (Some(_), Some(&id)) => Some(id),
            (None, _) => {
                error_message = Some("instance segmentation unavailable".to_string());
                None
            }
            (Some(_), None) => {
                error_message = Some(format!("no instance id for object {object_id}"));
                None
            }
        };
        if let Some(msg) = &error_message {
            tracing::warn!("Reconstructing full frame for {}: {}", object_id, msg);
        }

        let cloud = self.reconstruct_pointcloud(frame, target, None);
        let report = ReconstructionReport {
            object_id: object_id.to_string(),
            success: true,
            n_points: cloud.len(),
            error_message,
        };
        (cloud, report)
    }
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Statistics and export
// ---------------------------------------------------------------------------

/// Spatial extent, centre and color distribution of a cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudStats {
    pub n_points: usize,
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub center: [f64; 3],
    pub mean_rgb: [f64; 3],
    pub std_rgb: [f64; 3],
}

/// `None` for an empty cloud. Standard deviations are population values.
pub fn point_cloud_stats(cloud: &ColoredPointCloud) -> Option<PointCloudStats> {
    if cloud.is_empty() {
        return None;
    }
    let n = cloud.len() as f64;
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    let mut sum = [0.0; 3];
    let mut rgb_sum = [0.0; 3];
    for p in &cloud.points {
        let xyz = p.position.as_array();
        for k in 0..3 {
            min[k] = min[k].min(xyz[k]);
            max[k] = max[k].max(xyz[k]);
            sum[k] += xyz[k];
            rgb_sum[k] += p.color[k] as f64;
        }
    }
    let center = sum.map(|s| s / n);
    let mean_rgb = rgb_sum.map(|s| s / n);
    let mut var = [0.0; 3];
    for p in &cloud.points {
        for k in 0..3 {
            let d = p.color[k] as f64 - mean_rgb[k];
            var[k] += d * d;
        }
    }
    Some(PointCloudStats {
        n_points: cloud.len(),
        min,
        max,
        center,
        mean_rgb,
        std_rgb: var.map(|v| (v / n).sqrt()),
    })
}

/// ASCII PLY with float positions and uchar colors.
pub fn to_ply_string(cloud: &ColoredPointCloud) -> String {
    let mut out = String::with_capacity(200 + cloud.len() * 40);
    out.push_str("ply\nformat ascii 1.0\n");
    let _ = writeln!(out, "element vertex {}", cloud.len());
    out.push_str(
        "property float x\nproperty float y\nproperty float z\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\nend_header\n",
    );
    for p in &cloud.points {
        let [r, g, b] = p.color;
        let _ = writeln!(
            out,
            "{:.6} {:.6} {:.6} {} {} {}",
            p.position.x, p.position.y, p.position.z, r, g, b
        );
    }
    out
}
