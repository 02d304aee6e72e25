//! Perception: from sensor frames to a grounded spatial signature.
//!
//! [`PointCloudReconstructor`] back-projects a depth frame into a colored
//! cloud for one instance, [`PoseEstimator`] fits a PCA pose to it, and
//! [`SpatialSignature`] carries the result together with semantic regions
//! and affordances.

pub mod config;
pub mod point_cloud;
pub mod pose;
pub mod regions;
pub mod signature;

pub use config::{CenterMethod, PoseConfig, ReconstructionConfig};
pub use point_cloud::{
    point_cloud_stats, to_ply_string, CameraIntrinsics, ColoredPoint, ColoredPointCloud,
    PointCloudReconstructor, PointCloudStats, ReconstructionReport, SensorFrame,
};
pub use pose::{compare_pose_estimates, PoseComparison, PoseEstimate, PoseEstimator, PoseMetadata};
pub use regions::{slice_regions, BoxSignature, RegionSchema};
pub use signature::{
    merge_signatures, AffordancePoint, InteractionType, RegionSignature, SignatureSummary,
    SpatialSignature,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors emitted at perception construction boundaries.
#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Frame shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Unknown region schema: {0}")]
    UnknownSchema(String),
}

/// Convenience alias used throughout the perception module.
pub type Result<T> = std::result::Result<T, PerceptionError>;
