//! # ruvector-spatial-reasoning
//!
//! Spatial reasoning for embodied agents working in simulated indoor scenes:
//! deciding which of several same-typed objects an instruction refers to,
//! where to stand to observe it, and what its 3D pose looks like.
//!
//! ## Modules
//!
//! - [`bridge`]: Scene types, the [`SceneView`] seam, configuration and JSON converters
//! - [`relations`]: Agent-relative directions, distances, landmarks and instruction constraints
//! - [`disambiguation`]: Rule-based ambiguity detection, numbered model replies, clarification dialog
//! - [`geometry`]: Shape classification, observation strategies and stand-off positions
//! - [`perception`]: Depth back-projection, PCA pose estimation, spatial signatures and regions
//! - [`navigation`]: Planner composing the above for one navigation target
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ruvector_spatial_reasoning::bridge::{AgentPose, CandidateObject, Point3D, SceneSnapshot};
//! use ruvector_spatial_reasoning::{NavigationPlanner, SpatialReasoningConfig};
//!
//! let scene = SceneSnapshot::new(
//!     AgentPose::default(),
//!     vec![
//!         CandidateObject::new("Book|1", "Book", Point3D::new(-0.5, 0.8, 0.0)),
//!         CandidateObject::new("Book|2", "Book", Point3D::new(0.4, 0.8, 1.5)),
//!     ],
//! );
//! let planner = NavigationPlanner::new(SpatialReasoningConfig::default(), Arc::new(scene));
//!
//! let plan = planner.plan("Book", Some("the book on the left"), &[]).unwrap();
//! assert_eq!(plan.object_id, "Book|1");
//! ```

pub mod bridge;
pub mod disambiguation;
pub mod geometry;
pub mod navigation;
pub mod perception;
pub mod relations;

// Convenience re-exports of the most commonly used types.
pub use bridge::{
    AgentPose, BoundingBox, CandidateObject, Point3D, SceneSnapshot, SceneView,
    SpatialReasoningConfig,
};
pub use disambiguation::{
    AmbiguityResult, ClarificationDialog, EnhancedAmbiguityResolver, HeuristicAmbiguityDetector,
    ModelService, ObservationProvider, UserChannel,
};
pub use geometry::{GeometricAnalyzer, ObservationStrategy, StrategyType};
pub use navigation::{EnhancementStats, NavigationPlan, NavigationPlanner, PlanSource};
pub use perception::{PointCloudReconstructor, PoseEstimator, SpatialSignature};
pub use relations::{Direction, SpatialRelation, SpatialRelationCalculator};
