//! Spatial Reasoning Benchmarks
//!
//! Benchmarks for the ruvector-spatial-reasoning crate covering:
//! 1. Relation calculation and spatial matching
//! 2. Ambiguity detection
//! 3. Observation strategy and positioning
//! 4. Depth back-projection
//! 5. PCA pose estimation
//! 6. Navigation planning
//!
//! Run with: cargo bench --bench spatial_benchmarks -p ruvector-spatial-reasoning

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use nalgebra::Vector3;
use ruvector_spatial_reasoning::bridge::{
    AgentPose, CandidateObject, Point3D, RelationConfig, SceneSnapshot, SceneView,
    SpatialReasoningConfig,
};
use ruvector_spatial_reasoning::disambiguation::HeuristicAmbiguityDetector;
use ruvector_spatial_reasoning::geometry::GeometricAnalyzer;
use ruvector_spatial_reasoning::navigation::NavigationPlanner;
use ruvector_spatial_reasoning::perception::{PointCloudReconstructor, PoseEstimator, SensorFrame};
use ruvector_spatial_reasoning::relations::SpatialRelationCalculator;

// ---------------------------------------------------------------------------
// Data generators
// ---------------------------------------------------------------------------

/// Deterministic pseudo-random f64 in [0, 1).
fn pseudo_random(seed: u64, index: usize) -> f64 {
    let h = seed
        .wrapping_mul(index as u64 + 1)
        .wrapping_mul(0x5DEECE66D)
        .wrapping_add(0xB);
    ((h % 10000) as f64) / 10000.0
}

/// N mugs scattered over a 10 x 10 room around the agent.
fn generate_candidates(n: usize) -> Vec<CandidateObject> {
    (0..n)
        .map(|i| {
            let x = pseudo_random(42, i * 2) * 10.0 - 5.0;
            let z = pseudo_random(42, i * 2 + 1) * 10.0 - 5.0;
            CandidateObject::new(format!("Mug|{i}"), "Mug", Point3D::new(x, 0.9, z))
                .with_size(0.1, 0.12, 0.1)
                .with_visible(i % 4 != 0)
        })
        .collect()
}

fn generate_points(n: usize) -> Vec<Vector3<f64>> {
    (0..n)
        .map(|i| {
            Vector3::new(
                pseudo_random(7, i * 3) * 2.0,
                pseudo_random(7, i * 3 + 1) * 0.8,
                pseudo_random(7, i * 3 + 2) * 0.5,
            )
        })
        .collect()
}

fn generate_frame(width: usize, height: usize) -> SensorFrame {
    let n = width * height;
    let depth = (0..n).map(|i| 1.0 + pseudo_random(3, i) as f32 * 4.0).collect();
    let color = (0..n).map(|i| [(i % 256) as u8, 128, 64]).collect();
    let instances = (0..n).map(|i| (i % width * 4 / width) as u32).collect();
    match SensorFrame::new(width, height, depth, color).and_then(|f| f.with_instances(instances)) {
        Ok(frame) => frame,
        Err(e) => panic!("benchmark frame is malformed: {e}"),
    }
}

fn scene(candidates: Vec<CandidateObject>) -> Arc<dyn SceneView> {
    Arc::new(SceneSnapshot::new(AgentPose::default(), candidates))
}

// ---------------------------------------------------------------------------
// 1. Relations
// ---------------------------------------------------------------------------

fn bench_relations(c: &mut Criterion) {
    let mut group = c.benchmark_group("Relations");

    for size in [2, 10, 100] {
        group.throughput(Throughput::Elements(size as u64));
        let candidates = generate_candidates(size);
        let calc = SpatialRelationCalculator::new(RelationConfig::default());

        group.bench_with_input(
            BenchmarkId::new("calculate_relative_positions", size),
            &candidates,
            |b, cands| b.iter(|| black_box(calc.calculate_relative_positions(cands, None))),
        );

        group.bench_with_input(
            BenchmarkId::new("find_best_spatial_match", size),
            &candidates,
            |b, cands| {
                b.iter(|| black_box(calc.find_best_spatial_match(cands, "the mug on the left near me")))
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Ambiguity detection
// ---------------------------------------------------------------------------

fn bench_ambiguity_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ambiguity_Detection");
    let candidates = generate_candidates(8);
    let config = SpatialReasoningConfig::default();
    let calc = SpatialRelationCalculator::new(config.relation.clone())
        .with_scene(scene(candidates.clone()));
    let detector = HeuristicAmbiguityDetector::new(config.ambiguity.clone(), Some(calc));

    for instruction in ["bring me a mug", "the mug on the left", "the mug near the window"] {
        group.bench_with_input(
            BenchmarkId::new("detect_ambiguity", instruction),
            &instruction,
            |b, text| b.iter(|| black_box(detector.detect_ambiguity(text, &candidates))),
        );
    }

    group.bench_function("heuristic_object_selection", |b| {
        b.iter(|| black_box(detector.heuristic_object_selection("the right one", &candidates)))
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Observation strategy
// ---------------------------------------------------------------------------

fn bench_observation_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("Observation_Strategy");
    let analyzer = GeometricAnalyzer::default();
    let sofa = CandidateObject::new("Sofa|1", "Sofa", Point3D::new(0.0, 0.4, 3.0)).with_size(2.5, 0.8, 1.2);

    group.bench_function("analyze_observation_requirements", |b| {
        b.iter(|| black_box(analyzer.analyze_observation_requirements(&sofa)))
    });

    for size in [10, 100, 1_000] {
        let positions: Vec<Point3D> = (0..size)
            .map(|i| Point3D::new(pseudo_random(11, i) * 8.0 - 4.0, 0.0, pseudo_random(13, i) * 8.0))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("get_enhanced_positioning_strategy", size),
            &positions,
            |b, pos| b.iter(|| black_box(analyzer.get_enhanced_positioning_strategy(&sofa, pos))),
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 4. Depth back-projection
// ---------------------------------------------------------------------------

fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reconstruction");
    let reconstructor = PointCloudReconstructor::default();

    for (w, h) in [(64, 48), (160, 120), (320, 240)] {
        let frame = generate_frame(w, h);
        group.throughput(Throughput::Elements((w * h) as u64));

        group.bench_with_input(
            BenchmarkId::new("full_frame", w * h),
            &frame,
            |b, f| b.iter(|| black_box(reconstructor.reconstruct_pointcloud(f, None, None))),
        );

        group.bench_with_input(
            BenchmarkId::new("single_instance", w * h),
            &frame,
            |b, f| b.iter(|| black_box(reconstructor.reconstruct_pointcloud(f, Some(2), None))),
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 5. Pose estimation
// ---------------------------------------------------------------------------

fn bench_pose_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pose_Estimation");
    let estimator = PoseEstimator::default();

    for size in [100, 1_000, 10_000] {
        let points = generate_points(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("mean_center", size), &points, |b, pts| {
            b.iter(|| black_box(estimator.estimate_6d_pose(pts)))
        });

        group.bench_with_input(
            BenchmarkId::new("geometric_median_center", size),
            &points,
            |b, pts| b.iter(|| black_box(estimator.estimate_pose_for_object_type(pts, "Sofa"))),
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 6. Navigation planning
// ---------------------------------------------------------------------------

fn bench_navigation_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Navigation_Plan");
    let planner = NavigationPlanner::new(SpatialReasoningConfig::default(), scene(generate_candidates(6)));
    let reachable: Vec<Point3D> = (0..200)
        .map(|i| Point3D::new(pseudo_random(5, i) * 10.0 - 5.0, 0.0, pseudo_random(6, i) * 10.0 - 5.0))
        .collect();

    group.bench_function("plan_with_instruction", |b| {
        b.iter(|| black_box(planner.plan("Mug", Some("the mug on the left"), &reachable)))
    });

    group.bench_function("plan_with_model_response", |b| {
        b.iter(|| {
            black_box(planner.plan_with_model_response("Mug", "navigate to mug3", "find a mug", &reachable))
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_relations,
    bench_ambiguity_detection,
    bench_observation_strategy,
    bench_reconstruction,
    bench_pose_estimation,
    bench_navigation_plan,
);

criterion_main!(benches);
