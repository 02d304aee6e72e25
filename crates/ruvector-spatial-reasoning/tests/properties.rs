//! Property tests over randomly generated scenes, sizes and point clouds.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use proptest::prelude::*;

use ruvector_spatial_reasoning::bridge::{CandidateObject, Point3D, RelationConfig};
use ruvector_spatial_reasoning::disambiguation::HeuristicAmbiguityDetector;
use ruvector_spatial_reasoning::geometry::{GeometricAnalyzer, ShapeType};
use ruvector_spatial_reasoning::perception::{BoxSignature, PoseEstimator};
use ruvector_spatial_reasoning::relations::{
    ConstraintKind, ContainerRelation, Direction, LandmarkProximity, SpatialConstraints,
    SpatialRelation, SpatialRelationCalculator,
};

const INSTRUCTIONS: &[&str] = &[
    "the book on the left",
    "the cup near the window",
    "the far vase behind me",
    "bring me a mug",
    "右边的杯子",
    "the one in front, close to me",
];

fn arb_candidates() -> impl Strategy<Value = Vec<CandidateObject>> {
    prop::collection::vec(
        (-10.0f64..10.0, -10.0f64..10.0, any::<bool>()),
        0..8,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (x, z, visible))| {
                CandidateObject::new(format!("Mug|{i}"), "Mug", Point3D::new(x, 0.9, z))
                    .with_visible(visible)
            })
            .collect()
    })
}

fn arb_constraints() -> impl Strategy<Value = SpatialConstraints> {
    prop::collection::btree_set(0usize..6, 0..6).prop_map(|kinds| {
        let all = [
            ConstraintKind::Left,
            ConstraintKind::Right,
            ConstraintKind::Front,
            ConstraintKind::Back,
            ConstraintKind::Near,
            ConstraintKind::Far,
        ];
        kinds
            .into_iter()
            .map(|k| (all[k], vec!["kw".to_string()]))
            .collect()
    })
}

fn sector(angle: f64) -> usize {
    match Direction::from_angle(angle) {
        Direction::Front => 0,
        Direction::Right => 1,
        Direction::Back => 2,
        Direction::Left => 3,
    }
}

fn shape_rank(s: ShapeType) -> u8 {
    match s {
        ShapeType::Compact => 0,
        ShapeType::Elongated => 1,
        ShapeType::Linear => 2,
    }
}

proptest! {
    #[test]
    fn direction_sectors_partition_the_circle(angle in -720.0f64..720.0) {
        let a = angle.rem_euclid(360.0);
        let expected = if !(45.0..315.0).contains(&a) {
            0
        } else {
            ((a - 45.0) / 90.0) as usize + 1
        };
        prop_assert_eq!(sector(angle), expected);
        prop_assert_eq!(sector(angle), sector(angle + 360.0));
    }

    #[test]
    fn spatial_scores_stay_in_unit_range(
        distance in 0.0f64..20.0,
        angle in 0.0f64..360.0,
        visible in any::<bool>(),
        constraints in arb_constraints(),
    ) {
        let calc = SpatialRelationCalculator::new(RelationConfig::default());
        let relation = SpatialRelation {
            object_id: "Mug|0".into(),
            distance_to_agent: distance,
            relative_direction: Direction::from_angle(angle),
            angle_to_agent: angle,
            is_visible: visible,
            landmark_relations: BTreeMap::<String, LandmarkProximity>::new(),
            container_relations: BTreeMap::<String, ContainerRelation>::new(),
        };
        let score = calc.score_spatial_match(&relation, &constraints);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn detection_confidences_stay_in_unit_range(
        candidates in arb_candidates(),
        instruction in prop::sample::select(INSTRUCTIONS),
    ) {
        let calc = SpatialRelationCalculator::new(RelationConfig::default());
        let (best, confidence) = calc.find_best_spatial_match(&candidates, instruction);
        prop_assert!((0.0..=1.0).contains(&confidence));
        prop_assert_eq!(best.is_none(), candidates.is_empty());

        let detector = HeuristicAmbiguityDetector::new(Default::default(), Some(calc));
        let detected = detector.detect_ambiguity(instruction, &candidates);
        prop_assert!((0.0..=1.0).contains(&detected.confidence));
        if candidates.len() == 1 {
            prop_assert!(!detected.has_ambiguity);
        }
        let selected = detector.heuristic_object_selection(instruction, &candidates);
        prop_assert!((0.0..=1.0).contains(&selected.confidence));
    }

    #[test]
    fn shape_class_is_monotone_in_aspect_ratio(a in 1.0f64..10.0, b in 1.0f64..10.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            shape_rank(ShapeType::classify(lo, 1.5, 3.0)) <= shape_rank(ShapeType::classify(hi, 1.5, 3.0))
        );
    }

    #[test]
    fn strategies_list_one_angle_per_viewpoint(
        w in 0.01f64..6.0,
        h in 0.01f64..4.0,
        d in 0.01f64..6.0,
    ) {
        let analyzer = GeometricAnalyzer::default();
        let obj = CandidateObject::new("Thing|1", "Thing", Point3D::origin()).with_size(w, h, d);
        let s = analyzer.analyze_observation_requirements(&obj);
        prop_assert_eq!(s.optimal_angles.len(), s.viewpoint_count);
        prop_assert!(s.viewpoint_count >= 1 && s.viewpoint_count <= 6);
        prop_assert!((0.5..=3.0).contains(&s.optimal_distance));
    }

    #[test]
    fn positions_are_ranked_best_first(
        positions in prop::collection::vec((-8.0f64..8.0, -8.0f64..8.0), 1..12),
    ) {
        let analyzer = GeometricAnalyzer::default();
        let obj = CandidateObject::new("Table|1", "Table", Point3D::new(0.5, 0.4, -0.5)).with_size(1.2, 0.8, 0.8);
        let points: Vec<Point3D> = positions.iter().map(|&(x, z)| Point3D::new(x, 0.0, z)).collect();
        let ranked = analyzer.get_enhanced_positioning_strategy(&obj, &points);
        prop_assert!(!ranked.is_empty());
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].distance_score >= pair[1].distance_score);
        }
        prop_assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.distance_score)));
    }

    #[test]
    fn box_frame_round_trips(
        yaw in -360.0f64..360.0,
        center in (-5.0f64..5.0, 0.0f64..2.0, -5.0f64..5.0),
        p in (-10.0f64..10.0, -10.0f64..10.0, -10.0f64..10.0),
    ) {
        let obj = CandidateObject::new("Sofa|1", "Sofa", Point3D::new(center.0, center.1, center.2))
            .with_size(2.0, 0.9, 1.0)
            .with_yaw(yaw);
        let sig = BoxSignature::from_candidate(&obj);
        let world = Vector3::new(p.0, p.1, p.2);
        let back = sig.local_to_world(&sig.world_to_local(&world));
        prop_assert!((back - world).norm() < 1e-9);
    }

    #[test]
    fn pose_confidence_stays_in_unit_range(
        raw in prop::collection::vec((-3.0f64..3.0, -3.0f64..3.0, -3.0f64..3.0), 0..60),
    ) {
        let points: Vec<Vector3<f64>> = raw.iter().map(|&(x, y, z)| Vector3::new(x, y, z)).collect();
        let est = PoseEstimator::default().estimate_6d_pose(&points);
        prop_assert!((0.0..=1.0).contains(&est.confidence));
        prop_assert!(est.scale.iter().all(|s| *s > 0.0));
        if points.len() < 10 {
            prop_assert!(!est.metadata.success);
            prop_assert_eq!(est.confidence, 0.0);
        }
    }
}
