//! Property tests over random layouts on small regions.

use coverage_planner::{
    build_grid, AdditionBudget, AdditionOptimizer, Covering, CoverageEvaluator, Grid, GreedyMclpSolver,
    GroundSensor, Region, Sensor,
};
use proptest::prelude::*;

fn square(side: f64) -> Region {
    Region::rectangle((0.0, 0.0), (side, side)).unwrap()
}

fn unit_grid() -> (Region, Grid) {
    let region = square(10.0);
    let grid = build_grid(&region, 1.0).unwrap();
    (region, grid)
}

fn station() -> impl Strategy<Value = (f64, f64, f64)> {
    (-2.0f64..12.0, -2.0f64..12.0, 0.0f64..5.0)
}

fn layout(stations: &[(f64, f64, f64)]) -> Vec<Sensor> {
    stations
        .iter()
        .enumerate()
        .map(|(i, &(x, y, r))| Sensor::from(GroundSensor::new(format!("s{i}"), x, y, r)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn adding_a_sensor_never_lowers_coverage(
        stations in prop::collection::vec(station(), 0..6),
        extra in station(),
    ) {
        let (_, grid) = unit_grid();
        let evaluator = CoverageEvaluator::new();
        let before = layout(&stations);
        let mut after = before.clone();
        after.push(Sensor::from(GroundSensor::new("extra", extra.0, extra.1, extra.2)));

        let a = evaluator.coverage_ratio(&before, &grid);
        let b = evaluator.coverage_ratio(&after, &grid);
        prop_assert!((0.0..=1.0).contains(&a));
        prop_assert!((0.0..=1.0).contains(&b));
        prop_assert!(b >= a);
    }

    #[test]
    fn grid_construction_is_idempotent(side in 1.0f64..20.0, resolution in 0.25f64..2.0) {
        let region = square(side);
        let first = build_grid(&region, resolution).unwrap();
        let second = build_grid(&region, resolution).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.inside_count() > 0);
    }

    #[test]
    fn zero_radius_sensor_covers_at_most_its_own_node(x in -1.0f64..11.0, y in -1.0f64..11.0) {
        let (_, grid) = unit_grid();
        let evaluator = CoverageEvaluator::new();
        let off_node = Sensor::from(GroundSensor::new("z", x, y, 0.0));
        prop_assert!(evaluator.covered_by(&off_node, &grid).len() <= 1);

        let node = (x.round().clamp(0.0, 10.0), y.round().clamp(0.0, 10.0));
        let on_node = Sensor::from(GroundSensor::new("n", node.0, node.1, 0.0));
        prop_assert_eq!(evaluator.covered_by(&on_node, &grid).len(), 1);
        prop_assert!(on_node.covers(node, None));
    }

    #[test]
    fn addition_never_regresses(
        stations in prop::collection::vec(station(), 0..3),
        target in 0.3f64..0.95,
    ) {
        let (region, grid) = unit_grid();
        let existing = layout(&stations);
        let before = CoverageEvaluator::new().coverage_ratio(&existing, &grid);

        let optimizer = AdditionOptimizer::new(1.0, 3.0).unwrap();
        let solution = optimizer
            .optimize(&existing, &region, &grid, target, AdditionBudget::sensors(2))
            .unwrap();
        prop_assert!(solution.coverage_ratio() >= before - 1e-12);
        prop_assert!(solution.len() >= existing.len());
        prop_assert!(solution.len() <= existing.len() + 2);
        for (kept, original) in solution.sensors().iter().zip(&existing) {
            prop_assert_eq!(kept, original);
        }
    }

    #[test]
    fn greedy_is_deterministic(target in 0.2f64..0.9, radius in 1.5f64..4.0) {
        let region = square(8.0);
        let solver = GreedyMclpSolver::new(target, radius, 1.0).unwrap();
        let first = solver.solve(&region).unwrap();
        let second = solver.solve(&region).unwrap();
        prop_assert_eq!(first.sensors(), second.sensors());
        prop_assert_eq!(first.coverage_ratio(), second.coverage_ratio());
        prop_assert!(first.coverage_ratio() >= target);
    }
}
