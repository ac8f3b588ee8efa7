//! Property-based tests for the dependency graph and the rule walk.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rulemsx_core::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

// Strategies for generating test data
fn edge_strategy(points: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..points, 0..points), 0..40)
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // -10,000.00 to 10,000.00
}

fn field_set(points: usize) -> DataSet {
    let set = DataSet::new("Random");
    for i in 0..points {
        let point = set.add_data_point(format!("P{}", i)).unwrap();
        point.set_source(Arc::new(FieldSource::new(format!("F{}", i), i as i64)));
    }
    set
}

fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
}

proptest! {
    /// Accepted edges never close a loop, so a full evaluation order exists
    #[test]
    fn accepted_edges_stay_acyclic(edges in edge_strategy(8)) {
        let set = field_set(8);
        let mut accepted = Vec::new();

        for (from, to) in edges {
            let dependent = format!("P{}", from);
            let dependency = format!("P{}", to);
            match set.add_dependency_by_name(&dependent, &dependency) {
                Ok(true) => accepted.push((dependent, dependency)),
                Ok(false) => prop_assert!(accepted.contains(&(dependent, dependency))),
                Err(DataSetError::Cycle { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        let order = set.evaluation_order();
        prop_assert_eq!(order.len(), 8);
        for (dependent, dependency) in &accepted {
            prop_assert!(position(&order, dependency) < position(&order, dependent));
        }
    }

    /// A rejected edge always has a path back from the dependency
    #[test]
    fn rejected_edges_would_close_a_loop(edges in edge_strategy(6)) {
        let set = field_set(6);
        for (from, to) in edges {
            let dependent = format!("P{}", from);
            let dependency = format!("P{}", to);
            if let Err(DataSetError::Cycle { .. }) = set.add_dependency_by_name(&dependent, &dependency) {
                let upstream = set.dependents_of(&dependent).unwrap();
                prop_assert!(from == to || upstream.contains(&dependency));
            }
        }
    }

    /// Invalidating a point makes exactly it and its transitive dependents stale
    #[test]
    fn invalidate_reaches_all_dependents(edges in edge_strategy(8), target in 0usize..8) {
        let set = field_set(8);
        for (from, to) in edges {
            let _ = set.add_dependency_by_name(&format!("P{}", from), &format!("P{}", to));
        }
        for point in set.data_points() {
            point.set_state(DataPointState::Current).unwrap();
        }

        let name = format!("P{}", target);
        let touched = set.invalidate(&name).unwrap();
        let mut expected: HashSet<String> = set.dependents_of(&name).unwrap().into_iter().collect();
        prop_assert_eq!(touched, expected.len());
        expected.insert(name);

        let stale: HashSet<String> = set.stale_data_points().into_iter().collect();
        prop_assert_eq!(stale, expected);
    }

    /// Summing compound matches the arithmetic sum of its inputs
    #[test]
    fn compound_sum_matches(amounts in prop::collection::vec(amount_strategy(), 1..10)) {
        let set = DataSet::new("Order1");
        let total = set.add_data_point("Total").unwrap();
        total.set_source(Arc::new(CompoundSource::sum()));

        for (i, amount) in amounts.iter().enumerate() {
            let leg = set.add_data_point(format!("Leg{}", i)).unwrap();
            leg.set_source(Arc::new(ConstantSource::new(*amount)));
            set.add_dependency(&total, &leg).unwrap();
        }

        let expected: Decimal = amounts.iter().copied().sum();
        prop_assert_eq!(set.value("Total").unwrap(), Value::Number(expected));
    }

    /// A child is evaluated exactly when its parent held
    #[test]
    fn children_evaluated_only_under_true_parents(
        tree in prop::collection::vec((any::<bool>(), prop::collection::vec(any::<bool>(), 0..4)), 1..6),
    ) {
        let mut rules = RuleSet::new("Random");
        for (i, (holds, children)) in tree.iter().enumerate() {
            let holds = *holds;
            let root = rules
                .add_rule(Rule::new(
                    format!("R{}", i),
                    Arc::new(FnEvaluator::new(Vec::<String>::new(), move |_| Ok(holds))),
                    Arc::new(NoAction),
                ))
                .unwrap();
            for (j, child) in children.iter().enumerate() {
                let child = *child;
                root.add_rule(Rule::new(
                    format!("C{}", j),
                    Arc::new(FnEvaluator::new(Vec::<String>::new(), move |_| Ok(child))),
                    Arc::new(NoAction),
                ))
                .unwrap();
            }
        }

        let report = rules.execute(&DataSet::new("Order1"));
        for (i, (holds, children)) in tree.iter().enumerate() {
            let root_path = format!("R{}", i);
            prop_assert!(report.was_evaluated(&root_path));
            for (j, child) in children.iter().enumerate() {
                let path = format!("R{}/C{}", i, j);
                prop_assert_eq!(report.was_evaluated(&path), *holds);
                prop_assert_eq!(report.outcome(&path) == Some(RuleOutcome::Fired), *holds && *child);
            }
        }
        prop_assert!(report.is_clean());
    }
}

/// Edge cases that shouldn't panic
mod edge_cases {
    use super::*;

    #[test]
    fn self_dependency_is_a_cycle() {
        let set = field_set(1);
        assert!(matches!(
            set.add_dependency_by_name("P0", "P0"),
            Err(DataSetError::Cycle { .. })
        ));
    }

    #[test]
    fn foreign_point_rejected() {
        let a = field_set(2);
        let b = field_set(2);
        let foreign = b.data_point("P1").unwrap();
        let local = a.data_point("P0").unwrap();
        assert!(matches!(
            a.add_dependency(&local, &foreign),
            Err(DataSetError::ForeignDataPoint { .. })
        ));
    }

    #[test]
    fn long_chain_orders_and_propagates() {
        let set = field_set(200);
        for i in 1..200 {
            set.add_dependency_by_name(&format!("P{}", i), &format!("P{}", i - 1))
                .unwrap();
        }
        let order = set.evaluation_order();
        assert_eq!(order.first().map(String::as_str), Some("P0"));
        assert_eq!(order.last().map(String::as_str), Some("P199"));
        assert_eq!(set.invalidate("P0").unwrap(), 199);
        assert!(set.add_dependency_by_name("P0", "P199").is_err());
    }
}
