//! Property-based tests for parsing and lowering
//!
//! These tests use `proptest` to generate random schedules and verify that
//! lowering either rejects them cleanly or yields a consistent loop nest.

#[cfg(test)]
mod tests {
    use crate::{lower, Assignment, LoopKind, PlanError, Schedule, TensorInfo};
    use proptest::prelude::*;

    fn chain() -> (Assignment, Vec<TensorInfo>) {
        let stmt = Assignment::parse("E(i,l) = A(i,j) * B(j,k) * C(k,l)").unwrap();
        let operands = vec![
            TensorInfo::new("A", vec![6, 5], vec![0, 1]),
            TensorInfo::new("B", vec![5, 4], vec![0, 1]),
            TensorInfo::new("C", vec![4, 3], vec![1, 0]),
        ];
        (stmt, operands)
    }

    fn names() -> Vec<&'static str> {
        vec!["i", "l", "j", "k"]
    }

    proptest! {
        /// Reordering by any permutation keeps every loop exactly once
        #[test]
        fn prop_reorder_is_permutation(order in Just(names()).prop_shuffle()) {
            let (stmt, operands) = chain();
            let plan = lower(&stmt, &operands, &Schedule::new().reorder(order.clone())).unwrap();
            prop_assert_eq!(plan.loop_names(), order);
        }

        /// Operand levels follow the binding order of their variables
        #[test]
        fn prop_level_order_follows_loops(order in Just(names()).prop_shuffle()) {
            let (stmt, operands) = chain();
            let plan = lower(&stmt, &operands, &Schedule::new().reorder(order.clone())).unwrap();

            for op in plan.operands() {
                let depths: Vec<usize> = op
                    .level_vars()
                    .iter()
                    .map(|&v| order.iter().position(|n| *n == plan.vars()[v].name()).unwrap())
                    .collect();
                prop_assert!(depths.windows(2).all(|w| w[0] < w[1]));
            }
        }

        /// Random split/reorder schedules lower or fail with a schedule error
        #[test]
        fn prop_split_schedules_are_consistent(
            var in 0usize..4,
            factor in 0usize..8,
            order in Just(vec![0usize, 1, 2, 3, 4]).prop_shuffle(),
        ) {
            let (stmt, operands) = chain();
            let target = names()[var];
            let (outer, inner) = (format!("{}0", target), format!("{}1", target));

            let mut loop_names: Vec<String> = names().iter().map(|s| s.to_string()).collect();
            loop_names.splice(var..=var, [outer.clone(), inner.clone()]);
            let reorder: Vec<&str> = order.iter().map(|&k| loop_names[k].as_str()).collect();

            let schedule = Schedule::new()
                .split(target, outer.as_str(), inner.as_str(), factor)
                .reorder(reorder.clone());

            match lower(&stmt, &operands, &schedule) {
                Ok(plan) => {
                    prop_assert!(factor >= 1);
                    let o = reorder.iter().position(|n| *n == outer).unwrap();
                    let i = reorder.iter().position(|n| *n == inner).unwrap();
                    prop_assert!(o < i);

                    // A binding loop co-iterates every operand that reads its variable
                    for l in plan.loops().iter().filter(|l| l.kind.binds()) {
                        let readers = plan
                            .operands()
                            .iter()
                            .filter(|op| op.level_vars().contains(&l.source))
                            .count();
                        prop_assert_eq!(l.participants.len(), readers);
                    }
                    prop_assert_eq!(
                        plan.loops().iter().filter(|l| l.kind != LoopKind::Full).count(),
                        2
                    );
                }
                Err(PlanError::InvalidSchedule(_)) => {}
                Err(other) => prop_assert!(false, "unexpected error {}", other),
            }
        }

        /// Display output parses back to the same assignment
        #[test]
        fn prop_display_parses_back(perm in Just(vec![0usize, 1, 2]).prop_shuffle()) {
            let (stmt, _) = chain();
            let permuted = stmt.permuted(&perm).unwrap();
            prop_assert_eq!(Assignment::parse(&permuted.to_string()).unwrap(), permuted);
        }
    }
}
