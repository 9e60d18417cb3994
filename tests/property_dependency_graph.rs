//! Property tests for the pure graph and ordering helpers.

use std::collections::{HashMap, HashSet};

use gainit_planning::domain::models::{TaskDependency, TaskStatus};
use gainit_planning::services::dependency_resolver::{compute_blocked, topological_order};
use gainit_planning::services::ordering::plan_reorder;
use proptest::prelude::*;
use uuid::Uuid;

/// Build an acyclic edge set: each task may depend only on earlier tasks.
fn acyclic_edges(task_ids: &[Uuid], picks: &[(usize, usize)]) -> Vec<TaskDependency> {
    picks
        .iter()
        .filter(|&&(from, to)| from < task_ids.len() && to < from)
        .map(|&(from, to)| TaskDependency::new(task_ids[from], task_ids[to]))
        .collect()
}

proptest! {
    /// For any acyclic graph, the topological order places every dependency
    /// before its dependent and contains each task exactly once.
    #[test]
    fn prop_topological_order_respects_edges(
        size in 1usize..20,
        picks in proptest::collection::vec((0usize..20, 0usize..20), 0..40)
    ) {
        let task_ids: Vec<Uuid> = (0..size).map(|_| Uuid::new_v4()).collect();
        let edges = acyclic_edges(&task_ids, &picks);

        let sorted = topological_order(&task_ids, &edges)
            .expect("acyclic graph must sort");

        prop_assert_eq!(sorted.len(), task_ids.len());
        let unique: HashSet<Uuid> = sorted.iter().copied().collect();
        prop_assert_eq!(unique.len(), task_ids.len());

        let position: HashMap<Uuid, usize> =
            sorted.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for edge in &edges {
            prop_assert!(position[&edge.depends_on_task_id] < position[&edge.task_id]);
        }
    }

    /// Closing any cycle makes the sort fail.
    #[test]
    fn prop_cycle_always_detected(size in 2usize..15) {
        let task_ids: Vec<Uuid> = (0..size).map(|_| Uuid::new_v4()).collect();
        let mut edges: Vec<TaskDependency> = task_ids
            .windows(2)
            .map(|w| TaskDependency::new(w[1], w[0]))
            .collect();
        // Last task feeds back into the first.
        edges.push(TaskDependency::new(task_ids[0], task_ids[size - 1]));

        prop_assert!(topological_order(&task_ids, &edges).is_err());
    }

    /// A task is blocked iff at least one dependency is not Done.
    #[test]
    fn prop_blocked_matches_dependency_statuses(
        dep_statuses in proptest::collection::vec(0u8..3, 0..8)
    ) {
        let task = Uuid::new_v4();
        let mut edges = Vec::new();
        let mut status_of = HashMap::new();
        let mut any_incomplete = false;

        for raw in &dep_statuses {
            let dep = Uuid::new_v4();
            let status = match raw {
                0 => TaskStatus::Todo,
                1 => TaskStatus::InProgress,
                _ => TaskStatus::Done,
            };
            any_incomplete |= status != TaskStatus::Done;
            edges.push(TaskDependency::new(task, dep));
            status_of.insert(dep, status);
        }

        prop_assert_eq!(compute_blocked(task, &edges, &status_of), any_incomplete);
    }

    /// Applying a reorder shift to a contiguous column yields a permutation
    /// with the moved task at its target index.
    #[test]
    fn prop_reorder_keeps_column_contiguous(
        len in 1i64..30,
        seed_old in 0i64..30,
        seed_new in 0i64..30,
    ) {
        let old_index = seed_old % len;
        let new_index = seed_new % len;
        let mut indices: Vec<i64> = (0..len).collect();

        if let Some(plan) = plan_reorder(old_index, new_index) {
            for idx in &mut indices {
                if *idx == old_index {
                    *idx = new_index;
                } else if *idx >= plan.lo && *idx <= plan.hi {
                    *idx += plan.delta;
                }
            }
        }

        let mut sorted = indices.clone();
        sorted.sort_unstable();
        let expected: Vec<i64> = (0..len).collect();
        prop_assert_eq!(sorted, expected);
        #[allow(clippy::cast_sign_loss)]
        let moved = indices[old_index as usize];
        prop_assert_eq!(moved, new_index);
    }
}
