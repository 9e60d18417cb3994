//! Ordering engine for board columns.
//!
//! `order_index` is kept contiguous (0..n) per column: moving a task shifts
//! exactly the siblings between its old and new position by one, so after
//! any reorder the indices remain a permutation with no gaps or duplicates.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ProjectTask;
use crate::domain::ports::{TaskFilters, TaskGraphRepository};

/// The sibling range `[lo, hi]` that must move by `delta` when a task is
/// pulled out of `old_index` and dropped at `new_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPlan {
    pub lo: i64,
    pub hi: i64,
    pub delta: i64,
}

/// Compute the sibling shift for a reorder. None when the index is unchanged.
pub fn plan_reorder(old_index: i64, new_index: i64) -> Option<ShiftPlan> {
    match new_index.cmp(&old_index) {
        std::cmp::Ordering::Equal => None,
        // Moving down: everything between (old, new] steps up by one.
        std::cmp::Ordering::Greater => Some(ShiftPlan {
            lo: old_index + 1,
            hi: new_index,
            delta: -1,
        }),
        // Moving up: everything in [new, old) steps down by one.
        std::cmp::Ordering::Less => Some(ShiftPlan {
            lo: new_index,
            hi: old_index - 1,
            delta: 1,
        }),
    }
}

/// Service enforcing reorder semantics before the atomic store shift.
pub struct OrderingEngine<R> {
    repo: Arc<R>,
}

impl<R: TaskGraphRepository> OrderingEngine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Move a task to `new_index` within its column. The target must lie in
    /// `0..sibling_count`; the shift itself is all-or-nothing in the store.
    #[instrument(skip(self))]
    pub async fn reorder(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_index: i64,
    ) -> DomainResult<ProjectTask> {
        let task = self
            .repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        let column_filter = match task.milestone_id {
            Some(id) => TaskFilters {
                milestone_id: Some(id),
                ..TaskFilters::default()
            },
            None => TaskFilters {
                backlog: Some(true),
                ..TaskFilters::default()
            },
        };
        let siblings = self.repo.count_tasks(project_id, column_filter).await?;

        if new_index < 0 || new_index >= siblings {
            return Err(DomainError::InvalidOperation(format!(
                "reorder target {new_index} outside column of {siblings} tasks"
            )));
        }

        if new_index != task.order_index {
            self.repo
                .reorder_task(project_id, task_id, new_index, task.version)
                .await?;
        }

        self.repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_shift_for_same_index() {
        assert_eq!(plan_reorder(3, 3), None);
    }

    #[test]
    fn test_shift_moving_down() {
        // 2 -> 5: siblings at 3..=5 step up into 2..=4.
        assert_eq!(
            plan_reorder(2, 5),
            Some(ShiftPlan { lo: 3, hi: 5, delta: -1 })
        );
    }

    #[test]
    fn test_shift_moving_up() {
        // 3 -> 0: siblings at 0..=2 step down into 1..=3.
        assert_eq!(
            plan_reorder(3, 0),
            Some(ShiftPlan { lo: 0, hi: 2, delta: 1 })
        );
    }

    #[test]
    fn test_shift_is_a_permutation() {
        // Simulate the example from the board rules: 5 siblings, move 3 -> 0.
        let mut indices: Vec<i64> = (0..5).collect();
        let plan = plan_reorder(3, 0).unwrap();
        for idx in &mut indices {
            if *idx == 3 {
                *idx = 0;
            } else if *idx >= plan.lo && *idx <= plan.hi {
                *idx += plan.delta;
            }
        }
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
        assert_eq!(indices, vec![1, 2, 3, 0, 4]);
    }
}
