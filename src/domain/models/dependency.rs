//! Dependency-edge domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed "must finish before" edge: `task_id` cannot complete until
/// `depends_on_task_id` is Done. Identity is the (task, depends-on) pair.
///
/// The per-project edge set must stay acyclic; any insertion that would
/// close a loop is rejected inside the store's insert transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub depends_on_task_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TaskDependency {
    /// Create a new edge. Self-loops are the resolver's job to reject; this
    /// only captures the pair.
    pub fn new(task_id: Uuid, depends_on_task_id: Uuid) -> Self {
        Self {
            task_id,
            depends_on_task_id,
            created_at: Utc::now(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_edge_captures_pair() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = TaskDependency::new(a, b);
        assert_eq!(edge.task_id, a);
        assert_eq!(edge.depends_on_task_id, b);
    }
}
