//! Subtask domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A checklist item owned exclusively by a task; deleted with its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSubtask {
    /// Unique identifier
    pub id: Uuid,
    /// Owning task
    pub task_id: Uuid,
    /// Checklist label
    pub title: String,
    /// Detailed description
    pub description: Option<String>,
    /// Whether the item is checked off
    pub is_done: bool,
    /// Position within the parent's checklist
    pub order_index: i64,
    /// When the item was checked off
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProjectSubtask {
    /// Create a new unchecked subtask.
    pub fn new(task_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            title: title.into(),
            description: None,
            is_done: false,
            order_index: 0,
            completed_at: None,
        }
    }

    /// Check or uncheck the item, tracking the completion timestamp.
    pub fn set_done(&mut self, done: bool) {
        self.is_done = done;
        self.completed_at = done.then(Utc::now);
    }

    /// Validate structural requirements before persistence.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("subtask title cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_tracks_completion() {
        let mut subtask = ProjectSubtask::new(Uuid::new_v4(), "Write docs");
        assert!(!subtask.is_done);

        subtask.set_done(true);
        assert!(subtask.is_done);
        assert!(subtask.completed_at.is_some());

        subtask.set_done(false);
        assert!(subtask.completed_at.is_none());
    }
}
