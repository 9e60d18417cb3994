//! Project milestone domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::MilestoneStatus;

/// A named grouping of tasks representing a project phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMilestone {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Detailed description
    pub description: Option<String>,
    /// Current status
    pub status: MilestoneStatus,
    /// Position among the project's milestones
    pub order_index: i64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// Version for optimistic locking
    pub version: i64,
}

impl ProjectMilestone {
    /// Create a new Planned milestone.
    pub fn new(project_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            description: None,
            status: MilestoneStatus::default(),
            order_index: 0,
            created_at: Utc::now(),
            version: 1,
        }
    }

    /// Validate structural requirements before persistence.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("milestone title cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_milestone_is_planned() {
        let milestone = ProjectMilestone::new(Uuid::new_v4(), "MVP");
        assert_eq!(milestone.status, MilestoneStatus::Planned);
        assert!(milestone.validate().is_ok());
    }

    #[test]
    fn test_empty_title_rejected() {
        let milestone = ProjectMilestone::new(Uuid::new_v4(), "  ");
        assert!(milestone.validate().is_err());
    }
}
