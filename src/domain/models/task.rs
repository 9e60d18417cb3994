//! Project task domain model.
//!
//! Tasks are units of work grouped under milestones. They form a DAG through
//! dependency edges: a task cannot complete until everything it depends on
//! is Done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::TaskStatus;

/// Maximum length of a task title.
pub const MAX_TITLE_LEN: usize = 120;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bug,
    Chore,
    Research,
    Docs,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Feature
    }
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Chore => "chore",
            Self::Research => "research",
            Self::Docs => "docs",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "feature" => Some(Self::Feature),
            "bug" => Some(Self::Bug),
            "chore" => Some(Self::Chore),
            "research" => Some(Self::Research),
            "docs" | "documentation" => Some(Self::Docs),
            _ => None,
        }
    }
}

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A unit of work on a project board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTask {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Containing milestone; None means the backlog column
    pub milestone_id: Option<Uuid>,
    /// Human-readable title (1..=120 chars)
    pub title: String,
    /// Detailed description
    pub description: Option<String>,
    /// Kind of work
    pub task_type: TaskType,
    /// Current status
    pub status: TaskStatus,
    /// Priority
    pub priority: TaskPriority,
    /// True iff at least one dependency is not Done
    pub is_blocked: bool,
    /// Position within the column (project, milestone)
    pub order_index: i64,
    /// Role this task is meant for (e.g. "Backend Developer")
    pub assigned_role: Option<String>,
    /// User the task is assigned to
    pub assigned_user_id: Option<Uuid>,
    /// Optional due date
    pub due_at: Option<DateTime<Utc>>,
    /// Actor who created the task
    pub created_by: Uuid,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When the task reached Done
    pub completed_at: Option<DateTime<Utc>>,
    /// Version for optimistic locking
    pub version: i64,
}

impl ProjectTask {
    /// Create a new Todo task in the given project.
    pub fn new(project_id: Uuid, title: impl Into<String>, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            milestone_id: None,
            title: title.into(),
            description: None,
            task_type: TaskType::default(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            is_blocked: false,
            order_index: 0,
            assigned_role: None,
            assigned_user_id: None,
            due_at: None,
            created_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 1,
        }
    }

    /// Place the task under a milestone.
    pub fn with_milestone(mut self, milestone_id: Uuid) -> Self {
        self.milestone_id = Some(milestone_id);
        self
    }

    /// Bump the update timestamp and version token.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Validate structural requirements before persistence.
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("task title cannot be empty".to_string());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("task title exceeds {MAX_TITLE_LEN} characters"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_defaults() {
        let project = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let task = ProjectTask::new(project, "Set up CI", actor);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.is_blocked);
        assert_eq!(task.version, 1);
        assert_eq!(task.created_by, actor);
    }

    #[test]
    fn test_validate_title_bounds() {
        let project = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let empty = ProjectTask::new(project, "   ", actor);
        assert!(empty.validate().is_err());

        let long = ProjectTask::new(project, "x".repeat(MAX_TITLE_LEN + 1), actor);
        assert!(long.validate().is_err());

        let ok = ProjectTask::new(project, "x".repeat(MAX_TITLE_LEN), actor);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut task = ProjectTask::new(Uuid::new_v4(), "Ship it", Uuid::new_v4());
        task.touch();
        assert_eq!(task.version, 2);
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn test_type_and_priority_parsing() {
        assert_eq!(TaskType::from_str("documentation"), Some(TaskType::Docs));
        assert_eq!(TaskType::from_str("unknown"), None);
        assert_eq!(TaskPriority::from_str("normal"), Some(TaskPriority::Medium));
        assert!(TaskPriority::Critical > TaskPriority::High);
    }
}
