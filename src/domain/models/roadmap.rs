//! Roadmap generation data.
//!
//! `RoadmapData` and its children are the tolerant wire shape of AI-proposed
//! plans: every field except identity-bearing titles is defaultable, type and
//! priority arrive as free strings, and milestones are referenced by local
//! ordinal rather than a real id. They are never persisted as-is; the planner
//! validates them into a `PlanBatch` of real entities first.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::milestone::ProjectMilestone;
use super::subtask::ProjectSubtask;
use super::task::ProjectTask;

/// AI-proposed roadmap, parsed leniently from provider JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapData {
    #[serde(default)]
    pub milestones: Vec<MilestoneData>,
    #[serde(default)]
    pub tasks: Vec<TaskData>,
}

/// AI-proposed milestone entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MilestoneData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordinal used by tasks to reference this milestone within the batch.
    #[serde(default)]
    pub order: Option<i64>,
}

/// AI-proposed task entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Local ordinal of the milestone this task belongs to.
    #[serde(default, alias = "milestone_id")]
    pub milestone: Option<i64>,
    #[serde(default, alias = "type")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Due date as a string; unparseable values are dropped, not fatal.
    #[serde(default)]
    pub due_at: Option<String>,
    /// Alternative: days from the plan's start date.
    #[serde(default)]
    pub due_in_days: Option<i64>,
    #[serde(default)]
    pub assigned_role: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskData>,
}

/// AI-proposed subtask entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtaskData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse a provider-supplied due-date string.
///
/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// How generated content relates to the project's existing roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Wipe the existing roadmap and regenerate from scratch.
    Replace,
    /// Add generated milestones and tasks alongside existing ones.
    Augment,
}

impl PlanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Augment => "augment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "replace" => Some(Self::Replace),
            "augment" | "append" => Some(Self::Augment),
            _ => None,
        }
    }
}

/// High-level goal driving roadmap generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    /// What the project should achieve.
    #[serde(default)]
    pub goal: String,
    /// Free-text constraints (team size, deadlines, scope limits).
    pub constraints: Option<String>,
    /// Technologies the plan should lean on.
    #[serde(default)]
    pub preferred_technologies: Vec<String>,
    /// When work starts; anchors day-offset due dates.
    pub start_date: Option<DateTime<Utc>>,
    /// Desired completion date.
    pub target_date: Option<DateTime<Utc>>,
}

/// Context handed to the provider when elaborating a single task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElaborationRequest {
    /// The question the user wants answered about the task.
    #[serde(default)]
    pub user_question: String,
    /// Extra context the caller wants the provider to consider.
    pub extra_context: Option<String>,
}

/// Validated plan content ready for the atomic apply step. Ids are real and
/// milestone references are resolved; order indices are assigned per column
/// by the store inside the apply transaction.
#[derive(Debug, Clone, Default)]
pub struct PlanBatch {
    pub milestones: Vec<ProjectMilestone>,
    pub tasks: Vec<ProjectTask>,
    pub subtasks: Vec<ProjectSubtask>,
}

/// Outcome of a successful plan application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanApplyResult {
    pub milestones: Vec<ProjectMilestone>,
    pub tasks: Vec<ProjectTask>,
    /// Human-readable notes about non-fatal adjustments (dropped due dates,
    /// duplicate titles, skipped subtasks).
    pub notes: Vec<String>,
}

/// Outcome of a task elaboration. Read-only with respect to the task graph;
/// the guidance never replaces the task's own description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElaborationResult {
    pub task_id: Uuid,
    pub guidance: String,
}
