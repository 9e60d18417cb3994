//! AI planning provider port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ElaborationRequest, PlanRequest, RoadmapData};

/// Everything the provider needs to draft a roadmap.
#[derive(Debug, Clone, Default)]
pub struct PlanningPromptContext {
    pub project_id: Uuid,
    /// Project display name, when the caller has it.
    pub project_name: Option<String>,
    pub request: PlanRequest,
    /// Titles of milestones already on the board (Augment mode), so the
    /// provider can build around them instead of duplicating them.
    pub existing_milestones: Vec<String>,
}

/// Task context sent alongside an elaboration question.
#[derive(Debug, Clone, Default)]
pub struct TaskElaborationContext {
    pub task_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_role: Option<String>,
    pub milestone_title: Option<String>,
    pub request: ElaborationRequest,
}

/// Port for the external AI planning collaborator.
///
/// Implementations own their own retry/backoff; the planner only wraps calls
/// in a timeout and maps failures to provider errors.
#[async_trait]
pub trait PlanningProvider: Send + Sync {
    /// Draft a milestone/task plan for the given goal.
    async fn generate_roadmap(&self, ctx: &PlanningPromptContext) -> DomainResult<RoadmapData>;

    /// Produce free-text guidance for a single task.
    async fn elaborate_task(&self, ctx: &TaskElaborationContext) -> DomainResult<String>;
}
