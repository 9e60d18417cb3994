//! AI-assisted roadmap generation and task elaboration.
//!
//! The planner turns a high-level goal into provider-proposed plan data,
//! validates and normalizes it into real entities, and commits the whole
//! batch through the store's atomic apply. Provider failures and timeouts
//! surface as a single provider error; nothing is written until the batch
//! validates end to end.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::roadmap::parse_due_date;
use crate::domain::models::{
    ElaborationRequest, ElaborationResult, PlanApplyResult, PlanBatch, PlanMode, PlanRequest,
    ProjectMilestone, ProjectSubtask, ProjectTask, RoadmapData, TaskPriority, TaskType,
};
use crate::domain::ports::{
    NotificationSink, PlanningPromptContext, PlanningProvider, TaskElaborationContext,
    TaskGraphRepository,
};

/// Orchestrates plan generation against the AI provider and the store.
pub struct RoadmapPlanner<R, P, N> {
    repo: Arc<R>,
    provider: Arc<P>,
    notifications: Arc<N>,
    provider_timeout: Duration,
}

impl<R, P, N> RoadmapPlanner<R, P, N>
where
    R: TaskGraphRepository,
    P: PlanningProvider,
    N: NotificationSink,
{
    pub fn new(repo: Arc<R>, provider: Arc<P>, notifications: Arc<N>) -> Self {
        Self {
            repo,
            provider,
            notifications,
            provider_timeout: Duration::from_secs(30),
        }
    }

    /// Bound each provider call by this timeout.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Generate a roadmap for the project and apply it atomically.
    ///
    /// `Replace` wipes the existing roadmap in the same transaction as the
    /// insert; `Augment` adds alongside it, letting tasks reference existing
    /// milestones by their order index. On any validation failure nothing
    /// from the batch is persisted.
    #[instrument(skip(self, request))]
    pub async fn generate_for_project(
        &self,
        project_id: Uuid,
        mode: PlanMode,
        request: PlanRequest,
        actor_user_id: Uuid,
    ) -> DomainResult<PlanApplyResult> {
        if request.goal.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "plan goal cannot be empty".to_string(),
            ));
        }

        let existing = self.repo.list_milestones(project_id).await?;

        let ctx = PlanningPromptContext {
            project_id,
            project_name: None,
            request: request.clone(),
            existing_milestones: if mode == PlanMode::Augment {
                existing.iter().map(|m| m.title.clone()).collect()
            } else {
                Vec::new()
            },
        };

        let data = self.call_with_timeout(self.provider.generate_roadmap(&ctx)).await?;

        let reference_milestones: &[ProjectMilestone] = if mode == PlanMode::Augment {
            &existing
        } else {
            &[]
        };
        let (batch, notes) =
            build_batch(project_id, actor_user_id, &request, data, reference_milestones)?;

        info!(
            milestones = batch.milestones.len(),
            tasks = batch.tasks.len(),
            mode = mode.as_str(),
            "applying generated plan"
        );

        let stored = self.repo.apply_plan(project_id, mode, batch).await?;

        for task in &stored.tasks {
            self.notifications.task_created(project_id, task).await;
        }

        Ok(PlanApplyResult {
            milestones: stored.milestones,
            tasks: stored.tasks,
            notes,
        })
    }

    /// Ask the provider for guidance on a single task. Read-only: the task's
    /// own description is never touched.
    #[instrument(skip(self, request))]
    pub async fn elaborate_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        request: ElaborationRequest,
    ) -> DomainResult<ElaborationResult> {
        if request.user_question.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "elaboration question cannot be empty".to_string(),
            ));
        }

        let task = self
            .repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        let milestone_title = match task.milestone_id {
            Some(id) => self
                .repo
                .get_milestone(project_id, id)
                .await?
                .map(|m| m.title),
            None => None,
        };

        let ctx = TaskElaborationContext {
            task_id,
            title: task.title,
            description: task.description,
            assigned_role: task.assigned_role,
            milestone_title,
            request,
        };

        let guidance = self
            .call_with_timeout(self.provider.elaborate_task(&ctx))
            .await?;
        let guidance = guidance.trim().to_string();
        if guidance.is_empty() {
            return Err(DomainError::ProviderError(
                "provider returned empty guidance".to_string(),
            ));
        }

        Ok(ElaborationResult { task_id, guidance })
    }

    async fn call_with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = DomainResult<T>> + Send,
    ) -> DomainResult<T> {
        match tokio::time::timeout(self.provider_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.provider_timeout.as_secs(), "provider call timed out");
                Err(DomainError::ProviderTimeout(self.provider_timeout.as_secs()))
            }
        }
    }
}

/// Validate provider output into a `PlanBatch`, collecting non-fatal issues
/// as notes. Fatal: missing titles and unresolvable milestone ordinals.
fn build_batch(
    project_id: Uuid,
    actor_user_id: Uuid,
    request: &PlanRequest,
    data: RoadmapData,
    existing_milestones: &[ProjectMilestone],
) -> DomainResult<(PlanBatch, Vec<String>)> {
    if data.milestones.is_empty() && data.tasks.is_empty() {
        return Err(DomainError::ValidationFailed(
            "provider returned an empty plan".to_string(),
        ));
    }

    let mut notes = Vec::new();
    let mut batch = PlanBatch::default();

    // Existing milestones are addressable by their order index (Augment);
    // batch entries take precedence on ordinal collisions.
    let mut ordinal_to_id: HashMap<i64, Uuid> = existing_milestones
        .iter()
        .map(|m| (m.order_index, m.id))
        .collect();

    for (idx, entry) in data.milestones.into_iter().enumerate() {
        let title = entry
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("milestone entry {} has no title", idx + 1))
            })?;

        let mut milestone = ProjectMilestone::new(project_id, title);
        milestone.description = entry.description.filter(|d| !d.trim().is_empty());

        #[allow(clippy::cast_possible_wrap)]
        let ordinal = entry.order.unwrap_or(idx as i64 + 1);
        ordinal_to_id.insert(ordinal, milestone.id);
        batch.milestones.push(milestone);
    }

    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut dropped_due_dates = 0usize;
    let mut skipped_subtasks = 0usize;

    for (idx, entry) in data.tasks.into_iter().enumerate() {
        let title = entry
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("task entry {} has no title", idx + 1))
            })?
            .to_string();

        if !seen_titles.insert(title.to_lowercase()) {
            notes.push(format!("duplicate task title in plan: \"{title}\""));
        }

        let milestone_id = match entry.milestone {
            Some(ordinal) => Some(*ordinal_to_id.get(&ordinal).ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "task \"{title}\" references unknown milestone ordinal {ordinal}"
                ))
            })?),
            None => None,
        };

        let mut task = ProjectTask::new(project_id, title.clone(), actor_user_id);
        task.milestone_id = milestone_id;
        task.description = entry.description.filter(|d| !d.trim().is_empty());
        task.assigned_role = entry.assigned_role.filter(|r| !r.trim().is_empty());

        if let Some(raw) = entry.task_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match TaskType::from_str(raw) {
                Some(t) => task.task_type = t,
                None => notes.push(format!(
                    "task \"{title}\": unknown type \"{raw}\", defaulted to feature"
                )),
            }
        }
        if let Some(raw) = entry.priority.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match TaskPriority::from_str(raw) {
                Some(p) => task.priority = p,
                None => notes.push(format!(
                    "task \"{title}\": unknown priority \"{raw}\", defaulted to medium"
                )),
            }
        }

        task.due_at = resolve_due_date(&entry.due_at, entry.due_in_days, request.start_date);
        if entry.due_at.is_some() && task.due_at.is_none() {
            dropped_due_dates += 1;
        }

        task.validate().map_err(DomainError::ValidationFailed)?;

        for sub in entry.subtasks {
            match sub.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                Some(sub_title) => {
                    let mut subtask = ProjectSubtask::new(task.id, sub_title);
                    subtask.description = sub.description.filter(|d| !d.trim().is_empty());
                    batch.subtasks.push(subtask);
                }
                None => skipped_subtasks += 1,
            }
        }

        batch.tasks.push(task);
    }

    if dropped_due_dates > 0 {
        notes.push(format!(
            "{dropped_due_dates} task(s) had invalid due dates and were created without one"
        ));
    }
    if skipped_subtasks > 0 {
        notes.push(format!("{skipped_subtasks} subtask(s) without a title were skipped"));
    }

    Ok((batch, notes))
}

/// Resolve a due date from either an explicit string or a day offset from
/// the plan's start date. Unparseable strings resolve to None.
fn resolve_due_date(
    due_at: &Option<String>,
    due_in_days: Option<i64>,
    start_date: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if let Some(raw) = due_at.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return parse_due_date(raw);
    }
    due_in_days.map(|days| start_date.unwrap_or_else(Utc::now) + chrono::Duration::days(days))
}
