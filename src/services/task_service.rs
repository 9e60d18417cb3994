//! Task service: CRUD over the task graph plus the status state machine.
//!
//! All mutations validate against domain invariants before touching the
//! store, and every store write is atomic. Notifications fire after the
//! write commits; their delivery is best-effort and never fails the request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    MilestoneStatus, ProjectMilestone, ProjectSubtask, ProjectTask, ProjectTaskReference,
    ReferenceType, TaskPriority, TaskStatus, TaskType, TransitionPolicy,
};
use crate::domain::ports::{NotificationSink, TaskFilters, TaskGraphRepository};

/// Fields for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub milestone_id: Option<Uuid>,
    pub assigned_role: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,
}

/// Partial update for a task. Outer `None` leaves the field untouched; the
/// nested `Option` clears nullable fields.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub milestone_id: Option<Option<Uuid>>,
    pub assigned_role: Option<Option<String>>,
    pub assigned_user_id: Option<Option<Uuid>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
}

/// Partial update for a milestone.
#[derive(Debug, Clone, Default)]
pub struct MilestonePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<MilestoneStatus>,
}

/// Service coordinating task graph mutations.
pub struct TaskService<R, N> {
    repo: Arc<R>,
    notifications: Arc<N>,
    policy: TransitionPolicy,
}

impl<R, N> TaskService<R, N>
where
    R: TaskGraphRepository,
    N: NotificationSink,
{
    pub fn new(repo: Arc<R>, notifications: Arc<N>) -> Self {
        Self {
            repo,
            notifications,
            policy: TransitionPolicy::default(),
        }
    }

    /// Override the transition policy.
    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    // --- tasks ---

    /// Create a task. An explicit milestone must belong to the same project.
    #[instrument(skip(self, data), fields(title = %data.title))]
    pub async fn create_task(
        &self,
        project_id: Uuid,
        data: NewTask,
        actor_user_id: Uuid,
    ) -> DomainResult<ProjectTask> {
        if let Some(milestone_id) = data.milestone_id {
            self.require_milestone(project_id, milestone_id).await?;
        }

        let mut task = ProjectTask::new(project_id, data.title, actor_user_id);
        task.description = data.description;
        task.task_type = data.task_type.unwrap_or_default();
        task.priority = data.priority.unwrap_or_default();
        task.milestone_id = data.milestone_id;
        task.assigned_role = data.assigned_role;
        task.assigned_user_id = data.assigned_user_id;
        task.due_at = data.due_at;

        task.validate().map_err(DomainError::ValidationFailed)?;

        let stored = self.repo.insert_task(&task).await?;
        info!(task_id = %stored.id, "task created");
        self.notifications.task_created(project_id, &stored).await;
        Ok(stored)
    }

    /// Get a task, failing when it does not exist in the project.
    pub async fn get_task(&self, project_id: Uuid, task_id: Uuid) -> DomainResult<ProjectTask> {
        self.repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// List tasks with filters, sorting, and paging.
    pub async fn list_tasks(
        &self,
        project_id: Uuid,
        filters: TaskFilters,
    ) -> DomainResult<Vec<ProjectTask>> {
        self.repo.list_tasks(project_id, filters).await
    }

    /// Partially update a task. Status and order changes go through their
    /// dedicated operations instead.
    #[instrument(skip(self, patch))]
    pub async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> DomainResult<ProjectTask> {
        let mut task = self.get_task(project_id, task_id).await?;
        let expected_version = task.version;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(task_type) = patch.task_type {
            task.task_type = task_type;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(milestone_id) = patch.milestone_id {
            if let Some(id) = milestone_id {
                self.require_milestone(project_id, id).await?;
            }
            task.milestone_id = milestone_id;
        }
        if let Some(assigned_role) = patch.assigned_role {
            task.assigned_role = assigned_role;
        }
        if let Some(assigned_user_id) = patch.assigned_user_id {
            task.assigned_user_id = assigned_user_id;
        }
        if let Some(due_at) = patch.due_at {
            task.due_at = due_at;
        }

        task.validate().map_err(DomainError::ValidationFailed)?;
        task.touch();

        let outcome = self
            .repo
            .update_task(
                &task,
                expected_version,
                self.policy.auto_complete_milestones,
            )
            .await?;

        // A column move can finish the milestone the task left.
        for (milestone, task_count) in &outcome.milestones_completed {
            info!(milestone_id = %milestone.id, "milestone completed");
            self.notifications
                .milestone_completed(project_id, milestone, *task_count)
                .await;
        }
        Ok(task)
    }

    /// Delete a task, cascading to its subtasks, references, and dependency
    /// edges on both sides. Dependents that lose their last incomplete
    /// dependency are notified as unblocked.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        let outcome = self
            .repo
            .delete_task(project_id, task_id, self.policy.auto_complete_milestones)
            .await?;
        info!(%task_id, unblocked = outcome.newly_unblocked.len(), "task deleted");

        for dependent in outcome.newly_unblocked {
            self.notifications
                .task_unblocked(project_id, dependent)
                .await;
        }
        if let Some((milestone, task_count)) = outcome.milestone_completed {
            self.notifications
                .milestone_completed(project_id, &milestone, task_count)
                .await;
        }
        Ok(())
    }

    /// Change a task's status through the state machine.
    ///
    /// Rejects completing a blocked task and any transition the policy
    /// forbids; the write, dependent unblocking, and milestone evaluation
    /// happen in one transaction, after which notifications fire.
    #[instrument(skip(self))]
    pub async fn change_task_status(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_status: TaskStatus,
    ) -> DomainResult<ProjectTask> {
        let task = self.get_task(project_id, task_id).await?;
        let old_status = task.status;

        self.policy.allows(old_status, new_status).map_err(|reason| {
            DomainError::InvalidStateTransition {
                from: old_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason,
            }
        })?;

        if new_status == TaskStatus::Done && task.is_blocked {
            return Err(DomainError::TaskBlocked(task_id));
        }

        let record = self
            .repo
            .set_task_status(
                project_id,
                task_id,
                new_status,
                task.version,
                self.policy.auto_complete_milestones,
            )
            .await?;

        debug!(
            %task_id,
            from = old_status.as_str(),
            to = new_status.as_str(),
            unblocked = record.newly_unblocked.len(),
            "status changed"
        );

        if new_status == TaskStatus::Done {
            self.notifications
                .task_completed(project_id, task_id, old_status, new_status)
                .await;
        }
        for dependent in &record.newly_unblocked {
            self.notifications
                .task_unblocked(project_id, *dependent)
                .await;
        }
        if let Some((milestone, task_count)) = &record.milestone_completed {
            info!(milestone_id = %milestone.id, "milestone completed");
            self.notifications
                .milestone_completed(project_id, milestone, *task_count)
                .await;
        }

        Ok(record.task)
    }

    /// Explicitly reopen a Done task. This is the only way out of Done.
    #[instrument(skip(self))]
    pub async fn reopen_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        to: TaskStatus,
    ) -> DomainResult<ProjectTask> {
        let task = self.get_task(project_id, task_id).await?;
        if task.status != TaskStatus::Done {
            return Err(DomainError::InvalidOperation(
                "only a completed task can be reopened".to_string(),
            ));
        }
        if to == TaskStatus::Done {
            return Err(DomainError::InvalidOperation(
                "reopen target must not be done".to_string(),
            ));
        }

        // Reopening re-blocks dependents and pulls a Completed milestone
        // back; the store handles both in the same transaction.
        let record = self
            .repo
            .set_task_status(
                project_id,
                task_id,
                to,
                task.version,
                self.policy.auto_complete_milestones,
            )
            .await?;
        Ok(record.task)
    }

    // --- milestones ---

    /// Create a milestone.
    #[instrument(skip(self, title, description), fields(title = %title.as_ref()))]
    pub async fn create_milestone(
        &self,
        project_id: Uuid,
        title: impl AsRef<str> + Send,
        description: Option<String>,
    ) -> DomainResult<ProjectMilestone> {
        let mut milestone = ProjectMilestone::new(project_id, title.as_ref());
        milestone.description = description;
        milestone
            .validate()
            .map_err(DomainError::ValidationFailed)?;
        self.repo.insert_milestone(&milestone).await
    }

    /// Get a milestone, failing when absent from the project.
    pub async fn get_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
    ) -> DomainResult<ProjectMilestone> {
        self.repo
            .get_milestone(project_id, milestone_id)
            .await?
            .ok_or(DomainError::MilestoneNotFound(milestone_id))
    }

    /// List the project's milestones.
    pub async fn list_milestones(&self, project_id: Uuid) -> DomainResult<Vec<ProjectMilestone>> {
        self.repo.list_milestones(project_id).await
    }

    /// Partially update a milestone, including an explicit status set.
    #[instrument(skip(self, patch))]
    pub async fn update_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
        patch: MilestonePatch,
    ) -> DomainResult<ProjectMilestone> {
        let mut milestone = self.get_milestone(project_id, milestone_id).await?;
        let expected_version = milestone.version;

        if let Some(title) = patch.title {
            milestone.title = title;
        }
        if let Some(description) = patch.description {
            milestone.description = description;
        }
        if let Some(status) = patch.status {
            milestone.status = status;
        }

        milestone
            .validate()
            .map_err(DomainError::ValidationFailed)?;
        milestone.version += 1;

        self.repo
            .update_milestone(&milestone, expected_version)
            .await?;
        Ok(milestone)
    }

    /// Delete a milestone. Refuses while tasks still reference it unless
    /// `cascade` also removes them. Tasks outside the milestone that were
    /// only blocked by its tasks are notified as unblocked.
    #[instrument(skip(self))]
    pub async fn delete_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
        cascade: bool,
    ) -> DomainResult<()> {
        let outcome = self
            .repo
            .delete_milestone(project_id, milestone_id, cascade)
            .await?;
        info!(
            %milestone_id,
            unblocked = outcome.newly_unblocked.len(),
            "milestone deleted"
        );

        for dependent in outcome.newly_unblocked {
            self.notifications
                .task_unblocked(project_id, dependent)
                .await;
        }
        Ok(())
    }

    // --- subtasks ---

    /// Add a subtask to a task's checklist.
    #[instrument(skip(self, title))]
    pub async fn add_subtask(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        title: String,
        description: Option<String>,
    ) -> DomainResult<ProjectSubtask> {
        self.get_task(project_id, task_id).await?;

        let mut subtask = ProjectSubtask::new(task_id, title);
        subtask.description = description;
        subtask.validate().map_err(DomainError::ValidationFailed)?;

        self.repo.insert_subtask(project_id, &subtask).await
    }

    /// List a task's subtasks.
    pub async fn list_subtasks(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectSubtask>> {
        self.get_task(project_id, task_id).await?;
        self.repo.list_subtasks(project_id, task_id).await
    }

    /// Rename or re-describe a subtask.
    pub async fn update_subtask(
        &self,
        project_id: Uuid,
        subtask_id: Uuid,
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> DomainResult<ProjectSubtask> {
        let mut subtask = self
            .repo
            .get_subtask(project_id, subtask_id)
            .await?
            .ok_or(DomainError::SubtaskNotFound(subtask_id))?;

        if let Some(title) = title {
            subtask.title = title;
        }
        if let Some(description) = description {
            subtask.description = description;
        }
        subtask.validate().map_err(DomainError::ValidationFailed)?;

        self.repo.update_subtask(project_id, &subtask).await?;
        Ok(subtask)
    }

    /// Check or uncheck a subtask.
    #[instrument(skip(self))]
    pub async fn toggle_subtask(
        &self,
        project_id: Uuid,
        subtask_id: Uuid,
        done: bool,
    ) -> DomainResult<ProjectSubtask> {
        let mut subtask = self
            .repo
            .get_subtask(project_id, subtask_id)
            .await?
            .ok_or(DomainError::SubtaskNotFound(subtask_id))?;

        subtask.set_done(done);
        self.repo.update_subtask(project_id, &subtask).await?;
        Ok(subtask)
    }

    /// Remove a subtask.
    pub async fn delete_subtask(&self, project_id: Uuid, subtask_id: Uuid) -> DomainResult<()> {
        self.repo.delete_subtask(project_id, subtask_id).await
    }

    // --- references ---

    /// Attach a reference link to a task.
    #[instrument(skip(self, url, title))]
    pub async fn add_reference(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        ref_type: ReferenceType,
        url: String,
        title: Option<String>,
    ) -> DomainResult<ProjectTaskReference> {
        self.get_task(project_id, task_id).await?;

        let mut reference = ProjectTaskReference::new(task_id, ref_type, url);
        reference.title = title;
        reference
            .validate()
            .map_err(DomainError::ValidationFailed)?;

        self.repo.insert_reference(project_id, &reference).await
    }

    /// List a task's reference links.
    pub async fn list_references(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectTaskReference>> {
        self.get_task(project_id, task_id).await?;
        self.repo.list_references(project_id, task_id).await
    }

    /// Remove a reference link.
    pub async fn delete_reference(
        &self,
        project_id: Uuid,
        reference_id: Uuid,
    ) -> DomainResult<()> {
        self.repo.delete_reference(project_id, reference_id).await
    }

    // --- helpers ---

    async fn require_milestone(&self, project_id: Uuid, milestone_id: Uuid) -> DomainResult<()> {
        if self
            .repo
            .get_milestone(project_id, milestone_id)
            .await?
            .is_none()
        {
            warn!(%milestone_id, "milestone reference rejected");
            return Err(DomainError::MilestoneNotFound(milestone_id));
        }
        Ok(())
    }
}
