//! Repository port for the task graph store.
//!
//! Every write method is atomic: implementations run multi-row mutations
//! (cascades, sibling shifts, blocked recomputation, plan batches) inside a
//! single transaction so partial graph states are never visible. Updates
//! carry the caller's version token and fail with a concurrency conflict on
//! mismatch.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    PlanBatch, PlanMode, ProjectMilestone, ProjectSubtask, ProjectTask, ProjectTaskReference,
    TaskDependency, TaskPriority, TaskStatus, TaskType,
};

/// Sort key for task listings. Every key uses `order_index` as the stable
/// secondary tiebreak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSortKey {
    #[default]
    OrderIndex,
    CreatedAt,
    DueAt,
    Priority,
}

/// Filters for querying tasks within a project.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub milestone_id: Option<Uuid>,
    /// `Some(true)` restricts to backlog tasks (no milestone); `Some(false)`
    /// to tasks under any milestone.
    pub backlog: Option<bool>,
    pub assigned_role: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub blocked: Option<bool>,
    /// Case-insensitive substring match on title and description.
    pub search: Option<String>,
    pub sort_by: TaskSortKey,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of an atomic status change.
#[derive(Debug, Clone)]
pub struct StatusChangeRecord {
    /// The task as stored after the change.
    pub task: ProjectTask,
    /// Dependents whose blocked flag flipped to false in the same transaction.
    pub newly_unblocked: Vec<Uuid>,
    /// Set when the change completed the containing milestone, along with its
    /// task count for the notification payload.
    pub milestone_completed: Option<(ProjectMilestone, i64)>,
}

/// Outcome of an atomic cascade delete.
#[derive(Debug, Clone, Default)]
pub struct TaskDeleteOutcome {
    /// Former dependents whose blocked flag flipped to false.
    pub newly_unblocked: Vec<Uuid>,
    /// Set when removing the task left its milestone fully Done.
    pub milestone_completed: Option<(ProjectMilestone, i64)>,
}

/// Outcome of a task field update.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdateOutcome {
    /// Milestones completed by a column move. A move can finish both the
    /// column it left and the one it joined in the same transaction.
    pub milestones_completed: Vec<(ProjectMilestone, i64)>,
}

/// Outcome of a milestone delete.
#[derive(Debug, Clone, Default)]
pub struct MilestoneDeleteOutcome {
    /// Tasks outside the milestone whose blocked flag flipped to false when
    /// the cascade removed the dependencies they were waiting on.
    pub newly_unblocked: Vec<Uuid>,
}

/// Persistence contract for milestones, tasks, subtasks, references, and
/// dependency edges, scoped to a project.
#[async_trait]
pub trait TaskGraphRepository: Send + Sync {
    // --- tasks ---

    /// Insert a task, assigning `order_index = max + 1` within its column.
    /// Returns the stored row.
    async fn insert_task(&self, task: &ProjectTask) -> DomainResult<ProjectTask>;

    /// Get a task by id within a project.
    async fn get_task(&self, project_id: Uuid, task_id: Uuid)
        -> DomainResult<Option<ProjectTask>>;

    /// List tasks with filters, sorting, and paging.
    async fn list_tasks(
        &self,
        project_id: Uuid,
        filters: TaskFilters,
    ) -> DomainResult<Vec<ProjectTask>>;

    /// Count tasks matching filters (ignores paging).
    async fn count_tasks(&self, project_id: Uuid, filters: TaskFilters) -> DomainResult<i64>;

    /// Update task fields other than status and order. A milestone move
    /// appends the task to the end of the new column, compacts the old one,
    /// and re-derives both milestones' statuses in the same transaction.
    /// Fails with a conflict when `expected_version` no longer matches.
    async fn update_task(
        &self,
        task: &ProjectTask,
        expected_version: i64,
        auto_complete_milestone: bool,
    ) -> DomainResult<TaskUpdateOutcome>;

    /// Delete a task, cascading to subtasks, references, and edges on both
    /// sides; recomputes surviving dependents' blocked flags and re-evaluates
    /// the milestone, all in one transaction.
    async fn delete_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        auto_complete_milestone: bool,
    ) -> DomainResult<TaskDeleteOutcome>;

    /// Apply an already-validated status change: update the row, recompute
    /// dependents' blocked flags when the task reached Done, and move the
    /// containing milestone (Planned -> InProgress on first activity,
    /// -> Completed when every task is Done and auto-completion is on).
    async fn set_task_status(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_status: TaskStatus,
        expected_version: i64,
        auto_complete_milestone: bool,
    ) -> DomainResult<StatusChangeRecord>;

    /// Move a task to `new_index` within its column, shifting the affected
    /// sibling range by one so indices stay contiguous.
    async fn reorder_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_index: i64,
        expected_version: i64,
    ) -> DomainResult<()>;

    // --- milestones ---

    /// Insert a milestone, assigning `order_index = max + 1` in the project.
    async fn insert_milestone(&self, milestone: &ProjectMilestone)
        -> DomainResult<ProjectMilestone>;

    /// Get a milestone by id within a project.
    async fn get_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
    ) -> DomainResult<Option<ProjectMilestone>>;

    /// List the project's milestones by order index.
    async fn list_milestones(&self, project_id: Uuid) -> DomainResult<Vec<ProjectMilestone>>;

    /// Update a milestone with a version check.
    async fn update_milestone(
        &self,
        milestone: &ProjectMilestone,
        expected_version: i64,
    ) -> DomainResult<()>;

    /// Delete a milestone. Without `cascade` the call fails while tasks still
    /// reference it; with `cascade` the tasks (and their owned rows and
    /// edges) are deleted and surviving dependents' blocked flags recomputed,
    /// all in the same transaction.
    async fn delete_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
        cascade: bool,
    ) -> DomainResult<MilestoneDeleteOutcome>;

    // --- dependencies ---

    /// All dependency edges of a project.
    async fn list_dependencies(&self, project_id: Uuid) -> DomainResult<Vec<TaskDependency>>;

    /// Ids of tasks that depend on the given task.
    async fn list_dependents(&self, project_id: Uuid, task_id: Uuid) -> DomainResult<Vec<Uuid>>;

    /// Insert an edge and recompute the dependent's blocked flag. Duplicate
    /// and cycle checks run against the edge set read inside the insert
    /// transaction, so concurrent adds cannot race past them. Returns the
    /// flag's new value.
    async fn add_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<bool>;

    /// Remove an edge and recompute the dependent's blocked flag. Returns
    /// true when the task became unblocked by this removal.
    async fn remove_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<bool>;

    // --- subtasks ---

    /// Insert a subtask, assigning `order_index = max + 1` under its task.
    async fn insert_subtask(
        &self,
        project_id: Uuid,
        subtask: &ProjectSubtask,
    ) -> DomainResult<ProjectSubtask>;

    /// Get a subtask by id, verifying its task belongs to the project.
    async fn get_subtask(
        &self,
        project_id: Uuid,
        subtask_id: Uuid,
    ) -> DomainResult<Option<ProjectSubtask>>;

    /// List a task's subtasks by order index.
    async fn list_subtasks(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectSubtask>>;

    /// Update a subtask's fields.
    async fn update_subtask(
        &self,
        project_id: Uuid,
        subtask: &ProjectSubtask,
    ) -> DomainResult<()>;

    /// Delete a subtask.
    async fn delete_subtask(&self, project_id: Uuid, subtask_id: Uuid) -> DomainResult<()>;

    // --- references ---

    /// Attach a reference link to a task.
    async fn insert_reference(
        &self,
        project_id: Uuid,
        reference: &ProjectTaskReference,
    ) -> DomainResult<ProjectTaskReference>;

    /// List a task's reference links.
    async fn list_references(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectTaskReference>>;

    /// Remove a reference link.
    async fn delete_reference(&self, project_id: Uuid, reference_id: Uuid) -> DomainResult<()>;

    // --- plan apply ---

    /// Commit a validated plan batch in one transaction. `Replace` wipes the
    /// project's existing milestones and tasks first; `Augment` inserts
    /// alongside them. Order indices are assigned per column inside the
    /// transaction. Returns the stored entities.
    async fn apply_plan(
        &self,
        project_id: Uuid,
        mode: PlanMode,
        batch: PlanBatch,
    ) -> DomainResult<PlanBatch>;
}
