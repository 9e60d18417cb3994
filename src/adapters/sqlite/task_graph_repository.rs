//! SQLite implementation of the task graph repository.
//!
//! Every write runs inside a transaction: cascades, sibling shifts, blocked
//! recomputation, and milestone evaluation commit together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    MilestoneStatus, PlanBatch, PlanMode, ProjectMilestone, ProjectSubtask, ProjectTask,
    ProjectTaskReference, ReferenceType, TaskDependency, TaskPriority, TaskStatus, TaskType,
};
use crate::domain::ports::{
    MilestoneDeleteOutcome, StatusChangeRecord, TaskDeleteOutcome, TaskFilters,
    TaskGraphRepository, TaskSortKey, TaskUpdateOutcome,
};
use crate::services::dependency_resolver::cycle_path;
use crate::services::ordering::plan_reorder;

#[derive(Clone)]
pub struct SqliteTaskGraphRepository {
    pool: SqlitePool,
}

impl SqliteTaskGraphRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::DatabaseError(format!("corrupt uuid: {e}")))
}

fn parse_ts(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::DatabaseError(format!("corrupt timestamp: {e}")))
}

fn parse_opt_uuid(s: Option<&str>) -> DomainResult<Option<Uuid>> {
    s.map(parse_uuid).transpose()
}

fn parse_opt_ts(s: Option<&str>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: String,
    milestone_id: Option<String>,
    title: String,
    description: Option<String>,
    task_type: String,
    status: String,
    priority: String,
    is_blocked: i64,
    order_index: i64,
    assigned_role: Option<String>,
    assigned_user_id: Option<String>,
    due_at: Option<String>,
    created_by: String,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
    version: i64,
}

impl TryFrom<TaskRow> for ProjectTask {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> DomainResult<Self> {
        Ok(ProjectTask {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            milestone_id: parse_opt_uuid(row.milestone_id.as_deref())?,
            title: row.title,
            description: row.description,
            task_type: TaskType::from_str(&row.task_type)
                .ok_or_else(|| DomainError::DatabaseError(format!("corrupt task type: {}", row.task_type)))?,
            status: TaskStatus::from_str(&row.status)
                .ok_or_else(|| DomainError::DatabaseError(format!("corrupt status: {}", row.status)))?,
            priority: TaskPriority::from_str(&row.priority)
                .ok_or_else(|| DomainError::DatabaseError(format!("corrupt priority: {}", row.priority)))?,
            is_blocked: row.is_blocked != 0,
            order_index: row.order_index,
            assigned_role: row.assigned_role,
            assigned_user_id: parse_opt_uuid(row.assigned_user_id.as_deref())?,
            due_at: parse_opt_ts(row.due_at.as_deref())?,
            created_by: parse_uuid(&row.created_by)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            completed_at: parse_opt_ts(row.completed_at.as_deref())?,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MilestoneRow {
    id: String,
    project_id: String,
    title: String,
    description: Option<String>,
    status: String,
    order_index: i64,
    created_at: String,
    version: i64,
}

impl TryFrom<MilestoneRow> for ProjectMilestone {
    type Error = DomainError;

    fn try_from(row: MilestoneRow) -> DomainResult<Self> {
        Ok(ProjectMilestone {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            title: row.title,
            description: row.description,
            status: MilestoneStatus::from_str(&row.status)
                .ok_or_else(|| DomainError::DatabaseError(format!("corrupt status: {}", row.status)))?,
            order_index: row.order_index,
            created_at: parse_ts(&row.created_at)?,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubtaskRow {
    id: String,
    task_id: String,
    title: String,
    description: Option<String>,
    is_done: i64,
    order_index: i64,
    completed_at: Option<String>,
}

impl TryFrom<SubtaskRow> for ProjectSubtask {
    type Error = DomainError;

    fn try_from(row: SubtaskRow) -> DomainResult<Self> {
        Ok(ProjectSubtask {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            title: row.title,
            description: row.description,
            is_done: row.is_done != 0,
            order_index: row.order_index,
            completed_at: parse_opt_ts(row.completed_at.as_deref())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReferenceRow {
    id: String,
    task_id: String,
    ref_type: String,
    url: String,
    title: Option<String>,
    created_at: String,
}

impl TryFrom<ReferenceRow> for ProjectTaskReference {
    type Error = DomainError;

    fn try_from(row: ReferenceRow) -> DomainResult<Self> {
        Ok(ProjectTaskReference {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            ref_type: ReferenceType::from_str(&row.ref_type)
                .ok_or_else(|| DomainError::DatabaseError(format!("corrupt ref type: {}", row.ref_type)))?,
            url: row.url,
            title: row.title,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

/// Recompute a task's blocked flag from its remaining edges. Returns
/// (was_blocked, is_blocked).
async fn recompute_blocked(
    conn: &mut SqliteConnection,
    task_id: &str,
) -> DomainResult<(bool, bool)> {
    let was: i64 = sqlx::query_scalar("SELECT is_blocked FROM project_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(&mut *conn)
        .await?;

    let now: i64 = sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM task_dependencies d
            JOIN project_tasks p ON p.id = d.depends_on_task_id
            WHERE d.task_id = ? AND p.status <> 'done'
        )",
    )
    .bind(task_id)
    .fetch_one(&mut *conn)
    .await?;

    if was != now {
        sqlx::query(
            "UPDATE project_tasks SET is_blocked = ?, updated_at = ?, version = version + 1
             WHERE id = ?",
        )
        .bind(now)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok((was != 0, now != 0))
}

/// Ids of currently-blocked tasks that depend on the given task.
async fn blocked_dependents(
    conn: &mut SqliteConnection,
    task_id: &str,
) -> DomainResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT t.id FROM task_dependencies d
         JOIN project_tasks t ON t.id = d.task_id
         WHERE d.depends_on_task_id = ? AND t.is_blocked = 1",
    )
    .bind(task_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Move a milestone through its derived transitions after task activity.
/// Returns the milestone with its task count when it just completed.
async fn evaluate_milestone(
    conn: &mut SqliteConnection,
    milestone_id: &str,
    auto_complete: bool,
) -> DomainResult<Option<(ProjectMilestone, i64)>> {
    let row: Option<MilestoneRow> =
        sqlx::query_as("SELECT * FROM project_milestones WHERE id = ?")
            .bind(milestone_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let milestone: ProjectMilestone = row.try_into()?;

    let (total, done): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(status = 'done'), 0)
         FROM project_tasks WHERE milestone_id = ?",
    )
    .bind(milestone_id)
    .fetch_one(&mut *conn)
    .await?;

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM project_tasks WHERE milestone_id = ? AND status <> 'todo'",
    )
    .bind(milestone_id)
    .fetch_one(&mut *conn)
    .await?;

    let new_status = if auto_complete && total > 0 && done == total {
        MilestoneStatus::Completed
    } else if milestone.status == MilestoneStatus::Completed && done < total {
        // A reopened task pulls a completed milestone back.
        MilestoneStatus::InProgress
    } else if milestone.status == MilestoneStatus::Planned && active > 0 {
        MilestoneStatus::InProgress
    } else {
        milestone.status
    };

    if new_status == milestone.status {
        return Ok(None);
    }

    sqlx::query("UPDATE project_milestones SET status = ?, version = version + 1 WHERE id = ?")
        .bind(new_status.as_str())
        .bind(milestone_id)
        .execute(&mut *conn)
        .await?;

    if new_status == MilestoneStatus::Completed {
        let mut completed = milestone;
        completed.status = new_status;
        completed.version += 1;
        return Ok(Some((completed, total)));
    }
    Ok(None)
}

/// Close the gap a task leaves behind in its column.
async fn compact_column(
    conn: &mut SqliteConnection,
    project_id: &str,
    milestone_id: Option<&str>,
    removed_index: i64,
) -> DomainResult<()> {
    sqlx::query(
        "UPDATE project_tasks SET order_index = order_index - 1
         WHERE project_id = ? AND milestone_id IS ? AND order_index > ?",
    )
    .bind(project_id)
    .bind(milestone_id)
    .bind(removed_index)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Append the where-clause fragments for the given filters. Returns string
/// bindings in clause order; boolean and sort fragments are inlined.
fn push_filters(query: &mut String, filters: &TaskFilters, bindings: &mut Vec<String>) {
    if let Some(status) = filters.status {
        query.push_str(" AND status = ?");
        bindings.push(status.as_str().to_string());
    }
    if let Some(task_type) = filters.task_type {
        query.push_str(" AND task_type = ?");
        bindings.push(task_type.as_str().to_string());
    }
    if let Some(priority) = filters.priority {
        query.push_str(" AND priority = ?");
        bindings.push(priority.as_str().to_string());
    }
    if let Some(milestone_id) = filters.milestone_id {
        query.push_str(" AND milestone_id = ?");
        bindings.push(milestone_id.to_string());
    }
    if let Some(backlog) = filters.backlog {
        query.push_str(if backlog {
            " AND milestone_id IS NULL"
        } else {
            " AND milestone_id IS NOT NULL"
        });
    }
    if let Some(role) = &filters.assigned_role {
        query.push_str(" AND assigned_role = ?");
        bindings.push(role.clone());
    }
    if let Some(user_id) = filters.assigned_user_id {
        query.push_str(" AND assigned_user_id = ?");
        bindings.push(user_id.to_string());
    }
    if let Some(blocked) = filters.blocked {
        query.push_str(if blocked {
            " AND is_blocked = 1"
        } else {
            " AND is_blocked = 0"
        });
    }
    if let Some(search) = &filters.search {
        query.push_str(
            " AND (LOWER(title) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?)",
        );
        let pattern = format!("%{}%", search.to_lowercase());
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }
}

fn order_clause(sort_by: TaskSortKey) -> &'static str {
    // order_index is the stable tiebreak for every alternate key.
    match sort_by {
        TaskSortKey::OrderIndex => " ORDER BY order_index, created_at",
        TaskSortKey::CreatedAt => " ORDER BY created_at, order_index",
        TaskSortKey::DueAt => " ORDER BY due_at IS NULL, due_at, order_index",
        TaskSortKey::Priority => {
            " ORDER BY CASE priority
                 WHEN 'critical' THEN 1
                 WHEN 'high' THEN 2
                 WHEN 'medium' THEN 3
                 WHEN 'low' THEN 4
             END, order_index"
        }
    }
}

impl SqliteTaskGraphRepository {
    /// Distinguish a missing row from a version race after a guarded update
    /// matched nothing.
    async fn classify_write_miss(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        entity: &'static str,
        id: Uuid,
    ) -> DomainError {
        let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?)");
        match sqlx::query_scalar::<_, i64>(&query)
            .bind(id.to_string())
            .fetch_one(conn)
            .await
        {
            Ok(1) => DomainError::ConcurrencyConflict { entity, id },
            Ok(_) => match entity {
                "milestone" => DomainError::MilestoneNotFound(id),
                _ => DomainError::TaskNotFound(id),
            },
            Err(e) => e.into(),
        }
    }

    async fn insert_task_tx(
        &self,
        conn: &mut SqliteConnection,
        task: &ProjectTask,
    ) -> DomainResult<ProjectTask> {
        let order_index: i64 = sqlx::query_scalar(
            r#"INSERT INTO project_tasks
               (id, project_id, milestone_id, title, description, task_type, status,
                priority, is_blocked, order_index, assigned_role, assigned_user_id,
                due_at, created_by, created_at, updated_at, completed_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?,
                       (SELECT COALESCE(MAX(order_index), -1) + 1 FROM project_tasks
                        WHERE project_id = ? AND milestone_id IS ?),
                       ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING order_index"#,
        )
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .bind(task.milestone_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(i64::from(task.is_blocked))
        .bind(task.project_id.to_string())
        .bind(task.milestone_id.map(|id| id.to_string()))
        .bind(&task.assigned_role)
        .bind(task.assigned_user_id.map(|id| id.to_string()))
        .bind(task.due_at.map(|t| t.to_rfc3339()))
        .bind(task.created_by.to_string())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.version)
        .fetch_one(&mut *conn)
        .await?;

        // A fresh open task pulls a Completed milestone back to InProgress.
        if let Some(milestone_id) = task.milestone_id {
            evaluate_milestone(conn, &milestone_id.to_string(), false).await?;
        }

        let mut stored = task.clone();
        stored.order_index = order_index;
        Ok(stored)
    }

    async fn insert_milestone_tx(
        &self,
        conn: &mut SqliteConnection,
        milestone: &ProjectMilestone,
    ) -> DomainResult<ProjectMilestone> {
        let order_index: i64 = sqlx::query_scalar(
            r#"INSERT INTO project_milestones
               (id, project_id, title, description, status, order_index, created_at, version)
               VALUES (?, ?, ?, ?, ?,
                       (SELECT COALESCE(MAX(order_index), 0) + 1 FROM project_milestones
                        WHERE project_id = ?),
                       ?, ?)
               RETURNING order_index"#,
        )
        .bind(milestone.id.to_string())
        .bind(milestone.project_id.to_string())
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.status.as_str())
        .bind(milestone.project_id.to_string())
        .bind(milestone.created_at.to_rfc3339())
        .bind(milestone.version)
        .fetch_one(conn)
        .await?;

        let mut stored = milestone.clone();
        stored.order_index = order_index;
        Ok(stored)
    }

    async fn insert_subtask_tx(
        &self,
        conn: &mut SqliteConnection,
        subtask: &ProjectSubtask,
    ) -> DomainResult<ProjectSubtask> {
        let order_index: i64 = sqlx::query_scalar(
            r#"INSERT INTO project_subtasks
               (id, task_id, title, description, is_done, order_index, completed_at)
               VALUES (?, ?, ?, ?, ?,
                       (SELECT COALESCE(MAX(order_index), -1) + 1 FROM project_subtasks
                        WHERE task_id = ?),
                       ?)
               RETURNING order_index"#,
        )
        .bind(subtask.id.to_string())
        .bind(subtask.task_id.to_string())
        .bind(&subtask.title)
        .bind(&subtask.description)
        .bind(i64::from(subtask.is_done))
        .bind(subtask.task_id.to_string())
        .bind(subtask.completed_at.map(|t| t.to_rfc3339()))
        .fetch_one(conn)
        .await?;

        let mut stored = subtask.clone();
        stored.order_index = order_index;
        Ok(stored)
    }
}

#[async_trait]
impl TaskGraphRepository for SqliteTaskGraphRepository {
    async fn insert_task(&self, task: &ProjectTask) -> DomainResult<ProjectTask> {
        let mut tx = self.pool.begin().await?;
        let stored = self.insert_task_tx(&mut tx, task).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn get_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Option<ProjectTask>> {
        let row: Option<TaskRow> =
            sqlx::query_as("SELECT * FROM project_tasks WHERE id = ? AND project_id = ?")
                .bind(task_id.to_string())
                .bind(project_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_tasks(
        &self,
        project_id: Uuid,
        filters: TaskFilters,
    ) -> DomainResult<Vec<ProjectTask>> {
        let mut query = String::from("SELECT * FROM project_tasks WHERE project_id = ?");
        let mut bindings = vec![project_id.to_string()];
        push_filters(&mut query, &filters, &mut bindings);
        query.push_str(order_clause(filters.sort_by));

        if let Some(limit) = filters.limit {
            query.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = filters.offset {
                query.push_str(&format!(" OFFSET {offset}"));
            }
        }

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in bindings {
            q = q.bind(binding);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_tasks(&self, project_id: Uuid, filters: TaskFilters) -> DomainResult<i64> {
        let mut query = String::from("SELECT COUNT(*) FROM project_tasks WHERE project_id = ?");
        let mut bindings = vec![project_id.to_string()];
        push_filters(&mut query, &filters, &mut bindings);

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for binding in bindings {
            q = q.bind(binding);
        }
        Ok(q.fetch_one(&self.pool).await?)
    }

    async fn update_task(
        &self,
        task: &ProjectTask,
        expected_version: i64,
        auto_complete_milestone: bool,
    ) -> DomainResult<TaskUpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<String>, i64)> = sqlx::query_as(
            "SELECT milestone_id, order_index FROM project_tasks WHERE id = ? AND project_id = ?",
        )
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((old_milestone, old_index)) = current else {
            return Err(DomainError::TaskNotFound(task.id));
        };

        let result = sqlx::query(
            r#"UPDATE project_tasks SET milestone_id = ?, title = ?, description = ?,
               task_type = ?, priority = ?, assigned_role = ?, assigned_user_id = ?,
               due_at = ?, updated_at = ?, version = ?
               WHERE id = ? AND project_id = ? AND version = ?"#,
        )
        .bind(task.milestone_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.priority.as_str())
        .bind(&task.assigned_role)
        .bind(task.assigned_user_id.map(|id| id.to_string()))
        .bind(task.due_at.map(|t| t.to_rfc3339()))
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version)
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .classify_write_miss(&mut tx, "project_tasks", "task", task.id)
                .await);
        }

        // Moving between columns: append at the end of the new column, close
        // the gap in the old one, and re-derive both milestones' statuses.
        let mut outcome = TaskUpdateOutcome::default();
        let new_milestone = task.milestone_id.map(|id| id.to_string());
        if new_milestone != old_milestone {
            sqlx::query(
                "UPDATE project_tasks SET order_index =
                    (SELECT COALESCE(MAX(order_index), -1) + 1 FROM project_tasks
                     WHERE project_id = ? AND milestone_id IS ? AND id <> ?)
                 WHERE id = ?",
            )
            .bind(task.project_id.to_string())
            .bind(&new_milestone)
            .bind(task.id.to_string())
            .bind(task.id.to_string())
            .execute(&mut *tx)
            .await?;

            compact_column(
                &mut tx,
                &task.project_id.to_string(),
                old_milestone.as_deref(),
                old_index,
            )
            .await?;

            for milestone_id in [old_milestone.as_deref(), new_milestone.as_deref()]
                .into_iter()
                .flatten()
            {
                if let Some(completed) =
                    evaluate_milestone(&mut tx, milestone_id, auto_complete_milestone).await?
                {
                    outcome.milestones_completed.push(completed);
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        auto_complete_milestone: bool,
    ) -> DomainResult<TaskDeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<String>, i64)> = sqlx::query_as(
            "SELECT milestone_id, order_index FROM project_tasks WHERE id = ? AND project_id = ?",
        )
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((milestone_id, order_index)) = current else {
            return Err(DomainError::TaskNotFound(task_id));
        };

        let candidates = blocked_dependents(&mut tx, &task_id.to_string()).await?;

        // FK cascades remove subtasks, references, and edges on both sides.
        sqlx::query("DELETE FROM project_tasks WHERE id = ?")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        compact_column(
            &mut tx,
            &project_id.to_string(),
            milestone_id.as_deref(),
            order_index,
        )
        .await?;

        let mut outcome = TaskDeleteOutcome::default();
        for dependent in candidates {
            let (was, now) = recompute_blocked(&mut tx, &dependent).await?;
            if was && !now {
                outcome.newly_unblocked.push(parse_uuid(&dependent)?);
            }
        }

        if let Some(milestone_id) = milestone_id {
            outcome.milestone_completed =
                evaluate_milestone(&mut tx, &milestone_id, auto_complete_milestone).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_task_status(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_status: TaskStatus,
        expected_version: i64,
        auto_complete_milestone: bool,
    ) -> DomainResult<StatusChangeRecord> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now().to_rfc3339();
        let completed_at = (new_status == TaskStatus::Done).then(|| now.clone());
        let result = sqlx::query(
            "UPDATE project_tasks SET status = ?, completed_at = ?, updated_at = ?,
             version = version + 1
             WHERE id = ? AND project_id = ? AND version = ?",
        )
        .bind(new_status.as_str())
        .bind(completed_at)
        .bind(&now)
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .classify_write_miss(&mut tx, "project_tasks", "task", task_id)
                .await);
        }

        let mut newly_unblocked = Vec::new();
        if new_status == TaskStatus::Done {
            for dependent in blocked_dependents(&mut tx, &task_id.to_string()).await? {
                let (was, now_blocked) = recompute_blocked(&mut tx, &dependent).await?;
                if was && !now_blocked {
                    newly_unblocked.push(parse_uuid(&dependent)?);
                }
            }
        } else {
            // Leaving Done re-blocks dependents that counted on this task.
            let dependents: Vec<(String,)> = sqlx::query_as(
                "SELECT task_id FROM task_dependencies WHERE depends_on_task_id = ?",
            )
            .bind(task_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
            for (dependent,) in dependents {
                recompute_blocked(&mut tx, &dependent).await?;
            }
        }

        let row: TaskRow = sqlx::query_as("SELECT * FROM project_tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let task: ProjectTask = row.try_into()?;

        let milestone_completed = match task.milestone_id {
            Some(milestone_id) => {
                evaluate_milestone(&mut tx, &milestone_id.to_string(), auto_complete_milestone)
                    .await?
            }
            None => None,
        };

        tx.commit().await?;
        Ok(StatusChangeRecord {
            task,
            newly_unblocked,
            milestone_completed,
        })
    }

    async fn reorder_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        new_index: i64,
        expected_version: i64,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<String>, i64)> = sqlx::query_as(
            "SELECT milestone_id, order_index FROM project_tasks WHERE id = ? AND project_id = ?",
        )
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((milestone_id, old_index)) = current else {
            return Err(DomainError::TaskNotFound(task_id));
        };

        let Some(shift) = plan_reorder(old_index, new_index) else {
            return Ok(());
        };

        let result = sqlx::query(
            "UPDATE project_tasks SET order_index = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(new_index)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .classify_write_miss(&mut tx, "project_tasks", "task", task_id)
                .await);
        }

        sqlx::query(
            "UPDATE project_tasks SET order_index = order_index + ?
             WHERE project_id = ? AND milestone_id IS ? AND id <> ?
               AND order_index >= ? AND order_index <= ?",
        )
        .bind(shift.delta)
        .bind(project_id.to_string())
        .bind(&milestone_id)
        .bind(task_id.to_string())
        .bind(shift.lo)
        .bind(shift.hi)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_milestone(
        &self,
        milestone: &ProjectMilestone,
    ) -> DomainResult<ProjectMilestone> {
        let mut tx = self.pool.begin().await?;
        let stored = self.insert_milestone_tx(&mut tx, milestone).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn get_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
    ) -> DomainResult<Option<ProjectMilestone>> {
        let row: Option<MilestoneRow> =
            sqlx::query_as("SELECT * FROM project_milestones WHERE id = ? AND project_id = ?")
                .bind(milestone_id.to_string())
                .bind(project_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_milestones(&self, project_id: Uuid) -> DomainResult<Vec<ProjectMilestone>> {
        let rows: Vec<MilestoneRow> = sqlx::query_as(
            "SELECT * FROM project_milestones WHERE project_id = ? ORDER BY order_index",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_milestone(
        &self,
        milestone: &ProjectMilestone,
        expected_version: i64,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE project_milestones SET title = ?, description = ?, status = ?, version = ?
             WHERE id = ? AND project_id = ? AND version = ?",
        )
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.status.as_str())
        .bind(milestone.version)
        .bind(milestone.id.to_string())
        .bind(milestone.project_id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .classify_write_miss(&mut tx, "project_milestones", "milestone", milestone.id)
                .await);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_milestone(
        &self,
        project_id: Uuid,
        milestone_id: Uuid,
        cascade: bool,
    ) -> DomainResult<MilestoneDeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_milestones WHERE id = ? AND project_id = ?)",
        )
        .bind(milestone_id.to_string())
        .bind(project_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if exists == 0 {
            return Err(DomainError::MilestoneNotFound(milestone_id));
        }

        if !cascade {
            let task_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM project_tasks WHERE milestone_id = ?")
                    .bind(milestone_id.to_string())
                    .fetch_one(&mut *tx)
                    .await?;
            if task_count > 0 {
                return Err(DomainError::InvalidOperation(format!(
                    "milestone still has {task_count} task(s); delete them or cascade"
                )));
            }
        }

        // Blocked tasks outside the milestone that wait on a task inside it
        // lose those edges to the cascade and need their flags recomputed.
        let mut candidates: Vec<String> = Vec::new();
        if cascade {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT DISTINCT t.id FROM task_dependencies d
                 JOIN project_tasks t ON t.id = d.task_id
                 JOIN project_tasks dep ON dep.id = d.depends_on_task_id
                 WHERE dep.milestone_id = ? AND t.is_blocked = 1
                   AND (t.milestone_id IS NULL OR t.milestone_id <> ?)",
            )
            .bind(milestone_id.to_string())
            .bind(milestone_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
            candidates = rows.into_iter().map(|(id,)| id).collect();
        }

        // With cascade the FK removes the tasks and everything they own.
        sqlx::query("DELETE FROM project_milestones WHERE id = ?")
            .bind(milestone_id.to_string())
            .execute(&mut *tx)
            .await?;

        let mut outcome = MilestoneDeleteOutcome::default();
        for dependent in candidates {
            let (was, now) = recompute_blocked(&mut tx, &dependent).await?;
            if was && !now {
                outcome.newly_unblocked.push(parse_uuid(&dependent)?);
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn list_dependencies(&self, project_id: Uuid) -> DomainResult<Vec<TaskDependency>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT d.task_id, d.depends_on_task_id, d.created_at
             FROM task_dependencies d
             JOIN project_tasks t ON t.id = d.task_id
             WHERE t.project_id = ?",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(task_id, depends_on, created_at)| {
                Ok(TaskDependency {
                    task_id: parse_uuid(&task_id)?,
                    depends_on_task_id: parse_uuid(&depends_on)?,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    async fn list_dependents(&self, project_id: Uuid, task_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT d.task_id FROM task_dependencies d
             JOIN project_tasks t ON t.id = d.task_id
             WHERE d.depends_on_task_id = ? AND t.project_id = ?",
        )
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    async fn add_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        for id in [task_id, depends_on] {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM project_tasks WHERE id = ? AND project_id = ?)",
            )
            .bind(id.to_string())
            .bind(project_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
            if exists == 0 {
                return Err(DomainError::TaskNotFound(id));
            }
        }

        // Duplicate and cycle checks run against the edge set read on this
        // transaction, so a concurrent add cannot slip a loop past them.
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT d.task_id, d.depends_on_task_id FROM task_dependencies d
             JOIN project_tasks t ON t.id = d.task_id
             WHERE t.project_id = ?",
        )
        .bind(project_id.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for (from, to) in rows {
            let from = parse_uuid(&from)?;
            let to = parse_uuid(&to)?;
            if from == task_id && to == depends_on {
                return Err(DomainError::InvalidOperation(
                    "dependency already exists".to_string(),
                ));
            }
            edges.push(TaskDependency::new(from, to));
        }
        if let Some(path) = cycle_path(task_id, depends_on, &edges) {
            return Err(DomainError::DependencyCycle(path));
        }

        sqlx::query(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(task_id.to_string())
        .bind(depends_on.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let (_, blocked) = recompute_blocked(&mut tx, &task_id.to_string()).await?;
        tx.commit().await?;
        Ok(blocked)
    }

    async fn remove_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM task_dependencies
             WHERE task_id = ? AND depends_on_task_id = ?
               AND task_id IN (SELECT id FROM project_tasks WHERE project_id = ?)",
        )
        .bind(task_id.to_string())
        .bind(depends_on.to_string())
        .bind(project_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DependencyNotFound {
                task_id,
                depends_on,
            });
        }

        let (was, now) = recompute_blocked(&mut tx, &task_id.to_string()).await?;
        tx.commit().await?;
        Ok(was && !now)
    }

    async fn insert_subtask(
        &self,
        project_id: Uuid,
        subtask: &ProjectSubtask,
    ) -> DomainResult<ProjectSubtask> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_tasks WHERE id = ? AND project_id = ?)",
        )
        .bind(subtask.task_id.to_string())
        .bind(project_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if exists == 0 {
            return Err(DomainError::TaskNotFound(subtask.task_id));
        }

        let stored = self.insert_subtask_tx(&mut tx, subtask).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn get_subtask(
        &self,
        project_id: Uuid,
        subtask_id: Uuid,
    ) -> DomainResult<Option<ProjectSubtask>> {
        let row: Option<SubtaskRow> = sqlx::query_as(
            "SELECT s.* FROM project_subtasks s
             JOIN project_tasks t ON t.id = s.task_id
             WHERE s.id = ? AND t.project_id = ?",
        )
        .bind(subtask_id.to_string())
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_subtasks(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectSubtask>> {
        let rows: Vec<SubtaskRow> = sqlx::query_as(
            "SELECT s.* FROM project_subtasks s
             JOIN project_tasks t ON t.id = s.task_id
             WHERE s.task_id = ? AND t.project_id = ?
             ORDER BY s.order_index",
        )
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_subtask(
        &self,
        project_id: Uuid,
        subtask: &ProjectSubtask,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE project_subtasks SET title = ?, description = ?, is_done = ?, completed_at = ?
             WHERE id = ? AND task_id IN (SELECT id FROM project_tasks WHERE project_id = ?)",
        )
        .bind(&subtask.title)
        .bind(&subtask.description)
        .bind(i64::from(subtask.is_done))
        .bind(subtask.completed_at.map(|t| t.to_rfc3339()))
        .bind(subtask.id.to_string())
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SubtaskNotFound(subtask.id));
        }
        Ok(())
    }

    async fn delete_subtask(&self, project_id: Uuid, subtask_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "DELETE FROM project_subtasks
             WHERE id = ? AND task_id IN (SELECT id FROM project_tasks WHERE project_id = ?)",
        )
        .bind(subtask_id.to_string())
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SubtaskNotFound(subtask_id));
        }
        Ok(())
    }

    async fn insert_reference(
        &self,
        project_id: Uuid,
        reference: &ProjectTaskReference,
    ) -> DomainResult<ProjectTaskReference> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_tasks WHERE id = ? AND project_id = ?)",
        )
        .bind(reference.task_id.to_string())
        .bind(project_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if exists == 0 {
            return Err(DomainError::TaskNotFound(reference.task_id));
        }

        sqlx::query(
            "INSERT INTO task_references (id, task_id, ref_type, url, title, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(reference.id.to_string())
        .bind(reference.task_id.to_string())
        .bind(reference.ref_type.as_str())
        .bind(&reference.url)
        .bind(&reference.title)
        .bind(reference.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reference.clone())
    }

    async fn list_references(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Vec<ProjectTaskReference>> {
        let rows: Vec<ReferenceRow> = sqlx::query_as(
            "SELECT r.* FROM task_references r
             JOIN project_tasks t ON t.id = r.task_id
             WHERE r.task_id = ? AND t.project_id = ?
             ORDER BY r.created_at",
        )
        .bind(task_id.to_string())
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_reference(&self, project_id: Uuid, reference_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "DELETE FROM task_references
             WHERE id = ? AND task_id IN (SELECT id FROM project_tasks WHERE project_id = ?)",
        )
        .bind(reference_id.to_string())
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ReferenceNotFound(reference_id));
        }
        Ok(())
    }

    async fn apply_plan(
        &self,
        project_id: Uuid,
        mode: PlanMode,
        batch: PlanBatch,
    ) -> DomainResult<PlanBatch> {
        let mut tx = self.pool.begin().await?;

        if mode == PlanMode::Replace {
            // Task deletes cascade subtasks, references, and edges.
            sqlx::query("DELETE FROM project_tasks WHERE project_id = ?")
                .bind(project_id.to_string())
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM project_milestones WHERE project_id = ?")
                .bind(project_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        let mut stored = PlanBatch::default();
        for milestone in &batch.milestones {
            stored
                .milestones
                .push(self.insert_milestone_tx(&mut tx, milestone).await?);
        }
        for task in &batch.tasks {
            stored.tasks.push(self.insert_task_tx(&mut tx, task).await?);
        }
        for subtask in &batch.subtasks {
            stored
                .subtasks
                .push(self.insert_subtask_tx(&mut tx, subtask).await?);
        }

        tx.commit().await?;
        Ok(stored)
    }
}
