//! Notification sink port.
//!
//! Events are fire-and-forget from the core's perspective: implementations
//! must handle (log and swallow) their own delivery failures, which is why
//! the methods return nothing. A failed notification never rolls back the
//! graph mutation that produced it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{ProjectMilestone, ProjectTask, TaskStatus};

/// Port for the external notification collaborator (real-time push, email).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A task was created, by hand or by a plan apply.
    async fn task_created(&self, project_id: Uuid, task: &ProjectTask);

    /// A task's last incomplete dependency finished.
    async fn task_unblocked(&self, project_id: Uuid, task_id: Uuid);

    /// A task reached Done.
    async fn task_completed(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        old_status: TaskStatus,
        new_status: TaskStatus,
    );

    /// Every task under the milestone is Done.
    async fn milestone_completed(
        &self,
        project_id: Uuid,
        milestone: &ProjectMilestone,
        task_count: i64,
    );
}

/// A no-op sink for callers that do not wire up notifications.
#[derive(Debug, Clone, Default)]
pub struct NullNotificationSink;

impl NullNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn task_created(&self, _project_id: Uuid, _task: &ProjectTask) {}

    async fn task_unblocked(&self, _project_id: Uuid, _task_id: Uuid) {}

    async fn task_completed(
        &self,
        _project_id: Uuid,
        _task_id: Uuid,
        _old_status: TaskStatus,
        _new_status: TaskStatus,
    ) {
    }

    async fn milestone_completed(
        &self,
        _project_id: Uuid,
        _milestone: &ProjectMilestone,
        _task_count: i64,
    ) {
    }
}
