#![allow(dead_code)]

//! Shared test fixtures: in-memory database setup and a recording
//! notification sink.

use std::sync::Mutex;

use async_trait::async_trait;
use gainit_planning::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};
use gainit_planning::adapters::SqliteTaskGraphRepository;
use gainit_planning::domain::models::{ProjectMilestone, ProjectTask, TaskStatus};
use gainit_planning::domain::ports::NotificationSink;
use uuid::Uuid;

/// Fresh in-memory repository with the schema applied.
pub async fn setup_repo() -> SqliteTaskGraphRepository {
    let pool = create_test_pool().await.expect("failed to create test pool");
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");
    SqliteTaskGraphRepository::new(pool)
}

/// Notification event captured by the recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TaskCreated(Uuid),
    TaskUnblocked(Uuid),
    TaskCompleted(Uuid),
    MilestoneCompleted(Uuid, i64),
}

/// Sink that records every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().expect("sink mutex poisoned"))
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn task_created(&self, _project_id: Uuid, task: &ProjectTask) {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(Event::TaskCreated(task.id));
    }

    async fn task_unblocked(&self, _project_id: Uuid, task_id: Uuid) {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(Event::TaskUnblocked(task_id));
    }

    async fn task_completed(
        &self,
        _project_id: Uuid,
        task_id: Uuid,
        _old_status: TaskStatus,
        _new_status: TaskStatus,
    ) {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(Event::TaskCompleted(task_id));
    }

    async fn milestone_completed(
        &self,
        _project_id: Uuid,
        milestone: &ProjectMilestone,
        task_count: i64,
    ) {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(Event::MilestoneCompleted(milestone.id, task_count));
    }
}
