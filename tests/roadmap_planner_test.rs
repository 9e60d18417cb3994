//! Integration tests for the roadmap planner against a scripted provider
//! and the real SQLite store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gainit_planning::domain::errors::{DomainError, DomainResult};
use gainit_planning::domain::models::{ElaborationRequest, PlanMode, PlanRequest, RoadmapData};
use gainit_planning::domain::ports::{
    PlanningPromptContext, PlanningProvider, TaskElaborationContext, TaskGraphRepository,
};
use gainit_planning::services::{NewTask, RoadmapPlanner, TaskService};
use uuid::Uuid;

use common::{setup_repo, Event, RecordingSink};

/// Provider that replays canned JSON, optionally after a delay.
struct ScriptedProvider {
    roadmap_json: String,
    guidance: String,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn with_roadmap(json: &str) -> Self {
        Self {
            roadmap_json: json.to_string(),
            guidance: "Start with the schema.".to_string(),
            delay: None,
        }
    }
}

#[async_trait]
impl PlanningProvider for ScriptedProvider {
    async fn generate_roadmap(&self, _ctx: &PlanningPromptContext) -> DomainResult<RoadmapData> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        serde_json::from_str(&self.roadmap_json).map_err(Into::into)
    }

    async fn elaborate_task(&self, _ctx: &TaskElaborationContext) -> DomainResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.guidance.clone())
    }
}

fn plan_request(goal: &str) -> PlanRequest {
    PlanRequest {
        goal: goal.to_string(),
        ..PlanRequest::default()
    }
}

const TWO_PHASE_PLAN: &str = r#"{
    "milestones": [
        {"title": "Foundations", "order": 1},
        {"title": "MVP", "order": 2}
    ],
    "tasks": [
        {"title": "Set up repo", "milestone": 1, "type": "chore", "priority": "high",
         "subtasks": [{"title": "Create CI pipeline"}]},
        {"title": "Build login", "milestone": 2, "due_in_days": 14}
    ]
}"#;

#[tokio::test]
async fn test_generate_replace_applies_full_batch() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let provider = Arc::new(ScriptedProvider::with_roadmap(TWO_PHASE_PLAN));
    let planner = RoadmapPlanner::new(repo.clone(), provider, sink.clone());
    let project_id = Uuid::new_v4();

    let result = planner
        .generate_for_project(project_id, PlanMode::Replace, plan_request("Build an app"), Uuid::new_v4())
        .await
        .expect("generate");

    assert_eq!(result.milestones.len(), 2);
    assert_eq!(result.tasks.len(), 2);
    assert!(result.notes.is_empty());

    let milestones = repo.list_milestones(project_id).await.expect("list");
    assert_eq!(milestones.len(), 2);
    let tasks = repo
        .list_tasks(project_id, Default::default())
        .await
        .expect("list");
    assert_eq!(tasks.len(), 2);
    let setup_task = tasks.iter().find(|t| t.title == "Set up repo").expect("present");
    assert_eq!(
        repo.list_subtasks(project_id, setup_task.id)
            .await
            .expect("subtasks")
            .len(),
        1
    );
    assert!(tasks.iter().find(|t| t.title == "Build login").expect("present").due_at.is_some());

    // One created event per task.
    assert_eq!(sink.count(|e| matches!(e, Event::TaskCreated(_))), 2);
}

#[tokio::test]
async fn test_replace_wipes_existing_roadmap() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let service = TaskService::new(repo.clone(), sink.clone());
    let project_id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let old_milestone = service
        .create_milestone(project_id, "Old phase", None)
        .await
        .expect("create milestone");
    service
        .create_task(
            project_id,
            NewTask {
                title: "old task".to_string(),
                milestone_id: Some(old_milestone.id),
                ..NewTask::default()
            },
            actor,
        )
        .await
        .expect("create task");

    let provider = Arc::new(ScriptedProvider::with_roadmap(TWO_PHASE_PLAN));
    let planner = RoadmapPlanner::new(repo.clone(), provider, sink);
    planner
        .generate_for_project(project_id, PlanMode::Replace, plan_request("Start over"), actor)
        .await
        .expect("generate");

    let milestones = repo.list_milestones(project_id).await.expect("list");
    assert!(milestones.iter().all(|m| m.title != "Old phase"));
    let tasks = repo
        .list_tasks(project_id, Default::default())
        .await
        .expect("list");
    assert!(tasks.iter().all(|t| t.title != "old task"));
}

#[tokio::test]
async fn test_augment_keeps_existing_and_resolves_ordinals() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let service = TaskService::new(repo.clone(), sink.clone());
    let project_id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    // Existing milestone gets order_index 1 on insert.
    let existing = service
        .create_milestone(project_id, "Already here", None)
        .await
        .expect("create milestone");

    let plan = r#"{
        "milestones": [],
        "tasks": [{"title": "Slot into existing", "milestone": 1}]
    }"#;
    let planner = RoadmapPlanner::new(repo.clone(), Arc::new(ScriptedProvider::with_roadmap(plan)), sink);
    let result = planner
        .generate_for_project(project_id, PlanMode::Augment, plan_request("Extend"), actor)
        .await
        .expect("generate");

    assert_eq!(result.tasks.len(), 1);
    assert_eq!(result.tasks[0].milestone_id, Some(existing.id));
    assert_eq!(repo.list_milestones(project_id).await.expect("list").len(), 1);
}

#[tokio::test]
async fn test_invalid_batch_persists_nothing() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let plan = r#"{
        "milestones": [{"title": "Phase 1", "order": 1}],
        "tasks": [
            {"title": "Fine", "milestone": 1},
            {"milestone": 1}
        ]
    }"#;
    let planner = RoadmapPlanner::new(repo.clone(), Arc::new(ScriptedProvider::with_roadmap(plan)), sink.clone());
    let project_id = Uuid::new_v4();

    let err = planner
        .generate_for_project(project_id, PlanMode::Replace, plan_request("Doomed"), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));

    assert!(repo.list_milestones(project_id).await.expect("list").is_empty());
    assert!(repo
        .list_tasks(project_id, Default::default())
        .await
        .expect("list")
        .is_empty());
    assert_eq!(sink.count(|e| matches!(e, Event::TaskCreated(_))), 0);
}

#[tokio::test]
async fn test_notes_surface_non_fatal_issues() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let plan = r#"{
        "milestones": [],
        "tasks": [
            {"title": "Odd one", "type": "epic", "due_at": "whenever"}
        ]
    }"#;
    let planner = RoadmapPlanner::new(repo, Arc::new(ScriptedProvider::with_roadmap(plan)), sink);

    let result = planner
        .generate_for_project(
            Uuid::new_v4(),
            PlanMode::Replace,
            plan_request("Messy plan"),
            Uuid::new_v4(),
        )
        .await
        .expect("generate");

    assert!(result.notes.iter().any(|n| n.contains("unknown type")));
    assert!(result.notes.iter().any(|n| n.contains("invalid due dates")));
}

#[tokio::test]
async fn test_provider_timeout_maps_to_domain_error() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let provider = Arc::new(ScriptedProvider {
        roadmap_json: TWO_PHASE_PLAN.to_string(),
        guidance: String::new(),
        delay: Some(Duration::from_millis(200)),
    });
    let planner = RoadmapPlanner::new(repo.clone(), provider, sink)
        .with_provider_timeout(Duration::from_millis(20));
    let project_id = Uuid::new_v4();

    let err = planner
        .generate_for_project(project_id, PlanMode::Replace, plan_request("Slow"), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ProviderTimeout(_)));
    assert!(repo.list_milestones(project_id).await.expect("list").is_empty());
}

#[tokio::test]
async fn test_empty_goal_rejected_before_provider_call() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let planner = RoadmapPlanner::new(
        repo,
        Arc::new(ScriptedProvider::with_roadmap(TWO_PHASE_PLAN)),
        sink,
    );

    let err = planner
        .generate_for_project(Uuid::new_v4(), PlanMode::Replace, plan_request("  "), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_elaborate_task_is_read_only() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let service = TaskService::new(repo.clone(), sink.clone());
    let project_id = Uuid::new_v4();

    let task = service
        .create_task(
            project_id,
            NewTask {
                title: "Set up CI".to_string(),
                description: Some("original description".to_string()),
                ..NewTask::default()
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create");

    let planner = RoadmapPlanner::new(
        repo.clone(),
        Arc::new(ScriptedProvider::with_roadmap("{}")),
        sink,
    );
    let result = planner
        .elaborate_task(
            project_id,
            task.id,
            ElaborationRequest {
                user_question: "Where do I start?".to_string(),
                extra_context: None,
            },
        )
        .await
        .expect("elaborate");

    assert_eq!(result.guidance, "Start with the schema.");
    let stored = service.get_task(project_id, task.id).await.expect("get");
    assert_eq!(stored.description.as_deref(), Some("original description"));
    assert_eq!(stored.version, task.version);
}

#[tokio::test]
async fn test_elaborate_unknown_task_fails() {
    let repo = Arc::new(setup_repo().await);
    let sink = Arc::new(RecordingSink::new());
    let planner = RoadmapPlanner::new(
        repo,
        Arc::new(ScriptedProvider::with_roadmap("{}")),
        sink,
    );

    let err = planner
        .elaborate_task(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ElaborationRequest {
                user_question: "Anything?".to_string(),
                extra_context: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::TaskNotFound(_)));
}
