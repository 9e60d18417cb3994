//! Integration tests for the Anthropic planning provider against a mock
//! HTTP server.

use gainit_planning::adapters::anthropic::{AnthropicPlanningConfig, AnthropicPlanningProvider};
use gainit_planning::domain::errors::DomainError;
use gainit_planning::domain::models::{ElaborationRequest, PlanRequest};
use gainit_planning::domain::ports::{
    PlanningPromptContext, PlanningProvider, TaskElaborationContext,
};
use mockito::Server;
use uuid::Uuid;

fn test_config(base_url: String) -> AnthropicPlanningConfig {
    AnthropicPlanningConfig {
        api_key: Some("test-api-key".to_string()),
        base_url,
        ..AnthropicPlanningConfig::default()
    }
}

fn roadmap_context() -> PlanningPromptContext {
    PlanningPromptContext {
        project_id: Uuid::new_v4(),
        project_name: Some("Recipe App".to_string()),
        request: PlanRequest {
            goal: "Build an MVP".to_string(),
            ..PlanRequest::default()
        },
        existing_milestones: Vec::new(),
    }
}

fn messages_body(text: &str) -> String {
    serde_json::json!({
        "id": "msg_01ABC123",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": "claude-sonnet-4-5",
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 50, "output_tokens": 120}
    })
    .to_string()
}

const PLAN_TEXT: &str = r#"{
    "milestones": [{"title": "Foundations", "order": 1}],
    "tasks": [{"title": "Set up repo", "milestone": 1}]
}"#;

#[tokio::test]
async fn test_generate_roadmap_parses_plain_json() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-api-key")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(messages_body(PLAN_TEXT))
        .create_async()
        .await;

    let provider =
        AnthropicPlanningProvider::new(test_config(server.url())).expect("build provider");
    let data = provider
        .generate_roadmap(&roadmap_context())
        .await
        .expect("generate");

    assert_eq!(data.milestones.len(), 1);
    assert_eq!(data.tasks.len(), 1);
    assert_eq!(data.tasks[0].milestone, Some(1));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_roadmap_unwraps_fenced_json() {
    let mut server = Server::new_async().await;
    let fenced = format!("Here is the plan:\n```json\n{PLAN_TEXT}\n```");
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(messages_body(&fenced))
        .create_async()
        .await;

    let provider =
        AnthropicPlanningProvider::new(test_config(server.url())).expect("build provider");
    let data = provider
        .generate_roadmap(&roadmap_context())
        .await
        .expect("generate");
    assert_eq!(data.milestones[0].title.as_deref(), Some("Foundations"));
}

#[tokio::test]
async fn test_generate_roadmap_invalid_json_is_provider_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(messages_body("I could not produce a plan, sorry."))
        .create_async()
        .await;

    let provider =
        AnthropicPlanningProvider::new(test_config(server.url())).expect("build provider");
    let err = provider
        .generate_roadmap(&roadmap_context())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ProviderError(_)));
}

#[tokio::test]
async fn test_api_error_status_surfaces_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(429)
        .with_body(r#"{"error": {"type": "rate_limit_error"}}"#)
        .create_async()
        .await;

    let provider =
        AnthropicPlanningProvider::new(test_config(server.url())).expect("build provider");
    let err = provider
        .generate_roadmap(&roadmap_context())
        .await
        .unwrap_err();
    match err {
        DomainError::ProviderError(msg) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("rate_limit_error"));
        }
        other => panic!("expected ProviderError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_api_key_fails_before_request() {
    let config = AnthropicPlanningConfig {
        api_key: None,
        base_url: "http://127.0.0.1:1".to_string(),
        ..AnthropicPlanningConfig::default()
    };
    let provider = AnthropicPlanningProvider::new(config).expect("build provider");

    // Only meaningful when the ambient env var is absent.
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        let err = provider
            .generate_roadmap(&roadmap_context())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ProviderError(_)));
    }
}

#[tokio::test]
async fn test_elaborate_task_returns_prose() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(messages_body("Break the work into three steps."))
        .create_async()
        .await;

    let provider =
        AnthropicPlanningProvider::new(test_config(server.url())).expect("build provider");
    let ctx = TaskElaborationContext {
        task_id: Uuid::new_v4(),
        title: "Set up CI".to_string(),
        description: None,
        assigned_role: Some("Backend Developer".to_string()),
        milestone_title: None,
        request: ElaborationRequest {
            user_question: "Where do I start?".to_string(),
            extra_context: None,
        },
    };

    let guidance = provider.elaborate_task(&ctx).await.expect("elaborate");
    assert_eq!(guidance, "Break the work into three steps.");
}
