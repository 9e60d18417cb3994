//! Anthropic planning provider adapter.
//!
//! Calls the Messages API to draft roadmaps and elaborate tasks. The model
//! is asked for bare JSON; responses wrapped in markdown fences are still
//! accepted and unwrapped before parsing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PlannerConfig, RoadmapData};
use crate::domain::ports::{PlanningPromptContext, PlanningProvider, TaskElaborationContext};
use crate::services::extract_json_from_response;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic planning provider.
#[derive(Debug, Clone)]
pub struct AnthropicPlanningConfig {
    /// API key. Falls back to `ANTHROPIC_API_KEY` env var.
    pub api_key: Option<String>,
    /// Base URL for the API. Default: `https://api.anthropic.com`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens for the response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AnthropicPlanningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

impl From<&PlannerConfig> for AnthropicPlanningConfig {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl AnthropicPlanningConfig {
    fn get_api_key(&self) -> DomainResult<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                DomainError::ProviderError(
                    "Anthropic API key not set. Set ANTHROPIC_API_KEY env var or configure api_key."
                        .to_string(),
                )
            })
    }
}

/// Anthropic planning provider.
pub struct AnthropicPlanningProvider {
    config: AnthropicPlanningConfig,
    client: Arc<reqwest::Client>,
}

impl AnthropicPlanningProvider {
    pub fn new(config: AnthropicPlanningConfig) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ProviderError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    async fn call_messages_api(&self, system: &str, user: String) -> DomainResult<String> {
        let api_key = self.config.get_api_key()?;
        let url = format!("{}/v1/messages", self.config.base_url);

        let request_body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| DomainError::ProviderError(format!("Messages API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(DomainError::ProviderError(format!(
                "Messages API returned {status}: {body}"
            )));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DomainError::ProviderError(format!("Failed to parse API response: {e}")))?;

        let text = result
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(DomainError::ProviderError(
                "Empty response from model".to_string(),
            ));
        }
        Ok(text)
    }
}

const ROADMAP_SYSTEM_PROMPT: &str = "\
You are a project planning assistant for software mentorship projects. \
You produce practical, incremental roadmaps that junior developers can follow. \
Respond with a single JSON object and nothing else, using this shape:
{
  \"milestones\": [{\"title\": \"...\", \"description\": \"...\", \"order\": 1}],
  \"tasks\": [{
    \"title\": \"...\", \"description\": \"...\", \"milestone\": 1,
    \"type\": \"feature|bug|chore|research|docs\",
    \"priority\": \"low|medium|high|critical\",
    \"due_in_days\": 7, \"assigned_role\": \"...\",
    \"subtasks\": [{\"title\": \"...\"}]
  }]
}
The \"milestone\" field is the 1-based ordinal of the milestone the task \
belongs to. Omit fields you have no value for.";

const ELABORATION_SYSTEM_PROMPT: &str = "\
You are a mentor helping a junior developer understand a task on their \
project board. Give concrete, actionable guidance in plain prose. \
Do not wrap your answer in JSON or code fences.";

fn build_roadmap_prompt(ctx: &PlanningPromptContext) -> String {
    let mut prompt = String::new();
    if let Some(name) = &ctx.project_name {
        prompt.push_str(&format!("Project: {name}\n"));
    }
    prompt.push_str(&format!("Goal: {}\n", ctx.request.goal));
    if let Some(constraints) = &ctx.request.constraints {
        prompt.push_str(&format!("Constraints: {constraints}\n"));
    }
    if !ctx.request.preferred_technologies.is_empty() {
        prompt.push_str(&format!(
            "Preferred technologies: {}\n",
            ctx.request.preferred_technologies.join(", ")
        ));
    }
    if let Some(start) = ctx.request.start_date {
        prompt.push_str(&format!("Start date: {}\n", start.format("%Y-%m-%d")));
    }
    if let Some(target) = ctx.request.target_date {
        prompt.push_str(&format!("Target date: {}\n", target.format("%Y-%m-%d")));
    }
    if !ctx.existing_milestones.is_empty() {
        prompt.push_str(
            "\nThe board already has these milestones; plan around them and do not repeat them:\n",
        );
        for title in &ctx.existing_milestones {
            prompt.push_str(&format!("- {title}\n"));
        }
    }
    prompt.push_str("\nDraft the roadmap now.");
    prompt
}

fn build_elaboration_prompt(ctx: &TaskElaborationContext) -> String {
    let mut prompt = format!("Task: {}\n", ctx.title);
    if let Some(description) = &ctx.description {
        prompt.push_str(&format!("Description: {description}\n"));
    }
    if let Some(milestone) = &ctx.milestone_title {
        prompt.push_str(&format!("Milestone: {milestone}\n"));
    }
    if let Some(role) = &ctx.assigned_role {
        prompt.push_str(&format!("Assigned role: {role}\n"));
    }
    if let Some(extra) = &ctx.request.extra_context {
        prompt.push_str(&format!("Additional context: {extra}\n"));
    }
    prompt.push_str(&format!("\nQuestion: {}", ctx.request.user_question));
    prompt
}

#[async_trait]
impl PlanningProvider for AnthropicPlanningProvider {
    async fn generate_roadmap(&self, ctx: &PlanningPromptContext) -> DomainResult<RoadmapData> {
        let prompt = build_roadmap_prompt(ctx);
        let raw = self.call_messages_api(ROADMAP_SYSTEM_PROMPT, prompt).await?;
        let json = extract_json_from_response(&raw);
        serde_json::from_str(&json)
            .map_err(|e| DomainError::ProviderError(format!("Model returned invalid plan JSON: {e}")))
    }

    async fn elaborate_task(&self, ctx: &TaskElaborationContext) -> DomainResult<String> {
        let prompt = build_elaboration_prompt(ctx);
        self.call_messages_api(ELABORATION_SYSTEM_PROMPT, prompt)
            .await
    }
}

// -- Messages API request/response types --

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PlanRequest;

    #[test]
    fn test_default_config() {
        let config = AnthropicPlanningConfig::default();
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_api_key_from_config() {
        let config = AnthropicPlanningConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_roadmap_prompt_includes_existing_milestones() {
        let ctx = PlanningPromptContext {
            project_name: Some("Recipe App".to_string()),
            request: PlanRequest {
                goal: "Build an MVP".to_string(),
                preferred_technologies: vec!["React".to_string()],
                ..Default::default()
            },
            existing_milestones: vec!["Foundations".to_string()],
            ..Default::default()
        };
        let prompt = build_roadmap_prompt(&ctx);
        assert!(prompt.contains("Recipe App"));
        assert!(prompt.contains("Build an MVP"));
        assert!(prompt.contains("React"));
        assert!(prompt.contains("- Foundations"));
    }

    #[test]
    fn test_elaboration_prompt_shape() {
        let ctx = TaskElaborationContext {
            title: "Set up CI".to_string(),
            milestone_title: Some("Foundations".to_string()),
            request: crate::domain::models::ElaborationRequest {
                user_question: "Where do I start?".to_string(),
                extra_context: None,
            },
            ..Default::default()
        };
        let prompt = build_elaboration_prompt(&ctx);
        assert!(prompt.starts_with("Task: Set up CI"));
        assert!(prompt.contains("Milestone: Foundations"));
        assert!(prompt.ends_with("Question: Where do I start?"));
    }
}
