//! Services: business logic over the domain ports.

pub mod dependency_resolver;
pub mod ordering;
pub mod roadmap_planner;
pub mod task_service;

pub use dependency_resolver::DependencyResolver;
pub use ordering::OrderingEngine;
pub use roadmap_planner::RoadmapPlanner;
pub use task_service::{MilestonePatch, NewTask, TaskPatch, TaskService};

/// Extract a JSON payload from a provider response, stripping markdown code
/// fences when present.
pub fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json_from_response(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        assert_eq!(
            extract_json_from_response("```json\n{\"a\": 1}\n```"),
            r#"{"a": 1}"#
        );
        assert_eq!(
            extract_json_from_response("```\n{\"a\": 1}\n```"),
            r#"{"a": 1}"#
        );
    }

    #[test]
    fn test_extract_json_with_prose() {
        let input = "Here is the plan:\n```json\n{\"a\": 1}\n```\nLet me know.";
        assert_eq!(extract_json_from_response(input), r#"{"a": 1}"#);
    }
}
