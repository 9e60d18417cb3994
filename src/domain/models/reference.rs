//! Reference-link domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of external resource a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Doc,
    Link,
    Design,
    Repo,
}

impl Default for ReferenceType {
    fn default() -> Self {
        Self::Link
    }
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Link => "link",
            Self::Design => "design",
            Self::Repo => "repo",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "doc" | "document" => Some(Self::Doc),
            "link" | "url" => Some(Self::Link),
            "design" => Some(Self::Design),
            "repo" | "repository" => Some(Self::Repo),
            _ => None,
        }
    }
}

/// An external link attached to a task; owned by the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTaskReference {
    /// Unique identifier
    pub id: Uuid,
    /// Owning task
    pub task_id: Uuid,
    /// Kind of resource
    pub ref_type: ReferenceType,
    /// Resource URL
    pub url: String,
    /// Optional display title
    pub title: Option<String>,
    /// When attached
    pub created_at: DateTime<Utc>,
}

impl ProjectTaskReference {
    /// Create a new reference link.
    pub fn new(task_id: Uuid, ref_type: ReferenceType, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            ref_type,
            url: url.into(),
            title: None,
            created_at: Utc::now(),
        }
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Validate structural requirements before persistence.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("reference url cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_type_parsing() {
        assert_eq!(ReferenceType::from_str("repository"), Some(ReferenceType::Repo));
        assert_eq!(ReferenceType::from_str("url"), Some(ReferenceType::Link));
        assert_eq!(ReferenceType::from_str("bogus"), None);
    }

    #[test]
    fn test_empty_url_rejected() {
        let reference = ProjectTaskReference::new(Uuid::new_v4(), ReferenceType::Doc, " ");
        assert!(reference.validate().is_err());
    }
}
