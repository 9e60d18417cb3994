//! GainIt Planning - task graph and roadmap planning core
//!
//! The planning engine behind GainIt project boards: milestones, tasks,
//! subtasks, task references, and the dependency graph between tasks, plus
//! an AI-assisted roadmap planner that drafts whole boards from a goal.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure business logic, models, and ports
//! - **Service Layer** (`services`): Task lifecycle, ordering, dependency
//!   resolution, and roadmap planning
//! - **Adapters** (`adapters`): SQLite persistence and the Anthropic
//!   planning provider
//! - **Infrastructure** (`infrastructure`): Configuration and logging setup
//!
//! # Example
//!
//! ```ignore
//! use gainit_planning::adapters::sqlite::{create_pool, Migrator, all_embedded_migrations};
//! use gainit_planning::adapters::SqliteTaskGraphRepository;
//! use gainit_planning::domain::ports::NullNotificationSink;
//! use gainit_planning::services::TaskService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = create_pool("sqlite:gainit/planning.db", None).await?;
//!     Migrator::new(pool.clone())
//!         .run_embedded_migrations(all_embedded_migrations())
//!         .await?;
//!     let repo = Arc::new(SqliteTaskGraphRepository::new(pool));
//!     let service = TaskService::new(repo, Arc::new(NullNotificationSink));
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{AnthropicPlanningConfig, AnthropicPlanningProvider, SqliteTaskGraphRepository};
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    Config, DatabaseConfig, LoggingConfig, MilestoneStatus, PlanMode, PlanRequest, PlannerConfig,
    ProjectMilestone, ProjectSubtask, ProjectTask, TaskDependency, TaskPriority, TaskStatus,
    TaskType, TransitionPolicy,
};
pub use domain::ports::{
    NotificationSink, NullNotificationSink, PlanningProvider, TaskFilters, TaskGraphRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DependencyResolver, OrderingEngine, RoadmapPlanner, TaskService};
