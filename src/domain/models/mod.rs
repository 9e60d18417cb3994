//! Domain models: the task graph entities, status machines, roadmap DTOs,
//! and configuration.

pub mod config;
pub mod dependency;
pub mod milestone;
pub mod reference;
pub mod roadmap;
pub mod status;
pub mod subtask;
pub mod task;

pub use config::{Config, DatabaseConfig, LoggingConfig, PlannerConfig};
pub use dependency::TaskDependency;
pub use milestone::ProjectMilestone;
pub use reference::{ProjectTaskReference, ReferenceType};
pub use roadmap::{
    ElaborationRequest, ElaborationResult, MilestoneData, PlanApplyResult, PlanBatch, PlanMode,
    PlanRequest, RoadmapData, SubtaskData, TaskData,
};
pub use status::{MilestoneStatus, TaskStatus, TransitionPolicy};
pub use subtask::ProjectSubtask;
pub use task::{ProjectTask, TaskPriority, TaskType, MAX_TITLE_LEN};
