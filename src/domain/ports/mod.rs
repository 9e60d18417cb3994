//! Ports: contracts between the planning core and its collaborators.

pub mod notification_sink;
pub mod planning_provider;
pub mod task_graph_repository;

pub use notification_sink::{NotificationSink, NullNotificationSink};
pub use planning_provider::{PlanningPromptContext, PlanningProvider, TaskElaborationContext};
pub use task_graph_repository::{
    MilestoneDeleteOutcome, StatusChangeRecord, TaskDeleteOutcome, TaskFilters,
    TaskGraphRepository, TaskSortKey, TaskUpdateOutcome,
};
