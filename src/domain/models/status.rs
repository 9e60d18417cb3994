//! Task and milestone status state machines.
//!
//! `Blocked` is modeled as an overlay flag on the task rather than a status
//! of its own: a task stays in Todo or InProgress while blocked, and the
//! flag alone decides whether a transition to Done is legal.

use serde::{Deserialize, Serialize};

/// Status of a task on the project board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "todo" | "to_do" => Some(Self::Todo),
            "in_progress" | "inprogress" | "doing" => Some(Self::InProgress),
            "done" | "complete" | "completed" => Some(Self::Done),
            _ => None,
        }
    }

    /// Position in the forward Todo -> InProgress -> Done sequence.
    fn rank(self) -> u8 {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

/// Status of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Planned,
    InProgress,
    Completed,
}

impl Default for MilestoneStatus {
    fn default() -> Self {
        Self::Planned
    }
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "planned" => Some(Self::Planned),
            "in_progress" | "inprogress" => Some(Self::InProgress),
            "completed" | "complete" | "done" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Configurable transition rules for the task state machine.
///
/// The exact allowed transitions are policy, not a hard-coded assumption.
/// Defaults: any forward jump is allowed (Todo -> Done included, when not
/// blocked), Todo and InProgress can move between each other freely, and
/// Done is only left through an explicit reopen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionPolicy {
    /// When true, tasks must pass through InProgress on the way to Done.
    pub strict_sequence: bool,
    /// When true, a milestone transitions to Completed as soon as its last
    /// task reaches Done.
    pub auto_complete_milestones: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            strict_sequence: false,
            auto_complete_milestones: true,
        }
    }
}

impl TransitionPolicy {
    /// Check a task transition against this policy.
    ///
    /// Blocked-flag enforcement happens separately; this only covers the
    /// shape of the transition itself.
    pub fn allows(&self, from: TaskStatus, to: TaskStatus) -> Result<(), String> {
        if from == to {
            return Err("status is unchanged".to_string());
        }
        if from == TaskStatus::Done {
            return Err("a completed task can only be reopened explicitly".to_string());
        }
        if self.strict_sequence && to.rank() > from.rank() + 1 {
            return Err(format!(
                "strict sequencing requires passing through in_progress before {}",
                to.as_str()
            ));
        }
        Ok(())
    }
}
