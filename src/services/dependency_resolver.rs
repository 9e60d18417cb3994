//! Dependency resolution for the task graph.
//!
//! Owns the acyclicity invariant: every edge insertion runs a DFS
//! reachability check over the project's edges, read inside the store's
//! insert transaction so concurrent adds cannot slip past it, and blocked
//! flags are recomputed whenever the edge set changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProjectTask, TaskDependency, TaskStatus};
use crate::domain::ports::{NotificationSink, TaskGraphRepository};

/// Build an adjacency map from edges: task -> the tasks it depends on.
fn dependency_graph(edges: &[TaskDependency]) -> HashMap<Uuid, Vec<Uuid>> {
    let mut graph: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in edges {
        graph
            .entry(edge.task_id)
            .or_default()
            .push(edge.depends_on_task_id);
    }
    graph
}

/// DFS from `start` along dependency edges, looking for `target`. Returns the
/// path `start -> ... -> target` when reachable.
fn find_path(
    start: Uuid,
    target: Uuid,
    graph: &HashMap<Uuid, Vec<Uuid>>,
) -> Option<Vec<Uuid>> {
    let mut visited = HashSet::new();
    let mut path = Vec::new();

    fn dfs(
        node: Uuid,
        target: Uuid,
        graph: &HashMap<Uuid, Vec<Uuid>>,
        visited: &mut HashSet<Uuid>,
        path: &mut Vec<Uuid>,
    ) -> bool {
        visited.insert(node);
        path.push(node);
        if node == target {
            return true;
        }
        if let Some(neighbors) = graph.get(&node) {
            for &neighbor in neighbors {
                if !visited.contains(&neighbor)
                    && dfs(neighbor, target, graph, visited, path)
                {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    dfs(start, target, graph, &mut visited, &mut path).then_some(path)
}

/// Path that the edge `task_id -> depends_on` would close into a loop:
/// present iff `task_id` is already reachable from `depends_on` along the
/// given edges. The returned path starts and ends at `task_id`.
pub fn cycle_path(
    task_id: Uuid,
    depends_on: Uuid,
    edges: &[TaskDependency],
) -> Option<Vec<Uuid>> {
    let graph = dependency_graph(edges);
    find_path(depends_on, task_id, &graph).map(|mut path| {
        path.insert(0, task_id);
        path
    })
}

/// Whether a task should carry the blocked flag given the current edge set
/// and task statuses: true iff any dependency is not Done.
pub fn compute_blocked(
    task_id: Uuid,
    edges: &[TaskDependency],
    status_of: &HashMap<Uuid, TaskStatus>,
) -> bool {
    edges
        .iter()
        .filter(|e| e.task_id == task_id)
        .any(|e| status_of.get(&e.depends_on_task_id) != Some(&TaskStatus::Done))
}

/// Order task ids so that dependencies come before dependents (Kahn's
/// algorithm). Errs when the edge set contains a cycle, which the resolver
/// otherwise prevents.
pub fn topological_order(
    task_ids: &[Uuid],
    edges: &[TaskDependency],
) -> DomainResult<Vec<Uuid>> {
    let ids: HashSet<Uuid> = task_ids.iter().copied().collect();
    let mut in_degree: HashMap<Uuid, usize> = task_ids.iter().map(|&id| (id, 0)).collect();
    let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for edge in edges {
        if ids.contains(&edge.task_id) && ids.contains(&edge.depends_on_task_id) {
            dependents
                .entry(edge.depends_on_task_id)
                .or_default()
                .push(edge.task_id);
            *in_degree.entry(edge.task_id).or_insert(0) += 1;
        }
    }

    let mut queue: Vec<Uuid> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut sorted = Vec::with_capacity(task_ids.len());

    while let Some(id) = queue.pop() {
        sorted.push(id);
        if let Some(deps) = dependents.get(&id) {
            for &dependent in deps {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }
    }

    if sorted.len() != task_ids.len() {
        return Err(DomainError::InvalidOperation(
            "dependency graph contains a cycle".to_string(),
        ));
    }
    Ok(sorted)
}

/// Service guarding dependency-edge mutations.
pub struct DependencyResolver<R, N> {
    repo: Arc<R>,
    notifications: Arc<N>,
}

impl<R, N> DependencyResolver<R, N>
where
    R: TaskGraphRepository,
    N: NotificationSink,
{
    pub fn new(repo: Arc<R>, notifications: Arc<N>) -> Self {
        Self {
            repo,
            notifications,
        }
    }

    /// Add the edge `task_id` depends on `depends_on`.
    ///
    /// Rejects self-dependencies up front; duplicate edges and anything that
    /// would close a cycle are rejected by the store against the edge set it
    /// reads inside the insert transaction. On success the dependent's
    /// blocked flag is recomputed in that same transaction. Returns the
    /// refreshed task.
    #[instrument(skip(self))]
    pub async fn add_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<ProjectTask> {
        if task_id == depends_on {
            return Err(DomainError::SelfDependency(task_id));
        }

        let blocked = self.repo.add_dependency(project_id, task_id, depends_on).await?;
        debug!(%task_id, %depends_on, blocked, "dependency added");

        self.repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// Remove the edge and recompute the dependent's blocked flag. Emits a
    /// task-unblocked notification when the removal cleared the last
    /// incomplete dependency.
    #[instrument(skip(self))]
    pub async fn remove_dependency(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on: Uuid,
    ) -> DomainResult<ProjectTask> {
        let became_unblocked = self
            .repo
            .remove_dependency(project_id, task_id, depends_on)
            .await?;

        if became_unblocked {
            debug!(%task_id, "task unblocked by dependency removal");
            self.notifications.task_unblocked(project_id, task_id).await;
        }

        self.repo
            .get_task(project_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }
}
