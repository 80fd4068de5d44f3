use glam::Vec2;

use super::ant::AntKey;
use super::building::BuildingKey;
use super::job::Job;
use super::resources::ResourceKind;

pub type TaskId = u64;

/// Urgency of a task. Higher priorities are claimed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// The unit of work an ant can be assigned to.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    /// Extract resources from a tile and haul them home.
    Gather {
        tile: (usize, usize),
        resource: ResourceKind,
    },
    /// Work a construction site until complete.
    Construct { building: BuildingKey },
    /// Travel to a point, surveying resources along the way.
    Survey { target: Vec2 },
}

/// Lifecycle of a task. At most one claimant at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Open,
    Claimed { ant: AntKey },
    Done,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub state: TaskState,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.state == TaskState::Open
    }
}

/// Priority-sorted task list with linear-scan claiming.
///
/// The list is kept in descending priority order; equal priorities keep
/// insertion order, so claiming walks highest-priority-first then FIFO.
/// Ids increase monotonically and are never reused.
pub struct TaskManager {
    tasks: Vec<Task>,
    next_id: TaskId,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    /// Queue a task. Duplicate `Gather` tasks for the same tile and
    /// duplicate `Construct` tasks for the same site are rejected; the
    /// existing task's id is returned instead.
    pub fn add(&mut self, kind: TaskKind, priority: TaskPriority) -> TaskId {
        if let Some(existing) = self.tasks.iter().find(|t| {
            t.state != TaskState::Done
                && match (&t.kind, &kind) {
                    (TaskKind::Gather { tile: a, .. }, TaskKind::Gather { tile: b, .. }) => a == b,
                    (TaskKind::Construct { building: a }, TaskKind::Construct { building: b }) => {
                        a == b
                    }
                    _ => false,
                }
        }) {
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        let task = Task {
            id,
            kind,
            priority,
            state: TaskState::Open,
        };
        // Sorted insert: after the last task of >= priority.
        let at = self
            .tasks
            .iter()
            .position(|t| t.priority < priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(at, task);
        id
    }

    /// Linear scan for the first open task the given job can perform.
    /// Marks it claimed by `ant` and returns its id and kind.
    pub fn claim(&mut self, job: Job, ant: AntKey) -> Option<(TaskId, TaskKind)> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.is_open() && job.can_perform(&t.kind))?;
        task.state = TaskState::Claimed { ant };
        Some((task.id, task.kind.clone()))
    }

    /// Abandon a claim; the task becomes available again.
    pub fn release(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            if matches!(task.state, TaskState::Claimed { .. }) {
                task.state = TaskState::Open;
            }
        }
    }

    pub fn complete(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.state = TaskState::Done;
        }
    }

    /// Remove a task outright, claimed or not.
    pub fn cancel(&mut self, id: TaskId) {
        self.tasks.retain(|t| t.id != id);
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Drop finished tasks and any task the keep predicate rejects.
    /// Ants holding a removed id observe the miss and go idle.
    pub fn sweep<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Task) -> bool,
    {
        self.tasks
            .retain(|t| t.state != TaskState::Done && keep(t));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
