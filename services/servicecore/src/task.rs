//! Execution contexts: task priorities, task handles and task creation.

use std::fmt;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};

use crate::traits::{ServiceError, ServiceResult};

/// Hosted threads need more headroom than the firmware budgets give them.
const HOST_STACK_FLOOR: usize = 64 * 1024;

/// Scheduler priority, counted upwards from the idle task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TaskPriority(u8);

impl TaskPriority {
    pub const IDLE: Self = Self(0);

    /// Fixed low priority every service task and the manager run at.
    pub const SERVICE: Self = Self(1);

    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// `IDLE + offset`, saturating.
    pub const fn above_idle(offset: u8) -> Self {
        Self(Self::IDLE.0.saturating_add(offset))
    }

    pub const fn level(self) -> u8 {
        self.0
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::SERVICE
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle+{}", self.0 - Self::IDLE.0)
    }
}

/// Handle of a running task. Owned by whoever requested the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    priority: TaskPriority,
    stack_bytes: usize,
    started_at: DateTime<Utc>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn stack_bytes(&self) -> usize {
        self.stack_bytes
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the task body has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task body to return. Only meaningful for tasks that end.
    pub fn join(mut self) -> ServiceResult<()> {
        match self.join.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ServiceError::TaskPanicked(self.name.clone())),
            None => Ok(()),
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            priority: self.priority,
            stack_bytes: self.stack_bytes,
            started_at: self.started_at,
            finished: self.is_finished(),
        }
    }
}

/// Serializable view of a task handle.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub priority: TaskPriority,
    pub stack_bytes: usize,
    pub started_at: DateTime<Utc>,
    pub finished: bool,
}

/// Create a named task with the given stack budget and run `body` in it.
///
/// Hosted targets have no per-task priority, so the priority is carried on
/// the handle only. The handle reports the requested budget even when the
/// thread gets more. A zero stack budget is refused.
pub fn spawn_task<F>(
    name: &str,
    priority: TaskPriority,
    stack_bytes: usize,
    body: F,
) -> ServiceResult<TaskHandle>
where
    F: FnOnce() + Send + 'static,
{
    if stack_bytes == 0 {
        return Err(ServiceError::TaskSpawn {
            name: name.to_string(),
            reason: "zero stack budget".to_string(),
        });
    }

    let join = std::thread::Builder::new()
        .name(name.to_string())
        .stack_size(stack_bytes.max(HOST_STACK_FLOOR))
        .spawn(body)
        .map_err(|e| ServiceError::TaskSpawn {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    log::debug!(
        target: "Task",
        "Task '{}' created (priority={}, stack={} bytes)",
        name,
        priority,
        stack_bytes
    );

    Ok(TaskHandle {
        name: name.to_string(),
        priority,
        stack_bytes,
        started_at: Utc::now(),
        join: Some(join),
    })
}
