//! Task partitioning so parallel stage instances consume disjoint destination subsets.

use crate::error::StreamerError;
use uuid::Uuid;

/// "This is task `task_index` of `total_tasks`."
///
/// The mapping from destination name to task is a UUID v5 (SHA-1) of the name, so every
/// process in a deployment agrees on it without coordination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionAssignment {
    task_index: u32,
    total_tasks: u32,
}

impl PartitionAssignment {
    pub fn new(task_index: u32, total_tasks: u32) -> Result<Self, StreamerError> {
        if total_tasks == 0 {
            return Err(StreamerError::config("total_tasks must be > 0"));
        }
        if task_index >= total_tasks {
            return Err(StreamerError::config(format!(
                "task_index {task_index} out of range for {total_tasks} tasks"
            )));
        }
        Ok(Self {
            task_index,
            total_tasks,
        })
    }

    pub fn task_index(&self) -> u32 {
        self.task_index
    }

    pub fn total_tasks(&self) -> u32 {
        self.total_tasks
    }

    /// Returns the task index owning `destination`.
    pub fn owner_of(destination: &str, total_tasks: u32) -> u32 {
        let key = Uuid::new_v5(&Uuid::NAMESPACE_OID, destination.as_bytes());
        (key.as_u128() % u128::from(total_tasks.max(1))) as u32
    }

    pub fn owns(&self, destination: &str) -> bool {
        Self::owner_of(destination, self.total_tasks) == self.task_index
    }
}
