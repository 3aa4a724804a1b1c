use sdk::errors::EngineError;
use sdk::types::Task;
use std::collections::VecDeque;

/// FIFO of pending tasks, rebuilt by the planner every cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current contents and take `tasks` in order.
    pub fn replace(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks = tasks.into_iter().collect();
    }

    pub fn pop_front(&mut self) -> Result<Task, EngineError> {
        self.tasks.pop_front().ok_or(EngineError::EmptyQueue)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

impl FromIterator<Task> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Text of every task the worker has finished, oldest first. Never pruned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedTasks {
    tasks: Vec<String>,
}

impl CompletedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: impl Into<String>) {
        self.tasks.push(task.into());
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tasks
    }

    /// The most recent `window` entries, or all of them when `window` is `None`
    pub fn recent(&self, window: Option<usize>) -> &[String] {
        match window {
            Some(n) if n < self.tasks.len() => &self.tasks[self.tasks.len() - n..],
            _ => &self.tasks,
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.tasks.truncate(len);
    }
}
