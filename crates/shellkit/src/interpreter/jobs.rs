//! Background job table
//!
//! Tracks pipelines released with `&`: their process ids (for `$!`) and
//! the tasks awaiting their exit statuses.

use std::collections::HashMap;

use tokio::task::JoinHandle;

/// A background job awaiting collection.
#[derive(Debug)]
pub struct Job {
    pub id: usize,
    pub pid: u32,
    pub status: JoinHandle<i32>,
}

/// Table of live background jobs.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<usize, Job>,
    next_id: usize,
    last_pid: Option<u32>,
}

impl JobTable {
    pub fn new() -> Self {
        Self { jobs: HashMap::new(), next_id: 1, last_pid: None }
    }

    /// Register a spawned job; returns its job id.
    pub fn register(&mut self, pid: u32, status: JoinHandle<i32>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.insert(id, Job { id, pid, status });
        self.last_pid = Some(pid);
        id
    }

    /// Process id of the most recently launched job (`$!`).
    pub fn last_pid(&self) -> Option<u32> {
        self.last_pid
    }

    /// Wait for one job; `None` when the id is unknown.
    pub async fn wait_for(&mut self, id: usize) -> Option<i32> {
        let job = self.jobs.remove(&id)?;
        Some(job.status.await.unwrap_or(1))
    }

    /// Wait for every job; returns the status of the last one collected.
    pub async fn wait_all(&mut self) -> i32 {
        let mut last_status = 0;
        for (_, job) in self.jobs.drain() {
            last_status = job.status.await.unwrap_or(1);
        }
        last_status
    }

    pub fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
