//! Process-wide job table.

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::JobError;
use crate::job::{Capacity, JobId, JobStatus, MergeJob};

/// Shared map from job id to job state.
///
/// Admission and insertion happen under one write lock, so concurrent
/// submissions can never push the processing count past `max_jobs`. Each job
/// leaves `Processing` exactly once; later transitions are ignored.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, MergeJob>>,
    finished: Notify,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            finished: Notify::new(),
            max_jobs,
        }
    }

    /// Create a new `Processing` job unless the ceiling is reached.
    pub fn try_admit(&self) -> Result<JobId, JobError> {
        let mut jobs = self.write();
        let active = count_processing(&jobs);
        if active >= self.max_jobs {
            return Err(JobError::CapacityExceeded {
                active,
                max: self.max_jobs,
            });
        }

        let id = Uuid::new_v4();
        jobs.insert(id, MergeJob::new(id));
        Ok(id)
    }

    pub fn get(&self, id: JobId) -> Option<MergeJob> {
        self.read().get(&id).cloned()
    }

    /// Snapshot of every job, in no particular order.
    pub fn list(&self) -> Vec<MergeJob> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> Capacity {
        Capacity {
            active_jobs: count_processing(&self.read()),
            max_jobs: self.max_jobs,
        }
    }

    pub fn append_log(&self, id: JobId, line: impl Into<String>) {
        if let Some(job) = self.write().get_mut(&id) {
            job.log.push(line.into());
        }
    }

    /// Mark a job done with its artifact. Returns false if it was already terminal.
    pub fn complete(&self, id: JobId, artifact: PathBuf) -> bool {
        self.finish(id, |job| {
            job.status = JobStatus::Done;
            job.result = Some(artifact);
        })
    }

    /// Mark a job failed. Returns false if it was already terminal.
    pub fn fail(&self, id: JobId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.finish(id, |job| {
            job.status = JobStatus::Error;
            job.message = Some(message);
        })
    }

    /// Artifact of a finished job. Repeatable until the job is evicted.
    pub fn result_path(&self, id: JobId) -> Result<PathBuf, JobError> {
        match self.read().get(&id) {
            None => Err(JobError::JobNotFound(id)),
            Some(job) => match (&job.status, &job.result) {
                (JobStatus::Done, Some(path)) => Ok(path.clone()),
                _ => Err(JobError::ResultNotReady(id)),
            },
        }
    }

    /// Wait until the job is terminal. Returns `None` for unknown ids.
    pub async fn wait(&self, id: JobId) -> Option<MergeJob> {
        loop {
            // Register before checking so a transition in between is not missed.
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.get(id) {
                None => return None,
                Some(job) if job.status.is_terminal() => return Some(job),
                Some(_) => {}
            }

            notified.await;
        }
    }

    /// Remove terminal jobs that finished at least `ttl` ago.
    ///
    /// Returns the evicted jobs so the caller can delete their artifacts.
    pub fn evict_expired(&self, ttl: Duration) -> Vec<MergeJob> {
        let now = Utc::now();
        let mut jobs = self.write();

        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| {
                job.finished_at
                    .and_then(|finished| (now - finished).to_std().ok())
                    .is_some_and(|age| age >= ttl)
            })
            .map(|job| job.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .collect()
    }

    fn finish(&self, id: JobId, apply: impl FnOnce(&mut MergeJob)) -> bool {
        let changed = {
            let mut jobs = self.write();
            match jobs.get_mut(&id) {
                Some(job) if !job.status.is_terminal() => {
                    apply(job);
                    job.finished_at = Some(Utc::now());
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.finished.notify_waiters();
        }
        changed
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, MergeJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, MergeJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn count_processing(jobs: &HashMap<JobId, MergeJob>) -> usize {
    jobs.values()
        .filter(|job| job.status == JobStatus::Processing)
        .count()
}
