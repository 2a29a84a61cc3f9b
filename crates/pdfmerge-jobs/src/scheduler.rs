//! Admission control and dispatch for merge jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pdfmerge_core::{FileKind, FileOptions};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::executor::{FileTask, MergeExecutor};
use crate::job::{Capacity, JobId, MergeJob};
use crate::store::JobStore;

/// Settings shared by every job.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Where transient input copies are written.
    pub upload_dir: PathBuf,
    /// Where merged artifacts are written.
    pub merged_dir: PathBuf,
    /// Admission ceiling for concurrently processing jobs.
    pub max_jobs: usize,
    /// How long finished jobs and their artifacts are kept. Zero keeps them forever.
    pub result_ttl: Duration,
}

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub options: FileOptions,
}

/// Accepts merge submissions and answers status and result queries.
pub struct JobScheduler {
    store: Arc<JobStore>,
    config: JobsConfig,
}

impl JobScheduler {
    pub fn new(config: JobsConfig) -> Self {
        Self {
            store: Arc::new(JobStore::new(config.max_jobs)),
            config,
        }
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Admit a job, persist its uploads and start merging in the background.
    ///
    /// Returns as soon as the job is running. A rejected submission leaves
    /// no job record behind. If persisting the uploads fails, the job is
    /// recorded as failed and the error is returned.
    pub async fn submit(&self, uploads: Vec<Upload>) -> Result<JobId, JobError> {
        if uploads.is_empty() {
            return Err(JobError::NoFiles);
        }

        let job_id = self.store.try_admit().inspect_err(|e| {
            warn!("Rejected merge submission: {}", e);
        })?;

        let tasks = match persist_uploads(&self.config.upload_dir, uploads).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(%job_id, "Failed to save uploads: {}", e);
                self.store.fail(job_id, format!("Failed to save uploads: {}", e));
                return Err(e);
            }
        };

        info!(%job_id, files = tasks.len(), "Merge job accepted");

        let executor = MergeExecutor::new(Arc::clone(&self.store), self.config.merged_dir.clone());
        tokio::spawn(executor.run(job_id, tasks));

        Ok(job_id)
    }

    pub fn status(&self, job_id: JobId) -> Result<MergeJob, JobError> {
        self.store
            .get(job_id)
            .ok_or(JobError::JobNotFound(job_id))
    }

    /// Path of the merged artifact. Fails unless the job is done.
    pub fn take_result(&self, job_id: JobId) -> Result<PathBuf, JobError> {
        self.store.result_path(job_id)
    }

    pub fn capacity(&self) -> Capacity {
        self.store.capacity()
    }

    /// Wait for a job to reach a terminal state.
    pub async fn wait(&self, job_id: JobId) -> Option<MergeJob> {
        self.store.wait(job_id).await
    }

    /// Evict expired jobs and delete their artifacts. Returns the eviction count.
    pub async fn sweep_expired(&self) -> usize {
        if self.config.result_ttl.is_zero() {
            return 0;
        }

        let evicted = self.store.evict_expired(self.config.result_ttl);
        for job in &evicted {
            if let Some(artifact) = &job.result {
                if let Err(e) = tokio::fs::remove_file(artifact).await {
                    warn!(job_id = %job.id, "Failed to delete expired artifact: {}", e);
                }
            }
        }

        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted expired merge jobs");
        }
        evicted.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `every`.
    ///
    /// Returns `None` when retention is unlimited.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if self.config.result_ttl.is_zero() {
            return None;
        }

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                scheduler.sweep_expired().await;
            }
        }))
    }
}

/// Write each upload to `<upload_dir>/<uuid><ext>`.
///
/// On failure, copies already written are removed before returning.
async fn persist_uploads(upload_dir: &Path, uploads: Vec<Upload>) -> Result<Vec<FileTask>, JobError> {
    let mut tasks: Vec<FileTask> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let path = upload_dir.join(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            extension_of(&upload.file_name)
        ));

        if let Err(e) = tokio::fs::write(&path, &upload.bytes).await {
            for task in &tasks {
                let _ = tokio::fs::remove_file(&task.path).await;
            }
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        tasks.push(FileTask {
            kind: FileKind::detect(&upload.file_name, upload.content_type.as_deref()),
            file_name: upload.file_name,
            path,
            options: upload.options,
        });
    }

    Ok(tasks)
}

/// Lowercased extension including the dot, or empty.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
