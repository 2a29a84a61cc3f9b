//! Background merge execution.
//!
//! One executor runs per accepted job. The CPU-bound merge happens on the
//! blocking pool; the async side only records the terminal state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfmerge_core::{FileKind, FileOptions, MergeBuilder};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::job::JobId;
use crate::store::JobStore;

/// One persisted input of a merge job.
#[derive(Debug, Clone)]
pub struct FileTask {
    /// Name as uploaded; used for kind detection and log lines.
    pub file_name: String,
    pub kind: FileKind,
    /// Transient copy, deleted once the job finishes.
    pub path: PathBuf,
    pub options: FileOptions,
}

/// Deletes transient input copies when dropped, including during unwinding.
pub(crate) struct TransientFiles {
    paths: Vec<PathBuf>,
}

impl TransientFiles {
    pub(crate) fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Drop for TransientFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "Failed to remove transient upload: {}", e);
                }
            }
        }
    }
}

pub(crate) struct MergeExecutor {
    store: Arc<JobStore>,
    merged_dir: PathBuf,
}

impl MergeExecutor {
    pub(crate) fn new(store: Arc<JobStore>, merged_dir: PathBuf) -> Self {
        Self { store, merged_dir }
    }

    /// Merge `tasks` in order and record the outcome on the job.
    pub(crate) async fn run(self, job_id: JobId, tasks: Vec<FileTask>) {
        let cleanup = TransientFiles::new(tasks.iter().map(|t| t.path.clone()).collect());
        let store = Arc::clone(&self.store);
        let merged_dir = self.merged_dir.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let _cleanup = cleanup;
            merge_files(&store, job_id, &tasks, &merged_dir)
        })
        .await
        .unwrap_or_else(|e| Err(JobError::TaskFailed(describe_join_error(e))));

        match outcome {
            Ok(artifact) => {
                info!(%job_id, artifact = %artifact.display(), "Merge job finished");
                self.store.complete(job_id, artifact);
            }
            Err(e) => {
                let message = e.to_string();
                error!(%job_id, "Merge job failed: {}", message);
                self.store.append_log(job_id, format!("Error: {}", message));
                self.store.fail(job_id, message);
            }
        }
    }
}

fn merge_files(
    store: &JobStore,
    job_id: JobId,
    tasks: &[FileTask],
    merged_dir: &Path,
) -> Result<PathBuf, JobError> {
    let mut builder = MergeBuilder::new();

    for task in tasks {
        if task.kind == FileKind::Unsupported {
            warn!(%job_id, file = %task.file_name, "Skipping unsupported file");
            store.append_log(job_id, format!("Skipped unsupported file: {}", task.file_name));
            continue;
        }

        store.append_log(job_id, format!("Merging: {}", task.file_name));
        let bytes = fs::read(&task.path)?;

        let added = if task.kind == FileKind::Pdf {
            let selection = task.options.page_selection()?;
            builder.append_pdf(&bytes, &selection, task.options.password_or_empty())?
        } else {
            builder.append_image(&bytes, task.options.orientation)?
        };
        debug!(%job_id, file = %task.file_name, pages = added, "Appended pages");
    }

    let page_count = builder.page_count();
    let output = builder.finish()?;
    let artifact = write_artifact(merged_dir, &output)?;

    let artifact_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    store.append_log(
        job_id,
        format!("Merged {} page(s) into {}", page_count, artifact_name),
    );

    Ok(artifact)
}

/// Write the merged bytes to a fresh `merged_<uuid>.pdf`.
///
/// Goes through a temporary file and a rename so readers never see a
/// partially written artifact.
fn write_artifact(merged_dir: &Path, bytes: &[u8]) -> Result<PathBuf, JobError> {
    let name = format!("merged_{}.pdf", Uuid::new_v4().simple());
    let final_path = merged_dir.join(&name);
    let tmp_path = merged_dir.join(format!(".{}.tmp", name));

    let written = fs::write(&tmp_path, bytes).and_then(|_| fs::rename(&tmp_path, &final_path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(final_path)
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }

    let payload = e.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}
