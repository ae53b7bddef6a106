pub mod csv;
pub mod pdf;
pub mod pdf_font;
pub mod text;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::error::{JobError, JobResult};
use crate::progress::ProgressSender;
use crate::state::AppState;
use crate::storage::StoredUpload;
use crate::translate::Translator;

/// Observable state of one file's translation job.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed { download_filename: String },
    Failed { message: String },
}

pub struct JobEntry {
    pub status: JobStatus,
    pub abort: Option<AbortHandle>,
}

impl JobEntry {
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}

/// Everything a job needs, captured at spawn time. Jobs never read
/// process-wide globals; tests construct this over temporary directories.
pub struct JobContext {
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub max_chunk_chars: usize,
    pub font_path: PathBuf,
    pub translator: Arc<dyn Translator>,
    pub provider_lock: Arc<Mutex<()>>,
    pub progress: ProgressSender,
}

impl JobContext {
    pub fn from_state(state: &AppState, file_id: &str, target_lang: &str) -> Self {
        let system = &state.config.system_config;
        Self {
            upload_dir: PathBuf::from(&system.upload_dir),
            processed_dir: PathBuf::from(&system.processed_dir),
            max_chunk_chars: system.max_chunk_chars,
            font_path: PathBuf::from(state.config.language_config.font_path(target_lang)),
            translator: state.translator.clone(),
            provider_lock: state.provider_lock.clone(),
            progress: ProgressSender::new(state.progress_tx.clone(), file_id.to_string()),
        }
    }

    /// One provider call under the advisory lock. The lock bounds provider
    /// concurrency across jobs; everything else in a job runs unserialized.
    pub async fn translate(&self, text: &str, target: &str) -> JobResult<String> {
        let _guard = self.provider_lock.lock().await;
        self.translator.translate(text, None, target).await
    }

    /// Intermediate chunk file for the generic text pipeline.
    pub fn part_path(&self, file_id: &str, index: usize) -> PathBuf {
        self.upload_dir.join(format!("{file_id}_part{index}.txt"))
    }
}

/// Register and spawn one file's translation job. The entry is inserted
/// before the task starts so a duplicate submission can never race past the
/// guard in `start_translation`.
pub fn spawn(state: &AppState, upload: StoredUpload, target_lang: String) {
    let file_id = upload.id.clone();
    state.jobs.insert(
        file_id.clone(),
        JobEntry {
            status: JobStatus::Running,
            abort: None,
        },
    );

    let task_state = state.clone();
    let handle = tokio::spawn(run_job(task_state, upload, target_lang));
    if let Some(mut entry) = state.jobs.get_mut(&file_id) {
        entry.abort = Some(handle.abort_handle());
    }
}

/// Per-file lifecycle: dispatch, then cleanup, then the terminal event.
/// Cleanup runs on every path so no intermediate files survive the job,
/// and the terminal event is always the last one emitted for the file.
pub async fn run_job(state: AppState, upload: StoredUpload, target_lang: String) {
    let ctx = JobContext::from_state(&state, &upload.id, &target_lang);
    info!(
        file_id = %upload.id,
        name = %upload.display_name,
        lang = %target_lang,
        "translation job started"
    );

    let result = dispatch(&ctx, &upload, &target_lang).await;
    cleanup(&ctx, &upload).await;

    match result {
        Ok(filename) => {
            info!(file_id = %upload.id, artifact = %filename, "translation job completed");
            set_status(
                &state,
                &upload.id,
                JobStatus::Completed {
                    download_filename: filename.clone(),
                },
            );
            ctx.progress.completed(filename);
        }
        Err(e) => {
            error!(file_id = %upload.id, error = %e, "translation job failed");
            let message = e.to_string();
            set_status(
                &state,
                &upload.id,
                JobStatus::Failed {
                    message: message.clone(),
                },
            );
            ctx.progress.failed(message);
        }
    }
}

fn set_status(state: &AppState, file_id: &str, status: JobStatus) {
    if let Some(mut entry) = state.jobs.get_mut(file_id) {
        entry.status = status;
        return;
    }
    state.jobs.insert(
        file_id.to_string(),
        JobEntry {
            status,
            abort: None,
        },
    );
}

/// Select the pipeline for the file's format. Plain-text and subtitle files
/// share the generic chunk pipeline; CSV and PDF have dedicated composers.
pub async fn dispatch(
    ctx: &JobContext,
    upload: &StoredUpload,
    target_lang: &str,
) -> JobResult<String> {
    match upload.extension.as_str() {
        "txt" | "srt" => text::run(ctx, upload, target_lang).await,
        "csv" => csv::run(ctx, upload, target_lang).await,
        "pdf" => pdf::run(ctx, upload, target_lang).await,
        other => Err(JobError::UnsupportedType(other.to_string())),
    }
}

/// Remove the original upload and any intermediate part files. Failures are
/// logged and swallowed; cleanup must never turn a finished job into a
/// crashed one.
async fn cleanup(ctx: &JobContext, upload: &StoredUpload) {
    if let Err(e) = tokio::fs::remove_file(&upload.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(file_id = %upload.id, error = %e, "failed to remove upload");
        }
    }
    remove_part_files(&ctx.upload_dir, &upload.id).await;
}

async fn remove_part_files(dir: &Path, file_id: &str) {
    let prefix = format!("{file_id}_part");
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!(file_id, part = %name, error = %e, "failed to remove part file");
            }
        }
    }
}
