//! Bulk fetch-and-persist pipeline.
//!
//! Split into focused submodules:
//! - [`fetcher`] - Resource fetcher trait and the shared HTTP client
//! - [`progress`] - Progress observer trait and stock observers
//!
//! [`FetchPipeline::run_batch`] drives one batch (one episode) through a
//! bounded `buffer_unordered` stream. Each task is retried on its own,
//! streams into `<name>.part` and is renamed into place only once the body
//! is complete, so a file under its final name is always whole.

mod fetcher;
mod progress;


pub use fetcher::{BodyStream, HttpFetcher, ResourceFetcher};
pub use progress::{LogProgress, NoProgress, ProgressObserver};

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::naming::{self, Padding};
use crate::retry::{IsRetryable, download_with_retry};
use crate::types::{
    Batch, BatchLimits, BatchSummary, DownloadOutcome, DownloadResult, DownloadTask, FailureKind,
};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Suffix of in-progress files
const PARTIAL_SUFFIX: &str = "part";

/// Concurrent, retrying downloader shared by every batch of a run
pub struct FetchPipeline {
    fetcher: Arc<dyn ResourceFetcher>,
    retry: RetryConfig,
    request_timeout: Duration,
    padding: Padding,
    cancel_token: CancellationToken,
}

impl FetchPipeline {
    /// Build a pipeline with the production HTTP fetcher
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Build a pipeline around any [`ResourceFetcher`]
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            retry: config.retry.clone(),
            request_timeout: config.fetch.request_timeout,
            padding: config.naming.padding,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token that stops the pipeline when cancelled
    ///
    /// After cancellation no new task is started and in-flight attempts are
    /// abandoned; both surface as [`FailureKind::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Ordinal padding used for file names
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Download every task of `batch` into `destination`
    ///
    /// Returns one [`DownloadResult`] per task in completion order. Only
    /// invalid input or an unusable destination directory fail the call
    /// itself; per-task problems are reported inside the results.
    pub async fn run_batch(
        &self,
        batch: &Batch,
        destination: &Path,
        limits: BatchLimits,
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<DownloadResult>> {
        limits.validate()?;
        batch.validate()?;
        prepare_destination(destination).await?;

        let total = batch.len();
        tracing::info!(
            label = %batch.label,
            total,
            concurrency = limits.concurrency_limit,
            max_retries = limits.max_retries,
            destination = %destination.display(),
            "Starting batch"
        );

        let mut results = Vec::with_capacity(total);
        let mut in_flight = stream::iter(&batch.tasks)
            .map(|task| self.run_task(&batch.label, task, destination, limits.max_retries))
            .buffer_unordered(limits.concurrency_limit);

        while let Some(result) = in_flight.next().await {
            results.push(result);
            progress.on_progress(results.len(), total);
        }

        let summary = BatchSummary::from_results(&results);
        if summary.is_complete() {
            tracing::info!(label = %batch.label, total, "Batch complete");
        } else {
            tracing::warn!(
                label = %batch.label,
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "Batch finished with failures"
            );
        }

        Ok(results)
    }

    /// Download a single resource to `path` (thumbnails and other one-offs)
    ///
    /// Uses the configured retry budget and the same write-then-rename
    /// discipline as batches. The parent directory is created if needed.
    pub async fn download_file(
        &self,
        url: &Url,
        referer: Option<&Url>,
        path: &Path,
    ) -> DownloadOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = prepare_destination(parent).await
        {
            return DownloadOutcome::Failure {
                last_error: e.to_string(),
                attempts_made: 0,
                kind: FailureKind::NonRetryable,
            };
        }

        self.persist(url, referer, path, file_name, self.retry.max_attempts)
            .await
    }

    async fn run_task(
        &self,
        label: &str,
        task: &DownloadTask,
        destination: &Path,
        max_attempts: u32,
    ) -> DownloadResult {
        let extension = naming::image_extension(&task.source_url);
        let file_name = naming::file_name(label, task.ordinal, self.padding, extension);
        let path = destination.join(&file_name);

        let outcome = self
            .persist(
                &task.source_url,
                task.referer.as_ref(),
                &path,
                file_name,
                max_attempts,
            )
            .await;

        if let DownloadOutcome::Failure {
            last_error,
            attempts_made,
            kind,
        } = &outcome
        {
            tracing::warn!(
                label,
                ordinal = task.ordinal,
                url = %task.source_url,
                error = %last_error,
                attempts = attempts_made,
                kind = ?kind,
                "Task failed"
            );
        }

        DownloadResult {
            ordinal: task.ordinal,
            outcome,
        }
    }

    /// Fetch with retry into `path`, abandoning on cancellation
    async fn persist(
        &self,
        url: &Url,
        referer: Option<&Url>,
        path: &Path,
        file_name: String,
        max_attempts: u32,
    ) -> DownloadOutcome {
        if self.cancel_token.is_cancelled() {
            return DownloadOutcome::Failure {
                last_error: Error::Cancelled.to_string(),
                attempts_made: 0,
                kind: FailureKind::Cancelled,
            };
        }

        let started = AtomicU32::new(0);
        let started_ref = &started;
        let retried = download_with_retry(&self.retry, max_attempts, move |attempt| {
            started_ref.store(attempt, Ordering::Relaxed);
            self.attempt(url, referer, path, attempt)
        });

        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => {
                remove_partial(&partial_path(path)).await;
                DownloadOutcome::Failure {
                    last_error: Error::Cancelled.to_string(),
                    attempts_made: started.load(Ordering::Relaxed),
                    kind: FailureKind::Cancelled,
                }
            }
            outcome = retried => match outcome.result {
                Ok(bytes) => {
                    tracing::debug!(
                        file = %file_name,
                        bytes,
                        attempts = outcome.attempts,
                        "Saved"
                    );
                    DownloadOutcome::Success {
                        local_file_name: file_name,
                        attempts: outcome.attempts,
                    }
                }
                Err(e) => {
                    let kind = if e.is_retryable() {
                        FailureKind::Exhausted
                    } else {
                        FailureKind::NonRetryable
                    };
                    DownloadOutcome::Failure {
                        last_error: e.to_string(),
                        attempts_made: outcome.attempts,
                        kind,
                    }
                }
            },
        }
    }

    /// One bounded-time attempt; returns bytes written
    async fn attempt(
        &self,
        url: &Url,
        referer: Option<&Url>,
        path: &Path,
        attempt: u32,
    ) -> Result<u64> {
        tracing::debug!(url = %url, attempt, "Fetching");

        match tokio::time::timeout(self.request_timeout, self.stream_to_file(url, referer, path))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                remove_partial(&partial_path(path)).await;
                Err(Error::Timeout {
                    url: url.to_string(),
                    seconds: self.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn stream_to_file(&self, url: &Url, referer: Option<&Url>, path: &Path) -> Result<u64> {
        let mut body = self.fetcher.open(url, referer).await?;
        let partial = partial_path(path);

        match write_body(body.as_mut(), &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, path)
                    .await
                    .map_err(|e| Error::filesystem(path, e))?;
                Ok(bytes)
            }
            Err(e) => {
                remove_partial(&partial).await;
                Err(e)
            }
        }
    }
}

async fn write_body(body: &mut dyn BodyStream, partial: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| Error::filesystem(partial, e))?;

    let mut written = 0u64;
    while let Some(chunk) = body.next_chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::filesystem(partial, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::filesystem(partial, e))?;

    Ok(written)
}

/// Create `dir` (and parents) and make sure it is a directory
async fn prepare_destination(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::Destination {
            path: dir.to_path_buf(),
            source,
        })?;

    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|source| Error::Destination {
            path: dir.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(Error::Destination {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %partial.display(), error = %e, "Could not remove partial file");
        }
    }
}
