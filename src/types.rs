//! Core types for batch downloads

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// One resource to fetch within a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    /// Remote resource (absolute http/https URL)
    pub source_url: Url,
    /// 1-based position within the batch
    pub ordinal: u32,
    /// Sent as the `Referer` header when present
    pub referer: Option<Url>,
}

impl DownloadTask {
    /// Parse and validate a task from raw strings
    pub fn new(source_url: &str, ordinal: u32, referer: Option<&str>) -> Result<Self> {
        Ok(Self {
            source_url: parse_http_url(source_url)?,
            ordinal,
            referer: referer.map(parse_http_url).transpose()?,
        })
    }
}

/// Parse an absolute http(s) URL
///
/// Protocol-relative input (`//cdn.example.com/a.jpg`) is promoted to https,
/// which is how comic sites commonly emit image `src` attributes.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let candidate = match trimmed.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    };
    let url = Url::parse(&candidate).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

/// A set of tasks sharing one label and destination (one episode)
#[derive(Clone, Debug)]
pub struct Batch {
    /// Name prefix for every file of the batch (e.g. `episode_007`)
    pub label: String,
    /// Tasks in submission order
    pub tasks: Vec<DownloadTask>,
}

impl Batch {
    /// Build a batch from URLs in page order, assigning ordinals 1..=N
    pub fn from_urls(
        label: impl Into<String>,
        urls: impl IntoIterator<Item = Url>,
        referer: Option<Url>,
    ) -> Self {
        let tasks = urls
            .into_iter()
            .zip(1u32..)
            .map(|(source_url, ordinal)| DownloadTask {
                source_url,
                ordinal,
                referer: referer.clone(),
            })
            .collect();
        Self {
            label: label.into(),
            tasks,
        }
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the batch has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that ordinals are unique and cover exactly 1..=N
    pub fn validate(&self) -> Result<()> {
        if self.label.is_empty() || self.label.contains(['/', '\\']) {
            return Err(Error::InvalidBatch(format!(
                "label '{}' is not a usable file name prefix",
                self.label
            )));
        }

        let n = self.tasks.len();
        let mut seen = HashSet::with_capacity(n);
        for task in &self.tasks {
            if task.ordinal == 0 || task.ordinal as usize > n {
                return Err(Error::InvalidBatch(format!(
                    "ordinal {} outside 1..={n}",
                    task.ordinal
                )));
            }
            if !seen.insert(task.ordinal) {
                return Err(Error::InvalidBatch(format!(
                    "duplicate ordinal {}",
                    task.ordinal
                )));
            }
        }
        Ok(())
    }
}

/// Per-call tuning for [`run_batch`](crate::pipeline::FetchPipeline::run_batch)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum fetches in flight at once
    pub concurrency_limit: usize,
    /// Total attempts per task
    pub max_retries: u32,
}

impl BatchLimits {
    /// Reject zero limits
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "concurrency_limit must be at least 1",
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::config("max_retries", "max_retries must be at least 1"));
        }
        Ok(())
    }
}

impl From<&crate::config::Config> for BatchLimits {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            concurrency_limit: config.fetch.concurrency_limit,
            max_retries: config.retry.max_attempts,
        }
    }
}

/// Why a task ended without a file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt failed with a retryable error
    Exhausted,
    /// An error that retrying cannot fix (local filesystem, invalid request)
    NonRetryable,
    /// Abandoned or never started because cancellation was requested
    Cancelled,
}

/// Outcome of one task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// File saved under `local_file_name` in the destination directory
    Success {
        /// File name relative to the destination directory
        local_file_name: String,
        /// Attempts used, the successful one included
        attempts: u32,
    },
    /// No file was saved
    Failure {
        /// Display form of the last error observed
        last_error: String,
        /// Attempts started before giving up
        attempts_made: u32,
        /// Failure classification
        kind: FailureKind,
    },
}

/// Result for one task, tagged with its ordinal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Ordinal of the originating task
    pub ordinal: u32,
    /// What happened
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    /// True for [`DownloadOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Success { .. })
    }

    /// Saved file name, if any
    pub fn local_file_name(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Success {
                local_file_name, ..
            } => Some(local_file_name),
            DownloadOutcome::Failure { .. } => None,
        }
    }

    /// Attempts used by the task
    pub fn attempts(&self) -> u32 {
        match self.outcome {
            DownloadOutcome::Success { attempts, .. } => attempts,
            DownloadOutcome::Failure { attempts_made, .. } => attempts_made,
        }
    }
}

/// Sort results by ordinal and return the saved file names in that order
///
/// Failed tasks are skipped, so the list is shorter than the batch when
/// anything failed.
pub fn ordered_file_names(results: &[DownloadResult]) -> Vec<String> {
    let mut successes: Vec<_> = results
        .iter()
        .filter_map(|r| r.local_file_name().map(|name| (r.ordinal, name)))
        .collect();
    successes.sort_by_key(|(ordinal, _)| *ordinal);
    successes
        .into_iter()
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Aggregate counts over one batch's results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Tasks submitted
    pub total: usize,
    /// Tasks that saved a file
    pub succeeded: usize,
    /// Tasks that failed after using their retries or on a non-retryable error
    pub failed: usize,
    /// Tasks abandoned by cancellation
    pub cancelled: usize,
}

impl BatchSummary {
    /// Count outcomes
    pub fn from_results(results: &[DownloadResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Self::default()
            },
            |mut summary, result| {
                match &result.outcome {
                    DownloadOutcome::Success { .. } => summary.succeeded += 1,
                    DownloadOutcome::Failure {
                        kind: FailureKind::Cancelled,
                        ..
                    } => summary.cancelled += 1,
                    DownloadOutcome::Failure { .. } => summary.failed += 1,
                }
                summary
            },
        )
    }

    /// True when every task saved a file
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}
