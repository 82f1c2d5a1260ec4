//! # comic-fetch
//!
//! Bulk image downloader for web comics.
//!
//! ## Design Philosophy
//!
//! comic-fetch is designed to be:
//! - **Bounded** - A fixed number of fetches per batch are ever in flight
//! - **Isolated** - One image failing never affects its siblings
//! - **Deterministic** - File names depend only on episode, ordinal and extension
//! - **Library-first** - Site scraping plugs in through [`ComicSource`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use comic_fetch::{Batch, BatchLimits, Config, FetchPipeline, NoProgress};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let pipeline = FetchPipeline::new(&config)?;
//!
//!     let batch = Batch::from_urls(
//!         "episode_001",
//!         vec![
//!             Url::parse("https://cdn.example.com/1.jpg")?,
//!             Url::parse("https://cdn.example.com/2.png?x=1")?,
//!         ],
//!         Some(Url::parse("https://comics.example.com/title/1/1")?),
//!     );
//!
//!     let results = pipeline
//!         .run_batch(&batch, std::path::Path::new("comics/001"), BatchLimits::from(&config), &NoProgress)
//!         .await?;
//!     println!("{}", comic_fetch::ordered_file_names(&results).join(", "));
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Comic collection driver and page accessor seam
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Existing comic directories: manifest rebuild and renumbering
pub mod library;
/// Manifest records and JSON/XML output
pub mod manifest;
/// Deterministic file naming
pub mod naming;
/// Concurrent fetch-and-persist pipeline
pub mod pipeline;
/// Retry logic with backoff
pub mod retry;
/// Core types for batches and results
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use collector::{CollectionReport, Collector, ComicPage, ComicSource, EpisodeLink};
pub use config::{Backoff, CollectConfig, Config, FetchConfig, ImageFailurePolicy, RetryConfig};
pub use error::{Error, Result};
pub use library::{EpisodeRenumber, renumber_episodes, scan_comic};
pub use manifest::{ComicRecord, EpisodeRecord, Manifest};
pub use naming::Padding;
pub use pipeline::{
    BodyStream, FetchPipeline, HttpFetcher, LogProgress, NoProgress, ProgressObserver,
    ResourceFetcher,
};
pub use types::{
    Batch, BatchLimits, BatchSummary, DownloadOutcome, DownloadResult, DownloadTask, FailureKind,
    ordered_file_names,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal.
///
/// Spawns a task that waits for the signal; abort the returned handle to stop
/// listening.
///
/// - **Unix:** SIGTERM and SIGINT.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use comic_fetch::{Collector, Config, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let collector = Collector::new(Config::default())?;
///     let _signals = cancel_on_signal(collector.cancel_token());
///     Ok(())
/// }
/// ```
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Cancelling downloads");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register both signal handlers");
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_listener_exits_once_token_is_cancelled() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone());
        token.cancel();
        assert!(handle.await.is_ok());
    }
}
