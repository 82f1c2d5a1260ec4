//! Comic collection driver
//!
//! Walks comic pages through a [`ComicSource`], downloads each episode as one
//! batch and assembles the [`Manifest`]. Page-level failures are recorded and
//! skipped; nothing below the comic level stops the run.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::manifest::{self, ComicRecord, EpisodeMeta, EpisodeRecord, Manifest};
use crate::naming;
use crate::pipeline::{FetchPipeline, LogProgress};
use crate::types::{Batch, BatchLimits, DownloadOutcome};
use crate::utils::{sanitize_filename, split_genres_and_tags};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Comic page contents as read by a [`ComicSource`]
#[derive(Clone, Debug, Default)]
pub struct ComicPage {
    /// Title as shown on the page
    pub title: String,
    /// Synopsis
    pub description: Option<String>,
    /// Cover image
    pub thumbnail_url: Option<Url>,
    /// Smaller preview image
    pub preview_thumbnail_url: Option<Url>,
    /// Background artwork
    pub background_url: Option<Url>,
    /// Genre and `#tag` labels, mixed
    pub genres: Vec<String>,
    /// Episodes in reading order
    pub episodes: Vec<EpisodeLink>,
}

/// One episode entry on a comic page
#[derive(Clone, Debug)]
pub struct EpisodeLink {
    /// Episode page
    pub url: Url,
    /// Label as shown by the source (e.g. `Chapter 12`)
    pub label: String,
    /// Source reports the episode as locked
    pub is_locked: bool,
    /// Publication date text
    pub date: Option<String>,
    /// Episode thumbnail
    pub thumbnail_url: Option<Url>,
}

/// Site-specific page accessor
///
/// Implementations only read pages; all downloading goes through the
/// pipeline.
#[async_trait]
pub trait ComicSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Referer for requests that have no page of their own (comic thumbnails)
    fn default_referer(&self) -> Option<Url> {
        None
    }

    /// Read a comic page
    async fn comic(&self, url: &Url) -> Result<ComicPage>;

    /// Image URLs of an episode in page order
    async fn episode_images(&self, episode: &EpisodeLink) -> Result<Vec<Url>>;
}

/// Everything produced by one [`Collector::collect`] run
#[derive(Clone, Debug, Default)]
pub struct CollectionReport {
    /// Comics that were collected
    pub manifest: Manifest,
    /// Comic URLs that could not be collected (including those skipped on interrupt)
    pub failed_comics: Vec<String>,
    /// Cancellation stopped the run early
    pub interrupted: bool,
}

/// Drives comic collection on top of a [`FetchPipeline`]
pub struct Collector {
    pipeline: FetchPipeline,
    config: Config,
}

impl Collector {
    /// Build a collector with the production HTTP pipeline
    pub fn new(config: Config) -> Result<Self> {
        let pipeline = FetchPipeline::new(&config)?;
        Ok(Self { pipeline, config })
    }

    /// Build a collector around an existing pipeline
    pub fn with_pipeline(config: Config, pipeline: FetchPipeline) -> Self {
        Self { pipeline, config }
    }

    /// Cancellation token shared with the pipeline
    pub fn cancel_token(&self) -> CancellationToken {
        self.pipeline.cancel_token()
    }

    /// Collect every comic in `urls`, in order
    pub async fn collect(&self, source: &dyn ComicSource, urls: &[Url]) -> CollectionReport {
        let cancel_token = self.pipeline.cancel_token();
        let mut report = CollectionReport::default();

        for (index, url) in urls.iter().enumerate() {
            if cancel_token.is_cancelled() {
                tracing::warn!(
                    source = source.name(),
                    remaining = urls.len() - index,
                    "Interrupted, remaining comics recorded as failed"
                );
                report
                    .failed_comics
                    .extend(urls[index..].iter().map(Url::to_string));
                report.interrupted = true;
                break;
            }

            match self.collect_comic(source, url).await {
                Ok(comic) => report.manifest.comics.push(comic),
                Err(Error::Cancelled) => {
                    report.failed_comics.push(url.to_string());
                }
                Err(e) => {
                    tracing::error!(
                        source = source.name(),
                        url = %url,
                        error = %e,
                        error_code = e.error_code(),
                        "Failed to collect comic"
                    );
                    report.failed_comics.push(url.to_string());
                }
            }
        }

        if cancel_token.is_cancelled() {
            report.interrupted = true;
        }

        tracing::info!(
            source = source.name(),
            collected = report.manifest.comics.len(),
            failed = report.failed_comics.len(),
            interrupted = report.interrupted,
            "Collection finished"
        );
        report
    }

    /// Collect one comic: thumbnails, then every eligible episode
    ///
    /// Fails when the page cannot be read, lists no episodes, or cancellation
    /// arrives before the last episode.
    pub async fn collect_comic(&self, source: &dyn ComicSource, url: &Url) -> Result<ComicRecord> {
        let page = source.comic(url).await?;
        if page.episodes.is_empty() {
            return Err(Error::Page {
                url: url.to_string(),
                message: "no episodes listed".to_string(),
            });
        }

        let title = sanitize_filename(&page.title);
        let comic_dir = self.config.collect.output_dir.join(&title);
        tracing::info!(
            source = source.name(),
            title = %title,
            episodes = page.episodes.len(),
            "Collecting comic"
        );

        let referer = source.default_referer();
        let thumbnail = self
            .save_optional(page.thumbnail_url.as_ref(), referer.as_ref(), &comic_dir, "thumbnail")
            .await;
        let preview_thumbnail = self
            .save_optional(
                page.preview_thumbnail_url.as_ref(),
                referer.as_ref(),
                &comic_dir,
                "preview-thumbnail",
            )
            .await;
        let thumbnail_background = self
            .save_optional(
                page.background_url.as_ref(),
                referer.as_ref(),
                &comic_dir,
                "thumbnail_background",
            )
            .await;

        let mut episodes = Vec::new();
        for (number, link) in (1u32..).zip(&page.episodes) {
            if number < self.config.collect.start_episode {
                continue;
            }
            if self.pipeline.cancel_token().is_cancelled() {
                return Err(Error::Cancelled);
            }
            if link.is_locked && self.config.collect.skip_locked {
                tracing::info!(title = %title, episode = number, "Skipping locked episode");
                continue;
            }
            if let Some(episode) = self
                .collect_episode(source, &comic_dir, &title, number, link)
                .await
            {
                episodes.push(episode);
            }
        }

        if self.pipeline.cancel_token().is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (genres, tags) = split_genres_and_tags(&page.genres);
        Ok(ComicRecord {
            title,
            original_title: page.title,
            description: page.description.unwrap_or_default(),
            thumbnail,
            preview_thumbnail,
            thumbnail_background,
            genres,
            tags,
            episodes,
            source: url.to_string(),
        })
    }

    /// Download one episode; `None` when it is left out of the manifest
    async fn collect_episode(
        &self,
        source: &dyn ComicSource,
        comic_dir: &Path,
        title: &str,
        number: u32,
        link: &EpisodeLink,
    ) -> Option<EpisodeRecord> {
        let padding = self.pipeline.padding();
        let images = match source.episode_images(link).await {
            Ok(images) if !images.is_empty() => images,
            Ok(_) => {
                tracing::warn!(title, episode = number, url = %link.url, "Episode has no images");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    title,
                    episode = number,
                    url = %link.url,
                    error = %e,
                    "Failed to read episode page"
                );
                return None;
            }
        };

        let episode_dir = comic_dir.join(naming::episode_folder(number, padding));
        let thumbnail = match &link.thumbnail_url {
            Some(url) => {
                let name = self
                    .save_optional(Some(url), Some(&link.url), &episode_dir, "thumbnail")
                    .await;
                (!name.is_empty()).then_some(name)
            }
            None => None,
        };

        let label = naming::episode_label(number, padding);
        let batch = Batch::from_urls(label.as_str(), images, Some(link.url.clone()));
        let results = match self
            .pipeline
            .run_batch(
                &batch,
                &episode_dir,
                BatchLimits::from(&self.config),
                &LogProgress::new(label.as_str()),
            )
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(title, episode = number, error = %e, "Episode batch rejected");
                return None;
            }
        };

        let meta = EpisodeMeta {
            number,
            parent_title: title.to_string(),
            label: link.label.clone(),
            source: link.url.to_string(),
            date: link.date.clone().unwrap_or_default(),
            thumbnail,
            is_locked: link.is_locked,
        };
        match manifest::assemble_episode(meta, &results, self.config.collect.on_image_failure, padding)
        {
            Ok(record) => Some(record),
            Err(rejected) => {
                tracing::warn!(
                    title,
                    episode = number,
                    missing = ?rejected.missing,
                    "Episode left out of manifest"
                );
                None
            }
        }
    }

    /// Save an optional image as `<stem>.<ext>` in `dir`; empty name when absent or failed
    async fn save_optional(
        &self,
        url: Option<&Url>,
        referer: Option<&Url>,
        dir: &Path,
        stem: &str,
    ) -> String {
        let Some(url) = url else {
            return String::new();
        };
        let name = naming::thumbnail_name(stem, url);
        match self.pipeline.download_file(url, referer, &dir.join(&name)).await {
            DownloadOutcome::Success { .. } => name,
            DownloadOutcome::Failure { last_error, .. } => {
                tracing::warn!(url = %url, error = %last_error, "Failed to save {stem}");
                String::new()
            }
        }
    }

    /// Paths of the manifest and failed-list files for this configuration
    pub fn report_paths(&self) -> (PathBuf, PathBuf) {
        let dir = &self.config.collect.output_dir;
        let name = &self.config.collect.manifest_name;
        (
            dir.join(format!("{name}.json")),
            dir.join(format!("failed_{name}.json")),
        )
    }

    /// Write the manifest and the failed-comic list into the output directory
    ///
    /// With `write_xml` set the manifest is also written as `<manifest_name>.xml`.
    pub async fn write_report(&self, report: &CollectionReport) -> Result<()> {
        let (manifest_path, failed_path) = self.report_paths();
        report.manifest.write_json(&manifest_path).await?;
        if self.config.collect.write_xml {
            report
                .manifest
                .write_xml(&manifest_path.with_extension("xml"))
                .await?;
        }
        manifest::write_failed_list(&failed_path, &report.failed_comics).await?;
        tracing::info!(
            manifest = %manifest_path.display(),
            failed = %failed_path.display(),
            "Report written"
        );
        Ok(())
    }
}
