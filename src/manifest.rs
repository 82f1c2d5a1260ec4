//! Manifest records and assembly
//!
//! The manifest is a JSON array of comics, each with its ordered episodes.
//! Field names are camelCase to stay compatible with existing consumers,
//! including the historical `slag` spelling of the episode slug. The same tree
//! can be written as XML, where every list entry is an `<item>` element.

use crate::config::ImageFailurePolicy;
use crate::error::Result;
use crate::naming::Padding;
use crate::types::{DownloadOutcome, DownloadResult, ordered_file_names};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One comic and everything downloaded for it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicRecord {
    /// Sanitized title, also the comic's directory name
    pub title: String,
    /// Title as scraped
    pub original_title: String,
    /// Synopsis, empty when the page has none
    pub description: String,
    /// Local cover file name, empty when absent
    pub thumbnail: String,
    /// Local preview image file name, empty when absent
    pub preview_thumbnail: String,
    /// Local background image file name, empty when absent
    pub thumbnail_background: String,
    /// Genre labels
    pub genres: Vec<String>,
    /// `#`-prefixed tag labels
    pub tags: Vec<String>,
    /// Episodes in reading order
    pub episodes: Vec<EpisodeRecord>,
    /// Comic page URL
    pub source: String,
}

/// One episode's manifest entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    /// Whether the source marked the episode as locked
    pub is_locked: bool,
    /// Title of the owning comic
    pub parent_title: String,
    /// `episode <number>`
    pub title: String,
    /// Publication date as shown by the source, may be empty
    pub date: String,
    /// Local thumbnail file name (falls back to the first image)
    pub thumbnail: String,
    /// `episode-<number>`
    pub slag: String,
    /// Saved image file names, sorted by ordinal
    pub images: Vec<String>,
    /// Episode page URL
    pub source: String,
    /// Episode label as shown by the source
    pub label: String,
}

/// Episode facts known before its images are downloaded
#[derive(Clone, Debug, Default)]
pub struct EpisodeMeta {
    /// 1-based episode number within the comic
    pub number: u32,
    /// Owning comic's title
    pub parent_title: String,
    /// Label as shown by the source
    pub label: String,
    /// Episode page URL
    pub source: String,
    /// Publication date, may be empty
    pub date: String,
    /// Local thumbnail file name if one was saved
    pub thumbnail: Option<String>,
    /// Locked flag from the source
    pub is_locked: bool,
}

/// Why an episode was kept out of the manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpisodeRejected {
    /// Ordinals of the images that failed
    pub missing: Vec<u32>,
}

/// Build an episode entry from the batch results
///
/// With [`ImageFailurePolicy::Drop`] failed images are left out and the entry
/// is always produced. With [`ImageFailurePolicy::FailEpisode`] a single
/// failure rejects the whole episode.
pub fn assemble_episode(
    meta: EpisodeMeta,
    results: &[DownloadResult],
    policy: ImageFailurePolicy,
    padding: Padding,
) -> std::result::Result<EpisodeRecord, EpisodeRejected> {
    let mut missing: Vec<u32> = results
        .iter()
        .filter(|r| matches!(r.outcome, DownloadOutcome::Failure { .. }))
        .map(|r| r.ordinal)
        .collect();
    missing.sort_unstable();

    if !missing.is_empty() {
        match policy {
            ImageFailurePolicy::FailEpisode => return Err(EpisodeRejected { missing }),
            ImageFailurePolicy::Drop => {
                tracing::warn!(
                    episode = meta.number,
                    missing = ?missing,
                    "Dropping failed images from episode"
                );
            }
        }
    }

    let images = ordered_file_names(results);
    let number = padding.format(meta.number);
    let thumbnail = meta
        .thumbnail
        .or_else(|| images.first().cloned())
        .unwrap_or_default();

    Ok(EpisodeRecord {
        is_locked: meta.is_locked,
        parent_title: meta.parent_title,
        title: format!("episode {number}"),
        date: meta.date,
        thumbnail,
        slag: format!("episode-{number}"),
        images,
        source: meta.source,
        label: meta.label,
    })
}

/// All comics collected in one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    /// Comics in the order they were requested
    pub comics: Vec<ComicRecord>,
}

impl Manifest {
    /// Pretty-printed JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the manifest as pretty-printed JSON, creating parent directories
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty(path, self).await
    }

    /// XML form: a root `<item>` holding one `<item>` per comic
    ///
    /// Lists (genres, tags, episodes, images) nest their entries as `<item>`
    /// children of an element named after the field.
    pub fn to_xml(&self) -> Result<String> {
        let root = XmlRoot {
            item: self.comics.iter().map(XmlComic::from).collect(),
        };

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        root.serialize(serializer)?;
        xml.push('\n');
        Ok(xml)
    }

    /// Write the XML form, creating parent directories
    pub async fn write_xml(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        create_parent(path).await?;
        tokio::fs::write(path, xml).await?;
        Ok(())
    }

    /// Read a manifest previously written by [`Manifest::write_json`]
    pub async fn read_json(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Write the list of comic URLs that could not be collected
pub async fn write_failed_list(path: &Path, failed: &[String]) -> Result<()> {
    write_pretty(path, &failed).await
}

async fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    create_parent(path).await?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

// Borrowed views giving the XML tree its `<item>` list entries

#[derive(Serialize)]
#[serde(rename = "item")]
struct XmlRoot<'a> {
    item: Vec<XmlComic<'a>>,
}

#[derive(Serialize)]
struct Items<T> {
    item: Vec<T>,
}

impl<'a> Items<&'a str> {
    fn of(values: &'a [String]) -> Self {
        Self {
            item: values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct XmlComic<'a> {
    title: &'a str,
    original_title: &'a str,
    description: &'a str,
    thumbnail: &'a str,
    preview_thumbnail: &'a str,
    thumbnail_background: &'a str,
    genres: Items<&'a str>,
    tags: Items<&'a str>,
    episodes: Items<XmlEpisode<'a>>,
    source: &'a str,
}

impl<'a> From<&'a ComicRecord> for XmlComic<'a> {
    fn from(comic: &'a ComicRecord) -> Self {
        Self {
            title: &comic.title,
            original_title: &comic.original_title,
            description: &comic.description,
            thumbnail: &comic.thumbnail,
            preview_thumbnail: &comic.preview_thumbnail,
            thumbnail_background: &comic.thumbnail_background,
            genres: Items::of(&comic.genres),
            tags: Items::of(&comic.tags),
            episodes: Items {
                item: comic.episodes.iter().map(XmlEpisode::from).collect(),
            },
            source: &comic.source,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct XmlEpisode<'a> {
    is_locked: bool,
    parent_title: &'a str,
    title: &'a str,
    date: &'a str,
    thumbnail: &'a str,
    slag: &'a str,
    images: Items<&'a str>,
    source: &'a str,
    label: &'a str,
}

impl<'a> From<&'a EpisodeRecord> for XmlEpisode<'a> {
    fn from(episode: &'a EpisodeRecord) -> Self {
        Self {
            is_locked: episode.is_locked,
            parent_title: &episode.parent_title,
            title: &episode.title,
            date: &episode.date,
            thumbnail: &episode.thumbnail,
            slag: &episode.slag,
            images: Items::of(&episode.images),
            source: &episode.source,
            label: &episode.label,
        }
    }
}
