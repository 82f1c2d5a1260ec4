//! Maintenance of comic directories already on disk
//!
//! A comic directory holds optional cover images and one numeric folder per
//! episode, each with `episode_<n>_<m>.<ext>` images. [`scan_comic`] rebuilds
//! a manifest entry from such a tree and [`renumber_episodes`] closes gaps in
//! the numbering left by skipped or deleted episodes.

use crate::error::{Error, Result};
use crate::manifest::{ComicRecord, EpisodeRecord, Manifest};
use crate::naming::{self, ALLOWED_EXTENSIONS, Padding};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// episode number, image ordinal, extension
#[allow(clippy::expect_used)]
static IMAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[Ee]pisode_(\d+)_(\d+)\.([A-Za-z0-9]+)$").expect("image name pattern should compile")
});

const TEMP_PREFIX: &str = ".renumber-";

/// One episode folder moved by [`renumber_episodes`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpisodeRenumber {
    /// Folder name before the run
    pub from: String,
    /// Folder name after the run
    pub to: String,
    /// Number of images renamed inside the folder
    pub images: usize,
}

/// An image found in an episode folder
#[derive(Debug)]
struct ImageFile {
    name: String,
    episode: u32,
    ordinal: u32,
    extension: String,
}

impl ImageFile {
    fn parse(name: &str) -> Option<Self> {
        let caps = IMAGE_NAME.captures(name)?;
        let extension = caps[3].to_ascii_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            episode: caps[1].parse().ok()?,
            ordinal: caps[2].parse().ok()?,
            extension,
        })
    }
}

/// Directory listing split into sub-directories and files, names sorted
#[derive(Debug, Default)]
struct Listing {
    dirs: Vec<String>,
    files: Vec<String>,
}

impl Listing {
    async fn read(dir: &Path) -> Result<Self> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Error::filesystem(dir, e))?;
        let mut listing = Listing::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::filesystem(dir, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(dir = %dir.display(), "Skipping non UTF-8 entry");
                continue;
            };
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::filesystem(entry.path(), e))?;
            if file_type.is_dir() {
                listing.dirs.push(name);
            } else if file_type.is_file() {
                listing.files.push(name);
            }
        }

        listing.dirs.sort();
        listing.files.sort();
        Ok(listing)
    }

    /// Numeric folders in episode order
    fn episode_folders(&self) -> Vec<(u32, &str)> {
        let mut folders: Vec<(u32, &str)> = self
            .dirs
            .iter()
            .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|name| Some((name.parse().ok()?, name.as_str())))
            .collect();
        folders.sort();
        folders
    }

    /// Images in ordinal order
    fn images(&self) -> Vec<ImageFile> {
        let mut images: Vec<ImageFile> = self
            .files
            .iter()
            .filter_map(|name| ImageFile::parse(name))
            .collect();
        images.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
        images
    }

    /// First `<stem>.<ext>` present, trying allowed extensions in order
    fn find_stem(&self, stem: &str) -> Option<String> {
        ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| format!("{stem}.{ext}"))
            .find(|candidate| self.files.contains(candidate))
    }
}

/// Rebuild a comic's manifest entry from its directory
///
/// The directory name becomes both titles. Cover images are the
/// `thumbnail`, `preview-thumbnail` and `thumbnail_background` files the
/// collector saves. Episodes are the numeric sub-folders in numeric order.
/// Only images whose episode number matches their folder are listed. An
/// episode's thumbnail is its `thumbnail.<ext>` file, else its first image.
/// Fields the tree cannot tell (description, genres, sources, dates) stay
/// empty.
pub async fn scan_comic(comic_dir: &Path, padding: Padding) -> Result<ComicRecord> {
    let title = comic_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::filesystem(
                comic_dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no directory name"),
            )
        })?;

    let listing = Listing::read(comic_dir).await?;
    let mut episodes = Vec::new();

    for (number, folder) in listing.episode_folders() {
        let episode_listing = Listing::read(&comic_dir.join(folder)).await?;
        let images: Vec<String> = episode_listing
            .images()
            .into_iter()
            .filter(|image| image.episode == number)
            .map(|image| image.name)
            .collect();
        let thumbnail = episode_listing
            .find_stem("thumbnail")
            .or_else(|| images.first().cloned())
            .unwrap_or_default();
        let label = padding.format(number);

        episodes.push(EpisodeRecord {
            is_locked: false,
            parent_title: title.clone(),
            title: format!("episode {label}"),
            thumbnail,
            slag: format!("episode-{label}"),
            images,
            ..Default::default()
        });
    }

    tracing::debug!(comic = %title, episodes = episodes.len(), "Scanned comic directory");

    Ok(ComicRecord {
        original_title: title.clone(),
        thumbnail: listing.find_stem("thumbnail").unwrap_or_default(),
        preview_thumbnail: listing.find_stem("preview-thumbnail").unwrap_or_default(),
        thumbnail_background: listing.find_stem("thumbnail_background").unwrap_or_default(),
        episodes,
        title,
        ..Default::default()
    })
}

impl Manifest {
    /// Manifest of several comic directories, in the order given
    pub async fn from_directories(comic_dirs: &[PathBuf], padding: Padding) -> Result<Self> {
        let mut comics = Vec::with_capacity(comic_dirs.len());
        for dir in comic_dirs {
            comics.push(scan_comic(dir, padding).await?);
        }
        Ok(Manifest { comics })
    }
}

/// Renumber episode folders and their images densely from 1
///
/// Numeric folders keep their relative order and become
/// `episode_folder(1..=N)`. Inside each, images are renamed to
/// `episode_<new>_<m>.<ext>` with `m` dense from 1 in ordinal order and the
/// extension lowercased. Other files and non-numeric folders are left alone.
/// Renames go through temporary names, so old and new numbers may overlap.
pub async fn renumber_episodes(comic_dir: &Path, padding: Padding) -> Result<Vec<EpisodeRenumber>> {
    let listing = Listing::read(comic_dir).await?;
    let folders = listing.episode_folders();

    let mut staged = Vec::with_capacity(folders.len());
    for (index, (_, folder)) in (1u32..).zip(&folders) {
        let temp = comic_dir.join(format!("{TEMP_PREFIX}{index}"));
        rename(&comic_dir.join(folder), &temp).await?;
        staged.push((index, folder.to_string(), temp));
    }

    let mut moves = Vec::with_capacity(staged.len());
    for (index, from, temp) in staged {
        let images = renumber_images(&temp, index, padding).await?;
        let to = naming::episode_folder(index, padding);
        rename(&temp, &comic_dir.join(&to)).await?;

        if from != to {
            tracing::info!(from = %from, to = %to, images, "Renumbered episode folder");
        }
        moves.push(EpisodeRenumber { from, to, images });
    }

    Ok(moves)
}

async fn renumber_images(dir: &Path, episode: u32, padding: Padding) -> Result<usize> {
    let images = Listing::read(dir).await?.images();
    let label = naming::episode_label(episode, padding);

    let mut staged = Vec::with_capacity(images.len());
    for (ordinal, image) in (1u32..).zip(&images) {
        let temp = dir.join(format!("{TEMP_PREFIX}{ordinal}.{}", image.extension));
        rename(&dir.join(&image.name), &temp).await?;
        staged.push((ordinal, image, temp));
    }

    for (ordinal, image, temp) in &staged {
        let name = naming::file_name(&label, *ordinal, padding, &image.extension);
        rename(temp, &dir.join(&name)).await?;
        tracing::debug!(from = %image.name, to = %name, "Renamed image");
    }

    Ok(staged.len())
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| Error::filesystem(from, e))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        std::fs::create_dir_all(dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn scan_rebuilds_comic_from_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let comic_dir = temp_dir.path().join("Study Dates");
        touch(&comic_dir, &["thumbnail.jpg", "preview-thumbnail.png", "readme.txt"]);
        touch(
            &comic_dir.join("1"),
            &[
                "episode_1_2.webp",
                "episode_1_10.webp",
                "episode_1_1.webp",
                "episode_2_1.jpg",
                "thumbnail.jpg",
                "notes.txt",
            ],
        );
        touch(&comic_dir.join("2"), &["Episode_002_001.JPG", "episode_2_2.bmp"]);
        touch(&comic_dir.join("10"), &[]);
        touch(&comic_dir.join("extras"), &["episode_1_1.jpg"]);

        let comic = scan_comic(&comic_dir, Padding::default()).await.unwrap();

        assert_eq!(comic.title, "Study Dates");
        assert_eq!(comic.original_title, "Study Dates");
        assert_eq!(comic.thumbnail, "thumbnail.jpg");
        assert_eq!(comic.preview_thumbnail, "preview-thumbnail.png");
        assert_eq!(comic.thumbnail_background, "");

        let titles: Vec<_> = comic.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["episode 001", "episode 002", "episode 010"]);

        let first = &comic.episodes[0];
        assert_eq!(
            first.images,
            vec!["episode_1_1.webp", "episode_1_2.webp", "episode_1_10.webp"]
        );
        assert_eq!(first.thumbnail, "thumbnail.jpg");
        assert_eq!(first.slag, "episode-001");
        assert_eq!(first.parent_title, "Study Dates");

        assert_eq!(comic.episodes[1].images, vec!["Episode_002_001.JPG"]);
        assert_eq!(comic.episodes[1].thumbnail, "Episode_002_001.JPG");
        assert!(comic.episodes[2].images.is_empty());
        assert_eq!(comic.episodes[2].thumbnail, "");
    }

    #[tokio::test]
    async fn manifest_lists_directories_in_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let first = temp_dir.path().join("B Side");
        let second = temp_dir.path().join("A Side");
        touch(&first.join("1"), &["episode_1_1.jpg"]);
        touch(&second, &[]);

        let manifest = Manifest::from_directories(&[first, second], Padding::None)
            .await
            .unwrap();

        let titles: Vec<_> = manifest.comics.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["B Side", "A Side"]);
        assert_eq!(manifest.comics[0].episodes[0].title, "episode 1");
        assert!(manifest.comics[1].episodes.is_empty());
    }

    #[tokio::test]
    async fn scan_of_missing_directory_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("gone");

        let err = scan_comic(&missing, Padding::default()).await.unwrap_err();

        match err {
            Error::Filesystem { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn renumber_closes_gaps_in_folders_and_images() {
        let temp_dir = tempfile::tempdir().unwrap();
        let comic_dir = temp_dir.path().join("Night Shift");
        touch(&comic_dir, &["thumbnail.jpg"]);
        touch(
            &comic_dir.join("2"),
            &["episode_2_1.jpg", "episode_2_3.png", "thumbnail.jpg"],
        );
        touch(&comic_dir.join("5"), &["episode_5_1.webp"]);
        touch(&comic_dir.join("9"), &["Episode_9_2.JPG", "episode_9_1.jpg"]);
        touch(&comic_dir.join("extras"), &["episode_7_1.jpg"]);

        let moves = renumber_episodes(&comic_dir, Padding::default()).await.unwrap();

        assert_eq!(
            moves,
            vec![
                EpisodeRenumber { from: "2".into(), to: "001".into(), images: 2 },
                EpisodeRenumber { from: "5".into(), to: "002".into(), images: 1 },
                EpisodeRenumber { from: "9".into(), to: "003".into(), images: 2 },
            ]
        );
        assert_eq!(
            names_in(&comic_dir),
            vec!["001", "002", "003", "extras", "thumbnail.jpg"]
        );
        assert_eq!(
            names_in(&comic_dir.join("001")),
            vec!["episode_001_001.jpg", "episode_001_002.png", "thumbnail.jpg"]
        );
        assert_eq!(names_in(&comic_dir.join("002")), vec!["episode_002_001.webp"]);
        assert_eq!(
            names_in(&comic_dir.join("003")),
            vec!["episode_003_001.jpg", "episode_003_002.jpg"]
        );
        assert_eq!(names_in(&comic_dir.join("extras")), vec!["episode_7_1.jpg"]);

        // contents follow their ordinal
        let moved = std::fs::read(comic_dir.join("003").join("episode_003_002.jpg")).unwrap();
        assert_eq!(moved, b"Episode_9_2.JPG");

        let comic = scan_comic(&comic_dir, Padding::default()).await.unwrap();
        assert_eq!(
            comic.episodes[2].images,
            vec!["episode_003_001.jpg", "episode_003_002.jpg"]
        );
    }

    #[tokio::test]
    async fn renumber_handles_overlapping_unpadded_numbers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let comic_dir = temp_dir.path().join("Overlap");
        touch(&comic_dir.join("2"), &["episode_2_1.jpg"]);
        touch(&comic_dir.join("3"), &["episode_3_1.jpg"]);

        let moves = renumber_episodes(&comic_dir, Padding::None).await.unwrap();

        let targets: Vec<_> = moves.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(targets, vec!["1", "2"]);
        assert_eq!(names_in(&comic_dir.join("1")), vec!["episode_1_1.jpg"]);
        assert_eq!(
            std::fs::read(comic_dir.join("2").join("episode_2_1.jpg")).unwrap(),
            b"episode_3_1.jpg"
        );
    }
}
