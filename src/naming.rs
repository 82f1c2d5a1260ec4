//! Deterministic output naming
//!
//! Every file the pipeline writes is named from `(label, ordinal, extension)`
//! only, so re-running a batch always produces the same names. With fixed
//! padding, lexicographic order of the names equals numeric order of the
//! ordinals.

use serde::{Deserialize, Serialize};
use url::Url;

/// Extensions accepted as-is from a source URL
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Extension used when the URL does not end in an allowed one
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Zero-padding applied to ordinals in names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Plain decimal (`7`)
    None,
    /// Left-padded with zeros to the given width (`007` for width 3)
    ///
    /// Ordinals needing more digits than the width are written in full
    /// (`1000` for width 3) and no longer sort lexicographically after the
    /// padded ones. Pick a width that covers the largest episode or batch.
    Fixed(usize),
}

impl Default for Padding {
    fn default() -> Self {
        Padding::Fixed(3)
    }
}

impl Padding {
    /// Render an ordinal with this padding
    pub fn format(&self, ordinal: u32) -> String {
        match self {
            Padding::None => ordinal.to_string(),
            Padding::Fixed(width) => format!("{ordinal:0width$}", width = *width),
        }
    }
}

/// Normalized image extension for a source URL
///
/// Query string and fragment are ignored, the extension is lowercased, and
/// anything outside [`ALLOWED_EXTENSIONS`] falls back to [`DEFAULT_EXTENSION`].
/// The extension is read from the last path segment only, so a host such as
/// `cdn.example.com` never leaks `com` into a name.
pub fn image_extension(url: &Url) -> &'static str {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let Some((stem, ext)) = last_segment.rsplit_once('.') else {
        return DEFAULT_EXTENSION;
    };
    if stem.is_empty() {
        return DEFAULT_EXTENSION;
    }

    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Batch label for an episode: `episode_<ordinal>`
pub fn episode_label(episode: u32, padding: Padding) -> String {
    format!("episode_{}", padding.format(episode))
}

/// Folder name for an episode inside its comic directory
pub fn episode_folder(episode: u32, padding: Padding) -> String {
    padding.format(episode)
}

/// File name for one item of a batch: `<label>_<ordinal>.<ext>`
pub fn file_name(label: &str, ordinal: u32, padding: Padding, extension: &str) -> String {
    format!("{label}_{}.{extension}", padding.format(ordinal))
}

/// Thumbnail file name: `<stem>.<ext>` with the URL's normalized extension
pub fn thumbnail_name(stem: &str, url: &Url) -> String {
    format!("{stem}.{}", image_extension(url))
}
