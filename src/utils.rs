//! Utility functions for titles and labels

use regex::Regex;
use std::sync::LazyLock;

/// Name used when a title sanitizes to nothing
pub const FALLBACK_TITLE: &str = "untitled_comic";

// Characters Windows and most filesystems refuse in a path component
#[allow(clippy::expect_used)]
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("unsafe char pattern should compile"));

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));

/// Turn a scraped title into a usable directory name
///
/// Filesystem-unsafe characters become spaces, whitespace runs collapse to one
/// space and the result is trimmed. Titles made only of dots or nothing at all
/// fall back to [`FALLBACK_TITLE`].
///
/// # Examples
///
/// ```
/// use comic_fetch::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Love: Part 2/3?"), "Love Part 2 3");
/// assert_eq!(sanitize_filename("  "), "untitled_comic");
/// ```
pub fn sanitize_filename(text: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(text, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, " ");
    let trimmed = collapsed.trim();

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split raw genre labels into `(genres, tags)`
///
/// Labels starting with `#` are tags and keep their `#`; everything else is a
/// genre. Blank labels are dropped and surrounding whitespace is trimmed.
pub fn split_genres_and_tags<I, S>(labels: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut genres = Vec::new();
    let mut tags = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() {
            continue;
        }
        if label.starts_with('#') {
            tags.push(label.to_string());
        } else {
            genres.push(label.to_string());
        }
    }
    (genres, tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename(r#"A/B\C:D*E?F"G<H>I|J"#), "A B C D E F G H I J");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("  Study \t Dates \n"), "Study Dates");
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("Ниндзя, начало"), "Ниндзя, начало");
    }

    #[test]
    fn sanitize_falls_back_for_empty_or_dots() {
        assert_eq!(sanitize_filename(""), FALLBACK_TITLE);
        assert_eq!(sanitize_filename("???"), FALLBACK_TITLE);
        assert_eq!(sanitize_filename(".."), FALLBACK_TITLE);
    }

    #[test]
    fn genres_and_tags_are_split_by_hash() {
        let (genres, tags) =
            split_genres_and_tags(["Romance", "#Outdoors", " Drama ", "", "#Cougar"]);
        assert_eq!(genres, vec!["Romance", "Drama"]);
        assert_eq!(tags, vec!["#Outdoors", "#Cougar"]);
    }
}
