//! Link discovery, de-duplication, classification and destination file naming.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s\]\)\}>"]+"#).expect("valid url pattern"));

static DRIVE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"drive\.google\.com/(?:file/d/|uc\?id=|open\?id=)([a-zA-Z0-9_-]+)")
        .expect("valid drive pattern")
});

static YOUTUBE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/shorts/)([\w-]+)")
        .expect("valid youtube pattern")
});

/// Label used for external videos that have no name in the deck.
pub const EXTERNAL_FALLBACK_NAME: &str = "youtube_video";
pub const EXTERNAL_EXTENSION: &str = ".mp4";

const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// A URL found in a deck, with the table-row name it was listed under (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedLink {
    pub name: Option<String>,
    pub url: String,
}

impl ExtractedLink {
    pub fn new(url: impl Into<String>, name: Option<String>) -> Self {
        Self { url: url.into(), name }
    }
}

/// Accumulates links while a slide is walked.
///
/// URLs keep their first-seen order. A URL seen again only updates the stored
/// name when the stored one is empty and the new one is not.
#[derive(Debug, Default)]
pub struct LinkCollector {
    links: Vec<ExtractedLink>,
    index: HashMap<String, usize>,
}

impl LinkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, url: &str, name: Option<&str>) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

        match self.index.get(url) {
            Some(&pos) => {
                let existing = &mut self.links[pos];
                if existing.name.is_none() && name.is_some() {
                    existing.name = name;
                }
            }
            None => {
                self.index.insert(url.to_string(), self.links.len());
                self.links.push(ExtractedLink::new(url, name));
            }
        }
    }

    /// Records every plain-text URL token in `text`.
    pub fn push_text(&mut self, text: &str, name: Option<&str>) {
        for url in find_urls(text) {
            self.push(url, name);
        }
    }

    pub fn extend(&mut self, links: impl IntoIterator<Item = ExtractedLink>) {
        for link in links {
            self.push(&link.url, link.name.as_deref());
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn finish(self) -> Vec<ExtractedLink> {
        self.links
    }
}

/// Merges links by exact URL, preferring a named entry over an unnamed one.
pub fn dedupe(links: impl IntoIterator<Item = ExtractedLink>) -> Vec<ExtractedLink> {
    let mut collector = LinkCollector::new();
    collector.extend(links);
    collector.finish()
}

pub fn find_urls(text: &str) -> impl Iterator<Item = &str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str().trim())
}

/// How a link's content is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// A file in the same remote store, fetched through the storage API.
    Internal { file_id: String },
    /// A watch page on the external video host.
    External { video_id: String },
    Unsupported,
}

/// Classifies a URL. Storage links take precedence over video-host links.
pub fn classify(url: &str) -> LinkKind {
    if let Some(caps) = DRIVE_FILE_PATTERN.captures(url) {
        return LinkKind::Internal { file_id: caps[1].to_string() };
    }
    if let Some(caps) = YOUTUBE_PATTERN.captures(url) {
        return LinkKind::External { video_id: caps[1].to_string() };
    }
    LinkKind::Unsupported
}

fn is_illegal(c: char) -> bool {
    ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control()
}

/// Replaces path-illegal and control characters with `_`. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name.chars().map(|c| if is_illegal(c) { '_' } else { c }).collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Removes path-illegal and control characters entirely.
pub fn strip_illegal(name: &str) -> String {
    name.chars().filter(|c| !is_illegal(*c)).collect::<String>().trim().to_string()
}

/// Splits `name` into stem and extension (with the dot). Dot-files have no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx < name.len() - 1 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Computes `<prefix><base><ext>` for a link, sanitized for use as a local path.
///
/// `remote_name` is the storage API's own name for internal files; external links
/// always get the `.mp4` extension.
pub fn destination_file_name(
    prefix: &str,
    link: &ExtractedLink,
    kind: &LinkKind,
    remote_name: Option<&str>,
) -> String {
    let (base, extension) = match kind {
        LinkKind::Internal { file_id } => {
            let fallback = format!("unknown_video_{file_id}");
            let remote = remote_name.unwrap_or(&fallback);
            let (stem, ext) = split_extension(remote);
            (link.name.clone().unwrap_or_else(|| stem.to_string()), ext.to_string())
        }
        _ => (
            link.name.clone().unwrap_or_else(|| EXTERNAL_FALLBACK_NAME.to_string()),
            EXTERNAL_EXTENSION.to_string(),
        ),
    };

    sanitize_filename(&format!("{prefix}{}{extension}", strip_illegal(&base)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_duplicate_wins_in_either_order() {
        let url = "https://youtu.be/abc123";
        let first = dedupe([ExtractedLink::new(url, None), ExtractedLink::new(url, Some("Acme".into()))]);
        let second = dedupe([ExtractedLink::new(url, Some("Acme".into())), ExtractedLink::new(url, None)]);
        assert_eq!(first, vec![ExtractedLink::new(url, Some("Acme".into()))]);
        assert_eq!(second, first);
    }

    #[test]
    fn test_first_name_is_kept_over_later_name() {
        let url = "https://youtu.be/x";
        let links = dedupe([
            ExtractedLink::new(url, Some("First".into())),
            ExtractedLink::new(url, Some("Second".into())),
        ]);
        assert_eq!(links[0].name.as_deref(), Some("First"));
    }

    #[test]
    fn test_find_urls_stops_at_delimiters() {
        let text = "see (https://youtu.be/abc123) and <https://drive.google.com/file/d/XYZ/view> ok";
        let urls: Vec<_> = find_urls(text).collect();
        assert_eq!(urls, vec!["https://youtu.be/abc123", "https://drive.google.com/file/d/XYZ/view"]);
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(
            classify("https://drive.google.com/file/d/1AbC-_9/view?usp=sharing"),
            LinkKind::Internal { file_id: "1AbC-_9".into() }
        );
        assert_eq!(
            classify("https://drive.google.com/uc?id=FILE42&export=download"),
            LinkKind::Internal { file_id: "FILE42".into() }
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            LinkKind::External { video_id: "dQw4w9WgXcQ".into() }
        );
        assert_eq!(classify("https://youtu.be/abc123"), LinkKind::External { video_id: "abc123".into() });
        assert_eq!(classify("https://vimeo.com/1234"), LinkKind::Unsupported);
    }

    #[test]
    fn test_sanitize_filename_is_total() {
        let nasty = "a\\b/c:d*e?f\"g<h>i|j\u{0007}k\n";
        let clean = sanitize_filename(nasty);
        assert!(!clean.chars().any(is_illegal));
        assert_eq!(clean, "a_b_c_d_e_f_g_h_i_j_k_");
        assert_eq!(sanitize_filename(""), "_");
        assert_eq!(sanitize_filename("   "), "_");
        assert_eq!(sanitize_filename("|"), "_");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("clip.final.mov"), ("clip.final", ".mov"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_destination_file_name() {
        let external = ExtractedLink::new("https://youtu.be/abc123", Some("Store A".into()));
        let kind = classify(&external.url);
        assert_eq!(destination_file_name("Market ", &external, &kind, None), "Market Store A.mp4");

        let unnamed = ExtractedLink::new("https://youtu.be/abc123", None);
        assert_eq!(destination_file_name("", &unnamed, &kind, None), "youtube_video.mp4");

        let internal = ExtractedLink::new("https://drive.google.com/file/d/ID1/view", None);
        let kind = classify(&internal.url);
        assert_eq!(destination_file_name("", &internal, &kind, Some("walkthrough.MOV")), "walkthrough.MOV");

        let named = ExtractedLink::new("https://drive.google.com/file/d/ID1/view", Some("Shop: 1/2".into()));
        assert_eq!(destination_file_name("", &named, &kind, Some("x.mp4")), "Shop 12.mp4");
    }
}
