// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chapters::{ChapterMark, parse_timecode};

/// Attributes of a single element, keyed by qualified attribute name
pub type AttributeMap = BTreeMap<String, String>;

/// Key under which accumulated enclosures are stored on an episode
pub const ENCLOSURE_KEY: &str = "enclosure";

/// Key under which `content:encoded` show notes are stored on an episode
pub const CONTENT_KEY: &str = "content";

/// A value captured for one element name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Character data of the element
    Text(String),
    /// Attributes of an element that carried no text
    Attributes(AttributeMap),
    /// Accumulated attribute maps, e.g. enclosures or chapter markers
    List(Vec<AttributeMap>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_attributes(&self) -> Option<&AttributeMap> {
        match self {
            Value::Attributes(attributes) => Some(attributes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeMap]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

/// Structured record of a parsed podcast feed
///
/// Field keys are the (possibly namespace-qualified) element names found in
/// the feed header, e.g. `title`, `language` or `itunes:author`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<AttributeMap>,
    pub episodes: Vec<EpisodeRecord>,
}

impl PodcastRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Text content of a header element, if it had any
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_text)
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn link(&self) -> Option<&str> {
        self.text("link")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    pub fn language(&self) -> Option<&str> {
        self.text("language")
    }

    pub fn last_build_date(&self) -> Option<&str> {
        self.text("lastBuildDate")
    }

    /// Last build timestamp, if present and parseable
    pub fn last_build_time(&self) -> Option<DateTime<FixedOffset>> {
        self.last_build_date().and_then(parse_feed_date)
    }

    /// Cover art URL from `<image><url>`, falling back to `itunes:image`
    pub fn image_url(&self) -> Option<Url> {
        self.image
            .as_ref()
            .and_then(|image| image.get("url"))
            .map(String::as_str)
            .or_else(|| self.text("itunes:image"))
            .and_then(|url| Url::parse(url).ok())
    }
}

/// Structured record of a single episode
///
/// Like [`PodcastRecord`], fields are keyed by the element names found
/// inside the item. Enclosures live under [`ENCLOSURE_KEY`], show notes
/// from `content:encoded` under [`CONTENT_KEY`] and structured chapters
/// under the name of their list container (e.g. `psc:chapters`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl EpisodeRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_text)
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn guid(&self) -> Option<&str> {
        self.text("guid").or_else(|| self.text("id"))
    }

    pub fn link(&self) -> Option<&str> {
        self.text("link")
    }

    pub fn pub_date(&self) -> Option<&str> {
        self.text("pubDate").or_else(|| self.text("published"))
    }

    /// Publish timestamp, if present and parseable
    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        self.pub_date().and_then(parse_feed_date)
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    pub fn content(&self) -> Option<&str> {
        self.text(CONTENT_KEY)
    }

    /// The richest show notes available: `content:encoded`, then description
    pub fn show_notes(&self) -> Option<&str> {
        self.content()
            .or_else(|| self.description())
            .or_else(|| self.text("itunes:summary"))
    }

    /// Raw enclosure attribute maps in document order
    pub fn enclosures(&self) -> &[AttributeMap] {
        self.field(ENCLOSURE_KEY)
            .and_then(Value::as_list)
            .unwrap_or_default()
    }

    /// Typed view of the enclosures
    pub fn typed_enclosures(&self) -> Vec<Enclosure> {
        self.enclosures().iter().map(Enclosure::from_attributes).collect()
    }

    /// Raw chapter attribute maps in document order
    pub fn chapters(&self) -> &[AttributeMap] {
        self.fields
            .iter()
            .filter(|(name, _)| is_chapter_list(name))
            .find_map(|(_, value)| value.as_list())
            .unwrap_or_default()
    }

    pub fn has_chapters(&self) -> bool {
        !self.chapters().is_empty()
    }

    /// Chapters with a parseable start offset, sorted by start
    pub fn chapter_marks(&self) -> Vec<ChapterMark> {
        let mut marks: Vec<ChapterMark> = self
            .chapters()
            .iter()
            .filter_map(|chapter| {
                let start = chapter.get("start").and_then(|s| parse_timecode(s))?;
                Some(ChapterMark {
                    start,
                    title: chapter.get("title").cloned().unwrap_or_default(),
                    href: chapter.get("href").cloned(),
                    image: chapter.get("image").cloned(),
                })
            })
            .collect();
        marks.sort_by_key(|mark| mark.start);
        marks
    }
}

/// Typed view of an enclosure attribute map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Option<Url>,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

impl Enclosure {
    pub fn from_attributes(attributes: &AttributeMap) -> Self {
        Self {
            url: attributes
                .get("url")
                .or_else(|| attributes.get("href"))
                .and_then(|url| Url::parse(url).ok()),
            length: attributes.get("length").and_then(|l| l.trim().parse().ok()),
            mime_type: attributes
                .get("type")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Split a qualified element name into its prefix and local part
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Whether a qualified name is a namespaced chapter list container
pub(crate) fn is_chapter_list(name: &str) -> bool {
    matches!(split_name(name), (Some(_), "chapters"))
}

/// Parse the date formats commonly found in feeds
pub fn parse_feed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let date_str = date_str.trim();
    DateTime::parse_from_rfc2822(date_str)
        .or_else(|_| DateTime::parse_from_rfc3339(date_str))
        .or_else(|_| parse_relaxed_date(date_str))
        .ok()
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    let mut last_error = None;
    for format in formats {
        match DateTime::parse_from_str(date_str, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => DateTime::parse_from_rfc2822(date_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn enclosure_view_parses_known_attributes() {
        let enclosure = Enclosure::from_attributes(&attrs(&[
            ("url", "https://example.com/ep1.mp3"),
            ("length", "1234567"),
            ("type", "audio/mpeg"),
        ]));

        assert_eq!(
            enclosure.url,
            Some(Url::parse("https://example.com/ep1.mp3").unwrap())
        );
        assert_eq!(enclosure.length, Some(1234567));
        assert_eq!(enclosure.mime_type, Some("audio/mpeg".to_string()));
    }

    #[test]
    fn enclosure_view_tolerates_missing_and_garbage_attributes() {
        let enclosure = Enclosure::from_attributes(&attrs(&[("length", "unknown"), ("type", "")]));

        assert!(enclosure.url.is_none());
        assert!(enclosure.length.is_none());
        assert!(enclosure.mime_type.is_none());
    }

    #[test]
    fn chapter_marks_are_sorted_and_skip_invalid_starts() {
        let mut episode = EpisodeRecord::default();
        episode.fields.insert(
            "psc:chapters".to_string(),
            Value::List(vec![
                attrs(&[("start", "00:05:00"), ("title", "Second")]),
                attrs(&[("start", "soon"), ("title", "Broken")]),
                attrs(&[("start", "00:00:00.500"), ("title", "First"), ("href", "https://example.com")]),
            ]),
        );

        let marks = episode.chapter_marks();

        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].title, "First");
        assert_eq!(marks[0].start, Duration::from_millis(500));
        assert_eq!(marks[0].href.as_deref(), Some("https://example.com"));
        assert_eq!(marks[1].start, Duration::from_secs(300));
    }

    #[test]
    fn chapter_links_do_not_hide_inline_chapters() {
        let mut episode = EpisodeRecord::default();
        episode.fields.insert(
            "podcast:chapters".to_string(),
            Value::Attributes(attrs(&[("url", "https://example.com/chapters.json")])),
        );
        assert!(!episode.has_chapters());

        episode.fields.insert(
            "psc:chapters".to_string(),
            Value::List(vec![attrs(&[("start", "0"), ("title", "Only")])]),
        );
        assert_eq!(episode.chapters().len(), 1);
    }

    #[test]
    fn show_notes_prefer_encoded_content() {
        let mut episode = EpisodeRecord::default();
        episode
            .fields
            .insert("description".to_string(), Value::Text("short".to_string()));
        assert_eq!(episode.show_notes(), Some("short"));

        episode
            .fields
            .insert(CONTENT_KEY.to_string(), Value::Text("<p>rich</p>".to_string()));
        assert_eq!(episode.show_notes(), Some("<p>rich</p>"));
    }

    #[test]
    fn feed_dates_accept_rfc2822_and_rfc3339() {
        assert!(parse_feed_date("Mon, 01 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_feed_date("2024-01-01T12:00:00+02:00").is_some());
        assert!(parse_feed_date("yesterday").is_none());
    }

    #[test]
    fn image_url_falls_back_to_itunes_image() {
        let mut podcast = PodcastRecord::default();
        podcast.fields.insert(
            "itunes:image".to_string(),
            Value::Text("https://example.com/cover.jpg".to_string()),
        );
        assert_eq!(
            podcast.image_url(),
            Some(Url::parse("https://example.com/cover.jpg").unwrap())
        );

        podcast.image = Some(attrs(&[("url", "https://example.com/rss.png")]));
        assert_eq!(
            podcast.image_url(),
            Some(Url::parse("https://example.com/rss.png").unwrap())
        );
    }
}
