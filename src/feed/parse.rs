// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::debug;

use crate::error::FeedError;

use super::context::ParseContext;
use super::events::{FeedEvent, FeedEvents};
use super::record::PodcastRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Options controlling how feed elements are classified
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Element names that delimit one episode
    pub item_elements: Vec<String>,
    /// Element names of the podcast-level image sub-object
    pub image_elements: Vec<String>,
    /// Maximum number of simultaneously open elements
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            item_elements: vec!["item".to_string(), "entry".to_string()],
            image_elements: vec!["image".to_string()],
            max_depth: 256,
        }
    }
}

/// Parser turning feed documents into [`PodcastRecord`]s
///
/// The parser only holds its options. All parse state lives in a
/// [`ParseContext`] created for each call, so one parser can be shared
/// freely between threads.
#[derive(Debug, Clone, Default)]
pub struct FeedParser {
    options: ParseOptions,
}

impl FeedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a complete feed document
    #[tracing::instrument(skip_all, fields(len = xml.len()))]
    pub fn parse(&self, xml: &str) -> Result<PodcastRecord, FeedError> {
        let mut context = ParseContext::new(&self.options);

        for event in FeedEvents::new(xml) {
            match event? {
                FeedEvent::End => break,
                event => context.apply(event)?,
            }
        }

        let podcast = context.finish()?;
        debug!(
            title = podcast.title().unwrap_or_default(),
            episodes = podcast.episodes.len(),
            "Parsed feed"
        );
        Ok(podcast)
    }

    /// Parse a feed from raw bytes
    ///
    /// Only UTF-8 is supported; a leading byte order mark is skipped.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<PodcastRecord, FeedError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        self.parse(std::str::from_utf8(bytes)?)
    }
}

/// Parse feed XML with default options
pub fn parse_feed(xml: &str) -> Result<PodcastRecord, FeedError> {
    FeedParser::new().parse(xml)
}

/// Parse feed bytes with default options
pub fn parse_feed_bytes(bytes: &[u8]) -> Result<PodcastRecord, FeedError> {
    FeedParser::new().parse_bytes(bytes)
}
