// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::feed::EpisodeRecord;

use super::timecode::{TimecodeMap, extract_timecodes, parse_timecode};

/// Strategy turning show notes into chapter candidates
///
/// Implementations never fail: a strategy that cannot produce chapters
/// returns an empty map.
#[async_trait]
pub trait ChapterExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> TimecodeMap;
}

/// A shared reference to a chapter extractor
pub type SharedChapterExtractor = Arc<dyn ChapterExtractor>;

/// Extractor scanning text for timecode patterns
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    /// Create a new PatternExtractor wrapped in an Arc
    pub fn shared() -> SharedChapterExtractor {
        Arc::new(Self)
    }
}

#[async_trait]
impl ChapterExtractor for PatternExtractor {
    async fn extract(&self, text: &str) -> TimecodeMap {
        extract_timecodes(text)
    }
}

/// A generative model able to answer a chapter prompt
///
/// The model is expected to reply with JSON shaped like
/// `{"chapters": [{"timecode": "00:01:00", "title": "Intro"}]}`.
#[async_trait]
pub trait ChapterModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Options for [`ModelExtractor`]
#[derive(Debug, Clone)]
pub struct ModelExtractorOptions {
    /// Upper bound for a single model call
    pub timeout: Duration,
    /// Show notes longer than this many characters are truncated
    pub max_input_chars: usize,
}

impl Default for ModelExtractorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_input_chars: 16_000,
        }
    }
}

#[derive(Error, Debug)]
enum ModelExtractFailure {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("model response is not valid chapter JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct GeneratedChapters {
    #[serde(default)]
    chapters: Vec<GeneratedChapter>,
}

#[derive(Debug, Deserialize)]
struct GeneratedChapter {
    timecode: String,
    title: String,
}

/// Extractor delegating to a generative model
///
/// Every failure mode (model unavailable, generation error, timeout,
/// malformed response) is logged and resolves to an empty map. Dropping
/// the returned future cancels the call without leaving state behind.
pub struct ModelExtractor<M> {
    model: M,
    options: ModelExtractorOptions,
}

impl<M: ChapterModel> ModelExtractor<M> {
    pub fn new(model: M) -> Self {
        Self::with_options(model, ModelExtractorOptions::default())
    }

    pub fn with_options(model: M, options: ModelExtractorOptions) -> Self {
        Self { model, options }
    }

    fn prompt(&self, text: &str) -> String {
        let notes: String = text.chars().take(self.options.max_input_chars).collect();
        format!(
            "Split the following podcast show notes into chapters. \
             Answer only with JSON of the form \
             {{\"chapters\": [{{\"timecode\": \"HH:MM:SS\", \"title\": \"...\"}}]}}. \
             Use timecodes that appear in the notes.\n\n{notes}"
        )
    }

    async fn try_extract(&self, text: &str) -> Result<TimecodeMap, ModelExtractFailure> {
        let prompt = self.prompt(text);
        let response = tokio::time::timeout(self.options.timeout, self.model.generate(&prompt))
            .await
            .map_err(|_| ModelExtractFailure::TimedOut(self.options.timeout))??;

        let generated: GeneratedChapters = serde_json::from_str(json_body(&response))?;

        let mut timecodes = TimecodeMap::new();
        for chapter in generated.chapters {
            let timecode = chapter.timecode.trim();
            let title = chapter.title.trim();
            if title.is_empty() || parse_timecode(timecode).is_none() {
                debug!(timecode, "Discarding generated chapter");
                continue;
            }
            timecodes
                .entry(timecode.to_string())
                .or_insert_with(|| title.to_string());
        }
        Ok(timecodes)
    }
}

#[async_trait]
impl<M: ChapterModel> ChapterExtractor for ModelExtractor<M> {
    async fn extract(&self, text: &str) -> TimecodeMap {
        match self.try_extract(text).await {
            Ok(timecodes) => timecodes,
            Err(e) => {
                warn!(error = %e, "Model chapter extraction failed");
                TimecodeMap::new()
            }
        }
    }
}

/// Narrow a model reply to its JSON object, dropping code fences or chatter
fn json_body(response: &str) -> &str {
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => response,
    }
}

/// Chapters for an episode
///
/// Structured chapters from the feed win. Otherwise the episode's show notes
/// are handed to `extractor`; an episode without show notes has no chapters.
pub async fn resolve_episode_chapters(
    episode: &EpisodeRecord,
    extractor: &dyn ChapterExtractor,
) -> TimecodeMap {
    if episode.has_chapters() {
        let mut timecodes = TimecodeMap::new();
        for chapter in episode.chapters() {
            if let Some(start) = chapter.get("start") {
                timecodes
                    .entry(start.clone())
                    .or_insert_with(|| chapter.get("title").cloned().unwrap_or_default());
            }
        }
        return timecodes;
    }

    match episode.show_notes() {
        Some(notes) => extractor.extract(notes).await,
        None => TimecodeMap::new(),
    }
}
