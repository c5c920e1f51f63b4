// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::mem;

use tracing::trace;

use crate::error::FeedError;

use super::events::FeedEvent;
use super::parse::ParseOptions;
use super::record::{
    AttributeMap, CONTENT_KEY, ENCLOSURE_KEY, EpisodeRecord, PodcastRecord, Value, is_chapter_list,
    split_name,
};

/// Which part of the record an element contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Podcast-level fields
    Header,
    /// Sub-fields of the podcast-level `<image>`
    HeaderImage,
    /// Anything inside an item-equivalent element
    Episode,
}

/// An element that has been opened but not yet closed
#[derive(Debug)]
struct Frame {
    name: String,
    attributes: AttributeMap,
    text: String,
    scope: Scope,
    /// This frame is the item or image element that entered `scope`
    boundary: bool,
    /// Text supplied by an `href` attribute, overriding character data
    href_text: Option<String>,
}

impl Frame {
    fn value(&self) -> Option<String> {
        let text = match &self.href_text {
            Some(href) => href.as_str(),
            None => self.text.as_str(),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// State of a single parse call
///
/// A context is created fresh for every document, fed one [`FeedEvent`] at a
/// time through [`ParseContext::apply`] and consumed by
/// [`ParseContext::finish`]. Nothing in it outlives the call.
#[derive(Debug)]
pub struct ParseContext<'o> {
    options: &'o ParseOptions,
    stack: Vec<Frame>,
    seen_root: bool,
    episode: EpisodeRecord,
    episodes: Vec<EpisodeRecord>,
    chapters: Vec<AttributeMap>,
    enclosures: Vec<AttributeMap>,
    podcast: BTreeMap<String, Value>,
    image: AttributeMap,
    podcast_image: Option<AttributeMap>,
}

impl<'o> ParseContext<'o> {
    pub fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            stack: Vec::new(),
            seen_root: false,
            episode: EpisodeRecord::default(),
            episodes: Vec::new(),
            chapters: Vec::new(),
            enclosures: Vec::new(),
            podcast: BTreeMap::new(),
            image: AttributeMap::new(),
            podcast_image: None,
        }
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Scope of the innermost open element
    pub fn scope(&self) -> Scope {
        self.stack.last().map_or(Scope::Header, |frame| frame.scope)
    }

    /// Episodes completed so far
    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    /// Fold one event into the context
    pub fn apply(&mut self, event: FeedEvent) -> Result<(), FeedError> {
        match event {
            FeedEvent::Open { name, attributes } => self.open(name, attributes),
            FeedEvent::Text(text) => self.text(&text),
            FeedEvent::Close { name } => self.close(&name),
            // End is handled by finish, which consumes the context
            FeedEvent::End => Ok(()),
        }
    }

    /// Assemble the record once the document has ended
    pub fn finish(mut self) -> Result<PodcastRecord, FeedError> {
        if let Some(frame) = self.stack.pop() {
            return Err(FeedError::UnclosedElement { name: frame.name });
        }
        if !self.seen_root {
            return Err(FeedError::MissingRoot);
        }

        Ok(PodcastRecord {
            fields: self.podcast,
            image: self.podcast_image,
            episodes: self.episodes,
        })
    }

    fn classify(&self, name: &str) -> (Scope, bool) {
        match self.scope() {
            Scope::Episode => (Scope::Episode, false),
            _ if self.is_item(name) => (Scope::Episode, true),
            Scope::HeaderImage => (Scope::HeaderImage, false),
            Scope::Header if self.is_image(name) && !self.stack.is_empty() => {
                (Scope::HeaderImage, true)
            }
            Scope::Header => (Scope::Header, false),
        }
    }

    fn is_item(&self, name: &str) -> bool {
        self.options.item_elements.iter().any(|item| item == name)
    }

    fn is_image(&self, name: &str) -> bool {
        self.options.image_elements.iter().any(|image| image == name)
    }

    fn open(&mut self, name: String, attributes: AttributeMap) -> Result<(), FeedError> {
        if self.stack.len() >= self.options.max_depth {
            return Err(FeedError::TooDeep {
                limit: self.options.max_depth,
            });
        }
        if self.stack.is_empty() && self.seen_root {
            return Err(FeedError::MultipleRoots { name });
        }
        self.seen_root = true;

        let (scope, boundary) = self.classify(&name);

        if boundary && scope == Scope::Episode {
            self.episode = EpisodeRecord::default();
            self.chapters.clear();
            self.enclosures.clear();
        }

        if !attributes.is_empty() {
            match scope {
                Scope::Header => {
                    store_attributes(&mut self.podcast, &name, &attributes);
                }
                Scope::Episode if is_chapter(&name) => self.chapters.push(attributes.clone()),
                Scope::Episode if is_enclosure(&name, &attributes) => {
                    self.enclosures.push(attributes.clone())
                }
                _ => {}
            }
        }

        let href_text = href_text(&name, &attributes);

        self.stack.push(Frame {
            name,
            attributes,
            text: String::new(),
            scope,
            boundary,
            href_text,
        });
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), FeedError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        match self.stack.last_mut() {
            Some(frame) => {
                frame.text.push_str(text);
                Ok(())
            }
            None => Err(FeedError::TextOutsideRoot),
        }
    }

    fn close(&mut self, name: &str) -> Result<(), FeedError> {
        let frame = match self.stack.pop() {
            Some(frame) if frame.name == name => frame,
            _ => {
                return Err(FeedError::UnexpectedClose {
                    name: name.to_string(),
                });
            }
        };

        match frame.scope {
            Scope::HeaderImage => self.close_image(frame),
            Scope::Header => self.close_header(frame),
            Scope::Episode => self.close_episode(frame),
        }
        Ok(())
    }

    fn close_image(&mut self, frame: Frame) {
        if frame.boundary {
            self.podcast_image = Some(mem::take(&mut self.image));
        } else if let Some(value) = frame.value() {
            self.image.insert(frame.name, value);
        }
    }

    fn close_header(&mut self, frame: Frame) {
        // Attributes stored on open stay in place when there is no text
        if let Some(value) = frame.value() {
            self.podcast.insert(frame.name, Value::Text(value));
        }
    }

    fn close_episode(&mut self, frame: Frame) {
        if frame.boundary {
            let episode = mem::take(&mut self.episode);
            trace!(
                index = self.episodes.len(),
                title = episode.title().unwrap_or_default(),
                enclosures = self.enclosures.len(),
                chapters = self.chapters.len(),
                "Completed episode"
            );
            self.episodes.push(episode);
            self.chapters.clear();
            self.enclosures.clear();
            return;
        }

        let fields = &mut self.episode.fields;

        if is_chapter_list(&frame.name) && !self.chapters.is_empty() {
            fields.insert(frame.name, Value::List(mem::take(&mut self.chapters)));
        } else if is_encoded_content(&frame.name) {
            if let Some(value) = frame.value() {
                fields.insert(CONTENT_KEY.to_string(), Value::Text(value));
            }
        } else if is_enclosure(&frame.name, &frame.attributes) {
            fields.insert(
                ENCLOSURE_KEY.to_string(),
                Value::List(self.enclosures.clone()),
            );
        } else if is_chapter(&frame.name) {
            // Already collected on open
        } else if let Some(value) = frame.value() {
            fields.insert(frame.name, Value::Text(value));
        } else if !frame.attributes.is_empty() {
            store_attributes(fields, &frame.name, &frame.attributes);
        }
    }
}

/// Store an attribute map unless text is already recorded under `name`
///
/// Repeated elements such as Atom `<link rel="self">` following
/// `<link rel="alternate">` keep the text of the earlier one.
fn store_attributes(fields: &mut BTreeMap<String, Value>, name: &str, attributes: &AttributeMap) {
    if !matches!(fields.get(name), Some(Value::Text(_))) {
        fields.insert(name.to_string(), Value::Attributes(attributes.clone()));
    }
}

/// A namespaced chapter marker such as `psc:chapter`
fn is_chapter(name: &str) -> bool {
    matches!(split_name(name), (Some(_), "chapter"))
}

/// RSS `<enclosure>` or Atom `<link rel="enclosure">`
fn is_enclosure(name: &str, attributes: &AttributeMap) -> bool {
    name == "enclosure"
        || (name == "link" && attributes.get("rel").is_some_and(|rel| rel == "enclosure"))
}

/// Namespaced encoded content such as `content:encoded`
fn is_encoded_content(name: &str) -> bool {
    matches!(split_name(name), (Some(_), "encoded"))
}

/// Effective text carried in an `href` attribute
///
/// Applies to namespaced image references (`itunes:image href="..."`) and
/// Atom alternate links.
fn href_text(name: &str, attributes: &AttributeMap) -> Option<String> {
    let href = attributes.get("href")?;
    let applies = match split_name(name) {
        (Some(_), "image") => true,
        (None, "link") => attributes
            .get("rel")
            .is_none_or(|rel| rel == "alternate"),
        _ => false,
    };
    applies.then(|| href.clone())
}
