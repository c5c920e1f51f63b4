// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::FeedError;

use super::record::AttributeMap;

/// A single step of feed traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// An element opened. Self-closing elements open and close immediately.
    Open {
        name: String,
        attributes: AttributeMap,
    },
    /// Unescaped character data (CDATA included)
    Text(String),
    Close {
        name: String,
    },
    /// End of the document
    End,
}

/// Pull-based tokenizer turning feed XML into [`FeedEvent`]s
///
/// Comments, processing instructions, the XML declaration and the doctype
/// are skipped. Entity references other than the XML builtins and numeric
/// character references are rejected by quick-xml, so doctype entity
/// declarations are never expanded.
pub struct FeedEvents<'a> {
    reader: Reader<&'a [u8]>,
    finished: bool,
}

impl<'a> FeedEvents<'a> {
    pub fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        config.check_end_names = true;

        Self {
            reader,
            finished: false,
        }
    }

    fn xml_error(&self, source: quick_xml::Error) -> FeedError {
        FeedError::Xml {
            position: self.reader.buffer_position() as u64,
            source,
        }
    }

    fn open_event(&self, start: &BytesStart<'_>) -> Result<FeedEvent, FeedError> {
        let decoder = self.reader.decoder();
        let mut attributes = AttributeMap::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.xml_error(e.into()))?;
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| self.xml_error(e))?;
            attributes.insert(decode_name(attr.key.as_ref()), value.into_owned());
        }

        Ok(FeedEvent::Open {
            name: decode_name(start.name().as_ref()),
            attributes,
        })
    }

    fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let event = self.reader.read_event().map_err(|e| self.xml_error(e))?;

            match event {
                Event::Start(start) => return self.open_event(&start).map(Some),
                Event::End(end) => {
                    return Ok(Some(FeedEvent::Close {
                        name: decode_name(end.name().as_ref()),
                    }));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| self.xml_error(e))?;
                    return Ok(Some(FeedEvent::Text(text.into_owned())));
                }
                Event::CData(cdata) => {
                    return Ok(Some(FeedEvent::Text(
                        String::from_utf8_lossy(&cdata).into_owned(),
                    )));
                }
                Event::Eof => {
                    self.finished = true;
                    return Ok(Some(FeedEvent::End));
                }
                // Empty is expanded into Start + End by the reader config
                _ => {}
            }
        }
    }
}

impl Iterator for FeedEvents<'_> {
    type Item = Result<FeedEvent, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

// Input is always &str, so names are valid UTF-8
fn decode_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Vec<FeedEvent> {
        FeedEvents::new(xml).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn self_closing_elements_open_and_close() {
        let events = collect(r#"<item><enclosure url="a.mp3"/></item>"#);

        assert_eq!(
            events,
            vec![
                FeedEvent::Open {
                    name: "item".to_string(),
                    attributes: AttributeMap::new(),
                },
                FeedEvent::Open {
                    name: "enclosure".to_string(),
                    attributes: [("url".to_string(), "a.mp3".to_string())].into(),
                },
                FeedEvent::Close {
                    name: "enclosure".to_string(),
                },
                FeedEvent::Close {
                    name: "item".to_string(),
                },
                FeedEvent::End,
            ]
        );
    }

    #[test]
    fn entities_and_cdata_become_text() {
        let events = collect("<t>Q&amp;A &#8211; <![CDATA[<b>bold</b>]]></t>");

        assert_eq!(events[1], FeedEvent::Text("Q&A \u{2013} ".to_string()));
        assert_eq!(events[2], FeedEvent::Text("<b>bold</b>".to_string()));
    }

    #[test]
    fn declarations_and_comments_are_skipped() {
        let events = collect("<?xml version=\"1.0\"?>\n<!-- generated --><rss></rss>");

        assert!(matches!(&events[0], FeedEvent::Text(t) if t.trim().is_empty()));
        assert!(matches!(&events[1], FeedEvent::Open { name, .. } if name == "rss"));
        assert_eq!(events.last(), Some(&FeedEvent::End));
    }

    #[test]
    fn mismatched_close_is_an_error() {
        let result: Result<Vec<_>, _> = FeedEvents::new("<a><b></a>").collect();
        assert!(matches!(result, Err(FeedError::Xml { .. })));
    }

    #[test]
    fn iteration_stops_after_error() {
        let mut events = FeedEvents::new("<a></b>");
        assert!(events.next().unwrap().is_ok());
        assert!(events.next().unwrap().is_err());
        assert!(events.next().is_none());
    }
}
