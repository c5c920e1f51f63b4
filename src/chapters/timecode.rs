// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tracing::trace;

/// Chapter titles keyed by the literal timecode they were found at
pub type TimecodeMap = BTreeMap<String, String>;

/// A chapter with a typed start offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterMark {
    pub start: Duration,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Markup that ends a line of show notes
#[allow(clippy::expect_used)]
static LINE_BREAK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|li|div|h[1-6])\s*>").expect("line break regex is valid")
});

/// `MM:SS` or `HH:MM:SS`, not glued to surrounding digits or letters
#[allow(clippy::expect_used)]
static TIMECODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}(?::[0-5]\d){1,2}\b").expect("timecode regex is valid")
});

#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

const LEADING_SEPARATORS: &[char] = &['-', '\u{2013}', '\u{2014}', ':', '|', ')', ']', '.', '*', '\u{2022}'];
const TRAILING_SEPARATORS: &[char] = &['-', '\u{2013}', '\u{2014}', '|', '(', '['];

/// Find `HH:MM:SS <title>` and `MM:SS <title>` sequences in show notes
///
/// A title runs from the end of its timecode to the next timecode, a line
/// break (`\n`, `<br>`, closing block tags) or the end of the text. Other
/// markup is stripped before scanning and entities in titles are decoded.
/// When a timecode appears more than once, the first title found for it is
/// kept.
#[tracing::instrument(skip(text), fields(text_len = text.len()))]
pub fn extract_timecodes(text: &str) -> TimecodeMap {
    let normalized = LINE_BREAK_PATTERN.replace_all(text, "\n");
    // Tags are removed before scanning so `href="#t=00:01:00"` is never a match
    let visible = TAG_PATTERN.replace_all(&normalized, "");
    let mut timecodes = TimecodeMap::new();

    for line in visible.lines() {
        let matches: Vec<_> = TIMECODE_PATTERN
            .find_iter(line)
            .filter(|found| !continues_number(line, found.start()))
            .collect();

        for (index, found) in matches.iter().enumerate() {
            let end = matches
                .get(index + 1)
                .map_or(line.len(), |next| next.start());
            let title = clean_title(&line[found.end()..end]);

            if title.is_empty() {
                continue;
            }

            trace!(timecode = found.as_str(), title = %title, "found timecode");
            timecodes.entry(found.as_str().to_string()).or_insert(title);
        }
    }

    timecodes
}

/// A match preceded by a digit or colon is the tail of a longer number,
/// as in `100:00:00`
fn continues_number(line: &str, start: usize) -> bool {
    line[..start]
        .bytes()
        .next_back()
        .is_some_and(|b| b.is_ascii_digit() || b == b':')
}

fn clean_title(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);

    decoded
        .trim_start_matches(|c: char| c.is_whitespace() || LEADING_SEPARATORS.contains(&c))
        .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_SEPARATORS.contains(&c))
        .to_string()
}

/// Parse a timecode into an offset
///
/// Accepts `HH:MM:SS`, `MM:SS` and plain seconds, each with an optional
/// fractional part (`00:12:30.500`). Minutes and seconds after the leading
/// component must be below 60.
pub fn parse_timecode(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds: u64 = 0;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let component: u64 = part.parse().ok()?;
        if index > 0 && component >= 60 {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(component)?;
    }

    let nanos = match fraction {
        None => 0,
        Some(digits)
            if !digits.is_empty()
                && digits.len() <= 9
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            let value: u32 = digits.parse().ok()?;
            value * 10u32.pow(9 - digits.len() as u32)
        }
        Some(_) => return None,
    };

    Some(Duration::new(seconds, nanos))
}

/// Turn a timecode map into chapter marks ordered by start offset
///
/// Entries whose key is not a valid timecode are skipped.
pub fn timecode_map_to_marks(timecodes: &TimecodeMap) -> Vec<ChapterMark> {
    let mut marks: Vec<ChapterMark> = timecodes
        .iter()
        .filter_map(|(timecode, title)| {
            Some(ChapterMark {
                start: parse_timecode(timecode)?,
                title: title.clone(),
                href: None,
                image: None,
            })
        })
        .collect();
    marks.sort_by_key(|mark| mark.start);
    marks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> TimecodeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // === Extraction ===

    #[test]
    fn extracts_timecodes_split_by_br() {
        assert_eq!(
            extract_timecodes("00:01:00 Intro<br>00:02:00 Chapter Two"),
            map(&[("00:01:00", "Intro"), ("00:02:00", "Chapter Two")])
        );
    }

    #[test]
    fn first_occurrence_wins() {
        assert_eq!(
            extract_timecodes("00:01:00 Intro\n00:01:00 Duplicate"),
            map(&[("00:01:00", "Intro")])
        );
    }

    #[test]
    fn text_without_timecodes_yields_empty_map() {
        assert!(extract_timecodes("no timecodes here").is_empty());
        assert!(extract_timecodes("").is_empty());
    }

    #[test]
    fn timecodes_on_one_line_split_titles() {
        assert_eq!(
            extract_timecodes("00:00 Welcome 05:30 News 12:45 Outro"),
            map(&[("00:00", "Welcome"), ("05:30", "News"), ("12:45", "Outro")])
        );
    }

    #[test]
    fn markup_and_separators_are_stripped() {
        let notes = "<p>(00:00:00) <b>Intro</b></p><ul><li>[00:03:15] - Q&amp;A &ndash; part 1</li><li>00:10:00: Wrap-up |</li></ul>";

        assert_eq!(
            extract_timecodes(notes),
            map(&[
                ("00:00:00", "Intro"),
                ("00:03:15", "Q&A \u{2013} part 1"),
                ("00:10:00", "Wrap-up"),
            ])
        );
    }

    #[test]
    fn br_variants_are_line_breaks() {
        assert_eq!(
            extract_timecodes("01:00 A<BR/>02:00 B<br />03:00 C"),
            map(&[("01:00", "A"), ("02:00", "B"), ("03:00", "C")])
        );
    }

    #[test]
    fn timecodes_without_titles_are_dropped() {
        assert!(extract_timecodes("00:01:00\n00:02:00 -").is_empty());
    }

    #[test]
    fn numbers_glued_to_digits_are_not_timecodes() {
        assert!(extract_timecodes("call 123:45 now").is_empty());
        assert!(extract_timecodes("at 10:30am sharp").is_empty());
        assert!(extract_timecodes("100:00:00 Marathon").is_empty());
    }

    #[test]
    fn linked_timecodes_use_the_visible_text() {
        let notes = r##"<a href="#t=00:01:00">00:01:00</a> Intro<br><a href="#t=00:05:00">00:05:00</a> Main"##;

        assert_eq!(
            extract_timecodes(notes),
            map(&[("00:01:00", "Intro"), ("00:05:00", "Main")])
        );
    }

    // === Parsing ===

    #[test]
    fn parse_timecode_accepts_common_forms() {
        assert_eq!(parse_timecode("01:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_timecode("12:34"), Some(Duration::from_secs(754)));
        assert_eq!(parse_timecode("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_timecode("75:00"), Some(Duration::from_secs(4500)));
        assert_eq!(
            parse_timecode("01:02:03.500"),
            Some(Duration::from_millis(3_723_500))
        );
    }

    #[test]
    fn parse_timecode_rejects_garbage() {
        assert_eq!(parse_timecode(""), None);
        assert_eq!(parse_timecode("1:2:3:4"), None);
        assert_eq!(parse_timecode("00:61"), None);
        assert_eq!(parse_timecode("ab:cd"), None);
        assert_eq!(parse_timecode("00:01."), None);
        assert_eq!(parse_timecode("00::01"), None);
    }

    #[test]
    fn marks_are_sorted_by_start() {
        let marks = timecode_map_to_marks(&map(&[
            ("10:00", "Later"),
            ("1:00:00", "Latest"),
            ("00:30", "Early"),
        ]));

        let titles: Vec<_> = marks.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Early", "Later", "Latest"]);
    }
}
