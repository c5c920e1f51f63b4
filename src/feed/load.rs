// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::error::FeedError;

use super::parse::FeedParser;
use super::record::PodcastRecord;

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse a podcast feed from a local file
pub fn parse_feed_file(parser: &FeedParser, path: &Path) -> Result<PodcastRecord, FeedError> {
    let bytes = read_feed_file(path)?;
    parser.parse_bytes(&bytes)
}

/// Determine if a feed source names standard input
pub fn is_stdin(source: &str) -> bool {
    source == "-"
}
