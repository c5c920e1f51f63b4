pub mod chapters;
pub mod error;
pub mod feed;

// Re-export main types for convenience
pub use chapters::{
    ChapterExtractor, ChapterMark, ChapterModel, ModelExtractor, ModelExtractorOptions,
    PatternExtractor, SharedChapterExtractor, TimecodeMap, extract_timecodes, parse_timecode,
    resolve_episode_chapters, timecode_map_to_marks,
};
pub use error::{FeedError, ModelError};
pub use feed::{
    AttributeMap, Enclosure, EpisodeRecord, FeedParser, ParseOptions, PodcastRecord, Value,
    parse_feed, parse_feed_bytes, parse_feed_file,
};
