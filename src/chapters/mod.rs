mod extractor;
mod timecode;

pub use extractor::{
    ChapterExtractor, ChapterModel, ModelExtractor, ModelExtractorOptions, PatternExtractor,
    SharedChapterExtractor, resolve_episode_chapters,
};
pub use timecode::{
    ChapterMark, TimecodeMap, extract_timecodes, parse_timecode, timecode_map_to_marks,
};
