mod context;
mod events;
mod load;
mod parse;
mod record;

pub use context::{ParseContext, Scope};
pub use events::{FeedEvent, FeedEvents};
pub use load::{is_stdin, parse_feed_file, read_feed_file};
pub use parse::{FeedParser, ParseOptions, parse_feed, parse_feed_bytes};
pub use record::{
    AttributeMap, CONTENT_KEY, ENCLOSURE_KEY, Enclosure, EpisodeRecord, PodcastRecord, Value,
    parse_feed_date,
};
