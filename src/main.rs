use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use futures::future::join_all;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use podparse::feed::is_stdin;
use podparse::{
    FeedParser, ParseOptions, PatternExtractor, PodcastRecord, SharedChapterExtractor,
    TimecodeMap, parse_feed_file, resolve_episode_chapters,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");

/// Parse podcast feeds into structured JSON records
#[derive(Parser, Debug)]
#[command(name = "podparse")]
#[command(about = "Parse podcast feeds into structured JSON records")]
#[command(version)]
struct Args {
    /// Paths to feed files, or "-" for standard input (default)
    feeds: Vec<String>,

    /// Resolve chapters per episode, scanning show notes when the feed has none
    #[arg(short, long)]
    chapters: bool,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Element name that delimits an episode (repeatable, default: item, entry)
    #[arg(long = "item-element", value_name = "NAME")]
    item_elements: Vec<String>,

    /// Maximum element nesting depth
    #[arg(long, default_value = "256")]
    max_depth: usize,

    /// Quiet mode - suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

/// JSON document emitted for each feed
#[derive(Serialize)]
struct FeedReport<'a> {
    source: &'a str,
    podcast: &'a PodcastRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    chapters: Option<Vec<TimecodeMap>>,
}

fn parse_options(args: &Args) -> ParseOptions {
    let mut options = ParseOptions {
        max_depth: args.max_depth,
        ..Default::default()
    };
    if !args.item_elements.is_empty() {
        options.item_elements = args.item_elements.clone();
    }
    options
}

async fn parse_source(parser: FeedParser, source: String) -> Result<PodcastRecord> {
    if is_stdin(&source) {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .context("Failed to read feed from standard input")?;
        return tokio::task::spawn_blocking(move || parser.parse_bytes(&bytes))
            .await
            .context("Feed parser task failed")?
            .context("Failed to parse feed from standard input");
    }

    let path = PathBuf::from(&source);
    tokio::task::spawn_blocking(move || parse_feed_file(&parser, &path))
        .await
        .context("Feed parser task failed")?
        .with_context(|| format!("Failed to parse feed {source}"))
}

async fn resolve_chapters(
    podcast: &PodcastRecord,
    extractor: &SharedChapterExtractor,
) -> Vec<TimecodeMap> {
    join_all(
        podcast
            .episodes
            .iter()
            .map(|episode| resolve_episode_chapters(episode, extractor.as_ref())),
    )
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = Args::parse();
    if args.feeds.is_empty() {
        args.feeds.push("-".to_string());
    }
    if args.feeds.iter().filter(|source| is_stdin(source)).count() > 1 {
        anyhow::bail!("Standard input can only be read once");
    }

    if !args.quiet {
        eprintln!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podparse".bold().magenta(),
            "- Podcast Feed Parser".dimmed()
        );
    }

    // One parser per input; parsers share no state
    let parser = FeedParser::with_options(parse_options(&args));
    let results = join_all(
        args.feeds
            .iter()
            .map(|source| parse_source(parser.clone(), source.clone())),
    )
    .await;

    let extractor = PatternExtractor::shared();
    let mut failed = 0;
    for (source, result) in args.feeds.iter().zip(results) {
        let podcast = match result {
            Ok(podcast) => podcast,
            Err(e) => {
                failed += 1;
                if !args.quiet {
                    eprintln!("{FAILURE}{} - {}", source.yellow(), format!("{e:#}").red());
                }
                continue;
            }
        };

        let chapters = if args.chapters {
            Some(resolve_chapters(&podcast, &extractor).await)
        } else {
            None
        };

        let report = FeedReport {
            source,
            podcast: &podcast,
            chapters,
        };
        let json = if args.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        }
        .context("Failed to serialize feed record")?;
        println!("{json}");

        if !args.quiet {
            eprintln!(
                "{SUCCESS}{} • {} episodes",
                podcast.title().unwrap_or(source).bold().green(),
                podcast.episodes.len().to_string().cyan()
            );
        }
    }

    if failed > 0 && failed == args.feeds.len() {
        std::process::exit(1);
    }

    Ok(())
}
