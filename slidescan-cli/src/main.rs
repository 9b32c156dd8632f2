//! Slidescan CLI Tool
//!
//! Command-line interface for extracting slide decks from lecture videos.

mod progress;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use progress::BarProgress;
use slidescan_core::{
    export_stills, Chapter, Manifest, Materialization, ScanWindow, Selection, SlideDeck,
    StillFormat, TimeRange,
};
use slidescan_scanner::progress::{format_duration, format_timestamp};
use slidescan_scanner::{
    CancelFlag, DetectionConfig, FrameSource, ScanConfig, SkipConfig, SlideScanner, StillConfig,
    Termination, VideoReader,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "slidescan")]
#[command(about = "Slidescan - extract deduplicated slide snapshots from lecture videos")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a video and store every new slide in a deck file
    Scan(ScanArgs),

    /// Show stream properties and chapters of a video
    Inspect {
        /// Input video file path
        input: PathBuf,
    },

    /// Show the contents of a deck file
    Info {
        /// Input deck file path
        input: PathBuf,

        /// Print the manifest as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Write the stills of a deck as image files plus manifest.json
    Extract {
        /// Input deck file path
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Input video file path
    input: PathBuf,

    /// Output deck file path
    #[arg(short, long)]
    output: PathBuf,

    /// Start of the range to scan, in seconds of the original video
    #[arg(long, conflicts_with_all = ["chapters", "segments"])]
    start: Option<f64>,

    /// End of the range to scan, in seconds of the original video [default: duration]
    #[arg(long, conflicts_with_all = ["chapters", "segments"])]
    end: Option<f64>,

    /// The input holds only the --start..--end part of the original video
    #[arg(long, requires = "end", conflicts_with_all = ["chapters", "segments"])]
    clipped: bool,

    /// Scan chapters A through B (zero-based, as listed by `inspect`)
    #[arg(
        long,
        value_name = "A[-B]",
        value_parser = parse_index_range,
        conflicts_with = "segments"
    )]
    chapters: Option<(usize, usize)>,

    /// Length of the buckets used by --segments, in seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_positive_seconds)]
    segment_length: Option<f64>,

    /// Scan fixed-length buckets A through B (zero-based)
    #[arg(
        long,
        value_name = "A[-B]",
        value_parser = parse_index_range,
        requires = "segment_length"
    )]
    segments: Option<(usize, usize)>,

    /// Per-pixel intensity difference that counts as change (10-100)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u8).range(10..=100))]
    sensitivity: u8,

    /// Percentage of the frame that must change to capture a slide (0-100]
    #[arg(long, default_value = "1.0", value_parser = parse_strictness)]
    strictness: f64,

    /// Seconds to jump after a frame that was not captured (1-5)
    #[arg(long, default_value = "2", value_parser = parse_min_skip)]
    min_skip: f64,

    /// Seconds to jump after a captured slide (5-60)
    #[arg(long, default_value = "10", value_parser = parse_max_skip)]
    max_skip: f64,

    /// Still image format
    #[arg(long, value_enum, default_value = "png")]
    format: FormatArg,

    /// JPEG/AVIF quality (1-100)
    #[arg(long, default_value = "85", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Also extract the stills into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
    Avif,
}

impl From<FormatArg> for StillFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Png => StillFormat::Png,
            FormatArg::Jpeg => StillFormat::Jpeg,
            FormatArg::Avif => StillFormat::Avif,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan(args) => scan_video(args)?,
        Commands::Inspect { input } => inspect_video(&input)?,
        Commands::Info { input, json } => show_deck(&input, json)?,
        Commands::Extract { input, output } => extract_deck(&input, &output)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn scan_video(args: ScanArgs) -> Result<()> {
    // Reject a reversed range before touching the input.
    if let Some(end) = args.end {
        TimeRange::new(args.start.unwrap_or(0.0), end).context("Invalid scan range")?;
    }

    println!("Scanning video: {}", args.input.display());
    println!("Output: {}", args.output.display());

    let mut reader = VideoReader::open(&args.input).context("Failed to open video file")?;
    let info = reader.info();
    println!(
        "Video info: {}x{} @ {:.3} fps, {}",
        info.width,
        info.height,
        info.frames_per_second,
        format_duration(info.duration_seconds)
    );

    let window = resolve_window(&args, reader.chapters(), info.duration_seconds)?;

    let config = ScanConfig {
        detection: DetectionConfig {
            sensitivity: args.sensitivity,
            strictness_percent: args.strictness,
        },
        skip: SkipConfig {
            min_skip_seconds: args.min_skip,
            max_skip_seconds: args.max_skip,
        },
        still: StillConfig {
            format: args.format.into(),
            quality: args.quality,
        },
        window,
    };

    let scanner = SlideScanner::new(config);
    let cancel = install_cancel_handler();
    let (deck, _) = scan_to_deck(&scanner, &mut reader, &cancel, &args.output)?;
    log::debug!("Reader finished using {:?} seeking", reader.seek_strategy());

    if let Some(dir) = args.export_dir {
        write_export(&deck, &dir)?;
    }

    Ok(())
}

/// Cancels the returned flag on Ctrl+C
fn install_cancel_handler() -> CancelFlag {
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_flag.cancel()) {
        log::warn!("Failed to install Ctrl+C handler: {err}");
    }
    cancel
}

/// Runs the scan and writes whatever it captured, also when cancelled
fn scan_to_deck<S: FrameSource + ?Sized>(
    scanner: &SlideScanner,
    source: &mut S,
    cancel: &CancelFlag,
    output: &Path,
) -> Result<(SlideDeck, Termination)> {
    let window = scanner.config().window;
    let started = Instant::now();
    let mut bar = BarProgress::new("Scanning");
    let result = scanner.scan(source, &mut bar, Some(cancel));
    bar.finish();
    let session = result.context("Failed to scan video")?;

    match session.termination {
        Termination::ReachedEnd => {}
        Termination::SourceExhausted => println!(
            "Video ended before {}, keeping what was found",
            format_timestamp(window.end_seconds + window.time_offset)
        ),
        Termination::Cancelled => println!("Scan cancelled, keeping what was found"),
    }
    println!(
        "Found {} slides in {} frames ({})",
        session.capture_count(),
        session.frames_examined,
        format_duration(started.elapsed().as_secs_f64())
    );

    let termination = session.termination;
    let deck = session.into_deck();
    let file = File::create(output).context("Failed to create output file")?;
    deck.write(BufWriter::new(file))
        .context("Failed to write slide deck")?;
    println!("Successfully wrote {}", output.display());

    Ok((deck, termination))
}

/// Turns the selection flags into the window to scan
fn resolve_window(args: &ScanArgs, chapters: &[Chapter], duration: f64) -> Result<ScanWindow> {
    let selection = if let Some((first, last)) = args.chapters {
        Selection::Chapters { first, last }
    } else if let Some((first, last)) = args.segments {
        let length_seconds = args
            .segment_length
            .context("--segments requires --segment-length")?;
        Selection::Segments {
            length_seconds,
            first,
            last,
        }
    } else {
        let start = args.start.unwrap_or(0.0);
        let end = match args.end {
            Some(end) => end,
            None if duration > 0.0 => duration,
            None => bail!("Video duration is unknown, pass --end"),
        };
        Selection::Explicit(TimeRange::new(start, end).context("Invalid scan range")?)
    };

    let range = selection
        .to_time_range(chapters, duration)
        .context("Invalid selection")?;
    let materialization = if args.clipped {
        Materialization::Clipped
    } else {
        Materialization::Full
    };

    Ok(ScanWindow::resolve(range, materialization)?)
}

fn inspect_video(input: &Path) -> Result<()> {
    let reader = VideoReader::open(input).context("Failed to open video file")?;
    let info = reader.info();

    println!("\n=== Video Information ===");
    println!("Resolution: {}x{}", info.width, info.height);
    println!("Frame rate: {:.3} fps", info.frames_per_second);
    println!("Frames: {}", info.frame_count);
    println!(
        "Duration: {} ({:.2} seconds)",
        format_timestamp(info.duration_seconds),
        info.duration_seconds
    );

    let chapters = reader.chapters();
    if chapters.is_empty() {
        println!("\nNo chapters");
    } else {
        println!("\n=== Chapters ===");
        for (i, chapter) in chapters.iter().enumerate() {
            println!(
                "  [{}] {} - {} {}",
                i,
                format_timestamp(chapter.start_seconds),
                format_timestamp(chapter.end_seconds),
                chapter.title.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}

fn read_deck(input: &Path) -> Result<SlideDeck> {
    let file = File::open(input).context("Failed to open deck file")?;
    SlideDeck::read(BufReader::new(file)).context("Failed to read slide deck")
}

fn show_deck(input: &Path, json: bool) -> Result<()> {
    let deck = read_deck(input)?;
    if json {
        let manifest = Manifest::from_deck(&deck);
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print_info(&deck);
    }
    Ok(())
}

fn extract_deck(input: &Path, output: &Path) -> Result<()> {
    let deck = read_deck(input)?;
    write_export(&deck, output)
}

fn write_export(deck: &SlideDeck, dir: &Path) -> Result<()> {
    let written = export_stills(&deck.captures, dir).context("Failed to write stills")?;
    Manifest::from_deck(deck)
        .write_to(&dir.join("manifest.json"))
        .context("Failed to write manifest")?;
    println!("Extracted {} slides to {}", written.len(), dir.display());
    Ok(())
}

fn print_info(deck: &SlideDeck) {
    let header = &deck.header;
    println!("\n=== Slide Deck Information ===");
    println!("Version: {}", header.version);
    println!("Resolution: {}x{}", header.width, header.height);
    println!("Frame rate: {:.3} fps", header.frames_per_second);
    println!(
        "Window: {} - {} (offset {:.2}s)",
        format_timestamp(header.window.start_seconds),
        format_timestamp(header.window.end_seconds),
        header.window.time_offset
    );
    println!("Slides: {}", deck.captures.len());

    let total_size = deck.captures.total_data_size();
    println!(
        "Total still size: {} bytes ({:.2} KB)",
        total_size,
        total_size as f64 / 1024.0
    );

    println!("\n=== Slides (first 10) ===");
    for capture in deck.captures.iter().take(10) {
        println!(
            "  [{}] {} frame {} {:?} {}x{}, {} bytes",
            capture.sequence,
            format_timestamp(capture.timestamp_seconds),
            capture.frame_index,
            capture.still.format,
            capture.still.width,
            capture.still.height,
            capture.still.data_size()
        );
    }
    if deck.captures.len() > 10 {
        println!("  ... and {} more slides", deck.captures.len() - 10);
    }
}

/// Parses `A` or `A-B` into an inclusive index range
fn parse_index_range(s: &str) -> std::result::Result<(usize, usize), String> {
    let parse = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("'{part}' is not a valid index"))
    };
    match s.split_once('-') {
        Some((first, last)) => Ok((parse(first)?, parse(last)?)),
        None => {
            let index = parse(s)?;
            Ok((index, index))
        }
    }
}

fn parse_seconds_within(s: &str, min: f64, max: f64) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("{value} is not in {min}..={max}"));
    }
    Ok(value)
}

fn parse_min_skip(s: &str) -> std::result::Result<f64, String> {
    parse_seconds_within(s, 1.0, 5.0)
}

fn parse_max_skip(s: &str) -> std::result::Result<f64, String> {
    parse_seconds_within(s, 5.0, 60.0)
}

fn parse_strictness(s: &str) -> std::result::Result<f64, String> {
    let value = parse_seconds_within(s, 0.0, 100.0)?;
    if value == 0.0 {
        return Err("strictness must be greater than 0".to_string());
    }
    Ok(value)
}

fn parse_positive_seconds(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{value} must be a positive number of seconds"));
    }
    Ok(value)
}
