use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikistash::cache::PageCache;
use wikistash::config::Settings;
use wikistash::models::ArtifactKind;
use wikistash::parser::DumpFormat;
use wikistash::splitter::{run_split, SplitOptions};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikistash")]
#[command(about = "Split MediaWiki XML dumps into a sharded on-disk page cache")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every page of a dump into the cache
    Split(SplitArgs),
    /// Print a cached page's markup or structured data
    Get(GetArgs),
    /// List cached keys starting with a partial title
    Candidates(TitleArgs),
    /// Delete all cached artifacts for a title
    Reset(TitleArgs),
}

#[derive(Args)]
struct CacheArgs {
    /// Cache root directory (overrides the settings file)
    #[arg(short, long)]
    output: Option<String>,

    /// Directory branching depth under the cache root
    #[arg(long)]
    depth: Option<usize>,
}

#[derive(Args)]
struct SplitArgs {
    /// Path to the dump file (.xml.bz2 unless told otherwise)
    filename: PathBuf,

    #[command(flatten)]
    cache: CacheArgs,

    /// The file is already-decompressed XML
    #[arg(short = 'x', long)]
    xml: bool,

    /// The file is gzip-compressed
    #[arg(short = 'z', long, conflicts_with = "xml")]
    gzip: bool,

    /// Overwrite pages that already exist in the cache
    #[arg(short = 'u', long)]
    update: bool,

    /// Ignore redirection pages
    #[arg(short = 'r', long)]
    skip_redirects: bool,

    /// Stop after this many records (for testing)
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args)]
struct GetArgs {
    /// Title of the page to read
    title: String,

    #[command(flatten)]
    cache: CacheArgs,

    /// Read the structured artifact instead of raw markup
    #[arg(short, long)]
    structured: bool,
}

#[derive(Args)]
struct TitleArgs {
    /// Title (or partial title) to operate on
    title: String,

    #[command(flatten)]
    cache: CacheArgs,
}

fn load_settings(config: Option<&Path>, cache: &CacheArgs) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(output) = &cache.output {
        settings.cache_dir = output.clone();
    }
    if let Some(depth) = cache.depth {
        settings.dir_nesting = depth;
    }
    Ok(settings)
}

fn run_split_cmd(config: Option<&Path>, args: SplitArgs) -> Result<()> {
    let settings = load_settings(config, &args.cache)?;
    let mut cache = PageCache::from_settings(&settings);

    let format = if args.xml {
        DumpFormat::Plain
    } else if args.gzip {
        DumpFormat::Gzip
    } else {
        DumpFormat::detect(&args.filename)
    };

    let opts = SplitOptions {
        format,
        overwrite: args.update,
        skip_redirects: args.skip_redirects,
        limit: args.limit,
    };

    let start = Instant::now();
    let stats = run_split(&args.filename, &mut cache, &opts)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Elapsed:            {:.2}s", duration.as_secs_f64());
    println!();
    println!("Records seen:       {}", stats.records_seen);
    println!("Pages written:      {}", stats.pages_written);
    println!("Already cached:     {}", stats.pages_skipped_existing);
    println!("Missing text:       {}", stats.pages_missing_text);
    println!("Write failures:     {}", stats.write_failures);
    println!("Unknown titles:     {}", stats.unknown_titles);

    Ok(())
}

fn run_get(config: Option<&Path>, args: GetArgs) -> Result<()> {
    let settings = load_settings(config, &args.cache)?;
    let cache = PageCache::from_settings(&settings);

    let kind = if args.structured {
        ArtifactKind::StructuredData
    } else {
        ArtifactKind::RawMarkup
    };

    match cache.read(&args.title, kind)? {
        Some(bytes) => {
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
        None => bail!("No cached entry for '{}'", args.title),
    }
}

fn run_candidates(config: Option<&Path>, args: TitleArgs) -> Result<()> {
    let settings = load_settings(config, &args.cache)?;
    let cache = PageCache::from_settings(&settings);

    // enumeration order is whatever the filesystem gives; sort for display
    let mut candidates: Vec<String> = cache.list_candidates(&args.title).collect();
    candidates.sort();
    for candidate in candidates {
        println!("{candidate}");
    }
    Ok(())
}

fn run_reset(config: Option<&Path>, args: TitleArgs) -> Result<()> {
    let settings = load_settings(config, &args.cache)?;
    let mut cache = PageCache::from_settings(&settings);
    cache.reset(&args.title)?;
    info!(title = %args.title, "Cached artifacts removed");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Split(args) => run_split_cmd(config, args),
        Commands::Get(args) => run_get(config, args),
        Commands::Candidates(args) => run_candidates(config, args),
        Commands::Reset(args) => run_reset(config, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
