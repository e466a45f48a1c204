use std::fs::File;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pagecache::synthetic::SyntheticProvider;
use pagecache::{CacheConfig, DocumentId, DocumentSession, PageView};

/// Replay a page-flipping session against a synthetic document
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of pages in the synthetic document
    #[arg(long, default_value_t = 20)]
    pages: usize,

    /// Simulated render latency per page, in milliseconds
    #[arg(long, default_value_t = 40)]
    latency_ms: u64,

    /// Navigation script: page numbers, `+`/`-` to flip, `wN` for a width
    /// change, `c` to clear
    #[arg(long, default_value = "5,6,7,w1024,7,6,c,6")]
    script: String,

    /// Pause between steps so prefetch can catch up, in milliseconds
    #[arg(long, default_value_t = 200)]
    think_ms: u64,

    /// Pages that always fail to render
    #[arg(long, value_delimiter = ',')]
    broken: Vec<usize>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured prefetch radius
    #[arg(long)]
    radius: Option<usize>,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value = "pagecache.log")]
    log_file: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Go(usize),
    Next,
    Prev,
    Width(u32),
    Clear,
}

fn parse_script(script: &str) -> Result<Vec<Step>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| -> Result<Step> {
            let step = match token {
                "+" => Step::Next,
                "-" => Step::Prev,
                "c" => Step::Clear,
                _ => {
                    if let Some(width) = token.strip_prefix('w') {
                        Step::Width(width.parse().with_context(|| format!("bad width {token:?}"))?)
                    } else {
                        Step::Go(token.parse().with_context(|| format!("bad step {token:?}"))?)
                    }
                }
            };
            Ok(step)
        })
        .collect()
}

fn report(label: &str, view: Option<PageView>, started: Instant) {
    let elapsed = started.elapsed().as_millis();
    match view {
        Some(view) if view.is_displayed() => println!(
            "{label:>8} -> page {:>3} {} ({elapsed} ms)",
            view.page,
            if view.cache_hit { "hit " } else { "miss" },
        ),
        Some(view) => println!("{label:>8} -> page {:>3} FAILED, retry available", view.page),
        None => println!("{label:>8} -> (no change)"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("cannot create log file {:?}", args.log_file))?,
    )?;
    info!("Starting pagecache demo");

    let mut config = CacheConfig::load_or_default(args.config.as_deref());
    if let Some(radius) = args.radius {
        config.prefetch_radius = radius;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    let config = config.normalized();

    let steps = parse_script(&args.script)?;
    if steps.is_empty() {
        bail!("empty navigation script");
    }

    let provider = SyntheticProvider {
        latency: Duration::from_millis(args.latency_ms),
        broken: args.broken.clone(),
    };
    let id = DocumentId::new(format!("synthetic:{}", args.pages));
    let mut session = DocumentSession::open(provider, id, &config).inspect_err(|e| {
        error!("Failed to open document: {e}");
    })?;

    println!(
        "{} pages, {} workers, radius {}, {}px @ {}",
        session.page_count(),
        session.controller().worker_count(),
        config.prefetch_radius,
        config.initial_width,
        config.scale
    );

    for step in steps {
        let started = Instant::now();
        match step {
            Step::Go(page) => report(&page.to_string(), Some(session.show_page(page)), started),
            Step::Next => report("+", session.next_page(), started),
            Step::Prev => report("-", session.prev_page(), started),
            Step::Width(width) => {
                report(&format!("w{width}"), session.set_viewport_width(width), started);
            }
            Step::Clear => {
                session.clear();
                println!("{:>8} -> cache cleared", "c");
            }
        }
        thread::sleep(Duration::from_millis(args.think_ms));
    }

    let stats = session.controller().stats();
    println!("{stats:#?}");
    println!("cached: {:?}", session.controller().cached_pages());
    info!("Finished: {stats:?}");

    Ok(())
}
