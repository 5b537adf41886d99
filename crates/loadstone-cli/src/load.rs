//! `loadstone load` — replay an on-disk API archive into the store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use loadstone_core::{BatchLoader, FsArchive, LoaderConfig, PreprocessPolicy, ProgressSink};
use loadstone_store::DgraphClient;

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Path to the directory containing the downloaded API data.
    #[arg(long, default_value = "./api-data/data")]
    data: PathBuf,

    /// URL prefix the archived documents reference each other under.
    #[arg(long, default_value = "/api/v2")]
    url_prefix: String,

    /// Strip an additional field before submission (repeatable).
    #[arg(long)]
    skip_field: Vec<String>,

    /// Worker threads per entity type (0 = one per CPU).
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Skip applying the baseline schema.
    #[arg(long)]
    no_schema: bool,

    /// Hide progress bars.
    #[arg(long)]
    quiet: bool,
}

pub fn run(store_url: &str, args: &LoadArgs) -> Result<()> {
    let store = DgraphClient::new(store_url)
        .with_context(|| format!("could not connect to store at {store_url}"))?;

    // The archive mirrors the URL hierarchy, so the prefix locates the
    // batch root inside the data directory.
    let archive_root = args
        .data
        .join(args.url_prefix.trim_start_matches('/'));
    let source = FsArchive::new(&archive_root);

    let mut policy = PreprocessPolicy::default();
    for field in &args.skip_field {
        policy.skip_fields.insert(field.clone());
    }

    if args.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build_global()
            .context("could not size the worker pool")?;
    }

    let config = LoaderConfig {
        url_prefix: args.url_prefix.clone(),
        policy,
        bootstrap_schema: !args.no_schema,
    };
    let loader = BatchLoader::new(&store, &source, config);
    let progress = BarProgress::new(args.quiet);

    let report = loader.load_batch("", &progress)?;
    progress.finish();

    for t in &report.types {
        let line = format!("{}: {} loaded, {} failed", t.typename, t.loaded, t.failed);
        if t.failed > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    println!(
        "{} {} loaded, {} failed",
        "total:".bold(),
        report.loaded,
        report.failed
    );
    for err in report.errors {
        eprintln!("{} {:#}", "error:".red().bold(), anyhow::Error::new(err));
    }

    Ok(())
}

/// One indicatif bar per entity type, advanced from worker threads.
struct BarProgress {
    quiet: bool,
    current: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            current: Mutex::new(None),
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.current.lock().take() {
            bar.finish();
        }
    }
}

impl ProgressSink for BarProgress {
    fn begin_type(&self, typename: &str, total: usize) {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(
            ProgressStyle::with_template("{prefix:>20} [{bar:25}] {pos}/{len}")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar.set_prefix(typename.green().bold().to_string());

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.finish();
        }
        *current = Some(bar);
    }

    fn document_done(&self, _typename: &str) {
        if let Some(bar) = &*self.current.lock() {
            bar.inc(1);
        }
    }
}
