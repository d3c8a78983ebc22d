// src/cli.rs
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;

use crate::config::consts::{MAX_PAGES, PAGE_SIZE, STORE_DIR};
use crate::config::{AppOptions, EnrichScope, ExportFormat, PagePolicy};
use crate::logging::init_logging;
use crate::progress::Progress;
use crate::runner;

/// Scrape the housing-condition report: territories, the house listing and
/// optional per-house details, written as CSV/TSV tables.
#[derive(Debug, Parser)]
#[command(name = "housing_scrape", version, about)]
pub struct Args {
    /// TOML file with options; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory for tables and snapshots
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Territory ids to restrict the house listing to (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub territories: Vec<String>,

    /// Territory ids the territories report is scoped to (comma separated; default top level)
    #[arg(long, value_delimiter = ',')]
    pub report_territories: Vec<String>,

    /// Include federal districts in both the territories report and the house listing
    #[arg(long)]
    pub with_federal_districts: bool,

    #[arg(long)]
    pub year_from: Option<i32>,

    #[arg(long)]
    pub year_to: Option<i32>,

    /// Items per page for looped paging
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Upper bound on pages requested
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Fetch the listing in one request of at most N items
    #[arg(long, value_name = "N", conflicts_with_all = ["page_size", "max_pages"])]
    pub single_shot: Option<u32>,

    /// Skip the house listing (territories only)
    #[arg(long)]
    pub no_houses: bool,

    /// Detail enrichment: none | all | first:N | keys:a,b,c
    #[arg(short, long, value_name = "SCOPE")]
    pub enrich: Option<String>,

    /// Concurrent detail requests (1 = sequential)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// csv | tsv
    #[arg(short, long)]
    pub format: Option<String>,

    #[arg(long)]
    pub no_headers: bool,

    /// Do not write raw JSON payloads
    #[arg(long)]
    pub no_snapshots: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Log filter, e.g. `info` or `housing_scrape=debug,reqwest=warn`
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// No progress output and no log echo on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Config file (or defaults) with the flags applied on top.
    pub fn into_options(self) -> crate::error::Result<AppOptions> {
        let mut opts = match &self.config {
            Some(path) => AppOptions::load(path)?,
            None => AppOptions::default(),
        };

        if let Some(out) = self.out {
            opts.export.out_dir = out;
        }
        if !self.territories.is_empty() {
            opts.fetch.house_territories = self.territories;
        }
        if !self.report_territories.is_empty() {
            opts.fetch.report_territories = self.report_territories;
        }
        if self.with_federal_districts {
            opts.fetch.with_federal_districts = true;
        }
        if let Some(y) = self.year_from {
            opts.fetch.year_from = y;
        }
        if let Some(y) = self.year_to {
            opts.fetch.year_to = y;
        }

        if let Some(n) = self.single_shot {
            opts.fetch.pages = PagePolicy::SingleShot { max_items: n };
        } else if self.page_size.is_some() || self.max_pages.is_some() {
            let (size, max) = match opts.fetch.pages {
                PagePolicy::Looped { page_size, max_pages } => (page_size, max_pages),
                PagePolicy::SingleShot { .. } => (PAGE_SIZE, MAX_PAGES),
            };
            opts.fetch.pages = PagePolicy::Looped {
                page_size: self.page_size.unwrap_or(size),
                max_pages: self.max_pages.unwrap_or(max),
            };
        }
        if self.no_houses {
            opts.fetch.houses = false;
        }

        if let Some(scope) = self.enrich {
            opts.enrich.scope = scope.parse::<EnrichScope>()?;
        }
        if let Some(w) = self.workers {
            opts.enrich.workers = w.max(1);
        }

        if let Some(f) = self.format {
            opts.export.format = f.parse::<ExportFormat>()?;
        }
        if self.no_headers {
            opts.export.include_headers = false;
        }
        if self.no_snapshots {
            opts.export.snapshots = false;
        }
        if self.insecure {
            opts.session.verify_tls = false;
        }
        Ok(opts)
    }
}

/// Progress on stderr, overwritten in place.
#[derive(Default)]
struct CliProgress {
    total: usize,
    seen: usize,
}

impl CliProgress {
    fn tick(&mut self) {
        self.seen += 1;
        eprint!("\r  {}/{}", self.seen, self.total);
        let _ = std::io::stderr().flush();
    }
}

impl Progress for CliProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        self.seen = 0;
    }
    fn log(&mut self, msg: &str) {
        eprintln!("{msg}");
    }
    fn item_done(&mut self, _key: &str) {
        self.tick();
    }
    fn item_failed(&mut self, key: &str, reason: &str) {
        self.tick();
        eprintln!("  {key}: {reason}");
    }
    fn finish(&mut self) {
        if self.total > 0 {
            eprintln!();
        }
    }
}

pub fn run() -> color_eyre::Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;
    init_logging(std::path::Path::new(STORE_DIR), &args.log_level, !quiet)
        .wrap_err("could not start logging")?;

    let opts = args.into_options()?;
    let mut progress = CliProgress::default();
    let sink: Option<&mut dyn Progress> = if quiet { None } else { Some(&mut progress) };

    let summary = runner::run(&opts, sink)?;
    for line in summary.lines() {
        println!("{line}");
    }
    Ok(())
}
