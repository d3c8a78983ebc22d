// src/runner.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde_json::Value;

use crate::{
    config::{AppOptions, EnrichScope},
    config::consts::{ENRICHED_FILE, HOUSES_FILE, TERRITORIES_FILE},
    core::net::{ReqwestTransport, Transport},
    dataset::Dataset,
    enrich::{CancelToken, DetailEnricher, EnrichReport, HttpDetails},
    error::Result,
    fetch::{house_items, PaginatedFetcher},
    file::export_dataset,
    filter::RequestFilter,
    normalize::{territory_children, Normalizer},
    progress::Progress,
    session::with_session,
    store::{page_stem, save_snapshot},
};

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub territories: usize,
    pub house_pages: usize,
    pub houses: usize,
    pub enrich: Option<EnrichReport>,
    pub files_written: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Human-readable counts, one line per stage.
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("Territories: {}", self.territories),
            format!("Houses: {} in {} page(s)", self.houses, self.house_pages),
        ];
        if let Some(r) = &self.enrich {
            out.push(format!(
                "Enriched: {}/{} ({} failed{})",
                r.enriched,
                r.requested,
                r.failures.len(),
                if r.cancelled { format!(", cancelled, {} skipped", r.skipped) } else { String::new() }
            ));
            if let Some(e) = r.partial_error() {
                out.push(e.to_string());
            }
        }
        for p in &self.files_written {
            out.push(format!("Wrote {}", p.display()));
        }
        out.push(format!("Total time spent: {:.3}s", self.elapsed.as_secs_f64()));
        out
    }
}

/// Run against the live API.
pub fn run(opts: &AppOptions, progress: Option<&mut (dyn Progress + '_)>) -> Result<RunSummary> {
    let transport = ReqwestTransport::new(&opts.session)?;
    run_with(opts, transport, &CancelToken::new(), progress)
}

/// One full run over `transport`.
///
/// Territory and listing stages are fatal: any error aborts before a table
/// is written. Enrichment failures are collected in the summary and the
/// enriched table is still written.
pub fn run_with<T: Transport>(
    opts: &AppOptions,
    transport: T,
    cancel: &CancelToken,
    mut progress: Option<&mut (dyn Progress + '_)>,
) -> Result<RunSummary> {
    let started = Instant::now();
    let depth = opts.fetch.flatten_depth;
    let export = &opts.export;

    let mut summary = with_session(&opts.session, transport, |session| {
        let mut summary = RunSummary::default();
        let fetcher = PaginatedFetcher::new(session, &opts.fetch.territories_url, &opts.fetch.houses_url);

        // ---------- Territories ----------
        let raw = fetcher.fetch_territories(&RequestFilter::territories_report(&opts.fetch))?;
        snapshot(opts, "territories", &raw);
        let territories = Normalizer::territories()
            .with_max_depth(depth)
            .normalize_batch(territory_children(&raw)?)?;
        summary.territories = territories.len();
        info!("Territories: {} row(s), {} column(s)", territories.len(), territories.columns().len());

        // ---------- Houses ----------
        let mut houses: Option<Dataset> = None;
        if opts.fetch.houses {
            let filter = RequestFilter::house_listing(&opts.fetch);
            let pages = fetcher.fetch_house_pages(&filter, opts.fetch.pages, progress.as_deref_mut())?;
            for (i, page) in pages.iter().enumerate() {
                snapshot(opts, &page_stem(i + 1), page);
            }
            let items = house_items(&pages)?;
            let ds = Normalizer::houses().with_max_depth(depth).normalize_batch(&items)?;
            summary.house_pages = pages.len();
            summary.houses = ds.len();
            info!("Houses: {} row(s), {} column(s)", ds.len(), ds.columns().len());
            houses = Some(ds);
        }

        // Every fatal stage is behind us; tables from here on are complete.
        summary.files_written.push(export_dataset(export, TERRITORIES_FILE, &territories)?);

        if let Some(mut ds) = houses {
            summary.files_written.push(export_dataset(export, HOUSES_FILE, &ds)?);

            if opts.enrich.scope != EnrichScope::None {
                let enricher = DetailEnricher::new(&opts.enrich)
                    .with_flatten_depth(depth)
                    .with_cancel(cancel.clone());
                let source = HttpDetails::new(session, &opts.enrich.detail_url);
                let report = enricher.enrich(&mut ds, &opts.enrich.scope, &source, progress.as_deref_mut());
                if let Some(e) = report.partial_error() {
                    warn!("{e}");
                }
                summary.files_written.push(export_dataset(export, ENRICHED_FILE, &ds)?);
                summary.enrich = Some(report);
            }
        } else if opts.enrich.scope != EnrichScope::None {
            warn!("Enrichment requested but the house listing is disabled; skipping");
        }

        Ok(summary)
    })?;

    summary.elapsed = started.elapsed();
    info!("Run finished in {:.3}s", summary.elapsed.as_secs_f64());
    Ok(summary)
}

/// Best effort: a snapshot that cannot be written is logged, not fatal.
fn snapshot(opts: &AppOptions, stem: &str, data: &Value) {
    if !opts.export.snapshots {
        return;
    }
    if let Err(e) = save_snapshot(&opts.export.out_dir, stem, data) {
        warn!("Snapshot {stem} not written: {e}");
    }
}
