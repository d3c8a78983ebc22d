// src/enrich.rs
//! Per-house detail enrichment.
//!
//! Two phases:
//! 1. **Fetch**: one detail request per key, sequentially or from a bounded
//!    pool of scoped worker threads sharing the session. Results land in a
//!    map keyed by house id, so completion order does not matter.
//! 2. **Merge**: results are applied to the dataset in the dataset's row
//!    order with [`Dataset::combine_first`]. Only this thread mutates the
//!    dataset.
//!
//! A failing key is recorded and skipped; the row stays as listed.
//! A [`CancelToken`] is checked before every fetch. Anything fetched before
//! cancellation is still merged.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::{EnrichOptions, EnrichScope};
use crate::config::consts::{FLATTEN_DEPTH, HOUSE_KEY_FIELD};
use crate::core::net::Transport;
use crate::dataset::{Dataset, Missingness, Record};
use crate::error::{Error, Result};
use crate::normalize::Normalizer;
use crate::progress::Progress;
use crate::session::SessionClient;

/* ---------------- Cancellation ---------------- */

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/* ---------------- Detail source ---------------- */

/// Where detail payloads come from. Shared by every worker.
pub trait DetailSource: Sync {
    fn fetch_detail(&self, key: &str) -> Result<Value>;
}

/// GET `<base_url><key>` over the run's session.
pub struct HttpDetails<'s, T: Transport> {
    session: &'s SessionClient<T>,
    base_url: String,
}

impl<'s, T: Transport> HttpDetails<'s, T> {
    pub fn new(session: &'s SessionClient<T>, base_url: &str) -> Self {
        Self { session, base_url: base_url.to_string() }
    }
}

impl<T: Transport> DetailSource for HttpDetails<'_, T> {
    fn fetch_detail(&self, key: &str) -> Result<Value> {
        self.session.get_json(&format!("{}{}", self.base_url, key))
    }
}

/* ---------------- Report ---------------- */

#[derive(Debug)]
pub struct EnrichFailure {
    pub key: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct EnrichReport {
    /// Keys selected by the scope.
    pub requested: usize,
    /// Rows that received a detail merge.
    pub enriched: usize,
    pub failures: Vec<EnrichFailure>,
    /// Keys never attempted because of cancellation.
    pub skipped: usize,
    pub cancelled: bool,
    /// Columns that the details added to the schema, in order.
    pub columns_added: Vec<String>,
}

impl EnrichReport {
    pub fn failed_keys(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.key.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// `PartialEnrichment` naming the failed keys, if any failed.
    pub fn partial_error(&self) -> Option<Error> {
        if self.failures.is_empty() {
            None
        } else {
            Some(Error::PartialEnrichment { failed: self.failed_keys() })
        }
    }
}

/* ---------------- Enricher ---------------- */

type Fetched = (String, Result<Record>);

#[derive(Clone, Debug)]
pub struct DetailEnricher {
    normalizer: Normalizer,
    workers: usize,
    pause: Duration,
    jitter_ms: u64,
    missing: Missingness,
    cancel: CancelToken,
}

impl DetailEnricher {
    pub fn new(opts: &EnrichOptions) -> Self {
        Self {
            normalizer: Normalizer::house_detail(&opts.detail_key_field),
            workers: opts.workers.max(1),
            pause: Duration::from_millis(opts.request_pause_ms),
            jitter_ms: opts.jitter_ms,
            missing: if opts.empty_string_is_missing {
                Missingness::NullOrEmpty
            } else {
                Missingness::NullOnly
            },
            cancel: CancelToken::new(),
        }
        .with_flatten_depth(FLATTEN_DEPTH)
    }

    pub fn with_flatten_depth(mut self, depth: usize) -> Self {
        self.normalizer = self.normalizer.with_max_depth(depth);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch and merge details for the keys `scope` selects.
    pub fn enrich<S: DetailSource>(
        &self,
        ds: &mut Dataset,
        scope: &EnrichScope,
        source: &S,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> EnrichReport {
        let mut report = EnrichReport::default();
        let (keys, unknown) = select_keys(ds, scope);
        report.requested = keys.len() + unknown.len();

        for key in unknown {
            warn!("Enrich: key {key} is not in the dataset");
            report.failures.push(EnrichFailure {
                key: key.clone(),
                error: Error::schema(format!("key {key} not in dataset")),
            });
        }
        if keys.is_empty() {
            return report;
        }

        if let Some(p) = progress.as_deref_mut() {
            p.begin(keys.len());
        }
        let normalizer = self.normalizer.clone().with_key_column(ds.key_column());

        let fetched = if self.workers > 1 && keys.len() > 1 {
            self.fetch_pooled(&keys, source, &normalizer, progress.as_deref_mut())
        } else {
            self.fetch_sequential(&keys, source, &normalizer, progress.as_deref_mut())
        };

        report.cancelled = self.cancel.is_cancelled();
        report.skipped = keys.len() - fetched.len();
        if report.cancelled {
            info!("Enrich cancelled: {} fetched, {} skipped", fetched.len(), report.skipped);
        }

        self.merge(ds, fetched, &mut report);

        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        info!(
            "Enrich: {} requested, {} enriched, {} failed, {} skipped",
            report.requested,
            report.enriched,
            report.failures.len(),
            report.skipped
        );
        report
    }

    /// Apply results in dataset row order, never in completion order.
    fn merge(&self, ds: &mut Dataset, mut fetched: HashMap<String, Result<Record>>, report: &mut EnrichReport) {
        let order: Vec<String> = ds.keys().to_vec();
        for key in order {
            let Some(result) = fetched.remove(&key) else { continue };
            match result.and_then(|rec| ds.combine_first(&key, &rec, self.missing)) {
                Ok(outcome) => {
                    report.enriched += 1;
                    report.columns_added.extend(outcome.added);
                }
                Err(error) => report.failures.push(EnrichFailure { key, error }),
            }
        }
    }

    fn fetch_sequential<S: DetailSource>(
        &self,
        keys: &[String],
        source: &S,
        normalizer: &Normalizer,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> HashMap<String, Result<Record>> {
        let mut out = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            if i > 0 {
                self.pace(i);
            }
            let result = fetch_one(source, normalizer, key);
            report_item(progress.as_deref_mut(), key, &result);
            out.insert(key.clone(), result);
        }
        out
    }

    fn fetch_pooled<S: DetailSource>(
        &self,
        keys: &[String],
        source: &S,
        normalizer: &Normalizer,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> HashMap<String, Result<Record>> {
        let workers = self.workers.min(keys.len());
        let next = AtomicUsize::new(0);
        let mut out = HashMap::with_capacity(keys.len());
        debug!("Enrich: {} key(s) across {workers} worker(s)", keys.len());

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<Fetched>();

            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= keys.len() {
                            break;
                        }
                        let key = &keys[i];
                        let result = fetch_one(source, normalizer, key);
                        if tx.send((key.clone(), result)).is_err() {
                            break;
                        }
                        self.pace(i);
                    }
                });
            }
            drop(tx); // main thread is sole receiver now

            for (key, result) in rx {
                report_item(progress.as_deref_mut(), &key, &result);
                out.insert(key, result);
            }
        });
        out
    }

    fn pace(&self, i: usize) {
        let jitter = if self.jitter_ms > 0 { (i as u64) % self.jitter_ms } else { 0 };
        let wait = self.pause + Duration::from_millis(jitter);
        if !wait.is_zero() {
            thread::sleep(wait); // be polite
        }
    }
}

/// Fetch one detail and reconcile its own key field with the requested key.
/// A listing id repeated in the detail is dropped once it agrees.
fn fetch_one<S: DetailSource>(source: &S, normalizer: &Normalizer, key: &str) -> Result<Record> {
    let raw = source.fetch_detail(key)?;
    let mut rec = normalizer.normalize(&raw)?;
    if rec.key != key {
        return Err(Error::schema(format!("detail for {key} is keyed {}", rec.key)));
    }
    if let Some(pos) = rec.cells.iter().position(|(c, _)| c == HOUSE_KEY_FIELD) {
        match rec.cells[pos].1.as_key() {
            Some(id) if id == key => {
                rec.cells.remove(pos);
            }
            other => {
                return Err(Error::schema(format!(
                    "detail for {key} carries {HOUSE_KEY_FIELD} {}",
                    other.unwrap_or_default()
                )));
            }
        }
    }
    Ok(rec)
}

fn report_item(progress: Option<&mut (dyn Progress + '_)>, key: &str, result: &Result<Record>) {
    match result {
        Ok(_) => {
            if let Some(p) = progress {
                p.item_done(key);
            }
        }
        Err(e) => {
            warn!("Enrich {key}: {e}");
            if let Some(p) = progress {
                p.item_failed(key, &e.to_string());
            }
        }
    }
}

/// Keys to fetch (dataset order for `All`/`First`, caller order for `Keys`)
/// plus explicitly requested keys the dataset does not have.
fn select_keys(ds: &Dataset, scope: &EnrichScope) -> (Vec<String>, Vec<String>) {
    match scope {
        EnrichScope::None => (Vec::new(), Vec::new()),
        EnrichScope::All => (ds.keys().to_vec(), Vec::new()),
        EnrichScope::First(n) => (ds.keys().iter().take(*n).cloned().collect(), Vec::new()),
        EnrichScope::Keys(list) => {
            let mut seen = HashSet::new();
            let (mut known, mut unknown) = (Vec::new(), Vec::new());
            for k in list {
                if !seen.insert(k.as_str()) {
                    continue;
                }
                if ds.contains(k) { known.push(k.clone()) } else { unknown.push(k.clone()) }
            }
            (known, unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;
    use serde_json::json;

    struct MapSource(HashMap<String, Value>);

    impl DetailSource for MapSource {
        fn fetch_detail(&self, key: &str) -> Result<Value> {
            self.0.get(key).cloned().ok_or_else(|| Error::network(key, "HTTP 404"))
        }
    }

    fn quiet(workers: usize) -> EnrichOptions {
        EnrichOptions { workers, request_pause_ms: 0, jitter_ms: 0, ..EnrichOptions::default() }
    }

    fn base() -> Dataset {
        let items = vec![
            json!({"houseId": "H1", "address": "Main St", "floors": null}),
            json!({"houseId": "H2", "address": "Side St", "floors": 2}),
        ];
        Normalizer::houses().normalize_batch(&items).unwrap()
    }

    #[test]
    fn precedence_example() {
        let mut ds = base();
        let src = MapSource(HashMap::from([(
            "H1".to_string(),
            json!({"guid": "H1", "floors": 5, "builder": "Acme"}),
        )]));
        let report = DetailEnricher::new(&quiet(1)).enrich(&mut ds, &EnrichScope::Keys(vec!["H1".into()]), &src, None);

        assert!(report.is_complete());
        assert_eq!(report.enriched, 1);
        assert_eq!(report.columns_added, vec!["builder".to_string()]);
        assert_eq!(ds.get("H1", "address"), Some(&Cell::from("Main St")));
        assert_eq!(ds.get("H1", "floors"), Some(&Cell::Int(5)));
        assert_eq!(ds.get("H1", "builder"), Some(&Cell::from("Acme")));
        assert_eq!(ds.get("H2", "builder"), None);
        assert_eq!(ds.get("H1", "guid"), None);
    }

    #[test]
    fn mismatched_guid_is_a_failure() {
        let mut ds = base();
        let src = MapSource(HashMap::from([("H1".to_string(), json!({"guid": "H9", "floors": 5}))]));
        let report = DetailEnricher::new(&quiet(1)).enrich(&mut ds, &EnrichScope::First(1), &src, None);
        assert_eq!(report.failed_keys(), vec!["H1".to_string()]);
        assert_eq!(ds.get("H1", "floors"), Some(&Cell::Null));
    }

    #[test]
    fn repeated_listing_id_adds_no_column() {
        let mut ds = base();
        let src = MapSource(HashMap::from([
            ("H1".to_string(), json!({"guid": "H1", "houseId": "H1", "builder": "Acme"})),
            ("H2".to_string(), json!({"guid": "H2", "houseId": "H7", "builder": "Acme"})),
        ]));
        let report = DetailEnricher::new(&quiet(1)).enrich(&mut ds, &EnrichScope::All, &src, None);

        assert_eq!(report.enriched, 1);
        assert_eq!(report.failed_keys(), vec!["H2".to_string()]);
        assert_eq!(ds.columns(), ["key", "address", "floors", "builder"]);
        assert_eq!(ds.get("H1", "houseId"), None);
    }

    #[test]
    fn unknown_explicit_key_is_reported() {
        let mut ds = base();
        let src = MapSource(HashMap::new());
        let scope = EnrichScope::Keys(vec!["NOPE".into()]);
        let report = DetailEnricher::new(&quiet(1)).enrich(&mut ds, &scope, &src, None);
        assert_eq!(report.requested, 1);
        assert_eq!(report.failed_keys(), vec!["NOPE".to_string()]);
        assert!(matches!(report.partial_error(), Some(Error::PartialEnrichment { .. })));
    }

    #[test]
    fn pre_cancelled_token_fetches_nothing() {
        let mut ds = base();
        let src = MapSource(HashMap::new());
        let token = CancelToken::new();
        token.cancel();
        let report = DetailEnricher::new(&quiet(3))
            .with_cancel(token)
            .enrich(&mut ds, &EnrichScope::All, &src, None);
        assert!(report.cancelled);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.enriched, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn scope_none_is_noop() {
        let mut ds = base();
        let report = DetailEnricher::new(&quiet(1)).enrich(&mut ds, &EnrichScope::None, &MapSource(HashMap::new()), None);
        assert_eq!(report.requested, 0);
        assert!(report.is_complete());
    }
}
