// tests/run_e2e.rs
mod common;

use std::fs;

use common::{FakeApi, HOUSES, options};
use housing_scrape::config::{EnrichScope, ExportFormat};
use housing_scrape::enrich::CancelToken;
use housing_scrape::error::Error;
use housing_scrape::runner::run_with;

#[test]
fn full_run_writes_tables_and_snapshots() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path());
    opts.enrich.scope = EnrichScope::First(3);
    let api = FakeApi::new(250);

    let summary = run_with(&opts, api.clone(), &CancelToken::new(), None).unwrap();

    assert_eq!(summary.territories, 2);
    assert_eq!(summary.house_pages, 3);
    assert_eq!(summary.houses, 250);
    assert_eq!(summary.enrich.as_ref().unwrap().enriched, 3);
    assert_eq!(summary.files_written.len(), 3);
    assert!(api.is_closed());

    let out = tmp.path();
    for name in [
        "territories.csv",
        "houses.csv",
        "houses_enriched.csv",
        "territories.json",
        "houses_page_001.json",
        "houses_page_003.json",
    ] {
        assert!(out.join(name).is_file(), "{name} missing");
    }

    let houses = fs::read_to_string(out.join("houses.csv")).unwrap();
    let mut lines = houses.lines();
    assert_eq!(lines.next(), Some("key,address,stats_floors,stats_year,managementCompany"));
    assert_eq!(lines.next(), Some("H000,Street 0,1,1950,"));
    assert_eq!(houses.lines().count(), 251);

    let enriched = fs::read_to_string(out.join("houses_enriched.csv")).unwrap();
    let header = enriched.lines().next().unwrap();
    assert!(header.ends_with(",passport_wallMaterial"));
    assert!(enriched.contains("H002,Street 2,3,1952,MC-H002,brick"));
    assert!(enriched.contains("H003,Street 3,4,1953,,"));

    let lines = summary.lines();
    assert!(lines.last().unwrap().starts_with("Total time spent: "));
}

#[test]
fn every_request_after_bootstrap_carries_the_session_cookie() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path());
    opts.enrich.scope = EnrichScope::All;
    opts.enrich.workers = 3;
    let api = FakeApi::new(20);

    run_with(&opts, api.clone(), &CancelToken::new(), None).unwrap();

    let log = api.log.lock();
    assert!(log[0].header("cookie").is_none());
    assert!(log.len() > 20);
    for req in log.iter().skip(1) {
        assert_eq!(req.header("cookie"), Some("SESSION=abc123"), "{}", req.url);
        assert!(req.header("user-agent").unwrap().starts_with("Mozilla/5.0"));
    }
}

#[test]
fn territories_failure_writes_no_table() {
    let tmp = tempfile::tempdir().unwrap();
    let opts = options(tmp.path());
    let api = FakeApi::new(50).territories_status(503);

    let err = run_with(&opts, api.clone(), &CancelToken::new(), None).unwrap_err();

    assert!(matches!(err, Error::Network { .. }), "{err}");
    assert!(err.to_string().contains("503"));
    assert!(api.requests_to(HOUSES).is_empty());
    assert!(!tmp.path().join("territories.csv").exists());
    assert!(!tmp.path().join("houses.csv").exists());
    assert!(api.is_closed());
}

#[test]
fn missing_cookie_fails_bootstrap_when_required() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path());
    opts.session.require_cookies = true;
    let api = FakeApi::new(5).without_cookie();

    let err = run_with(&opts, api.clone(), &CancelToken::new(), None).unwrap_err();
    assert!(matches!(err, Error::Auth(_)), "{err}");
    assert_eq!(api.log.lock().len(), 1);
    assert!(api.is_closed());
}

#[test]
fn partial_enrichment_still_writes_the_enriched_table() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path());
    opts.enrich.scope = EnrichScope::All;
    opts.export.format = ExportFormat::Tsv;
    opts.export.snapshots = false;
    let api = FakeApi::new(5).failing("H004");

    let summary = run_with(&opts, api, &CancelToken::new(), None).unwrap();

    let report = summary.enrich.as_ref().unwrap();
    assert_eq!(report.enriched, 4);
    assert_eq!(report.failed_keys(), ["H004".to_string()]);
    assert!(summary.lines().iter().any(|l| l.contains("H004")));

    let enriched = fs::read_to_string(tmp.path().join("houses_enriched.tsv")).unwrap();
    assert_eq!(enriched.lines().count(), 6);
    assert!(enriched.contains("H004\tStreet 4\t5\t1954\t\t\n"));
    assert!(!tmp.path().join("territories.json").exists());
}

#[test]
fn territories_only_run_skips_the_listing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path());
    opts.fetch.houses = false;
    opts.enrich.scope = EnrichScope::All;
    let api = FakeApi::new(10);

    let summary = run_with(&opts, api.clone(), &CancelToken::new(), None).unwrap();

    assert_eq!(summary.territories, 2);
    assert_eq!(summary.houses, 0);
    assert!(summary.enrich.is_none());
    assert_eq!(summary.files_written.len(), 1);
    assert!(api.requests_to(HOUSES).is_empty());
    assert_eq!(api.detail_requests(), 0);

    let text = fs::read_to_string(tmp.path().join("territories.csv")).unwrap();
    assert_eq!(text, "key,territory_name,houses_total,houses_worn\n50,Moscow region,120,7\n77,Moscow,130,3\n");
}
