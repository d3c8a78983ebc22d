// src/config/options.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use super::consts::*;
use crate::error::{Error, Result};
use crate::filter::TerritoryCategory;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    pub session: SessionOptions,
    pub fetch: FetchOptions,
    pub enrich: EnrichOptions,
    pub export: ExportOptions,
}

impl AppOptions {
    /// Read options from a TOML file. Missing tables and fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }
}

/* ---------------- Session ---------------- */

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub origin: String,
    pub user_agent: String,
    /// Sent with every request; per-call headers win on conflict.
    pub headers: BTreeMap<String, String>,
    /// Turning this off is logged on every session open.
    pub verify_tls: bool,
    pub timeout_secs: u64,
    /// Fail the bootstrap when the origin sets no cookie at all.
    pub require_cookies: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            origin: ORIGIN.to_string(),
            user_agent: USER_AGENT.to_string(),
            headers: BTreeMap::new(),
            verify_tls: true,
            timeout_secs: TIMEOUT_SECS,
            require_cookies: false,
        }
    }
}

/* ---------------- Fetch ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePolicy {
    /// One oversized page. Only for result sets with a known, small upper bound.
    SingleShot { max_items: u32 },
    /// Pages 1.. until a short page or `max_pages`.
    Looped { page_size: u32, max_pages: u32 },
}

impl Default for PagePolicy {
    fn default() -> Self {
        PagePolicy::Looped { page_size: PAGE_SIZE, max_pages: MAX_PAGES }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub territories_url: String,
    pub houses_url: String,
    pub management_types: Vec<String>,
    pub year_from: i32,
    pub year_to: i32,
    pub with_federal_districts: bool,
    pub territory_category: TerritoryCategory,
    /// Territory ids for the territories report (empty = top level).
    pub report_territories: Vec<String>,
    /// Territory ids for the house listing (empty = everything).
    pub house_territories: Vec<String>,
    /// `false` skips the house listing (and therefore enrichment).
    pub houses: bool,
    pub sort_by: String,
    pub sort_asc: bool,
    pub pages: PagePolicy,
    /// Nesting levels the normalizer expands into `parent_child` columns.
    pub flatten_depth: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            territories_url: format!("{REPORT_BASE}{TERRITORIES_PATH}"),
            houses_url: format!("{REPORT_BASE}{HOUSES_PATH}"),
            management_types: Vec::new(),
            year_from: YEAR_FROM,
            year_to: YEAR_TO,
            with_federal_districts: false,
            territory_category: TerritoryCategory::Administrative,
            report_territories: Vec::new(),
            house_territories: Vec::new(),
            houses: true,
            sort_by: SORT_BY.to_string(),
            sort_asc: true,
            pages: PagePolicy::default(),
            flatten_depth: FLATTEN_DEPTH,
        }
    }
}

/* ---------------- Enrich ---------------- */

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichScope {
    #[default]
    None,
    All,
    First(usize),
    Keys(Vec<String>),
}

impl FromStr for EnrichScope {
    type Err = Error;

    /// `none` | `all` | `first:N` | `keys:a,b,c`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => return Ok(EnrichScope::None),
            "all" => return Ok(EnrichScope::All),
            _ => {}
        }
        if let Some(n) = s.strip_prefix("first:") {
            let n = n
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid count in enrich scope: {s}")))?;
            return Ok(EnrichScope::First(n));
        }
        if let Some(list) = s.strip_prefix("keys:") {
            let keys: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            if keys.is_empty() {
                return Err(Error::Config(format!("empty key list in enrich scope: {s}")));
            }
            return Ok(EnrichScope::Keys(keys));
        }
        Err(Error::Config(format!("unknown enrich scope: {s}")))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    pub scope: EnrichScope,
    /// Detail endpoint; the house key is appended verbatim.
    pub detail_url: String,
    /// Key field of the detail payload, reconciled to the dataset key column.
    pub detail_key_field: String,
    /// 1 = sequential.
    pub workers: usize,
    pub request_pause_ms: u64,
    pub jitter_ms: u64,
    /// Treat `""` in the base row as a gap the detail may fill.
    pub empty_string_is_missing: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            scope: EnrichScope::None,
            detail_url: format!("{REPORT_BASE}{HOUSE_DETAIL_PATH}"),
            detail_key_field: DETAIL_KEY_FIELD.to_string(),
            workers: WORKERS,
            request_pause_ms: REQUEST_PAUSE_MS,
            jitter_ms: JITTER_MS,
            empty_string_is_missing: false,
        }
    }
}

/* ---------------- Export ---------------- */

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
}

impl ExportFormat {
    pub fn ext(&self) -> &'static str {
        match self { ExportFormat::Csv => "csv", ExportFormat::Tsv => "tsv" }
    }
    pub fn delim(&self) -> char {
        match self { ExportFormat::Csv => ',', ExportFormat::Tsv => '\t' }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(Error::Config(format!("unknown format: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub out_dir: PathBuf,
    pub include_headers: bool,
    /// Write raw JSON payloads next to the tables.
    pub snapshots: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            include_headers: true,
            snapshots: true,
        }
    }
}

impl ExportOptions {
    /// `<out_dir>/<stem>.<ext>`
    pub fn table_path(&self, stem: &str) -> PathBuf {
        self.out_dir.join(format!("{stem}.{}", self.format.ext()))
    }
}
