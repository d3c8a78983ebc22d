// src/config/consts.rs

// Net config
pub const ORIGIN: &str = "https://dom.gosuslugi.ru/";
pub const REPORT_BASE: &str =
    "https://dom.gosuslugi.ru/interactive-reports/api/rest/services/housesConditionReport";
pub const TERRITORIES_PATH: &str = "/deteriorationTerritories";
pub const HOUSES_PATH: &str = "/houses";
pub const HOUSE_DETAIL_PATH: &str = "/house/";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/76.0.3809.132 Safari/537.36";
pub const TIMEOUT_SECS: u64 = 30;

// Request filter
pub const YEAR_FROM: i32 = 1700;
pub const YEAR_TO: i32 = 2020;
pub const SORT_BY: &str = "address";

// Pagination
pub const PAGE_SIZE: u32 = 100;
pub const MAX_PAGES: u32 = 10_000;
pub const SINGLE_SHOT_LIMIT: u32 = 5_000; // beyond this, loop instead

// Dataset
pub const KEY_COLUMN: &str = "key";
pub const TERRITORY_FIELD: &str = "territory";
pub const HOUSE_KEY_FIELD: &str = "houseId";
pub const DETAIL_KEY_FIELD: &str = "guid";
pub const FLATTEN_SEP: &str = "_";
pub const FLATTEN_DEPTH: usize = 1;

// Local cache / logs
pub const STORE_DIR: &str = ".store";
pub const LOG_BASENAME: &str = "debug";

// Export
pub const DEFAULT_OUT_DIR: &str = "out";
pub const TERRITORIES_FILE: &str = "territories";
pub const HOUSES_FILE: &str = "houses";
pub const ENRICHED_FILE: &str = "houses_enriched";

// Concurrency
pub const WORKERS: usize = 4;
pub const REQUEST_PAUSE_MS: u64 = 75; // be polite
pub const JITTER_MS: u64 = 50; // extra 0..50 ms
