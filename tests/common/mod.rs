// tests/common/mod.rs
// In-process stand-in for the report API.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use housing_scrape::config::{AppOptions, PagePolicy};
use housing_scrape::core::net::{HttpRequest, HttpResponse, Method, Transport};
use housing_scrape::error::{Error, Result};

pub const ORIGIN: &str = "http://fake.test/";
pub const TERRITORIES: &str = "http://fake.test/report/territories";
pub const HOUSES: &str = "http://fake.test/report/houses";
pub const DETAIL: &str = "http://fake.test/report/house/";

pub fn house_id(i: usize) -> String {
    format!("H{i:03}")
}

pub fn house(i: usize) -> Value {
    json!({
        "houseId": house_id(i),
        "address": format!("Street {i}"),
        "stats": {"floors": (i % 9) + 1, "year": 1950 + i},
        "managementCompany": null,
    })
}

pub fn detail(key: &str) -> Value {
    json!({
        "guid": key,
        "address": "detail address",
        "managementCompany": format!("MC-{key}"),
        "passport": {"wallMaterial": "brick"},
    })
}

pub fn territories_payload() -> Value {
    json!([{
        "children": [
            {"territory": {"id": "50", "name": "Moscow region"}, "houses": {"total": 120, "worn": 7}},
            {"territory": {"id": "77", "name": "Moscow"}, "houses": {"total": 130, "worn": 3}},
        ]
    }])
}

#[derive(Default)]
struct Backend {
    houses: usize,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    territories_status: u16,
    cookie: bool,
}

/// Fake report API. Clones share state, so a test can keep one handle
/// while the session owns another.
#[derive(Clone)]
pub struct FakeApi {
    backend: Arc<Mutex<Backend>>,
    pub log: Arc<Mutex<Vec<HttpRequest>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl FakeApi {
    pub fn new(houses: usize) -> Self {
        let backend = Backend { houses, territories_status: 200, cookie: true, ..Default::default() };
        Self {
            backend: Arc::new(Mutex::new(backend)),
            log: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing(self, key: &str) -> Self {
        self.backend.lock().failing.insert(key.to_string());
        self
    }

    pub fn delayed(self, key: &str, ms: u64) -> Self {
        self.backend.lock().delays.insert(key.to_string(), Duration::from_millis(ms));
        self
    }

    pub fn territories_status(self, status: u16) -> Self {
        self.backend.lock().territories_status = status;
        self
    }

    pub fn without_cookie(self) -> Self {
        self.backend.lock().cookie = false;
        self
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.log.lock().iter().filter(|r| r.url == url).cloned().collect()
    }

    pub fn detail_requests(&self) -> usize {
        self.log.lock().iter().filter(|r| r.url.starts_with(DETAIL)).count()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    fn houses_page(&self, body: Option<&Value>) -> HttpResponse {
        let total = self.backend.lock().houses;
        let field = |name: &str| body.and_then(|b| b.get(name)).and_then(Value::as_u64);
        let (number, size) = match (field("pageNumber"), field("pageSize")) {
            (Some(n), Some(s)) if n > 0 => (n as usize, s as usize),
            _ => return status(400, "pageNumber and pageSize required"),
        };
        let start = (number - 1) * size;
        let items: Vec<Value> = (start..(start + size).min(total)).map(house).collect();
        HttpResponse::ok(json!({"items": items, "total": total}).to_string())
    }
}

fn status(code: u16, body: &str) -> HttpResponse {
    HttpResponse { status: code, set_cookies: Vec::new(), body: body.to_string() }
}

impl Transport for FakeApi {
    fn send(&self, req: &HttpRequest) -> Result<HttpResponse> {
        self.log.lock().push(req.clone());

        if req.url == ORIGIN {
            let mut resp = HttpResponse::ok("<html></html>");
            if self.backend.lock().cookie {
                resp.set_cookies.push("SESSION=abc123; Path=/; HttpOnly".to_string());
            }
            return Ok(resp);
        }
        if req.url == TERRITORIES && req.method == Method::Post {
            let code = self.backend.lock().territories_status;
            if code != 200 {
                return Ok(status(code, "<html>maintenance</html>"));
            }
            return Ok(HttpResponse::ok(territories_payload().to_string()));
        }
        if req.url == HOUSES && req.method == Method::Post {
            return Ok(self.houses_page(req.body.as_ref()));
        }
        if let Some(key) = req.url.strip_prefix(DETAIL) {
            let (fail, delay) = {
                let b = self.backend.lock();
                (b.failing.contains(key), b.delays.get(key).copied())
            };
            if let Some(d) = delay {
                std::thread::sleep(d);
            }
            if fail {
                return Err(Error::network(&req.url, "connection reset"));
            }
            return Ok(HttpResponse::ok(detail(key).to_string()));
        }
        Ok(status(404, "not found"))
    }

    fn close(&mut self) {
        *self.closed.lock() = true;
    }
}

/// Options pointed at the fake, writing under `out`, no pacing.
pub fn options(out: &Path) -> AppOptions {
    let mut opts = AppOptions::default();
    opts.session.origin = ORIGIN.to_string();
    opts.fetch.territories_url = TERRITORIES.to_string();
    opts.fetch.houses_url = HOUSES.to_string();
    opts.fetch.pages = PagePolicy::Looped { page_size: 100, max_pages: 50 };
    opts.enrich.detail_url = DETAIL.to_string();
    opts.enrich.request_pause_ms = 0;
    opts.enrich.jitter_ms = 0;
    opts.export.out_dir = out.to_path_buf();
    opts
}
