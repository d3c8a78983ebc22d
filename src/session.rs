// src/session.rs
//! One HTTP session per run.
//!
//! The session owns the cookie jar and header policy. It is opened once,
//! bootstrapped with a GET to the origin (which hands out the cookies the
//! report API expects), used for every request of the run, and closed on
//! every exit path: explicitly via [`SessionClient::close`], or by `Drop`.
//!
//! Header precedence per request, lowest to highest:
//! default headers, fixed User-Agent, per-call headers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use parking_lot::RwLock;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde_json::Value;

use crate::config::SessionOptions;
use crate::core::net::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
use crate::core::sanitize::normalize_ws;
use crate::error::{Error, Result};

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Domain, path and expiry rules are the jar's; clones share it.
    pub jar: Arc<Jar>,
    /// Lowercased header name -> value.
    pub headers: BTreeMap<String, String>,
    pub user_agent: String,
    pub origin: String,
    pub bootstrapped: bool,
}

impl SessionState {
    fn from_options(opts: &SessionOptions) -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            headers: opts
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            user_agent: opts.user_agent.clone(),
            origin: opts.origin.clone(),
            bootstrapped: false,
        }
    }

    /// `Cookie` header value the jar holds for `url`, if any.
    pub fn cookie_header(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let value = self.jar.cookies(&url)?;
        value.to_str().ok().map(String::from)
    }

    fn absorb(&self, url: &str, set_cookies: &[String]) -> usize {
        let Ok(url) = Url::parse(url) else {
            debug!("Cookies from unparsable url {url} dropped");
            return 0;
        };
        let values: Vec<HeaderValue> = set_cookies
            .iter()
            .filter_map(|raw| HeaderValue::from_str(raw).ok())
            .collect();
        self.jar.set_cookies(&mut values.iter(), &url);
        values.len()
    }
}

pub struct SessionClient<T: Transport = ReqwestTransport> {
    state: RwLock<SessionState>,
    transport: Option<T>,
    require_cookies: bool,
    requests: AtomicUsize,
}

impl SessionClient<ReqwestTransport> {
    /// Session over a real HTTP client built from `opts`.
    pub fn connect(opts: &SessionOptions) -> Result<Self> {
        Ok(Self::open(opts, ReqwestTransport::new(opts)?))
    }
}

impl<T: Transport> SessionClient<T> {
    pub fn open(opts: &SessionOptions, transport: T) -> Self {
        debug!("Session open: origin={} verify_tls={}", opts.origin, opts.verify_tls);
        Self {
            state: RwLock::new(SessionState::from_options(opts)),
            transport: Some(transport),
            require_cookies: opts.require_cookies,
            requests: AtomicUsize::new(0),
        }
    }

    /// GET the origin and keep whatever cookies it sets.
    pub fn bootstrap(&self) -> Result<()> {
        let origin = self.state.read().origin.clone();
        let resp = self.exchange(Method::Get, &origin, None, &[])?;
        if !resp.is_success() {
            return Err(Error::Auth(format!("origin {origin} answered HTTP {}", resp.status)));
        }

        let mut st = self.state.write();
        let count = st.cookie_header(&origin).map_or(0, |c| c.split("; ").count());
        if count == 0 && self.require_cookies {
            return Err(Error::Auth(format!("origin {origin} set no cookies")));
        }
        st.bootstrapped = true;
        info!("Session bootstrapped: {count} cookie(s) from {origin}");
        Ok(())
    }

    /// Issue one request and parse the JSON body. Non-2xx is a `Network` error.
    pub fn request(
        &self,
        url: &str,
        method: Method,
        payload: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let resp = self.request_tolerant(url, method, payload, headers)?;
        if !resp.is_success() {
            let preview: String = normalize_ws(&resp.body).chars().take(BODY_PREVIEW_CHARS).collect();
            return Err(Error::network(url, format!("HTTP {}: {preview}", resp.status)));
        }
        parse_body(url, &resp.body)
    }

    /// Like [`request`](Self::request) but hands back non-2xx responses to the caller.
    pub fn request_tolerant(
        &self,
        url: &str,
        method: Method,
        payload: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        if !self.state.read().bootstrapped {
            return Err(Error::Auth("request before bootstrap".to_string()));
        }
        self.exchange(method, url, payload, headers)
    }

    pub fn post_json(&self, url: &str, payload: &Value) -> Result<Value> {
        self.request(url, Method::Post, Some(payload), &[])
    }

    pub fn get_json(&self, url: &str) -> Result<Value> {
        self.request(url, Method::Get, None, &[])
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Release the session and its connections.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut t) = self.transport.take() {
            t.close();
            debug!("Session closed after {} request(s)", self.request_count());
        }
    }

    fn exchange(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| Error::network(url, "session closed"))?;

        let req = self.build_request(method, url, payload, headers);
        debug!("{} {url}", method.as_str());
        self.requests.fetch_add(1, Ordering::Relaxed);
        let resp = transport.send(&req)?;

        if !resp.set_cookies.is_empty() {
            let n = self.state.read().absorb(url, &resp.set_cookies);
            debug!("{n} cookie(s) captured from {url}");
        }
        Ok(resp)
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> HttpRequest {
        let st = self.state.read();

        let mut merged = st.headers.clone();
        merged.insert("user-agent".to_string(), st.user_agent.clone());
        if payload.is_some() {
            merged.entry("content-type".to_string()).or_insert_with(|| "application/json".to_string());
        }
        merged.entry("accept".to_string()).or_insert_with(|| "application/json, text/plain, */*".to_string());
        for (k, v) in headers {
            merged.insert(k.to_ascii_lowercase(), v.to_string());
        }
        if let Some(cookie) = st.cookie_header(url) {
            merged.entry("cookie".to_string()).or_insert(cookie);
        }

        HttpRequest {
            method,
            url: url.to_string(),
            headers: merged.into_iter().collect(),
            body: payload.cloned(),
        }
    }
}

impl<T: Transport> Drop for SessionClient<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open, bootstrap, run `f`, close. The session is released whether `f`
/// succeeds, fails, or panics.
pub fn with_session<T, R, F>(opts: &SessionOptions, transport: T, f: F) -> Result<R>
where
    T: Transport,
    F: FnOnce(&SessionClient<T>) -> Result<R>,
{
    let session = SessionClient::open(opts, transport);
    session.bootstrap()?;
    let out = f(&session);
    session.close();
    out
}

fn parse_body(url: &str, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| Error::schema(format!("invalid JSON from {url}: {e}")))
}
