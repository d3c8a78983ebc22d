// src/core/net.rs
// One HTTP exchange per call. Cookies and header policy live in `session`;
// this layer only moves bytes so tests can swap in a fake.

use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use reqwest::header::SET_COOKIE;
use serde_json::Value;

use crate::config::SessionOptions;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self { Method::Get => "GET", Method::Post => "POST" }
    }
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Final header set, names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, set_cookies: Vec::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A blocking HTTP exchange. Implementations must be usable from several
/// enrichment workers at once.
pub trait Transport: Send + Sync {
    /// Fails only on connection-level problems (refused, reset, timeout).
    /// Any status code is a successful exchange at this layer.
    fn send(&self, req: &HttpRequest) -> Result<HttpResponse>;

    /// Release pooled connections. Called once when the session closes.
    fn close(&mut self) {}
}

pub struct ReqwestTransport {
    client: Option<Client>,
}

impl ReqwestTransport {
    pub fn new(opts: &SessionOptions) -> Result<Self> {
        if !opts.verify_tls {
            warn!("TLS certificate verification DISABLED for {} (explicit opt-out)", opts.origin);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs))
            .danger_accept_invalid_certs(!opts.verify_tls)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self { client: Some(client) })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, req: &HttpRequest) -> Result<HttpResponse> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::network(&req.url, "transport closed"))?;

        let mut rb = match req.method {
            Method::Get => client.get(&req.url),
            Method::Post => client.post(&req.url),
        };
        for (k, v) in &req.headers {
            rb = rb.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &req.body {
            rb = rb.json(body);
        }

        let resp = rb.send().map_err(|e| {
            let reason = if e.is_timeout() { format!("timeout: {e}") } else { e.to_string() };
            Error::network(&req.url, reason)
        })?;

        let status = resp.status().as_u16();
        let set_cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        let body = resp.text().map_err(|e| Error::network(&req.url, e))?;

        Ok(HttpResponse { status, set_cookies, body })
    }

    fn close(&mut self) {
        // dropping the client drops its connection pool
        self.client.take();
    }
}
