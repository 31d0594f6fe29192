//! Keep-alive client pool and the request entry point.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::debug::RequestDebug;
use crate::error::{HttpError, HttpResult};
use crate::proxy::{resolve_proxy, ProxyClientCache, ProxyEnv};

/// Connection-pool tuning shared by direct and proxied clients.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Idle keep-alive connections retained per host.
    pub connections: usize,
    pub connect_timeout: Duration,
    /// How long an idle keep-alive connection survives in the pool.
    pub keep_alive_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            connections: 16,
            connect_timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_secs(60),
        }
    }
}

impl PoolOptions {
    /// Builder preconfigured for this pool. Proxy handling is always
    /// explicit — reqwest's implicit env proxying is disabled so the
    /// resolution order stays in our hands.
    pub(crate) fn builder(&self, insecure: bool) -> ClientBuilder {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(self.connections)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.keep_alive_timeout)
            .user_agent(concat!("pulsefleet/", env!("CARGO_PKG_VERSION")))
            .no_proxy();
        if insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder
    }
}

/// The process-wide pair of long-lived direct clients.
///
/// One verifies TLS, the other skips verification for `--insecure`
/// runs. reqwest drains and closes pooled connections when the last
/// handle drops; `close` exists for symmetry with the proxied cache
/// and is idempotent.
#[derive(Debug)]
pub struct ClientPool {
    verifying: Client,
    insecure: Client,
    closed: AtomicBool,
}

impl ClientPool {
    pub fn new(options: PoolOptions) -> HttpResult<Self> {
        Ok(Self {
            verifying: options.builder(false).build().map_err(HttpError::Client)?,
            insecure: options.builder(true).build().map_err(HttpError::Client)?,
            closed: AtomicBool::new(false),
        })
    }

    /// The direct client for a request.
    pub fn client(&self, insecure: bool) -> &Client {
        if insecure {
            &self.insecure
        } else {
            &self.verifying
        }
    }

    /// Mark the pool closed. Safe to call repeatedly.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("client pool closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Per-request deadline; `None` or zero disables it.
    pub timeout: Option<Duration>,
    /// Explicit proxy, resolved ahead of the environment.
    pub proxy: Option<String>,
    pub insecure: bool,
    /// Emit a structured debug record when the request completes.
    pub debug: bool,
}

impl RequestOptions {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            proxy: None,
            insecure: false,
            debug: false,
        }
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Time until response headers were received.
    pub ttfb: Duration,
    /// Time until the body was fully read.
    pub total: Duration,
}

/// Issue a request through the pool (or a cached proxied client),
/// honoring the deadline and the caller's cancellation token.
///
/// The deadline produces [`HttpError::Timeout`]; the token produces
/// [`HttpError::Cancelled`] — whichever fires first wins, and a
/// cancellation is never reported as a timeout.
pub async fn request(
    pool: &ClientPool,
    proxies: &ProxyClientCache,
    env: &ProxyEnv,
    options: &RequestOptions,
    cancel: &CancellationToken,
) -> HttpResult<HttpResponse> {
    let started = Instant::now();
    let outcome = dispatch(pool, proxies, env, options, cancel, started).await;

    if options.debug {
        RequestDebug::from_outcome(options, &outcome, started.elapsed()).emit();
    }
    outcome
}

async fn dispatch(
    pool: &ClientPool,
    proxies: &ProxyClientCache,
    env: &ProxyEnv,
    options: &RequestOptions,
    cancel: &CancellationToken,
    started: Instant,
) -> HttpResult<HttpResponse> {
    let parsed = url::Url::parse(&options.url).map_err(|source| HttpError::InvalidUrl {
        url: options.url.clone(),
        source,
    })?;
    let scheme = parsed.scheme().to_string();
    if scheme != "http" && scheme != "https" {
        return Err(HttpError::UnsupportedProtocol { scheme });
    }

    let client = match resolve_proxy(options.proxy.as_deref(), &scheme, env) {
        Some(proxy) => proxies.client(&proxy, options.insecure)?,
        None => pool.client(options.insecure).clone(),
    };

    let mut headers = HeaderMap::with_capacity(options.headers.len());
    for (name, value) in &options.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader { name: name.clone() })?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader { name: name.clone() })?;
        headers.insert(header_name, header_value);
    }

    let mut builder = client
        .request(options.method.clone(), parsed)
        .headers(headers);
    if let Some(body) = &options.body {
        builder = builder.body(body.clone());
    }

    let work = async {
        let response = builder.send().await.map_err(HttpError::Request)?;
        let ttfb = started.elapsed();
        let status = response.status().as_u16();
        let mut response_headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let body = response.text().await.map_err(HttpError::Body)?;
        Ok(HttpResponse {
            status,
            headers: response_headers,
            body,
            ttfb,
            total: started.elapsed(),
        })
    };

    // Cancellation is checked first so a cancel that races the
    // response is reported as the caller's reason.
    let guarded = async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            outcome = work => outcome,
        }
    };

    match options.timeout.filter(|t| !t.is_zero()) {
        Some(deadline) => match tokio::time::timeout(deadline, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => Err(HttpError::Timeout {
                timeout_ms: deadline.as_millis() as u64,
            }),
        },
        None => guarded.await,
    }
}
