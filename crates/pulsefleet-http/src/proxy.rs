//! Proxy resolution and the proxied-client cache.
//!
//! Resolution precedence: the request's explicit proxy beats the
//! environment; the environment is chosen by target scheme (`https:`
//! tries `HTTPS_PROXY` then `HTTP_PROXY`, `http:` only `HTTP_PROXY`).
//! Values are trimmed and empty strings are treated as absent.
//!
//! Proxied clients are cached per `(proxy URI, insecure)` so repeated
//! probes through the same proxy reuse its connections.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::Client;
use tracing::debug;

use crate::client::PoolOptions;
use crate::error::{HttpError, HttpResult};

/// Snapshot of the proxy-relevant environment, taken once per run so
/// probes do not race `std::env`.
#[derive(Debug, Clone, Default)]
pub struct ProxyEnv {
    pub https_proxy: Option<String>,
    pub http_proxy: Option<String>,
}

impl ProxyEnv {
    pub fn from_env() -> Self {
        Self {
            https_proxy: std::env::var("HTTPS_PROXY").ok(),
            http_proxy: std::env::var("HTTP_PROXY").ok(),
        }
    }
}

/// Resolve the proxy for a request targeting `scheme`.
pub fn resolve_proxy(explicit: Option<&str>, scheme: &str, env: &ProxyEnv) -> Option<String> {
    if let Some(p) = clean(explicit) {
        return Some(p);
    }
    match scheme {
        "https" => clean(env.https_proxy.as_deref()).or_else(|| clean(env.http_proxy.as_deref())),
        _ => clean(env.http_proxy.as_deref()),
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Lazily-built proxied clients, keyed by `(proxy URI, insecure)`.
///
/// Insert happens once per key under the lock; afterwards lookups
/// clone the cached client (a cheap handle).
#[derive(Debug)]
pub struct ProxyClientCache {
    options: PoolOptions,
    clients: Mutex<HashMap<(String, bool), Client>>,
}

impl ProxyClientCache {
    pub fn new(options: PoolOptions) -> Self {
        Self {
            options,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch-or-create the client for a proxy.
    pub fn client(&self, proxy: &str, insecure: bool) -> HttpResult<Client> {
        let key = (proxy.to_string(), insecure);
        let mut clients = self.clients.lock().expect("proxy cache lock poisoned");
        if let Some(existing) = clients.get(&key) {
            return Ok(existing.clone());
        }

        let upstream = reqwest::Proxy::all(proxy).map_err(|source| HttpError::InvalidProxy {
            proxy: proxy.to_string(),
            source,
        })?;
        let client = self
            .options
            .builder(insecure)
            .proxy(upstream)
            .build()
            .map_err(HttpError::Client)?;

        debug!(proxy = %pulse_core::redact_url_credentials(proxy), insecure, "proxy client created");
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Number of distinct proxied clients built so far.
    pub fn len(&self) -> usize {
        self.clients.lock().expect("proxy cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
