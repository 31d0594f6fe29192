//! pulsefleet-http — the outbound request layer.
//!
//! Wraps `reqwest` with the behavior the probe pipeline needs:
//!
//! - a protocol gate (only `http:` / `https:` leave the process)
//! - per-request deadlines that produce a distinct timeout error
//! - external cancellation that is never mistaken for a timeout
//! - explicit proxy resolution (`proxy` field > `HTTPS_PROXY` /
//!   `HTTP_PROXY`) with a per-`(proxy, insecure)` client cache
//! - long-lived keep-alive clients, one verifying and one that skips
//!   TLS verification for `--insecure` runs
//! - an optional structured debug record per completed request, with
//!   credentials redacted before emission

pub mod client;
pub mod debug;
pub mod error;
pub mod proxy;

pub use client::{request, ClientPool, HttpResponse, PoolOptions, RequestOptions};
pub use error::{HttpError, HttpResult};
pub use proxy::{resolve_proxy, ProxyClientCache, ProxyEnv};
pub use reqwest::Method;
