//! Config file loading, environment substitution and validation.
//!
//! Configs are YAML (JSON parses as a YAML subset, so both work).
//! `${NAME}` placeholders are substituted from the process environment
//! in every string value before the file is interpreted. Validation
//! collects every violation — each tagged with a JSON-pointer-style
//! path — so the operator fixes the file in one round trip.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::duration::parse_duration;
use crate::error::UsageError;
use crate::status::{MissingStatusPolicy, Status};
use crate::types::{OutputFormat, Params, Service};

/// Raw config file shape, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub concurrency: Option<u32>,
    pub default_headers: Option<BTreeMap<String, String>>,
    /// Merged over `default_headers`; same keys win.
    pub headers: Option<BTreeMap<String, String>>,
    pub proxy: Option<String>,
    pub insecure: Option<bool>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

/// Raw per-service entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub url: String,
    pub expect_status: Option<String>,
    pub tags: Option<Vec<String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub proxy: Option<String>,
    pub timeout: Option<String>,
}

/// Flag-level overrides layered on top of the file (flags win).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub concurrency: Option<u32>,
    pub proxy: Option<String>,
    pub headers: Vec<(String, String)>,
    pub insecure: bool,
    pub debug: bool,
    pub missing_status: Option<MissingStatusPolicy>,
    pub output: Option<OutputFormat>,
}

/// Load, substitute, validate and resolve a config file into the
/// immutable fleet definition the supervisor consumes.
pub fn load_config(
    path: &Path,
    overrides: &Overrides,
) -> Result<(Vec<Service>, Params), UsageError> {
    let text = std::fs::read_to_string(path).map_err(|source| UsageError::ConfigRead {
        path: path.display().to_string(),
        source,
    })?;
    let mut raw: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|source| UsageError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;

    let mut issues = Vec::new();
    substitute_env(&mut raw, "", &|name| std::env::var(name).ok(), &mut issues);
    if !issues.is_empty() {
        return Err(UsageError::ConfigInvalid(issues));
    }

    let file: ConfigFile =
        serde_yaml::from_value(raw).map_err(|source| UsageError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;

    resolve(file, overrides)
}

/// Validate a parsed config and merge in the flag overrides.
pub fn resolve(
    file: ConfigFile,
    overrides: &Overrides,
) -> Result<(Vec<Service>, Params), UsageError> {
    let mut issues = Vec::new();

    let interval = parse_optional_duration(&file.interval, "/interval", &mut issues);
    let timeout = parse_optional_duration(&file.timeout, "/timeout", &mut issues);

    if file.services.is_empty() {
        issues.push("/services: at least one service is required".to_string());
    }

    let mut services = Vec::with_capacity(file.services.len());
    let mut seen_names = BTreeSet::new();
    for (index, entry) in file.services.iter().enumerate() {
        let prefix = format!("/services/{index}");

        let name = entry.name.trim().to_string();
        if name.is_empty() {
            issues.push(format!("{prefix}/name: must not be empty"));
        } else if !seen_names.insert(name.clone()) {
            issues.push(format!("{prefix}/name: duplicate service name {name:?}"));
        }

        match url::Url::parse(&entry.url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(u) => issues.push(format!(
                "{prefix}/url: unsupported scheme {:?} (http or https required)",
                u.scheme()
            )),
            Err(e) => issues.push(format!("{prefix}/url: {e}")),
        }

        let expect_status = match &entry.expect_status {
            None => None,
            Some(raw) => match raw.parse::<Status>() {
                Ok(s) => Some(s),
                Err(_) => {
                    issues.push(format!(
                        "{prefix}/expect_status: unknown status {raw:?} (expected ok, degraded or down)"
                    ));
                    None
                }
            },
        };

        let timeout = parse_optional_duration(
            &entry.timeout,
            &format!("{prefix}/timeout"),
            &mut issues,
        );

        let headers = entry.headers.clone().unwrap_or_default();
        for header_name in headers.keys() {
            if header_name.trim().is_empty() {
                issues.push(format!("{prefix}/headers: header names must not be empty"));
            }
        }

        services.push(Service {
            name,
            url: entry.url.clone(),
            expect_status,
            tags: entry
                .tags
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
            headers,
            proxy: clean_optional(&entry.proxy),
            timeout,
        });
    }

    if !issues.is_empty() {
        return Err(UsageError::ConfigInvalid(issues));
    }

    // Global headers: default_headers < headers < --headers flags.
    let mut headers = file.default_headers.clone().unwrap_or_default();
    headers.extend(file.headers.clone().unwrap_or_default());
    for (name, value) in &overrides.headers {
        headers.insert(name.clone(), value.clone());
    }

    let defaults = Params::default();
    let params = Params {
        interval: overrides.interval.or(interval).unwrap_or(defaults.interval),
        timeout: overrides.timeout.or(timeout).unwrap_or(defaults.timeout),
        retries: overrides
            .retries
            .or(file.retries)
            .unwrap_or(defaults.retries),
        concurrency: overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or(defaults.concurrency),
        headers,
        proxy: overrides
            .proxy
            .clone()
            .or_else(|| clean_optional(&file.proxy)),
        insecure: overrides.insecure || file.insecure.unwrap_or(false),
        debug: overrides.debug,
        missing_status: overrides.missing_status.unwrap_or_default(),
        output: overrides.output.unwrap_or_default(),
    };

    Ok((services, params))
}

/// Recursively substitute `${NAME}` placeholders in every string
/// value, recording unresolved names as issues at their pointer path.
pub fn substitute_env(
    value: &mut serde_yaml::Value,
    path: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    issues: &mut Vec<String>,
) {
    match value {
        serde_yaml::Value::String(s) => {
            *s = substitute_str(s, path, lookup, issues);
        }
        serde_yaml::Value::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                substitute_env(item, &format!("{path}/{i}"), lookup, issues);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                let segment = key.as_str().map(str::to_string).unwrap_or_default();
                substitute_env(item, &format!("{path}/{segment}"), lookup, issues);
            }
        }
        _ => {}
    }
}

fn substitute_str(
    input: &str,
    path: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    issues: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                let name = &tail[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        issues.push(format!(
                            "{}: unresolved environment placeholder ${{{name}}}",
                            pointer(path)
                        ));
                        out.push_str(&rest[start..start + 2 + end + 1]);
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                // No closing brace; keep the remainder verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn pointer(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn parse_optional_duration(
    raw: &Option<String>,
    path: &str,
    issues: &mut Vec<String>,
) -> Option<Duration> {
    match raw {
        None => None,
        Some(s) => match parse_duration(s) {
            Ok(d) => Some(d),
            Err(_) => {
                issues.push(format!(
                    "{path}: invalid duration {s:?} (expected <number>ms, <number>s or <number>m)"
                ));
                None
            }
        },
    }
}

fn clean_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
