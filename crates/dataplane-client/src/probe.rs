//! C1 — Endpoint & Version Probe.

use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::Error;
use crate::middleware::LoggingClient;
use crate::types::{Endpoint, VersionInfo};

const INFO_PATH: &str = "/v3/info";

#[derive(Debug, Deserialize)]
struct InfoBody {
    api: ApiInfo,
}

#[derive(Debug, Deserialize)]
struct ApiInfo {
    version: String,
}

fn ee_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-ee\d+").expect("static regex"))
}

fn edition_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+r\d+").expect("static regex"))
}

/// Given an endpoint, resolve its schema family. Short-circuits through the
/// endpoint's cache if already probed. Network/auth/decoding failures
/// propagate as [`Error::Probe`]; an unparseable minor version degrades to
/// `(3, 0)` with a warning rather than failing.
pub async fn probe(endpoint: &Endpoint) -> Result<VersionInfo, Error> {
    if let Some(cached) = endpoint.cached_version() {
        return Ok(cached.clone());
    }

    let client = LoggingClient::new(
        endpoint.normalized_base_url(),
        endpoint.username(),
        endpoint.password(),
    );
    let request = client
        .request(Method::GET, INFO_PATH)
        .build()
        .map_err(|e| Error::Probe(e.to_string()))?;
    let parts = client.send(request).await?;

    if !parts.status.is_success() {
        return Err(Error::Probe(format!(
            "info endpoint returned status {}",
            parts.status.as_u16()
        )));
    }

    let body: InfoBody = serde_json::from_slice(&parts.body)
        .map_err(|e| Error::Probe(format!("decoding info response: {e}")))?;

    if body.api.version.trim().is_empty() {
        return Err(Error::Probe("empty version string in info response".into()));
    }

    let version = parse_version(&body.api.version);
    if version.major != 3 {
        return Err(Error::Probe(format!(
            "unsupported major version {} (only 3 is supported)",
            version.major
        )));
    }

    endpoint.set_cached_version(version.clone());
    Ok(version)
}

/// Parse a version string such as `"v3.2.6 87ad0bcf"`, `"v3.0r1"`, or
/// `"v3.0.15-ee1 …"` into a [`VersionInfo`]. Never fails: an unparseable
/// minor segment degrades to `(3, 0)` per §4.1's stated failure semantics.
fn parse_version(raw: &str) -> VersionInfo {
    let first_token = raw.split_whitespace().next().unwrap_or(raw);
    let unprefixed = first_token.strip_prefix(|c: char| c.is_ascii_alphabetic()).unwrap_or(first_token);
    let enterprise = detect_enterprise(raw, unprefixed);

    let mut segments = unprefixed.split('.');
    let (major, minor) = match (segments.next(), segments.next()) {
        (Some(major_str), Some(minor_str)) => {
            let major = major_str.parse::<u8>().unwrap_or(3);
            let minor_digits: String = minor_str.chars().take_while(|c| c.is_ascii_digit()).collect();
            match minor_digits.parse::<u8>() {
                Ok(minor) => (major, minor),
                Err(_) => {
                    tracing::warn!(version = raw, "could not parse minor version, defaulting to (3, 0)");
                    (3, 0)
                }
            }
        }
        _ => {
            tracing::warn!(version = raw, "could not parse version, defaulting to (3, 0)");
            (3, 0)
        }
    };

    VersionInfo { major, minor, full: raw.to_string(), enterprise }
}

/// Three checks, any of which suffices: substring "enterprise"
/// (case-insensitive); the `-eeN` suffix regex; or the `X.YrZ` leading-token
/// shape.
fn detect_enterprise(full: &str, first_token: &str) -> bool {
    full.to_lowercase().contains("enterprise")
        || ee_suffix_re().is_match(full)
        || edition_token_re().is_match(first_token)
}
