//! C7 — Config & Version Operations.

use reqwest::Method;

use crate::clientset::Clientset;
use crate::error::Error;

const VERSION_PATH: &str = "/v3/services/haproxy/configuration/version";
const RAW_CONFIG_PATH: &str = "/v3/services/haproxy/configuration/raw";

/// Read the current configuration version. The body is an integer in text
/// form; whitespace is trimmed before parsing.
pub async fn read_version(clientset: &Clientset) -> Result<u64, Error> {
    let request = clientset
        .http()
        .request(Method::GET, VERSION_PATH)
        .build()
        .map_err(|e| Error::Http { operation: "read version".into(), status: 0, body: e.to_string() })?;
    let parts = clientset.http().send(request).await?;

    if !parts.status.is_success() {
        return Err(Error::Http {
            operation: "read version".into(),
            status: parts.status.as_u16(),
            body: String::from_utf8_lossy(&parts.body).into_owned(),
        });
    }

    let text = String::from_utf8_lossy(&parts.body);
    text.trim()
        .parse::<u64>()
        .map_err(|e| Error::Http { operation: "read version".into(), status: parts.status.as_u16(), body: e.to_string() })
}

/// Read the full textual raw configuration.
pub async fn read_raw_config(clientset: &Clientset) -> Result<String, Error> {
    let request = clientset
        .http()
        .request(Method::GET, RAW_CONFIG_PATH)
        .build()
        .map_err(|e| Error::Http { operation: "read raw config".into(), status: 0, body: e.to_string() })?;
    let parts = clientset.http().send(request).await?;

    if !parts.status.is_success() {
        return Err(Error::Http {
            operation: "read raw config".into(),
            status: parts.status.as_u16(),
            body: String::from_utf8_lossy(&parts.body).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&parts.body).into_owned())
}

/// Push a complete raw configuration with `skip_version=true`, bypassing
/// optimistic locking since this write replaces the whole config. Returns
/// the `Reload-ID` header if present.
pub async fn push_raw_config(clientset: &Clientset, config: &str) -> Result<Option<String>, Error> {
    let request = clientset
        .http()
        .request(Method::POST, &format!("{RAW_CONFIG_PATH}?skip_version=true"))
        .body(config.to_owned())
        .build()
        .map_err(|e| Error::Http { operation: "push raw config".into(), status: 0, body: e.to_string() })?;
    let parts = clientset.http().send(request).await?;

    if !parts.status.is_success() {
        return Err(Error::Http {
            operation: "push raw config".into(),
            status: parts.status.as_u16(),
            body: String::from_utf8_lossy(&parts.body).into_owned(),
        });
    }

    Ok(parts.headers.get("Reload-ID").and_then(|v| v.to_str().ok()).map(str::to_owned))
}

/// Generic version-parameter helper: reads the current version, passes it
/// to `operation`, and on a version-conflict retries with a freshly-read
/// version, up to three attempts total, with no backoff.
pub async fn with_fresh_version<T, F, Fut>(clientset: &Clientset, mut operation: F) -> Result<T, Error>
where
    F: FnMut(u64) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let version = read_version(clientset).await?;
        match operation(version).await {
            Ok(value) => return Ok(value),
            Err(Error::VersionConflict(conflict)) => {
                if attempt >= MAX_ATTEMPTS {
                    return Err(Error::VersionConflict(conflict));
                }
            }
            Err(other) => return Err(other),
        }
    }
}
