//! Shared data model: [`Endpoint`], [`VersionInfo`], [`Capabilities`].

use std::sync::OnceLock;

use crate::error::Error;

/// Identity of a remote Dataplane API server. Immutable after construction
/// except for the four version-cache fields, which the probe ([`crate::probe`])
/// sets exactly once; reads of the cache after that point never change.
#[derive(Debug)]
pub struct Endpoint {
    base_url: String,
    username: String,
    password: String,
    pod_id: Option<String>,
    version: OnceLock<VersionInfo>,
}

impl Endpoint {
    /// Construct an endpoint. Fails with [`Error::Configuration`] if the
    /// URL, username, or password is empty.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        pod_id: Option<String>,
    ) -> Result<Self, Error> {
        let base_url = base_url.into();
        let username = username.into();
        let password = password.into();
        if base_url.is_empty() {
            return Err(Error::Configuration("base_url must not be empty".into()));
        }
        if username.is_empty() || password.is_empty() {
            return Err(Error::Configuration(
                "username and password must not be empty".into(),
            ));
        }
        Ok(Self {
            base_url,
            username,
            password,
            pod_id,
            version: OnceLock::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Operator-visible pod identifier, purely for logging/metrics labels.
    pub fn pod_id(&self) -> Option<&str> {
        self.pod_id.as_deref()
    }

    pub fn cached_version(&self) -> Option<&VersionInfo> {
        self.version.get()
    }

    /// Record the result of a probe. Idempotent: a second call with a
    /// different value is silently ignored, since the cache is meant to be
    /// set once by the first successful probe.
    pub fn set_cached_version(&self, info: VersionInfo) {
        let _ = self.version.set(info);
    }

    /// Strip a trailing `/v2` or `/v3` (and any trailing slash) from the
    /// configured base URL, the normalization step §6 describes happening
    /// before the probe.
    pub fn normalized_base_url(&self) -> &str {
        let mut url = self.base_url.as_str();
        url = url.trim_end_matches('/');
        for suffix in ["/v3", "/v2"] {
            if let Some(stripped) = url.strip_suffix(suffix) {
                url = stripped;
            }
        }
        url
    }
}

/// The remote server's resolved schema family. Produced by [`crate::probe::probe`],
/// stored once on the [`crate::clientset::Clientset`], never mutated after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u8,
    pub minor: u8,
    pub full: String,
    pub enterprise: bool,
}

/// A closed set of feature flags, derived solely from `(major, minor)`. Kept
/// as a plain struct of bools (not a map) because the tag set is closed and
/// known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub general_storage: bool,
    pub map_storage: bool,
    pub http2: bool,
    pub quic: bool,
    pub runtime_maps: bool,
    pub runtime_servers: bool,
    pub crt_list: bool,
}

impl Capabilities {
    /// Derive the capability set for a resolved version. A pure function:
    /// two calls with equal `(major, minor)` always agree.
    pub fn from_version(version: &VersionInfo) -> Self {
        Self {
            general_storage: true,
            map_storage: true,
            http2: true,
            quic: true,
            runtime_maps: true,
            runtime_servers: true,
            crt_list: version.minor >= 2,
        }
    }
}
