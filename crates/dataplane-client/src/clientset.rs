//! C2 — Clientset: aggregates the six bindings, version info, capabilities,
//! the endpoint, and exposes the "preferred binding" selection.

use std::sync::Arc;

use crate::binding::{
    BindingKind, CommunityV30Binding, CommunityV31Binding, CommunityV32Binding,
    EnterpriseV30Binding, EnterpriseV31Binding, EnterpriseV32Binding,
};
use crate::error::Error;
use crate::middleware::LoggingClient;
use crate::probe;
use crate::types::{Capabilities, Endpoint, VersionInfo};

/// Invariant: every one of the six bindings is reachable regardless of
/// which is preferred, since they're modeled as a closed enum over one
/// shared transport rather than six independently-nullable objects.
pub struct Clientset {
    endpoint: Arc<Endpoint>,
    version: VersionInfo,
    capabilities: Capabilities,
    http: LoggingClient,
}

impl Clientset {
    /// Construct a clientset: probe (or reuse the endpoint's cache), reject
    /// unsupported majors, derive capabilities, and build the shared
    /// transport with basic auth installed on every outgoing request.
    pub async fn connect(endpoint: Arc<Endpoint>) -> Result<Self, Error> {
        let version = probe::probe(&endpoint).await?;
        Self::new(endpoint, version)
    }

    /// Construct directly from an already-resolved [`VersionInfo`], skipping
    /// the network probe. Still validates `major == 3`.
    pub fn new(endpoint: Arc<Endpoint>, version: VersionInfo) -> Result<Self, Error> {
        if version.major != 3 {
            return Err(Error::Probe(format!(
                "unsupported major version {} (only 3 is supported)",
                version.major
            )));
        }
        let capabilities = Capabilities::from_version(&version);
        let http = LoggingClient::new(endpoint.normalized_base_url(), endpoint.username(), endpoint.password());
        Ok(Self { endpoint, version, capabilities, http })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_enterprise(&self) -> bool {
        self.version.enterprise
    }

    pub(crate) fn http(&self) -> &LoggingClient {
        &self.http
    }

    /// The binding this clientset routes through by default: enterprise is
    /// preferred over community at the same minor, and higher minors are
    /// preferred over lower ones — `enterprise 3.2 > enterprise 3.1 >
    /// enterprise 3.0 > community 3.2 > community 3.1 > community 3.0` is
    /// not how selection works, though: selection is a pure function of
    /// *this* clientset's resolved `(edition, minor)`, not a priority scan
    /// over all six.
    pub fn preferred_binding(&self) -> BindingKind {
        match (self.version.enterprise, self.version.minor) {
            (true, m) if m >= 2 => BindingKind::EnterpriseV32,
            (true, 1) => BindingKind::EnterpriseV31,
            (true, _) => BindingKind::EnterpriseV30,
            (false, m) if m >= 2 => BindingKind::CommunityV32,
            (false, 1) => BindingKind::CommunityV31,
            (false, _) => BindingKind::CommunityV30,
        }
    }

    pub fn community_v30(&self) -> CommunityV30Binding<'_> {
        CommunityV30Binding::new(&self.http)
    }
    pub fn community_v31(&self) -> CommunityV31Binding<'_> {
        CommunityV31Binding::new(&self.http)
    }
    pub fn community_v32(&self) -> CommunityV32Binding<'_> {
        CommunityV32Binding::new(&self.http)
    }
    pub fn enterprise_v30(&self) -> EnterpriseV30Binding<'_> {
        EnterpriseV30Binding::new(&self.http)
    }
    pub fn enterprise_v31(&self) -> EnterpriseV31Binding<'_> {
        EnterpriseV31Binding::new(&self.http)
    }
    pub fn enterprise_v32(&self) -> EnterpriseV32Binding<'_> {
        EnterpriseV32Binding::new(&self.http)
    }
}
