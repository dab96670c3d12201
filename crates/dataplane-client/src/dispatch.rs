//! C3 — Dispatch Layer.
//!
//! Encodes the single versioning pivot used throughout the client: a
//! [`Dispatch`] call carries up to six per-binding callbacks and the
//! dispatcher resolves [`crate::clientset::Clientset::preferred_binding`]
//! and invokes the matching one. A missing callback surfaces as
//! [`Error::Dispatch`] — "not supported on this version" is a legitimate,
//! expected branch outcome, not a programmer error to panic on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

use crate::binding::{
    BindingKind, CommunityV30Binding, CommunityV31Binding, CommunityV32Binding,
    EnterpriseV30Binding, EnterpriseV31Binding, EnterpriseV32Binding,
};
use crate::clientset::Clientset;
use crate::error::Error;
use crate::middleware::LoggingClient;
use crate::translate;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Build a [`Dispatch`] where every branch runs the same closure over the
/// shared transport. This is the common case in this client: storage and
/// config operations address the same HTTP resource regardless of which of
/// the six bindings is preferred, differing only in the per-branch model
/// type used during translation — which the closure itself handles via its
/// generic return type `T`.
pub fn on_all_bindings<'a, T: 'a, F>(f: F) -> Dispatch<'a, T>
where
    F: Fn(&'a LoggingClient) -> BoxFuture<'a, T> + Clone + 'a,
{
    let (f1, f2, f3, f4, f5, f6) = (f.clone(), f.clone(), f.clone(), f.clone(), f.clone(), f);
    Dispatch::new()
        .on_community_v30(move |b| f1(b.client()))
        .on_community_v31(move |b| f2(b.client()))
        .on_community_v32(move |b| f3(b.client()))
        .on_enterprise_v30(move |b| f4(b.client()))
        .on_enterprise_v31(move |b| f5(b.client()))
        .on_enterprise_v32(move |b| f6(b.client()))
}

/// The CallFunc record (§9): one optional callback per branch, each typed
/// to its own binding so the compiler — not a runtime check — enforces
/// that a V30 callback can only be built from a `CommunityV30Binding`.
pub struct Dispatch<'a, T> {
    community_v30: Option<Box<dyn FnOnce(CommunityV30Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    community_v31: Option<Box<dyn FnOnce(CommunityV31Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    community_v32: Option<Box<dyn FnOnce(CommunityV32Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    enterprise_v30: Option<Box<dyn FnOnce(EnterpriseV30Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    enterprise_v31: Option<Box<dyn FnOnce(EnterpriseV31Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    enterprise_v32: Option<Box<dyn FnOnce(EnterpriseV32Binding<'a>) -> BoxFuture<'a, T> + 'a>>,
    /// Optional capability predicate, checked before dispatch; a `false`
    /// short-circuits with [`Error::Capability`] without touching the
    /// network.
    capability_gate: Option<(&'static str, bool)>,
    enterprise_only: bool,
}

impl<'a, T: 'a> Default for Dispatch<'a, T> {
    fn default() -> Self {
        Self {
            community_v30: None,
            community_v31: None,
            community_v32: None,
            enterprise_v30: None,
            enterprise_v31: None,
            enterprise_v32: None,
            capability_gate: None,
            enterprise_only: false,
        }
    }
}

impl<'a, T: 'a> Dispatch<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks this call as enterprise-only: it fails fast with
    /// [`Error::EnterpriseRequired`] if the clientset is community, before
    /// any binding is consulted.
    pub fn enterprise_only(mut self) -> Self {
        self.enterprise_only = true;
        self
    }

    /// Gate this call on a named capability; `allowed` is the capability's
    /// current value (the caller reads it off `Clientset::capabilities`).
    pub fn require_capability(mut self, name: &'static str, allowed: bool) -> Self {
        self.capability_gate = Some((name, allowed));
        self
    }

    pub fn on_community_v30(
        mut self,
        f: impl FnOnce(CommunityV30Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.community_v30 = Some(Box::new(f));
        self
    }
    pub fn on_community_v31(
        mut self,
        f: impl FnOnce(CommunityV31Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.community_v31 = Some(Box::new(f));
        self
    }
    pub fn on_community_v32(
        mut self,
        f: impl FnOnce(CommunityV32Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.community_v32 = Some(Box::new(f));
        self
    }
    pub fn on_enterprise_v30(
        mut self,
        f: impl FnOnce(EnterpriseV30Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.enterprise_v30 = Some(Box::new(f));
        self
    }
    pub fn on_enterprise_v31(
        mut self,
        f: impl FnOnce(EnterpriseV31Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.enterprise_v31 = Some(Box::new(f));
        self
    }
    pub fn on_enterprise_v32(
        mut self,
        f: impl FnOnce(EnterpriseV32Binding<'a>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        self.enterprise_v32 = Some(Box::new(f));
        self
    }

    /// Resolve the preferred binding and invoke the matching callback.
    pub async fn call(self, clientset: &'a Clientset) -> Result<T, Error> {
        if self.enterprise_only && !clientset.is_enterprise() {
            return Err(Error::EnterpriseRequired);
        }
        if let Some((name, allowed)) = self.capability_gate {
            if !allowed {
                return Err(Error::Capability(format!(
                    "capability `{name}` not supported on version {}.{}",
                    clientset.version().major,
                    clientset.version().minor
                )));
            }
        }

        let kind = clientset.preferred_binding();
        match kind {
            BindingKind::CommunityV30 => match self.community_v30 {
                Some(f) => f(clientset.community_v30()).await,
                None => Err(not_supported(kind)),
            },
            BindingKind::CommunityV31 => match self.community_v31 {
                Some(f) => f(clientset.community_v31()).await,
                None => Err(not_supported(kind)),
            },
            BindingKind::CommunityV32 => match self.community_v32 {
                Some(f) => f(clientset.community_v32()).await,
                None => Err(not_supported(kind)),
            },
            BindingKind::EnterpriseV30 => match self.enterprise_v30 {
                Some(f) => f(clientset.enterprise_v30()).await,
                None => Err(not_supported(kind)),
            },
            BindingKind::EnterpriseV31 => match self.enterprise_v31 {
                Some(f) => f(clientset.enterprise_v31()).await,
                None => Err(not_supported(kind)),
            },
            BindingKind::EnterpriseV32 => match self.enterprise_v32 {
                Some(f) => f(clientset.enterprise_v32()).await,
                None => Err(not_supported(kind)),
            },
        }
    }
}

fn not_supported(kind: BindingKind) -> Error {
    Error::Dispatch(format!("operation not supported on {kind:?}"))
}

/// Which write kind a [`CrudOp`] performs. Purely documentary — it doesn't
/// change dispatch behavior, but keeps call sites and error messages honest
/// about which of the six CRUD helpers (§4.3) a given call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudKind {
    Create,
    Update,
    Delete,
    CreateChild,
    ReplaceChild,
    DeleteChild,
}

/// A write-carrying generic CRUD helper (§4.3): serializes a unified model
/// to neutral JSON exactly once via [`translate::to_neutral_json`], then
/// hands the same bytes to whichever branch [`preferred_binding`] selects.
/// Each branch is expected to decode those bytes into its own
/// branch-specific model type before invoking the per-version request —
/// the "serialize once, deserialize per branch" discipline §4.3 requires,
/// with Rust's lack of higher-kinded generics making each branch an
/// explicit typed closure rather than one generic function (§9).
pub struct CrudOp<'a, T> {
    kind: CrudKind,
    bytes: Arc<[u8]>,
    dispatch: Dispatch<'a, T>,
}

impl<'a, T: 'a> CrudOp<'a, T> {
    /// Serialize `unified` once; `kind` is carried through for error
    /// messages and has no effect on the network path chosen.
    pub fn new<U: Serialize>(kind: CrudKind, unified: &U) -> Result<Self, Error> {
        let bytes: Arc<[u8]> = translate::to_neutral_json(unified)?.into();
        Ok(Self { kind, bytes, dispatch: Dispatch::new() })
    }

    pub fn kind(&self) -> CrudKind {
        self.kind
    }

    pub fn enterprise_only(mut self) -> Self {
        self.dispatch = self.dispatch.enterprise_only();
        self
    }

    pub fn require_capability(mut self, name: &'static str, allowed: bool) -> Self {
        self.dispatch = self.dispatch.require_capability(name, allowed);
        self
    }

    /// Register the branch handler for `CommunityV30`. `f` receives the
    /// branch binding and the single serialized-once payload; it is
    /// responsible for decoding those bytes into its own branch-specific
    /// model type (typically via [`translate::from_neutral_json`]) before
    /// issuing the request.
    pub fn on_community_v30(
        mut self,
        f: impl FnOnce(CommunityV30Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_community_v30(move |b| f(b, bytes));
        self
    }
    pub fn on_community_v31(
        mut self,
        f: impl FnOnce(CommunityV31Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_community_v31(move |b| f(b, bytes));
        self
    }
    pub fn on_community_v32(
        mut self,
        f: impl FnOnce(CommunityV32Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_community_v32(move |b| f(b, bytes));
        self
    }
    pub fn on_enterprise_v30(
        mut self,
        f: impl FnOnce(EnterpriseV30Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_enterprise_v30(move |b| f(b, bytes));
        self
    }
    pub fn on_enterprise_v31(
        mut self,
        f: impl FnOnce(EnterpriseV31Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_enterprise_v31(move |b| f(b, bytes));
        self
    }
    pub fn on_enterprise_v32(
        mut self,
        f: impl FnOnce(EnterpriseV32Binding<'a>, Arc<[u8]>) -> BoxFuture<'a, T> + 'a,
    ) -> Self {
        let bytes = self.bytes.clone();
        self.dispatch = self.dispatch.on_enterprise_v32(move |b| f(b, bytes));
        self
    }

    pub async fn call(self, clientset: &'a Clientset) -> Result<T, Error> {
        self.dispatch.call(clientset).await
    }
}

/// Build a `create` call on a parent resource: one serialization of
/// `unified`, six potential branch targets.
pub fn create<'a, T: 'a, U: Serialize>(unified: &U) -> Result<CrudOp<'a, T>, Error> {
    CrudOp::new(CrudKind::Create, unified)
}

/// Build an `update` call on a parent resource. Same shape as [`create`];
/// kept as a distinct name since the two differ in intent (and, at call
/// sites, in which HTTP verb and status codes the branch closures expect).
pub fn update<'a, T: 'a, U: Serialize>(unified: &U) -> Result<CrudOp<'a, T>, Error> {
    CrudOp::new(CrudKind::Update, unified)
}

/// Build a `create-child` call (a resource nested under a named parent,
/// e.g. a server under a backend).
pub fn create_child<'a, T: 'a, U: Serialize>(unified: &U) -> Result<CrudOp<'a, T>, Error> {
    CrudOp::new(CrudKind::CreateChild, unified)
}

/// Build a `replace-child` call.
pub fn replace_child<'a, T: 'a, U: Serialize>(unified: &U) -> Result<CrudOp<'a, T>, Error> {
    CrudOp::new(CrudKind::ReplaceChild, unified)
}

/// Build a `delete` call on a parent resource. Deletes carry no body, so
/// this is a plain [`Dispatch`] rather than a [`CrudOp`] — there is nothing
/// for the Model Translator to serialize.
pub fn delete<'a, T: 'a>() -> Dispatch<'a, T> {
    Dispatch::new()
}

/// Build a `delete-child` call. Same rationale as [`delete`].
pub fn delete_child<'a, T: 'a>() -> Dispatch<'a, T> {
    Dispatch::new()
}
