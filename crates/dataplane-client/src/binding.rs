//! C2 (binding half) — the six concrete schema bindings.
//!
//! Modeled as a closed sum type per §9's redesign note rather than a
//! base-class hierarchy: one marker type per `(edition, minor)` pair, each a
//! thin typed handle onto the one [`LoggingClient`] every binding shares
//! (all six address the same physical server; only the Rust *type* differs,
//! which is what lets [`crate::dispatch::Dispatch`] carry six
//! differently-typed callback slots instead of one untyped one).

use crate::middleware::LoggingClient;

/// Which of the six schema bindings is selected. A plain enum, not an
/// `Option`, since in this model all six bindings are unconditionally
/// constructible — there is no "null binding" state to guard against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    CommunityV30,
    CommunityV31,
    CommunityV32,
    EnterpriseV30,
    EnterpriseV31,
    EnterpriseV32,
}

impl BindingKind {
    pub fn minor(self) -> u8 {
        match self {
            BindingKind::CommunityV30 | BindingKind::EnterpriseV30 => 0,
            BindingKind::CommunityV31 | BindingKind::EnterpriseV31 => 1,
            BindingKind::CommunityV32 | BindingKind::EnterpriseV32 => 2,
        }
    }

    pub fn enterprise(self) -> bool {
        matches!(
            self,
            BindingKind::EnterpriseV30 | BindingKind::EnterpriseV31 | BindingKind::EnterpriseV32
        )
    }
}

macro_rules! binding_type {
    ($name:ident, $kind:expr) => {
        #[doc = concat!("Typed handle for the `", stringify!($kind), "` schema binding.")]
        pub struct $name<'a> {
            client: &'a LoggingClient,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(client: &'a LoggingClient) -> Self {
                Self { client }
            }

            pub fn client(&self) -> &'a LoggingClient {
                self.client
            }

            pub const fn kind(&self) -> BindingKind {
                $kind
            }
        }
    };
}

binding_type!(CommunityV30Binding, BindingKind::CommunityV30);
binding_type!(CommunityV31Binding, BindingKind::CommunityV31);
binding_type!(CommunityV32Binding, BindingKind::CommunityV32);
binding_type!(EnterpriseV30Binding, BindingKind::EnterpriseV30);
binding_type!(EnterpriseV31Binding, BindingKind::EnterpriseV31);
binding_type!(EnterpriseV32Binding, BindingKind::EnterpriseV32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_and_edition_are_pure_functions_of_kind() {
        assert_eq!(BindingKind::CommunityV32.minor(), 2);
        assert!(!BindingKind::CommunityV32.enterprise());
        assert_eq!(BindingKind::EnterpriseV30.minor(), 0);
        assert!(BindingKind::EnterpriseV30.enterprise());
    }
}
