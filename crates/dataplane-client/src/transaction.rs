//! C6 — Transaction Manager.
//!
//! Modeled after a mutex-guarded resource with idempotent release (the
//! shape of a filesystem lock), generalized here to an HTTP transaction
//! with two mutually-exclusive terminal states.

use std::sync::Mutex;

use reqwest::Method;

use crate::clientset::Clientset;
use crate::error::{Error, VersionConflictError};

/// `{status_code, reload_id}` — `reload_id` is `Some` only when the status
/// indicates a reload was scheduled (202).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub status_code: u16,
    pub reload_id: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    committed: bool,
    aborted: bool,
    cached_commit: Option<CommitResult>,
}

/// A server-side grouping of configuration edits applied atomically on
/// commit. Holds a borrowed reference to the [`Clientset`] that produced it
/// (§9's cyclic-reference note: owning direction is Clientset -> Transaction,
/// the back-reference is borrowed and outlived by its Clientset).
pub struct Transaction<'a> {
    clientset: &'a Clientset,
    id: String,
    opened_at_version: u64,
    state: Mutex<State>,
}

impl<'a> Transaction<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn opened_at_version(&self) -> u64 {
        self.opened_at_version
    }

    /// Open a transaction at `version`. HTTP 201 parses `{id, version}`;
    /// 409/406 produce a [`VersionConflictError`] carrying the
    /// `Configuration-Version` header when present, else the sentinel
    /// `"unknown"`. Any other non-2xx wraps as [`Error::Http`].
    pub async fn start(clientset: &'a Clientset, version: u64) -> Result<Transaction<'a>, Error> {
        let request = clientset
            .http()
            .request(Method::POST, &format!("/v3/services/haproxy/transactions?version={version}"))
            .build()
            .map_err(|e| Error::Http { operation: "start transaction".into(), status: 0, body: e.to_string() })?;
        let parts = clientset.http().send(request).await?;

        if parts.status.as_u16() == 201 {
            #[derive(serde::Deserialize)]
            struct StartBody {
                id: String,
                version: u64,
            }
            let body: StartBody = serde_json::from_slice(&parts.body)
                .map_err(|e| Error::Http { operation: "start transaction".into(), status: 201, body: e.to_string() })?;
            return Ok(Transaction {
                clientset,
                id: body.id,
                opened_at_version: body.version,
                state: Mutex::new(State::default()),
            });
        }

        if matches!(parts.status.as_u16(), 409 | 406) {
            let actual = parts
                .headers
                .get("Configuration-Version")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .unwrap_or_else(|| VersionConflictError::UNKNOWN_VERSION.to_string());
            return Err(Error::VersionConflict(VersionConflictError { expected: version, actual }));
        }

        Err(Error::Http {
            operation: "start transaction".into(),
            status: parts.status.as_u16(),
            body: String::from_utf8_lossy(&parts.body).into_owned(),
        })
    }

    /// Commit with `force_reload=false`. Idempotent: a second call on an
    /// already-committed transaction logs a warning and returns the cached
    /// result without a network call. Committing after abort is a hard
    /// error.
    pub async fn commit(&self) -> Result<CommitResult, Error> {
        {
            let state = self.state.lock().expect("transaction mutex poisoned");
            if state.committed {
                tracing::warn!(transaction_id = %self.id, "double commit on already-committed transaction");
                return Ok(state.cached_commit.clone().expect("committed implies cached result"));
            }
            if state.aborted {
                return Err(Error::TransactionState(format!(
                    "cannot commit transaction {} after abort",
                    self.id
                )));
            }
        }

        let request = self
            .clientset
            .http()
            .request(
                Method::PUT,
                &format!("/v3/services/haproxy/transactions/{}?force_reload=false", self.id),
            )
            .build()
            .map_err(|e| Error::Http { operation: "commit transaction".into(), status: 0, body: e.to_string() })?;
        let parts = self.clientset.http().send(request).await?;

        if matches!(parts.status.as_u16(), 409 | 406) {
            let actual = parts
                .headers
                .get("Configuration-Version")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .unwrap_or_else(|| VersionConflictError::UNKNOWN_VERSION.to_string());
            return Err(Error::VersionConflict(VersionConflictError {
                expected: self.opened_at_version,
                actual,
            }));
        }

        if !parts.status.is_success() {
            return Err(Error::Http {
                operation: "commit transaction".into(),
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            });
        }

        let reload_id = (parts.status.as_u16() == 202)
            .then(|| parts.headers.get("Reload-ID").and_then(|v| v.to_str().ok()).map(str::to_owned))
            .flatten();
        let result = CommitResult { status_code: parts.status.as_u16(), reload_id };

        let mut state = self.state.lock().expect("transaction mutex poisoned");
        state.committed = true;
        state.cached_commit = Some(result.clone());
        Ok(result)
    }

    /// Abort. Idempotent and thread-safe: a no-op success if already
    /// committed (scoped-cleanup pattern) or already aborted (with a
    /// warning in the latter case); HTTP 404 on the delete is not an error.
    pub async fn abort(&self) -> Result<(), Error> {
        {
            let state = self.state.lock().expect("transaction mutex poisoned");
            if state.committed {
                return Ok(());
            }
            if state.aborted {
                tracing::warn!(transaction_id = %self.id, "abort on already-aborted transaction");
                return Ok(());
            }
        }

        let request = self
            .clientset
            .http()
            .request(Method::DELETE, &format!("/v3/services/haproxy/transactions/{}", self.id))
            .build()
            .map_err(|e| Error::Http { operation: "abort transaction".into(), status: 0, body: e.to_string() })?;
        let parts = self.clientset.http().send(request).await?;

        if !parts.status.is_success() && parts.status.as_u16() != 404 {
            return Err(Error::Http {
                operation: "abort transaction".into(),
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            });
        }

        let mut state = self.state.lock().expect("transaction mutex poisoned");
        state.aborted = true;
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.state.lock().expect("transaction mutex poisoned").committed
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().expect("transaction mutex poisoned").aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, VersionInfo};
    use std::sync::Arc;

    fn test_clientset(base_url: String) -> Clientset {
        let endpoint = Arc::new(Endpoint::new(base_url, "u", "p", None).unwrap());
        let version = VersionInfo { major: 3, minor: 2, full: "3.2.0".into(), enterprise: false };
        Clientset::new(endpoint, version).unwrap()
    }

    fn respond_once(status: u16, headers: Vec<(&'static str, String)>, body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let mut response =
                    tiny_http::Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
                for (name, value) in headers {
                    response.add_header(tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
                }
                let _ = request.respond(response);
            }
        });
        addr
    }

    #[tokio::test]
    async fn start_transaction_success_parses_id_and_version() {
        let addr = respond_once(201, vec![], r#"{"id":"tx-1","version":43}"#);
        let cs = test_clientset(format!("http://{addr}"));
        let tx = Transaction::start(&cs, 42).await.unwrap();
        assert_eq!(tx.id(), "tx-1");
        assert_eq!(tx.opened_at_version(), 43);
    }

    #[tokio::test]
    async fn start_transaction_conflict_carries_header_version() {
        let addr = respond_once(409, vec![("Configuration-Version", "45".into())], "");
        let cs = test_clientset(format!("http://{addr}"));
        let err = Transaction::start(&cs, 42).await.unwrap_err();
        match err {
            Error::VersionConflict(VersionConflictError { expected, actual }) => {
                assert_eq!(expected, 42);
                assert_eq!(actual, "45");
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_transaction_406_is_identical_kind_to_409() {
        let addr = respond_once(406, vec![], "");
        let cs = test_clientset(format!("http://{addr}"));
        let err = Transaction::start(&cs, 42).await.unwrap_err();
        assert!(matches!(err, Error::VersionConflict(_)));
    }
}
