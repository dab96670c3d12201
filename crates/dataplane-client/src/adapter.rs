//! C10 — Version Adapter: a convenience wrapper around the transaction
//! manager (C6) and retry engine (C5).
//!
//! Acquires a scoped [`Transaction`], runs the caller's block, and releases
//! it on every exit path, committing on success and aborting otherwise.

use std::future::Future;

use crate::clientset::Clientset;
use crate::config_ops::read_version;
use crate::error::Error;
use crate::transaction::{CommitResult, Transaction};

/// Run `block` inside a freshly-opened transaction, retrying the whole
/// block (including re-reading the version and re-opening the transaction)
/// on a version conflict, up to `max_retries + 1` attempts.
pub async fn execute_transaction<'a, T, F, Fut>(
    clientset: &'a Clientset,
    max_retries: u32,
    mut block: F,
) -> Result<T, Error>
where
    F: FnMut(&Transaction<'a>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_conflict: Option<Error> = None;

    for _ in 0..=max_retries {
        let version = read_version(clientset).await?;
        let tx = match Transaction::start(clientset, version).await {
            Ok(tx) => tx,
            Err(err @ Error::VersionConflict(_)) => {
                last_conflict = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        };

        match block(&tx).await {
            Ok(value) => match commit_or_retry(&tx).await {
                CommitOutcome::Success(_) => return Ok(value),
                CommitOutcome::Conflict(err) => {
                    last_conflict = Some(err);
                    continue;
                }
                CommitOutcome::HardError(err) => return Err(err),
            },
            Err(err) => {
                let _ = tx.abort().await;
                return Err(err);
            }
        }
    }

    Err(Error::RetriesExhausted(Box::new(
        last_conflict.unwrap_or(Error::Dispatch("retries exhausted with no recorded conflict".into())),
    )))
}

/// Variant that accepts an externally-supplied version for the first
/// attempt only; every retry refreshes the version from the server as
/// usual.
pub async fn execute_transaction_at_version<'a, T, F, Fut>(
    clientset: &'a Clientset,
    starting_version: u64,
    max_retries: u32,
    mut block: F,
) -> Result<T, Error>
where
    F: FnMut(&Transaction<'a>) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_conflict: Option<Error> = None;
    let mut version = Some(starting_version);

    for _ in 0..=max_retries {
        let this_version = match version.take() {
            Some(v) => v,
            None => read_version(clientset).await?,
        };

        let tx = match Transaction::start(clientset, this_version).await {
            Ok(tx) => tx,
            Err(err @ Error::VersionConflict(_)) => {
                last_conflict = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        };

        match block(&tx).await {
            Ok(value) => match commit_or_retry(&tx).await {
                CommitOutcome::Success(_) => return Ok(value),
                CommitOutcome::Conflict(err) => {
                    last_conflict = Some(err);
                    continue;
                }
                CommitOutcome::HardError(err) => return Err(err),
            },
            Err(err) => {
                let _ = tx.abort().await;
                return Err(err);
            }
        }
    }

    Err(Error::RetriesExhausted(Box::new(
        last_conflict.unwrap_or(Error::Dispatch("retries exhausted with no recorded conflict".into())),
    )))
}

enum CommitOutcome {
    Success(CommitResult),
    Conflict(Error),
    HardError(Error),
}

async fn commit_or_retry(tx: &Transaction<'_>) -> CommitOutcome {
    match tx.commit().await {
        Ok(result) => CommitOutcome::Success(result),
        Err(err @ Error::VersionConflict(_)) => {
            let _ = tx.abort().await;
            CommitOutcome::Conflict(err)
        }
        Err(err) => {
            let _ = tx.abort().await;
            CommitOutcome::HardError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, VersionInfo};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_clientset(base_url: String) -> Clientset {
        let endpoint = Arc::new(Endpoint::new(base_url, "u", "p", None).unwrap());
        let version = VersionInfo { major: 3, minor: 2, full: "3.2.0".into(), enterprise: false };
        Clientset::new(endpoint, version).unwrap()
    }

    /// Server replies 409 on commit twice, then 200 on the third commit.
    /// Scenario 4 of §8: exactly three commits and two aborts are observed.
    #[tokio::test]
    async fn retries_on_commit_conflict_until_success() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let commits = Arc::new(AtomicU32::new(0));
        let aborts = Arc::new(AtomicU32::new(0));
        let (commits2, aborts2) = (commits.clone(), aborts.clone());

        let handle = std::thread::spawn(move || {
            // 3 rounds: version read, start, (commit|abort)
            for round in 0..3 {
                let _version_req = server.recv().unwrap();
                let _ = _version_req.respond(tiny_http::Response::from_string("1"));
                let start_req = server.recv().unwrap();
                let _ = start_req.respond(
                    tiny_http::Response::from_string(r#"{"id":"tx","version":1}"#)
                        .with_status_code(tiny_http::StatusCode(201)),
                );
                let commit_req = server.recv().unwrap();
                commits2.fetch_add(1, Ordering::SeqCst);
                if round < 2 {
                    let _ = commit_req.respond(tiny_http::Response::from_string("").with_status_code(tiny_http::StatusCode(409)));
                    let abort_req = server.recv().unwrap();
                    aborts2.fetch_add(1, Ordering::SeqCst);
                    let _ = abort_req.respond(tiny_http::Response::from_string(""));
                } else {
                    let _ = commit_req.respond(tiny_http::Response::from_string(""));
                }
            }
        });

        let cs = test_clientset(format!("http://{addr}"));
        let result = execute_transaction(&cs, 3, |_tx| async { Ok::<_, Error>(()) }).await;
        handle.join().unwrap();

        assert!(result.is_ok());
        assert_eq!(commits.load(Ordering::SeqCst), 3);
        assert_eq!(aborts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn block_error_aborts_and_returns_error_unwrapped() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        std::thread::spawn(move || {
            let version_req = server.recv().unwrap();
            let _ = version_req.respond(tiny_http::Response::from_string("1"));
            let start_req = server.recv().unwrap();
            let _ = start_req.respond(
                tiny_http::Response::from_string(r#"{"id":"tx","version":1}"#)
                    .with_status_code(tiny_http::StatusCode(201)),
            );
            let abort_req = server.recv().unwrap();
            let _ = abort_req.respond(tiny_http::Response::from_string(""));
        });

        let cs = test_clientset(format!("http://{addr}"));
        let result = execute_transaction(&cs, 3, |_tx| async { Err::<(), _>(Error::Cancelled) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
