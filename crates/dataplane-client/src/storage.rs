//! C8 — Storage Operations: SSL certs, map files, CRT-lists, general files.
//!
//! Dispatches on status code (`OK` / `NOT_FOUND` / other) across the four
//! storage kinds, honoring the create/update payload-shape asymmetry.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;

use crate::clientset::Clientset;
use crate::error::{Error, ResourceState};

/// Sentinel returned by [`StorageContent::fingerprint`] consumers when an
/// older server exposes no fingerprint field at all — the caller is
/// expected to treat the resource as needing recreation (§9 open question iii).
pub const UNKNOWN_FINGERPRINT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    SslCert,
    MapFile,
    CrtList,
    GeneralFile,
}

impl StorageKind {
    fn path_segment(self) -> &'static str {
        match self {
            StorageKind::SslCert => "ssl_certificates",
            StorageKind::MapFile => "maps",
            StorageKind::CrtList => "ssl_crt_lists",
            StorageKind::GeneralFile => "general",
        }
    }

    fn resource_label(self) -> &'static str {
        match self {
            StorageKind::SslCert => "ssl certificate",
            StorageKind::MapFile => "map file",
            StorageKind::CrtList => "crt-list",
            StorageKind::GeneralFile => "general file",
        }
    }

    /// Cert and CRT-list names have dots in the basename replaced with
    /// underscores server-side; map and general file names are used as-is.
    fn sanitizes_dots(self) -> bool {
        matches!(self, StorageKind::SslCert | StorageKind::CrtList)
    }
}

/// For cert/CRT-list names: dots in the basename (everything before the
/// final extension) become underscores, since callers may pass dotted
/// forms but the server rejects them.
pub fn sanitize_name(name: &str) -> String {
    let (stem, ext) = split_final_extension(name);
    format!("{}{}", stem.replace('.', "_"), ext)
}

/// Restore dots in the basename for list results. Lossy if the original
/// name itself contained underscores, but round-trips exactly for names
/// that only ever had dots, which is the invariant this client relies on.
pub fn unsanitize_name(name: &str) -> String {
    let (stem, ext) = split_final_extension(name);
    format!("{}{}", stem.replace('_', "."), ext)
}

fn split_final_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

/// Result of a get-content call. SSL certs never return the PEM bytes —
/// only a content-identity fingerprint; the other three kinds return the
/// raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageContent {
    Bytes(Vec<u8>),
    SslFingerprint(String),
}

#[derive(Debug, Deserialize)]
struct FingerprintBody {
    #[serde(alias = "sha256-finger-print")]
    sha256_finger_print: Option<String>,
}

/// Typed CRUD over one storage kind.
pub struct StorageOps<'a> {
    clientset: &'a Clientset,
    kind: StorageKind,
}

impl<'a> StorageOps<'a> {
    pub fn new(clientset: &'a Clientset, kind: StorageKind) -> Self {
        Self { clientset, kind }
    }

    fn base_path(&self) -> String {
        format!("/v3/services/haproxy/storage/{}", self.kind.path_segment())
    }

    fn wire_name(&self, name: &str) -> String {
        if self.kind.sanitizes_dots() {
            sanitize_name(name)
        } else {
            name.to_string()
        }
    }

    /// CRT-list operations run through this gate; all others pass through
    /// unconditionally since their capabilities are true for every
    /// supported version (§3).
    fn ensure_capability(&self) -> Result<(), Error> {
        if matches!(self.kind, StorageKind::CrtList) && !self.clientset.capabilities().crt_list {
            return Err(Error::Capability(format!(
                "crt_list not supported on version {}.{}",
                self.clientset.version().major,
                self.clientset.version().minor
            )));
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>, Error> {
        self.ensure_capability()?;
        let request = self
            .clientset
            .http()
            .request(Method::GET, &self.base_path())
            .build()
            .map_err(|e| http_build_error("list", e))?;
        let parts = self.clientset.http().send(request).await?;

        if !parts.status.is_success() {
            return Err(Error::Http {
                operation: format!("list {}", self.kind.resource_label()),
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            });
        }

        let names: Vec<String> = serde_json::from_slice(&parts.body)
            .map_err(|e| Error::Http { operation: "list".into(), status: parts.status.as_u16(), body: e.to_string() })?;
        Ok(names
            .into_iter()
            .map(|n| if self.kind.sanitizes_dots() { unsanitize_name(&n) } else { n })
            .collect())
    }

    /// Get-content: 200 required; empty body is a legitimate empty-file
    /// result. SSL certs never carry PEM bytes in the response — only a
    /// fingerprint, taken from the first present of two field names.
    pub async fn get_content(&self, name: &str) -> Result<StorageContent, Error> {
        self.ensure_capability()?;
        let wire_name = self.wire_name(name);
        let request = self
            .clientset
            .http()
            .request(Method::GET, &format!("{}/{wire_name}", self.base_path()))
            .build()
            .map_err(|e| http_build_error("get-content", e))?;
        let parts = self.clientset.http().send(request).await?;

        if parts.status.as_u16() == 404 {
            return Err(not_found(self.kind, name));
        }
        if !parts.status.is_success() {
            return Err(Error::Http {
                operation: format!("get-content {}", self.kind.resource_label()),
                status: parts.status.as_u16(),
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            });
        }

        if matches!(self.kind, StorageKind::SslCert) {
            let fingerprint = serde_json::from_slice::<FingerprintBody>(&parts.body)
                .ok()
                .and_then(|b| b.sha256_finger_print)
                .unwrap_or_else(|| UNKNOWN_FINGERPRINT.to_string());
            return Ok(StorageContent::SslFingerprint(fingerprint));
        }

        Ok(StorageContent::Bytes(parts.body.to_vec()))
    }

    /// Create: multipart/form-data, part `file_upload` carrying the
    /// (sanitized) filename; general files additionally carry an `id` field
    /// equal to the path. 201 = applied, 202 = accepted/reload scheduled;
    /// 409 maps to [`Error::ResourceState`] (already exists).
    pub async fn create(&self, name: &str, content: Vec<u8>) -> Result<(), Error> {
        self.ensure_capability()?;
        let wire_name = self.wire_name(name);
        let part = Part::bytes(content).file_name(wire_name.clone());
        let mut form = Form::new().part("file_upload", part);
        if matches!(self.kind, StorageKind::GeneralFile) {
            form = form.text("id", wire_name.clone());
        }

        let request = self
            .clientset
            .http()
            .request(Method::POST, &self.base_path())
            .multipart(form)
            .build()
            .map_err(|e| http_build_error("create", e))?;
        let parts = self.clientset.http().send(request).await?;

        match parts.status.as_u16() {
            201 | 202 => Ok(()),
            409 => Err(Error::ResourceState {
                state: ResourceState::AlreadyExists,
                kind: self.kind.resource_label().to_string(),
                name: name.to_string(),
            }),
            status => Err(Error::Http {
                operation: format!("create {}", self.kind.resource_label()),
                status,
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            }),
        }
    }

    /// Update (replace): text/plain body — a deliberate asymmetry with
    /// create. 200/202 ok; 404 maps to not-found, mentioning the original
    /// (unsanitized) dotted name the caller passed in.
    pub async fn update(&self, name: &str, content: Vec<u8>) -> Result<(), Error> {
        self.ensure_capability()?;
        let wire_name = self.wire_name(name);
        let request = self
            .clientset
            .http()
            .request(Method::PUT, &format!("{}/{wire_name}", self.base_path()))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(content)
            .build()
            .map_err(|e| http_build_error("update", e))?;
        let parts = self.clientset.http().send(request).await?;

        match parts.status.as_u16() {
            200 | 202 => Ok(()),
            404 => Err(not_found(self.kind, name)),
            status => Err(Error::Http {
                operation: format!("update {}", self.kind.resource_label()),
                status,
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            }),
        }
    }

    /// Delete: no body; 200/202/204 ok; 404 maps to not-found.
    pub async fn delete(&self, name: &str) -> Result<(), Error> {
        self.ensure_capability()?;
        let wire_name = self.wire_name(name);
        let request = self
            .clientset
            .http()
            .request(Method::DELETE, &format!("{}/{wire_name}", self.base_path()))
            .build()
            .map_err(|e| http_build_error("delete", e))?;
        let parts = self.clientset.http().send(request).await?;

        match parts.status.as_u16() {
            200 | 202 | 204 => Ok(()),
            404 => Err(not_found(self.kind, name)),
            status => Err(Error::Http {
                operation: format!("delete {}", self.kind.resource_label()),
                status,
                body: String::from_utf8_lossy(&parts.body).into_owned(),
            }),
        }
    }
}

fn not_found(kind: StorageKind, name: &str) -> Error {
    Error::ResourceState {
        state: ResourceState::NotFound,
        kind: kind.resource_label().to_string(),
        name: name.to_string(),
    }
}

fn http_build_error(operation: &str, err: reqwest::Error) -> Error {
    Error::Http { operation: operation.to_string(), status: 0, body: err.to_string() }
}
