//! Remote file access: Azure Files over REST and a local mirror.
//!
//! Every fetcher downloads one remote path (share-relative, `/`-separated) to
//! `local_root/remote_path`, creating directories as needed, and returns the
//! local path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Url;
use reqwest::blocking::Client;
use sha2::Sha256;

use crate::domain::StorageConfig;
use crate::error::AppError;

const API_VERSION: &str = "2021-08-06";

/// Downloads remote files into a local directory.
pub trait Fetcher {
    fn fetch(&self, remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError>;
}

impl<T: Fetcher + ?Sized> Fetcher for Box<T> {
    fn fetch(&self, remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError> {
        (**self).fetch(remote_path, local_root)
    }
}

/// Local target of a share-relative path; rejects absolute paths and `..`.
pub fn local_target(remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError> {
    let mut out = local_root.to_path_buf();
    let mut any = false;
    for seg in remote_path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if seg == ".." {
            return Err(AppError::config(format!(
                "Remote path '{remote_path}' must not leave the share."
            )));
        }
        out.push(seg);
        any = true;
    }
    if !any {
        return Err(AppError::config("Remote path is empty."));
    }
    Ok(out)
}

fn ensure_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::runtime(format!("Failed to create '{}': {e}", parent.display())))?;
    }
    Ok(())
}

/// Parsed `key=value;key=value` storage connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub protocol: String,
    pub account_name: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub endpoint_suffix: String,
    pub file_endpoint: Option<String>,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("file_endpoint", &self.file_endpoint)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut protocol = "https".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut sas_token = None;
        let mut endpoint_suffix = "core.windows.net".to_string();
        let mut file_endpoint = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (keys, SAS tokens) may themselves contain '='.
            let Some((key, value)) = part.split_once('=') else {
                return Err(AppError::config(
                    "Malformed connection string segment (expected key=value).",
                ));
            };
            let value = value.trim().to_string();
            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = value,
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "SharedAccessSignature" => sas_token = Some(value.trim_start_matches('?').to_string()),
                "EndpointSuffix" => endpoint_suffix = value,
                "FileEndpoint" => file_endpoint = Some(value),
                _ => {}
            }
        }

        let account_name =
            account_name.ok_or_else(|| AppError::config("Connection string has no AccountName."))?;
        if account_key.is_none() && sas_token.is_none() {
            return Err(AppError::config(
                "Connection string needs AccountKey or SharedAccessSignature.",
            ));
        }

        Ok(Self {
            protocol,
            account_name,
            account_key,
            sas_token,
            endpoint_suffix,
            file_endpoint,
        })
    }

    /// Base URL of the file service.
    pub fn file_service_url(&self) -> Result<Url, AppError> {
        let raw = match &self.file_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "{}://{}.file.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ),
        };
        Url::parse(&raw).map_err(|e| AppError::config(format!("Invalid file endpoint '{raw}': {e}")))
    }
}

/// An Azure Files share accessed through its REST API.
pub struct AzureFileShare {
    client: Client,
    connection: ConnectionString,
    share: String,
    request_timeout: Option<Duration>,
}

impl AzureFileShare {
    /// A share client whose downloads run until the server finishes.
    pub fn new(connection: ConnectionString, share: &str) -> Result<Self, AppError> {
        Self::with_request_timeout(connection, share, None)
    }

    /// `None` disables the blocking client's default 30 s timeout.
    pub fn with_request_timeout(
        connection: ConnectionString,
        share: &str,
        request_timeout: Option<Duration>,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::runtime(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            connection,
            share: share.to_string(),
            request_timeout,
        })
    }

    pub fn from_config(storage: &StorageConfig) -> Result<Self, AppError> {
        let raw = storage.connection_string.as_deref().ok_or_else(|| {
            AppError::config(format!(
                "Missing {} in environment (.env).",
                crate::domain::CONNECTION_STRING_ENV
            ))
        })?;
        Self::new(ConnectionString::parse(raw)?, &storage.share_name)
    }

    /// URL of a file in the share (without SAS query).
    pub fn file_url(&self, remote_path: &str) -> Result<Url, AppError> {
        let mut url = self.connection.file_service_url()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::config("File endpoint cannot be a base URL."))?;
            segments.pop_if_empty();
            segments.push(&self.share);
            for seg in remote_path.split('/').filter(|s| !s.is_empty()) {
                segments.push(seg);
            }
        }
        Ok(url)
    }

    fn download(&self, remote_path: &str) -> Result<Vec<u8>, AppError> {
        let mut url = self.file_url(remote_path)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let req = if let Some(sas) = &self.connection.sas_token {
            url.set_query(Some(sas));
            self.client.get(url)
        } else {
            let key = self
                .connection
                .account_key
                .as_deref()
                .ok_or_else(|| AppError::config("Connection string has no AccountKey."))?;
            let signature = shared_key_signature(&self.connection.account_name, key, &url, &date)?;
            self.client.get(url).header(
                "Authorization",
                format!("SharedKey {}:{signature}", self.connection.account_name),
            )
        };
        let req = req.header("x-ms-date", &date).header("x-ms-version", API_VERSION);

        let resp = req
            .send()
            .map_err(|e| AppError::runtime(format!("Storage request for '{remote_path}' failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "Storage request for '{remote_path}' failed with status {}.",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| AppError::runtime(format!("Failed to read '{remote_path}': {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl Fetcher for AzureFileShare {
    fn fetch(&self, remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError> {
        let target = local_target(remote_path, local_root)?;
        let body = self.download(remote_path)?;
        ensure_parent(&target)?;
        fs::write(&target, &body)
            .map_err(|e| AppError::runtime(format!("Failed to write '{}': {e}", target.display())))?;
        tracing::debug!(remote = remote_path, bytes = body.len(), "downloaded file");
        Ok(target)
    }
}

/// Shared Key signature of a `GET` without body.
///
/// The string-to-sign is the verb, eleven empty standard headers, the
/// canonicalized `x-ms-*` headers and the canonicalized resource.
pub fn shared_key_signature(
    account: &str,
    key_b64: &str,
    url: &Url,
    date: &str,
) -> Result<String, AppError> {
    let key = STANDARD
        .decode(key_b64)
        .map_err(|e| AppError::config(format!("AccountKey is not valid base64: {e}")))?;

    let mut to_sign = String::from("GET\n");
    to_sign.push_str(&"\n".repeat(11));
    to_sign.push_str(&format!("x-ms-date:{date}\nx-ms-version:{API_VERSION}\n"));
    to_sign.push_str(&format!("/{account}{}", url.path()));

    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| AppError::config(format!("Invalid AccountKey: {e}")))?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// A local directory laid out like the share.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Fetcher for LocalMirror {
    fn fetch(&self, remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError> {
        let source = local_target(remote_path, &self.root)?;
        let target = local_target(remote_path, local_root)?;
        if source == target {
            return Ok(target);
        }
        ensure_parent(&target)?;
        fs::copy(&source, &target).map_err(|e| {
            AppError::runtime(format!("Failed to copy '{}': {e}", source.display()))
        })?;
        Ok(target)
    }
}
