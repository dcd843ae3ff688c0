//! Narrow HTTP client for the Kubo (IPFS) daemon API.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IpfsError {
    #[error("build http client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("ipfs {op}: {source}")]
    Http {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("ipfs {op}: status {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },

    #[error("ipfs {op}: parse response: {source}")]
    Parse {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// A key held in the daemon keystore.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct KeyListResponse {
    #[serde(rename = "Keys")]
    keys: Vec<KeyInfo>,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

/// HTTP client over a daemon API root (e.g.
/// `http://localhost:5001/api/v0`). Cheap to clone.
#[derive(Debug, Clone)]
pub struct KuboClient {
    api_url: String,
    client: Client,
}

fn check(op: &'static str, response: Response) -> Result<Response, IpfsError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(IpfsError::Status { op, status, body })
}

impl KuboClient {
    pub fn new(api_url: &str) -> Result<Self, IpfsError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(IpfsError::Build)?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Probe the daemon with a short timeout.
    pub fn is_available(&self) -> bool {
        self.client
            .post(format!("{}/id", self.api_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    /// Upload content, returning its hash.
    pub fn add(&self, content: Vec<u8>) -> Result<String, IpfsError> {
        let part = Part::bytes(content).file_name("data");
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/add", self.api_url))
            .multipart(form)
            .send()
            .map_err(|source| IpfsError::Http { op: "add", source })?;
        let response = check("add", response)?;
        let parsed: AddResponse = response
            .json()
            .map_err(|source| IpfsError::Parse { op: "add", source })?;
        Ok(parsed.hash)
    }

    /// Fetch content by CID.
    pub fn cat(&self, cid: &str) -> Result<Vec<u8>, IpfsError> {
        let response = self
            .client
            .post(format!("{}/cat?arg={cid}", self.api_url))
            .send()
            .map_err(|source| IpfsError::Http { op: "cat", source })?;
        let response = check("cat", response)?;
        let bytes = response
            .bytes()
            .map_err(|source| IpfsError::Http { op: "cat", source })?;
        Ok(bytes.to_vec())
    }

    /// Pin content so the daemon keeps it.
    pub fn pin(&self, cid: &str) -> Result<(), IpfsError> {
        let response = self
            .client
            .post(format!("{}/pin/add?arg={cid}", self.api_url))
            .send()
            .map_err(|source| IpfsError::Http { op: "pin", source })?;
        check("pin", response)?;
        Ok(())
    }

    pub fn key_list(&self) -> Result<Vec<KeyInfo>, IpfsError> {
        let response = self
            .client
            .post(format!("{}/key/list", self.api_url))
            .send()
            .map_err(|source| IpfsError::Http {
                op: "key/list",
                source,
            })?;
        let response = check("key/list", response)?;
        let parsed: KeyListResponse = response.json().map_err(|source| IpfsError::Parse {
            op: "key/list",
            source,
        })?;
        Ok(parsed.keys)
    }

    /// Import a PEM-encoded PKCS8 private key under `name`.
    pub fn key_import(&self, name: &str, pem: &str) -> Result<(), IpfsError> {
        let part = Part::bytes(pem.as_bytes().to_vec()).file_name("key.pem");
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!(
                "{}/key/import?arg={name}&format=pem-pkcs8-cleartext",
                self.api_url
            ))
            .multipart(form)
            .send()
            .map_err(|source| IpfsError::Http {
                op: "key/import",
                source,
            })?;
        check("key/import", response)?;
        Ok(())
    }

    /// Publish a CID under the IPNS name of `key_name`.
    pub fn name_publish(&self, cid: &str, key_name: &str) -> Result<(), IpfsError> {
        let response = self
            .client
            .post(format!(
                "{}/name/publish?arg=/ipfs/{cid}&key={key_name}",
                self.api_url
            ))
            .timeout(PUBLISH_TIMEOUT)
            .send()
            .map_err(|source| IpfsError::Http {
                op: "name/publish",
                source,
            })?;
        check("name/publish", response)?;
        Ok(())
    }

    /// Resolve an IPNS name to a bare CID (no `/ipfs/` prefix).
    pub fn name_resolve(&self, ipns_name: &str) -> Result<String, IpfsError> {
        let response = self
            .client
            .post(format!("{}/name/resolve?arg={ipns_name}", self.api_url))
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .map_err(|source| IpfsError::Http {
                op: "name/resolve",
                source,
            })?;
        let response = check("name/resolve", response)?;
        let parsed: ResolveResponse = response.json().map_err(|source| IpfsError::Parse {
            op: "name/resolve",
            source,
        })?;
        Ok(parsed
            .path
            .strip_prefix("/ipfs/")
            .unwrap_or(&parsed.path)
            .to_string())
    }
}
