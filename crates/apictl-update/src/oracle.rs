//! Client for the release service's `GetNextUpdate` RPC
//!
//! The service speaks the Connect protocol; its unary JSON flavour is a
//! plain `POST` of a camelCase JSON body, with errors returned as
//! `{"code": ..., "message": ...}` and a non-2xx status. 64-bit integers
//! travel as JSON strings.

use std::time::Duration;

use apictl_core::RuntimeConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::descriptor::{Platform, UpdateDescriptor};
use crate::error::{Result, UpdateError};
use crate::version::{is_update_available, Version};

/// Path of the update RPC relative to the API base URL
pub const GET_NEXT_UPDATE_PATH: &str = "/svc.cliupdate.v1.UpdateService/GetNextUpdate";

/// Machine id that asks the service to assign a fresh one
pub const UNASSIGNED_MACHINE_ID: i64 = -1;

/// What we tell the service about ourselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub project_name: String,
    pub current_version: Version,
    pub platform: Platform,
    pub machine_id: i64,
}

/// Answers "is there something newer than this?"
#[async_trait]
pub trait VersionOracle: Send + Sync {
    /// The next update, or `None` when the current version is the latest
    async fn next_update(&self, request: &UpdateRequest) -> Result<Option<UpdateDescriptor>>;
}

/// Raw service reply, before any precedence filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextUpdateReply {
    /// Descriptor for whatever the service offered, newer or not
    pub descriptor: Option<UpdateDescriptor>,
    /// Machine id echoed or assigned by the service
    pub machine_id: i64,
}

/// Connect JSON client for the release service
#[derive(Debug, Clone)]
pub struct HttpVersionOracle {
    client: reqwest::Client,
    api_url: String,
}

impl HttpVersionOracle {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client with the configured timeout and user agent
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.network.user_agent)
            .timeout(Duration::from_secs(config.network.http_timeout_secs))
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client, config.update.api_url.clone()))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Issue the RPC and return the unfiltered reply
    pub async fn query(&self, request: &UpdateRequest) -> Result<NextUpdateReply> {
        let url = format!("{}{}", self.api_url, GET_NEXT_UPDATE_PATH);
        let body = WireRequest {
            project_name: &request.project_name,
            current_version: &request.current_version,
            machine_architecture: &request.platform.architecture,
            machine_operating_system: &request.platform.operating_system,
            meta: WireReqMeta {
                machine_id: request.machine_id,
            },
        };

        debug!(url = %url, current = %request.current_version, platform = %request.platform, "querying update service");

        let response = self
            .client
            .post(&url)
            .header("Connect-Protocol-Version", "1")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpdateError::Network(format!("update service unreachable: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpdateError::Network(format!("reading update service reply: {e}")))?;

        if !status.is_success() {
            return Err(connect_error(status, &bytes));
        }

        let reply: WireResponse = serde_json::from_slice(&bytes).map_err(|e| UpdateError::Oracle {
            code: "invalid_response".to_string(),
            message: e.to_string(),
        })?;

        let machine_id = reply
            .meta
            .map(|m| m.machine_id)
            .unwrap_or(request.machine_id);
        if machine_id != request.machine_id {
            info!(machine_id, "a machine id was assigned");
        }

        let descriptor = match (reply.next_version, reply.next_artifact) {
            (Some(next_version), Some(artifact)) if !artifact.url.is_empty() => {
                Some(UpdateDescriptor {
                    next_version,
                    artifact_url: artifact.url,
                    sha256: artifact.sha256,
                    signature: Some(artifact.signature).filter(|s| !s.trim().is_empty()),
                    platform: request.platform.clone(),
                })
            }
            _ => None,
        };

        Ok(NextUpdateReply {
            descriptor,
            machine_id,
        })
    }
}

#[async_trait]
impl VersionOracle for HttpVersionOracle {
    async fn next_update(&self, request: &UpdateRequest) -> Result<Option<UpdateDescriptor>> {
        let reply = self.query(request).await?;
        Ok(reply
            .descriptor
            .filter(|d| is_update_available(&request.current_version, &d.next_version)))
    }
}

fn connect_error(status: reqwest::StatusCode, body: &[u8]) -> UpdateError {
    match serde_json::from_slice::<WireError>(body) {
        Ok(err) => UpdateError::Oracle {
            code: err.code,
            message: err.message,
        },
        Err(_) => UpdateError::Oracle {
            code: "unknown".to_string(),
            message: format!(
                "HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(body).trim()
            ),
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    project_name: &'a str,
    current_version: &'a Version,
    machine_architecture: &'a str,
    machine_operating_system: &'a str,
    meta: WireReqMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireReqMeta {
    #[serde(with = "int64")]
    machine_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    next_version: Option<Version>,
    #[serde(default)]
    next_artifact: Option<WireArtifact>,
    #[serde(default)]
    meta: Option<WireResMeta>,
}

#[derive(Deserialize)]
struct WireArtifact {
    #[serde(default)]
    url: String,
    #[serde(default)]
    sha256: String,
    #[serde(default)]
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResMeta {
    #[serde(default, with = "int64")]
    machine_id: i64,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// int64 as a JSON string on the way out, string or number on the way in
mod int64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(i64),
        String(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Number(n) => Ok(n),
            StringOrNumber::String(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }
}
