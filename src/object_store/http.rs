// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for a remote vault storage provider.
//!
//! ## Wire Protocol
//!
//! JSON-RPC 2.0 over `POST {provider_endpoint}`. Every request carries a
//! signed packet:
//!
//! ```text
//! { "method": "write", "chainId": 84531, "contract": "0x…", "file": "0x…",
//!   "data": "<hex>", "timestamp": <ms>, "nonce": "<uuid>",
//!   "signature": "0x<65 bytes>" }
//! ```
//!
//! The signature is an EIP-191 personal signature by the session identity over
//! the compact JSON of the packet without the `signature` field. Keys are
//! emitted in sorted order, which makes that JSON canonical.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{
    EncryptedObjectStore, ObjectMetadata, ObjectStoreError, ObjectStoreResult, StoreConnector,
};
use crate::identity::Identity;
use crate::models::{ContentKey, ResolvedLocator};

/// Provider error code: the scope already exists.
pub const ERR_SCOPE_ALREADY_EXISTS: i64 = -32003;

/// Provider error code: the requested file does not exist.
pub const ERR_FILE_DOES_NOT_EXIST: i64 = -32004;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    modified: Option<i64>,
}

/// Object store backed by a remote provider.
pub struct HttpObjectStore {
    http: Client,
    locator: ResolvedLocator,
    identity: Arc<dyn Identity>,
}

impl HttpObjectStore {
    pub fn new(http: Client, locator: ResolvedLocator, identity: Arc<dyn Identity>) -> Self {
        Self {
            http,
            locator,
            identity,
        }
    }

    /// Build and sign the params packet for one request.
    fn signed_packet(
        &self,
        method: &str,
        file: Option<&ContentKey>,
        extra: Map<String, Value>,
    ) -> ObjectStoreResult<Value> {
        let mut packet = Map::new();
        packet.insert("method".to_string(), json!(method));
        packet.insert("chainId".to_string(), json!(self.locator.chain_id()));
        packet.insert(
            "contract".to_string(),
            json!(self.locator.record_address().to_string()),
        );
        packet.insert("timestamp".to_string(), json!(Utc::now().timestamp_millis()));
        packet.insert("nonce".to_string(), json!(Uuid::new_v4().to_string()));
        if let Some(file) = file {
            packet.insert("file".to_string(), json!(file.as_str()));
        }
        packet.extend(extra);

        let canonical = serde_json::to_string(&packet)
            .map_err(|e| ObjectStoreError::Signing(format!("serialize packet failed: {e}")))?;
        let signature = self
            .identity
            .sign_message(canonical.as_bytes())
            .map_err(|e| ObjectStoreError::Signing(e.to_string()))?;
        packet.insert(
            "signature".to_string(),
            json!(format!("0x{}", alloy::hex::encode(signature.as_bytes()))),
        );

        Ok(Value::Object(packet))
    }

    async fn call(
        &self,
        method: &str,
        file: Option<&ContentKey>,
        extra: Map<String, Value>,
    ) -> ObjectStoreResult<Value> {
        let params = self.signed_packet(method, file, extra)?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let endpoint = self.locator.provider_endpoint().as_str();
        let response = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Transport(format!("{method} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Transport(format!(
                "{method} returned {status}: {text}"
            )));
        }

        let envelope: RpcEnvelope = response.json().await.map_err(|e| {
            ObjectStoreError::InvalidResponse(format!("{method} invalid JSON: {e}"))
        })?;

        interpret(envelope, file)
    }
}

/// Turn a JSON-RPC envelope into a result or a typed error.
fn interpret(envelope: RpcEnvelope, file: Option<&ContentKey>) -> ObjectStoreResult<Value> {
    match envelope.error {
        None => Ok(envelope.result),
        Some(fault) if fault.code == ERR_FILE_DOES_NOT_EXIST => Err(ObjectStoreError::NotFound(
            file.map(|f| f.to_string()).unwrap_or(fault.message),
        )),
        Some(fault) => Err(ObjectStoreError::Rejected {
            code: fault.code,
            message: fault.message,
        }),
    }
}

/// Creating a scope that already exists is not an error.
fn settle_create(result: ObjectStoreResult<Value>) -> ObjectStoreResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(ObjectStoreError::Rejected { code, .. }) if code == ERR_SCOPE_ALREADY_EXISTS => {
            tracing::debug!("Scope already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn parse_listing(result: Value) -> ObjectStoreResult<Vec<ObjectMetadata>> {
    let listed: Vec<ListedObject> = serde_json::from_value(result)
        .map_err(|e| ObjectStoreError::InvalidResponse(format!("list result: {e}")))?;

    Ok(listed
        .into_iter()
        .filter(|item| item.kind.as_deref() != Some("dir"))
        .map(|item| {
            let created_at = from_millis(item.created);
            ObjectMetadata {
                key: ContentKey::from_raw(item.name),
                byte_length: item.length,
                created_at,
                modified_at: item.modified.map_or(created_at, |ms| from_millis(Some(ms))),
            }
        })
        .collect())
}

fn from_millis(ms: Option<i64>) -> DateTime<Utc> {
    ms.and_then(DateTime::from_timestamp_millis).unwrap_or_default()
}

fn decode_payload(result: Value, key: &ContentKey) -> ObjectStoreResult<Vec<u8>> {
    let encoded = match result {
        Value::Null => return Err(ObjectStoreError::NotFound(key.to_string())),
        Value::String(s) => s,
        other => {
            return Err(ObjectStoreError::InvalidResponse(format!(
                "read result is not a string: {other}"
            )))
        }
    };
    let hex = encoded.strip_prefix("0x").unwrap_or(&encoded);
    alloy::hex::decode(hex)
        .map_err(|e| ObjectStoreError::InvalidResponse(format!("read payload: {e}")))
}

#[async_trait]
impl EncryptedObjectStore for HttpObjectStore {
    async fn create_scope(&self) -> ObjectStoreResult<()> {
        let mut extra = Map::new();
        extra.insert("options".to_string(), json!({ "silent": true }));
        settle_create(self.call("create", None, extra).await)
    }

    async fn list_keys(&self, root: &ContentKey) -> ObjectStoreResult<Vec<ObjectMetadata>> {
        let mut extra = Map::new();
        extra.insert("options".to_string(), json!({ "long": true }));
        let result = self.call("list", Some(root), extra).await?;
        parse_listing(result)
    }

    async fn read_key(&self, key: &ContentKey) -> ObjectStoreResult<Vec<u8>> {
        let result = self.call("read", Some(key), Map::new()).await?;
        decode_payload(result, key)
    }

    async fn write_key(&self, key: &ContentKey, bytes: &[u8]) -> ObjectStoreResult<()> {
        let mut extra = Map::new();
        extra.insert("data".to_string(), json!(alloy::hex::encode(bytes)));
        self.call("write", Some(key), extra).await.map(|_| ())
    }

    async fn delete_key(&self, key: &ContentKey) -> ObjectStoreResult<()> {
        self.call("delete", Some(key), Map::new()).await.map(|_| ())
    }

    async fn terminate_scope(&self) -> ObjectStoreResult<()> {
        self.call("terminate", None, Map::new()).await.map(|_| ())
    }
}

/// Connector producing [`HttpObjectStore`]s that share one HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: Client,
}

impl HttpConnector {
    pub fn new() -> ObjectStoreResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> ObjectStoreResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObjectStoreError::Transport(format!("HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl StoreConnector for HttpConnector {
    fn connect(
        &self,
        locator: &ResolvedLocator,
        identity: Arc<dyn Identity>,
    ) -> ObjectStoreResult<Arc<dyn EncryptedObjectStore>> {
        Ok(Arc::new(HttpObjectStore::new(
            self.http.clone(),
            locator.clone(),
            identity,
        )))
    }
}
