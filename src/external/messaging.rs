//! Message-pattern request/response clients.
//!
//! Inter-service calls are logically synchronous RPC over an asynchronous
//! TCP transport: one newline-delimited JSON envelope per request, exactly
//! one reply per request, correlated by id. The wire framing is an
//! implementation detail; the contract the rest of the system depends on is
//! the pattern name, the payload shape, and the one-reply guarantee.

use super::{
    RemoteError, RemoteQcResult, RemoteReceiptItem, RemoteSample, RemoteTest, WarehouseNotice,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use uuid::Uuid;

/// Pattern names shared with the collaborating services.
pub mod patterns {
    pub const SAMPLE_GET_BY_ID: &str = "qc_sample.get_by_id";
    pub const SAMPLE_UPDATE: &str = "qc_sample.update";
    pub const TEST_GET_BY_ID: &str = "qc_test.get_by_id";
    pub const QC_GET_RESULT_BY_ID: &str = "quality_control.get_result_by_id";
    pub const QC_GET_RESULTS_BY_SAMPLE: &str = "quality_control.get_results_by_sample";
    pub const RECEIPT_GET_ITEM_BY_ID: &str = "goods_receipt.get_item_by_id";
    pub const WAREHOUSE_NOTIFY_RELEASE: &str = "warehouse.notify_release";
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    id: Uuid,
    pattern: &'a str,
    data: Value,
}

#[derive(Deserialize)]
struct ReplyEnvelope {
    id: Uuid,
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// One collaborator endpoint: an address plus a bounded per-call timeout.
///
/// Every call either returns the collaborator's single reply or fails as
/// `Unreachable`; a timeout is never treated as success.
#[derive(Debug, Clone)]
pub struct MessageClient {
    service: String,
    addr: String,
    timeout: Duration,
}

impl MessageClient {
    pub fn new(service: &str, addr: &str, timeout: Duration) -> Self {
        MessageClient {
            service: service.to_string(),
            addr: addr.to_string(),
            timeout,
        }
    }

    fn unreachable(&self, detail: impl std::fmt::Display) -> RemoteError {
        RemoteError::Unreachable {
            service: self.service.clone(),
            detail: detail.to_string(),
        }
    }

    fn rejected(&self, detail: impl Into<String>) -> RemoteError {
        RemoteError::Rejected {
            service: self.service.clone(),
            detail: detail.into(),
        }
    }

    /// Send one request envelope and await its correlated reply.
    ///
    /// Returns `Ok(None)` when the collaborator answered affirmatively with
    /// no entity (reachable-but-absent), which callers map to `NotFound`.
    pub async fn call(&self, pattern: &str, data: Value) -> Result<Option<Value>, RemoteError> {
        let request_id = Uuid::new_v4();
        let envelope = RequestEnvelope {
            id: request_id,
            pattern,
            data,
        };
        let mut line = serde_json::to_string(&envelope)
            .map_err(|e| self.rejected(format!("request serialization failed: {e}")))?;
        line.push('\n');

        let exchange = async {
            let stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| self.unreachable(e))?;
            let (read_half, mut write_half) = stream.into_split();

            write_half
                .write_all(line.as_bytes())
                .await
                .map_err(|e| self.unreachable(e))?;
            write_half.flush().await.map_err(|e| self.unreachable(e))?;

            let mut reader = BufReader::new(read_half);
            let mut reply_line = String::new();
            let read = reader
                .read_line(&mut reply_line)
                .await
                .map_err(|e| self.unreachable(e))?;
            if read == 0 {
                return Err(self.unreachable("connection closed before reply"));
            }

            let reply: ReplyEnvelope = serde_json::from_str(reply_line.trim_end())
                .map_err(|e| self.rejected(format!("malformed reply: {e}")))?;
            Ok(reply)
        };

        let reply = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(self.unreachable(format!(
                    "no reply within {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        if reply.id != request_id {
            return Err(self.rejected("reply correlation id mismatch"));
        }
        if !reply.ok {
            return Err(self.rejected(
                reply
                    .error
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }
        match reply.data {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }

    /// Call a pattern that must return an entity; absence is `NotFound`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        pattern: &str,
        what: &str,
        data: Value,
    ) -> Result<T, RemoteError> {
        let value = self
            .call(pattern, data)
            .await?
            .ok_or_else(|| RemoteError::NotFound {
                what: what.to_string(),
            })?;
        serde_json::from_value(value).map_err(|e| self.rejected(format!("malformed {what}: {e}")))
    }
}

pub struct MessagingSampleDirectory {
    client: MessageClient,
}

impl MessagingSampleDirectory {
    pub fn new(client: MessageClient) -> Self {
        MessagingSampleDirectory { client }
    }
}

#[async_trait]
impl super::SampleDirectory for MessagingSampleDirectory {
    async fn get_by_id(&self, sample_id: Uuid) -> Result<RemoteSample, RemoteError> {
        self.client
            .fetch(
                patterns::SAMPLE_GET_BY_ID,
                "sample",
                json!({ "id": sample_id }),
            )
            .await
    }

    async fn update_status(&self, sample_id: Uuid, status: &str) -> Result<(), RemoteError> {
        self.client
            .call(
                patterns::SAMPLE_UPDATE,
                json!({ "id": sample_id, "status": status }),
            )
            .await?;
        Ok(())
    }
}

pub struct MessagingTestCatalog {
    client: MessageClient,
}

impl MessagingTestCatalog {
    pub fn new(client: MessageClient) -> Self {
        MessagingTestCatalog { client }
    }
}

#[async_trait]
impl super::TestCatalog for MessagingTestCatalog {
    async fn get_by_id(&self, test_id: Uuid) -> Result<RemoteTest, RemoteError> {
        self.client
            .fetch(patterns::TEST_GET_BY_ID, "test", json!({ "id": test_id }))
            .await
    }
}

pub struct MessagingQualityControl {
    client: MessageClient,
}

impl MessagingQualityControl {
    pub fn new(client: MessageClient) -> Self {
        MessagingQualityControl { client }
    }
}

#[async_trait]
impl super::QualityControl for MessagingQualityControl {
    async fn get_result_by_id(&self, result_id: Uuid) -> Result<RemoteQcResult, RemoteError> {
        self.client
            .fetch(
                patterns::QC_GET_RESULT_BY_ID,
                "QC result",
                json!({ "id": result_id }),
            )
            .await
    }

    async fn get_results_by_sample(
        &self,
        sample_id: Uuid,
    ) -> Result<Vec<RemoteQcResult>, RemoteError> {
        let results: Option<Vec<RemoteQcResult>> = match self
            .client
            .call(
                patterns::QC_GET_RESULTS_BY_SAMPLE,
                json!({ "sample_id": sample_id }),
            )
            .await?
        {
            Some(value) => serde_json::from_value(value).map_err(|e| RemoteError::Rejected {
                service: "quality-control".to_string(),
                detail: format!("malformed result list: {e}"),
            })?,
            None => None,
        };
        Ok(results.unwrap_or_default())
    }
}

pub struct MessagingReceiptItemLookup {
    client: MessageClient,
}

impl MessagingReceiptItemLookup {
    pub fn new(client: MessageClient) -> Self {
        MessagingReceiptItemLookup { client }
    }
}

#[async_trait]
impl super::ReceiptItemLookup for MessagingReceiptItemLookup {
    async fn get_item_by_id(&self, item_id: Uuid) -> Result<RemoteReceiptItem, RemoteError> {
        self.client
            .fetch(
                patterns::RECEIPT_GET_ITEM_BY_ID,
                "goods receipt item",
                json!({ "id": item_id }),
            )
            .await
    }
}

pub struct MessagingWarehouseNotifier {
    client: MessageClient,
}

impl MessagingWarehouseNotifier {
    pub fn new(client: MessageClient) -> Self {
        MessagingWarehouseNotifier { client }
    }
}

#[async_trait]
impl super::WarehouseNotifier for MessagingWarehouseNotifier {
    async fn notify_release(&self, notice: &WarehouseNotice) -> Result<(), RemoteError> {
        let payload = serde_json::to_value(notice).map_err(|e| RemoteError::Rejected {
            service: "warehouse".to_string(),
            detail: format!("notice serialization failed: {e}"),
        })?;
        self.client
            .call(patterns::WAREHOUSE_NOTIFY_RELEASE, payload)
            .await?;
        Ok(())
    }
}
