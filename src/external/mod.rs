//! Remote collaborator seams.
//!
//! Cross-service references in this system are plain ids with no database
//! enforcement; referential integrity is checked at call time through the
//! interfaces below. Each collaborator (Sample, Test, Quality Control, Goods
//! Receipt, Warehouse) is a trait so the orchestration code depends on the
//! capability, not on a concrete client. Production wiring uses the
//! message-pattern clients in [`messaging`]; tests substitute in-memory fakes.

pub mod local;
pub mod messaging;

use crate::config::Config;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a remote call, kept deliberately distinct from local errors.
///
/// `Unreachable` (transport failure or timeout) is not the same thing as
/// `NotFound` (the collaborator answered and the entity is absent). Callers
/// on create/submit paths fail closed either way, but must log the two
/// differently so operators can tell an outage from a data problem.
#[derive(Debug, Clone)]
pub enum RemoteError {
    /// The collaborator answered and the requested entity does not exist
    NotFound { what: String },
    /// The collaborator could not be reached, or did not answer in time
    Unreachable { service: String, detail: String },
    /// The collaborator answered with an application-level error
    Rejected { service: String, detail: String },
}

impl RemoteError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RemoteError::Unreachable { .. })
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::NotFound { what } => write!(f, "{what} not found"),
            RemoteError::Unreachable { service, detail } => {
                write!(f, "service '{service}' unreachable: {detail}")
            }
            RemoteError::Rejected { service, detail } => {
                write!(f, "service '{service}' rejected the request: {detail}")
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// Sample as reported by the QC Sample service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSample {
    pub id: Uuid,
    pub sample_number: String,
    pub status: String,
}

/// Test method as reported by the QC Test service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTest {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

/// QC result as reported by the Quality Control service; the QA release
/// orchestrator only cares about identity, sample membership and the
/// submission flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteQcResult {
    pub id: Uuid,
    pub sample_id: Uuid,
    pub passed: bool,
    pub submitted_to_qa: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Goods receipt line as reported by the Goods Receipt service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteReceiptItem {
    pub id: Uuid,
    pub material_id: Uuid,
    pub material_name: String,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit: String,
}

/// Payload for the final warehouse notification of a decided release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseNotice {
    pub release_id: Uuid,
    pub release_number: String,
    pub goods_receipt_item_id: Uuid,
    pub material_id: Uuid,
    pub batch_number: String,
    pub disposition: String,
    pub quantity: Decimal,
    pub unit: String,
}

/// QC Sample service: sample existence checks and status pushes.
///
/// Status pushes are idempotent state assertions, safe under at-least-once
/// delivery.
#[async_trait]
pub trait SampleDirectory: Send + Sync {
    async fn get_by_id(&self, sample_id: Uuid) -> Result<RemoteSample, RemoteError>;
    async fn update_status(&self, sample_id: Uuid, status: &str) -> Result<(), RemoteError>;
}

/// QC Test service: test-method metadata used to enrich result responses.
#[async_trait]
pub trait TestCatalog: Send + Sync {
    async fn get_by_id(&self, test_id: Uuid) -> Result<RemoteTest, RemoteError>;
}

/// Quality Control service as seen by the QA release orchestrator.
#[async_trait]
pub trait QualityControl: Send + Sync {
    async fn get_result_by_id(&self, result_id: Uuid) -> Result<RemoteQcResult, RemoteError>;
    async fn get_results_by_sample(
        &self,
        sample_id: Uuid,
    ) -> Result<Vec<RemoteQcResult>, RemoteError>;
}

/// Goods Receipt service: receipt-line existence and quantities.
#[async_trait]
pub trait ReceiptItemLookup: Send + Sync {
    async fn get_item_by_id(&self, item_id: Uuid) -> Result<RemoteReceiptItem, RemoteError>;
}

/// Warehouse service: the destination of the final disposition notice.
#[async_trait]
pub trait WarehouseNotifier: Send + Sync {
    async fn notify_release(&self, notice: &WarehouseNotice) -> Result<(), RemoteError>;
}

/// The full set of collaborator seams, injected through `AppState`.
#[derive(Clone)]
pub struct RemoteServices {
    pub samples: Arc<dyn SampleDirectory>,
    pub tests: Arc<dyn TestCatalog>,
    pub quality_control: Arc<dyn QualityControl>,
    pub goods_receipt: Arc<dyn ReceiptItemLookup>,
    pub warehouse: Arc<dyn WarehouseNotifier>,
}

impl RemoteServices {
    /// Production wiring: message-pattern clients for the external services,
    /// and the in-process Quality Control store unless a dedicated address is
    /// configured (set one when the QC and QA services are deployed apart).
    pub fn from_config(config: &Config, db: &DatabaseConnection) -> Self {
        let timeout = config.remote_call_timeout();

        let quality_control: Arc<dyn QualityControl> =
            if config.quality_control_service_addr.is_empty() {
                Arc::new(local::LocalQualityControl::new(db.clone()))
            } else {
                Arc::new(messaging::MessagingQualityControl::new(
                    messaging::MessageClient::new(
                        "quality-control",
                        &config.quality_control_service_addr,
                        timeout,
                    ),
                ))
            };

        RemoteServices {
            samples: Arc::new(messaging::MessagingSampleDirectory::new(
                messaging::MessageClient::new(
                    "qc-sample",
                    &config.sample_service_addr,
                    timeout,
                ),
            )),
            tests: Arc::new(messaging::MessagingTestCatalog::new(
                messaging::MessageClient::new("qc-test", &config.test_service_addr, timeout),
            )),
            quality_control,
            goods_receipt: Arc::new(messaging::MessagingReceiptItemLookup::new(
                messaging::MessageClient::new(
                    "goods-receipt",
                    &config.goods_receipt_service_addr,
                    timeout,
                ),
            )),
            warehouse: Arc::new(messaging::MessagingWarehouseNotifier::new(
                messaging::MessageClient::new("warehouse", &config.warehouse_service_addr, timeout),
            )),
        }
    }
}
