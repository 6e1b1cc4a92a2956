//! Shared test helpers: in-memory fakes for every remote collaborator seam
//! plus request plumbing for driving the real routers in tests.
//!
//! The fakes let every remote-validation branch run without a network, and
//! record the status pushes and warehouse notices the workflow emits so
//! tests can assert on the cross-service traffic.

use crate::external::{
    QualityControl, ReceiptItemLookup, RemoteError, RemoteReceiptItem, RemoteSample, RemoteTest,
    RemoteServices, SampleDirectory, TestCatalog, WarehouseNotice, WarehouseNotifier,
    local::LocalQualityControl,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

/// Extract response body as JSON for testing
pub async fn extract_response_body(response: axum::response::Response) -> (StatusCode, Value) {
    use axum::body::to_bytes;

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    let body: Value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({"error": "Invalid JSON response"}));
    (status, body)
}

/// Fire one JSON request at the app and return status plus parsed body
pub async fn send_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json_body) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(json_body.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    extract_response_body(response).await
}

pub struct FakeSampleDirectory {
    samples: Mutex<HashMap<Uuid, RemoteSample>>,
    status_updates: Mutex<Vec<(Uuid, String)>>,
    unreachable: AtomicBool,
}

#[async_trait]
impl SampleDirectory for FakeSampleDirectory {
    async fn get_by_id(&self, sample_id: Uuid) -> Result<RemoteSample, RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable {
                service: "qc-sample".to_string(),
                detail: "fake outage".to_string(),
            });
        }
        self.samples
            .lock()
            .unwrap()
            .get(&sample_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                what: format!("sample {sample_id}"),
            })
    }

    async fn update_status(&self, sample_id: Uuid, status: &str) -> Result<(), RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable {
                service: "qc-sample".to_string(),
                detail: "fake outage".to_string(),
            });
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((sample_id, status.to_string()));
        Ok(())
    }
}

pub struct FakeTestCatalog {
    tests: Mutex<HashMap<Uuid, RemoteTest>>,
    unreachable: AtomicBool,
}

#[async_trait]
impl TestCatalog for FakeTestCatalog {
    async fn get_by_id(&self, test_id: Uuid) -> Result<RemoteTest, RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable {
                service: "qc-test".to_string(),
                detail: "fake outage".to_string(),
            });
        }
        self.tests
            .lock()
            .unwrap()
            .get(&test_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                what: format!("test {test_id}"),
            })
    }
}

pub struct FakeReceiptItemLookup {
    items: Mutex<HashMap<Uuid, RemoteReceiptItem>>,
}

#[async_trait]
impl ReceiptItemLookup for FakeReceiptItemLookup {
    async fn get_item_by_id(&self, item_id: Uuid) -> Result<RemoteReceiptItem, RemoteError> {
        self.items
            .lock()
            .unwrap()
            .get(&item_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                what: format!("goods receipt item {item_id}"),
            })
    }
}

pub struct FakeWarehouseNotifier {
    notices: Mutex<Vec<WarehouseNotice>>,
    unreachable: AtomicBool,
}

#[async_trait]
impl WarehouseNotifier for FakeWarehouseNotifier {
    async fn notify_release(&self, notice: &WarehouseNotice) -> Result<(), RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable {
                service: "warehouse".to_string(),
                detail: "fake outage".to_string(),
            });
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Handles on the fake collaborators behind a test app
pub struct FakeRemotes {
    pub samples: Arc<FakeSampleDirectory>,
    pub tests: Arc<FakeTestCatalog>,
    pub goods_receipt: Arc<FakeReceiptItemLookup>,
    pub warehouse: Arc<FakeWarehouseNotifier>,
    db: DatabaseConnection,
}

impl FakeRemotes {
    pub fn new(db: &DatabaseConnection) -> Self {
        FakeRemotes {
            samples: Arc::new(FakeSampleDirectory {
                samples: Mutex::new(HashMap::new()),
                status_updates: Mutex::new(Vec::new()),
                unreachable: AtomicBool::new(false),
            }),
            tests: Arc::new(FakeTestCatalog {
                tests: Mutex::new(HashMap::new()),
                unreachable: AtomicBool::new(false),
            }),
            goods_receipt: Arc::new(FakeReceiptItemLookup {
                items: Mutex::new(HashMap::new()),
            }),
            warehouse: Arc::new(FakeWarehouseNotifier {
                notices: Mutex::new(Vec::new()),
                unreachable: AtomicBool::new(false),
            }),
            db: db.clone(),
        }
    }

    /// Wire the fakes into the seam set the app consumes. Quality Control is
    /// backed by the real local store so end-to-end flows exercise the
    /// actual submission state.
    pub fn remote_services(&self) -> RemoteServices {
        RemoteServices {
            samples: self.samples.clone() as Arc<dyn SampleDirectory>,
            tests: self.tests.clone() as Arc<dyn TestCatalog>,
            quality_control: Arc::new(LocalQualityControl::new(self.db.clone()))
                as Arc<dyn QualityControl>,
            goods_receipt: self.goods_receipt.clone() as Arc<dyn ReceiptItemLookup>,
            warehouse: self.warehouse.clone() as Arc<dyn WarehouseNotifier>,
        }
    }

    pub fn add_sample(&self, sample_id: Uuid) {
        self.samples.samples.lock().unwrap().insert(
            sample_id,
            RemoteSample {
                id: sample_id,
                sample_number: format!("SMP-{}", &sample_id.to_string()[..8]),
                status: "In Testing".to_string(),
            },
        );
    }

    pub fn add_test(&self, test_id: Uuid, name: &str, code: &str) {
        self.tests.tests.lock().unwrap().insert(
            test_id,
            RemoteTest {
                id: test_id,
                name: name.to_string(),
                code: code.to_string(),
            },
        );
    }

    pub fn add_receipt_item(&self, item_id: Uuid) -> RemoteReceiptItem {
        let item = RemoteReceiptItem {
            id: item_id,
            material_id: Uuid::new_v4(),
            material_name: "Paracetamol API".to_string(),
            batch_number: "B-2024-117".to_string(),
            quantity: Decimal::new(250_000, 3),
            unit: "kg".to_string(),
        };
        self.goods_receipt
            .items
            .lock()
            .unwrap()
            .insert(item_id, item.clone());
        item
    }

    pub fn sample_status_updates(&self) -> Vec<(Uuid, String)> {
        self.samples.status_updates.lock().unwrap().clone()
    }

    pub fn warehouse_notices(&self) -> Vec<WarehouseNotice> {
        self.warehouse.notices.lock().unwrap().clone()
    }

    pub fn set_samples_unreachable(&self, unreachable: bool) {
        self.samples
            .unreachable
            .store(unreachable, Ordering::SeqCst);
    }

    pub fn set_warehouse_unreachable(&self, unreachable: bool) {
        self.warehouse
            .unreachable
            .store(unreachable, Ordering::SeqCst);
    }
}
