use super::checklist::models as checklist;
use super::models::{self, QaReleaseStatus};
use crate::config::test_helpers::setup_test_app;
use crate::qc_results::models as qc_results;
use crate::test_helpers::{FakeRemotes, send_request};
use axum::http::StatusCode;
use chrono::{Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use serde_json::{Value, json};
use uuid::Uuid;

async fn insert_submitted_result(db: &DatabaseConnection, sample_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let model = qc_results::ActiveModel {
        id: Set(id),
        sample_id: Set(sample_id),
        test_id: Set(Uuid::new_v4()),
        result_value: Set("99.1".to_string()),
        unit: Set(Some("%".to_string())),
        passed: Set(true),
        status: Set(qc_results::QcResultStatus::Completed),
        remarks: Set(None),
        performed_by: Set("avasquez".to_string()),
        performed_at: Set(Some(now)),
        submitted_to_qa: Set(true),
        submitted_at: Set(Some(now)),
        created_at: Set(now),
        last_updated: Set(now),
    };
    model.insert(db).await.expect("failed to insert QC result");
    id
}

/// A sample with two submitted results and a known goods receipt line
async fn seed_release_input(db: &DatabaseConnection, fakes: &FakeRemotes) -> Value {
    let sample_id = Uuid::new_v4();
    let r1 = insert_submitted_result(db, sample_id).await;
    let r2 = insert_submitted_result(db, sample_id).await;
    let item = fakes.add_receipt_item(Uuid::new_v4());

    json!({
        "sample_id": sample_id,
        "goods_receipt_item_id": item.id,
        "material_id": item.material_id,
        "material_name": item.material_name,
        "material_code": "API-PARA",
        "batch_number": item.batch_number,
        "quantity": 250.0,
        "unit": item.unit,
        "qc_result_ids": [r1, r2],
        "submitted_by": "ntaylor"
    })
}

#[tokio::test]
async fn test_create_release_with_standard_checklist() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;

    let (status, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {release:?}");

    let year = Utc::now().year();
    assert_eq!(release["release_number"], format!("QAR-{year}-000001"));
    assert_eq!(release["status"], "pending");
    assert!(release["decision"].is_null());
    assert_eq!(release["warehouse_notified"], false);
    assert_eq!(release["qc_result_ids"].as_array().unwrap().len(), 2);

    let items = release["checklist"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|item| item["is_completed"] == false));

    // Numbers keep counting up within the year
    let body = seed_release_input(&db, &fakes).await;
    let (_, second) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    assert_eq!(second["release_number"], format!("QAR-{year}-000002"));
}

#[tokio::test]
async fn test_create_release_rejects_unsubmitted_results() {
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let item = fakes.add_receipt_item(Uuid::new_v4());

    // Completed but never submitted to QA
    let now = Utc::now();
    let unsubmitted = Uuid::new_v4();
    qc_results::ActiveModel {
        id: Set(unsubmitted),
        sample_id: Set(sample_id),
        test_id: Set(Uuid::new_v4()),
        result_value: Set("98.0".to_string()),
        unit: Set(None),
        passed: Set(true),
        status: Set(qc_results::QcResultStatus::Completed),
        remarks: Set(None),
        performed_by: Set("avasquez".to_string()),
        performed_at: Set(Some(now)),
        submitted_to_qa: Set(false),
        submitted_at: Set(None),
        created_at: Set(now),
        last_updated: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let body = json!({
        "sample_id": sample_id,
        "goods_receipt_item_id": item.id,
        "material_id": item.material_id,
        "material_name": item.material_name,
        "batch_number": item.batch_number,
        "quantity": 100.0,
        "unit": "kg",
        "qc_result_ids": [unsubmitted],
        "submitted_by": "ntaylor"
    });

    let (status, response) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not yet been submitted"),
        "unexpected message: {response:?}"
    );

    // Nothing was created
    assert_eq!(
        models::Entity::find().count(&db).await.unwrap(),
        0,
        "no release may exist after a rejected create"
    );
}

#[tokio::test]
async fn test_create_release_unknown_references() {
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let item = fakes.add_receipt_item(Uuid::new_v4());

    // Unknown QC result id
    let body = json!({
        "sample_id": sample_id,
        "goods_receipt_item_id": item.id,
        "material_id": item.material_id,
        "material_name": item.material_name,
        "batch_number": item.batch_number,
        "quantity": 100.0,
        "unit": "kg",
        "qc_result_ids": [Uuid::new_v4()],
        "submitted_by": "ntaylor"
    });
    let (status, _) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Known results, unknown goods receipt line
    let r1 = insert_submitted_result(&db, sample_id).await;
    let body = json!({
        "sample_id": sample_id,
        "goods_receipt_item_id": Uuid::new_v4(),
        "material_id": item.material_id,
        "material_name": item.material_name,
        "batch_number": item.batch_number,
        "quantity": 100.0,
        "unit": "kg",
        "qc_result_ids": [r1],
        "submitted_by": "ntaylor"
    });
    let (status, _) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_completes_checklist_and_moves_under_review() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();

    let reviewed: Vec<Value> = release["checklist"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| {
            json!({
                "id": item["id"],
                "is_completed": true,
                "comments": "verified"
            })
        })
        .collect();

    let (status, reviewed_release) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/review"),
        Some(json!({ "reviewed_by": "mokafor", "checklist": reviewed })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "review failed: {reviewed_release:?}");
    assert_eq!(reviewed_release["status"], "under_review");
    assert_eq!(reviewed_release["reviewed_by"], "mokafor");
    assert!(!reviewed_release["reviewed_at"].is_null());
    for item in reviewed_release["checklist"].as_array().unwrap() {
        assert_eq!(item["is_completed"], true);
        assert_eq!(item["completed_by"], "mokafor");
        assert!(!item["completed_at"].is_null());
    }

    // A checklist item of some other release is rejected
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/review"),
        Some(json!({
            "reviewed_by": "mokafor",
            "checklist": [{ "id": Uuid::new_v4(), "is_completed": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_decide_is_terminal_and_append_only() {
    // Scenario C: reject with a signature, then try to decide again
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();

    let (status, decided) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/decide"),
        Some(json!({
            "decision": "reject",
            "decision_reason": "out of spec",
            "e_signature": "jdoe",
            "decided_by": "jdoe"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "decide failed: {decided:?}");
    assert_eq!(decided["status"], "rejected");
    assert_eq!(decided["decision"], "reject");
    assert_eq!(decided["decision_reason"], "out of spec");
    assert_eq!(decided["e_signature"], "jdoe");
    assert!(!decided["decided_at"].is_null());

    let (status, body) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/decide"),
        Some(json!({
            "decision": "release",
            "e_signature": "someone-else",
            "decided_by": "someone-else"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "second decide: {body:?}");

    // The original decision is untouched
    let model = models::Entity::find_by_id(Uuid::parse_str(id).unwrap())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.decision, Some(models::ReleaseDecision::Reject));
    assert_eq!(model.status, QaReleaseStatus::Rejected);
}

#[tokio::test]
async fn test_decide_requires_e_signature() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();

    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/decide"),
        Some(json!({
            "decision": "release",
            "e_signature": "   ",
            "decided_by": "jdoe"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Still undecided
    let (_, fetched) = send_request(&app, "GET", &format!("/api/qa_releases/{id}"), None).await;
    assert!(fetched["decision"].is_null());
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test]
async fn test_notify_warehouse_only_after_decision() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();

    // Undecided: notification is unreachable workflow-wise
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/notify-warehouse"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/decide"),
        Some(json!({
            "decision": "quarantine",
            "decision_reason": "pending investigation",
            "e_signature": "jdoe",
            "decided_by": "jdoe"
        })),
    )
    .await;

    // Warehouse down: the decision stands, the release stays unnotified
    fakes.set_warehouse_unreachable(true);
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/notify-warehouse"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, fetched) = send_request(&app, "GET", &format!("/api/qa_releases/{id}"), None).await;
    assert_eq!(fetched["status"], "quarantined");
    assert_eq!(fetched["warehouse_notified"], false);
    assert!(fakes.warehouse_notices().is_empty());

    // Manual retry after the outage succeeds
    fakes.set_warehouse_unreachable(false);
    let (status, notified) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/notify-warehouse"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "notify failed: {notified:?}");
    assert_eq!(notified["warehouse_notified"], true);
    assert!(!notified["warehouse_notified_at"].is_null());

    let notices = fakes.warehouse_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].disposition, "quarantined");
    assert_eq!(notices[0].release_number, release["release_number"].as_str().unwrap());

    // Re-notifying a notified release is rejected
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{id}/notify-warehouse"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_only_before_decision() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();
    let release_uuid = Uuid::parse_str(id).unwrap();

    let (status, _) = send_request(&app, "DELETE", &format!("/api/qa_releases/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The owned checklist went with it
    let orphans = checklist::Entity::find()
        .filter(checklist::Column::ReleaseId.eq(release_uuid))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(orphans, 0);

    // A decided release is never deleted
    let body = seed_release_input(&db, &fakes).await;
    let (_, decided) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let decided_id = decided["id"].as_str().unwrap();
    send_request(
        &app,
        "POST",
        &format!("/api/qa_releases/{decided_id}/decide"),
        Some(json!({
            "decision": "release",
            "e_signature": "jdoe",
            "decided_by": "jdoe"
        })),
    )
    .await;

    let (status, _) = send_request(
        &app,
        "DELETE",
        &format!("/api/qa_releases/{decided_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_and_get_release() {
    let (app, db, fakes) = setup_test_app().await;
    let body = seed_release_input(&db, &fakes).await;
    let (_, release) = send_request(&app, "POST", "/api/qa_releases", Some(body)).await;
    let id = release["id"].as_str().unwrap();

    let (status, listed) = send_request(&app, "GET", "/api/qa_releases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, fetched) = send_request(&app, "GET", &format!("/api/qa_releases/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], release["id"]);
    assert_eq!(fetched["checklist"].as_array().unwrap().len(), 5);

    let (status, _) = send_request(
        &app,
        "GET",
        &format!("/api/qa_releases/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
