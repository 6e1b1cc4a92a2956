use super::models::{self, QcResultStatus};
use super::services;
use crate::config::test_helpers::setup_test_app;
use crate::test_helpers::send_request;
use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, IntoActiveModel};
use serde_json::json;
use uuid::Uuid;

async fn insert_result(
    db: &DatabaseConnection,
    sample_id: Uuid,
    test_id: Uuid,
    status: QcResultStatus,
    submitted: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let model = models::ActiveModel {
        id: Set(id),
        sample_id: Set(sample_id),
        test_id: Set(test_id),
        result_value: Set("98.7".to_string()),
        unit: Set(Some("%".to_string())),
        passed: Set(true),
        status: Set(status),
        remarks: Set(None),
        performed_by: Set("avasquez".to_string()),
        performed_at: Set(Some(now)),
        submitted_to_qa: Set(submitted),
        submitted_at: Set(if submitted { Some(now) } else { None }),
        created_at: Set(now),
        last_updated: Set(now),
    };
    model.insert(db).await.expect("failed to insert QC result");
    id
}

fn create_body(sample_id: Uuid, test_id: Uuid) -> serde_json::Value {
    json!({
        "sample_id": sample_id,
        "test_id": test_id,
        "result_value": "99.2",
        "unit": "%",
        "passed": true,
        "performed_by": "avasquez"
    })
}

#[tokio::test]
async fn test_create_result_enriched_and_duplicate_rejected() {
    let (app, _db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let test_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    fakes.add_test(test_id, "Assay by HPLC", "HPLC-001");

    let (status, body) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, test_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body:?}");
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["submitted_to_qa"], false);
    assert_eq!(body["test_name"], "Assay by HPLC");
    assert_eq!(body["test_code"], "HPLC-001");

    // Same (sample, test) pair again must conflict
    let (status, body) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, test_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "expected conflict: {body:?}");
}

#[tokio::test]
async fn test_create_result_unknown_sample_or_test() {
    let (app, _db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let test_id = Uuid::new_v4();
    fakes.add_test(test_id, "Assay by HPLC", "HPLC-001");

    // Sample service has never heard of this sample
    let (status, _) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, test_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Known sample, unknown test
    fakes.add_sample(sample_id);
    let (status, _) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_fails_closed_when_sample_service_unreachable() {
    let (app, _db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let test_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    fakes.add_test(test_id, "Assay by HPLC", "HPLC-001");
    fakes.set_samples_unreachable(true);

    // Observable behavior is NotFound even though the sample exists; the
    // create path never proceeds on unverified identity
    let (status, _) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, test_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_completion_transition() {
    let (app, _db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let test_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    fakes.add_test(test_id, "Loss on drying", "LOD-002");

    let (_, created) = send_request(
        &app,
        "POST",
        "/api/qc_results",
        Some(create_body(sample_id, test_id)),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send_request(
        &app,
        "PUT",
        &format!("/api/qc_results/{id}"),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "update failed: {body:?}");
    assert_eq!(body["status"], "completed");

    let (status, _) = send_request(
        &app,
        "PUT",
        &format!("/api/qc_results/{}", Uuid::new_v4()),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submitted_result_is_immutable() {
    let (app, db, _fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let id = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        true,
    )
    .await;

    let (status, body) = send_request(
        &app,
        "PUT",
        &format!("/api/qc_results/{id}"),
        Some(json!({"result_value": "tampered"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "update got: {body:?}");

    let (status, body) =
        send_request(&app, "DELETE", &format!("/api/qc_results/{id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "delete got: {body:?}");

    // The row is untouched
    let model = models::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    assert_eq!(model.result_value, "98.7");
}

#[tokio::test]
async fn test_find_by_sample_orders_by_creation() {
    let (app, db, _fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    let first = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;
    let second = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;
    // A result for some other sample must not appear
    insert_result(
        &db,
        Uuid::new_v4(),
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;

    let (status, body) = send_request(
        &app,
        "GET",
        &format!("/api/qc_results/sample/{sample_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let panel = body.as_array().unwrap();
    assert_eq!(panel.len(), 2);
    assert_eq!(panel[0]["id"], first.to_string());
    assert_eq!(panel[1]["id"], second.to_string());
}

#[tokio::test]
async fn test_submit_is_all_or_nothing() {
    // Scenario A: one completed and one in-progress result; submitting both
    // must mutate neither
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    let done = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;
    let open = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;

    let (status, body) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/submit"),
        Some(json!({ "result_ids": [done, open] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "submit got: {body:?}");

    for id in [done, open] {
        let model = models::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert!(!model.submitted_to_qa, "result {id} must not be submitted");
    }
    assert!(fakes.sample_status_updates().is_empty());
}

#[tokio::test]
async fn test_submit_freezes_results_and_pushes_sample_status() {
    // Scenario B: both results completed; submission freezes them and the
    // sample service receives exactly one status push
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    let r1 = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;
    let r2 = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;

    let (status, body) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/submit"),
        Some(json!({ "result_ids": [r1, r2], "remarks": "panel complete" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {body:?}");
    assert_eq!(body["submitted_count"], 2);

    for id in [r1, r2] {
        let model = models::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert!(model.submitted_to_qa);
        assert!(model.submitted_at.is_some());
    }

    let updates = fakes.sample_status_updates();
    assert_eq!(updates, vec![(sample_id, "Submitted to QA".to_string())]);

    // A second submit of the same results is rejected
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/submit"),
        Some(json!({ "result_ids": [r1, r2] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_rejects_result_of_other_sample() {
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    let foreign = insert_result(
        &db,
        Uuid::new_v4(),
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;

    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/submit"),
        Some(json!({ "result_ids": [foreign] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_submit_has_single_winner() {
    let (_app, db, fakes) = setup_test_app().await;
    let remotes = fakes.remote_services();
    let sample_id = Uuid::new_v4();
    fakes.add_sample(sample_id);
    let r1 = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;
    let r2 = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::Completed,
        false,
    )
    .await;

    let request = || models::SubmitToQaRequest {
        result_ids: vec![r1, r2],
        remarks: None,
    };

    let (first, second) = tokio::join!(
        services::submit_to_qa(&db, &remotes, sample_id, request()),
        services::submit_to_qa(&db, &remotes, sample_id, request()),
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one submission must win the race");

    // Exactly one status push reached the sample service
    assert_eq!(fakes.sample_status_updates().len(), 1);
}

#[tokio::test]
async fn test_complete_testing_gate() {
    let (app, db, fakes) = setup_test_app().await;
    let sample_id = Uuid::new_v4();
    fakes.add_sample(sample_id);

    // No results at all
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // One result still in progress
    let open = insert_result(
        &db,
        sample_id,
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;
    let (status, _) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Complete it; the gate opens and pushes QC Complete
    let mut active = models::Entity::find_by_id(open)
        .one(&db)
        .await
        .unwrap()
        .unwrap()
        .into_active_model();
    active.status = Set(QcResultStatus::Completed);
    active.update(&db).await.unwrap();

    let (status, body) = send_request(
        &app,
        "POST",
        &format!("/api/qc_results/sample/{sample_id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "complete failed: {body:?}");
    assert_eq!(body["result_count"], 1);
    assert_eq!(
        fakes.sample_status_updates(),
        vec![(sample_id, "QC Complete".to_string())]
    );

    // Nothing was mutated by the gate
    let model = models::Entity::find_by_id(open).one(&db).await.unwrap().unwrap();
    assert!(!model.submitted_to_qa);
}

#[tokio::test]
async fn test_delete_unsubmitted_result() {
    let (app, db, _fakes) = setup_test_app().await;
    let id = insert_result(
        &db,
        Uuid::new_v4(),
        Uuid::new_v4(),
        QcResultStatus::InProgress,
        false,
    )
    .await;

    let (status, _) = send_request(&app, "DELETE", &format!("/api/qc_results/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_request(&app, "DELETE", &format!("/api/qc_results/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
