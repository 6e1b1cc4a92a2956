use super::models::{
    ActiveModel, Column, CompleteTestingResponse, Entity, QcResult, QcResultStatus,
    QcResultUpdate, SubmitToQaRequest, SubmitToQaResponse,
};
use crate::common::errors::{BusinessError, BusinessResult, is_unique_violation};
use crate::external::{RemoteServices, RemoteTest};
use chrono::Utc;
use crudcrate::traits::MergeIntoActiveModel;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::Expr,
};
use tracing::warn;
use uuid::Uuid;

/// Status strings pushed to the Sample service. The pushes are idempotent
/// state assertions, safe to deliver more than once.
pub const SAMPLE_STATUS_SUBMITTED_TO_QA: &str = "Submitted to QA";
pub const SAMPLE_STATUS_QC_COMPLETE: &str = "QC Complete";

/// Fields a lab technician supplies when recording a result
#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct CreateResultRequest {
    pub sample_id: Uuid,
    pub test_id: Uuid,
    pub result_value: String,
    pub unit: Option<String>,
    pub passed: bool,
    pub performed_by: String,
    pub performed_at: Option<chrono::DateTime<Utc>>,
    pub remarks: Option<String>,
}

/// Record one result against an existing sample and test.
///
/// Sample and test identity live in other services, so both are verified by
/// remote lookup before anything is persisted. A lookup failure fails the
/// create as NotFound — never proceed with unverified identity — but an
/// unreachable collaborator is logged distinctly from a confirmed absence.
pub async fn create_result(
    db: &DatabaseConnection,
    remotes: &RemoteServices,
    payload: CreateResultRequest,
) -> BusinessResult<QcResult> {
    if let Err(err) = remotes.samples.get_by_id(payload.sample_id).await {
        if err.is_unreachable() {
            warn!(sample_id = %payload.sample_id, %err, "sample lookup failed, failing create closed");
        }
        return Err(BusinessError::not_found("Sample", payload.sample_id));
    }

    let test: RemoteTest = match remotes.tests.get_by_id(payload.test_id).await {
        Ok(test) => test,
        Err(err) => {
            if err.is_unreachable() {
                warn!(test_id = %payload.test_id, %err, "test lookup failed, failing create closed");
            }
            return Err(BusinessError::not_found("Test", payload.test_id));
        }
    };

    let existing = Entity::find()
        .filter(Column::SampleId.eq(payload.sample_id))
        .filter(Column::TestId.eq(payload.test_id))
        .one(db)
        .await
        .map_err(BusinessError::from)?;
    if existing.is_some() {
        return Err(BusinessError::Duplicate {
            resource: "QC result".to_string(),
            field: "sample and test combination".to_string(),
        });
    }

    let now = Utc::now();
    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        sample_id: Set(payload.sample_id),
        test_id: Set(payload.test_id),
        result_value: Set(payload.result_value),
        unit: Set(payload.unit),
        passed: Set(payload.passed),
        status: Set(QcResultStatus::InProgress),
        remarks: Set(payload.remarks),
        performed_by: Set(payload.performed_by),
        performed_at: Set(Some(payload.performed_at.unwrap_or(now))),
        submitted_to_qa: Set(false),
        submitted_at: Set(None),
        created_at: Set(now),
        last_updated: Set(now),
    };

    let inserted = match active.insert(db).await {
        Ok(model) => model,
        // The unique index is the backstop for two technicians racing the
        // same (sample, test) pair past the existence check above
        Err(err) if is_unique_violation(&err) => {
            return Err(BusinessError::Duplicate {
                resource: "QC result".to_string(),
                field: "sample and test combination".to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    let mut result: QcResult = inserted.into();
    result.test_name = Some(test.name);
    result.test_code = Some(test.code);
    Ok(result)
}

/// Partial update of an unsubmitted result. Submitted results are frozen.
pub async fn update_result(
    db: &DatabaseConnection,
    id: Uuid,
    update_data: QcResultUpdate,
) -> BusinessResult<QcResult> {
    let existing = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QC result", id))?;

    if existing.submitted_to_qa {
        return Err(BusinessError::rule(
            "immutable_after_submission",
            "QC result has been submitted to QA and can no longer be modified",
        ));
    }

    let existing_active = existing.into_active_model();
    let merged = update_data
        .merge_into_activemodel(existing_active)
        .map_err(BusinessError::from)?;
    let updated = merged.update(db).await.map_err(BusinessError::from)?;

    Ok(updated.into())
}

/// A sample's full test panel, in the order results were recorded.
pub async fn find_by_sample(
    db: &DatabaseConnection,
    sample_id: Uuid,
) -> BusinessResult<Vec<QcResult>> {
    let models = Entity::find()
        .filter(Column::SampleId.eq(sample_id))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await
        .map_err(BusinessError::from)?;

    Ok(models.into_iter().map(QcResult::from).collect())
}

/// Hand the named results over to QA, freezing them.
///
/// All-or-nothing: every requested id is validated before any row is
/// touched. The write itself is a compare-and-swap on
/// `submitted_to_qa = false` inside a transaction; if a concurrent submit
/// won the race between our validation read and the write, the affected-row
/// count comes back zero and the whole transaction rolls back.
pub async fn submit_to_qa(
    db: &DatabaseConnection,
    remotes: &RemoteServices,
    sample_id: Uuid,
    request: SubmitToQaRequest,
) -> BusinessResult<SubmitToQaResponse> {
    if request.result_ids.is_empty() {
        return Err(BusinessError::validation(
            "result_ids",
            "at least one result id is required",
        ));
    }

    let txn = db.begin().await.map_err(BusinessError::from)?;

    let mut validated = Vec::with_capacity(request.result_ids.len());
    for result_id in &request.result_ids {
        let model = Entity::find_by_id(*result_id)
            .filter(Column::SampleId.eq(sample_id))
            .one(&txn)
            .await
            .map_err(BusinessError::from)?
            .ok_or_else(|| BusinessError::not_found("QC result", result_id))?;

        if model.submitted_to_qa {
            return Err(BusinessError::rule(
                "already_submitted",
                format!("QC result {result_id} has already been submitted to QA"),
            ));
        }
        if model.status != QcResultStatus::Completed {
            return Err(BusinessError::rule(
                "incomplete_result",
                format!("QC result {result_id} is not completed and cannot be submitted"),
            ));
        }
        validated.push(model);
    }

    let submitted_at = Utc::now();
    for model in &validated {
        let remarks = match (&model.remarks, &request.remarks) {
            (Some(existing), Some(appended)) => Some(format!("{existing}\n{appended}")),
            (None, Some(appended)) => Some(appended.clone()),
            (existing, None) => existing.clone(),
        };

        let rows = Entity::update_many()
            .col_expr(Column::SubmittedToQa, Expr::value(true))
            .col_expr(Column::SubmittedAt, Expr::value(Some(submitted_at)))
            .col_expr(Column::Remarks, Expr::value(remarks))
            .col_expr(Column::LastUpdated, Expr::value(submitted_at))
            .filter(Column::Id.eq(model.id))
            .filter(Column::SubmittedToQa.eq(false))
            .exec(&txn)
            .await
            .map_err(BusinessError::from)?
            .rows_affected;

        if rows != 1 {
            txn.rollback().await.map_err(BusinessError::from)?;
            return Err(BusinessError::rule(
                "already_submitted",
                format!("QC result {} was submitted concurrently", model.id),
            ));
        }
    }

    txn.commit().await.map_err(BusinessError::from)?;

    // The submission is committed; the status push is an idempotent
    // assertion delivered at-least-once, so a failed push is logged for
    // redelivery rather than unwinding the hand-off.
    if let Err(err) = remotes
        .samples
        .update_status(sample_id, SAMPLE_STATUS_SUBMITTED_TO_QA)
        .await
    {
        warn!(%sample_id, %err, "sample status push failed after submission");
    }

    Ok(SubmitToQaResponse {
        sample_id,
        submitted_count: validated.len(),
        submitted_at,
    })
}

/// Gate: declare lab testing finished for a sample.
///
/// Mutates nothing locally; its only effect is the `QC Complete` push, so a
/// failed push is surfaced to the caller as a retryable error.
pub async fn complete_testing(
    db: &DatabaseConnection,
    remotes: &RemoteServices,
    sample_id: Uuid,
) -> BusinessResult<CompleteTestingResponse> {
    let results = Entity::find()
        .filter(Column::SampleId.eq(sample_id))
        .all(db)
        .await
        .map_err(BusinessError::from)?;

    if results.is_empty() {
        return Err(BusinessError::rule(
            "no_results",
            format!("no QC results exist for sample {sample_id}"),
        ));
    }
    if let Some(open) = results
        .iter()
        .find(|r| r.status != QcResultStatus::Completed)
    {
        return Err(BusinessError::rule(
            "testing_incomplete",
            format!("QC result {} is not completed", open.id),
        ));
    }

    remotes
        .samples
        .update_status(sample_id, SAMPLE_STATUS_QC_COMPLETE)
        .await
        .map_err(|err| BusinessError::ExternalServiceError {
            service: "qc-sample".to_string(),
            message: err.to_string(),
        })?;

    Ok(CompleteTestingResponse {
        sample_id,
        result_count: results.len(),
    })
}

/// Remove an unsubmitted result. Submitted results are retained for audit.
pub async fn delete_result(db: &DatabaseConnection, id: Uuid) -> BusinessResult<()> {
    let existing = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QC result", id))?;

    if existing.submitted_to_qa {
        return Err(BusinessError::rule(
            "immutable_after_submission",
            "QC result has been submitted to QA and can no longer be deleted",
        ));
    }

    existing.delete(db).await.map_err(BusinessError::from)?;
    Ok(())
}
