use super::checklist::models as checklist;
use super::models::{
    ActiveModel, ChecklistItem, Column, CreateReleaseRequest, DecideRequest, Entity, QaRelease,
    QaReleaseStatus, ReviewRequest,
};
use crate::common::errors::{BusinessError, BusinessResult, is_unique_violation};
use crate::external::{RemoteServices, WarehouseNotice};
use chrono::{Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::warn;
use uuid::Uuid;

/// Requirements every release is checked against before a decision
const STANDARD_CHECKLIST: [&str; 5] = [
    "QC results reviewed and within specification",
    "Certificate of analysis matches batch documentation",
    "Container and labelling integrity verified",
    "Storage and transport conditions during receipt acceptable",
    "No open deviations affecting this batch",
];

const NUMBER_RETRY_ATTEMPTS: u32 = 3;

/// Load a release with its owned checklist.
pub async fn get_release(db: &DatabaseConnection, id: Uuid) -> BusinessResult<QaRelease> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QA release", id))?;

    let items = checklist::Entity::find()
        .filter(checklist::Column::ReleaseId.eq(id))
        .order_by_asc(checklist::Column::CreatedAt)
        .all(db)
        .await
        .map_err(BusinessError::from)?;

    let mut release: QaRelease = model.into();
    release.checklist = items.into_iter().map(ChecklistItem::from).collect();
    Ok(release)
}

/// Open a release for a received batch.
///
/// Every referenced QC result must already be submitted to QA, verified
/// through the Quality Control seam at creation time; the goods receipt line
/// must resolve as well. A remote failure fails the create closed. The
/// release and its standard checklist are inserted in one transaction.
#[allow(clippy::too_many_lines)]
pub async fn create_release(
    db: &DatabaseConnection,
    remotes: &RemoteServices,
    payload: CreateReleaseRequest,
) -> BusinessResult<QaRelease> {
    if payload.qc_result_ids.is_empty() {
        return Err(BusinessError::validation(
            "qc_result_ids",
            "a release must reference at least one QC result",
        ));
    }

    for result_id in &payload.qc_result_ids {
        let result = match remotes.quality_control.get_result_by_id(*result_id).await {
            Ok(result) => result,
            Err(err) => {
                if err.is_unreachable() {
                    warn!(%result_id, %err, "QC result lookup failed, failing create closed");
                }
                return Err(BusinessError::not_found("QC result", result_id));
            }
        };
        if result.sample_id != payload.sample_id {
            return Err(BusinessError::validation(
                "qc_result_ids",
                format!("QC result {result_id} belongs to a different sample"),
            ));
        }
        if !result.submitted_to_qa {
            return Err(BusinessError::rule(
                "results_not_submitted",
                format!("QC result {result_id} has not yet been submitted to QA"),
            ));
        }
    }

    if let Err(err) = remotes
        .goods_receipt
        .get_item_by_id(payload.goods_receipt_item_id)
        .await
    {
        if err.is_unreachable() {
            warn!(item_id = %payload.goods_receipt_item_id, %err,
                "goods receipt lookup failed, failing create closed");
        }
        return Err(BusinessError::not_found(
            "Goods receipt item",
            payload.goods_receipt_item_id,
        ));
    }

    let qc_result_ids = serde_json::to_value(&payload.qc_result_ids)
        .map_err(|e| BusinessError::InternalError {
            message: e.to_string(),
        })?;

    let mut last_err = None;
    for _ in 0..NUMBER_RETRY_ATTEMPTS {
        let txn = db.begin().await.map_err(BusinessError::from)?;
        let release_number = next_release_number(&txn).await.map_err(BusinessError::from)?;

        let now = Utc::now();
        let release_id = Uuid::new_v4();
        let release = ActiveModel {
            id: Set(release_id),
            release_number: Set(release_number),
            sample_id: Set(payload.sample_id),
            goods_receipt_item_id: Set(payload.goods_receipt_item_id),
            material_id: Set(payload.material_id),
            material_name: Set(payload.material_name.clone()),
            material_code: Set(payload.material_code.clone()),
            batch_number: Set(payload.batch_number.clone()),
            quantity: Set(payload.quantity),
            unit: Set(payload.unit.clone()),
            status: Set(QaReleaseStatus::Pending),
            decision: Set(None),
            decision_reason: Set(None),
            qc_result_ids: Set(qc_result_ids.clone()),
            submitted_by: Set(payload.submitted_by.clone()),
            submitted_at: Set(now),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            decided_by: Set(None),
            decided_at: Set(None),
            e_signature: Set(None),
            remarks: Set(payload.remarks.clone()),
            warehouse_notified: Set(false),
            warehouse_notified_at: Set(None),
            created_at: Set(now),
            last_updated: Set(now),
        };

        match release.insert(&txn).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                // Another create claimed this number first; regenerate
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        for requirement in STANDARD_CHECKLIST {
            let item = checklist::ActiveModel {
                id: Set(Uuid::new_v4()),
                release_id: Set(release_id),
                requirement: Set(requirement.to_string()),
                is_completed: Set(false),
                completed_by: Set(None),
                completed_at: Set(None),
                comments: Set(None),
                created_at: Set(now),
                last_updated: Set(now),
            };
            item.insert(&txn).await.map_err(BusinessError::from)?;
        }

        txn.commit().await.map_err(BusinessError::from)?;
        return get_release(db, release_id).await;
    }

    Err(BusinessError::InternalError {
        message: format!(
            "could not allocate a release number after {NUMBER_RETRY_ATTEMPTS} attempts: {}",
            last_err.map_or_else(String::new, |e| e.to_string())
        ),
    })
}

/// Next `QAR-{year}-{seq:06}` number, scanning this year's numbers inside
/// the caller's transaction. The unique index on `release_number` is the
/// arbiter when two creates race to the same answer.
async fn next_release_number<C: ConnectionTrait>(conn: &C) -> Result<String, sea_orm::DbErr> {
    let year = Utc::now().year();
    let prefix = format!("QAR-{year}-");

    let existing = Entity::find()
        .filter(Column::ReleaseNumber.starts_with(&prefix))
        .all(conn)
        .await?;

    let max = existing
        .iter()
        .filter_map(|model| {
            model
                .release_number
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0);

    Ok(format!("{prefix}{:06}", max + 1))
}

/// A reviewer's pass over the checklist, moving the release under review.
pub async fn review_release(
    db: &DatabaseConnection,
    id: Uuid,
    payload: ReviewRequest,
) -> BusinessResult<QaRelease> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QA release", id))?;

    if model.decision.is_some() {
        return Err(BusinessError::rule(
            "already_decided",
            "release has already been decided and its checklist is frozen",
        ));
    }

    let owned = checklist::Entity::find()
        .filter(checklist::Column::ReleaseId.eq(id))
        .all(db)
        .await
        .map_err(BusinessError::from)?;

    let now = Utc::now();
    let txn = db.begin().await.map_err(BusinessError::from)?;

    for entry in &payload.checklist {
        let item = owned
            .iter()
            .find(|item| item.id == entry.id)
            .ok_or_else(|| BusinessError::not_found("Checklist item", entry.id))?;

        let mut active = item.clone().into_active_model();
        active.is_completed = Set(entry.is_completed);
        active.comments = Set(entry.comments.clone());
        if entry.is_completed {
            active.completed_by = Set(Some(payload.reviewed_by.clone()));
            active.completed_at = Set(Some(now));
        } else {
            active.completed_by = Set(None);
            active.completed_at = Set(None);
        }
        active.last_updated = Set(now);
        active.update(&txn).await.map_err(BusinessError::from)?;
    }

    let mut release = model.into_active_model();
    release.status = Set(QaReleaseStatus::UnderReview);
    release.reviewed_by = Set(Some(payload.reviewed_by.clone()));
    release.reviewed_at = Set(Some(now));
    release.last_updated = Set(now);
    release.update(&txn).await.map_err(BusinessError::from)?;

    txn.commit().await.map_err(BusinessError::from)?;

    get_release(db, id).await
}

/// Record the terminal decision. Decisions are append-only: once a release
/// carries one, further decide calls are rejected, and the e-signature is
/// mandatory because this is the signature of record.
pub async fn decide_release(
    db: &DatabaseConnection,
    id: Uuid,
    payload: DecideRequest,
) -> BusinessResult<QaRelease> {
    if payload.e_signature.trim().is_empty() {
        return Err(BusinessError::validation(
            "e_signature",
            "an electronic signature is required for a terminal decision",
        ));
    }

    let model = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QA release", id))?;

    if model.decision.is_some() {
        return Err(BusinessError::rule(
            "already_decided",
            "release has already been decided; decisions cannot be overwritten",
        ));
    }

    let now = Utc::now();
    let mut release = model.into_active_model();
    release.status = Set(payload.decision.terminal_status());
    release.decision = Set(Some(payload.decision));
    release.decision_reason = Set(payload.decision_reason.clone());
    release.e_signature = Set(Some(payload.e_signature.clone()));
    release.decided_by = Set(Some(payload.decided_by.clone()));
    release.decided_at = Set(Some(now));
    release.last_updated = Set(now);
    release.update(db).await.map_err(BusinessError::from)?;

    get_release(db, id).await
}

/// Communicate the decided disposition to the warehouse.
///
/// Only reachable after a terminal decision. If the warehouse cannot be
/// reached the decision stands and the release simply remains unnotified —
/// the caller gets a retryable 502, never a silent success.
pub async fn notify_warehouse(
    db: &DatabaseConnection,
    remotes: &RemoteServices,
    id: Uuid,
) -> BusinessResult<QaRelease> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QA release", id))?;

    let Some(decision) = model.decision else {
        return Err(BusinessError::rule(
            "not_decided",
            "warehouse can only be notified after a terminal decision",
        ));
    };
    if model.warehouse_notified {
        return Err(BusinessError::rule(
            "already_notified",
            "warehouse has already been notified for this release",
        ));
    }

    let notice = WarehouseNotice {
        release_id: model.id,
        release_number: model.release_number.clone(),
        goods_receipt_item_id: model.goods_receipt_item_id,
        material_id: model.material_id,
        batch_number: model.batch_number.clone(),
        disposition: decision.disposition().to_string(),
        quantity: model.quantity,
        unit: model.unit.clone(),
    };

    remotes
        .warehouse
        .notify_release(&notice)
        .await
        .map_err(|err| {
            warn!(release_id = %id, %err, "warehouse notification failed; release stays unnotified");
            BusinessError::ExternalServiceError {
                service: "warehouse".to_string(),
                message: err.to_string(),
            }
        })?;

    let now = Utc::now();
    let mut release = model.into_active_model();
    release.warehouse_notified = Set(true);
    release.warehouse_notified_at = Set(Some(now));
    release.last_updated = Set(now);
    release.update(db).await.map_err(BusinessError::from)?;

    get_release(db, id).await
}

/// Remove a release that has not been decided. Decided releases are part of
/// the audit record and can never be physically deleted.
pub async fn delete_release(db: &DatabaseConnection, id: Uuid) -> BusinessResult<()> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QA release", id))?;

    if model.decision.is_some() {
        return Err(BusinessError::rule(
            "already_decided",
            "decided releases are retained for audit and cannot be deleted",
        ));
    }

    let txn = db.begin().await.map_err(BusinessError::from)?;
    checklist::Entity::delete_many()
        .filter(checklist::Column::ReleaseId.eq(id))
        .exec(&txn)
        .await
        .map_err(BusinessError::from)?;
    Entity::delete_by_id(id)
        .exec(&txn)
        .await
        .map_err(BusinessError::from)?;
    txn.commit().await.map_err(BusinessError::from)?;

    Ok(())
}
