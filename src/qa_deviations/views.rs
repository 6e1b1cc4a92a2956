use super::models::{
    AssignRequest, DeviationSourceType, DeviationStatus, QaDeviation, StatusRequest,
    router as crudrouter,
};
use crate::common::auth::Role;
use crate::common::errors::BusinessError;
use crate::common::state::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum_keycloak_auth::{PassthroughMode, layer::KeycloakAuthLayer};
use chrono::Utc;
use crudcrate::CRUDResource;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder,
};
use std::str::FromStr;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

pub fn router(state: &AppState) -> OpenApiRouter {
    let mut mutating_router = crudrouter(&state.db.clone());

    // Assignment, explicit status transitions and source traceability sit
    // beside the generated CRUD routes
    mutating_router = mutating_router
        .route(
            "/{id}/assign",
            post(assign_deviation).with_state(state.clone()),
        )
        .route(
            "/{id}/status",
            post(update_deviation_status).with_state(state.clone()),
        )
        .route(
            "/source/{source_type}/{source_id}",
            get(get_deviations_by_source).with_state(state.clone()),
        );

    if let Some(instance) = state.keycloak_auth_instance.clone() {
        mutating_router = mutating_router.layer(
            KeycloakAuthLayer::<Role>::builder()
                .instance(instance)
                .passthrough_mode(PassthroughMode::Block)
                .persist_raw_claims(false)
                .expected_audiences(vec![String::from("account")])
                .required_roles(vec![Role::Administrator])
                .build(),
        );
    } else if !state.config.tests_running {
        println!(
            "Warning: Mutating routes of {} router are not protected",
            QaDeviation::RESOURCE_NAME_PLURAL
        );
    }

    mutating_router
}

/// Assign a deviation to an investigator, stamping the assignment time and
/// moving a freshly opened deviation into progress.
#[utoipa::path(
    post,
    path = "/qa_deviations/{id}/assign",
    params(("id" = Uuid, Path, description = "Deviation ID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Deviation assigned", body = QaDeviation),
        (status = 404, description = "Deviation not found")
    ),
    tag = "qa_deviations",
    summary = "Assign a deviation"
)]
pub async fn assign_deviation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<QaDeviation>, BusinessError> {
    let model = super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("Deviation", id))?;

    let now = Utc::now();
    let was_open = model.status == DeviationStatus::Open;

    let mut active = model.into_active_model();
    active.assigned_to = Set(Some(payload.assigned_to));
    active.assigned_at = Set(Some(now));
    if let Some(due_date) = payload.due_date {
        active.due_date = Set(Some(due_date));
    }
    if was_open {
        active.status = Set(DeviationStatus::InProgress);
    }
    active.last_updated = Set(now);

    let updated = active.update(&state.db).await.map_err(BusinessError::from)?;
    Ok(Json(updated.into()))
}

/// Explicit status transition; the first transition to Closed stamps
/// `closed_at` and later re-closes leave the stamp untouched.
#[utoipa::path(
    post,
    path = "/qa_deviations/{id}/status",
    params(("id" = Uuid, Path, description = "Deviation ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = QaDeviation),
        (status = 404, description = "Deviation not found")
    ),
    tag = "qa_deviations",
    summary = "Transition a deviation's status"
)]
pub async fn update_deviation_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<QaDeviation>, BusinessError> {
    let model = super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("Deviation", id))?;

    let now = Utc::now();
    let first_close = payload.status == DeviationStatus::Closed && model.closed_at.is_none();

    let mut active = model.into_active_model();
    active.status = Set(payload.status);
    if first_close {
        active.closed_at = Set(Some(now));
    }
    active.last_updated = Set(now);

    let updated = active.update(&state.db).await.map_err(BusinessError::from)?;
    Ok(Json(updated.into()))
}

/// All deviations opened against one source entity, oldest first.
#[utoipa::path(
    get,
    path = "/qa_deviations/source/{source_type}/{source_id}",
    params(
        ("source_type" = String, Path, description = "Source kind: quality_control, production, warehouse, distribution or customer"),
        ("source_id" = Uuid, Path, description = "ID of the source entity")
    ),
    responses(
        (status = 200, description = "Deviations traced to this source", body = Vec<QaDeviation>),
        (status = 400, description = "Unknown source type")
    ),
    tag = "qa_deviations",
    summary = "Trace deviations back to their source"
)]
pub async fn get_deviations_by_source(
    Path((source_type, source_id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QaDeviation>>, BusinessError> {
    let source_type = DeviationSourceType::from_str(&source_type)
        .map_err(|message| BusinessError::validation("source_type", message))?;

    let models = super::models::Entity::find()
        .filter(super::models::Column::SourceType.eq(source_type))
        .filter(super::models::Column::SourceId.eq(source_id))
        .order_by_asc(super::models::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(BusinessError::from)?;

    Ok(Json(models.into_iter().map(QaDeviation::from).collect()))
}
