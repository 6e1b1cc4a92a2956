use super::models::{CreateReleaseRequest, DecideRequest, QaRelease, QaReleaseList, ReviewRequest};
use super::services;
use crate::common::auth::Role;
use crate::common::errors::BusinessError;
use crate::common::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum_keycloak_auth::{PassthroughMode, layer::KeycloakAuthLayer};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router(state: &AppState) -> OpenApiRouter {
    let mut router = OpenApiRouter::new()
        .routes(routes!(list_qa_releases, create_qa_release))
        .routes(routes!(get_qa_release, delete_qa_release))
        .routes(routes!(review_qa_release))
        .routes(routes!(decide_qa_release))
        .routes(routes!(notify_warehouse))
        .with_state(state.clone());

    if let Some(instance) = state.keycloak_auth_instance.clone() {
        router = router.layer(
            KeycloakAuthLayer::<Role>::builder()
                .instance(instance)
                .passthrough_mode(PassthroughMode::Block)
                .persist_raw_claims(false)
                .expected_audiences(vec![String::from("account")])
                .required_roles(vec![Role::Administrator])
                .build(),
        );
    } else if !state.config.tests_running {
        println!("Warning: Mutating routes of qa_releases router are not protected");
    }

    router
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "All QA releases, newest first", body = Vec<QaReleaseList>)
    ),
    tag = "qa_releases",
    summary = "List QA releases"
)]
pub async fn list_qa_releases(
    State(state): State<AppState>,
) -> Result<Json<Vec<QaReleaseList>>, BusinessError> {
    use sea_orm::{EntityTrait, QueryOrder};

    let models = super::models::Entity::find()
        .order_by_desc(super::models::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(BusinessError::from)?;

    Ok(Json(models.into_iter().map(QaReleaseList::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    request_body = CreateReleaseRequest,
    responses(
        (status = 201, description = "Release opened with its checklist", body = QaRelease),
        (status = 400, description = "A referenced QC result is not submitted to QA"),
        (status = 404, description = "A referenced QC result or goods receipt item does not exist")
    ),
    tag = "qa_releases",
    summary = "Open a QA release for a received batch"
)]
pub async fn create_qa_release(
    State(state): State<AppState>,
    Json(payload): Json<CreateReleaseRequest>,
) -> Result<(StatusCode, Json<QaRelease>), BusinessError> {
    let release = services::create_release(&state.db, &state.remotes, payload).await?;
    Ok((StatusCode::CREATED, Json(release)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "QA release ID")),
    responses(
        (status = 200, description = "The release with its checklist", body = QaRelease),
        (status = 404, description = "QA release not found")
    ),
    tag = "qa_releases",
    summary = "Get one QA release"
)]
pub async fn get_qa_release(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<QaRelease>, BusinessError> {
    let release = services::get_release(&state.db, id).await?;
    Ok(Json(release))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "QA release ID")),
    responses(
        (status = 204, description = "Release deleted"),
        (status = 400, description = "Release already decided; retained for audit"),
        (status = 404, description = "QA release not found")
    ),
    tag = "qa_releases",
    summary = "Delete an undecided QA release"
)]
pub async fn delete_qa_release(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, BusinessError> {
    services::delete_release(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/review",
    params(("id" = Uuid, Path, description = "QA release ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Checklist updated, release under review", body = QaRelease),
        (status = 400, description = "Release already decided"),
        (status = 404, description = "Release or checklist item not found")
    ),
    tag = "qa_releases",
    summary = "Review a release's checklist"
)]
pub async fn review_qa_release(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<QaRelease>, BusinessError> {
    let release = services::review_release(&state.db, id, payload).await?;
    Ok(Json(release))
}

#[utoipa::path(
    post,
    path = "/{id}/decide",
    params(("id" = Uuid, Path, description = "QA release ID")),
    request_body = DecideRequest,
    responses(
        (status = 200, description = "Decision recorded", body = QaRelease),
        (status = 400, description = "Already decided, or e-signature missing"),
        (status = 404, description = "QA release not found")
    ),
    tag = "qa_releases",
    summary = "Record the terminal QA decision"
)]
pub async fn decide_qa_release(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<DecideRequest>,
) -> Result<Json<QaRelease>, BusinessError> {
    let release = services::decide_release(&state.db, id, payload).await?;
    Ok(Json(release))
}

#[utoipa::path(
    post,
    path = "/{id}/notify-warehouse",
    params(("id" = Uuid, Path, description = "QA release ID")),
    responses(
        (status = 200, description = "Warehouse notified", body = QaRelease),
        (status = 400, description = "Release not decided yet, or already notified"),
        (status = 404, description = "QA release not found"),
        (status = 502, description = "Warehouse unreachable; release remains unnotified")
    ),
    tag = "qa_releases",
    summary = "Notify the warehouse of the decided disposition"
)]
pub async fn notify_warehouse(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<QaRelease>, BusinessError> {
    let release = services::notify_warehouse(&state.db, &state.remotes, id).await?;
    Ok(Json(release))
}
