use super::models::{
    CompleteTestingResponse, QcResult, QcResultUpdate, SubmitToQaRequest, SubmitToQaResponse,
};
use super::services::{self, CreateResultRequest};
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
        .routes(routes!(list_qc_results, create_qc_result))
        .routes(routes!(get_qc_result, update_qc_result, delete_qc_result))
        .routes(routes!(get_sample_results))
        .routes(routes!(submit_sample_results))
        .routes(routes!(complete_sample_testing))
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
        println!("Warning: Mutating routes of qc_results router are not protected");
    }

    router
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "All QC results, oldest first", body = Vec<QcResult>)
    ),
    tag = "qc_results",
    summary = "List QC results"
)]
pub async fn list_qc_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<QcResult>>, BusinessError> {
    use sea_orm::{EntityTrait, QueryOrder};

    let models = super::models::Entity::find()
        .order_by_asc(super::models::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(BusinessError::from)?;

    Ok(Json(models.into_iter().map(QcResult::from).collect()))
}

#[utoipa::path(
    post,
    path = "/",
    request_body = CreateResultRequest,
    responses(
        (status = 201, description = "Result recorded", body = QcResult),
        (status = 404, description = "Sample or test not found"),
        (status = 409, description = "A result already exists for this sample and test")
    ),
    tag = "qc_results",
    summary = "Record a QC result"
)]
pub async fn create_qc_result(
    State(state): State<AppState>,
    Json(payload): Json<CreateResultRequest>,
) -> Result<(StatusCode, Json<QcResult>), BusinessError> {
    let result = services::create_result(&state.db, &state.remotes, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "QC result ID")),
    responses(
        (status = 200, description = "The QC result", body = QcResult),
        (status = 404, description = "QC result not found")
    ),
    tag = "qc_results",
    summary = "Get one QC result"
)]
pub async fn get_qc_result(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<QcResult>, BusinessError> {
    use sea_orm::EntityTrait;

    let model = super::models::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(BusinessError::from)?
        .ok_or_else(|| BusinessError::not_found("QC result", id))?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "QC result ID")),
    request_body = QcResultUpdate,
    responses(
        (status = 200, description = "Updated result", body = QcResult),
        (status = 400, description = "Result already submitted to QA"),
        (status = 404, description = "QC result not found")
    ),
    tag = "qc_results",
    summary = "Update an unsubmitted QC result"
)]
pub async fn update_qc_result(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<QcResultUpdate>,
) -> Result<Json<QcResult>, BusinessError> {
    let result = services::update_result(&state.db, id, payload).await?;
    Ok(Json(result))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = Uuid, Path, description = "QC result ID")),
    responses(
        (status = 204, description = "Result deleted"),
        (status = 400, description = "Result already submitted to QA"),
        (status = 404, description = "QC result not found")
    ),
    tag = "qc_results",
    summary = "Delete an unsubmitted QC result"
)]
pub async fn delete_qc_result(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, BusinessError> {
    services::delete_result(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sample/{sample_id}",
    params(("sample_id" = Uuid, Path, description = "Sample ID")),
    responses(
        (status = 200, description = "The sample's test panel, oldest first", body = Vec<QcResult>)
    ),
    tag = "qc_results",
    summary = "Get a sample's QC results"
)]
pub async fn get_sample_results(
    Path(sample_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QcResult>>, BusinessError> {
    let results = services::find_by_sample(&state.db, sample_id).await?;
    Ok(Json(results))
}

#[utoipa::path(
    post,
    path = "/sample/{sample_id}/submit",
    params(("sample_id" = Uuid, Path, description = "Sample ID")),
    request_body = SubmitToQaRequest,
    responses(
        (status = 200, description = "Results submitted to QA", body = SubmitToQaResponse),
        (status = 400, description = "A result is incomplete or already submitted"),
        (status = 404, description = "A result does not exist under this sample")
    ),
    tag = "qc_results",
    summary = "Submit completed results to QA"
)]
pub async fn submit_sample_results(
    Path(sample_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<SubmitToQaRequest>,
) -> Result<Json<SubmitToQaResponse>, BusinessError> {
    let response = services::submit_to_qa(&state.db, &state.remotes, sample_id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/sample/{sample_id}/complete",
    params(("sample_id" = Uuid, Path, description = "Sample ID")),
    responses(
        (status = 200, description = "Testing declared complete", body = CompleteTestingResponse),
        (status = 400, description = "No results exist or some are incomplete"),
        (status = 502, description = "Sample service unreachable")
    ),
    tag = "qc_results",
    summary = "Declare lab testing complete for a sample"
)]
pub async fn complete_sample_testing(
    Path(sample_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<CompleteTestingResponse>, BusinessError> {
    let response = services::complete_testing(&state.db, &state.remotes, sample_id).await?;
    Ok(Json(response))
}
