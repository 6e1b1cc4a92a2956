use chrono::{DateTime, Utc};
use crudcrate::EntityToModels;
use sea_orm::{QueryOrder, QuerySelect, entity::prelude::*};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "qc_result_status")]
#[serde(rename_all = "snake_case")]
pub enum QcResultStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, EntityToModels)]
#[sea_orm(table_name = "qc_results")]
#[crudcrate(
    api_struct = "QcResult",
    name_singular = "qc_result",
    name_plural = "qc_results",
    description = "One evaluation of one test method against one sample. A sample's results form its test panel; submission to QA freezes them.",
    fn_get_one = get_one_qc_result,
    fn_get_all = get_all_qc_results,
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[crudcrate(sortable, filterable, update_model = false)]
    pub sample_id: Uuid,
    #[crudcrate(sortable, filterable, update_model = false)]
    pub test_id: Uuid,
    #[sea_orm(column_type = "Text")]
    #[crudcrate(sortable, filterable)]
    pub result_value: String,
    #[crudcrate(filterable)]
    pub unit: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub passed: bool,
    #[crudcrate(sortable, filterable, enum_field, create_model = false, on_create = QcResultStatus::InProgress)]
    pub status: QcResultStatus,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(filterable, fulltext)]
    pub remarks: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub performed_by: String,
    #[crudcrate(sortable)]
    pub performed_at: Option<DateTime<Utc>>,
    #[crudcrate(sortable, filterable, create_model = false, update_model = false, on_create = false)]
    pub submitted_to_qa: bool,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = None, create_model = false, update_model = false)]
    pub test_name: Option<String>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = None, create_model = false, update_model = false)]
    pub test_code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

async fn get_one_qc_result(db: &DatabaseConnection, id: Uuid) -> Result<QcResult, DbErr> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("QC result not found".to_string()))?;

    Ok(model.into())
}

/// Custom `get_all` keeping panel ordering stable: creation time ascending
/// unless the caller asked for something else.
async fn get_all_qc_results(
    db: &DatabaseConnection,
    condition: &sea_orm::Condition,
    order_column: Column,
    order_direction: sea_orm::Order,
    offset: u64,
    limit: u64,
) -> Result<Vec<QcResultList>, DbErr> {
    let models = Entity::find()
        .filter(condition.clone())
        .order_by(order_column, order_direction)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?;

    Ok(models.into_iter().map(QcResultList::from).collect())
}

/// Body of the submit-to-QA hand-off call
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitToQaRequest {
    pub result_ids: Vec<Uuid>,
    pub remarks: Option<String>,
}

/// Response of the submit-to-QA hand-off call
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitToQaResponse {
    pub sample_id: Uuid,
    pub submitted_count: usize,
    pub submitted_at: DateTime<Utc>,
}

/// Response of the complete-testing gate
#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteTestingResponse {
    pub sample_id: Uuid,
    pub result_count: usize,
}
