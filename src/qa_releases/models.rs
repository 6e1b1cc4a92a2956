pub use super::checklist::models::ChecklistItem;
use chrono::{DateTime, Utc};
use crudcrate::EntityToModels;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, entity::prelude::*};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "qa_release_status")]
#[serde(rename_all = "snake_case")]
pub enum QaReleaseStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "released")]
    Released,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "quarantined")]
    Quarantined,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "release_decision")]
#[serde(rename_all = "snake_case")]
pub enum ReleaseDecision {
    #[sea_orm(string_value = "release")]
    Release,
    #[sea_orm(string_value = "reject")]
    Reject,
    #[sea_orm(string_value = "quarantine")]
    Quarantine,
}

impl ReleaseDecision {
    /// The terminal status a decision moves the release into.
    pub fn terminal_status(self) -> QaReleaseStatus {
        match self {
            ReleaseDecision::Release => QaReleaseStatus::Released,
            ReleaseDecision::Reject => QaReleaseStatus::Rejected,
            ReleaseDecision::Quarantine => QaReleaseStatus::Quarantined,
        }
    }

    /// Disposition keyword communicated to the warehouse.
    pub fn disposition(self) -> &'static str {
        match self {
            ReleaseDecision::Release => "released",
            ReleaseDecision::Reject => "rejected",
            ReleaseDecision::Quarantine => "quarantined",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, EntityToModels)]
#[sea_orm(table_name = "qa_releases")]
#[crudcrate(
    api_struct = "QaRelease",
    name_singular = "qa_release",
    name_plural = "qa_releases",
    description = "The unit of QA decision-making for one received batch: reviewed against its submitted QC results, decided with an e-signature, then communicated to the warehouse.",
    fn_get_one = get_one_qa_release,
    fn_get_all = get_all_qa_releases,
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[sea_orm(unique)]
    #[crudcrate(sortable, filterable, create_model = false, update_model = false, on_create = String::new())]
    pub release_number: String,
    #[crudcrate(sortable, filterable, update_model = false)]
    pub sample_id: Uuid,
    #[crudcrate(sortable, filterable, update_model = false)]
    pub goods_receipt_item_id: Uuid,
    #[crudcrate(filterable, update_model = false)]
    pub material_id: Uuid,
    #[crudcrate(sortable, filterable, fulltext)]
    pub material_name: String,
    #[crudcrate(filterable)]
    pub material_code: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub batch_number: String,
    #[crudcrate(sortable)]
    pub quantity: Decimal,
    #[crudcrate(filterable)]
    pub unit: String,
    #[crudcrate(sortable, filterable, enum_field, create_model = false, on_create = QaReleaseStatus::Pending)]
    pub status: QaReleaseStatus,
    #[crudcrate(filterable, create_model = false, update_model = false)]
    pub decision: Option<ReleaseDecision>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(create_model = false, update_model = false)]
    pub decision_reason: Option<String>,
    #[crudcrate(create_model = false, update_model = false, on_create = serde_json::Value::Array(vec![]))]
    pub qc_result_ids: Json,
    #[crudcrate(sortable, filterable)]
    pub submitted_by: String,
    #[crudcrate(sortable, create_model = false, update_model = false, on_create = chrono::Utc::now())]
    pub submitted_at: DateTime<Utc>,
    #[crudcrate(filterable, create_model = false, update_model = false)]
    pub reviewed_by: Option<String>,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[crudcrate(filterable, create_model = false, update_model = false)]
    pub decided_by: Option<String>,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub decided_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(create_model = false, update_model = false)]
    pub e_signature: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub remarks: Option<String>,
    #[crudcrate(sortable, filterable, create_model = false, update_model = false, on_create = false)]
    pub warehouse_notified: bool,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub warehouse_notified_at: Option<DateTime<Utc>>,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = vec![], list_model = false, create_model = false, update_model = false)]
    pub checklist: Vec<ChecklistItem>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "crate::qa_releases::checklist::models::Entity")]
    ChecklistItems,
}

impl Related<crate::qa_releases::checklist::models::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChecklistItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Custom `get_one` that loads the owned checklist
async fn get_one_qa_release(db: &DatabaseConnection, id: Uuid) -> Result<QaRelease, DbErr> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("QA release not found".to_string()))?;

    let items = model
        .find_related(crate::qa_releases::checklist::models::Entity)
        .all(db)
        .await?;

    let mut release: QaRelease = model.into();
    release.checklist = items.into_iter().map(ChecklistItem::from).collect();

    Ok(release)
}

async fn get_all_qa_releases(
    db: &DatabaseConnection,
    condition: &sea_orm::Condition,
    order_column: Column,
    order_direction: sea_orm::Order,
    offset: u64,
    limit: u64,
) -> Result<Vec<QaReleaseList>, DbErr> {
    use sea_orm::QuerySelect;

    let models = Entity::find()
        .filter(condition.clone())
        .order_by(order_column, order_direction)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?;

    Ok(models.into_iter().map(QaReleaseList::from).collect())
}

/// Submission that opens a release for a received batch
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReleaseRequest {
    pub sample_id: Uuid,
    pub goods_receipt_item_id: Uuid,
    pub material_id: Uuid,
    pub material_name: String,
    pub material_code: Option<String>,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit: String,
    pub qc_result_ids: Vec<Uuid>,
    pub submitted_by: String,
    pub remarks: Option<String>,
}

/// One checklist line as touched during review
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChecklistItemReview {
    pub id: Uuid,
    pub is_completed: bool,
    pub comments: Option<String>,
}

/// Review pass over a pending release
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub reviewed_by: String,
    pub checklist: Vec<ChecklistItemReview>,
}

/// The terminal QA decision, carrying the signature of record
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DecideRequest {
    pub decision: ReleaseDecision,
    pub decision_reason: Option<String>,
    pub e_signature: String,
    pub decided_by: String,
}
