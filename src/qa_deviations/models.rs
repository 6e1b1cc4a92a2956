use chrono::{DateTime, Datelike, Utc};
use crudcrate::{CRUDResource, EntityToModels, traits::MergeIntoActiveModel};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, IntoActiveModel, QueryFilter, QuerySelect,
    entity::prelude::*,
};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "deviation_status")]
#[serde(rename_all = "snake_case")]
pub enum DeviationStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "closed")]
    Closed,
}

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "deviation_severity")]
#[serde(rename_all = "snake_case")]
pub enum DeviationSeverity {
    #[sea_orm(string_value = "minor")]
    Minor,
    #[sea_orm(string_value = "major")]
    Major,
    #[sea_orm(string_value = "critical")]
    Critical,
}

/// The kind half of the polymorphic source reference. Together with
/// `source_id` this forms a tagged union pointing back at the entity the
/// non-conformance was discovered on, so adding a new source kind is a
/// compile-time-checked change rather than a new magic string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "deviation_source_type")]
#[serde(rename_all = "snake_case")]
pub enum DeviationSourceType {
    #[sea_orm(string_value = "quality_control")]
    QualityControl,
    #[sea_orm(string_value = "production")]
    Production,
    #[sea_orm(string_value = "warehouse")]
    Warehouse,
    #[sea_orm(string_value = "distribution")]
    Distribution,
    #[sea_orm(string_value = "customer")]
    Customer,
}

impl std::str::FromStr for DeviationSourceType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "quality_control" => Ok(DeviationSourceType::QualityControl),
            "production" => Ok(DeviationSourceType::Production),
            "warehouse" => Ok(DeviationSourceType::Warehouse),
            "distribution" => Ok(DeviationSourceType::Distribution),
            "customer" => Ok(DeviationSourceType::Customer),
            other => Err(format!("unknown deviation source type '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, EntityToModels)]
#[sea_orm(table_name = "qa_deviations")]
#[crudcrate(
    generate_router,
    api_struct = "QaDeviation",
    name_singular = "qa_deviation",
    name_plural = "qa_deviations",
    description = "Non-conformance records with their own lifecycle and numbering, linkable to the QC result, release or other entity they were discovered on.",
    fn_create = create_deviation,
    fn_update = update_deviation,
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[sea_orm(unique)]
    #[crudcrate(sortable, filterable, create_model = false, update_model = false, on_create = String::new())]
    pub deviation_number: String,
    #[crudcrate(sortable, filterable, fulltext)]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub description: Option<String>,
    #[crudcrate(sortable, filterable, enum_field)]
    pub severity: DeviationSeverity,
    #[crudcrate(filterable)]
    pub category: Option<String>,
    #[crudcrate(sortable, filterable, enum_field, create_model = false, on_create = DeviationStatus::Open)]
    pub status: DeviationStatus,
    #[crudcrate(filterable)]
    pub source_type: Option<DeviationSourceType>,
    #[crudcrate(filterable)]
    pub source_id: Option<Uuid>,
    #[crudcrate(filterable)]
    pub source_reference: Option<String>,
    #[crudcrate(filterable)]
    pub material_id: Option<Uuid>,
    #[crudcrate(filterable, fulltext)]
    pub material_name: Option<String>,
    #[crudcrate(filterable)]
    pub batch_number: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub discovered_by: String,
    #[crudcrate(sortable, create_model = false, update_model = false, on_create = chrono::Utc::now())]
    pub discovered_at: DateTime<Utc>,
    #[crudcrate(filterable)]
    pub assigned_to: Option<String>,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[crudcrate(sortable)]
    pub due_date: Option<DateTime<Utc>>,
    #[crudcrate(sortable, create_model = false, update_model = false)]
    pub closed_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub root_cause: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub immediate_action: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub corrective_action: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub preventive_action: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub effectiveness_check: Option<String>,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

const NUMBER_RETRY_ATTEMPTS: u32 = 5;

/// Next `DEV-{year}-{seq:06}` number for the current year.
///
/// Read-then-increment alone would hand the same number to two concurrent
/// creates; the unique index on `deviation_number` plus retry-on-conflict in
/// [`create_deviation`] is what makes allocation race-safe.
pub(super) async fn next_deviation_number(db: &DatabaseConnection) -> Result<String, DbErr> {
    let year = Utc::now().year();
    let prefix = format!("DEV-{year}-");

    let existing: Vec<String> = Entity::find()
        .select_only()
        .column(Column::DeviationNumber)
        .filter(Column::DeviationNumber.starts_with(&prefix))
        .into_tuple()
        .all(db)
        .await?;

    let max = existing
        .iter()
        .filter_map(|number| {
            number
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0);

    Ok(format!("{prefix}{:06}", max + 1))
}

/// Custom `create` that allocates the deviation number and stamps the
/// assignment time when the deviation is opened pre-assigned.
async fn create_deviation(
    db: &DatabaseConnection,
    create_data: QaDeviationCreate,
) -> Result<QaDeviation, DbErr> {
    let assigned_to = create_data.assigned_to.clone();

    let mut active: ActiveModel = create_data.into();
    if assigned_to.is_some() {
        active.assigned_at = Set(Some(Utc::now()));
    }

    for _ in 0..NUMBER_RETRY_ATTEMPTS {
        active.deviation_number = Set(next_deviation_number(db).await?);

        match active.clone().insert(db).await {
            Ok(inserted) => return Ok(inserted.into()),
            Err(err) if crate::common::errors::is_unique_violation(&err) => {
                // Lost the number to a concurrent create; back off briefly
                // and allocate again
                let jitter = u64::from(rand::random::<u8>());
                tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;
            }
            Err(err) => return Err(err),
        }
    }

    Err(DbErr::Custom(format!(
        "could not allocate a deviation number after {NUMBER_RETRY_ATTEMPTS} attempts"
    )))
}

/// Custom `update` keeping `closed_at` a one-time stamp: it is set when the
/// status first reaches Closed and never moved afterwards, so re-closing an
/// already-closed deviation is a no-op assertion rather than a new closure.
async fn update_deviation(
    db: &DatabaseConnection,
    id: Uuid,
    update_data: QaDeviationUpdate,
) -> Result<QaDeviation, DbErr> {
    let existing = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("Deviation not found".to_string()))?;

    let previously_closed_at = existing.closed_at;

    let merged = update_data.merge_into_activemodel(existing.into_active_model())?;
    let updated = merged.update(db).await?;

    if updated.status == DeviationStatus::Closed && previously_closed_at.is_none() {
        let mut stamp = updated.into_active_model();
        stamp.closed_at = Set(Some(Utc::now()));
        let stamped = stamp.update(db).await?;
        return Ok(stamped.into());
    }

    Ok(updated.into())
}

/// Assignment of a deviation to an investigator
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub assigned_to: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Explicit status transition
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: DeviationStatus,
}
