use chrono::{DateTime, Utc};
use crudcrate::EntityToModels;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Checklist items exist only as children of a release: they are created
/// with it, deleted with it, and updated only through the review operation
/// on their parent.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, EntityToModels)]
#[sea_orm(table_name = "qa_checklist_items")]
#[crudcrate(api_struct = "ChecklistItem")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[crudcrate(sortable, filterable, update_model = false)]
    pub release_id: Uuid,
    #[sea_orm(column_type = "Text")]
    #[crudcrate(filterable, fulltext)]
    pub requirement: String,
    #[crudcrate(sortable, filterable)]
    pub is_completed: bool,
    #[crudcrate(filterable)]
    pub completed_by: Option<String>,
    #[crudcrate(sortable)]
    pub completed_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    #[crudcrate(fulltext)]
    pub comments: Option<String>,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::qa_releases::models::Entity",
        from = "Column::ReleaseId",
        to = "crate::qa_releases::models::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    QaReleases,
}

impl Related<crate::qa_releases::models::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QaReleases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
