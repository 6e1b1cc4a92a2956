use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    #[allow(clippy::too_many_lines)] // Large migration requires extensive table definitions
    #[allow(clippy::match_wildcard_for_single_variants)] // Wildcard matches for unsupported databases are semantically correct
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable UUID extension for PostgreSQL
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";")
                .await?;
        }

        // Create custom types for PostgreSQL (will be ignored by SQLite)
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            manager
                .create_type(
                    Type::create()
                        .as_enum(QcResultStatus::Table)
                        .values([
                            QcResultStatus::Pending,
                            QcResultStatus::InProgress,
                            QcResultStatus::Completed,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(QaReleaseStatus::Table)
                        .values([
                            QaReleaseStatus::Pending,
                            QaReleaseStatus::UnderReview,
                            QaReleaseStatus::Released,
                            QaReleaseStatus::Rejected,
                            QaReleaseStatus::Quarantined,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(ReleaseDecision::Table)
                        .values([
                            ReleaseDecision::Release,
                            ReleaseDecision::Reject,
                            ReleaseDecision::Quarantine,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(DeviationStatus::Table)
                        .values([
                            DeviationStatus::Open,
                            DeviationStatus::InProgress,
                            DeviationStatus::Closed,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(DeviationSeverity::Table)
                        .values([
                            DeviationSeverity::Minor,
                            DeviationSeverity::Major,
                            DeviationSeverity::Critical,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(DeviationSourceType::Table)
                        .values([
                            DeviationSourceType::QualityControl,
                            DeviationSourceType::Production,
                            DeviationSourceType::Warehouse,
                            DeviationSourceType::Distribution,
                            DeviationSourceType::Customer,
                        ])
                        .to_owned(),
                )
                .await?;
        }

        // Create qc_results table
        let mut qc_results_table = Table::create()
            .table(QcResults::Table)
            .if_not_exists()
            .col(ColumnDef::new(QcResults::SampleId).uuid().not_null())
            .col(ColumnDef::new(QcResults::TestId).uuid().not_null())
            .col(ColumnDef::new(QcResults::ResultValue).text().not_null())
            .col(ColumnDef::new(QcResults::Unit).string())
            .col(ColumnDef::new(QcResults::Passed).boolean().not_null())
            .col(ColumnDef::new(QcResults::Remarks).text())
            .col(ColumnDef::new(QcResults::PerformedBy).string().not_null())
            .col(ColumnDef::new(QcResults::PerformedAt).timestamp_with_time_zone())
            .col(
                ColumnDef::new(QcResults::SubmittedToQa)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(QcResults::SubmittedAt).timestamp_with_time_zone())
            .col(
                ColumnDef::new(QcResults::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(QcResults::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();

        // Add ID column with appropriate type and default based on database backend
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qc_results_table.col(
                    ColumnDef::new(QcResults::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .default(Expr::cust("uuid_generate_v4()")),
                );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qc_results_table.col(
                    ColumnDef::new(QcResults::Id)
                        .uuid()
                        .not_null()
                        .primary_key(),
                );
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        // Add status column with appropriate constraint based on database backend
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qc_results_table.col(
                    ColumnDef::new(QcResults::Status)
                        .custom(QcResultStatus::Table)
                        .not_null(),
                );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qc_results_table.col(ColumnDef::new(QcResults::Status).text().not_null());
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        manager.create_table(qc_results_table).await?;

        // One evaluation per (sample, test) pair
        manager
            .create_index(
                Index::create()
                    .name("idx_qc_results_sample_test_unique")
                    .table(QcResults::Table)
                    .col(QcResults::SampleId)
                    .col(QcResults::TestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create qa_releases table
        let mut qa_releases_table = Table::create()
            .table(QaReleases::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(QaReleases::ReleaseNumber)
                    .string()
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(QaReleases::SampleId).uuid().not_null())
            .col(
                ColumnDef::new(QaReleases::GoodsReceiptItemId)
                    .uuid()
                    .not_null(),
            )
            .col(ColumnDef::new(QaReleases::MaterialId).uuid().not_null())
            .col(ColumnDef::new(QaReleases::MaterialName).string().not_null())
            .col(ColumnDef::new(QaReleases::MaterialCode).string())
            .col(ColumnDef::new(QaReleases::BatchNumber).string().not_null())
            .col(
                ColumnDef::new(QaReleases::Quantity)
                    .decimal_len(16, 3)
                    .not_null(),
            )
            .col(ColumnDef::new(QaReleases::Unit).string().not_null())
            .col(ColumnDef::new(QaReleases::DecisionReason).text())
            .col(ColumnDef::new(QaReleases::QcResultIds).json().not_null())
            .col(ColumnDef::new(QaReleases::SubmittedBy).string().not_null())
            .col(
                ColumnDef::new(QaReleases::SubmittedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(QaReleases::ReviewedBy).string())
            .col(ColumnDef::new(QaReleases::ReviewedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(QaReleases::DecidedBy).string())
            .col(ColumnDef::new(QaReleases::DecidedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(QaReleases::ESignature).text())
            .col(ColumnDef::new(QaReleases::Remarks).text())
            .col(
                ColumnDef::new(QaReleases::WarehouseNotified)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(QaReleases::WarehouseNotifiedAt).timestamp_with_time_zone())
            .col(
                ColumnDef::new(QaReleases::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(QaReleases::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();

        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qa_releases_table.col(
                    ColumnDef::new(QaReleases::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .default(Expr::cust("uuid_generate_v4()")),
                );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qa_releases_table.col(
                    ColumnDef::new(QaReleases::Id)
                        .uuid()
                        .not_null()
                        .primary_key(),
                );
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qa_releases_table
                    .col(
                        ColumnDef::new(QaReleases::Status)
                            .custom(QaReleaseStatus::Table)
                            .not_null(),
                    )
                    .col(ColumnDef::new(QaReleases::Decision).custom(ReleaseDecision::Table));
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qa_releases_table
                    .col(ColumnDef::new(QaReleases::Status).text().not_null())
                    .col(ColumnDef::new(QaReleases::Decision).text());
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        manager.create_table(qa_releases_table).await?;

        // Create qa_checklist_items table (owned by qa_releases, cascade delete)
        let mut qa_checklist_items_table = Table::create()
            .table(QaChecklistItems::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(QaChecklistItems::ReleaseId)
                    .uuid()
                    .not_null(),
            )
            .col(
                ColumnDef::new(QaChecklistItems::Requirement)
                    .text()
                    .not_null(),
            )
            .col(
                ColumnDef::new(QaChecklistItems::IsCompleted)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(QaChecklistItems::CompletedBy).string())
            .col(ColumnDef::new(QaChecklistItems::CompletedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(QaChecklistItems::Comments).text())
            .col(
                ColumnDef::new(QaChecklistItems::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(QaChecklistItems::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_qa_checklist_items_release_id")
                    .from(QaChecklistItems::Table, QaChecklistItems::ReleaseId)
                    .to(QaReleases::Table, QaReleases::Id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .on_update(ForeignKeyAction::NoAction),
            )
            .to_owned();

        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qa_checklist_items_table.col(
                    ColumnDef::new(QaChecklistItems::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .default(Expr::cust("uuid_generate_v4()")),
                );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qa_checklist_items_table.col(
                    ColumnDef::new(QaChecklistItems::Id)
                        .uuid()
                        .not_null()
                        .primary_key(),
                );
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        manager.create_table(qa_checklist_items_table).await?;

        // Create qa_deviations table
        let mut qa_deviations_table = Table::create()
            .table(QaDeviations::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(QaDeviations::DeviationNumber)
                    .string()
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(QaDeviations::Title).string().not_null())
            .col(ColumnDef::new(QaDeviations::Description).text())
            .col(ColumnDef::new(QaDeviations::Category).string())
            .col(ColumnDef::new(QaDeviations::SourceId).uuid())
            .col(ColumnDef::new(QaDeviations::SourceReference).string())
            .col(ColumnDef::new(QaDeviations::MaterialId).uuid())
            .col(ColumnDef::new(QaDeviations::MaterialName).string())
            .col(ColumnDef::new(QaDeviations::BatchNumber).string())
            .col(
                ColumnDef::new(QaDeviations::DiscoveredBy)
                    .string()
                    .not_null(),
            )
            .col(
                ColumnDef::new(QaDeviations::DiscoveredAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(QaDeviations::AssignedTo).string())
            .col(ColumnDef::new(QaDeviations::AssignedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(QaDeviations::DueDate).timestamp_with_time_zone())
            .col(ColumnDef::new(QaDeviations::ClosedAt).timestamp_with_time_zone())
            .col(ColumnDef::new(QaDeviations::RootCause).text())
            .col(ColumnDef::new(QaDeviations::ImmediateAction).text())
            .col(ColumnDef::new(QaDeviations::CorrectiveAction).text())
            .col(ColumnDef::new(QaDeviations::PreventiveAction).text())
            .col(ColumnDef::new(QaDeviations::EffectivenessCheck).text())
            .col(
                ColumnDef::new(QaDeviations::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(QaDeviations::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();

        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qa_deviations_table.col(
                    ColumnDef::new(QaDeviations::Id)
                        .uuid()
                        .not_null()
                        .primary_key()
                        .default(Expr::cust("uuid_generate_v4()")),
                );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qa_deviations_table.col(
                    ColumnDef::new(QaDeviations::Id)
                        .uuid()
                        .not_null()
                        .primary_key(),
                );
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                qa_deviations_table
                    .col(
                        ColumnDef::new(QaDeviations::Status)
                            .custom(DeviationStatus::Table)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QaDeviations::Severity)
                            .custom(DeviationSeverity::Table)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QaDeviations::SourceType)
                            .custom(DeviationSourceType::Table),
                    );
            }
            sea_orm::DatabaseBackend::Sqlite => {
                qa_deviations_table
                    .col(ColumnDef::new(QaDeviations::Status).text().not_null())
                    .col(ColumnDef::new(QaDeviations::Severity).text().not_null())
                    .col(ColumnDef::new(QaDeviations::SourceType).text());
            }
            _ => {
                return Err(DbErr::Custom("Unsupported database backend".to_string()));
            }
        }

        manager.create_table(qa_deviations_table).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(QaChecklistItems::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(QaReleases::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(QaDeviations::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(QcResults::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;

        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            for type_name in [
                "deviation_source_type",
                "deviation_severity",
                "deviation_status",
                "release_decision",
                "qa_release_status",
                "qc_result_status",
            ] {
                manager
                    .get_connection()
                    .execute_unprepared(&format!("DROP TYPE IF EXISTS {type_name}"))
                    .await?;
            }
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum QcResults {
    Table,
    Id,
    SampleId,
    TestId,
    ResultValue,
    Unit,
    Passed,
    Status,
    Remarks,
    PerformedBy,
    PerformedAt,
    SubmittedToQa,
    SubmittedAt,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum QaReleases {
    Table,
    Id,
    ReleaseNumber,
    SampleId,
    GoodsReceiptItemId,
    MaterialId,
    MaterialName,
    MaterialCode,
    BatchNumber,
    Quantity,
    Unit,
    Status,
    Decision,
    DecisionReason,
    QcResultIds,
    SubmittedBy,
    SubmittedAt,
    ReviewedBy,
    ReviewedAt,
    DecidedBy,
    DecidedAt,
    ESignature,
    Remarks,
    WarehouseNotified,
    WarehouseNotifiedAt,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum QaChecklistItems {
    Table,
    Id,
    ReleaseId,
    Requirement,
    IsCompleted,
    CompletedBy,
    CompletedAt,
    Comments,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum QaDeviations {
    Table,
    Id,
    DeviationNumber,
    Title,
    Description,
    Severity,
    Category,
    Status,
    SourceType,
    SourceId,
    SourceReference,
    MaterialId,
    MaterialName,
    BatchNumber,
    DiscoveredBy,
    DiscoveredAt,
    AssignedTo,
    AssignedAt,
    DueDate,
    ClosedAt,
    RootCause,
    ImmediateAction,
    CorrectiveAction,
    PreventiveAction,
    EffectivenessCheck,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum QcResultStatus {
    Table,
    Pending,
    InProgress,
    Completed,
}

#[derive(DeriveIden)]
enum QaReleaseStatus {
    Table,
    Pending,
    UnderReview,
    Released,
    Rejected,
    Quarantined,
}

#[derive(DeriveIden)]
enum ReleaseDecision {
    Table,
    Release,
    Reject,
    Quarantine,
}

#[derive(DeriveIden)]
enum DeviationStatus {
    Table,
    Open,
    InProgress,
    Closed,
}

#[derive(DeriveIden)]
enum DeviationSeverity {
    Table,
    Minor,
    Major,
    Critical,
}

#[derive(DeriveIden)]
enum DeviationSourceType {
    Table,
    QualityControl,
    Production,
    Warehouse,
    Distribution,
    Customer,
}
