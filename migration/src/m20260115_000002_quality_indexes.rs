use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============ QC RESULTS TABLE INDEXES ============
        manager
            .create_index(
                Index::create()
                    .name("idx_qc_results_sample_id")
                    .table(QcResults::Table)
                    .col(QcResults::SampleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_qc_results_created_at")
                    .table(QcResults::Table)
                    .col(QcResults::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ============ QA RELEASES TABLE INDEXES ============
        manager
            .create_index(
                Index::create()
                    .name("idx_qa_releases_sample_id")
                    .table(QaReleases::Table)
                    .col(QaReleases::SampleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_qa_releases_status")
                    .table(QaReleases::Table)
                    .col(QaReleases::Status)
                    .to_owned(),
            )
            .await?;

        // ============ QA CHECKLIST ITEMS TABLE INDEXES ============
        manager
            .create_index(
                Index::create()
                    .name("idx_qa_checklist_items_release_id")
                    .table(QaChecklistItems::Table)
                    .col(QaChecklistItems::ReleaseId)
                    .to_owned(),
            )
            .await?;

        // ============ QA DEVIATIONS TABLE INDEXES ============
        // Traceability lookups arrive as (source_type, source_id) pairs
        manager
            .create_index(
                Index::create()
                    .name("idx_qa_deviations_source")
                    .table(QaDeviations::Table)
                    .col(QaDeviations::SourceType)
                    .col(QaDeviations::SourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_qa_deviations_status")
                    .table(QaDeviations::Table)
                    .col(QaDeviations::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index_name in [
            "idx_qa_deviations_status",
            "idx_qa_deviations_source",
            "idx_qa_checklist_items_release_id",
            "idx_qa_releases_status",
            "idx_qa_releases_sample_id",
            "idx_qc_results_created_at",
            "idx_qc_results_sample_id",
        ] {
            manager
                .drop_index(Index::drop().name(index_name).if_exists().to_owned())
                .await
                .ok();
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum QcResults {
    Table,
    SampleId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum QaReleases {
    Table,
    SampleId,
    Status,
}

#[derive(DeriveIden)]
enum QaChecklistItems {
    Table,
    ReleaseId,
}

#[derive(DeriveIden)]
enum QaDeviations {
    Table,
    Status,
    SourceType,
    SourceId,
}
