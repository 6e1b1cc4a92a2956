//! In-process backing for the Quality Control seam.
//!
//! When the QC Results store and the QA Release orchestrator are deployed in
//! the same process they still talk through the [`QualityControl`] trait;
//! this implementation reads the local store directly instead of going out
//! over the wire. Splitting the services later means swapping this for
//! [`super::messaging::MessagingQualityControl`] — nothing above the seam
//! changes.

use super::{QualityControl, RemoteError, RemoteQcResult};
use crate::qc_results::models as qc_results;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

pub struct LocalQualityControl {
    db: DatabaseConnection,
}

impl LocalQualityControl {
    pub fn new(db: DatabaseConnection) -> Self {
        LocalQualityControl { db }
    }

    fn db_error(err: sea_orm::DbErr) -> RemoteError {
        RemoteError::Rejected {
            service: "quality-control".to_string(),
            detail: err.to_string(),
        }
    }
}

fn to_remote(model: qc_results::Model) -> RemoteQcResult {
    RemoteQcResult {
        id: model.id,
        sample_id: model.sample_id,
        passed: model.passed,
        submitted_to_qa: model.submitted_to_qa,
        submitted_at: model.submitted_at,
    }
}

#[async_trait]
impl QualityControl for LocalQualityControl {
    async fn get_result_by_id(&self, result_id: Uuid) -> Result<RemoteQcResult, RemoteError> {
        qc_results::Entity::find_by_id(result_id)
            .one(&self.db)
            .await
            .map_err(Self::db_error)?
            .map(to_remote)
            .ok_or_else(|| RemoteError::NotFound {
                what: format!("QC result {result_id}"),
            })
    }

    async fn get_results_by_sample(
        &self,
        sample_id: Uuid,
    ) -> Result<Vec<RemoteQcResult>, RemoteError> {
        let models = qc_results::Entity::find()
            .filter(qc_results::Column::SampleId.eq(sample_id))
            .order_by_asc(qc_results::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(Self::db_error)?;
        Ok(models.into_iter().map(to_remote).collect())
    }
}
