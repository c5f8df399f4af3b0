use clap::Args;

use common::purge::{purge_bucket, PurgeError, PurgeReport};
use object_storage::StorageError;

use super::target::TargetArgs;

/// Delete every object in the bucket, manifest included
#[derive(Args, Debug, Clone)]
pub struct Delete {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Purge(#[from] PurgeError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Delete {
    type Error = DeleteError;
    type Output = PurgeReport;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let storage = self.target.connect(ctx)?;
        let report = purge_bucket(&storage).await?;
        Ok(report)
    }
}
