use clap::Args;

use common::dataset::{build_dataset, BuildReport, DatasetError};
use object_storage::StorageError;

use super::target::TargetArgs;

/// Create the bucket if needed and upload a fresh dataset and manifest
#[derive(Args, Debug, Clone)]
pub struct Create {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Create {
    type Error = CreateError;
    type Output = BuildReport;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let storage = self.target.connect(ctx)?;
        let report = build_dataset(&storage, &ctx.config.dataset).await?;
        Ok(report)
    }
}
