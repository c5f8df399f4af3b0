use clap::Args;

use common::verify::{verify_dataset, VerifyReport};
use object_storage::StorageError;

use super::target::TargetArgs;

/// Check every object in the bucket against the stored manifest
#[derive(Args, Debug, Clone)]
pub struct Verify {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Verify(#[from] common::verify::VerifyError),
    /// The run completed but found anomalies; each was logged as it was found
    #[error("{0}")]
    Anomalies(VerifyReport),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Verify {
    type Error = VerifyError;
    type Output = VerifyReport;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let storage = self.target.connect(ctx)?;
        let report = verify_dataset(&storage, &ctx.config.dataset.manifest_key).await?;

        if report.is_clean() {
            Ok(report)
        } else {
            Err(VerifyError::Anomalies(report))
        }
    }
}
