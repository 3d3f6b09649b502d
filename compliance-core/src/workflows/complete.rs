use tracing::{info, warn};

use super::{MutationOutcome, SkipReason};
use crate::api::RequirementsApi;
use crate::controller::ListController;
use crate::error::WorkflowError;
use crate::host::Host;
use crate::messages::MessageKey;
use crate::models::RawStatus;

impl<A, H> ListController<A, H>
where
    A: RequirementsApi,
    H: Host,
{
    /// Marks a requirement complete on behalf of the signed-in user
    pub async fn complete(&self, id: &str) -> Result<MutationOutcome, WorkflowError> {
        let record = match self.record(id).await {
            Ok(record) => record,
            Err(err) => {
                self.surface_error(&err);
                return Err(err.into());
            }
        };
        match record.status {
            Some(RawStatus::Done) => return Ok(MutationOutcome::Skipped(SkipReason::AlreadyCompleted)),
            Some(RawStatus::PendingReview) => {
                return Ok(MutationOutcome::Skipped(SkipReason::AwaitingTriage))
            }
            _ => {}
        }

        let actor = match self.acting_user().await {
            Ok(actor) => actor,
            Err(err) => {
                self.surface_error(&err);
                return Err(err.into());
            }
        };

        self.pending.borrow_mut().completing = Some(id.to_string());
        let result = self.api().complete_requirement(id, &actor).await;
        self.pending.borrow_mut().completing = None;

        match result {
            Ok(row) => {
                info!("Requirement {} completed by {}", id, actor);
                self.apply_row(row);
                self.notify_success(MessageKey::Completed);
                self.revalidate().await;
                Ok(MutationOutcome::Applied)
            }
            Err(err) => {
                warn!("Failed to complete {}: {}", id, err);
                self.surface_error(&err);
                Err(err.into())
            }
        }
    }
}
