use tracing::{info, warn};

use super::MutationOutcome;
use crate::api::{BulkTriageRequest, BulkTriageResponse, RequirementsApi};
use crate::controller::ListController;
use crate::error::{ApiResult, WorkflowError};
use crate::host::Host;
use crate::messages::MessageKey;
use crate::triage::{TriageDraft, TriageForm};

impl<A, H> ListController<A, H>
where
    A: RequirementsApi,
    H: Host,
{
    /// Applies one triage draft to every selected record
    pub async fn save_bulk_triage(&self, draft: &TriageDraft) -> Result<MutationOutcome, WorkflowError> {
        let request = self.validated(draft.to_request(self.selected_ids()))?;
        let response = self.send_triage(&request).await?;

        info!("Triage saved for {} requirements", response.updated);
        for row in response.items {
            self.apply_row(row);
        }
        self.selection.borrow_mut().clear();
        self.notify_success(MessageKey::TriageSaved);
        self.revalidate().await;
        Ok(MutationOutcome::Applied)
    }

    /// Editor for one record, loaded from the mirror or the service
    pub async fn open_triage_form(&self, id: &str) -> ApiResult<TriageForm> {
        let record = self.record(id).await?;
        Ok(TriageForm::new(&record))
    }

    /// Saves the single-record editor and resyncs its baseline
    pub async fn save_record_triage(&self, form: &mut TriageForm) -> Result<MutationOutcome, WorkflowError> {
        let request = self.validated(form.to_request())?;
        let response = self.send_triage(&request).await?;

        match response.items.into_iter().find(|r| r.id == form.record_id()) {
            Some(row) => {
                form.resync(&row);
                self.apply_row(row);
            }
            None => form.mark_saved(),
        }
        info!("Triage saved for {}", form.record_id());
        self.notify_success(MessageKey::TriageSaved);
        self.revalidate().await;
        Ok(MutationOutcome::Applied)
    }

    async fn send_triage(&self, request: &BulkTriageRequest) -> Result<BulkTriageResponse, WorkflowError> {
        self.pending.borrow_mut().saving_triage = true;
        let result = self.api().bulk_triage(request).await;
        self.pending.borrow_mut().saving_triage = false;

        result.map_err(|err| {
            warn!(
                "Triage save for {} requirements failed: {}",
                request.requirement_ids.len(),
                err
            );
            self.surface_error(&err);
            WorkflowError::Remote(err)
        })
    }
}
