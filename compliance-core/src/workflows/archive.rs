use futures::future::try_join_all;
use tracing::{debug, info, warn};

use super::{normalize_reason, MutationOutcome, SkipReason};
use crate::api::RequirementsApi;
use crate::controller::ListController;
use crate::error::{ValidationError, WorkflowError};
use crate::host::Host;
use crate::messages::{self, MessageKey};
use crate::models::Requirement;

impl<A, H> ListController<A, H>
where
    A: RequirementsApi,
    H: Host,
{
    /// Archives one record with a reason asked from the user
    pub async fn archive(&self, id: &str) -> Result<MutationOutcome, WorkflowError> {
        let record = self.lookup(id).await?;
        if record.is_archived() {
            return Ok(MutationOutcome::Skipped(SkipReason::AlreadyArchived));
        }

        let prompt = messages::text(MessageKey::ArchiveReasonPrompt, self.locale());
        let answer = self.host().prompt(prompt).await;
        if !answer.confirmed {
            return Ok(MutationOutcome::Cancelled);
        }
        let reason = self.validated(normalize_reason(answer.value.as_deref().unwrap_or_default()))?;
        self.archive_record(&record, &reason).await
    }

    /// Archives one record with a reason collected elsewhere
    pub async fn archive_with_reason(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<MutationOutcome, WorkflowError> {
        let reason = self.validated(normalize_reason(reason))?;
        let record = self.lookup(id).await?;
        if record.is_archived() {
            return Ok(MutationOutcome::Skipped(SkipReason::AlreadyArchived));
        }
        self.archive_record(&record, &reason).await
    }

    async fn archive_record(
        &self,
        record: &Requirement,
        reason: &str,
    ) -> Result<MutationOutcome, WorkflowError> {
        let id = record.id.as_str();
        self.pending.borrow_mut().archiving = Some(id.to_string());
        let result = self.api().archive_requirement(id, reason).await;
        self.pending.borrow_mut().archiving = None;

        match result {
            Ok(row) => {
                info!("Requirement {} archived", id);
                self.apply_row(row);
                self.refresh_record(id).await;
                self.notify_success(MessageKey::Archived);
                self.revalidate().await;
                Ok(MutationOutcome::Applied)
            }
            Err(err) => {
                warn!("Failed to archive {}: {}", id, err);
                self.surface_error(&err);
                Err(err.into())
            }
        }
    }

    /// Restores an archived record after confirmation
    pub async fn restore(&self, id: &str) -> Result<MutationOutcome, WorkflowError> {
        let record = self.lookup(id).await?;
        if !record.is_restorable() {
            return Ok(MutationOutcome::Skipped(SkipReason::NotArchived));
        }

        let question = messages::text(MessageKey::RestoreConfirm, self.locale());
        if !self.host().confirm(question).await.confirmed {
            return Ok(MutationOutcome::Cancelled);
        }

        self.pending.borrow_mut().restoring = Some(id.to_string());
        let result = self.api().restore_requirement(id).await;
        self.pending.borrow_mut().restoring = None;

        match result {
            Ok(row) => {
                info!("Requirement {} restored", id);
                self.apply_row(row);
                self.refresh_record(id).await;
                self.notify_success(MessageKey::Restored);
                self.revalidate().await;
                Ok(MutationOutcome::Applied)
            }
            Err(err) => {
                warn!("Failed to restore {}: {}", id, err);
                self.surface_error(&err);
                Err(err.into())
            }
        }
    }

    /// Archives a batch of triage records with one shared reason.
    ///
    /// The archive calls run together and the batch fails as a whole if any
    /// of them fails, even though others may already have been applied. A
    /// revalidation afterwards shows what actually changed.
    pub async fn dismiss(
        &self,
        ids: &[String],
        reason: Option<&str>,
    ) -> Result<MutationOutcome, WorkflowError> {
        if ids.is_empty() {
            return Err(self.invalid(ValidationError::NothingSelected));
        }
        let reason = match reason {
            Some(reason) => reason.to_string(),
            None => {
                let prompt = messages::text(MessageKey::DismissReasonPrompt, self.locale());
                let answer = self.host().prompt(prompt).await;
                if !answer.confirmed {
                    return Ok(MutationOutcome::Cancelled);
                }
                answer.value.unwrap_or_default()
            }
        };
        let reason = self.validated(normalize_reason(&reason))?;

        self.pending
            .borrow_mut()
            .dismissing
            .extend(ids.iter().cloned());
        let calls = ids
            .iter()
            .map(|id| self.api().archive_requirement(id, &reason));
        let result = try_join_all(calls).await;
        {
            let mut pending = self.pending.borrow_mut();
            for id in ids {
                pending.dismissing.remove(id);
            }
        }

        match result {
            Ok(rows) => {
                info!("Dismissed {} requirements", rows.len());
                for row in rows {
                    self.apply_row(row);
                }
                {
                    let mut selection = self.selection.borrow_mut();
                    for id in ids {
                        selection.remove(id);
                    }
                }
                self.notify_success(MessageKey::Dismissed);
                self.revalidate().await;
                Ok(MutationOutcome::Applied)
            }
            Err(err) => {
                warn!("Dismiss batch of {} failed: {}", ids.len(), err);
                self.surface_error(&err);
                if !err.is_unauthenticated() {
                    self.revalidate().await;
                }
                Err(err.into())
            }
        }
    }

    /// Pulls server-computed metadata after an archive or restore. The
    /// mutation response stays in place if this fails.
    async fn refresh_record(&self, id: &str) {
        match self.api().get_requirement(id).await {
            Ok(row) => self.apply_row(row),
            Err(err) => debug!("Keeping mutation response for {}: {}", id, err),
        }
    }

    async fn lookup(&self, id: &str) -> Result<Requirement, WorkflowError> {
        self.record(id).await.map_err(|err| {
            self.surface_error(&err);
            WorkflowError::from(err)
        })
    }

    pub(crate) fn invalid(&self, err: ValidationError) -> WorkflowError {
        self.surface_validation(&err);
        WorkflowError::Validation(err)
    }

    pub(crate) fn validated<T>(&self, result: Result<T, ValidationError>) -> Result<T, WorkflowError> {
        result.map_err(|err| self.invalid(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsoleConfig, ConsoleContext};
    use crate::error::ApiError;
    use crate::host::{DialogOutcome, Toast};
    use crate::models::{ArchiveState, RawStatus};
    use crate::testing::{open_row, triage_row, FakeApi, FakeHost, SERVER_ACTOR};
    use std::rc::Rc;

    fn controller(rows: Vec<Requirement>, query: &str) -> ListController<FakeApi, FakeHost> {
        ListController::new(
            FakeApi::with_rows(rows),
            FakeHost::new(query),
            Rc::new(ConsoleContext::default()),
            &ConsoleConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_archive_prompts_and_refetches_metadata() {
        let ctrl = controller(vec![open_row("a")], "");
        ctrl.load().await;
        ctrl.host().answer_prompt(DialogOutcome::with_value("  superseded  "));

        assert_eq!(ctrl.archive("a").await.unwrap(), MutationOutcome::Applied);
        assert!(ctrl.api().calls().contains(&"archive:a:superseded".to_string()));
        assert_eq!(ctrl.api().calls_to("get"), 1);

        // The revalidated list no longer has the archived row
        assert!(ctrl.rows().is_empty());
        let stored = ctrl.api().row("a").unwrap();
        assert_eq!(stored.archive_metadata().requested_by.as_deref(), Some(SERVER_ACTOR));
    }

    #[tokio::test]
    async fn test_refetched_record_replaces_mutation_response() {
        let ctrl = controller(vec![open_row("a")], "");
        ctrl.load().await;
        // Keep the list from revalidating over the upserted row
        ctrl.api().fail_next_list(ApiError::network("offline"));

        ctrl.archive_with_reason("a", "obsolete").await.unwrap();
        let row = &ctrl.rows()[0];
        assert_eq!(row.archive_state, Some(ArchiveState::Archived));
        assert_eq!(row.archive_requested_by.as_deref(), Some(SERVER_ACTOR));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_mutation_response() {
        let ctrl = controller(vec![open_row("a")], "");
        ctrl.load().await;
        ctrl.api().fail("get", "a", ApiError::from_response(500, None));
        ctrl.api().fail_next_list(ApiError::network("offline"));

        assert_eq!(
            ctrl.archive_with_reason("a", "obsolete").await.unwrap(),
            MutationOutcome::Applied
        );
        let row = &ctrl.rows()[0];
        assert_eq!(row.archive_state, Some(ArchiveState::Archived));
        assert_eq!(row.archive_requested_by, None);
    }

    #[tokio::test]
    async fn test_archive_requires_reason() {
        let ctrl = controller(vec![open_row("a")], "");
        ctrl.load().await;

        ctrl.host().answer_prompt(DialogOutcome::with_value("   "));
        let err = ctrl.archive("a").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::EmptyReason)));
        assert_eq!(ctrl.host().toasts(), vec![Toast::error("A reason is required.")]);

        ctrl.host().answer_prompt(DialogOutcome::cancelled());
        assert_eq!(ctrl.archive("a").await.unwrap(), MutationOutcome::Cancelled);
        assert_eq!(ctrl.api().calls_to("archive"), 0);
    }

    #[tokio::test]
    async fn test_archive_skips_archived_record() {
        let row = open_row("a").with_status(RawStatus::Archived);
        let ctrl = controller(vec![row], "archived=true");
        ctrl.load().await;
        assert_eq!(
            ctrl.archive_with_reason("a", "again").await.unwrap(),
            MutationOutcome::Skipped(SkipReason::AlreadyArchived)
        );
        assert!(ctrl.host().dialogs_shown().is_empty());
    }

    #[tokio::test]
    async fn test_restore_requires_archived_state_and_confirmation() {
        let archived = open_row("a").with_archive_state(ArchiveState::Archived);
        let raw_only = open_row("b").with_status(RawStatus::Archived);
        let ctrl = controller(vec![archived, raw_only], "archived=true");
        ctrl.load().await;

        assert_eq!(
            ctrl.restore("b").await.unwrap(),
            MutationOutcome::Skipped(SkipReason::NotArchived)
        );

        ctrl.host().answer_confirm(DialogOutcome::cancelled());
        assert_eq!(ctrl.restore("a").await.unwrap(), MutationOutcome::Cancelled);
        assert_eq!(ctrl.api().calls_to("restore"), 0);

        ctrl.host().answer_confirm(DialogOutcome::confirmed());
        assert_eq!(ctrl.restore("a").await.unwrap(), MutationOutcome::Applied);
        assert_eq!(ctrl.api().calls_to("get"), 1);
        assert_eq!(ctrl.rows().len(), 1);
        assert_eq!(ctrl.pending().restoring, None);
    }

    #[tokio::test]
    async fn test_dismiss_batch() {
        let ctrl = controller(
            vec![triage_row("t1"), triage_row("t2"), triage_row("t3")],
            "status=PENDING_REVIEW",
        );
        ctrl.load().await;
        ctrl.toggle_all(true);

        let ids = vec!["t1".to_string(), "t2".to_string()];
        assert_eq!(
            ctrl.dismiss(&ids, Some(" not applicable ")).await.unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(ctrl.api().calls_to("archive"), 2);
        assert_eq!(ctrl.selected_ids(), vec!["t3".to_string()]);
        assert_eq!(ctrl.api().calls_to("list"), 2);
        assert!(ctrl.pending().dismissing.is_empty());
        assert_eq!(ctrl.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_failure_reports_whole_batch_and_revalidates() {
        let ctrl = controller(vec![triage_row("t1"), triage_row("t2")], "status=PENDING_REVIEW");
        ctrl.load().await;
        ctrl.toggle_all(true);
        ctrl.api().fail("archive", "t2", ApiError::from_response(500, None));

        let ids = ctrl.selected_ids();
        let err = ctrl.dismiss(&ids, Some("duplicate")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Remote(_)));
        assert_eq!(ctrl.api().calls_to("list"), 2);
        assert_eq!(ctrl.host().toasts().len(), 1);
        assert!(ctrl.pending().dismissing.is_empty());

        // t1 went through server-side and the revalidation shows it
        assert_eq!(ctrl.rows().len(), 1);
        assert_eq!(ctrl.rows()[0].id, "t2");
        assert_eq!(ctrl.selected_ids(), vec!["t2".to_string()]);
    }

    #[tokio::test]
    async fn test_dismiss_prompts_for_shared_reason() {
        let ctrl = controller(vec![triage_row("t1")], "");
        ctrl.load().await;

        let ids = vec!["t1".to_string()];
        ctrl.host().answer_prompt(DialogOutcome::cancelled());
        assert_eq!(ctrl.dismiss(&ids, None).await.unwrap(), MutationOutcome::Cancelled);

        ctrl.host().answer_prompt(DialogOutcome::with_value("out of scope"));
        ctrl.dismiss(&ids, None).await.unwrap();
        assert!(ctrl.api().calls().contains(&"archive:t1:out of scope".to_string()));

        let err = ctrl.dismiss(&[], Some("x")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::NothingSelected)));
    }
}
