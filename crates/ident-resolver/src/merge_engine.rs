//! Duplicate consolidation.
//!
//! When the transport confirms that a linked identifier belongs to `winner`,
//! any other contact stored under that identifier is folded into `winner`:
//! messages move, open tickets are closed one by one under the duplicate,
//! every ticket moves, and the duplicate row is deleted. A failure at any step
//! aborts the resolution; steps already applied are not rolled back.

use std::fmt;
use std::sync::Arc;

use ident_store::{Contact, ContactDirectory, ContactId, TicketStatus};
use serde::Serialize;

use crate::collaborators::{CollaboratorError, TicketTransition};
use crate::directory_lookup::lid_number_forms;
use crate::{ResolveError, ResolveResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStep {
    LocateDuplicate,
    ReassignMessages,
    CloseTickets,
    ReassignTickets,
    DeleteDuplicate,
}

impl MergeStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocateDuplicate => "locate_duplicate",
            Self::ReassignMessages => "reassign_messages",
            Self::CloseTickets => "close_tickets",
            Self::ReassignTickets => "reassign_tickets",
            Self::DeleteDuplicate => "delete_duplicate",
        }
    }
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub winner_id: ContactId,
    pub loser_id: ContactId,
    pub loser_number: String,
    pub messages_moved: u64,
    pub tickets_closed: usize,
    pub tickets_moved: u64,
}

#[derive(Clone)]
pub struct MergeEngine {
    directory: Arc<dyn ContactDirectory>,
    tickets: Arc<dyn TicketTransition>,
}

impl MergeEngine {
    pub fn new(directory: Arc<dyn ContactDirectory>, tickets: Arc<dyn TicketTransition>) -> Self {
        Self { directory, tickets }
    }

    /// Folds the contact stored under `lid` (full or domain-stripped) into `winner`.
    ///
    /// Returns `None` without writing anything when no other contact matches.
    #[tracing::instrument(
        name = "ident.merge.dedup_and_consolidate",
        skip(self, winner),
        fields(tenant = %winner.tenant_id, winner = %winner.id)
    )]
    pub async fn dedup_and_consolidate(
        &self,
        winner: &Contact,
        lid: &str,
    ) -> ResolveResult<Option<MergeReport>> {
        let tenant_id = winner.tenant_id;
        let fail = |step: MergeStep| {
            move |source: CollaboratorError| ResolveError::Merge {
                winner_id: winner.id,
                step,
                source,
            }
        };

        let candidates = lid_number_forms(lid);
        let loser = self
            .directory
            .find_contact_by_any_number(tenant_id, &candidates, Some(winner.id))
            .await
            .map_err(CollaboratorError::from)
            .map_err(fail(MergeStep::LocateDuplicate))?;
        let Some(loser) = loser.filter(|candidate| !candidate.is_group) else {
            tracing::debug!("no duplicate contact for linked identifier");
            return Ok(None);
        };
        tracing::info!(
            loser = %loser.id,
            loser_number = %loser.number,
            "consolidating duplicate contact"
        );

        let messages_moved = self
            .directory
            .reassign_messages(tenant_id, loser.id, winner.id)
            .await
            .map_err(CollaboratorError::from)
            .map_err(fail(MergeStep::ReassignMessages))?;

        let open_tickets = self
            .directory
            .list_open_tickets(tenant_id, loser.id)
            .await
            .map_err(CollaboratorError::from)
            .map_err(fail(MergeStep::CloseTickets))?;
        for ticket in &open_tickets {
            self.tickets
                .set_status(ticket.id, ticket.tenant_id, TicketStatus::Closed)
                .await
                .map_err(fail(MergeStep::CloseTickets))?;
        }

        let tickets_moved = self
            .directory
            .reassign_tickets(tenant_id, loser.id, winner.id)
            .await
            .map_err(CollaboratorError::from)
            .map_err(fail(MergeStep::ReassignTickets))?;

        self.directory
            .delete_contact(tenant_id, loser.id)
            .await
            .map_err(CollaboratorError::from)
            .map_err(fail(MergeStep::DeleteDuplicate))?;

        let report = MergeReport {
            winner_id: winner.id,
            loser_id: loser.id,
            loser_number: loser.number,
            messages_moved,
            tickets_closed: open_tickets.len(),
            tickets_moved,
        };
        tracing::info!(
            loser = %report.loser_id,
            messages_moved = report.messages_moved,
            tickets_closed = report.tickets_closed,
            tickets_moved = report.tickets_moved,
            "duplicate contact consolidated"
        );
        Ok(Some(report))
    }
}
