//! Test doubles shared by the resolver unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ident_store::{
    Contact, ContactDirectory, ContactId, ContactPatch, DirectoryError, InMemoryContactDirectory,
    LinkedIdMapping, Message, NewContact, StoreResult, TenantId, Ticket, TicketId, TicketStatus,
};

use crate::collaborators::{
    AddressExistence, CollaboratorError, ExternalAddressOracle, OracleError, TicketTransition,
};

/// Oracle answering from a fixed table; unknown addresses yield `Ok(None)`.
#[derive(Default)]
pub(crate) struct ScriptedOracle {
    answers: HashMap<String, Result<AddressExistence, OracleError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answer(mut self, address: &str, existence: AddressExistence) -> Self {
        self.answers.insert(address.to_string(), Ok(existence));
        self
    }

    pub(crate) fn fail(mut self, address: &str, error: OracleError) -> Self {
        self.answers.insert(address.to_string(), Err(error));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalAddressOracle for ScriptedOracle {
    async fn check_existence(
        &self,
        address: &str,
    ) -> Result<Option<AddressExistence>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answers.get(address).cloned().transpose()
    }
}

/// Ticket transition that records the order of close calls before applying them.
pub(crate) struct RecordingTickets {
    directory: Arc<dyn ContactDirectory>,
    pub(crate) calls: Mutex<Vec<(TicketId, TicketStatus)>>,
}

impl RecordingTickets {
    pub(crate) fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn recorded(&self) -> Vec<(TicketId, TicketStatus)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl TicketTransition for RecordingTickets {
    async fn set_status(
        &self,
        ticket_id: TicketId,
        tenant_id: TenantId,
        status: TicketStatus,
    ) -> Result<(), CollaboratorError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((ticket_id, status));
        self.directory
            .set_ticket_status(tenant_id, ticket_id, status)
            .await?;
        Ok(())
    }
}

/// Delegating directory with switchable faults.
pub(crate) struct FaultyDirectory {
    inner: Arc<InMemoryContactDirectory>,
    hide_contacts: AtomicBool,
    fail_ticket_reassign: AtomicBool,
}

impl FaultyDirectory {
    pub(crate) fn new(inner: Arc<InMemoryContactDirectory>) -> Self {
        Self {
            inner,
            hide_contacts: AtomicBool::new(false),
            fail_ticket_reassign: AtomicBool::new(false),
        }
    }

    /// `get_contact` reports every contact as missing, leaving mappings dangling.
    pub(crate) fn hide_contacts(&self) {
        self.hide_contacts.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_ticket_reassign(&self) {
        self.fail_ticket_reassign.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContactDirectory for FaultyDirectory {
    async fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact> {
        self.inner.insert_contact(contact).await
    }

    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<Contact>> {
        if self.hide_contacts.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_contact(tenant_id, contact_id).await
    }

    async fn find_contact_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> StoreResult<Option<Contact>> {
        self.inner.find_contact_by_number(tenant_id, number).await
    }

    async fn find_contact_by_any_number(
        &self,
        tenant_id: TenantId,
        numbers: &[String],
        exclude: Option<ContactId>,
    ) -> StoreResult<Option<Contact>> {
        self.inner
            .find_contact_by_any_number(tenant_id, numbers, exclude)
            .await
    }

    async fn update_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        patch: ContactPatch,
    ) -> StoreResult<Contact> {
        self.inner.update_contact(tenant_id, contact_id, patch).await
    }

    async fn delete_contact(&self, tenant_id: TenantId, contact_id: ContactId) -> StoreResult<()> {
        self.inner.delete_contact(tenant_id, contact_id).await
    }

    async fn list_contacts(&self, tenant_id: TenantId) -> StoreResult<Vec<Contact>> {
        self.inner.list_contacts(tenant_id).await
    }

    async fn insert_mapping(
        &self,
        tenant_id: TenantId,
        lid: &str,
        contact_id: ContactId,
    ) -> StoreResult<LinkedIdMapping> {
        self.inner.insert_mapping(tenant_id, lid, contact_id).await
    }

    async fn find_mapping_by_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        self.inner.find_mapping_by_lid(tenant_id, lid).await
    }

    async fn find_mapping_by_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        self.inner
            .find_mapping_by_contact(tenant_id, contact_id)
            .await
    }

    async fn list_mappings(&self, tenant_id: TenantId) -> StoreResult<Vec<LinkedIdMapping>> {
        self.inner.list_mappings(tenant_id).await
    }

    async fn insert_message(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        body: &str,
    ) -> StoreResult<Message> {
        self.inner.insert_message(tenant_id, contact_id, body).await
    }

    async fn list_messages(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Message>> {
        self.inner.list_messages(tenant_id, contact_id).await
    }

    async fn reassign_messages(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        self.inner.reassign_messages(tenant_id, from, to).await
    }

    async fn insert_ticket(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        self.inner.insert_ticket(tenant_id, contact_id, status).await
    }

    async fn get_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> StoreResult<Option<Ticket>> {
        self.inner.get_ticket(tenant_id, ticket_id).await
    }

    async fn list_tickets(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Ticket>> {
        self.inner.list_tickets(tenant_id, contact_id).await
    }

    async fn set_ticket_status(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        self.inner
            .set_ticket_status(tenant_id, ticket_id, status)
            .await
    }

    async fn reassign_tickets(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        if self.fail_ticket_reassign.load(Ordering::SeqCst) {
            return Err(DirectoryError::Io(std::io::Error::other(
                "ticket table unavailable",
            )));
        }
        self.inner.reassign_tickets(tenant_id, from, to).await
    }
}
