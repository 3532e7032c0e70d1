//! Contact directory abstractions and in-memory backend.
//!
//! The directory owns the four tables identity resolution touches: contacts,
//! linked-identifier mappings, messages and tickets. Every operation is scoped
//! by tenant.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use ident_types::{
    Contact, ContactId, ContactPatch, LinkedIdMapping, Message, MessageId, NewContact, TenantId,
    Ticket, TicketId, TicketStatus,
};
pub use sqlite::SqliteContactDirectory;

/// Result type for directory operations.
pub type StoreResult<T> = Result<T, DirectoryError>;

/// Errors returned by directory implementations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("contact {contact_id} not found in tenant {tenant_id}")]
    ContactNotFound {
        tenant_id: TenantId,
        contact_id: ContactId,
    },
    #[error("ticket {ticket_id} not found in tenant {tenant_id}")]
    TicketNotFound {
        tenant_id: TenantId,
        ticket_id: TicketId,
    },
    #[error("tenant {tenant_id} already has a contact numbered '{number}'")]
    DuplicateNumber { tenant_id: TenantId, number: String },
    #[error("linked identifier '{lid}' or contact {contact_id} is already mapped in tenant {tenant_id}")]
    DuplicateMapping {
        tenant_id: TenantId,
        lid: String,
        contact_id: ContactId,
    },
    #[error("contact {contact_id} still owns messages or tickets")]
    ContactInUse { contact_id: ContactId },
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Async directory contract used by the identity resolver.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact>;
    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<Contact>>;
    async fn find_contact_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> StoreResult<Option<Contact>>;
    /// Returns the lowest-id contact whose number is any of `numbers`, skipping `exclude`.
    async fn find_contact_by_any_number(
        &self,
        tenant_id: TenantId,
        numbers: &[String],
        exclude: Option<ContactId>,
    ) -> StoreResult<Option<Contact>>;
    async fn update_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        patch: ContactPatch,
    ) -> StoreResult<Contact>;
    /// Deletes a contact together with its mapping. Fails while messages or tickets remain.
    async fn delete_contact(&self, tenant_id: TenantId, contact_id: ContactId) -> StoreResult<()>;
    async fn list_contacts(&self, tenant_id: TenantId) -> StoreResult<Vec<Contact>>;

    async fn insert_mapping(
        &self,
        tenant_id: TenantId,
        lid: &str,
        contact_id: ContactId,
    ) -> StoreResult<LinkedIdMapping>;
    async fn find_mapping_by_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> StoreResult<Option<LinkedIdMapping>>;
    async fn find_mapping_by_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<LinkedIdMapping>>;
    async fn list_mappings(&self, tenant_id: TenantId) -> StoreResult<Vec<LinkedIdMapping>>;

    async fn insert_message(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        body: &str,
    ) -> StoreResult<Message>;
    async fn list_messages(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Message>>;
    /// Moves every message of `from` to `to` and returns how many moved.
    async fn reassign_messages(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64>;

    async fn insert_ticket(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        status: TicketStatus,
    ) -> StoreResult<Ticket>;
    async fn get_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> StoreResult<Option<Ticket>>;
    async fn list_tickets(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Ticket>>;
    async fn list_open_tickets(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Ticket>> {
        let mut tickets = self.list_tickets(tenant_id, contact_id).await?;
        tickets.retain(|ticket| ticket.status.is_open());
        Ok(tickets)
    }
    async fn set_ticket_status(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> StoreResult<Ticket>;
    /// Moves every ticket of `from` to `to` and returns how many moved.
    async fn reassign_tickets(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64>;
}

/// In-memory implementation for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryContactDirectory {
    inner: RwLock<DirectoryInner>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    contacts: BTreeMap<ContactId, Contact>,
    mappings: BTreeMap<i64, LinkedIdMapping>,
    messages: BTreeMap<MessageId, Message>,
    tickets: BTreeMap<TicketId, Ticket>,
    next_ids: HashMap<&'static str, i64>,
}

impl DirectoryInner {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let slot = self.next_ids.entry(table).or_insert(0);
        *slot += 1;
        *slot
    }

    fn contact(&self, tenant_id: TenantId, contact_id: ContactId) -> Option<&Contact> {
        self.contacts
            .get(&contact_id)
            .filter(|contact| contact.tenant_id == tenant_id)
    }

    fn require_contact(&self, tenant_id: TenantId, contact_id: ContactId) -> StoreResult<()> {
        if self.contact(tenant_id, contact_id).is_none() {
            return Err(DirectoryError::ContactNotFound {
                tenant_id,
                contact_id,
            });
        }
        Ok(())
    }

    fn number_taken(&self, tenant_id: TenantId, number: &str, exclude: Option<ContactId>) -> bool {
        self.contacts.values().any(|contact| {
            contact.tenant_id == tenant_id
                && contact.number == number
                && Some(contact.id) != exclude
        })
    }
}

impl InMemoryContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact> {
        let mut inner = self.inner.write().await;
        if inner.number_taken(contact.tenant_id, &contact.number, None) {
            return Err(DirectoryError::DuplicateNumber {
                tenant_id: contact.tenant_id,
                number: contact.number,
            });
        }

        let now = Utc::now();
        let id = ContactId(inner.next_id("contacts"));
        let row = Contact {
            id,
            tenant_id: contact.tenant_id,
            name: contact.name,
            number: contact.number,
            is_group: contact.is_group,
            profile_pic_url: contact.profile_pic_url,
            tags: Vec::new(),
            extra_info: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        inner.contacts.insert(id, row.clone());
        Ok(row)
    }

    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<Contact>> {
        let inner = self.inner.read().await;
        Ok(inner.contact(tenant_id, contact_id).cloned())
    }

    async fn find_contact_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> StoreResult<Option<Contact>> {
        let inner = self.inner.read().await;
        Ok(inner
            .contacts
            .values()
            .find(|contact| contact.tenant_id == tenant_id && contact.number == number)
            .cloned())
    }

    async fn find_contact_by_any_number(
        &self,
        tenant_id: TenantId,
        numbers: &[String],
        exclude: Option<ContactId>,
    ) -> StoreResult<Option<Contact>> {
        let inner = self.inner.read().await;
        Ok(inner
            .contacts
            .values()
            .find(|contact| {
                contact.tenant_id == tenant_id
                    && Some(contact.id) != exclude
                    && numbers.iter().any(|number| *number == contact.number)
            })
            .cloned())
    }

    async fn update_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        patch: ContactPatch,
    ) -> StoreResult<Contact> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, contact_id)?;
        if let Some(number) = patch.number.as_deref() {
            if inner.number_taken(tenant_id, number, Some(contact_id)) {
                return Err(DirectoryError::DuplicateNumber {
                    tenant_id,
                    number: number.to_string(),
                });
            }
        }

        let contact = inner
            .contacts
            .get_mut(&contact_id)
            .ok_or(DirectoryError::ContactNotFound {
                tenant_id,
                contact_id,
            })?;
        if patch.apply_to(contact) {
            contact.updated_at = Utc::now();
        }
        Ok(contact.clone())
    }

    async fn delete_contact(&self, tenant_id: TenantId, contact_id: ContactId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, contact_id)?;
        let in_use = inner
            .messages
            .values()
            .any(|message| message.contact_id == contact_id)
            || inner
                .tickets
                .values()
                .any(|ticket| ticket.contact_id == contact_id);
        if in_use {
            return Err(DirectoryError::ContactInUse { contact_id });
        }

        inner.contacts.remove(&contact_id);
        inner
            .mappings
            .retain(|_, mapping| mapping.contact_id != contact_id);
        Ok(())
    }

    async fn list_contacts(&self, tenant_id: TenantId) -> StoreResult<Vec<Contact>> {
        let inner = self.inner.read().await;
        Ok(inner
            .contacts
            .values()
            .filter(|contact| contact.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_mapping(
        &self,
        tenant_id: TenantId,
        lid: &str,
        contact_id: ContactId,
    ) -> StoreResult<LinkedIdMapping> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, contact_id)?;
        let conflict = inner.mappings.values().any(|mapping| {
            (mapping.tenant_id == tenant_id && mapping.lid == lid)
                || mapping.contact_id == contact_id
        });
        if conflict {
            return Err(DirectoryError::DuplicateMapping {
                tenant_id,
                lid: lid.to_string(),
                contact_id,
            });
        }

        let id = inner.next_id("linked_id_mappings");
        let mapping = LinkedIdMapping {
            id,
            tenant_id,
            lid: lid.to_string(),
            contact_id,
            created_at: Utc::now(),
        };
        inner.mappings.insert(id, mapping.clone());
        Ok(mapping)
    }

    async fn find_mapping_by_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .mappings
            .values()
            .find(|mapping| mapping.tenant_id == tenant_id && mapping.lid == lid)
            .cloned())
    }

    async fn find_mapping_by_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .mappings
            .values()
            .find(|mapping| mapping.tenant_id == tenant_id && mapping.contact_id == contact_id)
            .cloned())
    }

    async fn list_mappings(&self, tenant_id: TenantId) -> StoreResult<Vec<LinkedIdMapping>> {
        let inner = self.inner.read().await;
        Ok(inner
            .mappings
            .values()
            .filter(|mapping| mapping.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_message(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        body: &str,
    ) -> StoreResult<Message> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, contact_id)?;
        let id = MessageId(inner.next_id("messages"));
        let message = Message {
            id,
            tenant_id,
            contact_id,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        inner.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .filter(|message| message.tenant_id == tenant_id && message.contact_id == contact_id)
            .cloned()
            .collect())
    }

    async fn reassign_messages(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, to)?;
        let mut moved = 0;
        for message in inner.messages.values_mut() {
            if message.tenant_id == tenant_id && message.contact_id == from {
                message.contact_id = to;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn insert_ticket(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, contact_id)?;
        let now = Utc::now();
        let id = TicketId(inner.next_id("tickets"));
        let ticket = Ticket {
            id,
            tenant_id,
            contact_id,
            status,
            created_at: now,
            updated_at: now,
        };
        inner.tickets.insert(id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> StoreResult<Option<Ticket>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .get(&ticket_id)
            .filter(|ticket| ticket.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_tickets(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Ticket>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tickets
            .values()
            .filter(|ticket| ticket.tenant_id == tenant_id && ticket.contact_id == contact_id)
            .cloned()
            .collect())
    }

    async fn set_ticket_status(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .get_mut(&ticket_id)
            .filter(|ticket| ticket.tenant_id == tenant_id)
            .ok_or(DirectoryError::TicketNotFound {
                tenant_id,
                ticket_id,
            })?;
        if ticket.status != status {
            ticket.status = status;
            ticket.updated_at = Utc::now();
        }
        Ok(ticket.clone())
    }

    async fn reassign_tickets(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        inner.require_contact(tenant_id, to)?;
        let now = Utc::now();
        let mut moved = 0;
        for ticket in inner.tickets.values_mut() {
            if ticket.tenant_id == tenant_id && ticket.contact_id == from {
                ticket.contact_id = to;
                ticket.updated_at = now;
                moved += 1;
            }
        }
        Ok(moved)
    }
}
