//! Capabilities the resolver consumes from the rest of the system.
//!
//! The transport session supplies [`ExternalAddressOracle`]; contact writes,
//! ticket transitions and profile pictures come from the surrounding service.
//! [`DirectoryCollaborators`] implements the write-side traits directly on a
//! [`ContactDirectory`] for deployments without extra side effects.

use std::sync::Arc;

use async_trait::async_trait;
use ident_store::{
    Contact, ContactDirectory, ContactPatch, DirectoryError, NewContact, TenantId, TicketId,
    TicketStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport answer for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressExistence {
    pub exists: bool,
    /// Alternate form the transport uses for the same entity, e.g. `abc123@lid`.
    pub canonical_address: Option<String>,
}

impl AddressExistence {
    pub fn missing() -> Self {
        Self {
            exists: false,
            canonical_address: None,
        }
    }

    pub fn linked(canonical_address: impl Into<String>) -> Self {
        Self {
            exists: true,
            canonical_address: Some(canonical_address.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("address oracle unavailable: {0}")]
    Unavailable(String),
    #[error("address oracle timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("{0}")]
    Rejected(String),
}

/// Existence check exposed by a live transport session.
#[async_trait]
pub trait ExternalAddressOracle: Send + Sync {
    /// `Ok(None)` means the transport gave no answer for the address.
    async fn check_existence(&self, address: &str)
        -> Result<Option<AddressExistence>, OracleError>;
}

/// Creates a contact or refreshes the one already stored at `(tenant, number)`.
#[async_trait]
pub trait ContactUpsert: Send + Sync {
    async fn upsert(&self, contact: NewContact) -> Result<Contact, CollaboratorError>;
}

#[async_trait]
pub trait ContactUpdate: Send + Sync {
    async fn update(&self, contact: &Contact, patch: ContactPatch)
        -> Result<Contact, CollaboratorError>;
}

/// Ticket state machine entry point. Closing may notify agents, so calls are never batched.
#[async_trait]
pub trait TicketTransition: Send + Sync {
    async fn set_status(
        &self,
        ticket_id: TicketId,
        tenant_id: TenantId,
        status: TicketStatus,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait ProfilePictureSource: Send + Sync {
    async fn profile_picture_url(&self, address: &str) -> Result<Option<String>, CollaboratorError>;
}

/// Write-side collaborators backed directly by the directory.
#[derive(Clone)]
pub struct DirectoryCollaborators {
    directory: Arc<dyn ContactDirectory>,
}

impl DirectoryCollaborators {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self { directory }
    }

    async fn refresh_existing(
        &self,
        existing: Contact,
        profile_pic_url: Option<String>,
    ) -> Result<Contact, CollaboratorError> {
        self.update(&existing, ContactPatch::profile_picture(profile_pic_url))
            .await
    }
}

#[async_trait]
impl ContactUpsert for DirectoryCollaborators {
    async fn upsert(&self, contact: NewContact) -> Result<Contact, CollaboratorError> {
        if let Some(existing) = self
            .directory
            .find_contact_by_number(contact.tenant_id, &contact.number)
            .await?
        {
            return self.refresh_existing(existing, contact.profile_pic_url).await;
        }

        let tenant_id = contact.tenant_id;
        let number = contact.number.clone();
        let profile_pic_url = contact.profile_pic_url.clone();
        match self.directory.insert_contact(contact).await {
            Ok(created) => Ok(created),
            // Group upserts run outside the gate and can race each other.
            Err(DirectoryError::DuplicateNumber { .. }) => {
                let existing = self
                    .directory
                    .find_contact_by_number(tenant_id, &number)
                    .await?
                    .ok_or_else(|| {
                        CollaboratorError::Rejected(format!(
                            "contact '{number}' vanished during upsert"
                        ))
                    })?;
                self.refresh_existing(existing, profile_pic_url).await
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl ContactUpdate for DirectoryCollaborators {
    async fn update(
        &self,
        contact: &Contact,
        patch: ContactPatch,
    ) -> Result<Contact, CollaboratorError> {
        if patch.is_empty() {
            return Ok(contact.clone());
        }
        Ok(self
            .directory
            .update_contact(contact.tenant_id, contact.id, patch)
            .await?)
    }
}

#[async_trait]
impl TicketTransition for DirectoryCollaborators {
    async fn set_status(
        &self,
        ticket_id: TicketId,
        tenant_id: TenantId,
        status: TicketStatus,
    ) -> Result<(), CollaboratorError> {
        self.directory
            .set_ticket_status(tenant_id, ticket_id, status)
            .await?;
        Ok(())
    }
}
