//! Structured result of one resolution.

use ident_store::{Contact, ContactId};
use serde::Serialize;

use crate::merge_engine::MergeReport;

/// Which branch of the resolution procedure produced the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Group address routed straight to the upsert collaborator.
    Group,
    /// Linked-identifier address already stored verbatim.
    LinkedIdExact,
    /// Linked-identifier address found through the mapping table.
    LinkedIdMapped,
    /// Legacy row holding the bare identifier, renumbered to the full address.
    LinkedIdLegacy,
    /// Phone address already stored.
    PhoneKnown,
    /// Phone address adopting a contact previously stored under its linked identifier.
    PhoneAdoptedLinkedId,
    /// Nothing matched; the upsert collaborator created (or returned) the contact.
    Created,
}

/// Non-fatal problem that left the resolution complete but less informed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    OracleUnavailable { reason: String },
    /// The transport reported the phone address as unknown for an existing contact.
    AddressNotOnNetwork,
    /// The transport answered without a linked-identifier form.
    NoLinkedIdentifier { canonical_address: Option<String> },
    MappingWriteConflict { lid: String, reason: String },
    ProfilePictureUnavailable { reason: String },
}

impl Degradation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OracleUnavailable { .. } => "oracle_unavailable",
            Self::AddressNotOnNetwork => "address_not_on_network",
            Self::NoLinkedIdentifier { .. } => "no_linked_identifier",
            Self::MappingWriteConflict { .. } => "mapping_write_conflict",
            Self::ProfilePictureUnavailable { .. } => "profile_picture_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    pub contact: Contact,
    pub path: ResolutionPath,
    pub status: OutcomeStatus,
    pub degradations: Vec<Degradation>,
    pub merge: Option<MergeReport>,
    pub mapping_created: bool,
}

impl ResolutionOutcome {
    pub(crate) fn new(
        contact: Contact,
        path: ResolutionPath,
        degradations: Vec<Degradation>,
        merge: Option<MergeReport>,
        mapping_created: bool,
    ) -> Self {
        let status = if degradations.is_empty() {
            OutcomeStatus::Succeeded
        } else {
            OutcomeStatus::Degraded
        };
        Self {
            contact,
            path,
            status,
            degradations,
            merge,
            mapping_created,
        }
    }

    pub fn contact_id(&self) -> ContactId {
        self.contact.id
    }

    pub fn is_degraded(&self) -> bool {
        self.status == OutcomeStatus::Degraded
    }

    pub fn has_degradation(&self, kind: &str) -> bool {
        self.degradations
            .iter()
            .any(|degradation| degradation.kind() == kind)
    }
}
