//! Linked-identifier mapping table access.

use std::sync::Arc;

use ident_store::{ContactDirectory, ContactId, LinkedIdMapping, StoreResult, TenantId};
use serde::Serialize;

/// Result of a best-effort mapping insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MappingWrite {
    Created { mapping: LinkedIdMapping },
    /// The contact disappeared (e.g. merged away) between lookup and write.
    ContactMissing,
    Rejected { reason: String },
}

impl MappingWrite {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Created { .. } => None,
            Self::ContactMissing => Some("target contact no longer exists".to_string()),
            Self::Rejected { reason } => Some(reason.clone()),
        }
    }
}

#[derive(Clone)]
pub struct MappingStore {
    directory: Arc<dyn ContactDirectory>,
}

impl MappingStore {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self { directory }
    }

    pub async fn find_by_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        self.directory.find_mapping_by_lid(tenant_id, lid).await
    }

    pub async fn find_by_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        self.directory
            .find_mapping_by_contact(tenant_id, contact_id)
            .await
    }

    /// Inserts `(tenant, lid) -> contact` after confirming the contact still exists.
    ///
    /// Never fails: a missed mapping only sends later resolutions down slower lookup paths.
    #[tracing::instrument(
        name = "ident.mapping.create_safely",
        skip(self),
        fields(tenant = %tenant_id, contact = %contact_id)
    )]
    pub async fn create_safely(
        &self,
        tenant_id: TenantId,
        lid: &str,
        contact_id: ContactId,
    ) -> MappingWrite {
        match self.directory.get_contact(tenant_id, contact_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!("skipping linked-identifier mapping for missing contact");
                return MappingWrite::ContactMissing;
            }
            Err(error) => {
                tracing::warn!(%error, "could not verify contact before mapping insert");
                return MappingWrite::Rejected {
                    reason: error.to_string(),
                };
            }
        }

        match self
            .directory
            .insert_mapping(tenant_id, lid, contact_id)
            .await
        {
            Ok(mapping) => {
                tracing::debug!(mapping_id = mapping.id, "created linked-identifier mapping");
                MappingWrite::Created { mapping }
            }
            Err(error) => {
                tracing::warn!(%error, "linked-identifier mapping insert failed");
                MappingWrite::Rejected {
                    reason: error.to_string(),
                }
            }
        }
    }
}
