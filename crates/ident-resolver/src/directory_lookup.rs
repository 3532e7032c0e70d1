//! Read-side queries used by the resolution procedure.
//!
//! Each method names the rows it reads; nothing is joined implicitly.

use std::sync::Arc;

use ident_store::{Contact, ContactDirectory, ContactId, LinkedIdMapping, TenantId};
use ident_types::strip_domain;

use crate::mapping_store::MappingStore;
use crate::{ResolveError, ResolveResult};

/// Contact reads go to the directory; mapping reads go through [`MappingStore`].
#[derive(Clone)]
pub struct DirectoryLookup {
    directory: Arc<dyn ContactDirectory>,
    mappings: MappingStore,
}

impl DirectoryLookup {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            mappings: MappingStore::new(directory.clone()),
            directory,
        }
    }

    /// Contact stored at exactly `number`.
    pub async fn contact_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> ResolveResult<Option<Contact>> {
        Ok(self
            .directory
            .find_contact_by_number(tenant_id, number)
            .await?)
    }

    pub async fn mapping_for_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> ResolveResult<Option<LinkedIdMapping>> {
        Ok(self.mappings.find_by_contact(tenant_id, contact_id).await?)
    }

    /// Contact reached through the mapping table for the bare identifier `lid`.
    ///
    /// A mapping that points at a missing contact is a broken invariant, not a miss.
    pub async fn contact_by_mapped_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> ResolveResult<Option<Contact>> {
        let Some(mapping) = self.mappings.find_by_lid(tenant_id, lid).await? else {
            return Ok(None);
        };
        match self
            .directory
            .get_contact(tenant_id, mapping.contact_id)
            .await?
        {
            Some(contact) => Ok(Some(contact)),
            None => Err(ResolveError::DataIntegrity {
                tenant_id,
                lid: mapping.lid,
                contact_id: mapping.contact_id,
            }),
        }
    }

    /// Contact whose number is the linked-identifier address in full or domain-stripped form.
    pub async fn contact_by_lid_forms(
        &self,
        tenant_id: TenantId,
        lid_address: &str,
        exclude: Option<ContactId>,
    ) -> ResolveResult<Option<Contact>> {
        let candidates = lid_number_forms(lid_address);
        Ok(self
            .directory
            .find_contact_by_any_number(tenant_id, &candidates, exclude)
            .await?)
    }
}

/// Full address first, then the stripped legacy form when it differs and is non-empty.
pub(crate) fn lid_number_forms(lid_address: &str) -> Vec<String> {
    let mut forms = vec![lid_address.to_string()];
    let stripped = strip_domain(lid_address);
    if !stripped.is_empty() && stripped != lid_address {
        forms.push(stripped.to_string());
    }
    forms
}
