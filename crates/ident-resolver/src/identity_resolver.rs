//! Resolution of an inbound address to its canonical contact.
//!
//! Group addresses go straight to the upsert collaborator. Every other address
//! is resolved inside the concurrency gate, so lookups, oracle calls, merges,
//! mapping writes and creation for one tenant never interleave.
//!
//! Linked-identifier addresses prefer, in order: a contact stored at the full
//! address, the mapping table, a legacy contact stored at the bare identifier,
//! and only then creation. Phone addresses prefer adopting or merging a contact
//! stored under their linked identifier over creating a second contact.

use std::sync::Arc;

use ident_store::{Contact, ContactDirectory, ContactPatch, NewContact, TenantId};
use ident_types::{default_display_name, strip_domain, ContactAddress};
use serde::{Deserialize, Serialize};

use crate::collaborators::{
    ContactUpdate, ContactUpsert, DirectoryCollaborators, ExternalAddressOracle,
    ProfilePictureSource, TicketTransition,
};
use crate::concurrency_gate::{ConcurrencyGate, GatePermit};
use crate::config::ResolverConfig;
use crate::directory_lookup::DirectoryLookup;
use crate::mapping_store::{MappingStore, MappingWrite};
use crate::merge_engine::{MergeEngine, MergeReport};
use crate::outcome::{Degradation, ResolutionOutcome, ResolutionPath};
use crate::{ResolveError, ResolveResult};

/// Contact reference carried by an inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundReference {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl InboundReference {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    fn contact_name(&self) -> String {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_display_name(&self.address))
    }
}

enum OracleVerdict {
    /// Exists, with this full linked-identifier address.
    Linked(String),
    NotOnNetwork,
    NoLinkedForm(Option<String>),
    Unavailable(String),
}

#[derive(Default)]
struct ResolutionTrace {
    degradations: Vec<Degradation>,
    merge: Option<MergeReport>,
    mapping_created: bool,
}

impl ResolutionTrace {
    fn degrade(&mut self, degradation: Degradation) {
        self.degradations.push(degradation);
    }

    fn record_verdict(&mut self, verdict: OracleVerdict) {
        match verdict {
            OracleVerdict::Linked(_) => {}
            OracleVerdict::NotOnNetwork => self.degrade(Degradation::AddressNotOnNetwork),
            OracleVerdict::NoLinkedForm(canonical_address) => {
                self.degrade(Degradation::NoLinkedIdentifier { canonical_address })
            }
            OracleVerdict::Unavailable(reason) => {
                self.degrade(Degradation::OracleUnavailable { reason })
            }
        }
    }

    fn record_mapping(&mut self, lid: &str, write: MappingWrite) {
        match write.failure_reason() {
            None => self.mapping_created = true,
            Some(reason) => self.degrade(Degradation::MappingWriteConflict {
                lid: lid.to_string(),
                reason,
            }),
        }
    }

    fn finish(self, contact: Contact, path: ResolutionPath) -> ResolutionOutcome {
        ResolutionOutcome::new(
            contact,
            path,
            self.degradations,
            self.merge,
            self.mapping_created,
        )
    }
}

pub struct IdentityResolver {
    config: ResolverConfig,
    directory: Arc<dyn ContactDirectory>,
    lookup: DirectoryLookup,
    mappings: MappingStore,
    merges: MergeEngine,
    gate: ConcurrencyGate,
    upsert: Arc<dyn ContactUpsert>,
    update: Arc<dyn ContactUpdate>,
    pictures: Option<Arc<dyn ProfilePictureSource>>,
}

impl IdentityResolver {
    /// Builds a resolver whose write-side collaborators act directly on `directory`.
    pub fn new(directory: Arc<dyn ContactDirectory>, config: ResolverConfig) -> Self {
        let collaborators = Arc::new(DirectoryCollaborators::new(directory.clone()));
        Self {
            gate: ConcurrencyGate::new(config.gate_scope),
            lookup: DirectoryLookup::new(directory.clone()),
            mappings: MappingStore::new(directory.clone()),
            merges: MergeEngine::new(directory.clone(), collaborators.clone()),
            upsert: collaborators.clone(),
            update: collaborators,
            pictures: None,
            directory,
            config,
        }
    }

    pub fn with_contact_upsert(mut self, upsert: Arc<dyn ContactUpsert>) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_contact_update(mut self, update: Arc<dyn ContactUpdate>) -> Self {
        self.update = update;
        self
    }

    pub fn with_ticket_transition(mut self, tickets: Arc<dyn TicketTransition>) -> Self {
        self.merges = MergeEngine::new(self.directory.clone(), tickets);
        self
    }

    pub fn with_profile_pictures(mut self, pictures: Arc<dyn ProfilePictureSource>) -> Self {
        self.pictures = Some(pictures);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `reference` to the tenant's canonical contact, creating it when needed.
    ///
    /// Oracle, mapping-write and profile-picture failures are reported as
    /// degradations on the outcome. Directory, collaborator and merge failures
    /// abort with an error.
    #[tracing::instrument(
        name = "ident.resolve",
        skip(self, reference, oracle),
        fields(tenant = %tenant_id, address = %reference.address)
    )]
    pub async fn resolve(
        &self,
        reference: &InboundReference,
        oracle: &dyn ExternalAddressOracle,
        tenant_id: TenantId,
    ) -> ResolveResult<ResolutionOutcome> {
        let result = self.resolve_reference(reference, oracle, tenant_id).await;
        match &result {
            Ok(outcome) => tracing::info!(
                contact = %outcome.contact.id,
                path = ?outcome.path,
                status = ?outcome.status,
                degradations = outcome.degradations.len(),
                merged = outcome.merge.is_some(),
                mapping_created = outcome.mapping_created,
                "contact identity resolved"
            ),
            Err(error) => tracing::error!(%error, "contact identity resolution failed"),
        }
        result
    }

    async fn resolve_reference(
        &self,
        reference: &InboundReference,
        oracle: &dyn ExternalAddressOracle,
        tenant_id: TenantId,
    ) -> ResolveResult<ResolutionOutcome> {
        let address = ContactAddress::classify(&reference.address, &self.config.address_domains)?;
        let mut trace = ResolutionTrace::default();
        let profile_pic_url = self.profile_picture(address.address(), &mut trace).await;
        let mut draft = NewContact::new(
            tenant_id,
            reference.contact_name(),
            address.lookup_number(),
        )
        .with_profile_pic_url(profile_pic_url);

        match &address {
            ContactAddress::Group { .. } => {
                draft = draft.group();
                let contact = self.create(draft).await?;
                Ok(trace.finish(contact, ResolutionPath::Group))
            }
            ContactAddress::LinkedId { identifier, .. } => {
                let (_permit, found) = self.enter_and_lookup(tenant_id, &draft.number).await?;
                self.resolve_linked_id(draft, identifier, found, trace).await
            }
            ContactAddress::Phone { address, .. } => {
                let (_permit, found) = self.enter_and_lookup(tenant_id, &draft.number).await?;
                match found {
                    Some(contact) => {
                        self.resolve_known_phone(contact, address, &draft, oracle, trace)
                            .await
                    }
                    None => {
                        self.resolve_unknown_phone(draft, address, oracle, trace)
                            .await
                    }
                }
            }
        }
    }

    async fn enter_and_lookup(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> ResolveResult<(GatePermit, Option<Contact>)> {
        let permit = self.gate.enter(tenant_id).await;
        let found = self.lookup.contact_by_number(tenant_id, number).await?;
        Ok((permit, found))
    }

    async fn resolve_linked_id(
        &self,
        draft: NewContact,
        identifier: &str,
        found: Option<Contact>,
        trace: ResolutionTrace,
    ) -> ResolveResult<ResolutionOutcome> {
        let picture = ContactPatch::profile_picture(draft.profile_pic_url.clone());

        if let Some(contact) = found {
            tracing::debug!(contact = %contact.id, "linked identifier stored verbatim");
            let contact = self.apply(&contact, picture).await?;
            return Ok(trace.finish(contact, ResolutionPath::LinkedIdExact));
        }

        if let Some(contact) = self
            .lookup
            .contact_by_mapped_lid(draft.tenant_id, identifier)
            .await?
        {
            tracing::debug!(contact = %contact.id, "linked identifier found in mapping table");
            let contact = self.apply(&contact, picture).await?;
            return Ok(trace.finish(contact, ResolutionPath::LinkedIdMapped));
        }

        if !identifier.is_empty() {
            if let Some(contact) = self
                .lookup
                .contact_by_number(draft.tenant_id, identifier)
                .await?
            {
                tracing::debug!(
                    contact = %contact.id,
                    "renumbering legacy linked-identifier contact"
                );
                let contact = self
                    .apply(&contact, picture.with_number(draft.number.clone()))
                    .await?;
                return Ok(trace.finish(contact, ResolutionPath::LinkedIdLegacy));
            }
        }

        let contact = self.create(draft).await?;
        Ok(trace.finish(contact, ResolutionPath::Created))
    }

    async fn resolve_known_phone(
        &self,
        found: Contact,
        phone_address: &str,
        draft: &NewContact,
        oracle: &dyn ExternalAddressOracle,
        mut trace: ResolutionTrace,
    ) -> ResolveResult<ResolutionOutcome> {
        let mapping = self
            .lookup
            .mapping_for_contact(found.tenant_id, found.id)
            .await?;
        if mapping.is_none() {
            match self.consult_oracle(oracle, phone_address).await {
                OracleVerdict::Linked(lid_address) => {
                    trace.merge = self.merges.dedup_and_consolidate(&found, &lid_address).await?;
                    let lid = strip_domain(&lid_address);
                    let write = self
                        .mappings
                        .create_safely(found.tenant_id, lid, found.id)
                        .await;
                    trace.record_mapping(lid, write);
                }
                verdict => trace.record_verdict(verdict),
            }
        }

        let contact = self
            .apply(
                &found,
                ContactPatch::profile_picture(draft.profile_pic_url.clone()),
            )
            .await?;
        Ok(trace.finish(contact, ResolutionPath::PhoneKnown))
    }

    async fn resolve_unknown_phone(
        &self,
        draft: NewContact,
        phone_address: &str,
        oracle: &dyn ExternalAddressOracle,
        mut trace: ResolutionTrace,
    ) -> ResolveResult<ResolutionOutcome> {
        match self.consult_oracle(oracle, phone_address).await {
            OracleVerdict::NotOnNetwork => {
                tracing::debug!("address unknown to transport, creating contact");
            }
            OracleVerdict::Linked(lid_address) => {
                if let Some(lid_contact) = self
                    .lookup
                    .contact_by_lid_forms(draft.tenant_id, &lid_address, None)
                    .await?
                {
                    tracing::debug!(
                        contact = %lid_contact.id,
                        "phone address adopts contact stored under its linked identifier"
                    );
                    let lid = strip_domain(&lid_address);
                    let write = self
                        .mappings
                        .create_safely(draft.tenant_id, lid, lid_contact.id)
                        .await;
                    trace.record_mapping(lid, write);
                    let patch = ContactPatch::profile_picture(draft.profile_pic_url.clone())
                        .with_number(draft.number.clone());
                    let contact = self.apply(&lid_contact, patch).await?;
                    return Ok(trace.finish(contact, ResolutionPath::PhoneAdoptedLinkedId));
                }
            }
            verdict => trace.record_verdict(verdict),
        }

        let contact = self.create(draft).await?;
        Ok(trace.finish(contact, ResolutionPath::Created))
    }

    async fn consult_oracle(
        &self,
        oracle: &dyn ExternalAddressOracle,
        address: &str,
    ) -> OracleVerdict {
        match oracle.check_existence(address).await {
            Err(error) => {
                tracing::warn!(%error, "address oracle failed, continuing without mapping");
                OracleVerdict::Unavailable(error.to_string())
            }
            Ok(None) => {
                tracing::warn!("address oracle returned no result, continuing without mapping");
                OracleVerdict::Unavailable("oracle returned no result".to_string())
            }
            Ok(Some(answer)) if !answer.exists => OracleVerdict::NotOnNetwork,
            Ok(Some(answer)) => match answer.canonical_address {
                Some(canonical) if self.config.address_domains.is_linked_id(&canonical) => {
                    OracleVerdict::Linked(canonical)
                }
                canonical => OracleVerdict::NoLinkedForm(canonical),
            },
        }
    }

    async fn profile_picture(&self, address: &str, trace: &mut ResolutionTrace) -> Option<String> {
        let fallback = self.config.fallback_profile_picture_url.clone();
        let Some(source) = &self.pictures else {
            return fallback;
        };
        match source.profile_picture_url(address).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => fallback,
            Err(error) => {
                tracing::warn!(%error, "profile picture lookup failed, using fallback");
                trace.degrade(Degradation::ProfilePictureUnavailable {
                    reason: error.to_string(),
                });
                fallback
            }
        }
    }

    async fn apply(&self, contact: &Contact, patch: ContactPatch) -> ResolveResult<Contact> {
        self.update
            .update(contact, patch)
            .await
            .map_err(|source| ResolveError::Collaborator {
                operation: "contact update",
                source,
            })
    }

    async fn create(&self, draft: NewContact) -> ResolveResult<Contact> {
        self.upsert
            .upsert(draft)
            .await
            .map_err(|source| ResolveError::Collaborator {
                operation: "contact upsert",
                source,
            })
    }
}
