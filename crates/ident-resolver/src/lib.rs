//! Inbound contact identity resolution.
//!
//! Maps a transport address (phone, linked identifier, or group) to exactly one
//! canonical directory contact per tenant, merging duplicates that appear when
//! the same end-user shows up under both address forms.
//!
//! ```rust,no_run
//! # async fn demo(oracle: &dyn ident_resolver::ExternalAddressOracle) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use ident_resolver::{IdentityResolver, InboundReference, ResolverConfig};
//! use ident_store::{InMemoryContactDirectory, TenantId};
//!
//! let resolver = IdentityResolver::new(
//!     Arc::new(InMemoryContactDirectory::new()),
//!     ResolverConfig::default(),
//! );
//! let outcome = resolver
//!     .resolve(&InboundReference::new("5511999@s.whatsapp.net"), oracle, TenantId(1))
//!     .await?;
//! assert_eq!(outcome.contact.number, "5511999");
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod collaborators;
pub mod concurrency_gate;
pub mod config;
pub mod directory_lookup;
pub mod identity_resolver;
pub mod mapping_store;
pub mod merge_engine;
pub mod outcome;
#[cfg(test)]
mod test_support;

pub use collaborators::{
    AddressExistence, CollaboratorError, ContactUpdate, ContactUpsert, DirectoryCollaborators,
    ExternalAddressOracle, OracleError, ProfilePictureSource, TicketTransition,
};
pub use concurrency_gate::{ConcurrencyGate, GatePermit, GateScope};
pub use config::{load_resolver_config, ResolverConfig, RESOLVER_CONFIG_SCHEMA_VERSION};
pub use directory_lookup::DirectoryLookup;
pub use identity_resolver::{IdentityResolver, InboundReference};
pub use mapping_store::{MappingStore, MappingWrite};
pub use merge_engine::{MergeEngine, MergeReport, MergeStep};
pub use outcome::{Degradation, OutcomeStatus, ResolutionOutcome, ResolutionPath};

use ident_store::{ContactId, DirectoryError, TenantId};
use ident_types::AddressError;

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that abort a resolution. Oracle and mapping-write failures never surface here.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid inbound address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("linked identifier '{lid}' in tenant {tenant_id} maps to missing contact {contact_id}")]
    DataIntegrity {
        tenant_id: TenantId,
        lid: String,
        contact_id: ContactId,
    },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: CollaboratorError,
    },
    #[error("merge into contact {winner_id} failed at {step}: {source}")]
    Merge {
        winner_id: ContactId,
        step: MergeStep,
        #[source]
        source: CollaboratorError,
    },
}
