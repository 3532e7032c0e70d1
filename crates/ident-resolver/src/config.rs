//! Resolver configuration file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ident_types::AddressDomains;
use serde::{Deserialize, Serialize};

use crate::concurrency_gate::GateScope;

pub const RESOLVER_CONFIG_SCHEMA_VERSION: u32 = 1;

fn resolver_config_schema_version() -> u32 {
    RESOLVER_CONFIG_SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "resolver_config_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub address_domains: AddressDomains,
    #[serde(default)]
    pub gate_scope: GateScope,
    /// Picture stored when the profile picture source fails or has nothing.
    #[serde(default)]
    pub fallback_profile_picture_url: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            schema_version: RESOLVER_CONFIG_SCHEMA_VERSION,
            address_domains: AddressDomains::default(),
            gate_scope: GateScope::default(),
            fallback_profile_picture_url: None,
        }
    }
}

/// Loads the resolver config, falling back to defaults when `path` does not exist.
pub fn load_resolver_config(path: &Path) -> Result<ResolverConfig> {
    if !path.exists() {
        return Ok(ResolverConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read resolver config {}", path.display()))?;
    let config = serde_json::from_str::<ResolverConfig>(&raw)
        .with_context(|| format!("failed to parse resolver config {}", path.display()))?;
    if config.schema_version != RESOLVER_CONFIG_SCHEMA_VERSION {
        bail!(
            "unsupported resolver config schema_version {} in {} (expected {})",
            config.schema_version,
            path.display(),
            RESOLVER_CONFIG_SCHEMA_VERSION
        );
    }
    if config.address_domains.group_suffix.trim().is_empty()
        || config.address_domains.linked_id_suffix.trim().is_empty()
    {
        bail!(
            "resolver config {} must define non-empty address domain suffixes",
            path.display()
        );
    }
    Ok(config)
}
