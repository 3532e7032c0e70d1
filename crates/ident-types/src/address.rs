//! Transport address classification.
//!
//! The transport addresses one end-user either by phone (`5511999@s.whatsapp.net`)
//! or by an anonymized linked identifier (`abc123@lid`); groups carry their own
//! domain (`1203630@g.us`). Directory rows store phone contacts by bare number
//! and linked-identifier contacts by full address, while older rows may hold a
//! linked identifier without its domain. `strip_domain` is the single place that
//! defines the "domain-stripped" form used for those legacy matches.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GROUP_SUFFIX: &str = "@g.us";
pub const DEFAULT_LINKED_ID_SUFFIX: &str = "@lid";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("contact address cannot be empty")]
    Empty,
}

fn default_group_suffix() -> String {
    DEFAULT_GROUP_SUFFIX.to_string()
}

fn default_linked_id_suffix() -> String {
    DEFAULT_LINKED_ID_SUFFIX.to_string()
}

/// Domain suffixes that distinguish group and linked-identifier addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDomains {
    #[serde(default = "default_group_suffix")]
    pub group_suffix: String,
    #[serde(default = "default_linked_id_suffix")]
    pub linked_id_suffix: String,
}

impl Default for AddressDomains {
    fn default() -> Self {
        Self {
            group_suffix: default_group_suffix(),
            linked_id_suffix: default_linked_id_suffix(),
        }
    }
}

impl AddressDomains {
    pub fn is_group(&self, address: &str) -> bool {
        address.ends_with(self.group_suffix.as_str())
    }

    pub fn is_linked_id(&self, address: &str) -> bool {
        address.ends_with(self.linked_id_suffix.as_str())
    }
}

/// Returns the text before the first `@`, or the whole address when it has no domain.
pub fn strip_domain(address: &str) -> &str {
    match address.split_once('@') {
        Some((local, _)) => local,
        None => address,
    }
}

/// Display name used when an inbound reference carries none: the address digits.
pub fn default_display_name(address: &str) -> String {
    address.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactAddress {
    Group { address: String },
    LinkedId { address: String, identifier: String },
    Phone { address: String, number: String },
}

impl ContactAddress {
    /// Classifies a raw transport address. Group suffixes win over linked-identifier ones.
    pub fn classify(raw: &str, domains: &AddressDomains) -> Result<Self, AddressError> {
        let address = raw.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }

        let classified = if domains.is_group(address) {
            Self::Group {
                address: address.to_string(),
            }
        } else if domains.is_linked_id(address) {
            Self::LinkedId {
                address: address.to_string(),
                identifier: strip_domain(address).to_string(),
            }
        } else {
            Self::Phone {
                address: address.to_string(),
                number: strip_domain(address).to_string(),
            }
        };
        Ok(classified)
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Group { address }
            | Self::LinkedId { address, .. }
            | Self::Phone { address, .. } => address,
        }
    }

    /// Value stored in `Contact::number` for a contact created from this address.
    pub fn lookup_number(&self) -> &str {
        match self {
            Self::Group { address } | Self::LinkedId { address, .. } => address,
            Self::Phone { number, .. } => number,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Group { .. } => "group",
            Self::LinkedId { .. } => "linked_id",
            Self::Phone { .. } => "phone",
        }
    }
}
