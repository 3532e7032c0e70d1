//! Shared data types for contact identity resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod address;

pub use address::{
    default_display_name, strip_domain, AddressDomains, AddressError, ContactAddress,
};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

row_id!(
    /// Isolation boundary (organization) that scopes every directory row.
    TenantId
);
row_id!(ContactId);
row_id!(MessageId);
row_id!(TicketId);

/// Canonical directory record for an addressable entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub tenant_id: TenantId,
    pub name: String,
    pub number: String,
    pub is_group: bool,
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extra_info: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized attribute set used to create or upsert a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub tenant_id: TenantId,
    pub name: String,
    pub number: String,
    pub is_group: bool,
    pub profile_pic_url: Option<String>,
}

impl NewContact {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            number: number.into(),
            is_group: false,
            profile_pic_url: None,
        }
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn with_profile_pic_url(mut self, url: Option<String>) -> Self {
        self.profile_pic_url = url;
        self
    }
}

/// Partial contact update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub number: Option<String>,
    pub profile_pic_url: Option<String>,
}

impl ContactPatch {
    pub fn profile_picture(url: Option<String>) -> Self {
        Self {
            profile_pic_url: url,
            ..Self::default()
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.number.is_none() && self.profile_pic_url.is_none()
    }

    /// Applies the patch in place and reports whether anything changed.
    pub fn apply_to(&self, contact: &mut Contact) -> bool {
        let mut changed = false;
        if let Some(name) = &self.name {
            changed |= contact.name != *name;
            contact.name = name.clone();
        }
        if let Some(number) = &self.number {
            changed |= contact.number != *number;
            contact.number = number.clone();
        }
        if let Some(url) = &self.profile_pic_url {
            changed |= contact.profile_pic_url.as_deref() != Some(url.as_str());
            contact.profile_pic_url = Some(url.clone());
        }
        changed
    }
}

/// Association from a tenant-scoped linked identifier to its canonical contact.
///
/// `lid` holds the bare identifier, without the transport domain suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdMapping {
    pub id: i64,
    pub tenant_id: TenantId,
    pub lid: String,
    pub contact_id: ContactId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket lifecycle state. Everything except `Closed` counts as open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    Pending,
    Closed,
}

impl TicketStatus {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(Self::Open),
            "pending" => Some(Self::Pending),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
