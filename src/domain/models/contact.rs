//! Contact and ContactChannel domain models.
//!
//! A Contact is a principal known to a single butler instance. Exactly one
//! contact carries the `owner` role at all times after bootstrap; every
//! other contact is a known correspondent or a role-less temporary contact
//! created on first unknown-sender contact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// Sentinel role borne by exactly one contact in the database.
pub const OWNER_ROLE: &str = "owner";

/// A principal known to this butler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub contact_id: Uuid,
    pub name: String,
    /// Free-form tags; contains at most one instance of [`OWNER_ROLE`].
    pub roles: HashSet<String>,
    /// Soft reference to a memory-module entity. Cross-schema, null-tolerant.
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new_owner(name: impl Into<String>) -> Self {
        let mut roles = HashSet::new();
        roles.insert(OWNER_ROLE.to_string());
        Self {
            contact_id: Uuid::new_v4(),
            name: name.into(),
            roles,
            entity_id: None,
            metadata: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    /// A role-less contact created for an unknown sender pending disambiguation.
    pub fn new_temp(name: impl Into<String>) -> Self {
        Self {
            contact_id: Uuid::new_v4(),
            name: name.into(),
            roles: HashSet::new(),
            entity_id: None,
            metadata: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.roles.contains(OWNER_ROLE)
    }
}

/// A `(channel_type, channel_value)` binding for a contact.
///
/// `(channel_type, channel_value)` is globally unique across the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactChannel {
    pub contact_id: Uuid,
    pub channel_type: String,
    pub channel_value: String,
    pub is_primary: bool,
    /// Marks credential material (e.g. bot tokens). Excluded from default read paths.
    pub secured_flag: bool,
    pub created_at: DateTime<Utc>,
}

impl ContactChannel {
    pub fn new(contact_id: Uuid, channel_type: impl Into<String>, channel_value: impl Into<String>) -> Self {
        Self {
            contact_id,
            channel_type: channel_type.into(),
            channel_value: channel_value.into(),
            is_primary: true,
            secured_flag: false,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of resolving a `(channel_type, channel_value)` pair to a contact.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedIdentity {
    Owner(Contact),
    Known(Contact),
    Unresolvable,
}

impl ResolvedIdentity {
    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Self::Owner(c) | Self::Known(c) => Some(c),
            Self::Unresolvable => None,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner(_))
    }
}
