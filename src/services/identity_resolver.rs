//! Resolves `(channel_type, channel_value)` pairs to contacts, bootstraps
//! the singleton Owner, and mints temporary contacts for unknown senders.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Contact, ContactChannel, ResolvedIdentity};
use crate::domain::ports::{ContactChannelRepository, ContactRepository};

pub struct IdentityResolver<C: ContactRepository, H: ContactChannelRepository> {
    contacts: Arc<C>,
    channels: Arc<H>,
}

impl<C: ContactRepository, H: ContactChannelRepository> IdentityResolver<C, H> {
    pub fn new(contacts: Arc<C>, channels: Arc<H>) -> Self {
        Self { contacts, channels }
    }

    /// Create the Owner contact if no contact carries the `owner` role yet.
    /// Idempotent: a second call against an already-bootstrapped database
    /// is a no-op that returns the existing owner.
    pub async fn bootstrap_owner(&self, name: impl Into<String>) -> DomainResult<Contact> {
        if let Some(owner) = self.contacts.get_owner().await? {
            return Ok(owner);
        }
        let owner = Contact::new_owner(name);
        self.contacts.create(&owner).await?;
        Ok(owner)
    }

    /// Bind a channel to the owner contact, e.g. the operator's primary
    /// Telegram chat ID declared in configuration.
    pub async fn bind_owner_channel(
        &self,
        owner_id: uuid::Uuid,
        channel_type: impl Into<String>,
        channel_value: impl Into<String>,
    ) -> DomainResult<()> {
        let channel = ContactChannel::new(owner_id, channel_type, channel_value);
        self.channels.create_if_absent(&channel).await?;
        Ok(())
    }

    /// Resolve a channel identity. Unknown senders get a role-less temp
    /// contact minted atomically — a race against a concurrent resolve of
    /// the same channel value converges on the winning row via the
    /// channel table's unique key, read back on conflict.
    pub async fn resolve(
        &self,
        channel_type: &str,
        channel_value: &str,
        temp_name_hint: Option<&str>,
    ) -> DomainResult<ResolvedIdentity> {
        if let Some(existing) = self.channels.find_by_channel(channel_type, channel_value).await? {
            let Some(contact) = self.contacts.get(existing.contact_id).await? else {
                return Ok(ResolvedIdentity::Unresolvable);
            };
            return Ok(if contact.is_owner() { ResolvedIdentity::Owner(contact) } else { ResolvedIdentity::Known(contact) });
        }

        let temp = Contact::new_temp(temp_name_hint.unwrap_or("Unknown sender"));
        self.contacts.create(&temp).await?;
        let channel = ContactChannel::new(temp.contact_id, channel_type, channel_value);
        if self.channels.create_if_absent(&channel).await? {
            return Ok(ResolvedIdentity::Known(temp));
        }

        // Lost the race: someone else's binding won. Re-read it.
        match self.channels.find_by_channel(channel_type, channel_value).await? {
            Some(winner) => match self.contacts.get(winner.contact_id).await? {
                Some(contact) if contact.is_owner() => Ok(ResolvedIdentity::Owner(contact)),
                Some(contact) => Ok(ResolvedIdentity::Known(contact)),
                None => Ok(ResolvedIdentity::Unresolvable),
            },
            None => Ok(ResolvedIdentity::Unresolvable),
        }
    }
}
