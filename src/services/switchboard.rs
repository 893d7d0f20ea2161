//! Switchboard: normalizes inbound external events, deduplicates them,
//! resolves sender identity, and hands off to the Worker Spawner.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{Contact, InboxRecord, ResolvedIdentity};
use crate::domain::ports::{ContactChannelRepository, ContactRepository, InboxRepository, KvStore};
use crate::services::identity_resolver::IdentityResolver;
use crate::services::notifier::Notifier;

#[derive(Debug, Error)]
pub enum SwitchboardError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("no route configured for channel '{0}' role '{1}'")]
    NoRoute(String, String),
}

pub type SwitchboardResult<T> = Result<T, SwitchboardError>;

/// A normalized external event handed in from a connector.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel_type: String,
    pub channel_value: String,
    pub external_event_id: String,
    pub role: String,
    pub payload: Value,
}

/// What the Switchboard hands to the Worker Spawner once routed.
#[derive(Debug, Clone)]
pub struct RoutedTrigger {
    pub butler: String,
    pub identity_preamble: String,
    pub payload: Value,
    pub inbox_id: Uuid,
}

/// Deterministic idempotency key for an inbound event.
fn idempotency_key(channel_type: &str, channel_value: &str, external_event_id: &str) -> (String, String) {
    (channel_type.to_string(), format!("{channel_value}:{external_event_id}"))
}

pub struct Switchboard<C: ContactRepository, H: ContactChannelRepository> {
    inbox: Arc<dyn InboxRepository>,
    kv: Arc<dyn KvStore>,
    identity: IdentityResolver<C, H>,
    /// Static `(channel_type, role) -> butler` routing table from config.
    routes: HashMap<(String, String), String>,
    notifier: Arc<Notifier>,
}

impl<C: ContactRepository, H: ContactChannelRepository> Switchboard<C, H> {
    pub fn new(
        inbox: Arc<dyn InboxRepository>,
        kv: Arc<dyn KvStore>,
        identity: IdentityResolver<C, H>,
        routes: HashMap<(String, String), String>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self { inbox, kv, identity, routes, notifier }
    }

    fn identity_preamble(identity: &ResolvedIdentity, channel_type: &str) -> String {
        match identity {
            ResolvedIdentity::Owner(_) => format!("[Source: Owner, via {channel_type}]"),
            ResolvedIdentity::Known(contact) => {
                format!("[Source: {} (contact_id:{}), via {channel_type}]", contact.name, contact.contact_id)
            }
            ResolvedIdentity::Unresolvable => {
                format!("[Source: Unknown sender, via {channel_type} -- pending disambiguation]")
            }
        }
    }

    /// Route one inbound event. Returns `None` for a duplicate delivery
    /// (already-seen idempotency key) — the caller drops it silently.
    pub async fn route(&self, event: InboundEvent) -> SwitchboardResult<Option<RoutedTrigger>> {
        let (channel_type, message_key) =
            idempotency_key(&event.channel_type, &event.channel_value, &event.external_event_id);

        let record = InboxRecord::new(channel_type.clone(), message_key, event.payload.clone());
        let inbox_id = record.id;
        if !self.inbox.insert_if_absent(&record).await? {
            return Ok(None);
        }

        let identity = match self.identity.resolve(&event.channel_type, &event.channel_value, None).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, channel = %event.channel_type, "identity resolution failed, proceeding unresolved");
                ResolvedIdentity::Unresolvable
            }
        };

        if let ResolvedIdentity::Known(contact) | ResolvedIdentity::Owner(contact) = &identity {
            if !contact.is_owner() {
                self.maybe_notify_unknown_sender(contact, &event.channel_type, &event.channel_value).await?;
            }
        }

        let butler = self
            .routes
            .get(&(event.channel_type.clone(), event.role.clone()))
            .cloned()
            .ok_or_else(|| SwitchboardError::NoRoute(event.channel_type.clone(), event.role.clone()))?;

        let identity_preamble = Self::identity_preamble(&identity, &event.channel_type);

        Ok(Some(RoutedTrigger { butler, identity_preamble, payload: event.payload, inbox_id }))
    }

    /// One-shot notification on first contact from an unrecognized sender,
    /// gated on the KV flag `identity:unknown_notified:{type}:{value}`.
    async fn maybe_notify_unknown_sender(&self, contact: &Contact, channel_type: &str, channel_value: &str) -> SwitchboardResult<()> {
        let flag = format!("identity:unknown_notified:{channel_type}:{channel_value}");
        if self.kv.set_if_absent(&flag, "1").await? {
            self.notifier.notify_unknown_sender(&contact.name, channel_type, channel_value).await;
        }
        Ok(())
    }

    pub async fn link_session(&self, inbox_id: Uuid, session_id: Uuid) -> SwitchboardResult<()> {
        self.inbox.link_session(inbox_id, session_id).await?;
        Ok(())
    }
}
