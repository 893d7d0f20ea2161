//! Integration tests for identity resolution and the switchboard's
//! dedup/routing behavior.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use butler::adapters::sqlite::{
    create_migrated_test_pool, SqliteContactChannelRepository, SqliteContactRepository,
    SqliteInboxRepository, SqliteKvStore,
};
use butler::services::{IdentityResolver, InboundEvent, NotificationChannel, Notifier, Switchboard};

struct NullChannel;

#[async_trait::async_trait]
impl NotificationChannel for NullChannel {
    async fn send(&self, _text: &str) -> butler::domain::errors::DomainResult<()> {
        Ok(())
    }
}

async fn identity_resolver() -> (IdentityResolver<SqliteContactRepository, SqliteContactChannelRepository>, sqlx::SqlitePool) {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
    let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
    (IdentityResolver::new(contacts, channels), pool)
}

#[tokio::test]
async fn bootstrap_owner_is_idempotent() {
    let (identity, _pool) = identity_resolver().await;
    let owner1 = identity.bootstrap_owner("Operator").await.unwrap();
    let owner2 = identity.bootstrap_owner("Operator").await.unwrap();
    assert_eq!(owner1.contact_id, owner2.contact_id);
}

#[tokio::test]
async fn unknown_sender_resolves_to_a_new_temp_contact_then_reresolves_to_it() {
    let (identity, _pool) = identity_resolver().await;
    let first = identity.resolve("telegram", "12345", Some("A. Stranger")).await.unwrap();
    assert!(!first.is_owner());
    let contact = first.contact().expect("temp contact created");

    let second = identity.resolve("telegram", "12345", None).await.unwrap();
    assert_eq!(second.contact().unwrap().contact_id, contact.contact_id);
}

#[tokio::test]
async fn switchboard_dedupes_same_external_event_id() {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
    let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
    let inbox = Arc::new(SqliteInboxRepository::new(pool.clone()));
    let kv = Arc::new(SqliteKvStore::new(pool.clone()));

    let identity = IdentityResolver::new(contacts, channels);
    let owner = identity.bootstrap_owner("Operator").await.unwrap();
    identity.bind_owner_channel(owner.contact_id, "telegram", "owner-chat").await.unwrap();

    let channel: Arc<dyn NotificationChannel> = Arc::new(NullChannel);
    let notifier = Arc::new(Notifier::new(channel, 5));

    let mut routes = HashMap::new();
    routes.insert(("telegram".to_string(), "primary".to_string()), "my-butler".to_string());

    let switchboard = Switchboard::new(inbox, kv, identity, routes, notifier);

    let event = InboundEvent {
        channel_type: "telegram".to_string(),
        channel_value: "owner-chat".to_string(),
        external_event_id: "evt-1".to_string(),
        role: "primary".to_string(),
        payload: json!({"text": "hello"}),
    };

    let routed = switchboard.route(event.clone()).await.unwrap();
    assert!(routed.is_some());
    assert_eq!(routed.unwrap().butler, "my-butler");

    // Exact same external_event_id delivered twice (e.g. a connector retry)
    // must be dropped silently, not routed a second time.
    let duplicate = switchboard.route(event).await.unwrap();
    assert!(duplicate.is_none());
}

#[tokio::test]
async fn switchboard_errors_on_unrouted_channel_role() {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
    let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
    let inbox = Arc::new(SqliteInboxRepository::new(pool.clone()));
    let kv = Arc::new(SqliteKvStore::new(pool.clone()));

    let identity = IdentityResolver::new(contacts, channels);
    let channel: Arc<dyn NotificationChannel> = Arc::new(NullChannel);
    let notifier = Arc::new(Notifier::new(channel, 5));

    // No routes configured at all.
    let switchboard = Switchboard::new(inbox, kv, identity, HashMap::new(), notifier);

    let event = InboundEvent {
        channel_type: "slack".to_string(),
        channel_value: "C123".to_string(),
        external_event_id: "evt-9".to_string(),
        role: "primary".to_string(),
        payload: json!({"text": "hi"}),
    };

    let err = switchboard.route(event).await.unwrap_err();
    assert!(matches!(err, butler::services::SwitchboardError::NoRoute(_, _)));
}
