//! SQLite adapters for ContactRepository and ContactChannelRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Contact, ContactChannel, OWNER_ROLE};
use crate::domain::ports::contact_repository::{ContactChannelRepository, ContactRepository};

#[derive(Clone)]
pub struct SqliteContactRepository {
    pool: SqlitePool,
}

impl SqliteContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    contact_id: String,
    name: String,
    roles: String,
    entity_id: Option<String>,
    metadata: String,
    created_at: String,
}

fn row_to_contact(row: ContactRow) -> DomainResult<Contact> {
    let roles: HashSet<String> = parse_json_or_default(Some(row.roles))?;
    Ok(Contact {
        contact_id: parse_uuid(&row.contact_id)?,
        name: row.name,
        roles,
        entity_id: parse_optional_uuid(row.entity_id)?,
        metadata: serde_json::from_str(&row.metadata).map_err(|e| DomainError::SerializationError(e.to_string()))?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ContactRepository for SqliteContactRepository {
    async fn create(&self, contact: &Contact) -> DomainResult<()> {
        let roles = serde_json::to_string(&contact.roles)?;
        sqlx::query(
            "INSERT INTO contacts (contact_id, name, roles, entity_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(contact.contact_id.to_string())
        .bind(&contact.name)
        .bind(&roles)
        .bind(contact.entity_id.map(|u| u.to_string()))
        .bind(contact.metadata.to_string())
        .bind(contact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as("SELECT * FROM contacts WHERE contact_id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_contact).transpose()
    }

    async fn update(&self, contact: &Contact) -> DomainResult<()> {
        let roles = serde_json::to_string(&contact.roles)?;
        sqlx::query(
            "UPDATE contacts SET name = ?2, roles = ?3, entity_id = ?4, metadata = ?5 WHERE contact_id = ?1",
        )
        .bind(contact.contact_id.to_string())
        .bind(&contact.name)
        .bind(&roles)
        .bind(contact.entity_id.map(|u| u.to_string()))
        .bind(contact.metadata.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_owner(&self) -> DomainResult<Option<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as("SELECT * FROM contacts")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let contact = row_to_contact(row)?;
            if contact.roles.contains(OWNER_ROLE) {
                return Ok(Some(contact));
            }
        }
        Ok(None)
    }

    async fn list(&self) -> DomainResult<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as("SELECT * FROM contacts ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_contact).collect()
    }
}

#[derive(Clone)]
pub struct SqliteContactChannelRepository {
    pool: SqlitePool,
}

impl SqliteContactChannelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    contact_id: String,
    channel_type: String,
    channel_value: String,
    is_primary: bool,
    secured_flag: bool,
    created_at: String,
}

fn row_to_channel(row: ChannelRow) -> DomainResult<ContactChannel> {
    Ok(ContactChannel {
        contact_id: parse_uuid(&row.contact_id)?,
        channel_type: row.channel_type,
        channel_value: row.channel_value,
        is_primary: row.is_primary,
        secured_flag: row.secured_flag,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ContactChannelRepository for SqliteContactChannelRepository {
    async fn create_if_absent(&self, channel: &ContactChannel) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO contact_channels
             (contact_id, channel_type, channel_value, is_primary, secured_flag, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(channel.contact_id.to_string())
        .bind(&channel.channel_type)
        .bind(&channel.channel_value)
        .bind(channel.is_primary)
        .bind(channel.secured_flag)
        .bind(channel.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_channel(&self, channel_type: &str, channel_value: &str) -> DomainResult<Option<ContactChannel>> {
        let row: Option<ChannelRow> = sqlx::query_as(
            "SELECT * FROM contact_channels WHERE channel_type = ?1 AND channel_value = ?2",
        )
        .bind(channel_type)
        .bind(channel_value)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_channel).transpose()
    }

    async fn list_for_contact(&self, contact_id: Uuid) -> DomainResult<Vec<ContactChannel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT * FROM contact_channels WHERE contact_id = ? ORDER BY created_at ASC",
        )
        .bind(contact_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_channel).collect()
    }
}
