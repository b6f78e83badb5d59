//! Append-only audit log of privileged access.
//!
//! The server writes exactly one record per successful privileged access; the
//! actor is always derived from the verified bearer token, never from client
//! input. Records are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::{
    future::Future,
    pin::Pin,
    sync::{Mutex, PoisonError},
};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// What the server submits for one privileged action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(actor_id: Uuid, action: &str, resource_type: &str) -> Self {
        Self {
            actor_id,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            ip_address: None,
            user_agent: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Stored audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage failed: {0}")]
    Storage(String),
}

type AuditFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuditError>> + Send + 'a>>;

pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry) -> AuditFuture<'_, AuditRecord>;

    /// Most recent records first.
    fn recent(&self, limit: u32) -> AuditFuture<'_, Vec<AuditRecord>>;
}

/// In-process sink for development and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: AuditEntry) -> AuditFuture<'_, AuditRecord> {
        let record = AuditRecord {
            id: Uuid::new_v4(),
            actor_id: entry.actor_id,
            action: entry.action,
            resource_type: entry.resource_type,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            timestamp: Utc::now(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Box::pin(async move { Ok(record) })
    }

    fn recent(&self, limit: u32) -> AuditFuture<'_, Vec<AuditRecord>> {
        let records: Vec<AuditRecord> = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Box::pin(async move { Ok(records) })
    }
}

/// Sink backed by the `admin_audit_log` table.
#[derive(Clone, Debug)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
        let query = r"
            INSERT INTO admin_audit_log (actor_id, action, resource_type, ip_address, user_agent)
            VALUES ($1, $2, $3, $4::inet, $5)
            RETURNING id, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(entry.actor_id)
            .bind(&entry.action)
            .bind(&entry.resource_type)
            .bind(entry.ip_address.as_deref())
            .bind(entry.user_agent.as_deref())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| AuditError::Storage(err.to_string()))?;

        Ok(AuditRecord {
            id: row.get("id"),
            actor_id: entry.actor_id,
            action: entry.action,
            resource_type: entry.resource_type,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            timestamp: row.get("created_at"),
        })
    }

    async fn select_recent(&self, limit: u32) -> Result<Vec<AuditRecord>, AuditError> {
        let query = r"
            SELECT id, actor_id, action, resource_type, host(ip_address) AS ip_address,
                   user_agent, created_at
            FROM admin_audit_log
            ORDER BY created_at DESC
            LIMIT $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| AuditError::Storage(err.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| AuditRecord {
                id: row.get("id"),
                actor_id: row.get("actor_id"),
                action: row.get("action"),
                resource_type: row.get("resource_type"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
                timestamp: row.get("created_at"),
            })
            .collect())
    }
}

impl AuditSink for PgAuditSink {
    fn append(&self, entry: AuditEntry) -> AuditFuture<'_, AuditRecord> {
        Box::pin(self.insert(entry))
    }

    fn recent(&self, limit: u32) -> AuditFuture<'_, Vec<AuditRecord>> {
        Box::pin(self.select_recent(limit))
    }
}
