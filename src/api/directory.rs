//! Bearer token resolution against the studio's session and role tables.
//!
//! Raw tokens never touch the database; lookups use their SHA-256 hash.
//! Admin privilege comes from `user_roles`, never from anything the client sends.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::{Connection, PgPool, Row};
use std::{future::Future, pin::Pin};
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

const ADMIN_ROLE: &str = "admin";

/// Identity behind a bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

pub trait AdminDirectory: Send + Sync {
    /// Resolve an unexpired session token, or `None` when unknown.
    fn resolve<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Subject>>> + Send + 'a>>;

    /// Whether the backing store is reachable.
    fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Hash a session token so raw values never touch the database.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone, Debug)]
pub struct PgAdminDirectory {
    pool: PgPool,
}

impl PgAdminDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lookup(&self, token: &str) -> Result<Option<Subject>> {
        let query = r"
            SELECT u.id, u.email,
                   EXISTS (
                       SELECT 1 FROM user_roles r
                       WHERE r.user_id = u.id AND r.role = $2
                   ) AS is_admin
            FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
              AND s.expires_at > NOW()
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(hash_token(token))
            .bind(ADMIN_ROLE)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to resolve session token")?;

        Ok(row.map(|row| Subject {
            user_id: row.get("id"),
            email: row.get("email"),
            is_admin: row.get("is_admin"),
        }))
    }

    async fn check_connection(&self) -> bool {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        match self.pool.acquire().instrument(acquire_span).await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!("Failed to ping database: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                error!("Failed to acquire database connection: {err}");
                false
            }
        }
    }
}

impl AdminDirectory for PgAdminDirectory {
    fn resolve<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Subject>>> + Send + 'a>> {
        Box::pin(self.lookup(token))
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.check_connection())
    }
}
