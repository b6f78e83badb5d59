//! One-shot admission check against a running oracle.

use crate::{
    api::handlers::types::AuditLogResponse,
    audit::AuditRecord,
    guard::{AccessGuard, Admission, GuardConfig, GuardSlot},
    oracle::{AdminApi, HttpOracle},
    role_cache::CachedRole,
    session::{MemorySessionStore, Session, SessionStore},
};
use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub oracle_url: String,
    pub token: Option<SecretString>,
    pub subject: String,
    pub role_hint: Option<bool>,
    pub short_circuit: bool,
    pub redirect_path: String,
    pub timeout: Duration,
    pub audit_limit: Option<u32>,
}

/// Run admission and print the outcome.
/// # Errors
/// Returns an error when access is denied or the audit log cannot be fetched.
pub async fn execute(args: Args) -> Result<()> {
    let sessions = Arc::new(session_store(&args));

    match admit(&args, sessions.clone()).await? {
        Admission::Authorized(admin) => {
            println!(
                "authorized: {} ({})",
                admin.subject_id,
                admin.email.as_deref().unwrap_or("no email")
            );
            if let Some(limit) = args.audit_limit {
                for record in fetch_audit(&args, sessions.as_ref(), limit).await? {
                    println!("{}", format_record(&record));
                }
            }
            Ok(())
        }
        Admission::Denied(denial) => {
            let notice = denial.notice();
            info!("Admission denied: {denial}");
            bail!(
                "{}: {} (redirect to {})",
                notice.title,
                notice.message,
                args.redirect_path
            )
        }
        Admission::Stale | Admission::AlreadyVerifying => bail!("admission was superseded"),
    }
}

fn session_store(args: &Args) -> MemorySessionStore {
    match &args.token {
        Some(token) => {
            MemorySessionStore::with_session(Session::new(args.subject.clone(), token.clone()))
        }
        None => MemorySessionStore::new(),
    }
}

async fn admit(args: &Args, sessions: Arc<dyn SessionStore>) -> Result<Admission> {
    let oracle = HttpOracle::with_timeout(&args.oracle_url, args.timeout)
        .context("failed to build oracle client")?;
    let guard = AccessGuard::new(
        sessions,
        Arc::new(CachedRole::new(args.role_hint)),
        Arc::new(oracle),
    )
    .with_config(
        GuardConfig::default()
            .with_redirect_path(args.redirect_path.clone())
            .with_short_circuit_on_role_hint(args.short_circuit),
    );

    let slot = GuardSlot::new();
    let (mount, admission) = guard.enter(&slot).await;
    slot.unmount(&mount);
    Ok(admission)
}

async fn fetch_audit(
    args: &Args,
    sessions: &dyn SessionStore,
    limit: u32,
) -> Result<Vec<AuditRecord>> {
    let api = AdminApi::with_timeout(&args.oracle_url, args.timeout)
        .context("failed to build admin API client")?;
    let response: AuditLogResponse = api
        .get_json(sessions, &format!("/v1/admin/audit?limit={limit}"))
        .await
        .context("failed to fetch audit log")?;
    Ok(response.records)
}

fn format_record(record: &AuditRecord) -> String {
    format!(
        "{} {} {} {} {}",
        record.timestamp.to_rfc3339(),
        record.actor_id,
        record.action,
        record.resource_type,
        record.ip_address.as_deref().unwrap_or("-")
    )
}
