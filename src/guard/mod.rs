//! Dual-layer admission for admin-only views.
//!
//! Flow Overview:
//! 1) Require an active session; otherwise deny without calling the oracle.
//! 2) Read the cached role hint. It is advisory and never grants access.
//! 3) Ask the oracle with the session's bearer token; only an explicit grant admits.
//! 4) Commit the result to the view's slot if the mount is still current, then
//!    notify and redirect on denial.
//!
//! Security boundaries:
//! - Every failure fails closed; no ambiguous outcome is treated as authorized.
//! - Results are never cached across mounts; each mount re-verifies.
//! - At most one oracle call per mount.
//! - No automatic retries; the user re-enters the view to try again.

mod notify;
mod slot;


pub use notify::{Denial, LogNavigator, LogNotifier, Navigator, Notice, Notifier};
pub use slot::{GuardSlot, GuardState, Mount};

use crate::{oracle::AuthorizationOracle, role_cache::RoleCache, session::SessionStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const DEFAULT_REDIRECT_PATH: &str = "/";

#[derive(Clone, Debug)]
pub struct GuardConfig {
    redirect_path: String,
    short_circuit_on_role_hint: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            short_circuit_on_role_hint: false,
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }

    /// Deny without calling the oracle when the cached role is definitively not admin.
    #[must_use]
    pub fn with_short_circuit_on_role_hint(mut self, enabled: bool) -> Self {
        self.short_circuit_on_role_hint = enabled;
        self
    }

    #[must_use]
    pub fn redirect_path(&self) -> &str {
        &self.redirect_path
    }

    #[must_use]
    pub fn short_circuit_on_role_hint(&self) -> bool {
        self.short_circuit_on_role_hint
    }
}

/// Identity confirmed by the oracle for the presented token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedAdmin {
    pub subject_id: String,
    pub email: Option<String>,
}

/// Result of one admission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Authorized(VerifiedAdmin),
    Denied(Denial),
    /// The mount was left or replaced before the result arrived; nothing changed.
    Stale,
    /// A verification for this mount was already started; no oracle call was made.
    AlreadyVerifying,
}

pub struct AccessGuard {
    sessions: Arc<dyn SessionStore>,
    roles: Arc<dyn RoleCache>,
    oracle: Arc<dyn AuthorizationOracle>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: GuardConfig,
}

impl AccessGuard {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        roles: Arc<dyn RoleCache>,
        oracle: Arc<dyn AuthorizationOracle>,
    ) -> Self {
        Self {
            sessions,
            roles,
            oracle,
            notifier: Arc::new(LogNotifier),
            navigator: Arc::new(LogNavigator),
            config: GuardConfig::default(),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Mounts a protected view on `slot` and runs admission for it.
    pub async fn enter(&self, slot: &GuardSlot) -> (Mount, Admission) {
        let mount = slot.mount();
        let admission = self.admit(slot, &mount).await;
        (mount, admission)
    }

    /// Runs admission for an existing mount and commits the outcome.
    #[instrument(skip_all, fields(generation = mount.generation()))]
    pub async fn admit(&self, slot: &GuardSlot, mount: &Mount) -> Admission {
        if !slot.is_current(mount) {
            debug!("Mount already superseded, skipping verification");
            return Admission::Stale;
        }
        if !slot.begin(mount) {
            debug!("Verification already started for this mount");
            return Admission::AlreadyVerifying;
        }

        match self.evaluate().await {
            Ok(admin) => {
                if slot.commit(mount, GuardState::Authorized) {
                    info!(subject_id = %admin.subject_id, "Admin access authorized");
                    Admission::Authorized(admin)
                } else {
                    debug!("Discarding stale grant");
                    Admission::Stale
                }
            }
            Err(denial) => {
                if slot.commit(mount, GuardState::Denied) {
                    warn!("Admin access denied: {denial}");
                    self.notifier.notify(&denial.notice());
                    self.navigator.redirect(self.config.redirect_path());
                    Admission::Denied(denial)
                } else {
                    debug!("Discarding stale denial: {denial}");
                    Admission::Stale
                }
            }
        }
    }

    async fn evaluate(&self) -> Result<VerifiedAdmin, Denial> {
        let session = self.sessions.active().ok_or(Denial::NoSession)?;

        match self.roles.is_admin_hint() {
            Some(false) if self.config.short_circuit_on_role_hint() => {
                return Err(Denial::RoleHintDenied);
            }
            Some(false) => debug!("Role hint says not admin, asking the oracle anyway"),
            Some(true) => debug!("Role hint says admin, confirming with the oracle"),
            None => debug!("No role hint cached"),
        }

        let verdict = self.oracle.verify(&session.bearer_token).await?;

        if !verdict.authorized {
            return Err(Denial::OracleDenied {
                reason: verdict.error_reason,
            });
        }

        Ok(VerifiedAdmin {
            subject_id: verdict.subject_id.unwrap_or(session.subject_id),
            email: verdict.email,
        })
    }
}
