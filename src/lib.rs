//! # Reelguard (admin access guard for the script studio)
//!
//! `reelguard` protects the administrative surface of the short-form video
//! script studio. It contains the client-side admission logic, the pure
//! security indicator projection, the audit contract, and the server that acts
//! as the authoritative admin oracle.
//!
//! ## Dual-layer admission
//!
//! Entering an admin view runs two independent checks:
//!
//! 1. **Role hint:** a cached, client-held flag. It is advisory only and never
//!    grants access on its own.
//! 2. **Oracle:** the server re-verifies the bearer token on every mount via
//!    `POST /v1/admin/verify`. Only an explicit `authorized: true` admits.
//!
//! Every failure (no session, unreachable oracle, explicit denial, malformed
//! response) fails closed into a denied state, a categorized notice, and a
//! redirect away from the protected view.
//!
//! ## Auditing
//!
//! The server appends one audit record per privileged access. Clients never
//! write audit records; they forward the bearer token so the server can
//! attribute the action.

pub mod api;
pub mod audit;
pub mod cli;
pub mod guard;
pub mod oracle;
pub mod role_cache;
pub mod security;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
