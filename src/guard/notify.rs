//! Denial taxonomy and the user-facing side effects of a denial.
//!
//! Notices are categorized: they never carry raw error text, only a friendly
//! title and message chosen by the denial kind.

use crate::oracle::OracleError;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("no active session")]
    NoSession,
    #[error("admin verification failed: {0}")]
    OracleUnreachable(String),
    #[error("oracle denied admin access")]
    OracleDenied { reason: Option<String> },
    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("cached role does not grant admin access")]
    RoleHintDenied,
}

impl From<OracleError> for Denial {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Unreachable(message) => Self::OracleUnreachable(message),
            OracleError::Malformed(message) => Self::MalformedResponse(message),
        }
    }
}

impl Denial {
    /// The categorized notice shown to the user for this denial.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::NoSession => Notice::error(
                "Authentication required",
                "Please sign in to access this page.",
            ),
            Self::OracleUnreachable(_) => Notice::error(
                "Verification failed",
                "Unable to verify admin access. Please try again.",
            ),
            Self::OracleDenied { .. } | Self::MalformedResponse(_) | Self::RoleHintDenied => {
                Notice::error(
                    "Access denied",
                    "You do not have permission to access this page.",
                )
            }
        }
    }
}

/// Error toast shown on denial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub message: &'static str,
}

impl Notice {
    #[must_use]
    pub const fn error(title: &'static str, message: &'static str) -> Self {
        Self { title, message }
    }
}

/// Toast/banner mechanism of the identity collaborator.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Moves the user away from the protected view.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Writes notices to the log; used by the CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        warn!("{}: {}", notice.title, notice.message);
    }
}

/// Logs redirects instead of navigating; used by the CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        info!("Redirecting to {path}");
    }
}
