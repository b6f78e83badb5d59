//! Client-held admin role hint.
//!
//! The hint is fetched once per session by the identity layer and is only an
//! optimization for the first pass of the guard. It never grants access.

use std::sync::{PoisonError, RwLock};

pub trait RoleCache: Send + Sync {
    /// `None` when the role has not been fetched yet.
    fn is_admin_hint(&self) -> Option<bool>;
}

/// Role hint cached in memory and refreshed by its owner.
#[derive(Debug, Default)]
pub struct CachedRole {
    is_admin: RwLock<Option<bool>>,
}

impl CachedRole {
    #[must_use]
    pub fn new(is_admin: Option<bool>) -> Self {
        Self {
            is_admin: RwLock::new(is_admin),
        }
    }

    pub fn refresh(&self, is_admin: bool) {
        *self.is_admin.write().unwrap_or_else(PoisonError::into_inner) = Some(is_admin);
    }

    pub fn clear(&self) {
        *self.is_admin.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl RoleCache for CachedRole {
    fn is_admin_hint(&self) -> Option<bool> {
        *self.is_admin.read().unwrap_or_else(PoisonError::into_inner)
    }
}
