//! Per-view guard state keyed by mount generation.
//!
//! Every mount gets a fresh generation. A verification result only lands if its
//! mount is still the current one, so a response that resolves after the view
//! was left (or remounted) cannot flip the state of the newer mount.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GuardState {
    #[default]
    Verifying,
    Denied,
    Authorized,
}

impl GuardState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Verifying)
    }
}

/// Ticket for one mount of a protected view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mount {
    generation: u64,
}

impl Mount {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct SlotInner {
    generation: u64,
    mounted: bool,
    claimed: bool,
    state: GuardState,
}

/// Outlet hosting a protected view.
#[derive(Debug, Default)]
pub struct GuardSlot {
    inner: Mutex<SlotInner>,
}

impl GuardSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new mount in `Verifying`, superseding any previous mount.
    pub fn mount(&self) -> Mount {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.mounted = true;
        inner.claimed = false;
        inner.state = GuardState::Verifying;
        Mount {
            generation: inner.generation,
        }
    }

    /// Leaves the view. Pending results for `mount` are ignored afterwards.
    pub fn unmount(&self, mount: &Mount) {
        let mut inner = self.lock();
        if inner.generation == mount.generation {
            inner.mounted = false;
            inner.generation = inner.generation.wrapping_add(1);
        }
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        self.lock().state
    }

    #[must_use]
    pub fn is_current(&self, mount: &Mount) -> bool {
        let inner = self.lock();
        inner.mounted && inner.generation == mount.generation
    }

    /// Claims the single verification allowed for `mount`.
    ///
    /// Returns `false` when the mount is no longer current or a verification
    /// was already started for it.
    pub(crate) fn begin(&self, mount: &Mount) -> bool {
        let mut inner = self.lock();
        if !inner.mounted || inner.generation != mount.generation || inner.claimed {
            return false;
        }
        inner.claimed = true;
        true
    }

    /// Applies a terminal state if `mount` is still current and still verifying.
    ///
    /// Returns whether the state was applied.
    pub(crate) fn commit(&self, mount: &Mount, state: GuardState) -> bool {
        let mut inner = self.lock();
        if !inner.mounted || inner.generation != mount.generation {
            return false;
        }
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = state;
        true
    }
}
