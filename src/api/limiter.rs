//! In-memory attempt limiting for admin verification.
//!
//! Flow Overview:
//! 1) Track failed verification attempts per client in a rolling window.
//! 2) Block the client for a cooldown once the window holds `max_attempts` failures.
//! 3) A successful verification clears the client's failures.
//!
//! Counters are projected into a `SecurityStatus` for display; the projection
//! never enforces anything on its own.

use crate::security::RateSnapshot;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    #[error("Cooldown active: {remaining_seconds}s remaining")]
    Cooldown { remaining_seconds: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimiterConfig {
    max_attempts: u32,
    window: Duration,
    cooldown: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl LimiterConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[derive(Debug, Default)]
struct ClientAttempts {
    failures: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl ClientAttempts {
    fn is_idle(&self) -> bool {
        self.failures.is_empty() && self.blocked_until.is_none()
    }
}

#[derive(Debug, Default)]
pub struct AttemptLimiter {
    config: LimiterConfig,
    clients: Mutex<HashMap<String, ClientAttempts>>,
}

impl AttemptLimiter {
    #[must_use]
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientAttempts>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// # Errors
    /// Returns `LimitError::Cooldown` while the client is blocked.
    pub fn check(&self, client: &str) -> Result<(), LimitError> {
        self.check_at(client, Instant::now())
    }

    pub fn record_failure(&self, client: &str) {
        self.record_failure_at(client, Instant::now());
    }

    pub fn record_success(&self, client: &str) {
        self.lock().remove(client);
    }

    #[must_use]
    pub fn snapshot(&self, client: &str) -> RateSnapshot {
        self.snapshot_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), LimitError> {
        let mut clients = self.lock();
        let Some(entry) = clients.get_mut(client) else {
            return Ok(());
        };
        match remaining(entry, now) {
            Some(remaining) => Err(LimitError::Cooldown {
                remaining_seconds: ceil_seconds(remaining),
            }),
            None => Ok(()),
        }
    }

    fn record_failure_at(&self, client: &str, now: Instant) {
        let mut clients = self.lock();
        // Keys come from request headers; drop expired clients on every insert.
        clients.retain(|_, entry| {
            self.prune(entry, now);
            !entry.is_idle()
        });
        let entry = clients.entry(client.to_string()).or_default();
        entry.failures.push_back(now);
        if entry.failures.len() >= self.max_attempts_usize() {
            entry.blocked_until = Some(now + self.config.cooldown);
        }
    }

    fn snapshot_at(&self, client: &str, now: Instant) -> RateSnapshot {
        let mut clients = self.lock();
        let (attempts, remaining) = match clients.get_mut(client) {
            Some(entry) => {
                self.prune(entry, now);
                (entry.failures.len(), remaining(entry, now))
            }
            None => (0, None),
        };
        RateSnapshot::from_counters(
            remaining.is_some(),
            u32::try_from(attempts).unwrap_or(u32::MAX),
            self.config.max_attempts,
            remaining.map_or(0, ceil_seconds),
        )
    }

    fn prune(&self, entry: &mut ClientAttempts, now: Instant) {
        while entry
            .failures
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) >= self.config.window)
        {
            entry.failures.pop_front();
        }
        if entry.blocked_until.is_some_and(|until| until <= now) {
            entry.blocked_until = None;
            entry.failures.clear();
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    fn max_attempts_usize(&self) -> usize {
        usize::try_from(self.config.max_attempts).unwrap_or(usize::MAX)
    }
}

fn remaining(entry: &ClientAttempts, now: Instant) -> Option<Duration> {
    entry
        .blocked_until
        .filter(|until| *until > now)
        .map(|until| until - now)
}

fn ceil_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
