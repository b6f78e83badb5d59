//! Security indicator projection.
//!
//! Maps attempt counters from the server-side limiter to a discrete level and
//! a display message. Projection is pure and never enforces the limit itself.
//!
//! Priority (first match wins): limited, above 80%, above 60%, otherwise
//! secure. Exactly 80% is caution and exactly 60% is secure.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const WARNING_THRESHOLD: f64 = 80.0;
const CAUTION_THRESHOLD: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Secure,
    Caution,
    Warning,
    Blocked,
}

impl SecurityLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secure => "secure",
            Self::Caution => "caution",
            Self::Warning => "warning",
            Self::Blocked => "blocked",
        }
    }
}

/// Raw limiter counters, owned by whoever enforces the limit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub is_limited: bool,
    pub attempts: u32,
    pub max_attempts: u32,
    pub remaining_seconds: u64,
    pub progress_percentage: f64,
}

impl RateSnapshot {
    /// Builds a snapshot with `progress_percentage = attempts * 100 / max_attempts`.
    #[must_use]
    pub fn from_counters(
        is_limited: bool,
        attempts: u32,
        max_attempts: u32,
        remaining_seconds: u64,
    ) -> Self {
        let progress_percentage = if max_attempts == 0 {
            100.0
        } else {
            f64::from(attempts) * 100.0 / f64::from(max_attempts)
        };
        Self {
            is_limited,
            attempts,
            max_attempts,
            remaining_seconds,
            progress_percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatus {
    pub level: SecurityLevel,
    pub attempts: u32,
    pub max_attempts: u32,
    pub remaining_cooldown_seconds: u64,
    pub progress_percentage: f64,
    pub message: String,
}

impl SecurityStatus {
    #[must_use]
    pub fn project(snapshot: &RateSnapshot) -> Self {
        let progress = sanitize_progress(snapshot.progress_percentage);
        let level = classify(snapshot.is_limited, progress);

        Self {
            level,
            attempts: snapshot.attempts,
            max_attempts: snapshot.max_attempts,
            remaining_cooldown_seconds: snapshot.remaining_seconds,
            progress_percentage: progress,
            message: message(level, snapshot),
        }
    }
}

/// Level for a limited flag and a progress percentage.
#[must_use]
pub fn classify(is_limited: bool, progress_percentage: f64) -> SecurityLevel {
    if is_limited {
        SecurityLevel::Blocked
    } else if progress_percentage > WARNING_THRESHOLD {
        SecurityLevel::Warning
    } else if progress_percentage > CAUTION_THRESHOLD {
        SecurityLevel::Caution
    } else {
        SecurityLevel::Secure
    }
}

// Non-finite values project as 0%.
fn sanitize_progress(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn message(level: SecurityLevel, snapshot: &RateSnapshot) -> String {
    match level {
        SecurityLevel::Blocked => format!(
            "Too many attempts. Try again in {}.",
            format_cooldown(snapshot.remaining_seconds)
        ),
        SecurityLevel::Warning => format!(
            "Approaching the attempt limit ({}/{}).",
            snapshot.attempts, snapshot.max_attempts
        ),
        SecurityLevel::Caution => format!(
            "Multiple attempts detected ({}/{}).",
            snapshot.attempts, snapshot.max_attempts
        ),
        SecurityLevel::Secure => "Secure connection.".to_string(),
    }
}

/// Formats seconds as `m:ss`.
#[must_use]
pub fn format_cooldown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(is_limited: bool, progress: f64) -> RateSnapshot {
        RateSnapshot {
            is_limited,
            attempts: 4,
            max_attempts: 5,
            remaining_seconds: 0,
            progress_percentage: progress,
        }
    }

    #[test]
    fn boundary_eighty_is_caution() {
        assert_eq!(
            SecurityStatus::project(&snapshot(false, 80.0)).level,
            SecurityLevel::Caution
        );
        assert_eq!(
            SecurityStatus::project(&snapshot(false, 80.01)).level,
            SecurityLevel::Warning
        );
    }

    #[test]
    fn boundary_sixty_is_secure() {
        assert_eq!(
            SecurityStatus::project(&snapshot(false, 60.0)).level,
            SecurityLevel::Secure
        );
        assert_eq!(
            SecurityStatus::project(&snapshot(false, 60.5)).level,
            SecurityLevel::Caution
        );
    }

    #[test]
    fn limited_dominates_progress() {
        for progress in [0.0, 50.0, 79.0, 100.0] {
            assert_eq!(
                SecurityStatus::project(&snapshot(true, progress)).level,
                SecurityLevel::Blocked
            );
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let input = snapshot(false, 72.5);
        assert_eq!(SecurityStatus::project(&input), SecurityStatus::project(&input));
    }

    #[test]
    fn non_finite_progress_is_secure() {
        assert_eq!(
            SecurityStatus::project(&snapshot(false, f64::NAN)).level,
            SecurityLevel::Secure
        );
        let status = SecurityStatus::project(&snapshot(false, f64::INFINITY));
        assert_eq!(status.level, SecurityLevel::Secure);
        assert!((status.progress_percentage - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_is_clamped() {
        let status = SecurityStatus::project(&snapshot(false, 140.0));
        assert_eq!(status.level, SecurityLevel::Warning);
        assert!((status.progress_percentage - 100.0).abs() < f64::EPSILON);

        let status = SecurityStatus::project(&snapshot(false, -5.0));
        assert_eq!(status.level, SecurityLevel::Secure);
        assert!(status.progress_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn from_counters_computes_progress() {
        let snap = RateSnapshot::from_counters(false, 4, 5, 0);
        assert!((snap.progress_percentage - 80.0).abs() < f64::EPSILON);
        assert_eq!(SecurityStatus::project(&snap).level, SecurityLevel::Caution);

        let snap = RateSnapshot::from_counters(false, 3, 5, 0);
        assert_eq!(SecurityStatus::project(&snap).level, SecurityLevel::Secure);
    }

    #[test]
    fn blocked_message_shows_cooldown() {
        let mut snap = snapshot(true, 100.0);
        snap.remaining_seconds = 125;
        let status = SecurityStatus::project(&snap);
        assert_eq!(status.message, "Too many attempts. Try again in 2:05.");
        assert_eq!(status.remaining_cooldown_seconds, 125);
    }

    #[test]
    fn level_serializes_lowercase() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&SecurityLevel::Caution)?,
            "\"caution\""
        );
        assert_eq!(SecurityLevel::Blocked.as_str(), "blocked");
        Ok(())
    }
}
