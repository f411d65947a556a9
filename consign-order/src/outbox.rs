//! Side-effects queued on the order document in the same write as the status
//! change that caused them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    RegisterPickup,
    CancelPickup { reason: String },
}

impl SideEffect {
    pub fn name(&self) -> &'static str {
        match self {
            SideEffect::RegisterPickup => "register_pickup",
            SideEffect::CancelPickup { .. } => "cancel_pickup",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingEffect {
    pub id: Uuid,
    pub effect: SideEffect,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl PendingEffect {
    pub fn new(effect: SideEffect) -> Self {
        Self {
            id: Uuid::new_v4(),
            effect,
            attempts: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Record a failed attempt. Returns true when the effect should be dropped.
    pub fn record_failure(&mut self, error: &str, max_attempts: u32) -> bool {
        self.attempts += 1;
        self.last_attempt_at = Some(Utc::now());
        self.last_error = Some(error.to_string());
        self.attempts >= max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_attempt_policy() {
        let mut effect = PendingEffect::new(SideEffect::RegisterPickup);
        assert!(effect.record_failure("timeout", 1));
        assert_eq!(effect.attempts, 1);
    }

    #[test]
    fn test_retry_budget() {
        let mut effect = PendingEffect::new(SideEffect::RegisterPickup);
        assert!(!effect.record_failure("timeout", 3));
        assert!(!effect.record_failure("timeout", 3));
        assert!(effect.record_failure("timeout", 3));
        assert_eq!(effect.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_effect_wire_shape() {
        let json = serde_json::to_value(SideEffect::CancelPickup { reason: "Order cancelled".to_string() }).unwrap();
        assert_eq!(json["type"], "cancel_pickup");
        assert_eq!(json["reason"], "Order cancelled");
    }
}
