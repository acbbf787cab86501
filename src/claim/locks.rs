//! Advisory Claim Locks
//!
//! One in-flight claim per (identity, kind). The registry hands out RAII
//! guards; dropping the guard releases the key, so every exit path of an
//! orchestration call releases it, including panics and cancellation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::eligibility::RewardKind;

#[derive(Clone, Default)]
pub struct ClaimLockRegistry {
    in_flight: Arc<Mutex<HashSet<(String, RewardKind)>>>,
}

impl ClaimLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the advisory lock for (identity, kind). Returns `None`
    /// when another claim for the same key is already in flight.
    pub fn try_acquire(&self, identity: &str, kind: RewardKind) -> Option<ClaimLockGuard> {
        let key = (identity.to_string(), kind);
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(ClaimLockGuard {
            registry: Arc::clone(&self.in_flight),
            key,
        })
    }

    #[cfg(test)]
    pub fn held(&self, identity: &str, kind: RewardKind) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&(identity.to_string(), kind))
    }
}

pub struct ClaimLockGuard {
    registry: Arc<Mutex<HashSet<(String, RewardKind)>>>,
    key: (String, RewardKind),
}

impl Drop for ClaimLockGuard {
    fn drop(&mut self) {
        let mut in_flight = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let registry = ClaimLockRegistry::new();
        let guard = registry.try_acquire("rAbc", RewardKind::Daily);
        assert!(guard.is_some());
        assert!(registry.try_acquire("rAbc", RewardKind::Daily).is_none());
    }

    #[test]
    fn test_released_on_drop() {
        let registry = ClaimLockRegistry::new();
        {
            let _guard = registry.try_acquire("rAbc", RewardKind::Daily);
            assert!(registry.held("rAbc", RewardKind::Daily));
        }
        assert!(!registry.held("rAbc", RewardKind::Daily));
        assert!(registry.try_acquire("rAbc", RewardKind::Daily).is_some());
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = ClaimLockRegistry::new();
        let _daily = registry.try_acquire("rAbc", RewardKind::Daily);
        assert!(registry.try_acquire("rAbc", RewardKind::Biweekly).is_some());
        assert!(registry.try_acquire("rXyz", RewardKind::Daily).is_some());
    }
}
