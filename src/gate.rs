//! Bounded concurrency admission gate.
//!
//! [`AdmissionGate`] caps the number of simultaneously running costly
//! operations. Admission is a lock-free compare-and-swap on an atomic
//! counter: a caller is either admitted and handed an RAII
//! [`AdmissionPermit`], or rejected immediately with
//! [`MimirError::CapacityExceeded`]. There is no wait queue and no
//! fairness guarantee; a rejected caller must retry itself.
//!
//! The gate does not interpret the admitted work. It only times the
//! concurrency window: hold the permit for as long as the operation
//! runs, drop it on any exit path, and the slot is released exactly
//! once.
//!
//! Each admission and release notifies the registered
//! [`GateObserver`]s — e.g. an activity log, or the shared
//! [`ActiveTaskCounter`] other parts of a system display. Observers are
//! infallible by construction so they can never abort admitted work.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::telemetry;
use crate::{MimirError, Result};

/// Receives lifecycle notifications from the gate.
///
/// Both methods default to no-ops so an observer can implement only the
/// side it cares about. Implementations must not panic.
pub trait GateObserver: Send + Sync {
    /// A task was admitted. `description` names the work.
    fn task_admitted(&self, _description: &str) {}

    /// A previously admitted task released its slot.
    fn task_released(&self, _description: &str) {}
}

/// Shared usage counter, suitable for display surfaces that show an
/// "active workers" figure owned outside the gate.
#[derive(Debug, Default)]
pub struct ActiveTaskCounter {
    active: AtomicUsize,
}

impl ActiveTaskCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently admitted somewhere this counter
    /// observes.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl GateObserver for ActiveTaskCounter {
    fn task_admitted(&self, _description: &str) {
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    fn task_released(&self, _description: &str) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Gate utilization snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
    pub active: usize,
    pub capacity: usize,
    pub available: usize,
}

struct GateInner {
    active: AtomicUsize,
    capacity: usize,
    observers: Vec<Arc<dyn GateObserver>>,
}

/// Caps concurrent operations at a fixed ceiling.
///
/// Cheap to clone; clones share the same counter. `0 <= active <=
/// capacity` holds at all times outside the increment/decrement itself.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<GateInner>,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` concurrent tasks.
    pub fn new(capacity: usize) -> Self {
        Self::with_observers(capacity, Vec::new())
    }

    /// Create a gate with lifecycle observers attached.
    pub fn with_observers(capacity: usize, observers: Vec<Arc<dyn GateObserver>>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                active: AtomicUsize::new(0),
                capacity,
                observers,
            }),
        }
    }

    /// Try to admit a task, without blocking or queuing.
    ///
    /// Atomic with respect to concurrent callers: when one slot
    /// remains, exactly one of two racing calls wins it. The returned
    /// permit releases the slot when dropped.
    pub fn try_admit(&self, description: impl Into<String>) -> Result<AdmissionPermit> {
        let mut current = self.inner.active.load(Ordering::Acquire);
        loop {
            if current >= self.inner.capacity {
                metrics::counter!(telemetry::GATE_REJECTIONS_TOTAL).increment(1);
                tracing::debug!(capacity = self.inner.capacity, "admission rejected");
                return Err(MimirError::CapacityExceeded {
                    capacity: self.inner.capacity,
                });
            }
            match self.inner.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let description = description.into();
        metrics::counter!(telemetry::GATE_ADMISSIONS_TOTAL).increment(1);
        tracing::debug!(task = %description, "task admitted");
        for observer in &self.inner.observers {
            observer.task_admitted(&description);
        }

        Ok(AdmissionPermit {
            inner: Arc::clone(&self.inner),
            description,
        })
    }

    /// Current utilization.
    pub fn stats(&self) -> GateStats {
        let active = self.inner.active.load(Ordering::Acquire);
        GateStats {
            active,
            capacity: self.inner.capacity,
            available: self.inner.capacity.saturating_sub(active),
        }
    }
}

/// A held admission slot.
///
/// Dropping the permit releases the slot, so the release happens exactly
/// once per admission on every exit path: normal return, `?`, panic
/// unwind, or task cancellation.
pub struct AdmissionPermit {
    inner: Arc<GateInner>,
    description: String,
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl AdmissionPermit {
    /// The description the task was admitted under.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::AcqRel);
        metrics::counter!(telemetry::GATE_RELEASES_TOTAL).increment(1);
        tracing::debug!(task = %self.description, "task released");
        for observer in &self.inner.observers {
            observer.task_released(&self.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_admit_and_release() {
        let gate = AdmissionGate::new(2);
        assert_eq!(
            gate.stats(),
            GateStats {
                active: 0,
                capacity: 2,
                available: 2
            }
        );

        let permit = gate.try_admit("work").unwrap();
        assert_eq!(gate.stats().active, 1);
        assert_eq!(gate.stats().available, 1);
        assert_eq!(permit.description(), "work");

        drop(permit);
        assert_eq!(gate.stats().active, 0);
    }

    #[test]
    fn full_gate_rejects() {
        let gate = AdmissionGate::new(1);
        let _held = gate.try_admit("first").unwrap();
        let err = gate.try_admit("second").unwrap_err();
        assert!(matches!(err, MimirError::CapacityExceeded { capacity: 1 }));
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let gate = AdmissionGate::new(0);
        assert!(gate.try_admit("any").is_err());
    }
}
