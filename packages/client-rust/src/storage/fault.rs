//! Switchable fault injection for in-process tiers.
//!
//! Memory-backed tiers consult a [`FaultSwitch`] before every call so
//! tests and demos can simulate an unreachable, slow, unauthorised or
//! corrupting backend, then restore it.

use std::time::Duration;

use parking_lot::Mutex;
use stratum_core::TierError;

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail immediately with a network error.
    Unreachable,
    /// Refuse with an authentication error.
    AuthRequired,
    /// Stall for the given duration before answering normally.
    Hang(Duration),
    /// Answer reads with a value different from what was stored.
    Corrupt,
}

/// Operation class a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Read,
    Write,
    Delete,
}

#[derive(Debug, Default, Clone, Copy)]
struct FaultPlan {
    read: Option<Fault>,
    write: Option<Fault>,
    delete: Option<Fault>,
}

/// Per-operation fault configuration. Healthy by default.
#[derive(Debug, Default)]
pub struct FaultSwitch {
    plan: Mutex<FaultPlan>,
}

impl FaultSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `fault` to every operation.
    pub fn set_all(&self, fault: Fault) {
        *self.plan.lock() = FaultPlan {
            read: Some(fault),
            write: Some(fault),
            delete: Some(fault),
        };
    }

    /// Applies `fault` to one operation class, leaving the others as-is.
    pub fn set(&self, op: FaultOp, fault: Option<Fault>) {
        let mut plan = self.plan.lock();
        match op {
            FaultOp::Read => plan.read = fault,
            FaultOp::Write => plan.write = fault,
            FaultOp::Delete => plan.delete = fault,
        }
    }

    /// Shorthand for `set_all(Fault::Unreachable)`.
    pub fn make_unreachable(&self) {
        self.set_all(Fault::Unreachable);
    }

    /// Clears every injected fault.
    pub fn restore(&self) {
        *self.plan.lock() = FaultPlan::default();
    }

    #[must_use]
    pub fn current(&self, op: FaultOp) -> Option<Fault> {
        let plan = self.plan.lock();
        match op {
            FaultOp::Read => plan.read,
            FaultOp::Write => plan.write,
            FaultOp::Delete => plan.delete,
        }
    }

    /// Applies the configured fault for `op`.
    ///
    /// Returns `Ok(true)` when the caller should corrupt its read result.
    ///
    /// # Errors
    ///
    /// Returns the injected [`TierError`] for `Unreachable` and
    /// `AuthRequired` faults.
    pub async fn check(&self, op: FaultOp) -> Result<bool, TierError> {
        match self.current(op) {
            None => Ok(false),
            Some(Fault::Unreachable) => Err(TierError::Network(
                "simulated: connection refused".to_string(),
            )),
            Some(Fault::AuthRequired) => Err(TierError::AuthRequired),
            Some(Fault::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(false)
            }
            Some(Fault::Corrupt) => Ok(op == FaultOp::Read),
        }
    }
}
