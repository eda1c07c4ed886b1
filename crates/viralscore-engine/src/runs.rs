//! In-flight run bookkeeping.
//!
//! Each submission has at most one pipeline run in this process. A run is
//! registered through [`RunRegistry::begin`], which hands back a guard that
//! owns the run's cancellation token and deregisters the run when dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;

/// Lifecycle of a persisted pipeline run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: Uuid,
    token: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashMap<i64, ActiveRun>>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run for `submission_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunInFlight`] if the submission already has one.
    pub fn begin(&self, submission_id: i64) -> Result<RunGuard, EngineError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.contains_key(&submission_id) {
            return Err(EngineError::RunInFlight(submission_id));
        }
        let run = ActiveRun {
            run_id: Uuid::new_v4(),
            token: CancellationToken::new(),
        };
        active.insert(submission_id, run.clone());
        Ok(RunGuard {
            registry: self.clone(),
            submission_id,
            run_id: run.run_id,
            token: run.token,
        })
    }

    /// Signal cancellation to the in-flight run, returning its id.
    #[must_use = "None means there was nothing to cancel"]
    pub fn cancel(&self, submission_id: i64) -> Option<Uuid> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.get(&submission_id).map(|run| {
            run.token.cancel();
            run.run_id
        })
    }

    #[must_use]
    pub fn is_running(&self, submission_id: i64) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&submission_id)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn finish(&self, submission_id: i64, run_id: Uuid) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.get(&submission_id).is_some_and(|r| r.run_id == run_id) {
            active.remove(&submission_id);
        }
    }
}

/// Ownership of one registered run. Dropping it deregisters the run.
#[derive(Debug)]
pub struct RunGuard {
    registry: RunRegistry,
    submission_id: i64,
    run_id: Uuid,
    token: CancellationToken,
}

impl RunGuard {
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn submission_id(&self) -> i64 {
        self.submission_id
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.finish(self.submission_id, self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_run_for_same_submission_is_refused() {
        let registry = RunRegistry::new();
        let _first = registry.begin(1).unwrap();
        assert!(matches!(registry.begin(1), Err(EngineError::RunInFlight(1))));
        assert!(registry.begin(2).is_ok());
    }

    #[test]
    fn dropping_the_guard_frees_the_slot() {
        let registry = RunRegistry::new();
        {
            let _guard = registry.begin(5).unwrap();
            assert!(registry.is_running(5));
        }
        assert!(!registry.is_running(5));
        assert_eq!(registry.active_count(), 0);
        assert!(registry.begin(5).is_ok());
    }

    #[test]
    fn cancel_trips_the_token() {
        let registry = RunRegistry::new();
        let guard = registry.begin(3).unwrap();
        assert_eq!(registry.cancel(3), Some(guard.run_id()));
        assert!(guard.is_cancelled());
        assert_eq!(registry.cancel(4), None);
    }

    #[test]
    fn run_status_round_trips() {
        for status in [
            RunStatus::Queued,
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
        }
        assert!("done".parse::<RunStatus>().is_err());
    }
}
