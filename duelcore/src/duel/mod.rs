//! Duel session lifecycle and scoring engine
//!
//! Creation (problem selection under exclusion and tag constraints),
//! reconciliation against fresh submission data, first-to-solve point
//! attribution with tie semantics, timeout-driven finalization, and
//! bounded admission of concurrent sessions.

pub mod finalize;
pub mod reconcile;
pub mod registry;
pub mod selector;
pub mod service;
pub mod types;
pub mod watcher;

pub use finalize::{compute_verdict, Finalizer, SharedFinalizer};
pub use reconcile::{apply_histories, ReconcileOutcome, ResolvedSlot};
pub use registry::{SessionRegistry, SharedRegistry, SharedSession};
pub use selector::{select_for_handles, select_problems};
pub use service::{DuelService, DuelSnapshot, ProblemStatus, SharedDuelService};
pub use types::{
    DuelParams, DuelSession, DuelVerdict, PairKey, ProblemOutcome, RecentDuelRecord, SolvedBy,
};
pub use watcher::TimeoutWatcher;
