//! Duel coordination service
//!
//! Coordinates timed, two-party competitive problem-solving sessions
//! ("duels") driven by the Codeforces submission history. Users link a
//! Codeforces handle to their internal identity; a duel draws one
//! unsolved problem per requested difficulty rating, and points are
//! attributed as each side's earliest accepted solve is observed.
//!
//! The pieces:
//! - `judge`: paced, retried client for the judging service
//! - `links`: user-to-handle directory, validated at link time
//! - `duel`: session registry, problem selector, reconciliation engine,
//!   finalizer and timeout watcher
//! - `events`: broadcast bus the presentation layer subscribes to
//! - `archive`: bounded, persisted log of finished duels
//! - `teams`: independent team grouping

pub mod archive;
pub mod config;
pub mod duel;
pub mod error;
pub mod events;
pub mod judge;
pub mod links;
pub mod teams;

// Re-export the types a presentation layer needs.
pub use archive::{RecentDuelStore, SharedRecentStore};
pub use config::ServiceConfig;
pub use duel::{
    DuelParams, DuelService, DuelSession, DuelSnapshot, DuelVerdict, PairKey, ProblemStatus,
    RecentDuelRecord, SessionRegistry, SolvedBy, TimeoutWatcher,
};
pub use error::{DuelError, DuelResult};
pub use events::{DuelEvent, DuelEventBus, SharedEventBus};
pub use judge::{CodeforcesClient, JudgeClient, Problem, ProblemId, SubmissionHistory};
pub use links::{HandleDirectory, SharedHandleDirectory};
pub use teams::{TeamDirectory, TeamError};
