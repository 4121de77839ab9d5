//! Duel announcement events
//!
//! Result announcements do not render anything themselves; they are
//! published on an in-process bus and the presentation layer subscribes.

pub mod bus;
pub mod types;

pub use bus::{DuelEventBus, SharedEventBus};
pub use types::{DuelEvent, ProblemSlot, SolveAward};
