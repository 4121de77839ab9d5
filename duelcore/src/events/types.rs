//! Event types announced over the duel event bus

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duel::types::{ChannelId, DuelVerdict, Handle, SolvedBy, UserId};
use crate::judge::{Problem, ProblemId};

/// Display-ready description of one problem slot in a duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSlot {
    pub index: usize,
    pub problem_id: ProblemId,
    pub name: String,
    pub rating: u32,
    pub points: u32,
    pub url: String,
}

impl ProblemSlot {
    pub fn new(index: usize, problem: &Problem, rating: u32, points: u32) -> Self {
        Self {
            index,
            problem_id: problem.id(),
            name: problem.name.clone(),
            rating,
            points,
            url: problem.url(),
        }
    }
}

/// One newly locked-in outcome, as carried by a solve announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveAward {
    pub slot: ProblemSlot,
    pub outcome: SolvedBy,
    /// Points granted to each awarded handle (zero for a tie).
    pub points: u32,
}

/// All announcements emitted by the duel engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DuelEvent {
    /// A duel was created and its problems are published.
    DuelStarted {
        channel: ChannelId,
        users: (UserId, UserId),
        handles: (Handle, Handle),
        problems: Vec<ProblemSlot>,
        time_limit_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// A reconciliation pass locked in new outcomes.
    SolvesRecorded {
        channel: ChannelId,
        users: (UserId, UserId),
        handles: (Handle, Handle),
        awards: Vec<SolveAward>,
        scores: HashMap<Handle, u32>,
        seconds_left: i64,
        timestamp: DateTime<Utc>,
    },

    /// A duel was finalized.
    DuelFinished {
        channel: ChannelId,
        users: (UserId, UserId),
        handles: (Handle, Handle),
        outcomes: Vec<SolveAward>,
        scores: HashMap<Handle, u32>,
        verdict: DuelVerdict,
        timestamp: DateTime<Utc>,
    },
}

impl DuelEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DuelStarted { .. } => "duel_started",
            Self::SolvesRecorded { .. } => "solves_recorded",
            Self::DuelFinished { .. } => "duel_finished",
        }
    }

    /// Destination channel of the announcement.
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::DuelStarted { channel, .. }
            | Self::SolvesRecorded { channel, .. }
            | Self::DuelFinished { channel, .. } => *channel,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DuelStarted { timestamp, .. }
            | Self::SolvesRecorded { timestamp, .. }
            | Self::DuelFinished { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tagging() {
        let event = DuelEvent::DuelFinished {
            channel: 9,
            users: (1, 2),
            handles: ("alice".to_string(), "bob".to_string()),
            outcomes: Vec::new(),
            scores: HashMap::new(),
            verdict: DuelVerdict::Draw,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"duel_finished""#));
        assert!(json.contains(r#""kind":"draw""#));

        let back: DuelEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "duel_finished");
        assert_eq!(back.channel(), 9);
    }
}
