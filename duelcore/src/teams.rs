//! Team management
//!
//! Named groups of users, entirely independent of duel logic: a user
//! belongs to at most one team, and an emptied team disbands. Kept in
//! process memory only.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::duel::types::UserId;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("already in team `{0}`, leave it first")]
    AlreadyInTeam(String),

    #[error("a team named `{0}` already exists")]
    TeamExists(String),

    #[error("no team named `{0}`")]
    NoSuchTeam(String),

    #[error("not in any team")]
    NotInTeam,
}

pub type TeamResult<T> = Result<T, TeamError>;

/// Result of leaving a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub team: String,
    /// True when the leaver was the last member and the team disbanded.
    pub disbanded: bool,
}

/// Shared reference to the team directory
pub type SharedTeamDirectory = Arc<TeamDirectory>;

#[derive(Default)]
struct TeamState {
    /// team name -> members, insertion order preserved per team
    teams: HashMap<String, Vec<UserId>>,
    /// user -> team name
    membership: HashMap<UserId, String>,
}

#[derive(Default)]
pub struct TeamDirectory {
    state: RwLock<TeamState>,
}

impl TeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedTeamDirectory {
        Arc::new(self)
    }

    /// Create a team and join it as its first member.
    pub async fn create(&self, user: UserId, name: &str) -> TeamResult<()> {
        let mut state = self.state.write().await;
        if let Some(team) = state.membership.get(&user) {
            return Err(TeamError::AlreadyInTeam(team.clone()));
        }
        if state.teams.contains_key(name) {
            return Err(TeamError::TeamExists(name.to_string()));
        }
        state.teams.insert(name.to_string(), vec![user]);
        state.membership.insert(user, name.to_string());
        Ok(())
    }

    pub async fn join(&self, user: UserId, name: &str) -> TeamResult<()> {
        let mut state = self.state.write().await;
        if let Some(team) = state.membership.get(&user) {
            return Err(TeamError::AlreadyInTeam(team.clone()));
        }
        let members = state
            .teams
            .get_mut(name)
            .ok_or_else(|| TeamError::NoSuchTeam(name.to_string()))?;
        members.push(user);
        state.membership.insert(user, name.to_string());
        Ok(())
    }

    /// Leave the current team, disbanding it when it empties.
    pub async fn leave(&self, user: UserId) -> TeamResult<LeaveOutcome> {
        let mut state = self.state.write().await;
        let team = state.membership.remove(&user).ok_or(TeamError::NotInTeam)?;
        let disbanded = if let Some(members) = state.teams.get_mut(&team) {
            members.retain(|&m| m != user);
            members.is_empty()
        } else {
            false
        };
        if disbanded {
            state.teams.remove(&team);
        }
        Ok(LeaveOutcome { team, disbanded })
    }

    /// The requesting user's team name and roster.
    pub async fn roster(&self, user: UserId) -> Option<(String, Vec<UserId>)> {
        let state = self.state.read().await;
        let team = state.membership.get(&user)?;
        let members = state.teams.get(team)?.clone();
        Some((team.clone(), members))
    }

    /// All teams with their member counts.
    pub async fn list(&self) -> Vec<(String, usize)> {
        let state = self.state.read().await;
        let mut teams: Vec<(String, usize)> = state
            .teams
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();
        teams.sort();
        teams
    }
}
