//! Score derivation from the recorded goal events.
//!
//! The goal list is the source of truth; cached counters elsewhere must always
//! agree with [`derive_score`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::state::events::{GoalEvent, GoalKind, TeamSide};

/// How a team is recognised when attributing goals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamIdentity {
    /// Identifier in the league database, preferred when present on both sides.
    pub id: Option<String>,
    /// Display name, used when an identifier is missing.
    pub name: String,
}

impl TeamIdentity {
    /// Build an identity from an optional id and a name.
    pub fn new(id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Compare against the team reference carried by an event.
    ///
    /// Ids win when both sides have one; otherwise names are compared. Both
    /// comparisons trim surrounding whitespace and are case-sensitive.
    pub fn matches(&self, team_id: Option<&str>, team_name: &str) -> bool {
        match (self.id.as_deref(), team_id) {
            (Some(own), Some(other)) => own.trim() == other.trim(),
            _ => {
                let own = self.name.trim();
                !own.is_empty() && own == team_name.trim()
            }
        }
    }
}

/// Running score of a fixture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Score {
    /// Goals credited to the home team.
    pub home: u32,
    /// Goals credited to the away team.
    pub away: u32,
}

impl Score {
    /// Score with both counters at zero.
    pub const ZERO: Score = Score { home: 0, away: 0 };

    /// Add one goal to `side`.
    pub fn credit(&mut self, side: TeamSide) {
        match side {
            TeamSide::Home => self.home += 1,
            TeamSide::Away => self.away += 1,
        }
    }

    /// Remove one goal from `side`, never going below zero.
    pub fn revoke(&mut self, side: TeamSide) {
        match side {
            TeamSide::Home => self.home = self.home.saturating_sub(1),
            TeamSide::Away => self.away = self.away.saturating_sub(1),
        }
    }
}

/// Side whose counter a goal event increments, if any.
///
/// Assists and events whose team cannot be matched to either identity return `None`.
pub fn benefiting_side(
    goal: &GoalEvent,
    home: &TeamIdentity,
    away: &TeamIdentity,
) -> Option<TeamSide> {
    if goal.kind != GoalKind::Goal {
        return None;
    }

    let scoring_side = if home.matches(goal.team_id.as_deref(), &goal.team_name) {
        TeamSide::Home
    } else if away.matches(goal.team_id.as_deref(), &goal.team_name) {
        TeamSide::Away
    } else {
        debug!(
            goal_id = %goal.id,
            team_name = %goal.team_name,
            "goal team matches neither fixture team; score unchanged"
        );
        return None;
    };

    Some(if goal.is_own_goal {
        scoring_side.opponent()
    } else {
        scoring_side
    })
}

/// Compute the score from scratch out of a list of goal events.
pub fn derive_score<'a, I>(goals: I, home: &TeamIdentity, away: &TeamIdentity) -> Score
where
    I: IntoIterator<Item = &'a GoalEvent>,
{
    goals
        .into_iter()
        .filter_map(|goal| benefiting_side(goal, home, away))
        .fold(Score::ZERO, |mut score, side| {
            score.credit(side);
            score
        })
}
