//! Bracket error types.

use super::models::{MatchId, MatchStatus, NodeId, TeamId, TournamentId};
use crate::sync::LockError;
use std::{fmt, time::Duration};
use thiserror::Error;

/// How a missing bracket node was looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLookup {
    /// The node owning a match
    ForMatch(MatchId),
    /// A node referenced by id (usually through an edge)
    ById(NodeId),
}

impl fmt::Display for NodeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeLookup::ForMatch(match_id) => write!(f, "match {match_id}"),
            NodeLookup::ById(node_id) => write!(f, "node id {node_id}"),
        }
    }
}

/// Bracket errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Fewer than two participants supplied
    #[error("Insufficient participants: need at least 2, have {0}")]
    InsufficientParticipants(usize),

    /// Unknown tournament format
    #[error("Unsupported tournament format: {0}")]
    UnsupportedFormat(String),

    /// Unknown seeding method
    #[error("Invalid seeding method: {0}")]
    InvalidSeedingMethod(String),

    /// The same team entered twice
    #[error("Team {0} appears more than once in the participant list")]
    DuplicateParticipant(TeamId),

    /// Bracket generation requested twice
    #[error("Bracket already generated for tournament {0}")]
    AlreadyGenerated(TournamentId),

    /// Seed order requested for a size that is not a power of two >= 2
    #[error("Invalid bracket size: {0}")]
    InvalidBracketSize(usize),

    /// No bracket node behind a match or edge
    #[error("Bracket node not found for {0}")]
    NodeNotFound(NodeLookup),

    /// An edge points at a two-entrant node without a materialized match
    #[error("Node {0} has no match to advance into")]
    TargetMatchMissing(NodeId),

    /// Both slots of a target are held by other teams
    #[error("Node {node_id} cannot take team {team_id}: all slots are occupied")]
    SlotConflict { node_id: NodeId, team_id: TeamId },

    /// Match not found
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Advancement requested for a match without a result
    #[error("Match {0} is not completed")]
    MatchNotCompleted(MatchId),

    /// A different result was already recorded
    #[error("Match {match_id} already completed with winner {winner_id}")]
    MatchAlreadyCompleted { match_id: MatchId, winner_id: TeamId },

    /// Reported winner is not playing in the match
    #[error("Team {team_id} is not playing in match {match_id}")]
    InvalidWinner { match_id: MatchId, team_id: TeamId },

    /// Illegal match status change
    #[error("Match {match_id} cannot move from {from} to {to}")]
    InvalidTransition {
        match_id: MatchId,
        from: MatchStatus,
        to: MatchStatus,
    },

    /// Stored record could not be decoded
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Keyed lock acquisition failed
    #[error("Lock error: {0}")]
    LockTimeout(#[from] LockError),

    /// Repository call exceeded its deadline
    #[error("Bracket operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BracketError {
    /// Whether this error means the node graph broke one of its invariants.
    ///
    /// These are data-integrity alerts, never user errors.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            BracketError::NodeNotFound(_)
                | BracketError::TargetMatchMissing(_)
                | BracketError::SlotConflict { .. }
        )
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Database(_) | BracketError::InvalidRecord(_) => {
                "Internal server error".to_string()
            }
            _ if self.is_integrity_violation() => "Bracket is in an inconsistent state".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;
