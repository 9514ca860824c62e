//! Bracket data models: participants, nodes, matches and the assembled graph.

use super::errors::{BracketError, BracketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Tournament ID type
pub type TournamentId = i64;

/// Team (participant) ID type
pub type TeamId = i64;

/// Bracket node ID type
pub type NodeId = i64;

/// Match ID type
pub type MatchId = i64;

/// Tournament format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentFormat {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl TournamentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentFormat::SingleElimination => "SINGLE_ELIMINATION",
            TournamentFormat::DoubleElimination => "DOUBLE_ELIMINATION",
            TournamentFormat::RoundRobin => "ROUND_ROBIN",
        }
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentFormat {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE_ELIMINATION" => Ok(TournamentFormat::SingleElimination),
            "DOUBLE_ELIMINATION" => Ok(TournamentFormat::DoubleElimination),
            "ROUND_ROBIN" => Ok(TournamentFormat::RoundRobin),
            other => Err(BracketError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Seeding policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeedingMethod {
    /// Uniform shuffle
    Random,
    /// Descending ranking score
    RankingBased,
    /// Pre-assigned seed numbers
    Manual,
}

impl fmt::Display for SeedingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedingMethod::Random => write!(f, "RANDOM"),
            SeedingMethod::RankingBased => write!(f, "RANKING_BASED"),
            SeedingMethod::Manual => write!(f, "MANUAL"),
        }
    }
}

impl FromStr for SeedingMethod {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RANDOM" => Ok(SeedingMethod::Random),
            "RANKING_BASED" => Ok(SeedingMethod::RankingBased),
            "MANUAL" => Ok(SeedingMethod::Manual),
            other => Err(BracketError::InvalidSeedingMethod(other.to_string())),
        }
    }
}

/// Which sub-bracket a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketType {
    /// Single elimination and round robin
    Main,
    Winners,
    Losers,
    GrandFinal,
}

impl BracketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketType::Main => "main",
            BracketType::Winners => "winners",
            BracketType::Losers => "losers",
            BracketType::GrandFinal => "grand_final",
        }
    }
}

impl fmt::Display for BracketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BracketType {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(BracketType::Main),
            "winners" => Ok(BracketType::Winners),
            "losers" => Ok(BracketType::Losers),
            "grand_final" => Ok(BracketType::GrandFinal),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown bracket type '{other}'"
            ))),
        }
    }
}

/// Match lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
    /// Cancelled or walkover, handled outside the bracket engine
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Upcoming => "upcoming",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(MatchStatus::Upcoming),
            "live" => Ok(MatchStatus::Live),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown match status '{other}'"
            ))),
        }
    }
}

/// Tournament participant (team or player)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Team ID
    pub team_id: TeamId,
    /// Display name
    pub name: Option<String>,
    /// Seed number (1-based), assigned by seeding
    pub seed_number: Option<u32>,
    /// Ranking score, only read by ranking-based seeding
    pub ranking_score: Option<f64>,
}

impl Participant {
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            name: None,
            seed_number: None,
            ranking_score: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_seed(mut self, seed_number: u32) -> Self {
        self.seed_number = Some(seed_number);
        self
    }

    pub fn with_ranking(mut self, score: f64) -> Self {
        self.ranking_score = Some(score);
        self
    }
}

/// Everything the engine needs to generate one tournament's bracket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentDescriptor {
    pub id: TournamentId,
    pub format: TournamentFormat,
    pub seeding_method: SeedingMethod,
    pub participants: Vec<Participant>,
}

/// A slot in the tournament tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketNode {
    pub id: NodeId,
    pub tournament_id: TournamentId,
    /// Round number (1-based within its bracket type)
    pub round_number: u32,
    /// Slot within the round (0-based)
    pub position: u32,
    pub bracket_type: BracketType,
    /// Better seed of the pairing (opening round only)
    pub seed_number: Option<u32>,
    /// Participant that reached this node without an opponent
    pub bye_team_id: Option<TeamId>,
    pub match_id: Option<MatchId>,
    /// Where the winner goes
    pub next_node_id: Option<NodeId>,
    /// Where the loser goes (winners bracket only)
    pub loser_next_node_id: Option<NodeId>,
    /// Participants that will ever reach this node (0, 1 or 2)
    pub expected_entrants: u8,
}

impl BracketNode {
    pub fn is_terminal(&self) -> bool {
        self.next_node_id.is_none()
    }

    /// Single-entrant nodes forward their participant without a match
    pub fn is_pass_through(&self) -> bool {
        self.expected_entrants == 1
    }
}

/// A pairing of two teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub node_id: NodeId,
    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    /// Round label, e.g. "Quarter-Final" or "Losers Round 2"
    pub round: String,
    pub status: MatchStatus,
    pub winner_id: Option<TeamId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn has_team(&self, team_id: TeamId) -> bool {
        self.team1_id == Some(team_id) || self.team2_id == Some(team_id)
    }

    /// Both slots filled
    pub fn is_ready(&self) -> bool {
        self.team1_id.is_some() && self.team2_id.is_some()
    }

    /// The other team of a completed match
    pub fn loser_id(&self) -> Option<TeamId> {
        let winner = self.winner_id?;
        match (self.team1_id, self.team2_id) {
            (Some(a), Some(b)) if a == winner => Some(b),
            (Some(a), Some(b)) if b == winner => Some(a),
            _ => None,
        }
    }

    /// Put a team into the first empty slot.
    pub fn fill_slot(&mut self, team_id: TeamId) -> SlotFill {
        if self.has_team(team_id) {
            SlotFill::AlreadyPlaced
        } else if self.team1_id.is_none() {
            self.team1_id = Some(team_id);
            SlotFill::Placed
        } else if self.team2_id.is_none() {
            self.team2_id = Some(team_id);
            SlotFill::Placed
        } else {
            SlotFill::Full
        }
    }
}

/// Outcome of [`Match::fill_slot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFill {
    Placed,
    AlreadyPlaced,
    Full,
}

/// The persisted node arena and match set of one tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketGraph {
    pub tournament_id: TournamentId,
    pub format: TournamentFormat,
    pub nodes: Vec<BracketNode>,
    pub matches: Vec<Match>,
    pub generated_at: DateTime<Utc>,
}

impl BracketGraph {
    pub fn node(&self, node_id: NodeId) -> Option<&BracketNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn match_by_id(&self, match_id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn node_for_match(&self, match_id: MatchId) -> Option<&BracketNode> {
        self.nodes.iter().find(|n| n.match_id == Some(match_id))
    }

    /// Nodes of one round, ordered by position
    pub fn round(&self, bracket_type: BracketType, round_number: u32) -> Vec<&BracketNode> {
        let mut nodes: Vec<&BracketNode> = self
            .nodes
            .iter()
            .filter(|n| n.bracket_type == bracket_type && n.round_number == round_number)
            .collect();
        nodes.sort_by_key(|n| n.position);
        nodes
    }

    /// Number of rounds in a sub-bracket
    pub fn round_count(&self, bracket_type: BracketType) -> u32 {
        self.nodes
            .iter()
            .filter(|n| n.bracket_type == bracket_type)
            .map(|n| n.round_number)
            .max()
            .unwrap_or(0)
    }

    /// Matches with both teams that have not been played yet
    pub fn playable_matches(&self) -> Vec<&Match> {
        self.matches
            .iter()
            .filter(|m| m.is_ready() && matches!(m.status, MatchStatus::Upcoming | MatchStatus::Live))
            .collect()
    }

    pub fn to_json(&self) -> BracketResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
