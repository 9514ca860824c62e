//! Bracket layout shared by the format builders.
//!
//! Builders emit an in-memory arena of [`NodeDraft`]s addressed by index.
//! Edges are indices into the same arena and always point forward, so a
//! single pass in arena order visits every node after all of its feeders.

use super::{
    double_elimination, round_robin,
    errors::{BracketError, BracketResult},
    models::{BracketType, Participant, TeamId, TournamentFormat},
    seeding, single_elimination,
};
use serde::{Deserialize, Serialize};

/// Unpersisted bracket node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub bracket_type: BracketType,
    pub round_number: u32,
    pub position: u32,
    /// Label used for the node's match
    pub label: String,
    pub seed_number: Option<u32>,
    pub bye_team_id: Option<TeamId>,
    /// Arena index of the winner's destination
    pub next: Option<usize>,
    /// Arena index of the loser's destination
    pub loser_next: Option<usize>,
    /// Index into [`BracketLayout::matches`]
    pub match_index: Option<usize>,
    pub expected_entrants: u8,
}

impl NodeDraft {
    pub fn new(
        bracket_type: BracketType,
        round_number: u32,
        position: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            bracket_type,
            round_number,
            position,
            label: label.into(),
            seed_number: None,
            bye_team_id: None,
            next: None,
            loser_next: None,
            match_index: None,
            expected_entrants: 0,
        }
    }
}

/// Unpersisted match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDraft {
    /// Arena index of the owning node
    pub node: usize,
    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    pub round: String,
}

/// Builder output: node arena plus the matches known at build time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketLayout {
    pub format: TournamentFormat,
    /// Power-of-two slot count (participant count for round robin)
    pub bracket_size: usize,
    pub nodes: Vec<NodeDraft>,
    pub matches: Vec<MatchDraft>,
}

impl BracketLayout {
    pub fn new(format: TournamentFormat, bracket_size: usize) -> Self {
        Self {
            format,
            bracket_size,
            nodes: Vec::new(),
            matches: Vec::new(),
        }
    }

    pub fn push_node(&mut self, node: NodeDraft) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Attach a match to `node` and return its index
    pub fn push_match(
        &mut self,
        node: usize,
        team1_id: Option<TeamId>,
        team2_id: Option<TeamId>,
    ) -> usize {
        let round = self.nodes[node].label.clone();
        self.matches.push(MatchDraft {
            node,
            team1_id,
            team2_id,
            round,
        });
        let idx = self.matches.len() - 1;
        self.nodes[node].match_index = Some(idx);
        idx
    }

    /// Arena indices of one round, in position order
    pub fn round(&self, bracket_type: BracketType, round_number: u32) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| {
                self.nodes[i].bracket_type == bracket_type
                    && self.nodes[i].round_number == round_number
            })
            .collect();
        indices.sort_by_key(|&i| self.nodes[i].position);
        indices
    }

    pub fn round_count(&self, bracket_type: BracketType) -> u32 {
        self.nodes
            .iter()
            .filter(|n| n.bracket_type == bracket_type)
            .map(|n| n.round_number)
            .max()
            .unwrap_or(0)
    }

    /// Teams already sitting in a node (opening pairings and byes)
    pub fn seated_teams(&self, node: usize) -> usize {
        let draft = &self.nodes[node];
        let in_match = draft.match_index.map_or(0, |m| {
            let m = &self.matches[m];
            usize::from(m.team1_id.is_some()) + usize::from(m.team2_id.is_some())
        });
        in_match + usize::from(draft.bye_team_id.is_some())
    }
}

/// Build the layout for `format` from already-seeded participants
pub fn build(format: TournamentFormat, seeded: &[Participant]) -> BracketResult<BracketLayout> {
    if seeded.len() < 2 {
        return Err(BracketError::InsufficientParticipants(seeded.len()));
    }

    match format {
        TournamentFormat::SingleElimination => {
            let order = seeding::seed_order(seeding::next_power_of_two(seeded.len()))?;
            single_elimination::build(seeded, &order)
        }
        TournamentFormat::DoubleElimination => {
            let order = seeding::seed_order(seeding::next_power_of_two(seeded.len()))?;
            double_elimination::build(seeded, &order)
        }
        TournamentFormat::RoundRobin => round_robin::build(seeded),
    }
}

/// Label for an elimination round given how many rounds remain (inclusive)
pub fn round_name(rounds_remaining: u32, round_number: u32) -> String {
    match rounds_remaining {
        1 => "Final".to_string(),
        2 => "Semi-Final".to_string(),
        3 => "Quarter-Final".to_string(),
        _ => format!("Round {round_number}"),
    }
}

/// Add a seeded elimination tree to `layout`.
///
/// Returns the arena indices grouped by round. Winner edges inside the tree
/// are wired; the final is left without a `next` edge. Labels are prefixed
/// with `label_prefix` (empty for single elimination).
pub(crate) fn push_elimination_tree(
    layout: &mut BracketLayout,
    seeded: &[Participant],
    order: &[u32],
    bracket_type: BracketType,
    label_prefix: &str,
) -> BracketResult<Vec<Vec<usize>>> {
    let bracket_size = seeding::next_power_of_two(seeded.len());
    if order.len() != bracket_size || bracket_size < 2 {
        return Err(BracketError::InvalidBracketSize(order.len()));
    }

    let total_rounds = bracket_size.trailing_zeros();
    let mut rounds: Vec<Vec<usize>> = Vec::with_capacity(total_rounds as usize);

    for round_number in 1..=total_rounds {
        let label = format!(
            "{label_prefix}{}",
            round_name(total_rounds - round_number + 1, round_number)
        );
        let count = bracket_size >> round_number;
        let mut indices = Vec::with_capacity(count);

        for position in 0..count {
            let idx = layout.push_node(NodeDraft::new(
                bracket_type,
                round_number,
                position as u32,
                label.clone(),
            ));

            if round_number == 1 {
                let (a, b) = (order[2 * position], order[2 * position + 1]);
                layout.nodes[idx].seed_number = Some(a.min(b));

                // Seeds past the field are byes
                let team = |seed: u32| seeded.get(seed as usize - 1).map(|p| p.team_id);
                match (team(a), team(b)) {
                    (Some(t1), Some(t2)) => {
                        layout.push_match(idx, Some(t1), Some(t2));
                    }
                    (Some(t), None) | (None, Some(t)) => {
                        layout.nodes[idx].bye_team_id = Some(t);
                    }
                    (None, None) => {}
                }
            }

            indices.push(idx);
        }

        if let Some(previous) = rounds.last() {
            for (position, &feeder) in previous.iter().enumerate() {
                layout.nodes[feeder].next = Some(indices[position / 2]);
            }
        }
        rounds.push(indices);
    }

    Ok(rounds)
}
