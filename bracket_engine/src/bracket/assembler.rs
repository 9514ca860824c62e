//! Bracket assembly: finish a builder layout and persist it in one step.
//!
//! [`prepare`] works purely on the in-memory arena. It counts how many
//! participants will ever reach each node, creates the empty matches later
//! rounds advance into, and walks every bye to its first real opponent.
//! [`BracketAssembler::assemble`] then hands the finished layout to the
//! repository as a single atomic write.

use std::sync::Arc;

use super::{
    builder::{BracketLayout, MatchDraft},
    config::BracketConfig,
    errors::BracketResult,
    models::{BracketGraph, TeamId, TournamentId},
};
use crate::db::{BracketRepository, timeouts::with_timeout};

/// Fill in entrant counts, placeholder matches and bye placements.
///
/// Safe to call on a layout that was already prepared.
pub fn prepare(layout: &mut BracketLayout) {
    count_entrants(layout);
    add_placeholder_matches(layout);
    resolve_byes(layout);
}

/// Nodes nothing advances into: opening pairings and round-robin fixtures
fn entry_nodes(layout: &BracketLayout) -> Vec<bool> {
    let mut entry = vec![true; layout.nodes.len()];
    for draft in &layout.nodes {
        for target in [draft.next, draft.loser_next].into_iter().flatten() {
            entry[target] = false;
        }
    }
    entry
}

/// Edges only point forward, so one pass in arena order sees every feeder
/// before the node it feeds.
fn count_entrants(layout: &mut BracketLayout) {
    let entry = entry_nodes(layout);
    let mut incoming = vec![0usize; layout.nodes.len()];

    for idx in 0..layout.nodes.len() {
        let seated = if entry[idx] { layout.seated_teams(idx) } else { 0 };
        let entrants = (incoming[idx] + seated).min(2);
        let draft = &mut layout.nodes[idx];
        draft.expected_entrants = entrants as u8;

        if entrants >= 1 {
            if let Some(next) = draft.next {
                incoming[next] += 1;
            }
        }
        // Only a played match produces a loser
        if entrants == 2 {
            if let Some(loser_next) = draft.loser_next {
                incoming[loser_next] += 1;
            }
        }
    }
}

fn add_placeholder_matches(layout: &mut BracketLayout) {
    for idx in 0..layout.nodes.len() {
        let draft = &layout.nodes[idx];
        if draft.expected_entrants == 2 && draft.match_index.is_none() {
            layout.push_match(idx, None, None);
        }
    }
}

/// Forward every bye holder until it lands in a match slot
fn resolve_byes(layout: &mut BracketLayout) {
    let entry = entry_nodes(layout);
    let byes: Vec<(usize, TeamId)> = layout
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, n)| entry[*idx] && n.match_index.is_none())
        .filter_map(|(idx, n)| n.bye_team_id.map(|team| (idx, team)))
        .collect();

    for (origin, team) in byes {
        let mut current = layout.nodes[origin].next;
        while let Some(idx) = current {
            match layout.nodes[idx].expected_entrants {
                2 => {
                    if let Some(m) = layout.nodes[idx].match_index {
                        seat(&mut layout.matches[m], team);
                    }
                    current = None;
                }
                1 => {
                    layout.nodes[idx].bye_team_id = Some(team);
                    current = layout.nodes[idx].next;
                }
                _ => current = None,
            }
        }
    }
}

fn seat(draft: &mut MatchDraft, team: TeamId) {
    if draft.team1_id == Some(team) || draft.team2_id == Some(team) {
        return;
    }
    if draft.team1_id.is_none() {
        draft.team1_id = Some(team);
    } else if draft.team2_id.is_none() {
        draft.team2_id = Some(team);
    }
}

/// Persists prepared layouts
#[derive(Clone)]
pub struct BracketAssembler {
    repository: Arc<dyn BracketRepository>,
    config: BracketConfig,
}

impl BracketAssembler {
    pub fn new(repository: Arc<dyn BracketRepository>, config: BracketConfig) -> Self {
        Self { repository, config }
    }

    /// Prepare `layout` and store it for `tournament_id`.
    ///
    /// Nodes, matches, edges and the generated stamp are written together;
    /// on any failure nothing is stored.
    pub async fn assemble(
        &self,
        tournament_id: TournamentId,
        mut layout: BracketLayout,
    ) -> BracketResult<BracketGraph> {
        prepare(&mut layout);

        let graph = with_timeout(
            self.config.transaction_timeout,
            self.repository.save_bracket(tournament_id, &layout),
        )
        .await?;

        log::info!(
            "Assembled {} bracket for tournament {}: {} nodes, {} matches",
            graph.format,
            tournament_id,
            graph.nodes.len(),
            graph.matches.len()
        );
        Ok(graph)
    }
}
