//! Result propagation through the node graph.
//!
//! When a match completes, the winner moves along the node's winner edge and,
//! in a winners bracket, the loser moves along the loser edge. Every
//! read-modify-write on a target node runs under that node's keyed lock, and
//! only one node lock is held at any time. Placing a team that is already
//! seated is a no-op, so advancement can be re-run safely.

use std::{sync::Arc, time::Duration};

use super::{
    errors::{BracketError, BracketResult, NodeLookup},
    models::{BracketType, Match, MatchId, MatchStatus, NodeId, SlotFill, TeamId},
};
use crate::{
    db::{BracketRepository, timeouts::with_default_timeout},
    sync::KeyedMutex,
};

/// Moves winners and losers of completed matches into their next nodes
#[derive(Clone)]
pub struct AdvancementEngine {
    repository: Arc<dyn BracketRepository>,
    locks: KeyedMutex<NodeId>,
    lock_timeout: Duration,
}

impl AdvancementEngine {
    pub fn new(
        repository: Arc<dyn BracketRepository>,
        locks: KeyedMutex<NodeId>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            locks,
            lock_timeout,
        }
    }

    /// Node lock registry shared with callers that write matches directly
    pub fn locks(&self) -> &KeyedMutex<NodeId> {
        &self.locks
    }

    /// Propagate the result of a completed match.
    ///
    /// Integrity violations are logged at error level before being returned.
    ///
    /// # Arguments
    ///
    /// * `match_id` - Match whose status is `Completed` with a winner set
    ///
    /// # Returns
    ///
    /// * `BracketResult<Vec<Match>>` - Downstream matches that changed
    pub async fn advance(&self, match_id: MatchId) -> BracketResult<Vec<Match>> {
        self.advance_inner(match_id).await.inspect_err(|e| {
            if e.is_integrity_violation() {
                log::error!("Bracket integrity violation advancing match {match_id}: {e}");
            }
        })
    }

    async fn advance_inner(&self, match_id: MatchId) -> BracketResult<Vec<Match>> {
        let completed = with_default_timeout(self.repository.find_match(match_id))
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))?;

        let winner = match (completed.status, completed.winner_id) {
            (MatchStatus::Completed, Some(winner)) => winner,
            _ => return Err(BracketError::MatchNotCompleted(match_id)),
        };

        let node = with_default_timeout(self.repository.find_node_by_match(match_id))
            .await?
            .ok_or(BracketError::NodeNotFound(NodeLookup::ForMatch(match_id)))?;

        let mut updated = Vec::new();

        if let Some(next) = node.next_node_id {
            self.place(next, winner, &mut updated).await?;
        }

        if node.bracket_type == BracketType::Winners {
            if let (Some(drop_to), Some(loser)) = (node.loser_next_node_id, completed.loser_id()) {
                self.place(drop_to, loser, &mut updated).await?;
            }
        }

        log::info!(
            "Advanced match {} (winner {}): {} downstream matches updated",
            match_id,
            winner,
            updated.len()
        );
        Ok(updated)
    }

    /// Seat `team` at `node_id`, walking through single-entrant nodes.
    async fn place(
        &self,
        node_id: NodeId,
        team: TeamId,
        updated: &mut Vec<Match>,
    ) -> BracketResult<()> {
        let mut current = Some(node_id);

        while let Some(node_id) = current {
            // Released at the end of each step
            let _guard = self.locks.acquire(node_id, self.lock_timeout).await?;

            let mut node = with_default_timeout(self.repository.find_node(node_id))
                .await?
                .ok_or(BracketError::NodeNotFound(NodeLookup::ById(node_id)))?;

            current = if node.is_pass_through() {
                match node.bye_team_id {
                    None => {
                        node.bye_team_id = Some(team);
                        with_default_timeout(self.repository.update_node(&node)).await?;
                        log::debug!("Team {team} passes through node {node_id}");
                    }
                    Some(existing) if existing == team => {}
                    Some(_) => {
                        return Err(BracketError::SlotConflict { node_id, team_id: team });
                    }
                }
                node.next_node_id
            } else if node.expected_entrants == 2 {
                let match_id = node
                    .match_id
                    .ok_or(BracketError::TargetMatchMissing(node_id))?;
                let mut target = with_default_timeout(self.repository.find_match(match_id))
                    .await?
                    .ok_or(BracketError::TargetMatchMissing(node_id))?;

                match target.fill_slot(team) {
                    SlotFill::Placed => {
                        with_default_timeout(self.repository.update_match(&target)).await?;
                        log::debug!("Placed team {team} into match {match_id} (node {node_id})");
                        updated.push(target);
                    }
                    SlotFill::AlreadyPlaced => {
                        log::debug!("Team {team} already seated in match {match_id}");
                    }
                    SlotFill::Full => {
                        return Err(BracketError::SlotConflict { node_id, team_id: team });
                    }
                }
                None
            } else {
                // Nothing should ever arrive here
                return Err(BracketError::SlotConflict { node_id, team_id: team });
            };
        }

        Ok(())
    }
}
