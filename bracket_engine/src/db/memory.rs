//! In-memory repository.
//!
//! Backs tests, benchmarks and the demo binary. A whole bracket is written
//! under one lock acquisition, so saves are atomic like the PostgreSQL
//! transaction they stand in for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::repository::{BracketRepository, RankingRepository, materialize};
use crate::bracket::{
    BracketError, BracketResult,
    builder::BracketLayout,
    errors::NodeLookup,
    models::{
        BracketGraph, BracketNode, Match, MatchId, NodeId, TeamId, TournamentFormat, TournamentId,
    },
};

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeId, BracketNode>,
    matches: BTreeMap<MatchId, Match>,
    generated: HashMap<TournamentId, (TournamentFormat, DateTime<Utc>)>,
    rankings: HashMap<TeamId, f64>,
    next_node_id: NodeId,
    next_match_id: MatchId,
}

/// Repository keeping every bracket in process memory
#[derive(Clone, Default)]
pub struct MemoryBracketRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryBracketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ranking score for ranking-based seeding
    pub fn with_ranking(self, team_id: TeamId, score: f64) -> Self {
        self.lock().rankings.insert(team_id, score);
        self
    }

    /// Total matches stored across all tournaments
    pub fn match_count(&self) -> usize {
        self.lock().matches.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BracketRepository for MemoryBracketRepository {
    async fn is_bracket_generated(&self, tournament_id: TournamentId) -> BracketResult<bool> {
        Ok(self.lock().generated.contains_key(&tournament_id))
    }

    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        layout: &BracketLayout,
    ) -> BracketResult<BracketGraph> {
        let mut state = self.lock();
        if state.generated.contains_key(&tournament_id) {
            return Err(BracketError::AlreadyGenerated(tournament_id));
        }

        let first_node = state.next_node_id + 1;
        let first_match = state.next_match_id + 1;
        let node_ids: Vec<NodeId> = (0..layout.nodes.len() as i64).map(|i| first_node + i).collect();
        let match_ids: Vec<MatchId> = (0..layout.matches.len() as i64)
            .map(|i| first_match + i)
            .collect();

        let generated_at = Utc::now();
        let graph = materialize(tournament_id, layout, &node_ids, &match_ids, generated_at);

        state.next_node_id += node_ids.len() as i64;
        state.next_match_id += match_ids.len() as i64;
        for node in &graph.nodes {
            state.nodes.insert(node.id, node.clone());
        }
        for m in &graph.matches {
            state.matches.insert(m.id, m.clone());
        }
        state
            .generated
            .insert(tournament_id, (layout.format, generated_at));

        Ok(graph)
    }

    async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Option<BracketGraph>> {
        let state = self.lock();
        let Some(&(format, generated_at)) = state.generated.get(&tournament_id) else {
            return Ok(None);
        };

        Ok(Some(BracketGraph {
            tournament_id,
            format,
            nodes: state
                .nodes
                .values()
                .filter(|n| n.tournament_id == tournament_id)
                .cloned()
                .collect(),
            matches: state
                .matches
                .values()
                .filter(|m| m.tournament_id == tournament_id)
                .cloned()
                .collect(),
            generated_at,
        }))
    }

    async fn find_node(&self, node_id: NodeId) -> BracketResult<Option<BracketNode>> {
        Ok(self.lock().nodes.get(&node_id).cloned())
    }

    async fn find_node_by_match(&self, match_id: MatchId) -> BracketResult<Option<BracketNode>> {
        Ok(self
            .lock()
            .nodes
            .values()
            .find(|n| n.match_id == Some(match_id))
            .cloned())
    }

    async fn find_match(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        Ok(self.lock().matches.get(&match_id).cloned())
    }

    async fn update_match(&self, updated: &Match) -> BracketResult<()> {
        match self.lock().matches.get_mut(&updated.id) {
            Some(stored) => {
                *stored = updated.clone();
                Ok(())
            }
            None => Err(BracketError::MatchNotFound(updated.id)),
        }
    }

    async fn update_node(&self, updated: &BracketNode) -> BracketResult<()> {
        match self.lock().nodes.get_mut(&updated.id) {
            Some(stored) => {
                *stored = updated.clone();
                Ok(())
            }
            None => Err(BracketError::NodeNotFound(NodeLookup::ById(updated.id))),
        }
    }
}

#[async_trait]
impl RankingRepository for MemoryBracketRepository {
    async fn ranking_score(&self, team_id: TeamId) -> BracketResult<Option<f64>> {
        Ok(self.lock().rankings.get(&team_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{builder, models::Participant};

    fn layout(n: i64) -> BracketLayout {
        let field: Vec<Participant> = (1..=n).map(Participant::new).collect();
        builder::build(TournamentFormat::RoundRobin, &field).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let repo = MemoryBracketRepository::new();
        assert!(!repo.is_bracket_generated(1).await.unwrap());

        let saved = repo.save_bracket(1, &layout(4)).await.unwrap();
        assert!(repo.is_bracket_generated(1).await.unwrap());

        let loaded = repo.load_bracket(1).await.unwrap().unwrap();
        assert_eq!(loaded.nodes, saved.nodes);
        assert_eq!(loaded.matches, saved.matches);
        assert_eq!(loaded.format, TournamentFormat::RoundRobin);
        assert!(repo.load_bracket(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_save_rejected_without_side_effects() {
        let repo = MemoryBracketRepository::new();
        repo.save_bracket(1, &layout(4)).await.unwrap();
        let before = repo.match_count();

        let err = repo.save_bracket(1, &layout(4)).await.unwrap_err();
        assert!(matches!(err, BracketError::AlreadyGenerated(1)));
        assert_eq!(repo.match_count(), before);
    }

    #[tokio::test]
    async fn test_ids_unique_across_tournaments() {
        let repo = MemoryBracketRepository::new();
        let a = repo.save_bracket(1, &layout(4)).await.unwrap();
        let b = repo.save_bracket(2, &layout(4)).await.unwrap();
        assert!(a.nodes.iter().all(|n| b.node(n.id).is_none()));
        assert!(a.matches.iter().all(|m| b.match_by_id(m.id).is_none()));

        let loaded = repo.load_bracket(2).await.unwrap().unwrap();
        assert_eq!(loaded.matches.len(), 6);
    }

    #[tokio::test]
    async fn test_updates_and_lookups() {
        let repo = MemoryBracketRepository::new();
        let graph = repo.save_bracket(1, &layout(2)).await.unwrap();
        let mut m = graph.matches[0].clone();

        let node = repo.find_node_by_match(m.id).await.unwrap().unwrap();
        assert_eq!(node.id, m.node_id);

        m.winner_id = m.team1_id;
        repo.update_match(&m).await.unwrap();
        assert_eq!(repo.find_match(m.id).await.unwrap().unwrap().winner_id, m.team1_id);

        m.id = 999;
        assert!(matches!(
            repo.update_match(&m).await,
            Err(BracketError::MatchNotFound(999))
        ));
        assert!(repo.find_node(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rankings() {
        let repo = MemoryBracketRepository::new().with_ranking(5, 1200.0);
        assert_eq!(repo.ranking_score(5).await.unwrap(), Some(1200.0));
        assert_eq!(repo.ranking_score(6).await.unwrap(), None);
    }
}
