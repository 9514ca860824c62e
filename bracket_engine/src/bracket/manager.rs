//! Bracket manager: the entry point the tournament service calls.

use chrono::Utc;
use std::{collections::HashSet, sync::Arc};

use super::{
    advancement::AdvancementEngine,
    assembler::BracketAssembler,
    builder,
    config::BracketConfig,
    errors::{BracketError, BracketResult},
    models::{
        BracketGraph, Match, MatchId, MatchStatus, SeedingMethod, TeamId, TournamentDescriptor,
        TournamentId,
    },
    seeding,
};
use crate::{
    db::{BracketRepository, RankingRepository, timeouts::with_default_timeout},
    sync::KeyedMutex,
};

/// Generates brackets and drives matches through them
#[derive(Clone)]
pub struct BracketManager {
    repository: Arc<dyn BracketRepository>,
    rankings: Option<Arc<dyn RankingRepository>>,
    assembler: BracketAssembler,
    engine: AdvancementEngine,
    generation_locks: KeyedMutex<TournamentId>,
    config: BracketConfig,
}

impl BracketManager {
    pub fn new(repository: Arc<dyn BracketRepository>, config: BracketConfig) -> Self {
        Self {
            assembler: BracketAssembler::new(repository.clone(), config),
            engine: AdvancementEngine::new(
                repository.clone(),
                KeyedMutex::new(),
                config.lock_timeout,
            ),
            repository,
            rankings: None,
            generation_locks: KeyedMutex::new(),
            config,
        }
    }

    /// Look up missing ranking scores here for ranking-based seeding
    pub fn with_rankings(mut self, rankings: Arc<dyn RankingRepository>) -> Self {
        self.rankings = Some(rankings);
        self
    }

    /// Seed the participants, build the format's bracket and persist it.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Tournament id, format, seeding method and participants
    ///
    /// # Returns
    ///
    /// * `BracketResult<BracketGraph>` - The stored bracket with generated ids
    ///
    /// # Errors
    ///
    /// - `AlreadyGenerated` if the tournament already has a bracket
    /// - `InsufficientParticipants` for fewer than two participants
    /// - `DuplicateParticipant` if a team is listed twice
    pub async fn generate_bracket(
        &self,
        descriptor: TournamentDescriptor,
    ) -> BracketResult<BracketGraph> {
        let TournamentDescriptor {
            id,
            format,
            seeding_method,
            mut participants,
        } = descriptor;

        let _guard = self
            .generation_locks
            .acquire(id, self.config.lock_timeout)
            .await?;

        if with_default_timeout(self.repository.is_bracket_generated(id)).await? {
            return Err(BracketError::AlreadyGenerated(id));
        }
        if participants.len() < 2 {
            return Err(BracketError::InsufficientParticipants(participants.len()));
        }
        let mut seen = HashSet::with_capacity(participants.len());
        if let Some(dup) = participants.iter().find(|p| !seen.insert(p.team_id)) {
            return Err(BracketError::DuplicateParticipant(dup.team_id));
        }

        if seeding_method == SeedingMethod::RankingBased {
            if let Some(rankings) = &self.rankings {
                for participant in participants.iter_mut().filter(|p| p.ranking_score.is_none()) {
                    participant.ranking_score =
                        with_default_timeout(rankings.ranking_score(participant.team_id)).await?;
                }
            }
        }

        seeding::seed(&mut participants, seeding_method);
        let layout = builder::build(format, &participants)?;
        let graph = self.assembler.assemble(id, layout).await?;

        log::info!(
            "Generated {} bracket for tournament {} ({} participants, {} seeding)",
            format,
            id,
            participants.len(),
            seeding_method
        );
        Ok(graph)
    }

    /// Move a ready match from `Upcoming` to `Live`.
    ///
    /// Starting a match that is already live returns it unchanged.
    ///
    /// # Arguments
    ///
    /// * `match_id` - Match to start
    ///
    /// # Returns
    ///
    /// * `BracketResult<Match>` - The live match or `InvalidTransition`
    pub async fn start_match(&self, match_id: MatchId) -> BracketResult<Match> {
        let node_id = self.find_match(match_id).await?.node_id;
        let _guard = self
            .engine
            .locks()
            .acquire(node_id, self.config.lock_timeout)
            .await?;

        let mut current = self.find_match(match_id).await?;
        match current.status {
            MatchStatus::Live => return Ok(current),
            MatchStatus::Upcoming if current.is_ready() => {}
            from => {
                return Err(BracketError::InvalidTransition {
                    match_id,
                    from,
                    to: MatchStatus::Live,
                });
            }
        }

        current.status = MatchStatus::Live;
        with_default_timeout(self.repository.update_match(&current)).await?;
        log::info!("Match {match_id} is live");
        Ok(current)
    }

    /// Record the winner of a match and advance the bracket.
    ///
    /// Reporting the same winner again re-runs advancement, which repairs a
    /// bracket whose earlier advancement was interrupted.
    ///
    /// # Arguments
    ///
    /// * `match_id` - Match being reported
    /// * `winner_id` - Winning team, must be one of the match's two teams
    ///
    /// # Returns
    ///
    /// * `BracketResult<Vec<Match>>` - Downstream matches that changed
    pub async fn report_result(
        &self,
        match_id: MatchId,
        winner_id: TeamId,
    ) -> BracketResult<Vec<Match>> {
        let node_id = self.find_match(match_id).await?.node_id;

        {
            let _guard = self
                .engine
                .locks()
                .acquire(node_id, self.config.lock_timeout)
                .await?;

            let mut current = self.find_match(match_id).await?;
            match (current.status, current.winner_id) {
                (MatchStatus::Completed, Some(existing)) if existing == winner_id => {
                    log::info!("Match {match_id} already reported, re-running advancement");
                }
                (MatchStatus::Completed, Some(existing)) => {
                    return Err(BracketError::MatchAlreadyCompleted {
                        match_id,
                        winner_id: existing,
                    });
                }
                (from @ MatchStatus::Cancelled, _) => {
                    return Err(BracketError::InvalidTransition {
                        match_id,
                        from,
                        to: MatchStatus::Completed,
                    });
                }
                (from, _) => {
                    if !current.is_ready() {
                        return Err(BracketError::InvalidTransition {
                            match_id,
                            from,
                            to: MatchStatus::Completed,
                        });
                    }
                    if !current.has_team(winner_id) {
                        return Err(BracketError::InvalidWinner {
                            match_id,
                            team_id: winner_id,
                        });
                    }

                    current.status = MatchStatus::Completed;
                    current.winner_id = Some(winner_id);
                    current.completed_at = Some(Utc::now());
                    with_default_timeout(self.repository.update_match(&current)).await?;
                    log::info!("Match {match_id} completed, winner {winner_id}");
                }
            }
        }

        self.engine.advance(match_id).await
    }

    /// Propagate an already recorded result
    ///
    /// # Arguments
    ///
    /// * `match_id` - A completed match
    ///
    /// # Returns
    ///
    /// * `BracketResult<Vec<Match>>` - Downstream matches that changed
    pub async fn advance(&self, match_id: MatchId) -> BracketResult<Vec<Match>> {
        self.engine.advance(match_id).await
    }

    /// Current state of a tournament's bracket, if generated
    pub async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Option<BracketGraph>> {
        with_default_timeout(self.repository.load_bracket(tournament_id)).await
    }

    async fn find_match(&self, match_id: MatchId) -> BracketResult<Match> {
        with_default_timeout(self.repository.find_match(match_id))
            .await?
            .ok_or(BracketError::MatchNotFound(match_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bracket::models::{BracketType, Participant, TournamentFormat},
        db::MemoryBracketRepository,
    };

    fn descriptor(id: TournamentId, format: TournamentFormat, n: i64) -> TournamentDescriptor {
        TournamentDescriptor {
            id,
            format,
            seeding_method: SeedingMethod::Manual,
            participants: (1..=n)
                .map(|t| Participant::new(t).with_seed(t as u32))
                .collect(),
        }
    }

    fn manager() -> BracketManager {
        BracketManager::new(
            Arc::new(MemoryBracketRepository::new()),
            BracketConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_generate_twice_rejected() {
        let manager = manager();
        manager
            .generate_bracket(descriptor(1, TournamentFormat::SingleElimination, 4))
            .await
            .unwrap();
        let err = manager
            .generate_bracket(descriptor(1, TournamentFormat::SingleElimination, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, BracketError::AlreadyGenerated(1)));
    }

    #[tokio::test]
    async fn test_generate_validates_field() {
        let manager = manager();
        assert!(matches!(
            manager
                .generate_bracket(descriptor(1, TournamentFormat::RoundRobin, 1))
                .await,
            Err(BracketError::InsufficientParticipants(1))
        ));

        let mut dup = descriptor(2, TournamentFormat::RoundRobin, 3);
        dup.participants.push(Participant::new(2));
        assert!(matches!(
            manager.generate_bracket(dup).await,
            Err(BracketError::DuplicateParticipant(2))
        ));
        assert!(manager.load_bracket(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ranking_seeding_reads_repository() {
        let repo = Arc::new(
            MemoryBracketRepository::new()
                .with_ranking(1, 10.0)
                .with_ranking(2, 40.0)
                .with_ranking(3, 30.0)
                .with_ranking(4, 20.0),
        );
        let manager =
            BracketManager::new(repo.clone(), BracketConfig::default()).with_rankings(repo);

        let mut desc = descriptor(1, TournamentFormat::SingleElimination, 4);
        desc.seeding_method = SeedingMethod::RankingBased;
        let graph = manager.generate_bracket(desc).await.unwrap();

        // Seed order is 2, 3, 4, 1, so 2 meets 1 and 3 meets 4
        let opening: Vec<(TeamId, TeamId)> = graph
            .round(BracketType::Main, 1)
            .iter()
            .map(|n| {
                let m = graph.match_by_id(n.match_id.unwrap()).unwrap();
                (m.team1_id.unwrap(), m.team2_id.unwrap())
            })
            .collect();
        assert_eq!(opening, vec![(2, 1), (3, 4)]);
    }

    #[tokio::test]
    async fn test_report_result_validation() {
        let manager = manager();
        let graph = manager
            .generate_bracket(descriptor(1, TournamentFormat::SingleElimination, 4))
            .await
            .unwrap();
        let semi = graph.round(BracketType::Main, 1)[0].match_id.unwrap();
        let final_match = graph.round(BracketType::Main, 2)[0].match_id.unwrap();

        assert!(matches!(
            manager.report_result(semi, 99).await,
            Err(BracketError::InvalidWinner { team_id: 99, .. })
        ));
        assert!(matches!(
            manager.report_result(final_match, 1).await,
            Err(BracketError::InvalidTransition { .. })
        ));
        assert!(matches!(
            manager.report_result(424_242, 1).await,
            Err(BracketError::MatchNotFound(424_242))
        ));

        let updated = manager.report_result(semi, 1).await.unwrap();
        assert_eq!(updated.len(), 1);
        // Same result again is accepted and changes nothing
        assert!(manager.report_result(semi, 1).await.unwrap().is_empty());
        assert!(matches!(
            manager.report_result(semi, 4).await,
            Err(BracketError::MatchAlreadyCompleted { winner_id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_match_cannot_be_reported() {
        let repo = Arc::new(MemoryBracketRepository::new());
        let manager = BracketManager::new(repo.clone(), BracketConfig::default());
        let graph = manager
            .generate_bracket(descriptor(1, TournamentFormat::SingleElimination, 4))
            .await
            .unwrap();
        let semi = graph.round(BracketType::Main, 1)[0].match_id.unwrap();
        let final_match = graph.round(BracketType::Main, 2)[0].match_id.unwrap();

        let mut cancelled = repo.find_match(semi).await.unwrap().unwrap();
        assert!(cancelled.is_ready());
        cancelled.status = MatchStatus::Cancelled;
        repo.update_match(&cancelled).await.unwrap();

        let winner = cancelled.team1_id.unwrap();
        assert!(matches!(
            manager.report_result(semi, winner).await,
            Err(BracketError::InvalidTransition {
                from: MatchStatus::Cancelled,
                to: MatchStatus::Completed,
                ..
            })
        ));
        assert!(matches!(
            manager.start_match(semi).await,
            Err(BracketError::InvalidTransition {
                from: MatchStatus::Cancelled,
                ..
            })
        ));

        let after = manager.load_bracket(1).await.unwrap().unwrap();
        let stored = after.match_by_id(semi).unwrap();
        assert_eq!(stored.status, MatchStatus::Cancelled);
        assert_eq!(stored.winner_id, None);
        let downstream = after.match_by_id(final_match).unwrap();
        assert_eq!((downstream.team1_id, downstream.team2_id), (None, None));
    }

    #[tokio::test]
    async fn test_start_match() {
        let manager = manager();
        let graph = manager
            .generate_bracket(descriptor(1, TournamentFormat::SingleElimination, 4))
            .await
            .unwrap();
        let semi = graph.round(BracketType::Main, 1)[0].match_id.unwrap();
        let final_match = graph.round(BracketType::Main, 2)[0].match_id.unwrap();

        let live = manager.start_match(semi).await.unwrap();
        assert_eq!(live.status, MatchStatus::Live);
        assert_eq!(manager.start_match(semi).await.unwrap().status, MatchStatus::Live);

        assert!(matches!(
            manager.start_match(final_match).await,
            Err(BracketError::InvalidTransition {
                from: MatchStatus::Upcoming,
                to: MatchStatus::Live,
                ..
            })
        ));

        manager.report_result(semi, 1).await.unwrap();
        let done = manager.load_bracket(1).await.unwrap().unwrap();
        let semi_match = done.match_by_id(semi).unwrap();
        assert_eq!(semi_match.status, MatchStatus::Completed);
        assert!(semi_match.completed_at.is_some());
    }
}
