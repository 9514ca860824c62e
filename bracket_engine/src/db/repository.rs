//! Repository traits for bracket persistence, plus the PostgreSQL backend.
//!
//! The engine only talks to storage through these traits, so the service
//! layer can hand in a pooled PostgreSQL repository while tests use the
//! in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::bracket::{
    BracketError, BracketResult,
    builder::BracketLayout,
    models::{
        BracketGraph, BracketNode, Match, MatchId, MatchStatus, NodeId, TeamId, TournamentId,
    },
};

/// Storage for bracket nodes and matches
#[async_trait]
pub trait BracketRepository: Send + Sync {
    /// Whether a bracket already exists for the tournament
    async fn is_bracket_generated(&self, tournament_id: TournamentId) -> BracketResult<bool>;

    /// Persist a prepared layout as one atomic unit.
    ///
    /// Inserts every node and match, wires node edges and match links to the
    /// generated ids and stamps the tournament as generated. Either all of it
    /// is stored or none of it. Fails with `AlreadyGenerated` if the
    /// tournament already has a bracket.
    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        layout: &BracketLayout,
    ) -> BracketResult<BracketGraph>;

    /// Load the whole graph of a tournament
    async fn load_bracket(&self, tournament_id: TournamentId)
    -> BracketResult<Option<BracketGraph>>;

    /// Find node by ID
    async fn find_node(&self, node_id: NodeId) -> BracketResult<Option<BracketNode>>;

    /// Find the node owning a match
    async fn find_node_by_match(&self, match_id: MatchId) -> BracketResult<Option<BracketNode>>;

    /// Find match by ID
    async fn find_match(&self, match_id: MatchId) -> BracketResult<Option<Match>>;

    /// Write back teams, status, winner and completion time
    async fn update_match(&self, updated: &Match) -> BracketResult<()>;

    /// Write back the mutable node fields (bye, match link, edges)
    async fn update_node(&self, updated: &BracketNode) -> BracketResult<()>;
}

/// Source of ranking scores for ranking-based seeding
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Ranking score of a team, `None` when unranked
    async fn ranking_score(&self, team_id: TeamId) -> BracketResult<Option<f64>>;
}

/// Turn a persisted layout into a graph once ids are known.
///
/// `node_ids[i]` and `match_ids[j]` are the ids assigned to layout node `i`
/// and layout match `j`.
pub(crate) fn materialize(
    tournament_id: TournamentId,
    layout: &BracketLayout,
    node_ids: &[NodeId],
    match_ids: &[MatchId],
    generated_at: DateTime<Utc>,
) -> BracketGraph {
    let nodes = layout
        .nodes
        .iter()
        .enumerate()
        .map(|(idx, draft)| BracketNode {
            id: node_ids[idx],
            tournament_id,
            round_number: draft.round_number,
            position: draft.position,
            bracket_type: draft.bracket_type,
            seed_number: draft.seed_number,
            bye_team_id: draft.bye_team_id,
            match_id: draft.match_index.map(|m| match_ids[m]),
            next_node_id: draft.next.map(|n| node_ids[n]),
            loser_next_node_id: draft.loser_next.map(|n| node_ids[n]),
            expected_entrants: draft.expected_entrants,
        })
        .collect();

    let matches = layout
        .matches
        .iter()
        .enumerate()
        .map(|(idx, draft)| Match {
            id: match_ids[idx],
            tournament_id,
            node_id: node_ids[draft.node],
            team1_id: draft.team1_id,
            team2_id: draft.team2_id,
            round: draft.round.clone(),
            status: MatchStatus::Upcoming,
            winner_id: None,
            completed_at: None,
        })
        .collect();

    BracketGraph {
        tournament_id,
        format: layout.format,
        nodes,
        matches,
        generated_at,
    }
}

/// PostgreSQL implementation of `BracketRepository`
#[derive(Clone)]
pub struct PgBracketRepository {
    pool: PgPool,
}

impl PgBracketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn node_from_row(row: &PgRow) -> BracketResult<BracketNode> {
    let bracket_type: String = row.get("bracket_type");
    Ok(BracketNode {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        round_number: row.get::<i32, _>("round_number") as u32,
        position: row.get::<i32, _>("position") as u32,
        bracket_type: bracket_type.parse()?,
        seed_number: row.get::<Option<i32>, _>("seed_number").map(|s| s as u32),
        bye_team_id: row.get("bye_team_id"),
        match_id: row.get("match_id"),
        next_node_id: row.get("next_node_id"),
        loser_next_node_id: row.get("loser_next_node_id"),
        expected_entrants: row.get::<i16, _>("expected_entrants") as u8,
    })
}

fn match_from_row(row: &PgRow) -> BracketResult<Match> {
    let status: String = row.get("status");
    Ok(Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        node_id: row.get("node_id"),
        team1_id: row.get("team1_id"),
        team2_id: row.get("team2_id"),
        round: row.get("round"),
        status: status.parse()?,
        winner_id: row.get("winner_id"),
        completed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("completed_at")
            .map(|dt| dt.and_utc()),
    })
}

#[async_trait]
impl BracketRepository for PgBracketRepository {
    async fn is_bracket_generated(&self, tournament_id: TournamentId) -> BracketResult<bool> {
        let row = sqlx::query("SELECT 1 FROM tournament_brackets WHERE tournament_id = $1")
            .bind(tournament_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        layout: &BracketLayout,
    ) -> BracketResult<BracketGraph> {
        // Rolled back on drop if anything below fails
        let mut tx = self.pool.begin().await?;

        // Claiming the tournament row doubles as the duplicate-generation guard
        let claimed = sqlx::query(
            r#"
            INSERT INTO tournament_brackets (tournament_id, format)
            VALUES ($1, $2)
            ON CONFLICT (tournament_id) DO NOTHING
            RETURNING generated_at
            "#,
        )
        .bind(tournament_id)
        .bind(layout.format.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let generated_at = match claimed {
            Some(row) => row.get::<chrono::NaiveDateTime, _>("generated_at").and_utc(),
            None => return Err(BracketError::AlreadyGenerated(tournament_id)),
        };

        let mut node_ids = Vec::with_capacity(layout.nodes.len());
        for draft in &layout.nodes {
            let row = sqlx::query(
                r#"
                INSERT INTO bracket_nodes
                    (tournament_id, round_number, position, bracket_type, seed_number,
                     bye_team_id, expected_entrants)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(tournament_id)
            .bind(draft.round_number as i32)
            .bind(draft.position as i32)
            .bind(draft.bracket_type.as_str())
            .bind(draft.seed_number.map(|s| s as i32))
            .bind(draft.bye_team_id)
            .bind(i16::from(draft.expected_entrants))
            .fetch_one(&mut *tx)
            .await?;
            node_ids.push(row.get::<i64, _>("id"));
        }

        let mut match_ids = Vec::with_capacity(layout.matches.len());
        for draft in &layout.matches {
            let row = sqlx::query(
                r#"
                INSERT INTO bracket_matches (tournament_id, node_id, team1_id, team2_id, round, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(tournament_id)
            .bind(node_ids[draft.node])
            .bind(draft.team1_id)
            .bind(draft.team2_id)
            .bind(&draft.round)
            .bind(MatchStatus::Upcoming.as_str())
            .fetch_one(&mut *tx)
            .await?;
            match_ids.push(row.get::<i64, _>("id"));
        }

        // Edges can only be written once every node has an id
        for (idx, draft) in layout.nodes.iter().enumerate() {
            if draft.match_index.is_none() && draft.next.is_none() && draft.loser_next.is_none() {
                continue;
            }
            sqlx::query(
                r#"
                UPDATE bracket_nodes
                SET match_id = $1, next_node_id = $2, loser_next_node_id = $3
                WHERE id = $4
                "#,
            )
            .bind(draft.match_index.map(|m| match_ids[m]))
            .bind(draft.next.map(|n| node_ids[n]))
            .bind(draft.loser_next.map(|n| node_ids[n]))
            .bind(node_ids[idx])
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(materialize(
            tournament_id,
            layout,
            &node_ids,
            &match_ids,
            generated_at,
        ))
    }

    async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> BracketResult<Option<BracketGraph>> {
        let Some(header) = sqlx::query(
            "SELECT format, generated_at FROM tournament_brackets WHERE tournament_id = $1",
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let format: String = header.get("format");
        let format = format
            .parse()
            .map_err(|_| BracketError::InvalidRecord(format!("unknown format '{format}'")))?;

        let node_rows = sqlx::query(
            r#"
            SELECT id, tournament_id, round_number, position, bracket_type, seed_number,
                   bye_team_id, match_id, next_node_id, loser_next_node_id, expected_entrants
            FROM bracket_nodes
            WHERE tournament_id = $1
            ORDER BY id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        let match_rows = sqlx::query(
            r#"
            SELECT id, tournament_id, node_id, team1_id, team2_id, round, status,
                   winner_id, completed_at
            FROM bracket_matches
            WHERE tournament_id = $1
            ORDER BY id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(BracketGraph {
            tournament_id,
            format,
            nodes: node_rows
                .iter()
                .map(node_from_row)
                .collect::<BracketResult<_>>()?,
            matches: match_rows
                .iter()
                .map(match_from_row)
                .collect::<BracketResult<_>>()?,
            generated_at: header
                .get::<chrono::NaiveDateTime, _>("generated_at")
                .and_utc(),
        }))
    }

    async fn find_node(&self, node_id: NodeId) -> BracketResult<Option<BracketNode>> {
        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, round_number, position, bracket_type, seed_number,
                   bye_team_id, match_id, next_node_id, loser_next_node_id, expected_entrants
            FROM bracket_nodes
            WHERE id = $1
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(node_from_row).transpose()
    }

    async fn find_node_by_match(&self, match_id: MatchId) -> BracketResult<Option<BracketNode>> {
        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, round_number, position, bracket_type, seed_number,
                   bye_team_id, match_id, next_node_id, loser_next_node_id, expected_entrants
            FROM bracket_nodes
            WHERE match_id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(node_from_row).transpose()
    }

    async fn find_match(&self, match_id: MatchId) -> BracketResult<Option<Match>> {
        let row = sqlx::query(
            r#"
            SELECT id, tournament_id, node_id, team1_id, team2_id, round, status,
                   winner_id, completed_at
            FROM bracket_matches
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    async fn update_match(&self, updated: &Match) -> BracketResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bracket_matches
            SET team1_id = $1, team2_id = $2, status = $3, winner_id = $4, completed_at = $5
            WHERE id = $6
            "#,
        )
        .bind(updated.team1_id)
        .bind(updated.team2_id)
        .bind(updated.status.as_str())
        .bind(updated.winner_id)
        .bind(updated.completed_at.map(|dt| dt.naive_utc()))
        .bind(updated.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::MatchNotFound(updated.id));
        }
        Ok(())
    }

    async fn update_node(&self, updated: &BracketNode) -> BracketResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bracket_nodes
            SET bye_team_id = $1, match_id = $2, next_node_id = $3, loser_next_node_id = $4
            WHERE id = $5
            "#,
        )
        .bind(updated.bye_team_id)
        .bind(updated.match_id)
        .bind(updated.next_node_id)
        .bind(updated.loser_next_node_id)
        .bind(updated.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::NodeNotFound(
                crate::bracket::errors::NodeLookup::ById(updated.id),
            ));
        }
        Ok(())
    }
}

/// PostgreSQL implementation of `RankingRepository`
#[derive(Clone)]
pub struct PgRankingRepository {
    pool: PgPool,
}

impl PgRankingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RankingRepository for PgRankingRepository {
    async fn ranking_score(&self, team_id: TeamId) -> BracketResult<Option<f64>> {
        let row = sqlx::query("SELECT score FROM team_rankings WHERE team_id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("score")))
    }
}
