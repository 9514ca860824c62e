//! Bracket Generation Example
//!
//! Generates a double-elimination bracket for a seven-team field, plays the
//! opening round and prints the resulting bracket as JSON.
//!
//! ```text
//! RUST_LOG=info cargo run --example generate_bracket
//! ```

use anyhow::Context;
use bracket_engine::{
    BracketConfig, BracketManager, BracketType, MemoryBracketRepository, Participant,
    SeedingMethod, TournamentDescriptor, TournamentFormat,
};
use std::sync::Arc;

const TEAMS: [&str; 7] = [
    "Aurora", "Basilisk", "Cinder", "Drift", "Ember", "Falcon", "Glacier",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let repo = Arc::new(
        MemoryBracketRepository::new()
            .with_ranking(1, 1840.0)
            .with_ranking(2, 1710.0)
            .with_ranking(3, 1995.0)
            .with_ranking(5, 1620.0),
    );
    let manager =
        BracketManager::new(repo.clone(), BracketConfig::from_env()).with_rankings(repo);

    let participants = TEAMS
        .iter()
        .zip(1..)
        .map(|(name, id)| Participant::new(id).with_name(*name))
        .collect();

    let graph = manager
        .generate_bracket(TournamentDescriptor {
            id: 1,
            format: TournamentFormat::DoubleElimination,
            seeding_method: SeedingMethod::RankingBased,
            participants,
        })
        .await
        .context("generating bracket")?;

    println!("=== Opening round ===");
    for node in graph.round(BracketType::Winners, 1) {
        match (node.bye_team_id, node.match_id) {
            (Some(team), _) => println!("  seed {:?}: team {team} has a bye", node.seed_number),
            (None, Some(match_id)) => {
                let m = graph
                    .match_by_id(match_id)
                    .context("match missing from graph")?;
                println!(
                    "  seed {:?}: team {:?} vs team {:?}",
                    node.seed_number, m.team1_id, m.team2_id
                );
            }
            (None, None) => {}
        }
    }

    // Lower team id wins every opening match
    for m in graph.playable_matches() {
        let (Some(a), Some(b)) = (m.team1_id, m.team2_id) else {
            continue;
        };
        let updated = manager.report_result(m.id, a.min(b)).await?;
        println!("Match {} won by team {}, {} matches updated", m.id, a.min(b), updated.len());
    }

    let current = manager
        .load_bracket(1)
        .await?
        .context("bracket disappeared")?;
    println!("\n=== Bracket ===\n{}", current.to_json()?);

    Ok(())
}
