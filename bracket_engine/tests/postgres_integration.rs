//! Integration tests for the PostgreSQL repository.
//!
//! These need a running database with the migrations applied, so they are
//! ignored by default. Run with:
//!
//! ```text
//! DATABASE_URL=postgres://postgres@localhost/brackets_test cargo test -- --ignored
//! ```

use bracket_engine::{
    BracketConfig, BracketError, BracketManager, BracketRepository, BracketType, Database,
    DatabaseConfig, MatchStatus, Participant, SeedingMethod, TournamentDescriptor,
    TournamentFormat, bracket::models::TournamentId,
};
use std::sync::Arc;

/// Helper to create a migrated test database
async fn setup_test_db() -> Database {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/brackets_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");
    db
}

/// Tournament ids are the primary key of the generated stamp, so each run
/// needs fresh ones
fn unique_tournament_id() -> TournamentId {
    let rand_id: u32 = rand::random();
    chrono::Utc::now().timestamp_millis() * 1000 + i64::from(rand_id % 1000)
}

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

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_save_and_load_round_trip() {
    let db = setup_test_db().await;
    let repo = Arc::new(db.bracket_repository());
    let manager = BracketManager::new(repo.clone(), BracketConfig::default());
    let id = unique_tournament_id();

    let saved = manager
        .generate_bracket(descriptor(id, TournamentFormat::DoubleElimination, 6))
        .await
        .expect("generation should succeed");
    let loaded = repo.load_bracket(id).await.unwrap().expect("bracket exists");

    assert_eq!(loaded.nodes, saved.nodes);
    assert_eq!(loaded.matches, saved.matches);
    assert_eq!(loaded.format, TournamentFormat::DoubleElimination);
    assert!(repo.is_bracket_generated(id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_duplicate_generation_rejected() {
    let db = setup_test_db().await;
    let repo = Arc::new(db.bracket_repository());
    let manager = BracketManager::new(repo.clone(), BracketConfig::default());
    let id = unique_tournament_id();

    manager
        .generate_bracket(descriptor(id, TournamentFormat::RoundRobin, 4))
        .await
        .unwrap();

    // A second manager has its own generation locks; the table still refuses
    let other = BracketManager::new(repo, BracketConfig::default());
    let err = other
        .generate_bracket(descriptor(id, TournamentFormat::RoundRobin, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::AlreadyGenerated(got) if got == id));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_result_advances_in_database() {
    let db = setup_test_db().await;
    let repo = Arc::new(db.bracket_repository());
    let manager = BracketManager::new(repo.clone(), BracketConfig::default());
    let id = unique_tournament_id();

    let graph = manager
        .generate_bracket(descriptor(id, TournamentFormat::SingleElimination, 4))
        .await
        .unwrap();
    let semi = graph.round(BracketType::Main, 1)[0].match_id.unwrap();

    let updated = manager.report_result(semi, 1).await.unwrap();
    assert_eq!(updated.len(), 1);

    let stored = repo.find_match(semi).await.unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::Completed);
    assert!(stored.completed_at.is_some());

    let final_node = graph.round(BracketType::Main, 2)[0];
    let final_match = repo
        .find_match(final_node.match_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(final_match.team1_id, Some(1));

    db.close().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_health_check() {
    let db = setup_test_db().await;
    db.health_check().await.expect("Health check failed");
    db.close().await;
}
