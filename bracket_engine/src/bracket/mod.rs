//! Bracket generation and progression.
//!
//! A bracket is an arena of nodes connected by winner and loser edges. The
//! format builders lay the nodes out, the assembler fills in byes and empty
//! matches and persists everything at once, and the advancement engine moves
//! teams along the edges as results come in.
//!
//! Elimination formats are seeded into a power-of-two tree using the canonical
//! seed order, so the top two seeds can only meet in the final. Round robin
//! uses the circle method and has no edges at all.

pub mod advancement;
pub mod assembler;
pub mod builder;
pub mod config;
pub mod double_elimination;
pub mod errors;
pub mod manager;
pub mod models;
pub mod round_robin;
pub mod seeding;
pub mod single_elimination;

pub use advancement::AdvancementEngine;
pub use assembler::BracketAssembler;
pub use builder::{BracketLayout, MatchDraft, NodeDraft};
pub use config::BracketConfig;
pub use errors::{BracketError, BracketResult, NodeLookup};
pub use manager::BracketManager;
pub use models::{
    BracketGraph, BracketNode, BracketType, Match, MatchId, MatchStatus, NodeId, Participant,
    SeedingMethod, TeamId, TournamentDescriptor, TournamentFormat, TournamentId,
};
pub use seeding::{next_power_of_two, seed, seed_order};
