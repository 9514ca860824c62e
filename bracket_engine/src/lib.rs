//! # Bracket Engine
//!
//! Seeding, bracket construction and result advancement for tournaments.
//!
//! Three formats are supported:
//!
//! - **Single elimination**: seeded power-of-two tree, byes for the top seeds
//! - **Double elimination**: winners bracket, losers bracket and a grand final
//! - **Round robin**: every pair meets once, scheduled with the circle method
//!
//! ## Core Modules
//!
//! - [`bracket`]: models, seeding, builders, assembly and advancement
//! - [`db`]: repository traits with PostgreSQL and in-memory backends
//! - [`sync`]: the keyed async mutex guarding node updates
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use bracket_engine::{
//!     BracketConfig, BracketManager, MemoryBracketRepository, Participant, SeedingMethod,
//!     TournamentDescriptor, TournamentFormat,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), bracket_engine::BracketError> {
//! let manager = BracketManager::new(
//!     Arc::new(MemoryBracketRepository::new()),
//!     BracketConfig::default(),
//! );
//!
//! let graph = manager
//!     .generate_bracket(TournamentDescriptor {
//!         id: 1,
//!         format: TournamentFormat::SingleElimination,
//!         seeding_method: SeedingMethod::Random,
//!         participants: (1..=5).map(Participant::new).collect(),
//!     })
//!     .await?;
//!
//! assert_eq!(graph.playable_matches().len(), 2);
//! # Ok(())
//! # }
//! ```

/// Bracket models, builders and the advancement engine.
pub mod bracket;
pub use bracket::{
    AdvancementEngine, BracketConfig, BracketError, BracketGraph, BracketManager, BracketNode,
    BracketResult, BracketType, Match, MatchStatus, Participant, SeedingMethod,
    TournamentDescriptor, TournamentFormat,
};

/// Persistence layer.
pub mod db;
pub use db::{BracketRepository, Database, DatabaseConfig, MemoryBracketRepository};

/// Keyed locking primitives.
pub mod sync;
pub use sync::KeyedMutex;
