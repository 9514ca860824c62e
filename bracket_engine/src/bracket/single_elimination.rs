//! Single-elimination builder.

use super::{
    builder::{self, BracketLayout},
    errors::{BracketError, BracketResult},
    models::{BracketType, Participant, TournamentFormat},
    seeding,
};

/// Build a single-elimination layout.
///
/// Opening-round nodes pair `order[2p]` against `order[2p + 1]`; a seed past
/// the field size is a bye and stamps `bye_team_id` instead of creating a
/// match. Later rounds are empty advancement targets.
pub fn build(seeded: &[Participant], order: &[u32]) -> BracketResult<BracketLayout> {
    if seeded.len() < 2 {
        return Err(BracketError::InsufficientParticipants(seeded.len()));
    }

    let bracket_size = seeding::next_power_of_two(seeded.len());
    let mut layout = BracketLayout::new(TournamentFormat::SingleElimination, bracket_size);
    builder::push_elimination_tree(&mut layout, seeded, order, BracketType::Main, "")?;

    log::debug!(
        "Built single elimination: {} participants, size {}, {} byes",
        seeded.len(),
        bracket_size,
        bracket_size - seeded.len()
    );

    Ok(layout)
}
