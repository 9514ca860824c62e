//! Round-robin scheduler (circle method).

use super::{
    builder::{BracketLayout, NodeDraft},
    errors::{BracketError, BracketResult},
    models::{BracketType, Participant, TeamId, TournamentFormat},
};

/// Number of rounds needed for `participants` teams
pub fn round_count(participants: usize) -> usize {
    if participants < 2 {
        0
    } else if participants % 2 == 0 {
        participants - 1
    } else {
        participants
    }
}

/// Build the full schedule.
///
/// Slot 0 stays fixed while the other slots rotate one step per round. An odd
/// field gets a virtual bye slot; whoever is paired with it sits the round out.
/// Every match gets its own `Main` node with no edges.
pub fn build(seeded: &[Participant]) -> BracketResult<BracketLayout> {
    if seeded.len() < 2 {
        return Err(BracketError::InsufficientParticipants(seeded.len()));
    }

    let mut slots: Vec<Option<TeamId>> = seeded.iter().map(|p| Some(p.team_id)).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }

    let slot_count = slots.len();
    let mut layout = BracketLayout::new(TournamentFormat::RoundRobin, seeded.len());

    for round_idx in 0..slot_count - 1 {
        let round_number = round_idx as u32 + 1;
        let mut position = 0u32;

        for i in 0..slot_count / 2 {
            if let (Some(home), Some(away)) = (slots[i], slots[slot_count - 1 - i]) {
                let node = layout.push_node(NodeDraft::new(
                    BracketType::Main,
                    round_number,
                    position,
                    format!("Round {round_number}"),
                ));
                layout.push_match(node, Some(home), Some(away));
                position += 1;
            }
        }

        slots[1..].rotate_right(1);
    }

    log::debug!(
        "Built round robin: {} participants, {} rounds, {} matches",
        seeded.len(),
        slot_count - 1,
        layout.matches.len()
    );

    Ok(layout)
}
