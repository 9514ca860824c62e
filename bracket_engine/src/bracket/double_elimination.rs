//! Double-elimination builder: winners bracket, losers bracket, grand final.
//!
//! With `R = log2(bracket_size)` the losers bracket has `2R - 1` rounds.
//! Even rounds take the losers dropping out of the winners bracket, odd rounds
//! pair losers-bracket survivors. Drop edges are wired here:
//!
//! - winners round 1, position `p` loses into losers round 1, `p / 2`
//! - winners round `r >= 2`, position `p` loses into losers round `2r - 2`, `p`
//! - losers odd round `L`, position `p` advances to `L + 1`, `p`
//! - losers even round `L`, position `p` advances to `L + 1`, `p / 2`
//! - the last losers round and the winners final feed the grand final
//!
//! The last losers round has a single node that receives only the losers
//! champion and hands them to the grand final.

use super::{
    builder::{self, BracketLayout, NodeDraft},
    errors::{BracketError, BracketResult},
    models::{BracketType, Participant, TournamentFormat},
    seeding,
};

/// Node count of losers round `round` in a bracket with `winners_rounds` rounds
pub fn losers_round_positions(winners_rounds: u32, round: u32) -> usize {
    let exponent = if round % 2 == 0 {
        winners_rounds as i64 - round.div_ceil(2) as i64 - 1
    } else {
        winners_rounds as i64 - (round + 1).div_ceil(2) as i64 - 1
    };
    if exponent < 0 { 1 } else { 1 << exponent }
}

/// Build a double-elimination layout
pub fn build(seeded: &[Participant], order: &[u32]) -> BracketResult<BracketLayout> {
    if seeded.len() < 2 {
        return Err(BracketError::InsufficientParticipants(seeded.len()));
    }

    let bracket_size = seeding::next_power_of_two(seeded.len());
    let mut layout = BracketLayout::new(TournamentFormat::DoubleElimination, bracket_size);

    let winners = builder::push_elimination_tree(
        &mut layout,
        seeded,
        order,
        BracketType::Winners,
        "Winners ",
    )?;
    let winners_rounds = winners.len() as u32;
    let losers_rounds = 2 * winners_rounds - 1;

    let mut losers: Vec<Vec<usize>> = Vec::with_capacity(losers_rounds as usize);
    for round_number in 1..=losers_rounds {
        let label = format!("Losers Round {round_number}");
        let indices = (0..losers_round_positions(winners_rounds, round_number))
            .map(|position| {
                layout.push_node(NodeDraft::new(
                    BracketType::Losers,
                    round_number,
                    position as u32,
                    label.clone(),
                ))
            })
            .collect();
        losers.push(indices);
    }

    let grand_final = layout.push_node(NodeDraft::new(
        BracketType::GrandFinal,
        1,
        0,
        "Grand Final",
    ));

    // Winners bracket: final into the grand final, every loser into the losers bracket
    for (round_idx, round) in winners.iter().enumerate() {
        let round_number = round_idx as u32 + 1;
        for (position, &idx) in round.iter().enumerate() {
            if round_number == winners_rounds {
                layout.nodes[idx].next = Some(grand_final);
            }
            let drop = if round_number == 1 {
                losers[0][position / 2]
            } else {
                losers[(2 * round_number - 3) as usize][position]
            };
            layout.nodes[idx].loser_next = Some(drop);
        }
    }

    for (round_idx, round) in losers.iter().enumerate() {
        let round_number = round_idx as u32 + 1;
        for (position, &idx) in round.iter().enumerate() {
            let next = if round_number == losers_rounds {
                grand_final
            } else if round_number % 2 == 1 {
                losers[round_idx + 1][position]
            } else {
                losers[round_idx + 1][position / 2]
            };
            layout.nodes[idx].next = Some(next);
        }
    }

    log::debug!(
        "Built double elimination: {} participants, {} winners rounds, {} losers rounds",
        seeded.len(),
        winners_rounds,
        losers_rounds
    );

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_for(n: i64) -> BracketLayout {
        let field: Vec<Participant> = (1..=n)
            .map(|id| Participant::new(id).with_seed(id as u32))
            .collect();
        let order = seeding::seed_order(seeding::next_power_of_two(field.len())).unwrap();
        build(&field, &order).unwrap()
    }

    #[test]
    fn test_losers_round_positions() {
        // 8-slot bracket: 2, 2, 1, 1, 1
        let counts: Vec<usize> = (1..=5).map(|r| losers_round_positions(3, r)).collect();
        assert_eq!(counts, vec![2, 2, 1, 1, 1]);
        // 16-slot bracket
        let counts: Vec<usize> = (1..=7).map(|r| losers_round_positions(4, r)).collect();
        assert_eq!(counts, vec![4, 4, 2, 2, 1, 1, 1]);
        assert_eq!(losers_round_positions(1, 1), 1);
    }

    #[test]
    fn test_four_teams() {
        let layout = layout_for(4);
        assert_eq!(layout.round_count(BracketType::Winners), 2);
        assert_eq!(layout.round_count(BracketType::Losers), 3);
        let grand_finals: Vec<&NodeDraft> = layout
            .nodes
            .iter()
            .filter(|n| n.bracket_type == BracketType::GrandFinal)
            .collect();
        assert_eq!(grand_finals.len(), 1);
        assert!(grand_finals[0].next.is_none());
        assert_eq!(grand_finals[0].label, "Grand Final");
    }

    #[test]
    fn test_winners_nodes_have_both_edges() {
        for n in [2, 3, 4, 6, 8, 13, 16] {
            let layout = layout_for(n);
            for node in layout.nodes.iter().filter(|n| n.bracket_type == BracketType::Winners) {
                assert!(node.next.is_some(), "winners node without winner edge ({n})");
                let drop = node.loser_next.expect("winners node without loser edge");
                assert_eq!(layout.nodes[drop].bracket_type, BracketType::Losers);
            }
        }
    }

    #[test]
    fn test_losers_nodes_only_have_winner_edges() {
        let layout = layout_for(8);
        for node in layout.nodes.iter().filter(|n| n.bracket_type == BracketType::Losers) {
            assert!(node.next.is_some());
            assert!(node.loser_next.is_none());
        }
    }

    #[test]
    fn test_drop_targets_for_eight() {
        let layout = layout_for(8);
        let losers_round = |idx: usize| {
            let target = layout.nodes[idx].loser_next.unwrap();
            (layout.nodes[target].round_number, layout.nodes[target].position)
        };

        let w1 = layout.round(BracketType::Winners, 1);
        let targets: Vec<(u32, u32)> = w1.iter().map(|&i| losers_round(i)).collect();
        assert_eq!(targets, vec![(1, 0), (1, 0), (1, 1), (1, 1)]);

        let w2 = layout.round(BracketType::Winners, 2);
        let targets: Vec<(u32, u32)> = w2.iter().map(|&i| losers_round(i)).collect();
        assert_eq!(targets, vec![(2, 0), (2, 1)]);

        let w3 = layout.round(BracketType::Winners, 3);
        assert_eq!(losers_round(w3[0]), (4, 0));
    }

    #[test]
    fn test_edges_point_forward() {
        for n in [2, 5, 8, 11, 32] {
            let layout = layout_for(n);
            for (idx, node) in layout.nodes.iter().enumerate() {
                for target in [node.next, node.loser_next].into_iter().flatten() {
                    assert!(target > idx);
                }
            }
        }
    }

    #[test]
    fn test_every_non_terminal_node_has_one_winner_edge() {
        let layout = layout_for(16);
        let terminals: Vec<&NodeDraft> = layout.nodes.iter().filter(|n| n.next.is_none()).collect();
        assert_eq!(terminals.len(), 1);
        assert_eq!(terminals[0].bracket_type, BracketType::GrandFinal);
    }

    #[test]
    fn test_labels() {
        let layout = layout_for(8);
        let w3 = layout.round(BracketType::Winners, 3);
        assert_eq!(layout.nodes[w3[0]].label, "Winners Final");
        let l2 = layout.round(BracketType::Losers, 2);
        assert_eq!(layout.nodes[l2[0]].label, "Losers Round 2");
    }
}
