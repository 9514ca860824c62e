//! Participant seeding and canonical bracket seed order.

use super::{
    errors::{BracketError, BracketResult},
    models::{Participant, SeedingMethod},
};
use rand::{Rng, seq::SliceRandom};
use std::cmp::Ordering;

/// Order participants by `method` and stamp `seed_number = index + 1`.
///
/// Only `seed_number` is modified. Empty and single-element lists are
/// accepted; the builders reject them.
pub fn seed(participants: &mut [Participant], method: SeedingMethod) {
    seed_with_rng(participants, method, &mut rand::rng());
}

/// Same as [`seed`] with a caller-supplied RNG for reproducible draws
pub fn seed_with_rng<R: Rng + ?Sized>(
    participants: &mut [Participant],
    method: SeedingMethod,
    rng: &mut R,
) {
    match method {
        // Fisher-Yates
        SeedingMethod::Random => participants.shuffle(rng),
        // `sort_by` is stable: ties keep their original order
        SeedingMethod::RankingBased => participants.sort_by(compare_rankings),
        SeedingMethod::Manual => participants.sort_by(compare_manual_seeds),
    }

    for (idx, participant) in participants.iter_mut().enumerate() {
        participant.seed_number = Some(idx as u32 + 1);
    }
}

/// Higher score first, unranked last
fn compare_rankings(a: &Participant, b: &Participant) -> Ordering {
    match (a.ranking_score, b.ranking_score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Lower seed first, unseeded last
fn compare_manual_seeds(a: &Participant, b: &Participant) -> Ordering {
    match (a.seed_number, b.seed_number) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Smallest power of two that is `>= n` (1 for `n == 0`)
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Canonical pairing order for a bracket of `bracket_size` slots.
///
/// Consecutive entries form the opening pairings. The list is built by
/// doubling: each favourite `s` of the half-size bracket is expanded into
/// `[s, bracket_size + 1 - s]`. The favourites list itself doubles the same
/// way but mirrors every second pairing, so seed 2 always lands in the last
/// pairing and can only meet seed 1 in the final.
///
/// ```
/// use bracket_engine::bracket::seeding::seed_order;
///
/// assert_eq!(seed_order(8).unwrap(), vec![1, 8, 4, 5, 3, 6, 2, 7]);
/// ```
pub fn seed_order(bracket_size: usize) -> BracketResult<Vec<u32>> {
    if bracket_size < 2 || !bracket_size.is_power_of_two() {
        return Err(BracketError::InvalidBracketSize(bracket_size));
    }

    let half = bracket_size / 2;
    let mut favourites = vec![1u32];
    while favourites.len() < half {
        let sum = favourites.len() as u32 * 2 + 1;
        favourites = favourites
            .iter()
            .enumerate()
            .flat_map(|(idx, &s)| {
                if idx % 2 == 0 {
                    [s, sum - s]
                } else {
                    [sum - s, s]
                }
            })
            .collect();
    }

    let sum = bracket_size as u32 + 1;
    Ok(favourites.iter().flat_map(|&s| [s, sum - s]).collect())
}
