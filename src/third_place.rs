use rand::Rng;
use rand::seq::SliceRandom;

use crate::group::{Standing, compare_records};

/// Upper bound on candidate tries per assignment.
pub const ASSIGN_ATTEMPT_BUDGET: u32 = 10_000;

/// A knockout side filled by a best third-placed team. `pool` is a bitmask
/// over group indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThirdSlot {
    pub fixture: u32,
    pub pool: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThirdPlaceRecord {
    pub group: usize,
    pub standing: Standing,
}

/// Same criteria as inside a group; anything still level goes by group order.
pub fn rank_thirds(records: &mut [ThirdPlaceRecord]) {
    records.sort_by(|a, b| compare_records(&a.standing, &b.standing).then(a.group.cmp(&b.group)));
}

pub fn qualifying_mask(ranked: &[ThirdPlaceRecord], count: usize) -> u16 {
    ranked
        .iter()
        .take(count)
        .fold(0u16, |mask, r| mask | (1 << r.group))
}

/// Seat one qualifying group in each slot, drawn from the slot's pool.
/// Returns the group index per slot, or `None` when no assignment was found
/// within `ASSIGN_ATTEMPT_BUDGET` tries.
pub fn assign_third_place<R: Rng>(rng: &mut R, qualifying: u16, slots: &[ThirdSlot]) -> Option<Vec<usize>> {
    assign_third_place_pinned(rng, qualifying, slots, &[])
}

/// As `assign_third_place`, but slot `i` may only take group `pins[i]` when
/// that is set. Missing trailing entries are unpinned.
pub fn assign_third_place_pinned<R: Rng>(
    rng: &mut R,
    qualifying: u16,
    slots: &[ThirdSlot],
    pins: &[Option<usize>],
) -> Option<Vec<usize>> {
    let mut budget = ASSIGN_ATTEMPT_BUDGET;
    let mut assigned = extend(rng, slots, pins, qualifying, 0, &mut budget)?;
    assigned.reverse();
    Some(assigned)
}

// Fills `slots` front to back; the returned vec is built on the way out, so
// it comes back last slot first.
fn extend<R: Rng>(
    rng: &mut R,
    slots: &[ThirdSlot],
    pins: &[Option<usize>],
    qualifying: u16,
    used: u16,
    budget: &mut u32,
) -> Option<Vec<usize>> {
    let Some((slot, rest)) = slots.split_first() else {
        return Some(Vec::with_capacity(16));
    };
    let (pin, rest_pins) = match pins.split_first() {
        Some((pin, rest_pins)) => (*pin, rest_pins),
        None => (None, pins),
    };

    let open = slot.pool & qualifying & !used;
    let mut candidates = match pin {
        Some(group) if group < 16 && open & (1 << group) != 0 => vec![group],
        Some(_) => Vec::new(),
        None => groups_in(open),
    };
    candidates.shuffle(rng);

    for group in candidates {
        if *budget == 0 {
            return None;
        }
        *budget -= 1;
        if let Some(mut tail) = extend(rng, rest, rest_pins, qualifying, used | (1 << group), budget) {
            tail.push(group);
            return Some(tail);
        }
    }
    None
}

fn groups_in(mask: u16) -> Vec<usize> {
    (0..16).filter(|g| mask & (1 << g) != 0).collect()
}

/// Every way of picking `slots.len()` qualifying groups out of `group_count`
/// must admit a full assignment. Returns the first qualifying mask that does not.
pub fn check_pools_feasible(slots: &[ThirdSlot], group_count: usize) -> Result<(), u16> {
    if slots.is_empty() {
        return Ok(());
    }
    let k = slots.len() as u32;
    let limit: u32 = 1 << group_count;
    for mask in 0..limit {
        if mask.count_ones() != k {
            continue;
        }
        let mask = mask as u16;
        if !has_matching(slots, mask, 0) {
            return Err(mask);
        }
    }
    Ok(())
}

fn has_matching(slots: &[ThirdSlot], qualifying: u16, used: u16) -> bool {
    let Some((slot, rest)) = slots.split_first() else {
        return true;
    };
    let mut options = slot.pool & qualifying & !used;
    while options != 0 {
        let group = options.trailing_zeros();
        options &= options - 1;
        if has_matching(rest, qualifying, used | (1 << group)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn mask(groups: &str) -> u16 {
        groups
            .chars()
            .fold(0, |m, c| m | (1 << (c as u8 - b'A')))
    }

    fn record(group: usize, points: u32, gf: u32, ga: u32) -> ThirdPlaceRecord {
        ThirdPlaceRecord {
            group,
            standing: Standing {
                team: group * 4 + 2,
                played: 3,
                points,
                goals_for: gf,
                goals_against: ga,
            },
        }
    }

    #[test]
    fn thirds_rank_by_record_then_group() {
        let mut records = vec![
            record(0, 3, 2, 3),
            record(1, 4, 3, 3),
            record(2, 3, 2, 3),
            record(3, 3, 4, 2),
        ];
        rank_thirds(&mut records);
        let order: Vec<usize> = records.iter().map(|r| r.group).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert_eq!(qualifying_mask(&records, 2), 0b1010);
    }

    #[test]
    fn disjoint_pools_assign_exactly() {
        let slots = [
            ThirdSlot { fixture: 1, pool: mask("AB") },
            ThirdSlot { fixture: 2, pool: mask("B") },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let got = assign_third_place(&mut rng, mask("AB"), &slots).unwrap();
        assert_eq!(got, vec![0, 1]);
    }

    #[test]
    fn impossible_assignment_is_none() {
        let slots = [
            ThirdSlot { fixture: 1, pool: mask("A") },
            ThirdSlot { fixture: 2, pool: mask("A") },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert!(assign_third_place(&mut rng, mask("AB"), &slots).is_none());
        assert_eq!(check_pools_feasible(&slots, 2), Err(mask("AB")));
    }

    #[test]
    fn shuffling_varies_the_assignment() {
        let slots = [
            ThirdSlot { fixture: 1, pool: mask("AB") },
            ThirdSlot { fixture: 2, pool: mask("AB") },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            seen.insert(assign_third_place(&mut rng, mask("AB"), &slots).unwrap());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn pinned_slot_always_gets_its_group() {
        let slots = [
            ThirdSlot { fixture: 1, pool: mask("ABC") },
            ThirdSlot { fixture: 2, pool: mask("ABC") },
            ThirdSlot { fixture: 3, pool: mask("ABC") },
        ];
        let pins = [None, Some(2), None];
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        for _ in 0..50 {
            let got = assign_third_place_pinned(&mut rng, mask("ABC"), &slots, &pins).unwrap();
            assert_eq!(got[1], 2);
        }
    }

    #[test]
    fn pin_outside_the_qualifiers_fails() {
        let slots = [
            ThirdSlot { fixture: 1, pool: mask("ABC") },
            ThirdSlot { fixture: 2, pool: mask("ABC") },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        assert!(assign_third_place_pinned(&mut rng, mask("AB"), &slots, &[Some(2)]).is_none());
    }
}
