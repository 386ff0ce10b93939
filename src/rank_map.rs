//! Canonical packed hands and the precomputed 7-card rank map.
//!
//! Two 7-card hands with the same rank multiset canonicalize to the same
//! 64-bit value: ranks are consumed low to high, and the k-th copy of a
//! rank is assigned suit `SUIT_PERMUTATION[k]`. The map stores the
//! strength of every one of the 49,205 distinct non-flush rank multisets,
//! keyed by canonical hand, in a 65,536-slot open-addressed table. Slots
//! carry the full key so hash collisions resolve by linear probing; a
//! zero key marks an empty slot (no legal hand packs to zero).

use crate::tables::{
    straight_high, CHOOSE, FIVE_RANK_INDEX, FULL_HOUSE_FLOOR, HIGH_CARD_FLOOR, ONE_PAIR_FLOOR,
    QUADS_FLOOR, TRIPS_FLOOR, TWO_PAIR_FLOOR,
};

pub const RANK_MAP_SIZE: usize = 0x10000;
const RANK_MAP_MASK: usize = RANK_MAP_SIZE - 1;
/// Multiplier for the folded multiplicative hash.
const RANK_HASH_MAGIC: u32 = 0xE91A_AA35;
/// Distinct 7-card rank multisets with at most four copies of a rank.
pub const RANK_MAP_ENTRIES: usize = 49_205;

/// Suit assigned to the k-th copy of a rank during canonicalization. Any
/// fixed permutation works as long as build and lookup agree.
const SUIT_PERMUTATION: [u8; 4] = [1, 0, 3, 2];

/// Fold a packed hand to 32 bits and spread it with a multiplicative hash.
#[inline]
pub fn fold_hash(hand: u64) -> u16 {
    let folded = ((hand >> 32) as u32) ^ (hand as u32);
    ((folded as u64 * RANK_HASH_MAGIC as u64) >> 16) as u16
}

/// Rewrite a packed hand so that any suit labeling of the same rank
/// multiset yields the identical 64-bit value.
pub fn canonicalize(hand: u64) -> u64 {
    let mut out = 0u64;
    for rank in 0..13u32 {
        let mut copies = 0usize;
        for suit in 0..4u32 {
            if hand >> (16 * suit) & 0x1FFF & (1 << rank) != 0 {
                out |= 1u64 << (rank + 16 * SUIT_PERMUTATION[copies] as u32);
                copies += 1;
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Seven-card non-flush scoring
// ---------------------------------------------------------------------------

/// Strength of a 7-card non-flush hand given its seven rank indices (any
/// order). Assigns each category's interval a contiguous enumeration; the
/// kicker normalization reindexes kickers into the 12-rank universe that
/// remains once the group rank is removed.
pub fn score_ranks(ranks: &[u8; 7]) -> u16 {
    let mut counts = [0u8; 13];
    let mut rank_mask = 0u16;
    for &r in ranks {
        counts[r as usize] += 1;
        rank_mask |= 1 << r;
    }

    // Group ranks, scanning ace down. A second trips counts as a pair for
    // full-house purposes.
    let mut quads = None;
    let mut trips = None;
    let mut high_pair = None;
    let mut low_pair = None;
    for r in (0..13usize).rev() {
        match counts[r] {
            4 => quads = Some(r),
            3 => {
                if trips.is_none() {
                    trips = Some(r);
                } else if high_pair.is_none() {
                    high_pair = Some(r);
                }
            }
            2 => {
                if high_pair.is_none() {
                    high_pair = Some(r);
                } else if low_pair.is_none() {
                    low_pair = Some(r);
                }
            }
            _ => {}
        }
    }

    if let Some(q) = quads {
        let mut kicker = 0usize;
        for r in (0..13usize).rev() {
            if counts[r] > 0 && r != q {
                kicker = r;
                break;
            }
        }
        let k = if kicker > q { kicker - 1 } else { kicker };
        return QUADS_FLOOR + (q * 12 + k) as u16 + 1;
    }

    if let (Some(t), Some(p)) = (trips, high_pair) {
        let pn = if p > t { p - 1 } else { p };
        return FULL_HOUSE_FLOOR + (t * 12 + pn) as u16 + 1;
    }

    if let Some(high) = straight_high(rank_mask) {
        return crate::tables::STRAIGHT_FLOOR + if high == 3 { 1 } else { (high - 4) as u16 + 2 };
    }

    if let Some(t) = trips {
        let mut kicker_high = 0usize;
        let mut kicker_low = 0usize;
        let mut found = 0;
        for r in (0..13usize).rev() {
            if counts[r] > 0 && r != t {
                if found == 0 {
                    kicker_high = r;
                    found = 1;
                } else {
                    kicker_low = r;
                    break;
                }
            }
        }
        let kh = if kicker_high > t { kicker_high - 1 } else { kicker_high };
        let kl = if kicker_low > t { kicker_low - 1 } else { kicker_low };
        return TRIPS_FLOOR + (t as u16 * 66) + (CHOOSE[kh][2] + CHOOSE[kl][1]) as u16 + 1;
    }

    if let (Some(hp), Some(lp)) = (high_pair, low_pair) {
        let mut kicker = 0usize;
        for r in (0..13usize).rev() {
            if counts[r] > 0 && r != hp && r != lp {
                kicker = r;
                break;
            }
        }
        if kicker > hp {
            kicker -= 1;
        }
        if kicker > lp {
            kicker -= 1;
        }
        let pairs = (CHOOSE[hp][2] + CHOOSE[lp][1]) as u16;
        return TWO_PAIR_FLOOR + pairs * 11 + kicker as u16 + 1;
    }

    if let Some(p) = high_pair {
        let mut kickers = [0usize; 3];
        let mut found = 0;
        for r in (0..13usize).rev() {
            if counts[r] > 0 && r != p {
                kickers[found] = if r > p { r - 1 } else { r };
                found += 1;
                if found == 3 {
                    break;
                }
            }
        }
        let score =
            (CHOOSE[kickers[0]][3] + CHOOSE[kickers[1]][2] + CHOOSE[kickers[2]][1]) as u16;
        return ONE_PAIR_FLOOR + p as u16 * 220 + score + 1;
    }

    // High card: seven distinct ranks, none forming a straight. Keep the
    // top five and index densely among non-straight 5-rank sets.
    let mut best5 = rank_mask;
    best5 &= best5 - 1;
    best5 &= best5 - 1;
    HIGH_CARD_FLOOR + FIVE_RANK_INDEX[best5 as usize] + 1
}

// ---------------------------------------------------------------------------
// RankMap
// ---------------------------------------------------------------------------

pub struct RankMap {
    keys: Vec<u64>,
    strengths: Vec<u16>,
    len: usize,
}

impl RankMap {
    /// Exhaustively enumerate every 7-card rank multiset in one canonical
    /// suit layout, score it, and insert it keyed by the canonical hand.
    pub fn build() -> RankMap {
        let mut map = RankMap {
            keys: vec![0u64; RANK_MAP_SIZE],
            strengths: vec![0u16; RANK_MAP_SIZE],
            len: 0,
        };
        let mut ranks = [0u8; 7];
        map.generate(0, 0, 0, &mut ranks);
        map
    }

    fn generate(&mut self, depth: usize, start_rank: u8, hand: u64, ranks: &mut [u8; 7]) {
        if depth == 7 {
            let strength = score_ranks(ranks);
            self.insert(hand, strength);
            return;
        }
        for rank in start_rank..13 {
            let copies = ranks[..depth].iter().filter(|&&r| r == rank).count();
            if copies >= 4 {
                continue;
            }
            ranks[depth] = rank;
            let card = 1u64 << (rank as u32 + 16 * SUIT_PERMUTATION[copies] as u32);
            self.generate(depth + 1, rank, hand | card, ranks);
        }
    }

    fn insert(&mut self, key: u64, strength: u16) {
        let mut idx = fold_hash(key) as usize;
        while self.keys[idx] != 0 && self.keys[idx] != key {
            idx = (idx + 1) & RANK_MAP_MASK;
        }
        if self.keys[idx] == 0 {
            self.keys[idx] = key;
            self.strengths[idx] = strength;
            self.len += 1;
        }
    }

    /// Look up a canonical hand. `None` means the probe hit an empty slot,
    /// which for a legal 7-card hand indicates table corruption.
    pub fn get(&self, canonical: u64) -> Option<u16> {
        let mut idx = fold_hash(canonical) as usize;
        loop {
            let key = self.keys[idx];
            if key == canonical {
                return Some(self.strengths[idx]);
            }
            if key == 0 {
                return None;
            }
            idx = (idx + 1) & RANK_MAP_MASK;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied slots as (slot index, key, strength); used by the
    /// verification pass and tests.
    pub fn slots(&self) -> impl Iterator<Item = (usize, u64, u16)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, &k)| k != 0)
            .map(move |(i, &k)| (i, k, self.strengths[i]))
    }
}
