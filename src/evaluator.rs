//! Seven-card hand evaluation against the precomputed tables.
//!
//! [`EvaluatorContext`] owns every lookup structure, is built (or loaded)
//! once at startup, and is immutable afterwards, so solver workers can
//! share it by reference. Returned strengths follow one convention
//! throughout the crate: higher = stronger, `2..=7463`.
//!
//! Two equivalent algorithms are exposed. [`EvaluatorContext::evaluate`]
//! probes the per-suit flush table and otherwise canonicalizes the packed
//! hand and hits the rank map: two lookups per evaluation. The slower
//! [`EvaluatorContext::evaluate_by_subsets`] scores all 21 five-card
//! subsets; it exists to cross-check the fast path.

use std::path::Path;

use crate::cards::{pack_cards, suit_mask};
use crate::error::{SolverError, SolverResult};
use crate::rank_map::{canonicalize, RankMap, RANK_MAP_ENTRIES};
use crate::tables::{
    RankTables, FLUSH_TABLE_DENSITY, FULL_HOUSE_FLOOR, HIGH_CARD_FLOOR, MAX_STRENGTH,
    NUM_PRODUCTS, PRIMES, QUADS_FLOOR, STRAIGHT_FLOOR, STRAIGHT_FLUSH_FLOOR, TWO_PAIR_FLOOR,
    UNIQUE5_TABLE_DENSITY,
};

pub struct EvaluatorContext {
    pub tables: RankTables,
    rank_map: RankMap,
}

impl EvaluatorContext {
    /// Build every table from scratch and verify it. Takes well under a
    /// second; the serialized form exists so repeated runs skip the
    /// enumeration.
    pub fn new() -> SolverResult<EvaluatorContext> {
        Self::from_tables(RankTables::build())
    }

    pub fn from_tables(tables: RankTables) -> SolverResult<EvaluatorContext> {
        let ctx = EvaluatorContext { tables, rank_map: RankMap::build() };
        ctx.verify()?;
        Ok(ctx)
    }

    /// Load `path` if it holds a valid table file; otherwise rebuild from
    /// scratch, write the file for next time, and continue. A verification
    /// failure after a rebuild is fatal.
    pub fn load_or_build(path: &Path) -> SolverResult<EvaluatorContext> {
        match RankTables::read_file(path).and_then(Self::from_tables) {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                if path.exists() {
                    eprintln!("warning: {}; regenerating hand rank tables", e);
                }
                let tables = RankTables::build();
                if let Err(write_err) = tables.write_file(path) {
                    eprintln!(
                        "warning: could not write {}: {}",
                        path.display(),
                        write_err
                    );
                }
                Self::from_tables(tables)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Fast path
    // -----------------------------------------------------------------------

    /// Evaluate the union of two packed card sets (hole cards and board,
    /// seven cards total).
    ///
    /// Panics if the canonical key is missing from the rank map. That can
    /// only happen when the verified tables have been corrupted, and no
    /// meaningful recovery exists.
    pub fn evaluate(&self, hand: u64, board: u64) -> u16 {
        let combined = hand | board;

        if let Some(mask) = flush_suit_mask(combined) {
            return self.tables.flush_table[mask as usize];
        }

        let canonical = canonicalize(combined);
        match self.rank_map.get(canonical) {
            Some(strength) => strength,
            None => panic!(
                "rank map probe missed canonical hand {:#018x}; tables are corrupt",
                canonical
            ),
        }
    }

    /// Evaluate seven cards given as indices (0-51).
    pub fn evaluate_cards(&self, cards: &[u8]) -> u16 {
        debug_assert_eq!(cards.len(), 7);
        self.evaluate(pack_cards(cards), 0)
    }

    // -----------------------------------------------------------------------
    // 21-subset path
    // -----------------------------------------------------------------------

    /// Evaluate exactly five cards via the flush / unique5 / product
    /// tables.
    pub fn evaluate_five(&self, cards: [u8; 5]) -> u16 {
        let suit = cards[0] & 3;
        let bits = cards
            .iter()
            .fold(0u16, |b, &c| b | (1 << (c >> 2)));

        if cards.iter().all(|&c| c & 3 == suit) {
            return self.tables.flush_table[bits as usize];
        }
        if bits.count_ones() == 5 {
            return self.tables.unique5_table[bits as usize];
        }
        let product: u32 = cards.iter().map(|&c| PRIMES[(c >> 2) as usize]).product();
        match self.tables.product_strength(product) {
            Some(strength) => strength,
            None => panic!("product table missed {}; tables are corrupt", product),
        }
    }

    /// Evaluate seven cards as the best of their 21 five-card subsets.
    /// Equivalent to [`evaluate`](Self::evaluate), only slower.
    pub fn evaluate_by_subsets(&self, cards: &[u8; 7]) -> u16 {
        let mut best = 0u16;
        for skip_a in 0..6 {
            for skip_b in (skip_a + 1)..7 {
                let mut five = [0u8; 5];
                let mut n = 0;
                for (i, &c) in cards.iter().enumerate() {
                    if i != skip_a && i != skip_b {
                        five[n] = c;
                        n += 1;
                    }
                }
                best = best.max(self.evaluate_five(five));
            }
        }
        best
    }

    // -----------------------------------------------------------------------
    // Verification
    // -----------------------------------------------------------------------

    /// Mandatory startup check: table densities plus a handful of anchor
    /// strengths at category boundaries. A wrong rank anywhere would make
    /// every downstream strategy wrong, so failures are fatal.
    pub fn verify(&self) -> SolverResult<()> {
        let check = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(SolverError::Corrupt(what.to_string()))
            }
        };

        let flush_count = self.tables.flush_table.iter().filter(|&&v| v != 0).count();
        check(flush_count == FLUSH_TABLE_DENSITY, "flush table density")?;
        let unique5_count = self.tables.unique5_table.iter().filter(|&&v| v != 0).count();
        check(unique5_count == UNIQUE5_TABLE_DENSITY, "unique5 table density")?;
        check(self.tables.products.len() == NUM_PRODUCTS, "product table size")?;
        check(self.rank_map.len() == RANK_MAP_ENTRIES, "rank map entry count")?;

        let royal = 0b1_1111_0000_0000u16;
        let wheel = 0b1_0000_0000_1111u16;
        let worst = 0b0_0000_0010_1111u16; // 7-5-4-3-2
        check(
            self.tables.flush_table[royal as usize] == MAX_STRENGTH,
            "royal flush strength",
        )?;
        check(
            self.tables.flush_table[wheel as usize] == STRAIGHT_FLUSH_FLOOR + 1,
            "steel wheel strength",
        )?;
        check(
            self.tables.unique5_table[royal as usize] == STRAIGHT_FLOOR + 10,
            "broadway strength",
        )?;
        check(
            self.tables.unique5_table[wheel as usize] == STRAIGHT_FLOOR + 1,
            "wheel strength",
        )?;
        check(
            self.tables.unique5_table[worst as usize] == HIGH_CARD_FLOOR + 1,
            "worst high card strength",
        )?;

        let quad_aces_king = PRIMES[12].pow(4) * PRIMES[11];
        check(
            self.tables.product_strength(quad_aces_king) == Some(STRAIGHT_FLUSH_FLOOR),
            "quad aces + king strength",
        )?;
        let aces_full_of_kings = PRIMES[12].pow(3) * PRIMES[11].pow(2);
        check(
            self.tables.product_strength(aces_full_of_kings) == Some(QUADS_FLOOR),
            "aces full of kings strength",
        )?;
        let aces_kqj = PRIMES[12].pow(2) * PRIMES[11] * PRIMES[10] * PRIMES[9];
        check(
            self.tables.product_strength(aces_kqj) == Some(TWO_PAIR_FLOOR),
            "best one pair strength",
        )?;
        check(
            self.tables.flush_table[0b1_1110_1000_0000] == FULL_HOUSE_FLOOR,
            "best plain flush strength",
        )?;

        Ok(())
    }
}

/// 13-bit rank set of the first suit holding five or more cards, if any.
#[inline]
fn flush_suit_mask(hand: u64) -> Option<u16> {
    for suit in 0..4u8 {
        let mask = suit_mask(hand, suit);
        if mask.count_ones() >= 5 {
            return Some(mask);
        }
    }
    None
}
