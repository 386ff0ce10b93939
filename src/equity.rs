//! Monte Carlo hand-vs-hand equity.
//!
//! Deals random runouts for a fixed matchup and compares evaluator
//! strengths. Simulation batches fan out across rayon workers; the
//! evaluator tables are shared read-only.

use std::fmt;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::cards::remaining_deck;
use crate::error::{SolverError, SolverResult};
use crate::evaluator::EvaluatorContext;

pub struct EquityResult {
    pub win: f64,
    pub tie: f64,
    pub lose: f64,
    pub simulations: usize,
}

impl EquityResult {
    pub fn equity(&self) -> f64 {
        self.win + self.tie / 2.0
    }
}

impl fmt::Display for EquityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Win {:.1}% | Tie {:.1}% | Lose {:.1}% (equity: {:.1}%)",
            self.win * 100.0,
            self.tie * 100.0,
            self.lose * 100.0,
            self.equity() * 100.0,
        )
    }
}

/// Hand-vs-hand equity over `simulations` random runouts of the given
/// partial board (which may be empty).
pub fn equity_vs_hand(
    evaluator: &EvaluatorContext,
    hand1: (u8, u8),
    hand2: (u8, u8),
    board: &[u8],
    simulations: usize,
) -> SolverResult<EquityResult> {
    let mut dead = vec![hand1.0, hand1.1, hand2.0, hand2.1];
    dead.extend_from_slice(board);
    {
        let mut sorted = dead.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(SolverError::CardConflict);
        }
    }

    let remaining = remaining_deck(&dead);
    let cards_needed = 5 - board.len();

    const BATCH: usize = 4096;
    let batches = simulations.div_ceil(BATCH);

    let totals: (u64, u64, u64) = (0..batches)
        .into_par_iter()
        .map(|batch| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(
                rand::random::<u64>() ^ (batch as u64),
            );
            let mut deck = remaining.clone();
            let sims = BATCH.min(simulations - batch * BATCH);
            let mut wins = 0u64;
            let mut ties = 0u64;
            let mut losses = 0u64;

            for _ in 0..sims {
                deck.partial_shuffle(&mut rng, cards_needed);

                let mut all1 = [0u8; 7];
                let mut all2 = [0u8; 7];
                all1[0] = hand1.0;
                all1[1] = hand1.1;
                all2[0] = hand2.0;
                all2[1] = hand2.1;
                for (i, &c) in board.iter().chain(deck[..cards_needed].iter()).enumerate() {
                    all1[2 + i] = c;
                    all2[2 + i] = c;
                }

                let s1 = evaluator.evaluate_cards(&all1);
                let s2 = evaluator.evaluate_cards(&all2);
                match s1.cmp(&s2) {
                    std::cmp::Ordering::Greater => wins += 1,
                    std::cmp::Ordering::Equal => ties += 1,
                    std::cmp::Ordering::Less => losses += 1,
                }
            }
            (wins, ties, losses)
        })
        .reduce(|| (0, 0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    let (wins, ties, losses) = totals;
    let total = (wins + ties + losses) as f64;
    Ok(EquityResult {
        win: wins as f64 / total,
        tie: ties as f64 / total,
        lose: losses as f64 / total,
        simulations: total as usize,
    })
}
