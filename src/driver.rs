//! End-to-end analysis: ranges in, per-street strategy grids out.
//!
//! For each analyzed street the driver walks the hero range's hand
//! classes, pairs a representative hero combo with a handful of villain
//! combos, samples the undealt board cards, runs one fixed-deal CFR
//! solver per pairing, and folds the root strategies into a 169-class
//! grid. Classes fan out across rayon workers; determinism comes from
//! deriving every worker's RNG seed from the master seed, so a seeded
//! run reproduces bit-identical grids.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{class_cell, StrategyGrid};
use crate::cards::{cards_str, remaining_deck};
use crate::cfr::{CfrConfig, CfrSolver, Street, MAX_ACTIONS};
use crate::error::{SolverError, SolverResult};
use crate::evaluator::EvaluatorContext;
use crate::ranges::{HandRange, WeightedHand};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub hero_range: String,
    pub villain_range: String,
    /// Known board prefix: empty, 3, 4, or 5 cards.
    pub board: Vec<u8>,
    /// CFR iterations per sampled deal.
    pub iterations: usize,
    /// Villain combos sampled per hero hand class.
    pub villains_per_class: usize,
    /// Master seed; a fresh random one is drawn when absent.
    pub seed: Option<u64>,
    pub use_cache: bool,
    pub cfr: CfrConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            hero_range: String::new(),
            villain_range: String::new(),
            board: Vec::new(),
            iterations: 400,
            villains_per_class: 5,
            seed: None,
            use_cache: true,
            cfr: CfrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetReport {
    pub street: Street,
    pub grid: StrategyGrid,
    /// Solved (hero, villain, board) deals contributing to the grid.
    pub deals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub hero_range: String,
    pub villain_range: String,
    pub board: String,
    pub iterations: usize,
    pub seed: u64,
    pub streets: Vec<StreetReport>,
}

/// Streets worth analyzing given how much board is already known. A full
/// board still admits a river solve.
fn streets_for_board(board_len: usize) -> Vec<Street> {
    match board_len {
        0 => vec![Street::Flop, Street::Turn, Street::River],
        3 => vec![Street::Turn, Street::River],
        _ => vec![Street::River],
    }
}

pub fn run_analysis(
    evaluator: &EvaluatorContext,
    config: &DriverConfig,
) -> SolverResult<AnalysisReport> {
    let hero = HandRange::parse(&config.hero_range);
    if hero.is_empty() {
        return Err(SolverError::EmptyRange(config.hero_range.clone()));
    }
    let villain = HandRange::parse(&config.villain_range);
    if villain.is_empty() {
        return Err(SolverError::EmptyRange(config.villain_range.clone()));
    }

    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());

    if config.use_cache {
        if let Some(report) = AnalysisReport::load_cache(config, seed) {
            return Ok(report);
        }
    }

    let mut streets = Vec::new();
    for street in streets_for_board(config.board.len()) {
        streets.push(solve_street(evaluator, &hero, &villain, street, config, seed));
    }

    let report = AnalysisReport {
        hero_range: config.hero_range.clone(),
        villain_range: config.villain_range.clone(),
        board: cards_str(&config.board),
        iterations: config.iterations,
        seed,
        streets,
    };

    if config.use_cache {
        report.save_cache(config);
    }
    Ok(report)
}

struct ClassTask {
    cell: (usize, usize),
    ordinal: u64,
    hero_combos: Vec<WeightedHand>,
}

fn solve_street(
    evaluator: &EvaluatorContext,
    hero: &HandRange,
    villain: &HandRange,
    street: Street,
    config: &DriverConfig,
    seed: u64,
) -> StreetReport {
    // Group hero combos by hand class, keeping first-seen range order.
    let mut tasks: Vec<ClassTask> = Vec::new();
    let mut slot_of = [usize::MAX; crate::aggregate::NUM_CLASSES];
    for hand in &hero.hands {
        let cell = class_cell(hand.cards.0, hand.cards.1);
        let index = cell.0 * crate::aggregate::GRID_SIZE + cell.1;
        if slot_of[index] == usize::MAX {
            slot_of[index] = tasks.len();
            tasks.push(ClassTask {
                cell,
                ordinal: tasks.len() as u64,
                hero_combos: Vec::new(),
            });
        }
        tasks[slot_of[index]].hero_combos.push(*hand);
    }

    let results: Vec<((usize, usize), Vec<[f64; MAX_ACTIONS]>)> = tasks
        .par_iter()
        .map(|task| {
            let strategies =
                solve_class(evaluator, task, villain, street, config, seed, hero.frequency);
            (task.cell, strategies)
        })
        .collect();

    let mut grid = StrategyGrid::new(config.cfr.open_action_labels());
    let mut deals = 0;
    for (cell, strategies) in &results {
        for strategy in strategies {
            grid.add_cell(*cell, strategy);
            deals += 1;
        }
    }

    StreetReport { street, grid, deals }
}

/// Solve up to `villains_per_class` deals for one hero hand class and
/// return their root strategies.
fn solve_class(
    evaluator: &EvaluatorContext,
    task: &ClassTask,
    villain: &HandRange,
    street: Street,
    config: &DriverConfig,
    seed: u64,
    hero_frequency: f64,
) -> Vec<[f64; MAX_ACTIONS]> {
    let mut rng = StdRng::seed_from_u64(task_seed(seed, street, task.ordinal));

    // The range's overall frequency gates the whole class.
    if hero_frequency < 1.0 && rng.gen::<f64>() > hero_frequency {
        return Vec::new();
    }

    // Representative hero combo: first in range order that passes its
    // weight draw and shares no card with the known board.
    let hero_combo = task.hero_combos.iter().find(|hand| {
        !overlaps(&[hand.cards.0, hand.cards.1], &config.board)
            && rng.gen::<f64>() <= hand.weight
    });
    let hero_combo = match hero_combo {
        Some(hand) => hand.cards,
        None => return Vec::new(),
    };

    let mut strategies = Vec::new();
    for hand in &villain.hands {
        if strategies.len() >= config.villains_per_class {
            break;
        }
        if rng.gen::<f64>() > hand.weight {
            continue;
        }
        let villain_combo = hand.cards;
        if overlaps(
            &[villain_combo.0, villain_combo.1],
            &[hero_combo.0, hero_combo.1],
        ) || overlaps(&[villain_combo.0, villain_combo.1], &config.board)
        {
            continue;
        }

        let runout = sample_runout(&mut rng, &config.board, hero_combo, villain_combo);
        let mut solver = CfrSolver::new(
            evaluator,
            hero_combo,
            villain_combo,
            runout,
            street,
            config.cfr.clone(),
        );
        solver.solve(config.iterations);
        strategies.push(solver.root_strategy());
    }
    strategies
}

fn overlaps(cards: &[u8], others: &[u8]) -> bool {
    cards.iter().any(|c| others.contains(c))
}

/// Complete the known board prefix to a full five-card runout, avoiding
/// both players' hole cards.
fn sample_runout(
    rng: &mut StdRng,
    board: &[u8],
    hero: (u8, u8),
    villain: (u8, u8),
) -> [u8; 5] {
    let mut dead = vec![hero.0, hero.1, villain.0, villain.1];
    dead.extend_from_slice(board);
    let mut deck = remaining_deck(&dead);
    let needed = 5 - board.len();
    deck.partial_shuffle(rng, needed);

    let mut runout = [0u8; 5];
    runout[..board.len()].copy_from_slice(board);
    runout[board.len()..].copy_from_slice(&deck[..needed]);
    runout
}

/// Stable per-task seed so rayon scheduling cannot affect results.
fn task_seed(master: u64, street: Street, ordinal: u64) -> u64 {
    let mut x = master
        ^ (street as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ ordinal.wrapping_mul(0xd1b5_4a32_d192_ed03);
    // splitmix64 finalizer
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

// ---------------------------------------------------------------------------
// Display and cache
// ---------------------------------------------------------------------------

impl AnalysisReport {
    pub fn display(&self) {
        use colored::Colorize;

        println!();
        println!(
            "  {}  |  hero: {}  |  villain: {}  |  {} iterations/deal  |  seed {}",
            "GTO analysis".bold(),
            self.hero_range,
            self.villain_range,
            self.iterations,
            self.seed,
        );
        if !self.board.is_empty() {
            println!("  Board: {}", self.board.bold());
        }

        for report in &self.streets {
            println!();
            println!(
                "  === {} strategy ({} deals) ===",
                report.street.name().bold(),
                report.deals
            );
            println!();
            report.grid.render();
        }
        println!();
    }

    fn cache_key(config: &DriverConfig, seed: u64) -> u64 {
        let mut hasher = DefaultHasher::new();
        config.hero_range.hash(&mut hasher);
        config.villain_range.hash(&mut hasher);
        config.board.hash(&mut hasher);
        config.iterations.hash(&mut hasher);
        config.villains_per_class.hash(&mut hasher);
        seed.hash(&mut hasher);
        config.cfr.starting_pot_bb.to_bits().hash(&mut hasher);
        for size in &config.cfr.bet_sizes_bb {
            size.to_bits().hash(&mut hasher);
        }
        config.cfr.max_raises.hash(&mut hasher);
        hasher.finish()
    }

    fn cache_path(config: &DriverConfig, seed: u64) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home)
            .join(".gto-solver")
            .join("cache")
            .join(format!("analysis_{:016x}.bin", Self::cache_key(config, seed)))
    }

    pub fn load_cache(config: &DriverConfig, seed: u64) -> Option<AnalysisReport> {
        let data = std::fs::read(Self::cache_path(config, seed)).ok()?;
        bincode::deserialize(&data).ok()
    }

    pub fn save_cache(&self, config: &DriverConfig) {
        let path = Self::cache_path(config, self.seed);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        if let Ok(data) = bincode::serialize(self) {
            std::fs::write(path, data).ok();
        }
    }
}
