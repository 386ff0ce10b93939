//! Aggregation of per-deal strategies into the 169-class hand grid.
//!
//! Hole-card combos collapse into the standard 13x13 grid: pairs on the
//! diagonal, suited hands above it (row = high card), offsuit below.
//! Each cell averages the root strategies of every deal whose hero hand
//! fell in that class.

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::cards::{rank_of, suit_of, RANK_CHARS};

pub const GRID_SIZE: usize = 13;
pub const NUM_CLASSES: usize = GRID_SIZE * GRID_SIZE;

/// Grid cell (row, col) of a two-card combo: pairs (r, r), suited
/// (high, low), offsuit (low, high).
pub fn class_cell(c0: u8, c1: u8) -> (usize, usize) {
    let r0 = rank_of(c0) as usize;
    let r1 = rank_of(c1) as usize;
    if r0 == r1 {
        return (r0, r0);
    }
    let high = r0.max(r1);
    let low = r0.min(r1);
    if suit_of(c0) == suit_of(c1) {
        (high, low)
    } else {
        (low, high)
    }
}

pub fn class_index(c0: u8, c1: u8) -> usize {
    let (row, col) = class_cell(c0, c1);
    row * GRID_SIZE + col
}

/// Class label for a combo: "AA", "AKs", "T9o".
pub fn class_label(c0: u8, c1: u8) -> String {
    let (row, col) = class_cell(c0, c1);
    cell_label(row, col)
}

pub fn cell_label(row: usize, col: usize) -> String {
    if row == col {
        format!("{}{}", RANK_CHARS[row], RANK_CHARS[col])
    } else if row > col {
        format!("{}{}s", RANK_CHARS[row], RANK_CHARS[col])
    } else {
        format!("{}{}o", RANK_CHARS[col], RANK_CHARS[row])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellStrategy {
    /// Per-action probability sums over all contributing deals.
    pub sums: Vec<f64>,
    pub samples: usize,
}

/// 13x13 grid of averaged strategies, plus the action labels the
/// probabilities refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyGrid {
    cells: Vec<CellStrategy>,
    pub action_labels: Vec<String>,
}

impl StrategyGrid {
    pub fn new(action_labels: Vec<String>) -> StrategyGrid {
        StrategyGrid {
            cells: vec![CellStrategy::default(); NUM_CLASSES],
            action_labels,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.action_labels.len()
    }

    pub fn add(&mut self, c0: u8, c1: u8, strategy: &[f64]) {
        let (row, col) = class_cell(c0, c1);
        self.add_cell((row, col), strategy);
    }

    /// Accumulate one deal's root strategy into a class cell. Only the
    /// first `num_actions` probabilities are kept (the root's legal set).
    pub fn add_cell(&mut self, cell: (usize, usize), strategy: &[f64]) {
        let n = self.num_actions();
        let slot = &mut self.cells[cell.0 * GRID_SIZE + cell.1];
        if slot.sums.is_empty() {
            slot.sums = vec![0.0; n];
        }
        for (sum, p) in slot.sums.iter_mut().zip(strategy.iter()) {
            *sum += p;
        }
        slot.samples += 1;
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellStrategy {
        &self.cells[row * GRID_SIZE + col]
    }

    /// Averaged strategy for a cell, or None if nothing contributed.
    pub fn average(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        let cell = self.cell(row, col);
        if cell.samples == 0 {
            return None;
        }
        Some(cell.sums.iter().map(|s| s / cell.samples as f64).collect())
    }

    /// Aggregate non-check frequency for a cell, i.e. how often the class
    /// takes an aggressive root action.
    pub fn bet_frequency(&self, row: usize, col: usize) -> Option<f64> {
        self.average(row, col).map(|avg| avg.iter().skip(1).sum())
    }

    pub fn populated_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.samples > 0).count()
    }

    /// Print the range grid, high ranks first. Cells show the aggressive
    /// (non-check) frequency; pairs sit on the diagonal, suited above,
    /// offsuit below.
    pub fn render(&self) {
        print!("      ");
        for col in (0..GRID_SIZE).rev() {
            print!("{:>4} ", RANK_CHARS[col]);
        }
        println!();

        for row in (0..GRID_SIZE).rev() {
            print!("{:>3}   ", RANK_CHARS[row]);
            for col in (0..GRID_SIZE).rev() {
                match self.bet_frequency(row, col) {
                    Some(freq) => {
                        let pct = (freq * 100.0).round() as u32;
                        let text = format!("{:>3}%", pct);
                        if pct >= 70 {
                            print!("{} ", text.green());
                        } else if pct >= 30 {
                            print!("{} ", text.yellow());
                        } else {
                            print!("{} ", text);
                        }
                    }
                    None => print!("  -- "),
                }
            }
            println!();
        }

        println!();
        println!("  Cells show aggressive (bet/raise) frequency.");
        println!("  Pairs on diagonal | upper-left triangle suited | lower offsuit");
        println!();

        // Detailed per-class breakdown.
        print!("  {:<6}", "Hand");
        for label in &self.action_labels {
            print!("{:>10}", label);
        }
        println!("{:>8}", "Deals");
        for row in (0..GRID_SIZE).rev() {
            for col in (0..GRID_SIZE).rev() {
                if let Some(avg) = self.average(row, col) {
                    print!("  {:<6}", cell_label(row, col).bold());
                    for p in &avg {
                        print!("{:>9.1}%", p * 100.0);
                    }
                    println!("{:>8}", self.cell(row, col).samples);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_card;

    fn card(s: &str) -> u8 {
        parse_card(s).unwrap()
    }

    #[test]
    fn pair_cells_on_diagonal() {
        assert_eq!(class_cell(card("Ac"), card("Ad")), (12, 12));
        assert_eq!(class_cell(card("2c"), card("2s")), (0, 0));
        assert_eq!(class_label(card("Ac"), card("Ad")), "AA");
    }

    #[test]
    fn suited_above_offsuit_below() {
        // AKs: row = high = 12, col = 11
        assert_eq!(class_cell(card("Ac"), card("Kc")), (12, 11));
        assert_eq!(class_label(card("Ac"), card("Kc")), "AKs");
        // AKo mirrors across the diagonal
        assert_eq!(class_cell(card("Ac"), card("Kd")), (11, 12));
        assert_eq!(class_label(card("Ac"), card("Kd")), "AKo");
        // Order of the two cards never matters.
        assert_eq!(
            class_cell(card("Kc"), card("Ac")),
            class_cell(card("Ac"), card("Kc"))
        );
    }

    #[test]
    fn all_combos_map_into_grid() {
        let mut seen = [false; NUM_CLASSES];
        for c0 in 0..52u8 {
            for c1 in (c0 + 1)..52 {
                seen[class_index(c0, c1)] = true;
            }
        }
        assert_eq!(seen.iter().filter(|&&s| s).count(), NUM_CLASSES);
    }

    #[test]
    fn averaging_accumulates() {
        let mut grid = StrategyGrid::new(vec!["Check".into(), "Bet 1.0".into()]);
        grid.add(card("Ac"), card("Ad"), &[0.2, 0.8]);
        grid.add(card("As"), card("Ah"), &[0.4, 0.6]);
        let avg = grid.average(12, 12).unwrap();
        assert!((avg[0] - 0.3).abs() < 1e-12);
        assert!((avg[1] - 0.7).abs() < 1e-12);
        assert!((grid.bet_frequency(12, 12).unwrap() - 0.7).abs() < 1e-12);
        assert!(grid.average(0, 0).is_none());
        assert_eq!(grid.populated_cells(), 1);
    }

    #[test]
    fn longer_strategy_rows_are_truncated() {
        let mut grid = StrategyGrid::new(vec!["Check".into(), "Bet 1.0".into()]);
        // Engine strategies carry the full action array; only the root's
        // legal prefix is aggregated.
        let full = [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        grid.add(card("7c"), card("2d"), &full);
        let avg = grid.average(0, 5).unwrap();
        assert_eq!(avg.len(), 2);
    }
}
