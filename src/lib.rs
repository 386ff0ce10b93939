//! Heads-up no-limit hold'em GTO solver core.
//!
//! Two subsystems do the heavy lifting: a precomputed 7-card hand
//! evaluator (flush table + perfect-hashed rank map, built once and
//! shared read-only) and a counterfactual regret minimization engine
//! that solves fixed post-flop deals. Range parsing and a 169-class
//! aggregator turn per-deal strategies into the familiar 13x13 grid.

pub mod aggregate;
pub mod cards;
pub mod cfr;
pub mod cli;
pub mod driver;
pub mod equity;
pub mod error;
pub mod evaluator;
pub mod rank_map;
pub mod ranges;
pub mod tables;
