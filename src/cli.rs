//! Thin command-line front end.
//!
//! `gto-solver <hero_range> <villain_range> [board]` runs the range
//! analysis; `gto-solver --equity <hand1> <hand2> [board]` runs the
//! Monte Carlo matchup simulator. Everything heavy lives in the library.

use std::path::Path;

use crate::cards::{parse_board, parse_hand};
use crate::driver::{run_analysis, DriverConfig};
use crate::equity::equity_vs_hand;
use crate::error::SolverResult;
use crate::evaluator::EvaluatorContext;

const TABLE_FILE: &str = "handranks.dat";

/// Wide heads-up range used when none is given.
const DEFAULT_RANGE: &str = "22+,A2s+,K2s+,Q2s+,J2s+,T2s+,92s+,82s+,72s+,62s+,52s+,42s+,32s,\
                             A2o+,K2o+,Q2o+,J2o+,T2o+,92o+,82o+,72o+,62o+,52o+,42o+,32o";

const EQUITY_SIMULATIONS: usize = 200_000;

pub fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match real_main(&args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

fn real_main(args: &[String]) -> SolverResult<()> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    if args.first().map(String::as_str) == Some("--equity") {
        return run_equity(&args[1..]);
    }

    let mut config = DriverConfig {
        hero_range: DEFAULT_RANGE.to_string(),
        villain_range: DEFAULT_RANGE.to_string(),
        ..DriverConfig::default()
    };

    let mut positional: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--iterations" => {
                config.iterations = parse_flag_value(args, &mut i, "--iterations")?;
            }
            "--seed" => {
                config.seed = Some(parse_flag_value(args, &mut i, "--seed")?);
            }
            "--villains" => {
                config.villains_per_class = parse_flag_value(args, &mut i, "--villains")?;
            }
            "--no-cache" => {
                config.use_cache = false;
            }
            other => positional.push(other),
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        2 | 3 => {
            config.hero_range = positional[0].to_string();
            config.villain_range = positional[1].to_string();
            if let Some(board) = positional.get(2) {
                config.board = parse_board(board)?;
            }
        }
        _ => {
            print_usage();
            return Err(crate::error::SolverError::Usage(
                "expected <hero_range> <villain_range> [board]".to_string(),
            ));
        }
    }

    let evaluator = EvaluatorContext::load_or_build(Path::new(TABLE_FILE))?;
    let report = run_analysis(&evaluator, &config)?;
    report.display();
    Ok(())
}

fn run_equity(args: &[String]) -> SolverResult<()> {
    if args.len() < 2 {
        print_usage();
        return Err(crate::error::SolverError::Usage(
            "--equity needs two hands".to_string(),
        ));
    }
    let hand1 = parse_hand(&args[0])?;
    let hand2 = parse_hand(&args[1])?;
    let board = match args.get(2) {
        Some(s) => parse_board(s)?,
        None => Vec::new(),
    };

    let evaluator = EvaluatorContext::load_or_build(Path::new(TABLE_FILE))?;
    let result = equity_vs_hand(&evaluator, hand1, hand2, &board, EQUITY_SIMULATIONS)?;
    println!("{} vs {}: {}", &args[0], &args[1], result);
    Ok(())
}

fn parse_flag_value<T: std::str::FromStr>(
    args: &[String],
    i: &mut usize,
    flag: &str,
) -> SolverResult<T> {
    *i += 1;
    args.get(*i)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| crate::error::SolverError::Usage(format!("{} needs a value", flag)))
}

fn print_usage() {
    println!("Usage:");
    println!("  gto-solver [hero_range] [villain_range] [board] [options]");
    println!("  gto-solver --equity <hand1> <hand2> [board]");
    println!();
    println!("Ranges:");
    println!("  Pairs: 22, 99+   Suited: A5s, T8s+   Offsuit: KJo, Q9o+");
    println!("  Weights: KTo@50 plays KTo half the time; a trailing ,@70");
    println!("  plays the whole range 70% of the time.");
    println!();
    println!("Board: 3, 4 or 5 cards like AcKdQh (ranks 23456789TJQKA, suits cdhs)");
    println!();
    println!("Options:");
    println!("  --iterations N   CFR iterations per sampled deal (default 400)");
    println!("  --villains N     villain combos per hand class (default 5)");
    println!("  --seed N         reproducible sampling");
    println!("  --no-cache       ignore and do not write the solution cache");
}
