//! CFR engine integration tests: regret-matching sanity on
//! rock-paper-scissors, pot accounting, zero-sum payoffs, strategy
//! well-formedness, and solver determinism.

use std::sync::atomic::AtomicBool;

use once_cell::sync::Lazy;

use gto_solver::cards::parse_card;
use gto_solver::cfr::{
    Action, ActionSet, CfrConfig, CfrSolver, InfoSetData, Street,
};
use gto_solver::evaluator::EvaluatorContext;

static CTX: Lazy<EvaluatorContext> = Lazy::new(|| EvaluatorContext::new().unwrap());

fn card(s: &str) -> u8 {
    parse_card(s).unwrap()
}

fn runout(cards: [&str; 5]) -> [u8; 5] {
    [
        card(cards[0]),
        card(cards[1]),
        card(cards[2]),
        card(cards[3]),
        card(cards[4]),
    ]
}

fn three_actions() -> ActionSet {
    let mut legal = ActionSet::new();
    legal.push(Action(0));
    legal.push(Action(1));
    legal.push(Action(2));
    legal
}

// ---------------------------------------------------------------------------
// Rock-paper-scissors: the regret-matching machinery converges to the
// mixed equilibrium.
// ---------------------------------------------------------------------------

#[test]
fn rps_converges_to_uniform() {
    // U[i][j]: row player's payoff; beats (j+1) % 3.
    fn payoff(i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else if (j + 1) % 3 == i {
            1.0
        } else {
            -1.0
        }
    }

    let legal = three_actions();
    let mut p0 = InfoSetData::new();
    let mut p1 = InfoSetData::new();
    // Uniform-vs-uniform is a fixed point; nudge one player off it so the
    // dynamics actually have to converge back.
    p0.regrets[0] = 1.0;

    for _ in 0..100_000 {
        let s0 = p0.current_strategy(&legal);
        let s1 = p1.current_strategy(&legal);

        for (player, opponent_strategy) in [(&mut p0, &s1), (&mut p1, &s0)] {
            let strategy = player.current_strategy(&legal);
            let mut utilities = [0.0f64; 3];
            let mut node_value = 0.0;
            for i in 0..3 {
                utilities[i] = (0..3).map(|j| opponent_strategy[j] * payoff(i, j)).sum();
                node_value += strategy[i] * utilities[i];
            }
            for i in 0..3 {
                player.regrets[i] += utilities[i] - node_value;
                player.strategy_sum[i] += strategy[i];
            }
        }
    }

    for data in [&p0, &p1] {
        let average = data.average_strategy(&legal);
        for i in 0..3 {
            assert!(
                (average[i] - 1.0 / 3.0).abs() < 0.02,
                "action {} averaged {:.4}, expected ~0.333",
                i,
                average[i]
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Pot accounting and payoffs
// ---------------------------------------------------------------------------

fn fixture_solver(p0: [&str; 2], p1: [&str; 2], board: [&str; 5], street: Street) -> CfrSolver<'static> {
    CfrSolver::new(
        &CTX,
        (card(p0[0]), card(p0[1])),
        (card(p1[0]), card(p1[1])),
        runout(board),
        street,
        CfrConfig::default(),
    )
}

#[test]
fn pot_equals_contributions_along_every_line() {
    let solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::Flop,
    );
    let n = solver.config().num_sizes();

    let mut iset = solver.root_infoset();
    assert!((iset.pot_bb - (iset.p0_put_bb + iset.p1_put_bb)).abs() < 1e-12);

    // Bet, raise, re-raise, call.
    for action in [
        Action::bet(0),
        Action::raise(n, 0),
        Action::raise(n, 0),
        Action::call(n),
    ] {
        iset = solver.apply_action(&iset, action);
        assert!(
            (iset.pot_bb - (iset.p0_put_bb + iset.p1_put_bb)).abs() < 1e-12,
            "pot {} != contributions {} + {}",
            iset.pot_bb,
            iset.p0_put_bb,
            iset.p1_put_bb
        );
    }
    // 1.5 start + 1 bet + (1+1) raise + (1+1) raise + 2 call.
    assert!((iset.pot_bb - 8.5).abs() < 1e-9);
    assert!((iset.current_bet_bb - 0.0).abs() < 1e-9);
}

#[test]
fn call_is_terminal_and_showdown_pays_the_winner() {
    let solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::River,
    );
    let n = solver.config().num_sizes();

    let mut iset = solver.root_infoset();
    iset = solver.apply_action(&iset, Action::bet(0));
    iset = solver.apply_action(&iset, Action::call(n));

    assert!(solver.is_terminal(&iset, Action::call(n)));
    // Aces win the 3.5bb pot having put in 1.75bb.
    let payoff = solver.terminal_payoff(&iset, Action::call(n));
    assert!((payoff - 1.75).abs() < 1e-9);
}

#[test]
fn showdown_payoffs_negate_when_hands_swap() {
    let board = ["Qs", "Jd", "9c", "2h", "3s"];
    let forward = fixture_solver(["Ac", "Ad"], ["Kh", "Ks"], board, Street::River);
    let reversed = fixture_solver(["Kh", "Ks"], ["Ac", "Ad"], board, Street::River);
    let n = forward.config().num_sizes();

    let line = |solver: &CfrSolver| {
        let mut iset = solver.root_infoset();
        iset = solver.apply_action(&iset, Action::bet(0));
        iset = solver.apply_action(&iset, Action::call(n));
        solver.terminal_payoff(&iset, Action::call(n))
    };

    let a = line(&forward);
    let b = line(&reversed);
    assert!((a + b).abs() < 1e-12, "payoffs {} and {} should cancel", a, b);
}

#[test]
fn fold_forfeits_only_the_contribution() {
    let solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::River,
    );
    let n = solver.config().num_sizes();

    // P0 bets, P1 folds: P0 wins the 2.5bb pot having put in 1.75bb.
    let mut iset = solver.root_infoset();
    iset = solver.apply_action(&iset, Action::bet(0));
    iset = solver.apply_action(&iset, Action::fold(n));
    assert!(solver.is_terminal(&iset, Action::fold(n)));
    let payoff = solver.terminal_payoff(&iset, Action::fold(n));
    assert!((payoff - 0.75).abs() < 1e-9);

    // P0 checks, P1 bets, P0 folds: P0 loses its half of the start pot.
    let mut iset = solver.root_infoset();
    iset = solver.apply_action(&iset, Action::CHECK);
    iset = solver.apply_action(&iset, Action::bet(0));
    iset = solver.apply_action(&iset, Action::fold(n));
    let payoff = solver.terminal_payoff(&iset, Action::fold(n));
    assert!((payoff + 0.75).abs() < 1e-9);
}

#[test]
fn double_check_opens_next_street_and_ends_river() {
    let solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::Flop,
    );

    let mut iset = solver.root_infoset();
    assert_eq!(iset.board.count_ones(), 3);
    iset = solver.apply_action(&iset, Action::CHECK);
    iset = solver.apply_action(&iset, Action::CHECK);
    assert_eq!(iset.street, Street::Turn);
    assert_eq!(iset.player, 0);
    assert!(iset.history.is_empty());
    assert_eq!(iset.board.count_ones(), 4);

    iset = solver.apply_action(&iset, Action::CHECK);
    iset = solver.apply_action(&iset, Action::CHECK);
    assert_eq!(iset.street, Street::River);
    assert_eq!(iset.board.count_ones(), 5);

    iset = solver.apply_action(&iset, Action::CHECK);
    assert!(!solver.is_terminal(&iset, Action::CHECK));
    iset = solver.apply_action(&iset, Action::CHECK);
    assert!(solver.is_terminal(&iset, Action::CHECK));
}

// ---------------------------------------------------------------------------
// Solving
// ---------------------------------------------------------------------------

#[test]
fn strategies_are_well_formed_after_solving() {
    let mut solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::Flop,
    );
    solver.solve(100);
    assert!(solver.infoset_count() > 0);

    for (iset, data) in solver.table().iter() {
        let legal = solver.legal_actions(iset);
        let average = data.average_strategy(&legal);
        let total: f64 = average.iter().sum();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "strategy sums to {} at street {:?}",
            total,
            iset.street
        );
        // Probability may only sit on legal actions.
        let legal_total: f64 = legal.iter().map(|a| average[a.0 as usize]).sum();
        assert!((legal_total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn winner_learns_to_bet_loser_learns_to_fold() {
    // Aces over kings on a blank river: P0 should end up betting almost
    // always, and P1 folding to the bet almost always.
    let mut solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::River,
    );
    let n = solver.config().num_sizes();
    solver.solve(500);

    let root = solver.root_strategy();
    let bet_freq: f64 = root.iter().skip(1).sum();
    assert!(bet_freq > 0.9, "aces bet {:.3} of the time", bet_freq);

    let facing_bet = solver.apply_action(&solver.root_infoset(), Action::bet(0));
    let response = solver.average_strategy(&facing_bet);
    assert!(
        response[Action::fold(n).0 as usize] > 0.8,
        "kings folded only {:.3}",
        response[Action::fold(n).0 as usize]
    );
}

#[test]
fn tied_hands_split_every_pot() {
    // Both players play the board: every showdown line pays zero.
    let solver = fixture_solver(
        ["2c", "3d"],
        ["2d", "3h"],
        ["As", "Ks", "Qs", "Js", "Ts"],
        Street::River,
    );
    let n = solver.config().num_sizes();
    let mut iset = solver.root_infoset();
    iset = solver.apply_action(&iset, Action::bet(0));
    iset = solver.apply_action(&iset, Action::call(n));
    let payoff = solver.terminal_payoff(&iset, Action::call(n));
    assert!(payoff.abs() < 1e-12);
}

#[test]
fn cancellation_stops_between_iterations() {
    let mut solver = fixture_solver(
        ["Ac", "Ad"],
        ["Kh", "Ks"],
        ["Qs", "Jd", "9c", "2h", "3s"],
        Street::River,
    );
    let cancel = AtomicBool::new(true);
    let done = solver.solve_with_cancel(1000, &cancel);
    assert_eq!(done, 0);

    let cancel = AtomicBool::new(false);
    let done = solver.solve_with_cancel(10, &cancel);
    assert_eq!(done, 10);
    // The partial solve still yields a usable strategy.
    let root = solver.root_strategy();
    assert!((root.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn fixed_deal_solving_is_deterministic() {
    let solve_once = || {
        let mut solver = fixture_solver(
            ["Ac", "Ad"],
            ["Kh", "Ks"],
            ["Qs", "Jd", "9c", "2h", "3s"],
            Street::Flop,
        );
        solver.solve(200);
        solver.root_strategy()
    };
    let a = solve_once();
    let b = solve_once();
    assert_eq!(a, b, "same deal and iteration count must reproduce exactly");
}

#[test]
fn multiple_bet_sizes_widen_the_action_set() {
    let config = CfrConfig {
        bet_sizes_bb: vec![0.5, 1.0, 2.0],
        ..CfrConfig::default()
    };
    let mut solver = CfrSolver::new(
        &CTX,
        (card("Ac"), card("Ad")),
        (card("Kh"), card("Ks")),
        runout(["Qs", "Jd", "9c", "2h", "3s"]),
        Street::River,
        config,
    );
    // Root: check + three bet sizes.
    assert_eq!(solver.root_actions().len(), 4);

    solver.solve(50);
    let root = solver.root_strategy();
    assert!((root.iter().sum::<f64>() - 1.0).abs() < 1e-9);

    // Facing a bet: fold, call, three raise sizes.
    let facing = solver.apply_action(&solver.root_infoset(), Action::bet(1));
    assert_eq!(solver.legal_actions(&facing).len(), 5);
}
