//! Vanilla counterfactual regret minimization over the post-flop betting
//! tree.
//!
//! Each solver instance works on one fixed deal: both players' hole cards
//! plus a complete five-card runout. The betting tree is implicit in the
//! recursion; information sets are keyed by (board-so-far, street, acting
//! player, per-street action history, pot state) and live in an
//! open-addressed hash table owned by the solver. Regret matching gives
//! the per-iteration strategy; the average of the accumulated strategy
//! sums converges to equilibrium for the deal.
//!
//! Action encoding with `n` configured bet sizes:
//! 0 = CHECK, 1..=n = BET_i, n+1 = FOLD, n+2 = CALL, n+3..=2n+2 = RAISE_i.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cards::pack_cards;
use crate::evaluator::EvaluatorContext;

pub const MAX_BET_SIZES: usize = 4;
pub const MAX_ACTIONS: usize = 3 + 2 * MAX_BET_SIZES;
pub const MAX_HISTORY: usize = 10;

const REACH_EPSILON: f64 = 1e-10;
/// Pot scalars are hashed and compared at two decimals of a big blind.
const POT_QUANTIZE: f64 = 100.0;

pub const INITIAL_TABLE_CAPACITY: usize = 1 << 16;
const MAX_TABLE_CAPACITY: usize = 1 << 19;
const TABLE_LOAD_FACTOR: f64 = 0.75;

// ---------------------------------------------------------------------------
// Streets and actions
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Street {
    Flop,
    Turn,
    River,
}

impl Street {
    pub fn next(self) -> Street {
        match self {
            Street::Flop => Street::Turn,
            Street::Turn => Street::River,
            Street::River => Street::River,
        }
    }

    /// Community cards dealt as of this street.
    pub fn board_len(self) -> usize {
        match self {
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Street::Flop => "Flop",
            Street::Turn => "Turn",
            Street::River => "River",
        }
    }
}

/// A betting action as a small integer; its meaning depends on the number
/// of configured bet sizes (see the module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Action(pub u8);

impl Action {
    pub const CHECK: Action = Action(0);

    pub fn bet(size_index: usize) -> Action {
        Action(1 + size_index as u8)
    }

    pub fn fold(num_sizes: usize) -> Action {
        Action(num_sizes as u8 + 1)
    }

    pub fn call(num_sizes: usize) -> Action {
        Action(num_sizes as u8 + 2)
    }

    pub fn raise(num_sizes: usize, size_index: usize) -> Action {
        Action(num_sizes as u8 + 3 + size_index as u8)
    }

    #[inline]
    pub fn is_check(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_bet(self, num_sizes: usize) -> bool {
        self.0 >= 1 && (self.0 as usize) < 1 + num_sizes
    }

    #[inline]
    pub fn is_fold(self, num_sizes: usize) -> bool {
        self.0 as usize == num_sizes + 1
    }

    #[inline]
    pub fn is_call(self, num_sizes: usize) -> bool {
        self.0 as usize == num_sizes + 2
    }

    #[inline]
    pub fn is_raise(self, num_sizes: usize) -> bool {
        let a = self.0 as usize;
        a >= num_sizes + 3 && a < 3 + 2 * num_sizes
    }

    /// Index into the configured bet sizes for a bet or raise.
    pub fn size_index(self, num_sizes: usize) -> usize {
        if self.is_bet(num_sizes) {
            self.0 as usize - 1
        } else {
            self.0 as usize - num_sizes - 3
        }
    }

    pub fn label(self, num_sizes: usize, sizes: &[f64]) -> String {
        if self.is_check() {
            "Check".to_string()
        } else if self.is_bet(num_sizes) {
            format!("Bet {:.1}", sizes[self.size_index(num_sizes)])
        } else if self.is_fold(num_sizes) {
            "Fold".to_string()
        } else if self.is_call(num_sizes) {
            "Call".to_string()
        } else {
            format!("Raise {:.1}", sizes[self.size_index(num_sizes)])
        }
    }
}

/// The legal actions at one decision point.
#[derive(Debug, Clone, Copy)]
pub struct ActionSet {
    actions: [Action; MAX_ACTIONS],
    len: usize,
}

impl ActionSet {
    pub fn new() -> ActionSet {
        ActionSet { actions: [Action(0); MAX_ACTIONS], len: 0 }
    }

    pub fn push(&mut self, action: Action) {
        debug_assert!(self.len < MAX_ACTIONS);
        self.actions[self.len] = action;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions[..self.len].iter().copied()
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Information sets
// ---------------------------------------------------------------------------

/// Per-street action history, bounded at `MAX_HISTORY` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct History {
    actions: [u8; MAX_HISTORY],
    len: u8,
}

impl History {
    pub fn push(&mut self, action: Action) {
        if (self.len as usize) < MAX_HISTORY {
            self.actions[self.len as usize] = action.0;
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len as usize == MAX_HISTORY
    }

    pub fn last(&self) -> Option<Action> {
        self.len.checked_sub(1).map(|i| Action(self.actions[i as usize]))
    }

    pub fn second_last(&self) -> Option<Action> {
        self.len.checked_sub(2).map(|i| Action(self.actions[i as usize]))
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions[..self.len as usize].iter().map(|&a| Action(a))
    }

    fn raise_count(&self, num_sizes: usize) -> usize {
        self.iter().filter(|a| a.is_raise(num_sizes)).count()
    }
}

/// Everything the acting player knows at a decision point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfoSet {
    /// Packed set of the community cards dealt as of this street.
    pub board: u64,
    pub street: Street,
    /// Acting player, 0 or 1.
    pub player: usize,
    pub history: History,
    pub pot_bb: f64,
    /// Outstanding wager the acting player must match; 0 when unbet.
    pub current_bet_bb: f64,
    pub p0_put_bb: f64,
    pub p1_put_bb: f64,
}

impl Default for InfoSet {
    fn default() -> Self {
        InfoSet {
            board: 0,
            street: Street::Flop,
            player: 0,
            history: History::default(),
            pot_bb: 0.0,
            current_bet_bb: 0.0,
            p0_put_bb: 0.0,
            p1_put_bb: 0.0,
        }
    }
}

#[inline]
fn quantize(bb: f64) -> i64 {
    (bb * POT_QUANTIZE).round() as i64
}

#[inline]
fn hash_combine(a: u64, b: u64) -> u64 {
    a ^ (b
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2))
}

impl InfoSet {
    pub fn key_hash(&self) -> u64 {
        let mut h = 0u64;
        h = hash_combine(h, self.board);
        h = hash_combine(h, self.board >> 32);
        h = hash_combine(h, self.street as u64);
        h = hash_combine(h, self.player as u64);
        h = hash_combine(h, self.history.len() as u64);
        for action in self.history.iter() {
            h = hash_combine(h, action.0 as u64);
        }
        h = hash_combine(h, quantize(self.pot_bb) as u64);
        h = hash_combine(h, quantize(self.current_bet_bb) as u64);
        h = hash_combine(h, quantize(self.p0_put_bb) as u64);
        h = hash_combine(h, quantize(self.p1_put_bb) as u64);
        // Zero marks an empty slot, so no real key may hash to it.
        if h == 0 {
            h = 0x9e37_79b9_7f4a_7c15;
        }
        h
    }

    /// Full-equality check used to disambiguate hash collisions. Pot
    /// scalars compare quantized, matching the hash.
    pub fn same_state(&self, other: &InfoSet) -> bool {
        self.board == other.board
            && self.street == other.street
            && self.player == other.player
            && self.history == other.history
            && quantize(self.pot_bb) == quantize(other.pot_bb)
            && quantize(self.current_bet_bb) == quantize(other.current_bet_bb)
            && quantize(self.p0_put_bb) == quantize(other.p0_put_bb)
            && quantize(self.p1_put_bb) == quantize(other.p1_put_bb)
    }
}

/// Accumulated regrets and strategy weights for one information set.
#[derive(Debug, Clone)]
pub struct InfoSetData {
    pub regrets: [f64; MAX_ACTIONS],
    pub strategy_sum: [f64; MAX_ACTIONS],
    pub visits: u64,
}

impl InfoSetData {
    pub fn new() -> InfoSetData {
        InfoSetData {
            regrets: [0.0; MAX_ACTIONS],
            strategy_sum: [0.0; MAX_ACTIONS],
            visits: 0,
        }
    }

    /// Regret matching: positive regrets normalized over the legal set;
    /// uniform over legal actions when nothing is positive. Illegal
    /// actions always get probability zero.
    pub fn current_strategy(&self, legal: &ActionSet) -> [f64; MAX_ACTIONS] {
        let mut strategy = [0.0; MAX_ACTIONS];
        let positive_sum: f64 = legal
            .iter()
            .map(|a| self.regrets[a.0 as usize].max(0.0))
            .sum();
        if positive_sum > 0.0 {
            for action in legal.iter() {
                let i = action.0 as usize;
                strategy[i] = self.regrets[i].max(0.0) / positive_sum;
            }
        } else {
            for action in legal.iter() {
                strategy[action.0 as usize] = 1.0 / legal.len() as f64;
            }
        }
        strategy
    }

    /// The average strategy over all iterations, which is what converges
    /// to equilibrium.
    pub fn average_strategy(&self, legal: &ActionSet) -> [f64; MAX_ACTIONS] {
        let mut strategy = [0.0; MAX_ACTIONS];
        let total: f64 = legal.iter().map(|a| self.strategy_sum[a.0 as usize]).sum();
        if total > 0.0 {
            for action in legal.iter() {
                let i = action.0 as usize;
                strategy[i] = self.strategy_sum[i] / total;
            }
        } else {
            for action in legal.iter() {
                strategy[action.0 as usize] = 1.0 / legal.len() as f64;
            }
        }
        strategy
    }
}

impl Default for InfoSetData {
    fn default() -> Self {
        Self::new()
    }
}

pub fn uniform_strategy(legal: &ActionSet) -> [f64; MAX_ACTIONS] {
    let mut strategy = [0.0; MAX_ACTIONS];
    for action in legal.iter() {
        strategy[action.0 as usize] = 1.0 / legal.len() as f64;
    }
    strategy
}

// ---------------------------------------------------------------------------
// Open-addressed infoset table
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Entry {
    /// Zero iff the slot is empty.
    key_hash: u64,
    iset: InfoSet,
    data: InfoSetData,
}

impl Entry {
    fn empty() -> Entry {
        Entry { key_hash: 0, iset: InfoSet::default(), data: InfoSetData::new() }
    }
}

/// Open-addressed storage, doubling on load-factor breach up to a hard
/// cap. Once the cap is hit, lookups still succeed but new information
/// sets are refused; the engine then plays those nodes uniformly rather
/// than aborting.
pub struct InfoSetTable {
    entries: Vec<Entry>,
    len: usize,
    at_capacity: bool,
}

impl InfoSetTable {
    pub fn new(capacity: usize) -> InfoSetTable {
        debug_assert!(capacity.is_power_of_two());
        InfoSetTable {
            entries: vec![Entry::empty(); capacity],
            len: 0,
            at_capacity: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// True once the table has refused an insert at the capacity cap.
    pub fn saturated(&self) -> bool {
        self.at_capacity
    }

    pub fn get(&self, iset: &InfoSet) -> Option<&InfoSetData> {
        let hash = iset.key_hash();
        let mask = self.entries.len() - 1;
        let mut idx = (hash as usize) & mask;
        loop {
            let entry = &self.entries[idx];
            if entry.key_hash == 0 {
                return None;
            }
            if entry.key_hash == hash && entry.iset.same_state(iset) {
                return Some(&self.entries[idx].data);
            }
            idx = (idx + 1) & mask;
        }
    }

    /// Find the entry for `iset`, creating it on first visit. Returns
    /// `None` only when the table is saturated and the infoset is new.
    pub fn find_or_create(&mut self, iset: &InfoSet) -> Option<&mut InfoSetData> {
        if self.len + 1 > (self.capacity() as f64 * TABLE_LOAD_FACTOR) as usize {
            if self.capacity() < MAX_TABLE_CAPACITY {
                self.grow();
            } else {
                self.at_capacity = true;
            }
        }

        let hash = iset.key_hash();
        let mask = self.entries.len() - 1;
        let mut idx = (hash as usize) & mask;
        loop {
            let entry = &self.entries[idx];
            if entry.key_hash == hash && entry.iset.same_state(iset) {
                return Some(&mut self.entries[idx].data);
            }
            if entry.key_hash == 0 {
                if self.at_capacity {
                    return None;
                }
                let slot = &mut self.entries[idx];
                slot.key_hash = hash;
                slot.iset = *iset;
                slot.data = InfoSetData::new();
                self.len += 1;
                return Some(&mut self.entries[idx].data);
            }
            idx = (idx + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity() * 2).min(MAX_TABLE_CAPACITY);
        let old = std::mem::replace(&mut self.entries, vec![Entry::empty(); new_capacity]);
        let mask = new_capacity - 1;
        for entry in old {
            if entry.key_hash == 0 {
                continue;
            }
            let mut idx = (entry.key_hash as usize) & mask;
            while self.entries[idx].key_hash != 0 {
                idx = (idx + 1) & mask;
            }
            self.entries[idx] = entry;
        }
    }

    /// Occupied entries; used by strategy extraction and tests.
    pub fn iter(&self) -> impl Iterator<Item = (&InfoSet, &InfoSetData)> {
        self.entries
            .iter()
            .filter(|e| e.key_hash != 0)
            .map(|e| (&e.iset, &e.data))
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CfrConfig {
    /// Pot at the root, in big blinds (both players contributed half).
    pub starting_pot_bb: f64,
    /// Configured bet/raise sizes in big blinds, at most `MAX_BET_SIZES`.
    pub bet_sizes_bb: Vec<f64>,
    /// Raises allowed per street.
    pub max_raises: usize,
    pub depth_limit: u32,
}

impl Default for CfrConfig {
    fn default() -> Self {
        CfrConfig {
            starting_pot_bb: 1.5,
            bet_sizes_bb: vec![1.0],
            max_raises: 2,
            depth_limit: 20,
        }
    }
}

impl CfrConfig {
    pub fn num_sizes(&self) -> usize {
        self.bet_sizes_bb.len()
    }

    /// Labels of the actions available when nobody has bet yet (the root
    /// action set).
    pub fn open_action_labels(&self) -> Vec<String> {
        let n = self.num_sizes();
        let mut labels = vec!["Check".to_string()];
        for i in 0..n {
            labels.push(Action::bet(i).label(n, &self.bet_sizes_bb));
        }
        labels
    }
}

/// One fixed-deal solver: hole cards for both players plus a complete
/// runout, solved from `start_street` onward.
pub struct CfrSolver<'a> {
    evaluator: &'a EvaluatorContext,
    hand_p0: u64,
    hand_p1: u64,
    runout: [u8; 5],
    full_board: u64,
    start_street: Street,
    config: CfrConfig,
    table: InfoSetTable,
    capacity_warned: bool,
}

impl<'a> CfrSolver<'a> {
    pub fn new(
        evaluator: &'a EvaluatorContext,
        hand_p0: (u8, u8),
        hand_p1: (u8, u8),
        runout: [u8; 5],
        start_street: Street,
        config: CfrConfig,
    ) -> CfrSolver<'a> {
        debug_assert!(!config.bet_sizes_bb.is_empty());
        debug_assert!(config.bet_sizes_bb.len() <= MAX_BET_SIZES);
        CfrSolver {
            evaluator,
            hand_p0: pack_cards(&[hand_p0.0, hand_p0.1]),
            hand_p1: pack_cards(&[hand_p1.0, hand_p1.1]),
            runout,
            full_board: pack_cards(&runout),
            start_street,
            config,
            table: InfoSetTable::new(INITIAL_TABLE_CAPACITY),
            capacity_warned: false,
        }
    }

    pub fn config(&self) -> &CfrConfig {
        &self.config
    }

    fn num_sizes(&self) -> usize {
        self.config.bet_sizes_bb.len()
    }

    /// Packed community cards visible as of `street`.
    fn board_at(&self, street: Street) -> u64 {
        pack_cards(&self.runout[..street.board_len()])
    }

    pub fn root_infoset(&self) -> InfoSet {
        InfoSet {
            board: self.board_at(self.start_street),
            street: self.start_street,
            player: 0,
            history: History::default(),
            pot_bb: self.config.starting_pot_bb,
            current_bet_bb: 0.0,
            p0_put_bb: self.config.starting_pot_bb * 0.5,
            p1_put_bb: self.config.starting_pot_bb * 0.5,
        }
    }

    /// Run `iterations` CFR traversals from the root.
    pub fn solve(&mut self, iterations: usize) -> usize {
        static NEVER: AtomicBool = AtomicBool::new(false);
        self.solve_with_cancel(iterations, &NEVER)
    }

    /// As [`solve`](Self::solve), but checks `cancel` between iterations
    /// and returns early with the best strategy so far. Returns the number
    /// of iterations completed.
    pub fn solve_with_cancel(&mut self, iterations: usize, cancel: &AtomicBool) -> usize {
        let root = self.root_infoset();
        for done in 0..iterations {
            if cancel.load(Ordering::Relaxed) {
                return done;
            }
            self.cfr(&root, 1.0, 1.0, 0);
        }
        iterations
    }

    pub fn infoset_count(&self) -> usize {
        self.table.len()
    }

    // -----------------------------------------------------------------------
    // Game rules
    // -----------------------------------------------------------------------

    /// Legal actions: facing no bet, check or bet any size; facing a bet,
    /// fold, call, or raise while under the per-street raise cap.
    pub fn legal_actions(&self, iset: &InfoSet) -> ActionSet {
        let n = self.num_sizes();
        let facing_bet = iset
            .history
            .last()
            .map_or(false, |a| a.is_bet(n) || a.is_raise(n));

        let mut legal = ActionSet::new();
        if facing_bet {
            legal.push(Action::fold(n));
            legal.push(Action::call(n));
            if iset.history.raise_count(n) < self.config.max_raises {
                for i in 0..n {
                    legal.push(Action::raise(n, i));
                }
            }
        } else {
            legal.push(Action::CHECK);
            for i in 0..n {
                legal.push(Action::bet(i));
            }
        }
        legal
    }

    /// A node is terminal after a fold, after a call, after the second
    /// check on the river, or when the per-street history is full.
    pub fn is_terminal(&self, iset: &InfoSet, last: Action) -> bool {
        let n = self.num_sizes();
        if last.is_fold(n) || last.is_call(n) {
            return true;
        }
        if last.is_check()
            && iset.street == Street::River
            && iset.history.second_last().map_or(false, |a| a.is_check())
        {
            return true;
        }
        iset.history.is_full()
    }

    /// Payoff at a terminal node, always from player 0's perspective.
    pub fn terminal_payoff(&self, iset: &InfoSet, last: Action) -> f64 {
        let n = self.num_sizes();
        if last.is_fold(n) {
            // The folder is whoever acted last, i.e. not the player to act.
            let folder = 1 - iset.player;
            return if folder == 0 {
                -iset.p0_put_bb
            } else {
                iset.pot_bb - iset.p0_put_bb
            };
        }
        // Call, river check-back, or a full history: showdown against the
        // complete runout.
        let s0 = self.evaluator.evaluate(self.hand_p0, self.full_board);
        let s1 = self.evaluator.evaluate(self.hand_p1, self.full_board);
        let winnings = if s0 > s1 {
            iset.pot_bb
        } else if s0 < s1 {
            0.0
        } else {
            iset.pot_bb * 0.5
        };
        winnings - iset.p0_put_bb
    }

    /// Apply one action: update the pot state, flip the acting player, and
    /// open the next street after a second consecutive check off-river.
    pub fn apply_action(&self, iset: &InfoSet, action: Action) -> InfoSet {
        let n = self.num_sizes();
        let mut next = *iset;

        if action.is_bet(n) {
            let size = self.config.bet_sizes_bb[action.size_index(n)];
            next.pot_bb += size;
            next.current_bet_bb = size;
            if iset.player == 0 {
                next.p0_put_bb += size;
            } else {
                next.p1_put_bb += size;
            }
        } else if action.is_call(n) {
            let owed = iset.current_bet_bb;
            next.pot_bb += owed;
            next.current_bet_bb = 0.0;
            if iset.player == 0 {
                next.p0_put_bb += owed;
            } else {
                next.p1_put_bb += owed;
            }
        } else if action.is_raise(n) {
            let size = self.config.bet_sizes_bb[action.size_index(n)];
            let owed = iset.current_bet_bb;
            next.pot_bb += owed + size;
            next.current_bet_bb = size;
            if iset.player == 0 {
                next.p0_put_bb += owed + size;
            } else {
                next.p1_put_bb += owed + size;
            }
        }
        // CHECK and FOLD leave the pot untouched.

        next.history.push(action);
        next.player = 1 - iset.player;

        let double_check = action.is_check()
            && next.history.len() >= 2
            && next.history.second_last().map_or(false, |a| a.is_check());
        if double_check && iset.street != Street::River {
            next.street = iset.street.next();
            next.board = self.board_at(next.street);
            next.history = History::default();
            next.player = 0;
        }

        next
    }

    // -----------------------------------------------------------------------
    // CFR recursion
    // -----------------------------------------------------------------------

    /// Returns the node value from player 0's perspective.
    fn cfr(&mut self, iset: &InfoSet, reach_p0: f64, reach_p1: f64, depth: u32) -> f64 {
        if depth > self.config.depth_limit {
            return 0.0;
        }
        if reach_p0 < REACH_EPSILON || reach_p1 < REACH_EPSILON {
            return 0.0;
        }

        if let Some(last) = iset.history.last() {
            if self.is_terminal(iset, last) {
                return self.terminal_payoff(iset, last);
            }
        }

        let legal = self.legal_actions(iset);
        let (strategy, tracked) = match self.table.find_or_create(iset) {
            Some(data) => {
                data.visits += 1;
                (data.current_strategy(&legal), true)
            }
            None => {
                self.warn_capacity();
                (uniform_strategy(&legal), false)
            }
        };

        let mut utilities = [0.0; MAX_ACTIONS];
        let mut node_value = 0.0;
        for action in legal.iter() {
            let next = self.apply_action(iset, action);
            let (r0, r1) = if iset.player == 0 {
                (reach_p0 * strategy[action.0 as usize], reach_p1)
            } else {
                (reach_p0, reach_p1 * strategy[action.0 as usize])
            };
            let value = self.cfr(&next, r0, r1, depth + 1);
            utilities[action.0 as usize] = value;
            node_value += strategy[action.0 as usize] * value;
        }

        if tracked {
            // Convert to the acting player's perspective, weight regrets by
            // the opponent's (counterfactual) reach and the strategy sum by
            // the actor's own reach.
            let (own_reach, cf_reach) = if iset.player == 0 {
                (reach_p0, reach_p1)
            } else {
                (reach_p1, reach_p0)
            };
            let sign = if iset.player == 0 { 1.0 } else { -1.0 };
            if let Some(data) = self.table.find_or_create(iset) {
                for action in legal.iter() {
                    let i = action.0 as usize;
                    let regret = sign * (utilities[i] - node_value);
                    data.regrets[i] += cf_reach * regret;
                    data.strategy_sum[i] += own_reach * strategy[i];
                }
            }
        }

        node_value
    }

    fn warn_capacity(&mut self) {
        if !self.capacity_warned {
            self.capacity_warned = true;
            eprintln!(
                "warning: infoset table at capacity ({}); new nodes play uniformly",
                self.table.capacity()
            );
        }
    }

    // -----------------------------------------------------------------------
    // Strategy extraction
    // -----------------------------------------------------------------------

    /// Normalized average strategy at an infoset; uniform over the legal
    /// actions if the infoset was never reached.
    pub fn average_strategy(&self, iset: &InfoSet) -> [f64; MAX_ACTIONS] {
        let legal = self.legal_actions(iset);
        match self.table.get(iset) {
            Some(data) => data.average_strategy(&legal),
            None => uniform_strategy(&legal),
        }
    }

    pub fn root_strategy(&self) -> [f64; MAX_ACTIONS] {
        self.average_strategy(&self.root_infoset())
    }

    pub fn root_actions(&self) -> ActionSet {
        self.legal_actions(&self.root_infoset())
    }

    pub fn table(&self) -> &InfoSetTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_encoding_roundtrip() {
        // Two configured sizes: 0=CHECK 1,2=BET 3=FOLD 4=CALL 5,6=RAISE.
        let n = 2;
        assert!(Action::CHECK.is_check());
        assert!(Action::bet(0).is_bet(n));
        assert!(Action::bet(1).is_bet(n));
        assert_eq!(Action::bet(1).size_index(n), 1);
        assert_eq!(Action::fold(n).0, 3);
        assert!(Action::fold(n).is_fold(n));
        assert_eq!(Action::call(n).0, 4);
        assert!(Action::call(n).is_call(n));
        assert_eq!(Action::raise(n, 1).0, 6);
        assert!(Action::raise(n, 1).is_raise(n));
        assert_eq!(Action::raise(n, 1).size_index(n), 1);
        assert!(!Action::bet(0).is_raise(n));
        assert!(!Action::raise(n, 0).is_bet(n));
    }

    #[test]
    fn uniform_with_no_regret() {
        let data = InfoSetData::new();
        let mut legal = ActionSet::new();
        legal.push(Action(0));
        legal.push(Action(1));
        legal.push(Action(2));
        let strategy = data.current_strategy(&legal);
        for action in legal.iter() {
            assert!((strategy[action.0 as usize] - 1.0 / 3.0).abs() < 1e-9);
        }
        // Illegal slots stay at zero.
        assert_eq!(strategy[5], 0.0);
    }

    #[test]
    fn regret_matching_proportional() {
        let mut data = InfoSetData::new();
        data.regrets[0] = 3.0;
        data.regrets[1] = 1.0;
        let mut legal = ActionSet::new();
        legal.push(Action(0));
        legal.push(Action(1));
        let strategy = data.current_strategy(&legal);
        assert!((strategy[0] - 0.75).abs() < 1e-9);
        assert!((strategy[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn negative_regret_floored_in_matching() {
        let mut data = InfoSetData::new();
        data.regrets[0] = -5.0;
        data.regrets[1] = 3.0;
        let mut legal = ActionSet::new();
        legal.push(Action(0));
        legal.push(Action(1));
        let strategy = data.current_strategy(&legal);
        assert!(strategy[0].abs() < 1e-9);
        assert!((strategy[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn identical_regrets_identical_strategies() {
        let mut a = InfoSetData::new();
        let mut b = InfoSetData::new();
        for (i, r) in [0.5, -1.0, 2.5].iter().enumerate() {
            a.regrets[i] = *r;
            b.regrets[i] = *r;
        }
        let mut legal = ActionSet::new();
        legal.push(Action(0));
        legal.push(Action(1));
        legal.push(Action(2));
        assert_eq!(a.current_strategy(&legal), b.current_strategy(&legal));
    }

    #[test]
    fn history_push_and_query() {
        let mut history = History::default();
        assert!(history.last().is_none());
        history.push(Action(0));
        history.push(Action(1));
        assert_eq!(history.last(), Some(Action(1)));
        assert_eq!(history.second_last(), Some(Action(0)));
        assert_eq!(history.len(), 2);
        for _ in 0..20 {
            history.push(Action(2));
        }
        assert!(history.is_full());
        assert_eq!(history.len(), MAX_HISTORY);
    }

    #[test]
    fn infoset_hash_distinguishes_history() {
        let a = InfoSet { pot_bb: 1.5, ..InfoSet::default() };
        let mut b = a;
        b.history.push(Action(0));
        assert_ne!(a.key_hash(), b.key_hash());
        assert!(!a.same_state(&b));
    }

    #[test]
    fn infoset_hash_quantizes_pots() {
        let a = InfoSet { pot_bb: 1.5, ..InfoSet::default() };
        // A thousandth of a blind rounds away.
        let b = InfoSet { pot_bb: 1.5001, ..InfoSet::default() };
        assert_eq!(a.key_hash(), b.key_hash());
        assert!(a.same_state(&b));
        let c = InfoSet { pot_bb: 1.52, ..InfoSet::default() };
        assert!(!a.same_state(&c));
    }

    #[test]
    fn infoset_hash_never_zero() {
        let iset = InfoSet::default();
        assert_ne!(iset.key_hash(), 0);
    }

    #[test]
    fn table_insert_and_lookup() {
        let mut table = InfoSetTable::new(64);
        let a = InfoSet { pot_bb: 1.5, ..InfoSet::default() };
        let mut b = a;
        b.history.push(Action(1));

        table.find_or_create(&a).unwrap().visits = 7;
        table.find_or_create(&b).unwrap().visits = 9;
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&a).unwrap().visits, 7);
        assert_eq!(table.get(&b).unwrap().visits, 9);

        let mut c = a;
        c.pot_bb = 99.0;
        assert!(table.get(&c).is_none());
    }

    #[test]
    fn table_grows_and_keeps_entries() {
        let mut table = InfoSetTable::new(16);
        let mut isets = Vec::new();
        for i in 0..40 {
            let mut iset = InfoSet { pot_bb: 1.0 + i as f64, ..InfoSet::default() };
            iset.player = i % 2;
            isets.push(iset);
        }
        for (i, iset) in isets.iter().enumerate() {
            table.find_or_create(iset).unwrap().visits = i as u64 + 1;
        }
        assert!(table.capacity() > 16);
        assert_eq!(table.len(), 40);
        for (i, iset) in isets.iter().enumerate() {
            assert_eq!(table.get(iset).unwrap().visits, i as u64 + 1);
        }
    }
}
