//! Card indices, packed 64-bit hands, and text notation.
//!
//! A card is a `u8` in `0..52`: rank = `card >> 2` (0 = deuce .. 12 = ace),
//! suit = `card & 3`. The packed form puts suit `s`'s ranks into bits
//! `16*s .. 16*s+12` of a `u64`, one bit per rank; bits outside those four
//! 13-bit windows are always zero.

use crate::error::{SolverError, SolverResult};

pub const NUM_CARDS: u8 = 52;
pub const NUM_RANKS: usize = 13;
pub const NUM_SUITS: usize = 4;

pub const RANK_CHARS: [char; NUM_RANKS] = [
    '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A',
];
pub const SUIT_CHARS: [char; NUM_SUITS] = ['c', 'd', 'h', 's'];

#[inline]
pub fn rank_of(card: u8) -> u8 {
    card >> 2
}

#[inline]
pub fn suit_of(card: u8) -> u8 {
    card & 3
}

#[inline]
pub fn make_card(rank: u8, suit: u8) -> u8 {
    rank * 4 + suit
}

/// Packed single-card bit: rank bit within the suit's 13-bit window.
#[inline]
pub fn pack_card(card: u8) -> u64 {
    1u64 << (rank_of(card) as u32 + 16 * suit_of(card) as u32)
}

/// OR together the packed bits of a set of distinct cards.
pub fn pack_cards(cards: &[u8]) -> u64 {
    cards.iter().fold(0u64, |h, &c| h | pack_card(c))
}

/// 13-bit rank set held in `suit` within a packed hand.
#[inline]
pub fn suit_mask(hand: u64, suit: u8) -> u16 {
    ((hand >> (16 * suit as u32)) & 0x1FFF) as u16
}

pub fn parse_card(s: &str) -> SolverResult<u8> {
    let mut chars = s.chars();
    let (rc, sc) = match (chars.next(), chars.next(), chars.next()) {
        (Some(r), Some(c), None) => (r.to_ascii_uppercase(), c.to_ascii_lowercase()),
        _ => return Err(SolverError::InvalidCard(s.to_string())),
    };
    let rank = RANK_CHARS.iter().position(|&r| r == rc);
    let suit = SUIT_CHARS.iter().position(|&c| c == sc);
    match (rank, suit) {
        (Some(r), Some(c)) => Ok(make_card(r as u8, c as u8)),
        _ => Err(SolverError::InvalidCard(s.to_string())),
    }
}

/// Parse a two-card hand like "AcKd". The cards must be distinct.
pub fn parse_hand(s: &str) -> SolverResult<(u8, u8)> {
    if s.len() != 4 {
        return Err(SolverError::InvalidHand(s.to_string()));
    }
    let c0 = parse_card(&s[0..2]).map_err(|_| SolverError::InvalidHand(s.to_string()))?;
    let c1 = parse_card(&s[2..4]).map_err(|_| SolverError::InvalidHand(s.to_string()))?;
    if c0 == c1 {
        return Err(SolverError::InvalidHand(s.to_string()));
    }
    Ok((c0, c1))
}

/// Parse a board string of 0, 3, 4, or 5 cards ("AcKdQh..."). Rejects
/// duplicate cards and any other length.
pub fn parse_board(s: &str) -> SolverResult<Vec<u8>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    if s.len() % 2 != 0 {
        return Err(SolverError::InvalidBoard(
            s.to_string(),
            "odd number of characters".to_string(),
        ));
    }
    let count = s.len() / 2;
    if !(3..=5).contains(&count) {
        return Err(SolverError::InvalidBoard(
            s.to_string(),
            format!("expected 3, 4 or 5 cards, got {}", count),
        ));
    }
    let mut board = Vec::with_capacity(count);
    for i in 0..count {
        let card = parse_card(&s[2 * i..2 * i + 2])
            .map_err(|_| SolverError::InvalidBoard(s.to_string(), "bad card".to_string()))?;
        if board.contains(&card) {
            return Err(SolverError::InvalidBoard(
                s.to_string(),
                "duplicate card".to_string(),
            ));
        }
        board.push(card);
    }
    Ok(board)
}

pub fn card_str(card: u8) -> String {
    format!(
        "{}{}",
        RANK_CHARS[rank_of(card) as usize],
        SUIT_CHARS[suit_of(card) as usize]
    )
}

pub fn cards_str(cards: &[u8]) -> String {
    cards.iter().map(|&c| card_str(c)).collect()
}

/// Build a full deck (0-51) excluding the given dead cards.
pub fn remaining_deck(dead: &[u8]) -> Vec<u8> {
    let mut dead_set = [false; NUM_CARDS as usize];
    for &d in dead {
        dead_set[d as usize] = true;
    }
    (0..NUM_CARDS).filter(|&c| !dead_set[c as usize]).collect()
}
