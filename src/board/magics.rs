//! Fancy magic bitboards for sliding-piece attacks.
//!
//! Each square stores an occupancy mask, a magic multiplier, a shift, and an
//! offset into one shared attack array. The query is
//! `table[offset + ((occ & mask) * magic) >> shift]`.
//!
//! Magic multipliers are found once at startup from a fixed-seed PRNG; the
//! finder enumerates every occupancy subset of the mask, so a multiplier is
//! accepted only when the hash is injective over the full subset space.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::masks::{DIR_E, DIR_N, DIR_NE, DIR_NW, DIR_S, DIR_SE, DIR_SW, DIR_W, RAYS};
use super::types::{Bitboard, Square};

const ROOK_DIRS: [usize; 4] = [DIR_N, DIR_S, DIR_E, DIR_W];
const BISHOP_DIRS: [usize; 4] = [DIR_NE, DIR_NW, DIR_SE, DIR_SW];

/// A single square's magic lookup data.
struct MagicEntry {
    mask: u64,
    magic: u64,
    shift: u32,
    offset: usize,
}

/// Magic tables for one slider kind (rook or bishop).
struct SliderTable {
    entries: [MagicEntry; 64],
    attacks: Vec<u64>,
}

impl SliderTable {
    #[inline]
    fn attacks(&self, sq: usize, occ: u64) -> u64 {
        let entry = &self.entries[sq];
        let index = ((occ & entry.mask).wrapping_mul(entry.magic) >> entry.shift) as usize;
        self.attacks[entry.offset + index]
    }
}

/// The occupancy mask for a slider: inner ray squares, excluding the board
/// edge on each ray (edge occupancy never changes the attack set).
fn slider_mask(sq: usize, dirs: &[usize; 4]) -> u64 {
    let mut mask = 0u64;
    for &dir in dirs {
        let ray = RAYS[dir][sq];
        let trimmed = match dir {
            DIR_N => ray & !Bitboard::RANK_8.0,
            DIR_S => ray & !Bitboard::RANK_1.0,
            DIR_E => ray & !Bitboard::FILE_H.0,
            DIR_W => ray & !Bitboard::FILE_A.0,
            DIR_NE => ray & !Bitboard::RANK_8.0 & !Bitboard::FILE_H.0,
            DIR_NW => ray & !Bitboard::RANK_8.0 & !Bitboard::FILE_A.0,
            DIR_SE => ray & !Bitboard::RANK_1.0 & !Bitboard::FILE_H.0,
            _ => ray & !Bitboard::RANK_1.0 & !Bitboard::FILE_A.0,
        };
        mask |= trimmed;
    }
    mask
}

/// Reference attack computation by ray scanning, used to fill and validate
/// the magic tables.
fn scan_attacks(sq: usize, occ: u64, dirs: &[usize; 4]) -> u64 {
    let mut attacks = 0u64;
    for &dir in dirs {
        let ray = RAYS[dir][sq];
        let blockers = ray & occ;
        if blockers == 0 {
            attacks |= ray;
            continue;
        }
        let nearest = if matches!(dir, DIR_N | DIR_E | DIR_NE | DIR_NW) {
            blockers.trailing_zeros() as usize
        } else {
            63 - blockers.leading_zeros() as usize
        };
        attacks |= ray ^ RAYS[dir][nearest];
    }
    attacks
}

/// Sparse random candidate, as the magic searchers in Stockfish do.
fn sparse_u64(rng: &mut StdRng) -> u64 {
    rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>()
}

fn build_slider_table(dirs: &[usize; 4], seed: u64) -> SliderTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut attacks = Vec::new();
    let mut entries = Vec::with_capacity(64);

    for sq in 0..64 {
        let mask = slider_mask(sq, dirs);
        let bits = mask.count_ones();
        let size = 1usize << bits;
        let shift = 64 - bits;

        // Enumerate every subset of the mask with the carry-rippler trick.
        let mut subsets = Vec::with_capacity(size);
        let mut reference = Vec::with_capacity(size);
        let mut occ = 0u64;
        loop {
            subsets.push(occ);
            reference.push(scan_attacks(sq, occ, dirs));
            occ = occ.wrapping_sub(mask) & mask;
            if occ == 0 {
                break;
            }
        }

        // Search for an injective multiplier over the full subset space.
        let offset = attacks.len();
        attacks.resize(offset + size, 0u64);
        let magic = loop {
            let candidate = sparse_u64(&mut rng);
            // cheap rejection: the top byte of the hashed mask must be dense
            if (mask.wrapping_mul(candidate) >> 56).count_ones() < 6 {
                continue;
            }
            let table = &mut attacks[offset..offset + size];
            table.fill(0);
            let mut used = vec![false; size];
            let mut ok = true;
            for (&subset, &attack) in subsets.iter().zip(&reference) {
                let index = (subset.wrapping_mul(candidate) >> shift) as usize;
                if used[index] && table[index] != attack {
                    ok = false;
                    break;
                }
                used[index] = true;
                table[index] = attack;
            }
            if ok {
                break candidate;
            }
        };

        entries.push(MagicEntry {
            mask,
            magic,
            shift,
            offset,
        });
    }

    let entries: [MagicEntry; 64] = match entries.try_into() {
        Ok(arr) => arr,
        Err(_) => unreachable!(),
    };
    SliderTable { entries, attacks }
}

static ROOK_TABLE: Lazy<SliderTable> = Lazy::new(|| build_slider_table(&ROOK_DIRS, 0x9d39_247e));
static BISHOP_TABLE: Lazy<SliderTable> =
    Lazy::new(|| build_slider_table(&BISHOP_DIRS, 0x33cc_9f70));

/// Rook attack set for a square given full-board occupancy.
#[inline]
pub(crate) fn rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    Bitboard(ROOK_TABLE.attacks(sq.index(), occ.0))
}

/// Bishop attack set for a square given full-board occupancy.
#[inline]
pub(crate) fn bishop_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    Bitboard(BISHOP_TABLE.attacks(sq.index(), occ.0))
}

/// Queen attack set: rook union bishop.
#[inline]
pub(crate) fn queen_attacks(sq: Square, occ: Bitboard) -> Bitboard {
    rook_attacks(sq, occ) | bishop_attacks(sq, occ)
}
