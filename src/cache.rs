//! Lossy fixed-capacity hash tables.
//!
//! One parameterized structure backs the transposition table, the evaluation
//! table, and the pawn table. Two inner arrays with distinct prime lengths
//! (roughly a 60/40 split) are indexed by `key mod len`; lookups probe both,
//! inserts resolve collisions by lossy cuckoo relocation with a small bounded
//! number of hops. There is no resizing, chaining or rehashing — the stored
//! 64-bit key is the only correctness guard, so torn or lost writes degrade
//! hit rate, never soundness.

use crate::board::Move;

/// How many cuckoo relocation hops an insert attempts before dropping the
/// displaced entry.
const MAX_RELOCATIONS: u32 = 3;

/// Bound type of a stored search score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundType {
    /// Score is exact (searched with an open window).
    Exact,
    /// Score failed high: a lower bound on the true value.
    FailHigh,
    /// Score failed low: an upper bound on the true value.
    FailLow,
}

/// Common protocol for cache entries: a full key plus a replacement
/// priority. Higher priority survives collisions.
pub(crate) trait CacheEntry: Copy {
    fn key(&self) -> u64;
    fn priority(&self, generation: u8) -> u32;
}

/// Transposition table entry.
#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    key: u64,
    best: u32,
    score: i16,
    depth: u8,
    bound: BoundType,
    generation: u8,
}

impl TtEntry {
    pub(crate) fn new(
        key: u64,
        depth: u8,
        score: i16,
        bound: BoundType,
        best: Option<Move>,
        generation: u8,
    ) -> Self {
        TtEntry {
            key,
            best: best.map_or(0, Move::as_bits),
            score,
            depth,
            bound,
            generation,
        }
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Stored score in root-distance-neutral form; the search re-adjusts
    /// mate scores by ply on probe.
    #[inline]
    #[must_use]
    pub fn score(&self) -> i32 {
        i32::from(self.score)
    }

    #[inline]
    #[must_use]
    pub fn bound(&self) -> BoundType {
        self.bound
    }

    #[inline]
    #[must_use]
    pub fn best_move(&self) -> Option<Move> {
        if self.best == 0 {
            None
        } else {
            Some(Move::from_bits(self.best))
        }
    }
}

impl CacheEntry for TtEntry {
    #[inline]
    fn key(&self) -> u64 {
        self.key
    }

    /// Current-generation entries beat stale ones, deeper entries beat
    /// shallower ones, exact scores beat bounds at equal depth.
    #[inline]
    fn priority(&self, generation: u8) -> u32 {
        let fresh = u32::from(self.generation == generation) << 16;
        let exact = u32::from(matches!(self.bound, BoundType::Exact));
        fresh | (u32::from(self.depth) << 1) | exact
    }
}

/// Evaluation table entry: a finished static evaluation for a position key.
#[derive(Clone, Copy, Debug)]
pub struct EvalEntry {
    key: u64,
    score: i16,
    generation: u8,
}

impl EvalEntry {
    pub(crate) fn new(key: u64, score: i16, generation: u8) -> Self {
        EvalEntry {
            key,
            score,
            generation,
        }
    }

    #[inline]
    #[must_use]
    pub fn score(&self) -> i32 {
        i32::from(self.score)
    }
}

impl CacheEntry for EvalEntry {
    #[inline]
    fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    fn priority(&self, generation: u8) -> u32 {
        u32::from(self.generation == generation)
    }
}

/// Pawn table entry: middlegame/endgame pawn-structure scores keyed by the
/// pawn-only Zobrist subkey.
#[derive(Clone, Copy, Debug)]
pub struct PawnEntry {
    key: u64,
    mg: i16,
    eg: i16,
    generation: u8,
}

impl PawnEntry {
    pub(crate) fn new(key: u64, mg: i16, eg: i16, generation: u8) -> Self {
        PawnEntry {
            key,
            mg,
            eg,
            generation,
        }
    }

    #[inline]
    #[must_use]
    pub fn scores(&self) -> (i32, i32) {
        (i32::from(self.mg), i32::from(self.eg))
    }
}

impl CacheEntry for PawnEntry {
    #[inline]
    fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    fn priority(&self, generation: u8) -> u32 {
        u32::from(self.generation == generation)
    }
}

/// Largest prime at or below `n` (n >= 2). Runs once per resize.
fn prime_at_or_below(n: usize) -> usize {
    fn is_prime(x: usize) -> bool {
        if x < 4 {
            return x >= 2;
        }
        if x % 2 == 0 {
            return false;
        }
        let mut d = 3;
        while d * d <= x {
            if x % d == 0 {
                return false;
            }
            d += 2;
        }
        true
    }
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate -= 1;
    }
    candidate
}

/// A lossy two-table hash map with cuckoo-style collision handling.
pub(crate) struct LossyTable<E: CacheEntry> {
    primary: Box<[Option<E>]>,
    secondary: Box<[Option<E>]>,
    occupied: usize,
}

impl<E: CacheEntry> LossyTable<E> {
    /// Build with room for roughly `entries` entries, split ~60/40 across
    /// the two prime-length arrays.
    pub(crate) fn with_capacity(entries: usize) -> Self {
        let entries = entries.max(16);
        let primary_len = prime_at_or_below(entries * 3 / 5);
        let secondary_len = prime_at_or_below(entries - primary_len);
        LossyTable {
            primary: vec![None; primary_len].into_boxed_slice(),
            secondary: vec![None; secondary_len].into_boxed_slice(),
            occupied: 0,
        }
    }

    #[inline]
    fn slot(len: usize, key: u64) -> usize {
        (key % len as u64) as usize
    }

    /// Look up an entry; returns it only when the stored key matches.
    pub(crate) fn probe(&self, key: u64) -> Option<E> {
        let p = &self.primary[Self::slot(self.primary.len(), key)];
        if let Some(entry) = p {
            if entry.key() == key {
                return Some(*entry);
            }
        }
        let s = &self.secondary[Self::slot(self.secondary.len(), key)];
        if let Some(entry) = s {
            if entry.key() == key {
                return Some(*entry);
            }
        }
        None
    }

    /// Insert an entry, relocating weaker residents to their alternate slots
    /// and dropping whatever remains after the relocation budget.
    pub(crate) fn insert(&mut self, entry: E, generation: u8) {
        let p_idx = Self::slot(self.primary.len(), entry.key());
        let s_idx = Self::slot(self.secondary.len(), entry.key());

        // same key anywhere: overwrite in place
        if self.primary[p_idx].map_or(false, |e| e.key() == entry.key()) {
            self.primary[p_idx] = Some(entry);
            return;
        }
        if self.secondary[s_idx].map_or(false, |e| e.key() == entry.key()) {
            self.secondary[s_idx] = Some(entry);
            return;
        }
        // free slot: take it
        if self.primary[p_idx].is_none() {
            self.primary[p_idx] = Some(entry);
            self.occupied += 1;
            return;
        }
        if self.secondary[s_idx].is_none() {
            self.secondary[s_idx] = Some(entry);
            self.occupied += 1;
            return;
        }

        // both occupied: displace the weaker resident
        let p_priority = self.primary[p_idx].map_or(0, |e| e.priority(generation));
        let s_priority = self.secondary[s_idx].map_or(0, |e| e.priority(generation));
        let (mut displaced, mut in_primary) = if p_priority <= s_priority {
            let displaced = self.primary[p_idx];
            self.primary[p_idx] = Some(entry);
            (displaced, true)
        } else {
            let displaced = self.secondary[s_idx];
            self.secondary[s_idx] = Some(entry);
            (displaced, false)
        };

        for _ in 0..MAX_RELOCATIONS {
            let Some(evictee) = displaced else { return };
            // the alternate home lives in the other table
            if in_primary {
                let alt = Self::slot(self.secondary.len(), evictee.key());
                match self.secondary[alt] {
                    None => {
                        self.secondary[alt] = Some(evictee);
                        self.occupied += 1;
                        return;
                    }
                    Some(resident) if resident.priority(generation) < evictee.priority(generation) => {
                        displaced = Some(resident);
                        self.secondary[alt] = Some(evictee);
                        in_primary = false;
                    }
                    Some(_) => return, // weaker entry is simply lost
                }
            } else {
                let alt = Self::slot(self.primary.len(), evictee.key());
                match self.primary[alt] {
                    None => {
                        self.primary[alt] = Some(evictee);
                        self.occupied += 1;
                        return;
                    }
                    Some(resident) if resident.priority(generation) < evictee.priority(generation) => {
                        displaced = Some(resident);
                        self.primary[alt] = Some(evictee);
                        in_primary = true;
                    }
                    Some(_) => return,
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.primary.fill(None);
        self.secondary.fill(None);
        self.occupied = 0;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    /// Occupancy estimate in permille, for progress reporting.
    pub(crate) fn fill_per_mille(&self) -> u32 {
        ((self.occupied as u64 * 1000) / self.capacity() as u64) as u32
    }
}

/// Megabyte budget and integer shares for splitting it across the three
/// tables.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    pub megabytes: usize,
    pub tt_share: u32,
    pub eval_share: u32,
    pub pawn_share: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            megabytes: 64,
            tt_share: 8,
            eval_share: 1,
            pawn_share: 1,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_megabytes(megabytes: usize) -> Self {
        CacheConfig {
            megabytes,
            ..Default::default()
        }
    }
}

/// The transposition, evaluation and pawn tables plus the shared generation
/// counter bumped at every fresh search.
pub struct Caches {
    pub(crate) tt: LossyTable<TtEntry>,
    pub(crate) eval: LossyTable<EvalEntry>,
    pub(crate) pawn: LossyTable<PawnEntry>,
    pub(crate) generation: u8,
}

impl Caches {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let budget = config.megabytes.max(1) * 1024 * 1024;
        let total_shares =
            (config.tt_share + config.eval_share + config.pawn_share).max(1) as usize;
        let tt_bytes = budget * config.tt_share as usize / total_shares;
        let eval_bytes = budget * config.eval_share as usize / total_shares;
        let pawn_bytes = budget * config.pawn_share as usize / total_shares;

        Caches {
            tt: LossyTable::with_capacity(tt_bytes / std::mem::size_of::<Option<TtEntry>>()),
            eval: LossyTable::with_capacity(
                eval_bytes / std::mem::size_of::<Option<EvalEntry>>(),
            ),
            pawn: LossyTable::with_capacity(
                pawn_bytes / std::mem::size_of::<Option<PawnEntry>>(),
            ),
            generation: 0,
        }
    }

    /// Start a new search: age out previous contents by bumping the
    /// generation.
    pub fn new_search(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Wipe all three tables.
    pub fn clear(&mut self) {
        self.tt.clear();
        self.eval.clear();
        self.pawn.clear();
        self.generation = 0;
    }

    /// Wipe and rebuild all three tables under a new budget.
    pub fn resize(&mut self, config: CacheConfig) {
        *self = Caches::new(config);
    }

    #[must_use]
    pub fn hashfull_per_mille(&self) -> u32 {
        self.tt.fill_per_mille()
    }
}

impl Default for Caches {
    fn default() -> Self {
        Caches::new(CacheConfig::default())
    }
}
