//! Shared transposition table (spec.md §4.4): lockless, single entry per
//! slot, indexed by the high bits of a 128-bit key-by-length product instead
//! of a modulo. Concurrent reads/writes are intentionally unsynchronized
//! (spec.md §5 "TT: read-shared, write-shared, unsynchronized") — a torn
//! entry is caught by the 16-bit truncated-key check at probe time and
//! treated as a miss, never as corruption.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Move, MAX_DEPTH};

pub const SCORE_INF: i32 = 30000;
const MATE_THRESHOLD: i32 = SCORE_INF - MAX_DEPTH as i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

impl Bound {
    #[inline]
    const fn to_bits(self) -> u8 {
        match self {
            Bound::Exact => 0,
            Bound::Lower => 1,
            Bound::Upper => 2,
        }
    }

    #[inline]
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Exact,
        }
    }
}

/// Packed flags byte: `bound:2, was_pv:1, age:5`.
#[inline]
const fn pack_flags(bound: Bound, was_pv: bool, age: u8) -> u8 {
    bound.to_bits() | ((was_pv as u8) << 2) | ((age & 0x1F) << 3)
}

#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    pub key16: u16,
    pub score: i16,
    pub raw_eval: i16,
    pub best_move: Move,
    pub depth: u8,
    pub bound: Bound,
    pub was_pv: bool,
    pub age: u8,
}

/// One 128-bit-packed slot, laid out for atomic-ish single-word reads. The
/// table stores each field in a fixed bit layout inside a `u64` pair so a
/// probe is two relaxed loads, not a lock.
#[repr(align(16))]
struct Slot {
    lo: AtomicU64,
    hi: AtomicU64,
}

impl Slot {
    const fn empty() -> Self {
        Slot {
            lo: AtomicU64::new(0),
            hi: AtomicU64::new(0),
        }
    }

    #[inline]
    fn load(&self) -> (u64, u64) {
        (self.lo.load(Ordering::Relaxed), self.hi.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, lo: u64, hi: u64) {
        self.lo.store(lo, Ordering::Relaxed);
        self.hi.store(hi, Ordering::Relaxed);
    }
}

/// `lo = key16:16 | score:16 | raw_eval:16 | depth:8 | flags:8`
/// `hi = best_move:16` (remaining bits unused, reserved for growth).
#[inline]
fn encode(entry: &TtEntry) -> (u64, u64) {
    let lo = u64::from(entry.key16)
        | (u64::from(entry.score as u16) << 16)
        | (u64::from(entry.raw_eval as u16) << 32)
        | (u64::from(entry.depth) << 48)
        | (u64::from(pack_flags(entry.bound, entry.was_pv, entry.age)) << 56);
    let hi = u64::from(entry.best_move.as_u16());
    (lo, hi)
}

#[inline]
fn decode(lo: u64, hi: u64) -> TtEntry {
    let key16 = lo as u16;
    let score = (lo >> 16) as u16 as i16;
    let raw_eval = (lo >> 32) as u16 as i16;
    let depth = (lo >> 48) as u8;
    let flags = (lo >> 56) as u8;
    let best_move = Move::from_u16(hi as u16);
    TtEntry {
        key16,
        score,
        raw_eval,
        best_move,
        depth,
        bound: Bound::from_bits(flags),
        was_pv: flags & 0x4 != 0,
        age: (flags >> 3) & 0x1F,
    }
}

/// Mate-distance adjustment (spec.md §4.4): store ply-independent scores,
/// recover ply-relative ones on load.
#[inline]
fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_THRESHOLD {
        score - ply as i32
    } else if score <= -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

pub struct TranspositionTable {
    slots: Box<[Slot]>,
    age: std::sync::atomic::AtomicU8,
}

impl TranspositionTable {
    const ENTRY_BYTES: usize = std::mem::size_of::<Slot>();

    #[must_use]
    pub fn new(bytes: usize) -> Self {
        let count = (bytes / Self::ENTRY_BYTES).max(1);
        log::debug!("allocating transposition table: {bytes} bytes, {count} slots");
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, Slot::empty);
        TranspositionTable {
            slots: slots.into_boxed_slice(),
            age: std::sync::atomic::AtomicU8::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `index = (key * len) >> 64` (spec.md §4.4): the high 64 bits of the
    /// 128-bit product, avoiding a modulo on every probe.
    #[inline]
    fn index(&self, key: u64) -> usize {
        ((u128::from(key) * self.slots.len() as u128) >> 64) as usize
    }

    /// Issues a hardware prefetch for the slot `key` will probe. A no-op on
    /// targets without an intrinsic; the spec treats it purely as a latency
    /// hint, never a correctness requirement.
    #[inline]
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let idx = self.index(key);
            unsafe {
                _mm_prefetch(
                    (self.slots.as_ptr().add(idx)).cast::<i8>(),
                    _MM_HINT_T0,
                );
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = key;
        }
    }

    #[must_use]
    pub fn probe(&self, key: u64, ply: usize) -> Option<TtEntry> {
        let idx = self.index(key);
        let (lo, hi) = self.slots[idx].load();
        if lo == 0 && hi == 0 {
            return None;
        }
        let mut entry = decode(lo, hi);
        if entry.key16 != key as u16 {
            return None;
        }
        entry.score = score_from_tt(i32::from(entry.score), ply) as i16;
        Some(entry)
    }

    /// Overwrites the slot unconditionally (spec.md §4.4: "always replace").
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        ply: usize,
        depth: u8,
        score: i32,
        raw_eval: i32,
        best_move: Move,
        bound: Bound,
        was_pv: bool,
    ) {
        let idx = self.index(key);
        let entry = TtEntry {
            key16: key as u16,
            score: score_to_tt(score, ply).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16,
            raw_eval: raw_eval.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16,
            best_move,
            depth,
            bound,
            was_pv,
            age: self.age.load(Ordering::Relaxed),
        };
        let (lo, hi) = encode(&entry);
        self.slots[idx].store(lo, hi);
    }

    pub fn new_search(&self) {
        self.age.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn generation(&self) -> u8 {
        self.age.load(Ordering::Relaxed) & 0x1F
    }

    /// Zeros the table in parallel, chunking evenly across `threads`
    /// (spec.md §4.4).
    pub fn clear(&self, threads: usize) {
        let threads = threads.max(1);
        let len = self.slots.len();
        if len == 0 {
            return;
        }
        let chunk = len.div_ceil(threads);
        std::thread::scope(|scope| {
            for start in (0..len).step_by(chunk.max(1)) {
                let end = (start + chunk).min(len);
                let slice = &self.slots[start..end];
                scope.spawn(move || {
                    for slot in slice {
                        slot.store(0, 0);
                    }
                });
            }
        });
    }

    /// Hashfull permille estimate (UCI `info hashfull`), sampled over the
    /// first 1000 slots.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let sample = self.slots.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let current_age = self.generation();
        let used = self.slots[..sample]
            .iter()
            .filter(|slot| {
                let (lo, hi) = slot.load();
                if lo == 0 && hi == 0 {
                    return false;
                }
                decode(lo, hi).age == current_age
            })
            .count();
        (used * 1000 / sample) as u32
    }
}

/// Reallocates to `bytes` and clears (spec.md §4.4 `resize`).
#[must_use]
pub fn resize(bytes: usize, threads: usize) -> TranspositionTable {
    log::debug!("resizing transposition table to {} MiB across {threads} thread(s)", bytes / (1024 * 1024));
    let table = TranspositionTable::new(bytes);
    table.clear(threads);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    fn mv() -> Move {
        Move::quiet(Square::from_str_opt("e2").unwrap(), Square::from_str_opt("e4").unwrap())
    }

    #[test]
    fn store_then_probe_round_trips() {
        let tt = TranspositionTable::new(1 << 20);
        tt.store(0xDEAD_BEEF, 0, 8, 123, 100, mv(), Bound::Exact, true);
        let entry = tt.probe(0xDEAD_BEEF, 0).unwrap();
        assert_eq!(entry.score, 123);
        assert_eq!(entry.depth, 8);
        assert_eq!(entry.best_move, mv());
        assert_eq!(entry.bound, Bound::Exact);
        assert!(entry.was_pv);
    }

    #[test]
    fn probe_misses_for_an_unrelated_key() {
        let tt = TranspositionTable::new(1 << 16);
        tt.store(0x1234_5678, 0, 4, 10, 10, mv(), Bound::Exact, false);
        assert!(tt.probe(0x9999_9999, 0).is_none());
    }

    #[test]
    fn empty_slot_is_a_miss() {
        let tt = TranspositionTable::new(1 << 16);
        assert!(tt.probe(0x42, 0).is_none());
    }

    #[test]
    fn mate_score_adjusts_with_ply() {
        let tt = TranspositionTable::new(1 << 16);
        let mate_score = SCORE_INF - 3;
        tt.store(0x99, 5, 10, mate_score, 0, mv(), Bound::Exact, false);
        let entry = tt.probe(0x99, 5).unwrap();
        assert_eq!(i32::from(entry.score), mate_score);
    }

    #[test]
    fn clear_zeros_every_slot() {
        let tt = TranspositionTable::new(1 << 16);
        tt.store(0x77, 0, 4, 50, 50, mv(), Bound::Exact, false);
        tt.clear(4);
        assert!(tt.probe(0x77, 0).is_none());
    }

    #[test]
    fn new_search_advances_generation_with_wraparound() {
        let tt = TranspositionTable::new(1 << 16);
        for _ in 0..33 {
            tt.new_search();
        }
        assert_eq!(tt.generation(), 1);
    }
}
