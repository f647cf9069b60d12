//! Chunk comparison: exact bytes, or PCM16LE samples within a +-N tolerance.
//!
//! Fuzzy matching exists for decoders with float paths, whose output can drift
//! by a few units between builds (compiler flags, SIMD paths) without being a
//! regression.

use vrts_common::SampleMismatch;

/// How chunks are matched, picked once per comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Exact,
    Fuzzy(u32),
}

impl CompareMode {
    pub fn from_tolerance(tolerance: u32) -> Self {
        if tolerance == 0 {
            CompareMode::Exact
        } else {
            CompareMode::Fuzzy(tolerance)
        }
    }

    pub fn is_fuzzy(self) -> bool {
        matches!(self, CompareMode::Fuzzy(_))
    }
}

/// Verdict for a single chunk pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkVerdict {
    Same,
    /// Bytes differ but every sample is within the tolerance
    FuzzySame,
    /// First mismatching sample, offset relative to the chunk start
    Diffs(Option<SampleMismatch>),
}

impl ChunkVerdict {
    pub fn is_diffs(self) -> bool {
        matches!(self, ChunkVerdict::Diffs(_))
    }
}

/// Compare two chunks with the given mode
pub fn compare_chunk(mode: CompareMode, first: &[u8], second: &[u8]) -> ChunkVerdict {
    if first == second {
        return ChunkVerdict::Same;
    }

    match mode {
        CompareMode::Exact => ChunkVerdict::Diffs(None),
        CompareMode::Fuzzy(tolerance) => compare_samples(first, second, tolerance),
    }
}

/// `true` if `a` lies within `b - tolerance ..= b + tolerance`
pub fn within_tolerance(a: i16, b: i16, tolerance: u32) -> bool {
    (i32::from(a) - i32::from(b)).unsigned_abs() <= tolerance
}

fn compare_samples(first: &[u8], second: &[u8], tolerance: u32) -> ChunkVerdict {
    // Final chunks of unequal length only show up as EOF slop after the size check.
    if first.len() != second.len() {
        return ChunkVerdict::Same;
    }

    let first_samples = first.chunks_exact(2);
    let second_samples = second.chunks_exact(2);
    let first_tail = first_samples.remainder();
    let second_tail = second_samples.remainder();

    for (index, (a, b)) in first_samples.zip(second_samples).enumerate() {
        let a = i16::from_le_bytes([a[0], a[1]]);
        let b = i16::from_le_bytes([b[0], b[1]]);
        if !within_tolerance(a, b, tolerance) {
            return ChunkVerdict::Diffs(Some(SampleMismatch {
                delta: i32::from(a) - i32::from(b),
                offset: (index * 2) as u64,
            }));
        }
    }

    if first_tail != second_tail {
        return ChunkVerdict::Diffs(Some(SampleMismatch {
            delta: i32::from(first_tail[0]) - i32::from(second_tail[0]),
            offset: (first.len() - 1) as u64,
        }));
    }

    ChunkVerdict::FuzzySame
}
