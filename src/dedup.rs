//! Program deduplication
//!
//! Adjacent guide windows overlap, so the same broadcast usually arrives
//! more than once. Records are collapsed on `(start_time, title,
//! guide_number)`, keeping the first record encountered for each key.

use std::collections::HashSet;

use tracing::debug;

use crate::types::ProgramRecord;

/// Collapse duplicate program records, keeping the first per dedup key.
///
/// Pure and idempotent; records that share a key are treated as the same
/// broadcast regardless of which fetch window produced them.
pub fn dedup(programs: Vec<ProgramRecord>) -> Vec<ProgramRecord> {
    let mut seen = HashSet::with_capacity(programs.len());
    let mut unique = Vec::with_capacity(programs.len());
    let mut dropped = 0usize;

    for program in programs {
        if seen.insert(program.dedup_key()) {
            unique.push(program);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped, kept = unique.len(), "collapsed duplicate programs");
    }
    unique
}
