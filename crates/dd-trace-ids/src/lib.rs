#![warn(missing_docs)]

//! 63-bit trace/span identifier generation.
//!
//! IDs are generated with the high bit of a `u64` always clear so that they
//! round-trip through collectors that decode the wire format into a signed
//! 64-bit integer. `0` is reserved (callers treat a `trace_id` of `0` as
//! "no parent") and is never emitted by [`RandomIdGenerator`].

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Mask clearing the high bit of a `u64`, keeping IDs within the positive
/// range of a signed 64-bit integer.
const ID_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Source of unique trace/span identifiers.
///
/// Implementations must be safe to call from many threads concurrently and
/// must support [`reseed`](IdGenerator::reseed) so a forked child process can
/// avoid generating IDs that collide with its parent.
pub trait IdGenerator: Send + Sync {
    /// Returns a new 63-bit positive identifier. Never returns `0`.
    fn next_id(&self) -> u64;

    /// Reseeds the generator's internal state. Must be called by the owning
    /// tracer immediately after detecting a fork, before any further IDs are
    /// minted.
    fn reseed(&self);
}

/// Default [`IdGenerator`] backed by a per-process PRNG guarded by a mutex.
///
/// A plain `Mutex<StdRng>` is deliberately simple here: ID generation is not
/// hot enough (one or two calls per span) to justify a lock-free RNG, and a
/// single contended mutex is easier to reason about across the fork boundary
/// than thread-local RNG state that would need per-thread reseeding.
pub struct RandomIdGenerator {
    rng: Mutex<StdRng>,
    reseed_count: AtomicU64,
}

impl RandomIdGenerator {
    /// Creates a generator seeded from the OS entropy source.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            reseed_count: AtomicU64::new(0),
        }
    }

    /// Number of times this generator has been reseeded (exposed for tests
    /// and fork-reconciliation diagnostics).
    pub fn reseed_count(&self) -> u64 {
        self.reseed_count.load(Ordering::Relaxed)
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> u64 {
        loop {
            let raw = self.rng.lock().next_u64() & ID_MASK;
            if raw != 0 {
                return raw;
            }
            // A raw value of exactly 0 is astronomically unlikely but would
            // violate the "0 is reserved" contract; just draw again.
        }
    }

    fn reseed(&self) {
        *self.rng.lock() = StdRng::from_entropy();
        self.reseed_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the current process ID, used by the tracer to detect forks.
pub fn current_pid() -> u32 {
    // SAFETY: getpid(2) takes no arguments and cannot fail.
    unsafe { libc::getpid() as u32 }
}
