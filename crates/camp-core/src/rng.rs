//! Seed-derivation helpers.

use rand::RngCore;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Derives the deterministic seed for a specific substream.
///
/// Substreams are derived by hashing `(master_seed, substream_id)` with
/// SipHash-1-3 configured with fixed zero keys. The rule is stable across
/// platforms, so a recorded master seed reproduces every substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Draws a fresh master seed from the operating system entropy source.
///
/// Callers must record the returned value; it is the only way to replay a
/// campaign sampled with it.
pub fn entropy_seed() -> u64 {
    rand::rngs::OsRng.next_u64()
}
