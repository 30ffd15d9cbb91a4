//! Term key derivation.
//!
//! Every interned term is identified by a 64-bit key obtained by hashing its
//! canonical serialization with a keyed hash under a fixed 16-byte seed. The
//! seed is compiled in and must not change once a store has been bootstrapped;
//! doing so orphans every key already on disk.

use std::hash::Hasher;

use byteorder::{ByteOrder, LittleEndian};
use siphasher::sip::SipHasher24;

use error::{ErrorKind, Result};
use key::TermKey;

/// Seed length in bytes.
pub const SEED_LEN: usize = 16;

/// The compiled-in default seed.
pub const DEFAULT_SEED: Seed = Seed(*b"lsup-term-hash-0");

/// A 16-byte term hash seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(pub [u8; SEED_LEN]);

impl Seed {
	/// Parses a seed from its 32-character hex representation.
	pub fn from_hex(hex: &str) -> Result<Seed> {
		if hex.len() != SEED_LEN * 2 {
			bail!(ErrorKind::InvalidOptions(
				"hash_seed",
				format!("expected {} hex characters, got {}", SEED_LEN * 2, hex.len())
			));
		}

		let value = u128::from_str_radix(hex, 16)?;
		Ok(Seed(value.to_be_bytes()))
	}
}

impl Default for Seed {
	fn default() -> Seed {
		DEFAULT_SEED
	}
}

/// Derives the term key for a canonical term serialization.
pub fn key_of(bytes: &[u8], seed: &Seed) -> TermKey {
	let k0 = LittleEndian::read_u64(&seed.0[..8]);
	let k1 = LittleEndian::read_u64(&seed.0[8..]);
	let mut hasher = SipHasher24::new_with_keys(k0, k1);
	hasher.write(bytes);
	hasher.finish()
}
