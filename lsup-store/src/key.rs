//! Fixed-width keys.
//!
//! Every index stores 64-bit term keys or big-endian concatenations of them,
//! so that lexicographic byte order equals numeric order and prefix lookups
//! work directly on the raw bytes.

use byteorder::{BigEndian, ByteOrder};

use error::{ErrorKind, Result};

/// A single interned term key.
pub type TermKey = u64;

/// Width of a single term key in bytes.
pub const KEY_LEN: usize = 8;
/// Width of a two-term composite in bytes.
pub const DOUBLE_KEY_LEN: usize = 16;
/// Width of a three-term composite in bytes.
pub const TRIPLE_KEY_LEN: usize = 24;
/// Width of a four-term composite in bytes.
pub const QUAD_KEY_LEN: usize = 32;

/// Reserved key denoting "no term assigned".
pub const UNASSIGNED_KEY: TermKey = 0;
/// Reserved key of the default-graph context.
pub const DEFAULT_CTX_KEY: TermKey = 1;

/// Serializes a term key to its on-disk form.
#[inline]
pub fn term_key_bytes(key: TermKey) -> [u8; KEY_LEN] {
	let mut buf = [0u8; KEY_LEN];
	BigEndian::write_u64(&mut buf, key);
	buf
}

/// Reads a term key back from its on-disk form.
#[inline]
pub fn read_term_key(bytes: &[u8]) -> Result<TermKey> {
	if bytes.len() != KEY_LEN {
		bail!(ErrorKind::Decode(format!("term key is {} bytes, expected {}", bytes.len(), KEY_LEN)));
	}
	Ok(BigEndian::read_u64(bytes))
}

/// An ordered pair of term keys. Which positions the pair holds depends on
/// the index it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoubleKey(pub TermKey, pub TermKey);

impl DoubleKey {
	/// Serializes the pair to its on-disk form.
	pub fn bytes(&self) -> [u8; DOUBLE_KEY_LEN] {
		let mut buf = [0u8; DOUBLE_KEY_LEN];
		BigEndian::write_u64(&mut buf[..8], self.0);
		BigEndian::write_u64(&mut buf[8..], self.1);
		buf
	}

	/// Reads a pair back from its on-disk form.
	pub fn from_bytes(bytes: &[u8]) -> Result<DoubleKey> {
		if bytes.len() != DOUBLE_KEY_LEN {
			bail!(ErrorKind::Decode(format!("double key is {} bytes, expected {}", bytes.len(), DOUBLE_KEY_LEN)));
		}
		Ok(DoubleKey(BigEndian::read_u64(&bytes[..8]), BigEndian::read_u64(&bytes[8..])))
	}
}

/// The (s, p, o) key of a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TripleKey {
	/// Subject key.
	pub s: TermKey,
	/// Predicate key.
	pub p: TermKey,
	/// Object key.
	pub o: TermKey,
}

impl TripleKey {
	/// Serializes the triple to its on-disk form.
	pub fn bytes(&self) -> [u8; TRIPLE_KEY_LEN] {
		let mut buf = [0u8; TRIPLE_KEY_LEN];
		BigEndian::write_u64(&mut buf[..8], self.s);
		BigEndian::write_u64(&mut buf[8..16], self.p);
		BigEndian::write_u64(&mut buf[16..], self.o);
		buf
	}

	/// Reads a triple key back from its on-disk form.
	pub fn from_bytes(bytes: &[u8]) -> Result<TripleKey> {
		if bytes.len() != TRIPLE_KEY_LEN {
			bail!(ErrorKind::Decode(format!("triple key is {} bytes, expected {}", bytes.len(), TRIPLE_KEY_LEN)));
		}
		Ok(TripleKey {
			s: BigEndian::read_u64(&bytes[..8]),
			p: BigEndian::read_u64(&bytes[8..16]),
			o: BigEndian::read_u64(&bytes[16..]),
		})
	}

	/// Extends the triple with a context key.
	#[inline]
	pub fn with_ctx(&self, c: TermKey) -> QuadKey {
		QuadKey { s: self.s, p: self.p, o: self.o, c: c }
	}
}

/// The (s, p, o, c) key of a quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuadKey {
	/// Subject key.
	pub s: TermKey,
	/// Predicate key.
	pub p: TermKey,
	/// Object key.
	pub o: TermKey,
	/// Context key.
	pub c: TermKey,
}

impl QuadKey {
	/// The triple part of the quad.
	#[inline]
	pub fn triple(&self) -> TripleKey {
		TripleKey { s: self.s, p: self.p, o: self.o }
	}

	/// Serializes the quad to its on-disk form.
	pub fn bytes(&self) -> [u8; QUAD_KEY_LEN] {
		let mut buf = [0u8; QUAD_KEY_LEN];
		BigEndian::write_u64(&mut buf[..8], self.s);
		BigEndian::write_u64(&mut buf[8..16], self.p);
		BigEndian::write_u64(&mut buf[16..24], self.o);
		BigEndian::write_u64(&mut buf[24..], self.c);
		buf
	}
}

#[cfg(test)]
mod tests {
	use super::{read_term_key, term_key_bytes, DoubleKey, TripleKey};

	#[test]
	fn term_key_roundtrip() {
		for key in &[0u64, 1, 2, 0xdead_beef, <u64>::max_value()] {
			assert_eq!(read_term_key(&term_key_bytes(*key)).unwrap(), *key);
		}
		assert!(read_term_key(b"too short").is_err());
	}

	#[test]
	fn byte_order_matches_numeric_order() {
		let keys = [0u64, 1, 255, 256, 0x0100_0000_0000, <u64>::max_value()];
		for window in keys.windows(2) {
			assert!(term_key_bytes(window[0]) < term_key_bytes(window[1]));
		}

		assert!(DoubleKey(1, <u64>::max_value()).bytes() < DoubleKey(2, 0).bytes());
		assert!(
			TripleKey { s: 1, p: 2, o: <u64>::max_value() }.bytes() <
			TripleKey { s: 1, p: 3, o: 0 }.bytes()
		);
	}

	#[test]
	fn composite_roundtrip() {
		let double = DoubleKey(42, 1 << 60);
		assert_eq!(DoubleKey::from_bytes(&double.bytes()).unwrap(), double);

		let triple = TripleKey { s: 3, p: 5, o: 7 };
		assert_eq!(TripleKey::from_bytes(&triple.bytes()).unwrap(), triple);
		assert_eq!(triple.with_ctx(11).triple(), triple);

		assert!(DoubleKey::from_bytes(&[0u8; 8]).is_err());
		assert!(TripleKey::from_bytes(&[0u8; 16]).is_err());
	}
}
