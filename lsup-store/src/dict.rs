//! The term dictionary.
//!
//! Two sub-databases hold the bidirectional mapping between term keys and
//! canonical term bytes: `t2k` (term hash to assigned key) and `k2t` (key to
//! bytes). `t2k` is keyed by the 8-byte term hash rather than the
//! serialization itself, which keeps every dictionary key fixed-width and
//! inside LMDB's key size limit no matter how long a literal grows; the
//! stored bytes in `k2t` remain the authority on what a key means, so every
//! forward resolution is verified against them. Interning is idempotent and
//! collision-checked; the store never merges distinct terms under one key
//! and never reassigns a seed at runtime, so a collision is an error the
//! caller sees.

use lmdb;
use lmdb::Cursor;
use lmdb_sys;

use error::{ErrorKind, Result};
use hash::{self, Seed};
use key::{read_term_key, term_key_bytes, TermKey, DEFAULT_CTX_KEY, UNASSIGNED_KEY};
use term::{self, Term};
use txn::{TxnRead, WriteTxn};

/// The term dictionary over its two sub-databases.
#[derive(Debug)]
pub struct Dict {
	t2k: lmdb::Database,
	k2t: lmdb::Database,
	seed: Seed,
}

impl Dict {
	pub(crate) fn new(t2k: lmdb::Database, k2t: lmdb::Database, seed: Seed) -> Dict {
		Dict { t2k: t2k, k2t: k2t, seed: seed }
	}

	/// Interns a term, returning its key. Idempotent: an already interned
	/// term returns its existing key without touching the hash.
	pub fn intern(&self, txn: &mut WriteTxn, term: &Term) -> Result<TermKey> {
		self.intern_encoded(txn, &term::encode(term))
	}

	pub(crate) fn intern_encoded(&self, txn: &mut WriteTxn, bytes: &[u8]) -> Result<TermKey> {
		let hash = hash::key_of(bytes, &self.seed);

		let assigned = match txn.kv_get(self.t2k, &term_key_bytes(hash))? {
			Some(stored) => Some(read_term_key(stored)?),
			None => None,
		};
		if let Some(key) = assigned {
			// The hash is taken; only the stored bytes say by which term.
			match txn.kv_get(self.k2t, &term_key_bytes(key))? {
				Some(stored) if stored == bytes => return Ok(key),
				Some(_) => {
					error!("term hash {:#018x} already maps to a different term", hash);
					bail!(ErrorKind::Collision(hash));
				},
				None => {
					error!("term hash {:#018x} maps to key {:#018x} with no entry", hash, key);
					bail!(ErrorKind::MissingTerm(key));
				},
			}
		}

		if hash == UNASSIGNED_KEY || hash == DEFAULT_CTX_KEY {
			error!("term hash landed on reserved key {:#018x}", hash);
			bail!(ErrorKind::Collision(hash));
		}
		if txn.kv_get(self.k2t, &term_key_bytes(hash))?.is_some() {
			// Occupied key without a forward entry: the halves disagree.
			error!("term key {:#018x} is occupied but unreachable from t2k", hash);
			bail!(ErrorKind::Collision(hash));
		}

		txn.kv_put(self.t2k, &term_key_bytes(hash), &term_key_bytes(hash))?;
		txn.kv_put(self.k2t, &term_key_bytes(hash), bytes)?;
		Ok(hash)
	}

	/// Looks a term up by key. A key with no entry is an integrity error.
	pub fn lookup<T: TxnRead>(&self, txn: &T, key: TermKey) -> Result<Term> {
		match txn.kv_get(self.k2t, &term_key_bytes(key))? {
			Some(bytes) => term::decode(bytes).map_err(|err| {
				error!("cannot decode term stored for key {:#018x}: {}", key, err);
				err
			}),
			None => {
				error!("term key {:#018x} has no dictionary entry", key);
				bail!(ErrorKind::MissingTerm(key))
			},
		}
	}

	/// The canonical bytes stored for a key, without decoding them.
	pub(crate) fn lookup_encoded<'t, T: TxnRead>(&self, txn: &'t T, key: TermKey) -> Result<&'t [u8]> {
		match txn.kv_get(self.k2t, &term_key_bytes(key))? {
			Some(bytes) => Ok(bytes),
			None => {
				error!("term key {:#018x} has no dictionary entry", key);
				bail!(ErrorKind::MissingTerm(key))
			},
		}
	}

	/// Resolves a term to its key without interning, `None` when the term
	/// has never been seen.
	pub fn key_of<T: TxnRead>(&self, txn: &T, term: &Term) -> Result<Option<TermKey>> {
		let bytes = term::encode(term);
		let hash = hash::key_of(&bytes, &self.seed);

		let assigned = match txn.kv_get(self.t2k, &term_key_bytes(hash))? {
			Some(stored) => read_term_key(stored)?,
			None => return Ok(None),
		};
		// A hash hit is only a hit for the term actually stored there.
		match txn.kv_get(self.k2t, &term_key_bytes(assigned))? {
			Some(stored) if stored == &bytes[..] => Ok(Some(assigned)),
			_ => Ok(None),
		}
	}

	/// Batched intern, preserving order.
	pub fn resolve(&self, txn: &mut WriteTxn, terms: &[Term]) -> Result<Vec<TermKey>> {
		let mut keys = Vec::with_capacity(terms.len());
		for term in terms {
			keys.push(self.intern(txn, term)?);
		}
		Ok(keys)
	}

	/// Pins a term at a reserved key. Used by bootstrap only.
	pub(crate) fn insert_reserved(&self, txn: &mut WriteTxn, key: TermKey, term: &Term) -> Result<()> {
		let bytes = term::encode(term);
		let hash = hash::key_of(&bytes, &self.seed);
		txn.kv_put(self.t2k, &term_key_bytes(hash), &term_key_bytes(key))?;
		txn.kv_put(self.k2t, &term_key_bytes(key), &bytes)?;
		Ok(())
	}

	pub(crate) fn clear(&self, txn: &mut WriteTxn) -> Result<()> {
		txn.kv_clear(self.t2k)?;
		txn.kv_clear(self.k2t)?;
		Ok(())
	}

	/// True when no term has been interned (and bootstrap has not run).
	pub(crate) fn is_empty<T: TxnRead>(&self, txn: &T) -> Result<bool> {
		let cursor = txn.kv_cursor(self.k2t)?;
		match cursor.get(None, None, lmdb_sys::MDB_FIRST) {
			Ok(_) => Ok(false),
			Err(lmdb::Error::NotFound) => Ok(true),
			Err(err) => Err(err.into()),
		}
	}

	pub(crate) fn count<T: TxnRead>(&self, txn: &T) -> Result<usize> {
		let cursor = txn.kv_cursor(self.k2t)?;
		let mut count = 0;
		let mut op = lmdb_sys::MDB_FIRST;
		loop {
			match cursor.get(None, None, op) {
				Ok(_) => count += 1,
				Err(lmdb::Error::NotFound) => return Ok(count),
				Err(err) => return Err(err.into()),
			}
			op = lmdb_sys::MDB_NEXT;
		}
	}

	/// Dumps the whole dictionary. Admin and debug use.
	pub(crate) fn all<T: TxnRead>(&self, txn: &T) -> Result<Vec<(TermKey, Term)>> {
		let cursor = txn.kv_cursor(self.k2t)?;
		let mut terms = Vec::new();
		let mut op = lmdb_sys::MDB_FIRST;
		loop {
			match cursor.get(None, None, op) {
				Ok((key, value)) => {
					let key = key.ok_or_else(|| {
						ErrorKind::Decode("dictionary cursor yielded no key".into())
					})?;
					terms.push((read_term_key(key)?, term::decode(value)?));
				},
				Err(lmdb::Error::NotFound) => return Ok(terms),
				Err(err) => return Err(err.into()),
			}
			op = lmdb_sys::MDB_NEXT;
		}
	}
}
