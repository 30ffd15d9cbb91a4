//! The quad index set.
//!
//! Eight sorted-duplicate sub-databases describe every quad: the primary
//! `spo:c` (which contexts does a triple appear in), six permutations of the
//! triple positions for pattern lookup, and `c:spo` for enumerating a
//! context. Permutation entries are per triple, not per quad: they are
//! created with a triple's first context and dropped with its last, which is
//! what keeps invariant "every permutation entry resolves to a primary
//! entry" through removals.

use lmdb;
use lmdb::Cursor;
use lmdb_sys;

use error::{ErrorKind, Result};
use key::{read_term_key, term_key_bytes, DoubleKey, QuadKey, TermKey, TripleKey};
use txn::{TxnRead, WriteTxn};

/// Names of all index sub-databases, primary first.
pub const INDEX_DB_NAMES: [&'static str; 8] = [
	"spo:c", "s:po", "p:so", "o:sp", "po:s", "so:p", "sp:o", "c:spo",
];

/// Handles to the index sub-databases.
#[derive(Debug)]
pub struct Indexes {
	pub(crate) spo_c: lmdb::Database,
	pub(crate) s_po: lmdb::Database,
	pub(crate) p_so: lmdb::Database,
	pub(crate) o_sp: lmdb::Database,
	pub(crate) po_s: lmdb::Database,
	pub(crate) so_p: lmdb::Database,
	pub(crate) sp_o: lmdb::Database,
	pub(crate) c_spo: lmdb::Database,
}

impl Indexes {
	pub(crate) fn new(dbs: [lmdb::Database; 8]) -> Indexes {
		Indexes {
			spo_c: dbs[0],
			s_po: dbs[1],
			p_so: dbs[2],
			o_sp: dbs[3],
			po_s: dbs[4],
			so_p: dbs[5],
			sp_o: dbs[6],
			c_spo: dbs[7],
		}
	}

	/// Inserts a quad into all indexes. `AlreadyPresent` when the exact
	/// quad is stored; the other sub-writes are then not attempted.
	pub fn insert(&self, txn: &mut WriteTxn, quad: QuadKey) -> Result<()> {
		let triple = quad.triple();
		if !txn.kv_put_unique(self.spo_c, &triple.bytes(), &term_key_bytes(quad.c))? {
			bail!(ErrorKind::AlreadyPresent);
		}
		txn.kv_put_unique(self.c_spo, &term_key_bytes(quad.c), &triple.bytes())?;
		self.put_permutations(txn, &triple)?;
		txn.delta_mut().record_added(triple, quad.c);
		Ok(())
	}

	/// Removes a quad from all indexes, returning false when it was not
	/// stored. Permutation entries go away with the triple's last context.
	pub fn remove(&self, txn: &mut WriteTxn, quad: QuadKey) -> Result<bool> {
		let triple = quad.triple();
		if !txn.kv_del(self.spo_c, &triple.bytes(), Some(&term_key_bytes(quad.c)))? {
			return Ok(false);
		}
		txn.kv_del(self.c_spo, &term_key_bytes(quad.c), Some(&triple.bytes()))?;

		if !self.has_triple(txn, &triple)? {
			self.del_permutations(txn, &triple)?;
		}

		txn.delta_mut().record_removed(triple, quad.c);
		Ok(true)
	}

	/// True when the exact quad is stored.
	pub fn has_quad<T: TxnRead>(&self, txn: &T, quad: QuadKey) -> Result<bool> {
		dup_exists(txn, self.spo_c, &quad.triple().bytes(), &term_key_bytes(quad.c))
	}

	/// True when the triple is stored in at least one context.
	pub fn has_triple<T: TxnRead>(&self, txn: &T, triple: &TripleKey) -> Result<bool> {
		Ok(txn.kv_get(self.spo_c, &triple.bytes())?.is_some())
	}

	/// Number of quads in one context.
	pub fn ctx_count<T: TxnRead>(&self, txn: &T, ctx: TermKey) -> Result<usize> {
		let cursor = txn.kv_cursor(self.c_spo)?;
		match cursor.get(Some(&term_key_bytes(ctx)), None, lmdb_sys::MDB_SET) {
			Ok(_) => dup_count(&cursor),
			Err(lmdb::Error::NotFound) => Ok(0),
			Err(err) => Err(err.into()),
		}
	}

	/// Number of quads in the whole store.
	pub fn total_count<T: TxnRead>(&self, txn: &T) -> Result<usize> {
		let cursor = txn.kv_cursor(self.c_spo)?;
		let mut total = 0;
		let mut op = lmdb_sys::MDB_FIRST;
		loop {
			match cursor.get(None, None, op) {
				Ok(_) => total += dup_count(&cursor)?,
				Err(lmdb::Error::NotFound) => return Ok(total),
				Err(err) => return Err(err.into()),
			}
			op = lmdb_sys::MDB_NEXT_NODUP;
		}
	}

	/// All context keys with at least one triple, in key order.
	pub fn context_keys<T: TxnRead>(&self, txn: &T) -> Result<Vec<TermKey>> {
		let cursor = txn.kv_cursor(self.c_spo)?;
		let mut contexts = Vec::new();
		let mut op = lmdb_sys::MDB_FIRST;
		loop {
			match cursor.get(None, None, op) {
				Ok((key, _)) => {
					let key = key.ok_or_else(|| {
						ErrorKind::Decode("context cursor yielded no key".into())
					})?;
					contexts.push(read_term_key(key)?);
				},
				Err(lmdb::Error::NotFound) => return Ok(contexts),
				Err(err) => return Err(err.into()),
			}
			op = lmdb_sys::MDB_NEXT_NODUP;
		}
	}

	/// Every (triple, context) pair in the primary index.
	pub(crate) fn scan_primary<T: TxnRead>(&self, txn: &T) -> Result<Vec<(TripleKey, TermKey)>> {
		let cursor = txn.kv_cursor(self.spo_c)?;
		let mut quads = Vec::new();
		let mut op = lmdb_sys::MDB_FIRST;
		loop {
			match cursor.get(None, None, op) {
				Ok((key, value)) => {
					let key = key.ok_or_else(|| {
						ErrorKind::Decode("primary cursor yielded no key".into())
					})?;
					quads.push((TripleKey::from_bytes(key)?, read_term_key(value)?));
				},
				Err(lmdb::Error::NotFound) => return Ok(quads),
				Err(err) => return Err(err.into()),
			}
			op = lmdb_sys::MDB_NEXT;
		}
	}

	/// Truncates the six permutation indexes and `c:spo`, then re-emits
	/// them from a scan of the primary index. Returns the quad count.
	pub(crate) fn rebuild_derived(&self, txn: &mut WriteTxn) -> Result<usize> {
		for db in &[self.s_po, self.p_so, self.o_sp, self.po_s, self.so_p, self.sp_o, self.c_spo] {
			txn.kv_clear(*db)?;
		}

		let quads = self.scan_primary(txn)?;
		for &(ref triple, ctx) in &quads {
			txn.kv_put_unique(self.c_spo, &term_key_bytes(ctx), &triple.bytes())?;
			self.put_permutations(txn, triple)?;
		}
		Ok(quads.len())
	}

	pub(crate) fn clear_all(&self, txn: &mut WriteTxn) -> Result<()> {
		for db in &[
			self.spo_c, self.s_po, self.p_so, self.o_sp,
			self.po_s, self.so_p, self.sp_o, self.c_spo,
		] {
			txn.kv_clear(*db)?;
		}
		Ok(())
	}

	/// Entry counts of (primary, triples, contexts) for stats.
	pub(crate) fn counts<T: TxnRead>(&self, txn: &T) -> Result<(usize, usize, usize)> {
		let quads = self.total_count(txn)?;
		let mut triples = 0;
		{
			let cursor = txn.kv_cursor(self.spo_c)?;
			let mut op = lmdb_sys::MDB_FIRST;
			loop {
				match cursor.get(None, None, op) {
					Ok(_) => triples += 1,
					Err(lmdb::Error::NotFound) => break,
					Err(err) => return Err(err.into()),
				}
				op = lmdb_sys::MDB_NEXT_NODUP;
			}
		}
		let contexts = self.context_keys(txn)?.len();
		Ok((quads, triples, contexts))
	}

	fn put_permutations(&self, txn: &mut WriteTxn, t: &TripleKey) -> Result<()> {
		txn.kv_put_unique(self.s_po, &term_key_bytes(t.s), &DoubleKey(t.p, t.o).bytes())?;
		txn.kv_put_unique(self.p_so, &term_key_bytes(t.p), &DoubleKey(t.s, t.o).bytes())?;
		txn.kv_put_unique(self.o_sp, &term_key_bytes(t.o), &DoubleKey(t.s, t.p).bytes())?;
		txn.kv_put_unique(self.po_s, &DoubleKey(t.p, t.o).bytes(), &term_key_bytes(t.s))?;
		txn.kv_put_unique(self.so_p, &DoubleKey(t.s, t.o).bytes(), &term_key_bytes(t.p))?;
		txn.kv_put_unique(self.sp_o, &DoubleKey(t.s, t.p).bytes(), &term_key_bytes(t.o))?;
		Ok(())
	}

	fn del_permutations(&self, txn: &mut WriteTxn, t: &TripleKey) -> Result<()> {
		txn.kv_del(self.s_po, &term_key_bytes(t.s), Some(&DoubleKey(t.p, t.o).bytes()))?;
		txn.kv_del(self.p_so, &term_key_bytes(t.p), Some(&DoubleKey(t.s, t.o).bytes()))?;
		txn.kv_del(self.o_sp, &term_key_bytes(t.o), Some(&DoubleKey(t.s, t.p).bytes()))?;
		txn.kv_del(self.po_s, &DoubleKey(t.p, t.o).bytes(), Some(&term_key_bytes(t.s)))?;
		txn.kv_del(self.so_p, &DoubleKey(t.s, t.o).bytes(), Some(&term_key_bytes(t.p)))?;
		txn.kv_del(self.sp_o, &DoubleKey(t.s, t.p).bytes(), Some(&term_key_bytes(t.o)))?;
		Ok(())
	}
}

/// True when the sorted-duplicates database holds the exact (key, value)
/// pair.
pub(crate) fn dup_exists<T: TxnRead>(txn: &T, db: lmdb::Database, key: &[u8], value: &[u8]) -> Result<bool> {
	let cursor = txn.kv_cursor(db)?;
	match cursor.get(Some(key), Some(value), lmdb_sys::MDB_GET_BOTH) {
		Ok(_) => Ok(true),
		Err(lmdb::Error::NotFound) => Ok(false),
		Err(err) => Err(err.into()),
	}
}

/// Number of duplicates under the cursor's current key. O(1) in LMDB.
pub(crate) fn dup_count(cursor: &lmdb::RoCursor) -> Result<usize> {
	let mut count: usize = 0;
	let rc = unsafe { lmdb_sys::mdb_cursor_count(cursor.cursor(), &mut count) };
	if rc != 0 {
		return Err(lmdb::Error::from_err_code(rc).into());
	}
	Ok(count)
}
