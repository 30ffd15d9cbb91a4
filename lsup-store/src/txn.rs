//! Transactions.
//!
//! Readers are snapshot-isolated and may coexist with the single writer;
//! writers are serialized by a process-level gate in front of LMDB's own
//! writer lock so that a non-blocking acquisition can fail fast. Nested
//! write scopes map onto LMDB child transactions: an aborted scope rolls
//! back only its own mutations, a committed scope merges into its parent.
//!
//! Dropping any transaction aborts it. Committing the top-level writer
//! yields the accumulated [`Delta`] for the messaging layer.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use lmdb;
use lmdb::Transaction;
use parking_lot::MutexGuard;

use error::{ErrorKind, Result};
use key::{TermKey, TripleKey};

/// Maximum depth of nested write scopes.
pub const MAX_NESTED: u8 = 8;

/// Read access to a transaction snapshot. Implemented by both transaction
/// kinds; every read path in the store is generic over it.
pub trait TxnRead {
	/// Reads a single value, `None` when the key is absent. For a
	/// sorted-duplicates database this returns the first duplicate.
	fn kv_get<'t>(&'t self, db: lmdb::Database, key: &[u8]) -> Result<Option<&'t [u8]>>;

	/// Opens a read cursor over a database.
	fn kv_cursor<'t>(&'t self, db: lmdb::Database) -> Result<lmdb::RoCursor<'t>>;
}

fn get_opt<'t, T: Transaction>(txn: &'t T, db: lmdb::Database, key: &[u8]) -> Result<Option<&'t [u8]>> {
	match txn.get(db, &key) {
		Ok(value) => Ok(Some(value)),
		Err(lmdb::Error::NotFound) => Ok(None),
		Err(err) => Err(err.into()),
	}
}

/// A read-only transaction over a consistent snapshot of the store.
pub struct ReadTxn<'env> {
	inner: lmdb::RoTransaction<'env>,
}

impl<'env> ReadTxn<'env> {
	pub(crate) fn new(env: &'env lmdb::Environment) -> Result<ReadTxn<'env>> {
		Ok(ReadTxn { inner: env.begin_ro_txn()? })
	}
}

impl<'env> fmt::Debug for ReadTxn<'env> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("ReadTxn").finish()
	}
}

impl<'env> TxnRead for ReadTxn<'env> {
	fn kv_get<'t>(&'t self, db: lmdb::Database, key: &[u8]) -> Result<Option<&'t [u8]>> {
		get_opt(&self.inner, db, key)
	}

	fn kv_cursor<'t>(&'t self, db: lmdb::Database) -> Result<lmdb::RoCursor<'t>> {
		Ok(self.inner.open_ro_cursor(db)?)
	}
}

/// A write transaction. At most one exists per store at any time; reads
/// through it observe the snapshot plus its own uncommitted mutations.
pub struct WriteTxn<'env> {
	inner: lmdb::RwTransaction<'env>,
	delta: Delta,
	depth: u8,
	// Held only by the top-level writer; released on commit or drop.
	guard: Option<MutexGuard<'env, ()>>,
}

impl<'env> fmt::Debug for WriteTxn<'env> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("WriteTxn").field("depth", &self.depth).finish()
	}
}

impl<'env> WriteTxn<'env> {
	pub(crate) fn new(env: &'env lmdb::Environment, guard: MutexGuard<'env, ()>) -> Result<WriteTxn<'env>> {
		Ok(WriteTxn {
			inner: env.begin_rw_txn()?,
			delta: Delta::default(),
			depth: 0,
			guard: Some(guard),
		})
	}

	/// Commits all mutations and returns the change delta.
	pub fn commit(self) -> Result<Delta> {
		let WriteTxn { inner, delta, guard, .. } = self;
		inner.commit()?;
		drop(guard);
		Ok(delta)
	}

	/// Aborts the transaction, discarding all mutations. Equivalent to
	/// dropping it.
	pub fn abort(self) {}

	/// Runs `f` inside a nested write scope. An error aborts only the
	/// scope's own mutations; success merges them (and their delta) into
	/// this transaction.
	pub fn nested<'s, R, F>(&'s mut self, f: F) -> Result<R>
	where
		F: FnOnce(&mut WriteTxn<'s>) -> Result<R>,
	{
		if self.depth >= MAX_NESTED {
			bail!(ErrorKind::InvalidState(
				format!("nested write scopes are limited to a depth of {}", MAX_NESTED)
			));
		}

		let child: lmdb::RwTransaction<'s> = self.inner.begin_nested_txn()?;
		let mut scope = WriteTxn {
			inner: child,
			delta: Delta::default(),
			depth: self.depth + 1,
			guard: None,
		};

		match f(&mut scope) {
			Ok(value) => {
				let WriteTxn { inner, delta, .. } = scope;
				inner.commit()?;
				self.delta.merge(delta);
				Ok(value)
			},
			// Dropping the scope aborts the child transaction.
			Err(err) => Err(err),
		}
	}

	pub(crate) fn delta_mut(&mut self) -> &mut Delta {
		&mut self.delta
	}

	pub(crate) fn kv_put(&mut self, db: lmdb::Database, key: &[u8], value: &[u8]) -> Result<()> {
		self.inner.put(db, &key, &value, lmdb::WriteFlags::empty())?;
		Ok(())
	}

	/// Inserts a duplicate entry, returning false when the exact pair is
	/// already present.
	pub(crate) fn kv_put_unique(&mut self, db: lmdb::Database, key: &[u8], value: &[u8]) -> Result<bool> {
		match self.inner.put(db, &key, &value, lmdb::WriteFlags::NO_DUP_DATA) {
			Ok(()) => Ok(true),
			Err(lmdb::Error::KeyExist) => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	/// Deletes one duplicate (or the whole key when `value` is `None`),
	/// returning false when it was not present.
	pub(crate) fn kv_del(&mut self, db: lmdb::Database, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
		match self.inner.del(db, &key, value) {
			Ok(()) => Ok(true),
			Err(lmdb::Error::NotFound) => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	pub(crate) fn kv_clear(&mut self, db: lmdb::Database) -> Result<()> {
		self.inner.clear_db(db)?;
		Ok(())
	}
}

impl<'env> TxnRead for WriteTxn<'env> {
	fn kv_get<'t>(&'t self, db: lmdb::Database, key: &[u8]) -> Result<Option<&'t [u8]>> {
		get_opt(&self.inner, db, key)
	}

	fn kv_cursor<'t>(&'t self, db: lmdb::Database) -> Result<lmdb::RoCursor<'t>> {
		Ok(self.inner.open_ro_cursor(db)?)
	}
}

/// Changes of one context within a commit delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CtxDelta {
	/// Triples added to the context.
	pub added: Vec<TripleKey>,
	/// Triples removed from the context.
	pub removed: Vec<TripleKey>,
}

/// The net change of a committed write transaction, grouped by context key.
/// A by-value snapshot: the store keeps no reference to it after commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
	by_ctx: BTreeMap<TermKey, CtxDelta>,
}

impl Delta {
	/// True when the transaction changed nothing.
	pub fn is_empty(&self) -> bool {
		self.by_ctx.is_empty()
	}

	/// Iterates over per-context changes, ordered by context key.
	pub fn iter(&self) -> btree_map::Iter<TermKey, CtxDelta> {
		self.by_ctx.iter()
	}

	/// The changes of a single context.
	pub fn get(&self, ctx: TermKey) -> Option<&CtxDelta> {
		self.by_ctx.get(&ctx)
	}

	/// Total number of added quads.
	pub fn added(&self) -> usize {
		self.by_ctx.values().map(|d| d.added.len()).sum()
	}

	/// Total number of removed quads.
	pub fn removed(&self) -> usize {
		self.by_ctx.values().map(|d| d.removed.len()).sum()
	}

	pub(crate) fn record_added(&mut self, triple: TripleKey, ctx: TermKey) {
		{
			let entry = self.by_ctx.entry(ctx).or_insert_with(CtxDelta::default);
			// An add cancels a pending remove of the same triple.
			if let Some(pos) = entry.removed.iter().position(|t| *t == triple) {
				entry.removed.remove(pos);
			} else {
				entry.added.push(triple);
			}
		}
		self.prune(ctx);
	}

	pub(crate) fn record_removed(&mut self, triple: TripleKey, ctx: TermKey) {
		{
			let entry = self.by_ctx.entry(ctx).or_insert_with(CtxDelta::default);
			if let Some(pos) = entry.added.iter().position(|t| *t == triple) {
				entry.added.remove(pos);
			} else {
				entry.removed.push(triple);
			}
		}
		self.prune(ctx);
	}

	pub(crate) fn merge(&mut self, other: Delta) {
		for (ctx, changes) in other.by_ctx {
			for triple in changes.added {
				self.record_added(triple, ctx);
			}
			for triple in changes.removed {
				self.record_removed(triple, ctx);
			}
		}
	}

	fn prune(&mut self, ctx: TermKey) {
		let empty = self.by_ctx.get(&ctx)
			.map(|d| d.added.is_empty() && d.removed.is_empty())
			.unwrap_or(false);
		if empty {
			self.by_ctx.remove(&ctx);
		}
	}
}
