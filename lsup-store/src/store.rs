//! The store façade.
//!
//! A [`Store`] owns the LMDB environment, the dictionary and index handles,
//! the writer gate and the closed flag. Opening is process-wide: a second
//! open of the same directory returns the existing handle. All triple-store
//! operations take an explicit transaction and translate between terms and
//! keys right here at the boundary; everything below this module works in
//! keys only.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lmdb;
use parking_lot::Mutex;

use dict::Dict;
use error::{Error, ErrorKind, Result};
use find::{self, Matches, Pattern};
use graph::Graph;
use index::{Indexes, INDEX_DB_NAMES};
use key::{QuadKey, TermKey, DEFAULT_CTX_KEY};
use options::Options;
use term::{Quad, Term};
use txn::{Delta, ReadTxn, TxnRead, WriteTxn};

// Dictionary sub-databases plus the eight indexes, with headroom.
const MAX_DBS: u32 = 16;

lazy_static! {
	// Process-wide registry of open environments, keyed by canonical path.
	static ref REGISTRY: Mutex<HashMap<PathBuf, Arc<Store>>> = Mutex::new(HashMap::new());
}

/// A lookup pattern over terms. `None` in a position binds nothing. The
/// context is three-valued: `None` matches any context, `Some(None)` the
/// default graph, `Some(Some(term))` a named graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadPattern {
	/// Subject, `None` for wildcard.
	pub s: Option<Term>,
	/// Predicate, `None` for wildcard.
	pub p: Option<Term>,
	/// Object, `None` for wildcard.
	pub o: Option<Term>,
	/// Context, `None` for wildcard.
	pub ctx: Option<Option<Term>>,
}

impl QuadPattern {
	/// The pattern matching every quad.
	pub fn any() -> QuadPattern {
		QuadPattern::default()
	}

	/// The pattern matching exactly one quad.
	pub fn of_quad(quad: &Quad) -> QuadPattern {
		QuadPattern {
			s: Some(quad.s.clone()),
			p: Some(quad.p.clone()),
			o: Some(quad.o.clone()),
			ctx: Some(quad.ctx.clone()),
		}
	}
}

/// Entry counts over the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
	/// Terms in the dictionary.
	pub terms: usize,
	/// Stored quads.
	pub quads: usize,
	/// Distinct triples across all contexts.
	pub triples: usize,
	/// Contexts with at least one triple.
	pub contexts: usize,
}

/// A triple store over one LMDB environment.
pub struct Store {
	path: PathBuf,
	env: lmdb::Environment,
	pub(crate) dict: Dict,
	pub(crate) indexes: Indexes,
	writer: Mutex<()>,
	closed: AtomicBool,
}

impl fmt::Debug for Store {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Store").field("path", &self.path).finish()
	}
}

impl Store {
	/// Opens the store at `path`, creating the directory and the
	/// sub-databases as needed. Re-entrant: an already open store is
	/// returned as-is and `options` are ignored.
	pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Arc<Store>> {
		fs::create_dir_all(&path)?;
		let canonical = path.as_ref().canonicalize()?;

		let mut registry = REGISTRY.lock();
		if let Some(existing) = registry.get(&canonical) {
			if !existing.is_closed() {
				return Ok(existing.clone());
			}
		}

		options.validate(&canonical)?;
		let store = Arc::new(Store::open_internal(canonical.clone(), options)?);
		registry.insert(canonical, store.clone());
		Ok(store)
	}

	fn open_internal(path: PathBuf, options: Options) -> Result<Store> {
		let env = {
			let mut builder = lmdb::Environment::new();
			builder.set_max_dbs(MAX_DBS);
			builder.set_map_size(options.map_size);
			builder.set_max_readers(options.readers_max);
			let mut flags = lmdb::EnvironmentFlags::NO_TLS;
			if options.no_sync {
				flags |= lmdb::EnvironmentFlags::NO_SYNC;
			}
			builder.set_flags(flags);
			builder.open(&path)?
		};

		let t2k = env.create_db(Some("t2k"), lmdb::DatabaseFlags::empty())?;
		let k2t = env.create_db(Some("k2t"), lmdb::DatabaseFlags::empty())?;

		let dup = lmdb::DatabaseFlags::DUP_SORT | lmdb::DatabaseFlags::DUP_FIXED;
		let mut index_dbs = Vec::with_capacity(INDEX_DB_NAMES.len());
		for name in &INDEX_DB_NAMES {
			index_dbs.push(env.create_db(Some(*name), dup)?);
		}

		info!("opened store at {}", path.display());

		Ok(Store {
			path: path,
			env: env,
			dict: Dict::new(t2k, k2t, options.hash_seed),
			indexes: Indexes::new([
				index_dbs[0], index_dbs[1], index_dbs[2], index_dbs[3],
				index_dbs[4], index_dbs[5], index_dbs[6], index_dbs[7],
			]),
			writer: Mutex::new(()),
			closed: AtomicBool::new(false),
		})
	}

	/// The store directory.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Marks the handle closed and drops it from the process registry.
	/// Outstanding transactions on other clones of the handle stay valid;
	/// new ones fail with `InvalidState`.
	pub fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		REGISTRY.lock().remove(&self.path);
		info!("closed store at {}", self.path.display());
	}

	/// True once [`close`](Store::close) has been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			bail!(ErrorKind::InvalidState("store is closed".into()));
		}
		Ok(())
	}

	/// Begins a read transaction over a consistent snapshot.
	pub fn read_txn(&self) -> Result<ReadTxn> {
		self.ensure_open()?;
		ReadTxn::new(&self.env)
	}

	/// Begins the write transaction, blocking while another one is active.
	pub fn write_txn(&self) -> Result<WriteTxn> {
		self.ensure_open()?;
		let guard = self.writer.lock();
		WriteTxn::new(&self.env, guard)
	}

	/// Begins the write transaction without blocking; `Conflict` when
	/// another writer is active.
	pub fn try_write_txn(&self) -> Result<WriteTxn> {
		self.ensure_open()?;
		match self.writer.try_lock() {
			Some(guard) => WriteTxn::new(&self.env, guard),
			None => bail!(ErrorKind::Conflict),
		}
	}

	/// Runs `f` with a read transaction that is released on return.
	pub fn with_read<'s, R, F>(&'s self, f: F) -> Result<R>
	where
		F: FnOnce(&ReadTxn<'s>) -> Result<R>,
	{
		let txn = self.read_txn()?;
		f(&txn)
	}

	/// Runs `f` with the write transaction: committed on success (yielding
	/// the commit delta), aborted on error or panic.
	pub fn with_write<'s, R, F>(&'s self, f: F) -> Result<(R, Delta)>
	where
		F: FnOnce(&mut WriteTxn<'s>) -> Result<R>,
	{
		let mut txn = self.write_txn()?;
		let value = f(&mut txn)?;
		let delta = txn.commit()?;
		Ok((value, delta))
	}

	/// Adds a quad, returning false when it is already present.
	pub fn add(&self, txn: &mut WriteTxn, quad: &Quad) -> Result<bool> {
		let key = self.intern_quad(txn, quad)?;
		match self.indexes.insert(txn, key) {
			Ok(()) => Ok(true),
			Err(Error(ErrorKind::AlreadyPresent, _)) => Ok(false),
			Err(err) => Err(err),
		}
	}

	/// Adds every quad of an iterator, returning how many were actually
	/// new.
	pub fn add_many<I>(&self, txn: &mut WriteTxn, quads: I) -> Result<usize>
	where
		I: IntoIterator<Item = Quad>,
	{
		let mut added = 0;
		for quad in quads {
			if self.add(txn, &quad)? {
				added += 1;
			}
		}
		Ok(added)
	}

	/// Removes every quad matching the pattern, returning the count.
	pub fn remove(&self, txn: &mut WriteTxn, pattern: &QuadPattern) -> Result<usize> {
		let keys = match self.key_pattern(txn, pattern)? {
			Some(keys) => keys,
			None => return Ok(0),
		};

		let matches = {
			let found: Result<Vec<QuadKey>> = Matches::new(txn, &self.indexes, keys)?.collect();
			found?
		};
		for quad in &matches {
			self.indexes.remove(txn, *quad)?;
		}
		Ok(matches.len())
	}

	/// True when the exact quad is stored.
	pub fn contains<T: TxnRead>(&self, txn: &T, quad: &Quad) -> Result<bool> {
		let s = match self.dict.key_of(txn, &quad.s)? {
			Some(key) => key,
			None => return Ok(false),
		};
		let p = match self.dict.key_of(txn, &quad.p)? {
			Some(key) => key,
			None => return Ok(false),
		};
		let o = match self.dict.key_of(txn, &quad.o)? {
			Some(key) => key,
			None => return Ok(false),
		};
		let c = match quad.ctx {
			Some(ref term) => match self.dict.key_of(txn, term)? {
				Some(key) => key,
				None => return Ok(false),
			},
			None => DEFAULT_CTX_KEY,
		};
		self.indexes.has_quad(txn, QuadKey { s: s, p: p, o: o, c: c })
	}

	/// Number of quads in the whole store.
	pub fn len<T: TxnRead>(&self, txn: &T) -> Result<usize> {
		self.indexes.total_count(txn)
	}

	/// Number of quads in one context (`None` for the default graph).
	pub fn ctx_len<T: TxnRead>(&self, txn: &T, ctx: Option<&Term>) -> Result<usize> {
		let c = match ctx {
			Some(term) => match self.dict.key_of(txn, term)? {
				Some(key) => key,
				None => return Ok(0),
			},
			None => DEFAULT_CTX_KEY,
		};
		self.indexes.ctx_count(txn, c)
	}

	/// Looks up every quad matching the pattern as a lazy, decoding
	/// iterator bound to the transaction.
	pub fn lookup<'t, T: TxnRead>(&'t self, txn: &'t T, pattern: &QuadPattern) -> Result<Quads<'t, T>> {
		let matches = match self.key_pattern(txn, pattern)? {
			Some(keys) => Some(Matches::new(txn, &self.indexes, keys)?),
			None => None,
		};
		Ok(Quads {
			store: self,
			txn: txn,
			matches: matches,
			cache: HashMap::new(),
		})
	}

	/// The single quad matching the pattern; `NotFound` when there is none.
	pub fn lookup_one<T: TxnRead>(&self, txn: &T, pattern: &QuadPattern) -> Result<Quad> {
		match self.lookup(txn, pattern)?.next() {
			Some(quad) => quad,
			None => bail!(ErrorKind::NotFound),
		}
	}

	/// The contexts holding at least one triple, in key order.
	pub fn contexts<T: TxnRead>(&self, txn: &T) -> Result<Vec<Term>> {
		let mut contexts = Vec::new();
		for key in self.indexes.context_keys(txn)? {
			contexts.push(self.dict.lookup(txn, key)?);
		}
		Ok(contexts)
	}

	/// Dumps the term dictionary. Admin and debug use.
	pub fn all_terms<T: TxnRead>(&self, txn: &T) -> Result<Vec<(TermKey, Term)>> {
		self.dict.all(txn)
	}

	/// Entry counts over the whole store.
	pub fn stats<T: TxnRead>(&self, txn: &T) -> Result<StoreStats> {
		let (quads, triples, contexts) = self.indexes.counts(txn)?;
		Ok(StoreStats {
			terms: self.dict.count(txn)?,
			quads: quads,
			triples: triples,
			contexts: contexts,
		})
	}

	/// Name of the index a lookup of `pattern` would read; `None` when a
	/// bound term is unknown and no index would be touched. Debug aid.
	pub fn explain<T: TxnRead>(&self, txn: &T, pattern: &QuadPattern) -> Result<Option<&'static str>> {
		Ok(self.key_pattern(txn, pattern)?.map(|keys| find::plan(&keys).index_name()))
	}

	/// Copies every triple matching the pattern into an in-memory graph.
	/// Context information is dropped; term bytes move over without being
	/// decoded.
	pub fn materialize<T: TxnRead>(&self, txn: &T, pattern: &QuadPattern) -> Result<Graph> {
		let mut graph = Graph::new();
		let keys = match self.key_pattern(txn, pattern)? {
			Some(keys) => keys,
			None => return Ok(graph),
		};

		let quads: Vec<QuadKey> = {
			let found: Result<Vec<QuadKey>> = Matches::new(txn, &self.indexes, keys)?.collect();
			found?
		};
		for quad in &quads {
			let s = self.dict.lookup_encoded(txn, quad.s)?;
			let p = self.dict.lookup_encoded(txn, quad.p)?;
			let o = self.dict.lookup_encoded(txn, quad.o)?;
			graph.add_encoded(s, p, o);
		}
		Ok(graph)
	}

	/// Persists a graph into one context. Each unique term is interned
	/// exactly once; returns the number of quads actually added.
	pub fn add_graph(&self, txn: &mut WriteTxn, graph: &Graph, ctx: Option<&Term>) -> Result<usize> {
		let c = match ctx {
			Some(term) => self.dict.intern(txn, term)?,
			None => DEFAULT_CTX_KEY,
		};

		let triples = graph.triple_ids();
		let mut keys: HashMap<u32, TermKey> = HashMap::new();
		for &(s, p, o) in &triples {
			for &id in &[s, p, o] {
				if !keys.contains_key(&id) {
					let key = self.dict.intern_encoded(txn, graph.term_bytes(id))?;
					keys.insert(id, key);
				}
			}
		}

		let mut added = 0;
		for &(s, p, o) in &triples {
			let quad = QuadKey { s: keys[&s], p: keys[&p], o: keys[&o], c: c };
			match self.indexes.insert(txn, quad) {
				Ok(()) => added += 1,
				Err(Error(ErrorKind::AlreadyPresent, _)) => {},
				Err(err) => return Err(err),
			}
		}
		Ok(added)
	}

	fn intern_quad(&self, txn: &mut WriteTxn, quad: &Quad) -> Result<QuadKey> {
		let s = self.dict.intern(txn, &quad.s)?;
		let p = self.dict.intern(txn, &quad.p)?;
		let o = self.dict.intern(txn, &quad.o)?;
		let c = match quad.ctx {
			Some(ref term) => self.dict.intern(txn, term)?,
			None => DEFAULT_CTX_KEY,
		};
		Ok(QuadKey { s: s, p: p, o: o, c: c })
	}

	// Translates a term pattern to a key pattern without interning. A bound
	// term the dictionary has never seen cannot match anything: `None`.
	fn key_pattern<T: TxnRead>(&self, txn: &T, pattern: &QuadPattern) -> Result<Option<Pattern>> {
		let s = match pattern.s {
			Some(ref term) => match self.dict.key_of(txn, term)? {
				Some(key) => Some(key),
				None => return Ok(None),
			},
			None => None,
		};
		let p = match pattern.p {
			Some(ref term) => match self.dict.key_of(txn, term)? {
				Some(key) => Some(key),
				None => return Ok(None),
			},
			None => None,
		};
		let o = match pattern.o {
			Some(ref term) => match self.dict.key_of(txn, term)? {
				Some(key) => Some(key),
				None => return Ok(None),
			},
			None => None,
		};
		let c = match pattern.ctx {
			None => None,
			Some(None) => Some(DEFAULT_CTX_KEY),
			Some(Some(ref term)) => match self.dict.key_of(txn, term)? {
				Some(key) => Some(key),
				None => return Ok(None),
			},
		};
		Ok(Some(Pattern::new(s, p, o, c)))
	}
}

/// Lazy iterator over decoded quads. Each distinct term is decoded once and
/// reused for every quad that mentions it.
pub struct Quads<'t, T: TxnRead + 't> {
	store: &'t Store,
	txn: &'t T,
	matches: Option<Matches<'t>>,
	cache: HashMap<TermKey, Term>,
}

impl<'t, T: TxnRead + 't> Quads<'t, T> {
	fn term(&mut self, key: TermKey) -> Result<Term> {
		if let Some(term) = self.cache.get(&key) {
			return Ok(term.clone());
		}
		let term = self.store.dict.lookup(self.txn, key)?;
		self.cache.insert(key, term.clone());
		Ok(term)
	}

	fn decode(&mut self, quad: QuadKey) -> Result<Quad> {
		let s = self.term(quad.s)?;
		let p = self.term(quad.p)?;
		let o = self.term(quad.o)?;
		let ctx = if quad.c == DEFAULT_CTX_KEY {
			None
		} else {
			Some(self.term(quad.c)?)
		};
		Ok(Quad::new(s, p, o, ctx))
	}
}

impl<'t, T: TxnRead + 't> Iterator for Quads<'t, T> {
	type Item = Result<Quad>;

	fn next(&mut self) -> Option<Self::Item> {
		let next = match self.matches {
			Some(ref mut matches) => matches.next(),
			None => None,
		};
		match next {
			None => None,
			Some(Ok(quad)) => Some(self.decode(quad)),
			Some(Err(err)) => Some(Err(err)),
		}
	}
}
