//! Pattern planning and lazy quad lookup.
//!
//! A lookup pattern binds any subset of (s, p, o, c). The planner picks the
//! index that answers the positional part with the least work: the longest
//! bound prefix wins, ties fall to the lexical order of the index names so
//! the choice is deterministic. A bound context either drives `c:spo`
//! directly (nothing else bound) or intersects each candidate triple against
//! the primary index.
//!
//! [`Matches`] is a cursor state machine over the chosen index. It borrows
//! its transaction, yields each matching quad exactly once and stops at the
//! first backend error.

use lmdb;
use lmdb::Cursor;
use lmdb_sys;

use error::Result;
use index::{dup_exists, Indexes};
use key::{read_term_key, term_key_bytes, DoubleKey, QuadKey, TermKey, TripleKey};
use txn::TxnRead;

/// A lookup pattern over term keys. `None` binds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pattern {
	/// Subject key.
	pub s: Option<TermKey>,
	/// Predicate key.
	pub p: Option<TermKey>,
	/// Object key.
	pub o: Option<TermKey>,
	/// Context key.
	pub c: Option<TermKey>,
}

impl Pattern {
	/// Creates a pattern.
	pub fn new(s: Option<TermKey>, p: Option<TermKey>, o: Option<TermKey>, c: Option<TermKey>) -> Pattern {
		Pattern { s: s, p: p, o: o, c: c }
	}

	/// True when the quad matches every bound position.
	pub fn matches(&self, quad: QuadKey) -> bool {
		self.s.map_or(true, |s| s == quad.s)
			&& self.p.map_or(true, |p| p == quad.p)
			&& self.o.map_or(true, |o| o == quad.o)
			&& self.c.map_or(true, |c| c == quad.c)
	}
}

/// The index access chosen for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
	/// All four positions bound: a single membership probe in `spo:c`.
	Exact(QuadKey),
	/// Triple bound, context wild: the duplicates of one `spo:c` key.
	Triple(TripleKey),
	/// Subject and predicate bound: `sp:o`.
	SubjectPredicate(DoubleKey),
	/// Subject and object bound: `so:p`.
	SubjectObject(DoubleKey),
	/// Predicate and object bound: `po:s`.
	PredicateObject(DoubleKey),
	/// Subject bound: `s:po`.
	Subject(TermKey),
	/// Predicate bound: `p:so`.
	Predicate(TermKey),
	/// Object bound: `o:sp`.
	Object(TermKey),
	/// Only the context bound: the duplicates of one `c:spo` key.
	Context(TermKey),
	/// Nothing bound: full scan of `spo:c`.
	Full,
}

impl Plan {
	/// Name of the sub-database the plan reads.
	pub fn index_name(&self) -> &'static str {
		match *self {
			Plan::Exact(..) | Plan::Triple(..) | Plan::Full => "spo:c",
			Plan::SubjectPredicate(..) => "sp:o",
			Plan::SubjectObject(..) => "so:p",
			Plan::PredicateObject(..) => "po:s",
			Plan::Subject(..) => "s:po",
			Plan::Predicate(..) => "p:so",
			Plan::Object(..) => "o:sp",
			Plan::Context(..) => "c:spo",
		}
	}
}

/// Chooses the index for a pattern.
pub fn plan(pattern: &Pattern) -> Plan {
	match (pattern.s, pattern.p, pattern.o) {
		(Some(s), Some(p), Some(o)) => match pattern.c {
			Some(c) => Plan::Exact(QuadKey { s: s, p: p, o: o, c: c }),
			None => Plan::Triple(TripleKey { s: s, p: p, o: o }),
		},
		(Some(s), Some(p), None) => Plan::SubjectPredicate(DoubleKey(s, p)),
		(Some(s), None, Some(o)) => Plan::SubjectObject(DoubleKey(s, o)),
		(None, Some(p), Some(o)) => Plan::PredicateObject(DoubleKey(p, o)),
		(Some(s), None, None) => Plan::Subject(s),
		(None, Some(p), None) => Plan::Predicate(p),
		(None, None, Some(o)) => Plan::Object(o),
		(None, None, None) => match pattern.c {
			Some(c) => Plan::Context(c),
			None => Plan::Full,
		},
	}
}

// How a direct cursor turns (key, dup) pairs into quads.
#[derive(Debug, Clone, Copy)]
enum Direct {
	// spo:c front to back: key is the triple, dup is the context.
	FullPrimary,
	// Duplicates of one spo:c key: dups are the contexts.
	TripleDups(TripleKey),
	// Duplicates of one c:spo key: dups are the triples.
	ContextDups(TermKey),
}

struct DirectCursor<'t> {
	cursor: lmdb::RoCursor<'t>,
	kind: Direct,
	started: bool,
}

impl<'t> DirectCursor<'t> {
	fn next_quad(&mut self) -> Result<Option<QuadKey>> {
		let (key_opt, op) = match (self.kind, self.started) {
			(Direct::FullPrimary, false) => (None, lmdb_sys::MDB_FIRST),
			(Direct::FullPrimary, true) => (None, lmdb_sys::MDB_NEXT),
			(Direct::TripleDups(t), false) => (Some(t.bytes().to_vec()), lmdb_sys::MDB_SET_KEY),
			(Direct::TripleDups(..), true) => (None, lmdb_sys::MDB_NEXT_DUP),
			(Direct::ContextDups(c), false) => (Some(term_key_bytes(c).to_vec()), lmdb_sys::MDB_SET_KEY),
			(Direct::ContextDups(..), true) => (None, lmdb_sys::MDB_NEXT_DUP),
		};
		self.started = true;

		let (key, value) = match self.cursor.get(key_opt.as_ref().map(|k| &k[..]), None, op) {
			Ok(pair) => pair,
			Err(lmdb::Error::NotFound) => return Ok(None),
			Err(err) => return Err(err.into()),
		};

		match self.kind {
			Direct::FullPrimary => {
				let key = match key {
					Some(key) => key,
					None => return Ok(None),
				};
				Ok(Some(TripleKey::from_bytes(key)?.with_ctx(read_term_key(value)?)))
			},
			Direct::TripleDups(t) => Ok(Some(t.with_ctx(read_term_key(value)?))),
			Direct::ContextDups(c) => Ok(Some(TripleKey::from_bytes(value)?.with_ctx(c))),
		}
	}
}

// Candidate triples out of a permutation index: the duplicates of the bound
// key, combined with the bound positions.
struct CandidateCursor<'t> {
	cursor: lmdb::RoCursor<'t>,
	plan: Plan,
	started: bool,
}

impl<'t> CandidateCursor<'t> {
	fn bound_key(&self) -> Vec<u8> {
		match self.plan {
			Plan::SubjectPredicate(pair)
				| Plan::SubjectObject(pair)
				| Plan::PredicateObject(pair) => pair.bytes().to_vec(),
			Plan::Subject(key) | Plan::Predicate(key) | Plan::Object(key) => {
				term_key_bytes(key).to_vec()
			},
			_ => unreachable!("candidate cursors are built for permutation plans only; qed"),
		}
	}

	fn next_triple(&mut self) -> Result<Option<TripleKey>> {
		let (key_opt, op) = if self.started {
			(None, lmdb_sys::MDB_NEXT_DUP)
		} else {
			(Some(self.bound_key()), lmdb_sys::MDB_SET_KEY)
		};
		self.started = true;

		let value = match self.cursor.get(key_opt.as_ref().map(|k| &k[..]), None, op) {
			Ok((_, value)) => value,
			Err(lmdb::Error::NotFound) => return Ok(None),
			Err(err) => return Err(err.into()),
		};

		let triple = match self.plan {
			Plan::SubjectPredicate(DoubleKey(s, p)) => {
				TripleKey { s: s, p: p, o: read_term_key(value)? }
			},
			Plan::SubjectObject(DoubleKey(s, o)) => {
				TripleKey { s: s, p: read_term_key(value)?, o: o }
			},
			Plan::PredicateObject(DoubleKey(p, o)) => {
				TripleKey { s: read_term_key(value)?, p: p, o: o }
			},
			Plan::Subject(s) => {
				let DoubleKey(p, o) = DoubleKey::from_bytes(value)?;
				TripleKey { s: s, p: p, o: o }
			},
			Plan::Predicate(p) => {
				let DoubleKey(s, o) = DoubleKey::from_bytes(value)?;
				TripleKey { s: s, p: p, o: o }
			},
			Plan::Object(o) => {
				let DoubleKey(s, p) = DoubleKey::from_bytes(value)?;
				TripleKey { s: s, p: p, o: o }
			},
			_ => unreachable!("candidate cursors are built for permutation plans only; qed"),
		};
		Ok(Some(triple))
	}
}

enum State<'t> {
	Single(Option<QuadKey>),
	Direct(DirectCursor<'t>),
	Expand {
		candidates: CandidateCursor<'t>,
		// Second cursor on spo:c resolving each candidate's contexts.
		primary: lmdb::RoCursor<'t>,
		ctx: Option<TermKey>,
		current: Option<TripleKey>,
	},
}

/// Lazy cursor over the quads matching a pattern. Valid only while its
/// transaction is alive; the borrow checker enforces exactly that.
pub struct Matches<'t> {
	state: State<'t>,
	done: bool,
}

impl<'t> Matches<'t> {
	pub(crate) fn new<T: TxnRead>(txn: &'t T, indexes: &Indexes, pattern: Pattern) -> Result<Matches<'t>> {
		let chosen = plan(&pattern);
		debug!("pattern {:?} uses index {}", pattern, chosen.index_name());

		let state = match chosen {
			Plan::Exact(quad) => {
				let present = dup_exists(
					txn,
					indexes.spo_c,
					&quad.triple().bytes(),
					&term_key_bytes(quad.c),
				)?;
				State::Single(if present { Some(quad) } else { None })
			},
			Plan::Triple(triple) => State::Direct(DirectCursor {
				cursor: txn.kv_cursor(indexes.spo_c)?,
				kind: Direct::TripleDups(triple),
				started: false,
			}),
			Plan::Full => State::Direct(DirectCursor {
				cursor: txn.kv_cursor(indexes.spo_c)?,
				kind: Direct::FullPrimary,
				started: false,
			}),
			Plan::Context(ctx) => State::Direct(DirectCursor {
				cursor: txn.kv_cursor(indexes.c_spo)?,
				kind: Direct::ContextDups(ctx),
				started: false,
			}),
			permutation => {
				let db = match permutation {
					Plan::SubjectPredicate(..) => indexes.sp_o,
					Plan::SubjectObject(..) => indexes.so_p,
					Plan::PredicateObject(..) => indexes.po_s,
					Plan::Subject(..) => indexes.s_po,
					Plan::Predicate(..) => indexes.p_so,
					Plan::Object(..) => indexes.o_sp,
					_ => unreachable!("direct plans are handled above; qed"),
				};
				State::Expand {
					candidates: CandidateCursor {
						cursor: txn.kv_cursor(db)?,
						plan: permutation,
						started: false,
					},
					primary: txn.kv_cursor(indexes.spo_c)?,
					ctx: pattern.c,
					current: None,
				}
			},
		};

		Ok(Matches { state: state, done: false })
	}

	fn advance(&mut self) -> Result<Option<QuadKey>> {
		match self.state {
			State::Single(ref mut quad) => Ok(quad.take()),
			State::Direct(ref mut cursor) => cursor.next_quad(),
			State::Expand { ref mut candidates, ref mut primary, ctx, ref mut current } => {
				loop {
					if let Some(triple) = *current {
						match ctx {
							Some(c) => {
								*current = None;
								if primary_has(primary, &triple, c)? {
									return Ok(Some(triple.with_ctx(c)));
								}
								continue;
							},
							None => match next_primary_ctx(primary)? {
								Some(c) => return Ok(Some(triple.with_ctx(c))),
								None => {
									*current = None;
									continue;
								},
							},
						}
					}

					match candidates.next_triple()? {
						None => return Ok(None),
						Some(triple) => match ctx {
							Some(_) => *current = Some(triple),
							None => match first_primary_ctx(primary, &triple)? {
								Some(c) => {
									*current = Some(triple);
									return Ok(Some(triple.with_ctx(c)));
								},
								None => {
									warn!("triple {:?} is indexed but missing from spo:c", triple);
									continue;
								},
							},
						},
					}
				}
			},
		}
	}
}

impl<'t> Iterator for Matches<'t> {
	type Item = Result<QuadKey>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.advance() {
			Ok(Some(quad)) => Some(Ok(quad)),
			Ok(None) => {
				self.done = true;
				None
			},
			Err(err) => {
				self.done = true;
				Some(Err(err))
			},
		}
	}
}

fn primary_has(cursor: &lmdb::RoCursor, triple: &TripleKey, ctx: TermKey) -> Result<bool> {
	match cursor.get(Some(&triple.bytes()), Some(&term_key_bytes(ctx)), lmdb_sys::MDB_GET_BOTH) {
		Ok(_) => Ok(true),
		Err(lmdb::Error::NotFound) => Ok(false),
		Err(err) => Err(err.into()),
	}
}

fn first_primary_ctx(cursor: &lmdb::RoCursor, triple: &TripleKey) -> Result<Option<TermKey>> {
	match cursor.get(Some(&triple.bytes()), None, lmdb_sys::MDB_SET_KEY) {
		Ok((_, value)) => Ok(Some(read_term_key(value)?)),
		Err(lmdb::Error::NotFound) => Ok(None),
		Err(err) => Err(err.into()),
	}
}

fn next_primary_ctx(cursor: &lmdb::RoCursor) -> Result<Option<TermKey>> {
	match cursor.get(None, None, lmdb_sys::MDB_NEXT_DUP) {
		Ok((_, value)) => Ok(Some(read_term_key(value)?)),
		Err(lmdb::Error::NotFound) => Ok(None),
		Err(err) => Err(err.into()),
	}
}
