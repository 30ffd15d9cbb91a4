//! Transactional RDF quad store over LMDB
//!
//! Assumptions:
//!
//! - terms are interned once into fixed-width hash keys
//!
//! - seven permutation indices answer any (s, p, o, c) pattern
//!
//! - with lazy, copy-free cursors over the matches
//!
//! - one writer, many snapshot-isolated readers
//!
//! - and guaranteed ACID (atomicity, consistency, isolation and durability)
//!
//! Every index stores fixed-width keys.
//!
//! ```text
//!  s        p        o        c
//!   /        /        /        /
//! |........|........|........|........|
//! ```
//!
//! The primary index maps a triple to the contexts holding it; the six
//! permutations map every projection of the triple positions back to the
//! missing ones; `c:spo` enumerates a context. The term dictionary (`t2k`,
//! `k2t`) maps canonical term bytes to keys and back.
//!
//! A caller opens a transaction against the store and passes it to every
//! operation. Writes are serialized; a commit makes all of them visible
//! atomically and yields a per-context change delta. In-memory [`Graph`]
//! values carry triples across the store boundary without touching a
//! transaction.

#![warn(missing_docs)]

extern crate byteorder;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
extern crate lmdb;
extern crate lmdb_sys;
#[macro_use]
extern crate log;
extern crate parking_lot;
extern crate siphasher;
#[cfg(test)]
#[macro_use]
extern crate matches;
#[cfg(test)]
#[macro_use]
extern crate quickcheck;

mod bootstrap;
mod dict;
mod error;
mod find;
mod graph;
mod hash;
mod index;
mod key;
mod options;
mod store;
mod term;
mod txn;

pub use bootstrap::{default_ctx_term, DEFAULT_CTX_IRI};
pub use error::{Error, ErrorKind, Result};
pub use graph::{Graph, Triples};
pub use hash::{Seed, DEFAULT_SEED, SEED_LEN};
pub use key::{DoubleKey, QuadKey, TermKey, TripleKey, DEFAULT_CTX_KEY, UNASSIGNED_KEY};
pub use options::Options;
pub use store::{QuadPattern, Quads, Store, StoreStats};
pub use term::{Literal, Quad, Term, Triple, XSD_STRING};
pub use txn::{CtxDelta, Delta, ReadTxn, TxnRead, WriteTxn, MAX_NESTED};
#[doc(hidden)]
pub use find::{plan, Pattern, Plan};
