//! In-memory graphs.
//!
//! A [`Graph`] assembles triples outside any transaction: parsed payloads on
//! the way in, query results on the way out. Terms live as canonical bytes
//! in one append-only buffer that is freed as a unit when the graph goes
//! away; descriptors into the buffer are deduplicated by byte equality, so
//! re-inserting an equal term reuses the first descriptor. Triples are three
//! descriptor indices in a hash set, which makes the set algebra cheap.

use std::collections::hash_map::Entry;
use std::collections::{hash_set, HashMap, HashSet};

use hash::{self, DEFAULT_SEED};
use term::{self, Triple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TermSpan {
	offset: u32,
	len: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TripleRef(u32, u32, u32);

/// An in-memory set of triples backed by a contiguous term buffer.
#[derive(Debug, Default)]
pub struct Graph {
	buf: Vec<u8>,
	spans: Vec<TermSpan>,
	// Hash of the encoded bytes to the descriptors carrying them. The
	// bucket list resolves hash collisions by byte comparison.
	by_hash: HashMap<u64, Vec<u32>>,
	triples: HashSet<TripleRef>,
}

impl Graph {
	/// Creates an empty graph.
	pub fn new() -> Graph {
		Graph::default()
	}

	/// Number of triples.
	pub fn len(&self) -> usize {
		self.triples.len()
	}

	/// True when the graph holds no triples.
	pub fn is_empty(&self) -> bool {
		self.triples.is_empty()
	}

	/// Inserts a triple, returning false when it was already present.
	pub fn add(&mut self, triple: &Triple) -> bool {
		let s = term::encode(&triple.s);
		let p = term::encode(&triple.p);
		let o = term::encode(&triple.o);
		self.add_encoded(&s, &p, &o)
	}

	pub(crate) fn add_encoded(&mut self, s: &[u8], p: &[u8], o: &[u8]) -> bool {
		let triple = TripleRef(self.intern(s), self.intern(p), self.intern(o));
		self.triples.insert(triple)
	}

	/// Removes a triple, returning false when it was not present. The term
	/// buffer is never compacted; descriptors of removed terms stay behind.
	pub fn remove(&mut self, triple: &Triple) -> bool {
		match self.find_triple(triple) {
			Some(found) => self.triples.remove(&found),
			None => false,
		}
	}

	/// True when the triple is present.
	pub fn contains(&self, triple: &Triple) -> bool {
		self.find_triple(triple).map_or(false, |found| self.triples.contains(&found))
	}

	/// Iterates over the triples in unspecified order.
	pub fn iter(&self) -> Triples {
		Triples {
			graph: self,
			inner: self.triples.iter(),
		}
	}

	/// The triples present in either graph.
	pub fn union(&self, other: &Graph) -> Graph {
		let mut result = Graph::new();
		result.extend_encoded(self, self.triples.iter());
		result.extend_encoded(other, other.triples.iter());
		result
	}

	/// The triples present in both graphs.
	pub fn intersection(&self, other: &Graph) -> Graph {
		let mut result = Graph::new();
		for triple in &self.triples {
			if other.contains_encoded(self.span_bytes(triple.0), self.span_bytes(triple.1), self.span_bytes(triple.2)) {
				result.add_encoded(self.span_bytes(triple.0), self.span_bytes(triple.1), self.span_bytes(triple.2));
			}
		}
		result
	}

	/// The triples present in this graph but not the other.
	pub fn difference(&self, other: &Graph) -> Graph {
		let mut result = Graph::new();
		for triple in &self.triples {
			if !other.contains_encoded(self.span_bytes(triple.0), self.span_bytes(triple.1), self.span_bytes(triple.2)) {
				result.add_encoded(self.span_bytes(triple.0), self.span_bytes(triple.1), self.span_bytes(triple.2));
			}
		}
		result
	}

	pub(crate) fn term_count(&self) -> usize {
		self.spans.len()
	}

	pub(crate) fn term_bytes(&self, id: u32) -> &[u8] {
		self.span_bytes(id)
	}

	pub(crate) fn triple_ids(&self) -> Vec<(u32, u32, u32)> {
		self.triples.iter().map(|t| (t.0, t.1, t.2)).collect()
	}

	fn extend_encoded<'a, I: Iterator<Item = &'a TripleRef>>(&mut self, source: &Graph, triples: I) {
		for triple in triples {
			self.add_encoded(
				source.span_bytes(triple.0),
				source.span_bytes(triple.1),
				source.span_bytes(triple.2),
			);
		}
	}

	fn contains_encoded(&self, s: &[u8], p: &[u8], o: &[u8]) -> bool {
		match (self.find(s), self.find(p), self.find(o)) {
			(Some(s), Some(p), Some(o)) => self.triples.contains(&TripleRef(s, p, o)),
			_ => false,
		}
	}

	fn find_triple(&self, triple: &Triple) -> Option<TripleRef> {
		let s = self.find(&term::encode(&triple.s))?;
		let p = self.find(&term::encode(&triple.p))?;
		let o = self.find(&term::encode(&triple.o))?;
		Some(TripleRef(s, p, o))
	}

	fn span_bytes(&self, id: u32) -> &[u8] {
		let span = self.spans[id as usize];
		&self.buf[span.offset as usize..(span.offset + span.len) as usize]
	}

	fn find(&self, bytes: &[u8]) -> Option<u32> {
		let key = hash::key_of(bytes, &DEFAULT_SEED);
		self.by_hash.get(&key).and_then(|ids| {
			ids.iter().cloned().find(|id| self.span_bytes(*id) == bytes)
		})
	}

	fn intern(&mut self, bytes: &[u8]) -> u32 {
		let key = hash::key_of(bytes, &DEFAULT_SEED);
		if let Entry::Occupied(entry) = self.by_hash.entry(key) {
			for id in entry.get() {
				let span = self.spans[*id as usize];
				if &self.buf[span.offset as usize..(span.offset + span.len) as usize] == bytes {
					return *id;
				}
			}
		}

		let id = self.spans.len() as u32;
		let offset = self.buf.len() as u32;
		self.buf.extend_from_slice(bytes);
		self.spans.push(TermSpan { offset: offset, len: bytes.len() as u32 });
		self.by_hash.entry(key).or_insert_with(Vec::new).push(id);
		id
	}
}

impl PartialEq for Graph {
	fn eq(&self, other: &Graph) -> bool {
		self.len() == other.len() && self.triples.iter().all(|triple| {
			other.contains_encoded(
				self.span_bytes(triple.0),
				self.span_bytes(triple.1),
				self.span_bytes(triple.2),
			)
		})
	}
}

impl Eq for Graph {}

/// Decoding iterator over a graph's triples.
pub struct Triples<'a> {
	graph: &'a Graph,
	inner: hash_set::Iter<'a, TripleRef>,
}

impl<'a> Iterator for Triples<'a> {
	type Item = Triple;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|triple| {
			let decode = |id| {
				term::decode(self.graph.span_bytes(id)).expect(
					"graph buffers hold only terms serialized by insert; qed")
			};
			Triple::new(decode(triple.0), decode(triple.1), decode(triple.2))
		})
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}
