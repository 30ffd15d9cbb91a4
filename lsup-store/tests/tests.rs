extern crate lsup_store;
#[macro_use]
extern crate quickcheck;
extern crate tempdir;

use std::collections::HashSet;
use std::thread;

use lsup_store::{Options, Quad, QuadPattern, Store, Term, WriteTxn};
use tempdir::TempDir;

fn quad(s: &str, p: &str, o: &str, ctx: Option<&str>) -> Quad {
	Quad::new(Term::iri(s), Term::iri(p), Term::iri(o), ctx.map(Term::iri))
}

fn pattern(
	s: Option<&str>,
	p: Option<&str>,
	o: Option<&str>,
	ctx: Option<Option<&str>>,
) -> QuadPattern {
	QuadPattern {
		s: s.map(Term::iri),
		p: p.map(Term::iri),
		o: o.map(Term::iri),
		ctx: ctx.map(|c| c.map(Term::iri)),
	}
}

fn collect(store: &Store, pattern: &QuadPattern) -> HashSet<Quad> {
	store.with_read(|txn| {
		store.lookup(txn, pattern).unwrap().collect::<Result<HashSet<Quad>, _>>()
	}).unwrap()
}

#[derive(Debug)]
enum Action {
	Add(&'static str, &'static str, &'static str, Option<&'static str>),
	Remove(Option<&'static str>, Option<&'static str>, Option<&'static str>, Option<Option<&'static str>>, usize),
	Commit,
	AssertContains(&'static str, &'static str, &'static str, Option<&'static str>, bool),
	AssertLen(usize),
	AssertCtxLen(Option<&'static str>, usize),
	AssertFound(Option<&'static str>, Option<&'static str>, Option<&'static str>, Option<Option<&'static str>>, usize),
}

use Action::*;

fn run_actions(store: &Store, actions: &[Action]) {
	let mut pending: Option<WriteTxn> = None;

	for action in actions {
		println!("action: {:?}", action);
		match *action {
			Add(s, p, o, ctx) => {
				let txn = pending.get_or_insert_with(|| store.write_txn().unwrap());
				store.add(txn, &quad(s, p, o, ctx)).unwrap();
			},
			Remove(s, p, o, ctx, expected) => {
				let txn = pending.get_or_insert_with(|| store.write_txn().unwrap());
				assert_eq!(store.remove(txn, &pattern(s, p, o, ctx)).unwrap(), expected);
			},
			Commit => {
				if let Some(txn) = pending.take() {
					txn.commit().unwrap();
				}
			},
			AssertContains(s, p, o, ctx, expected) => {
				let txn = store.read_txn().unwrap();
				assert_eq!(store.contains(&txn, &quad(s, p, o, ctx)).unwrap(), expected);
			},
			AssertLen(expected) => {
				let txn = store.read_txn().unwrap();
				assert_eq!(store.len(&txn).unwrap(), expected);
			},
			AssertCtxLen(ctx, expected) => {
				let txn = store.read_txn().unwrap();
				let ctx = ctx.map(Term::iri);
				assert_eq!(store.ctx_len(&txn, ctx.as_ref()).unwrap(), expected);
			},
			AssertFound(s, p, o, ctx, expected) => {
				assert_eq!(collect(store, &pattern(s, p, o, ctx)).len(), expected);
			},
		}
	}
}

macro_rules! store_test {
	($name: tt, $($actions: expr),*) => {
		#[test]
		fn $name() {
			let temp = TempDir::new(stringify!($name)).unwrap();
			let store = Store::open(temp.path(), Options::default()).unwrap();
			store.bootstrap(false).unwrap();

			run_actions(&store, &[$($actions),*]);
		}
	}
}

store_test!(
	test_empty_store,
	AssertLen(0),
	AssertCtxLen(None, 0),
	AssertContains("urn:a", "urn:b", "urn:c", None, false),
	AssertFound(None, None, None, None, 0)
);

store_test!(
	test_single_add,
	Add("urn:a", "urn:b", "urn:c", None),
	Commit,
	AssertContains("urn:a", "urn:b", "urn:c", None, true),
	AssertFound(Some("urn:a"), None, None, None, 1),
	AssertLen(1),
	AssertCtxLen(None, 1)
);

store_test!(
	test_multiple_contexts,
	Add("urn:a", "urn:b", "urn:c", None),
	Add("urn:a", "urn:b", "urn:c", Some("urn:g1")),
	Commit,
	AssertFound(Some("urn:a"), Some("urn:b"), Some("urn:c"), None, 2),
	AssertLen(2),
	AssertCtxLen(None, 1),
	AssertCtxLen(Some("urn:g1"), 1),
	Remove(Some("urn:a"), Some("urn:b"), Some("urn:c"), Some(Some("urn:g1")), 1),
	Commit,
	AssertFound(Some("urn:a"), Some("urn:b"), Some("urn:c"), None, 1),
	AssertContains("urn:a", "urn:b", "urn:c", None, true),
	AssertContains("urn:a", "urn:b", "urn:c", Some("urn:g1"), false)
);

store_test!(
	test_remove_by_wildcard,
	Add("urn:a", "urn:p1", "urn:x", None),
	Add("urn:b", "urn:p1", "urn:y", None),
	Add("urn:c", "urn:p2", "urn:z", None),
	Commit,
	Remove(None, Some("urn:p1"), None, None, 2),
	Commit,
	AssertLen(1),
	AssertContains("urn:c", "urn:p2", "urn:z", None, true),
	Remove(None, Some("urn:p1"), None, None, 0)
);

store_test!(
	test_last_triple_of_a_context_drops_the_context,
	Add("urn:a", "urn:b", "urn:c", Some("urn:g1")),
	Add("urn:a", "urn:b", "urn:d", Some("urn:g1")),
	Commit,
	Remove(None, None, Some("urn:c"), Some(Some("urn:g1")), 1),
	Commit,
	AssertCtxLen(Some("urn:g1"), 1),
	Remove(None, None, None, Some(Some("urn:g1")), 1),
	Commit,
	AssertCtxLen(Some("urn:g1"), 0),
	AssertLen(0)
);

#[test]
fn test_contexts_disappear_with_their_last_triple() {
	let temp = TempDir::new("contexts_disappear").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	store.with_write(|txn| {
		store.add(txn, &quad("urn:a", "urn:b", "urn:c", Some("urn:g1")))?;
		store.add(txn, &quad("urn:a", "urn:b", "urn:c", None)).map(|_| ())
	}).unwrap();

	store.with_read(|txn| {
		let contexts = store.contexts(txn).unwrap();
		assert!(contexts.contains(&Term::iri("urn:g1")));
		assert!(contexts.contains(&Term::iri(lsup_store::DEFAULT_CTX_IRI)));
		Ok(())
	}).unwrap();

	store.with_write(|txn| {
		store.remove(txn, &pattern(None, None, None, Some(Some("urn:g1")))).map(|_| ())
	}).unwrap();

	store.with_read(|txn| {
		assert!(!store.contexts(txn).unwrap().contains(&Term::iri("urn:g1")));
		Ok(())
	}).unwrap();
}

// Scenario: 1,000 quads over 100 predicates with 10 objects each; a
// predicate-bound pattern must pick `p:so` and return exactly its 10 quads.
#[test]
fn test_pattern_selection() {
	let temp = TempDir::new("pattern_selection").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	let quads = (0..1000).map(|i| {
		quad(
			&format!("urn:s{}", i),
			&format!("urn:p{}", i / 10),
			&format!("urn:o{}", i % 10),
			None,
		)
	});

	let (added, _) = store.with_write(|txn| store.add_many(txn, quads)).unwrap();
	assert_eq!(added, 1000);

	let needle = pattern(None, Some("urn:p17"), None, Some(None));
	store.with_read(|txn| {
		assert_eq!(store.explain(txn, &needle).unwrap(), Some("p:so"));
		Ok(())
	}).unwrap();

	let found = collect(&store, &needle);
	assert_eq!(found.len(), 10);
	assert!(found.iter().all(|q| q.p == Term::iri("urn:p17")));
}

// Scenario: an aborted write leaves nothing behind.
#[test]
fn test_abort_semantics() {
	let temp = TempDir::new("abort_semantics").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	let mut txn = store.write_txn().unwrap();
	store.add(&mut txn, &quad("urn:x", "urn:y", "urn:z", None)).unwrap();
	txn.abort();

	run_actions(&store, &[
		AssertContains("urn:x", "urn:y", "urn:z", None, false),
		AssertLen(0),
	]);
}

// Scenario: a reader opened before a commit never observes it.
#[test]
fn test_reader_writer_isolation() {
	let temp = TempDir::new("reader_writer_isolation").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	let r1 = store.read_txn().unwrap();

	let writer = {
		let store = store.clone();
		thread::spawn(move || {
			store.with_write(|txn| {
				store.add(txn, &quad("urn:a", "urn:b", "urn:c", None)).map(|_| ())
			}).unwrap();
		})
	};
	writer.join().unwrap();

	let r2 = store.read_txn().unwrap();

	assert_eq!(store.len(&r1).unwrap(), 0);
	assert!(!store.contains(&r1, &quad("urn:a", "urn:b", "urn:c", None)).unwrap());
	assert_eq!(store.len(&r2).unwrap(), 1);
	assert!(store.contains(&r2, &quad("urn:a", "urn:b", "urn:c", None)).unwrap());
}

// Every projection of the committed quad set, recovered through every
// index, agrees with the full scan.
#[test]
fn test_index_consistency_across_projections() {
	let temp = TempDir::new("index_consistency").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	store.with_write(|txn| {
		for i in 0..20 {
			store.add(txn, &quad(
				&format!("urn:s{}", i % 5),
				&format!("urn:p{}", i % 3),
				&format!("urn:o{}", i % 7),
				if i % 2 == 0 { None } else { Some("urn:g") },
			))?;
		}
		store.remove(txn, &pattern(Some("urn:s1"), None, None, None))?;
		Ok(())
	}).unwrap();

	let all = collect(&store, &QuadPattern::any());
	assert!(!all.is_empty());

	let mut by_s = HashSet::new();
	let mut by_p = HashSet::new();
	let mut by_o = HashSet::new();
	let mut by_sp = HashSet::new();
	let mut by_so = HashSet::new();
	let mut by_po = HashSet::new();
	let mut by_spo = HashSet::new();

	for q in &all {
		let (s, p, o) = match (&q.s, &q.p, &q.o) {
			(&Term::Iri(ref s), &Term::Iri(ref p), &Term::Iri(ref o)) => (s.clone(), p.clone(), o.clone()),
			other => panic!("unexpected term kinds: {:?}", other),
		};
		by_s.extend(collect(&store, &pattern(Some(&s), None, None, None)));
		by_p.extend(collect(&store, &pattern(None, Some(&p), None, None)));
		by_o.extend(collect(&store, &pattern(None, None, Some(&o), None)));
		by_sp.extend(collect(&store, &pattern(Some(&s), Some(&p), None, None)));
		by_so.extend(collect(&store, &pattern(Some(&s), None, Some(&o), None)));
		by_po.extend(collect(&store, &pattern(None, Some(&p), Some(&o), None)));
		by_spo.extend(collect(&store, &pattern(Some(&s), Some(&p), Some(&o), None)));
	}

	assert_eq!(by_s, all);
	assert_eq!(by_p, all);
	assert_eq!(by_o, all);
	assert_eq!(by_sp, all);
	assert_eq!(by_so, all);
	assert_eq!(by_po, all);
	assert_eq!(by_spo, all);
}

// Adding and removing a previously absent quad restores the index
// contents; the dictionary is allowed to keep the new terms.
#[test]
fn test_add_remove_is_an_inverse_for_indexes() {
	let temp = TempDir::new("add_remove_inverse").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	store.with_write(|txn| {
		store.add(txn, &quad("urn:base", "urn:p", "urn:o", None)).map(|_| ())
	}).unwrap();

	let before = collect(&store, &QuadPattern::any());
	let fresh = quad("urn:new-s", "urn:new-p", "urn:new-o", Some("urn:new-g"));

	store.with_write(|txn| {
		assert!(store.add(txn, &fresh)?);
		assert_eq!(store.remove(txn, &QuadPattern::of_quad(&fresh))?, 1);
		Ok(())
	}).unwrap();

	let after = collect(&store, &QuadPattern::any());
	assert_eq!(before, after);

	store.with_read(|txn| {
		assert_eq!(store.ctx_len(txn, Some(&Term::iri("urn:new-g"))).unwrap(), 0);
		// The dictionary keeps the orphaned terms.
		let terms: Vec<Term> = store.all_terms(txn).unwrap().into_iter().map(|(_, t)| t).collect();
		assert!(terms.contains(&Term::iri("urn:new-s")));
		Ok(())
	}).unwrap();
}

#[test]
fn test_literal_terms_roundtrip_through_the_store() {
	let temp = TempDir::new("literal_roundtrip").unwrap();
	let store = Store::open(temp.path(), Options::default()).unwrap();
	store.bootstrap(false).unwrap();

	let q = Quad::new(
		Term::iri("urn:s"),
		Term::iri("urn:p"),
		Term::lang_literal("hello", "EN"),
		None,
	);
	store.with_write(|txn| store.add(txn, &q).map(|_| ())).unwrap();

	let found = collect(&store, &pattern(Some("urn:s"), None, None, None));
	assert_eq!(found.len(), 1);
	let got = found.into_iter().next().unwrap();
	assert_eq!(got.o, Term::lang_literal("hello", "en"));

	// A plain literal with the same lexical form is a different object.
	store.with_read(|txn| {
		assert!(!store.contains(txn, &Quad::new(
			Term::iri("urn:s"),
			Term::iri("urn:p"),
			Term::literal("hello"),
			None,
		)).unwrap());
		Ok(())
	}).unwrap();
}

fn small_term(prefix: &str, n: u8) -> String {
	format!("urn:{}{}", prefix, n % 4)
}

fn small_ctx(n: u8) -> Option<String> {
	match n % 3 {
		0 => None,
		m => Some(format!("urn:g{}", m)),
	}
}

quickcheck! {
	// Pattern completeness over a small universe: lookup returns exactly
	// the matching subset of what was committed, without duplicates.
	fn quickcheck_lookup_matches_naive_filter(
		raw: Vec<(u8, u8, u8, u8)>,
		ps: Option<u8>,
		pp: Option<u8>,
		po: Option<u8>,
		pc: Option<u8>
	) -> bool {
		let temp = TempDir::new("quickcheck_lookup").unwrap();
		let store = Store::open(temp.path(), Options::default()).unwrap();
		store.bootstrap(false).unwrap();

		let quads: HashSet<Quad> = raw.iter().map(|&(s, p, o, c)| {
			Quad::new(
				Term::iri(small_term("s", s)),
				Term::iri(small_term("p", p)),
				Term::iri(small_term("o", o)),
				small_ctx(c).map(Term::iri),
			)
		}).collect();

		store.with_write(|txn| {
			store.add_many(txn, quads.iter().cloned())
		}).unwrap();

		let needle = QuadPattern {
			s: ps.map(|n| Term::iri(small_term("s", n))),
			p: pp.map(|n| Term::iri(small_term("p", n))),
			o: po.map(|n| Term::iri(small_term("o", n))),
			ctx: pc.map(|n| small_ctx(n).map(Term::iri)),
		};

		let expected: HashSet<Quad> = quads.iter().filter(|q| {
			needle.s.as_ref().map_or(true, |s| *s == q.s)
				&& needle.p.as_ref().map_or(true, |p| *p == q.p)
				&& needle.o.as_ref().map_or(true, |o| *o == q.o)
				&& needle.ctx.as_ref().map_or(true, |c| *c == q.ctx)
		}).cloned().collect();

		let listed = store.with_read(|txn| {
			store.lookup(txn, &needle).unwrap().collect::<Result<Vec<Quad>, _>>()
		}).unwrap();
		store.close();

		// No duplicates, and exactly the expected set.
		listed.len() == expected.len() && listed.into_iter().collect::<HashSet<Quad>>() == expected
	}
}
