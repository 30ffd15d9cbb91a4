//! Bootstrap and index recovery.
//!
//! Bootstrap pins the default-graph context term at its reserved key and is
//! the marker separating an initialized store from a bare environment.
//! Rebuild regenerates the derived indexes from the primary one after a
//! suspected inconsistency, e.g. when an operator restores from a dirty
//! copy.

use error::{ErrorKind, Result};
use key::DEFAULT_CTX_KEY;
use store::Store;
use term::Term;

/// IRI of the default-graph context term pinned at the reserved key.
pub const DEFAULT_CTX_IRI: &'static str = "urn:lsup:default";

/// The default-graph context term.
pub fn default_ctx_term() -> Term {
	Term::iri(DEFAULT_CTX_IRI)
}

impl Store {
	/// Initializes an empty store: writes the default-context term at the
	/// reserved key. A populated store is rejected with `AlreadyInit`
	/// unless `force` truncates every sub-database first.
	pub fn bootstrap(&self, force: bool) -> Result<()> {
		let ((), _delta) = self.with_write(|txn| {
			if !self.dict.is_empty(txn)? {
				if !force {
					bail!(ErrorKind::AlreadyInit(self.path().to_path_buf()));
				}
				info!("force bootstrap: truncating store at {}", self.path().display());
				self.indexes.clear_all(txn)?;
				self.dict.clear(txn)?;
			}
			self.dict.insert_reserved(txn, DEFAULT_CTX_KEY, &default_ctx_term())
		})?;

		info!("bootstrapped store at {}", self.path().display());
		Ok(())
	}

	/// Rebuilds the six permutation indexes and `c:spo` from a scan of the
	/// primary index, in one write transaction. Returns the number of
	/// quads re-emitted.
	pub fn rebuild(&self) -> Result<usize> {
		let (quads, _delta) = self.with_write(|txn| self.indexes.rebuild_derived(txn))?;
		info!("rebuilt permutation indexes from {} quads at {}", quads, self.path().display());
		Ok(quads)
	}
}

#[cfg(test)]
mod tests {
	extern crate tempdir;

	use self::tempdir::TempDir;
	use error::ErrorKind;
	use key::{term_key_bytes, DEFAULT_CTX_KEY};
	use options::Options;
	use store::{QuadPattern, Store};
	use term::{Quad, Term};
	use txn::TxnRead;

	fn quad(s: &str, p: &str, o: &str, ctx: Option<&str>) -> Quad {
		Quad::new(Term::iri(s), Term::iri(p), Term::iri(o), ctx.map(Term::iri))
	}

	#[test]
	fn bootstrap_pins_the_default_context() {
		let temp = TempDir::new("bootstrap_pins").unwrap();
		let store = Store::open(temp.path(), Options::default()).unwrap();
		store.bootstrap(false).unwrap();

		let txn = store.read_txn().unwrap();
		assert_eq!(
			store.dict.lookup(&txn, DEFAULT_CTX_KEY).unwrap(),
			super::default_ctx_term()
		);
		assert_eq!(
			store.dict.key_of(&txn, &super::default_ctx_term()).unwrap(),
			Some(DEFAULT_CTX_KEY)
		);
	}

	#[test]
	fn bootstrap_rejects_a_populated_store() {
		let temp = TempDir::new("bootstrap_rejects").unwrap();
		let store = Store::open(temp.path(), Options::default()).unwrap();
		store.bootstrap(false).unwrap();

		assert_eq!(
			*store.bootstrap(false).unwrap_err().kind(),
			ErrorKind::AlreadyInit(store.path().to_path_buf())
		);

		store.with_write(|txn| {
			store.add(txn, &quad("urn:a", "urn:b", "urn:c", None)).map(|_| ())
		}).unwrap();

		// Forced bootstrap truncates everything and re-pins the context.
		store.bootstrap(true).unwrap();
		store.with_read(|txn| {
			assert_eq!(store.len(txn).unwrap(), 0);
			assert_eq!(store.all_terms(txn).unwrap().len(), 1);
			Ok(())
		}).unwrap();
	}

	#[test]
	fn rebuild_restores_damaged_permutation_indexes() {
		let temp = TempDir::new("rebuild").unwrap();
		let store = Store::open(temp.path(), Options::default()).unwrap();
		store.bootstrap(false).unwrap();

		store.with_write(|txn| {
			store.add(txn, &quad("urn:a", "urn:b", "urn:c", None))?;
			store.add(txn, &quad("urn:a", "urn:b", "urn:d", Some("urn:g")))?;
			store.add(txn, &quad("urn:e", "urn:b", "urn:c", None)).map(|_| ())
		}).unwrap();

		// Damage every derived index behind the store's back.
		store.with_write(|txn| {
			for db in &[
				store.indexes.s_po, store.indexes.p_so, store.indexes.o_sp,
				store.indexes.po_s, store.indexes.so_p, store.indexes.sp_o,
				store.indexes.c_spo,
			] {
				txn.kv_clear(*db)?;
			}
			Ok(())
		}).unwrap();

		store.with_read(|txn| {
			assert_eq!(store.len(txn).unwrap(), 0);
			Ok(())
		}).unwrap();

		assert_eq!(store.rebuild().unwrap(), 3);

		store.with_read(|txn| {
			assert_eq!(store.len(txn).unwrap(), 3);
			assert_eq!(store.ctx_len(txn, None).unwrap(), 2);
			assert_eq!(store.ctx_len(txn, Some(&Term::iri("urn:g"))).unwrap(), 1);
			assert!(txn.kv_get(store.indexes.p_so, &term_key_bytes(
				store.dict.key_of(txn, &Term::iri("urn:b")).unwrap().unwrap()
			)).unwrap().is_some());
			let found = store.lookup(txn, &QuadPattern {
				p: Some(Term::iri("urn:b")),
				..QuadPattern::any()
			}).unwrap().count();
			assert_eq!(found, 3);
			Ok(())
		}).unwrap();
	}
}
