#![allow(unknown_lints)]
#![allow(missing_docs)]

use std::{io, num};

use key::TermKey;

error_chain! {
	foreign_links {
		Store(::lmdb::Error);
		Io(io::Error);
		Num(num::ParseIntError);
	}

	errors {
		Decode(detail: String) {
			description("Malformed stored term bytes")
			display("Malformed stored term bytes: {}", detail),
		}
		Collision(key: TermKey) {
			description("Two distinct terms hash to the same key"),
			display("Term key collision on {:#018x}. The store refuses to merge distinct terms.", key),
		}
		MissingTerm(key: TermKey) {
			description("Term key has no dictionary entry"),
			display("Term key {:#018x} is referenced by an index but missing from the dictionary.", key),
		}
		AlreadyPresent {
			description("Quad is already present"),
			display("Quad is already present in the store."),
		}
		NotFound {
			description("Pattern yielded no result"),
			display("Pattern yielded no result where one was expected."),
		}
		Conflict {
			description("Another write transaction is active"),
			display("Another write transaction is active and non-blocking mode was requested."),
		}
		InvalidState(what: String) {
			description("Operation on an invalid handle"),
			display("Invalid state: {}", what),
		}
		AlreadyInit(path: ::std::path::PathBuf) {
			description("Store is already initialized"),
			display("Store at {} is already initialized. Pass force to truncate it.", path.display()),
		}
		InvalidOptions(field: &'static str, error: String) {
			description("Invalid options were provided"),
			display("Invalid value of `{}`: {}", field, error),
		}
	}
}

impl PartialEq for ErrorKind {
	fn eq(&self, other: &Self) -> bool {
		use self::ErrorKind::*;

		match (self, other) {
			(&Decode(ref detail), &Decode(ref detail2))
				if detail == detail2 => true,
			(&Collision(key), &Collision(key2))
				if key == key2 => true,
			(&MissingTerm(key), &MissingTerm(key2))
				if key == key2 => true,
			(&AlreadyPresent, &AlreadyPresent) => true,
			(&NotFound, &NotFound) => true,
			(&Conflict, &Conflict) => true,
			(&InvalidState(ref what), &InvalidState(ref what2))
				if what == what2 => true,
			(&AlreadyInit(ref path), &AlreadyInit(ref path2))
				if path == path2 => true,
			(&InvalidOptions(field, ref error), &InvalidOptions(field2, ref error2))
				if field == field2 && error == error2 => true,
			_ => false,
		}
	}
}
