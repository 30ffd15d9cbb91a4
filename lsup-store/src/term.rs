//! RDF term model and canonical codec.
//!
//! Terms are value objects: two terms are equal if and only if their
//! canonical serializations are byte-equal. The constructors normalize the
//! redundant forms (an explicit `xsd:string` datatype, mixed-case language
//! tags) so that equality never depends on how a term was spelled at the
//! boundary.
//!
//! The canonical serialization is a tagged binary record:
//!
//! ```text
//!  tag   length-prefixed fields (u32 big-endian lengths)
//!   /     /
//! |...|...........|
//! ```
//!
//! One field for IRIs and blank nodes, one or two for literals depending on
//! the tag.

use std::str;

use byteorder::{BigEndian, ByteOrder};

use error::{ErrorKind, Result};

/// The IRI of `xsd:string`, the implied datatype of a plain literal.
pub const XSD_STRING: &'static str = "http://www.w3.org/2001/XMLSchema#string";

const TAG_IRI: u8 = 1;
const TAG_BLANK: u8 = 2;
const TAG_LITERAL: u8 = 3;
const TAG_LITERAL_TYPED: u8 = 4;
const TAG_LITERAL_LANG: u8 = 5;

/// A literal term: a lexical form with at most one of a datatype IRI or a
/// language tag. Constructed through [`Term`] so the exclusivity invariant
/// always holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
	lexical: String,
	datatype: Option<String>,
	language: Option<String>,
}

impl Literal {
	/// The lexical form.
	pub fn lexical(&self) -> &str {
		&self.lexical
	}

	/// The explicit datatype IRI, if any. `None` means `xsd:string`.
	pub fn datatype(&self) -> Option<&str> {
		self.datatype.as_ref().map(|s| s.as_str())
	}

	/// The language tag, if any. Always lowercase.
	pub fn language(&self) -> Option<&str> {
		self.language.as_ref().map(|s| s.as_str())
	}
}

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
	/// An IRI reference.
	Iri(String),
	/// A blank node with an opaque id.
	Blank(String),
	/// A literal.
	Literal(Literal),
}

impl Term {
	/// Creates an IRI term.
	pub fn iri<S: Into<String>>(iri: S) -> Term {
		Term::Iri(iri.into())
	}

	/// Creates a blank node term.
	pub fn blank<S: Into<String>>(id: S) -> Term {
		Term::Blank(id.into())
	}

	/// Creates a plain (`xsd:string`) literal.
	pub fn literal<S: Into<String>>(lexical: S) -> Term {
		Term::Literal(Literal {
			lexical: lexical.into(),
			datatype: None,
			language: None,
		})
	}

	/// Creates a datatyped literal. An explicit `xsd:string` datatype
	/// canonicalizes to the plain form.
	pub fn typed_literal<S: Into<String>, D: Into<String>>(lexical: S, datatype: D) -> Term {
		let datatype = datatype.into();
		if datatype == XSD_STRING {
			return Term::literal(lexical);
		}
		Term::Literal(Literal {
			lexical: lexical.into(),
			datatype: Some(datatype),
			language: None,
		})
	}

	/// Creates a language-tagged literal. Tags are lowercased; an empty tag
	/// canonicalizes to the plain form.
	pub fn lang_literal<S: Into<String>, L: AsRef<str>>(lexical: S, language: L) -> Term {
		let language = language.as_ref().to_lowercase();
		if language.is_empty() {
			return Term::literal(lexical);
		}
		Term::Literal(Literal {
			lexical: lexical.into(),
			datatype: None,
			language: Some(language),
		})
	}
}

/// A triple of terms, the unit held by in-memory graphs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
	/// Subject.
	pub s: Term,
	/// Predicate.
	pub p: Term,
	/// Object.
	pub o: Term,
}

impl Triple {
	/// Creates a triple.
	pub fn new(s: Term, p: Term, o: Term) -> Triple {
		Triple { s: s, p: p, o: o }
	}
}

/// A quad: a triple plus its context. `None` is the default graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
	/// Subject.
	pub s: Term,
	/// Predicate.
	pub p: Term,
	/// Object.
	pub o: Term,
	/// Named-graph context, `None` for the default graph.
	pub ctx: Option<Term>,
}

impl Quad {
	/// Creates a quad.
	pub fn new(s: Term, p: Term, o: Term, ctx: Option<Term>) -> Quad {
		Quad { s: s, p: p, o: o, ctx: ctx }
	}

	/// The triple part of the quad.
	pub fn triple(&self) -> Triple {
		Triple::new(self.s.clone(), self.p.clone(), self.o.clone())
	}
}

/// Serializes a term to its canonical byte form.
pub fn encode(term: &Term) -> Vec<u8> {
	let mut buf = Vec::with_capacity(32);
	encode_into(term, &mut buf);
	buf
}

/// Serializes a term, appending to an existing buffer.
pub fn encode_into(term: &Term, buf: &mut Vec<u8>) {
	match *term {
		Term::Iri(ref iri) => {
			buf.push(TAG_IRI);
			push_field(buf, iri);
		},
		Term::Blank(ref id) => {
			buf.push(TAG_BLANK);
			push_field(buf, id);
		},
		Term::Literal(ref literal) => {
			match (literal.datatype.as_ref(), literal.language.as_ref()) {
				(None, None) => {
					buf.push(TAG_LITERAL);
					push_field(buf, &literal.lexical);
				},
				(Some(datatype), None) => {
					buf.push(TAG_LITERAL_TYPED);
					push_field(buf, &literal.lexical);
					push_field(buf, datatype);
				},
				(None, Some(language)) => {
					buf.push(TAG_LITERAL_LANG);
					push_field(buf, &literal.lexical);
					push_field(buf, language);
				},
				(Some(_), Some(_)) => unreachable!(
					"literals are built by constructors enforcing \
					 datatype/language exclusivity; qed"),
			}
		},
	}
}

/// Deserializes a term from its canonical byte form.
pub fn decode(bytes: &[u8]) -> Result<Term> {
	if bytes.is_empty() {
		bail!(ErrorKind::Decode("empty term record".into()));
	}

	let tag = bytes[0];
	let mut offset = 1;

	let term = match tag {
		TAG_IRI => Term::Iri(read_field(bytes, &mut offset)?.into()),
		TAG_BLANK => Term::Blank(read_field(bytes, &mut offset)?.into()),
		TAG_LITERAL => {
			let lexical = read_field(bytes, &mut offset)?.into();
			Term::Literal(Literal { lexical: lexical, datatype: None, language: None })
		},
		TAG_LITERAL_TYPED => {
			let lexical = read_field(bytes, &mut offset)?.to_string();
			let datatype = read_field(bytes, &mut offset)?.to_string();
			if datatype == XSD_STRING {
				bail!(ErrorKind::Decode("explicit xsd:string datatype in stored term".into()));
			}
			Term::Literal(Literal { lexical: lexical, datatype: Some(datatype), language: None })
		},
		TAG_LITERAL_LANG => {
			let lexical = read_field(bytes, &mut offset)?.to_string();
			let language = read_field(bytes, &mut offset)?.to_string();
			if language.is_empty() || language.chars().any(|c| c.is_uppercase()) {
				bail!(ErrorKind::Decode("non-canonical language tag in stored term".into()));
			}
			Term::Literal(Literal { lexical: lexical, datatype: None, language: Some(language) })
		},
		other => bail!(ErrorKind::Decode(format!("unknown term tag {}", other))),
	};

	if offset != bytes.len() {
		bail!(ErrorKind::Decode(format!("{} trailing bytes after term record", bytes.len() - offset)));
	}

	Ok(term)
}

fn push_field(buf: &mut Vec<u8>, field: &str) {
	let mut len = [0u8; 4];
	BigEndian::write_u32(&mut len, field.len() as u32);
	buf.extend_from_slice(&len);
	buf.extend_from_slice(field.as_bytes());
}

fn read_field<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str> {
	if bytes.len() < *offset + 4 {
		bail!(ErrorKind::Decode("truncated field length".into()));
	}
	let len = BigEndian::read_u32(&bytes[*offset..*offset + 4]) as usize;
	*offset += 4;

	if bytes.len() < *offset + len {
		bail!(ErrorKind::Decode("truncated field body".into()));
	}
	let field = str::from_utf8(&bytes[*offset..*offset + len])
		.map_err(|err| ErrorKind::Decode(format!("field is not UTF-8: {}", err)))?;
	*offset += len;

	Ok(field)
}

#[cfg(test)]
mod tests {
	use quickcheck::{Arbitrary, Gen, TestResult};

	use super::{decode, encode, Term, XSD_STRING};

	impl Arbitrary for Term {
		fn arbitrary(g: &mut Gen) -> Term {
			match u8::arbitrary(g) % 5 {
				0 => Term::iri(String::arbitrary(g)),
				1 => Term::blank(String::arbitrary(g)),
				2 => Term::literal(String::arbitrary(g)),
				3 => Term::typed_literal(String::arbitrary(g), format!("urn:dt:{}", u16::arbitrary(g))),
				_ => Term::lang_literal(String::arbitrary(g), *g.choose(&["en", "en-GB", "fi", "de"]).unwrap()),
			}
		}
	}

	#[test]
	fn explicit_xsd_string_is_plain() {
		assert_eq!(Term::typed_literal("a", XSD_STRING), Term::literal("a"));
		assert_eq!(
			encode(&Term::typed_literal("a", XSD_STRING)),
			encode(&Term::literal("a"))
		);
	}

	#[test]
	fn language_tags_are_lowercased() {
		assert_eq!(Term::lang_literal("a", "EN-GB"), Term::lang_literal("a", "en-gb"));
		assert_eq!(Term::lang_literal("a", ""), Term::literal("a"));
	}

	#[test]
	fn kinds_do_not_collide() {
		let terms = [
			Term::iri("a"),
			Term::blank("a"),
			Term::literal("a"),
			Term::typed_literal("a", "urn:dt:int"),
			Term::lang_literal("a", "en"),
		];
		for (i, a) in terms.iter().enumerate() {
			for (j, b) in terms.iter().enumerate() {
				assert_eq!(encode(a) == encode(b), i == j);
			}
		}
	}

	#[test]
	fn decode_rejects_malformed_records() {
		assert!(decode(&[]).is_err());
		// unknown tag
		assert!(decode(&[9, 0, 0, 0, 0]).is_err());
		// truncated length
		assert!(decode(&[1, 0, 0]).is_err());
		// body shorter than its length prefix
		assert!(decode(&[1, 0, 0, 0, 5, b'a']).is_err());
		// trailing garbage
		let mut bytes = encode(&Term::iri("urn:a"));
		bytes.push(0);
		assert!(decode(&bytes).is_err());
		// invalid utf-8
		assert!(decode(&[1, 0, 0, 0, 1, 0xff]).is_err());
	}

	quickcheck! {
		fn quickcheck_term_roundtrips(term: Term) -> bool {
			decode(&encode(&term)).unwrap() == term
		}

		fn quickcheck_equal_terms_have_equal_bytes(a: Term, b: Term) -> TestResult {
			TestResult::from_bool((a == b) == (encode(&a) == encode(&b)))
		}
	}
}
