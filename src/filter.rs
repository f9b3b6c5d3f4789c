//! LDAP search filters (RFC 4515) evaluated against in-memory entries.
use std::{cmp::Ordering, fmt, str::FromStr, sync::Arc};

use crate::{
	dn::Dn,
	entry::Entry,
	error::Error,
	schema::{Schema, Syntax},
};

/// Anything that can decide whether an entry is selected.
pub trait Matcher {
	/// Whether the entry matches
	fn matches(&self, entry: &Entry) -> bool;
}

impl<F: Fn(&Entry) -> bool> Matcher for F {
	fn matches(&self, entry: &Entry) -> bool {
		self(entry)
	}
}

/// A parsed search filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
	/// All sub-filters match
	And(Vec<Filter>),
	/// Any sub-filter matches
	Or(Vec<Filter>),
	/// The sub-filter does not match
	Not(Box<Filter>),
	/// `(attr=value)`
	Equality(String, Vec<u8>),
	/// `(attr=initial*any*final)`
	Substrings {
		/// Attribute type
		attribute: String,
		/// Leading component
		initial: Option<Vec<u8>>,
		/// Inner components, in order
		any: Vec<Vec<u8>>,
		/// Trailing component
		last: Option<Vec<u8>>,
	},
	/// `(attr>=value)`
	GreaterOrEqual(String, Vec<u8>),
	/// `(attr<=value)`
	LessOrEqual(String, Vec<u8>),
	/// `(attr=*)`
	Present(String),
	/// `(attr~=value)`
	Approx(String, Vec<u8>),
}

impl Filter {
	/// `(objectClass=*)`, which every entry matches
	#[must_use]
	pub fn object_class_present() -> Self {
		Filter::Present("objectClass".to_owned())
	}

	/// Bind the filter to a schema, which decides how values are compared
	#[must_use]
	pub fn matcher(&self, schema: Arc<Schema>) -> FilterMatcher {
		FilterMatcher { filter: self.clone(), schema }
	}
}

impl FromStr for Filter {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let wrapped;
		let input = if trimmed.starts_with('(') {
			trimmed
		} else {
			wrapped = format!("({trimmed})");
			&wrapped
		};
		let mut parser = Parser { input: input.as_bytes(), position: 0 };
		let filter = parser.filter().and_then(|filter| {
			if parser.position == parser.input.len() {
				Ok(filter)
			} else {
				Err("trailing characters after filter".to_owned())
			}
		});
		filter.map_err(|message| Error::Filter { filter: s.to_owned(), message })
	}
}

impl fmt::Display for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Filter::And(filters) | Filter::Or(filters) => {
				f.write_str(if matches!(self, Filter::And(_)) { "(&" } else { "(|" })?;
				for filter in filters {
					write!(f, "{filter}")?;
				}
				f.write_str(")")
			}
			Filter::Not(filter) => write!(f, "(!{filter})"),
			Filter::Equality(attribute, value) => write!(f, "({attribute}={})", escape(value)),
			Filter::GreaterOrEqual(attribute, value) => write!(f, "({attribute}>={})", escape(value)),
			Filter::LessOrEqual(attribute, value) => write!(f, "({attribute}<={})", escape(value)),
			Filter::Approx(attribute, value) => write!(f, "({attribute}~={})", escape(value)),
			Filter::Present(attribute) => write!(f, "({attribute}=*)"),
			Filter::Substrings { attribute, initial, any, last } => {
				write!(f, "({attribute}=")?;
				if let Some(initial) = initial {
					f.write_str(&escape(initial))?;
				}
				f.write_str("*")?;
				for part in any {
					write!(f, "{}*", escape(part))?;
				}
				if let Some(last) = last {
					f.write_str(&escape(last))?;
				}
				f.write_str(")")
			}
		}
	}
}

/// Escape a value for the string form of a filter
fn escape(value: &[u8]) -> String {
	let mut out = String::with_capacity(value.len());
	for &byte in value {
		match byte {
			b'*' | b'(' | b')' | b'\\' | 0 => out.push_str(&format!("\\{byte:02x}")),
			_ if byte.is_ascii() => out.push(char::from(byte)),
			_ => out.push_str(&format!("\\{byte:02x}")),
		}
	}
	out
}

/// Recursive descent parser over the filter bytes
struct Parser<'a> {
	/// The complete filter
	input: &'a [u8],
	/// Index of the next unread byte
	position: usize,
}

impl Parser<'_> {
	/// The next byte without consuming it
	fn peek(&self) -> Option<u8> {
		self.input.get(self.position).copied()
	}

	/// Consume the expected byte
	fn expect(&mut self, expected: u8) -> Result<(), String> {
		match self.peek() {
			Some(byte) if byte == expected => {
				self.position += 1;
				Ok(())
			}
			Some(byte) => Err(format!(
				"expected '{}' at offset {} but found '{}'",
				char::from(expected),
				self.position,
				char::from(byte)
			)),
			None => Err(format!("expected '{}' but the filter ended", char::from(expected))),
		}
	}

	/// `( filtercomp )`
	fn filter(&mut self) -> Result<Filter, String> {
		self.expect(b'(')?;
		let filter = match self.peek() {
			Some(b'&') => {
				self.position += 1;
				Filter::And(self.filter_list()?)
			}
			Some(b'|') => {
				self.position += 1;
				Filter::Or(self.filter_list()?)
			}
			Some(b'!') => {
				self.position += 1;
				Filter::Not(Box::new(self.filter()?))
			}
			_ => self.item()?,
		};
		self.expect(b')')?;
		Ok(filter)
	}

	/// Sub-filters of `&` and `|`
	fn filter_list(&mut self) -> Result<Vec<Filter>, String> {
		let mut filters = Vec::new();
		while self.peek() == Some(b'(') {
			filters.push(self.filter()?);
		}
		Ok(filters)
	}

	/// `attr op value`
	fn item(&mut self) -> Result<Filter, String> {
		let start = self.position;
		while let Some(byte) = self.peek() {
			if matches!(byte, b'=' | b'~' | b'>' | b'<' | b'(' | b')') {
				break;
			}
			self.position += 1;
		}
		let attribute = std::str::from_utf8(&self.input[start..self.position])
			.map_err(|_| "attribute name is not valid UTF-8".to_owned())?
			.trim()
			.to_owned();
		if attribute.is_empty() {
			return Err(format!("missing attribute name at offset {start}"));
		}
		if attribute.contains(':') {
			return Err("extensible match filters are not supported".to_owned());
		}

		let operator = match self.peek() {
			Some(b'=') => b'=',
			Some(op @ (b'~' | b'>' | b'<')) => {
				self.position += 1;
				op
			}
			_ => return Err(format!("missing operator after {attribute}")),
		};
		self.expect(b'=')?;

		let start = self.position;
		while let Some(byte) = self.peek() {
			if byte == b')' || byte == b'(' {
				break;
			}
			self.position += 1;
		}
		let raw = &self.input[start..self.position];

		Ok(match operator {
			b'~' => Filter::Approx(attribute, unescape(raw)?),
			b'>' => Filter::GreaterOrEqual(attribute, unescape(raw)?),
			b'<' => Filter::LessOrEqual(attribute, unescape(raw)?),
			_ if raw == b"*" => Filter::Present(attribute),
			_ if raw.contains(&b'*') => {
				let mut parts: Vec<&[u8]> = raw.split(|b| *b == b'*').collect();
				let last = parts.pop().filter(|p| !p.is_empty()).map(unescape).transpose()?;
				let initial = if parts.is_empty() { None } else { Some(parts.remove(0)) };
				let initial = initial.filter(|p| !p.is_empty()).map(unescape).transpose()?;
				let any = parts.into_iter().filter(|p| !p.is_empty()).map(unescape).collect::<Result<_, _>>()?;
				Filter::Substrings { attribute, initial, any, last }
			}
			_ => Filter::Equality(attribute, unescape(raw)?),
		})
	}
}

/// Resolve `\hh` escapes
fn unescape(raw: &[u8]) -> Result<Vec<u8>, String> {
	let mut out = Vec::with_capacity(raw.len());
	let mut i = 0;
	while i < raw.len() {
		if raw[i] == b'\\' {
			let byte = raw
				.get(i + 1..i + 3)
				.filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
				.and_then(|pair| std::str::from_utf8(pair).ok())
				.and_then(|pair| u8::from_str_radix(pair, 16).ok())
				.ok_or_else(|| "invalid escape sequence in filter value".to_owned())?;
			out.push(byte);
			i += 3;
		} else {
			out.push(raw[i]);
			i += 1;
		}
	}
	Ok(out)
}

/// A [`Filter`] bound to the schema used for value comparisons.
#[derive(Clone, Debug)]
pub struct FilterMatcher {
	/// The filter
	filter: Filter,
	/// Schema deciding the comparison rules per attribute type
	schema: Arc<Schema>,
}

impl FilterMatcher {
	/// Evaluate one (sub-)filter
	fn evaluate(&self, filter: &Filter, entry: &Entry) -> bool {
		match filter {
			Filter::And(filters) => filters.iter().all(|f| self.evaluate(f, entry)),
			Filter::Or(filters) => filters.iter().any(|f| self.evaluate(f, entry)),
			Filter::Not(filter) => !self.evaluate(filter, entry),
			Filter::Present(attribute) => self.values(entry, attribute).next().is_some(),
			Filter::Equality(attribute, assertion) => {
				let rule = self.rule(attribute);
				self.values(entry, attribute).any(|value| rule.compare(value, assertion) == Some(Ordering::Equal))
			}
			Filter::Approx(attribute, assertion) => {
				let squash = |v: &[u8]| {
					let text = String::from_utf8_lossy(v).to_lowercase();
					text.split_whitespace().collect::<String>()
				};
				let assertion = squash(assertion);
				self.values(entry, attribute).any(|value| squash(value) == assertion)
			}
			Filter::GreaterOrEqual(attribute, assertion) => {
				let rule = self.rule(attribute);
				self.values(entry, attribute)
					.any(|value| matches!(rule.compare(value, assertion), Some(Ordering::Greater | Ordering::Equal)))
			}
			Filter::LessOrEqual(attribute, assertion) => {
				let rule = self.rule(attribute);
				self.values(entry, attribute)
					.any(|value| matches!(rule.compare(value, assertion), Some(Ordering::Less | Ordering::Equal)))
			}
			Filter::Substrings { attribute, initial, any, last } => {
				let rule = self.rule(attribute);
				self.values(entry, attribute).any(|value| {
					let value = rule.normalize(value);
					let mut rest = value.as_slice();
					if let Some(initial) = initial {
						let initial = rule.normalize(initial);
						match rest.strip_prefix(initial.as_slice()) {
							Some(tail) => rest = tail,
							None => return false,
						}
					}
					for part in any {
						let part = rule.normalize(part);
						match find(rest, &part) {
							Some(index) => rest = &rest[index + part.len()..],
							None => return false,
						}
					}
					last.as_ref().map_or(true, |last| rest.ends_with(&rule.normalize(last)))
				})
			}
		}
	}

	/// All values of attributes of the given type, options ignored
	fn values<'a>(&'a self, entry: &'a Entry, attribute: &str) -> impl Iterator<Item = &'a [u8]> + 'a {
		let canonical = self.schema.canonical_name(attribute);
		entry
			.attributes()
			.iter()
			.filter(move |a| self.schema.canonical_name(a.description().attribute_type()) == canonical)
			.flat_map(|a| a.values().iter().map(Vec::as_slice))
	}

	/// Comparison rule for an attribute type
	fn rule(&self, attribute: &str) -> Rule {
		match self.schema.attribute_type(attribute).map(|a| a.syntax) {
			Some(Syntax::OctetString | Syntax::Binary) => Rule::Exact,
			Some(Syntax::Integer) => Rule::Integer,
			Some(Syntax::DistinguishedName) => Rule::Dn,
			_ => Rule::CaseIgnore,
		}
	}
}

impl Matcher for FilterMatcher {
	fn matches(&self, entry: &Entry) -> bool {
		self.evaluate(&self.filter, entry)
	}
}

/// How values are compared
#[derive(Clone, Copy, Debug)]
enum Rule {
	/// Byte for byte
	Exact,
	/// Case folded with collapsed whitespace
	CaseIgnore,
	/// As signed integers
	Integer,
	/// As distinguished names
	Dn,
}

impl Rule {
	/// Normalized bytes
	fn normalize(self, value: &[u8]) -> Vec<u8> {
		match self {
			Rule::Exact => value.to_vec(),
			_ => {
				let text = String::from_utf8_lossy(value);
				text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase().into_bytes()
			}
		}
	}

	/// Compare a stored value with an assertion value. `None` if they are not
	/// comparable.
	fn compare(self, value: &[u8], assertion: &[u8]) -> Option<Ordering> {
		let text = |v: &[u8]| std::str::from_utf8(v).ok().map(str::trim).map(str::to_owned);
		match self {
			Rule::Integer => {
				let value: i128 = text(value)?.parse().ok()?;
				let assertion: i128 = text(assertion)?.parse().ok()?;
				Some(value.cmp(&assertion))
			}
			Rule::Dn => {
				let value: Dn = text(value)?.parse().ok()?;
				let assertion: Dn = text(assertion)?.parse().ok()?;
				if value == assertion {
					Some(Ordering::Equal)
				} else {
					Some(value.sort_key().cmp(&assertion.sort_key()))
				}
			}
			Rule::Exact | Rule::CaseIgnore => Some(self.normalize(value).cmp(&self.normalize(assertion))),
		}
	}
}

/// Index of the first occurrence of `needle`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	if needle.is_empty() {
		return Some(0);
	}
	haystack.windows(needle.len()).position(|window| window == needle)
}
