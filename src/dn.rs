//! A small distinguished name model.
//!
//! Only what the LDIF codec and the generator need: parsing the string form
//! (RFC 4514 escapes included), rendering it back, parent/child navigation and
//! a normalized byte key whose ordering keeps every subtree contiguous.
use std::{fmt, str::FromStr};

use crate::error::Error;

/// A single `attribute=value` assertion of an RDN.
#[derive(Clone, Debug)]
pub struct Ava {
	/// The attribute type as written
	attribute: String,
	/// The unescaped attribute value
	value: String,
}

impl Ava {
	/// Create an assertion from an attribute type and an unescaped value
	pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
		Self { attribute: attribute.into(), value: value.into() }
	}

	/// The attribute type
	#[must_use]
	pub fn attribute(&self) -> &str {
		&self.attribute
	}

	/// The unescaped value
	#[must_use]
	pub fn value(&self) -> &str {
		&self.value
	}

	/// Normalized form used for comparisons, lower cased with inner whitespace
	/// collapsed.
	fn normalized(&self) -> String {
		format!("{}={}", self.attribute.to_lowercase(), normalize_value(&self.value))
	}
}

impl PartialEq for Ava {
	fn eq(&self, other: &Self) -> bool {
		self.normalized() == other.normalized()
	}
}

impl Eq for Ava {}

impl fmt::Display for Ava {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={}", self.attribute, ldap3::dn_escape(self.value.as_str()))
	}
}

/// A relative distinguished name, one or more assertions joined by `+`.
#[derive(Clone, Debug)]
pub struct Rdn {
	/// The assertions, in the order they were written
	avas: Vec<Ava>,
}

impl Rdn {
	/// Single valued RDN
	pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
		Self { avas: vec![Ava::new(attribute, value)] }
	}

	/// Multi valued RDN. Returns `None` for an empty list.
	#[must_use]
	pub fn from_avas(avas: Vec<Ava>) -> Option<Self> {
		(!avas.is_empty()).then_some(Self { avas })
	}

	/// The assertions of this RDN
	#[must_use]
	pub fn avas(&self) -> &[Ava] {
		&self.avas
	}

	/// Sorted, normalized assertions so `a=1+b=2` equals `b=2+a=1`.
	fn normalized(&self) -> String {
		let mut avas: Vec<String> = self.avas.iter().map(Ava::normalized).collect();
		avas.sort_unstable();
		avas.join("+")
	}
}

impl PartialEq for Rdn {
	fn eq(&self, other: &Self) -> bool {
		self.normalized() == other.normalized()
	}
}

impl Eq for Rdn {}

impl fmt::Display for Rdn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, ava) in self.avas.iter().enumerate() {
			if i > 0 {
				f.write_str("+")?;
			}
			write!(f, "{ava}")?;
		}
		Ok(())
	}
}

impl FromStr for Rdn {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let dn: Dn = s.parse()?;
		match <[Rdn; 1]>::try_from(dn.rdns) {
			Ok([rdn]) => Ok(rdn),
			Err(_) => Err(Error::InvalidDn {
				dn: s.to_owned(),
				message: "expected exactly one RDN".to_owned(),
			}),
		}
	}
}

/// A distinguished name. RDNs are stored leaf first, the way they are written.
#[derive(Clone, Debug, Default)]
pub struct Dn {
	/// RDNs, most specific first
	rdns: Vec<Rdn>,
}

impl Dn {
	/// The root DN (empty string)
	#[must_use]
	pub fn root() -> Self {
		Self::default()
	}

	/// Whether this is the root DN
	#[must_use]
	pub fn is_root(&self) -> bool {
		self.rdns.is_empty()
	}

	/// Number of RDNs
	#[must_use]
	pub fn size(&self) -> usize {
		self.rdns.len()
	}

	/// The RDNs, most specific first
	#[must_use]
	pub fn rdns(&self) -> &[Rdn] {
		&self.rdns
	}

	/// The most specific RDN, `None` for the root DN
	#[must_use]
	pub fn rdn(&self) -> Option<&Rdn> {
		self.rdns.first()
	}

	/// The parent DN, `None` for the root DN
	#[must_use]
	pub fn parent(&self) -> Option<Dn> {
		(!self.is_root()).then(|| Dn { rdns: self.rdns[1..].to_vec() })
	}

	/// A new DN naming a child of this one
	#[must_use]
	pub fn child(&self, rdn: Rdn) -> Dn {
		let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
		rdns.push(rdn);
		rdns.extend(self.rdns.iter().cloned());
		Dn { rdns }
	}

	/// The DN made of the `count` most specific RDNs
	#[must_use]
	pub fn leading(&self, count: usize) -> Dn {
		Dn { rdns: self.rdns.iter().take(count).cloned().collect() }
	}

	/// The DN made of the `count` least specific RDNs
	#[must_use]
	pub fn trailing(&self, count: usize) -> Dn {
		let skip = self.rdns.len().saturating_sub(count);
		Dn { rdns: self.rdns[skip..].to_vec() }
	}

	/// Whether this DN equals `other` or lies below it
	#[must_use]
	pub fn is_in_subtree_of(&self, other: &Dn) -> bool {
		self.rdns.len() >= other.rdns.len()
			&& self.rdns[self.rdns.len() - other.rdns.len()..] == other.rdns[..]
	}

	/// Whether this DN is the direct child of `other`
	#[must_use]
	pub fn is_child_of(&self, other: &Dn) -> bool {
		self.rdns.len() == other.rdns.len() + 1 && self.is_in_subtree_of(other)
	}

	/// Replace the `old_base` suffix of this DN with `new_base`. Returns `None`
	/// if this DN is not in the subtree of `old_base`.
	#[must_use]
	pub fn rebase(&self, old_base: &Dn, new_base: &Dn) -> Option<Dn> {
		if !self.is_in_subtree_of(old_base) {
			return None;
		}
		let keep = self.rdns.len() - old_base.rdns.len();
		let mut rdns = self.rdns[..keep].to_vec();
		rdns.extend(new_base.rdns.iter().cloned());
		Some(Dn { rdns })
	}

	/// Normalized key for sorted maps. RDNs are reversed (root first) and each
	/// is terminated by a NUL byte, so a subtree occupies one contiguous range
	/// of keys starting with its base's key. NUL and 0x01 bytes within an RDN
	/// are escaped as 0x01 0x01 and 0x01 0x02, keeping the terminator unique
	/// and the order of keys intact.
	#[must_use]
	pub fn sort_key(&self) -> Vec<u8> {
		let mut key = Vec::new();
		for rdn in self.rdns.iter().rev() {
			for byte in rdn.normalized().bytes() {
				match byte {
					0 | 1 => key.extend_from_slice(&[1, byte + 1]),
					_ => key.push(byte),
				}
			}
			key.push(0);
		}
		key
	}
}

impl PartialEq for Dn {
	fn eq(&self, other: &Self) -> bool {
		self.rdns == other.rdns
	}
}

impl Eq for Dn {}

impl fmt::Display for Dn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, rdn) in self.rdns.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{rdn}")?;
		}
		Ok(())
	}
}

impl FromStr for Dn {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = |message: &str| Error::InvalidDn { dn: s.to_owned(), message: message.to_owned() };
		if s.trim().is_empty() {
			return Ok(Dn::root());
		}

		let mut rdns = Vec::new();
		for raw_rdn in split_unescaped(s, &[',', ';']) {
			let mut avas = Vec::new();
			for raw_ava in split_unescaped(raw_rdn, &['+']) {
				let (attribute, value) =
					raw_ava.split_once('=').ok_or_else(|| invalid("missing '=' in RDN"))?;
				let attribute = attribute.trim();
				if attribute.is_empty() || attribute.contains('\\') {
					return Err(invalid("invalid attribute type"));
				}
				let value = unescape_value(trim_value(value)).map_err(invalid)?;
				avas.push(Ava::new(attribute, value));
			}
			rdns.push(Rdn { avas });
		}
		Ok(Dn { rdns })
	}
}

/// Split on separators that are neither escaped nor quoted.
fn split_unescaped<'a>(s: &'a str, separators: &[char]) -> Vec<&'a str> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut escaped = false;
	let mut quoted = false;
	for (i, c) in s.char_indices() {
		if escaped {
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == '"' {
			quoted = !quoted;
		} else if !quoted && separators.contains(&c) {
			parts.push(&s[start..i]);
			start = i + c.len_utf8();
		}
	}
	parts.push(&s[start..]);
	parts
}

/// Strip leading spaces and trailing spaces which are not escaped.
fn trim_value(value: &str) -> &str {
	let value = value.trim_start();
	let mut end = value.len();
	while value[..end].ends_with(' ') {
		let backslashes = value[..end - 1].bytes().rev().take_while(|b| *b == b'\\').count();
		if backslashes % 2 == 1 {
			break;
		}
		end -= 1;
	}
	&value[..end]
}

/// Resolve `\c` and `\hh` escapes and surrounding quotes.
fn unescape_value(value: &str) -> Result<String, &'static str> {
	let value = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
		Some(quoted) => quoted,
		None => value,
	};
	let bytes = value.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] != b'\\' {
			out.push(bytes[i]);
			i += 1;
			continue;
		}
		let next = *bytes.get(i + 1).ok_or("dangling escape character")?;
		let hex = bytes
			.get(i + 1..i + 3)
			.filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
			.and_then(|pair| std::str::from_utf8(pair).ok())
			.and_then(|pair| u8::from_str_radix(pair, 16).ok());
		if let Some(byte) = hex {
			out.push(byte);
			i += 3;
		} else {
			out.push(next);
			i += 2;
		}
	}
	String::from_utf8(out).map_err(|_| "escaped value is not valid UTF-8")
}

/// Case fold and collapse runs of inner whitespace.
fn normalize_value(value: &str) -> String {
	value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::{Dn, Rdn};

	#[test]
	fn parse_and_render() -> Result<(), Box<dyn std::error::Error>> {
		let dn: Dn = "cn=Doe\\, John+uid=jdoe , ou=People;dc=example,dc=com".parse()?;
		assert_eq!(dn.size(), 4, "Semicolons also separate RDNs");
		assert_eq!(dn.rdn().unwrap().avas().len(), 2, "Plus joins assertions");
		assert_eq!(dn.rdn().unwrap().avas()[0].value(), "Doe, John", "Escapes are resolved");
		assert_eq!(
			dn.to_string(),
			"cn=Doe\\2c John+uid=jdoe,ou=People,dc=example,dc=com",
			"Rendering escapes special characters"
		);
		assert_eq!(dn.to_string().parse::<Dn>()?, dn, "Rendered form parses back");
		Ok(())
	}

	#[test]
	fn hex_escapes_and_spaces() -> Result<(), Box<dyn std::error::Error>> {
		let dn: Dn = "cn=caf\\C3\\A9\\ ,dc=x".parse()?;
		assert_eq!(dn.rdn().unwrap().avas()[0].value(), "café ", "Escaped trailing space is kept");
		assert!("cn".parse::<Dn>().is_err(), "An RDN without '=' is invalid");
		assert!("".parse::<Dn>()?.is_root(), "The empty string is the root DN");
		Ok(())
	}

	#[test]
	fn comparisons_ignore_case() -> Result<(), Box<dyn std::error::Error>> {
		let a: Dn = "CN=Foo,DC=Example".parse()?;
		let b: Dn = "cn=foo,dc=example".parse()?;
		assert_eq!(a, b, "DNs compare case insensitively");
		assert_eq!(a.sort_key(), b.sort_key(), "Keys are normalized");
		assert_eq!("a=1+b=2".parse::<Rdn>()?, "b=2+a=1".parse::<Rdn>()?, "AVA order is irrelevant");
		Ok(())
	}

	#[test]
	fn navigation() -> Result<(), Box<dyn std::error::Error>> {
		let base: Dn = "ou=People,dc=example,dc=com".parse()?;
		let child = base.child(Rdn::new("uid", "user.0"));
		assert!(child.is_child_of(&base), "child() creates a direct child");
		assert!(child.is_in_subtree_of(&base), "Children are in the subtree");
		assert!(!base.is_in_subtree_of(&child), "Parents are not in the child's subtree");
		assert_eq!(child.parent().unwrap(), base, "parent() is the inverse of child()");
		assert_eq!(child.leading(2).to_string(), "uid=user.0,ou=People", "First RDNs");
		assert_eq!(child.trailing(2).to_string(), "dc=example,dc=com", "Last RDNs");

		let moved = child.rebase(&base, &"ou=Staff,dc=example,dc=com".parse()?).unwrap();
		assert_eq!(moved.to_string(), "uid=user.0,ou=Staff,dc=example,dc=com", "Rebase swaps suffix");
		Ok(())
	}

	#[test]
	fn subtree_keys_are_contiguous() -> Result<(), Box<dyn std::error::Error>> {
		let base: Dn = "ou=a,dc=x".parse()?;
		let child: Dn = "cn=z,ou=a,dc=x".parse()?;
		let sibling: Dn = "ou=a1,dc=x".parse()?;
		assert!(child.sort_key().starts_with(&base.sort_key()), "Subtree shares the base key prefix");
		assert!(!sibling.sort_key().starts_with(&base.sort_key()), "Similar names do not share it");
		assert!(base.sort_key() < child.sort_key(), "Parents sort before children");

		let nul_sibling: Dn = "ou=a\\00ou\\3dc,dc=x".parse()?;
		let nested: Dn = "ou=c,ou=a,dc=x".parse()?;
		assert_eq!(nul_sibling.rdn().unwrap().avas()[0].value(), "a\0ou=c");
		assert!(!nul_sibling.sort_key().starts_with(&base.sort_key()), "Escaped NUL does not end an RDN");
		assert_ne!(nul_sibling.sort_key(), nested.sort_key());
		assert!(nested.sort_key().starts_with(&base.sort_key()));
		Ok(())
	}
}
