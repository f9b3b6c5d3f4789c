//! Directory entries, their attributes and helpers for extracting data.
use std::{
	cmp::Ordering,
	fmt,
	hash::{Hash, Hasher},
	str::FromStr,
};

use crate::{dn::Dn, error::Error};

/// An attribute type plus its options, e.g. `userCertificate;binary`.
///
/// Comparison ignores case and the order of options.
#[derive(Clone, Debug)]
pub struct AttributeDescription {
	/// The attribute type name or OID, as written
	attribute_type: String,
	/// Options following the type, as written
	options: Vec<String>,
}

impl AttributeDescription {
	/// Description without options
	pub fn new(attribute_type: impl Into<String>) -> Self {
		Self { attribute_type: attribute_type.into(), options: Vec::new() }
	}

	/// The same description with an additional option. Options already
	/// present are not duplicated.
	#[must_use]
	pub fn with_option(mut self, option: &str) -> Self {
		if !self.has_option(option) {
			self.options.push(option.to_owned());
		}
		self
	}

	/// The same description without the given option
	#[must_use]
	pub fn without_option(mut self, option: &str) -> Self {
		self.options.retain(|o| !o.eq_ignore_ascii_case(option));
		self
	}

	/// The attribute type part
	#[must_use]
	pub fn attribute_type(&self) -> &str {
		&self.attribute_type
	}

	/// The options
	#[must_use]
	pub fn options(&self) -> &[String] {
		&self.options
	}

	/// Whether the description carries the option
	#[must_use]
	pub fn has_option(&self, option: &str) -> bool {
		self.options.iter().any(|o| o.eq_ignore_ascii_case(option))
	}

	/// Whether the `binary` transfer option is present
	#[must_use]
	pub fn is_binary(&self) -> bool {
		self.has_option("binary")
	}

	/// Whether the type part matches, ignoring case and options
	#[must_use]
	pub fn is_type(&self, attribute_type: &str) -> bool {
		self.attribute_type.eq_ignore_ascii_case(attribute_type)
	}

	/// Case folded type and sorted case folded options
	fn key(&self) -> (String, Vec<String>) {
		let mut options: Vec<String> = self.options.iter().map(|o| o.to_lowercase()).collect();
		options.sort_unstable();
		(self.attribute_type.to_lowercase(), options)
	}
}

impl PartialEq for AttributeDescription {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for AttributeDescription {}

impl Hash for AttributeDescription {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

impl PartialOrd for AttributeDescription {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AttributeDescription {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}

impl fmt::Display for AttributeDescription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.attribute_type)?;
		for option in &self.options {
			write!(f, ";{option}")?;
		}
		Ok(())
	}
}

impl FromStr for AttributeDescription {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parts = s.split(';');
		let attribute_type = parts.next().unwrap_or_default();
		let valid = |part: &str| {
			!part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
		};
		if !valid(attribute_type) {
			return Err(Error::Invalid(s.to_owned()));
		}
		let mut description = AttributeDescription::new(attribute_type);
		for option in parts {
			if !valid(option) {
				return Err(Error::Invalid(s.to_owned()));
			}
			description = description.with_option(option);
		}
		Ok(description)
	}
}

/// An attribute description with its ordered, duplicate free values.
#[derive(Clone, Debug)]
pub struct Attribute {
	/// The attribute description
	description: AttributeDescription,
	/// The values, compared byte for byte
	values: Vec<Vec<u8>>,
}

impl Attribute {
	/// An attribute without values
	#[must_use]
	pub fn new(description: AttributeDescription) -> Self {
		Self { description, values: Vec::new() }
	}

	/// An attribute holding the given values, duplicates dropped
	pub fn with_values<V: Into<Vec<u8>>>(
		description: AttributeDescription,
		values: impl IntoIterator<Item = V>,
	) -> Self {
		let mut attribute = Self::new(description);
		for value in values {
			attribute.add(value.into());
		}
		attribute
	}

	/// The attribute description
	#[must_use]
	pub fn description(&self) -> &AttributeDescription {
		&self.description
	}

	/// The values in insertion order
	#[must_use]
	pub fn values(&self) -> &[Vec<u8>] {
		&self.values
	}

	/// Values which are valid UTF-8
	pub fn str_values(&self) -> impl Iterator<Item = &str> {
		self.values.iter().filter_map(|v| std::str::from_utf8(v).ok())
	}

	/// Number of values
	#[must_use]
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Whether there are no values
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Whether the value is present
	#[must_use]
	pub fn contains(&self, value: &[u8]) -> bool {
		self.values.iter().any(|v| v == value)
	}

	/// Add a value. Returns `false` if it was already present.
	pub fn add(&mut self, value: Vec<u8>) -> bool {
		if self.contains(&value) {
			return false;
		}
		self.values.push(value);
		true
	}

	/// Remove a value. Returns `false` if it was not present.
	pub fn remove(&mut self, value: &[u8]) -> bool {
		let before = self.values.len();
		self.values.retain(|v| v != value);
		before != self.values.len()
	}

	/// Whether both hold the same set of values, regardless of order
	fn same_values(&self, other: &Attribute) -> bool {
		self.values.len() == other.values.len() && self.values.iter().all(|v| other.contains(v))
	}
}

/// A directory entry: a DN plus ordered attributes.
#[derive(Clone, Debug, Default)]
pub struct Entry {
	/// The distinguished name
	dn: Dn,
	/// Attributes in insertion order, unique by description
	attributes: Vec<Attribute>,
}

impl Entry {
	/// An entry without attributes
	#[must_use]
	pub fn new(dn: Dn) -> Self {
		Self { dn, attributes: Vec::new() }
	}

	/// Convenience constructor parsing a DN and a list of `(attribute, value)`
	/// pairs.
	pub fn from_pairs<'a>(
		dn: &str,
		pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
	) -> Result<Self, Error> {
		let mut entry = Entry::new(dn.parse()?);
		for (attribute, value) in pairs {
			entry.add_value(attribute.parse()?, value.as_bytes().to_vec());
		}
		Ok(entry)
	}

	/// The distinguished name
	#[must_use]
	pub fn dn(&self) -> &Dn {
		&self.dn
	}

	/// Change the distinguished name
	pub fn set_dn(&mut self, dn: Dn) {
		self.dn = dn;
	}

	/// All attributes in insertion order
	#[must_use]
	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	/// The attribute with exactly this description
	#[must_use]
	pub fn attribute(&self, description: &AttributeDescription) -> Option<&Attribute> {
		self.attributes.iter().find(|a| &a.description == description)
	}

	/// Attributes of the given type, whatever their options
	pub fn attributes_of_type<'a>(
		&'a self,
		attribute_type: &'a str,
	) -> impl Iterator<Item = &'a Attribute> + 'a {
		self.attributes.iter().filter(move |a| a.description.is_type(attribute_type))
	}

	/// Whether any attribute of the given type is present
	#[must_use]
	pub fn has_attribute(&self, attribute_type: &str) -> bool {
		self.attributes_of_type(attribute_type).next().is_some()
	}

	/// Add one value, creating the attribute if needed. Returns `false` if the
	/// value was already present.
	pub fn add_value(&mut self, description: AttributeDescription, value: Vec<u8>) -> bool {
		match self.attributes.iter_mut().find(|a| a.description == description) {
			Some(attribute) => attribute.add(value),
			None => {
				let mut attribute = Attribute::new(description);
				attribute.add(value);
				self.attributes.push(attribute);
				true
			}
		}
	}

	/// Merge the values of an attribute into the entry
	pub fn add_attribute(&mut self, attribute: Attribute) {
		if attribute.is_empty() {
			return;
		}
		match self.attributes.iter_mut().find(|a| a.description == attribute.description) {
			Some(existing) => {
				for value in attribute.values {
					existing.add(value);
				}
			}
			None => self.attributes.push(attribute),
		}
	}

	/// Replace the values of an attribute. An attribute without values removes
	/// the attribute entirely.
	pub fn replace_attribute(&mut self, attribute: Attribute) {
		let position = self.attributes.iter().position(|a| a.description == attribute.description);
		match (position, attribute.is_empty()) {
			(Some(index), true) => {
				self.attributes.remove(index);
			}
			(Some(index), false) => self.attributes[index] = attribute,
			(None, true) => {}
			(None, false) => self.attributes.push(attribute),
		}
	}

	/// Remove an attribute entirely
	pub fn remove_attribute(&mut self, description: &AttributeDescription) -> Option<Attribute> {
		let index = self.attributes.iter().position(|a| &a.description == description)?;
		Some(self.attributes.remove(index))
	}

	/// Remove single values. Removing the last value removes the attribute.
	/// Returns `false` if the attribute or any of the values was missing.
	pub fn remove_values(&mut self, description: &AttributeDescription, values: &[Vec<u8>]) -> bool {
		let Some(index) = self.attributes.iter().position(|a| &a.description == description) else {
			return false;
		};
		let attribute = &mut self.attributes[index];
		let mut all_present = true;
		for value in values {
			all_present &= attribute.remove(value);
		}
		if attribute.is_empty() {
			self.attributes.remove(index);
		}
		all_present
	}

	/// Drop all values, keeping the attribute descriptions
	pub(crate) fn clear_values(&mut self) {
		for attribute in &mut self.attributes {
			attribute.values.clear();
		}
	}

	/// Keep only attributes for which the predicate holds
	pub fn retain_attributes(&mut self, keep: impl FnMut(&Attribute) -> bool) {
		self.attributes.retain(keep);
	}
}

impl PartialEq for Attribute {
	fn eq(&self, other: &Self) -> bool {
		self.description == other.description && self.same_values(other)
	}
}

impl Eq for Attribute {}

impl PartialEq for Entry {
	fn eq(&self, other: &Self) -> bool {
		self.dn == other.dn
			&& self.attributes.len() == other.attributes.len()
			&& self.attributes.iter().all(|attribute| {
				other.attribute(&attribute.description).is_some_and(|o| attribute.same_values(o))
			})
	}
}

impl Eq for Entry {}

/// Shorthands for reading single values, e.g. in filters passed to
/// [`EntryFilter::exclude_matching`](crate::ldif::entry_filter::EntryFilter::exclude_matching).
pub trait EntryExt {
	/// Get the first value of an attribute. Will return `None` if attribute
	/// value is not valid UTF-8.
	fn attr_first(&self, attr: &str) -> Option<&str>;

	/// Get the first value of an attribute, in binary form
	fn bin_attr_first(&self, attr: &str) -> Option<&[u8]>;
}

impl EntryExt for Entry {
	fn attr_first(&self, attr: &str) -> Option<&str> {
		std::str::from_utf8(self.bin_attr_first(attr)?).ok()
	}

	fn bin_attr_first(&self, attr: &str) -> Option<&[u8]> {
		let description = attr.parse().ok()?;
		self.attribute(&description)?.values().first().map(Vec::as_slice)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::{Attribute, AttributeDescription, Entry, EntryExt};
	use crate::error::Error;

	#[test]
	fn descriptions() -> Result<(), Box<dyn std::error::Error>> {
		let a: AttributeDescription = "userCertificate;Binary;lang-en".parse()?;
		let b: AttributeDescription = "USERCERTIFICATE;lang-EN;binary".parse()?;
		assert_eq!(a, b, "Case and option order are ignored");
		assert!(a.is_binary(), "The binary option is detected");
		assert_eq!(a.to_string(), "userCertificate;Binary;lang-en", "Rendering keeps the written form");
		let err = "bad name".parse::<AttributeDescription>().unwrap_err();
		assert!(matches!(&err, Error::Invalid(name) if name == "bad name"), "Spaces are not allowed");
		assert_eq!(err.to_string(), "Invalid attribute description or modification type \"bad name\"");
		assert!("cn;".parse::<AttributeDescription>().is_err(), "Empty options are not allowed");
		Ok(())
	}

	#[test]
	fn values_are_duplicate_free() -> Result<(), Box<dyn std::error::Error>> {
		let mut entry = Entry::new("cn=a,dc=x".parse()?);
		assert!(entry.add_value("cn".parse()?, b"a".to_vec()), "First value is added");
		assert!(!entry.add_value("CN".parse()?, b"a".to_vec()), "Duplicate value is rejected");
		assert!(entry.add_value("cn".parse()?, b"A".to_vec()), "Values compare byte for byte");
		assert_eq!(entry.attributes().len(), 1, "Descriptions are merged");

		assert!(entry.remove_values(&"cn".parse()?, &[b"a".to_vec(), b"A".to_vec()]));
		assert!(!entry.has_attribute("cn"), "Removing the last value removes the attribute");
		Ok(())
	}

	#[test]
	fn equality_is_unordered() -> Result<(), Box<dyn std::error::Error>> {
		let a = Entry::from_pairs("cn=a,dc=x", [("cn", "a"), ("objectClass", "top"), ("cn", "b")])?;
		let b = Entry::from_pairs("CN=A,DC=X", [("objectclass", "top"), ("cn", "b"), ("cn", "a")])?;
		assert_eq!(a, b, "Attribute and value order do not matter");

		let mut c = b.clone();
		c.replace_attribute(Attribute::with_values("cn".parse()?, ["a"]));
		assert_ne!(a, c, "Value sets must match");
		c.replace_attribute(Attribute::new("cn".parse()?));
		assert!(!c.has_attribute("cn"), "Replacing with no values removes the attribute");
		Ok(())
	}

	#[test]
	fn first_values() -> Result<(), Box<dyn std::error::Error>> {
		let mut entry = Entry::from_pairs("uid=foo,dc=x", [("uid", "foo"), ("mail", "a@x"), ("mail", "b@x")])?;
		entry.add_value("jpegPhoto".parse()?, vec![0xff, 0xd8]);

		assert_eq!(entry.attr_first("UID"), Some("foo"), "Names are case insensitive");
		assert_eq!(entry.attr_first("mail"), Some("a@x"), "The first value is returned");
		assert_eq!(entry.attr_first("jpegPhoto"), None, "Binary values are not text");
		assert_eq!(entry.bin_attr_first("jpegPhoto"), Some(&[0xff, 0xd8][..]));
		assert_eq!(entry.attr_first("cn"), None);
		assert_eq!(entry.attr_first("not an attribute"), None, "Invalid names are absent");
		Ok(())
	}
}
