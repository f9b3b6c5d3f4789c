//! A minimal schema service.
//!
//! Knows attribute types (syntax, multiplicity, usage) and object classes
//! (superior, required and allowed attributes), checks values against their
//! syntax and validates whole entries against a [`SchemaValidationPolicy`].
//! Schemas are passed explicitly; [`Schema::core`] is the process wide
//! default used by convenience constructors.
use std::{
	collections::{HashMap, HashSet},
	sync::{Arc, OnceLock},
};

use time::PrimitiveDateTime;

use crate::{
	config::{Action, SchemaValidationPolicy, TIME_FORMAT, TIME_FORMAT_FRACTION},
	dn::Dn,
	entry::Entry,
};

/// Attribute value syntaxes known to the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
	/// UTF-8 text, must not be empty
	DirectoryString,
	/// ASCII text
	Ia5String,
	/// Decimal integer
	Integer,
	/// `TRUE` or `FALSE`
	Boolean,
	/// A distinguished name
	DistinguishedName,
	/// Generalized time, e.g. `20240101120000Z`
	GeneralizedTime,
	/// A numeric OID or a descriptor
	Oid,
	/// Telephone number in printable characters
	TelephoneNumber,
	/// Arbitrary bytes
	OctetString,
	/// Arbitrary bytes which have to be transferred with the `binary` option
	Binary,
}

impl Syntax {
	/// Whether values of this syntax require the `binary` transfer option
	#[must_use]
	pub fn is_ber_encoding_required(self) -> bool {
		self == Syntax::Binary
	}

	/// Check whether a value is acceptable for this syntax
	pub fn check(self, value: &[u8]) -> Result<(), String> {
		let text = || std::str::from_utf8(value).map_err(|_| "value is not valid UTF-8".to_owned());
		match self {
			Syntax::OctetString | Syntax::Binary => Ok(()),
			Syntax::DirectoryString => match text()? {
				"" => Err("value must not be empty".to_owned()),
				_ => Ok(()),
			},
			Syntax::Ia5String => {
				if value.is_ascii() {
					Ok(())
				} else {
					Err("value contains non-ASCII characters".to_owned())
				}
			}
			Syntax::Integer => {
				let text = text()?;
				let digits = text.strip_prefix('-').unwrap_or(text);
				let valid = !digits.is_empty()
					&& digits.bytes().all(|b| b.is_ascii_digit())
					&& (digits == "0" || !digits.starts_with('0'))
					&& text != "-0";
				if valid {
					Ok(())
				} else {
					Err(format!("\"{text}\" is not a valid integer"))
				}
			}
			Syntax::Boolean => match text()? {
				"TRUE" | "FALSE" => Ok(()),
				other => Err(format!("\"{other}\" is not TRUE or FALSE")),
			},
			Syntax::DistinguishedName => {
				text()?.parse::<Dn>().map(|_| ()).map_err(|err| err.to_string())
			}
			Syntax::GeneralizedTime => {
				let text = text()?;
				PrimitiveDateTime::parse(text, &TIME_FORMAT)
					.or_else(|_| PrimitiveDateTime::parse(text, &TIME_FORMAT_FRACTION))
					.map(|_| ())
					.map_err(|err| format!("\"{text}\" is not a generalized time: {err}"))
			}
			Syntax::Oid => {
				let text = text()?;
				if is_numeric_oid(text) || is_descriptor(text) {
					Ok(())
				} else {
					Err(format!("\"{text}\" is not an OID"))
				}
			}
			Syntax::TelephoneNumber => {
				let text = text()?;
				let printable = |c: char| c.is_ascii_alphanumeric() || " '()+,-./:?".contains(c);
				if !text.is_empty() && text.chars().all(printable) {
					Ok(())
				} else {
					Err(format!("\"{text}\" is not a telephone number"))
				}
			}
		}
	}
}

/// `1.2.3` style OID
fn is_numeric_oid(text: &str) -> bool {
	!text.is_empty() && text.split('.').all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// `name-1` style descriptor
fn is_descriptor(text: &str) -> bool {
	let mut chars = text.chars();
	chars.next().is_some_and(|c| c.is_ascii_alphabetic())
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// An attribute type definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeType {
	/// Primary name
	pub name: String,
	/// Alternative names
	pub aliases: Vec<String>,
	/// Numeric OID
	pub oid: String,
	/// Value syntax
	pub syntax: Syntax,
	/// At most one value allowed
	pub single_valued: bool,
	/// Maintained by the server rather than users
	pub operational: bool,
	/// Synthesized for an unknown name by a non-strict schema
	pub placeholder: bool,
}

impl AttributeType {
	/// A multi valued user attribute type
	pub fn new(name: impl Into<String>, oid: impl Into<String>, syntax: Syntax) -> Self {
		Self {
			name: name.into(),
			aliases: Vec::new(),
			oid: oid.into(),
			syntax,
			single_valued: false,
			operational: false,
			placeholder: false,
		}
	}

	/// Add an alternative name
	#[must_use]
	pub fn alias(mut self, alias: &str) -> Self {
		self.aliases.push(alias.to_owned());
		self
	}

	/// Mark as single valued
	#[must_use]
	pub fn single_valued(mut self) -> Self {
		self.single_valued = true;
		self
	}

	/// Mark as operational
	#[must_use]
	pub fn operational(mut self) -> Self {
		self.operational = true;
		self
	}

	/// Placeholder for a name the schema does not know
	fn placeholder(name: &str) -> Self {
		Self {
			placeholder: true,
			..Self::new(name, format!("{}-oid", name.to_lowercase()), Syntax::OctetString)
		}
	}

	/// Whether the name or OID designates this type
	#[must_use]
	pub fn has_name(&self, name: &str) -> bool {
		self.name.eq_ignore_ascii_case(name)
			|| self.oid == name
			|| self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
	}
}

/// Kind of an object class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectClassKind {
	/// Only used as superior
	Abstract,
	/// Defines what an entry is
	Structural,
	/// Mixed into entries
	Auxiliary,
}

/// An object class definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectClass {
	/// Name
	pub name: String,
	/// Superior class, if any
	pub superior: Option<String>,
	/// Kind
	pub kind: ObjectClassKind,
	/// Required attribute types
	pub must: Vec<String>,
	/// Allowed attribute types
	pub may: Vec<String>,
}

impl ObjectClass {
	/// An object class without attributes
	pub fn new(name: impl Into<String>, superior: Option<&str>, kind: ObjectClassKind) -> Self {
		Self {
			name: name.into(),
			superior: superior.map(str::to_owned),
			kind,
			must: Vec::new(),
			may: Vec::new(),
		}
	}

	/// Set the required attribute types
	#[must_use]
	pub fn must(mut self, attributes: &[&str]) -> Self {
		self.must = attributes.iter().map(|a| (*a).to_owned()).collect();
		self
	}

	/// Set the allowed attribute types
	#[must_use]
	pub fn may(mut self, attributes: &[&str]) -> Self {
		self.may = attributes.iter().map(|a| (*a).to_owned()).collect();
		self
	}
}

/// Messages produced by [`Schema::validate_entry`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaCheck {
	/// Violations under a [`Action::Reject`] policy
	pub errors: Vec<String>,
	/// Violations under a [`Action::Warn`] policy
	pub warnings: Vec<String>,
}

impl SchemaCheck {
	/// Record a violation at the given severity
	pub fn push(&mut self, action: Action, message: String) {
		match action {
			Action::Reject => self.errors.push(message),
			Action::Warn => self.warnings.push(message),
			Action::Ignore => {}
		}
	}

	/// Whether no errors were recorded
	#[must_use]
	pub fn is_ok(&self) -> bool {
		self.errors.is_empty()
	}

	/// Append the messages of another check
	pub fn merge(&mut self, other: SchemaCheck) {
		self.errors.extend(other.errors);
		self.warnings.extend(other.warnings);
	}
}

/// A set of attribute types and object classes.
#[derive(Clone, Debug)]
pub struct Schema {
	/// Attribute types by lower cased name, alias and OID
	attribute_types: HashMap<String, Arc<AttributeType>>,
	/// Object classes by lower cased name
	object_classes: HashMap<String, Arc<ObjectClass>>,
	/// Whether unknown attribute types are rejected rather than synthesized
	strict: bool,
}

impl Schema {
	/// A strict schema without any definitions
	#[must_use]
	pub fn empty() -> Self {
		Self { attribute_types: HashMap::new(), object_classes: HashMap::new(), strict: true }
	}

	/// The process wide default schema, holding the common user schema
	/// (`inetOrgPerson` and friends) and a few operational attributes.
	///
	/// Only convenience constructors use it; everything else takes the schema
	/// as a parameter.
	pub fn core() -> Arc<Schema> {
		/// Lazily built default
		static CORE: OnceLock<Arc<Schema>> = OnceLock::new();
		CORE.get_or_init(|| Arc::new(core_schema())).clone()
	}

	/// Add an attribute type definition
	#[must_use]
	pub fn with_attribute_type(mut self, attribute_type: AttributeType) -> Self {
		let attribute_type = Arc::new(attribute_type);
		let names = std::iter::once(&attribute_type.name)
			.chain(&attribute_type.aliases)
			.chain(std::iter::once(&attribute_type.oid));
		for name in names {
			self.attribute_types.insert(name.to_lowercase(), attribute_type.clone());
		}
		self
	}

	/// Add an object class definition
	#[must_use]
	pub fn with_object_class(mut self, object_class: ObjectClass) -> Self {
		self.object_classes.insert(object_class.name.to_lowercase(), Arc::new(object_class));
		self
	}

	/// Whether unknown attribute types are rejected
	#[must_use]
	pub fn is_strict(&self) -> bool {
		self.strict
	}

	/// A copy of this schema which synthesizes placeholder definitions for
	/// unknown attribute types
	#[must_use]
	pub fn as_non_strict(&self) -> Schema {
		Schema { strict: false, ..self.clone() }
	}

	/// The schema to use under a policy: unchanged if the policy checks
	/// attributes, a non-strict copy if it ignores them
	#[must_use]
	pub fn for_policy(self: &Arc<Self>, policy: &SchemaValidationPolicy) -> Arc<Schema> {
		if policy.is_lenient() && self.strict {
			Arc::new(self.as_non_strict())
		} else {
			self.clone()
		}
	}

	/// Look up an attribute type by name, alias or OID. A non-strict schema
	/// never returns `None`.
	#[must_use]
	pub fn attribute_type(&self, name: &str) -> Option<Arc<AttributeType>> {
		match self.attribute_types.get(&name.to_lowercase()) {
			Some(attribute_type) => Some(attribute_type.clone()),
			None if self.strict => None,
			None => Some(Arc::new(AttributeType::placeholder(name))),
		}
	}

	/// Look up an object class by name
	#[must_use]
	pub fn object_class(&self, name: &str) -> Option<Arc<ObjectClass>> {
		self.object_classes.get(&name.to_lowercase()).cloned()
	}

	/// Lower cased primary name for an attribute type name or alias
	#[must_use]
	pub fn canonical_name(&self, name: &str) -> String {
		match self.attribute_types.get(&name.to_lowercase()) {
			Some(attribute_type) => attribute_type.name.to_lowercase(),
			None => name.to_lowercase(),
		}
	}

	/// Whether an attribute type is operational
	#[must_use]
	pub fn is_operational(&self, name: &str) -> bool {
		self.attribute_types.get(&name.to_lowercase()).is_some_and(|a| a.operational)
	}

	/// Validate object classes, required and allowed attributes of an entry.
	///
	/// Value syntax and multiplicity are checked by the reader as lines are
	/// decoded and are not repeated here.
	#[must_use]
	pub fn validate_entry(&self, entry: &Entry, policy: &SchemaValidationPolicy) -> SchemaCheck {
		let mut check = SchemaCheck::default();
		let action = policy.check_attributes_and_object_classes;
		if action == Action::Ignore {
			return check;
		}

		let names: Vec<&str> =
			entry.attributes_of_type("objectClass").flat_map(|a| a.str_values()).collect();
		if names.is_empty() {
			check.push(action, format!("entry {} has no object classes", entry.dn()));
			return check;
		}

		let mut classes = Vec::new();
		let mut all_known = true;
		for name in names {
			match self.object_class(name) {
				Some(class) => self.collect_superiors(class, &mut classes),
				None => {
					all_known = false;
					check.push(action, format!("entry {} has unknown object class {name}", entry.dn()));
				}
			}
		}

		let present: HashSet<String> = entry
			.attributes()
			.iter()
			.map(|a| self.canonical_name(a.description().attribute_type()))
			.collect();

		let mut allowed: HashSet<String> = HashSet::from(["objectclass".to_owned()]);
		for class in &classes {
			for required in &class.must {
				let required = self.canonical_name(required);
				if !present.contains(&required) {
					check.push(
						action,
						format!(
							"entry {} is missing attribute {required} required by object class {}",
							entry.dn(),
							class.name
						),
					);
				}
				allowed.insert(required);
			}
			allowed.extend(class.may.iter().map(|a| self.canonical_name(a)));
		}

		let extensible = classes.iter().any(|c| c.name.eq_ignore_ascii_case("extensibleObject"));
		if all_known && !extensible {
			for attribute in entry.attributes() {
				let name = attribute.description().attribute_type();
				if self.is_operational(name) {
					continue;
				}
				if !allowed.contains(&self.canonical_name(name)) {
					check.push(
						action,
						format!("entry {} has attribute {name} not allowed by its object classes", entry.dn()),
					);
				}
			}
		}
		check
	}

	/// Add a class and its superiors, each once
	fn collect_superiors(&self, class: Arc<ObjectClass>, into: &mut Vec<Arc<ObjectClass>>) {
		let mut next = Some(class);
		while let Some(class) = next.take() {
			if into.iter().any(|c| c.name == class.name) {
				break;
			}
			next = class.superior.as_deref().and_then(|s| self.object_class(s));
			into.push(class);
		}
	}
}

impl Default for Schema {
	fn default() -> Self {
		Schema::empty()
	}
}

/// Definitions for the default schema
fn core_schema() -> Schema {
	use ObjectClassKind::{Abstract, Auxiliary, Structural};
	use Syntax::{
		Binary, Boolean, DirectoryString, DistinguishedName, GeneralizedTime, Ia5String, Integer,
		OctetString, Oid, TelephoneNumber,
	};

	let attribute_types = [
		AttributeType::new("objectClass", "2.5.4.0", Oid),
		AttributeType::new("cn", "2.5.4.3", DirectoryString).alias("commonName"),
		AttributeType::new("sn", "2.5.4.4", DirectoryString).alias("surname"),
		AttributeType::new("c", "2.5.4.6", DirectoryString).alias("countryName").single_valued(),
		AttributeType::new("l", "2.5.4.7", DirectoryString).alias("localityName"),
		AttributeType::new("st", "2.5.4.8", DirectoryString).alias("stateOrProvinceName"),
		AttributeType::new("street", "2.5.4.9", DirectoryString).alias("streetAddress"),
		AttributeType::new("o", "2.5.4.10", DirectoryString).alias("organizationName"),
		AttributeType::new("ou", "2.5.4.11", DirectoryString).alias("organizationalUnitName"),
		AttributeType::new("title", "2.5.4.12", DirectoryString),
		AttributeType::new("description", "2.5.4.13", DirectoryString),
		AttributeType::new("postalAddress", "2.5.4.16", DirectoryString),
		AttributeType::new("postalCode", "2.5.4.17", DirectoryString),
		AttributeType::new("telephoneNumber", "2.5.4.20", TelephoneNumber),
		AttributeType::new("facsimileTelephoneNumber", "2.5.4.23", TelephoneNumber),
		AttributeType::new("member", "2.5.4.31", DistinguishedName),
		AttributeType::new("owner", "2.5.4.32", DistinguishedName),
		AttributeType::new("seeAlso", "2.5.4.34", DistinguishedName),
		AttributeType::new("userPassword", "2.5.4.35", OctetString),
		AttributeType::new("userCertificate", "2.5.4.36", Binary),
		AttributeType::new("givenName", "2.5.4.42", DirectoryString).alias("gn"),
		AttributeType::new("initials", "2.5.4.43", DirectoryString),
		AttributeType::new("uniqueMember", "2.5.4.50", DistinguishedName),
		AttributeType::new("uid", "0.9.2342.19200300.100.1.1", DirectoryString).alias("userid"),
		AttributeType::new("mail", "0.9.2342.19200300.100.1.3", Ia5String).alias("rfc822Mailbox"),
		AttributeType::new("roomNumber", "0.9.2342.19200300.100.1.6", DirectoryString),
		AttributeType::new("manager", "0.9.2342.19200300.100.1.10", DistinguishedName),
		AttributeType::new("homePhone", "0.9.2342.19200300.100.1.20", TelephoneNumber),
		AttributeType::new("dc", "0.9.2342.19200300.100.1.25", Ia5String)
			.alias("domainComponent")
			.single_valued(),
		AttributeType::new("mobile", "0.9.2342.19200300.100.1.41", TelephoneNumber),
		AttributeType::new("pager", "0.9.2342.19200300.100.1.42", TelephoneNumber),
		AttributeType::new("jpegPhoto", "0.9.2342.19200300.100.1.60", OctetString),
		AttributeType::new("departmentNumber", "2.16.840.1.113730.3.1.2", DirectoryString),
		AttributeType::new("employeeNumber", "2.16.840.1.113730.3.1.3", DirectoryString)
			.single_valued(),
		AttributeType::new("employeeType", "2.16.840.1.113730.3.1.4", DirectoryString),
		AttributeType::new("preferredLanguage", "2.16.840.1.113730.3.1.39", DirectoryString)
			.single_valued(),
		AttributeType::new("displayName", "2.16.840.1.113730.3.1.241", DirectoryString)
			.single_valued(),
		AttributeType::new("uidNumber", "1.3.6.1.1.1.1.0", Integer).single_valued(),
		AttributeType::new("gidNumber", "1.3.6.1.1.1.1.1", Integer).single_valued(),
		AttributeType::new("gecos", "1.3.6.1.1.1.1.2", Ia5String).single_valued(),
		AttributeType::new("homeDirectory", "1.3.6.1.1.1.1.3", Ia5String).single_valued(),
		AttributeType::new("loginShell", "1.3.6.1.1.1.1.4", Ia5String).single_valued(),
		AttributeType::new("createTimestamp", "2.5.18.1", GeneralizedTime).single_valued().operational(),
		AttributeType::new("modifyTimestamp", "2.5.18.2", GeneralizedTime).single_valued().operational(),
		AttributeType::new("creatorsName", "2.5.18.3", DistinguishedName).single_valued().operational(),
		AttributeType::new("modifiersName", "2.5.18.4", DistinguishedName).single_valued().operational(),
		AttributeType::new("hasSubordinates", "2.5.18.9", Boolean).single_valued().operational(),
		AttributeType::new("subschemaSubentry", "2.5.18.10", DistinguishedName)
			.single_valued()
			.operational(),
		AttributeType::new("entryUUID", "1.3.6.1.1.16.4", DirectoryString).single_valued().operational(),
		AttributeType::new("entryDN", "1.3.6.1.1.20", DistinguishedName).single_valued().operational(),
	];

	let person_may = ["userPassword", "telephoneNumber", "seeAlso", "description"];
	let org_may = [
		"userPassword",
		"seeAlso",
		"telephoneNumber",
		"facsimileTelephoneNumber",
		"street",
		"postalAddress",
		"postalCode",
		"st",
		"l",
		"description",
	];
	let group_may = ["description", "o", "ou", "owner", "seeAlso"];
	let object_classes = [
		ObjectClass::new("top", None, Abstract).must(&["objectClass"]),
		ObjectClass::new("person", Some("top"), Structural).must(&["sn", "cn"]).may(&person_may),
		ObjectClass::new("organizationalPerson", Some("person"), Structural).may(&[
			"title",
			"ou",
			"street",
			"postalAddress",
			"postalCode",
			"st",
			"l",
			"facsimileTelephoneNumber",
		]),
		ObjectClass::new("inetOrgPerson", Some("organizationalPerson"), Structural).may(&[
			"departmentNumber",
			"displayName",
			"employeeNumber",
			"employeeType",
			"givenName",
			"homePhone",
			"initials",
			"jpegPhoto",
			"mail",
			"manager",
			"mobile",
			"o",
			"pager",
			"preferredLanguage",
			"roomNumber",
			"uid",
			"userCertificate",
		]),
		ObjectClass::new("organization", Some("top"), Structural).must(&["o"]).may(&org_may),
		ObjectClass::new("organizationalUnit", Some("top"), Structural).must(&["ou"]).may(&org_may),
		ObjectClass::new("domain", Some("top"), Structural).must(&["dc"]).may(&org_may),
		ObjectClass::new("dcObject", Some("top"), Auxiliary).must(&["dc"]),
		ObjectClass::new("groupOfNames", Some("top"), Structural)
			.must(&["member", "cn"])
			.may(&group_may),
		ObjectClass::new("groupOfUniqueNames", Some("top"), Structural)
			.must(&["uniqueMember", "cn"])
			.may(&group_may),
		ObjectClass::new("uidObject", Some("top"), Auxiliary).must(&["uid"]),
		ObjectClass::new("posixAccount", Some("top"), Auxiliary)
			.must(&["cn", "uid", "uidNumber", "gidNumber", "homeDirectory"])
			.may(&["userPassword", "loginShell", "gecos", "description"]),
		ObjectClass::new("extensibleObject", Some("top"), Auxiliary),
	];

	let schema = attribute_types.into_iter().fold(Schema::empty(), Schema::with_attribute_type);
	object_classes.into_iter().fold(schema, Schema::with_object_class)
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::{Schema, Syntax};
	use crate::{
		config::{Action, SchemaValidationPolicy},
		entry::Entry,
	};

	#[test]
	fn syntax_checks() {
		assert!(Syntax::Integer.check(b"-42").is_ok());
		assert!(Syntax::Integer.check(b"042").is_err(), "Leading zeros are not allowed");
		assert!(Syntax::Boolean.check(b"true").is_err(), "Booleans are upper case");
		assert!(Syntax::GeneralizedTime.check(b"20130516200520Z").is_ok());
		assert!(Syntax::GeneralizedTime.check(b"yesterday").is_err());
		assert!(Syntax::Ia5String.check("é".as_bytes()).is_err());
		assert!(Syntax::DistinguishedName.check(b"cn=a,dc=x").is_ok());
		assert!(Syntax::DistinguishedName.check(b"nonsense").is_err());
		assert!(Syntax::TelephoneNumber.check(b"+1 555 555 0100").is_ok());
		assert!(Syntax::Oid.check(b"2.5.4.3").is_ok());
		assert!(Syntax::Oid.check(b"inetOrgPerson").is_ok());
		assert!(Syntax::OctetString.check(&[0xff, 0x00]).is_ok());
		assert!(Syntax::Binary.is_ber_encoding_required());
	}

	#[test]
	fn lookups() {
		let schema = Schema::core();
		assert!(schema.is_strict(), "The core schema is strict");
		assert_eq!(schema.attribute_type("commonName").unwrap().name, "cn", "Aliases resolve");
		assert_eq!(schema.attribute_type("2.5.4.3").unwrap().name, "cn", "OIDs resolve");
		assert!(schema.attribute_type("fooBar").is_none(), "Unknown types are rejected");
		assert!(schema.is_operational("createTimestamp"));

		let lenient = schema.as_non_strict();
		let placeholder = lenient.attribute_type("fooBar").unwrap();
		assert!(placeholder.placeholder, "Non-strict schemas synthesize definitions");
		assert_eq!(placeholder.syntax, Syntax::OctetString);

		let policy = SchemaValidationPolicy::ignore_all();
		assert!(!schema.for_policy(&policy).is_strict(), "Ignoring checks implies leniency");
		assert!(schema.for_policy(&SchemaValidationPolicy::reject_all()).is_strict());
	}

	#[test]
	fn validate_entry() -> Result<(), Box<dyn std::error::Error>> {
		let schema = Schema::core();
		let policy = SchemaValidationPolicy::reject_all();

		let valid = Entry::from_pairs(
			"uid=jdoe,dc=example",
			[("objectClass", "top"), ("objectClass", "inetOrgPerson"), ("uid", "jdoe"), ("cn", "J"), ("sn", "D")],
		)?;
		assert!(schema.validate_entry(&valid, &policy).is_ok(), "A complete person is valid");

		let missing = Entry::from_pairs("cn=x,dc=example", [("objectClass", "person"), ("cn", "x")])?;
		let check = schema.validate_entry(&missing, &policy);
		assert_eq!(check.errors.len(), 1, "Only sn is missing");
		assert!(check.errors[0].contains("sn"), "The message names the attribute");

		let extra = Entry::from_pairs(
			"ou=x,dc=example",
			[("objectClass", "organizationalUnit"), ("ou", "x"), ("mail", "a@b")],
		)?;
		assert!(!schema.validate_entry(&extra, &policy).is_ok(), "mail is not allowed");

		let warn = SchemaValidationPolicy {
			check_attributes_and_object_classes: Action::Warn,
			..policy
		};
		let check = schema.validate_entry(&extra, &warn);
		assert!(check.is_ok() && check.warnings.len() == 1, "Warnings do not reject");

		let extensible = Entry::from_pairs(
			"ou=x,dc=example",
			[("objectClass", "organizationalUnit"), ("objectClass", "extensibleObject"), ("ou", "x"), ("mail", "a@b")],
		)?;
		assert!(schema.validate_entry(&extensible, &policy).is_ok(), "extensibleObject allows anything");
		Ok(())
	}
}
