//! Reading change records from LDIF.
use std::{
	io::{BufRead, Cursor},
	sync::Arc,
};

use ldap3::controls::RawControl;

use crate::{
	config::{ReaderConfig, SchemaValidationPolicy},
	dn::{Dn, Rdn},
	entry::Attribute,
	error::{Error, Result},
	ldif::{
		change::{ChangeRecord, Modification, ModificationType},
		entry_filter::EntryFilter,
		listener::RejectedLdifListener,
		record::LdifRecord,
		source::{parse_description, LdifSource},
		value::{decode_base64, read_url, Line},
		ChangeRecordReader,
	},
	schema::Schema,
};

/// Pulls [`ChangeRecord`]s out of LDIF change records.
///
/// Records without a `changetype` line are add requests, so plain content
/// records are read as well.
#[derive(Debug)]
pub struct LdifChangeRecordReader<R> {
	/// Records and their interpretation
	source: LdifSource<R>,
}

impl<R: BufRead> LdifChangeRecordReader<R> {
	/// Read from `input` using [`Schema::core`], without schema checks or
	/// filters
	pub fn new(input: R) -> Self {
		Self { source: LdifSource::new(input, Schema::core()) }
	}

	/// Read from `input` as configured
	pub fn from_config(input: R, config: &ReaderConfig, schema: Arc<Schema>) -> Result<Self> {
		let filter = EntryFilter::from_config(&config.filter, schema.clone())?;
		Ok(Self::new(input).with_schema(schema).with_policy(config.schema_validation).with_filter(filter))
	}

	/// Use a different schema
	#[must_use]
	pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
		self.source.set_schema(schema);
		self
	}

	/// Set which schema checks are performed on added entries
	#[must_use]
	pub fn with_policy(mut self, policy: SchemaValidationPolicy) -> Self {
		self.source.set_policy(policy);
		self
	}

	/// Filter attributes, branches and added entries
	#[must_use]
	pub fn with_filter(mut self, filter: EntryFilter) -> Self {
		self.source.filter = filter;
		self
	}

	/// Set the listener for rejected and skipped records
	#[must_use]
	pub fn with_listener(mut self, listener: impl RejectedLdifListener + 'static) -> Self {
		self.source.listener = Box::new(listener);
		self
	}
}

impl LdifChangeRecordReader<Cursor<Vec<u8>>> {
	/// Read from in-memory lines
	pub fn from_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Self {
		let mut text = String::new();
		for line in lines {
			text.push_str(line.as_ref());
			text.push('\n');
		}
		Self::new(Cursor::new(text.into_bytes()))
	}
}

impl<R: BufRead> ChangeRecordReader for LdifChangeRecordReader<R> {
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
		self.source.read_with(parse_change_record)
	}
}

impl<R: BufRead> Iterator for LdifChangeRecordReader<R> {
	type Item = Result<ChangeRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read_change_record().transpose()
	}
}

/// Interpret one record
fn parse_change_record<R: BufRead>(
	source: &mut LdifSource<R>,
	record: &LdifRecord,
) -> Result<Option<ChangeRecord>> {
	let line_number = record.line_number;
	let Some((dn, mut rest)) = source.read_dn(record)? else {
		return Ok(None);
	};

	let mut controls = Vec::new();
	while let Some((text, tail)) = rest.split_first() {
		let line = Line::parse(text, line_number)?;
		if !line.is("control") {
			break;
		}
		controls.push(parse_control(&line, line_number)?);
		rest = tail;
	}

	let mut change_type = "add".to_owned();
	if let Some((text, tail)) = rest.split_first() {
		let line = Line::parse(text, line_number)?;
		if line.is("changetype") {
			change_type = line.decode_text(line_number)?.trim().to_ascii_lowercase();
			rest = tail;
		}
	}

	let change = match change_type.as_str() {
		"add" => match source.build_entry(record, dn, rest)? {
			Some(entry) => ChangeRecord::Add { entry, controls },
			None => return Ok(None),
		},
		"delete" => {
			if let Some(text) = rest.first() {
				return Err(Error::malformed(
					line_number,
					format!("unexpected line \"{text}\" in the body of a delete change record"),
				));
			}
			ChangeRecord::Delete { dn, controls }
		}
		"modify" => {
			let modifications = parse_modifications(source, rest, line_number)?;
			ChangeRecord::Modify { dn, modifications, controls }
		}
		"moddn" | "modrdn" => parse_modify_dn(dn, controls, rest, line_number)?,
		other => {
			return Err(Error::malformed(
				line_number,
				format!(
					"the changetype \"{}\" must be one of add, delete, modify, moddn, modrdn",
					other.escape_debug()
				),
			))
		}
	};
	Ok(Some(change))
}

/// Parse the value of a `control:` line: `OID [true|false] [: value | ::
/// base64 | :< url]`
fn parse_control(line: &Line<'_>, line_number: usize) -> Result<RawControl> {
	let text = line.decode_text(line_number)?;
	let (head, value) = match text.split_once(':') {
		Some((head, tail)) => {
			let value = if let Some(encoded) = tail.strip_prefix(':') {
				decode_base64(encoded.trim_start(), line_number)?
			} else if let Some(url) = tail.strip_prefix('<') {
				read_url(url.trim_start(), line_number)?
			} else {
				tail.trim_start().as_bytes().to_vec()
			};
			(head, Some(value))
		}
		None => (text.as_str(), None),
	};

	let mut words = head.split_whitespace();
	let Some(oid) = words.next() else {
		return Err(Error::malformed(line_number, "control line without an OID"));
	};
	let crit = match words.next().map(str::to_ascii_lowercase).as_deref() {
		None | Some("false") => false,
		Some("true") => true,
		Some(other) => {
			return Err(Error::malformed(
				line_number,
				format!("the criticality \"{other}\" of control {oid} must be true or false"),
			))
		}
	};
	if let Some(extra) = words.next() {
		return Err(Error::malformed(line_number, format!("unexpected \"{extra}\" in control {oid}")));
	}
	Ok(RawControl { ctype: oid.to_owned(), crit, val: value })
}

/// Parse the `add:`, `delete:`, `replace:` and `increment:` blocks of a
/// modify record
fn parse_modifications<R: BufRead>(
	source: &LdifSource<R>,
	lines: &[String],
	line_number: usize,
) -> Result<Vec<Modification>> {
	let mut modifications = Vec::new();
	let mut lines = lines.iter();
	while let Some(text) = lines.next() {
		let line = Line::parse(text, line_number)?;
		let modification_type: ModificationType = line.key.parse().map_err(|_| {
			Error::malformed(
				line_number,
				format!(
					"the modification type \"{}\" must be one of add, delete, replace, increment",
					line.key
				),
			)
		})?;
		let description = parse_description(line.decode_text(line_number)?.trim(), line_number)?;

		let mut attribute = Attribute::new(description.clone());
		// a block ends at a dash or at the end of the record
		for text in lines.by_ref().take_while(|text| text.as_str() != "-") {
			let line = Line::parse(text, line_number)?;
			if parse_description(line.key, line_number)? != description {
				return Err(Error::malformed(
					line_number,
					format!(
						"attribute \"{}\" does not match \"{description}\" named by the modification",
						line.key
					),
				));
			}
			attribute.add(line.decode(line_number)?);
		}

		if modification_type == ModificationType::Increment && attribute.len() != 1 {
			return Err(Error::malformed(
				line_number,
				format!("increment of \"{description}\" needs exactly one value"),
			));
		}
		if source.filter.is_attribute_excluded(&description) {
			continue;
		}
		modifications.push(Modification::new(modification_type, attribute));
	}
	Ok(modifications)
}

/// Parse the body of a `moddn` or `modrdn` record
fn parse_modify_dn(
	dn: Dn,
	controls: Vec<RawControl>,
	lines: &[String],
	line_number: usize,
) -> Result<ChangeRecord> {
	let mut lines = lines.iter();
	let mut next = |keyword: &str, required: bool| -> Result<Option<String>> {
		match lines.next() {
			Some(text) => {
				let line = Line::parse(text, line_number)?;
				if !line.is(keyword) {
					return Err(Error::malformed(
						line_number,
						format!("expected \"{keyword}\" but found \"{text}\""),
					));
				}
				line.decode_text(line_number).map(Some)
			}
			None if required => {
				Err(Error::malformed(line_number, format!("the modify DN record is missing \"{keyword}\"")))
			}
			None => Ok(None),
		}
	};

	let new_rdn = next("newrdn", true)?.unwrap_or_default();
	let new_rdn: Rdn =
		new_rdn.parse().map_err(|err: Error| Error::malformed(line_number, err.to_string()))?;
	let delete_old_rdn = match next("deleteoldrdn", true)?.unwrap_or_default().trim().to_ascii_lowercase().as_str()
	{
		"0" | "false" | "no" => false,
		"1" | "true" | "yes" => true,
		other => {
			return Err(Error::malformed(
				line_number,
				format!("the value \"{other}\" of deleteoldrdn must be 0 or 1"),
			))
		}
	};
	let new_superior = match next("newsuperior", false)? {
		Some(text) => {
			Some(text.parse::<Dn>().map_err(|err| Error::malformed(line_number, err.to_string()))?)
		}
		None => None,
	};
	if let Some(text) = lines.next() {
		return Err(Error::malformed(line_number, format!("unexpected line \"{text}\" in a modify DN record")));
	}
	Ok(ChangeRecord::ModifyDn { dn, new_rdn, delete_old_rdn, new_superior, controls })
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::LdifChangeRecordReader;
	use crate::{
		entry::{Attribute, Entry},
		error::Error,
		ldif::{
			change::{ChangeRecord, Modification, ModificationType, SUBTREE_DELETE_OID},
			listener::IgnoreAllLdifListener,
			ChangeRecordReader, EntryFilter,
		},
		schema::Schema,
	};

	fn read_one(lines: &[&str]) -> Result<ChangeRecord, Error> {
		LdifChangeRecordReader::from_lines(lines).read_change_record().map(Option::unwrap)
	}

	#[test]
	fn add_records() -> Result<(), Box<dyn std::error::Error>> {
		let expected = Entry::from_pairs("cn=a,dc=x", [("objectClass", "top"), ("cn", "a")])?;
		let implicit = read_one(&["dn: cn=a,dc=x", "objectClass: top", "cn: a"])?;
		assert_eq!(implicit, ChangeRecord::add(expected.clone()), "changetype defaults to add");
		let explicit = read_one(&["dn: cn=a,dc=x", "changetype: ADD", "objectClass: top", "cn: a"])?;
		assert_eq!(explicit, ChangeRecord::add(expected));
		Ok(())
	}

	#[test]
	fn delete_with_controls() -> Result<(), Box<dyn std::error::Error>> {
		let change = read_one(&[
			"dn: ou=a,dc=x",
			"control: 1.2.840.113556.1.4.805 true",
			"control: 1.2.3.4 false:: AAE=",
			"control: 1.2.3.5: plain",
			"changetype: delete",
		])?;
		assert!(change.has_control(SUBTREE_DELETE_OID));
		let controls = change.controls();
		assert_eq!(controls.len(), 3);
		assert!(controls[0].crit && controls[0].val.is_none());
		assert_eq!((controls[1].crit, controls[1].val.as_deref()), (false, Some(&[0, 1][..])));
		assert_eq!(controls[2].val.as_deref(), Some(&b"plain"[..]));
		assert_eq!(change.dn().to_string(), "ou=a,dc=x");

		let body = read_one(&["dn: ou=a,dc=x", "changetype: delete", "cn: a"]);
		assert!(matches!(body, Err(Error::Malformed { .. })), "Deletes have no body");
		let criticality = read_one(&["dn: ou=a,dc=x", "control: 1.2.3 maybe", "changetype: delete"]);
		assert!(matches!(criticality, Err(Error::Malformed { .. })));
		Ok(())
	}

	#[test]
	fn modify_blocks() -> Result<(), Box<dyn std::error::Error>> {
		let change = read_one(&[
			"dn: cn=a,dc=x",
			"changetype: modify",
			"add: mail",
			"mail: a@x",
			"mail: b@x",
			"-",
			"delete: description",
			"-",
			"replace: sn",
			"sn: b",
			"-",
			"increment: uidNumber",
			"uidNumber: 5",
		])?;
		let ChangeRecord::Modify { modifications, .. } = &change else {
			panic!("Not a modify request: {change:?}");
		};
		let expected = [
			Modification::new(ModificationType::Add, Attribute::with_values("mail".parse()?, ["a@x", "b@x"])),
			Modification::new(ModificationType::Delete, Attribute::new("description".parse()?)),
			Modification::new(ModificationType::Replace, Attribute::with_values("sn".parse()?, ["b"])),
			Modification::new(ModificationType::Increment, Attribute::with_values("uidNumber".parse()?, ["5"])),
		];
		assert_eq!(modifications, &expected, "A missing final dash is tolerated");

		let mismatch = read_one(&["dn: cn=a", "changetype: modify", "add: mail", "cn: a", "-"]);
		assert!(matches!(mismatch, Err(Error::Malformed { .. })));
		let unknown = read_one(&["dn: cn=a", "changetype: modify", "append: mail", "mail: a", "-"]);
		assert!(matches!(unknown, Err(Error::Malformed { .. })));
		Ok(())
	}

	#[test]
	fn modify_dn() -> Result<(), Box<dyn std::error::Error>> {
		let rename = read_one(&["dn: cn=a,dc=x", "changetype: modrdn", "newrdn: cn=b", "deleteoldrdn: 1"])?;
		assert_eq!(rename, ChangeRecord::modify_dn("cn=a,dc=x".parse()?, "cn=b".parse()?, true, None));

		let moved = read_one(&[
			"dn: cn=a,dc=x",
			"changetype: moddn",
			"newrdn: cn=a",
			"deleteoldrdn: 0",
			"newsuperior: ou=y,dc=x",
		])?;
		assert_eq!(moved.new_dn(), Some("cn=a,ou=y,dc=x".parse()?));

		let missing = read_one(&["dn: cn=a,dc=x", "changetype: modrdn", "newrdn: cn=b"]);
		assert!(matches!(missing, Err(Error::Malformed { .. })));
		let bad_flag = read_one(&["dn: cn=a,dc=x", "changetype: modrdn", "newrdn: cn=b", "deleteoldrdn: 2"]);
		assert!(matches!(bad_flag, Err(Error::Malformed { .. })));
		Ok(())
	}

	#[test]
	fn invalid_change_types() {
		let err = read_one(&["dn: cn=a", "changetype: modif\0"]).unwrap_err();
		assert!(
			err.to_string().contains("must be one of add, delete, modify, moddn, modrdn"),
			"Unexpected message: {err}"
		);

		let mut reader = LdifChangeRecordReader::from_lines([
			"dn: cn=a",
			"changetype: rename",
			"",
			"dn: cn=b",
			"changetype: delete",
		])
		.with_listener(IgnoreAllLdifListener);
		assert_eq!(reader.read_change_record().unwrap(), Some(ChangeRecord::delete("cn=b".parse().unwrap())));
	}

	#[test]
	fn filtered_modifications() -> Result<(), Box<dyn std::error::Error>> {
		let filter = EntryFilter::new(Schema::core()).exclude_attribute("userPassword");
		let mut reader = LdifChangeRecordReader::from_lines([
			"dn: cn=a",
			"changetype: modify",
			"replace: userPassword",
			"userPassword: secret",
			"-",
			"replace: sn",
			"sn: b",
			"-",
		])
		.with_filter(filter);
		let Some(ChangeRecord::Modify { modifications, .. }) = reader.read_change_record()? else {
			panic!("Not a modify request");
		};
		assert_eq!(modifications.len(), 1);
		assert!(modifications[0].attribute.description().is_type("sn"));
		Ok(())
	}
}
