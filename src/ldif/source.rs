//! Record level parsing shared by the entry and change record readers.
use std::{io::BufRead, sync::Arc};

use crate::{
	config::{Action, SchemaValidationPolicy},
	dn::Dn,
	entry::{AttributeDescription, Entry},
	error::{Error, Result},
	ldif::{
		entry_filter::EntryFilter,
		listener::{DefaultLdifListener, RejectedLdifListener},
		record::{LdifRecord, RecordReader},
		value::Line,
	},
	schema::{Schema, SchemaCheck},
};

/// Records plus everything needed to turn them into entries.
#[derive(Debug)]
pub(crate) struct LdifSource<R> {
	/// Dropped once exhausted
	records: Option<RecordReader<R>>,
	/// The schema as supplied
	schema: Arc<Schema>,
	/// The schema in effect under `policy`
	effective_schema: Arc<Schema>,
	/// Schema checks to perform
	policy: SchemaValidationPolicy,
	/// Attribute, branch and entry filters
	pub(crate) filter: EntryFilter,
	/// Notified about anything not returned
	pub(crate) listener: Box<dyn RejectedLdifListener>,
}

impl<R: BufRead> LdifSource<R> {
	/// Read from `input` with the given schema, no checks and no filters
	pub(crate) fn new(input: R, schema: Arc<Schema>) -> Self {
		let policy = SchemaValidationPolicy::default();
		Self {
			records: Some(RecordReader::new(input)),
			effective_schema: schema.for_policy(&policy),
			filter: EntryFilter::new(schema.clone()),
			schema,
			policy,
			listener: Box::new(DefaultLdifListener),
		}
	}

	/// Replace the schema
	pub(crate) fn set_schema(&mut self, schema: Arc<Schema>) {
		self.effective_schema = schema.for_policy(&self.policy);
		self.schema = schema;
	}

	/// Replace the validation policy
	pub(crate) fn set_policy(&mut self, policy: SchemaValidationPolicy) {
		self.effective_schema = self.schema.for_policy(&policy);
		self.policy = policy;
	}

	/// The next record, `None` forever once the input is exhausted. Records
	/// the folder rejects are passed to the listener.
	fn next_record(&mut self) -> Result<Option<LdifRecord>> {
		loop {
			let Some(records) = self.records.as_mut() else {
				return Ok(None);
			};
			match records.next_record() {
				Ok(Some(record)) => return Ok(Some(record)),
				Ok(None) => {
					self.records = None;
					return Ok(None);
				}
				Err(Error::Malformed { line, message }) => {
					let record = LdifRecord { line_number: line, lines: Vec::new() };
					self.listener.handle_malformed_record(&record, &message)?;
				}
				Err(err) => return Err(err),
			}
		}
	}

	/// Parse records with `parse` until it produces an item. Malformed records
	/// are passed to the listener, which decides whether reading goes on.
	pub(crate) fn read_with<T>(
		&mut self,
		mut parse: impl FnMut(&mut Self, &LdifRecord) -> Result<Option<T>>,
	) -> Result<Option<T>> {
		while let Some(record) = self.next_record()? {
			match parse(self, &record) {
				Ok(Some(item)) => return Ok(Some(item)),
				Ok(None) => {}
				Err(Error::Malformed { message, .. }) => {
					self.listener.handle_malformed_record(&record, &message)?;
				}
				Err(err) => return Err(err),
			}
		}
		Ok(None)
	}

	/// The DN of a record and the lines following it, `None` for a record
	/// holding nothing but a version line. Records in excluded branches are
	/// reported as skipped and also yield `None`.
	pub(crate) fn read_dn<'r>(&mut self, record: &'r LdifRecord) -> Result<Option<(Dn, &'r [String])>> {
		let mut lines = record.lines.as_slice();
		if lines.first().is_some_and(|line| is_version_line(line)) {
			lines = &lines[1..];
		}
		let Some((first, rest)) = lines.split_first() else {
			return Ok(None);
		};
		let line = Line::parse(first, record.line_number)?;
		if !line.is("dn") {
			return Err(Error::malformed(
				record.line_number,
				format!("the first line \"{first}\" of the record does not contain a DN"),
			));
		}
		let dn = line.decode_dn(record.line_number)?;
		if self.filter.is_branch_excluded(&dn) {
			self.listener.handle_skipped_record(record, "the entry is in an excluded branch")?;
			return Ok(None);
		}
		Ok(Some((dn, rest)))
	}

	/// Build an entry from attribute lines, filter and validate it. Returns
	/// `None` if the entry was skipped or rejected.
	pub(crate) fn build_entry(&mut self, record: &LdifRecord, dn: Dn, lines: &[String]) -> Result<Option<Entry>> {
		let mut entry = Entry::new(dn);
		let mut check = SchemaCheck::default();
		for line in lines {
			self.add_attribute_value(&mut entry, line, record.line_number, &mut check)?;
		}

		if self.filter.is_entry_excluded(&entry) {
			self.listener.handle_skipped_record(record, "the entry does not pass the entry filters")?;
			return Ok(None);
		}

		check.merge(self.effective_schema.validate_entry(&entry, &self.policy));
		if !check.is_ok() {
			self.listener.handle_schema_validation_failure(record, &check.errors)?;
			return Ok(None);
		}
		if !check.warnings.is_empty() {
			self.listener.handle_schema_validation_warning(record, &check.warnings)?;
		}
		Ok(Some(entry))
	}

	/// Decode one attribute line into an entry, recording schema violations
	pub(crate) fn add_attribute_value(
		&self,
		entry: &mut Entry,
		text: &str,
		line_number: usize,
		check: &mut SchemaCheck,
	) -> Result<()> {
		let line = Line::parse(text, line_number)?;
		let mut description = parse_description(line.key, line_number)?;
		if self.filter.is_attribute_excluded(&description) {
			return Ok(());
		}
		let value = line.decode(line_number)?;
		let structure = self.policy.check_attributes_and_object_classes;
		let values = self.policy.check_attribute_values;

		let Some(attribute_type) = self.effective_schema.attribute_type(description.attribute_type()) else {
			check.push(
				structure,
				format!("entry {} has attribute {} which is not defined in the schema", entry.dn(), line.key),
			);
			entry.add_value(description, value);
			return Ok(());
		};

		if attribute_type.syntax.is_ber_encoding_required() {
			description = description.with_option("binary");
		} else if description.is_binary() {
			check.push(
				structure,
				format!(
					"entry {} has attribute {} with the binary option which its syntax does not allow",
					entry.dn(),
					line.key
				),
			);
		}

		if values != Action::Ignore {
			if let Err(message) = attribute_type.syntax.check(&value) {
				check.push(
					values,
					format!("entry {} has an invalid value for attribute {}: {message}", entry.dn(), line.key),
				);
			}
		}

		if !entry.add_value(description.clone(), value) {
			check.push(
				values,
				format!("entry {} has a duplicate value for attribute {}", entry.dn(), line.key),
			);
		} else if attribute_type.single_valued && entry.attribute(&description).is_some_and(|a| a.len() > 1) {
			check.push(
				values,
				format!("entry {} has multiple values for single valued attribute {}", entry.dn(), line.key),
			);
		}
		Ok(())
	}
}

/// Parse an attribute description, reporting failures as malformed records
pub(crate) fn parse_description(key: &str, line_number: usize) -> Result<AttributeDescription> {
	key.parse().map_err(|err: Error| Error::malformed(line_number, err.to_string()))
}

/// Whether a line is a `version:` line
fn is_version_line(line: &str) -> bool {
	Line::parse(line, 0).is_ok_and(|line| line.is("version"))
}
