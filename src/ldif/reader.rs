//! Reading entries from LDIF.
use std::{
	io::{BufRead, Cursor},
	sync::Arc,
};

use crate::{
	config::{ReaderConfig, SchemaValidationPolicy},
	entry::Entry,
	error::Result,
	ldif::{
		entry_filter::EntryFilter, listener::RejectedLdifListener, source::LdifSource, EntryReader,
	},
	schema::Schema,
};

/// Pulls [`Entry`]s out of LDIF content records.
///
/// Change records are not understood; use
/// [`LdifChangeRecordReader`](crate::ldif::LdifChangeRecordReader) for those.
/// The input is dropped as soon as it is exhausted.
#[derive(Debug)]
pub struct LdifEntryReader<R> {
	/// Records and their interpretation
	source: LdifSource<R>,
}

impl<R: BufRead> LdifEntryReader<R> {
	/// Read from `input` using [`Schema::core`], without schema checks or
	/// filters and with a [`DefaultLdifListener`](crate::ldif::listener::DefaultLdifListener)
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

	/// Set which schema checks are performed
	#[must_use]
	pub fn with_policy(mut self, policy: SchemaValidationPolicy) -> Self {
		self.source.set_policy(policy);
		self
	}

	/// Filter attributes, branches and entries
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

impl LdifEntryReader<Cursor<Vec<u8>>> {
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

impl<R: BufRead> EntryReader for LdifEntryReader<R> {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		self.source.read_with(|source, record| {
			let Some((dn, lines)) = source.read_dn(record)? else {
				return Ok(None);
			};
			source.build_entry(record, dn, lines)
		})
	}
}

impl<R: BufRead> Iterator for LdifEntryReader<R> {
	type Item = Result<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read_entry().transpose()
	}
}
