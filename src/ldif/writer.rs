//! Writing entries as LDIF.
use std::{io::Write, sync::Arc};

use crate::{
	config::WriterConfig,
	entry::Entry,
	error::Result,
	ldif::{entry_filter::EntryFilter, output::LdifOutput, EntryWriter},
	schema::Schema,
};

/// Writes [`Entry`]s as LDIF content records.
///
/// Values which cannot be written verbatim are base64 encoded. Output is
/// buffered by the sink; call [`EntryWriter::flush`] or
/// [`close`](LdifEntryWriter::close) when done.
#[derive(Debug)]
pub struct LdifEntryWriter<W> {
	/// Line output
	output: LdifOutput<W>,
	/// Entries and attributes to leave out
	filter: EntryFilter,
}

impl<W: Write> LdifEntryWriter<W> {
	/// Write to `sink` without folding, comments or filters
	pub fn new(sink: W) -> Self {
		Self { output: LdifOutput::new(sink), filter: EntryFilter::default() }
	}

	/// Write to `sink` as configured
	pub fn from_config(sink: W, config: &WriterConfig, schema: Arc<Schema>) -> Result<Self> {
		Ok(Self::new(sink)
			.with_wrap_column(config.wrap_column)
			.with_user_friendly_comments(config.add_user_friendly_comments)
			.with_filter(EntryFilter::from_config(&config.filter, schema)?))
	}

	/// Fold lines longer than `wrap_column`. Values below 2 disable folding.
	#[must_use]
	pub fn with_wrap_column(mut self, wrap_column: usize) -> Self {
		self.output.set_wrap_column(wrap_column);
		self
	}

	/// Precede base64 encoded text with a readable comment
	#[must_use]
	pub fn with_user_friendly_comments(mut self, enabled: bool) -> Self {
		self.output.set_user_friendly_comments(enabled);
		self
	}

	/// Leave out filtered entries and attributes
	#[must_use]
	pub fn with_filter(mut self, filter: EntryFilter) -> Self {
		self.filter = filter;
		self
	}

	/// Flush and give back the sink
	pub fn close(mut self) -> Result<W> {
		self.output.flush()?;
		Ok(self.output.into_inner())
	}
}

/// Write the attribute lines of an entry, skipping filtered attributes
pub(crate) fn write_attributes<W: Write>(
	output: &mut LdifOutput<W>,
	filter: &EntryFilter,
	entry: &Entry,
) -> Result<()> {
	for attribute in entry.attributes() {
		if filter.is_attribute_excluded(attribute.description()) {
			continue;
		}
		let name = attribute.description().to_string();
		for value in attribute.values() {
			output.write_value(&name, value)?;
		}
	}
	Ok(())
}

impl<W: Write> EntryWriter for LdifEntryWriter<W> {
	fn write_entry(&mut self, entry: &Entry) -> Result<()> {
		if self.filter.is_branch_excluded(entry.dn()) || self.filter.is_entry_excluded(entry) {
			tracing::trace!("Not writing filtered entry {}", entry.dn());
			return Ok(());
		}
		self.output.write_value("dn", entry.dn().to_string().as_bytes())?;
		write_attributes(&mut self.output, &self.filter, entry)?;
		self.output.end_record()
	}

	fn write_comment(&mut self, comment: &str) -> Result<()> {
		self.output.write_comment(comment)
	}

	fn flush(&mut self) -> Result<()> {
		self.output.flush()
	}
}
