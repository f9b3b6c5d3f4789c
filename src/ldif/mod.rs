//! RFC 2849 LDIF reading and writing.
//!
//! Records are pulled one at a time from any [`std::io::BufRead`] and pushed
//! to any [`std::io::Write`]. The four traits in this module are the
//! streaming contracts shared by the LDIF implementations, the stream
//! operations in [`crate::diff`], [`crate::patch`] and [`crate::search`] and
//! the template based generator.

pub mod change;
mod change_reader;
mod change_writer;
pub mod entry_filter;
pub mod listener;
mod output;
mod reader;
mod record;
mod source;
pub(crate) mod value;
mod writer;

pub use self::{
	change::{ChangeRecord, Modification, ModificationType},
	change_reader::LdifChangeRecordReader,
	change_writer::LdifChangeRecordWriter,
	entry_filter::EntryFilter,
	listener::{RejectedChangeRecordListener, RejectedLdifListener},
	output::needs_base64,
	reader::LdifEntryReader,
	record::LdifRecord,
	writer::LdifEntryWriter,
};
use crate::{entry::Entry, error::Result};

/// A source of entries.
pub trait EntryReader {
	/// The next entry, `None` once the source is exhausted. Every call after
	/// the first `None` returns `None` again.
	fn read_entry(&mut self) -> Result<Option<Entry>>;
}

/// A sink for entries. Implementations buffer; call
/// [`flush`](EntryWriter::flush) when done.
pub trait EntryWriter {
	/// Write one entry
	fn write_entry(&mut self, entry: &Entry) -> Result<()>;

	/// Write a comment, if the format supports them
	fn write_comment(&mut self, comment: &str) -> Result<()>;

	/// Flush buffered output
	fn flush(&mut self) -> Result<()>;
}

/// A source of change records.
pub trait ChangeRecordReader {
	/// The next change record, `None` once the source is exhausted.
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>>;
}

/// A sink for change records.
pub trait ChangeRecordWriter {
	/// Write one change record
	fn write_change_record(&mut self, change: &ChangeRecord) -> Result<()>;

	/// Write a comment, if the format supports them
	fn write_comment(&mut self, comment: &str) -> Result<()>;

	/// Flush buffered output
	fn flush(&mut self) -> Result<()>;
}

impl<R: EntryReader + ?Sized> EntryReader for &mut R {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		(**self).read_entry()
	}
}

impl<R: EntryReader + ?Sized> EntryReader for Box<R> {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		(**self).read_entry()
	}
}

impl EntryReader for std::vec::IntoIter<Entry> {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		Ok(self.next())
	}
}

impl<W: EntryWriter + ?Sized> EntryWriter for &mut W {
	fn write_entry(&mut self, entry: &Entry) -> Result<()> {
		(**self).write_entry(entry)
	}

	fn write_comment(&mut self, comment: &str) -> Result<()> {
		(**self).write_comment(comment)
	}

	fn flush(&mut self) -> Result<()> {
		(**self).flush()
	}
}

impl EntryWriter for Vec<Entry> {
	fn write_entry(&mut self, entry: &Entry) -> Result<()> {
		self.push(entry.clone());
		Ok(())
	}

	fn write_comment(&mut self, _comment: &str) -> Result<()> {
		Ok(())
	}

	fn flush(&mut self) -> Result<()> {
		Ok(())
	}
}

impl<R: ChangeRecordReader + ?Sized> ChangeRecordReader for &mut R {
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
		(**self).read_change_record()
	}
}

impl<R: ChangeRecordReader + ?Sized> ChangeRecordReader for Box<R> {
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
		(**self).read_change_record()
	}
}

impl ChangeRecordReader for std::vec::IntoIter<ChangeRecord> {
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
		Ok(self.next())
	}
}

impl<W: ChangeRecordWriter + ?Sized> ChangeRecordWriter for &mut W {
	fn write_change_record(&mut self, change: &ChangeRecord) -> Result<()> {
		(**self).write_change_record(change)
	}

	fn write_comment(&mut self, comment: &str) -> Result<()> {
		(**self).write_comment(comment)
	}

	fn flush(&mut self) -> Result<()> {
		(**self).flush()
	}
}

impl ChangeRecordWriter for Vec<ChangeRecord> {
	fn write_change_record(&mut self, change: &ChangeRecord) -> Result<()> {
		self.push(change.clone());
		Ok(())
	}

	fn write_comment(&mut self, _comment: &str) -> Result<()> {
		Ok(())
	}

	fn flush(&mut self) -> Result<()> {
		Ok(())
	}
}

/// Copy every entry from `reader` to `writer` and flush. Returns the number of
/// entries read.
pub fn copy_entries(mut reader: impl EntryReader, mut writer: impl EntryWriter) -> Result<usize> {
	let mut count = 0;
	while let Some(entry) = reader.read_entry()? {
		writer.write_entry(&entry)?;
		count += 1;
	}
	writer.flush()?;
	Ok(count)
}

/// Copy every change record from `reader` to `writer` and flush. Returns the
/// number of records read.
pub fn copy_change_records(
	mut reader: impl ChangeRecordReader,
	mut writer: impl ChangeRecordWriter,
) -> Result<usize> {
	let mut count = 0;
	while let Some(change) = reader.read_change_record()? {
		writer.write_change_record(&change)?;
		count += 1;
	}
	writer.flush()?;
	Ok(count)
}
