//! Pluggable handling of rejected records and patch conflicts.
//!
//! Listeners decide whether a problem aborts the stream (return an error) or
//! is tolerated (return `Ok`).
use std::fmt;

use crate::{
	entry::Entry,
	error::{Error, Result},
	ldif::{change::ChangeRecord, record::LdifRecord},
};

/// Notified about records a reader could not or would not return.
pub trait RejectedLdifListener: fmt::Debug {
	/// The record violates the LDIF grammar. Aborts by default.
	fn handle_malformed_record(&mut self, record: &LdifRecord, message: &str) -> Result<()> {
		Err(Error::malformed(record.line_number, message))
	}

	/// The record was rejected by schema validation.
	fn handle_schema_validation_failure(&mut self, record: &LdifRecord, messages: &[String]) -> Result<()>;

	/// The record has schema warnings but is still returned.
	fn handle_schema_validation_warning(&mut self, record: &LdifRecord, messages: &[String]) -> Result<()> {
		tracing::warn!(
			"Schema warnings for record at line {}: {}",
			record.line_number,
			messages.join("; ")
		);
		Ok(())
	}

	/// The record was excluded by a filter.
	fn handle_skipped_record(&mut self, record: &LdifRecord, reason: &str) -> Result<()> {
		tracing::trace!("Skipping record at line {}: {reason}", record.line_number);
		Ok(())
	}
}

/// Aborts on malformed records, drops schema failures with a log message.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLdifListener;

impl RejectedLdifListener for DefaultLdifListener {
	fn handle_schema_validation_failure(&mut self, record: &LdifRecord, messages: &[String]) -> Result<()> {
		tracing::warn!(
			"Rejecting record {} at line {}: {}",
			record.first_line(),
			record.line_number,
			messages.join("; ")
		);
		Ok(())
	}
}

/// Aborts on malformed records and on schema failures.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailFastLdifListener;

impl RejectedLdifListener for FailFastLdifListener {
	fn handle_schema_validation_failure(&mut self, record: &LdifRecord, messages: &[String]) -> Result<()> {
		Err(Error::Rejected {
			dn: record.first_line().to_owned(),
			line: record.line_number,
			messages: messages.to_vec(),
		})
	}
}

/// Tolerates everything, malformed records included.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreAllLdifListener;

impl RejectedLdifListener for IgnoreAllLdifListener {
	fn handle_malformed_record(&mut self, record: &LdifRecord, message: &str) -> Result<()> {
		tracing::debug!("Ignoring malformed record at line {}: {message}", record.line_number);
		Ok(())
	}

	fn handle_schema_validation_failure(&mut self, record: &LdifRecord, messages: &[String]) -> Result<()> {
		tracing::debug!(
			"Ignoring rejected record at line {}: {}",
			record.line_number,
			messages.join("; ")
		);
		Ok(())
	}
}

/// Resolves conflicts while patching.
pub trait RejectedChangeRecordListener: fmt::Debug {
	/// An entry is about to be created where one already exists. Returns the
	/// entry to keep.
	fn handle_duplicate_entry(
		&mut self,
		change: &ChangeRecord,
		existing: Entry,
		duplicate: Entry,
	) -> Result<Entry>;

	/// A change cannot be applied, e.g. because its target does not exist.
	/// Returning `Ok` skips the change.
	fn handle_rejected_change_record(&mut self, change: &ChangeRecord, reason: &str) -> Result<()>;
}

/// Raises an error on every conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailFastPatchListener;

impl RejectedChangeRecordListener for FailFastPatchListener {
	fn handle_duplicate_entry(
		&mut self,
		change: &ChangeRecord,
		existing: Entry,
		_duplicate: Entry,
	) -> Result<Entry> {
		Err(Error::conflict(
			change.dn(),
			format!("the entry {} already exists", existing.dn()),
		))
	}

	fn handle_rejected_change_record(&mut self, change: &ChangeRecord, reason: &str) -> Result<()> {
		Err(Error::conflict(change.dn(), reason))
	}
}

/// Replaces existing entries on duplicates and skips changes that cannot be
/// applied.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverwritePatchListener;

impl RejectedChangeRecordListener for OverwritePatchListener {
	fn handle_duplicate_entry(
		&mut self,
		_change: &ChangeRecord,
		existing: Entry,
		duplicate: Entry,
	) -> Result<Entry> {
		tracing::debug!("Overwriting existing entry {}", existing.dn());
		Ok(duplicate)
	}

	fn handle_rejected_change_record(&mut self, change: &ChangeRecord, reason: &str) -> Result<()> {
		tracing::warn!("Ignoring change to {}: {reason}", change.dn());
		Ok(())
	}
}
