//! Writing change records as LDIF.
use std::{io::Write, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
	config::WriterConfig,
	error::Result,
	ldif::{
		change::ChangeRecord, entry_filter::EntryFilter, needs_base64, output::LdifOutput,
		writer::write_attributes, ChangeRecordWriter,
	},
	schema::Schema,
};

/// Writes [`ChangeRecord`]s as LDIF change records.
#[derive(Debug)]
pub struct LdifChangeRecordWriter<W> {
	/// Line output
	output: LdifOutput<W>,
	/// Changes and attributes to leave out
	filter: EntryFilter,
}

impl<W: Write> LdifChangeRecordWriter<W> {
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

	/// Leave out filtered changes and attributes
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

	/// Write the DN, the controls and the changetype line
	fn write_header(&mut self, change: &ChangeRecord, change_type: &str) -> Result<()> {
		self.output.write_value("dn", change.dn().to_string().as_bytes())?;
		for control in change.controls() {
			let mut line = format!("control: {} {}", control.ctype, control.crit);
			match &control.val {
				Some(value) if needs_base64(value) => {
					line.push_str(":: ");
					line.push_str(&STANDARD.encode(value));
				}
				Some(value) => {
					line.push_str(": ");
					line.push_str(&String::from_utf8_lossy(value));
				}
				None => {}
			}
			self.output.write_line(&line)?;
		}
		self.output.write_line(&format!("changetype: {change_type}"))
	}
}

impl<W: Write> ChangeRecordWriter for LdifChangeRecordWriter<W> {
	fn write_change_record(&mut self, change: &ChangeRecord) -> Result<()> {
		if self.filter.is_branch_excluded(change.dn()) {
			tracing::trace!("Not writing change to filtered entry {}", change.dn());
			return Ok(());
		}
		match change {
			ChangeRecord::Add { entry, .. } => {
				if self.filter.is_entry_excluded(entry) {
					tracing::trace!("Not writing filtered entry {}", entry.dn());
					return Ok(());
				}
				self.write_header(change, "add")?;
				write_attributes(&mut self.output, &self.filter, entry)?;
			}
			ChangeRecord::Delete { .. } => self.write_header(change, "delete")?,
			ChangeRecord::Modify { modifications, .. } => {
				self.write_header(change, "modify")?;
				for modification in modifications {
					let description = modification.attribute.description();
					if self.filter.is_attribute_excluded(description) {
						continue;
					}
					let name = description.to_string();
					self.output.write_line(&format!("{}: {name}", modification.modification_type))?;
					for value in modification.attribute.values() {
						self.output.write_value(&name, value)?;
					}
					self.output.write_line("-")?;
				}
			}
			ChangeRecord::ModifyDn { new_rdn, delete_old_rdn, new_superior, .. } => {
				// modrdn unless the entry moves
				let change_type = if new_superior.is_some() { "moddn" } else { "modrdn" };
				self.write_header(change, change_type)?;
				self.output.write_value("newrdn", new_rdn.to_string().as_bytes())?;
				self.output.write_line(if *delete_old_rdn { "deleteoldrdn: 1" } else { "deleteoldrdn: 0" })?;
				if let Some(superior) = new_superior {
					self.output.write_value("newsuperior", superior.to_string().as_bytes())?;
				}
			}
		}
		self.output.end_record()
	}

	fn write_comment(&mut self, comment: &str) -> Result<()> {
		self.output.write_comment(comment)
	}

	fn flush(&mut self) -> Result<()> {
		self.output.flush()
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use ldap3::controls::RawControl;

	use super::LdifChangeRecordWriter;
	use crate::{
		entry::{Attribute, Entry},
		ldif::{
			change::{ChangeRecord, Modification, ModificationType},
			ChangeRecordReader, ChangeRecordWriter, LdifChangeRecordReader,
		},
	};

	fn write(changes: &[ChangeRecord]) -> String {
		let mut writer = LdifChangeRecordWriter::new(Vec::new());
		for change in changes {
			writer.write_change_record(change).unwrap();
		}
		String::from_utf8(writer.close().unwrap()).unwrap()
	}

	fn sample() -> Result<Vec<ChangeRecord>, Box<dyn std::error::Error>> {
		Ok(vec![
			ChangeRecord::add(Entry::from_pairs("cn=a,dc=x", [("objectClass", "top"), ("cn", "a")])?),
			ChangeRecord::delete("cn=b,dc=x".parse()?).with_control(RawControl {
				ctype: "1.2.3".to_owned(),
				crit: true,
				val: Some(vec![0, 1]),
			}),
			ChangeRecord::modify(
				"cn=c,dc=x".parse()?,
				vec![
					Modification::new(ModificationType::Add, Attribute::with_values("mail".parse()?, ["c@x"])),
					Modification::new(ModificationType::Delete, Attribute::new("description".parse()?)),
				],
			),
			ChangeRecord::modify_dn("cn=d,dc=x".parse()?, "cn=e".parse()?, true, None),
			ChangeRecord::modify_dn("cn=d,dc=x".parse()?, "cn=d".parse()?, false, Some("ou=y,dc=x".parse()?)),
		])
	}

	#[test]
	fn layout() -> Result<(), Box<dyn std::error::Error>> {
		let text = write(&sample()?);
		let expected = "\
dn: cn=a,dc=x\nchangetype: add\nobjectClass: top\ncn: a\n\n\
dn: cn=b,dc=x\ncontrol: 1.2.3 true:: AAE=\nchangetype: delete\n\n\
dn: cn=c,dc=x\nchangetype: modify\nadd: mail\nmail: c@x\n-\ndelete: description\n-\n\n\
dn: cn=d,dc=x\nchangetype: modrdn\nnewrdn: cn=e\ndeleteoldrdn: 1\n\n\
dn: cn=d,dc=x\nchangetype: moddn\nnewrdn: cn=d\ndeleteoldrdn: 0\nnewsuperior: ou=y,dc=x\n\n";
		assert_eq!(text, expected);
		Ok(())
	}

	#[test]
	fn round_trip() -> Result<(), Box<dyn std::error::Error>> {
		let changes = sample()?;
		let text = write(&changes);
		let mut reader = LdifChangeRecordReader::new(text.as_bytes());
		for change in &changes {
			assert_eq!(reader.read_change_record()?.as_ref(), Some(change));
		}
		assert!(reader.read_change_record()?.is_none());
		Ok(())
	}
}
