//! Differences between two entry streams as change records.
//!
//! Both inputs are read into memory before the first change record is
//! produced, so this is meant for moderately sized data sets.
use std::{
	collections::{btree_map, BTreeMap},
	iter::Peekable,
	sync::{Arc, OnceLock},
};

use crate::{
	entry::{Attribute, AttributeDescription, Entry},
	error::Result,
	ldif::{
		change::{ChangeRecord, Modification, ModificationType},
		ChangeRecordReader, EntryReader, EntryWriter, LdifEntryReader, LdifEntryWriter,
	},
	schema::Schema,
};

/// Entries as LDIF bytes, ordered by normalized DN
type EncodedEntries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Compute the change records that turn `source` into `target`.
///
/// Entries only in `source` become delete requests, entries only in `target`
/// add requests and entries in both modify requests. A modify request is
/// produced for every common DN, even if the entries are equal.
pub fn diff_entries(source: impl EntryReader, target: impl EntryReader) -> Result<DiffChangeRecords> {
	let source = encode_all(source)?;
	let target = encode_all(target)?;
	tracing::debug!("Comparing {} source with {} target entries", source.len(), target.len());
	Ok(DiffChangeRecords { source: source.into_iter().peekable(), target: target.into_iter().peekable() })
}

/// Read and encode every entry of a stream
fn encode_all(mut reader: impl EntryReader) -> Result<EncodedEntries> {
	let mut entries = BTreeMap::new();
	while let Some(entry) = reader.read_entry()? {
		let mut writer = LdifEntryWriter::new(Vec::new());
		writer.write_entry(&entry)?;
		if entries.insert(entry.dn().sort_key(), writer.close()?).is_some() {
			tracing::warn!("Duplicate entry {}, keeping the last one", entry.dn());
		}
	}
	Ok(entries)
}

/// Decode an entry encoded by [`encode_all`]
fn decode(encoded: &[u8]) -> Result<Entry> {
	/// Keeps attribute descriptions exactly as encoded
	static VERBATIM: OnceLock<Arc<Schema>> = OnceLock::new();
	let schema = VERBATIM.get_or_init(|| Arc::new(Schema::empty().as_non_strict())).clone();
	let entry = LdifEntryReader::new(encoded).with_schema(schema).read_entry()?;
	Ok(entry.unwrap_or_default())
}

/// The modifications turning `from` into `to`, ordered by attribute
/// description. Within an attribute added values come before deleted ones.
#[must_use]
pub fn diff_attributes(from: &Entry, to: &Entry) -> Vec<Modification> {
	let mut descriptions: Vec<&AttributeDescription> =
		from.attributes().iter().chain(to.attributes()).map(Attribute::description).collect();
	descriptions.sort();
	descriptions.dedup();

	let mut modifications = Vec::new();
	for description in descriptions {
		match (from.attribute(description), to.attribute(description)) {
			(Some(old), None) => modifications.push(Modification::new(ModificationType::Delete, old.clone())),
			(None, Some(new)) => modifications.push(Modification::new(ModificationType::Add, new.clone())),
			(Some(old), Some(new)) => {
				let added = new.values().iter().filter(|v| !old.contains(v));
				let added = Attribute::with_values(description.clone(), added.cloned());
				if !added.is_empty() {
					modifications.push(Modification::new(ModificationType::Add, added));
				}
				let deleted = old.values().iter().filter(|v| !new.contains(v));
				let deleted = Attribute::with_values(description.clone(), deleted.cloned());
				if !deleted.is_empty() {
					modifications.push(Modification::new(ModificationType::Delete, deleted));
				}
			}
			(None, None) => {}
		}
	}
	modifications
}

/// The change records computed by [`diff_entries`], in DN order.
#[derive(Debug)]
pub struct DiffChangeRecords {
	/// Remaining source entries
	source: Peekable<btree_map::IntoIter<Vec<u8>, Vec<u8>>>,
	/// Remaining target entries
	target: Peekable<btree_map::IntoIter<Vec<u8>, Vec<u8>>>,
}

impl ChangeRecordReader for DiffChangeRecords {
	fn read_change_record(&mut self) -> Result<Option<ChangeRecord>> {
		let order = match (self.source.peek(), self.target.peek()) {
			(None, None) => return Ok(None),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(Some((source, _)), Some((target, _))) => source.cmp(target),
		};
		let change = match order {
			std::cmp::Ordering::Less => {
				let Some((_, encoded)) = self.source.next() else { return Ok(None) };
				ChangeRecord::delete(decode(&encoded)?.dn().clone())
			}
			std::cmp::Ordering::Greater => {
				let Some((_, encoded)) = self.target.next() else { return Ok(None) };
				ChangeRecord::add(decode(&encoded)?)
			}
			std::cmp::Ordering::Equal => {
				let (Some((_, from)), Some((_, to))) = (self.source.next(), self.target.next()) else {
					return Ok(None);
				};
				let (from, to) = (decode(&from)?, decode(&to)?);
				ChangeRecord::modify(to.dn().clone(), diff_attributes(&from, &to))
			}
		};
		Ok(Some(change))
	}
}

impl Iterator for DiffChangeRecords {
	type Item = Result<ChangeRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read_change_record().transpose()
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::{diff_attributes, diff_entries};
	use crate::{
		entry::{Attribute, Entry},
		ldif::{ChangeRecord, LdifEntryReader, Modification, ModificationType},
	};

	#[test]
	fn attribute_changes() -> Result<(), Box<dyn std::error::Error>> {
		let from = Entry::from_pairs(
			"cn=a,dc=x",
			[("cn", "a"), ("mail", "old@x"), ("mail", "same@x"), ("description", "gone")],
		)?;
		let to = Entry::from_pairs("cn=a,dc=x", [("cn", "a"), ("mail", "same@x"), ("mail", "new@x"), ("sn", "b")])?;
		let expected = [
			Modification::new(ModificationType::Delete, Attribute::with_values("description".parse()?, ["gone"])),
			Modification::new(ModificationType::Add, Attribute::with_values("mail".parse()?, ["new@x"])),
			Modification::new(ModificationType::Delete, Attribute::with_values("mail".parse()?, ["old@x"])),
			Modification::new(ModificationType::Add, Attribute::with_values("sn".parse()?, ["b"])),
		];
		assert_eq!(diff_attributes(&from, &to), expected);
		assert!(diff_attributes(&to, &to).is_empty());
		Ok(())
	}

	#[test]
	fn merge_join() -> Result<(), Box<dyn std::error::Error>> {
		let source = LdifEntryReader::from_lines([
			"dn: dc=x", "dc: x", "", "dn: cn=b,dc=x", "cn: b", "", "dn: cn=a,dc=x", "cn: a",
		]);
		let target = LdifEntryReader::from_lines([
			"dn: cn=c,dc=x", "cn: c", "", "dn: DC=X", "dc: x", "", "dn: cn=a,dc=x", "cn: a", "sn: a",
		]);
		let changes: Vec<ChangeRecord> = diff_entries(source, target)?.collect::<Result<_, _>>()?;
		let sn = Attribute::with_values("sn".parse()?, ["a"]);
		let expected = vec![
			ChangeRecord::modify("dc=x".parse()?, Vec::new()),
			ChangeRecord::modify("cn=a,dc=x".parse()?, vec![Modification::new(ModificationType::Add, sn)]),
			ChangeRecord::delete("cn=b,dc=x".parse()?),
			ChangeRecord::add(Entry::from_pairs("cn=c,dc=x", [("cn", "c")])?),
		];
		assert_eq!(changes, expected, "Ordered by DN, DNs compared case insensitively");
		Ok(())
	}

	#[test]
	fn binary_descriptions_survive() -> Result<(), Box<dyn std::error::Error>> {
		let mut entry = Entry::new("cn=a".parse()?);
		entry.add_value("userCertificate".parse()?, vec![0, 1]);
		let changes: Vec<ChangeRecord> =
			diff_entries(Vec::<Entry>::new().into_iter(), vec![entry.clone()].into_iter())?.collect::<Result<_, _>>()?;
		assert_eq!(changes, [ChangeRecord::add(entry)], "No binary option is added on the way");
		Ok(())
	}
}
