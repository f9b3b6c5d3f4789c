//! Applying change records to an entry stream.
//!
//! The input entries are read into a sorted map and every change is applied
//! to it before the first patched entry is returned, so this is meant for
//! moderately sized data sets.
use std::collections::{btree_map, BTreeMap};

use crate::{
	dn::Dn,
	entry::{AttributeDescription, Entry},
	error::Result,
	ldif::{
		change::{ChangeRecord, Modification, ModificationType, SUBTREE_DELETE_OID},
		listener::{FailFastPatchListener, RejectedChangeRecordListener},
		ChangeRecordReader, EntryReader,
	},
};

/// Entries by normalized DN
type Entries = BTreeMap<Vec<u8>, Entry>;

/// Apply `changes` to `input`, failing on the first conflict.
pub fn patch(input: impl EntryReader, changes: impl ChangeRecordReader) -> Result<PatchedEntries> {
	patch_with_listener(input, changes, &mut FailFastPatchListener)
}

/// Apply `changes` to `input`, letting `listener` resolve conflicts.
pub fn patch_with_listener(
	mut input: impl EntryReader,
	mut changes: impl ChangeRecordReader,
	listener: &mut dyn RejectedChangeRecordListener,
) -> Result<PatchedEntries> {
	let mut entries = Entries::new();
	while let Some(entry) = input.read_entry()? {
		entries.insert(entry.dn().sort_key(), entry);
	}

	let mut applied = 0_usize;
	while let Some(change) = changes.read_change_record()? {
		match &change {
			ChangeRecord::Add { entry, .. } => add(&mut entries, &change, entry.clone(), listener)?,
			ChangeRecord::Delete { dn, .. } => delete(&mut entries, &change, dn, listener)?,
			ChangeRecord::Modify { dn, modifications, .. } => {
				modify(&mut entries, &change, dn, modifications, listener)?;
			}
			ChangeRecord::ModifyDn { dn, .. } => modify_dn(&mut entries, &change, dn, listener)?,
		}
		applied += 1;
	}
	tracing::debug!("Applied {applied} changes, {} entries remain", entries.len());
	Ok(PatchedEntries { entries: entries.into_values() })
}

/// Insert an entry, asking the listener if it already exists
fn add(
	entries: &mut Entries,
	change: &ChangeRecord,
	entry: Entry,
	listener: &mut dyn RejectedChangeRecordListener,
) -> Result<()> {
	let key = entry.dn().sort_key();
	let entry = match entries.remove(&key) {
		Some(existing) => listener.handle_duplicate_entry(change, existing, entry)?,
		None => entry,
	};
	entries.insert(key, entry);
	Ok(())
}

/// Keys of an entry and all its subordinates
fn subtree_keys(entries: &Entries, key: &[u8]) -> Vec<Vec<u8>> {
	entries.range(key.to_vec()..).map(|(k, _)| k).take_while(|k| k.starts_with(key)).cloned().collect()
}

/// Remove an entry, or its whole subtree if requested by control
fn delete(
	entries: &mut Entries,
	change: &ChangeRecord,
	dn: &Dn,
	listener: &mut dyn RejectedChangeRecordListener,
) -> Result<()> {
	let key = dn.sort_key();
	if !entries.contains_key(&key) {
		return listener.handle_rejected_change_record(change, "the entry to delete does not exist");
	}
	if change.has_control(SUBTREE_DELETE_OID) {
		for key in subtree_keys(entries, &key) {
			entries.remove(&key);
		}
	} else {
		entries.remove(&key);
	}
	Ok(())
}

/// Apply modifications in order
fn modify(
	entries: &mut Entries,
	change: &ChangeRecord,
	dn: &Dn,
	modifications: &[Modification],
	listener: &mut dyn RejectedChangeRecordListener,
) -> Result<()> {
	let Some(entry) = entries.get_mut(&dn.sort_key()) else {
		return listener.handle_rejected_change_record(change, "the entry to modify does not exist");
	};
	for modification in modifications {
		let attribute = &modification.attribute;
		match modification.modification_type {
			ModificationType::Add => entry.add_attribute(attribute.clone()),
			ModificationType::Delete if attribute.is_empty() => {
				entry.remove_attribute(attribute.description());
			}
			ModificationType::Delete => {
				entry.remove_values(attribute.description(), attribute.values());
			}
			ModificationType::Replace => entry.replace_attribute(attribute.clone()),
			ModificationType::Increment => {
				tracing::warn!(
					"Skipping unsupported increment of {} in entry {dn}",
					attribute.description()
				);
			}
		}
	}
	Ok(())
}

/// Rename an entry and move its subordinates along
fn modify_dn(
	entries: &mut Entries,
	change: &ChangeRecord,
	dn: &Dn,
	listener: &mut dyn RejectedChangeRecordListener,
) -> Result<()> {
	let (ChangeRecord::ModifyDn { new_rdn, delete_old_rdn, .. }, Some(new_dn)) = (change, change.new_dn()) else {
		return Ok(());
	};
	let key = dn.sort_key();
	if !entries.contains_key(&key) {
		return listener.handle_rejected_change_record(change, "the entry to rename does not exist");
	}

	// Take the subtree out first: the old and new ranges may overlap
	let mut moved = Vec::new();
	for key in subtree_keys(entries, &key) {
		if let Some(mut entry) = entries.remove(&key) {
			let renamed = entry.dn().rebase(dn, &new_dn).unwrap_or_else(|| entry.dn().clone());
			entry.set_dn(renamed);
			moved.push(entry);
		}
	}

	if let Some(top) = moved.first_mut() {
		if *delete_old_rdn {
			if let Some(old_rdn) = dn.rdn() {
				for ava in old_rdn.avas() {
					let description: AttributeDescription = ava.attribute().parse()?;
					top.remove_values(&description, &[ava.value().as_bytes().to_vec()]);
				}
			}
		}
		for ava in new_rdn.avas() {
			top.add_value(ava.attribute().parse()?, ava.value().as_bytes().to_vec());
		}
	}

	for entry in moved {
		add(entries, change, entry, listener)?;
	}
	Ok(())
}

/// The result of [`patch`]: the patched entries in DN order.
#[derive(Debug)]
pub struct PatchedEntries {
	/// Remaining entries
	entries: btree_map::IntoValues<Vec<u8>, Entry>,
}

impl EntryReader for PatchedEntries {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		Ok(self.entries.next())
	}
}

impl Iterator for PatchedEntries {
	type Item = Result<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		self.entries.next().map(Ok)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use ldap3::controls::RawControl;

	use super::{patch, patch_with_listener};
	use crate::{
		entry::{Attribute, Entry, EntryExt},
		error::Error,
		ldif::{
			change::SUBTREE_DELETE_OID, listener::OverwritePatchListener, ChangeRecord,
			LdifChangeRecordReader, LdifEntryReader, Modification, ModificationType,
		},
	};

	fn tree() -> LdifEntryReader<std::io::Cursor<Vec<u8>>> {
		LdifEntryReader::from_lines([
			"dn: dc=x",
			"dc: x",
			"",
			"dn: ou=a,dc=x",
			"ou: a",
			"",
			"dn: cn=p,ou=a,dc=x",
			"cn: p",
			"sn: old",
			"",
			"dn: ou=b,dc=x",
			"ou: b",
		])
	}

	fn dns(entries: impl Iterator<Item = Result<Entry, Error>>) -> Vec<String> {
		entries.map(|entry| entry.unwrap().dn().to_string()).collect()
	}

	#[test]
	fn adds_and_deletes() -> Result<(), Box<dyn std::error::Error>> {
		let changes = LdifChangeRecordReader::from_lines([
			"dn: cn=q,ou=b,dc=x",
			"changetype: add",
			"cn: q",
			"",
			"dn: cn=p,ou=a,dc=x",
			"changetype: delete",
		]);
		assert_eq!(dns(patch(tree(), changes)?), ["dc=x", "ou=a,dc=x", "ou=b,dc=x", "cn=q,ou=b,dc=x"]);

		let subtree = vec![ChangeRecord::delete("ou=a,dc=x".parse()?).with_control(RawControl {
			ctype: SUBTREE_DELETE_OID.to_owned(),
			crit: true,
			val: None,
		})];
		assert_eq!(dns(patch(tree(), subtree.into_iter())?), ["dc=x", "ou=b,dc=x"]);
		Ok(())
	}

	#[test]
	fn subtree_delete_spares_escaped_siblings() -> Result<(), Box<dyn std::error::Error>> {
		let entries = vec![
			Entry::from_pairs("ou=a,dc=x", [("ou", "a")])?,
			Entry::from_pairs("cn=p,ou=a,dc=x", [("cn", "p")])?,
			Entry::from_pairs("ou=a\\00ou\\3dc,dc=x", [("ou", "sibling")])?,
		];
		let subtree = vec![ChangeRecord::delete("ou=a,dc=x".parse()?).with_control(RawControl {
			ctype: SUBTREE_DELETE_OID.to_owned(),
			crit: true,
			val: None,
		})];
		let patched: Vec<Entry> = patch(entries.into_iter(), subtree.into_iter())?.collect::<Result<_, _>>()?;
		assert_eq!(patched.len(), 1, "Only the subtree is removed");
		assert_eq!(patched[0].attr_first("ou"), Some("sibling"));
		Ok(())
	}

	#[test]
	fn conflict_policies() -> Result<(), Box<dyn std::error::Error>> {
		let duplicate = || {
			let entry = Entry::from_pairs("ou=b,dc=x", [("ou", "b"), ("description", "new")]).unwrap();
			vec![ChangeRecord::add(entry), ChangeRecord::delete("ou=c,dc=x".parse().unwrap())].into_iter()
		};
		let err = patch(tree(), duplicate()).unwrap_err();
		assert!(matches!(err, Error::Conflict { ref dn, .. } if dn == "ou=b,dc=x"), "Fail fast: {err}");

		let patched: Vec<Entry> =
			patch_with_listener(tree(), duplicate(), &mut OverwritePatchListener)?.collect::<Result<_, _>>()?;
		let replaced = patched.iter().find(|e| e.dn().to_string() == "ou=b,dc=x").unwrap();
		assert_eq!(replaced.attr_first("description"), Some("new"), "The stored entry is replaced");
		assert_eq!(patched.len(), 4, "The delete of a missing entry is skipped");
		Ok(())
	}

	#[test]
	fn modifications() -> Result<(), Box<dyn std::error::Error>> {
		let changes = vec![ChangeRecord::modify(
			"cn=p,ou=a,dc=x".parse()?,
			vec![
				Modification::new(ModificationType::Replace, Attribute::with_values("sn".parse()?, ["new"])),
				Modification::new(ModificationType::Add, Attribute::with_values("mail".parse()?, ["a@x", "b@x"])),
				Modification::new(ModificationType::Delete, Attribute::with_values("mail".parse()?, ["a@x"])),
				Modification::new(ModificationType::Increment, Attribute::with_values("uidNumber".parse()?, ["1"])),
				Modification::new(ModificationType::Delete, Attribute::new("cn".parse()?)),
			],
		)];
		let patched: Vec<Entry> = patch(tree(), changes.into_iter())?.collect::<Result<_, _>>()?;
		let expected = Entry::from_pairs("cn=p,ou=a,dc=x", [("sn", "new"), ("mail", "b@x")])?;
		assert_eq!(patched[2], expected, "Increment is skipped, the rest applied in order");
		Ok(())
	}

	#[test]
	fn renames() -> Result<(), Box<dyn std::error::Error>> {
		let changes = vec![
			ChangeRecord::modify_dn("cn=p,ou=a,dc=x".parse()?, "cn=r".parse()?, true, None),
			ChangeRecord::modify_dn("ou=a,dc=x".parse()?, "ou=c".parse()?, false, Some("ou=b,dc=x".parse()?)),
		];
		let patched: Vec<Entry> = patch(tree(), changes.into_iter())?.collect::<Result<_, _>>()?;
		let names: Vec<String> = patched.iter().map(|e| e.dn().to_string()).collect();
		assert_eq!(names, ["dc=x", "ou=b,dc=x", "ou=c,ou=b,dc=x", "cn=r,ou=c,ou=b,dc=x"]);

		let person = &patched[3];
		assert_eq!(person.attr_first("cn"), Some("r"), "Old RDN value removed, new one added");
		let unit = &patched[2];
		let ou: Vec<&str> = unit.attributes_of_type("ou").flat_map(Attribute::str_values).collect();
		assert_eq!(ou, ["a", "c"], "The old RDN value is kept when asked to");

		let collision = vec![ChangeRecord::modify_dn("ou=a,dc=x".parse()?, "ou=b".parse()?, true, None)];
		assert!(matches!(patch(tree(), collision.into_iter()), Err(Error::Conflict { .. })));
		Ok(())
	}
}
