//! Change records: add, delete, modify and modify DN requests.
use std::{collections::HashSet, fmt, str::FromStr};

use ldap3::{controls::RawControl, Mod};

use crate::{
	dn::{Dn, Rdn},
	entry::{Attribute, Entry},
	error::{Error, Result},
};

/// OID of the subtree delete request control
pub const SUBTREE_DELETE_OID: &str = "1.2.840.113556.1.4.805";

/// The kind of change a [`Modification`] makes to an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModificationType {
	/// Add values, creating the attribute if needed
	Add,
	/// Delete values, or the whole attribute if no values are given
	Delete,
	/// Replace all values, removing the attribute if no values are given
	Replace,
	/// Increment an integer attribute by the given amount
	Increment,
}

impl ModificationType {
	/// The LDIF keyword
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			ModificationType::Add => "add",
			ModificationType::Delete => "delete",
			ModificationType::Replace => "replace",
			ModificationType::Increment => "increment",
		}
	}
}

impl fmt::Display for ModificationType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ModificationType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"add" => Ok(ModificationType::Add),
			"delete" => Ok(ModificationType::Delete),
			"replace" => Ok(ModificationType::Replace),
			"increment" => Ok(ModificationType::Increment),
			_ => Err(Error::Invalid(s.to_owned())),
		}
	}
}

/// One step of a modify request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
	/// What to do
	pub modification_type: ModificationType,
	/// The attribute and the values involved
	pub attribute: Attribute,
}

impl Modification {
	/// Create a modification
	#[must_use]
	pub fn new(modification_type: ModificationType, attribute: Attribute) -> Self {
		Self { modification_type, attribute }
	}

	/// The equivalent `ldap3` modification, ready to be sent to a server
	#[must_use]
	pub fn to_ldap3(&self) -> Mod<Vec<u8>> {
		let name = self.attribute.description().to_string().into_bytes();
		let values: HashSet<Vec<u8>> = self.attribute.values().iter().cloned().collect();
		match self.modification_type {
			ModificationType::Add => Mod::Add(name, values),
			ModificationType::Delete => Mod::Delete(name, values),
			ModificationType::Replace => Mod::Replace(name, values),
			ModificationType::Increment => {
				let amount = self.attribute.values().first().cloned().unwrap_or_else(|| b"1".to_vec());
				Mod::Increment(name, amount)
			}
		}
	}
}

/// A request to change the directory.
///
/// Request controls are carried along untouched; apart from subtree delete
/// they have no meaning to this crate.
#[derive(Clone, Debug)]
pub enum ChangeRecord {
	/// Create an entry
	Add {
		/// The entry to create
		entry: Entry,
		/// Request controls
		controls: Vec<RawControl>,
	},
	/// Remove an entry
	Delete {
		/// The entry to remove
		dn: Dn,
		/// Request controls
		controls: Vec<RawControl>,
	},
	/// Change the attributes of an entry
	Modify {
		/// The entry to change
		dn: Dn,
		/// Changes in the order they are applied
		modifications: Vec<Modification>,
		/// Request controls
		controls: Vec<RawControl>,
	},
	/// Rename or move an entry and its subordinates
	ModifyDn {
		/// The entry to rename
		dn: Dn,
		/// The new leaf RDN
		new_rdn: Rdn,
		/// Whether the values of the old RDN are removed from the entry
		delete_old_rdn: bool,
		/// The new parent, if the entry is moved
		new_superior: Option<Dn>,
		/// Request controls
		controls: Vec<RawControl>,
	},
}

impl ChangeRecord {
	/// An add request without controls
	#[must_use]
	pub fn add(entry: Entry) -> Self {
		ChangeRecord::Add { entry, controls: Vec::new() }
	}

	/// A delete request without controls
	#[must_use]
	pub fn delete(dn: Dn) -> Self {
		ChangeRecord::Delete { dn, controls: Vec::new() }
	}

	/// A modify request without controls
	#[must_use]
	pub fn modify(dn: Dn, modifications: Vec<Modification>) -> Self {
		ChangeRecord::Modify { dn, modifications, controls: Vec::new() }
	}

	/// A modify DN request without controls
	#[must_use]
	pub fn modify_dn(dn: Dn, new_rdn: Rdn, delete_old_rdn: bool, new_superior: Option<Dn>) -> Self {
		ChangeRecord::ModifyDn { dn, new_rdn, delete_old_rdn, new_superior, controls: Vec::new() }
	}

	/// Attach a request control
	#[must_use]
	pub fn with_control(mut self, control: RawControl) -> Self {
		match &mut self {
			ChangeRecord::Add { controls, .. }
			| ChangeRecord::Delete { controls, .. }
			| ChangeRecord::Modify { controls, .. }
			| ChangeRecord::ModifyDn { controls, .. } => controls.push(control),
		}
		self
	}

	/// The DN of the targeted entry
	#[must_use]
	pub fn dn(&self) -> &Dn {
		match self {
			ChangeRecord::Add { entry, .. } => entry.dn(),
			ChangeRecord::Delete { dn, .. }
			| ChangeRecord::Modify { dn, .. }
			| ChangeRecord::ModifyDn { dn, .. } => dn,
		}
	}

	/// The request controls
	#[must_use]
	pub fn controls(&self) -> &[RawControl] {
		match self {
			ChangeRecord::Add { controls, .. }
			| ChangeRecord::Delete { controls, .. }
			| ChangeRecord::Modify { controls, .. }
			| ChangeRecord::ModifyDn { controls, .. } => controls,
		}
	}

	/// Whether a control with the given OID is attached
	#[must_use]
	pub fn has_control(&self, oid: &str) -> bool {
		self.controls().iter().any(|control| control.ctype == oid)
	}

	/// The DN a modify DN request renames its target to, `None` for other
	/// requests
	#[must_use]
	pub fn new_dn(&self) -> Option<Dn> {
		let ChangeRecord::ModifyDn { dn, new_rdn, new_superior, .. } = self else {
			return None;
		};
		let parent = new_superior.clone().or_else(|| dn.parent()).unwrap_or_default();
		Some(parent.child(new_rdn.clone()))
	}
}

impl PartialEq for ChangeRecord {
	/// Controls are compared by OID, criticality and value
	fn eq(&self, other: &Self) -> bool {
		let same_controls = self.controls().len() == other.controls().len()
			&& self
				.controls()
				.iter()
				.zip(other.controls())
				.all(|(a, b)| a.ctype == b.ctype && a.crit == b.crit && a.val == b.val);
		let same_request = match (self, other) {
			(ChangeRecord::Add { entry: a, .. }, ChangeRecord::Add { entry: b, .. }) => a == b,
			(ChangeRecord::Delete { dn: a, .. }, ChangeRecord::Delete { dn: b, .. }) => a == b,
			(
				ChangeRecord::Modify { dn: a, modifications: a_mods, .. },
				ChangeRecord::Modify { dn: b, modifications: b_mods, .. },
			) => a == b && a_mods == b_mods,
			(
				ChangeRecord::ModifyDn {
					dn: a,
					new_rdn: a_rdn,
					delete_old_rdn: a_delete,
					new_superior: a_superior,
					..
				},
				ChangeRecord::ModifyDn {
					dn: b,
					new_rdn: b_rdn,
					delete_old_rdn: b_delete,
					new_superior: b_superior,
					..
				},
			) => a == b && a_rdn == b_rdn && a_delete == b_delete && a_superior == b_superior,
			_ => false,
		};
		same_controls && same_request
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use ldap3::{controls::RawControl, Mod};

	use super::{ChangeRecord, Modification, ModificationType, SUBTREE_DELETE_OID};
	use crate::entry::Attribute;

	#[test]
	fn modify_dn_targets() -> Result<(), Box<dyn std::error::Error>> {
		let rename = ChangeRecord::modify_dn("cn=a,ou=x,dc=y".parse()?, "cn=b".parse()?, true, None);
		assert_eq!(rename.new_dn(), Some("cn=b,ou=x,dc=y".parse()?));

		let superior = Some("ou=z,dc=y".parse()?);
		let moved = ChangeRecord::modify_dn("cn=a,ou=x,dc=y".parse()?, "cn=a".parse()?, false, superior);
		assert_eq!(moved.new_dn(), Some("cn=a,ou=z,dc=y".parse()?));
		assert_eq!(ChangeRecord::delete("cn=a".parse()?).new_dn(), None);
		Ok(())
	}

	#[test]
	fn controls() -> Result<(), Box<dyn std::error::Error>> {
		let control = RawControl { ctype: SUBTREE_DELETE_OID.to_owned(), crit: true, val: None };
		let delete = ChangeRecord::delete("ou=a,dc=x".parse()?).with_control(control);
		assert!(delete.has_control(SUBTREE_DELETE_OID));
		assert_ne!(delete, ChangeRecord::delete("ou=a,dc=x".parse()?), "Controls take part in equality");
		Ok(())
	}

	#[test]
	fn ldap3_modifications() -> Result<(), Box<dyn std::error::Error>> {
		let attribute = Attribute::with_values("mail".parse()?, ["a@x", "b@x"]);
		let Mod::Replace(name, values) = Modification::new(ModificationType::Replace, attribute).to_ldap3() else {
			panic!("Not a replace");
		};
		assert_eq!(name, b"mail");
		assert_eq!(values.len(), 2);

		let counter = Attribute::new("uidNumber".parse()?);
		let increment = Modification::new(ModificationType::Increment, counter).to_ldap3();
		assert!(matches!(increment, Mod::Increment(_, amount) if amount == b"1"));
		assert_eq!("REPLACE".parse::<ModificationType>()?, ModificationType::Replace);
		Ok(())
	}
}
