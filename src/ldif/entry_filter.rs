//! Attribute, branch and entry filtering shared by readers and writers.
use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
	config::FilterConfig,
	dn::Dn,
	entry::{AttributeDescription, Entry},
	error::Result,
	filter::{Filter, Matcher},
	schema::Schema,
};

/// Include and exclude criteria for attributes, branches and entries.
///
/// Every pair follows the same rule: an excluded item never passes; if the
/// include set is non-empty only included items pass; with both sets empty
/// everything passes.
pub struct EntryFilter {
	/// Schema used to resolve aliases and attribute usage
	schema: Arc<Schema>,
	/// Canonical names of excluded attribute types
	exclude_attributes: HashSet<String>,
	/// Canonical names of included attribute types
	include_attributes: HashSet<String>,
	/// Excluded subtrees
	exclude_branches: Vec<Dn>,
	/// Included subtrees
	include_branches: Vec<Dn>,
	/// Entries matching any of these are excluded
	exclude_matchers: Vec<Box<dyn Matcher>>,
	/// If non-empty, entries have to match one of these
	include_matchers: Vec<Box<dyn Matcher>>,
	/// Drop operational attributes
	exclude_operational: bool,
	/// Drop user attributes
	exclude_user: bool,
}

impl EntryFilter {
	/// A filter letting everything pass
	#[must_use]
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
			exclude_attributes: HashSet::new(),
			include_attributes: HashSet::new(),
			exclude_branches: Vec::new(),
			include_branches: Vec::new(),
			exclude_matchers: Vec::new(),
			include_matchers: Vec::new(),
			exclude_operational: false,
			exclude_user: false,
		}
	}

	/// Build a filter from configuration, parsing DNs and LDAP filters
	pub fn from_config(config: &FilterConfig, schema: Arc<Schema>) -> Result<Self> {
		let mut filter = Self::new(schema.clone());
		for attribute in &config.exclude_attributes {
			filter = filter.exclude_attribute(attribute);
		}
		for attribute in &config.include_attributes {
			filter = filter.include_attribute(attribute);
		}
		for dn in &config.exclude_branches {
			filter = filter.exclude_branch(dn.parse()?);
		}
		for dn in &config.include_branches {
			filter = filter.include_branch(dn.parse()?);
		}
		for text in &config.exclude_filters {
			filter = filter.exclude_matching(text.parse::<Filter>()?.matcher(schema.clone()));
		}
		for text in &config.include_filters {
			filter = filter.include_matching(text.parse::<Filter>()?.matcher(schema.clone()));
		}
		Ok(filter
			.exclude_operational_attributes(config.exclude_operational_attributes)
			.exclude_user_attributes(config.exclude_user_attributes))
	}

	/// The schema used for attribute name resolution
	#[must_use]
	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	/// Exclude an attribute type
	#[must_use]
	pub fn exclude_attribute(mut self, name: &str) -> Self {
		self.exclude_attributes.insert(self.schema.canonical_name(name));
		self
	}

	/// Include an attribute type
	#[must_use]
	pub fn include_attribute(mut self, name: &str) -> Self {
		self.include_attributes.insert(self.schema.canonical_name(name));
		self
	}

	/// Exclude a subtree
	#[must_use]
	pub fn exclude_branch(mut self, dn: Dn) -> Self {
		self.exclude_branches.push(dn);
		self
	}

	/// Include a subtree
	#[must_use]
	pub fn include_branch(mut self, dn: Dn) -> Self {
		self.include_branches.push(dn);
		self
	}

	/// Exclude entries matching a predicate
	#[must_use]
	pub fn exclude_matching(mut self, matcher: impl Matcher + 'static) -> Self {
		self.exclude_matchers.push(Box::new(matcher));
		self
	}

	/// Include entries matching a predicate
	#[must_use]
	pub fn include_matching(mut self, matcher: impl Matcher + 'static) -> Self {
		self.include_matchers.push(Box::new(matcher));
		self
	}

	/// Toggle dropping of operational attributes
	#[must_use]
	pub fn exclude_operational_attributes(mut self, exclude: bool) -> Self {
		self.exclude_operational = exclude;
		self
	}

	/// Toggle dropping of user attributes
	#[must_use]
	pub fn exclude_user_attributes(mut self, exclude: bool) -> Self {
		self.exclude_user = exclude;
		self
	}

	/// Whether an attribute is filtered out
	#[must_use]
	pub fn is_attribute_excluded(&self, description: &AttributeDescription) -> bool {
		let attribute_type = description.attribute_type();
		let name = self.schema.canonical_name(attribute_type);
		if self.exclude_attributes.contains(&name) {
			return true;
		}
		if !self.include_attributes.is_empty() && !self.include_attributes.contains(&name) {
			return true;
		}
		let operational = self.schema.is_operational(attribute_type);
		(operational && self.exclude_operational) || (!operational && self.exclude_user)
	}

	/// Whether a DN lies in a filtered out branch
	#[must_use]
	pub fn is_branch_excluded(&self, dn: &Dn) -> bool {
		if self.exclude_branches.iter().any(|branch| dn.is_in_subtree_of(branch)) {
			return true;
		}
		!self.include_branches.is_empty()
			&& !self.include_branches.iter().any(|branch| dn.is_in_subtree_of(branch))
	}

	/// Whether an entry is filtered out by the predicates
	#[must_use]
	pub fn is_entry_excluded(&self, entry: &Entry) -> bool {
		if self.exclude_matchers.iter().any(|m| m.matches(entry)) {
			return true;
		}
		!self.include_matchers.is_empty() && !self.include_matchers.iter().any(|m| m.matches(entry))
	}
}

impl Default for EntryFilter {
	fn default() -> Self {
		Self::new(Schema::core())
	}
}

impl fmt::Debug for EntryFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntryFilter")
			.field("exclude_attributes", &self.exclude_attributes)
			.field("include_attributes", &self.include_attributes)
			.field("exclude_branches", &self.exclude_branches)
			.field("include_branches", &self.include_branches)
			.field("exclude_matchers", &self.exclude_matchers.len())
			.field("include_matchers", &self.include_matchers.len())
			.field("exclude_operational", &self.exclude_operational)
			.field("exclude_user", &self.exclude_user)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::EntryFilter;
	use crate::{config::FilterConfig, entry::Entry, schema::Schema};

	#[test]
	fn attribute_precedence() -> Result<(), Box<dyn std::error::Error>> {
		let filter = EntryFilter::new(Schema::core())
			.exclude_attribute("cn")
			.include_attribute("commonName")
			.include_attribute("sn");
		assert!(filter.is_attribute_excluded(&"cn".parse()?), "Exclude wins over include");
		assert!(!filter.is_attribute_excluded(&"SN;lang-en".parse()?), "Included types pass");
		assert!(filter.is_attribute_excluded(&"mail".parse()?), "Anything else is excluded");

		let open = EntryFilter::new(Schema::core());
		assert!(!open.is_attribute_excluded(&"mail".parse()?), "No sets, no filtering");

		let categories = EntryFilter::new(Schema::core()).exclude_operational_attributes(true);
		assert!(categories.is_attribute_excluded(&"modifyTimestamp".parse()?));
		assert!(!categories.is_attribute_excluded(&"mail".parse()?));
		Ok(())
	}

	#[test]
	fn branch_precedence() -> Result<(), Box<dyn std::error::Error>> {
		let filter = EntryFilter::new(Schema::core())
			.include_branch("dc=example,dc=com".parse()?)
			.exclude_branch("ou=Groups,dc=example,dc=com".parse()?);
		assert!(!filter.is_branch_excluded(&"uid=a,ou=People,dc=example,dc=com".parse()?));
		assert!(filter.is_branch_excluded(&"cn=g,ou=groups,dc=example,dc=com".parse()?));
		assert!(filter.is_branch_excluded(&"dc=example,dc=org".parse()?), "Outside every include");
		Ok(())
	}

	#[test]
	fn from_config() -> Result<(), Box<dyn std::error::Error>> {
		let filter = EntryFilter::from_config(&FilterConfig::example(), Schema::core())?;
		let person = Entry::from_pairs("uid=a,dc=example,dc=com", [("objectClass", "person")])?;
		let unit = Entry::from_pairs("ou=a,dc=example,dc=com", [("objectClass", "organizationalUnit")])?;
		assert!(!filter.is_entry_excluded(&person), "Matches the include filter");
		assert!(filter.is_entry_excluded(&unit), "Does not match any include filter");
		assert!(filter.is_attribute_excluded(&"userPassword".parse()?));
		assert!(filter.is_attribute_excluded(&"createTimestamp".parse()?));

		let bad = FilterConfig { include_filters: vec!["(cn=".to_owned()], ..FilterConfig::default() };
		assert!(EntryFilter::from_config(&bad, Schema::core()).is_err(), "Filters are validated");
		Ok(())
	}
}
