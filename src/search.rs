//! Searching an entry stream the way a directory server would.
use std::{collections::HashSet, sync::Arc};

use ldap3::Scope;

use crate::{
	dn::Dn,
	entry::{Attribute, AttributeDescription, Entry},
	error::Result,
	filter::{Filter, FilterMatcher, Matcher},
	ldif::EntryReader,
	schema::Schema,
};

/// Which entries relative to the base DN are searched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchScope {
	/// Only the base entry
	Base,
	/// Only the direct children of the base entry
	OneLevel,
	/// The base entry and everything below it
	Subtree,
	/// Everything below the base entry, but not the entry itself
	Subordinates,
}

impl SearchScope {
	/// Whether `dn` is in scope of a search from `base`
	#[must_use]
	pub fn contains(self, base: &Dn, dn: &Dn) -> bool {
		match self {
			SearchScope::Base => dn == base,
			SearchScope::OneLevel => dn.is_child_of(base),
			SearchScope::Subtree => dn.is_in_subtree_of(base),
			SearchScope::Subordinates => dn.is_in_subtree_of(base) && dn != base,
		}
	}
}

impl From<Scope> for SearchScope {
	fn from(scope: Scope) -> Self {
		match scope {
			Scope::Base => SearchScope::Base,
			Scope::OneLevel => SearchScope::OneLevel,
			Scope::Subtree => SearchScope::Subtree,
		}
	}
}

/// The parameters of a search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
	/// Where the search starts
	pub base: Dn,
	/// Which entries relative to `base` are considered
	pub scope: SearchScope,
	/// Which entries are returned
	pub filter: Filter,
	/// Attributes to return: names, `*` for all user attributes, `+` for all
	/// operational attributes, `1.1` for none. Empty means `*`.
	pub attributes: Vec<String>,
	/// Return attribute descriptions without values
	pub types_only: bool,
	/// Stop after this many entries, 0 for no limit
	pub size_limit: usize,
}

impl SearchRequest {
	/// Search `base` with `scope` for entries matching `filter`, returning all
	/// user attributes
	#[must_use]
	pub fn new(base: Dn, scope: SearchScope, filter: Filter) -> Self {
		Self { base, scope, filter, attributes: Vec::new(), types_only: false, size_limit: 0 }
	}

	/// Set the attributes to return
	#[must_use]
	pub fn with_attributes<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
		self.attributes = attributes.into_iter().map(Into::into).collect();
		self
	}

	/// Return attribute descriptions only
	#[must_use]
	pub fn with_types_only(mut self, types_only: bool) -> Self {
		self.types_only = types_only;
		self
	}

	/// Limit the number of returned entries
	#[must_use]
	pub fn with_size_limit(mut self, size_limit: usize) -> Self {
		self.size_limit = size_limit;
		self
	}
}

impl Default for SearchRequest {
	/// Everything, from the root DN
	fn default() -> Self {
		Self::new(Dn::root(), SearchScope::Subtree, Filter::object_class_present())
	}
}

/// Search `input`, evaluating the request's filter against `schema`.
pub fn search<R: EntryReader>(
	input: R,
	request: &SearchRequest,
	schema: Arc<Schema>,
) -> SearchResults<R, FilterMatcher> {
	let matcher = request.filter.matcher(schema.clone());
	SearchResults::with_matcher(input, request, matcher, schema)
}

/// Which attributes a search returns
#[derive(Clone, Debug)]
struct Projection {
	/// Return all user attributes
	all_user: bool,
	/// Return all operational attributes
	all_operational: bool,
	/// Canonical names of explicitly requested attribute types
	names: HashSet<String>,
}

impl Projection {
	/// Interpret a requested attribute list
	fn new(attributes: &[String], schema: &Schema) -> Self {
		let mut projection =
			Self { all_user: attributes.is_empty(), all_operational: false, names: HashSet::new() };
		for attribute in attributes {
			match attribute.as_str() {
				"*" => projection.all_user = true,
				"+" => projection.all_operational = true,
				"1.1" => {}
				name => {
					// options are ignored
					let name = name.parse::<AttributeDescription>().map_or_else(
						|_| name.to_owned(),
						|description| description.attribute_type().to_owned(),
					);
					projection.names.insert(schema.canonical_name(&name));
				}
			}
		}
		projection
	}

	/// Whether an attribute is returned
	fn keeps(&self, attribute: &Attribute, schema: &Schema) -> bool {
		let attribute_type = attribute.description().attribute_type();
		if self.names.contains(&schema.canonical_name(attribute_type)) {
			return true;
		}
		if schema.is_operational(attribute_type) {
			self.all_operational
		} else {
			self.all_user
		}
	}
}

/// The entries of a search, pulled lazily from the input.
#[derive(Debug)]
pub struct SearchResults<R, M> {
	/// The searched entries
	input: R,
	/// Search base
	base: Dn,
	/// Search scope
	scope: SearchScope,
	/// Entry filter
	matcher: M,
	/// Returned attributes
	projection: Projection,
	/// Strip values
	types_only: bool,
	/// Entries left before the size limit is hit, `None` if unlimited
	remaining: Option<usize>,
	/// Used to classify attributes
	schema: Arc<Schema>,
}

impl<R: EntryReader, M: Matcher> SearchResults<R, M> {
	/// Search `input` with a custom matcher in place of the request's filter
	pub fn with_matcher(input: R, request: &SearchRequest, matcher: M, schema: Arc<Schema>) -> Self {
		Self {
			input,
			base: request.base.clone(),
			scope: request.scope,
			matcher,
			projection: Projection::new(&request.attributes, &schema),
			types_only: request.types_only,
			remaining: (request.size_limit > 0).then_some(request.size_limit),
			schema,
		}
	}
}

impl<R: EntryReader, M: Matcher> EntryReader for SearchResults<R, M> {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		if self.remaining == Some(0) {
			return Ok(None);
		}
		while let Some(mut entry) = self.input.read_entry()? {
			if !self.scope.contains(&self.base, entry.dn()) || !self.matcher.matches(&entry) {
				continue;
			}
			entry.retain_attributes(|attribute| self.projection.keeps(attribute, &self.schema));
			if self.types_only {
				entry.clear_values();
			}
			if let Some(remaining) = self.remaining.as_mut() {
				*remaining -= 1;
				if *remaining == 0 {
					tracing::debug!("Size limit reached, ending search");
				}
			}
			return Ok(Some(entry));
		}
		Ok(None)
	}
}

impl<R: EntryReader, M: Matcher> Iterator for SearchResults<R, M> {
	type Item = Result<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read_entry().transpose()
	}
}
