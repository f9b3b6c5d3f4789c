//! Config for LDIF readers, writers and the entry generator.
use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for which variant of ISO8601 to use for parsing and
/// serializing time. Configured according the syntax definition
/// `( 1.3.6.1.4.1.1466.115.121.1.24 DESC 'Generalized Time' )` described in
/// RFC4517 section 3.1.13
pub const TIME_FORMAT: &[time::format_description::FormatItem] =
	time::macros::format_description!("[year][month][day][hour][minute][second]Z");

/// Generalized time with a fractional second component
pub const TIME_FORMAT_FRACTION: &[time::format_description::FormatItem] =
	time::macros::format_description!("[year][month][day][hour][minute][second].[subsecond]Z");

/// What to do when a schema check fails.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	/// Drop the offending record and notify the rejection listener
	Reject,
	/// Keep the record and notify the warning listener
	Warn,
	/// Do not perform the check
	Ignore,
}

/// Which schema checks are performed while reading and at what severity.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaValidationPolicy {
	/// Unknown attribute types and object classes, required and allowed
	/// attributes, and the `binary` option. When set to
	/// [`Action::Ignore`] unknown attribute types are tolerated.
	pub check_attributes_and_object_classes: Action,
	/// Value syntax, duplicate values and single valued attributes
	pub check_attribute_values: Action,
}

impl SchemaValidationPolicy {
	/// Perform no checks at all
	#[must_use]
	pub fn ignore_all() -> Self {
		Self {
			check_attributes_and_object_classes: Action::Ignore,
			check_attribute_values: Action::Ignore,
		}
	}

	/// Reject anything that violates the schema
	#[must_use]
	pub fn reject_all() -> Self {
		Self {
			check_attributes_and_object_classes: Action::Reject,
			check_attribute_values: Action::Reject,
		}
	}

	/// Whether unknown attribute types have to be tolerated
	#[must_use]
	pub fn is_lenient(&self) -> bool {
		self.check_attributes_and_object_classes == Action::Ignore
	}
}

impl Default for SchemaValidationPolicy {
	fn default() -> Self {
		Self::ignore_all()
	}
}

/// Include and exclude criteria shared by readers and writers.
///
/// In every pair exclusion wins. If an include list is non-empty, only the
/// listed items pass. Empty lists filter nothing.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
	/// Attribute types that are dropped
	pub exclude_attributes: Vec<String>,
	/// Attribute types that are kept
	pub include_attributes: Vec<String>,
	/// DNs whose subtrees are dropped
	pub exclude_branches: Vec<String>,
	/// DNs whose subtrees are kept
	pub include_branches: Vec<String>,
	/// LDAP filters selecting entries that are dropped
	pub exclude_filters: Vec<String>,
	/// LDAP filters selecting entries that are kept
	pub include_filters: Vec<String>,
	/// Drop all operational attributes
	pub exclude_operational_attributes: bool,
	/// Drop all user attributes
	pub exclude_user_attributes: bool,
}

impl FilterConfig {
	/// Returns an example FilterConfig
	#[allow(dead_code)]
	pub(crate) fn example() -> Self {
		FilterConfig {
			exclude_attributes: vec!["userPassword".to_owned()],
			exclude_branches: vec!["ou=Groups,dc=example,dc=com".to_owned()],
			include_filters: vec!["(objectClass=person)".to_owned()],
			exclude_operational_attributes: true,
			..FilterConfig::default()
		}
	}
}

/// Reader configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ReaderConfig {
	/// Schema checks
	pub schema_validation: SchemaValidationPolicy,
	/// Entry and attribute filters
	pub filter: FilterConfig,
}

/// Writer configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WriterConfig {
	/// Lines longer than this are folded. 0 or 1 disables folding.
	pub wrap_column: usize,
	/// Precede base64 encoded values that are printable text with a comment
	/// showing the text
	pub add_user_friendly_comments: bool,
	/// Entry and attribute filters
	pub filter: FilterConfig,
}

/// Configuration for generating entries from a template file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
	/// The template file. The bundled example template is used if unset.
	pub template_path: Option<PathBuf>,
	/// Directory searched for data files referenced by the template, after
	/// the path as written and before the bundled resources
	pub resource_path: Option<PathBuf>,
	/// Constants that take precedence over `define` lines in the template
	pub constants: BTreeMap<String, String>,
	/// Seed for the random number generator. Generation is reproducible for
	/// a given seed.
	pub seed: Option<u64>,
	/// Whether entries for the branches themselves are generated
	pub generate_branches: bool,
}

impl Default for GeneratorConfig {
	fn default() -> Self {
		Self {
			template_path: None,
			resource_path: None,
			constants: BTreeMap::new(),
			seed: None,
			generate_branches: true,
		}
	}
}

impl GeneratorConfig {
	/// Returns an example GeneratorConfig
	#[allow(dead_code)]
	pub(crate) fn example() -> Self {
		GeneratorConfig {
			constants: BTreeMap::from([("numusers".to_owned(), "5".to_owned())]),
			seed: Some(42),
			..GeneratorConfig::default()
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use time::PrimitiveDateTime;

	use super::{
		Action, FilterConfig, GeneratorConfig, SchemaValidationPolicy, WriterConfig, TIME_FORMAT,
		TIME_FORMAT_FRACTION,
	};

	#[test]
	fn test_time_config() -> Result<(), Box<dyn std::error::Error>> {
		PrimitiveDateTime::parse("20130516200520Z", &TIME_FORMAT)?;
		PrimitiveDateTime::parse("20130516200520.123Z", &TIME_FORMAT_FRACTION)?;
		assert!(PrimitiveDateTime::parse("2013-05-16", &TIME_FORMAT).is_err());

		Ok(())
	}

	#[test]
	fn test_defaults() {
		let policy = SchemaValidationPolicy::default();
		assert!(policy.is_lenient(), "Readers ignore the schema unless told otherwise");
		assert_eq!(SchemaValidationPolicy::reject_all().check_attribute_values, Action::Reject);

		let writer = WriterConfig::default();
		assert_eq!(writer.wrap_column, 0, "Folding is disabled by default");
		assert_eq!(writer.filter, FilterConfig::default());

		let generator = GeneratorConfig::default();
		assert!(generator.generate_branches, "Branch entries are generated by default");
		assert_eq!(GeneratorConfig::example().seed, Some(42));
	}
}
