//! Tags producing the values of template lines.
//!
//! A tag is created once per occurrence while the template file is parsed and
//! is immutable afterwards. State that changes during generation (random
//! numbers, counters) lives in the [`GenerationState`] handed to every call.
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use rand::Rng;

use super::{
	generator::{GenerationState, TemplateEntry},
	resources::ResourceLoader,
};
use crate::{
	dn::Rdn,
	error::{Error, Result},
	schema::Schema,
};

/// The outcome of evaluating a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagResult {
	/// Continue with the next tag of the line
	Success,
	/// Leave the whole line out of the entry
	Omit,
	/// The value depends on the DN, which cannot be computed yet. The line is
	/// retried after all other lines of the entry.
	NotReady,
}

/// A tag within a template line.
pub trait TemplateTag: fmt::Debug + Send + Sync {
	/// Called when the template holding this tag starts generating entries
	/// below a new parent
	fn initialize_for_parent(&self, _state: &mut GenerationState) {}

	/// Append this tag's contribution to `value`
	fn generate_value(
		&self,
		entry: &TemplateEntry<'_>,
		value: &mut String,
		state: &mut GenerationState,
	) -> TagResult;
}

/// Creates a tag from its arguments.
pub type TagFactory = fn(&mut TagContext<'_>, &[String]) -> Result<Arc<dyn TemplateTag>>;

/// A tag known to a [`TagRegistry`]
#[derive(Clone, Debug)]
pub(crate) struct TagDefinition {
	/// The name as registered, used in messages
	pub(crate) name: String,
	/// Whether the tag may be used in branch lines
	pub(crate) allowed_in_branch: bool,
	/// Constructor
	pub(crate) factory: TagFactory,
}

/// Maps tag names to constructors.
///
/// The built-in tags are always available. Extensions are registered here and
/// become usable in a template file once it names them in an
/// `include <name>` line.
#[derive(Clone, Debug)]
pub struct TagRegistry {
	/// Built-in tags by lower cased name
	builtin: HashMap<String, TagDefinition>,
	/// Extension tags by lower cased name
	extensions: HashMap<String, TagDefinition>,
}

impl Default for TagRegistry {
	fn default() -> Self {
		let builtin: [(&str, bool, TagFactory); 17] = [
			("AttributeValue", true, attribute_value),
			("DN", true, dn),
			("_DN", true, underscore_dn),
			("File", true, file),
			("First", false, first_name),
			("Last", false, last_name),
			("GUID", true, guid),
			("IfAbsent", true, if_absent),
			("IfPresent", true, if_present),
			("List", true, list),
			("ParentDN", false, parent_dn),
			("_ParentDN", false, underscore_parent_dn),
			("Presence", true, presence),
			("Random", true, random),
			("RDN", true, rdn),
			("Sequential", true, sequential),
			("StaticText", true, static_text),
		];
		let builtin = builtin
			.into_iter()
			.map(|(name, allowed_in_branch, factory)| {
				(name.to_lowercase(), TagDefinition { name: name.to_owned(), allowed_in_branch, factory })
			})
			.collect();
		Self { builtin, extensions: HashMap::new() }
	}
}

impl TagRegistry {
	/// A registry holding the built-in tags
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an extension tag
	#[must_use]
	pub fn with_extension(mut self, name: &str, allowed_in_branch: bool, factory: TagFactory) -> Self {
		self.extensions.insert(
			name.to_lowercase(),
			TagDefinition { name: name.to_owned(), allowed_in_branch, factory },
		);
		self
	}

	/// A built-in tag by lower cased name
	pub(crate) fn builtin(&self, name: &str) -> Option<&TagDefinition> {
		self.builtin.get(name)
	}

	/// An extension tag by lower cased name
	pub(crate) fn extension(&self, name: &str) -> Option<&TagDefinition> {
		self.extensions.get(name)
	}
}

/// What a [`TagFactory`] may know about the line a tag appears in.
#[derive(Debug)]
pub struct TagContext<'a> {
	/// Line number in the template file
	pub(crate) line: usize,
	/// Whether the line belongs to a branch
	pub(crate) in_branch: bool,
	/// Canonical names of the attributes defined by earlier lines
	pub(crate) defined: &'a [String],
	/// Used to canonicalize attribute names
	pub(crate) schema: &'a Schema,
	/// Finds data files
	pub(crate) loader: &'a ResourceLoader,
	/// Initial values of the counters allocated so far
	pub(crate) counters: &'a mut Vec<i64>,
	/// Parse warnings
	pub(crate) warnings: &'a mut Vec<String>,
}

impl TagContext<'_> {
	/// Line number in the template file
	#[must_use]
	pub fn line(&self) -> usize {
		self.line
	}

	/// Whether the tag is used in a branch rather than a template
	#[must_use]
	pub fn in_branch(&self) -> bool {
		self.in_branch
	}

	/// The name under which generated values of an attribute are looked up
	#[must_use]
	pub fn attribute_key(&self, name: &str) -> String {
		self.schema.canonical_name(name)
	}

	/// Whether an earlier line of the same branch or template produces the
	/// attribute
	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		let key = self.attribute_key(name);
		self.defined.iter().any(|defined| *defined == key)
	}

	/// Reserve a counter in the generation state, see
	/// [`GenerationState::counter`]
	pub fn allocate_counter(&mut self, initial: i64) -> usize {
		self.counters.push(initial);
		self.counters.len() - 1
	}

	/// The non-empty lines of a data file
	pub fn read_lines(&self, path: &str) -> Result<Arc<[String]>> {
		self.loader.read_lines(path, self.line)
	}

	/// Record a parse warning
	pub fn warn(&mut self, message: impl Into<String>) {
		let message = message.into();
		tracing::warn!("Template line {}: {message}", self.line);
		self.warnings.push(format!("line {}: {message}", self.line));
	}

	/// A template error at the current line
	#[must_use]
	pub fn error(&self, message: impl Into<String>) -> Error {
		Error::template(self.line, message)
	}

	/// Fail unless the number of arguments is within `min..=max`
	fn expect_arguments(&self, tag: &str, arguments: &[String], min: usize, max: usize) -> Result<()> {
		if (min..=max).contains(&arguments.len()) {
			Ok(())
		} else if min == max {
			Err(self.error(format!("tag {tag} takes {min} arguments, got {}", arguments.len())))
		} else {
			Err(self.error(format!(
				"tag {tag} takes between {min} and {max} arguments, got {}",
				arguments.len()
			)))
		}
	}

	/// Parse a numeric argument
	fn number<T: FromStr>(&self, tag: &str, argument: &str) -> Result<T> {
		argument
			.parse()
			.map_err(|_| self.error(format!("cannot parse \"{argument}\" as an integer for tag {tag}")))
	}

	/// Canonical name of an attribute that must be defined by an earlier line
	fn defined_attribute(&self, tag: &str, name: &str) -> Result<String> {
		if self.has_attribute(name) {
			Ok(self.attribute_key(name))
		} else {
			Err(self.error(format!("tag {tag} references attribute {name} which is not defined before it")))
		}
	}
}

/// A tag appending fixed text, used for the text between tags
pub(crate) fn static_text_tag(text: String) -> Arc<dyn TemplateTag> {
	Arc::new(StaticText { text })
}

/// Join RDNs with a separator
fn join_rdns<'a>(rdns: impl IntoIterator<Item = &'a Rdn>, separator: &str, value: &mut String) {
	for (i, rdn) in rdns.into_iter().enumerate() {
		if i > 0 {
			value.push_str(separator);
		}
		value.push_str(&rdn.to_string());
	}
}

/// `{attr[:n]}`: the first value of an attribute generated earlier, optionally
/// cut to `n` characters
#[derive(Debug)]
struct AttributeValue {
	/// Canonical attribute name
	key: String,
	/// Maximum number of characters, 0 for all
	chars: usize,
}

/// Factory for [`AttributeValue`]
fn attribute_value(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("AttributeValue", arguments, 1, 2)?;
	let key = context.defined_attribute("AttributeValue", &arguments[0])?;
	let chars = match arguments.get(1) {
		Some(chars) => context.number("AttributeValue", chars)?,
		None => 0,
	};
	Ok(Arc::new(AttributeValue { key, chars }))
}

impl TemplateTag for AttributeValue {
	fn generate_value(&self, entry: &TemplateEntry<'_>, value: &mut String, _: &mut GenerationState) -> TagResult {
		if let Some(text) = entry.value(&self.key) {
			if self.chars > 0 {
				value.extend(text.chars().take(self.chars));
			} else {
				value.push_str(text);
			}
		}
		TagResult::Success
	}
}

/// `<DN[:n]>` and `<_DN[:n]>`: the entry's DN, its first `n` RDNs if `n` is
/// positive or its last `-n` RDNs if negative
#[derive(Debug)]
struct EntryDn {
	/// Number of RDNs, see above
	components: i32,
	/// Written between RDNs
	separator: &'static str,
}

/// Shared argument handling of the DN tags
fn dn_components(context: &mut TagContext<'_>, tag: &str, arguments: &[String]) -> Result<i32> {
	context.expect_arguments(tag, arguments, 0, 1)?;
	arguments.first().map_or(Ok(0), |components| context.number(tag, components))
}

/// Factory for [`EntryDn`] with commas
fn dn(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	Ok(Arc::new(EntryDn { components: dn_components(context, "DN", arguments)?, separator: "," }))
}

/// Factory for [`EntryDn`] with underscores
fn underscore_dn(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	Ok(Arc::new(EntryDn { components: dn_components(context, "_DN", arguments)?, separator: "_" }))
}

impl TemplateTag for EntryDn {
	fn generate_value(&self, entry: &TemplateEntry<'_>, value: &mut String, _: &mut GenerationState) -> TagResult {
		let Some(dn) = entry.dn() else {
			return TagResult::NotReady;
		};
		let count = self.components.unsigned_abs() as usize;
		let selected = match self.components {
			0 => dn,
			components if components > 0 => dn.leading(count),
			_ => dn.trailing(count),
		};
		join_rdns(selected.rdns(), self.separator, value);
		TagResult::Success
	}
}

/// `<File:path[:sequential|random]>`: a line of a data file
#[derive(Debug)]
struct File {
	/// Lines of the file, never empty
	lines: Arc<[String]>,
	/// Counter holding the next line if read sequentially
	sequential: Option<usize>,
}

/// Factory for [`File`]
fn file(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("File", arguments, 1, 2)?;
	let lines = context.read_lines(&arguments[0])?;
	if lines.is_empty() {
		return Err(context.error(format!("data file {} is empty", arguments[0])));
	}
	let sequential = match arguments.get(1).map(|mode| mode.to_lowercase()).as_deref() {
		None | Some("random") => None,
		Some("sequential") => Some(context.allocate_counter(0)),
		Some(mode) => {
			return Err(context.error(format!(
				"invalid mode \"{mode}\" for tag File, expected sequential or random"
			)))
		}
	};
	Ok(Arc::new(File { lines, sequential }))
}

impl TemplateTag for File {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		let index = match self.sequential {
			Some(slot) => {
				let Some(counter) = state.counter(slot) else {
					return TagResult::Omit;
				};
				let index = usize::try_from(*counter).unwrap_or_default() % self.lines.len();
				*counter = i64::try_from(index + 1).unwrap_or_default();
				index
			}
			None => state.rng().gen_range(0..self.lines.len()),
		};
		value.push_str(&self.lines[index]);
		TagResult::Success
	}
}

/// `<First>` and `<Last>`: the name picked for the current entry
#[derive(Debug)]
struct Name {
	/// First rather than last name
	first: bool,
}

/// Factory for the first name [`Name`]
fn first_name(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("First", arguments, 0, 0)?;
	Ok(Arc::new(Name { first: true }))
}

/// Factory for the last name [`Name`]
fn last_name(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("Last", arguments, 0, 0)?;
	Ok(Arc::new(Name { first: false }))
}

impl TemplateTag for Name {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		value.push_str(if self.first { state.first_name() } else { state.last_name() });
		TagResult::Success
	}
}

/// `<GUID>`: a random version 4 UUID
#[derive(Debug)]
struct Guid;

/// Factory for [`Guid`]
fn guid(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("GUID", arguments, 0, 0)?;
	Ok(Arc::new(Guid))
}

impl TemplateTag for Guid {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		let uuid = uuid::Builder::from_random_bytes(state.rng().gen()).into_uuid();
		value.push_str(&uuid.hyphenated().to_string());
		TagResult::Success
	}
}

/// `<IfAbsent:attr[:value]>` and `<IfPresent:attr[:value]>`: keep the line
/// only if the attribute (with that value) is absent or present
#[derive(Debug)]
struct Condition {
	/// Canonical attribute name
	key: String,
	/// Value to look for, any value if unset
	value: Option<String>,
	/// Keep the line if the value is present rather than absent
	present: bool,
}

/// Shared argument handling of the conditional tags
fn condition(
	context: &mut TagContext<'_>,
	tag: &str,
	arguments: &[String],
	present: bool,
) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments(tag, arguments, 1, 2)?;
	let key = context.defined_attribute(tag, &arguments[0])?;
	Ok(Arc::new(Condition { key, value: arguments.get(1).cloned(), present }))
}

/// Factory for the absent [`Condition`]
fn if_absent(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	condition(context, "IfAbsent", arguments, false)
}

/// Factory for the present [`Condition`]
fn if_present(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	condition(context, "IfPresent", arguments, true)
}

impl TemplateTag for Condition {
	fn generate_value(&self, entry: &TemplateEntry<'_>, _: &mut String, _: &mut GenerationState) -> TagResult {
		let mut values = entry.values(&self.key);
		let found = match &self.value {
			Some(expected) => values.any(|value| value == expected),
			None => values.next().is_some(),
		};
		if found == self.present {
			TagResult::Success
		} else {
			TagResult::Omit
		}
	}
}

/// `<List:value[;weight]:...>`: one of the values, picked by weight
#[derive(Debug)]
struct List {
	/// Values with the cumulative weight up to and including them
	values: Vec<(String, u32)>,
	/// Sum of all weights
	total: u32,
}

/// Factory for [`List`]
fn list(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("List", arguments, 1, usize::MAX)?;
	let mut values = Vec::with_capacity(arguments.len());
	let mut total = 0_u32;
	for argument in arguments {
		let (value, weight) = match argument.rsplit_once(';') {
			Some((value, weight)) => (value, context.number::<u32>("List", weight)?),
			None => (argument.as_str(), 1),
		};
		if weight == 0 {
			return Err(context.error(format!("weight of list value \"{value}\" must be positive")));
		}
		total = total.saturating_add(weight);
		values.push((value.to_owned(), total));
	}
	Ok(Arc::new(List { values, total }))
}

impl TemplateTag for List {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		let selected = state.rng().gen_range(1..=self.total);
		if let Some((text, _)) = self.values.iter().find(|(_, cumulative)| selected <= *cumulative) {
			value.push_str(text);
		}
		TagResult::Success
	}
}

/// `<ParentDN>` and `<_ParentDN>`: the DN of the entry's parent
#[derive(Debug)]
struct ParentDn {
	/// Written between RDNs
	separator: &'static str,
}

/// Factory for [`ParentDn`] with commas
fn parent_dn(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("ParentDN", arguments, 0, 0)?;
	Ok(Arc::new(ParentDn { separator: "," }))
}

/// Factory for [`ParentDn`] with underscores
fn underscore_parent_dn(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("_ParentDN", arguments, 0, 0)?;
	Ok(Arc::new(ParentDn { separator: "_" }))
}

impl TemplateTag for ParentDn {
	fn generate_value(&self, entry: &TemplateEntry<'_>, value: &mut String, _: &mut GenerationState) -> TagResult {
		if let Some(parent) = entry.parent_dn() {
			join_rdns(parent.rdns(), self.separator, value);
		}
		TagResult::Success
	}
}

/// `<Presence:percent>`: keep the line with the given probability
#[derive(Debug)]
struct Presence {
	/// Probability in percent
	percent: u32,
}

/// Factory for [`Presence`]
fn presence(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("Presence", arguments, 1, 1)?;
	let percent = context.number("Presence", &arguments[0])?;
	if percent > 100 {
		return Err(context.error(format!("percentage {percent} of tag Presence is above 100")));
	}
	Ok(Arc::new(Presence { percent }))
}

impl TemplateTag for Presence {
	fn generate_value(&self, _: &TemplateEntry<'_>, _: &mut String, state: &mut GenerationState) -> TagResult {
		if state.rng().gen_range(0..100) < self.percent {
			TagResult::Success
		} else {
			TagResult::Omit
		}
	}
}

/// Month names for `<Random:month>`
const MONTHS: [&str; 12] = [
	"January",
	"February",
	"March",
	"April",
	"May",
	"June",
	"July",
	"August",
	"September",
	"October",
	"November",
	"December",
];

/// What `<Random>` produces
#[derive(Debug)]
enum RandomKind {
	/// Between `min` and `max` characters from a set
	Chars {
		/// Characters to pick from, never empty
		set: Vec<char>,
		/// Minimum length
		min: usize,
		/// Maximum length
		max: usize,
	},
	/// A number in `min..=max`, zero padded to `width` digits
	Number {
		/// Lower bound
		min: i64,
		/// Upper bound
		max: i64,
		/// Minimum number of digits
		width: usize,
	},
	/// A month name cut to `max_len` characters, 0 for the full name
	Month {
		/// Maximum length
		max_len: usize,
	},
	/// A US style telephone number
	Telephone,
}

/// `<Random:type:...>`: random text of several kinds
#[derive(Debug)]
struct Random {
	/// What to generate
	kind: RandomKind,
}

/// Length arguments starting at `start`: either a fixed length or a minimum
/// and a maximum
fn random_chars(
	context: &mut TagContext<'_>,
	arguments: &[String],
	start: usize,
	set: &str,
) -> Result<RandomKind> {
	context.expect_arguments("Random", arguments, start + 1, start + 2)?;
	let set: Vec<char> = set.chars().collect();
	if set.is_empty() {
		return Err(context.error("tag Random needs at least one character to pick from"));
	}
	let min: usize = context.number("Random", &arguments[start])?;
	let max = match arguments.get(start + 1) {
		Some(max) => context.number("Random", max)?,
		None => min,
	};
	if max < min {
		return Err(context.error(format!("maximum length {max} of tag Random is below the minimum {min}")));
	}
	if max == 0 {
		context.warn("tag Random always generates an empty value");
	}
	Ok(RandomKind::Chars { set, min, max })
}

/// Factory for [`Random`]
fn random(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("Random", arguments, 1, 4)?;
	let kind = match arguments[0].to_lowercase().as_str() {
		"alpha" => random_chars(context, arguments, 1, "abcdefghijklmnopqrstuvwxyz")?,
		"alphanumeric" => random_chars(context, arguments, 1, "abcdefghijklmnopqrstuvwxyz0123456789")?,
		"hex" => random_chars(context, arguments, 1, "0123456789abcdef")?,
		"base64" => random_chars(
			context,
			arguments,
			1,
			"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
		)?,
		"chars" => {
			context.expect_arguments("Random", arguments, 3, 4)?;
			let set = arguments[1].clone();
			random_chars(context, arguments, 2, &set)?
		}
		"numeric" if arguments.len() == 2 => random_chars(context, arguments, 1, "0123456789")?,
		"numeric" => {
			context.expect_arguments("Random", arguments, 3, 4)?;
			let min: i64 = context.number("Random", &arguments[1])?;
			let max: i64 = context.number("Random", &arguments[2])?;
			if max < min {
				return Err(context.error(format!("maximum {max} of tag Random is below the minimum {min}")));
			}
			let width = match arguments.get(3) {
				Some(format) if !format.is_empty() && format.chars().all(|c| c == '0' || c == '#') => {
					format.chars().filter(|c| *c == '0').count()
				}
				Some(format) => {
					return Err(context.error(format!("unsupported number format \"{format}\" for tag Random")))
				}
				None => 0,
			};
			RandomKind::Number { min, max, width }
		}
		"month" => {
			context.expect_arguments("Random", arguments, 1, 2)?;
			let max_len = match arguments.get(1) {
				Some(max_len) => context.number("Random", max_len)?,
				None => 0,
			};
			if arguments.len() == 2 && max_len == 0 {
				return Err(context.error("maximum length of tag Random must be positive"));
			}
			RandomKind::Month { max_len }
		}
		"telephone" => {
			context.expect_arguments("Random", arguments, 1, 1)?;
			RandomKind::Telephone
		}
		other => return Err(context.error(format!("unknown random type \"{other}\""))),
	};
	Ok(Arc::new(Random { kind }))
}

impl TemplateTag for Random {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		let rng = state.rng();
		match &self.kind {
			RandomKind::Chars { set, min, max } => {
				let len = if min == max { *min } else { rng.gen_range(*min..=*max) };
				value.extend((0..len).map(|_| set[rng.gen_range(0..set.len())]));
			}
			RandomKind::Number { min, max, width } => {
				let number = rng.gen_range(*min..=*max);
				if number < 0 {
					value.push_str(&format!("-{:0width$}", number.unsigned_abs()));
				} else {
					value.push_str(&format!("{number:0width$}"));
				}
			}
			RandomKind::Month { max_len } => {
				let month = MONTHS[rng.gen_range(0..MONTHS.len())];
				if *max_len == 0 {
					value.push_str(month);
				} else {
					value.extend(month.chars().take(*max_len));
				}
			}
			RandomKind::Telephone => {
				let mut digits = |count: usize| -> String {
					(0..count).map(|_| char::from(b'0' + rng.gen_range(0..10_u8))).collect()
				};
				let number = format!("+1 {} {} {}", digits(3), digits(3), digits(4));
				value.push_str(&number);
			}
		}
		TagResult::Success
	}
}

/// `<RDN>`: the entry's RDN
#[derive(Debug)]
struct EntryRdn;

/// Factory for [`EntryRdn`]
fn rdn(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("RDN", arguments, 0, 0)?;
	Ok(Arc::new(EntryRdn))
}

impl TemplateTag for EntryRdn {
	fn generate_value(&self, entry: &TemplateEntry<'_>, value: &mut String, _: &mut GenerationState) -> TagResult {
		let Some(dn) = entry.dn() else {
			return TagResult::NotReady;
		};
		if let Some(rdn) = dn.rdn() {
			value.push_str(&rdn.to_string());
		}
		TagResult::Success
	}
}

/// `<Sequential[:start[:reset]]>`: an increasing number, by default restarting
/// whenever the template is used below a new parent
#[derive(Debug)]
struct Sequential {
	/// Counter holding the next value
	slot: usize,
	/// First value
	start: i64,
	/// Restart below a new parent
	reset: bool,
}

/// Factory for [`Sequential`]
fn sequential(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("Sequential", arguments, 0, 2)?;
	let start = match arguments.first() {
		Some(start) => context.number("Sequential", start)?,
		None => 0,
	};
	let reset = match arguments.get(1).map(|reset| reset.to_lowercase()).as_deref() {
		None | Some("true") => true,
		Some("false") => false,
		Some(reset) => {
			return Err(context.error(format!(
				"cannot parse \"{reset}\" as a boolean for tag Sequential"
			)))
		}
	};
	let slot = context.allocate_counter(start);
	Ok(Arc::new(Sequential { slot, start, reset }))
}

impl TemplateTag for Sequential {
	fn initialize_for_parent(&self, state: &mut GenerationState) {
		if self.reset {
			if let Some(counter) = state.counter(self.slot) {
				*counter = self.start;
			}
		}
	}

	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, state: &mut GenerationState) -> TagResult {
		let Some(counter) = state.counter(self.slot) else {
			return TagResult::Omit;
		};
		value.push_str(&counter.to_string());
		*counter += 1;
		TagResult::Success
	}
}

/// Fixed text
#[derive(Debug)]
struct StaticText {
	/// The text
	text: String,
}

/// Factory for [`StaticText`]
fn static_text(context: &mut TagContext<'_>, arguments: &[String]) -> Result<Arc<dyn TemplateTag>> {
	context.expect_arguments("StaticText", arguments, 1, 1)?;
	Ok(static_text_tag(arguments[0].clone()))
}

impl TemplateTag for StaticText {
	fn generate_value(&self, _: &TemplateEntry<'_>, value: &mut String, _: &mut GenerationState) -> TagResult {
		value.push_str(&self.text);
		TagResult::Success
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use std::sync::Arc;

	use super::{TagContext, TagRegistry, TagResult, TemplateTag};
	use crate::{
		dn::Dn,
		error::Error,
		schema::Schema,
		template::{
			generator::{GenerationState, TemplateEntry},
			resources::ResourceLoader,
		},
	};

	/// Everything needed to create and evaluate tags outside a template file
	struct Harness {
		schema: Arc<Schema>,
		loader: ResourceLoader,
		defined: Vec<String>,
		counters: Vec<i64>,
		warnings: Vec<String>,
	}

	impl Harness {
		fn new(defined: &[&str]) -> Self {
			Self {
				schema: Schema::core(),
				loader: ResourceLoader::default(),
				defined: defined.iter().map(|name| (*name).to_owned()).collect(),
				counters: Vec::new(),
				warnings: Vec::new(),
			}
		}

		fn tag(&mut self, name: &str, arguments: &[&str]) -> Result<Arc<dyn TemplateTag>, Error> {
			let registry = TagRegistry::new();
			let definition = registry.builtin(&name.to_lowercase()).unwrap();
			let mut context = TagContext {
				line: 3,
				in_branch: false,
				defined: &self.defined,
				schema: &self.schema,
				loader: &self.loader,
				counters: &mut self.counters,
				warnings: &mut self.warnings,
			};
			let arguments: Vec<String> = arguments.iter().map(|a| (*a).to_owned()).collect();
			(definition.factory)(&mut context, &arguments)
		}

		fn state(&self) -> GenerationState {
			GenerationState::for_tests(self.counters.clone())
		}
	}

	fn generate(tag: &dyn TemplateTag, entry: &TemplateEntry<'_>, state: &mut GenerationState) -> (TagResult, String) {
		let mut value = String::new();
		let result = tag.generate_value(entry, &mut value, state);
		(result, value)
	}

	#[test]
	fn argument_checks() {
		let mut harness = Harness::new(&["cn"]);
		assert!(harness.tag("AttributeValue", &["cn", "2"]).is_ok());
		assert!(harness.tag("AttributeValue", &["commonName"]).is_ok(), "Aliases resolve");
		let err = harness.tag("AttributeValue", &["sn"]).unwrap_err();
		assert!(matches!(err, Error::Template { line: 3, ref message } if message.contains("sn")), "{err}");
		assert!(harness.tag("Presence", &["101"]).is_err());
		assert!(harness.tag("Random", &["unknown"]).is_err());
		assert!(harness.tag("Random", &["alpha", "5", "2"]).is_err());
		assert!(harness.tag("Random", &["numeric", "1", "9", "x0"]).is_err());
		assert!(harness.tag("Sequential", &["1", "maybe"]).is_err());
		assert!(harness.tag("List", &["a;0"]).is_err());
		assert!(harness.tag("File", &["cities", "backwards"]).is_err());
		assert!(harness.tag("First", &["x"]).is_err());
		assert!(harness.tag("Random", &["alpha", "0"]).is_ok());
		assert_eq!(harness.warnings.len(), 1, "Always empty values are warned about");
	}

	#[test]
	fn dn_tags() -> Result<(), Box<dyn std::error::Error>> {
		let mut harness = Harness::new(&[]);
		let dn: Dn = "uid=a,ou=people,dc=example,dc=com".parse()?;
		let parent = dn.parent().unwrap();
		let entry = TemplateEntry::for_branch(&dn);
		let child = TemplateEntry::for_template(&parent, &[]);
		let mut state = harness.state();

		let cases = [
			("DN", vec![], "uid=a,ou=people,dc=example,dc=com"),
			("DN", vec!["2"], "uid=a,ou=people"),
			("DN", vec!["-2"], "dc=example,dc=com"),
			("_DN", vec![], "uid=a_ou=people_dc=example_dc=com"),
			("RDN", vec![], "uid=a"),
		];
		for (name, arguments, expected) in cases {
			let tag = harness.tag(name, &arguments)?;
			assert_eq!(generate(&*tag, &entry, &mut state), (TagResult::Success, expected.to_owned()));
		}

		let tag = harness.tag("_ParentDN", &[])?;
		assert_eq!(generate(&*tag, &child, &mut state).1, "ou=people_dc=example_dc=com");
		let tag = harness.tag("DN", &[])?;
		assert_eq!(generate(&*tag, &child, &mut state).0, TagResult::NotReady, "No RDN value yet");
		Ok(())
	}

	#[test]
	fn random_values() -> Result<(), Box<dyn std::error::Error>> {
		let mut harness = Harness::new(&[]);
		let dn = Dn::root();
		let entry = TemplateEntry::for_branch(&dn);
		let telephone = harness.tag("Random", &["telephone"])?;
		let padded = harness.tag("Random", &["numeric", "1", "99", "0000"])?;
		let chars = harness.tag("Random", &["chars", "xy", "2", "4"])?;
		let month = harness.tag("Random", &["month", "3"])?;
		let list = harness.tag("List", &["a;2", "b"])?;
		let mut state = harness.state();
		for _ in 0..50 {
			let (_, number) = generate(&*telephone, &entry, &mut state);
			assert!(number.starts_with("+1 ") && number.len() == 15, "{number}");
			let (_, number) = generate(&*padded, &entry, &mut state);
			assert!(number.len() == 4 && number.starts_with("00"), "{number}");
			let (_, text) = generate(&*chars, &entry, &mut state);
			assert!((2..=4).contains(&text.len()) && text.chars().all(|c| c == 'x' || c == 'y'));
			assert_eq!(generate(&*month, &entry, &mut state).1.chars().count(), 3);
			assert!(["a", "b"].contains(&generate(&*list, &entry, &mut state).1.as_str()));
		}
		Ok(())
	}

	#[test]
	fn counters() -> Result<(), Box<dyn std::error::Error>> {
		let mut harness = Harness::new(&[]);
		let dn = Dn::root();
		let entry = TemplateEntry::for_branch(&dn);
		let resetting = harness.tag("Sequential", &["5"])?;
		let running = harness.tag("Sequential", &["1", "false"])?;
		let file = harness.tag("File", &["states", "sequential"])?;
		let mut state = harness.state();

		let values: Vec<String> = (0..3).map(|_| generate(&*resetting, &entry, &mut state).1).collect();
		assert_eq!(values, ["5", "6", "7"]);
		assert_eq!(generate(&*running, &entry, &mut state).1, "1");

		resetting.initialize_for_parent(&mut state);
		running.initialize_for_parent(&mut state);
		assert_eq!(generate(&*resetting, &entry, &mut state).1, "5", "Restarts below a new parent");
		assert_eq!(generate(&*running, &entry, &mut state).1, "2", "Unless told not to");

		let states: Vec<String> = (0..51).map(|_| generate(&*file, &entry, &mut state).1).collect();
		assert_eq!((states[0].as_str(), states[49].as_str(), states[50].as_str()), ("AL", "WY", "AL"));

		let mut foreign = GenerationState::for_tests(Vec::new());
		assert!(foreign.counter(0).is_none(), "Slots belong to one template file");
		assert!(matches!(resetting.generate_value(&entry, &mut String::new(), &mut foreign), TagResult::Omit));
		Ok(())
	}
}
