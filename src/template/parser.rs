//! Parsing of template files into an immutable [`TemplateFile`].
//!
//! A template file is a sequence of directives:
//!
//! ```text
//! define suffix=dc=example,dc=com
//!
//! branch: ou=People,[suffix]
//! subordinateTemplate: person:100
//!
//! template: person
//! rdnAttr: uid
//! uid: user.<sequential:0>
//! cn: <first> <last>
//! ```
//!
//! Constants in square brackets are substituted as each line is read, so a
//! constant must be defined before it is used. Blocks started by `branch:` or
//! `template:` extend to the next blank line.
use std::{
	collections::{BTreeMap, HashMap, HashSet},
	path::{Path, PathBuf},
	sync::Arc,
};

use super::{
	resources::ResourceLoader,
	tag::{static_text_tag, TagContext, TagRegistry, TemplateTag},
};
use crate::{
	dn::Dn,
	entry::AttributeDescription,
	error::{Error, Result},
	schema::Schema,
};

/// How the generated text of a line becomes the attribute value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueEncoding {
	/// `attr: text`, the text itself
	Plain,
	/// `attr:: text`, the text is base64 decoded
	Base64,
	/// `attr:< text`, the text is a URL whose contents are the value
	Url,
}

/// One attribute line of a branch or template.
#[derive(Clone, Debug)]
pub(crate) struct TemplateLine {
	/// Line number in the template file
	pub(crate) line: usize,
	/// The attribute the values belong to
	pub(crate) description: AttributeDescription,
	/// Canonical name of the attribute type
	pub(crate) key: String,
	/// See [`ValueEncoding`]
	pub(crate) encoding: ValueEncoding,
	/// Evaluated in order, each appending to the value
	pub(crate) tags: Vec<Arc<dyn TemplateTag>>,
}

/// An attribute making up the RDN of template entries
#[derive(Clone, Debug)]
pub(crate) struct RdnAttribute {
	/// Canonical name
	pub(crate) key: String,
	/// Name as written in the `rdnAttr` line
	pub(crate) name: String,
}

/// A template generating entries below a branch or template entry
#[derive(Clone, Copy, Debug)]
pub(crate) struct Subordinate {
	/// Index into [`TemplateFile::templates`]
	pub(crate) template: usize,
	/// Number of entries per parent, `None` for no limit
	pub(crate) count: Option<u64>,
}

/// A `subordinateTemplate` line before template names are resolved
#[derive(Clone, Debug)]
struct SubordinateRef {
	/// Template name as written
	name: String,
	/// Line number
	line: usize,
	/// Number of entries per parent
	count: Option<u64>,
}

/// A fixed entry of the generated tree.
#[derive(Debug)]
pub(crate) struct Branch {
	/// DN of the entry
	pub(crate) dn: Dn,
	/// Lines generating the attributes, starting with the RDN values
	pub(crate) lines: Vec<TemplateLine>,
	/// Templates generating entries below the branch
	pub(crate) subordinates: Vec<Subordinate>,
}

/// A recipe for entries generated below a parent.
#[derive(Debug)]
pub(crate) struct Template {
	/// Name as written
	pub(crate) name: String,
	/// Line of the `template:` directive
	pub(crate) line: usize,
	/// Attributes whose first values form the RDN
	pub(crate) rdn_attributes: Vec<RdnAttribute>,
	/// Lines generating the attributes, inherited ones first
	pub(crate) lines: Vec<TemplateLine>,
	/// Templates generating entries below each generated entry
	pub(crate) subordinates: Vec<Subordinate>,
}

/// A parsed template file.
///
/// The file is immutable and may be shared between threads. Every
/// [`EntryGenerator`](super::EntryGenerator) created from it keeps its own
/// generation state.
#[derive(Debug)]
pub struct TemplateFile {
	/// Branches in file order
	pub(crate) branches: Vec<Branch>,
	/// Templates in file order
	pub(crate) templates: Vec<Template>,
	/// Effective constants by lower cased name
	constants: HashMap<String, String>,
	/// Initial counter values, see [`TagContext::allocate_counter`]
	pub(crate) counters: Vec<i64>,
	/// Names for `<First>`
	pub(crate) first_names: Arc<[String]>,
	/// Names for `<Last>`
	pub(crate) last_names: Arc<[String]>,
	/// Problems found while parsing that did not prevent it
	warnings: Vec<String>,
}

impl TemplateFile {
	/// Parse a template with the core schema and no caller constants
	pub fn parse(text: &str) -> Result<Self> {
		TemplateParser::new(Schema::core()).parse_str(text)
	}

	/// Warnings produced while parsing
	#[must_use]
	pub fn warnings(&self) -> &[String] {
		&self.warnings
	}

	/// The value of a constant, from the caller or a `define` line
	#[must_use]
	pub fn constant(&self, name: &str) -> Option<&str> {
		self.constants.get(&name.to_lowercase()).map(String::as_str)
	}

	/// DNs of the branches in file order
	pub fn branch_dns(&self) -> impl Iterator<Item = &Dn> {
		self.branches.iter().map(|branch| &branch.dn)
	}

	/// Names of the templates in file order
	pub fn template_names(&self) -> impl Iterator<Item = &str> {
		self.templates.iter().map(|template| template.name.as_str())
	}
}

/// Parses template files.
#[derive(Clone, Debug)]
pub struct TemplateParser {
	/// Used to resolve attribute names
	schema: Arc<Schema>,
	/// Known tags
	registry: TagRegistry,
	/// Caller constants by lower cased name
	constants: BTreeMap<String, String>,
	/// Directory searched for data files
	resource_path: Option<PathBuf>,
}

impl TemplateParser {
	/// A parser resolving attribute names with `schema`
	#[must_use]
	pub fn new(schema: Arc<Schema>) -> Self {
		Self { schema, registry: TagRegistry::new(), constants: BTreeMap::new(), resource_path: None }
	}

	/// Use a registry holding extension tags
	#[must_use]
	pub fn with_registry(mut self, registry: TagRegistry) -> Self {
		self.registry = registry;
		self
	}

	/// Add constants. They take precedence over `define` lines.
	#[must_use]
	pub fn with_constants<K: AsRef<str>, V: Into<String>>(
		mut self,
		constants: impl IntoIterator<Item = (K, V)>,
	) -> Self {
		self.constants
			.extend(constants.into_iter().map(|(name, value)| (name.as_ref().to_lowercase(), value.into())));
		self
	}

	/// Search data files in `path` before the bundled resources
	#[must_use]
	pub fn with_resource_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.resource_path = Some(path.into());
		self
	}

	/// Parse a template file. Data files are also searched next to it.
	pub fn parse_file(&self, path: &Path) -> Result<TemplateFile> {
		let text = std::fs::read_to_string(path).map_err(|err| {
			Error::template(0, format!("unable to read template file {}: {err}", path.display()))
		})?;
		tracing::debug!("Parsing template file {}", path.display());
		self.parse_with_dir(&text, path.parent().map(Path::to_path_buf))
	}

	/// Parse template text
	pub fn parse_str(&self, text: &str) -> Result<TemplateFile> {
		self.parse_with_dir(text, None)
	}

	/// Parse, searching data files in `template_dir` too
	fn parse_with_dir(&self, text: &str, template_dir: Option<PathBuf>) -> Result<TemplateFile> {
		let loader = ResourceLoader::new(self.resource_path.clone(), template_dir);
		let first_names = loader.read_lines("first.names", 0)?;
		let last_names = loader.read_lines("last.names", 0)?;
		if first_names.is_empty() || last_names.is_empty() {
			return Err(Error::template(0, "the name files must not be empty"));
		}

		let mut state = FileParser {
			parser: self,
			loader,
			constants: self.constants.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
			defined: HashSet::new(),
			included: HashSet::new(),
			counters: Vec::new(),
			warnings: Vec::new(),
			branches: Vec::new(),
			templates: Vec::new(),
		};
		state.parse(text)?;
		let (branches, templates) = state.complete()?;
		tracing::debug!("Parsed {} branches and {} templates", branches.len(), templates.len());
		Ok(TemplateFile {
			branches,
			templates,
			constants: state.constants,
			counters: state.counters,
			first_names,
			last_names,
			warnings: state.warnings,
		})
	}
}

/// A branch or template with unresolved subordinates
#[derive(Debug)]
struct Pending<T> {
	/// The parsed block
	item: T,
	/// Its `subordinateTemplate` lines
	subordinates: Vec<SubordinateRef>,
}

/// State of parsing one file
#[derive(Debug)]
struct FileParser<'a> {
	/// Settings
	parser: &'a TemplateParser,
	/// Finds data files
	loader: ResourceLoader,
	/// Effective constants by lower cased name
	constants: HashMap<String, String>,
	/// Constants defined by the file
	defined: HashSet<String>,
	/// Enabled extension tags, lower cased
	included: HashSet<String>,
	/// Counter slots
	counters: Vec<i64>,
	/// Warnings
	warnings: Vec<String>,
	/// Parsed branches
	branches: Vec<Pending<Branch>>,
	/// Parsed templates
	templates: Vec<Pending<Template>>,
}

/// Strip a case-insensitive prefix
fn strip_prefix_ci<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
	let head = text.get(..prefix.len())?;
	head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

impl FileParser<'_> {
	/// Record a warning
	fn warn(&mut self, line: usize, message: String) {
		tracing::warn!("Template line {line}: {message}");
		self.warnings.push(format!("line {line}: {message}"));
	}

	/// Replace `[name]` with the value of the constant
	fn substitute(&mut self, text: &str, line: usize) -> String {
		let mut result = String::with_capacity(text.len());
		let mut rest = text;
		while let Some(open) = rest.find('[') {
			let Some(close) = rest[open..].find(']').map(|close| open + close) else {
				break;
			};
			result.push_str(&rest[..open]);
			let name = &rest[open + 1..close];
			if let Some(value) = self.constants.get(&name.to_lowercase()) {
				result.push_str(value);
			} else {
				result.push_str(&rest[open..=close]);
				self.warn(line, format!("constant [{name}] is not defined"));
			}
			rest = &rest[close + 1..];
		}
		result.push_str(rest);
		result
	}

	/// First pass over the file
	fn parse(&mut self, text: &str) -> Result<()> {
		let mut lines = text.lines().map(|line| line.trim_end_matches('\r')).enumerate().peekable();
		while let Some((index, raw)) = lines.next() {
			let number = index + 1;
			if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
				continue;
			}
			let line = self.substitute(raw, number);
			let trimmed = line.trim();

			if let Some(name) = strip_prefix_ci(trimmed, "include ") {
				self.include(name.trim(), number)?;
			} else if let Some(definition) = strip_prefix_ci(trimmed, "define ") {
				self.define(definition, number)?;
			} else if strip_prefix_ci(trimmed, "branch:").is_some()
				|| strip_prefix_ci(trimmed, "template:").is_some()
			{
				let mut block = vec![(number, trimmed.to_owned())];
				while let Some((index, raw)) = lines.next_if(|(_, raw)| !raw.trim().is_empty()) {
					if !raw.trim_start().starts_with('#') {
						let line = self.substitute(raw, index + 1);
						block.push((index + 1, line.trim().to_owned()));
					}
				}
				if strip_prefix_ci(trimmed, "branch:").is_some() {
					self.branch(&block)?;
				} else {
					self.template(&block)?;
				}
			} else {
				return Err(Error::template(number, format!("unexpected line \"{trimmed}\"")));
			}
		}
		Ok(())
	}

	/// `include <name>`
	fn include(&mut self, name: &str, line: usize) -> Result<()> {
		let key = name.to_lowercase();
		if self.parser.registry.builtin(&key).is_some() {
			return Err(Error::template(line, format!("tag {name} conflicts with a built-in tag")));
		}
		if self.parser.registry.extension(&key).is_none() {
			return Err(Error::template(line, format!("no extension tag named {name} is registered")));
		}
		if !self.included.insert(key) {
			return Err(Error::template(line, format!("tag {name} is included more than once")));
		}
		Ok(())
	}

	/// `define name=value`
	fn define(&mut self, definition: &str, line: usize) -> Result<()> {
		let Some((name, value)) = definition.split_once('=') else {
			return Err(Error::template(line, format!("constant definition \"{definition}\" has no '='")));
		};
		let (name, value) = (name.trim(), value.trim());
		if name.is_empty() {
			return Err(Error::template(line, "constant definition without a name"));
		}
		if value.is_empty() {
			self.warn(line, format!("constant {name} is defined with an empty value"));
		}
		let key = name.to_lowercase();
		if !self.defined.insert(key.clone()) {
			return Err(Error::template(line, format!("constant {name} is defined more than once")));
		}
		if self.parser.constants.contains_key(&key) {
			tracing::debug!("Keeping caller value of constant {name} over the definition on line {line}");
			return Ok(());
		}
		self.constants.insert(key, value.to_owned());
		Ok(())
	}

	/// A `branch:` block
	fn branch(&mut self, block: &[(usize, String)]) -> Result<()> {
		let (number, header) = &block[0];
		let text = header["branch:".len()..].trim();
		let dn: Dn = text
			.parse()
			.map_err(|err: Error| Error::template(*number, format!("invalid branch DN \"{text}\": {err}")))?;
		if self.branches.iter().any(|branch| branch.item.dn == dn) {
			return Err(Error::template(*number, format!("branch {dn} is defined more than once")));
		}

		let mut lines = Vec::new();
		let mut defined = Vec::new();
		for ava in dn.rdn().map(|rdn| rdn.avas()).unwrap_or_default() {
			let description: AttributeDescription = ava
				.attribute()
				.parse()
				.map_err(|err: Error| Error::template(*number, err.to_string()))?;
			let key = self.parser.schema.canonical_name(description.attribute_type());
			defined.push(key.clone());
			lines.push(TemplateLine {
				line: *number,
				description,
				key,
				encoding: ValueEncoding::Plain,
				tags: vec![static_text_tag(ava.value().to_owned())],
			});
		}

		let mut subordinates = Vec::new();
		for (number, line) in &block[1..] {
			if let Some(reference) = strip_prefix_ci(line, "subordinateTemplate:") {
				subordinates.push(self.subordinate(reference, *number)?);
			} else {
				let parsed = self.line(line, *number, true, &defined)?;
				defined.push(parsed.key.clone());
				lines.push(parsed);
			}
		}
		self.branches.push(Pending { item: Branch { dn, lines, subordinates: Vec::new() }, subordinates });
		Ok(())
	}

	/// A `template:` block
	fn template(&mut self, block: &[(usize, String)]) -> Result<()> {
		let (number, header) = &block[0];
		let name = header["template:".len()..].trim().to_owned();
		if name.is_empty() {
			return Err(Error::template(*number, "template without a name"));
		}
		if self.templates.iter().any(|template| template.item.name.eq_ignore_ascii_case(&name)) {
			return Err(Error::template(*number, format!("template {name} is defined more than once")));
		}

		let mut template =
			Template { name, line: *number, rdn_attributes: Vec::new(), lines: Vec::new(), subordinates: Vec::new() };
		let mut subordinates = Vec::new();
		let mut defined: Vec<String> = Vec::new();
		for (number, line) in &block[1..] {
			if let Some(parent) = strip_prefix_ci(line, "extends:") {
				let parent = parent.trim();
				let Some(parent) = self.templates.iter().find(|t| t.item.name.eq_ignore_ascii_case(parent))
				else {
					return Err(Error::template(*number, format!("template {parent} to extend is not defined")));
				};
				let mut lines = parent.item.lines.clone();
				let mut keys: Vec<String> = lines.iter().map(|line| line.key.clone()).collect();
				keys.append(&mut defined);
				lines.append(&mut template.lines);
				(defined, template.lines) = (keys, lines);
			} else if let Some(attributes) = strip_prefix_ci(line, "rdnAttr:") {
				for name in attributes.split('+').map(str::trim) {
					if name.is_empty() {
						return Err(Error::template(*number, format!("invalid RDN attribute list \"{attributes}\"")));
					}
					template
						.rdn_attributes
						.push(RdnAttribute { key: self.parser.schema.canonical_name(name), name: name.to_owned() });
				}
			} else if let Some(reference) = strip_prefix_ci(line, "subordinateTemplate:") {
				subordinates.push(self.subordinate(reference, *number)?);
			} else {
				let parsed = self.line(line, *number, false, &defined)?;
				defined.push(parsed.key.clone());
				template.lines.push(parsed);
			}
		}
		self.templates.push(Pending { item: template, subordinates });
		Ok(())
	}

	/// `subordinateTemplate: name[:count]`
	fn subordinate(&mut self, reference: &str, line: usize) -> Result<SubordinateRef> {
		let (name, count) = match reference.split_once(':') {
			Some((name, count)) => (name.trim(), Some(count.trim())),
			None => (reference.trim(), None),
		};
		if name.is_empty() {
			return Err(Error::template(line, "subordinate template without a name"));
		}
		let count = match count {
			None => None,
			Some(count) => {
				let count: i64 = count.parse().map_err(|_| {
					Error::template(line, format!("invalid number of entries \"{count}\" for template {name}"))
				})?;
				if count == 0 {
					self.warn(line, format!("subordinate template {name} generates no entries"));
				}
				u64::try_from(count).ok()
			}
		};
		Ok(SubordinateRef { name: name.to_owned(), line, count })
	}

	/// An attribute line
	fn line(&mut self, text: &str, number: usize, in_branch: bool, defined: &[String]) -> Result<TemplateLine> {
		let Some((attribute, rest)) = text.split_once(':') else {
			return Err(Error::template(number, format!("line \"{text}\" has no colon")));
		};
		let attribute = attribute.trim();
		if attribute.is_empty() {
			return Err(Error::template(number, "line without an attribute name"));
		}
		let (encoding, value) = if let Some(value) = rest.strip_prefix(':') {
			(ValueEncoding::Base64, value)
		} else if let Some(value) = rest.strip_prefix('<') {
			(ValueEncoding::Url, value)
		} else {
			(ValueEncoding::Plain, rest)
		};
		let value = value.trim_start();
		if value.is_empty() {
			self.warn(number, format!("attribute {attribute} has no value"));
		}

		let description: AttributeDescription =
			attribute.parse().map_err(|err: Error| Error::template(number, err.to_string()))?;
		let key = self.parser.schema.canonical_name(description.attribute_type());
		let tags = self.tags(value, number, in_branch, defined)?;
		Ok(TemplateLine { line: number, description, key, encoding, tags })
	}

	/// Split a value into static text, `<tag:args>` and `{attr[:n]}` tags.
	/// A backslash escapes the next character.
	fn tags(
		&mut self,
		value: &str,
		number: usize,
		in_branch: bool,
		defined: &[String],
	) -> Result<Vec<Arc<dyn TemplateTag>>> {
		/// Where in the value the scanner is
		#[derive(PartialEq)]
		enum Mode {
			/// Static text
			Text,
			/// Inside `<...>`
			Replacement,
			/// Inside `{...}`
			Reference,
		}

		let mut tags = Vec::new();
		let mut buffer = String::new();
		let mut mode = Mode::Text;
		let mut escaped = false;
		for c in value.chars() {
			if escaped {
				buffer.push(c);
				escaped = false;
				continue;
			}
			match (&mode, c) {
				(_, '\\') => escaped = true,
				(Mode::Text, '<' | '{') => {
					if !buffer.is_empty() {
						tags.push(static_text_tag(std::mem::take(&mut buffer)));
					}
					mode = if c == '<' { Mode::Replacement } else { Mode::Reference };
				}
				(Mode::Replacement, '>') => {
					let arguments = split_arguments(&std::mem::take(&mut buffer));
					let Some((name, arguments)) = arguments.split_first() else {
						return Err(Error::template(number, "empty tag"));
					};
					tags.push(self.tag(name, arguments, number, in_branch, defined)?);
					mode = Mode::Text;
				}
				(Mode::Reference, '}') => {
					let arguments = split_arguments(&std::mem::take(&mut buffer));
					tags.push(self.tag("AttributeValue", &arguments, number, in_branch, defined)?);
					mode = Mode::Text;
				}
				_ => buffer.push(c),
			}
		}
		if escaped {
			buffer.push('\\');
		}
		if mode != Mode::Text {
			return Err(Error::template(number, format!("incomplete tag in \"{value}\"")));
		}
		if !buffer.is_empty() {
			tags.push(static_text_tag(buffer));
		}
		Ok(tags)
	}

	/// Create a tag by name
	fn tag(
		&mut self,
		name: &str,
		arguments: &[String],
		number: usize,
		in_branch: bool,
		defined: &[String],
	) -> Result<Arc<dyn TemplateTag>> {
		let key = name.to_lowercase();
		let registry = &self.parser.registry;
		let definition = registry
			.builtin(&key)
			.or_else(|| registry.extension(&key).filter(|_| self.included.contains(&key)))
			.ok_or_else(|| Error::template(number, format!("unknown tag {name}")))?;
		if in_branch && !definition.allowed_in_branch {
			return Err(Error::template(number, format!("tag {} is not allowed in branches", definition.name)));
		}
		let mut context = TagContext {
			line: number,
			in_branch,
			defined,
			schema: &self.parser.schema,
			loader: &self.loader,
			counters: &mut self.counters,
			warnings: &mut self.warnings,
		};
		(definition.factory)(&mut context, arguments)
	}

	/// Second pass: resolve subordinate templates and check RDN attributes
	fn complete(&mut self) -> Result<(Vec<Branch>, Vec<Template>)> {
		let index: HashMap<String, usize> = self
			.templates
			.iter()
			.enumerate()
			.map(|(i, template)| (template.item.name.to_lowercase(), i))
			.collect();
		let templates = &self.templates;
		let resolve = |owner: &str, references: &[SubordinateRef]| -> Result<Vec<Subordinate>> {
			references
				.iter()
				.map(|reference| {
					let Some(&template) = index.get(&reference.name.to_lowercase()) else {
						return Err(Error::template(
							reference.line,
							format!("{owner} references undefined subordinate template {}", reference.name),
						));
					};
					if templates[template].item.rdn_attributes.is_empty() {
						return Err(Error::template(
							reference.line,
							format!("subordinate template {} has no rdnAttr line", reference.name),
						));
					}
					Ok(Subordinate { template, count: reference.count })
				})
				.collect()
		};

		let mut template_subordinates = Vec::with_capacity(self.templates.len());
		for template in &self.templates {
			let owner = format!("template {}", template.item.name);
			template_subordinates.push(resolve(&owner, &template.subordinates)?);
			for rdn in &template.item.rdn_attributes {
				if !template.item.lines.iter().any(|line| line.key == rdn.key) {
					return Err(Error::template(
						template.item.line,
						format!("template {} has no line for RDN attribute {}", template.item.name, rdn.name),
					));
				}
			}
		}
		let mut branch_subordinates = Vec::with_capacity(self.branches.len());
		for branch in &self.branches {
			branch_subordinates.push(resolve(&format!("branch {}", branch.item.dn), &branch.subordinates)?);
		}
		check_cycles(&self.templates, &template_subordinates)?;

		let templates = std::mem::take(&mut self.templates)
			.into_iter()
			.zip(template_subordinates)
			.map(|(pending, subordinates)| Template { subordinates, ..pending.item })
			.collect();
		let branches = std::mem::take(&mut self.branches)
			.into_iter()
			.zip(branch_subordinates)
			.map(|(pending, subordinates)| Branch { subordinates, ..pending.item })
			.collect();
		Ok((branches, templates))
	}
}

/// Tag arguments: split on `:`, trimmed, empty ones dropped
fn split_arguments(text: &str) -> Vec<String> {
	text.split(':').map(str::trim).filter(|argument| !argument.is_empty()).map(str::to_owned).collect()
}

/// Fail if a template is, directly or indirectly, its own subordinate
fn check_cycles(templates: &[Pending<Template>], subordinates: &[Vec<Subordinate>]) -> Result<()> {
	/// Depth first search state
	#[derive(Clone, Copy, PartialEq)]
	enum Visit {
		/// Not seen yet
		New,
		/// On the current path
		Active,
		/// Known to be acyclic
		Done,
	}

	/// Visit one template
	fn visit(
		template: usize,
		templates: &[Pending<Template>],
		subordinates: &[Vec<Subordinate>],
		state: &mut [Visit],
	) -> Result<()> {
		match state[template] {
			Visit::Done => return Ok(()),
			Visit::Active => {
				let template = &templates[template].item;
				return Err(Error::template(
					template.line,
					format!("template {} is its own subordinate", template.name),
				));
			}
			Visit::New => {}
		}
		state[template] = Visit::Active;
		for subordinate in &subordinates[template] {
			visit(subordinate.template, templates, subordinates, state)?;
		}
		state[template] = Visit::Done;
		Ok(())
	}

	let mut state = vec![Visit::New; templates.len()];
	for template in 0..templates.len() {
		visit(template, templates, subordinates, &mut state)?;
	}
	Ok(())
}
