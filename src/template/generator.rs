//! Pull-based generation of entries from a parsed template file.
use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use super::{
	names::NameGenerator,
	parser::{RdnAttribute, Subordinate, TemplateFile, TemplateLine, TemplateParser, ValueEncoding},
	resources::EXAMPLE_TEMPLATE,
	tag::TagResult,
};
use crate::{
	config::GeneratorConfig,
	dn::{Ava, Dn, Rdn},
	entry::Entry,
	error::{Error, Result},
	ldif::{
		value::{decode_base64, read_url},
		EntryReader,
	},
	schema::Schema,
};

/// Mutable state of one generation run.
///
/// Tags are immutable, everything that changes from entry to entry lives
/// here.
#[derive(Debug)]
pub struct GenerationState {
	/// Source of all randomness
	rng: StdRng,
	/// First and last names of the current entry
	names: NameGenerator,
	/// Counters allocated by tags while parsing
	counters: Vec<i64>,
}

impl GenerationState {
	/// Fresh state for a template file, reproducible if seeded
	fn new(file: &TemplateFile, seed: Option<u64>) -> Self {
		Self {
			rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
			names: NameGenerator::new(file.first_names.clone(), file.last_names.clone()),
			counters: file.counters.clone(),
		}
	}

	/// State for exercising tags outside a template file
	#[cfg(test)]
	pub(crate) fn for_tests(counters: Vec<i64>) -> Self {
		let first: Arc<[String]> = Arc::from(vec!["Ann".to_owned(), "Bob".to_owned()]);
		let last: Arc<[String]> = Arc::from(vec!["Smith".to_owned()]);
		Self { rng: StdRng::seed_from_u64(7), names: NameGenerator::new(first, last), counters }
	}

	/// The random number generator
	pub fn rng(&mut self) -> &mut StdRng {
		&mut self.rng
	}

	/// First name of the current entry
	#[must_use]
	pub fn first_name(&self) -> &str {
		self.names.first()
	}

	/// Last name of the current entry
	#[must_use]
	pub fn last_name(&self) -> &str {
		self.names.last()
	}

	/// A counter allocated with
	/// [`TagContext::allocate_counter`](super::TagContext::allocate_counter),
	/// `None` if `slot` was not allocated for the template file this state
	/// was created for
	pub fn counter(&mut self, slot: usize) -> Option<&mut i64> {
		self.counters.get_mut(slot)
	}
}

/// An entry being generated.
///
/// Values are looked up by canonical attribute name, see
/// [`TagContext::attribute_key`](super::TagContext::attribute_key).
#[derive(Debug)]
pub struct TemplateEntry<'a> {
	/// DN of a branch entry
	dn: Option<&'a Dn>,
	/// Parent of a template entry
	parent_dn: Option<&'a Dn>,
	/// Attributes forming the RDN of a template entry
	rdn_attributes: &'a [RdnAttribute],
	/// Generated values in line order
	values: Vec<(&'a TemplateLine, String)>,
}

impl<'a> TemplateEntry<'a> {
	/// An entry with a fixed DN
	pub(crate) fn for_branch(dn: &'a Dn) -> Self {
		Self { dn: Some(dn), parent_dn: None, rdn_attributes: &[], values: Vec::new() }
	}

	/// An entry below `parent` whose RDN is made of generated values
	pub(crate) fn for_template(parent: &'a Dn, rdn_attributes: &'a [RdnAttribute]) -> Self {
		Self { dn: None, parent_dn: Some(parent), rdn_attributes, values: Vec::new() }
	}

	/// The DN, `None` while a value of an RDN attribute is missing
	#[must_use]
	pub fn dn(&self) -> Option<Dn> {
		if let Some(dn) = self.dn {
			return Some(dn.clone());
		}
		let avas = self
			.rdn_attributes
			.iter()
			.map(|rdn| self.value(&rdn.key).map(|value| Ava::new(rdn.name.clone(), value)))
			.collect::<Option<Vec<_>>>()?;
		Some(self.parent_dn?.child(Rdn::from_avas(avas)?))
	}

	/// The parent DN of a template entry
	#[must_use]
	pub fn parent_dn(&self) -> Option<&Dn> {
		self.parent_dn
	}

	/// The first value generated for an attribute
	#[must_use]
	pub fn value(&self, key: &str) -> Option<&str> {
		self.values(key).next()
	}

	/// All values generated for an attribute
	pub fn values<'s>(&'s self, key: &str) -> impl Iterator<Item = &'s str> + 's {
		let key = key.to_owned();
		let values: &'s [(&'s TemplateLine, String)] = &self.values;
		values.iter().filter(move |(line, _)| line.key == key).map(|(_, value)| value.as_str())
	}

	/// Evaluate lines in order. Lines waiting for the DN are resumed at the
	/// tag that was not ready once all other lines are done.
	fn generate(&mut self, lines: &'a [TemplateLine], state: &mut GenerationState) {
		let mut suspended = Vec::new();
		for line in lines {
			let mut value = String::new();
			match evaluate(line, 0, self, &mut value, state) {
				Step::Done => self.values.push((line, value)),
				Step::Omitted => {}
				Step::Suspended(index) => suspended.push((line, index, value)),
			}
		}
		for (line, index, mut value) in suspended {
			match evaluate(line, index, self, &mut value, state) {
				Step::Done => self.values.push((line, value)),
				Step::Omitted => {}
				Step::Suspended(_) => {
					tracing::trace!("Omitting line {} since the DN is still unknown", line.line);
				}
			}
		}
	}

	/// Convert to an entry. `line` is reported if the DN is incomplete.
	fn into_entry(self, line: usize) -> Result<Entry> {
		let Some(dn) = self.dn() else {
			let missing: Vec<&str> = self
				.rdn_attributes
				.iter()
				.filter(|rdn| self.value(&rdn.key).is_none())
				.map(|rdn| rdn.name.as_str())
				.collect();
			return Err(Error::template(
				line,
				format!("no value generated for RDN attribute {}", missing.join("+")),
			));
		};
		let mut entry = Entry::new(dn);
		for (template_line, text) in self.values {
			let value = match template_line.encoding {
				ValueEncoding::Plain => text.into_bytes(),
				ValueEncoding::Base64 => decode_base64(&text, template_line.line)
					.map_err(|err| Error::template(template_line.line, err.to_string()))?,
				ValueEncoding::Url => read_url(&text, template_line.line)?,
			};
			entry.add_value(template_line.description.clone(), value);
		}
		Ok(entry)
	}
}

/// Outcome of evaluating a line
#[derive(Debug)]
enum Step {
	/// All tags succeeded
	Done,
	/// A tag asked to leave the line out
	Omitted,
	/// The tag at this index needs the DN
	Suspended(usize),
}

/// Evaluate the tags of a line starting at `start`
fn evaluate(
	line: &TemplateLine,
	start: usize,
	entry: &TemplateEntry<'_>,
	value: &mut String,
	state: &mut GenerationState,
) -> Step {
	for (index, tag) in line.tags.iter().enumerate().skip(start) {
		match tag.generate_value(entry, value, state) {
			TagResult::Success => {}
			TagResult::Omit => return Step::Omitted,
			TagResult::NotReady => return Step::Suspended(index),
		}
	}
	Step::Done
}

/// Generation of one template below one parent
#[derive(Debug)]
struct Frame {
	/// Index into [`TemplateFile::templates`]
	template: usize,
	/// DN the entries are generated below
	parent: Dn,
	/// Entries still to generate, `None` for no limit
	remaining: Option<u64>,
	/// Whether the template's tags were told about the new parent
	started: bool,
}

/// Generates the entries described by a template file.
///
/// Each branch entry is followed by the entries of its subordinate templates.
/// Every template entry is followed by all entries generated below it before
/// the next entry of the same template. Subordinate templates without a count
/// never run out, so the consumer decides when to stop.
#[derive(Debug)]
pub struct EntryGenerator {
	/// The parsed template
	file: Arc<TemplateFile>,
	/// Randomness, names and counters
	state: GenerationState,
	/// Whether branch entries are returned
	generate_branches: bool,
	/// Next branch to generate
	next_branch: usize,
	/// Templates being generated, innermost last
	stack: Vec<Frame>,
	/// Set after an error, no more entries are generated
	failed: bool,
}

impl EntryGenerator {
	/// Generate from a parsed template file. The same seed produces the same
	/// entries.
	#[must_use]
	pub fn new(file: Arc<TemplateFile>, seed: Option<u64>) -> Self {
		let state = GenerationState::new(&file, seed);
		Self { file, state, generate_branches: true, next_branch: 0, stack: Vec::new(), failed: false }
	}

	/// Parse the configured template, or the bundled example template if none
	/// is set, and generate from it
	pub fn from_config(config: &GeneratorConfig, schema: Arc<Schema>) -> Result<Self> {
		let mut parser = TemplateParser::new(schema).with_constants(&config.constants);
		if let Some(path) = &config.resource_path {
			parser = parser.with_resource_path(path);
		}
		let file = match &config.template_path {
			Some(path) => parser.parse_file(path)?,
			None => parser.parse_str(EXAMPLE_TEMPLATE)?,
		};
		Ok(Self::new(Arc::new(file), config.seed).with_branch_entries(config.generate_branches))
	}

	/// Whether entries for the branches themselves are returned
	#[must_use]
	pub fn with_branch_entries(mut self, generate_branches: bool) -> Self {
		self.generate_branches = generate_branches;
		self
	}

	/// The template file entries are generated from
	#[must_use]
	pub fn template_file(&self) -> &Arc<TemplateFile> {
		&self.file
	}

	/// Warnings produced while parsing the template file
	#[must_use]
	pub fn warnings(&self) -> &[String] {
		self.file.warnings()
	}

	/// Push the subordinates of a new entry so the first one runs next
	fn push_subordinates(&mut self, subordinates: &[Subordinate], parent: &Dn) {
		for subordinate in subordinates.iter().rev() {
			self.stack.push(Frame {
				template: subordinate.template,
				parent: parent.clone(),
				remaining: subordinate.count,
				started: false,
			});
		}
	}

	/// The next entry of the innermost template, `None` if it is done
	fn next_template_entry(&mut self) -> Option<Result<Entry>> {
		let file = self.file.clone();
		let frame = self.stack.last_mut()?;
		if frame.remaining == Some(0) {
			self.stack.pop();
			return None;
		}
		let template = &file.templates[frame.template];
		if !frame.started {
			frame.started = true;
			for tag in template.lines.iter().flat_map(|line| &line.tags) {
				tag.initialize_for_parent(&mut self.state);
			}
		}
		if let Some(remaining) = frame.remaining.as_mut() {
			*remaining -= 1;
		}

		self.state.names.next_pair();
		let parent = frame.parent.clone();
		let mut entry = TemplateEntry::for_template(&parent, &template.rdn_attributes);
		entry.generate(&template.lines, &mut self.state);
		let entry = match entry.into_entry(template.line) {
			Ok(entry) => entry,
			Err(err) => return Some(Err(err)),
		};
		self.push_subordinates(&template.subordinates, entry.dn());
		Some(Ok(entry))
	}

	/// The entry of the next branch, `None` once all branches are done
	fn next_branch_entry(&mut self) -> Option<Result<Entry>> {
		let file = self.file.clone();
		let branch = file.branches.get(self.next_branch)?;
		self.next_branch += 1;
		let mut entry = TemplateEntry::for_branch(&branch.dn);
		entry.generate(&branch.lines, &mut self.state);
		let entry = match entry.into_entry(0) {
			Ok(entry) => entry,
			Err(err) => return Some(Err(err)),
		};
		self.push_subordinates(&branch.subordinates, &branch.dn);
		Some(Ok(entry))
	}
}

impl EntryReader for EntryGenerator {
	fn read_entry(&mut self) -> Result<Option<Entry>> {
		while !self.failed {
			let next = if self.stack.is_empty() {
				match self.next_branch_entry() {
					Some(entry) if self.generate_branches => Some(entry),
					Some(Ok(_)) => continue,
					Some(Err(err)) => Some(Err(err)),
					None => return Ok(None),
				}
			} else {
				self.next_template_entry()
			};
			match next {
				Some(Ok(entry)) => return Ok(Some(entry)),
				Some(Err(err)) => {
					self.failed = true;
					return Err(err);
				}
				None => {}
			}
		}
		Ok(None)
	}
}

impl Iterator for EntryGenerator {
	type Item = Result<Entry>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read_entry().transpose()
	}
}
