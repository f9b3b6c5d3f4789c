#![allow(
	clippy::dbg_macro,
	clippy::expect_used,
	clippy::missing_docs_in_private_items,
	clippy::print_stderr,
	clippy::print_stdout,
	clippy::unwrap_used,
	clippy::bool_assert_comparison
)]
use std::{error::Error, sync::Arc};

use ldif_toolkit::{
	diff::diff_entries,
	entry::Attribute,
	ldif::{
		entry_filter::EntryFilter, listener::OverwritePatchListener, LdifChangeRecordReader,
		LdifEntryReader, LdifEntryWriter,
	},
	patch::{patch, patch_with_listener},
	search::search,
	template::{EntryGenerator, TemplateParser},
	Entry, EntryExt, GeneratorConfig, Schema, SearchRequest, SearchScope, TemplateFile,
};

mod common;

use common::{init_tracing, read_entries, sorted, write_entries, PEOPLE};

#[test]
fn parse_single_entry() -> Result<(), Box<dyn Error>> {
	let entries = read_entries("dn: cn=a,dc=x\nobjectclass: top\ncn: a\n\n")?;
	assert_eq!(entries.len(), 1);
	let expected = Entry::from_pairs("cn=a,dc=x", [("objectclass", "top"), ("cn", "a")])?;
	assert_eq!(entries[0], expected);
	Ok(())
}

#[test]
fn round_trip() -> Result<(), Box<dyn Error>> {
	init_tracing();
	let entries = read_entries(PEOPLE)?;
	assert_eq!(entries.len(), 4);

	let written = write_entries(&entries, LdifEntryWriter::new(Vec::new()))?;
	assert_eq!(read_entries(&written)?, entries);
	Ok(())
}

#[test]
fn unsafe_values_are_base64_encoded() -> Result<(), Box<dyn Error>> {
	let mut entry = Entry::new("cn=a,dc=x".parse()?);
	entry.add_value("userPassword".parse()?, b"{SSHA}\xff\xfe".to_vec());
	entry.add_value("description".parse()?, b" leading space".to_vec());
	entry.add_value("description".parse()?, b"two\nlines".to_vec());

	let written = write_entries(&[entry.clone()], LdifEntryWriter::new(Vec::new()))?;
	assert!(written.contains("userPassword:: e1NTSEF9//4=\n"), "{written}");
	assert!(!written.contains("description: "), "{written}");

	let read = read_entries(&written)?;
	assert_eq!(read, [entry]);
	assert_eq!(read[0].bin_attr_first("userPassword"), Some(&b"{SSHA}\xff\xfe"[..]));
	Ok(())
}

#[test]
fn folding_is_reversible() -> Result<(), Box<dyn Error>> {
	let long: String = (0..300).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
	let entry = Entry::from_pairs("cn=long,dc=x", [("cn", "long"), ("description", long.as_str())])?;
	for wrap_column in [2, 3, 10, 76] {
		let written =
			write_entries(&[entry.clone()], LdifEntryWriter::new(Vec::new()).with_wrap_column(wrap_column))?;
		assert!(written.lines().all(|line| line.len() <= wrap_column), "{wrap_column}: {written}");
		assert_eq!(read_entries(&written)?, [entry.clone()], "Folded at {wrap_column}");
	}
	Ok(())
}

#[test]
fn exclusion_wins_over_inclusion() -> Result<(), Box<dyn Error>> {
	let both = EntryFilter::new(Schema::core())
		.include_attribute("cn")
		.include_attribute("mail")
		.exclude_attribute("mail");
	let entries: Vec<Entry> =
		LdifEntryReader::new(PEOPLE.as_bytes()).with_filter(both).collect::<Result<_, _>>()?;
	let user = &entries[2];
	assert!(user.has_attribute("cn"));
	assert!(!user.has_attribute("mail"), "Excluded although included");
	assert!(!user.has_attribute("sn"), "Not included");

	let written = write_entries(
		&read_entries(PEOPLE)?,
		LdifEntryWriter::new(Vec::new()).with_filter(EntryFilter::new(Schema::core()).include_attribute("sn")),
	)?;
	let names: Vec<&str> = written.lines().filter(|l| !l.is_empty()).filter_map(|l| l.split(':').next()).collect();
	assert!(names.iter().all(|name| *name == "dn" || *name == "sn"), "{written}");
	Ok(())
}

#[test]
fn patch_of_diff_gives_the_target() -> Result<(), Box<dyn Error>> {
	init_tracing();
	let source = read_entries(PEOPLE)?;
	let mut target = source.clone();
	target.remove(3);
	target[2].replace_attribute(Attribute::with_values("description".parse()?, ["Renamed", "Twice"]));
	target[2].remove_values(&"mail".parse()?, &[b"user01@example.org".to_vec()]);
	target.push(Entry::from_pairs("cn=user03,ou=users,dc=example,dc=org", [("cn", "user03"), ("sn", "User3")])?);

	let changes = diff_entries(source.clone().into_iter(), target.clone().into_iter())?;
	let patched: Vec<Entry> = patch(source.into_iter(), changes)?.collect::<Result<_, _>>()?;
	assert_eq!(sorted(patched), sorted(target));
	Ok(())
}

#[test]
fn duplicate_adds_follow_the_listener() -> Result<(), Box<dyn Error>> {
	let changes = || {
		LdifChangeRecordReader::from_lines([
			"dn: cn=user02,ou=users,dc=example,dc=org",
			"changetype: add",
			"objectClass: person",
			"cn: user02",
			"sn: Replaced",
			"",
			"dn: ou=groups,dc=example,dc=org",
			"changetype: add",
			"ou: groups",
		])
	};
	let input = || LdifEntryReader::new(PEOPLE.as_bytes());

	assert!(patch(input(), changes()).is_err(), "Fail fast stops at the duplicate");

	let patched: Vec<Entry> =
		patch_with_listener(input(), changes(), &mut OverwritePatchListener)?.collect::<Result<_, _>>()?;
	assert_eq!(patched.len(), 5, "Processing continues after the duplicate");
	let user = patched.iter().find(|e| e.attr_first("cn") == Some("user02")).unwrap();
	assert_eq!(user.attr_first("sn"), Some("Replaced"));
	assert!(!user.has_attribute("displayName"), "The stored entry is replaced as a whole");
	Ok(())
}

#[test]
fn template_rdn_attribute_without_line() {
	let err = TemplateFile::parse("template: person\nrdnAttr: uid\ncn: nobody\n").unwrap_err();
	assert!(err.to_string().contains("uid"), "{err}");
}

#[test]
fn template_entry_counts() -> Result<(), Box<dyn Error>> {
	let text = "branch: ou=a,dc=x\nsubordinateTemplate: p:[count]\n\ntemplate: p\nrdnAttr: cn\ncn: <guid>\n";
	for count in [0_usize, 1, 17] {
		let file = TemplateParser::new(Schema::core())
			.with_constants([("count", count.to_string())])
			.parse_str(text)?;
		let generated = EntryGenerator::new(Arc::new(file), None).with_branch_entries(false).count();
		assert_eq!(generated, count);
	}

	let unbounded = TemplateParser::new(Schema::core()).with_constants([("count", "-1")]).parse_str(text)?;
	let generated = EntryGenerator::new(Arc::new(unbounded), None).take(1000).count();
	assert_eq!(generated, 1000, "A negative count never runs out");
	Ok(())
}

#[test]
fn generated_directory_can_be_written_and_searched() -> Result<(), Box<dyn Error>> {
	init_tracing();
	let config = GeneratorConfig {
		constants: [("numusers".to_owned(), "25".to_owned())].into(),
		seed: Some(3),
		..GeneratorConfig::default()
	};
	let generated: Vec<Entry> =
		EntryGenerator::from_config(&config, Schema::core())?.collect::<Result<_, _>>()?;
	assert_eq!(generated.len(), 27);

	let written = write_entries(&generated, LdifEntryWriter::new(Vec::new()).with_wrap_column(76))?;
	let read = read_entries(&written)?;
	assert_eq!(read, generated);

	let request = SearchRequest::new(
		"ou=People,dc=example,dc=com".parse()?,
		SearchScope::OneLevel,
		"(&(objectClass=inetOrgPerson)(uid=user.1*))".parse()?,
	)
	.with_attributes(["mail"]);
	let found: Vec<Entry> = search(read.into_iter(), &request, Schema::core()).collect::<Result<_, _>>()?;
	let mails: Vec<&str> = found.iter().filter_map(|entry| entry.attr_first("mail")).collect();
	assert_eq!(mails.len(), 11, "user.1 and user.10 to user.19: {mails:?}");
	assert!(found.iter().all(|entry| entry.attributes().len() == 1));
	Ok(())
}
