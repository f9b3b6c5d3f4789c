use std::error::Error;

use ldif_toolkit::{
	ldif::{EntryWriter, LdifEntryReader, LdifEntryWriter},
	Entry,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// A small directory used by several tests
pub const PEOPLE: &str = "\
version: 1

dn: dc=example,dc=org
objectClass: top
objectClass: domain
dc: example

dn: ou=users,dc=example,dc=org
objectClass: organizationalUnit
ou: users

dn: cn=user01,ou=users,dc=example,dc=org
objectClass: inetOrgPerson
cn: user01
sn: User1
mail: user01@example.org
description: First user

dn: cn=user02,ou=users,dc=example,dc=org
objectClass: inetOrgPerson
cn: user02
sn: User2
displayName: MyName2
";

/// Log to the test output, honouring `RUST_LOG`
pub fn init_tracing() {
	let filter =
		EnvFilter::builder().with_default_directive(LevelFilter::DEBUG.into()).from_env_lossy();
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

pub fn read_entries(ldif: &str) -> Result<Vec<Entry>, Box<dyn Error>> {
	Ok(LdifEntryReader::new(ldif.as_bytes()).collect::<Result<_, _>>()?)
}

pub fn write_entries(
	entries: &[Entry],
	writer: LdifEntryWriter<Vec<u8>>,
) -> Result<String, Box<dyn Error>> {
	let mut writer = writer;
	for entry in entries {
		writer.write_entry(entry)?;
	}
	Ok(String::from_utf8(writer.close()?)?)
}

/// Entries sorted by DN, for comparing streams in different orders
pub fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
	entries.sort_by_key(|entry| entry.dn().sort_key());
	entries
}
