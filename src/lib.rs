//! Read, write, compare, patch, search and generate LDIF.
//!
//! The library works on streams of directory entries and change records.
//! [`ldif`] reads and writes them in the LDAP Data Interchange Format of
//! [RFC 2849], including folded lines, base64 and URL values, change records
//! with controls and optional schema validation. On top of the four streaming
//! traits of that module sit three operations which never touch a directory
//! server: [`diff`] computes the change records between two entry streams,
//! [`patch`] applies change records to an entry stream and [`search`]
//! evaluates an LDAP search against one. [`template`] procedurally generates
//! entries for test directories.
//!
//! Entries, DNs, attribute descriptions and search filters are modelled just
//! far enough for these operations. The `ldap3` crate is re-exported: change
//! records convert to its modifications and search scopes convert from its
//! `Scope`, so LDIF changes can be replayed against a directory server. Its
//! [introduction] is a good primer on LDAP itself.
//!
//! [RFC 2849]: https://www.rfc-editor.org/rfc/rfc2849
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! Applying an LDIF change file to an LDIF export might look like so:
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::{fs::File, io::BufReader};
//! use ldif_toolkit::{
//!     config::ReaderConfig,
//!     ldif::{copy_entries, LdifChangeRecordReader, LdifEntryReader, LdifEntryWriter},
//!     patch::patch,
//!     schema::Schema,
//! };
//!
//! // Configuration can also be deserialized with serde.
//! let config = ReaderConfig::default();
//! let entries = LdifEntryReader::from_config(
//!     BufReader::new(File::open("export.ldif")?),
//!     &config,
//!     Schema::core(),
//! )?;
//! let changes = LdifChangeRecordReader::new(BufReader::new(File::open("changes.ldif")?));
//!
//! let patched = patch(entries, changes)?;
//! let count = copy_entries(patched, LdifEntryWriter::new(File::create("patched.ldif")?))?;
//! println!("Wrote {count} entries");
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Diff and patch read their complete inputs into memory before producing
//!   any output.
//! * The built-in schema only knows the core attribute types and object
//!   classes. Schema files cannot be loaded, custom definitions have to be
//!   added in code.
//! * Only `file:` URLs can be dereferenced.
//! * Patch skips `increment` modifications with a warning.
//! * Extensible match filters are rejected when a filter is parsed.

pub mod config;
pub mod diff;
pub mod dn;
pub mod entry;
pub mod error;
pub mod filter;
pub mod ldif;
pub mod patch;
pub mod schema;
pub mod search;
pub mod template;

pub use ldap3;

pub use crate::{
	config::{GeneratorConfig, ReaderConfig, SchemaValidationPolicy, WriterConfig},
	dn::{Dn, Rdn},
	entry::{Attribute, AttributeDescription, Entry, EntryExt},
	error::{Error, Result},
	filter::Filter,
	ldif::{ChangeRecord, ChangeRecordReader, ChangeRecordWriter, EntryReader, EntryWriter},
	schema::Schema,
	search::{SearchRequest, SearchScope},
	template::{EntryGenerator, TemplateFile},
};
