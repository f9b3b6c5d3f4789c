//! Procedural generation of directory entries from template files.
//!
//! A template file describes fixed *branches* and *templates* generating
//! entries below them. Attribute lines are built from tags: static text,
//! `<name:args>` tags such as `<random:alpha:8>` or `<sequential:100>` and
//! `{attr}` references to values generated by earlier lines of the same
//! entry.
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use ldif_toolkit::template::{EntryGenerator, TemplateFile};
//!
//! let file = TemplateFile::parse(
//! 	"branch: ou=people,dc=example,dc=com\n\
//! 	 subordinateTemplate: person:3\n\
//! 	 \n\
//! 	 template: person\n\
//! 	 rdnAttr: uid\n\
//! 	 uid: user.<sequential:1>\n\
//! 	 cn: <first> <last>\n",
//! )?;
//! let entries = EntryGenerator::new(Arc::new(file), Some(7)).collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(entries.len(), 4);
//! assert_eq!(entries[1].dn().to_string(), "uid=user.1,ou=people,dc=example,dc=com");
//! # Ok(())
//! # }
//! ```

mod generator;
mod names;
mod parser;
mod resources;
mod tag;

pub use self::{
	generator::{EntryGenerator, GenerationState, TemplateEntry},
	parser::{TemplateFile, TemplateParser},
	resources::EXAMPLE_TEMPLATE,
	tag::{TagContext, TagFactory, TagRegistry, TagResult, TemplateTag},
};
