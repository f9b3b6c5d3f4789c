//! Data files bundled with the crate and lookup of data files referenced by
//! templates.
use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use crate::error::{Error, Result};

/// Template used when no template file is configured
pub const EXAMPLE_TEMPLATE: &str = include_str!("resources/example.template");

/// Bundled data files by name
const BUNDLED: &[(&str, &str)] = &[
	("first.names", include_str!("resources/first.names")),
	("last.names", include_str!("resources/last.names")),
	("cities", include_str!("resources/cities")),
	("states", include_str!("resources/states")),
	("streets", include_str!("resources/streets")),
];

/// The non-empty lines of a data file
fn lines_of(text: &str) -> Arc<[String]> {
	text.lines().map(str::trim_end).filter(|line| !line.is_empty()).map(str::to_owned).collect()
}

/// Finds data files referenced by a template.
///
/// A path is tried as written, then below the resource directory, then below
/// the directory holding the template file and finally among the bundled
/// files.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResourceLoader {
	/// Directory configured by the caller
	resource_path: Option<PathBuf>,
	/// Directory of the template file being parsed
	template_dir: Option<PathBuf>,
}

impl ResourceLoader {
	/// Search `resource_path` and `template_dir` besides the working directory
	pub(crate) fn new(resource_path: Option<PathBuf>, template_dir: Option<PathBuf>) -> Self {
		Self { resource_path, template_dir }
	}

	/// Read the lines of a data file
	pub(crate) fn read_lines(&self, name: &str, line: usize) -> Result<Arc<[String]>> {
		let candidates = std::iter::once(PathBuf::from(name))
			.chain(self.resource_path.iter().map(|dir| dir.join(name)))
			.chain(self.template_dir.iter().map(|dir| dir.join(name)));
		for path in candidates {
			if path.is_file() {
				return read_file(&path, line);
			}
		}
		match BUNDLED.iter().find(|(bundled, _)| *bundled == name) {
			Some((_, text)) => Ok(lines_of(text)),
			None => Err(Error::template(line, format!("unable to find data file \"{name}\""))),
		}
	}
}

/// Read a data file from disk
fn read_file(path: &Path, line: usize) -> Result<Arc<[String]>> {
	let text = std::fs::read_to_string(path).map_err(|err| {
		Error::template(line, format!("unable to read data file {}: {err}", path.display()))
	})?;
	tracing::trace!("Read data file {}", path.display());
	Ok(lines_of(&text))
}
