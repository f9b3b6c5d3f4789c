//! Line level output shared by the entry and change record writers.
use std::io::Write;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::Result;

/// Whether a value has to be base64 encoded to survive a plain `name: value`
/// line.
#[must_use]
pub fn needs_base64(value: &[u8]) -> bool {
	match (value.first(), value.last()) {
		(None, _) => false,
		(Some(b' ' | b':' | b'<'), _) | (_, Some(b' ')) => true,
		_ => value.iter().any(|&b| b == 0 || b == b'\n' || b == b'\r' || b >= 0x80),
	}
}

/// Writes physical lines, folding and commenting as configured.
#[derive(Debug)]
pub(crate) struct LdifOutput<W> {
	/// The sink
	sink: W,
	/// Maximum physical line length, folding disabled if below 2
	wrap_column: usize,
	/// Add readable comments before base64 encoded text
	user_friendly_comments: bool,
}

impl<W: Write> LdifOutput<W> {
	/// Unwrapped output without comments
	pub(crate) fn new(sink: W) -> Self {
		Self { sink, wrap_column: 0, user_friendly_comments: false }
	}

	/// Set the fold column
	pub(crate) fn set_wrap_column(&mut self, wrap_column: usize) {
		self.wrap_column = wrap_column;
	}

	/// Toggle user friendly comments
	pub(crate) fn set_user_friendly_comments(&mut self, enabled: bool) {
		self.user_friendly_comments = enabled;
	}

	/// Write one logical line, folding it if it exceeds the wrap column
	pub(crate) fn write_line(&mut self, line: &str) -> Result<()> {
		if self.wrap_column > 1 && line.chars().count() > self.wrap_column {
			let chars: Vec<char> = line.chars().collect();
			let (first, rest) = chars.split_at(self.wrap_column);
			writeln!(self.sink, "{}", first.iter().collect::<String>())?;
			for chunk in rest.chunks(self.wrap_column - 1) {
				writeln!(self.sink, " {}", chunk.iter().collect::<String>())?;
			}
		} else {
			writeln!(self.sink, "{line}")?;
		}
		Ok(())
	}

	/// Write `key: value` or `key:: base64`
	pub(crate) fn write_value(&mut self, key: &str, value: &[u8]) -> Result<()> {
		if !needs_base64(value) {
			// safe values are ASCII, bytes >= 0x80 force base64
			return self.write_line(&format!("{key}: {}", String::from_utf8_lossy(value)));
		}
		if self.user_friendly_comments {
			if let Ok(text) = std::str::from_utf8(value) {
				if !text.chars().any(char::is_control) {
					self.write_comment(&format!("{key}: {text}"))?;
				}
			}
		}
		self.write_line(&format!("{key}:: {}", STANDARD.encode(value)))
	}

	/// Write a `# ` comment, one per line of text, wrapped so that each
	/// physical line fits the wrap column
	pub(crate) fn write_comment(&mut self, comment: &str) -> Result<()> {
		for line in comment.lines() {
			if self.wrap_column > 2 {
				let chars: Vec<char> = line.chars().collect();
				if chars.is_empty() {
					writeln!(self.sink, "#")?;
				}
				for chunk in chars.chunks(self.wrap_column - 2) {
					writeln!(self.sink, "# {}", chunk.iter().collect::<String>())?;
				}
			} else {
				writeln!(self.sink, "# {line}")?;
			}
		}
		Ok(())
	}

	/// Terminate a record
	pub(crate) fn end_record(&mut self) -> Result<()> {
		writeln!(self.sink)?;
		Ok(())
	}

	/// Flush the sink
	pub(crate) fn flush(&mut self) -> Result<()> {
		self.sink.flush()?;
		Ok(())
	}

	/// Give back the sink
	pub(crate) fn into_inner(self) -> W {
		self.sink
	}
}
