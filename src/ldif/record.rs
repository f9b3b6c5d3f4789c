//! Grouping of physical lines into logical LDIF records.
use std::io::BufRead;

use crate::error::{Error, Result};

/// One record: the logical lines between two blank lines, with folded lines
/// joined and comments removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdifRecord {
	/// 1-based line number of the first line of the record
	pub line_number: usize,
	/// Logical lines of the record
	pub lines: Vec<String>,
}

impl LdifRecord {
	/// The first line, normally the `dn:` line
	#[must_use]
	pub fn first_line(&self) -> &str {
		self.lines.first().map_or("", String::as_str)
	}
}

/// State of the line folder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
	/// Before the first line of a record
	Start,
	/// Inside a comment before the first line of a record
	StartComment,
	/// After a content line
	GotLine,
	/// Inside a comment after a content line
	GotComment,
}

/// Reads [`LdifRecord`]s from a line source.
#[derive(Debug)]
pub(crate) struct RecordReader<R> {
	/// The line source
	input: R,
	/// Number of physical lines read so far
	line_number: usize,
	/// Scratch buffer for reading lines
	buffer: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
	/// Wrap a line source
	pub(crate) fn new(input: R) -> Self {
		Self { input, line_number: 0, buffer: Vec::new() }
	}

	/// Read the next physical line into `buffer`, without its line
	/// terminator. Returns `false` at the end of the input.
	fn read_bytes(&mut self) -> Result<bool> {
		self.buffer.clear();
		if self.input.read_until(b'\n', &mut self.buffer)? == 0 {
			return Ok(false);
		}
		self.line_number += 1;
		if self.buffer.last() == Some(&b'\n') {
			self.buffer.pop();
			if self.buffer.last() == Some(&b'\r') {
				self.buffer.pop();
			}
		}
		Ok(true)
	}

	/// Next physical line. A line that is not UTF-8 is reported as
	/// [`Error::Malformed`] and the rest of its record is skipped.
	fn read_line(&mut self) -> Result<Option<String>> {
		if !self.read_bytes()? {
			return Ok(None);
		}
		let mut bytes = self.buffer.as_slice();
		if self.line_number == 1 {
			bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
		}
		match std::str::from_utf8(bytes) {
			Ok(line) => Ok(Some(line.to_owned())),
			Err(err) => {
				let line_number = self.line_number;
				self.skip_record()?;
				Err(Error::malformed(line_number, format!("line is not valid UTF-8: {err}")))
			}
		}
	}

	/// Skip lines up to and including the next blank line
	fn skip_record(&mut self) -> Result<()> {
		while self.read_bytes()? {
			if self.buffer.is_empty() {
				break;
			}
		}
		Ok(())
	}

	/// The next record, `None` at the end of the input.
	///
	/// A continuation line at the start of a record and a line that is not
	/// UTF-8 are reported as [`Error::Malformed`]; the offending record is
	/// skipped so reading may resume afterwards.
	pub(crate) fn next_record(&mut self) -> Result<Option<LdifRecord>> {
		let mut state = State::Start;
		let mut lines: Vec<String> = Vec::new();
		let mut first_line = 0;

		while let Some(line) = self.read_line()? {
			let continuation = line.starts_with(' ') || line.starts_with('\t');
			match state {
				State::Start | State::StartComment => {
					if line.is_empty() {
						state = State::Start;
					} else if line.starts_with('#') {
						state = State::StartComment;
					} else if continuation {
						if state == State::Start {
							let line_number = self.line_number;
							self.skip_record()?;
							return Err(Error::malformed(
								line_number,
								"invalid leading space: continuation line without a preceding line",
							));
						}
					} else {
						first_line = self.line_number;
						lines.push(line);
						state = State::GotLine;
					}
				}
				State::GotLine | State::GotComment => {
					if line.is_empty() {
						break;
					} else if line.starts_with('#') {
						state = State::GotComment;
					} else if continuation {
						if state == State::GotLine {
							if let Some(last) = lines.last_mut() {
								last.push_str(&line[1..]);
							}
						}
					} else {
						lines.push(line);
						state = State::GotLine;
					}
				}
			}
		}

		if lines.is_empty() {
			Ok(None)
		} else {
			Ok(Some(LdifRecord { line_number: first_line, lines }))
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use super::{LdifRecord, RecordReader};
	use crate::error::Error;

	fn records(text: &str) -> Vec<LdifRecord> {
		let mut reader = RecordReader::new(text.as_bytes());
		let mut records = Vec::new();
		while let Some(record) = reader.next_record().unwrap() {
			records.push(record);
		}
		records
	}

	#[test]
	fn folding_and_comments() {
		let text = "\u{feff}# leading comment\n #  continued\n\ndn: cn=a,\n dc=x\r\n# inner\n  comment\ncn:\ta\n\n\n\ndn: cn=b\n";
		let records = records(text);
		assert_eq!(records.len(), 2, "Blank line runs separate records");
		assert_eq!(records[0].line_number, 4, "Line numbers are 1-based");
		assert_eq!(records[0].lines, ["dn: cn=a,dc=x", "cn:\ta"], "Folds are joined and comments dropped");
		assert_eq!(records[1].lines, ["dn: cn=b"], "The last record needs no blank line");
	}

	#[test]
	fn tab_continuation() {
		let records = records("dn: cn=a\n\tbc\n");
		assert_eq!(records[0].lines, ["dn: cn=abc"], "Tabs also mark continuations");
	}

	#[test]
	fn leading_continuation_is_malformed() {
		let mut reader = RecordReader::new(" dn: cn=a\ncn: a\n\ndn: cn=b\n".as_bytes());
		let err = reader.next_record().unwrap_err();
		assert!(matches!(err, Error::Malformed { line: 1, .. }), "Reported at the offending line");
		let next = reader.next_record().unwrap().unwrap();
		assert_eq!(next.lines, ["dn: cn=b"], "Reading resumes at the next record");
		assert!(reader.next_record().unwrap().is_none());
	}

	#[test]
	fn invalid_utf8_is_malformed() {
		let mut reader = RecordReader::new(&b"dn: cn=a\ncn: \xff\xfe\n more\n\ndn: cn=b\n"[..]);
		let err = reader.next_record().unwrap_err();
		assert!(matches!(err, Error::Malformed { line: 2, .. }), "Reported with its line: {err}");
		let next = reader.next_record().unwrap().unwrap();
		assert_eq!(next.lines, ["dn: cn=b"], "The rest of the bad record is skipped");
		assert_eq!(next.line_number, 5);
		assert!(reader.next_record().unwrap().is_none());
	}
}
