//! Decoding of `name: value`, `name:: base64` and `name:< url` lines.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::{
	dn::Dn,
	error::{Error, Result},
};

/// How the value of a line is encoded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ValueKind {
	/// Verbatim UTF-8 after `:`
	Plain,
	/// Base64 after `::`
	Base64,
	/// URL after `:<`
	Url,
}

/// A line split at its first colon
#[derive(Clone, Copy, Debug)]
pub(crate) struct Line<'a> {
	/// Text before the colon
	pub(crate) key: &'a str,
	/// Encoding of the value
	pub(crate) kind: ValueKind,
	/// Encoded value with leading spaces removed
	pub(crate) value: &'a str,
}

impl<'a> Line<'a> {
	/// Split a logical line. `line_number` is used for diagnostics.
	pub(crate) fn parse(line: &'a str, line_number: usize) -> Result<Self> {
		let Some(colon) = line.find(':') else {
			return Err(Error::malformed(
				line_number,
				format!("unable to parse line \"{line}\" because it does not contain a colon"),
			));
		};
		let key = &line[..colon];
		if key.is_empty() {
			return Err(Error::malformed(line_number, format!("line \"{line}\" has no attribute name")));
		}
		let rest = &line[colon + 1..];
		let (kind, value) = if let Some(value) = rest.strip_prefix(':') {
			(ValueKind::Base64, value)
		} else if let Some(value) = rest.strip_prefix('<') {
			(ValueKind::Url, value)
		} else {
			(ValueKind::Plain, rest)
		};
		Ok(Self { key, kind, value: value.trim_start_matches(' ') })
	}

	/// Whether the key equals `keyword`, ignoring case
	pub(crate) fn is(&self, keyword: &str) -> bool {
		self.key.eq_ignore_ascii_case(keyword)
	}

	/// The decoded value
	pub(crate) fn decode(&self, line_number: usize) -> Result<Vec<u8>> {
		match self.kind {
			ValueKind::Plain => Ok(self.value.as_bytes().to_vec()),
			ValueKind::Base64 => decode_base64(self.value, line_number),
			ValueKind::Url => read_url(self.value, line_number),
		}
	}

	/// The decoded value, which must be UTF-8 text and must not be a URL
	pub(crate) fn decode_text(&self, line_number: usize) -> Result<String> {
		let bytes = match self.kind {
			ValueKind::Plain => return Ok(self.value.to_owned()),
			ValueKind::Base64 => decode_base64(self.value, line_number)?,
			ValueKind::Url => {
				return Err(Error::malformed(
					line_number,
					format!("a URL is not allowed as the value of \"{}\"", self.key),
				))
			}
		};
		String::from_utf8(bytes).map_err(|_| {
			Error::malformed(line_number, format!("the value of \"{}\" is not valid UTF-8", self.key))
		})
	}

	/// The value decoded as a DN
	pub(crate) fn decode_dn(&self, line_number: usize) -> Result<Dn> {
		let text = self.decode_text(line_number)?;
		text.parse().map_err(|err: Error| Error::malformed(line_number, err.to_string()))
	}
}

/// Decode base64, reporting failures as malformed records
pub(crate) fn decode_base64(value: &str, line_number: usize) -> Result<Vec<u8>> {
	STANDARD
		.decode(value.trim_end())
		.map_err(|err| Error::malformed(line_number, format!("unable to base64 decode \"{value}\": {err}")))
}

/// Read the full contents of a `file:` URL
pub(crate) fn read_url(value: &str, line_number: usize) -> Result<Vec<u8>> {
	let url_error = |source| Error::Url { line: line_number, url: value.to_owned(), source };
	let url = Url::parse(value)
		.map_err(|err| Error::malformed(line_number, format!("invalid URL \"{value}\": {err}")))?;
	if url.scheme() != "file" {
		return Err(url_error(std::io::Error::new(
			std::io::ErrorKind::Unsupported,
			format!("unsupported URL scheme {}", url.scheme()),
		)));
	}
	let path = url.to_file_path().map_err(|()| {
		url_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, "URL is not a local file path"))
	})?;
	std::fs::read(path).map_err(url_error)
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use std::io::Write;

	use super::{Line, ValueKind};
	use crate::error::Error;

	#[test]
	fn split_lines() -> Result<(), Box<dyn std::error::Error>> {
		let line = Line::parse("cn:   John", 1)?;
		assert_eq!((line.key, line.kind, line.value), ("cn", ValueKind::Plain, "John"));
		assert_eq!(line.decode(1)?, b"John", "Leading spaces are skipped");

		let line = Line::parse("cn;lang-en:: Sm9obg==", 1)?;
		assert_eq!(line.kind, ValueKind::Base64);
		assert_eq!(line.decode(1)?, b"John");

		let line = Line::parse("description:", 1)?;
		assert!(line.decode(1)?.is_empty(), "No value is the empty value");

		assert!(matches!(Line::parse("no colon", 7), Err(Error::Malformed { line: 7, .. })));
		assert!(Line::parse(": value", 1).is_err(), "The name must not be empty");
		Ok(())
	}

	#[test]
	fn invalid_base64_is_malformed() -> Result<(), Box<dyn std::error::Error>> {
		let err = Line::parse("cn:: !!!", 3)?.decode(3).unwrap_err();
		assert!(matches!(err, Error::Malformed { line: 3, .. }), "Not a crash, a decode error");
		Ok(())
	}

	#[test]
	fn url_values() -> Result<(), Box<dyn std::error::Error>> {
		let mut file = tempfile::NamedTempFile::new()?;
		file.write_all(&[0, 1, 2, 0xff])?;
		let url = url::Url::from_file_path(file.path()).unwrap();

		let line = format!("jpegPhoto:< {url}");
		assert_eq!(Line::parse(&line, 1)?.decode(1)?, [0, 1, 2, 0xff], "File contents are read");

		let missing = "jpegPhoto:< file:///does/not/exist";
		let err = Line::parse(missing, 5)?.decode(5).unwrap_err();
		assert!(
			matches!(&err, Error::Url { line: 5, url, .. } if url == "file:///does/not/exist"),
			"I/O failures name the URL"
		);

		let remote = Line::parse("jpegPhoto:< http://example.com/a.jpg", 1)?.decode(1);
		assert!(matches!(remote, Err(Error::Url { .. })), "Only file URLs are supported");
		Ok(())
	}

	#[test]
	fn dn_values() -> Result<(), Box<dyn std::error::Error>> {
		let dn = Line::parse("dn:: Y249YSxkYz14", 1)?.decode_dn(1)?;
		assert_eq!(dn.to_string(), "cn=a,dc=x");
		assert!(Line::parse("dn:< file:///tmp/x", 1)?.decode_dn(1).is_err(), "No URLs for DNs");
		Ok(())
	}
}
