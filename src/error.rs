//! Error codes

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// A record violated the LDIF grammar (missing colon, missing DN, bad
	/// base64 and similar).
	#[error("Malformed LDIF record at line {line}: {message}")]
	Malformed {
		/// Line number of the first line of the offending record
		line: usize,
		/// Human readable description of the problem
		message: String,
	},
	/// An attribute description or modification type does not conform to
	/// its syntax.
	#[error("Invalid attribute description or modification type \"{0}\"")]
	Invalid(String),
	/// A `:<` URL value could not be dereferenced.
	#[error("Unable to read URL {url} referenced at line {line}: {source}")]
	Url {
		/// Line number of the record containing the URL
		line: usize,
		/// The URL as written in the record
		url: String,
		/// Underlying I/O failure
		#[source]
		source: std::io::Error,
	},
	/// A distinguished name could not be parsed.
	#[error("Invalid DN \"{dn}\": {message}")]
	InvalidDn {
		/// The DN as provided
		dn: String,
		/// Human readable description of the problem
		message: String,
	},
	/// A record was rejected by schema validation and the listener escalated
	/// the rejection.
	#[error("Entry {dn} rejected at line {line}: {}", messages.join("; "))]
	Rejected {
		/// DN of the rejected entry
		dn: String,
		/// Line number of the first line of the record
		line: usize,
		/// Schema diagnostics
		messages: Vec<String>,
	},
	/// A change record conflicted with the entries it was applied to.
	#[error("Unable to apply change to {dn}: {message}")]
	Conflict {
		/// DN targeted by the change
		dn: String,
		/// Human readable description of the conflict
		message: String,
	},
	/// A template file could not be parsed or evaluated.
	#[error("Template error at line {line}: {message}")]
	Template {
		/// Line number in the template file, 0 if not line related
		line: usize,
		/// Human readable description of the problem
		message: String,
	},
	/// An LDAP search filter string was malformed.
	#[error("Invalid filter \"{filter}\": {message}")]
	Filter {
		/// The filter as provided
		filter: String,
		/// Human readable description of the problem
		message: String,
	},
	/// The underlying stream failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Shorthand for [`Error::Malformed`]
	pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
		Self::Malformed { line, message: message.into() }
	}

	/// Shorthand for [`Error::Template`]
	pub(crate) fn template(line: usize, message: impl Into<String>) -> Self {
		Self::Template { line, message: message.into() }
	}

	/// Shorthand for [`Error::Conflict`]
	pub(crate) fn conflict(dn: impl ToString, message: impl Into<String>) -> Self {
		Self::Conflict { dn: dn.to_string(), message: message.into() }
	}
}

/// Result type alias with this crate's [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;
