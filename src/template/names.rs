//! First and last names for generated people.
use std::sync::Arc;

/// Walks two name lists so that no first/last name pair repeats.
///
/// Both lists are stepped through together. Whenever the longer list wraps,
/// the shorter one is restarted one position further along, so every
/// combination comes up once. Lists of equal length restart the first names.
/// After all combinations are used a counter is appended to the last name.
#[derive(Clone, Debug)]
pub(crate) struct NameGenerator {
	/// First names
	first_names: Arc<[String]>,
	/// Last names
	last_names: Arc<[String]>,
	/// Next first name
	first_index: usize,
	/// Next last name
	last_index: usize,
	/// Offset of the shorter list for the current pass
	loop_counter: usize,
	/// Suffix appended once all combinations are exhausted
	uniqueness_counter: usize,
	/// Current first name
	first: String,
	/// Current last name
	last: String,
}

impl NameGenerator {
	/// Generate names from two non-empty lists
	pub(crate) fn new(first_names: Arc<[String]>, last_names: Arc<[String]>) -> Self {
		Self {
			first_names,
			last_names,
			first_index: 0,
			last_index: 0,
			loop_counter: 0,
			uniqueness_counter: 1,
			first: String::new(),
			last: String::new(),
		}
	}

	/// Advance to the next pair
	pub(crate) fn next_pair(&mut self) {
		let (first_len, last_len) = (self.first_names.len(), self.last_names.len());
		if first_len == 0 || last_len == 0 {
			return;
		}
		self.first.clone_from(&self.first_names[self.first_index]);
		self.last.clone_from(&self.last_names[self.last_index]);
		if self.uniqueness_counter > 1 {
			self.last.push_str(&self.uniqueness_counter.to_string());
		}
		self.first_index += 1;
		self.last_index += 1;

		if self.first_index >= first_len {
			self.first_index = 0;
			if first_len > last_len {
				self.last_index = self.next_loop(last_len);
			}
		}
		if self.last_index >= last_len {
			self.last_index = 0;
			if last_len >= first_len {
				self.first_index = self.next_loop(first_len);
			}
		}
	}

	/// Start position of the shorter list for the next pass
	fn next_loop(&mut self, shorter_len: usize) -> usize {
		self.loop_counter += 1;
		if self.loop_counter >= shorter_len {
			self.loop_counter = 0;
			self.uniqueness_counter += 1;
		}
		self.loop_counter
	}

	/// The current first name
	pub(crate) fn first(&self) -> &str {
		&self.first
	}

	/// The current last name
	pub(crate) fn last(&self) -> &str {
		&self.last
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use std::{collections::HashSet, sync::Arc};

	use super::NameGenerator;

	fn list(names: &[&str]) -> Arc<[String]> {
		names.iter().map(|name| (*name).to_owned()).collect()
	}

	#[test]
	fn pairs_never_repeat() {
		let mut names = NameGenerator::new(list(&["a", "b", "c"]), list(&["x", "y"]));
		let mut seen = HashSet::new();
		for _ in 0..30 {
			names.next_pair();
			let pair = format!("{} {}", names.first(), names.last());
			assert!(seen.insert(pair.clone()), "{pair} generated twice");
		}
		assert!(seen.contains("a x") && seen.contains("c y"));
		assert!(seen.contains("a x2"), "A suffix is added once combinations run out");
	}

	#[test]
	fn equal_lengths() {
		let mut names = NameGenerator::new(list(&["a", "b", "c"]), list(&["x", "y", "z"]));
		let pairs: Vec<String> = (0..12)
			.map(|_| {
				names.next_pair();
				format!("{} {}", names.first(), names.last())
			})
			.collect();
		let unique: HashSet<&String> = pairs.iter().collect();
		assert_eq!(unique.len(), pairs.len(), "{pairs:?}");
		assert_eq!(pairs[..6], ["a x", "b y", "c z", "b x", "c y", "a z"]);
		assert_eq!(pairs[9], "a x2", "A suffix is added after all nine pairs");
	}

	#[test]
	fn shared_factor() {
		let mut names = NameGenerator::new(list(&["a", "b", "c", "d"]), list(&["u", "v", "w", "x", "y", "z"]));
		let unique: HashSet<String> = (0..24)
			.map(|_| {
				names.next_pair();
				format!("{} {}", names.first(), names.last())
			})
			.collect();
		assert_eq!(unique.len(), 24, "Every combination once");
		assert!(unique.iter().all(|pair| !pair.ends_with('2')));
	}

	#[test]
	fn longer_last_names() {
		let mut names = NameGenerator::new(list(&["a", "b"]), list(&["x", "y", "z"]));
		let pairs: Vec<String> = (0..6)
			.map(|_| {
				names.next_pair();
				format!("{}{}", names.first(), names.last())
			})
			.collect();
		assert_eq!(pairs, ["ax", "by", "az", "bx", "ay", "bz"]);
	}
}
