use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// The name of the one hot column that collects every category beyond the vocabulary cap.
pub const OVERFLOW_CATEGORY: &str = "__overflow__";

/**
A `CategoryVocabulary` assigns each distinct category value a one hot column in first seen order. Once `cap` values are known, further new values are not added. They share the overflow column and the vocabulary is marked `overflowed`.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SerializedVocabulary", into = "SerializedVocabulary")]
pub struct CategoryVocabulary {
	cap: usize,
	values: Vec<String>,
	positions: FnvHashMap<String, usize>,
	overflowed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategorySlot {
	Missing,
	Known(usize),
	Overflow,
}

#[derive(Clone, Serialize, Deserialize)]
struct SerializedVocabulary {
	cap: usize,
	values: Vec<String>,
	overflowed: bool,
}

impl CategoryVocabulary {
	pub fn new(cap: usize) -> Self {
		Self {
			cap,
			values: Vec::new(),
			positions: FnvHashMap::default(),
			overflowed: false,
		}
	}

	/// Look up `value`, adding it if the vocabulary still has room.
	pub fn observe(&mut self, value: &str) -> CategorySlot {
		if let Some(position) = self.positions.get(value) {
			return CategorySlot::Known(*position);
		}
		if self.values.len() < self.cap {
			let position = self.values.len();
			self.values.push(value.to_owned());
			self.positions.insert(value.to_owned(), position);
			CategorySlot::Known(position)
		} else {
			self.overflowed = true;
			CategorySlot::Overflow
		}
	}

	/// Look up `value` without modifying the vocabulary.
	pub fn slot(&self, value: Option<&str>) -> CategorySlot {
		match value {
			None => CategorySlot::Missing,
			Some(value) => match self.positions.get(value) {
				Some(position) => CategorySlot::Known(*position),
				None if self.overflowed => CategorySlot::Overflow,
				None => CategorySlot::Missing,
			},
		}
	}

	pub fn values(&self) -> &[String] {
		&self.values
	}

	pub fn overflowed(&self) -> bool {
		self.overflowed
	}

	/// The number of one hot columns, including the overflow column when it is in use.
	pub fn n_columns(&self) -> usize {
		self.values.len() + if self.overflowed { 1 } else { 0 }
	}

	pub fn column_names(&self, prefix: &str) -> Vec<String> {
		self.values
			.iter()
			.map(String::as_str)
			.chain(if self.overflowed {
				Some(OVERFLOW_CATEGORY)
			} else {
				None
			})
			.map(|value| format!("{}={}", prefix, value))
			.collect()
	}

	/// Write the one hot encoding of `slot` into `out`, which must have `n_columns()` entries.
	pub fn encode(&self, slot: CategorySlot, out: &mut [f64]) {
		out.iter_mut().for_each(|value| *value = 0.0);
		let index = match slot {
			CategorySlot::Missing => return,
			CategorySlot::Known(position) => position,
			CategorySlot::Overflow => self.values.len(),
		};
		if let Some(value) = out.get_mut(index) {
			*value = 1.0;
		}
	}
}

impl From<SerializedVocabulary> for CategoryVocabulary {
	fn from(serialized: SerializedVocabulary) -> Self {
		let positions = serialized
			.values
			.iter()
			.enumerate()
			.map(|(position, value)| (value.clone(), position))
			.collect();
		Self {
			cap: serialized.cap,
			values: serialized.values,
			positions,
			overflowed: serialized.overflowed,
		}
	}
}

impl From<CategoryVocabulary> for SerializedVocabulary {
	fn from(vocabulary: CategoryVocabulary) -> Self {
		Self {
			cap: vocabulary.cap,
			values: vocabulary.values,
			overflowed: vocabulary.overflowed,
		}
	}
}

#[test]
fn test_overflow() {
	let mut vocabulary = CategoryVocabulary::new(2);
	assert_eq!(vocabulary.observe("theft"), CategorySlot::Known(0));
	assert_eq!(vocabulary.observe("noise"), CategorySlot::Known(1));
	assert_eq!(vocabulary.observe("theft"), CategorySlot::Known(0));
	assert!(!vocabulary.overflowed());
	assert_eq!(vocabulary.observe("fire"), CategorySlot::Overflow);
	assert!(vocabulary.overflowed());
	assert_eq!(vocabulary.values(), &["theft", "noise"]);
	assert_eq!(
		vocabulary.column_names("category"),
		vec!["category=theft", "category=noise", "category=__overflow__"]
	);
	let mut out = vec![0.0; vocabulary.n_columns()];
	vocabulary.encode(CategorySlot::Overflow, &mut out);
	assert_eq!(out, vec![0.0, 0.0, 1.0]);
	vocabulary.encode(CategorySlot::Known(1), &mut out);
	assert_eq!(out, vec![0.0, 1.0, 0.0]);
	assert_eq!(vocabulary.slot(Some("flood")), CategorySlot::Overflow);
}
