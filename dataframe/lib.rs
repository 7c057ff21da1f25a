/*!
This crate reads row oriented CSV datasets of geotagged event records into a [`RowBuffer`](struct.RowBuffer.html), a dense matrix of numeric features plus an integer label per row.

The mapping from CSV columns to features is described by a [`ColumnMapping`](struct.ColumnMapping.html). Timestamps are expanded into calendar features and the category column is one hot encoded against a bounded [`CategoryVocabulary`](struct.CategoryVocabulary.html).
*/

mod buffer;
mod load;
mod timestamp;
mod vocabulary;

pub use self::buffer::RowBuffer;
pub use self::load::{
	parse_label, parse_number, ColumnMapping, Dataset, LoadError, LoadOptions,
	DEFAULT_CATEGORY_CAP, DEFAULT_INVALID_VALUES, DEFAULT_MAX_ROWS,
};
pub use self::timestamp::{parse_timestamp, TimeFeatures};
pub use self::vocabulary::{CategorySlot, CategoryVocabulary, OVERFLOW_CATEGORY};
