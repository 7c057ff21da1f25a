use crate::{CategorySlot, CategoryVocabulary, RowBuffer, TimeFeatures};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// These values are the default values that are considered invalid.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

pub const DEFAULT_MAX_ROWS: usize = 250_000;

pub const DEFAULT_CATEGORY_CAP: usize = 32;

const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";
const CATEGORY: &str = "category";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("failed to read the dataset")]
	Io(#[from] std::io::Error),
	#[error("failed to parse the csv")]
	Csv(#[from] csv::Error),
	#[error("column \"{column}\" is not in the csv header")]
	MissingColumn { column: String },
	#[error("expected {expected} feature values but got {actual}")]
	RowWidth { expected: usize, actual: usize },
	#[error("{rows} feature rows but {labels} labels")]
	LabelCount { rows: usize, labels: usize },
}

/// Which csv columns feed the model. Only `label` is required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
	#[serde(default)]
	pub timestamp: Option<String>,
	#[serde(default)]
	pub latitude: Option<String>,
	#[serde(default)]
	pub longitude: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	pub label: String,
	/// Additional numeric columns, used as features in this order.
	#[serde(default)]
	pub features: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoadOptions<'a> {
	pub max_rows: usize,
	pub category_cap: usize,
	/// Seeds the reservoir sampling used once more than `max_rows` rows are usable.
	pub seed: u64,
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for LoadOptions<'a> {
	fn default() -> Self {
		Self {
			max_rows: DEFAULT_MAX_ROWS,
			category_cap: DEFAULT_CATEGORY_CAP,
			seed: 42,
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

/// The result of loading a csv.
#[derive(Clone, Debug)]
pub struct Dataset {
	pub buffer: RowBuffer,
	pub vocabulary: CategoryVocabulary,
	/// The number of data records in the file.
	pub rows_read: u64,
	/// Records dropped because their label could not be parsed.
	pub rows_skipped: u64,
	/// True when the file had more than `max_rows` usable rows and the buffer holds a uniform sample of them.
	pub sampled: bool,
}

struct ColumnIndices {
	label: usize,
	features: Vec<usize>,
	latitude: Option<usize>,
	longitude: Option<usize>,
	timestamp: Option<usize>,
	category: Option<usize>,
}

struct PendingRow {
	values: Vec<f64>,
	category: CategorySlot,
	label: i64,
}

impl Dataset {
	pub fn from_path(
		path: &Path,
		mapping: &ColumnMapping,
		options: &LoadOptions,
		progress: &mut dyn FnMut(u64),
	) -> Result<Dataset, LoadError> {
		let mut reader = csv::ReaderBuilder::new()
			.trim(csv::Trim::All)
			.from_path(path)?;
		Self::from_csv(&mut reader, mapping, options, progress)
	}

	/**
	Read every record of `reader`, deriving the feature vector of each row from `mapping`. Rows whose label cannot be parsed are skipped. Feature values that are invalid or do not parse are stored as NaN.
	*/
	pub fn from_csv<R>(
		reader: &mut csv::Reader<R>,
		mapping: &ColumnMapping,
		options: &LoadOptions,
		progress: &mut dyn FnMut(u64),
	) -> Result<Dataset, LoadError>
	where
		R: std::io::Read,
	{
		let header: Vec<String> = reader
			.headers()?
			.iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let indices = resolve_columns(&header, mapping)?;
		let mut base_feature_names: Vec<String> = mapping.features.clone();
		if indices.latitude.is_some() {
			base_feature_names.push(LATITUDE.to_owned());
		}
		if indices.longitude.is_some() {
			base_feature_names.push(LONGITUDE.to_owned());
		}
		if indices.timestamp.is_some() {
			base_feature_names.extend(TimeFeatures::NAMES.iter().map(|name| name.to_string()));
		}
		let mut vocabulary = CategoryVocabulary::new(options.category_cap);
		let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
		let mut pending: Vec<PendingRow> = Vec::new();
		let mut rows_read = 0u64;
		let mut rows_skipped = 0u64;
		let mut n_usable = 0usize;
		let mut record = csv::ByteRecord::new();
		while reader.read_byte_record(&mut record)? {
			if let Some(position) = record.position() {
				progress(position.byte());
			}
			rows_read += 1;
			let label = match record.get(indices.label).and_then(parse_label) {
				Some(label) => label,
				None => {
					rows_skipped += 1;
					continue;
				}
			};
			let mut values = Vec::with_capacity(base_feature_names.len());
			for index in indices.features.iter() {
				values.push(number_at(&record, *index, options.invalid_values));
			}
			if let Some(index) = indices.latitude {
				values.push(number_at(&record, index, options.invalid_values));
			}
			if let Some(index) = indices.longitude {
				values.push(number_at(&record, index, options.invalid_values));
			}
			if let Some(index) = indices.timestamp {
				let time_features = text_at(&record, index, options.invalid_values)
					.and_then(crate::parse_timestamp)
					.map(TimeFeatures::from)
					.unwrap_or_else(TimeFeatures::missing);
				values.extend_from_slice(&time_features.to_array());
			}
			let category = match indices.category {
				Some(index) => match text_at(&record, index, options.invalid_values) {
					Some(value) => vocabulary.observe(value),
					None => CategorySlot::Missing,
				},
				None => CategorySlot::Missing,
			};
			let row = PendingRow {
				values,
				category,
				label,
			};
			// Algorithm R keeps a uniform sample of max_rows rows.
			if n_usable < options.max_rows {
				pending.push(row);
			} else {
				if n_usable == options.max_rows {
					warn!(
						max_rows = options.max_rows,
						"dataset exceeds the row limit, sampling rows"
					);
				}
				let index = rng.gen_range(0..=n_usable);
				if index < options.max_rows {
					pending[index] = row;
				}
			}
			n_usable += 1;
		}
		if rows_skipped > 0 {
			debug!(rows_skipped, "skipped rows with an unusable label");
		}
		if vocabulary.overflowed() {
			warn!(
				cap = options.category_cap,
				"category vocabulary overflowed, extra values share one column"
			);
		}
		let n_base = base_feature_names.len();
		let mut feature_names = base_feature_names;
		if let Some(category_column) = mapping.category.as_ref() {
			if indices.category.is_some() {
				debug!(column = %category_column, n_values = vocabulary.values().len(), "encoded categories");
				feature_names.extend(vocabulary.column_names(CATEGORY));
			}
		}
		let mut buffer = RowBuffer::new(feature_names);
		let mut row = vec![0.0; buffer.n_features()];
		for pending_row in pending.into_iter() {
			row[..n_base].copy_from_slice(&pending_row.values);
			vocabulary.encode(pending_row.category, &mut row[n_base..]);
			buffer.push(&row, pending_row.label)?;
		}
		info!(
			rows = buffer.len(),
			rows_read,
			n_features = buffer.n_features(),
			"loaded dataset"
		);
		Ok(Dataset {
			buffer,
			vocabulary,
			rows_read,
			rows_skipped,
			sampled: n_usable > options.max_rows,
		})
	}
}

fn resolve_columns(header: &[String], mapping: &ColumnMapping) -> Result<ColumnIndices, LoadError> {
	let find = |column: &str| -> Result<usize, LoadError> {
		header
			.iter()
			.position(|name| name == column)
			.ok_or_else(|| LoadError::MissingColumn {
				column: column.to_owned(),
			})
	};
	let find_optional = |column: &Option<String>| -> Result<Option<usize>, LoadError> {
		column.as_deref().map(find).transpose()
	};
	Ok(ColumnIndices {
		label: find(&mapping.label)?,
		features: mapping
			.features
			.iter()
			.map(|column| find(column))
			.collect::<Result<_, _>>()?,
		latitude: find_optional(&mapping.latitude)?,
		longitude: find_optional(&mapping.longitude)?,
		timestamp: find_optional(&mapping.timestamp)?,
		category: find_optional(&mapping.category)?,
	})
}

fn text_at<'r>(record: &'r csv::ByteRecord, index: usize, invalid_values: &[&str]) -> Option<&'r str> {
	let value = std::str::from_utf8(record.get(index)?).ok()?;
	if invalid_values.contains(&value) {
		None
	} else {
		Some(value)
	}
}

fn number_at(record: &csv::ByteRecord, index: usize, invalid_values: &[&str]) -> f64 {
	text_at(record, index, invalid_values)
		.map(|value| parse_number(value.as_bytes()))
		.unwrap_or(f64::NAN)
}

/// Parse a feature value. Anything that is not a finite number is NaN.
pub fn parse_number(value: &[u8]) -> f64 {
	match lexical::parse::<f64, _>(value) {
		Ok(value) if value.is_finite() => value,
		_ => f64::NAN,
	}
}

/// Parse a label: an integer, a float that is rounded, or one of true/yes/y (1) and false/no/n (0).
pub fn parse_label(value: &[u8]) -> Option<i64> {
	let value = std::str::from_utf8(value).ok()?.trim();
	match value.to_ascii_lowercase().as_str() {
		"true" | "yes" | "y" => return Some(1),
		"false" | "no" | "n" => return Some(0),
		_ => {}
	}
	if let Ok(label) = lexical::parse::<i64, _>(value) {
		return Some(label);
	}
	match lexical::parse::<f64, _>(value) {
		Ok(label) if label.is_finite() && label.abs() < i64::MAX as f64 => Some(label.round() as i64),
		_ => None,
	}
}

#[cfg(test)]
fn load(csv: &str, mapping: &ColumnMapping, options: &LoadOptions) -> Result<Dataset, LoadError> {
	let mut reader = csv::ReaderBuilder::new()
		.trim(csv::Trim::All)
		.from_reader(std::io::Cursor::new(csv.to_owned()));
	Dataset::from_csv(&mut reader, mapping, options, &mut |_| {})
}

#[test]
fn test_load() {
	let csv = r#"time,lat,lng,kind,severity,outcome
2021-03-04T15:30:00Z,40.7,-74.0,theft,3,1
1614871800,40.8,-73.9,noise,?,no
not a time,,-73.8,theft,5,yes
2021-03-05,40.6,-73.7,,2,maybe
"#;
	let mapping = ColumnMapping {
		timestamp: Some("time".to_owned()),
		latitude: Some("lat".to_owned()),
		longitude: Some("lng".to_owned()),
		category: Some("kind".to_owned()),
		label: "outcome".to_owned(),
		features: vec!["severity".to_owned()],
	};
	let dataset = load(csv, &mapping, &LoadOptions::default()).unwrap();
	assert_eq!(dataset.rows_read, 4);
	assert_eq!(dataset.rows_skipped, 1);
	assert!(!dataset.sampled);
	insta::assert_debug_snapshot!(dataset.buffer.feature_names(), @r###"
	[
	    "severity",
	    "latitude",
	    "longitude",
	    "hour_of_day",
	    "day_of_week",
	    "month",
	    "category=theft",
	    "category=noise",
	]
	"###);
	assert_eq!(dataset.buffer.labels(), &[1, 0, 1]);
	let first = dataset.buffer.row(0).to_vec();
	assert_eq!(first, vec![3.0, 40.7, -74.0, 15.0, 3.0, 3.0, 1.0, 0.0]);
	let second = dataset.buffer.row(1);
	assert!(second[0].is_nan());
	assert_eq!(second[3], 15.0);
	assert_eq!(second[7], 1.0);
	let third = dataset.buffer.row(2);
	assert!(third[1].is_nan());
	assert!(third[3].is_nan() && third[4].is_nan() && third[5].is_nan());
	assert_eq!(third[6], 1.0);
}

#[test]
fn test_missing_column() {
	let csv = "a,b\n1,2\n";
	let mapping = ColumnMapping {
		label: "b".to_owned(),
		latitude: Some("lat".to_owned()),
		..Default::default()
	};
	let error = load(csv, &mapping, &LoadOptions::default()).unwrap_err();
	assert!(matches!(error, LoadError::MissingColumn { column } if column == "lat"));
}

#[test]
fn test_category_overflow() {
	let csv = "kind,label\na,0\nb,1\nc,0\na,1\nd,1\n";
	let mapping = ColumnMapping {
		category: Some("kind".to_owned()),
		label: "label".to_owned(),
		..Default::default()
	};
	let options = LoadOptions {
		category_cap: 2,
		..Default::default()
	};
	let dataset = load(csv, &mapping, &options).unwrap();
	assert!(dataset.vocabulary.overflowed());
	assert_eq!(
		dataset.buffer.feature_names(),
		&["category=a", "category=b", "category=__overflow__"]
	);
	assert_eq!(dataset.buffer.row(2).to_vec(), vec![0.0, 0.0, 1.0]);
	assert_eq!(dataset.buffer.row(4).to_vec(), vec![0.0, 0.0, 1.0]);
}

#[test]
fn test_reservoir_sampling() {
	let mut csv = "x,label\n".to_owned();
	for i in 0..100 {
		csv.push_str(&format!("{},{}\n", i, i % 2));
	}
	let mapping = ColumnMapping {
		label: "label".to_owned(),
		features: vec!["x".to_owned()],
		..Default::default()
	};
	let options = LoadOptions {
		max_rows: 10,
		..Default::default()
	};
	let first = load(&csv, &mapping, &options).unwrap();
	let second = load(&csv, &mapping, &options).unwrap();
	assert!(first.sampled);
	assert_eq!(first.rows_read, 100);
	assert_eq!(first.buffer.len(), 10);
	assert_eq!(first.buffer, second.buffer);
	// Every kept row is a real row of the file, and its label still matches it.
	for (row, label) in first.buffer.features().rows().into_iter().zip(first.buffer.labels()) {
		assert_eq!(row[0] as i64 % 2, *label);
	}
}

#[test]
fn test_parse_label() {
	assert_eq!(parse_label(b"1"), Some(1));
	assert_eq!(parse_label(b"-3"), Some(-3));
	assert_eq!(parse_label(b"2.0"), Some(2));
	assert_eq!(parse_label(b"Yes"), Some(1));
	assert_eq!(parse_label(b"FALSE"), Some(0));
	assert_eq!(parse_label(b"maybe"), None);
	assert_eq!(parse_label(b""), None);
	assert_eq!(parse_label(b"NaN"), None);
}
