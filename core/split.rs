use crate::Error;
use lodestar_dataframe::RowBuffer;
use lodestar_metrics::{std_dev_with_floor, MeanVariance, StreamingMetric};
use ndarray::prelude::*;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per feature mean and variance over the training split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
	/// The number of training rows these statistics were computed over.
	pub count: u64,
	pub means: Vec<f64>,
	/// Population variances. Never negative.
	pub variances: Vec<f64>,
	/// Standard deviations with the floor applied, safe to divide by.
	pub std_devs: Vec<f64>,
}

/// Accumulates `FeatureStatistics` one row at a time with Welford's algorithm. Missing (NaN) values are skipped per feature.
#[derive(Clone, Debug)]
pub struct FeatureStatisticsBuilder {
	count: u64,
	columns: Vec<MeanVariance>,
}

impl FeatureStatisticsBuilder {
	pub fn new(n_features: usize) -> FeatureStatisticsBuilder {
		FeatureStatisticsBuilder {
			count: 0,
			columns: vec![MeanVariance::new(); n_features],
		}
	}

	pub fn update(&mut self, row: ArrayView1<f64>) {
		self.count += 1;
		for (column, value) in self.columns.iter_mut().zip(row.iter()) {
			if !value.is_nan() {
				column.update(*value);
			}
		}
	}

	pub fn finish(self) -> FeatureStatistics {
		let (means, variances): (Vec<f64>, Vec<f64>) = self
			.columns
			.into_iter()
			.map(|column| {
				let output = column.finalize();
				(output.mean, output.variance)
			})
			.unzip();
		let std_devs = variances
			.iter()
			.map(|variance| std_dev_with_floor(*variance))
			.collect();
		FeatureStatistics {
			count: self.count,
			means,
			variances,
			std_devs,
		}
	}
}

impl FeatureStatistics {
	pub fn compute(features: ArrayView2<f64>) -> FeatureStatistics {
		let mut builder = FeatureStatisticsBuilder::new(features.ncols());
		for row in features.rows() {
			builder.update(row);
		}
		builder.finish()
	}
}

pub struct Split {
	pub train: RowBuffer,
	/// The rows metrics are computed on. When the split is degenerate these are the training rows.
	pub validation: RowBuffer,
	pub statistics: FeatureStatistics,
	pub train_count: usize,
	pub validation_count: usize,
	/// True when no rows could be held out for validation.
	pub degenerate: bool,
}

/// `round(n * fraction)` clamped to `[0, n - 1]`, so at least one row is left to train on.
pub fn validation_count(n: usize, fraction: f64) -> usize {
	if n == 0 {
		return 0;
	}
	let count = (n as f64 * fraction).round().max(0.0);
	(count as usize).min(n - 1)
}

/**
Partition `buffer` into training and validation rows, computing `FeatureStatistics` over the training rows as they are routed. Rows are shuffled first when `shuffle_seed` is `Some`.

The buffer is consumed. When no validation rows remain after clamping, the training rows are also used for validation and the split is flagged degenerate.
*/
pub fn split(
	buffer: RowBuffer,
	validation_fraction: f64,
	shuffle_seed: Option<u64>,
	dataset_id: &str,
) -> Result<Split, Error> {
	let n = buffer.len();
	if n == 0 {
		return Err(Error::InsufficientTrainingRows {
			dataset_id: dataset_id.to_owned(),
			rows: 0,
		});
	}
	let mut indices: Vec<usize> = (0..n).collect();
	if let Some(seed) = shuffle_seed {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		indices.shuffle(&mut rng);
	}
	let validation_count = validation_count(n, validation_fraction);
	let train_count = n - validation_count;
	let (train_indices, validation_indices) = indices.split_at(train_count);
	let mut statistics = FeatureStatisticsBuilder::new(buffer.n_features());
	for index in train_indices {
		statistics.update(buffer.row(*index));
	}
	let statistics = statistics.finish();
	let train = buffer.select(train_indices);
	let degenerate = validation_count == 0;
	let validation = if degenerate {
		debug!(rows = n, "no rows left for validation, validating on the training rows");
		train.clone()
	} else {
		buffer.select(validation_indices)
	};
	Ok(Split {
		train,
		validation,
		statistics,
		train_count,
		validation_count,
		degenerate,
	})
}

#[cfg(test)]
fn buffer(n: usize) -> RowBuffer {
	let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 3 + j) as f64 * 0.5);
	let labels = (0..n).map(|i| (i % 2) as i64).collect();
	RowBuffer::from_rows(vec!["a".to_owned(), "b".to_owned()], features, labels).unwrap()
}

#[test]
fn test_split_counts() {
	for n in 1..40 {
		for fraction in [0.0, 0.05, 0.2, 0.5, 0.95, 0.999] {
			let output = split(buffer(n), fraction, Some(1), "test").unwrap();
			assert_eq!(output.train_count + output.validation_count, n);
			assert!(output.train_count >= 1);
			assert_eq!(output.train.len(), output.train_count);
			assert_eq!(output.statistics.count, output.train_count as u64);
			if !output.degenerate {
				assert_eq!(output.validation.len(), output.validation_count);
			}
		}
	}
}

#[test]
fn test_split_order_and_degenerate() {
	let output = split(buffer(5), 0.2, None, "test").unwrap();
	assert_eq!(output.train.labels(), &[0, 1, 0, 1]);
	assert_eq!(output.validation.labels(), &[0]);
	let output = split(buffer(1), 0.5, Some(3), "test").unwrap();
	assert!(output.degenerate);
	assert_eq!(output.validation_count, 0);
	assert_eq!(output.validation.len(), 1);
}

#[test]
fn test_split_empty() {
	let empty = RowBuffer::new(vec!["a".to_owned()]);
	let result = split(empty, 0.2, None, "events");
	assert!(matches!(
		result,
		Err(Error::InsufficientTrainingRows { rows: 0, .. })
	));
}

#[test]
fn test_statistics_match_two_pass() {
	let nan = f64::NAN;
	let features = array![
		[1e3 + 1.0, 3.0],
		[1e3 + 2.5, nan],
		[1e3 - 4.0, 3.0],
		[1e3 + 0.25, 3.0],
		[1e3 + 7.0, nan],
	];
	let statistics = FeatureStatistics::compute(features.view());
	assert_eq!(statistics.count, 5);
	let column: Vec<f64> = features.column(0).to_vec();
	let mean = column.iter().sum::<f64>() / 5.0;
	let variance = column.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / 5.0;
	assert!((statistics.means[0] - mean).abs() < 1e-9);
	assert!((statistics.variances[0] - variance).abs() < 1e-9);
	// The second column skips its missing values and has no spread, so its std dev takes the floor.
	assert_eq!(statistics.means[1], 3.0);
	assert_eq!(statistics.variances[1], 0.0);
	assert_eq!(statistics.std_devs[1], 1.0);
}
