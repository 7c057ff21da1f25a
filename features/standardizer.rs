use itertools::izip;
use lodestar_metrics::{std_dev_with_floor, MeanVariance, StreamingMetric};
use ndarray::prelude::*;

/**
A `Standardizer` transforms each feature column to zero mean and unit variance. [Learn more](https://en.wikipedia.org/wiki/Feature_scaling#Standardization_(Z-score_Normalization)).

`feature_value = (value - mean) / std_dev`

Standard deviations below the floor are replaced with 1.0, so a constant column maps to zero instead of NaN.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct Standardizer {
	means: Vec<f64>,
	std_devs: Vec<f64>,
}

impl Standardizer {
	/// Fit on the columns of `features`, skipping NaN values.
	pub fn fit(features: ArrayView2<f64>) -> Standardizer {
		let (means, std_devs) = features
			.columns()
			.into_iter()
			.map(|column| {
				let mut mean_variance = MeanVariance::new();
				column
					.iter()
					.filter(|value| !value.is_nan())
					.for_each(|value| mean_variance.update(*value));
				let output = mean_variance.finalize();
				(output.mean, std_dev_with_floor(output.variance))
			})
			.unzip();
		Standardizer { means, std_devs }
	}

	/// Use statistics that were computed elsewhere, for example while splitting the dataset.
	pub fn from_statistics(means: Vec<f64>, std_devs: Vec<f64>) -> Standardizer {
		let std_devs = std_devs
			.into_iter()
			.map(|std_dev| std_dev_with_floor(std_dev * std_dev))
			.collect();
		Standardizer { means, std_devs }
	}

	pub fn means(&self) -> &[f64] {
		&self.means
	}

	pub fn std_devs(&self) -> &[f64] {
		&self.std_devs
	}

	pub fn transform(&self, mut features: ArrayViewMut2<f64>) {
		for (mut column, mean, std_dev) in izip!(
			features.columns_mut(),
			self.means.iter(),
			self.std_devs.iter()
		) {
			column.mapv_inplace(|value| (value - mean) / std_dev);
		}
	}
}

#[test]
fn test_standardize() {
	let features = array![[0.0, 4.0], [5.2, 4.0], [1.3, 4.0]];
	let standardizer = Standardizer::fit(features.view());
	assert!((standardizer.means()[0] - 2.1666666).abs() < 1e-6);
	assert_eq!(standardizer.means()[1], 4.0);
	// The constant column has zero variance.
	assert_eq!(standardizer.std_devs()[1], 1.0);
	let mut transformed = features.clone();
	standardizer.transform(transformed.view_mut());
	let column = transformed.column(0);
	assert!(column.sum().abs() < 1e-9);
	assert!((column.mapv(|v| v * v).mean().unwrap() - 1.0).abs() < 1e-9);
	assert_eq!(transformed.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
}

#[test]
fn test_from_statistics_applies_floor() {
	let standardizer = Standardizer::from_statistics(vec![1.0, 2.0], vec![2.0, 0.0]);
	assert_eq!(standardizer.std_devs(), &[2.0, 1.0]);
}
