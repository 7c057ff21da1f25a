use crate::{Imputer, ImputerStrategy, Normalization, Standardizer};
use ndarray::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineOptions {
	pub imputer_strategy: ImputerStrategy,
	pub imputer_fill_value: f64,
	pub normalization: Normalization,
}

impl Default for PipelineOptions {
	fn default() -> Self {
		Self {
			imputer_strategy: ImputerStrategy::Mean,
			imputer_fill_value: 0.0,
			normalization: Normalization::None,
		}
	}
}

/// Imputation, then standardization, then row normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct FeaturePipeline {
	pub imputer: Imputer,
	pub standardizer: Standardizer,
	pub normalization: Normalization,
}

impl FeaturePipeline {
	/// Fit every stage on `features` alone. The standardizer sees the imputed values.
	pub fn fit(features: ArrayView2<f64>, options: &PipelineOptions) -> FeaturePipeline {
		let imputer = Imputer::fit(
			features,
			options.imputer_strategy,
			options.imputer_fill_value,
		);
		let mut imputed = features.to_owned();
		imputer.transform(imputed.view_mut());
		let standardizer = Standardizer::fit(imputed.view());
		FeaturePipeline {
			imputer,
			standardizer,
			normalization: options.normalization,
		}
	}

	pub fn transform(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut features = features.to_owned();
		self.transform_in_place(features.view_mut());
		features
	}

	pub fn transform_in_place(&self, mut features: ArrayViewMut2<f64>) {
		self.imputer.transform(features.view_mut());
		self.standardizer.transform(features.view_mut());
		self.normalization.transform(features);
	}
}

#[test]
fn test_pipeline() {
	let nan = f64::NAN;
	let train = array![[1.0, 2.0], [3.0, nan], [5.0, 2.0]];
	let pipeline = FeaturePipeline::fit(
		train.view(),
		&PipelineOptions {
			normalization: Normalization::L2,
			..Default::default()
		},
	);
	assert_eq!(pipeline.imputer.statistics(), &[3.0, 2.0]);
	let transformed = pipeline.transform(train.view());
	assert!(transformed.iter().all(|value| value.is_finite()));
	// The middle row is the mean of every column, so it stays at the origin.
	assert_eq!(transformed.row(1).to_vec(), vec![0.0, 0.0]);
	for row in transformed.rows() {
		let norm = row.dot(&row).sqrt();
		assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-12);
	}
}
