/*!
This crate implements Gaussian naive Bayes. Each feature is modeled as normally distributed within each class, with the per class mean and variance computed in one pass with Welford's algorithm.

To keep the likelihood defined for constant features, `var_smoothing` times the largest feature variance is added to every variance.
*/

use lodestar_metrics::{MeanVariance, StreamingMetric};
use lodestar_util::FitError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	pub var_smoothing: f64,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			var_smoothing: 1e-9,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
	/// (n_classes) The log of each class's share of the training rows. Classes with no rows are negative infinity.
	log_priors: Vec<f64>,
	/// (n_classes, n_features)
	means: Array2<f64>,
	/// (n_classes, n_features)
	variances: Array2<f64>,
}

impl GaussianNaiveBayes {
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
	) -> Result<GaussianNaiveBayes, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		let n_features = features.ncols();
		let mut class_stats = vec![vec![MeanVariance::new(); n_features]; n_classes];
		let mut overall_stats = vec![MeanVariance::new(); n_features];
		let mut class_counts = vec![0usize; n_classes];
		for (row, label) in features.rows().into_iter().zip(labels.iter()) {
			let stats = class_stats.get_mut(*label).ok_or(FitError::TooFewClasses {
				n_classes,
			})?;
			class_counts[*label] += 1;
			for ((value, stat), overall) in row.iter().zip(stats.iter_mut()).zip(overall_stats.iter_mut()) {
				stat.update(*value);
				overall.update(*value);
			}
		}
		let max_variance = overall_stats
			.iter()
			.map(|stat| stat.variance())
			.fold(0.0, f64::max);
		let epsilon = options.var_smoothing * max_variance.max(f64::MIN_POSITIVE);
		let mut means = Array2::zeros((n_classes, n_features));
		let mut variances = Array2::zeros((n_classes, n_features));
		for (class_index, stats) in class_stats.iter().enumerate() {
			for (feature_index, stat) in stats.iter().enumerate() {
				means[[class_index, feature_index]] = stat.mean();
				variances[[class_index, feature_index]] = stat.variance() + epsilon;
			}
		}
		let n_samples = labels.len() as f64;
		let log_priors = class_counts
			.iter()
			.map(|count| (*count as f64 / n_samples).ln())
			.collect();
		Ok(GaussianNaiveBayes {
			log_priors,
			means,
			variances,
		})
	}

	pub fn n_features(&self) -> usize {
		self.means.ncols()
	}

	/// (n_examples, n_classes)
	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let n_classes = self.log_priors.len();
		let mut probabilities = Array2::zeros((features.nrows(), n_classes));
		for (row, mut probabilities) in features.rows().into_iter().zip(probabilities.rows_mut()) {
			for (class_index, log_prior) in self.log_priors.iter().enumerate() {
				let log_likelihood: f64 = row
					.iter()
					.zip(self.means.row(class_index))
					.zip(self.variances.row(class_index))
					.map(|((value, mean), variance)| {
						-0.5 * ((value - mean).powi(2) / variance + variance.ln() + (2.0 * PI).ln())
					})
					.sum();
				probabilities[class_index] = log_prior + log_likelihood;
			}
			// Normalize with the log-sum-exp trick.
			let max = probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
			probabilities.mapv_inplace(|log_probability| (log_probability - max).exp());
			let sum = probabilities.sum();
			probabilities /= sum;
		}
		probabilities
	}
}

#[test]
fn test_gaussian_naive_bayes() {
	let features = array![[-1.0, -1.0], [-2.0, -1.0], [-3.0, -2.0], [1.0, 1.0], [2.0, 1.0], [3.0, 2.0]];
	let labels = array![0, 0, 0, 1, 1, 1];
	let model =
		GaussianNaiveBayes::train(features.view(), labels.view(), 2, &TrainOptions::default())
			.unwrap();
	assert_eq!(model.means[[0, 0]], -2.0);
	assert!((model.means[[0, 1]] + 4.0 / 3.0).abs() < 1e-12);
	let probabilities = model.predict_probabilities(array![[-0.8, -1.0], [2.5, 1.5]].view());
	assert!(probabilities[[0, 0]] > 0.99);
	assert!(probabilities[[1, 1]] > 0.99);
	for row in probabilities.rows() {
		assert!((row.sum() - 1.0).abs() < 1e-12);
	}
}

#[test]
fn test_constant_feature_and_missing_class() {
	let features = array![[1.0, 5.0], [1.0, 6.0], [1.0, 1.0], [1.0, 2.0]];
	let labels = array![2, 2, 0, 0];
	let model =
		GaussianNaiveBayes::train(features.view(), labels.view(), 3, &TrainOptions::default())
			.unwrap();
	let probabilities = model.predict_probabilities(array![[1.0, 5.5]].view());
	assert!(probabilities.iter().all(|p| p.is_finite()));
	assert_eq!(probabilities[[0, 1]], 0.0);
	assert!(probabilities[[0, 2]] > 0.99);
}
