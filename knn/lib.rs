/*!
This crate implements a brute force k-nearest-neighbors classifier. Training stores the rows. Prediction computes the euclidean distance from each query row to every stored row and takes a vote among the `k` closest, either one vote per neighbor or votes weighted by inverse distance.
*/

use lodestar_util::FitError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	pub k: usize,
	/// Weight each neighbor's vote by the inverse of its distance.
	pub weighted: bool,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			k: 5,
			weighted: false,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
	k: usize,
	weighted: bool,
	n_classes: usize,
	features: Array2<f64>,
	labels: Array1<usize>,
}

impl KNearestNeighbors {
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
	) -> Result<KNearestNeighbors, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		if options.k == 0 || options.k > features.nrows() {
			return Err(FitError::TooFewSamples {
				n_samples: features.nrows(),
				min_samples: options.k.max(1),
			});
		}
		Ok(KNearestNeighbors {
			k: options.k,
			weighted: options.weighted,
			n_classes,
			features: features.to_owned(),
			labels: labels.to_owned(),
		})
	}

	pub fn n_features(&self) -> usize {
		self.features.ncols()
	}

	/// (n_examples, n_classes)
	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut probabilities = Array2::zeros((features.nrows(), self.n_classes));
		let mut distances: Vec<(f64, usize)> = Vec::with_capacity(self.features.nrows());
		for (query, mut probabilities) in features.rows().into_iter().zip(probabilities.rows_mut()) {
			distances.clear();
			distances.extend(self.features.rows().into_iter().enumerate().map(|(index, row)| {
				let squared_distance: f64 = row
					.iter()
					.zip(query.iter())
					.map(|(a, b)| (a - b) * (a - b))
					.sum();
				(squared_distance.sqrt(), index)
			}));
			// Equal distances are ordered by row index so predictions are deterministic.
			let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
			distances.select_nth_unstable_by(self.k - 1, by_distance);
			let neighbors = &mut distances[..self.k];
			neighbors.sort_unstable_by(by_distance);
			let has_exact_match = neighbors.iter().any(|(distance, _)| *distance == 0.0);
			for (distance, index) in neighbors.iter() {
				let vote = if !self.weighted {
					1.0
				} else if has_exact_match {
					// Rows identical to the query outvote every other neighbor.
					if *distance == 0.0 {
						1.0
					} else {
						0.0
					}
				} else {
					1.0 / distance
				};
				probabilities[self.labels[*index]] += vote;
			}
			let total = probabilities.sum();
			if total > 0.0 {
				probabilities /= total;
			}
		}
		probabilities
	}
}

#[test]
fn test_majority_vote() {
	let features = array![[0.0], [0.1], [0.2], [1.0], [1.1]];
	let labels = array![0, 0, 0, 1, 1];
	let model = KNearestNeighbors::train(
		features.view(),
		labels.view(),
		2,
		&TrainOptions {
			k: 3,
			weighted: false,
		},
	)
	.unwrap();
	let probabilities = model.predict_probabilities(array![[0.05], [1.05], [0.7]].view());
	assert_eq!(probabilities.row(0).to_vec(), vec![1.0, 0.0]);
	assert_eq!(probabilities.row(1).to_vec(), vec![1.0 / 3.0, 2.0 / 3.0]);
	// 1.0, 1.1 and 0.2 are closest to 0.7.
	assert_eq!(probabilities.row(2).to_vec(), vec![1.0 / 3.0, 2.0 / 3.0]);
}

#[test]
fn test_weighted_vote() {
	let features = array![[0.0], [3.0], [4.0]];
	let labels = array![0, 1, 1];
	let model = KNearestNeighbors::train(
		features.view(),
		labels.view(),
		2,
		&TrainOptions {
			k: 3,
			weighted: true,
		},
	)
	.unwrap();
	// Distances 1, 2 and 3 give votes 1, 1/2 and 1/3.
	let probabilities = model.predict_probabilities(array![[1.0]].view());
	assert!((probabilities[[0, 0]] - 6.0 / 11.0).abs() < 1e-12);
	let exact = model.predict_probabilities(array![[3.0]].view());
	assert_eq!(exact.row(0).to_vec(), vec![0.0, 1.0]);
}

#[test]
fn test_k_larger_than_samples() {
	let features = array![[0.0], [1.0]];
	let labels = array![0, 1];
	let result = KNearestNeighbors::train(
		features.view(),
		labels.view(),
		2,
		&TrainOptions {
			k: 3,
			weighted: false,
		},
	);
	assert!(matches!(result, Err(FitError::TooFewSamples { .. })));
}
