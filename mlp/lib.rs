/*!
This crate implements a multi-layer perceptron classifier: fully connected hidden layers with ReLU activations followed by a softmax output layer, trained with mini-batch gradient descent on the cross entropy loss.

Weights are initialized from a uniform distribution scaled by `sqrt(6 / (n_in + n_out))` using a seeded generator, and examples are reshuffled with the same generator every epoch, so training is deterministic for a given seed.
*/

use lodestar_metrics::{CrossEntropy, CrossEntropyInput, StreamingMetric};
use lodestar_util::{softmax, EpochProgress, FitError};
use ndarray::prelude::*;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	/// The number of units in each hidden layer.
	pub hidden_layers: Vec<usize>,
	pub learning_rate: f64,
	pub l2_regularization: f64,
	pub max_epochs: usize,
	pub n_examples_per_batch: usize,
	pub seed: u64,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			hidden_layers: vec![16],
			learning_rate: 0.01,
			l2_regularization: 0.0001,
			max_epochs: 500,
			n_examples_per_batch: 128,
			seed: 42,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultilayerPerceptron {
	/// One (n_in, n_out) matrix per layer, the output layer last.
	weights: Vec<Array2<f64>>,
	biases: Vec<Array1<f64>>,
	/// The training loss after each epoch.
	pub losses: Vec<f64>,
}

impl MultilayerPerceptron {
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
		progress: &mut dyn FnMut(EpochProgress),
	) -> Result<MultilayerPerceptron, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
		let mut layer_sizes = vec![features.ncols()];
		layer_sizes.extend(options.hidden_layers.iter().copied());
		layer_sizes.push(n_classes);
		let mut weights = Vec::with_capacity(layer_sizes.len() - 1);
		let mut biases = Vec::with_capacity(layer_sizes.len() - 1);
		for sizes in layer_sizes.windows(2) {
			let (n_in, n_out) = (sizes[0], sizes[1]);
			let scale = (6.0 / (n_in + n_out) as f64).sqrt();
			weights.push(Array2::from_shape_fn((n_in, n_out), |_| {
				rng.gen_range(-scale..scale)
			}));
			biases.push(Array1::zeros(n_out));
		}
		let mut model = MultilayerPerceptron {
			weights,
			biases,
			losses: Vec::new(),
		};
		let one_hot = Array2::from_shape_fn((labels.len(), n_classes), |(i, class_index)| {
			if labels[i] == class_index {
				1.0
			} else {
				0.0
			}
		});
		let batch_size = options.n_examples_per_batch.max(1);
		let mut indices: Vec<usize> = (0..features.nrows()).collect();
		for epoch in 0..options.max_epochs {
			indices.shuffle(&mut rng);
			for batch_indices in indices.chunks(batch_size) {
				let batch_features = features.select(Axis(0), batch_indices);
				let batch_targets = one_hot.select(Axis(0), batch_indices);
				model.train_batch(batch_features.view(), batch_targets.view(), options);
			}
			let loss = model.compute_loss(features, labels);
			model.losses.push(loss);
			progress(EpochProgress {
				epoch: epoch + 1,
				total: options.max_epochs,
				loss,
			});
		}
		Ok(model)
	}

	/// Returns the output of every layer, the input first and the softmax probabilities last.
	fn forward(&self, features: ArrayView2<f64>) -> Vec<Array2<f64>> {
		let mut activations = vec![features.to_owned()];
		let n_layers = self.weights.len();
		for (layer_index, (weights, biases)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
			let mut output = activations[layer_index].dot(weights) + biases;
			if layer_index + 1 == n_layers {
				softmax(output.view_mut());
			} else {
				output.mapv_inplace(|value| value.max(0.0));
			}
			activations.push(output);
		}
		activations
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f64>,
		targets: ArrayView2<f64>,
		options: &TrainOptions,
	) {
		let n_examples = features.nrows() as f64;
		let activations = self.forward(features);
		let mut delta = (&activations[activations.len() - 1] - &targets) / n_examples;
		for layer_index in (0..self.weights.len()).rev() {
			let weight_gradients = activations[layer_index].t().dot(&delta);
			let bias_gradients = delta.sum_axis(Axis(0));
			if layer_index > 0 {
				// The relu derivative is 1 where the layer's output was positive.
				delta = delta.dot(&self.weights[layer_index].t());
				delta.zip_mut_with(&activations[layer_index], |delta, activation| {
					if *activation <= 0.0 {
						*delta = 0.0;
					}
				});
			}
			let weights = &mut self.weights[layer_index];
			weights.zip_mut_with(&weight_gradients, |weight, gradient| {
				*weight -= options.learning_rate * (gradient + options.l2_regularization * *weight)
			});
			self.biases[layer_index].scaled_add(-options.learning_rate, &bias_gradients);
		}
	}

	fn compute_loss(&self, features: ArrayView2<f64>, labels: ArrayView1<usize>) -> f64 {
		let probabilities = self.predict_probabilities(features);
		let mut metric = CrossEntropy::default();
		for (probabilities, label) in probabilities.rows().into_iter().zip(labels.iter()) {
			metric.update(CrossEntropyInput {
				probabilities,
				label: *label,
			});
		}
		metric.finalize().unwrap_or(0.0)
	}

	pub fn n_features(&self) -> usize {
		self.weights.first().map(|weights| weights.nrows()).unwrap_or(0)
	}

	/// (n_examples, n_classes)
	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut activations = self.forward(features);
		activations.pop().unwrap_or_else(|| Array2::zeros((features.nrows(), 0)))
	}
}

#[cfg(test)]
fn circles(n: usize) -> (Array2<f64>, Array1<usize>) {
	// An inner and an outer ring, which no linear model separates.
	let features = Array2::from_shape_fn((n, 2), |(i, j)| {
		let radius = if i % 2 == 0 { 0.5 } else { 2.0 };
		let angle = i as f64 * 0.7;
		if j == 0 {
			radius * angle.cos()
		} else {
			radius * angle.sin()
		}
	});
	let labels = Array1::from_shape_fn(n, |i| i % 2);
	(features, labels)
}

#[test]
fn test_circles() {
	let (features, labels) = circles(200);
	let options = TrainOptions {
		hidden_layers: vec![16, 16],
		learning_rate: 0.1,
		max_epochs: 300,
		n_examples_per_batch: 16,
		..Default::default()
	};
	let mut n_epochs = 0;
	let model = MultilayerPerceptron::train(features.view(), labels.view(), 2, &options, &mut |_| {
		n_epochs += 1
	})
	.unwrap();
	assert_eq!(n_epochs, 300);
	assert!(model.losses[299] < model.losses[0]);
	let probabilities = model.predict_probabilities(features.view());
	let n_correct = probabilities
		.rows()
		.into_iter()
		.zip(labels.iter())
		.filter(|(row, label)| row[**label] > 0.5)
		.count();
	assert!(n_correct >= 160);
}

#[test]
fn test_deterministic() {
	let (features, labels) = circles(40);
	let options = TrainOptions {
		max_epochs: 5,
		..Default::default()
	};
	let a = MultilayerPerceptron::train(features.view(), labels.view(), 2, &options, &mut |_| {})
		.unwrap();
	let b = MultilayerPerceptron::train(features.view(), labels.view(), 2, &options, &mut |_| {})
		.unwrap();
	assert_eq!(a, b);
}
