use crate::{train_early_stopping_split, EarlyStoppingMonitor, TrainOptions};
use lodestar_metrics::{CrossEntropy, CrossEntropyInput, StreamingMetric};
use lodestar_util::{softmax, EpochProgress, FitError};
use ndarray::prelude::*;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// A multinomial logistic regression model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
	/// (n_classes)
	pub biases: Array1<f64>,
	/// (n_features, n_classes)
	pub weights: Array2<f64>,
	/// The training loss after each epoch.
	pub losses: Vec<f64>,
}

impl LogisticRegression {
	/// Train on `features` with 0-indexed class `labels` in `0..n_classes`.
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
		progress: &mut dyn FnMut(EpochProgress),
	) -> Result<LogisticRegression, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		let n_features = features.ncols();
		let early_stopping_split = options
			.early_stopping_options
			.as_ref()
			.and_then(|early_stopping_options| {
				train_early_stopping_split(
					features,
					labels,
					early_stopping_options.early_stopping_fraction,
				)
				.map(|split| (split, early_stopping_options))
			});
		let (features_train, labels_train, mut early_stopping) = match early_stopping_split {
			Some(((features_train, labels_train, features_held_out, labels_held_out), early_stopping_options)) => (
				features_train,
				labels_train,
				Some((
					features_held_out,
					labels_held_out,
					EarlyStoppingMonitor::new(
						early_stopping_options.min_decrease_in_loss_for_significant_change,
						early_stopping_options.n_epochs_without_improvement_to_stop,
					),
				)),
			),
			None => (features, labels, None),
		};
		let mut model = LogisticRegression {
			biases: Array1::zeros(n_classes),
			weights: Array2::zeros((n_features, n_classes)),
			losses: Vec::new(),
		};
		let batch_size = options.n_examples_per_batch.max(1);
		for epoch in 0..options.max_epochs {
			for (features, labels) in features_train
				.axis_chunks_iter(Axis(0), batch_size)
				.zip(labels_train.axis_chunks_iter(Axis(0), batch_size))
			{
				model.train_batch(features, labels, options);
			}
			let loss = model.compute_loss(features_train, labels_train);
			model.losses.push(loss);
			progress(EpochProgress {
				epoch: epoch + 1,
				total: options.max_epochs,
				loss,
			});
			if let Some((features_held_out, labels_held_out, monitor)) = early_stopping.as_mut() {
				let held_out_loss = model.compute_loss(*features_held_out, *labels_held_out);
				if monitor.update(held_out_loss) {
					break;
				}
			}
		}
		Ok(model)
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		options: &TrainOptions,
	) {
		let learning_rate = options.learning_rate;
		let l2 = options.l2_regularization;
		let n_examples = features.nrows() as f64;
		let mut predictions = features.dot(&self.weights) + &self.biases;
		softmax(predictions.view_mut());
		// The gradient of the cross entropy with respect to the logits is the prediction minus the one hot label.
		Zip::indexed(predictions.view_mut())
			.and_broadcast(labels.insert_axis(Axis(1)))
			.for_each(|(_, class_index), prediction, label| {
				if class_index == *label {
					*prediction -= 1.0;
				}
			});
		let weight_gradients = features.t().dot(&predictions) / n_examples;
		let bias_gradients = predictions.sum_axis(Axis(0)) / n_examples;
		Zip::from(&mut self.weights)
			.and(&weight_gradients)
			.for_each(|weight, gradient| *weight -= learning_rate * (gradient + l2 * *weight));
		Zip::from(&mut self.biases)
			.and(&bias_gradients)
			.for_each(|bias, gradient| *bias -= learning_rate * gradient);
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
		self.weights.nrows()
	}

	/// (n_examples, n_classes)
	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut probabilities = features.dot(&self.weights) + &self.biases;
		softmax(probabilities.view_mut());
		probabilities
	}
}

#[cfg(test)]
fn two_blobs(n: usize) -> (Array2<f64>, Array1<usize>) {
	let features = Array2::from_shape_fn((n, 2), |(i, j)| {
		let offset = if i % 2 == 0 { -2.0 } else { 2.0 };
		offset + ((i * 7 + j * 3) % 10) as f64 / 10.0
	});
	let labels = Array1::from_shape_fn(n, |i| i % 2);
	(features, labels)
}

#[test]
fn test_separable() {
	let (features, labels) = two_blobs(100);
	let options = TrainOptions {
		learning_rate: 0.1,
		max_epochs: 200,
		n_examples_per_batch: 16,
		..Default::default()
	};
	let mut epochs = Vec::new();
	let model = LogisticRegression::train(features.view(), labels.view(), 2, &options, &mut |p| {
		epochs.push(p)
	})
	.unwrap();
	assert!(!epochs.is_empty());
	assert_eq!(epochs[0].epoch, 1);
	assert_eq!(epochs[0].total, 200);
	assert!(epochs.last().unwrap().loss < epochs[0].loss);
	let probabilities = model.predict_probabilities(features.view());
	for (row, label) in probabilities.rows().into_iter().zip(labels.iter()) {
		assert!((row.sum() - 1.0).abs() < 1e-9);
		assert!(row[*label] > 0.5);
	}
}

#[test]
fn test_without_early_stopping_runs_every_epoch() {
	let (features, labels) = two_blobs(20);
	let options = TrainOptions {
		max_epochs: 7,
		early_stopping_options: None,
		..Default::default()
	};
	let mut n_epochs = 0;
	let model = LogisticRegression::train(features.view(), labels.view(), 3, &options, &mut |_| {
		n_epochs += 1
	})
	.unwrap();
	assert_eq!(n_epochs, 7);
	assert_eq!(model.losses.len(), 7);
	assert_eq!(model.predict_probabilities(features.view()).ncols(), 3);
}

#[test]
fn test_single_class_is_a_fit_error() {
	let features = Array2::<f64>::zeros((5, 2));
	let labels = Array1::<usize>::zeros(5);
	let result = LogisticRegression::train(
		features.view(),
		labels.view(),
		2,
		&TrainOptions::default(),
		&mut |_| {},
	);
	assert_eq!(result, Err(FitError::TooFewClasses { n_classes: 1 }));
}
