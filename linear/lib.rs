/*!
This crate implements multinomial logistic regression. [`LogisticRegression`](struct.LogisticRegression.html) trains one linear model per class whose outputs are combined with the `softmax` function, using mini-batch gradient descent with L2 regularization. Binary problems are the two class case of the same model.

After each epoch the training cross entropy is reported to the progress callback. If early stopping is enabled, a fraction of the training rows is held out and training stops once the loss on those rows stops improving.
*/

mod early_stopping;
mod logistic_regression;

pub use self::early_stopping::{train_early_stopping_split, EarlyStoppingMonitor};
pub use self::logistic_regression::LogisticRegression;
use serde::{Deserialize, Serialize};

/// These are the options passed to `LogisticRegression::train`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	/// Specify options for early stopping. If the value is `Some`, early stopping will be enabled. If it is `None`, early stopping will be disabled.
	pub early_stopping_options: Option<EarlyStoppingOptions>,
	/// This is the L2 regularization value to use when updating the model parameters.
	pub l2_regularization: f64,
	/// This is the learning rate to use when updating the model parameters.
	pub learning_rate: f64,
	/// This is the maximum number of epochs to train.
	pub max_epochs: usize,
	/// This is the number of examples to use for each batch of training.
	pub n_examples_per_batch: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0001,
			learning_rate: 0.01,
			max_epochs: 500,
			n_examples_per_batch: 128,
			early_stopping_options: Some(EarlyStoppingOptions::default()),
		}
	}
}

/// The parameters in this struct control how to determine whether training should stop early after each epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingOptions {
	/// This is the fraction of the dataset that is set aside to compute the early stopping metric.
	pub early_stopping_fraction: f64,
	/// If this many epochs pass by without a significant improvement in the early stopping metric over the previous epoch, training will be stopped early.
	pub n_epochs_without_improvement_to_stop: usize,
	/// This is the minimum descrease in the early stopping metric for an epoch to be considered a significant improvement over the previous epoch.
	pub min_decrease_in_loss_for_significant_change: f64,
}

impl Default for EarlyStoppingOptions {
	fn default() -> Self {
		Self {
			early_stopping_fraction: 0.1,
			n_epochs_without_improvement_to_stop: 5,
			min_decrease_in_loss_for_significant_change: 1e-4,
		}
	}
}
