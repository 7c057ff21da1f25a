use super::{mean::Mean, StreamingMetric};
use ndarray::prelude::*;
use num_traits::clamp;

/// CrossEntropy is the loss minimized by the softmax models. [Learn more](https://en.wikipedia.org/wiki/Cross_entropy#Cross-entropy_loss_function_and_logistic_regression).
#[derive(Clone, Debug, Default)]
pub struct CrossEntropy(Mean);

pub struct CrossEntropyInput<'a> {
	/// (n_classes)
	pub probabilities: ArrayView1<'a, f64>,
	/// 0-indexed class
	pub label: usize,
}

impl<'a> StreamingMetric<'a> for CrossEntropy {
	type Input = CrossEntropyInput<'a>;
	type Output = Option<f64>;

	fn update(&mut self, value: CrossEntropyInput) {
		// The log is undefined at 0, so the probability is clamped away from the edges.
		let probability = value
			.probabilities
			.get(value.label)
			.copied()
			.unwrap_or(0.0);
		let probability = clamp(probability, f64::EPSILON, 1.0 - f64::EPSILON);
		self.0.update(-probability.ln())
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Option<f64> {
		self.0.finalize()
	}
}

#[test]
fn test_cross_entropy() {
	let probabilities = arr2(&[[0.5, 0.5], [0.25, 0.75]]);
	let mut metric = CrossEntropy::default();
	metric.update(CrossEntropyInput {
		probabilities: probabilities.row(0),
		label: 0,
	});
	metric.update(CrossEntropyInput {
		probabilities: probabilities.row(1),
		label: 1,
	});
	let expected = (-(0.5f64).ln() - (0.75f64).ln()) / 2.0;
	assert!((metric.finalize().unwrap() - expected).abs() < 1e-12);
}
