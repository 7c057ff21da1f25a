//! Welford's online algorithm for the mean and variance, with the parallel merge from https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use super::{Metric, StreamingMetric};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/**
`MeanVariance` computes the mean and population variance of a stream of values in a single pass. Each update applies

```text
delta = x - mean
mean += delta / count
m2 += delta * (x - mean)
```

which avoids the catastrophic cancellation of the naive sum-of-squares formula.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeanVariance {
	n: u64,
	mean: f64,
	m2: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanVarianceOutput {
	pub n: u64,
	pub mean: f64,
	/// The population variance. It is never negative.
	pub variance: f64,
}

impl MeanVariance {
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of values seen so far.
	pub fn n(&self) -> u64 {
		self.n
	}

	/// The running mean. It is 0.0 before any value is seen.
	pub fn mean(&self) -> f64 {
		self.mean
	}

	/// The running population variance. It is 0.0 before any value is seen.
	pub fn variance(&self) -> f64 {
		match self.n {
			0 => 0.0,
			n => m2_to_variance(self.m2, n),
		}
	}
}

impl StreamingMetric<'_> for MeanVariance {
	type Input = f64;
	type Output = MeanVarianceOutput;

	fn update(&mut self, value: f64) {
		self.n += 1;
		let delta = value - self.mean;
		self.mean += delta / self.n as f64;
		self.m2 += delta * (value - self.mean);
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		if self.n == 0 {
			*self = other;
			return;
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, other.n, other.mean, other.m2);
		self.n += other.n;
		self.mean = mean;
		self.m2 = m2;
	}

	fn finalize(self) -> MeanVarianceOutput {
		MeanVarianceOutput {
			n: self.n,
			mean: self.mean,
			variance: self.variance(),
		}
	}
}

impl<'a> Metric<'a> for MeanVariance {
	type Input = &'a [f64];
	type Output = MeanVarianceOutput;

	fn compute(input: &'a [f64]) -> MeanVarianceOutput {
		let mut mean_variance = MeanVariance::new();
		for value in input.iter() {
			mean_variance.update(*value);
		}
		mean_variance.finalize()
	}
}

/// Combine two separately computed means and M2 sums into a single mean and M2.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap_or(0.0);
	let n_b = n_b.to_f64().unwrap_or(0.0);
	let n = n_a + n_b;
	let delta = mean_b - mean_a;
	(
		((n_a * mean_a) + (n_b * mean_b)) / n,
		m2_a + m2_b + delta * delta * (n_a * n_b / n),
	)
}

/// Convert an M2 sum to a population variance, clamping rounding noise below zero.
pub fn m2_to_variance(m2: f64, n: u64) -> f64 {
	(m2 / n.to_f64().unwrap_or(1.0)).max(0.0)
}

#[cfg(test)]
fn two_pass(values: &[f64]) -> (f64, f64) {
	let n = values.len() as f64;
	let mean = values.iter().sum::<f64>() / n;
	let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
	(mean, variance)
}

#[test]
fn test_matches_two_pass() {
	let values: Vec<f64> = (0..1000)
		.map(|i| {
			let i = i as f64;
			1000.0 + (i * 0.37).sin() * 25.0 + i * 0.001
		})
		.collect();
	let output = MeanVariance::compute(values.as_slice());
	let (mean, variance) = two_pass(&values);
	assert_eq!(output.n, 1000);
	assert!((output.mean - mean).abs() < 1e-9);
	assert!((output.variance - variance).abs() < 1e-9);
}

#[test]
fn test_merge_matches_single_stream() {
	let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
	let mut left = MeanVariance::new();
	let mut right = MeanVariance::new();
	for value in values[..3].iter() {
		left.update(*value);
	}
	for value in values[3..].iter() {
		right.update(*value);
	}
	left.merge(right);
	let output = left.finalize();
	assert_eq!(output.n, 8);
	assert!((output.mean - 5.0).abs() < 1e-12);
	assert!((output.variance - 4.0).abs() < 1e-12);
}

#[test]
fn test_constant_values_have_zero_variance() {
	let output = MeanVariance::compute(&[3.5; 17]);
	assert_eq!(output.mean, 3.5);
	assert_eq!(output.variance, 0.0);
	let empty = MeanVariance::compute(&[]);
	assert_eq!(empty.n, 0);
	assert_eq!(empty.variance, 0.0);
}
