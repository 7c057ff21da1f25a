/*!
This crate defines the [`Metric`](trait.Metric.html) and [`StreamingMetric`](trait.StreamingMetric.html) traits and the metrics the training pipeline needs: a numerically stable [`MeanVariance`](struct.MeanVariance.html), [`CrossEntropy`](struct.CrossEntropy.html), [`ClassificationMetrics`](struct.ClassificationMetrics.html), and the pairwise [`auc`](fn.auc.html).
*/

mod auc;
mod classification;
mod cross_entropy;
mod mean;
mod mean_variance;

pub use self::auc::auc;
pub use self::classification::{
	AveragedMetrics, ClassMetrics, ClassificationMetrics, ClassificationMetricsInput,
	ClassificationMetricsOutput,
};
pub use self::cross_entropy::{CrossEntropy, CrossEntropyInput};
pub use self::mean::Mean;
pub use self::mean_variance::{m2_to_variance, merge_mean_m2, MeanVariance, MeanVarianceOutput};

/**
The `Metric` trait defines a common interface to metrics that can be computed when the entire input is available at once.

The seemingly unused generic lifetime `'a` allows `Input`s to borrow from their enclosing scope.
*/
pub trait Metric<'a> {
	type Input;
	type Output;
	fn compute(input: Self::Input) -> Self::Output;
}

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input arrives one value or one chunk at a time.

After being initialized, a value implementing `StreamingMetric` can have `update()` called on it with values of the associated type `Input`. Two independently aggregated metrics can be combined with `merge()`. When finished aggregating, call `finalize()` to produce the associated type `Output`.

```
use lodestar_metrics::StreamingMetric;

struct Min(f64);

impl StreamingMetric<'_> for Min {
	type Input = f64;
	type Output = f64;
	fn update(&mut self, input: Self::Input) {
		self.0 = self.0.min(input)
	}
	fn merge(&mut self, other: Self) { self.0 = self.0.min(other.0) }
	fn finalize(self) -> Self::Output { self.0 }
}
```
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge two independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}

/// Every reported metric is rounded to this many decimal places so artifacts are reproducible byte for byte.
pub const DECIMALS: i32 = 4;

/// Standard deviations below this value are replaced with 1.0 before anything divides by them.
pub const STD_DEV_FLOOR: f64 = 1e-12;

/// Round `value` to [`DECIMALS`](constant.DECIMALS.html) decimal places. Non-finite values become 0.0.
pub fn round(value: f64) -> f64 {
	if !value.is_finite() {
		return 0.0;
	}
	let scale = 10f64.powi(DECIMALS);
	(value * scale).round() / scale
}

/// Convert a variance to a standard deviation that is safe to divide by.
pub fn std_dev_with_floor(variance: f64) -> f64 {
	let std_dev = variance.max(0.0).sqrt();
	if std_dev < STD_DEV_FLOOR || !std_dev.is_finite() {
		1.0
	} else {
		std_dev
	}
}

#[test]
fn test_round() {
	assert_eq!(round(0.123_456), 0.1235);
	assert_eq!(round(2.0 / 3.0), 0.6667);
	assert_eq!(round(f64::NAN), 0.0);
}

#[test]
fn test_std_dev_with_floor() {
	assert_eq!(std_dev_with_floor(0.0), 1.0);
	assert_eq!(std_dev_with_floor(1e-30), 1.0);
	assert_eq!(std_dev_with_floor(4.0), 2.0);
	assert_eq!(std_dev_with_floor(-1.0), 1.0);
}
