use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The arithmetic mean of a stream of values. The output is `None` if no values were seen.
#[derive(Clone, Debug, Default)]
pub struct Mean {
	n: u64,
	sum: f64,
}

impl StreamingMetric<'_> for Mean {
	type Input = f64;
	type Output = Option<f64>;

	fn update(&mut self, value: f64) {
		self.n += 1;
		self.sum += value;
	}

	fn merge(&mut self, other: Self) {
		self.n += other.n;
		self.sum += other.sum;
	}

	fn finalize(self) -> Option<f64> {
		match self.n {
			0 => None,
			n => Some(self.sum / n.to_f64()?),
		}
	}
}

#[test]
fn test_mean() {
	let mut mean = Mean::default();
	for value in [1.0, 2.0, 3.0, 6.0].iter() {
		mean.update(*value);
	}
	assert_eq!(mean.finalize(), Some(3.0));
	assert_eq!(Mean::default().finalize(), None);
}
