/// Iterative models call their progress callback once per epoch with this value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochProgress {
	/// The 1-indexed epoch that just finished.
	pub epoch: usize,
	/// The maximum number of epochs the model will train for.
	pub total: usize,
	/// The training loss after this epoch.
	pub loss: f64,
}

impl EpochProgress {
	/// The fraction of the epoch budget consumed, in `[0, 1]`.
	pub fn fraction(&self) -> f64 {
		if self.total == 0 {
			1.0
		} else {
			(self.epoch as f64 / self.total as f64).min(1.0)
		}
	}
}

#[test]
fn test_fraction() {
	let progress = EpochProgress {
		epoch: 25,
		total: 100,
		loss: 0.5,
	};
	assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
	let progress = EpochProgress {
		epoch: 3,
		total: 0,
		loss: 0.5,
	};
	assert!((progress.fraction() - 1.0).abs() < f64::EPSILON);
}
