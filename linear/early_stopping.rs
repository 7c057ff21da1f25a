use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// Split `features` and `labels` so the last `early_stopping_fraction` of the rows are held out. Returns `None` if either side would be empty.
pub fn train_early_stopping_split<'features, 'labels, Label>(
	features: ArrayView2<'features, f64>,
	labels: ArrayView1<'labels, Label>,
	early_stopping_fraction: f64,
) -> Option<(
	ArrayView2<'features, f64>,
	ArrayView1<'labels, Label>,
	ArrayView2<'features, f64>,
	ArrayView1<'labels, Label>,
)> {
	let n_rows = features.nrows();
	let split_index = ((1.0 - early_stopping_fraction) * n_rows.to_f64()?)
		.round()
		.to_usize()?;
	if split_index == 0 || split_index >= n_rows {
		return None;
	}
	let (features_train, features_early_stopping) = features.split_at(Axis(0), split_index);
	let (labels_train, labels_early_stopping) = labels.split_at(Axis(0), split_index);
	Some((
		features_train,
		labels_train,
		features_early_stopping,
		labels_early_stopping,
	))
}

/**
The `EarlyStoppingMonitor` keeps track of the values of an early stopping metric for each epoch, and if enough epochs have passed without a significant improvement in the metric, the `update()` function will return `true` to indicate that training should be stopped.
*/
#[derive(Clone)]
pub struct EarlyStoppingMonitor {
	threshold: f64,
	epochs: usize,
	n_epochs_without_observed_improvement: usize,
	previous_epoch_metric_value: Option<f64>,
}

impl EarlyStoppingMonitor {
	pub fn new(threshold: f64, epochs: usize) -> Self {
		EarlyStoppingMonitor {
			threshold,
			epochs,
			n_epochs_without_observed_improvement: 0,
			previous_epoch_metric_value: None,
		}
	}

	/// Update with the next epoch's early stopping metric. Returns true if training should stop.
	pub fn update(&mut self, early_stopping_metric_value: f64) -> bool {
		let result = if let Some(previous) = self.previous_epoch_metric_value {
			if early_stopping_metric_value > previous
				|| f64::abs(early_stopping_metric_value - previous) < self.threshold
			{
				self.n_epochs_without_observed_improvement += 1;
				self.n_epochs_without_observed_improvement >= self.epochs
			} else {
				self.n_epochs_without_observed_improvement = 0;
				false
			}
		} else {
			false
		};
		self.previous_epoch_metric_value = Some(early_stopping_metric_value);
		result
	}
}

#[test]
fn test_monitor_stops_after_plateau() {
	let mut monitor = EarlyStoppingMonitor::new(1e-3, 2);
	assert!(!monitor.update(1.0));
	assert!(!monitor.update(0.5));
	assert!(!monitor.update(0.4999));
	assert!(monitor.update(0.6));
}

#[test]
fn test_split() {
	let features = Array2::<f64>::zeros((10, 2));
	let labels = Array1::<usize>::zeros(10);
	let (a, b, c, d) = train_early_stopping_split(features.view(), labels.view(), 0.2).unwrap();
	assert_eq!((a.nrows(), b.len(), c.nrows(), d.len()), (8, 8, 2, 2));
	let features = Array2::<f64>::zeros((2, 2));
	let labels = Array1::<usize>::zeros(2);
	assert!(train_early_stopping_split(features.view(), labels.view(), 0.1).is_none());
}
