use ndarray::prelude::*;

/// Replace each row of `logits` with its softmax.
pub fn softmax(mut logits: ArrayViewMut2<f64>) {
	for mut logits in logits.rows_mut() {
		let max = logits.iter().fold(f64::MIN, |a, &b| a.max(b));
		logits -= max;
		logits.mapv_inplace(|l| l.exp());
		let sum = logits.sum();
		logits /= sum;
	}
}

/// The index of the largest value. Ties go to the first index.
pub fn argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> usize {
	let mut best = 0;
	let mut best_value = f64::NEG_INFINITY;
	for (index, value) in values.into_iter().enumerate() {
		if *value > best_value {
			best = index;
			best_value = *value;
		}
	}
	best
}

#[test]
fn test_softmax() {
	let mut logits = array![[1.0, 1.0], [1000.0, 0.0]];
	softmax(logits.view_mut());
	assert_eq!(logits.row(0).to_vec(), vec![0.5, 0.5]);
	assert_eq!(logits.row(1).to_vec(), vec![1.0, 0.0]);
}

#[test]
fn test_argmax() {
	assert_eq!(argmax(&[0.2, 0.5, 0.3]), 1);
	assert_eq!(argmax(&[0.5, 0.5]), 0);
	assert_eq!(argmax(&[]), 0);
}
