use super::round;

/**
Compute the area under the receiver operating characteristic curve by comparing every positive score against every negative score.

```text
auc = (wins + 0.5 * ties) / (n_positives * n_negatives)
```

A pair is a win when the positive example scores strictly higher than the negative one. The result only depends on the ordering of `scores`, so any strictly increasing transform of the scores leaves it unchanged. If either class has no examples, the result is 0.0.
*/
pub fn auc(scores: &[f64], is_positive: &[bool]) -> f64 {
	let positives: Vec<f64> = scores
		.iter()
		.zip(is_positive.iter())
		.filter(|(_, is_positive)| **is_positive)
		.map(|(score, _)| *score)
		.collect();
	let negatives: Vec<f64> = scores
		.iter()
		.zip(is_positive.iter())
		.filter(|(_, is_positive)| !**is_positive)
		.map(|(score, _)| *score)
		.collect();
	if positives.is_empty() || negatives.is_empty() {
		return 0.0;
	}
	let mut wins = 0u64;
	let mut ties = 0u64;
	for positive in positives.iter() {
		for negative in negatives.iter() {
			if positive > negative {
				wins += 1;
			} else if positive == negative {
				ties += 1;
			}
		}
	}
	let n_pairs = positives.len() as f64 * negatives.len() as f64;
	round((wins as f64 + 0.5 * ties as f64) / n_pairs)
}

#[test]
fn test_auc() {
	let scores = [0.9, 0.4, 0.4, 0.2];
	let is_positive = [true, true, false, false];
	assert_eq!(auc(&scores, &is_positive), 0.875);
}

#[test]
fn test_perfect_separation() {
	let scores = [0.1, 0.2, 0.3, 0.7, 0.8, 0.95];
	let is_positive = [false, false, false, true, true, true];
	assert_eq!(auc(&scores, &is_positive), 1.0);
	let flipped: Vec<bool> = is_positive.iter().map(|p| !p).collect();
	assert_eq!(auc(&scores, &flipped), 0.0);
}

#[test]
fn test_monotonic_transform() {
	let scores = [0.3, 0.6, 0.1, 0.45, 0.45, 0.8, 0.2];
	let is_positive = [false, true, false, true, false, true, true];
	let transformed: Vec<f64> = scores.iter().map(|s| (s * 10.0f64).exp() - 3.0).collect();
	assert_eq!(auc(&scores, &is_positive), auc(&transformed, &is_positive));
}

#[test]
fn test_single_class() {
	assert_eq!(auc(&[0.1, 0.9], &[true, true]), 0.0);
	assert_eq!(auc(&[0.1, 0.9], &[false, false]), 0.0);
	assert_eq!(auc(&[], &[]), 0.0);
}
