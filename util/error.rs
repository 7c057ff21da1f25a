use std::collections::BTreeSet;
use thiserror::Error;

/// The conditions under which a model refuses to fit. Cross validation treats every variant as a degenerate fold and skips it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitError {
	#[error("{n_samples} samples is too few to fit, at least {min_samples} are required")]
	TooFewSamples { n_samples: usize, min_samples: usize },
	#[error("at least two classes are required to fit, found {n_classes}")]
	TooFewClasses { n_classes: usize },
	#[error("features have {n_features} columns but the model expects {expected}")]
	FeatureCountMismatch { n_features: usize, expected: usize },
}

impl FitError {
	/// Check the sample and class counts every model requires.
	pub fn check(n_samples: usize, min_samples: usize, n_classes: usize) -> Result<(), FitError> {
		if n_samples < min_samples {
			return Err(FitError::TooFewSamples {
				n_samples,
				min_samples,
			});
		}
		if n_classes < 2 {
			return Err(FitError::TooFewClasses { n_classes });
		}
		Ok(())
	}

	/// Like `check`, counting the distinct classes that actually occur in `labels`.
	pub fn check_labels<'a>(
		labels: impl IntoIterator<Item = &'a usize>,
		min_samples: usize,
	) -> Result<(), FitError> {
		let mut n_samples = 0;
		let mut classes = BTreeSet::new();
		for label in labels {
			n_samples += 1;
			classes.insert(*label);
		}
		FitError::check(n_samples, min_samples, classes.len())
	}
}

#[test]
fn test_check() {
	assert_eq!(FitError::check(10, 2, 2), Ok(()));
	assert_eq!(
		FitError::check(1, 2, 2),
		Err(FitError::TooFewSamples {
			n_samples: 1,
			min_samples: 2
		})
	);
	assert_eq!(
		FitError::check(10, 2, 1),
		Err(FitError::TooFewClasses { n_classes: 1 })
	);
}

#[test]
fn test_check_labels() {
	assert_eq!(FitError::check_labels(&[0, 1, 1], 2), Ok(()));
	assert_eq!(
		FitError::check_labels(&[1, 1, 1], 2),
		Err(FitError::TooFewClasses { n_classes: 1 })
	);
	assert_eq!(
		FitError::check_labels(&[1], 2),
		Err(FitError::TooFewSamples {
			n_samples: 1,
			min_samples: 2
		})
	);
}
