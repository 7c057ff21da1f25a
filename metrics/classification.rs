use super::{round, Metric};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/**
`ClassificationMetrics` computes accuracy, per class precision, recall, F1 and support, their macro and support weighted averages, and the confusion matrix for a set of predictions.

The confusion matrix is keyed by the sorted distinct values that appear among the labels and the predictions. Its outer key is the label and its inner key is the prediction, so the sum of a row is the support of that class and the sum of every cell is the number of examples.
*/
pub struct ClassificationMetrics;

pub struct ClassificationMetricsInput<'a> {
	pub labels: &'a [i64],
	pub predictions: &'a [i64],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetricsOutput {
	pub accuracy: f64,
	pub class_metrics: BTreeMap<i64, ClassMetrics>,
	#[serde(rename = "macro")]
	pub macro_average: AveragedMetrics,
	#[serde(rename = "weighted")]
	pub weighted_average: AveragedMetrics,
	/// label -> prediction -> count
	pub confusion_matrix: BTreeMap<i64, BTreeMap<i64, u64>>,
	pub n_examples: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
	pub precision: f64,
	pub recall: f64,
	pub f1_score: f64,
	pub support: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
	pub precision: f64,
	pub recall: f64,
	pub f1_score: f64,
}

impl<'a> Metric<'a> for ClassificationMetrics {
	type Input = ClassificationMetricsInput<'a>;
	type Output = ClassificationMetricsOutput;

	fn compute(input: ClassificationMetricsInput<'a>) -> ClassificationMetricsOutput {
		let ClassificationMetricsInput {
			labels,
			predictions,
		} = input;
		let classes: BTreeSet<i64> = labels.iter().chain(predictions.iter()).copied().collect();
		let mut confusion_matrix: BTreeMap<i64, BTreeMap<i64, u64>> = classes
			.iter()
			.map(|label| (*label, classes.iter().map(|prediction| (*prediction, 0)).collect()))
			.collect();
		for (label, prediction) in labels.iter().zip(predictions.iter()) {
			if let Some(count) = confusion_matrix
				.get_mut(label)
				.and_then(|row| row.get_mut(prediction))
			{
				*count += 1;
			}
		}
		let n_examples: u64 = confusion_matrix.values().flat_map(|row| row.values()).sum();
		let n_correct: u64 = classes
			.iter()
			.map(|class| confusion_matrix[class][class])
			.sum();
		// Unrounded per class values, so the averages are computed before rounding.
		let raw: Vec<(i64, f64, f64, f64, u64)> = classes
			.iter()
			.map(|&class| {
				let true_positives = confusion_matrix[&class][&class];
				let support: u64 = confusion_matrix[&class].values().sum();
				let predicted: u64 = confusion_matrix.values().map(|row| row[&class]).sum();
				let precision = ratio(true_positives, predicted);
				let recall = ratio(true_positives, support);
				let f1_score = if precision + recall > 0.0 {
					2.0 * precision * recall / (precision + recall)
				} else {
					0.0
				};
				(class, precision, recall, f1_score, support)
			})
			.collect();
		let n_classes = raw.len() as f64;
		let macro_average = if raw.is_empty() {
			AveragedMetrics::default()
		} else {
			AveragedMetrics {
				precision: round(raw.iter().map(|c| c.1).sum::<f64>() / n_classes),
				recall: round(raw.iter().map(|c| c.2).sum::<f64>() / n_classes),
				f1_score: round(raw.iter().map(|c| c.3).sum::<f64>() / n_classes),
			}
		};
		let weighted = |select: fn(&(i64, f64, f64, f64, u64)) -> f64| -> f64 {
			round(
				raw.iter()
					.map(|c| select(c) * c.4 as f64)
					.sum::<f64>() / (n_examples.max(1)) as f64,
			)
		};
		let weighted_average = AveragedMetrics {
			precision: weighted(|c| c.1),
			recall: weighted(|c| c.2),
			f1_score: weighted(|c| c.3),
		};
		let class_metrics = raw
			.iter()
			.map(|&(class, precision, recall, f1_score, support)| {
				(
					class,
					ClassMetrics {
						precision: round(precision),
						recall: round(recall),
						f1_score: round(f1_score),
						support,
					},
				)
			})
			.collect();
		ClassificationMetricsOutput {
			accuracy: round(ratio(n_correct, n_examples)),
			class_metrics,
			macro_average,
			weighted_average,
			confusion_matrix,
			n_examples,
		}
	}
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
	if denominator == 0 {
		0.0
	} else {
		numerator as f64 / denominator as f64
	}
}

#[test]
fn test_binary() {
	let labels = [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
	let predictions = [
		0, // correct
		0, // correct
		0, // correct
		0, // correct
		0, // correct
		1, // incorrect
		1, // incorrect
		1, // incorrect
		1, // correct
		1, // correct
		1, // correct
		0, // incorrect
		0, // incorrect
	];
	let metrics = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: &labels,
		predictions: &predictions,
	});
	assert_eq!(metrics.accuracy, 0.6154);
	assert_eq!(metrics.n_examples, 13);
	assert_eq!(
		metrics.class_metrics[&0],
		ClassMetrics {
			precision: 0.7143,
			recall: 0.625,
			f1_score: 0.6667,
			support: 8,
		}
	);
	assert_eq!(
		metrics.class_metrics[&1],
		ClassMetrics {
			precision: 0.5,
			recall: 0.6,
			f1_score: 0.5455,
			support: 5,
		}
	);
	assert_eq!(
		metrics.macro_average,
		AveragedMetrics {
			precision: 0.6071,
			recall: 0.6125,
			f1_score: 0.6061,
		}
	);
	assert_eq!(
		metrics.weighted_average,
		AveragedMetrics {
			precision: 0.6319,
			recall: 0.6154,
			f1_score: 0.62,
		}
	);
	insta::assert_debug_snapshot!(metrics.confusion_matrix, @r###"
	{
	    0: {
	        0: 5,
	        1: 3,
	    },
	    1: {
	        0: 2,
	        1: 3,
	    },
	}
	"###);
}

#[test]
fn test_multiclass_sums() {
	// example taken from https://en.wikipedia.org/wiki/Confusion_matrix
	let labels = [
		0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 1, 1, 1, 2, 2, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	let predictions = [
		0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
	];
	let metrics = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: &labels,
		predictions: &predictions,
	});
	let total: u64 = metrics
		.confusion_matrix
		.values()
		.flat_map(|row| row.values())
		.sum();
	assert_eq!(total, labels.len() as u64);
	for (label, row) in metrics.confusion_matrix.iter() {
		assert_eq!(row.values().sum::<u64>(), metrics.class_metrics[label].support);
	}
	assert_eq!(metrics.class_metrics[&0].support, 8);
	assert_eq!(metrics.class_metrics[&1].support, 6);
	assert_eq!(metrics.class_metrics[&2].support, 13);
	assert_eq!(metrics.accuracy, 0.7037);
}

#[test]
fn test_prediction_outside_labels_gets_a_column() {
	let metrics = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: &[1, 1],
		predictions: &[1, 3],
	});
	assert_eq!(metrics.confusion_matrix[&1][&3], 1);
	assert_eq!(metrics.confusion_matrix[&3][&3], 0);
	assert_eq!(metrics.class_metrics[&3].precision, 0.0);
	assert_eq!(metrics.class_metrics[&3].support, 0);
}

#[test]
fn test_empty() {
	let metrics = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: &[],
		predictions: &[],
	});
	assert_eq!(metrics.accuracy, 0.0);
	assert!(metrics.confusion_matrix.is_empty());
}
