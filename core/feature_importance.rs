use lodestar_metrics::{round, std_dev_with_floor, MeanVariance, StreamingMetric};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// The number of features reported.
pub const MAX_FEATURE_IMPORTANCES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
	pub name: String,
	/// The absolute Pearson correlation between the feature and the label, rounded.
	pub contribution: f64,
}

/**
Rank features by the absolute Pearson correlation of each column with the binary label `label == positive_label`, returning at most ten, largest first. Standard deviations below the floor are replaced with 1.0, so a constant column contributes 0.
*/
pub fn feature_importances(
	feature_names: &[String],
	features: ArrayView2<f64>,
	labels: &[i64],
	positive_label: i64,
) -> Vec<FeatureImportance> {
	let targets: Vec<f64> = labels
		.iter()
		.map(|label| if *label == positive_label { 1.0 } else { 0.0 })
		.collect();
	let n = targets.len() as f64;
	let target_stats = {
		let mut stats = MeanVariance::new();
		for target in targets.iter() {
			stats.update(*target);
		}
		stats.finalize()
	};
	let target_std_dev = std_dev_with_floor(target_stats.variance);
	let mut importances: Vec<FeatureImportance> = feature_names
		.iter()
		.zip(features.columns())
		.map(|(name, column)| {
			let mut stats = MeanVariance::new();
			for value in column.iter() {
				stats.update(*value);
			}
			let stats = stats.finalize();
			let covariance = column
				.iter()
				.zip(targets.iter())
				.map(|(value, target)| (value - stats.mean) * (target - target_stats.mean))
				.sum::<f64>()
				/ n;
			let correlation =
				covariance / (std_dev_with_floor(stats.variance) * target_std_dev);
			FeatureImportance {
				name: name.clone(),
				contribution: round(correlation.abs()),
			}
		})
		.collect();
	importances.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
	importances.truncate(MAX_FEATURE_IMPORTANCES);
	importances
}

#[test]
fn test_feature_importances() {
	let names: Vec<String> = ["signal", "constant", "inverse", "noise"]
		.iter()
		.map(|name| name.to_string())
		.collect();
	let features = array![
		[0.0, 5.0, 1.0, 0.3],
		[0.0, 5.0, 1.0, 0.9],
		[1.0, 5.0, 0.0, 0.1],
		[1.0, 5.0, 0.0, 0.4],
	];
	let labels = [3, 3, 8, 8];
	let importances = feature_importances(&names, features.view(), &labels, 8);
	insta::assert_debug_snapshot!(importances, @r###"
	[
	    FeatureImportance {
	        name: "signal",
	        contribution: 1.0,
	    },
	    FeatureImportance {
	        name: "inverse",
	        contribution: 1.0,
	    },
	    FeatureImportance {
	        name: "noise",
	        contribution: 0.5937,
	    },
	    FeatureImportance {
	        name: "constant",
	        contribution: 0.0,
	    },
	]
	"###);
}

#[test]
fn test_at_most_ten_sorted() {
	let n_features = 15;
	let names: Vec<String> = (0..n_features).map(|i| format!("f{}", i)).collect();
	let features = Array2::from_shape_fn((20, n_features), |(i, j)| ((i * (j + 1)) % 7) as f64);
	let labels: Vec<i64> = (0..20).map(|i| (i % 2) as i64).collect();
	let importances = feature_importances(&names, features.view(), &labels, 1);
	assert_eq!(importances.len(), 10);
	assert!(importances
		.windows(2)
		.all(|pair| pair[0].contribution >= pair[1].contribution));
}
