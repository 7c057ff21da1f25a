use crate::{
	hyperparameters::{GridValue, SearchGrid},
	Classifier, ClassifierConfig, ClassifierModel, Error, Hyperparameters, ModelType,
};
use itertools::Itertools;
use lodestar_features::{FeaturePipeline, PipelineOptions};
use lodestar_metrics::{round, ClassificationMetrics, ClassificationMetricsInput, Metric};
use lodestar_util::{EpochProgress, FitError};
use ndarray::prelude::*;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One point in the hyperparameter grid.
pub type GridPoint = BTreeMap<String, GridValue>;

/// The number of evaluations kept in a `GridSearchSummary`.
pub const SUMMARY_SIZE: usize = 10;

/// Keys every family accepts, since they configure preprocessing.
const PREPROCESSING_KEYS: &[&str] = &["imputer_fill_value", "imputer_strategy", "normalization"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridEvaluation {
	pub hyperparameters: GridPoint,
	/// Mean fold accuracy, rounded.
	pub accuracy: f64,
	/// Mean fold macro F1, rounded.
	pub macro_f1: f64,
	pub folds_succeeded: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSearchSummary {
	pub best: GridPoint,
	/// The best evaluations, by accuracy then macro F1.
	pub evaluations: Vec<GridEvaluation>,
	pub evaluated: usize,
	pub folds: usize,
}

/// Reported while the grid search runs.
#[derive(Clone, Copy, Debug)]
pub struct GridProgress {
	pub combination: usize,
	pub n_combinations: usize,
	pub fold: usize,
	pub n_folds: usize,
	/// Set while an iterative classifier is training.
	pub epoch: Option<EpochProgress>,
}

impl GridProgress {
	/// The fraction of the whole search completed, in `[0, 1]`.
	pub fn fraction(&self) -> f64 {
		let n_steps = (self.n_combinations * self.n_folds).max(1) as f64;
		let step = (self.combination * self.n_folds + self.fold) as f64;
		let within = self.epoch.map(|epoch| epoch.fraction()).unwrap_or(0.0);
		((step + within) / n_steps).min(1.0)
	}
}

pub fn default_grid(model_type: ModelType) -> SearchGrid {
	let numbers = |values: &[f64]| -> Vec<GridValue> {
		values.iter().map(|value| GridValue::Number(*value)).collect()
	};
	let mut grid = SearchGrid::new();
	match model_type {
		ModelType::LogisticRegression => {
			grid.insert("learning_rate".to_owned(), numbers(&[0.001, 0.01, 0.1]));
		}
		ModelType::KNearestNeighbors => {
			grid.insert("k".to_owned(), numbers(&[3.0, 5.0, 7.0, 9.0]));
		}
		ModelType::NaiveBayes => {
			grid.insert("var_smoothing".to_owned(), numbers(&[1e-9, 1e-7, 1e-5]));
		}
		ModelType::DecisionTree => {
			grid.insert("max_depth".to_owned(), numbers(&[4.0, 8.0, 12.0]));
			grid.insert("min_samples_split".to_owned(), numbers(&[2.0, 5.0, 10.0]));
		}
		ModelType::MultilayerPerceptron => {
			grid.insert("learning_rate".to_owned(), numbers(&[0.001, 0.01]));
		}
		ModelType::SupportVectorClassifier => {
			grid.insert("cost".to_owned(), numbers(&[0.1, 1.0, 10.0]));
			grid.insert("tolerance".to_owned(), numbers(&[0.001, 0.01]));
			grid.insert("cache_size".to_owned(), numbers(&[100.0]));
			grid.insert(
				"kernel".to_owned(),
				vec![
					GridValue::Text("rbf".to_owned()),
					GridValue::Text("linear".to_owned()),
				],
			);
		}
	}
	grid
}

/// The grid keys that affect a family.
pub fn applicable_keys(model_type: ModelType) -> &'static [&'static str] {
	match model_type {
		ModelType::LogisticRegression => &[
			"batch_size",
			"early_stopping",
			"iterations",
			"l2_penalty",
			"learning_rate",
		],
		ModelType::KNearestNeighbors => &["k", "weighted"],
		ModelType::NaiveBayes => &["var_smoothing"],
		ModelType::DecisionTree => &["max_depth", "min_samples_split"],
		ModelType::MultilayerPerceptron => &["batch_size", "iterations", "l2_penalty", "learning_rate"],
		ModelType::SupportVectorClassifier => &[
			"cache_size",
			"coef0",
			"cost",
			"degree",
			"gamma",
			"kernel",
			"probability",
			"shrinking",
			"tolerance",
		],
	}
}

/**
Expand the grid for `hyperparameters.model_type`: the family's default grid with the user's `search_grid` values appended to each key, de-duplicated. Keys that do not apply to the family are dropped. The result is the Cartesian product over keys in sorted order, truncated to `max_grid_combinations`.
*/
pub fn expand_grid(hyperparameters: &Hyperparameters) -> Vec<GridPoint> {
	let model_type = hyperparameters.model_type;
	let mut grid = default_grid(model_type);
	for (key, values) in hyperparameters.search_grid.iter() {
		if !applicable_keys(model_type).contains(&key.as_str())
			&& !PREPROCESSING_KEYS.contains(&key.as_str())
		{
			debug!(key = key.as_str(), %model_type, "ignoring search grid key that does not apply");
			continue;
		}
		let entry = grid.entry(key.clone()).or_default();
		for value in values {
			if !entry.contains(value) {
				entry.push(value.clone());
			}
		}
	}
	let keys: Vec<&String> = grid.keys().collect();
	let mut points: Vec<GridPoint> = if grid.is_empty() {
		vec![GridPoint::new()]
	} else {
		grid.values()
			.map(|values| values.iter())
			.multi_cartesian_product()
			.map(|values| {
				keys.iter()
					.zip(values.into_iter())
					.map(|(key, value)| ((*key).clone(), value.clone()))
					.collect()
			})
			.collect()
	};
	if points.len() > hyperparameters.max_grid_combinations {
		warn!(
			combinations = points.len(),
			max = hyperparameters.max_grid_combinations,
			"truncating the hyperparameter grid"
		);
		points.truncate(hyperparameters.max_grid_combinations);
	}
	points
}

/**
Score every point of the expanded grid with repeated random sub-sampling validation and pick the best.

Each point is evaluated on `cv_folds` folds. A fold shuffles the rows with its own seed, holds out `cv_validation_split` of them, fits a fresh feature pipeline and classifier on the rest, and scores the held out rows. A fold whose classifier refuses to fit is skipped. The best point has the highest mean accuracy, then the highest mean macro F1, then comes first.
*/
pub fn grid_search(
	features: ArrayView2<f64>,
	labels: &[i64],
	hyperparameters: &Hyperparameters,
	progress: &mut dyn FnMut(GridProgress),
) -> Result<GridSearchSummary, Error> {
	let points = expand_grid(hyperparameters);
	let n_combinations = points.len();
	let n_folds = hyperparameters.cv_folds.max(1);
	info!(
		combinations = n_combinations,
		folds = n_folds,
		model_type = %hyperparameters.model_type,
		"starting grid search"
	);
	let mut evaluations: Vec<GridEvaluation> = Vec::with_capacity(n_combinations);
	// Unrounded (accuracy, macro F1) means, compared by `select_best`.
	let mut scores: Vec<(f64, f64)> = Vec::with_capacity(n_combinations);
	for (combination, point) in points.into_iter().enumerate() {
		let merged = hyperparameters.with_overrides(&point);
		let config = ClassifierConfig::build(&merged)?;
		let mut accuracies = Vec::with_capacity(n_folds);
		let mut macro_f1s = Vec::with_capacity(n_folds);
		for fold in 0..n_folds {
			let mut report = |epoch: Option<EpochProgress>| {
				progress(GridProgress {
					combination,
					n_combinations,
					fold,
					n_folds,
					epoch,
				})
			};
			report(None);
			let seed = merged
				.seed
				.wrapping_add(combination as u64 * 1000)
				.wrapping_add(fold as u64);
			let result = evaluate_fold(
				features,
				labels,
				&merged,
				&config,
				seed,
				&mut |epoch| report(Some(epoch)),
			);
			match result {
				Ok((accuracy, macro_f1)) => {
					accuracies.push(accuracy);
					macro_f1s.push(macro_f1);
				}
				Err(Error::Fit(error)) => {
					debug!(combination, fold, %error, "skipping fold");
				}
				Err(error) => return Err(error),
			}
		}
		let folds_succeeded = accuracies.len();
		let score = (mean(&accuracies), mean(&macro_f1s));
		let evaluation = GridEvaluation {
			hyperparameters: point,
			accuracy: round(score.0),
			macro_f1: round(score.1),
			folds_succeeded,
		};
		scores.push(score);
		debug!(
			combination,
			accuracy = evaluation.accuracy,
			macro_f1 = evaluation.macro_f1,
			folds_succeeded,
			"evaluated grid point"
		);
		evaluations.push(evaluation);
	}
	let best = select_best(&scores)
		.map(|index| evaluations[index].hyperparameters.clone())
		.unwrap_or_default();
	let evaluated = evaluations.len();
	evaluations.sort_by(|a, b| {
		b.accuracy
			.total_cmp(&a.accuracy)
			.then(b.macro_f1.total_cmp(&a.macro_f1))
	});
	evaluations.truncate(SUMMARY_SIZE);
	Ok(GridSearchSummary {
		best,
		evaluations,
		evaluated,
		folds: n_folds,
	})
}

/// The index of the `(accuracy, macro_f1)` score with the highest accuracy, breaking exact ties by macro F1 and then by position.
pub fn select_best(scores: &[(f64, f64)]) -> Option<usize> {
	let mut best: Option<usize> = None;
	for (index, (accuracy, macro_f1)) in scores.iter().enumerate() {
		best = match best {
			Some(current)
				if *accuracy < scores[current].0
					|| (*accuracy == scores[current].0 && *macro_f1 <= scores[current].1) =>
			{
				Some(current)
			}
			_ => Some(index),
		};
	}
	best
}

fn mean(values: &[f64]) -> f64 {
	if values.is_empty() {
		0.0
	} else {
		values.iter().sum::<f64>() / values.len() as f64
	}
}

/// Train and score one fold, returning its accuracy and macro F1.
fn evaluate_fold(
	features: ArrayView2<f64>,
	labels: &[i64],
	hyperparameters: &Hyperparameters,
	config: &ClassifierConfig,
	seed: u64,
	progress: &mut dyn FnMut(EpochProgress),
) -> Result<(f64, f64), Error> {
	let n = labels.len();
	if n < 2 {
		return Err(FitError::TooFewSamples {
			n_samples: n,
			min_samples: 2,
		}
		.into());
	}
	let mut indices: Vec<usize> = (0..n).collect();
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	indices.shuffle(&mut rng);
	let n_test = ((n as f64 * hyperparameters.cv_validation_split).round() as usize).clamp(1, n - 1);
	let (test_indices, train_indices) = indices.split_at(n_test);
	let features_train = features.select(Axis(0), train_indices);
	let labels_train: Vec<i64> = train_indices.iter().map(|index| labels[*index]).collect();
	let features_test = features.select(Axis(0), test_indices);
	let labels_test: Vec<i64> = test_indices.iter().map(|index| labels[*index]).collect();
	let pipeline = FeaturePipeline::fit(
		features_train.view(),
		&PipelineOptions {
			imputer_strategy: hyperparameters.imputer_strategy,
			imputer_fill_value: hyperparameters.imputer_fill_value,
			normalization: hyperparameters.normalization,
		},
	);
	let features_train = pipeline.transform(features_train.view());
	let features_test = pipeline.transform(features_test.view());
	let mut model = ClassifierModel::new(config.clone());
	model.train(features_train.view(), &labels_train, progress)?;
	let predictions = model.predict(features_test.view())?;
	let metrics = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: &labels_test,
		predictions: &predictions,
	});
	Ok((metrics.accuracy, metrics.macro_average.f1_score))
}

#[cfg(test)]
fn blobs(n_per_class: usize) -> (Array2<f64>, Vec<i64>) {
	let n = 2 * n_per_class;
	let features = Array2::from_shape_fn((n, 2), |(i, j)| {
		let class = (i % 2) as f64;
		let jitter = ((i * 7 + j * 3) % 10) as f64 / 10.0;
		class * 4.0 + jitter
	});
	let labels = (0..n).map(|i| (i % 2) as i64).collect();
	(features, labels)
}

#[test]
fn test_expand_grid() {
	let hyperparameters = Hyperparameters {
		model_type: ModelType::DecisionTree,
		search_grid: maplit::btreemap! {
			"max_depth".to_owned() => vec![GridValue::Number(8.0), GridValue::Number(16.0)],
			"k".to_owned() => vec![GridValue::Number(3.0)],
			"normalization".to_owned() => vec![GridValue::Text("l2".to_owned())],
		},
		..Default::default()
	};
	let points = expand_grid(&hyperparameters);
	// max_depth {4, 8, 12, 16} x min_samples_split {2, 5, 10} x normalization {l2}
	assert_eq!(points.len(), 12);
	assert!(points.iter().all(|point| !point.contains_key("k")));
	assert_eq!(
		points[0],
		maplit::btreemap! {
			"max_depth".to_owned() => GridValue::Number(4.0),
			"min_samples_split".to_owned() => GridValue::Number(2.0),
			"normalization".to_owned() => GridValue::Text("l2".to_owned()),
		}
	);
	let svc = Hyperparameters {
		model_type: ModelType::SupportVectorClassifier,
		max_grid_combinations: 5,
		..Default::default()
	};
	assert_eq!(expand_grid(&svc).len(), 5);
}

#[test]
fn test_single_point_grid() {
	let (features, labels) = blobs(20);
	let hyperparameters = Hyperparameters {
		model_type: ModelType::NaiveBayes,
		max_grid_combinations: 1,
		..Default::default()
	};
	let summary = grid_search(features.view(), &labels, &hyperparameters, &mut |_| {}).unwrap();
	assert_eq!(summary.evaluated, 1);
	assert_eq!(
		summary.best,
		maplit::btreemap! { "var_smoothing".to_owned() => GridValue::Number(1e-9) }
	);
	assert_eq!(summary.evaluations[0].folds_succeeded, 3);
	assert_eq!(summary.evaluations[0].accuracy, 1.0);
}

#[test]
fn test_best_is_maximal() {
	let (features, labels) = blobs(15);
	let hyperparameters = Hyperparameters {
		model_type: ModelType::KNearestNeighbors,
		search_grid: maplit::btreemap! {
			"k".to_owned() => vec![GridValue::Number(1.0), GridValue::Number(21.0)],
		},
		..Default::default()
	};
	let mut last_fraction = 0.0;
	let summary = grid_search(features.view(), &labels, &hyperparameters, &mut |progress| {
		assert!(progress.fraction() >= last_fraction);
		last_fraction = progress.fraction();
	})
	.unwrap();
	assert_eq!(summary.evaluated, 6);
	let best = summary
		.evaluations
		.iter()
		.find(|evaluation| evaluation.hyperparameters == summary.best)
		.unwrap();
	for evaluation in summary.evaluations.iter() {
		assert!(best.accuracy >= evaluation.accuracy);
	}
	assert!(summary
		.evaluations
		.windows(2)
		.all(|pair| pair[0].accuracy >= pair[1].accuracy));
}

#[test]
fn test_failed_folds_score_zero() {
	// k = 21 is more neighbors than any fold has rows, so every fold fails to fit.
	let (features, labels) = blobs(5);
	let hyperparameters = Hyperparameters {
		model_type: ModelType::KNearestNeighbors,
		search_grid: maplit::btreemap! { "k".to_owned() => vec![GridValue::Number(21.0)] },
		..Default::default()
	};
	let summary = grid_search(features.view(), &labels, &hyperparameters, &mut |_| {}).unwrap();
	let failed = summary
		.evaluations
		.iter()
		.find(|evaluation| evaluation.hyperparameters["k"] == GridValue::Number(21.0))
		.unwrap();
	assert_eq!(failed.folds_succeeded, 0);
	assert_eq!(failed.accuracy, 0.0);
	assert_eq!(failed.macro_f1, 0.0);
	assert_ne!(summary.best["k"], GridValue::Number(21.0));
}

#[test]
fn test_select_best_ties() {
	let scores = [(0.9, 0.8), (0.9, 0.85), (0.9, 0.85), (0.8, 0.99)];
	assert_eq!(select_best(&scores), Some(1));
	assert_eq!(select_best(&[]), None);
}

#[test]
fn test_select_best_ignores_rounding() {
	// Both accuracies round to 0.9, but only an exact tie falls through to macro F1.
	let scores = [(0.90001, 0.9), (0.90004, 0.1)];
	assert_eq!(select_best(&scores), Some(1));
}
