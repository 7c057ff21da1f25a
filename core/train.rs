use crate::{
	artifact::{ArtifactStore, ImputerDescriptor, SchemaDescriptor, TrainingArtifact, ValidationMetrics},
	config::{shuffle_seed, Config, Shuffle},
	feature_importance::feature_importances,
	grid::{expand_grid, grid_search},
	memory::{downsample, is_over_limit, MemoryMonitor, SystemMemoryMonitor, DEFAULT_MEMORY_LIMIT_MB},
	progress::{Progress, ProgressNotifier},
	split::{split, FeatureStatistics, Split},
	Classifier, ClassifierConfig, ClassifierModel, DatasetStorage, Error, Hyperparameters,
	ModelType, TrainingRun, CLASSIFIER_CONFIG_VERSION,
};
use chrono::Utc;
use lodestar_dataframe::{
	ColumnMapping, Dataset, LoadOptions, RowBuffer, DEFAULT_CATEGORY_CAP, DEFAULT_MAX_ROWS,
};
use lodestar_features::{FeaturePipeline, Imputer, Standardizer};
use lodestar_metrics::{auc, ClassificationMetrics, ClassificationMetricsInput, Metric};
use lodestar_util::{argmax, Id};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Everything needed to train one model from one dataset.
#[derive(Clone, Debug)]
pub struct TrainRequest {
	pub model_id: String,
	pub dataset_id: String,
	pub columns: ColumnMapping,
	/// The raw hyperparameters, resolved with `Hyperparameters::resolve`.
	pub hyperparameters: Map<String, Value>,
	pub settings: TrainSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainSettings {
	pub max_rows: usize,
	pub category_cap: usize,
	pub memory_limit_mb: u64,
	pub shuffle: Option<Shuffle>,
}

impl Default for TrainSettings {
	fn default() -> Self {
		Self {
			max_rows: DEFAULT_MAX_ROWS,
			category_cap: DEFAULT_CATEGORY_CAP,
			memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
			shuffle: None,
		}
	}
}

impl TrainSettings {
	pub fn from_config(config: &Config) -> TrainSettings {
		let defaults = TrainSettings::default();
		TrainSettings {
			max_rows: config.max_rows.unwrap_or(defaults.max_rows),
			category_cap: config.category_cap.unwrap_or(defaults.category_cap),
			memory_limit_mb: config.memory_limit_mb.unwrap_or(defaults.memory_limit_mb),
			shuffle: config.shuffle.clone(),
		}
	}
}

/**
Train a classifier on the dataset `request.dataset_id` resolves to and write its artifact to `store`.

The run is started, then marked completed with the artifact version or failed with the error message. `progress` receives `(percent, message)` pairs with a percent that never decreases.
*/
pub fn train(
	request: &TrainRequest,
	storage: &dyn DatasetStorage,
	store: &ArtifactStore,
	run: &mut TrainingRun,
	progress: Option<&mut dyn FnMut(f64, &str)>,
) -> Result<TrainingArtifact, Error> {
	run.start()?;
	let mut notifier = ProgressNotifier::new(progress);
	let mut memory = SystemMemoryMonitor::new();
	let result = load_and_train(request, storage, store, &run.id, &mut memory, &mut notifier);
	finish(run, result, &mut notifier)
}

/// Like [`train`](fn.train.html) for rows that are already in memory. Everything after reading the dataset is the same.
pub fn train_buffer(
	buffer: RowBuffer,
	request: &TrainRequest,
	store: &ArtifactStore,
	run: &mut TrainingRun,
	memory: &mut dyn MemoryMonitor,
	progress: Option<&mut dyn FnMut(f64, &str)>,
) -> Result<TrainingArtifact, Error> {
	run.start()?;
	let mut notifier = ProgressNotifier::new(progress);
	notifier.notify(Progress::AnalyzingSchema);
	let result = if buffer.is_empty() {
		Err(Error::DatasetEmpty {
			dataset_id: request.dataset_id.clone(),
			path: PathBuf::new(),
			rows_read: 0,
		})
	} else {
		notifier.notify(Progress::Buffered { rows: buffer.len() });
		let schema = SchemaDescriptor {
			column_mapping: request.columns.clone(),
			..Default::default()
		};
		let hyperparameters = Hyperparameters::resolve(&request.hyperparameters);
		train_rows(
			buffer,
			schema,
			hyperparameters,
			request,
			None,
			store,
			&run.id,
			memory,
			&mut notifier,
		)
	};
	finish(run, result, &mut notifier)
}

fn finish(
	run: &mut TrainingRun,
	result: Result<TrainingArtifact, Error>,
	notifier: &mut ProgressNotifier,
) -> Result<TrainingArtifact, Error> {
	match result {
		Ok(artifact) => {
			run.complete(artifact.version.clone())?;
			notifier.notify(Progress::Completed);
			Ok(artifact)
		}
		Err(train_error) => {
			error!(run_id = %run.id, dataset_id = run.dataset_id.as_str(), error = %train_error, "training failed");
			run.fail(train_error.to_string())?;
			Err(train_error)
		}
	}
}

fn load_and_train(
	request: &TrainRequest,
	storage: &dyn DatasetStorage,
	store: &ArtifactStore,
	run_id: &Id,
	memory: &mut dyn MemoryMonitor,
	notifier: &mut ProgressNotifier,
) -> Result<TrainingArtifact, Error> {
	notifier.notify(Progress::AnalyzingSchema);
	let hyperparameters = Hyperparameters::resolve(&request.hyperparameters);
	let path = storage.resolve(&request.dataset_id)?;
	let total_bytes = std::fs::metadata(&path)?.len();
	let load_options = LoadOptions {
		max_rows: request.settings.max_rows,
		category_cap: request.settings.category_cap,
		seed: hyperparameters.seed,
		..Default::default()
	};
	let dataset = Dataset::from_path(&path, &request.columns, &load_options, &mut |bytes_read| {
		notifier.notify(Progress::Loading {
			bytes_read,
			total_bytes,
		})
	})
	.map_err(|source| Error::Load {
		dataset_id: request.dataset_id.clone(),
		path: path.clone(),
		source,
	})?;
	if dataset.buffer.is_empty() {
		return Err(Error::DatasetEmpty {
			dataset_id: request.dataset_id.clone(),
			path,
			rows_read: dataset.rows_read,
		});
	}
	info!(
		dataset_id = request.dataset_id.as_str(),
		rows = dataset.buffer.len(),
		rows_read = dataset.rows_read,
		rows_skipped = dataset.rows_skipped,
		features = dataset.buffer.n_features(),
		"buffered dataset"
	);
	notifier.notify(Progress::Buffered {
		rows: dataset.buffer.len(),
	});
	let schema = SchemaDescriptor {
		column_mapping: request.columns.clone(),
		category_vocabulary: dataset.vocabulary.values().to_vec(),
		category_overflowed: dataset.vocabulary.overflowed(),
	};
	train_rows(
		dataset.buffer,
		schema,
		hyperparameters,
		request,
		Some(path),
		store,
		run_id,
		memory,
		notifier,
	)
}

/// Halve the training rows if resident memory is over the limit. Returns true if it did.
fn guard_memory(
	train: &mut RowBuffer,
	statistics: &mut FeatureStatistics,
	memory: &mut dyn MemoryMonitor,
	limit_mb: u64,
	seed: u64,
) -> bool {
	if !is_over_limit(memory, limit_mb) {
		return false;
	}
	let rows_before = train.len();
	*train = downsample(train, seed);
	*statistics = FeatureStatistics::compute(train.features());
	warn!(
		limit_mb,
		rows_before,
		rows_after = train.len(),
		"resident memory is over the limit, downsampled the training rows"
	);
	true
}

#[allow(clippy::too_many_arguments)]
fn train_rows(
	buffer: RowBuffer,
	schema: SchemaDescriptor,
	hyperparameters: Hyperparameters,
	request: &TrainRequest,
	path: Option<PathBuf>,
	store: &ArtifactStore,
	run_id: &Id,
	memory: &mut dyn MemoryMonitor,
	notifier: &mut ProgressNotifier,
) -> Result<TrainingArtifact, Error> {
	let dataset_id = request.dataset_id.as_str();
	let feature_names = buffer.feature_names().to_vec();

	// Split, consuming the buffer.
	notifier.notify(Progress::Splitting);
	let Split {
		mut train,
		validation,
		mut statistics,
		train_count,
		validation_count,
		degenerate,
	} = split(
		buffer,
		hyperparameters.validation_split,
		shuffle_seed(request.settings.shuffle.as_ref(), hyperparameters.seed),
		dataset_id,
	)?;
	info!(dataset_id, train_count, validation_count, degenerate, "split dataset");
	let limit_mb = request.settings.memory_limit_mb;
	let mut downsampled = guard_memory(
		&mut train,
		&mut statistics,
		memory,
		limit_mb,
		hyperparameters.seed,
	);

	// Grid search.
	notifier.notify(Progress::GridSearchStarted {
		combinations: expand_grid(&hyperparameters).len(),
	});
	let summary = grid_search(
		train.features(),
		train.labels(),
		&hyperparameters,
		&mut |progress| notifier.notify(Progress::GridSearch(progress)),
	)?;
	if !downsampled {
		downsampled = guard_memory(
			&mut train,
			&mut statistics,
			memory,
			limit_mb,
			hyperparameters.seed,
		);
	}

	// Train the final classifier with the best hyperparameters.
	notifier.notify(Progress::FinalTraining);
	let mut hyperparameters = hyperparameters.with_overrides(&summary.best);
	if hyperparameters.model_type == ModelType::KNearestNeighbors
		&& hyperparameters.k > train.len()
	{
		warn!(
			k = hyperparameters.k,
			rows = train.len(),
			"k is larger than the training rows, clamping it"
		);
		hyperparameters.k = train.len().max(1);
	}
	let config = ClassifierConfig::build(&hyperparameters)?;
	let pipeline = FeaturePipeline {
		imputer: Imputer::fit(
			train.features(),
			hyperparameters.imputer_strategy,
			hyperparameters.imputer_fill_value,
		),
		standardizer: Standardizer::from_statistics(
			statistics.means.clone(),
			statistics.std_devs.clone(),
		),
		normalization: hyperparameters.normalization,
	};
	let mut classifier = ClassifierModel::new(config);
	let features_train = pipeline.transform(train.features());
	classifier
		.train(features_train.view(), train.labels(), &mut |epoch| {
			notifier.notify(Progress::FinalTrainingEpoch(epoch))
		})
		.map_err(|error| match error {
			Error::Fit(source) => Error::FinalTraining {
				dataset_id: request.dataset_id.clone(),
				path,
				rows: train.len(),
				source,
			},
			error => error,
		})?;
	drop(features_train);
	let classes = classifier.classes().to_vec();

	// Evaluate on the validation rows.
	notifier.notify(Progress::Evaluating);
	let features_validation = pipeline.transform(validation.features());
	let probabilities = classifier.predict_probabilities(features_validation.view())?;
	drop(features_validation);
	let predictions: Vec<i64> = probabilities
		.rows()
		.into_iter()
		.map(|row| classes[argmax(row.iter())])
		.collect();
	let classification = ClassificationMetrics::compute(ClassificationMetricsInput {
		labels: validation.labels(),
		predictions: &predictions,
	});
	// The score of a binary problem is the probability of the larger label.
	let auc = if classes.len() == 2 {
		let positive = classes[1];
		let scores: Vec<f64> = probabilities.column(1).to_vec();
		let is_positive: Vec<bool> = validation
			.labels()
			.iter()
			.map(|label| *label == positive)
			.collect();
		Some(auc(&scores, &is_positive))
	} else {
		None
	};
	drop(probabilities);
	drop(validation);
	let metrics = ValidationMetrics {
		accuracy: classification.accuracy,
		auc,
		on_training_rows: degenerate,
		classification,
	};
	info!(
		dataset_id,
		model_type = %hyperparameters.model_type,
		accuracy = metrics.accuracy,
		auc = ?metrics.auc,
		"evaluated classifier"
	);

	// Feature importances are computed on the imputed training features before standardization.
	notifier.notify(Progress::ComputingFeatureImportance);
	let mut imputed = train.features().to_owned();
	pipeline.imputer.transform(imputed.view_mut());
	let positive_label = classes.last().copied().unwrap_or_default();
	let feature_importances =
		feature_importances(&feature_names, imputed.view(), train.labels(), positive_label);
	drop(imputed);

	// Persist.
	notifier.notify(Progress::Persisting);
	let version = store.next_version(&request.model_id)?;
	let artifact = TrainingArtifact {
		model_file: ArtifactStore::model_file(&request.model_id, &version),
		model_id: request.model_id.clone(),
		version,
		run_id: run_id.to_string(),
		dataset_id: request.dataset_id.clone(),
		model_type: hyperparameters.model_type,
		classifier_config_version: CLASSIFIER_CONFIG_VERSION,
		classes,
		feature_names,
		feature_means: statistics.means,
		feature_std_devs: statistics.std_devs,
		imputer: ImputerDescriptor {
			strategy: pipeline.imputer.strategy(),
			fill_value: pipeline.imputer.fill_value(),
			statistics: pipeline.imputer.statistics().to_vec(),
		},
		normalization: pipeline.normalization,
		hyperparameters,
		metrics,
		grid_search: summary,
		feature_importances,
		train_count: train.len(),
		validation_count,
		downsampled,
		schema,
		created_at: Utc::now(),
	};
	store.write(&artifact, &classifier)?;
	notifier.notify(Progress::RecordingMetadata);
	Ok(artifact)
}

#[cfg(test)]
mod test_support {
	use super::*;

	pub fn temp_dir() -> PathBuf {
		let dir = std::env::temp_dir().join(format!("lodestar-{}", Id::new()));
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	pub fn csv(n: usize) -> String {
		let mut csv = String::from("f1,f2,f3,f4,label\n");
		for i in 0..n {
			let a = ((i * 37) % 100) as f64 / 100.0;
			let b = ((i * 53) % 100) as f64 / 100.0;
			let c = (i % 7) as f64;
			let d = ((i * 11) % 13) as f64 - 6.0;
			let label = if a + 0.3 * b > 0.6 { 1 } else { 0 };
			csv.push_str(&format!("{},{},{},{},{}\n", a, b, c, d, label));
		}
		csv
	}

	pub fn request(hyperparameters: Value) -> TrainRequest {
		TrainRequest {
			model_id: "churn".to_owned(),
			dataset_id: "events".to_owned(),
			columns: ColumnMapping {
				label: "label".to_owned(),
				features: ["f1", "f2", "f3", "f4"].iter().map(|f| f.to_string()).collect(),
				..Default::default()
			},
			hyperparameters: match hyperparameters {
				Value::Object(map) => map,
				_ => Map::new(),
			},
			settings: TrainSettings::default(),
		}
	}
}

#[test]
fn test_train_end_to_end() {
	use crate::{LocalDatasetStorage, Predictor, RunStatus};
	let dir = test_support::temp_dir();
	std::fs::write(dir.join("events.csv"), test_support::csv(100)).unwrap();
	let storage = LocalDatasetStorage::new(&dir);
	let store = ArtifactStore::new(dir.join("artifacts"));
	let request = test_support::request(serde_json::json!({ "model_type": "logistic_regression" }));
	let mut run = TrainingRun::new("churn", "events");
	let mut reports: Vec<(f64, String)> = Vec::new();
	let mut sink = |percent: f64, message: &str| reports.push((percent, message.to_owned()));
	let artifact = train(&request, &storage, &store, &mut run, Some(&mut sink)).unwrap();
	assert!(artifact.metrics.accuracy >= 0.0 && artifact.metrics.accuracy <= 1.0);
	assert!(artifact.metrics.auc.is_some());
	assert!(artifact.feature_importances.len() <= 10);
	assert_eq!(artifact.train_count + artifact.validation_count, 100);
	assert_eq!(artifact.classes, vec![0, 1]);
	assert_eq!(artifact.feature_names, vec!["f1", "f2", "f3", "f4"]);
	assert_eq!(artifact.grid_search.evaluated, 3);
	assert!(store.root().join(&artifact.model_file).exists());
	assert_eq!(run.status, RunStatus::Completed);
	assert_eq!(run.artifact_version.as_ref(), Some(&artifact.version));
	// Progress never goes backwards and ends at 100.
	assert!(reports.windows(2).all(|pair| pair[0].0 <= pair[1].0));
	assert_eq!(reports.last().map(|(percent, _)| *percent), Some(100.0));
	// The descriptor alone is enough to reload the artifact and predict.
	let loaded = store.load("churn", &artifact.version).unwrap();
	assert_eq!(loaded.version, artifact.version);
	assert_eq!(loaded.model_file, artifact.model_file);
	assert_eq!(loaded.hyperparameters.model_type, artifact.hyperparameters.model_type);
	assert_eq!(
		store.latest_version("churn").unwrap().as_ref(),
		Some(&artifact.version)
	);
	let predictor = Predictor::from_artifact(&store, &loaded).unwrap();
	let prediction = predictor
		.predict(ndarray::array![[0.9, 0.9, 1.0, 0.0], [0.05, 0.1, 1.0, 0.0]].view())
		.unwrap();
	assert_eq!(prediction.labels.len(), 2);
	assert!(prediction.labels.iter().all(|label| *label == 0 || *label == 1));
	for row in prediction.probabilities.rows() {
		assert!((row.sum() - 1.0).abs() < 1e-9);
	}
	// A second run gets a strictly greater version.
	let mut second_run = TrainingRun::new("churn", "events");
	let second = train(&request, &storage, &store, &mut second_run, None).unwrap();
	assert!(second.version > artifact.version);
	std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_memory_guard_downsamples() {
	use crate::FixedMemoryMonitor;
	let dir = test_support::temp_dir();
	let store = ArtifactStore::new(&dir);
	let request = test_support::request(serde_json::json!({ "model_type": "naive_bayes" }));
	let path = dir.join("events.csv");
	std::fs::write(&path, test_support::csv(100)).unwrap();
	let buffer = Dataset::from_path(&path, &request.columns, &LoadOptions::default(), &mut |_| {})
		.unwrap()
		.buffer;
	let mut run = TrainingRun::new("churn", "events");
	let mut memory = FixedMemoryMonitor(2048 * 1024 * 1024);
	let artifact = train_buffer(buffer, &request, &store, &mut run, &mut memory, None).unwrap();
	assert!(artifact.downsampled);
	// 80 training rows are halved once.
	assert_eq!(artifact.train_count, 40);
	assert_eq!(artifact.validation_count, 20);
	std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_multiclass_has_no_auc() {
	use crate::FixedMemoryMonitor;
	use ndarray::prelude::*;
	let dir = test_support::temp_dir();
	let store = ArtifactStore::new(&dir);
	let request = test_support::request(serde_json::json!({ "model_type": "knn", "k": 3 }));
	let features = Array2::from_shape_fn((60, 2), |(i, j)| {
		let class = (i % 3) as f64;
		class * 5.0 + ((i * 7 + j) % 5) as f64 / 10.0
	});
	let labels: Vec<i64> = (0..60).map(|i| (i % 3) as i64 * 10).collect();
	let buffer = RowBuffer::from_rows(vec!["x".to_owned(), "y".to_owned()], features, labels).unwrap();
	let mut run = TrainingRun::new("churn", "events");
	let artifact =
		train_buffer(buffer, &request, &store, &mut run, &mut FixedMemoryMonitor(0), None).unwrap();
	assert_eq!(artifact.classes, vec![0, 10, 20]);
	assert_eq!(artifact.metrics.auc, None);
	assert_eq!(artifact.metrics.accuracy, 1.0);
	let confusion_total: u64 = artifact
		.metrics
		.classification
		.confusion_matrix
		.values()
		.flat_map(|row| row.values())
		.sum();
	assert_eq!(confusion_total, artifact.validation_count as u64);
	std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_failures_mark_the_run_failed() {
	use crate::{LocalDatasetStorage, RunStatus};
	let dir = test_support::temp_dir();
	std::fs::write(dir.join("empty.csv"), "f1,f2,f3,f4,label\n").unwrap();
	let storage = LocalDatasetStorage::new(&dir);
	let store = ArtifactStore::new(dir.join("artifacts"));
	let mut request = test_support::request(serde_json::json!({}));
	request.dataset_id = "empty".to_owned();
	let mut run = TrainingRun::new("churn", "empty");
	let result = train(&request, &storage, &store, &mut run, None);
	assert!(matches!(result, Err(Error::DatasetEmpty { rows_read: 0, .. })));
	assert_eq!(run.status, RunStatus::Failed);
	assert!(run.error.is_some());
	request.dataset_id = "missing".to_owned();
	let mut run = TrainingRun::new("churn", "missing");
	let result = train(&request, &storage, &store, &mut run, None);
	assert!(matches!(result, Err(Error::DatasetFileNotFound { .. })));
	assert_eq!(run.status, RunStatus::Failed);
	std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_knn_k_is_clamped_to_the_training_rows() {
	use crate::FixedMemoryMonitor;
	use ndarray::prelude::*;
	let dir = test_support::temp_dir();
	let store = ArtifactStore::new(&dir);
	let mut request = test_support::request(serde_json::json!({ "model_type": "knn" }));
	request.settings.shuffle = Some(Shuffle::Enabled(false));
	// Two training rows and one validation row.
	let features = array![[0.0, 0.0], [1.0, 1.0], [0.1, 0.0]];
	let buffer =
		RowBuffer::from_rows(vec!["x".to_owned(), "y".to_owned()], features, vec![0, 1, 0])
			.unwrap();
	let mut run = TrainingRun::new("churn", "events");
	let artifact =
		train_buffer(buffer, &request, &store, &mut run, &mut FixedMemoryMonitor(0), None).unwrap();
	assert_eq!(artifact.train_count, 2);
	assert_eq!(artifact.validation_count, 1);
	assert_eq!(artifact.hyperparameters.k, 2);
	assert_eq!(artifact.classes, vec![0, 1]);
	std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_final_training_errors_name_the_dataset() {
	use crate::{FixedMemoryMonitor, RunStatus};
	use lodestar_util::FitError;
	use ndarray::prelude::*;
	let dir = test_support::temp_dir();
	let store = ArtifactStore::new(&dir);
	let mut request = test_support::request(serde_json::json!({ "model_type": "naive_bayes" }));
	request.settings.shuffle = Some(Shuffle::Enabled(false));
	// Both training rows have the same label.
	let features = array![[0.0, 0.0], [1.0, 1.0], [0.1, 0.0]];
	let buffer =
		RowBuffer::from_rows(vec!["x".to_owned(), "y".to_owned()], features, vec![0, 0, 1])
			.unwrap();
	let mut run = TrainingRun::new("churn", "events");
	let error = train_buffer(buffer, &request, &store, &mut run, &mut FixedMemoryMonitor(0), None)
		.unwrap_err();
	match &error {
		Error::FinalTraining {
			dataset_id,
			path,
			rows,
			source,
		} => {
			assert_eq!(dataset_id, "events");
			assert_eq!(path, &None);
			assert_eq!(*rows, 2);
			assert_eq!(source, &FitError::TooFewClasses { n_classes: 1 });
		}
		error => panic!("unexpected error {:?}", error),
	}
	assert_eq!(
		error.to_string(),
		"final training on dataset \"events\" with 2 training rows failed"
	);
	assert_eq!(run.status, RunStatus::Failed);
	std::fs::remove_dir_all(&dir).unwrap();
}
