/*!
This module builds classifiers. A [`ModelType`](enum.ModelType.html) names a family, a [`ClassifierConfig`](enum.ClassifierConfig.html) holds the explicit options for one family, and a [`ClassifierModel`](struct.ClassifierModel.html) pairs a config with the fitted state, implementing the [`Classifier`](trait.Classifier.html) interface every family shares.
*/

use crate::{Error, Hyperparameters};
use lodestar_util::{argmax, EpochProgress, FitError};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
	io::{Read, Write},
	path::Path,
};

/// This is written to every artifact. Bump it when a `ClassifierConfig` variant changes shape.
pub const CLASSIFIER_CONFIG_VERSION: u32 = 1;

/// The major version byte at the start of every model file.
const MODEL_FILE_MAJOR_VERSION: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
	#[serde(rename = "logistic_regression")]
	LogisticRegression,
	#[serde(rename = "knn")]
	KNearestNeighbors,
	#[serde(rename = "naive_bayes")]
	NaiveBayes,
	#[serde(rename = "decision_tree")]
	DecisionTree,
	#[serde(rename = "mlp")]
	MultilayerPerceptron,
	#[serde(rename = "svc")]
	SupportVectorClassifier,
}

impl ModelType {
	/// Parse a model type name or one of its aliases, ignoring case.
	pub fn parse(value: &str) -> Option<ModelType> {
		match value.trim().to_lowercase().as_str() {
			"logistic_regression" | "logistic" => Some(ModelType::LogisticRegression),
			"knn" | "k_nearest_neighbors" => Some(ModelType::KNearestNeighbors),
			"naive_bayes" | "gaussian_nb" => Some(ModelType::NaiveBayes),
			"decision_tree" | "tree" => Some(ModelType::DecisionTree),
			"mlp" | "multilayer_perceptron" | "neural_network" => {
				Some(ModelType::MultilayerPerceptron)
			}
			"svc" | "svm" => Some(ModelType::SupportVectorClassifier),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ModelType::LogisticRegression => "logistic_regression",
			ModelType::KNearestNeighbors => "knn",
			ModelType::NaiveBayes => "naive_bayes",
			ModelType::DecisionTree => "decision_tree",
			ModelType::MultilayerPerceptron => "mlp",
			ModelType::SupportVectorClassifier => "svc",
		}
	}
}

impl std::fmt::Display for ModelType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// The options for one classifier family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", content = "options")]
pub enum ClassifierConfig {
	#[serde(rename = "logistic_regression")]
	LogisticRegression(lodestar_linear::TrainOptions),
	#[serde(rename = "knn")]
	KNearestNeighbors(lodestar_knn::TrainOptions),
	#[serde(rename = "naive_bayes")]
	NaiveBayes(lodestar_naive_bayes::TrainOptions),
	#[serde(rename = "decision_tree")]
	DecisionTree(lodestar_tree::TrainOptions),
	#[serde(rename = "mlp")]
	MultilayerPerceptron(lodestar_mlp::TrainOptions),
	#[serde(rename = "svc")]
	SupportVectorClassifier(lodestar_svm::TrainOptions),
}

impl ClassifierConfig {
	/// Build the config for `hyperparameters.model_type`.
	pub fn build(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
		match hyperparameters.model_type {
			ModelType::LogisticRegression => logistic_regression_config(hyperparameters),
			ModelType::KNearestNeighbors => knn_config(hyperparameters),
			ModelType::NaiveBayes => naive_bayes_config(hyperparameters),
			ModelType::DecisionTree => decision_tree_config(hyperparameters),
			ModelType::MultilayerPerceptron => mlp_config(hyperparameters),
			ModelType::SupportVectorClassifier => svc_config(hyperparameters),
		}
	}

	pub fn model_type(&self) -> ModelType {
		match self {
			ClassifierConfig::LogisticRegression(_) => ModelType::LogisticRegression,
			ClassifierConfig::KNearestNeighbors(_) => ModelType::KNearestNeighbors,
			ClassifierConfig::NaiveBayes(_) => ModelType::NaiveBayes,
			ClassifierConfig::DecisionTree(_) => ModelType::DecisionTree,
			ClassifierConfig::MultilayerPerceptron(_) => ModelType::MultilayerPerceptron,
			ClassifierConfig::SupportVectorClassifier(_) => ModelType::SupportVectorClassifier,
		}
	}
}

fn unsupported(model_type: ModelType, reason: impl Into<String>) -> Error {
	Error::UnsupportedClassifierConfiguration {
		model_type: model_type.to_string(),
		reason: reason.into(),
	}
}

fn logistic_regression_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if hyperparameters.batch_size == 0 {
		return Err(unsupported(
			ModelType::LogisticRegression,
			"batch_size must be at least 1",
		));
	}
	let early_stopping_options = if hyperparameters.early_stopping {
		Some(lodestar_linear::EarlyStoppingOptions::default())
	} else {
		None
	};
	Ok(ClassifierConfig::LogisticRegression(
		lodestar_linear::TrainOptions {
			early_stopping_options,
			l2_regularization: hyperparameters.l2_penalty,
			learning_rate: hyperparameters.learning_rate,
			max_epochs: hyperparameters.iterations,
			n_examples_per_batch: hyperparameters.batch_size,
		},
	))
}

fn knn_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if hyperparameters.k == 0 {
		return Err(unsupported(ModelType::KNearestNeighbors, "k must be at least 1"));
	}
	Ok(ClassifierConfig::KNearestNeighbors(lodestar_knn::TrainOptions {
		k: hyperparameters.k,
		weighted: hyperparameters.weighted,
	}))
}

fn naive_bayes_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if !(hyperparameters.var_smoothing >= 0.0) {
		return Err(unsupported(
			ModelType::NaiveBayes,
			"var_smoothing must not be negative",
		));
	}
	Ok(ClassifierConfig::NaiveBayes(lodestar_naive_bayes::TrainOptions {
		var_smoothing: hyperparameters.var_smoothing,
	}))
}

fn decision_tree_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if hyperparameters.min_samples_split < 2 {
		return Err(unsupported(
			ModelType::DecisionTree,
			"min_samples_split must be at least 2",
		));
	}
	Ok(ClassifierConfig::DecisionTree(lodestar_tree::TrainOptions {
		max_depth: hyperparameters.max_depth,
		min_samples_split: hyperparameters.min_samples_split,
	}))
}

fn mlp_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if hyperparameters.hidden_layers.is_empty() {
		return Err(unsupported(
			ModelType::MultilayerPerceptron,
			"at least one hidden layer is required",
		));
	}
	if hyperparameters.hidden_layers.contains(&0) {
		return Err(unsupported(
			ModelType::MultilayerPerceptron,
			"every hidden layer needs at least one unit",
		));
	}
	if hyperparameters.batch_size == 0 {
		return Err(unsupported(
			ModelType::MultilayerPerceptron,
			"batch_size must be at least 1",
		));
	}
	Ok(ClassifierConfig::MultilayerPerceptron(lodestar_mlp::TrainOptions {
		hidden_layers: hyperparameters.hidden_layers.clone(),
		learning_rate: hyperparameters.learning_rate,
		l2_regularization: hyperparameters.l2_penalty,
		max_epochs: hyperparameters.iterations,
		n_examples_per_batch: hyperparameters.batch_size,
		seed: hyperparameters.seed,
	}))
}

fn svc_config(hyperparameters: &Hyperparameters) -> Result<ClassifierConfig, Error> {
	if !(hyperparameters.cost > 0.0) {
		return Err(unsupported(
			ModelType::SupportVectorClassifier,
			"cost must be positive",
		));
	}
	// Kernel options are clamped again here since `Hyperparameters` can be built by hand.
	Ok(ClassifierConfig::SupportVectorClassifier(
		lodestar_svm::TrainOptions {
			cost: hyperparameters.cost,
			tolerance: hyperparameters.tolerance.clamp(0.00001, 0.5),
			cache_size: hyperparameters.cache_size.clamp(1.0, 4096.0),
			kernel: hyperparameters.kernel,
			gamma: hyperparameters.gamma.map(|gamma| gamma.clamp(0.0001, 10.0)),
			degree: hyperparameters.degree.clamp(1, 10) as i32,
			coef0: hyperparameters.coef0.clamp(-10.0, 10.0),
			shrinking: hyperparameters.shrinking,
			probability: hyperparameters.probability,
			max_iterations: hyperparameters.iterations,
			seed: hyperparameters.seed,
		},
	))
}

/// The interface shared by every classifier family. Labels are the raw label values found in the dataset.
pub trait Classifier {
	fn train(
		&mut self,
		features: ArrayView2<f64>,
		labels: &[i64],
		progress: &mut dyn FnMut(EpochProgress),
	) -> Result<(), Error>;

	/// Probabilities with one column per class, in the order of `classes()`.
	fn predict_probabilities(&self, features: ArrayView2<f64>) -> Result<Array2<f64>, Error>;

	/// The sorted label values seen in training.
	fn classes(&self) -> &[i64];

	fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<i64>, Error> {
		let probabilities = self.predict_probabilities(features)?;
		let classes = self.classes();
		Ok(probabilities
			.rows()
			.into_iter()
			.map(|row| classes[argmax(row.iter())])
			.collect())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedClassifier {
	LogisticRegression(lodestar_linear::LogisticRegression),
	KNearestNeighbors(lodestar_knn::KNearestNeighbors),
	NaiveBayes(lodestar_naive_bayes::GaussianNaiveBayes),
	DecisionTree(lodestar_tree::DecisionTree),
	MultilayerPerceptron(lodestar_mlp::MultilayerPerceptron),
	SupportVectorClassifier(lodestar_svm::SupportVectorClassifier),
}

impl FittedClassifier {
	fn n_features(&self) -> usize {
		match self {
			FittedClassifier::LogisticRegression(model) => model.n_features(),
			FittedClassifier::KNearestNeighbors(model) => model.n_features(),
			FittedClassifier::NaiveBayes(model) => model.n_features(),
			FittedClassifier::DecisionTree(model) => model.n_features(),
			FittedClassifier::MultilayerPerceptron(model) => model.n_features(),
			FittedClassifier::SupportVectorClassifier(model) => model.n_features(),
		}
	}

	fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		match self {
			FittedClassifier::LogisticRegression(model) => model.predict_probabilities(features),
			FittedClassifier::KNearestNeighbors(model) => model.predict_probabilities(features),
			FittedClassifier::NaiveBayes(model) => model.predict_probabilities(features),
			FittedClassifier::DecisionTree(model) => model.predict_probabilities(features),
			FittedClassifier::MultilayerPerceptron(model) => model.predict_probabilities(features),
			FittedClassifier::SupportVectorClassifier(model) => model.predict_probabilities(features),
		}
	}
}

/// A classifier config together with its fitted state. This is what gets written to the model file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
	pub config: ClassifierConfig,
	classes: Vec<i64>,
	fitted: Option<FittedClassifier>,
}

impl ClassifierModel {
	pub fn new(config: ClassifierConfig) -> ClassifierModel {
		ClassifierModel {
			config,
			classes: Vec::new(),
			fitted: None,
		}
	}

	pub fn model_type(&self) -> ModelType {
		self.config.model_type()
	}

	pub fn is_trained(&self) -> bool {
		self.fitted.is_some()
	}

	/// Deserialize a `ClassifierModel` by reading the file at `path`.
	pub fn from_path(path: &Path) -> Result<ClassifierModel, Error> {
		let file = std::fs::File::open(path)?;
		let mut reader = std::io::BufReader::new(file);
		let mut major_version = [0u8; 1];
		reader.read_exact(&mut major_version)?;
		let major_version = major_version[0];
		if major_version != MODEL_FILE_MAJOR_VERSION {
			return Err(Error::artifact(
				path,
				format!("unknown major version {}", major_version),
			));
		}
		rmp_serde::from_read(&mut reader).map_err(|error| Error::artifact(path, error))
	}

	/// Write this model to the file at `path`.
	pub fn to_file(&self, path: &Path) -> Result<(), Error> {
		let file = std::fs::File::create(path)?;
		let mut writer = std::io::BufWriter::new(file);
		writer.write_all(&[MODEL_FILE_MAJOR_VERSION])?;
		rmp_serde::encode::write_named(&mut writer, self)
			.map_err(|error| Error::artifact(path, error))?;
		writer.flush()?;
		Ok(())
	}
}

impl Classifier for ClassifierModel {
	fn train(
		&mut self,
		features: ArrayView2<f64>,
		labels: &[i64],
		progress: &mut dyn FnMut(EpochProgress),
	) -> Result<(), Error> {
		if features.nrows() != labels.len() {
			return Err(FitError::TooFewSamples {
				n_samples: features.nrows().min(labels.len()),
				min_samples: features.nrows().max(labels.len()),
			}
			.into());
		}
		let mut classes = labels.to_vec();
		classes.sort_unstable();
		classes.dedup();
		// Map each label value to its 0-indexed class.
		let class_indices: Array1<usize> = labels
			.iter()
			.map(|label| classes.binary_search(label).unwrap_or(0))
			.collect();
		let n_classes = classes.len();
		let fitted = match &self.config {
			ClassifierConfig::LogisticRegression(options) => FittedClassifier::LogisticRegression(
				lodestar_linear::LogisticRegression::train(
					features,
					class_indices.view(),
					n_classes,
					options,
					progress,
				)?,
			),
			ClassifierConfig::KNearestNeighbors(options) => FittedClassifier::KNearestNeighbors(
				lodestar_knn::KNearestNeighbors::train(
					features,
					class_indices.view(),
					n_classes,
					options,
				)?,
			),
			ClassifierConfig::NaiveBayes(options) => FittedClassifier::NaiveBayes(
				lodestar_naive_bayes::GaussianNaiveBayes::train(
					features,
					class_indices.view(),
					n_classes,
					options,
				)?,
			),
			ClassifierConfig::DecisionTree(options) => {
				FittedClassifier::DecisionTree(lodestar_tree::DecisionTree::train(
					features,
					class_indices.view(),
					n_classes,
					options,
				)?)
			}
			ClassifierConfig::MultilayerPerceptron(options) => {
				FittedClassifier::MultilayerPerceptron(lodestar_mlp::MultilayerPerceptron::train(
					features,
					class_indices.view(),
					n_classes,
					options,
					progress,
				)?)
			}
			ClassifierConfig::SupportVectorClassifier(options) => {
				FittedClassifier::SupportVectorClassifier(
					lodestar_svm::SupportVectorClassifier::train(
						features,
						class_indices.view(),
						n_classes,
						options,
					)?,
				)
			}
		};
		self.classes = classes;
		self.fitted = Some(fitted);
		Ok(())
	}

	fn predict_probabilities(&self, features: ArrayView2<f64>) -> Result<Array2<f64>, Error> {
		let fitted = self.fitted.as_ref().ok_or(Error::UntrainedClassifier)?;
		if features.ncols() != fitted.n_features() {
			return Err(FitError::FeatureCountMismatch {
				n_features: features.ncols(),
				expected: fitted.n_features(),
			}
			.into());
		}
		let probabilities = fitted.predict_probabilities(features);
		// Some families always produce at least two columns.
		Ok(probabilities.slice(s![.., ..self.classes.len()]).to_owned())
	}

	fn classes(&self) -> &[i64] {
		&self.classes
	}
}

#[cfg(test)]
fn two_blobs() -> (Array2<f64>, Vec<i64>) {
	let features = array![
		[0.0, 0.1],
		[0.2, 0.0],
		[0.1, 0.3],
		[0.3, 0.2],
		[0.2, 0.2],
		[3.0, 3.1],
		[3.2, 2.9],
		[2.9, 3.3],
		[3.1, 3.0],
		[3.3, 3.2],
	];
	(features, vec![-1, -1, -1, -1, -1, 7, 7, 7, 7, 7])
}

#[test]
fn test_parse_model_type() {
	assert_eq!(ModelType::parse("Logistic"), Some(ModelType::LogisticRegression));
	assert_eq!(ModelType::parse("k_nearest_neighbors"), Some(ModelType::KNearestNeighbors));
	assert_eq!(ModelType::parse("gaussian_nb"), Some(ModelType::NaiveBayes));
	assert_eq!(ModelType::parse("tree"), Some(ModelType::DecisionTree));
	assert_eq!(ModelType::parse("neural_network"), Some(ModelType::MultilayerPerceptron));
	assert_eq!(ModelType::parse(" SVM "), Some(ModelType::SupportVectorClassifier));
	assert_eq!(ModelType::parse("random_forest"), None);
}

#[test]
fn test_every_family_trains() {
	let (features, labels) = two_blobs();
	for model_type in [
		ModelType::LogisticRegression,
		ModelType::KNearestNeighbors,
		ModelType::NaiveBayes,
		ModelType::DecisionTree,
		ModelType::MultilayerPerceptron,
		ModelType::SupportVectorClassifier,
	] {
		let hyperparameters = Hyperparameters {
			model_type,
			k: 3,
			learning_rate: 0.1,
			early_stopping: false,
			..Default::default()
		};
		let config = ClassifierConfig::build(&hyperparameters).unwrap();
		assert_eq!(config.model_type(), model_type);
		let mut model = ClassifierModel::new(config);
		model.train(features.view(), &labels, &mut |_| {}).unwrap();
		assert_eq!(model.classes(), &[-1, 7]);
		let probabilities = model.predict_probabilities(features.view()).unwrap();
		assert_eq!(probabilities.dim(), (10, 2));
		let predictions = model.predict(array![[0.1, 0.1], [3.1, 3.1]].view()).unwrap();
		assert_eq!(predictions, vec![-1, 7], "{}", model_type);
	}
}

#[test]
fn test_unsupported_configuration() {
	let hyperparameters = Hyperparameters {
		model_type: ModelType::MultilayerPerceptron,
		hidden_layers: vec![],
		..Default::default()
	};
	let result = ClassifierConfig::build(&hyperparameters);
	assert!(matches!(
		result,
		Err(Error::UnsupportedClassifierConfiguration { .. })
	));
}

#[test]
fn test_untrained_and_single_class() {
	let config = ClassifierConfig::build(&Hyperparameters::default()).unwrap();
	let mut model = ClassifierModel::new(config);
	let features = array![[0.0], [1.0]];
	assert!(matches!(
		model.predict_probabilities(features.view()),
		Err(Error::UntrainedClassifier)
	));
	let result = model.train(features.view(), &[1, 1], &mut |_| {});
	assert!(matches!(
		result,
		Err(Error::Fit(FitError::TooFewClasses { n_classes: 1 }))
	));
}

#[test]
fn test_model_file() {
	let (features, labels) = two_blobs();
	let config = ClassifierConfig::build(&Hyperparameters {
		model_type: ModelType::DecisionTree,
		..Default::default()
	})
	.unwrap();
	let mut model = ClassifierModel::new(config);
	model.train(features.view(), &labels, &mut |_| {}).unwrap();
	let dir = std::env::temp_dir().join(lodestar_util::Id::new().to_string());
	std::fs::create_dir_all(&dir).unwrap();
	let path = dir.join("model.bin");
	model.to_file(&path).unwrap();
	let loaded = ClassifierModel::from_path(&path).unwrap();
	assert_eq!(loaded, model);
	std::fs::remove_dir_all(&dir).unwrap();
}
