/*!
This crate trains and evaluates classifiers on tabular event data.

[`train`](fn.train.html) reads a csv dataset in one pass, holds out validation rows, searches a hyperparameter grid with cross validation, trains the final classifier, evaluates it, ranks feature importances, and writes a versioned [`TrainingArtifact`](struct.TrainingArtifact.html). A [`Predictor`](struct.Predictor.html) is rebuilt from the artifact descriptor alone.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod artifact;
mod classifier;
mod config;
mod error;
mod feature_importance;
mod hyperparameters;
mod predict;
mod run;
mod storage;
mod train;

pub mod grid;
pub mod memory;
pub mod progress;
pub mod split;

pub use self::{
	artifact::{
		next_version_after, ArtifactStore, ImputerDescriptor, SchemaDescriptor, TrainingArtifact,
		ValidationMetrics,
	},
	classifier::{
		Classifier, ClassifierConfig, ClassifierModel, FittedClassifier, ModelType,
		CLASSIFIER_CONFIG_VERSION,
	},
	config::{shuffle_seed, Config, Shuffle},
	error::Error,
	feature_importance::{feature_importances, FeatureImportance, MAX_FEATURE_IMPORTANCES},
	hyperparameters::{normalize_search_grid, GridValue, Hyperparameters, SearchGrid, GRID_KEYS},
	memory::{FixedMemoryMonitor, MemoryMonitor, SystemMemoryMonitor},
	predict::{Prediction, Predictor},
	run::{RunStatus, TrainingRun},
	storage::{DatasetStorage, LocalDatasetStorage},
	train::{train, train_buffer, TrainRequest, TrainSettings},
};
