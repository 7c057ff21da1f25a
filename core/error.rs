use lodestar_dataframe::LoadError;
use lodestar_util::FitError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a training run or an inference call.
#[derive(Debug, Error)]
pub enum Error {
	#[error("dataset \"{dataset_id}\" has no file path")]
	MissingDatasetPath { dataset_id: String },
	#[error("dataset \"{dataset_id}\" resolved to {}, which does not exist", path.display())]
	DatasetFileNotFound { dataset_id: String, path: PathBuf },
	#[error("dataset \"{dataset_id}\" at {} produced no usable rows ({rows_read} rows read)", path.display())]
	DatasetEmpty {
		dataset_id: String,
		path: PathBuf,
		rows_read: u64,
	},
	#[error("dataset \"{dataset_id}\" has {rows} rows, which leaves no rows to train on")]
	InsufficientTrainingRows { dataset_id: String, rows: usize },
	#[error("unsupported {model_type} configuration: {reason}")]
	UnsupportedClassifierConfiguration { model_type: String, reason: String },
	#[error(transparent)]
	Fit(#[from] FitError),
	#[error(
		"final training on dataset \"{dataset_id}\"{} with {rows} training rows failed",
		path.as_ref().map(|path| format!(" at {}", path.display())).unwrap_or_default()
	)]
	FinalTraining {
		dataset_id: String,
		/// `None` when the rows were passed in memory.
		path: Option<PathBuf>,
		rows: usize,
		#[source]
		source: FitError,
	},
	#[error("failed to load dataset \"{dataset_id}\" from {}", path.display())]
	Load {
		dataset_id: String,
		path: PathBuf,
		#[source]
		source: LoadError,
	},
	#[error("invalid config file {}: {reason}", path.display())]
	Config { path: PathBuf, reason: String },
	#[error("artifact {}: {reason}", path.display())]
	Artifact { path: PathBuf, reason: String },
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("training run {run_id} is already {status}")]
	RunFinalized { run_id: String, status: String },
	#[error("the classifier has not been trained")]
	UntrainedClassifier,
}

impl Error {
	pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Error {
		Error::Artifact {
			path: path.into(),
			reason: reason.to_string(),
		}
	}
}
