/*!
Training artifacts. Each successful run writes a JSON descriptor and a model file under `<root>/<model_id>/<version>/`. The descriptor is the only way to find the model file: [`ArtifactStore::load_classifier`](struct.ArtifactStore.html#method.load_classifier) takes a descriptor, never a path.
*/

use crate::{
	grid::GridSearchSummary, ClassifierModel, Error, FeatureImportance, Hyperparameters, ModelType,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use lodestar_dataframe::ColumnMapping;
use lodestar_features::{ImputerStrategy, Normalization};
use lodestar_metrics::ClassificationMetricsOutput;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";
const DESCRIPTOR_FILE_NAME: &str = "artifact.json";
const MODEL_FILE_NAME: &str = "model.bin";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
	pub model_id: String,
	pub version: String,
	pub run_id: String,
	pub dataset_id: String,
	pub model_type: ModelType,
	pub classifier_config_version: u32,
	/// The label values the classifier predicts, sorted.
	pub classes: Vec<i64>,
	pub feature_names: Vec<String>,
	pub feature_means: Vec<f64>,
	pub feature_std_devs: Vec<f64>,
	pub imputer: ImputerDescriptor,
	pub normalization: Normalization,
	pub hyperparameters: Hyperparameters,
	pub metrics: ValidationMetrics,
	pub grid_search: GridSearchSummary,
	pub feature_importances: Vec<FeatureImportance>,
	/// The model file, relative to the store root.
	pub model_file: String,
	pub train_count: usize,
	pub validation_count: usize,
	pub downsampled: bool,
	pub schema: SchemaDescriptor,
	pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImputerDescriptor {
	pub strategy: ImputerStrategy,
	pub fill_value: f64,
	pub statistics: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
	pub accuracy: f64,
	/// Only computed for two classes.
	pub auc: Option<f64>,
	/// True when the metrics were computed on the training rows because none could be held out.
	pub on_training_rows: bool,
	pub classification: ClassificationMetricsOutput,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
	pub column_mapping: ColumnMapping,
	pub category_vocabulary: Vec<String>,
	pub category_overflowed: bool,
}

/// Stores artifacts on the local filesystem.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
	root: PathBuf,
}

impl ArtifactStore {
	pub fn new(root: impl Into<PathBuf>) -> ArtifactStore {
		ArtifactStore { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn model_dir(&self, model_id: &str) -> PathBuf {
		self.root.join(model_id)
	}

	/// The newest version written for `model_id`, if any.
	pub fn latest_version(&self, model_id: &str) -> Result<Option<String>, Error> {
		let dir = self.model_dir(model_id);
		if !dir.exists() {
			return Ok(None);
		}
		let mut latest: Option<String> = None;
		for entry in std::fs::read_dir(&dir)? {
			let entry = entry?;
			let name = match entry.file_name().into_string() {
				Ok(name) => name,
				Err(_) => continue,
			};
			if !is_version(&name) || !entry.path().join(DESCRIPTOR_FILE_NAME).exists() {
				continue;
			}
			if latest.as_ref().map(|latest| name > *latest).unwrap_or(true) {
				latest = Some(name);
			}
		}
		Ok(latest)
	}

	/// A version for a new artifact of `model_id`, strictly greater than every existing one.
	pub fn next_version(&self, model_id: &str) -> Result<String, Error> {
		let latest = self.latest_version(model_id)?;
		Ok(next_version_after(Utc::now(), latest.as_deref()))
	}

	/// The path of the model file for a version, relative to the root.
	pub fn model_file(model_id: &str, version: &str) -> String {
		format!("{}/{}/{}", model_id, version, MODEL_FILE_NAME)
	}

	/// Write the model file and then the descriptor. Each is written to a temporary name and renamed into place.
	pub fn write(
		&self,
		artifact: &TrainingArtifact,
		classifier: &ClassifierModel,
	) -> Result<PathBuf, Error> {
		let dir = self.model_dir(&artifact.model_id).join(&artifact.version);
		std::fs::create_dir_all(&dir)?;
		let model_path = self.root.join(&artifact.model_file);
		let temporary_model_path = model_path.with_extension("bin.tmp");
		classifier.to_file(&temporary_model_path)?;
		std::fs::rename(&temporary_model_path, &model_path)?;
		let descriptor_path = dir.join(DESCRIPTOR_FILE_NAME);
		let temporary_descriptor_path = descriptor_path.with_extension("json.tmp");
		let json = serde_json::to_vec_pretty(artifact)
			.map_err(|error| Error::artifact(&descriptor_path, error))?;
		std::fs::write(&temporary_descriptor_path, json)?;
		std::fs::rename(&temporary_descriptor_path, &descriptor_path)?;
		info!(
			model_id = artifact.model_id.as_str(),
			version = artifact.version.as_str(),
			path = %descriptor_path.display(),
			"wrote artifact"
		);
		Ok(descriptor_path)
	}

	pub fn load(&self, model_id: &str, version: &str) -> Result<TrainingArtifact, Error> {
		let path = self
			.model_dir(model_id)
			.join(version)
			.join(DESCRIPTOR_FILE_NAME);
		let json = std::fs::read(&path).map_err(|error| Error::artifact(&path, error))?;
		serde_json::from_slice(&json).map_err(|error| Error::artifact(&path, error))
	}

	/// Read the classifier the descriptor points to.
	pub fn load_classifier(&self, artifact: &TrainingArtifact) -> Result<ClassifierModel, Error> {
		let path = self.root.join(&artifact.model_file);
		let classifier = ClassifierModel::from_path(&path)?;
		if classifier.model_type() != artifact.model_type {
			return Err(Error::artifact(
				path,
				format!(
					"model file holds a {} classifier but the descriptor says {}",
					classifier.model_type(),
					artifact.model_type
				),
			));
		}
		Ok(classifier)
	}
}

fn is_version(name: &str) -> bool {
	name.len() == 14 && name.bytes().all(|byte| byte.is_ascii_digit())
}

/// Format `now` as a version, moving it one second past `latest` if it would not sort after it.
pub fn next_version_after(now: DateTime<Utc>, latest: Option<&str>) -> String {
	let now = now.format(VERSION_FORMAT).to_string();
	let latest = latest.and_then(|latest| {
		NaiveDateTime::parse_from_str(latest, VERSION_FORMAT)
			.ok()
			.map(|parsed| (latest, parsed))
	});
	match latest {
		// Versions are fixed width digits, so string order is time order.
		Some((latest, parsed)) if now.as_str() <= latest => {
			(parsed + Duration::seconds(1)).format(VERSION_FORMAT).to_string()
		}
		_ => now,
	}
}

#[test]
fn test_next_version_after() {
	use chrono::TimeZone;
	let now = Utc.with_ymd_and_hms(2021, 3, 4, 15, 30, 0).unwrap();
	assert_eq!(next_version_after(now, None), "20210304153000");
	assert_eq!(
		next_version_after(now, Some("20210304152959")),
		"20210304153000"
	);
	assert_eq!(
		next_version_after(now, Some("20210304153000")),
		"20210304153001"
	);
	assert_eq!(
		next_version_after(now, Some("20220101000000")),
		"20220101000001"
	);
	assert_eq!(next_version_after(now, Some("garbage")), "20210304153000");
}

#[test]
fn test_is_version() {
	assert!(is_version("20210304153000"));
	assert!(!is_version("2021030415300"));
	assert!(!is_version("latest"));
}
