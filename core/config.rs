/*!
This module defines the `Config` struct, read from an optional YAML file to configure a training run.
*/

use crate::Error;
use lodestar_dataframe::ColumnMapping;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub columns: Option<ColumnMapping>,
	/// Free-form hyperparameters, handed to the resolver.
	pub hyperparameters: Option<serde_json::Map<String, serde_json::Value>>,
	pub max_rows: Option<usize>,
	pub category_cap: Option<usize>,
	pub memory_limit_mb: Option<u64>,
	pub shuffle: Option<Shuffle>,
	pub artifact_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum Shuffle {
	Enabled(bool),
	Options { seed: u64 },
}

impl Config {
	pub fn from_path(path: &Path) -> Result<Config, Error> {
		let config = std::fs::read_to_string(path).map_err(|error| Error::Config {
			path: path.to_owned(),
			reason: error.to_string(),
		})?;
		serde_yaml::from_str(&config).map_err(|error| Error::Config {
			path: path.to_owned(),
			reason: error.to_string(),
		})
	}
}

/// The seed to shuffle with, or `None` if shuffling is disabled. Shuffling is on by default.
pub fn shuffle_seed(shuffle: Option<&Shuffle>, default_seed: u64) -> Option<u64> {
	match shuffle {
		None | Some(Shuffle::Enabled(true)) => Some(default_seed),
		Some(Shuffle::Enabled(false)) => None,
		Some(Shuffle::Options { seed }) => Some(*seed),
	}
}

#[test]
fn test_parse_config() {
	let config: Config = serde_yaml::from_str(
		"
columns:
  label: churned
  latitude: lat
  features: [age]
hyperparameters:
  model_type: knn
  k: 7
max_rows: 1000
shuffle:
  seed: 7
",
	)
	.unwrap();
	let columns = config.columns.unwrap();
	assert_eq!(columns.label, "churned");
	assert_eq!(columns.latitude.as_deref(), Some("lat"));
	assert_eq!(columns.features, vec!["age".to_owned()]);
	assert_eq!(
		config.hyperparameters.unwrap()["model_type"],
		serde_json::json!("knn")
	);
	assert_eq!(config.max_rows, Some(1000));
	assert_eq!(shuffle_seed(config.shuffle.as_ref(), 42), Some(7));
}

#[test]
fn test_shuffle_seed() {
	assert_eq!(shuffle_seed(None, 42), Some(42));
	assert_eq!(shuffle_seed(Some(&Shuffle::Enabled(true)), 42), Some(42));
	assert_eq!(shuffle_seed(Some(&Shuffle::Enabled(false)), 42), None);
	let shuffle: Shuffle = serde_yaml::from_str("false").unwrap();
	assert_eq!(shuffle, Shuffle::Enabled(false));
}
