use crate::Error;
use std::path::{Path, PathBuf};

/// Resolves a dataset id to the csv file holding its rows.
pub trait DatasetStorage {
	fn resolve(&self, dataset_id: &str) -> Result<PathBuf, Error>;
}

/// Datasets stored as files in one directory. An id resolves to the file of that exact name if there is one, and to `<id>.csv` otherwise.
#[derive(Clone, Debug)]
pub struct LocalDatasetStorage {
	root: PathBuf,
}

impl LocalDatasetStorage {
	pub fn new(root: impl Into<PathBuf>) -> LocalDatasetStorage {
		LocalDatasetStorage { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

impl DatasetStorage for LocalDatasetStorage {
	fn resolve(&self, dataset_id: &str) -> Result<PathBuf, Error> {
		if dataset_id.trim().is_empty() {
			return Err(Error::MissingDatasetPath {
				dataset_id: dataset_id.to_owned(),
			});
		}
		let exact = self.root.join(dataset_id);
		if exact.is_file() {
			return Ok(exact);
		}
		let csv = self.root.join(format!("{}.csv", dataset_id));
		if csv.is_file() {
			return Ok(csv);
		}
		Err(Error::DatasetFileNotFound {
			dataset_id: dataset_id.to_owned(),
			path: csv,
		})
	}
}

#[test]
fn test_resolve() {
	let root = std::env::temp_dir().join(lodestar_util::Id::new().to_string());
	std::fs::create_dir_all(&root).unwrap();
	std::fs::write(root.join("events.csv"), "label\n1\n").unwrap();
	std::fs::write(root.join("raw.txt"), "label\n1\n").unwrap();
	let storage = LocalDatasetStorage::new(&root);
	assert_eq!(storage.resolve("events").unwrap(), root.join("events.csv"));
	assert_eq!(storage.resolve("events.csv").unwrap(), root.join("events.csv"));
	assert_eq!(storage.resolve("raw.txt").unwrap(), root.join("raw.txt"));
	assert!(matches!(
		storage.resolve(""),
		Err(Error::MissingDatasetPath { .. })
	));
	assert!(matches!(
		storage.resolve("missing"),
		Err(Error::DatasetFileNotFound { .. })
	));
	std::fs::remove_dir_all(&root).unwrap();
}
