use crate::{ArtifactStore, Classifier, ClassifierModel, Error, TrainingArtifact};
use lodestar_features::{FeaturePipeline, Imputer, Standardizer};
use lodestar_util::{argmax, FitError};
use ndarray::prelude::*;

/// A trained classifier together with the feature pipeline it was trained behind, rebuilt from an artifact descriptor.
#[derive(Clone, Debug)]
pub struct Predictor {
	feature_names: Vec<String>,
	pipeline: FeaturePipeline,
	classifier: ClassifierModel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
	pub labels: Vec<i64>,
	/// One row per example, one column per class in `classes` order.
	pub probabilities: Array2<f64>,
}

impl Predictor {
	pub fn from_artifact(
		store: &ArtifactStore,
		artifact: &TrainingArtifact,
	) -> Result<Predictor, Error> {
		let imputer = Imputer::from_parts(
			artifact.imputer.strategy,
			artifact.imputer.fill_value,
			artifact.imputer.statistics.clone(),
		);
		let standardizer = Standardizer::from_statistics(
			artifact.feature_means.clone(),
			artifact.feature_std_devs.clone(),
		);
		let classifier = store.load_classifier(artifact)?;
		Ok(Predictor {
			feature_names: artifact.feature_names.clone(),
			pipeline: FeaturePipeline {
				imputer,
				standardizer,
				normalization: artifact.normalization,
			},
			classifier,
		})
	}

	pub fn feature_names(&self) -> &[String] {
		&self.feature_names
	}

	pub fn classes(&self) -> &[i64] {
		self.classifier.classes()
	}

	/// Predict raw feature rows, in `feature_names` order. Missing values may be NaN.
	pub fn predict(&self, features: ArrayView2<f64>) -> Result<Prediction, Error> {
		if features.ncols() != self.feature_names.len() {
			return Err(FitError::FeatureCountMismatch {
				n_features: features.ncols(),
				expected: self.feature_names.len(),
			}
			.into());
		}
		let features = self.pipeline.transform(features);
		let probabilities = self.classifier.predict_probabilities(features.view())?;
		let classes = self.classifier.classes();
		let labels = probabilities
			.rows()
			.into_iter()
			.map(|row| classes[argmax(row.iter())])
			.collect();
		Ok(Prediction {
			labels,
			probabilities,
		})
	}
}
