/*!
This crate implements the preprocessing applied to feature matrices before they reach a model: an [`Imputer`](struct.Imputer.html) that fills missing values, a [`Standardizer`](struct.Standardizer.html) that centers and scales each column, and a row wise [`Normalization`](enum.Normalization.html). A [`FeaturePipeline`](struct.FeaturePipeline.html) chains the three.
*/

mod imputer;
mod normalizer;
mod pipeline;
mod standardizer;

pub use self::imputer::{Imputer, ImputerStrategy};
pub use self::normalizer::Normalization;
pub use self::pipeline::{FeaturePipeline, PipelineOptions};
pub use self::standardizer::Standardizer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} \"{value}\"")]
pub struct UnknownOptionError {
	pub kind: &'static str,
	pub value: String,
}
