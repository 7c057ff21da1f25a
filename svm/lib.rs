/*!
This crate implements a kernel support vector classifier trained with sequential minimal optimization.
*/

pub use self::{
	cache::KernelCache,
	kernel::{Kernel, KernelType},
	platt::PlattScaling,
};
use lodestar_util::FitError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod cache;
mod kernel;
mod platt;
mod smo;

/// Multipliers at or below this are not support vectors.
const SUPPORT_VECTOR_THRESHOLD: f64 = 1e-8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	/// The soft margin penalty `C`.
	pub cost: f64,
	/// The KKT violation tolerance.
	pub tolerance: f64,
	/// The kernel row cache budget in megabytes.
	pub cache_size: f64,
	pub kernel: KernelType,
	/// `None` uses `1 / n_features`.
	pub gamma: Option<f64>,
	pub degree: i32,
	pub coef0: f64,
	pub shrinking: bool,
	/// Fit Platt scaling for probability estimates.
	pub probability: bool,
	pub max_iterations: usize,
	pub seed: u64,
}

impl Default for TrainOptions {
	fn default() -> TrainOptions {
		TrainOptions {
			cost: 1.0,
			tolerance: 0.001,
			cache_size: 100.0,
			kernel: KernelType::Rbf,
			gamma: None,
			degree: 3,
			coef0: 0.0,
			shrinking: true,
			probability: false,
			max_iterations: 1000,
			seed: 42,
		}
	}
}

impl TrainOptions {
	pub fn kernel(&self, n_features: usize) -> Kernel {
		let gamma = self
			.gamma
			.unwrap_or_else(|| 1.0 / n_features.max(1) as f64);
		match self.kernel {
			KernelType::Linear => Kernel::Linear,
			KernelType::Polynomial => Kernel::Polynomial {
				gamma,
				degree: self.degree,
				coef0: self.coef0,
			},
			KernelType::Rbf => Kernel::Rbf { gamma },
			KernelType::Sigmoid => Kernel::Sigmoid {
				gamma,
				coef0: self.coef0,
			},
		}
	}
}

/**
A support vector classifier.

Two classes are handled by one machine separating class 1 from class 0. More classes use one machine per class in a one-vs-rest arrangement, and a class absent from the training labels gets no machine and a probability of zero.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
	pub kernel: Kernel,
	pub n_features: usize,
	pub n_classes: usize,
	pub machines: Vec<Option<BinaryMachine>>,
}

/// One binary machine. Its decision value is positive for the positive class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryMachine {
	/// (n_support_vectors, n_features)
	pub support_vectors: Array2<f64>,
	/// `alpha_i * y_i` for each support vector.
	pub coefficients: Array1<f64>,
	pub bias: f64,
	pub platt: Option<PlattScaling>,
}

impl SupportVectorClassifier {
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
	) -> Result<SupportVectorClassifier, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		let kernel = options.kernel(features.ncols());
		let machines = if n_classes <= 2 {
			vec![Some(BinaryMachine::train(
				features, labels, 1, kernel, options,
			))]
		} else {
			(0..n_classes)
				.map(|class| {
					if labels.iter().any(|label| *label == class) {
						Some(BinaryMachine::train(
							features, labels, class, kernel, options,
						))
					} else {
						None
					}
				})
				.collect()
		};
		Ok(SupportVectorClassifier {
			kernel,
			n_features: features.ncols(),
			n_classes,
			machines,
		})
	}

	pub fn n_features(&self) -> usize {
		self.n_features
	}

	/// Decision values with shape (n_examples, n_machines).
	pub fn decision_function(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut decisions = Array2::zeros((features.nrows(), self.machines.len()));
		for (mut decisions, example) in decisions.rows_mut().into_iter().zip(features.rows()) {
			for (decision, machine) in decisions.iter_mut().zip(self.machines.iter()) {
				*decision = match machine {
					Some(machine) => machine.decision(&self.kernel, example),
					None => f64::NEG_INFINITY,
				};
			}
		}
		decisions
	}

	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let n_columns = self.n_classes.max(2);
		let mut probabilities = Array2::zeros((features.nrows(), n_columns));
		for (mut probabilities, example) in probabilities.rows_mut().into_iter().zip(features.rows())
		{
			if self.machines.len() == 1 {
				let p = self.machines[0]
					.as_ref()
					.map(|machine| machine.probability(&self.kernel, example))
					.unwrap_or(0.0);
				probabilities[0] = 1.0 - p;
				probabilities[1] = p;
				continue;
			}
			for (probability, machine) in probabilities.iter_mut().zip(self.machines.iter()) {
				*probability = match machine {
					Some(machine) => machine.probability(&self.kernel, example),
					None => 0.0,
				};
			}
			let sum = probabilities.sum();
			if sum > 0.0 {
				probabilities.mapv_inplace(|p| p / sum);
			} else {
				let n_present = self.machines.iter().filter(|m| m.is_some()).count() as f64;
				for (probability, machine) in probabilities.iter_mut().zip(self.machines.iter()) {
					*probability = if machine.is_some() {
						1.0 / n_present
					} else {
						0.0
					};
				}
			}
		}
		probabilities
	}
}

impl BinaryMachine {
	fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		positive_class: usize,
		kernel: Kernel,
		options: &TrainOptions,
	) -> BinaryMachine {
		let targets: Vec<f64> = labels
			.iter()
			.map(|label| if *label == positive_class { 1.0 } else { -1.0 })
			.collect();
		let output = smo::train(
			features,
			&targets,
			kernel,
			&smo::SmoOptions {
				cost: options.cost,
				tolerance: options.tolerance,
				cache_size_mb: options.cache_size,
				shrinking: options.shrinking,
				max_iterations: options.max_iterations,
				seed: options.seed.wrapping_add(positive_class as u64),
			},
		);
		let support: Vec<usize> = output
			.alphas
			.iter()
			.enumerate()
			.filter(|(_, alpha)| **alpha > SUPPORT_VECTOR_THRESHOLD)
			.map(|(index, _)| index)
			.collect();
		debug!(
			positive_class,
			n_support_vectors = support.len(),
			iterations = output.iterations,
			"trained binary machine"
		);
		let mut machine = BinaryMachine {
			support_vectors: features.select(Axis(0), &support),
			coefficients: support
				.iter()
				.map(|index| output.alphas[*index] * targets[*index])
				.collect(),
			bias: output.bias,
			platt: None,
		};
		if options.probability {
			let decision_values: Vec<f64> = features
				.rows()
				.into_iter()
				.map(|example| machine.decision(&kernel, example))
				.collect();
			let is_positive: Vec<bool> = targets.iter().map(|target| *target > 0.0).collect();
			machine.platt = Some(PlattScaling::fit(&decision_values, &is_positive));
		}
		machine
	}

	pub fn decision(&self, kernel: &Kernel, example: ArrayView1<f64>) -> f64 {
		self.support_vectors
			.rows()
			.into_iter()
			.zip(self.coefficients.iter())
			.map(|(support_vector, coefficient)| coefficient * kernel.compute(support_vector, example))
			.sum::<f64>()
			+ self.bias
	}

	/// The probability of the positive class. Without Platt scaling the decision value is squashed with the logistic function.
	pub fn probability(&self, kernel: &Kernel, example: ArrayView1<f64>) -> f64 {
		let decision = self.decision(kernel, example);
		match &self.platt {
			Some(platt) => platt.probability(decision),
			None => 1.0 / (1.0 + (-decision).exp()),
		}
	}
}

#[cfg(test)]
fn blobs() -> (Array2<f64>, Array1<usize>) {
	let features = array![
		[0.0, 0.0],
		[0.2, 0.1],
		[0.1, 0.3],
		[0.3, 0.2],
		[2.0, 2.0],
		[2.2, 1.9],
		[1.9, 2.3],
		[2.1, 2.2],
	];
	let labels = array![0, 0, 0, 0, 1, 1, 1, 1];
	(features, labels)
}

#[test]
fn test_binary_linear() {
	let (features, labels) = blobs();
	let options = TrainOptions {
		kernel: KernelType::Linear,
		cost: 10.0,
		..Default::default()
	};
	let model = SupportVectorClassifier::train(features.view(), labels.view(), 2, &options).unwrap();
	let probabilities = model.predict_probabilities(features.view());
	for (row, label) in probabilities.rows().into_iter().zip(labels.iter()) {
		let predicted = if row[1] > row[0] { 1 } else { 0 };
		assert_eq!(predicted, *label);
		assert!((row.sum() - 1.0).abs() < 1e-12);
	}
}

#[test]
fn test_binary_rbf_with_probability() {
	let (features, labels) = blobs();
	let options = TrainOptions {
		kernel: KernelType::Rbf,
		gamma: Some(1.0),
		cost: 10.0,
		probability: true,
		..Default::default()
	};
	let model = SupportVectorClassifier::train(features.view(), labels.view(), 2, &options).unwrap();
	assert!(model.machines[0].as_ref().unwrap().platt.is_some());
	let probabilities = model.predict_probabilities(array![[0.1, 0.1], [2.1, 2.1]].view());
	assert!(probabilities[[0, 0]] > 0.5);
	assert!(probabilities[[1, 1]] > 0.5);
}

#[test]
fn test_one_vs_rest() {
	let features = array![
		[0.0, 0.0],
		[0.1, 0.2],
		[0.2, 0.0],
		[3.0, 0.0],
		[3.1, 0.2],
		[2.9, 0.1],
		[0.0, 3.0],
		[0.2, 3.1],
		[0.1, 2.9],
	];
	let labels = array![0, 0, 0, 1, 1, 1, 3, 3, 3];
	let options = TrainOptions {
		kernel: KernelType::Linear,
		cost: 10.0,
		..Default::default()
	};
	let model = SupportVectorClassifier::train(features.view(), labels.view(), 4, &options).unwrap();
	assert!(model.machines[2].is_none());
	let probabilities = model.predict_probabilities(features.view());
	for (row, label) in probabilities.rows().into_iter().zip(labels.iter()) {
		assert_eq!(row[2], 0.0);
		assert!((row.sum() - 1.0).abs() < 1e-9);
		assert_eq!(lodestar_util::argmax(row.iter()), *label);
	}
}

#[test]
fn test_single_class() {
	let features = array![[0.0], [1.0]];
	let labels = array![1, 1];
	let result = SupportVectorClassifier::train(features.view(), labels.view(), 2, &TrainOptions::default());
	assert!(result.is_err());
}
