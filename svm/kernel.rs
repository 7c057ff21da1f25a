use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// The kernel families a `SupportVectorClassifier` can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
	Linear,
	Polynomial,
	Rbf,
	Sigmoid,
}

impl KernelType {
	pub fn as_str(self) -> &'static str {
		match self {
			KernelType::Linear => "linear",
			KernelType::Polynomial => "polynomial",
			KernelType::Rbf => "rbf",
			KernelType::Sigmoid => "sigmoid",
		}
	}

	/// Parse a kernel name. `poly` is accepted for `polynomial`.
	pub fn parse(value: &str) -> Option<KernelType> {
		match value {
			"linear" => Some(KernelType::Linear),
			"polynomial" | "poly" => Some(KernelType::Polynomial),
			"rbf" => Some(KernelType::Rbf),
			"sigmoid" => Some(KernelType::Sigmoid),
			_ => None,
		}
	}
}

/// A kernel function with its parameters resolved.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
	/// `K(x, y) = x · y`
	Linear,
	/// `K(x, y) = (gamma * x · y + coef0)^degree`
	Polynomial { gamma: f64, degree: i32, coef0: f64 },
	/// `K(x, y) = exp(-gamma * |x - y|^2)`
	Rbf { gamma: f64 },
	/// `K(x, y) = tanh(gamma * x · y + coef0)`
	Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
	pub fn compute(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
		match *self {
			Kernel::Linear => a.dot(&b),
			Kernel::Polynomial {
				gamma,
				degree,
				coef0,
			} => (gamma * a.dot(&b) + coef0).powi(degree),
			Kernel::Rbf { gamma } => {
				let squared_distance: f64 = a.iter().zip(b.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
				(-gamma * squared_distance).exp()
			}
			Kernel::Sigmoid { gamma, coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
		}
	}
}

#[test]
fn test_kernels() {
	let a = array![1.0, 2.0];
	let b = array![3.0, -1.0];
	assert_eq!(Kernel::Linear.compute(a.view(), b.view()), 1.0);
	let polynomial = Kernel::Polynomial {
		gamma: 0.5,
		degree: 2,
		coef0: 1.0,
	};
	assert_eq!(polynomial.compute(a.view(), b.view()), 2.25);
	let rbf = Kernel::Rbf { gamma: 0.1 };
	assert!((rbf.compute(a.view(), b.view()) - (-1.3f64).exp()).abs() < 1e-12);
	assert_eq!(rbf.compute(a.view(), a.view()), 1.0);
	let sigmoid = Kernel::Sigmoid {
		gamma: 1.0,
		coef0: 0.0,
	};
	assert!((sigmoid.compute(a.view(), b.view()) - 1.0f64.tanh()).abs() < 1e-12);
}

#[test]
fn test_parse() {
	assert_eq!(KernelType::parse("poly"), Some(KernelType::Polynomial));
	assert_eq!(KernelType::parse("rbf"), Some(KernelType::Rbf));
	assert_eq!(KernelType::parse("cosine"), None);
}
