use crate::{cache::KernelCache, Kernel};
use ndarray::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use tracing::debug;

pub struct SmoOptions {
	pub cost: f64,
	pub tolerance: f64,
	pub cache_size_mb: f64,
	pub shrinking: bool,
	pub max_iterations: usize,
	pub seed: u64,
}

pub struct SmoOutput {
	pub alphas: Vec<f64>,
	pub bias: f64,
	pub iterations: usize,
}

/// Changes to a multiplier smaller than this are not worth a step.
const MIN_ALPHA_CHANGE: f64 = 1e-5;

/**
Solve the dual problem of a binary soft margin SVM with sequential minimal optimization. `targets` are +1.0 or -1.0.

This follows Platt's algorithm. Each step picks a multiplier that violates the KKT conditions by more than `tolerance` and a second multiplier that maximizes `|E_i - E_j|`, then optimizes the pair analytically. The prediction error of every example is kept up to date after each step, which needs the two kernel rows of the pair. Those come from a `KernelCache`.

With `shrinking` enabled, full passes over every example alternate with passes over only the multipliers strictly between 0 and `cost`, where most of the remaining violations are found.
*/
pub fn train<'a, 'b>(
	features: ArrayView2<'a, f64>,
	targets: &'b [f64],
	kernel: Kernel,
	options: &SmoOptions,
) -> SmoOutput {
	let n = targets.len();
	let mut smo = Smo {
		cache: KernelCache::new(features, kernel, options.cache_size_mb),
		targets,
		alphas: vec![0.0; n],
		bias: 0.0,
		// The decision function starts at zero, so each error is -y.
		errors: targets.iter().map(|y| -y).collect(),
		cost: options.cost,
		tolerance: options.tolerance,
		rng: Xoshiro256Plus::seed_from_u64(options.seed),
	};
	let mut examine_all = true;
	let mut n_changed = 0;
	let mut iterations = 0;
	while (n_changed > 0 || examine_all) && iterations < options.max_iterations {
		n_changed = 0;
		if examine_all {
			for i in 0..n {
				if smo.examine(i) {
					n_changed += 1;
				}
			}
		} else {
			for i in 0..n {
				if smo.is_non_bound(i) && smo.examine(i) {
					n_changed += 1;
				}
			}
		}
		if !options.shrinking {
			examine_all = true;
			if n_changed == 0 {
				break;
			}
		} else if examine_all {
			examine_all = false;
		} else if n_changed == 0 {
			examine_all = true;
		}
		iterations += 1;
	}
	let (hits, misses) = smo.cache.stats();
	debug!(iterations, hits, misses, "smo finished");
	SmoOutput {
		alphas: smo.alphas,
		bias: smo.bias,
		iterations,
	}
}

struct Smo<'a, 'b> {
	cache: KernelCache<'a>,
	targets: &'b [f64],
	alphas: Vec<f64>,
	bias: f64,
	/// f(x_k) - y_k for every training example.
	errors: Vec<f64>,
	cost: f64,
	tolerance: f64,
	rng: Xoshiro256Plus,
}

impl<'a, 'b> Smo<'a, 'b> {
	fn is_non_bound(&self, i: usize) -> bool {
		self.alphas[i] > 0.0 && self.alphas[i] < self.cost
	}

	fn examine(&mut self, i: usize) -> bool {
		let n = self.alphas.len();
		let r = self.targets[i] * self.errors[i];
		let violates_kkt =
			(r < -self.tolerance && self.alphas[i] < self.cost) || (r > self.tolerance && self.alphas[i] > 0.0);
		if !violates_kkt {
			return false;
		}
		// The second choice heuristic.
		let error_i = self.errors[i];
		let best = (0..n)
			.filter(|j| *j != i && self.is_non_bound(*j))
			.max_by(|a, b| {
				let a = (error_i - self.errors[*a]).abs();
				let b = (error_i - self.errors[*b]).abs();
				a.total_cmp(&b)
			});
		if let Some(j) = best {
			if self.take_step(i, j) {
				return true;
			}
		}
		// Fall back to every non-bound multiplier, then every multiplier, starting at a random position.
		let start = self.rng.gen_range(0..n);
		for non_bound_only in [true, false] {
			for offset in 0..n {
				let j = (start + offset) % n;
				if non_bound_only && !self.is_non_bound(j) {
					continue;
				}
				if self.take_step(i, j) {
					return true;
				}
			}
		}
		false
	}

	fn take_step(&mut self, i: usize, j: usize) -> bool {
		if i == j {
			return false;
		}
		let (y_i, y_j) = (self.targets[i], self.targets[j]);
		let (alpha_i, alpha_j) = (self.alphas[i], self.alphas[j]);
		let (error_i, error_j) = (self.errors[i], self.errors[j]);
		let (low, high) = if y_i != y_j {
			((alpha_j - alpha_i).max(0.0), (self.cost + alpha_j - alpha_i).min(self.cost))
		} else {
			((alpha_i + alpha_j - self.cost).max(0.0), (alpha_i + alpha_j).min(self.cost))
		};
		if high - low < 1e-10 {
			return false;
		}
		let row_i = self.cache.row(i);
		let row_j = self.cache.row(j);
		let (k_ii, k_jj, k_ij) = (row_i[i], row_j[j], row_i[j]);
		let eta = k_ii + k_jj - 2.0 * k_ij;
		if eta <= 0.0 {
			return false;
		}
		let new_alpha_j = (alpha_j + y_j * (error_i - error_j) / eta).max(low).min(high);
		if (new_alpha_j - alpha_j).abs() < MIN_ALPHA_CHANGE {
			return false;
		}
		let new_alpha_i = alpha_i + y_i * y_j * (alpha_j - new_alpha_j);
		let delta_i = y_i * (new_alpha_i - alpha_i);
		let delta_j = y_j * (new_alpha_j - alpha_j);
		let b1 = self.bias - error_i - delta_i * k_ii - delta_j * k_ij;
		let b2 = self.bias - error_j - delta_i * k_ij - delta_j * k_jj;
		let new_bias = if new_alpha_i > 0.0 && new_alpha_i < self.cost {
			b1
		} else if new_alpha_j > 0.0 && new_alpha_j < self.cost {
			b2
		} else {
			(b1 + b2) / 2.0
		};
		let delta_bias = new_bias - self.bias;
		for (k, error) in self.errors.iter_mut().enumerate() {
			*error += delta_i * row_i[k] + delta_j * row_j[k] + delta_bias;
		}
		self.alphas[i] = new_alpha_i;
		self.alphas[j] = new_alpha_j;
		self.bias = new_bias;
		true
	}
}

#[test]
fn test_separable() {
	let features = array![[0.0, 0.0], [0.0, 1.0], [3.0, 3.0], [3.0, 4.0]];
	let targets = [-1.0, -1.0, 1.0, 1.0];
	let options = SmoOptions {
		cost: 10.0,
		tolerance: 1e-3,
		cache_size_mb: 1.0,
		shrinking: true,
		max_iterations: 1000,
		seed: 0,
	};
	let output = train(features.view(), &targets, Kernel::Linear, &options);
	// sum(alpha_i * y_i) is preserved by every step.
	let balance: f64 = output.alphas.iter().zip(targets.iter()).map(|(a, y)| a * y).sum();
	assert!(balance.abs() < 1e-9);
	for (row, target) in features.rows().into_iter().zip(targets.iter()) {
		let decision: f64 = output
			.alphas
			.iter()
			.zip(targets.iter())
			.zip(features.rows())
			.map(|((alpha, y), other)| alpha * y * other.dot(&row))
			.sum::<f64>() + output.bias;
		assert!(decision * target > 0.0);
	}
}

#[test]
fn test_targets_may_outlive_less_than_features() {
	let features = array![[0.0], [1.0], [4.0], [5.0]];
	let view = features.view();
	let options = SmoOptions {
		cost: 1.0,
		tolerance: 1e-3,
		cache_size_mb: 1.0,
		shrinking: false,
		max_iterations: 100,
		seed: 1,
	};
	let output = {
		let targets: Vec<f64> = (0..4).map(|i| if i < 2 { -1.0 } else { 1.0 }).collect();
		train(view, &targets, Kernel::Linear, &options)
	};
	assert_eq!(output.alphas.len(), 4);
	assert!(output.alphas.iter().any(|alpha| *alpha > 0.0));
}
