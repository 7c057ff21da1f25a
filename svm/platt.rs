use serde::{Deserialize, Serialize};

/// Sigmoid parameters mapping a decision value `f` to `P(y = 1 | f) = 1 / (1 + exp(a * f + b))`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
	pub a: f64,
	pub b: f64,
}

const MAX_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
const SIGMA: f64 = 1e-12;
const EPSILON: f64 = 1e-5;

impl PlattScaling {
	/**
	Fit the sigmoid to decision values by maximum likelihood with Newton's method and a backtracking line search.

	The targets are smoothed to `(n_positive + 1) / (n_positive + 2)` and `1 / (n_negative + 2)` as in Platt's paper, which keeps the fit finite on separable data.
	*/
	pub fn fit(decision_values: &[f64], is_positive: &[bool]) -> PlattScaling {
		let n_positive = is_positive.iter().filter(|p| **p).count() as f64;
		let n_negative = is_positive.len() as f64 - n_positive;
		let high_target = (n_positive + 1.0) / (n_positive + 2.0);
		let low_target = 1.0 / (n_negative + 2.0);
		let targets: Vec<f64> = is_positive
			.iter()
			.map(|p| if *p { high_target } else { low_target })
			.collect();
		let mut a = 0.0;
		let mut b = ((n_negative + 1.0) / (n_positive + 1.0)).ln();
		let mut value = objective(decision_values, &targets, a, b);
		for _ in 0..MAX_ITERATIONS {
			// Gradient and Hessian, with the Hessian regularized by SIGMA.
			let mut h11 = SIGMA;
			let mut h22 = SIGMA;
			let mut h21 = 0.0;
			let mut g1 = 0.0;
			let mut g2 = 0.0;
			for (f, t) in decision_values.iter().zip(targets.iter()) {
				let fapb = f * a + b;
				let (p, q) = if fapb >= 0.0 {
					let e = (-fapb).exp();
					(e / (1.0 + e), 1.0 / (1.0 + e))
				} else {
					let e = fapb.exp();
					(1.0 / (1.0 + e), e / (1.0 + e))
				};
				let d2 = p * q;
				h11 += f * f * d2;
				h22 += d2;
				h21 += f * d2;
				let d1 = t - p;
				g1 += f * d1;
				g2 += d1;
			}
			if g1.abs() < EPSILON && g2.abs() < EPSILON {
				break;
			}
			let det = h11 * h22 - h21 * h21;
			let da = -(h22 * g1 - h21 * g2) / det;
			let db = -(-h21 * g1 + h11 * g2) / det;
			let gd = g1 * da + g2 * db;
			let mut step = 1.0;
			while step >= MIN_STEP {
				let new_a = a + step * da;
				let new_b = b + step * db;
				let new_value = objective(decision_values, &targets, new_a, new_b);
				if new_value < value + 0.0001 * step * gd {
					a = new_a;
					b = new_b;
					value = new_value;
					break;
				}
				step /= 2.0;
			}
			if step < MIN_STEP {
				break;
			}
		}
		PlattScaling { a, b }
	}

	pub fn probability(&self, decision_value: f64) -> f64 {
		let fapb = decision_value * self.a + self.b;
		if fapb >= 0.0 {
			let e = (-fapb).exp();
			e / (1.0 + e)
		} else {
			1.0 / (1.0 + fapb.exp())
		}
	}
}

/// The negative log likelihood of the targets.
fn objective(decision_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
	decision_values
		.iter()
		.zip(targets.iter())
		.map(|(f, t)| {
			let fapb = f * a + b;
			if fapb >= 0.0 {
				t * fapb + (1.0 + (-fapb).exp()).ln()
			} else {
				(t - 1.0) * fapb + (1.0 + fapb.exp()).ln()
			}
		})
		.sum()
}

#[test]
fn test_platt_is_increasing() {
	let decision_values = [-2.0, -1.5, -1.0, -0.2, 0.3, 0.4, 1.0, 1.2, 2.0, -0.1];
	let is_positive = [false, false, false, true, false, true, true, true, true, false];
	let platt = PlattScaling::fit(&decision_values, &is_positive);
	assert!(platt.a < 0.0);
	assert!(platt.probability(2.0) > 0.5);
	assert!(platt.probability(-2.0) < 0.5);
	assert!(platt.probability(1.0) > platt.probability(0.0));
}

#[test]
fn test_platt_prior() {
	// With uninformative decision values the fit falls back to the smoothed class prior.
	let decision_values = [0.0; 4];
	let is_positive = [true, false, false, false];
	let platt = PlattScaling::fit(&decision_values, &is_positive);
	let expected = (2.0 / 3.0 + 3.0 * 0.2) / 4.0;
	assert!((platt.probability(0.0) - expected).abs() < 1e-3);
}
