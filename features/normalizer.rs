use crate::UnknownOptionError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/**
`Normalization` rescales each row of the feature matrix on its own, after imputation and standardization.

- `L1` divides by the sum of absolute values.
- `L2` divides by the euclidean norm.
- `Max` divides by the largest absolute value.
- `Std` subtracts the row mean and divides by the row standard deviation.

Rows whose norm is zero are left unchanged.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
	None,
	L1,
	L2,
	Max,
	Std,
}

impl Default for Normalization {
	fn default() -> Self {
		Normalization::None
	}
}

impl Normalization {
	pub fn as_str(self) -> &'static str {
		match self {
			Normalization::None => "none",
			Normalization::L1 => "l1",
			Normalization::L2 => "l2",
			Normalization::Max => "max",
			Normalization::Std => "std",
		}
	}

	pub fn transform(self, mut features: ArrayViewMut2<f64>) {
		if self == Normalization::None {
			return;
		}
		for mut row in features.rows_mut() {
			let (center, scale) = match self {
				Normalization::None => return,
				Normalization::L1 => (0.0, row.iter().map(|value| value.abs()).sum::<f64>()),
				Normalization::L2 => (0.0, row.iter().map(|value| value * value).sum::<f64>().sqrt()),
				Normalization::Max => (
					0.0,
					row.iter().fold(0.0f64, |max, value| max.max(value.abs())),
				),
				Normalization::Std => {
					let n = row.len() as f64;
					let mean = row.sum() / n;
					let variance = row.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
					(mean, variance.sqrt())
				}
			};
			if scale > 0.0 && scale.is_finite() {
				row.mapv_inplace(|value| (value - center) / scale);
			}
		}
	}
}

impl FromStr for Normalization {
	type Err = UnknownOptionError;
	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"none" => Ok(Normalization::None),
			"l1" => Ok(Normalization::L1),
			"l2" => Ok(Normalization::L2),
			"max" => Ok(Normalization::Max),
			"std" => Ok(Normalization::Std),
			_ => Err(UnknownOptionError {
				kind: "normalization",
				value: value.to_owned(),
			}),
		}
	}
}

#[test]
fn test_normalize() {
	let features = array![[3.0, -4.0], [0.0, 0.0]];
	let mut l1 = features.clone();
	Normalization::L1.transform(l1.view_mut());
	assert_eq!(l1, array![[3.0 / 7.0, -4.0 / 7.0], [0.0, 0.0]]);
	let mut l2 = features.clone();
	Normalization::L2.transform(l2.view_mut());
	assert_eq!(l2, array![[0.6, -0.8], [0.0, 0.0]]);
	let mut max = features.clone();
	Normalization::Max.transform(max.view_mut());
	assert_eq!(max, array![[0.75, -1.0], [0.0, 0.0]]);
	let mut std = features.clone();
	Normalization::Std.transform(std.view_mut());
	assert_eq!(std, array![[1.0, -1.0], [0.0, 0.0]]);
	let mut none = features.clone();
	Normalization::None.transform(none.view_mut());
	assert_eq!(none, features);
}
