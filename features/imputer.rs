use crate::UnknownOptionError;
use fnv::FnvHashMap;
use lodestar_metrics::{MeanVariance, StreamingMetric};
use lodestar_util::{finite::sorted_finite, Finite, ToFinite};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputerStrategy {
	Mean,
	Median,
	MostFrequent,
	Constant,
}

impl ImputerStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			ImputerStrategy::Mean => "mean",
			ImputerStrategy::Median => "median",
			ImputerStrategy::MostFrequent => "most_frequent",
			ImputerStrategy::Constant => "constant",
		}
	}
}

impl FromStr for ImputerStrategy {
	type Err = UnknownOptionError;
	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"mean" => Ok(ImputerStrategy::Mean),
			"median" => Ok(ImputerStrategy::Median),
			"most_frequent" => Ok(ImputerStrategy::MostFrequent),
			"constant" => Ok(ImputerStrategy::Constant),
			_ => Err(UnknownOptionError {
				kind: "imputer strategy",
				value: value.to_owned(),
			}),
		}
	}
}

/**
An `Imputer` replaces missing (NaN) feature values with a per column statistic learned from the training rows. A column with no observed values is filled with `fill_value`, as is every column under the `Constant` strategy.

| strategy | statistic |
|---|---|
| mean | mean of the observed values |
| median | middle observed value, or the mean of the two middle values |
| most_frequent | most common observed value, the smallest on ties |
| constant | `fill_value` |
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
	strategy: ImputerStrategy,
	fill_value: f64,
	statistics: Vec<f64>,
}

impl Imputer {
	pub fn fit(features: ArrayView2<f64>, strategy: ImputerStrategy, fill_value: f64) -> Imputer {
		let statistics = features
			.columns()
			.into_iter()
			.map(|column| {
				let observed = column.iter().copied().filter(|value| !value.is_nan());
				let statistic = match strategy {
					ImputerStrategy::Constant => None,
					ImputerStrategy::Mean => {
						let mut mean_variance = MeanVariance::new();
						observed.for_each(|value| mean_variance.update(value));
						if mean_variance.n() > 0 {
							Some(mean_variance.mean())
						} else {
							None
						}
					}
					ImputerStrategy::Median => median(&sorted_finite(observed)),
					ImputerStrategy::MostFrequent => most_frequent(observed),
				};
				statistic.unwrap_or(fill_value)
			})
			.collect();
		Imputer {
			strategy,
			fill_value,
			statistics,
		}
	}

	/// Rebuild an imputer from previously fitted statistics.
	pub fn from_parts(strategy: ImputerStrategy, fill_value: f64, statistics: Vec<f64>) -> Imputer {
		Imputer {
			strategy,
			fill_value,
			statistics,
		}
	}

	pub fn strategy(&self) -> ImputerStrategy {
		self.strategy
	}

	pub fn fill_value(&self) -> f64 {
		self.fill_value
	}

	/// The value substituted for a missing entry in each column.
	pub fn statistics(&self) -> &[f64] {
		&self.statistics
	}

	pub fn transform(&self, mut features: ArrayViewMut2<f64>) {
		for (mut column, statistic) in features.columns_mut().into_iter().zip(self.statistics.iter()) {
			column.mapv_inplace(|value| if value.is_nan() { *statistic } else { value });
		}
	}
}

fn median(sorted: &[f64]) -> Option<f64> {
	let n = sorted.len();
	if n == 0 {
		None
	} else if n % 2 == 1 {
		Some(sorted[n / 2])
	} else {
		Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
	}
}

fn most_frequent(values: impl Iterator<Item = f64>) -> Option<f64> {
	let mut counts: FnvHashMap<Finite<f64>, usize> = FnvHashMap::default();
	for value in values.filter_map(|value| value.to_finite().ok()) {
		*counts.entry(value).or_insert(0) += 1;
	}
	counts
		.into_iter()
		.max_by(|(a_value, a_count), (b_value, b_count)| {
			a_count.cmp(b_count).then_with(|| b_value.cmp(a_value))
		})
		.map(|(value, _)| value.get())
}

#[test]
fn test_strategies() {
	let nan = f64::NAN;
	let features = array![[1.0, nan], [nan, nan], [3.0, nan], [3.0, nan], [8.0, nan]];
	let mean = Imputer::fit(features.view(), ImputerStrategy::Mean, -1.0);
	assert_eq!(mean.statistics(), &[3.75, -1.0]);
	let median = Imputer::fit(features.view(), ImputerStrategy::Median, -1.0);
	assert_eq!(median.statistics(), &[3.0, -1.0]);
	let most_frequent = Imputer::fit(features.view(), ImputerStrategy::MostFrequent, -1.0);
	assert_eq!(most_frequent.statistics(), &[3.0, -1.0]);
	let constant = Imputer::fit(features.view(), ImputerStrategy::Constant, 7.0);
	assert_eq!(constant.statistics(), &[7.0, 7.0]);
}

#[test]
fn test_most_frequent_tie_takes_smallest() {
	let features = array![[2.0], [1.0], [2.0], [1.0]];
	let imputer = Imputer::fit(features.view(), ImputerStrategy::MostFrequent, 0.0);
	assert_eq!(imputer.statistics(), &[1.0]);
}

#[test]
fn test_transform() {
	let nan = f64::NAN;
	let train = array![[1.0, 10.0], [3.0, nan]];
	let imputer = Imputer::fit(train.view(), ImputerStrategy::Mean, 0.0);
	let mut features = array![[nan, nan], [5.0, 6.0]];
	imputer.transform(features.view_mut());
	assert_eq!(features, array![[2.0, 10.0], [5.0, 6.0]]);
}

#[test]
fn test_parse_strategy() {
	assert_eq!("median".parse(), Ok(ImputerStrategy::Median));
	assert!("mode".parse::<ImputerStrategy>().is_err());
}
