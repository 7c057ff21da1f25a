use num_traits::Float;
use std::{
	cmp::Ordering,
	hash::{Hash, Hasher},
};
use thiserror::Error;

/**
A `Finite` wraps a float that is known to be neither NaN nor infinite. Because of that guarantee it can implement `Eq`, `Ord`, and `Hash`, so it can be sorted, used as a `BTreeMap` key, or deduplicated with a `HashSet`.
*/
#[derive(Clone, Copy, Debug)]
pub struct Finite<T>(T)
where
	T: Float;

#[derive(Debug, Error)]
#[error("not finite")]
pub struct NotFiniteError;

impl<T> Finite<T>
where
	T: Float,
{
	pub fn new(value: T) -> Result<Self, NotFiniteError> {
		if value.is_finite() {
			Ok(Self(value))
		} else {
			Err(NotFiniteError)
		}
	}

	pub fn get(self) -> T {
		self.0
	}
}

impl<T> PartialEq for Finite<T>
where
	T: Float,
{
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<T> Eq for Finite<T> where T: Float {}

impl<T> PartialOrd for Finite<T>
where
	T: Float,
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T> Ord for Finite<T>
where
	T: Float,
{
	fn cmp(&self, other: &Self) -> Ordering {
		// Neither value is NaN, so the comparison always succeeds.
		self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
	}
}

impl Hash for Finite<f64> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		// -0.0 and 0.0 compare equal, so they must hash equally too.
		(self.0 + 0.0).to_bits().hash(state);
	}
}

pub trait ToFinite<T>
where
	T: Float,
{
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError>;
}

impl<T> ToFinite<T> for T
where
	T: Float,
{
	fn to_finite(self) -> Result<Finite<T>, NotFiniteError> {
		Finite::new(self)
	}
}

/// Return the finite values of `values` in ascending order. Non-finite values are dropped.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
	let mut values: Vec<Finite<f64>> = values
		.into_iter()
		.filter_map(|value| value.to_finite().ok())
		.collect();
	values.sort_unstable();
	values.into_iter().map(Finite::get).collect()
}

#[test]
fn test_new() {
	assert!(Finite::new(1.0f64).is_ok());
	assert!(Finite::new(f64::NAN).is_err());
	assert!(Finite::new(f64::INFINITY).is_err());
}

#[test]
fn test_sorted_finite() {
	let values = sorted_finite(vec![3.0, f64::NAN, -1.0, 2.0, f64::NEG_INFINITY]);
	assert_eq!(values, vec![-1.0, 2.0, 3.0]);
}
