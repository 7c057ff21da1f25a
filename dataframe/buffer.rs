use crate::LoadError;
use ndarray::prelude::*;
use std::collections::BTreeSet;

/// An append only matrix of feature rows with one integer label per row. Missing feature values are stored as NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct RowBuffer {
	feature_names: Vec<String>,
	features: Array2<f64>,
	labels: Vec<i64>,
}

impl RowBuffer {
	pub fn new(feature_names: Vec<String>) -> Self {
		let n_features = feature_names.len();
		Self {
			feature_names,
			features: Array2::zeros((0, n_features)),
			labels: Vec::new(),
		}
	}

	pub fn from_rows(
		feature_names: Vec<String>,
		features: Array2<f64>,
		labels: Vec<i64>,
	) -> Result<Self, LoadError> {
		if features.ncols() != feature_names.len() {
			return Err(LoadError::RowWidth {
				expected: feature_names.len(),
				actual: features.ncols(),
			});
		}
		if features.nrows() != labels.len() {
			return Err(LoadError::LabelCount {
				rows: features.nrows(),
				labels: labels.len(),
			});
		}
		Ok(Self {
			feature_names,
			features,
			labels,
		})
	}

	pub fn push(&mut self, row: &[f64], label: i64) -> Result<(), LoadError> {
		self.features
			.push_row(ArrayView1::from(row))
			.map_err(|_| LoadError::RowWidth {
				expected: self.feature_names.len(),
				actual: row.len(),
			})?;
		self.labels.push(label);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.labels.len()
	}

	pub fn is_empty(&self) -> bool {
		self.labels.is_empty()
	}

	pub fn n_features(&self) -> usize {
		self.feature_names.len()
	}

	pub fn feature_names(&self) -> &[String] {
		&self.feature_names
	}

	pub fn features(&self) -> ArrayView2<f64> {
		self.features.view()
	}

	pub fn labels(&self) -> &[i64] {
		&self.labels
	}

	pub fn row(&self, index: usize) -> ArrayView1<f64> {
		self.features.row(index)
	}

	/// The distinct label values in ascending order.
	pub fn classes(&self) -> Vec<i64> {
		self.labels
			.iter()
			.copied()
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	/// Copy the rows at `indices`, in that order, into a new buffer.
	pub fn select(&self, indices: &[usize]) -> RowBuffer {
		RowBuffer {
			feature_names: self.feature_names.clone(),
			features: self.features.select(Axis(0), indices),
			labels: indices.iter().map(|index| self.labels[*index]).collect(),
		}
	}

	pub fn into_parts(self) -> (Vec<String>, Array2<f64>, Vec<i64>) {
		(self.feature_names, self.features, self.labels)
	}
}

#[test]
fn test_push_and_select() {
	let mut buffer = RowBuffer::new(vec!["a".to_owned(), "b".to_owned()]);
	buffer.push(&[1.0, 2.0], 0).unwrap();
	buffer.push(&[3.0, f64::NAN], 1).unwrap();
	buffer.push(&[5.0, 6.0], 1).unwrap();
	assert_eq!(buffer.len(), 3);
	assert!(buffer.push(&[1.0], 0).is_err());
	assert_eq!(buffer.len(), 3);
	assert_eq!(buffer.classes(), vec![0, 1]);
	let selected = buffer.select(&[2, 0]);
	assert_eq!(selected.labels(), &[1, 0]);
	assert_eq!(selected.features(), array![[5.0, 6.0], [1.0, 2.0]]);
	assert!(buffer.row(1)[1].is_nan());
}

#[test]
fn test_from_rows_checks_shape() {
	let names = vec!["a".to_owned()];
	assert!(RowBuffer::from_rows(names.clone(), Array2::zeros((2, 2)), vec![0, 1]).is_err());
	assert!(RowBuffer::from_rows(names.clone(), Array2::zeros((2, 1)), vec![0]).is_err());
	assert!(RowBuffer::from_rows(names, Array2::zeros((2, 1)), vec![0, 1]).is_ok());
}
