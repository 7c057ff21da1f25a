/*!
This crate implements a CART decision tree classifier. Each branch compares one feature with a threshold, chosen to minimize the weighted [Gini impurity](https://en.wikipedia.org/wiki/Decision_tree_learning#Gini_impurity) of the two children. Leaves hold the class distribution of the training examples that reached them, which is returned as the predicted probabilities.
*/

use lodestar_util::FitError;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

mod train;

/// These are the options passed to `DecisionTree::train`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
	/// The depth of the tree will never exceed this value. The root has depth 0.
	pub max_depth: usize,
	/// A node with fewer training examples than this is not split.
	pub min_samples_split: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			max_depth: 10,
			min_samples_split: 2,
		}
	}
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is the first node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
	pub nodes: Vec<Node>,
	n_features: usize,
	n_classes: usize,
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

/// An example is sent to the left child if its value for `feature_index` is <= `split_value`, and to the right child otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchNode {
	/// This is the index in the tree's node vector for this node's left child.
	pub left_child_index: usize,
	/// This is the index in the tree's node vector for this node's right child.
	pub right_child_index: usize,
	pub feature_index: usize,
	pub split_value: f64,
	/// The fraction of training examples that passed through this node.
	pub examples_fraction: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
	/// (n_classes)
	pub class_probabilities: Vec<f64>,
	/// The fraction of training examples that were sent to this leaf.
	pub examples_fraction: f64,
}

impl DecisionTree {
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<usize>,
		n_classes: usize,
		options: &TrainOptions,
	) -> Result<DecisionTree, FitError> {
		FitError::check_labels(labels.iter(), 2)?;
		if let Some(label) = labels.iter().find(|label| **label >= n_classes) {
			return Err(FitError::TooFewClasses {
				n_classes: label + 1,
			});
		}
		let nodes = train::grow(features, labels, n_classes, options);
		Ok(DecisionTree {
			nodes,
			n_features: features.ncols(),
			n_classes,
		})
	}

	pub fn n_features(&self) -> usize {
		self.n_features
	}

	pub fn depth(&self) -> usize {
		fn depth(nodes: &[Node], index: usize) -> usize {
			match &nodes[index] {
				Node::Leaf(_) => 0,
				Node::Branch(branch) => {
					1 + depth(nodes, branch.left_child_index).max(depth(nodes, branch.right_child_index))
				}
			}
		}
		if self.nodes.is_empty() {
			0
		} else {
			depth(&self.nodes, 0)
		}
	}

	/// Find the leaf an example is sent to.
	fn leaf(&self, example: ArrayView1<f64>) -> Option<&LeafNode> {
		let mut node_index = 0;
		loop {
			match self.nodes.get(node_index)? {
				Node::Branch(BranchNode {
					left_child_index,
					right_child_index,
					feature_index,
					split_value,
					..
				}) => {
					node_index = if example[*feature_index] <= *split_value {
						*left_child_index
					} else {
						*right_child_index
					};
				}
				Node::Leaf(leaf) => return Some(leaf),
			}
		}
	}

	/// (n_examples, n_classes)
	pub fn predict_probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
		let mut probabilities = Array2::zeros((features.nrows(), self.n_classes));
		for (example, mut probabilities) in features.rows().into_iter().zip(probabilities.rows_mut()) {
			if let Some(leaf) = self.leaf(example) {
				probabilities.assign(&ArrayView1::from(leaf.class_probabilities.as_slice()));
			}
		}
		probabilities
	}
}

#[test]
fn test_xor() {
	let features = array![
		[0.0, 0.0],
		[0.0, 1.0],
		[1.0, 0.0],
		[1.0, 1.0],
		[0.1, 0.1],
		[0.1, 0.9],
		[0.9, 0.1],
		[0.9, 0.9]
	];
	let labels = array![0, 1, 1, 0, 0, 1, 1, 0];
	let tree =
		DecisionTree::train(features.view(), labels.view(), 2, &TrainOptions::default()).unwrap();
	let probabilities = tree.predict_probabilities(features.view());
	for (row, label) in probabilities.rows().into_iter().zip(labels.iter()) {
		assert_eq!(row[*label], 1.0);
	}
	// No single threshold separates xor, so the root split gains nothing.
	assert!(tree.depth() >= 2);
}

#[test]
fn test_max_depth() {
	let features = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
	let labels = Array1::from_shape_fn(40, |i| (i / 5) % 2);
	let options = TrainOptions {
		max_depth: 2,
		min_samples_split: 2,
	};
	let tree = DecisionTree::train(features.view(), labels.view(), 2, &options).unwrap();
	assert!(tree.depth() <= 2);
	let probabilities = tree.predict_probabilities(features.view());
	for row in probabilities.rows() {
		assert!((row.sum() - 1.0).abs() < 1e-12);
	}
}

#[test]
fn test_min_samples_split() {
	let features = array![[0.0], [1.0], [2.0], [3.0]];
	let labels = array![0, 1, 0, 1];
	let options = TrainOptions {
		max_depth: 10,
		min_samples_split: 5,
	};
	let tree = DecisionTree::train(features.view(), labels.view(), 2, &options).unwrap();
	assert_eq!(tree.nodes.len(), 1);
	let probabilities = tree.predict_probabilities(array![[7.0]].view());
	assert_eq!(probabilities.row(0).to_vec(), vec![0.5, 0.5]);
}
