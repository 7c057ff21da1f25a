use crate::{BranchNode, LeafNode, Node, TrainOptions};
use ndarray::prelude::*;

struct Split {
	feature_index: usize,
	split_value: f64,
	/// Weighted Gini impurity of the two children.
	impurity: f64,
}

pub fn grow(
	features: ArrayView2<f64>,
	labels: ArrayView1<usize>,
	n_classes: usize,
	options: &TrainOptions,
) -> Vec<Node> {
	let mut nodes = Vec::new();
	let mut indices: Vec<usize> = (0..features.nrows()).collect();
	let n_examples = features.nrows();
	grow_node(
		&mut nodes,
		features,
		labels,
		n_classes,
		options,
		&mut indices,
		0,
		n_examples,
	);
	nodes
}

#[allow(clippy::too_many_arguments)]
fn grow_node(
	nodes: &mut Vec<Node>,
	features: ArrayView2<f64>,
	labels: ArrayView1<usize>,
	n_classes: usize,
	options: &TrainOptions,
	indices: &mut [usize],
	depth: usize,
	n_root_examples: usize,
) -> usize {
	let node_index = nodes.len();
	let counts = class_counts(indices.iter().map(|index| labels[*index]), n_classes);
	let n_examples = indices.len();
	let examples_fraction = n_examples as f64 / n_root_examples as f64;
	let parent_impurity = gini(&counts, n_examples);
	let split = if depth >= options.max_depth
		|| n_examples < options.min_samples_split
		|| parent_impurity == 0.0
	{
		None
	} else {
		choose_best_split(features, labels, n_classes, indices)
			.filter(|split| split.impurity <= parent_impurity)
	};
	let split = match split {
		Some(split) => split,
		None => {
			nodes.push(Node::Leaf(LeafNode {
				class_probabilities: counts
					.iter()
					.map(|count| *count as f64 / n_examples as f64)
					.collect(),
				examples_fraction,
			}));
			return node_index;
		}
	};
	// Reserve this node's slot. The child indices are filled in once the children exist.
	nodes.push(Node::Branch(BranchNode {
		left_child_index: 0,
		right_child_index: 0,
		feature_index: split.feature_index,
		split_value: split.split_value,
		examples_fraction,
	}));
	let n_left = partition(indices, |index| {
		features[[index, split.feature_index]] <= split.split_value
	});
	let (left_indices, right_indices) = indices.split_at_mut(n_left);
	let left_child_index = grow_node(
		nodes,
		features,
		labels,
		n_classes,
		options,
		left_indices,
		depth + 1,
		n_root_examples,
	);
	let right_child_index = grow_node(
		nodes,
		features,
		labels,
		n_classes,
		options,
		right_indices,
		depth + 1,
		n_root_examples,
	);
	if let Node::Branch(branch) = &mut nodes[node_index] {
		branch.left_child_index = left_child_index;
		branch.right_child_index = right_child_index;
	}
	node_index
}

/// Try every threshold between consecutive distinct values of every feature. The first split found with the lowest impurity wins.
fn choose_best_split(
	features: ArrayView2<f64>,
	labels: ArrayView1<usize>,
	n_classes: usize,
	indices: &[usize],
) -> Option<Split> {
	let n_examples = indices.len();
	let total_counts = class_counts(indices.iter().map(|index| labels[*index]), n_classes);
	let mut best: Option<Split> = None;
	let mut sorted = indices.to_vec();
	for feature_index in 0..features.ncols() {
		let column = features.column(feature_index);
		sorted.sort_by(|a, b| column[*a].total_cmp(&column[*b]));
		let mut left_counts = vec![0usize; n_classes];
		for position in 0..n_examples - 1 {
			left_counts[labels[sorted[position]]] += 1;
			let value = column[sorted[position]];
			let next_value = column[sorted[position + 1]];
			if value == next_value {
				continue;
			}
			let n_left = position + 1;
			let n_right = n_examples - n_left;
			let right_counts: Vec<usize> = total_counts
				.iter()
				.zip(left_counts.iter())
				.map(|(total, left)| total - left)
				.collect();
			let impurity = (n_left as f64 * gini(&left_counts, n_left)
				+ n_right as f64 * gini(&right_counts, n_right))
				/ n_examples as f64;
			if best.as_ref().map(|best| impurity < best.impurity).unwrap_or(true) {
				best = Some(Split {
					feature_index,
					split_value: value + (next_value - value) / 2.0,
					impurity,
				});
			}
		}
	}
	best
}

fn class_counts(labels: impl Iterator<Item = usize>, n_classes: usize) -> Vec<usize> {
	let mut counts = vec![0; n_classes];
	for label in labels {
		counts[label] += 1;
	}
	counts
}

fn gini(counts: &[usize], n_examples: usize) -> f64 {
	if n_examples == 0 {
		return 0.0;
	}
	let n = n_examples as f64;
	1.0 - counts
		.iter()
		.map(|count| {
			let p = *count as f64 / n;
			p * p
		})
		.sum::<f64>()
}

/// Reorder `indices` so every index for which `predicate` is true comes first, and return how many there are.
fn partition(indices: &mut [usize], predicate: impl Fn(usize) -> bool) -> usize {
	let mut n_true = 0;
	for position in 0..indices.len() {
		if predicate(indices[position]) {
			indices.swap(n_true, position);
			n_true += 1;
		}
	}
	n_true
}

#[test]
fn test_gini() {
	assert_eq!(gini(&[5, 5], 10), 0.5);
	assert_eq!(gini(&[10, 0], 10), 0.0);
	assert_eq!(gini(&[0, 0], 0), 0.0);
}

#[test]
fn test_partition() {
	let mut indices = vec![0, 1, 2, 3, 4, 5];
	let n = partition(&mut indices, |index| index % 2 == 1);
	assert_eq!(n, 3);
	let mut odd = indices[..n].to_vec();
	odd.sort_unstable();
	assert_eq!(odd, vec![1, 3, 5]);
}
