use crate::Kernel;
use fnv::FnvHashMap;
use ndarray::prelude::*;
use std::rc::Rc;

/**
A `KernelCache` holds rows of the kernel matrix of the training examples. Its size is bounded in megabytes. When it is full, the least recently used row is evicted.
*/
pub struct KernelCache<'a> {
	features: ArrayView2<'a, f64>,
	kernel: Kernel,
	capacity: usize,
	rows: FnvHashMap<usize, (Rc<[f64]>, u64)>,
	clock: u64,
	hits: u64,
	misses: u64,
}

impl<'a> KernelCache<'a> {
	pub fn new(features: ArrayView2<'a, f64>, kernel: Kernel, cache_size_mb: f64) -> KernelCache<'a> {
		let row_bytes = (features.nrows() * std::mem::size_of::<f64>()).max(1);
		let budget_bytes = (cache_size_mb.max(0.0) * 1024.0 * 1024.0) as usize;
		// SMO always needs the two rows of the pair being optimized.
		let capacity = (budget_bytes / row_bytes).max(2);
		KernelCache {
			features,
			kernel,
			capacity,
			rows: FnvHashMap::default(),
			clock: 0,
			hits: 0,
			misses: 0,
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// `(hits, misses)`
	pub fn stats(&self) -> (u64, u64) {
		(self.hits, self.misses)
	}

	/// The kernel values between example `index` and every training example.
	pub fn row(&mut self, index: usize) -> Rc<[f64]> {
		self.clock += 1;
		if let Some((row, last_used)) = self.rows.get_mut(&index) {
			*last_used = self.clock;
			self.hits += 1;
			return row.clone();
		}
		self.misses += 1;
		if self.rows.len() >= self.capacity {
			let least_recently_used = self
				.rows
				.iter()
				.min_by_key(|(_, (_, last_used))| *last_used)
				.map(|(index, _)| *index);
			if let Some(least_recently_used) = least_recently_used {
				self.rows.remove(&least_recently_used);
			}
		}
		let example = self.features.row(index);
		let row: Rc<[f64]> = self
			.features
			.rows()
			.into_iter()
			.map(|other| self.kernel.compute(example, other))
			.collect();
		self.rows.insert(index, (row.clone(), self.clock));
		row
	}
}

#[test]
fn test_eviction() {
	let features = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
	// A budget too small for even one row still keeps two.
	let mut cache = KernelCache::new(features.view(), Kernel::Linear, 0.0);
	assert_eq!(cache.capacity(), 2);
	assert_eq!(&*cache.row(1), &[0.0, 1.0, 2.0, 3.0]);
	cache.row(2);
	cache.row(1);
	// Row 2 is the least recently used, so loading row 3 evicts it.
	cache.row(3);
	cache.row(1);
	assert_eq!(cache.stats(), (2, 3));
	cache.row(2);
	assert_eq!(cache.stats(), (2, 4));
}
