/*!
The memory guard. Resident memory is sampled through a [`MemoryMonitor`](trait.MemoryMonitor.html), and when it exceeds the limit the training split is halved with [`downsample`](fn.downsample.html).
*/

use lodestar_dataframe::RowBuffer;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeMap;
use sysinfo::{Pid, System};

pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 500;

pub trait MemoryMonitor {
	/// The resident set size of this process in bytes, if it can be measured.
	fn resident_bytes(&mut self) -> Option<u64>;
}

/// Reads the resident memory of the current process from the operating system.
pub struct SystemMemoryMonitor {
	system: System,
	pid: Pid,
}

impl SystemMemoryMonitor {
	pub fn new() -> SystemMemoryMonitor {
		SystemMemoryMonitor {
			system: System::new(),
			pid: Pid::from_u32(std::process::id()),
		}
	}
}

impl Default for SystemMemoryMonitor {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryMonitor for SystemMemoryMonitor {
	fn resident_bytes(&mut self) -> Option<u64> {
		self.system.refresh_process(self.pid);
		self.system.process(self.pid).map(|process| process.memory())
	}
}

/// A monitor that always reports the same reading.
#[derive(Clone, Copy, Debug)]
pub struct FixedMemoryMonitor(pub u64);

impl MemoryMonitor for FixedMemoryMonitor {
	fn resident_bytes(&mut self) -> Option<u64> {
		Some(self.0)
	}
}

/// True if the monitor reports more than `limit_mb` megabytes. A monitor that cannot measure never trips the guard.
pub fn is_over_limit(monitor: &mut dyn MemoryMonitor, limit_mb: u64) -> bool {
	monitor
		.resident_bytes()
		.map(|bytes| bytes > limit_mb.saturating_mul(1024 * 1024))
		.unwrap_or(false)
}

/**
Keep `ceil(n / 2)` rows of `buffer`, chosen uniformly without replacement within each label class. Each class keeps a share proportional to its size, with leftover rows going to the classes with the largest remainders, so the class ratio is preserved. The kept rows stay in their original order.
*/
pub fn downsample(buffer: &RowBuffer, seed: u64) -> RowBuffer {
	let n = buffer.len();
	let target = (n + 1) / 2;
	let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
	for (index, label) in buffer.labels().iter().enumerate() {
		classes.entry(*label).or_default().push(index);
	}
	// Largest remainder allocation of `target` rows across the classes.
	let mut quotas: Vec<(usize, usize)> = classes
		.values()
		.map(|indices| {
			let exact = indices.len() * target;
			(exact / n.max(1), exact % n.max(1))
		})
		.collect();
	let allocated: usize = quotas.iter().map(|(quota, _)| quota).sum();
	let mut order: Vec<usize> = (0..quotas.len()).collect();
	order.sort_by(|a, b| quotas[*b].1.cmp(&quotas[*a].1));
	for class in order.into_iter().take(target - allocated) {
		quotas[class].0 += 1;
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	let mut kept: Vec<usize> = Vec::with_capacity(target);
	for ((_, indices), (quota, _)) in classes.iter_mut().zip(quotas.iter()) {
		indices.shuffle(&mut rng);
		kept.extend_from_slice(&indices[..*quota]);
	}
	kept.sort_unstable();
	buffer.select(&kept)
}

#[cfg(test)]
fn imbalanced(n_negative: usize, n_positive: usize) -> RowBuffer {
	let n = n_negative + n_positive;
	let features = ndarray::Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
	let labels = (0..n)
		.map(|i| if i < n_negative { 0 } else { 1 })
		.collect();
	RowBuffer::from_rows(vec!["x".to_owned()], features, labels).unwrap()
}

#[test]
fn test_downsample_keeps_class_ratio() {
	let buffer = imbalanced(70, 31);
	let downsampled = downsample(&buffer, 42);
	assert_eq!(downsampled.len(), 51);
	let positives = downsampled.labels().iter().filter(|label| **label == 1).count();
	assert_eq!(positives, 16);
	let original_ratio = 31.0 / 101.0;
	let ratio = positives as f64 / 51.0;
	assert!((ratio - original_ratio).abs() / original_ratio < 0.1);
	// Rows are a subset of the original, in order, with no repeats.
	let values: Vec<f64> = downsampled.features().column(0).to_vec();
	assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_downsample_is_seeded() {
	let buffer = imbalanced(10, 10);
	let a = downsample(&buffer, 1);
	let b = downsample(&buffer, 1);
	assert_eq!(a.features(), b.features());
	assert_eq!(a.len(), 10);
}

#[test]
fn test_is_over_limit() {
	assert!(is_over_limit(&mut FixedMemoryMonitor(600 * 1024 * 1024), 500));
	assert!(!is_over_limit(&mut FixedMemoryMonitor(100 * 1024 * 1024), 500));
}
