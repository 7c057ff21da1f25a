/*!
This module resolves the free-form hyperparameter mapping a caller supplies into a fully populated [`Hyperparameters`](struct.Hyperparameters.html). Resolution never fails. Values may arrive as numbers, numeric strings, or booleans, every numeric value is clamped to the bounds of its key, and anything unusable falls back to the default with a log event.

| key | default | bounds |
|---|---|---|
| `learning_rate` | 0.01 | [0.0001, 1] |
| `iterations` | 500 | [100, 5000] |
| `batch_size` | 128 | [1, 10000] |
| `l2_penalty` | 0.0001 | [0, 1] |
| `validation_split` | 0.2 | [0.1, 0.5] |
| `cv_folds` | 3 | [1, 10] |
| `cv_validation_split` | 0.25 | [0.1, 0.5] |
| `k` | 5 | [1, 21] |
| `max_depth` | 10 | [2, 20] |
| `min_samples_split` | 2 | [2, 100] |
| `var_smoothing` | 1e-9 | [1e-12, 1] |
| `cost` | 1 | [0.0001, 1000] |
| `tolerance` | 0.001 | [0.00001, 0.5] |
| `cache_size` | 100 | [1, 4096] |
| `gamma` | `1 / n_features` | [0.0001, 10] |
| `degree` | 3 | [1, 10] |
| `coef0` | 0 | [-10, 10] |
| `max_grid_combinations` | 64 | [1, 512] |
*/

use crate::ModelType;
use lodestar_features::{ImputerStrategy, Normalization};
use lodestar_svm::KernelType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A single normalized hyperparameter value, as it appears in a search grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValue {
	Bool(bool),
	Number(f64),
	Text(String),
}

impl std::fmt::Display for GridValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			GridValue::Bool(value) => write!(f, "{}", value),
			GridValue::Number(value) => write!(f, "{}", value),
			GridValue::Text(value) => write!(f, "{}", value),
		}
	}
}

/// A hyperparameter search grid, mapping each key to the values to try.
pub type SearchGrid = BTreeMap<String, Vec<GridValue>>;

/// Keys that may appear in `search_grid`.
pub const GRID_KEYS: &[&str] = &[
	"batch_size",
	"cache_size",
	"coef0",
	"cost",
	"degree",
	"early_stopping",
	"gamma",
	"imputer_fill_value",
	"imputer_strategy",
	"iterations",
	"k",
	"kernel",
	"l2_penalty",
	"learning_rate",
	"max_depth",
	"min_samples_split",
	"normalization",
	"probability",
	"shrinking",
	"tolerance",
	"var_smoothing",
	"weighted",
];

const MAX_HIDDEN_LAYERS: usize = 4;
const MAX_HIDDEN_UNITS: f64 = 256.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
	pub model_type: ModelType,
	pub learning_rate: f64,
	pub iterations: usize,
	pub batch_size: usize,
	pub l2_penalty: f64,
	pub early_stopping: bool,
	pub validation_split: f64,
	pub cv_folds: usize,
	pub cv_validation_split: f64,
	pub k: usize,
	pub weighted: bool,
	pub max_depth: usize,
	pub min_samples_split: usize,
	pub var_smoothing: f64,
	pub hidden_layers: Vec<usize>,
	pub cost: f64,
	pub tolerance: f64,
	pub cache_size: f64,
	pub kernel: KernelType,
	/// `None` means `1 / n_features`.
	pub gamma: Option<f64>,
	pub degree: usize,
	pub coef0: f64,
	pub shrinking: bool,
	pub probability: bool,
	pub imputer_strategy: ImputerStrategy,
	pub imputer_fill_value: f64,
	pub normalization: Normalization,
	pub max_grid_combinations: usize,
	pub seed: u64,
	pub search_grid: SearchGrid,
}

impl Default for Hyperparameters {
	fn default() -> Self {
		Self {
			model_type: ModelType::LogisticRegression,
			learning_rate: 0.01,
			iterations: 500,
			batch_size: 128,
			l2_penalty: 0.0001,
			early_stopping: true,
			validation_split: 0.2,
			cv_folds: 3,
			cv_validation_split: 0.25,
			k: 5,
			weighted: false,
			max_depth: 10,
			min_samples_split: 2,
			var_smoothing: 1e-9,
			hidden_layers: vec![16],
			cost: 1.0,
			tolerance: 0.001,
			cache_size: 100.0,
			kernel: KernelType::Rbf,
			gamma: None,
			degree: 3,
			coef0: 0.0,
			shrinking: true,
			probability: false,
			imputer_strategy: ImputerStrategy::Mean,
			imputer_fill_value: 0.0,
			normalization: Normalization::None,
			max_grid_combinations: 64,
			seed: 42,
			search_grid: SearchGrid::new(),
		}
	}
}

#[derive(Clone, Copy)]
enum Kind {
	Float { min: f64, max: f64 },
	Integer { min: f64, max: f64 },
	Flag,
	Choice(fn(&str) -> Option<&'static str>),
}

fn kind(key: &str) -> Option<Kind> {
	let kind = match key {
		"learning_rate" => Kind::Float {
			min: 0.0001,
			max: 1.0,
		},
		"iterations" => Kind::Integer {
			min: 100.0,
			max: 5000.0,
		},
		"batch_size" => Kind::Integer {
			min: 1.0,
			max: 10000.0,
		},
		"l2_penalty" => Kind::Float { min: 0.0, max: 1.0 },
		"validation_split" | "cv_validation_split" => Kind::Float { min: 0.1, max: 0.5 },
		"cv_folds" => Kind::Integer {
			min: 1.0,
			max: 10.0,
		},
		"k" => Kind::Integer {
			min: 1.0,
			max: 21.0,
		},
		"max_depth" => Kind::Integer {
			min: 2.0,
			max: 20.0,
		},
		"min_samples_split" => Kind::Integer {
			min: 2.0,
			max: 100.0,
		},
		"var_smoothing" => Kind::Float {
			min: 1e-12,
			max: 1.0,
		},
		"cost" => Kind::Float {
			min: 0.0001,
			max: 1000.0,
		},
		"tolerance" => Kind::Float {
			min: 0.00001,
			max: 0.5,
		},
		"cache_size" => Kind::Float {
			min: 1.0,
			max: 4096.0,
		},
		"gamma" => Kind::Float {
			min: 0.0001,
			max: 10.0,
		},
		"degree" => Kind::Integer {
			min: 1.0,
			max: 10.0,
		},
		"coef0" => Kind::Float {
			min: -10.0,
			max: 10.0,
		},
		"imputer_fill_value" => Kind::Float {
			min: f64::MIN,
			max: f64::MAX,
		},
		"max_grid_combinations" => Kind::Integer {
			min: 1.0,
			max: 512.0,
		},
		"early_stopping" | "weighted" | "shrinking" | "probability" => Kind::Flag,
		"kernel" => Kind::Choice(kernel_name),
		"imputer_strategy" => Kind::Choice(imputer_strategy_name),
		"normalization" => Kind::Choice(normalization_name),
		_ => return None,
	};
	Some(kind)
}

fn kernel_name(value: &str) -> Option<&'static str> {
	KernelType::parse(value).map(KernelType::as_str)
}

fn imputer_strategy_name(value: &str) -> Option<&'static str> {
	value.parse::<ImputerStrategy>().ok().map(ImputerStrategy::as_str)
}

fn normalization_name(value: &str) -> Option<&'static str> {
	value.parse::<Normalization>().ok().map(Normalization::as_str)
}

fn number(value: &Value) -> Option<f64> {
	let number = match value {
		Value::Number(number) => number.as_f64(),
		Value::String(string) => string.trim().parse::<f64>().ok(),
		Value::Bool(true) => Some(1.0),
		Value::Bool(false) => Some(0.0),
		_ => None,
	};
	number.filter(|number| number.is_finite())
}

fn boolean(value: &Value) -> Option<bool> {
	match value {
		Value::Bool(value) => Some(*value),
		Value::Number(number) => number.as_f64().map(|number| number != 0.0),
		Value::String(string) => match string.trim().to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => Some(true),
			"false" | "0" | "no" | "off" => Some(false),
			_ => None,
		},
		_ => None,
	}
}

fn coerce(kind: Kind, value: &Value) -> Option<GridValue> {
	match kind {
		Kind::Float { min, max } => number(value).map(|value| GridValue::Number(value.clamp(min, max))),
		Kind::Integer { min, max } => {
			number(value).map(|value| GridValue::Number(value.round().clamp(min, max)))
		}
		Kind::Flag => boolean(value).map(GridValue::Bool),
		Kind::Choice(canonical) => value
			.as_str()
			.and_then(|value| canonical(&value.trim().to_lowercase()))
			.map(|value| GridValue::Text(value.to_owned())),
	}
}

impl Hyperparameters {
	/// Resolve a raw mapping into a complete set of hyperparameters.
	pub fn resolve(raw: &Map<String, Value>) -> Hyperparameters {
		let mut hyperparameters = Hyperparameters::default();
		for (key, value) in raw {
			match key.as_str() {
				"model_type" => match value.as_str().and_then(ModelType::parse) {
					Some(model_type) => hyperparameters.model_type = model_type,
					None => warn!(
						%value,
						default = hyperparameters.model_type.as_str(),
						"unknown model type, using the default"
					),
				},
				"hidden_layers" => match hidden_layers(value) {
					Some(hidden_layers) => hyperparameters.hidden_layers = hidden_layers,
					None => warn!(%value, "invalid hidden_layers, using the default"),
				},
				"gamma" if value.as_str().map(|value| value.trim() == "auto") == Some(true) => {
					hyperparameters.gamma = None;
				}
				"seed" => match number(value).filter(|seed| *seed >= 0.0) {
					Some(seed) => hyperparameters.seed = seed as u64,
					None => warn!(%value, "invalid seed, using the default"),
				},
				"search_grid" => hyperparameters.search_grid = normalize_search_grid(value),
				key => match kind(key) {
					Some(kind) => match coerce(kind, value) {
						Some(value) => {
							hyperparameters.set(key, &value);
						}
						None => warn!(key, %value, "invalid hyperparameter value, using the default"),
					},
					None => debug!(key, "ignoring unknown hyperparameter"),
				},
			}
		}
		hyperparameters
	}

	/// Set one hyperparameter from a normalized value. Returns false if the key is unknown or the value has the wrong type.
	pub fn set(&mut self, key: &str, value: &GridValue) -> bool {
		match (key, value) {
			("learning_rate", GridValue::Number(value)) => self.learning_rate = *value,
			("iterations", GridValue::Number(value)) => self.iterations = *value as usize,
			("batch_size", GridValue::Number(value)) => self.batch_size = *value as usize,
			("l2_penalty", GridValue::Number(value)) => self.l2_penalty = *value,
			("early_stopping", GridValue::Bool(value)) => self.early_stopping = *value,
			("validation_split", GridValue::Number(value)) => self.validation_split = *value,
			("cv_folds", GridValue::Number(value)) => self.cv_folds = *value as usize,
			("cv_validation_split", GridValue::Number(value)) => self.cv_validation_split = *value,
			("k", GridValue::Number(value)) => self.k = *value as usize,
			("weighted", GridValue::Bool(value)) => self.weighted = *value,
			("max_depth", GridValue::Number(value)) => self.max_depth = *value as usize,
			("min_samples_split", GridValue::Number(value)) => {
				self.min_samples_split = *value as usize
			}
			("var_smoothing", GridValue::Number(value)) => self.var_smoothing = *value,
			("cost", GridValue::Number(value)) => self.cost = *value,
			("tolerance", GridValue::Number(value)) => self.tolerance = *value,
			("cache_size", GridValue::Number(value)) => self.cache_size = *value,
			("kernel", GridValue::Text(value)) => match KernelType::parse(value) {
				Some(kernel) => self.kernel = kernel,
				None => return false,
			},
			("gamma", GridValue::Number(value)) => self.gamma = Some(*value),
			("degree", GridValue::Number(value)) => self.degree = *value as usize,
			("coef0", GridValue::Number(value)) => self.coef0 = *value,
			("shrinking", GridValue::Bool(value)) => self.shrinking = *value,
			("probability", GridValue::Bool(value)) => self.probability = *value,
			("imputer_strategy", GridValue::Text(value)) => match value.parse() {
				Ok(strategy) => self.imputer_strategy = strategy,
				Err(_) => return false,
			},
			("imputer_fill_value", GridValue::Number(value)) => self.imputer_fill_value = *value,
			("normalization", GridValue::Text(value)) => match value.parse() {
				Ok(normalization) => self.normalization = normalization,
				Err(_) => return false,
			},
			("max_grid_combinations", GridValue::Number(value)) => {
				self.max_grid_combinations = *value as usize
			}
			_ => return false,
		}
		true
	}

	/// A copy of these hyperparameters with every override applied.
	pub fn with_overrides(&self, overrides: &BTreeMap<String, GridValue>) -> Hyperparameters {
		let mut hyperparameters = self.clone();
		for (key, value) in overrides {
			if !hyperparameters.set(key, value) {
				debug!(key = key.as_str(), %value, "ignoring override");
			}
		}
		hyperparameters
	}
}

fn hidden_layers(value: &Value) -> Option<Vec<usize>> {
	let units: Vec<f64> = match value {
		Value::Array(values) => values.iter().filter_map(number).collect(),
		Value::String(string) => string
			.split(',')
			.filter_map(|unit| unit.trim().parse::<f64>().ok())
			.filter(|unit| unit.is_finite())
			.collect(),
		value => number(value).into_iter().collect(),
	};
	let layers: Vec<usize> = units
		.into_iter()
		.take(MAX_HIDDEN_LAYERS)
		.map(|units| units.round().clamp(1.0, MAX_HIDDEN_UNITS) as usize)
		.collect();
	if layers.is_empty() {
		None
	} else {
		Some(layers)
	}
}

/// Drop entries that are not arrays, are empty, or belong to keys that cannot be searched. Coerce every value and remove duplicates, keeping the first occurrence.
pub fn normalize_search_grid(value: &Value) -> SearchGrid {
	let mut grid = SearchGrid::new();
	let entries = match value {
		Value::Object(entries) => entries,
		Value::Null => return grid,
		_ => {
			warn!("search_grid is not a mapping, ignoring it");
			return grid;
		}
	};
	for (key, values) in entries {
		let kind = match kind(key) {
			Some(kind) if GRID_KEYS.contains(&key.as_str()) => kind,
			_ => {
				debug!(key = key.as_str(), "dropping search grid entry for a key that cannot be searched");
				continue;
			}
		};
		let values = match values {
			Value::Array(values) => values,
			_ => {
				debug!(key = key.as_str(), "dropping search grid entry that is not an array");
				continue;
			}
		};
		let mut normalized: Vec<GridValue> = Vec::new();
		for value in values {
			match coerce(kind, value) {
				Some(value) if !normalized.contains(&value) => normalized.push(value),
				Some(_) => {}
				None => debug!(key = key.as_str(), %value, "dropping search grid value"),
			}
		}
		if normalized.is_empty() {
			debug!(key = key.as_str(), "dropping empty search grid entry");
			continue;
		}
		grid.insert(key.clone(), normalized);
	}
	grid
}

#[cfg(test)]
fn resolve(value: Value) -> Hyperparameters {
	match value {
		Value::Object(map) => Hyperparameters::resolve(&map),
		_ => unreachable!(),
	}
}

#[test]
fn test_defaults() {
	let hyperparameters = Hyperparameters::resolve(&Map::new());
	assert_eq!(hyperparameters, Hyperparameters::default());
	assert_eq!(hyperparameters.model_type, ModelType::LogisticRegression);
	assert_eq!(hyperparameters.cv_folds, 3);
	assert_eq!(hyperparameters.gamma, None);
}

#[test]
fn test_clamping_and_coercion() {
	let hyperparameters = resolve(serde_json::json!({
		"model_type": "SVM",
		"learning_rate": 5,
		"iterations": 10,
		"k": "50",
		"max_depth": 1.4,
		"validation_split": 0.9,
		"early_stopping": "false",
		"gamma": 100,
		"cost": "abc",
		"kernel": "Poly",
		"probability": 1,
		"normalization": "L2",
		"not_a_key": 3,
	}));
	assert_eq!(hyperparameters.model_type, ModelType::SupportVectorClassifier);
	assert_eq!(hyperparameters.learning_rate, 1.0);
	assert_eq!(hyperparameters.iterations, 100);
	assert_eq!(hyperparameters.k, 21);
	assert_eq!(hyperparameters.max_depth, 2);
	assert_eq!(hyperparameters.validation_split, 0.5);
	assert!(!hyperparameters.early_stopping);
	assert_eq!(hyperparameters.gamma, Some(10.0));
	assert_eq!(hyperparameters.cost, 1.0);
	assert_eq!(hyperparameters.kernel, KernelType::Polynomial);
	assert!(hyperparameters.probability);
	assert_eq!(hyperparameters.normalization, Normalization::L2);
}

#[test]
fn test_unknown_model_type() {
	let hyperparameters = resolve(serde_json::json!({ "model_type": "random_forest", "gamma": "auto" }));
	assert_eq!(hyperparameters.model_type, ModelType::LogisticRegression);
	assert_eq!(hyperparameters.gamma, None);
}

#[test]
fn test_hidden_layers() {
	let hyperparameters = resolve(serde_json::json!({ "hidden_layers": [0, 300, 32, "8", 4, 2] }));
	assert_eq!(hyperparameters.hidden_layers, vec![1, 256, 32, 8]);
	let hyperparameters = resolve(serde_json::json!({ "hidden_layers": "32, 16" }));
	assert_eq!(hyperparameters.hidden_layers, vec![32, 16]);
	let hyperparameters = resolve(serde_json::json!({ "hidden_layers": [] }));
	assert_eq!(hyperparameters.hidden_layers, vec![16]);
}

#[test]
fn test_search_grid() {
	let hyperparameters = resolve(serde_json::json!({
		"search_grid": {
			"k": [3, "5", 3, 50, "x"],
			"kernel": ["RBF", "poly", "bogus", "rbf"],
			"cost": 1,
			"max_depth": [],
			"model_type": ["knn"],
			"nonsense": [1],
			"shrinking": ["yes", true, "no"],
		}
	}));
	assert_eq!(
		hyperparameters.search_grid,
		maplit::btreemap! {
			"k".to_owned() => vec![GridValue::Number(3.0), GridValue::Number(5.0), GridValue::Number(21.0)],
			"kernel".to_owned() => vec![GridValue::Text("rbf".to_owned()), GridValue::Text("polynomial".to_owned())],
			"shrinking".to_owned() => vec![GridValue::Bool(true), GridValue::Bool(false)],
		}
	);
}

#[test]
fn test_with_overrides() {
	let hyperparameters = Hyperparameters::default();
	let overridden = hyperparameters.with_overrides(&maplit::btreemap! {
		"k".to_owned() => GridValue::Number(7.0),
		"kernel".to_owned() => GridValue::Text("linear".to_owned()),
		"model_type".to_owned() => GridValue::Text("knn".to_owned()),
	});
	assert_eq!(overridden.k, 7);
	assert_eq!(overridden.kernel, KernelType::Linear);
	assert_eq!(overridden.model_type, ModelType::LogisticRegression);
}
