//! This module contains the main entrypoint to the lodestar cli.

use self::progress_view::ProgressView;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use lodestar_core::{
	ArtifactStore, Config, LocalDatasetStorage, TrainRequest, TrainSettings, TrainingArtifact,
	TrainingRun,
};
use lodestar_dataframe::ColumnMapping;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod progress_view;

#[derive(Parser)]
#[clap(
	about = "Train classifiers on tabular event data.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "train")]
	Train(TrainOptions),
}

#[derive(Parser, Debug)]
#[clap(about = "train a classifier")]
#[clap(long_about = "train a classifier from a csv file and write a versioned artifact")]
struct TrainOptions {
	#[clap(short, long, help = "the path to your .csv file")]
	file: PathBuf,
	#[clap(short, long, help = "the name of the column to predict")]
	label: Option<String>,
	#[clap(long, help = "the name of the latitude column")]
	latitude: Option<String>,
	#[clap(long, help = "the name of the longitude column")]
	longitude: Option<String>,
	#[clap(long, help = "the name of the timestamp column")]
	timestamp: Option<String>,
	#[clap(long, help = "the name of the category column")]
	category: Option<String>,
	#[clap(
		long = "feature",
		help = "a numeric column to use as a feature, may be repeated",
		multiple_occurrences = true
	)]
	features: Vec<String>,
	#[clap(short, long, help = "the path to a yaml config file")]
	config: Option<PathBuf>,
	#[clap(long, help = "hyperparameters as a json object")]
	hyperparameters: Option<String>,
	#[clap(long, help = "the id to version the model under, defaults to the file name")]
	model_id: Option<String>,
	#[clap(short, long, help = "the directory to write artifacts to")]
	output: Option<PathBuf>,
	#[clap(long = "no-progress", help = "disable the progress line")]
	no_progress: bool,
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();
	let options = Options::parse();
	let result = match options {
		Options::Train(options) => cli_train(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_train(options: TrainOptions) -> Result<()> {
	let config = match options.config.as_deref() {
		Some(path) => Config::from_path(path)?,
		None => Config::default(),
	};
	let columns = column_mapping(&options, config.columns.as_ref())?;
	let hyperparameters = hyperparameters(&options, config.hyperparameters.as_ref())?;
	let dataset_id = options
		.file
		.file_name()
		.and_then(|name| name.to_str())
		.ok_or_else(|| anyhow!("{} is not a file path", options.file.display()))?
		.to_owned();
	let dataset_dir = match options.file.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
		_ => PathBuf::from("."),
	};
	let model_id = match options.model_id.clone() {
		Some(model_id) => model_id,
		None => options
			.file
			.file_stem()
			.and_then(|stem| stem.to_str())
			.map(|stem| stem.to_owned())
			.ok_or_else(|| anyhow!("pass --model-id, the file name is not valid utf-8"))?,
	};
	let output_dir = options
		.output
		.clone()
		.or_else(|| config.artifact_dir.clone())
		.unwrap_or_else(|| PathBuf::from("artifacts"));
	let request = TrainRequest {
		model_id: model_id.clone(),
		dataset_id: dataset_id.clone(),
		columns,
		hyperparameters,
		settings: TrainSettings::from_config(&config),
	};
	let storage = LocalDatasetStorage::new(dataset_dir);
	let store = ArtifactStore::new(output_dir);
	let mut run = TrainingRun::new(model_id, dataset_id);
	let result = if options.no_progress {
		lodestar_core::train(&request, &storage, &store, &mut run, None)
	} else {
		let mut progress_view = ProgressView::new();
		let mut sink = |percent: f64, message: &str| progress_view.update(percent, message);
		lodestar_core::train(&request, &storage, &store, &mut run, Some(&mut sink))
	};
	let artifact = result.with_context(|| format!("training run {} failed", run.id))?;
	print_summary(&artifact, store.root());
	Ok(())
}

/// The config file's column mapping with any column flags applied on top.
fn column_mapping(options: &TrainOptions, config: Option<&ColumnMapping>) -> Result<ColumnMapping> {
	let mut columns = config.cloned().unwrap_or_default();
	if let Some(label) = options.label.as_ref() {
		columns.label = label.clone();
	}
	if columns.label.is_empty() {
		bail!("pass --label or set columns.label in the config file");
	}
	let flags = [
		(&mut columns.latitude, &options.latitude),
		(&mut columns.longitude, &options.longitude),
		(&mut columns.timestamp, &options.timestamp),
		(&mut columns.category, &options.category),
	];
	for (column, flag) in flags {
		if flag.is_some() {
			*column = flag.clone();
		}
	}
	if !options.features.is_empty() {
		columns.features = options.features.clone();
	}
	Ok(columns)
}

/// The config file's hyperparameters with the `--hyperparameters` json merged over them.
fn hyperparameters(
	options: &TrainOptions,
	config: Option<&Map<String, Value>>,
) -> Result<Map<String, Value>> {
	let mut hyperparameters = config.cloned().unwrap_or_default();
	if let Some(json) = options.hyperparameters.as_deref() {
		let value: Value =
			serde_json::from_str(json).context("--hyperparameters is not valid json")?;
		match value {
			Value::Object(overrides) => hyperparameters.extend(overrides),
			_ => bail!("--hyperparameters must be a json object"),
		}
	}
	Ok(hyperparameters)
}

fn print_summary(artifact: &TrainingArtifact, root: &Path) {
	let metrics = &artifact.metrics;
	eprintln!();
	eprintln!(
		"{} {} version {}",
		"Trained".green().bold(),
		artifact.model_type,
		artifact.version
	);
	eprintln!(
		"  rows: {} train, {} validation{}",
		artifact.train_count,
		artifact.validation_count,
		if artifact.downsampled {
			" (downsampled)"
		} else {
			""
		}
	);
	if metrics.on_training_rows {
		eprintln!(
			"  {}",
			"too few rows to hold out, metrics are on the training rows".yellow()
		);
	}
	eprintln!("  accuracy: {:.4}", metrics.accuracy);
	eprintln!(
		"  macro f1: {:.4}",
		metrics.classification.macro_average.f1_score
	);
	if let Some(auc) = metrics.auc {
		eprintln!("  auc: {:.4}", auc);
	}
	if !artifact.grid_search.best.is_empty() {
		let best: Vec<String> = artifact
			.grid_search
			.best
			.iter()
			.map(|(key, value)| format!("{}={}", key, value))
			.collect();
		eprintln!(
			"  best of {} combinations: {}",
			artifact.grid_search.evaluated,
			best.join(", ")
		);
	}
	if !artifact.feature_importances.is_empty() {
		eprintln!("  feature importances:");
		for importance in artifact.feature_importances.iter() {
			eprintln!("    {:<24} {:.4}", importance.name, importance.contribution);
		}
	}
	eprintln!(
		"Your model was written to {}.",
		root.join(&artifact.model_file).display()
	);
}
