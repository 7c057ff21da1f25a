use crate::grid::GridProgress;
use lodestar_util::EpochProgress;

/// The phases of a training run, in the order they are reported.
#[derive(Clone, Copy, Debug)]
pub enum Progress {
	AnalyzingSchema,
	Loading { bytes_read: u64, total_bytes: u64 },
	Buffered { rows: usize },
	Splitting,
	GridSearchStarted { combinations: usize },
	GridSearch(GridProgress),
	FinalTraining,
	FinalTrainingEpoch(EpochProgress),
	Evaluating,
	ComputingFeatureImportance,
	Persisting,
	RecordingMetadata,
	Completed,
}

impl Progress {
	/// Where this phase sits on the 0 to 100 scale.
	pub fn percent(&self) -> f64 {
		match self {
			Progress::AnalyzingSchema => 10.0,
			Progress::Loading {
				bytes_read,
				total_bytes,
			} => {
				let fraction = if *total_bytes == 0 {
					1.0
				} else {
					(*bytes_read as f64 / *total_bytes as f64).min(1.0)
				};
				10.0 + 20.0 * fraction
			}
			Progress::Buffered { .. } => 30.0,
			Progress::Splitting => 40.0,
			Progress::GridSearchStarted { .. } => 50.0,
			Progress::GridSearch(progress) => 55.0 + 20.0 * progress.fraction(),
			Progress::FinalTraining => 62.0,
			Progress::FinalTrainingEpoch(epoch) => 62.0 + 13.0 * epoch.fraction(),
			Progress::Evaluating => 75.0,
			Progress::ComputingFeatureImportance => 82.0,
			Progress::Persisting => 87.0,
			Progress::RecordingMetadata => 92.0,
			Progress::Completed => 100.0,
		}
	}

	pub fn message(&self) -> String {
		match self {
			Progress::AnalyzingSchema => "analyzing dataset schema".to_owned(),
			Progress::Loading { .. } => "reading rows".to_owned(),
			Progress::Buffered { rows } => format!("buffered {} rows", rows),
			Progress::Splitting => "splitting and computing feature statistics".to_owned(),
			Progress::GridSearchStarted { combinations } => {
				format!("searching {} hyperparameter combinations", combinations)
			}
			Progress::GridSearch(progress) => format!(
				"cross validating combination {} of {}, fold {} of {}",
				progress.combination + 1,
				progress.n_combinations,
				progress.fold + 1,
				progress.n_folds,
			),
			Progress::FinalTraining => "training the final classifier".to_owned(),
			Progress::FinalTrainingEpoch(epoch) => format!(
				"training the final classifier, epoch {} of {}",
				epoch.epoch, epoch.total
			),
			Progress::Evaluating => "evaluating on the validation rows".to_owned(),
			Progress::ComputingFeatureImportance => "computing feature importances".to_owned(),
			Progress::Persisting => "writing the artifact".to_owned(),
			Progress::RecordingMetadata => "recording run metadata".to_owned(),
			Progress::Completed => "done".to_owned(),
		}
	}
}

/**
Forwards progress to an optional `(percent, message)` sink. The reported percent never decreases, and a notification identical to the previous one is not repeated.
*/
pub struct ProgressNotifier<'a> {
	sink: Option<&'a mut dyn FnMut(f64, &str)>,
	last_percent: f64,
	last_message: String,
}

impl<'a> ProgressNotifier<'a> {
	pub fn new(sink: Option<&'a mut dyn FnMut(f64, &str)>) -> ProgressNotifier<'a> {
		ProgressNotifier {
			sink,
			last_percent: 0.0,
			last_message: String::new(),
		}
	}

	pub fn notify(&mut self, progress: Progress) {
		let sink = match self.sink.as_mut() {
			Some(sink) => sink,
			None => return,
		};
		let percent = (progress.percent() * 10.0).round() / 10.0;
		let percent = percent.max(self.last_percent);
		let message = progress.message();
		if percent == self.last_percent && message == self.last_message {
			return;
		}
		sink(percent, &message);
		self.last_percent = percent;
		self.last_message = message;
	}
}

#[test]
fn test_notifier_is_monotonic() {
	let mut reports: Vec<(f64, String)> = Vec::new();
	let mut sink = |percent: f64, message: &str| reports.push((percent, message.to_owned()));
	let mut notifier = ProgressNotifier::new(Some(&mut sink));
	notifier.notify(Progress::AnalyzingSchema);
	notifier.notify(Progress::Loading {
		bytes_read: 50,
		total_bytes: 100,
	});
	notifier.notify(Progress::Loading {
		bytes_read: 50,
		total_bytes: 100,
	});
	notifier.notify(Progress::GridSearch(GridProgress {
		combination: 2,
		n_combinations: 3,
		fold: 2,
		n_folds: 3,
		epoch: None,
	}));
	notifier.notify(Progress::FinalTraining);
	notifier.notify(Progress::Evaluating);
	drop(notifier);
	let percents: Vec<f64> = reports.iter().map(|(percent, _)| *percent).collect();
	assert_eq!(percents, vec![10.0, 20.0, 72.8, 72.8, 75.0]);
	assert_eq!(reports[3].1, "training the final classifier");
}

#[test]
fn test_final_training_epochs() {
	let epoch = |epoch| {
		Progress::FinalTrainingEpoch(EpochProgress {
			epoch,
			total: 4,
			loss: 0.1,
		})
	};
	assert_eq!(epoch(0).percent(), 62.0);
	assert_eq!(epoch(2).percent(), 68.5);
	assert_eq!(epoch(4).percent(), Progress::Evaluating.percent());
	assert_eq!(
		epoch(2).message(),
		"training the final classifier, epoch 2 of 4"
	);
	let mut reports: Vec<(f64, String)> = Vec::new();
	let mut sink = |percent: f64, message: &str| reports.push((percent, message.to_owned()));
	let mut notifier = ProgressNotifier::new(Some(&mut sink));
	notifier.notify(Progress::FinalTraining);
	for i in 1..=4 {
		notifier.notify(epoch(i));
	}
	notifier.notify(Progress::Evaluating);
	drop(notifier);
	let percents: Vec<f64> = reports.iter().map(|(percent, _)| *percent).collect();
	assert_eq!(percents, vec![62.0, 65.3, 68.5, 71.8, 75.0, 75.0]);
}

#[test]
fn test_no_sink() {
	let mut notifier = ProgressNotifier::new(None);
	notifier.notify(Progress::Completed);
}
