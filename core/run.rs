use crate::Error;
use chrono::{DateTime, Utc};
use lodestar_util::Id;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Pending,
	Running,
	Completed,
	Failed,
}

impl RunStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			RunStatus::Pending => "pending",
			RunStatus::Running => "running",
			RunStatus::Completed => "completed",
			RunStatus::Failed => "failed",
		}
	}

	pub fn is_finished(self) -> bool {
		matches!(self, RunStatus::Completed | RunStatus::Failed)
	}
}

/// One training invocation. A run can no longer change once it has completed or failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
	pub id: Id,
	pub model_id: String,
	pub dataset_id: String,
	pub status: RunStatus,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
	pub artifact_version: Option<String>,
}

impl TrainingRun {
	pub fn new(model_id: impl Into<String>, dataset_id: impl Into<String>) -> TrainingRun {
		TrainingRun {
			id: Id::new(),
			model_id: model_id.into(),
			dataset_id: dataset_id.into(),
			status: RunStatus::Pending,
			created_at: Utc::now(),
			started_at: None,
			finished_at: None,
			error: None,
			artifact_version: None,
		}
	}

	fn ensure_not_finished(&self) -> Result<(), Error> {
		if self.status.is_finished() {
			return Err(Error::RunFinalized {
				run_id: self.id.to_string(),
				status: self.status.as_str().to_owned(),
			});
		}
		Ok(())
	}

	pub fn start(&mut self) -> Result<(), Error> {
		self.ensure_not_finished()?;
		if self.status == RunStatus::Pending {
			self.status = RunStatus::Running;
			self.started_at = Some(Utc::now());
		}
		Ok(())
	}

	pub fn complete(&mut self, artifact_version: impl Into<String>) -> Result<(), Error> {
		self.ensure_not_finished()?;
		self.status = RunStatus::Completed;
		self.finished_at = Some(Utc::now());
		self.artifact_version = Some(artifact_version.into());
		Ok(())
	}

	pub fn fail(&mut self, error: impl Into<String>) -> Result<(), Error> {
		self.ensure_not_finished()?;
		self.status = RunStatus::Failed;
		self.finished_at = Some(Utc::now());
		self.error = Some(error.into());
		Ok(())
	}
}

#[test]
fn test_run_lifecycle() {
	let mut run = TrainingRun::new("churn", "events");
	assert_eq!(run.status, RunStatus::Pending);
	run.start().unwrap();
	assert_eq!(run.status, RunStatus::Running);
	assert!(run.started_at.is_some());
	run.complete("20210304153000").unwrap();
	assert_eq!(run.status, RunStatus::Completed);
	assert_eq!(run.artifact_version.as_deref(), Some("20210304153000"));
	assert!(matches!(run.start(), Err(Error::RunFinalized { .. })));
	assert!(matches!(run.fail("late"), Err(Error::RunFinalized { .. })));
	assert_eq!(run.error, None);
}

#[test]
fn test_run_failure() {
	let mut run = TrainingRun::new("churn", "events");
	run.start().unwrap();
	run.fail("dataset is empty").unwrap();
	assert_eq!(run.status, RunStatus::Failed);
	assert_eq!(run.error.as_deref(), Some("dataset is empty"));
	assert!(matches!(run.complete("x"), Err(Error::RunFinalized { .. })));
}
