use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Starting,
    Generating,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Starting => "starting",
            RunStatus::Generating => "generating",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Status of the active generation run as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub run_id: u64,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub progress_percent: f64,
    pub error_message: Option<String>,
}

impl Default for GenerationRun {
    fn default() -> Self {
        Self::idle()
    }
}

impl GenerationRun {
    pub fn idle() -> Self {
        Self {
            run_id: 0,
            status: RunStatus::Idle,
            started_at: None,
            ended_at: None,
            progress_percent: 0.0,
            error_message: None,
        }
    }

    pub fn starting(run_id: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: RunStatus::Starting,
            started_at: Some(started_at),
            ended_at: None,
            progress_percent: 0.0,
            error_message: None,
        }
    }

    /// Raises progress; lower values are ignored so progress never goes back.
    pub fn advance_progress(&mut self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0);
        if percent > self.progress_percent {
            self.progress_percent = percent;
        }
    }

    pub fn complete(&mut self, ended_at: DateTime<Utc>) {
        self.status = RunStatus::Completed;
        self.ended_at = Some(ended_at);
        self.progress_percent = 100.0;
        self.error_message = None;
    }

    pub fn fail(&mut self, ended_at: DateTime<Utc>, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.ended_at = Some(ended_at);
        self.error_message = Some(message.into());
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let ended = self.ended_at?;
        let millis = (ended - started).num_milliseconds().max(0) as f64;
        Some(round_tenths(millis / 1000.0))
    }
}

pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
