use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Skipped,
    Failed,
}

impl RecordStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            RecordStatus::Success => "Success",
            RecordStatus::Skipped => "Skipped",
            RecordStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What happened to a single record during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub record_index: usize,
    pub record_id: String,
    pub status: RecordStatus,
    pub detail: String,
}

impl RecordOutcome {
    pub fn success(record_index: usize, record_id: &str, detail: impl Into<String>) -> Self {
        Self::new(record_index, record_id, RecordStatus::Success, detail)
    }

    pub fn skipped(record_index: usize, record_id: &str, detail: impl Into<String>) -> Self {
        Self::new(record_index, record_id, RecordStatus::Skipped, detail)
    }

    pub fn failed(record_index: usize, record_id: &str, detail: impl Into<String>) -> Self {
        Self::new(record_index, record_id, RecordStatus::Failed, detail)
    }

    fn new(
        record_index: usize,
        record_id: &str,
        status: RecordStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            record_index,
            record_id: record_id.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// Three-way tally of record outcomes for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub success_count: usize,
    pub skip_count: usize,
    pub fail_count: usize,
}

impl Summary {
    pub fn record(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Success => self.success_count += 1,
            RecordStatus::Skipped => self.skip_count += 1,
            RecordStatus::Failed => self.fail_count += 1,
        }
    }

    pub fn status_message(&self) -> String {
        format!(
            "Processing complete: {} succeeded, {} skipped, {} failed",
            self.success_count, self.skip_count, self.fail_count
        )
    }
}
