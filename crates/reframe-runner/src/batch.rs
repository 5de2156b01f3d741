use std::path::Path;

use chrono::{DateTime, Utc};
use reframe_core::{LogEntry, RecordOutcome, RecordStatus, RunProgress, Summary, TransformSpec};
use reframe_service::{Downloader, HostStore};
use reframe_transform::ImageTransformer;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::PreconditionError;
use crate::log_buffer::LogBuffer;
use crate::observer::ProgressObserver;
use crate::processor::{ItemEvent, RecordProcessor, RecordReport};

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target: TransformSpec,
    pub summary: Summary,
    pub outcomes: Vec<RecordOutcome>,
    /// Newest first, at most `MAX_LOG_ENTRIES`.
    pub log: Vec<LogEntry>,
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Accumulated state of a run, owned by the run loop.
#[derive(Debug, Default)]
pub struct RunState {
    pub summary: Summary,
    pub progress: RunProgress,
    pub log: LogBuffer,
    pub outcomes: Vec<RecordOutcome>,
}

impl RunState {
    pub fn new(total: usize) -> Self {
        Self {
            progress: RunProgress::new(total),
            ..Default::default()
        }
    }

    pub fn log(&mut self, entry: LogEntry, observer: &dyn ProgressObserver) {
        observer.on_log(&entry);
        self.log.push(entry);
    }

    /// Advance progress, log what happened to the record, then count it.
    pub fn fold(&mut self, report: RecordReport, observer: &dyn ProgressObserver) {
        self.progress.advance();
        observer.on_progress(self.progress.current(), self.progress.total());

        let RecordReport { outcome, items } = report;
        let n = outcome.record_index + 1;
        for item in items {
            let entry = match item {
                ItemEvent::Processed {
                    name,
                    output_name,
                    size_bytes,
                } => LogEntry::info(format!(
                    "Record {n}: {name} -> {output_name} ({size_bytes} bytes)"
                )),
                ItemEvent::NotImage { name } => {
                    LogEntry::warn(format!("Record {n}: skipped non-image attachment {name}"))
                }
                ItemEvent::Failed { name, error } => {
                    LogEntry::error(format!("Record {n}: failed to process {name}: {error}"))
                }
            };
            self.log(entry, observer);
        }

        let message = format!(
            "Record {n} ({}) {}: {}",
            outcome.record_id, outcome.status, outcome.detail
        );
        let entry = match outcome.status {
            RecordStatus::Success => LogEntry::success(message),
            RecordStatus::Skipped => LogEntry::warn(message),
            RecordStatus::Failed => LogEntry::error(message),
        };
        self.log(entry, observer);

        self.summary.record(outcome.status);
        self.outcomes.push(outcome);
    }
}

/// Drives a run: records strictly one after another, in the given order.
pub struct BatchRunner<'a> {
    processor: RecordProcessor<'a>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        store: &'a dyn HostStore,
        downloader: &'a dyn Downloader,
        transformer: &'a dyn ImageTransformer,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            processor: RecordProcessor::new(store, downloader, transformer),
            observer,
        }
    }

    /// Process every record of `record_ids` and return the tally.
    ///
    /// Only a failed precondition aborts; it is reported before any record
    /// is read. Per-record and per-attachment problems are folded into the
    /// summary and the log.
    pub async fn run(
        &self,
        record_ids: &[String],
        source_field: Option<&str>,
        target_field: Option<&str>,
        spec: &TransformSpec,
    ) -> Result<RunReport, PreconditionError> {
        let (source_field, target_field) =
            check_preconditions(record_ids, source_field, target_field)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = record_ids.len();
        info!("run {run_id}: {total} record(s), {source_field} -> {target_field} at {spec}");

        let mut state = RunState::new(total);
        self.observer.on_progress(0, total);
        state.log(
            LogEntry::info(format!("Processing {total} record(s) to {spec}")),
            self.observer,
        );

        for (index, record_id) in record_ids.iter().enumerate() {
            let report = self
                .processor
                .process(index, record_id, source_field, target_field, spec)
                .await;
            state.fold(report, self.observer);
        }

        let summary = state.summary;
        state.log(LogEntry::success(summary.status_message()), self.observer);
        state.progress.reset();
        self.observer
            .on_progress(state.progress.current(), state.progress.total());
        info!("run {run_id}: {}", summary.status_message());

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            target: *spec,
            summary,
            outcomes: state.outcomes,
            log: state.log.to_vec(),
        })
    }
}

fn check_preconditions<'s>(
    record_ids: &[String],
    source_field: Option<&'s str>,
    target_field: Option<&'s str>,
) -> Result<(&'s str, &'s str), PreconditionError> {
    let source = source_field
        .filter(|f| !f.trim().is_empty())
        .ok_or(PreconditionError::MissingSourceField)?;
    let target = target_field
        .filter(|f| !f.trim().is_empty())
        .ok_or(PreconditionError::MissingTargetField)?;
    if record_ids.is_empty() {
        return Err(PreconditionError::EmptyRecordSet);
    }
    Ok((source, target))
}
