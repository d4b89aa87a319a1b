//! Run report.
//!
//! Tracks what each pipeline stage produced and what it left out, so a run
//! can be audited after the fact without re-reading the archives.

use crate::core::{DroppedActivity, EntryOutcome, SegmentedDataset, SkipReason, WindowedDataset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An entry the windowing stage did not produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

/// Counters and skip lists for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub activities_segmented: u64,
    /// Activities whose time range matched no samples
    pub empty_segments: u64,
    pub activities_dropped: u64,
    pub windows_produced: u64,
    pub passed_through: u64,
    pub entries_skipped: u64,
    pub files_written: Vec<PathBuf>,
    pub dropped: Vec<DroppedActivity>,
    pub skipped: Vec<SkippedEntry>,
}

impl PipelineReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            activities_segmented: 0,
            empty_segments: 0,
            activities_dropped: 0,
            windows_produced: 0,
            passed_through: 0,
            entries_skipped: 0,
            files_written: Vec::new(),
            dropped: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Record the output of a segmentation stage.
    pub fn record_segmentation(&mut self, dataset: &SegmentedDataset) {
        self.activities_segmented += dataset.len() as u64;
        self.empty_segments += dataset.values().filter(|m| m.nrows() == 0).count() as u64;
    }

    /// Record activities an alignment left out.
    pub fn record_dropped(&mut self, dropped: &[DroppedActivity]) {
        self.activities_dropped += dropped.len() as u64;
        self.dropped.extend_from_slice(dropped);
    }

    /// Record the per-entry outcomes of a windowing stage.
    pub fn record_windowing(&mut self, windowed: &WindowedDataset) {
        for outcome in &windowed.outcomes {
            match outcome {
                EntryOutcome::Windowed { windows, .. } => self.windows_produced += *windows as u64,
                EntryOutcome::PassedThrough { .. } => self.passed_through += 1,
                EntryOutcome::Skipped { name, reason } => {
                    self.entries_skipped += 1;
                    self.skipped.push(SkippedEntry {
                        name: name.clone(),
                        reason: *reason,
                    });
                }
            }
        }
    }

    pub fn record_file(&mut self, path: impl Into<PathBuf>) {
        self.files_written.push(path.into());
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Run {}:\n\
             - Activities segmented: {}\n\
             - Empty segments: {}\n\
             - Activities dropped at alignment: {}\n\
             - Windows produced: {}\n\
             - Entries passed through: {}\n\
             - Entries skipped: {}\n\
             - Files written: {}",
            self.run_id,
            self.activities_segmented,
            self.empty_segments,
            self.activities_dropped,
            self.windows_produced,
            self.passed_through,
            self.entries_skipped,
            self.files_written.len()
        );
        for dropped in &self.dropped {
            out.push_str(&format!(
                "\n  dropped '{}' (missing from inputs {:?})",
                dropped.name, dropped.missing_from
            ));
        }
        for skipped in &self.skipped {
            out.push_str(&format!("\n  skipped '{}' ({})", skipped.name, skipped.reason));
        }
        out
    }

    /// Save the report as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for PipelineReport {
    fn default() -> Self {
        Self::new()
    }
}
