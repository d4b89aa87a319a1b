//! File-to-file pipeline stages.
//!
//! Each stage reads its inputs from disk, runs the core transforms and
//! writes an archive. The stages are also what the CLI subcommands call.

use crate::config::{Config, Stage};
use crate::core::{
    align, merge_stacks, stack_one, to_named_arrays, window, ActivitySchedule, ActivitySegmenter,
    BodySegment, ChannelSelector, LabeledStack, SegmentedDataset,
};
use crate::error::Result;
use crate::io::{load_sample_matrix_csv, load_segmented, load_stack, save_segmented, save_stack};
use crate::report::PipelineReport;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What to do when a stage's output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingOutput {
    /// Leave the file and skip the stage
    #[default]
    Keep,
    /// Run the stage and replace the file
    Overwrite,
}

/// Windowing parameters for the stack stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StackOptions {
    pub window_size: usize,
    pub step_size: Option<usize>,
    pub crop_columns: ChannelSelector,
}

impl StackOptions {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            step_size: None,
            crop_columns: ChannelSelector::default(),
        }
    }

    pub fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = Some(step_size);
        self
    }

    pub fn with_crop_columns(mut self, crop_columns: ChannelSelector) -> Self {
        self.crop_columns = crop_columns;
        self
    }
}

/// Load a CSV recording, orient it for `body_segment` and cut it into activities.
pub fn segment_recording(
    csv_path: impl AsRef<Path>,
    schedule_path: impl AsRef<Path>,
    body_segment: BodySegment,
    segmenter: &ActivitySegmenter,
    report: &mut PipelineReport,
) -> Result<SegmentedDataset> {
    let recording = load_sample_matrix_csv(csv_path)?;
    let schedule = ActivitySchedule::from_json_file(schedule_path)?;
    let oriented = body_segment.orient(recording.view())?;

    let segmented = segmenter.segment(&schedule, oriented.view())?;
    report.record_segmentation(&segmented);
    info!(
        activities = segmented.len(),
        body_segment = %body_segment,
        "Segmentation complete"
    );
    Ok(segmented)
}

/// Segment a CSV recording and save the per-activity archive.
pub fn segment_to_archive(
    csv_path: impl AsRef<Path>,
    schedule_path: impl AsRef<Path>,
    body_segment: BodySegment,
    segmenter: &ActivitySegmenter,
    output: impl AsRef<Path>,
    report: &mut PipelineReport,
) -> Result<PathBuf> {
    let segmented = segment_recording(csv_path, schedule_path, body_segment, segmenter, report)?;
    let path = save_segmented(output, &segmented)?;
    report.record_file(&path);
    Ok(path)
}

/// Load segmented archives, align them, window every activity and stack the windows.
///
/// With several archives (one per body segment) the selected channels are
/// placed side by side before windowing.
pub fn load_concat_window_stack<P: AsRef<Path>>(
    paths: &[P],
    options: &StackOptions,
    report: &mut PipelineReport,
) -> Result<LabeledStack> {
    let datasets = paths
        .iter()
        .map(load_segmented)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let alignment = align(&datasets, &options.crop_columns)?;
    report.record_dropped(&alignment.dropped);

    let merged = to_named_arrays(alignment.merged);
    let windowed = window(&merged, options.window_size, options.step_size)?;
    report.record_windowing(&windowed);

    stack_one(&windowed)
}

/// Load stacked archives and merge them, skipping empty ones.
pub fn merge_stack_files<P: AsRef<Path>>(paths: &[P]) -> Result<LabeledStack> {
    let stacks = paths
        .iter()
        .map(load_stack)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    merge_stacks(stacks)
}

/// Whether a stage writing `output` should run.
fn should_run(output: &Path, existing: ExistingOutput) -> bool {
    if !output.exists() {
        return true;
    }
    match existing {
        ExistingOutput::Overwrite => {
            info!(path = %output.display(), "Output exists, regenerating");
            true
        }
        ExistingOutput::Keep => {
            warn!(path = %output.display(), "Output exists, skipping stage");
            false
        }
    }
}

/// Run the configured stages for one subject and save the run report.
pub fn run(config: &Config, existing: ExistingOutput) -> Result<PipelineReport> {
    config.validate()?;
    let mut report = PipelineReport::new();

    info!(
        subject = %config.project.subject_name,
        stages = ?config.stages,
        run_id = %report.run_id,
        "Starting pipeline run"
    );

    for stage in &config.stages {
        match stage {
            Stage::Segment => {
                let output = config.segmented_path();
                if should_run(&output, existing) {
                    let segmenter = ActivitySegmenter::new(config.segmentation.timezone()?);
                    segment_to_archive(
                        config.recording_path(),
                        config.activity_log_path(),
                        config.segmentation.body_segment,
                        &segmenter,
                        &output,
                        &mut report,
                    )?;
                }
            }
            Stage::Stack => {
                let output = config.stacked_path();
                if should_run(&output, existing) {
                    let options = StackOptions {
                        window_size: config.windowing.window_size,
                        step_size: config.windowing.step_size,
                        crop_columns: config.windowing.crop_columns.clone(),
                    };
                    let inputs = [config.segmented_path()];
                    let stack = load_concat_window_stack(&inputs, &options, &mut report)?;
                    let path = save_stack(&output, &stack)?;
                    report.record_file(path);
                }
            }
        }
        info!(stage = %stage, "Stage finished");
    }

    let report_path = config.report_path();
    report.save(&report_path)?;
    info!(path = %report_path.display(), "Run report saved");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_options_builder() {
        let options = StackOptions::new(250)
            .with_step_size(125)
            .with_crop_columns(ChannelSelector::Indices(vec![1, 2, 3]));
        assert_eq!(options.window_size, 250);
        assert_eq!(options.step_size, Some(125));
        assert_eq!(options.crop_columns.to_string(), "1,2,3");
    }

    #[test]
    fn test_should_run_policy() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(!should_run(file.path(), ExistingOutput::Keep));
        assert!(should_run(file.path(), ExistingOutput::Overwrite));
        assert!(should_run(Path::new("/nonexistent/out.npz"), ExistingOutput::Keep));
    }

    #[test]
    fn test_missing_segmented_archive_is_not_found() {
        let mut report = PipelineReport::new();
        let options = StackOptions::new(4);
        let err = load_concat_window_stack(&["/nonexistent/s_segmented.npz"], &options, &mut report)
            .unwrap_err();
        match err {
            crate::error::PipelineError::Archive(crate::io::ArchiveError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
