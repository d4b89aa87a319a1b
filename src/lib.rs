//! WPM Segmentation - activity segmentation for body-worn sensor recordings.
//!
//! This library turns continuous inertial recordings into labeled training
//! data for activity recognition, following a fixed nineteen-activity
//! laboratory protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        WPM Segmentation                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────┐  │
//! │  │ CSV + log │──▶│ Segmenter   │──▶│  Aligner  │──▶│ Windows  │  │
//! │  │ (orient)  │   │ (19 acts.)  │   │ (sensors) │   │ (slide)  │  │
//! │  └───────────┘   └─────────────┘   └───────────┘   └──────────┘  │
//! │                         │                               │        │
//! │                         ▼                               ▼        │
//! │                  ┌─────────────┐                 ┌──────────┐    │
//! │                  │  .npz per   │                 │ Labeled  │    │
//! │                  │  activity   │                 │  stack   │    │
//! │                  └─────────────┘                 └──────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use wpm_segmentation::core::{ActivitySchedule, ActivitySegmenter, BodySegment};
//! use wpm_segmentation::io::{load_sample_matrix_csv, save_segmented};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recording = load_sample_matrix_csv("PMP1020_W1_PI.csv")?;
//! let schedule = ActivitySchedule::from_json_file("activity_log.json")?;
//! let oriented = BodySegment::Thigh.orient(recording.view())?;
//!
//! let segmenter = ActivitySegmenter::new(chrono_tz::Europe::Madrid);
//! let segmented = segmenter.segment(&schedule, oriented.view())?;
//! save_segmented("PMP1020_W1_PI_segmented", &segmented)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod report;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, Stage};
pub use core::{
    align, merge_stacks, stack_many, stack_one, window, Activity, ActivitySchedule,
    ActivitySegmenter, BodySegment, ChannelSelector, LabeledStack, SegmentedDataset,
    WindowedDataset,
};
pub use error::{PipelineError, Result};
pub use pipeline::{ExistingOutput, StackOptions};
pub use report::PipelineReport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
