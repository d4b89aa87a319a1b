//! Core pipeline stages.
//!
//! This module contains:
//! - Timestamp lookup and range extraction
//! - The activity protocol table and the schedule it reads
//! - Activity segmentation, multi-sensor channel alignment
//! - Sliding-window generation and labeled stacking

pub mod activities;
pub mod alignment;
pub mod lookup;
pub mod orientation;
pub mod schedule;
pub mod segmentation;
pub mod stacking;
pub mod windowing;

use indexmap::IndexMap;
use ndarray::{Array2, ArrayD};

/// One row per sample; column 0 is a millisecond timestamp, the rest are channels.
pub type SampleMatrix = Array2<f64>;

/// Per-activity slices of a recording, in activity order.
pub type SegmentedDataset = IndexMap<String, Array2<f64>>;

/// Named arrays of any dimensionality, in insertion order.
pub type NamedArrays = IndexMap<String, ArrayD<f64>>;

// Re-export commonly used types
pub use activities::{Activity, ActivityDescriptor, ProtocolDay, ACTIVITY_TABLE};
pub use alignment::{align, Alignment, ChannelSelector, DroppedActivity};
pub use lookup::{extract_between, extract_range, find_closest_timestamp};
pub use orientation::BodySegment;
pub use schedule::{ActivitySchedule, ScheduleValue};
pub use segmentation::{ActivityBounds, ActivitySegmenter};
pub use stacking::{merge_stacks, stack_many, stack_one, LabeledStack};
pub use windowing::{window, EntryOutcome, SkipReason, WindowedDataset, WindowedEntry};

/// Widen a segmented dataset to dimension-erased arrays.
pub fn to_named_arrays(dataset: SegmentedDataset) -> NamedArrays {
    dataset
        .into_iter()
        .map(|(name, matrix)| (name, matrix.into_dyn()))
        .collect()
}
