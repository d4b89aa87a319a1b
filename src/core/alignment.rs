//! Multi-sensor channel alignment.
//!
//! Sensors worn at different body sites are segmented independently, so the
//! same activity can have a different number of rows per sensor. Alignment
//! keeps the activities every sensor has, selects channels from each, trims
//! all of them to the shortest and places them side by side.

use crate::core::{NamedArrays, SegmentedDataset};
use crate::error::{PipelineError, Result};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis, Ix2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Which columns of a sample matrix to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelSelector {
    /// A slice `start:end:step`; open ends default to the matrix edges.
    Range {
        start: Option<usize>,
        end: Option<usize>,
        step: Option<usize>,
    },
    /// An explicit list of column indices, in output order.
    Indices(Vec<usize>),
}

impl Default for ChannelSelector {
    /// Accelerometer and gyroscope axes, skipping the timestamp.
    fn default() -> Self {
        ChannelSelector::Range {
            start: Some(1),
            end: Some(7),
            step: None,
        }
    }
}

impl ChannelSelector {
    /// Every column.
    pub fn all() -> Self {
        ChannelSelector::Range {
            start: None,
            end: None,
            step: None,
        }
    }

    /// Resolve to concrete column indices for a matrix with `columns` columns.
    ///
    /// Ranges clamp to the matrix like slicing does; explicit indices must exist.
    pub fn resolve(&self, columns: usize, label: &str) -> Result<Vec<usize>> {
        match self {
            ChannelSelector::Range { start, end, step } => {
                let step = step.unwrap_or(1);
                if step == 0 {
                    return Err(PipelineError::invalid_parameter("channel step must be positive"));
                }
                let start = start.unwrap_or(0).min(columns);
                let end = end.unwrap_or(columns).min(columns);
                Ok((start..end).step_by(step).collect())
            }
            ChannelSelector::Indices(indices) => {
                if let Some(&column) = indices.iter().find(|&&c| c >= columns) {
                    return Err(PipelineError::ColumnOutOfRange {
                        label: label.to_string(),
                        column,
                        columns,
                    });
                }
                Ok(indices.clone())
            }
        }
    }

    /// Select this selector's columns from `matrix`.
    pub fn select(&self, matrix: ArrayView2<f64>, label: &str) -> Result<Array2<f64>> {
        let indices = self.resolve(matrix.ncols(), label)?;
        Ok(matrix.select(Axis(1), &indices))
    }
}

impl FromStr for ChannelSelector {
    type Err = PipelineError;

    /// Parse `"1:7"`, `"1:7:2"`, `":"` or `"1,2,3"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || PipelineError::invalid_parameter(format!("invalid channel selector '{s}'"));
        let bound = |part: &str| -> Result<Option<usize>> {
            let part = part.trim();
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse().map(Some).map_err(|_| bad())
            }
        };

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            match parts.as_slice() {
                [start, end] => Ok(ChannelSelector::Range {
                    start: bound(start)?,
                    end: bound(end)?,
                    step: None,
                }),
                [start, end, step] => Ok(ChannelSelector::Range {
                    start: bound(start)?,
                    end: bound(end)?,
                    step: bound(step)?,
                }),
                _ => Err(bad()),
            }
        } else {
            s.split(',')
                .map(|c| c.trim().parse::<usize>().map_err(|_| bad()))
                .collect::<Result<Vec<_>>>()
                .map(ChannelSelector::Indices)
        }
    }
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<usize>| v.map(|v| v.to_string()).unwrap_or_default();
        match self {
            ChannelSelector::Range { start, end, step: None } => {
                write!(f, "{}:{}", opt(start), opt(end))
            }
            ChannelSelector::Range { start, end, step } => {
                write!(f, "{}:{}:{}", opt(start), opt(end), opt(step))
            }
            ChannelSelector::Indices(indices) => {
                let list: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
                f.write_str(&list.join(","))
            }
        }
    }
}

impl TryFrom<String> for ChannelSelector {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChannelSelector> for String {
    fn from(selector: ChannelSelector) -> Self {
        selector.to_string()
    }
}

/// An activity left out of the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedActivity {
    pub name: String,
    /// Positions of the inputs that lack this activity
    pub missing_from: Vec<usize>,
}

/// Result of aligning several sensors.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    /// Activities present in every input, channels side by side
    pub merged: SegmentedDataset,
    /// Activities missing from at least one input
    pub dropped: Vec<DroppedActivity>,
}

/// Merge per-activity matrices from several sensors into wider matrices.
///
/// Keeps only activities present in every input, in the order of the first
/// input. For each, `selector` picks channels from every input, all are cut
/// to the shortest row count (a prefix, never resampled) and concatenated
/// along the channel axis in input order.
pub fn align(datasets: &[NamedArrays], selector: &ChannelSelector) -> Result<Alignment> {
    if datasets.is_empty() {
        return Err(PipelineError::invalid_parameter("alignment needs at least one dataset"));
    }

    let mut names: Vec<&String> = Vec::new();
    for dataset in datasets {
        for name in dataset.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut alignment = Alignment::default();
    for name in names {
        let missing_from: Vec<usize> = datasets
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.contains_key(name))
            .map(|(i, _)| i)
            .collect();

        if !missing_from.is_empty() {
            warn!(activity = %name, ?missing_from, "Activity missing from some inputs, dropped");
            alignment.dropped.push(DroppedActivity {
                name: name.clone(),
                missing_from,
            });
            continue;
        }

        let merged = merge_one(datasets, name, selector)?;
        debug!(activity = %name, shape = ?merged.shape(), "Aligned activity");
        alignment.merged.insert(name.clone(), merged);
    }

    Ok(alignment)
}

fn merge_one(
    datasets: &[NamedArrays],
    name: &str,
    selector: &ChannelSelector,
) -> Result<Array2<f64>> {
    let selected = datasets
        .iter()
        .map(|d| {
            let array = &d[name];
            let matrix = array
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|_| PipelineError::NotAMatrix {
                    label: name.to_string(),
                    ndim: array.ndim(),
                })?;
            selector.select(matrix, name)
        })
        .collect::<Result<Vec<_>>>()?;

    let min_len = selected.iter().map(|m| m.nrows()).min().unwrap_or(0);
    let views: Vec<ArrayView2<f64>> = selected.iter().map(|m| m.slice(s![..min_len, ..])).collect();

    concatenate(Axis(1), &views).map_err(|_| {
        let found = views.iter().map(|v| v.nrows()).collect::<Vec<_>>();
        PipelineError::shape_mismatch(name, &[min_len], &found)
    })
}
