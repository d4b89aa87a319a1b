//! Sliding-window generation over per-activity matrices.
//!
//! Each activity matrix is cut into fixed-length windows of `window_size`
//! samples, starting every `step_size` samples. Windows are returned
//! channel-major: shape `(num_windows, channels, window_size)`.

use crate::core::NamedArrays;
use crate::error::{PipelineError, Result};
use indexmap::IndexMap;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayViewD, Ix2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A windowed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowedEntry {
    /// Windows stacked as `(num_windows, channels, window_size)`
    Windows(Array3<f64>),
    /// A matrix with no more rows than one window, passed through untouched
    PassThrough(Array2<f64>),
}

impl WindowedEntry {
    /// Number of rows this entry contributes to a stack.
    pub fn len(&self) -> usize {
        match self {
            WindowedEntry::Windows(w) => w.len_of(ndarray::Axis(0)),
            WindowedEntry::PassThrough(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            WindowedEntry::Windows(w) => w.shape(),
            WindowedEntry::PassThrough(m) => m.shape(),
        }
    }

    /// Dimension-erased view for stacking.
    pub fn view_dyn(&self) -> ArrayViewD<'_, f64> {
        match self {
            WindowedEntry::Windows(w) => w.view().into_dyn(),
            WindowedEntry::PassThrough(m) => m.view().into_dyn(),
        }
    }
}

/// Why an entry was left out of the windowed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Only 2-D sample matrices can be windowed
    UnsupportedDimensions(usize),
    /// The window arithmetic yielded no complete window
    NoCompleteWindow,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnsupportedDimensions(ndim) => write!(f, "unsupported dimensions: {ndim}D"),
            SkipReason::NoCompleteWindow => write!(f, "too short for windowing"),
        }
    }
}

/// What happened to one input entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Windowed { name: String, windows: usize },
    PassedThrough { name: String, rows: usize },
    Skipped { name: String, reason: SkipReason },
}

impl EntryOutcome {
    pub fn name(&self) -> &str {
        match self {
            EntryOutcome::Windowed { name, .. }
            | EntryOutcome::PassedThrough { name, .. }
            | EntryOutcome::Skipped { name, .. } => name,
        }
    }
}

/// Windowed activities plus the outcome of every input entry.
#[derive(Debug, Clone, Default)]
pub struct WindowedDataset {
    /// Produced entries, in input order; skipped entries are absent
    pub entries: IndexMap<String, WindowedEntry>,
    /// One outcome per input entry, in input order
    pub outcomes: Vec<EntryOutcome>,
}

impl WindowedDataset {
    /// Build a dataset from already windowed entries.
    pub fn from_entries(entries: IndexMap<String, WindowedEntry>) -> Self {
        let outcomes = entries
            .iter()
            .map(|(name, entry)| match entry {
                WindowedEntry::Windows(w) => EntryOutcome::Windowed {
                    name: name.clone(),
                    windows: w.len_of(ndarray::Axis(0)),
                },
                WindowedEntry::PassThrough(m) => EntryOutcome::PassedThrough {
                    name: name.clone(),
                    rows: m.nrows(),
                },
            })
            .collect();
        Self { entries, outcomes }
    }

    /// Entries that were dropped, with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            EntryOutcome::Skipped { name, reason } => Some((name.as_str(), *reason)),
            _ => None,
        })
    }

    /// Total number of windows produced.
    pub fn window_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                EntryOutcome::Windowed { windows, .. } => *windows,
                _ => 0,
            })
            .sum()
    }
}

/// Number of complete windows over `rows` samples.
pub fn window_count(rows: usize, window_size: usize, step_size: usize) -> usize {
    if rows < window_size || step_size == 0 {
        return 0;
    }
    (rows - window_size) / step_size + 1
}

/// Cut `matrix` into windows `[i * step, i * step + window_size)`, channel-major.
fn windows_of(
    matrix: ArrayView2<f64>,
    window_size: usize,
    step_size: usize,
    count: usize,
) -> Array3<f64> {
    let mut windows = Array3::zeros((count, matrix.ncols(), window_size));
    for (i, mut window) in windows.outer_iter_mut().enumerate() {
        let start = i * step_size;
        window.assign(&matrix.slice(s![start..start + window_size, ..]).t());
    }
    windows
}

/// Apply sliding windows to every entry of `datasets`.
///
/// `step_size` defaults to `window_size` (no overlap). Per entry:
/// - matrices with at most `window_size` rows are passed through unchanged,
/// - other matrices become `(num_windows, channels, window_size)` stacks,
/// - arrays that are not 2-D are dropped.
///
/// Drops are reported in [`WindowedDataset::outcomes`], never raised.
pub fn window(
    datasets: &NamedArrays,
    window_size: usize,
    step_size: Option<usize>,
) -> Result<WindowedDataset> {
    let step_size = step_size.unwrap_or(window_size);
    if window_size == 0 {
        return Err(PipelineError::invalid_parameter("window size must be positive"));
    }
    if step_size == 0 {
        return Err(PipelineError::invalid_parameter("step size must be positive"));
    }

    let mut windowed = WindowedDataset::default();
    for (name, array) in datasets {
        let matrix = match array.view().into_dimensionality::<Ix2>() {
            Ok(m) => m,
            Err(_) => {
                warn!(
                    activity = %name,
                    ndim = array.ndim(),
                    "Unsupported dimensions, entry dropped"
                );
                windowed.outcomes.push(EntryOutcome::Skipped {
                    name: name.clone(),
                    reason: SkipReason::UnsupportedDimensions(array.ndim()),
                });
                continue;
            }
        };

        if matrix.nrows() <= window_size {
            debug!(
                activity = %name,
                rows = matrix.nrows(),
                "Not enough data for windowing, passed through"
            );
            windowed
                .entries
                .insert(name.clone(), WindowedEntry::PassThrough(matrix.to_owned()));
            windowed.outcomes.push(EntryOutcome::PassedThrough {
                name: name.clone(),
                rows: matrix.nrows(),
            });
            continue;
        }

        let count = window_count(matrix.nrows(), window_size, step_size);
        if count == 0 {
            warn!(activity = %name, "Too short for windowing, entry dropped");
            windowed.outcomes.push(EntryOutcome::Skipped {
                name: name.clone(),
                reason: SkipReason::NoCompleteWindow,
            });
            continue;
        }

        let windows = windows_of(matrix, window_size, step_size, count);
        debug!(activity = %name, shape = ?windows.shape(), "Windowing applied");
        windowed.entries.insert(name.clone(), WindowedEntry::Windows(windows));
        windowed.outcomes.push(EntryOutcome::Windowed {
            name: name.clone(),
            windows: count,
        });
    }

    info!(
        entries = windowed.entries.len(),
        windows = windowed.window_count(),
        skipped = windowed.skipped().count(),
        "Windowing complete"
    );
    Ok(windowed)
}
