//! Labeled stacking of windowed datasets.
//!
//! A stack is the vertical concatenation of every entry's windows along
//! axis 0, with one label per row naming the activity it came from.

use crate::core::windowing::WindowedDataset;
use crate::error::{PipelineError, Result};
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, IxDyn};
use tracing::{debug, info};

/// Stacked windows with a parallel label sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStack {
    /// Rows along axis 0; an empty stack has shape `[0]`
    pub data: ArrayD<f64>,
    /// One label per row of `data`
    pub labels: Vec<String>,
}

impl Default for LabeledStack {
    fn default() -> Self {
        Self::empty()
    }
}

impl LabeledStack {
    pub fn empty() -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(&[0])),
            labels: Vec::new(),
        }
    }

    /// Pair `data` with `labels`, checking there is one label per row.
    pub fn new(data: ArrayD<f64>, labels: Vec<String>) -> Result<Self> {
        let rows = data.shape().first().copied().unwrap_or(0);
        if data.ndim() == 0 || rows != labels.len() {
            return Err(PipelineError::shape_mismatch("labels", &[rows], &[labels.len()]));
        }
        Ok(Self { data, labels })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the stack holds no elements at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape of one row (everything past axis 0).
    pub fn row_shape(&self) -> &[usize] {
        self.data.shape().get(1..).unwrap_or(&[])
    }
}

/// A labeled block waiting to be concatenated.
struct Part<'a> {
    label: String,
    data: ArrayViewD<'a, f64>,
}

/// Concatenate `parts` along axis 0, repeating each label once per row.
fn concat_parts(parts: Vec<Part<'_>>, labels: Vec<String>) -> Result<LabeledStack> {
    let Some(first) = parts.first() else {
        return Ok(LabeledStack::empty());
    };

    let expected = first.data.shape()[1..].to_vec();
    for part in &parts {
        let found = &part.data.shape()[1..];
        if part.data.ndim() != first.data.ndim() || found != expected.as_slice() {
            return Err(PipelineError::shape_mismatch(part.label.as_str(), &expected, found));
        }
    }

    let views: Vec<ArrayViewD<'_, f64>> = parts.iter().map(|p| p.data.view()).collect();
    let data = concatenate(Axis(0), &views)
        .map_err(|_| PipelineError::shape_mismatch(first.label.as_str(), &expected, &expected))?;

    LabeledStack::new(data, labels)
}

/// Queue every entry of `dataset`, one label per row.
fn collect_parts<'a>(
    dataset: &'a WindowedDataset,
    parts: &mut Vec<Part<'a>>,
    labels: &mut Vec<String>,
) {
    // Zero-row entries still go through the trailing-shape check.
    for (name, entry) in &dataset.entries {
        labels.extend(std::iter::repeat(name.clone()).take(entry.len()));
        parts.push(Part {
            label: name.clone(),
            data: entry.view_dyn(),
        });
    }
}

/// Stack every entry of one windowed dataset.
pub fn stack_one(dataset: &WindowedDataset) -> Result<LabeledStack> {
    stack_many(std::slice::from_ref(dataset))
}

/// Stack the entries of several windowed datasets, in order.
///
/// Every entry must share the same trailing dimensions as the first one;
/// a mismatch fails with [`PipelineError::ShapeMismatch`] naming the entry.
pub fn stack_many(datasets: &[WindowedDataset]) -> Result<LabeledStack> {
    let mut parts = Vec::new();
    let mut labels = Vec::new();
    for dataset in datasets {
        collect_parts(dataset, &mut parts, &mut labels);
    }

    let stack = concat_parts(parts, labels)?;
    info!(rows = stack.len(), shape = ?stack.data.shape(), "Stacked windowed data");
    Ok(stack)
}

/// Merge previously stacked pairs, dropping pairs with no elements.
pub fn merge_stacks(stacks: Vec<LabeledStack>) -> Result<LabeledStack> {
    let total = stacks.len();
    let kept: Vec<LabeledStack> = stacks.into_iter().filter(|s| !s.is_empty()).collect();
    if kept.len() < total {
        debug!(dropped = total - kept.len(), "Empty stacks left out of merge");
    }

    for stack in &kept {
        if stack.data.ndim() == 0 || stack.data.shape()[0] != stack.labels.len() {
            return Err(PipelineError::shape_mismatch(
                "labels",
                &[stack.data.shape().first().copied().unwrap_or(0)],
                &[stack.labels.len()],
            ));
        }
    }

    let labels: Vec<String> = kept.iter().flat_map(|s| s.labels.iter().cloned()).collect();
    let parts = kept
        .iter()
        .enumerate()
        .map(|(i, s)| Part {
            label: format!("stack {i}"),
            data: s.data.view(),
        })
        .collect();

    let merged = concat_parts(parts, labels)?;
    info!(inputs = total, rows = merged.len(), "Merged stacks");
    Ok(merged)
}
