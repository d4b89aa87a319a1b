//! Body-segment axis orientation.
//!
//! The device is strapped on differently at each body site, so its raw
//! accelerometer and gyroscope axes are remapped into a common body frame.
//! Columns 1-3 hold the accelerometer and 4-6 the gyroscope.

use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the device is worn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodySegment {
    Thigh,
    Wrist,
    Hip,
}

/// Minimum columns: timestamp plus two triaxial sensors.
const MIN_COLUMNS: usize = 7;

impl BodySegment {
    /// For each body axis, the device axis it comes from and its sign.
    fn axis_map(self) -> [(usize, f64); 3] {
        match self {
            BodySegment::Thigh => [(2, 1.0), (0, -1.0), (1, 1.0)],
            BodySegment::Wrist => [(0, -1.0), (2, 1.0), (1, -1.0)],
            BodySegment::Hip => [(0, -1.0), (2, -1.0), (1, -1.0)],
        }
    }

    /// Return a copy of `matrix` with the inertial axes in the body frame.
    pub fn orient(self, matrix: ArrayView2<f64>) -> Result<Array2<f64>> {
        if matrix.ncols() < MIN_COLUMNS {
            return Err(PipelineError::invalid_parameter(format!(
                "orientation needs at least {MIN_COLUMNS} columns, got {}",
                matrix.ncols()
            )));
        }

        let mut oriented = matrix.to_owned();
        for base in [1, 4] {
            for (axis, (source, sign)) in self.axis_map().into_iter().enumerate() {
                oriented
                    .column_mut(base + axis)
                    .assign(&(&matrix.column(base + source) * sign));
            }
        }
        Ok(oriented)
    }
}

impl fmt::Display for BodySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodySegment::Thigh => "Thigh",
            BodySegment::Wrist => "Wrist",
            BodySegment::Hip => "Hip",
        };
        f.write_str(name)
    }
}

impl FromStr for BodySegment {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "thigh" => Ok(BodySegment::Thigh),
            "wrist" => Ok(BodySegment::Wrist),
            "hip" => Ok(BodySegment::Hip),
            other => Err(PipelineError::invalid_parameter(format!(
                "unknown body segment '{other}' (expected Thigh, Wrist or Hip)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn assert_close(actual: &Array2<f64>, expected: &Array2<f64>) {
        assert_eq!(actual.dim(), expected.dim());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    fn raw() -> Array2<f64> {
        array![
            [1625097600.0, 0.1, 0.4, 0.7, 1.0, 1.3, 1.6, 36.5, 22.0, 70.0, 75.0],
            [1625097601.0, 0.2, 0.5, 0.8, 1.1, 1.4, 1.7, 36.6, 22.1, 71.0, 76.0],
        ]
    }

    #[test]
    fn test_thigh_orientation() {
        let oriented = BodySegment::Thigh.orient(raw().view()).unwrap();
        let expected = array![
            [1625097600.0, 0.7, -0.1, 0.4, 1.6, -1.0, 1.3, 36.5, 22.0, 70.0, 75.0],
            [1625097601.0, 0.8, -0.2, 0.5, 1.7, -1.1, 1.4, 36.6, 22.1, 71.0, 76.0],
        ];
        assert_close(&oriented, &expected);
    }

    #[test]
    fn test_wrist_orientation() {
        let oriented = BodySegment::Wrist.orient(raw().view()).unwrap();
        let expected = array![
            [1625097600.0, -0.1, 0.7, -0.4, -1.0, 1.6, -1.3, 36.5, 22.0, 70.0, 75.0],
            [1625097601.0, -0.2, 0.8, -0.5, -1.1, 1.7, -1.4, 36.6, 22.1, 71.0, 76.0],
        ];
        assert_close(&oriented, &expected);
    }

    #[test]
    fn test_hip_orientation() {
        let oriented = BodySegment::Hip.orient(raw().view()).unwrap();
        let expected = array![
            [1625097600.0, -0.1, -0.7, -0.4, -1.0, -1.6, -1.3, 36.5, 22.0, 70.0, 75.0],
            [1625097601.0, -0.2, -0.8, -0.5, -1.1, -1.7, -1.4, 36.6, 22.1, 71.0, 76.0],
        ];
        assert_close(&oriented, &expected);
    }

    #[test]
    fn test_too_few_columns() {
        let narrow = array![[0.0, 1.0, 2.0, 3.0]];
        assert!(BodySegment::Hip.orient(narrow.view()).is_err());
    }

    #[test]
    fn test_parse_body_segment() {
        assert_eq!("Thigh".parse::<BodySegment>().unwrap(), BodySegment::Thigh);
        assert_eq!("wrist".parse::<BodySegment>().unwrap(), BodySegment::Wrist);
        assert!("ankle".parse::<BodySegment>().is_err());
        assert_eq!(BodySegment::Hip.to_string(), "Hip");
    }
}
