//! Activity segmentation.
//!
//! Cuts a continuous recording into one sub-matrix per protocol activity,
//! using the boundaries written down in the activity log.

use crate::core::activities::{Activity, ActivityDescriptor, ProtocolDay, ACTIVITY_TABLE};
use crate::core::lookup::extract_between;
use crate::core::schedule::ActivitySchedule;
use crate::core::SegmentedDataset;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use ndarray::ArrayView2;
use tracing::debug;

/// Resolved boundaries of one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBounds {
    pub activity: Activity,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Splits a recording into activities following a fixed protocol table.
#[derive(Debug, Clone)]
pub struct ActivitySegmenter {
    table: &'static [ActivityDescriptor],
    timezone: Tz,
}

impl Default for ActivitySegmenter {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl ActivitySegmenter {
    /// Create a segmenter whose schedule times are wall-clock times in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self {
            table: &ACTIVITY_TABLE,
            timezone,
        }
    }

    /// The activity table this segmenter applies.
    pub fn table(&self) -> &'static [ActivityDescriptor] {
        self.table
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Resolve every activity's start and end instant from the schedule.
    pub fn bounds(&self, schedule: &ActivitySchedule) -> Result<Vec<ActivityBounds>> {
        self.table
            .iter()
            .map(|d| {
                Ok(ActivityBounds {
                    activity: d.activity,
                    start: self.instant(schedule, d.start_day, d.start_time_key)?,
                    end: self.instant(schedule, d.end_day, d.end_time_key)?,
                })
            })
            .collect()
    }

    /// Segment `matrix` into one entry per activity, in table order.
    ///
    /// Every activity is present in the output, even when its slice is empty
    /// or a single row. Missing schedule keys fail the whole call.
    pub fn segment(
        &self,
        schedule: &ActivitySchedule,
        matrix: ArrayView2<f64>,
    ) -> Result<SegmentedDataset> {
        let bounds = self.bounds(schedule)?;

        let mut segmented = SegmentedDataset::with_capacity(bounds.len());
        for b in bounds {
            let data = extract_between(matrix, Some(&b.start), Some(&b.end));
            debug!(
                activity = b.activity.name(),
                rows = data.nrows(),
                "Segmented activity"
            );
            segmented.insert(b.activity.name().to_string(), data);
        }
        Ok(segmented)
    }

    fn instant(
        &self,
        schedule: &ActivitySchedule,
        day: ProtocolDay,
        time_key: &str,
    ) -> Result<DateTime<Tz>> {
        let date = schedule.date(day.date_key())?;
        let time = schedule.time(time_key)?;
        let local = NaiveDateTime::new(date, time);
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| PipelineError::InvalidLocalTime(local.to_string()))
    }
}
