//! Activity schedule: the calendar dates and times of day from the activity log.
//!
//! The schedule is keyed by the raw labels of the activity log spreadsheet
//! (`"Fecha día 1"`, `"YOGA - Hora de inicio"`, ...). Values are either a
//! calendar date or a time of day.

use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleValue {
    Date(NaiveDate),
    Time(NaiveTime),
}

impl ScheduleValue {
    /// Parse a raw activity-log cell.
    ///
    /// Accepts `HH:MM:SS[.f]` and `HH:MM` times, `YYYY-MM-DD` and `DD/MM/YYYY`
    /// dates, and datetimes whose date part is kept (the log stores day dates
    /// as midnight timestamps).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        for fmt in ["%H:%M:%S%.f", "%H:%M"] {
            if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
                return Some(ScheduleValue::Time(t));
            }
        }
        for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
                return Some(ScheduleValue::Date(d));
            }
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(ScheduleValue::Date(dt.date()));
            }
        }
        None
    }

    fn kind(&self) -> &'static str {
        match self {
            ScheduleValue::Date(_) => "date",
            ScheduleValue::Time(_) => "time",
        }
    }
}

/// Dates and times of day keyed by activity-log label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySchedule {
    entries: IndexMap<String, ScheduleValue>,
}

impl ActivitySchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: ScheduleValue) {
        self.entries.insert(key.into(), value);
    }

    /// Insert a calendar date.
    pub fn insert_date(&mut self, key: impl Into<String>, date: NaiveDate) {
        self.insert(key, ScheduleValue::Date(date));
    }

    /// Insert a time of day.
    pub fn insert_time(&mut self, key: impl Into<String>, time: NaiveTime) {
        self.insert(key, ScheduleValue::Time(time));
    }

    /// Build a schedule from raw string cells, failing on the first unparseable value.
    pub fn from_raw<I, K, V>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut schedule = Self::new();
        for (key, raw) in cells {
            let key = key.into();
            let value = ScheduleValue::parse(raw.as_ref()).ok_or_else(|| {
                PipelineError::ScheduleValueFormat {
                    key: key.clone(),
                    value: raw.as_ref().to_string(),
                }
            })?;
            schedule.insert(key, value);
        }
        Ok(schedule)
    }

    /// Parse a flat JSON object of label to raw cell text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cells: IndexMap<String, String> = serde_json::from_str(json)?;
        Self::from_raw(cells)
    }

    /// Read a flat JSON schedule from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Look up a raw value.
    pub fn get(&self, key: &str) -> Option<&ScheduleValue> {
        self.entries.get(key)
    }

    /// Look up a calendar date; absent keys are an error.
    pub fn date(&self, key: &str) -> Result<NaiveDate> {
        match self.require(key)? {
            ScheduleValue::Date(d) => Ok(*d),
            other => Err(PipelineError::ScheduleValueKind {
                key: key.to_string(),
                expected: "date",
                found: other.kind(),
            }),
        }
    }

    /// Look up a time of day; absent keys are an error.
    pub fn time(&self, key: &str) -> Result<NaiveTime> {
        match self.require(key)? {
            ScheduleValue::Time(t) => Ok(*t),
            other => Err(PipelineError::ScheduleValueKind {
                key: key.to_string(),
                expected: "time",
                found: other.kind(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, key: &str) -> Result<&ScheduleValue> {
        self.entries
            .get(key)
            .ok_or_else(|| PipelineError::MissingScheduleKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(
            ScheduleValue::parse("09:47:45"),
            Some(ScheduleValue::Time(NaiveTime::from_hms_opt(9, 47, 45).unwrap()))
        );
        assert_eq!(
            ScheduleValue::parse("13:05"),
            Some(ScheduleValue::Time(NaiveTime::from_hms_opt(13, 5, 0).unwrap()))
        );
        let july_8 = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
        assert_eq!(ScheduleValue::parse("2024-07-08"), Some(ScheduleValue::Date(july_8)));
        assert_eq!(ScheduleValue::parse("08/07/2024"), Some(ScheduleValue::Date(july_8)));
        assert_eq!(
            ScheduleValue::parse("2024-07-08 00:00:00"),
            Some(ScheduleValue::Date(july_8))
        );
        assert_eq!(ScheduleValue::parse("tomorrow"), None);
    }

    #[test]
    fn test_lookup_kinds() {
        let schedule = ActivitySchedule::from_json_str(
            r#"{"Fecha día 1": "2024-07-08", "YOGA - Hora de inicio": "12:36:32"}"#,
        )
        .unwrap();

        assert_eq!(schedule.len(), 2);
        assert!(schedule.date("Fecha día 1").is_ok());
        assert!(schedule.time("YOGA - Hora de inicio").is_ok());

        match schedule.time("Fecha día 1") {
            Err(PipelineError::ScheduleValueKind { expected, found, .. }) => {
                assert_eq!(expected, "time");
                assert_eq!(found, "date");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_is_error() {
        let schedule = ActivitySchedule::new();
        match schedule.date("Fecha día 7") {
            Err(PipelineError::MissingScheduleKey(key)) => assert_eq!(key, "Fecha día 7"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bad_cell_is_error() {
        let json = r#"{"TROTAR - Hora de fin": "soon"}"#;
        let err = ActivitySchedule::from_json_str(json).unwrap_err();
        assert!(matches!(err, PipelineError::ScheduleValueFormat { .. }));
    }

    #[test]
    fn test_non_object_json_is_error() {
        assert!(matches!(
            ActivitySchedule::from_json_str("[1, 2, 3]"),
            Err(PipelineError::Json(_))
        ));
    }
}
