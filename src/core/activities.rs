//! The fixed activity protocol.
//!
//! Participants perform nineteen activities over a seven-day protocol. The
//! first four happen in the lab on day 1, fourteen more on day 7, and the
//! unstructured activity spans the whole protocol from day 1 to day 7.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar day of the protocol a boundary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolDay {
    Day1,
    Day7,
}

impl ProtocolDay {
    /// Schedule key holding this day's calendar date.
    pub const fn date_key(self) -> &'static str {
        match self {
            ProtocolDay::Day1 => "Fecha día 1",
            ProtocolDay::Day7 => "Fecha día 7",
        }
    }
}

/// A protocol activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    RestWithK5,
    Treadmill,
    SitToStand30s,
    IncrementalCycleErgometer,
    Yoga,
    SittingWatchingTv,
    SittingReading,
    SittingUsingPc,
    StandingUsingPc,
    StandingFoldingTowels,
    StandingMovingBooks,
    StandingSweeping,
    WalkingUsualSpeed,
    WalkingWithPhoneOrBook,
    WalkingWithShopping,
    WalkingZigzag,
    Jogging,
    Stairs,
    Unstructured,
}

impl Activity {
    /// All activities in protocol order.
    pub const ALL: [Activity; 19] = [
        Activity::RestWithK5,
        Activity::Treadmill,
        Activity::SitToStand30s,
        Activity::IncrementalCycleErgometer,
        Activity::Yoga,
        Activity::SittingWatchingTv,
        Activity::SittingReading,
        Activity::SittingUsingPc,
        Activity::StandingUsingPc,
        Activity::StandingFoldingTowels,
        Activity::StandingMovingBooks,
        Activity::StandingSweeping,
        Activity::WalkingUsualSpeed,
        Activity::WalkingWithPhoneOrBook,
        Activity::WalkingWithShopping,
        Activity::WalkingZigzag,
        Activity::Jogging,
        Activity::Stairs,
        Activity::Unstructured,
    ];

    /// The timed, supervised activities; everything except the unstructured one.
    ///
    /// Per-activity plots cover only these eighteen, while segmentation
    /// always emits all nineteen.
    pub const STRUCTURED: [Activity; 18] = [
        Activity::RestWithK5,
        Activity::Treadmill,
        Activity::SitToStand30s,
        Activity::IncrementalCycleErgometer,
        Activity::Yoga,
        Activity::SittingWatchingTv,
        Activity::SittingReading,
        Activity::SittingUsingPc,
        Activity::StandingUsingPc,
        Activity::StandingFoldingTowels,
        Activity::StandingMovingBooks,
        Activity::StandingSweeping,
        Activity::WalkingUsualSpeed,
        Activity::WalkingWithPhoneOrBook,
        Activity::WalkingWithShopping,
        Activity::WalkingZigzag,
        Activity::Jogging,
        Activity::Stairs,
    ];

    /// Label used in activity logs and archives.
    pub const fn name(self) -> &'static str {
        match self {
            Activity::RestWithK5 => "FASE REPOSO CON K5",
            Activity::Treadmill => "TAPIZ RODANTE",
            Activity::SitToStand30s => "SIT TO STAND 30 s",
            Activity::IncrementalCycleErgometer => "INCREMENTAL CICLOERGOMETRO",
            Activity::Yoga => "YOGA",
            Activity::SittingWatchingTv => "SENTADO VIENDO LA TV",
            Activity::SittingReading => "SENTADO LEYENDO",
            Activity::SittingUsingPc => "SENTADO USANDO PC",
            Activity::StandingUsingPc => "DE PIE USANDO PC",
            Activity::StandingFoldingTowels => "DE PIE DOBLANDO TOALLAS",
            Activity::StandingMovingBooks => "DE PIE MOVIENDO LIBROS",
            Activity::StandingSweeping => "DE PIE BARRIENDO",
            Activity::WalkingUsualSpeed => "CAMINAR USUAL SPEED",
            Activity::WalkingWithPhoneOrBook => "CAMINAR CON MÓVIL O LIBRO",
            Activity::WalkingWithShopping => "CAMINAR CON LA COMPRA",
            Activity::WalkingZigzag => "CAMINAR ZIGZAG",
            Activity::Jogging => "TROTAR",
            Activity::Stairs => "SUBIR Y BAJAR ESCALERAS",
            Activity::Unstructured => "ACTIVIDAD NO ESTRUCTURADA",
        }
    }

    /// Descriptor of this activity in the protocol table.
    pub fn descriptor(self) -> &'static ActivityDescriptor {
        // ACTIVITY_TABLE is indexed in the same order as `ALL`.
        &ACTIVITY_TABLE[self as usize]
    }

    /// Whether this is one of the timed, supervised activities.
    pub fn is_structured(self) -> bool {
        self != Activity::Unstructured
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a label names no known activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActivity(pub String);

impl fmt::Display for UnknownActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown activity '{}'", self.0)
    }
}

impl std::error::Error for UnknownActivity {}

impl FromStr for Activity {
    type Err = UnknownActivity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activity::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownActivity(s.to_string()))
    }
}

/// Where an activity's boundaries live in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityDescriptor {
    pub activity: Activity,
    /// Schedule key of the start time of day
    pub start_time_key: &'static str,
    /// Schedule key of the end time of day
    pub end_time_key: &'static str,
    /// Day whose date is combined with the start time
    pub start_day: ProtocolDay,
    /// Day whose date is combined with the end time
    pub end_day: ProtocolDay,
}

const fn same_day(
    activity: Activity,
    start_time_key: &'static str,
    end_time_key: &'static str,
    day: ProtocolDay,
) -> ActivityDescriptor {
    ActivityDescriptor {
        activity,
        start_time_key,
        end_time_key,
        start_day: day,
        end_day: day,
    }
}

/// The protocol table, in protocol order.
pub const ACTIVITY_TABLE: [ActivityDescriptor; 19] = [
    same_day(
        Activity::RestWithK5,
        "FASE REPOSO CON K5 - Hora de inicio",
        "FASE REPOSO CON K5 - Hora de fin",
        ProtocolDay::Day1,
    ),
    same_day(
        Activity::Treadmill,
        "TAPIZ RODANTE - Hora de inicio",
        "TAPIZ RODANTE - Hora de fin",
        ProtocolDay::Day1,
    ),
    same_day(
        Activity::SitToStand30s,
        "SIT TO STAND 30 s - Hora de inicio",
        "SIT TO STAND 30 s - Hora de fin",
        ProtocolDay::Day1,
    ),
    // The ergometer test starts with its resting phase.
    same_day(
        Activity::IncrementalCycleErgometer,
        "INCREMENTAL CICLOERGOMETRO - Hora de inicio REPOSO",
        "INCREMENTAL CICLOERGOMETRO - Hora de fin",
        ProtocolDay::Day1,
    ),
    same_day(
        Activity::Yoga,
        "YOGA - Hora de inicio",
        "YOGA - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::SittingWatchingTv,
        "SENTADO VIENDO LA TV - Hora de inicio",
        "SENTADO VIENDO LA TV - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::SittingReading,
        "SENTADO LEYENDO - Hora de inicio",
        "SENTADO LEYENDO - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::SittingUsingPc,
        "SENTADO USANDO PC - Hora de inicio",
        "SENTADO USANDO PC - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::StandingUsingPc,
        "DE PIE USANDO PC - Hora de inicio",
        "DE PIE USANDO PC - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::StandingFoldingTowels,
        "DE PIE DOBLANDO TOALLAS - Hora de inicio",
        "DE PIE DOBLANDO TOALLAS - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::StandingMovingBooks,
        "DE PIE MOVIENDO LIBROS - Hora de inicio",
        "DE PIE MOVIENDO LIBROS - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::StandingSweeping,
        "DE PIE BARRIENDO - Hora de inicio",
        "DE PIE BARRIENDO - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::WalkingUsualSpeed,
        "CAMINAR USUAL SPEED - Hora de inicio",
        "CAMINAR USUAL SPEED - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::WalkingWithPhoneOrBook,
        "CAMINAR CON MÓVIL O LIBRO - Hora de inicio",
        "CAMINAR CON MÓVIL O LIBRO - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::WalkingWithShopping,
        "CAMINAR CON LA COMPRA - Hora de inicio",
        "CAMINAR CON LA COMPRA - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::WalkingZigzag,
        "CAMINAR ZIGZAG - Hora de inicio",
        "CAMINAR ZIGZAG - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::Jogging,
        "TROTAR - Hora de inicio",
        "TROTAR - Hora de fin",
        ProtocolDay::Day7,
    ),
    same_day(
        Activity::Stairs,
        "SUBIR Y BAJAR ESCALERAS - Hora de inicio",
        "SUBIR Y BAJAR ESCALERAS - Hora de fin",
        ProtocolDay::Day7,
    ),
    // Starts on day 1 and ends on day 7.
    ActivityDescriptor {
        activity: Activity::Unstructured,
        start_time_key: "ACTIVIDAD NO ESTRUCTURADA - Hora de inicio",
        end_time_key: "ACTIVIDAD NO ESTRUCTURADA - Hora de fin",
        start_day: ProtocolDay::Day1,
        end_day: ProtocolDay::Day7,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_matches_protocol_order() {
        for (i, activity) in Activity::ALL.iter().enumerate() {
            assert_eq!(ACTIVITY_TABLE[i].activity, *activity);
            assert_eq!(activity.descriptor().activity, *activity);
        }
    }

    #[test]
    fn test_keys_carry_activity_name() {
        for d in &ACTIVITY_TABLE {
            assert!(d.start_time_key.starts_with(d.activity.name()));
            assert!(d.end_time_key.starts_with(d.activity.name()));
            assert!(d.end_time_key.ends_with("Hora de fin"));
        }
    }

    #[test]
    fn test_only_unstructured_spans_days() {
        let spanning: Vec<_> = ACTIVITY_TABLE
            .iter()
            .filter(|d| d.start_day != d.end_day)
            .collect();
        assert_eq!(spanning.len(), 1);
        assert_eq!(spanning[0].activity, Activity::Unstructured);
        assert_eq!(spanning[0].start_day.date_key(), "Fecha día 1");
        assert_eq!(spanning[0].end_day.date_key(), "Fecha día 7");
    }

    #[test]
    fn test_day_split() {
        let day1 = ACTIVITY_TABLE
            .iter()
            .filter(|d| d.start_day == ProtocolDay::Day1 && d.end_day == ProtocolDay::Day1)
            .count();
        let day7 = ACTIVITY_TABLE
            .iter()
            .filter(|d| d.start_day == ProtocolDay::Day7)
            .count();
        assert_eq!(day1, 4);
        assert_eq!(day7, 14);
    }

    #[test]
    fn test_names_unique_and_parse_back() {
        let names: HashSet<_> = Activity::ALL.iter().map(|a| a.name()).collect();
        assert_eq!(names.len(), 19);
        for activity in Activity::ALL {
            assert_eq!(activity.name().parse::<Activity>(), Ok(activity));
        }
        assert!("PILATES".parse::<Activity>().is_err());
    }

    #[test]
    fn test_structured_list_omits_unstructured() {
        assert_eq!(Activity::STRUCTURED.len(), 18);
        assert!(!Activity::STRUCTURED.contains(&Activity::Unstructured));
        assert!(Activity::STRUCTURED.iter().all(|a| a.is_structured()));
        assert!(!Activity::Unstructured.is_structured());
    }
}
