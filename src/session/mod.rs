// Core data structures for a loaded race session

pub mod accessor;
pub mod duration;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::BoxBoxError;

pub use accessor::{FastestLap, ResultsAccessor};
pub use duration::{RaceTimeDelta, format_lap_time, format_race_time, parse_race_time};

/// Tyre rubber category used for a stint
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

impl Compound {
    pub const ALL: [Compound; 5] = [
        Compound::Soft,
        Compound::Medium,
        Compound::Hard,
        Compound::Intermediate,
        Compound::Wet,
    ];

    /// Multiplier applied to a baseline lap time when simulating a lap on this compound
    pub fn performance_factor(&self) -> f64 {
        match self {
            Compound::Soft => 1.018,
            Compound::Medium => 1.038,
            Compound::Hard => 1.058,
            Compound::Wet => 1.098,
            Compound::Intermediate => 1.078,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
        }
    }

    /// Title-case label used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Compound::Soft => "Soft",
            Compound::Medium => "Medium",
            Compound::Hard => "Hard",
            Compound::Intermediate => "Intermediate",
            Compound::Wet => "Wet",
        }
    }

    /// Fill colour used by the strategy chart
    pub fn color(&self) -> &'static str {
        match self {
            Compound::Soft => "#da291c",
            Compound::Medium => "#ffd12e",
            Compound::Hard => "#f0f0ec",
            Compound::Intermediate => "#43b02a",
            Compound::Wet => "#0067ad",
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Compound {
    type Err = BoxBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Compound::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                BoxBoxError::invalid_input(
                    "compound",
                    format!(
                        "'{wanted}' is not one of Soft, Medium, Hard, Intermediate, Wet"
                    ),
                )
            })
    }
}

/// Canonical three letter driver abbreviation, e.g. "VER"
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct DriverCode(String);

impl DriverCode {
    pub fn new(code: &str) -> Result<Self, BoxBoxError> {
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code.to_string()))
        } else {
            Err(BoxBoxError::invalid_input(
                "driver code",
                format!("'{code}' is not a three letter uppercase abbreviation"),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for DriverCode {
    type Error = BoxBoxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DriverCode::new(&value)
    }
}

impl From<DriverCode> for String {
    fn from(value: DriverCode) -> Self {
        value.0
    }
}

/// One entry of a season calendar
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventInfo {
    pub round: u32,
    pub name: String,
    pub country: String,
    pub location: String,
    /// Race day as `YYYY-MM-DD`
    pub date: String,
}

/// How the user identified a race
#[derive(Clone, Debug, PartialEq)]
pub enum RaceSelector {
    Round(u32),
    Name(String),
}

impl fmt::Display for RaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceSelector::Round(round) => write!(f, "round {round}"),
            RaceSelector::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Classification row for a single driver
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DriverResult {
    pub code: DriverCode,
    pub number: u32,
    pub grid_position: Option<u32>,
    pub position: Option<u32>,
    pub points: f64,
    /// Total race time for the winner, gap to the winner for everybody else
    pub time: Option<Duration>,
    pub status: String,
}

/// A single lap driven by a driver
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LapRecord {
    pub driver: DriverCode,
    pub driver_number: u32,
    pub lap_number: u32,
    pub lap_time: Option<Duration>,
    pub stint: Option<u32>,
    pub compound: Option<Compound>,
    /// RFC 3339 timestamp of the lap start, used to query telemetry for the lap
    pub started_at: Option<String>,
}

/// A point on the track in circuit coordinates
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A car telemetry sample of the Speed channel, in km/h
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CarSample {
    pub speed_kph: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Corner {
    pub number: u32,
    pub letter: String,
    /// Direction pointing sideways away from the track, in degrees
    pub angle_deg: f64,
    pub position: Position,
}

impl Corner {
    pub fn label(&self) -> String {
        format!("{}{}", self.number, self.letter)
    }
}

/// Circuit geometry used for the track map
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct CircuitInfo {
    pub rotation_deg: f64,
    pub outline: Vec<Position>,
    pub corners: Vec<Corner>,
}

/// Everything loaded for one race
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub year: u32,
    pub event: EventInfo,
    pub total_laps: u32,
    pub results: Vec<DriverResult>,
    pub laps: Vec<LapRecord>,
    /// Provider keys needed to fetch telemetry and circuit details later on
    pub session_key: Option<u32>,
    pub circuit_key: Option<u32>,
}

impl Session {
    pub fn new(
        year: u32,
        event: EventInfo,
        results: Vec<DriverResult>,
        laps: Vec<LapRecord>,
    ) -> Self {
        let total_laps = laps.iter().map(|l| l.lap_number).max().unwrap_or(0);
        Self {
            year,
            event,
            total_laps,
            results,
            laps,
            session_key: None,
            circuit_key: None,
        }
    }

    pub fn result_for(&self, code: &DriverCode) -> Option<&DriverResult> {
        self.results.iter().find(|r| &r.code == code)
    }

    pub fn result_at_position(&self, position: u32) -> Option<&DriverResult> {
        self.results.iter().find(|r| r.position == Some(position))
    }

    pub fn driver_laps<'s>(&'s self, code: &'s DriverCode) -> impl Iterator<Item = &'s LapRecord> {
        self.laps.iter().filter(move |l| &l.driver == code)
    }

    /// A driver finished when they have a lap record for every lap of the race
    pub fn did_driver_finish(&self, code: &DriverCode) -> bool {
        self.driver_laps(code).count() == self.total_laps as usize
    }

    /// Fastest timed lap of the whole field
    pub fn fastest_lap(&self) -> Option<&LapRecord> {
        self.laps
            .iter()
            .filter(|l| l.lap_time.is_some())
            .min_by_key(|l| l.lap_time)
    }
}
