use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use log::{debug, warn};
use uom::si::f64::Velocity;
use uom::si::velocity::kilometer_per_hour;

use crate::BoxBoxError;
use crate::provider::RaceDataProvider;

use super::{
    CircuitInfo, DriverCode, DriverResult, EventInfo, LapRecord, Position, RaceSelector, Session,
};

/// A driver's quickest lap of the race and the top speed reached on it
#[derive(Debug, Clone, PartialEq)]
pub struct FastestLap {
    pub lap_number: u32,
    pub lap_time: Duration,
    pub top_speed: Option<Velocity>,
}

/// Owns the currently loaded session and exposes it as flat tables.
///
/// Exactly one session is live at a time; loading another race replaces it
/// along with the driver number and code lookups.
pub struct ResultsAccessor<'p, P: RaceDataProvider> {
    provider: &'p P,
    session: Option<Session>,
    /// Car number and code pairs in classification order
    drivers: Vec<(u32, DriverCode)>,
    number_to_code: HashMap<u32, DriverCode>,
    code_to_number: HashMap<DriverCode, u32>,
}

impl<'p, P: RaceDataProvider> ResultsAccessor<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            session: None,
            drivers: Vec::new(),
            number_to_code: HashMap::new(),
            code_to_number: HashMap::new(),
        }
    }

    pub fn calendar(&self, year: u32) -> Result<Vec<EventInfo>, BoxBoxError> {
        self.provider.event_schedule(year)
    }

    pub fn load_session(
        &mut self,
        year: u32,
        race: &RaceSelector,
    ) -> Result<&Session, BoxBoxError> {
        // the previous session is dropped even if this load fails
        self.session = None;
        self.drivers.clear();
        self.number_to_code.clear();
        self.code_to_number.clear();

        let session = self.provider.load_race(year, race)?;
        for result in &session.results {
            self.drivers.push((result.number, result.code.clone()));
            self.number_to_code
                .insert(result.number, result.code.clone());
            self.code_to_number
                .insert(result.code.clone(), result.number);
        }
        debug!(
            "Built driver mappings for {} drivers",
            self.number_to_code.len()
        );
        Ok(self.session.insert(session))
    }

    pub fn session(&self) -> Result<&Session, BoxBoxError> {
        self.session.as_ref().ok_or_else(|| BoxBoxError::NotLoaded {
            what: "race session".to_string(),
        })
    }

    pub fn results(&self) -> Result<&[DriverResult], BoxBoxError> {
        Ok(&self.session()?.results)
    }

    pub fn laps(&self) -> Result<&[LapRecord], BoxBoxError> {
        Ok(&self.session()?.laps)
    }

    /// The driver's quickest timed lap, `None` when they set no lap time.
    /// Missing telemetry only leaves the top speed empty.
    pub fn fastest_lap(&self, code: &DriverCode) -> Result<Option<FastestLap>, BoxBoxError> {
        let session = self.session()?;
        let Some(lap) = session
            .driver_laps(code)
            .filter(|l| l.lap_time.is_some())
            .min_by_key(|l| l.lap_time)
        else {
            return Ok(None);
        };
        let Some(lap_time) = lap.lap_time else {
            return Ok(None);
        };

        let top_speed = match self.provider.lap_car_data(session, lap) {
            Ok(samples) => samples
                .iter()
                .map(|s| s.speed_kph)
                .filter(|s| s.is_finite())
                .fold(None, |max: Option<f64>, s| Some(max.map_or(s, |m| m.max(s))))
                .map(|s| Velocity::new::<kilometer_per_hour>(s)),
            Err(e) => {
                warn!("No telemetry for fastest lap of {code}: {e}");
                None
            }
        };

        Ok(Some(FastestLap {
            lap_number: lap.lap_number,
            lap_time,
            top_speed,
        }))
    }

    pub fn circuit_info(&self) -> Result<CircuitInfo, BoxBoxError> {
        self.provider.circuit_info(self.session()?)
    }

    pub fn lap_positions(&self, lap: &LapRecord) -> Result<Vec<Position>, BoxBoxError> {
        self.provider.lap_positions(self.session()?, lap)
    }

    pub fn driver_code(&self, number: u32) -> Option<&DriverCode> {
        self.number_to_code.get(&number)
    }

    pub fn driver_number(&self, code: &DriverCode) -> Option<u32> {
        self.code_to_number.get(code).copied()
    }

    /// Driver codes in classification order
    pub fn drivers(&self) -> impl Iterator<Item = &DriverCode> {
        self.drivers.iter().map(|(_, code)| code)
    }

    /// Map a car number or an exact driver code to the driver's code
    pub fn resolve_driver(&self, input: &str) -> Option<DriverCode> {
        let input = input.trim();
        if let Ok(number) = input.parse::<u32>() {
            return self.driver_code(number).cloned();
        }
        DriverCode::new(input)
            .ok()
            .filter(|code| self.code_to_number.contains_key(code))
    }

    /// Printable table of car numbers and driver codes
    pub fn driver_mappings(&self) -> String {
        let mut table = String::new();
        let _ = writeln!(table, "{:<10} | Abbreviation", "Number");
        let _ = writeln!(table, "{}", "-".repeat(25));
        for (number, code) in &self.drivers {
            let _ = writeln!(table, "{number:<10} | {code}");
        }
        table
    }
}
