use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use log::warn;

use crate::BoxBoxError;
use crate::session::{
    CarSample, CircuitInfo, Compound, DriverCode, DriverResult, EventInfo, LapRecord, Position,
    RaceSelector, Session,
};

use super::{RaceDataProvider, resolve_event};

/// A driver entered into a synthetic race: the stints they ran and their
/// typical lap time. Entries are classified in the order they are given.
#[derive(Debug, Clone)]
pub struct MockEntry {
    pub code: &'static str,
    pub number: u32,
    pub stints: Vec<(Compound, u32)>,
    pub lap_secs: f64,
}

/// A mock data provider for testing and offline analysis.
///
/// MockProvider serves calendars, sessions, telemetry and circuit geometry
/// from memory. This enables:
/// - Unit and integration testing of the analysis and shell without a network
/// - Reproducible scenarios for the strategy simulator
#[derive(Default)]
pub struct MockProvider {
    schedules: HashMap<u32, Vec<EventInfo>>,
    sessions: HashMap<(u32, u32), Session>,
    car_data: HashMap<(u32, u32), Vec<CarSample>>,
    positions: Vec<Position>,
    circuit: Option<CircuitInfo>,
    loads: Cell<usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and add its event to the season calendar
    pub fn with_session(mut self, session: Session) -> Self {
        let schedule = self.schedules.entry(session.year).or_default();
        if !schedule.iter().any(|e| e.round == session.event.round) {
            schedule.push(session.event.clone());
            schedule.sort_by_key(|e| e.round);
        }
        self.sessions
            .insert((session.year, session.event.round), session);
        self
    }

    /// Register a calendar entry that has no loadable session
    pub fn with_event(mut self, year: u32, event: EventInfo) -> Self {
        let schedule = self.schedules.entry(year).or_default();
        schedule.push(event);
        schedule.sort_by_key(|e| e.round);
        self
    }

    pub fn with_car_data(mut self, driver_number: u32, lap_number: u32, speeds: &[f64]) -> Self {
        self.car_data.insert(
            (driver_number, lap_number),
            speeds.iter().map(|s| CarSample { speed_kph: *s }).collect(),
        );
        self
    }

    /// Position samples returned for any lap
    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_circuit(mut self, circuit: CircuitInfo) -> Self {
        self.circuit = Some(circuit);
        self
    }

    /// Number of `load_race` calls served so far
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    /// Build a session where every entry drives the laps of its stints.
    ///
    /// Lap times are `lap_secs` plus a fixed offset per compound and a small
    /// per-lap wobble. The first entry wins; every other entry that covered the
    /// full distance gets their gap to the winner, the rest are retired.
    pub fn synthetic_session(year: u32, event: EventInfo, entries: &[MockEntry]) -> Session {
        let entries: Vec<(&MockEntry, DriverCode)> = entries
            .iter()
            .filter_map(|e| match DriverCode::new(e.code) {
                Ok(code) => Some((e, code)),
                Err(err) => {
                    warn!("Skipping mock entry: {err}");
                    None
                }
            })
            .collect();

        let mut laps = Vec::new();
        let mut totals = Vec::with_capacity(entries.len());
        for (entry, code) in &entries {
            let mut lap_number = 0;
            let mut total = Duration::ZERO;
            for (stint_index, (compound, stint_laps)) in entry.stints.iter().enumerate() {
                let compound_offset = match compound {
                    Compound::Soft => 0.0,
                    Compound::Medium => 0.4,
                    Compound::Hard => 0.8,
                    Compound::Intermediate => 6.0,
                    Compound::Wet => 10.0,
                };
                for _ in 0..*stint_laps {
                    lap_number += 1;
                    let wobble = (lap_number % 5) as f64 * 0.1;
                    let lap_time =
                        Duration::from_secs_f64(entry.lap_secs + compound_offset + wobble);
                    total += lap_time;
                    laps.push(LapRecord {
                        driver: code.clone(),
                        driver_number: entry.number,
                        lap_number,
                        lap_time: Some(lap_time),
                        stint: Some(stint_index as u32 + 1),
                        compound: Some(*compound),
                        started_at: None,
                    });
                }
            }
            totals.push((lap_number, total));
        }

        let race_laps = totals.iter().map(|(n, _)| *n).max().unwrap_or(0);
        let winner_total = totals.first().map(|(_, t)| *t).unwrap_or_default();
        let results = entries
            .iter()
            .zip(totals.iter())
            .enumerate()
            .map(|(index, ((entry, code), (lap_count, total)))| {
                let finished = *lap_count == race_laps;
                let time = if index == 0 {
                    Some(*total)
                } else if finished {
                    Some(total.saturating_sub(winner_total))
                } else {
                    None
                };
                DriverResult {
                    code: code.clone(),
                    number: entry.number,
                    grid_position: Some(index as u32 + 1),
                    position: Some(index as u32 + 1),
                    points: [25., 18., 15., 12., 10., 8., 6., 4., 2., 1.]
                        .get(index)
                        .copied()
                        .unwrap_or(0.),
                    time,
                    status: if finished { "Finished" } else { "Retired" }.to_string(),
                }
            })
            .collect();

        Session::new(year, event, results, laps)
    }
}

impl RaceDataProvider for MockProvider {
    fn event_schedule(&self, year: u32) -> Result<Vec<EventInfo>, BoxBoxError> {
        self.schedules
            .get(&year)
            .cloned()
            .ok_or_else(|| BoxBoxError::not_found(format!("calendar for {year}")))
    }

    fn load_race(&self, year: u32, race: &RaceSelector) -> Result<Session, BoxBoxError> {
        self.loads.set(self.loads.get() + 1);
        let schedule = self.event_schedule(year)?;
        let event = resolve_event(&schedule, race)?;
        self.sessions
            .get(&(year, event.round))
            .cloned()
            .ok_or_else(|| BoxBoxError::not_found(format!("results of {} {year}", event.name)))
    }

    fn lap_car_data(
        &self,
        _session: &Session,
        lap: &LapRecord,
    ) -> Result<Vec<CarSample>, BoxBoxError> {
        Ok(self
            .car_data
            .get(&(lap.driver_number, lap.lap_number))
            .cloned()
            .unwrap_or_default())
    }

    fn lap_positions(
        &self,
        _session: &Session,
        _lap: &LapRecord,
    ) -> Result<Vec<Position>, BoxBoxError> {
        Ok(self.positions.clone())
    }

    fn circuit_info(&self, session: &Session) -> Result<CircuitInfo, BoxBoxError> {
        self.circuit.clone().ok_or_else(|| {
            BoxBoxError::not_found(format!("circuit details for {}", session.event.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventInfo {
        EventInfo {
            round: 6,
            name: "Monaco Grand Prix".to_string(),
            country: "Monaco".to_string(),
            location: "Monte-Carlo".to_string(),
            date: "2023-05-28".to_string(),
        }
    }

    #[test]
    fn test_synthetic_session_classification() {
        let session = MockProvider::synthetic_session(
            2023,
            event(),
            &[
                MockEntry {
                    code: "VER",
                    number: 1,
                    stints: vec![(Compound::Medium, 30), (Compound::Hard, 48)],
                    lap_secs: 75.,
                },
                MockEntry {
                    code: "ALO",
                    number: 14,
                    stints: vec![(Compound::Hard, 50), (Compound::Medium, 28)],
                    lap_secs: 75.2,
                },
                MockEntry {
                    code: "SAR",
                    number: 2,
                    stints: vec![(Compound::Hard, 40)],
                    lap_secs: 76.,
                },
            ],
        );

        assert_eq!(session.total_laps, 78);
        assert_eq!(session.laps.len(), 78 + 78 + 40);
        assert_eq!(session.results[0].position, Some(1));
        assert!(session.results[1].time.is_some());
        assert!(session.results[2].time.is_none());
        assert_eq!(session.results[2].status, "Retired");
    }

    #[test]
    fn test_load_race_by_name_and_round() {
        let session = MockProvider::synthetic_session(2023, event(), &[]);
        let provider = MockProvider::new().with_session(session);

        assert!(
            provider
                .load_race(2023, &RaceSelector::Name("monaco".to_string()))
                .is_ok()
        );
        assert!(provider.load_race(2023, &RaceSelector::Round(6)).is_ok());
        assert!(provider.load_race(2023, &RaceSelector::Round(7)).is_err());
        assert!(provider.load_race(2022, &RaceSelector::Round(6)).is_err());
        assert_eq!(provider.load_count(), 4);
    }
}
