// Driver performance summaries and tyre stint aggregation

use std::fmt;
use std::time::Duration;

use itertools::Itertools;
use uom::si::velocity::kilometer_per_hour;

use crate::BoxBoxError;
use crate::provider::RaceDataProvider;
use crate::session::{
    Compound, DriverCode, DriverResult, FastestLap, LapRecord, ResultsAccessor, format_lap_time,
    format_race_time,
};

/// Laps run by one driver in one stint on one compound
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StintSummary {
    pub driver: DriverCode,
    pub stint: u32,
    pub compound: Compound,
    pub laps: u32,
}

/// Group laps by driver, stint and compound and count the laps of each group.
///
/// Laps without a stint number or a known compound are left out. The output
/// is ordered by driver, stint and compound and the input is not modified.
pub fn stints_by_compound(laps: &[LapRecord]) -> Vec<StintSummary> {
    laps.iter()
        .filter_map(|lap| Some((lap.driver.clone(), lap.stint?, lap.compound?)))
        .counts()
        .into_iter()
        .map(|((driver, stint, compound), laps)| StintSummary {
            driver,
            stint,
            compound,
            laps: laps as u32,
        })
        .sorted_by(|a, b| {
            (&a.driver, a.stint, a.compound).cmp(&(&b.driver, b.stint, b.compound))
        })
        .collect()
}

/// Render stint rows as a fixed width table
pub fn format_stint_table(stints: &[StintSummary]) -> String {
    let mut table = format!(
        "{:>6} {:>6} {:>12} {:>12}\n",
        "Driver", "Stint", "Compound", "StintLength"
    );
    for stint in stints {
        table.push_str(&format!(
            "{:>6} {:>6} {:>12} {:>12}\n",
            stint.driver, stint.stint, stint.compound, stint.laps
        ));
    }
    table
}

/// Classification and fastest lap figures of one driver
#[derive(Clone, Debug, PartialEq)]
pub struct DriverSummary {
    pub code: DriverCode,
    pub number: u32,
    pub grid_position: Option<u32>,
    pub position: Option<u32>,
    pub points: f64,
    /// Total race time for the winner, gap to the winner otherwise
    pub time: Option<Duration>,
    pub fastest_lap: Option<FastestLap>,
}

fn or_na<T: fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

impl fmt::Display for DriverSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver: {}", self.code)?;
        writeln!(f, "Number: {}", self.number)?;
        writeln!(f, "Grid Position: {}", or_na(self.grid_position))?;
        writeln!(f, "Position: {}", or_na(self.position))?;
        writeln!(f, "Points: {}", self.points)?;
        writeln!(f, "Time: {}", or_na(self.time.map(format_race_time)))?;
        writeln!(
            f,
            "Fastest Lap Time: {}",
            or_na(self.fastest_lap.as_ref().map(|l| format_lap_time(l.lap_time)))
        )?;
        write!(
            f,
            "Top Speed during Fastest Lap: {}",
            or_na(
                self.fastest_lap
                    .as_ref()
                    .and_then(|l| l.top_speed)
                    .map(|v| format!("{:.0} km/h", v.get::<kilometer_per_hour>()))
            )
        )
    }
}

/// The winner's summary and stints, for side by side reading with other drivers
#[derive(Clone, Debug, PartialEq)]
pub struct WinnerReport {
    pub summary: DriverSummary,
    pub stints: Vec<StintSummary>,
}

impl fmt::Display for WinnerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver performance of race winner:")?;
        writeln!(f, "{}", self.summary)?;
        if self.stints.is_empty() {
            write!(f, "No tire and compound data available for the winner.")
        } else {
            write!(f, "{}", format_stint_table(&self.stints).trim_end())
        }
    }
}

/// Read-only analysis over the session held by a [`ResultsAccessor`]
pub struct PerformanceAnalyzer<'a, 'p, P: RaceDataProvider> {
    accessor: &'a ResultsAccessor<'p, P>,
}

impl<'a, 'p, P: RaceDataProvider> PerformanceAnalyzer<'a, 'p, P> {
    pub fn new(accessor: &'a ResultsAccessor<'p, P>) -> Self {
        Self { accessor }
    }

    fn result_for(&self, code: &DriverCode) -> Result<&'a DriverResult, BoxBoxError> {
        self.accessor
            .session()?
            .result_for(code)
            .ok_or_else(|| BoxBoxError::not_found(format!("results for driver code {code}")))
    }

    pub fn summarize(&self, code: &DriverCode) -> Result<DriverSummary, BoxBoxError> {
        let result = self.result_for(code)?;
        Ok(DriverSummary {
            code: result.code.clone(),
            number: result.number,
            grid_position: result.grid_position,
            position: result.position,
            points: result.points,
            time: result.time,
            fastest_lap: self.accessor.fastest_lap(code)?,
        })
    }

    pub fn stints_by_compound(&self) -> Result<Vec<StintSummary>, BoxBoxError> {
        Ok(stints_by_compound(self.accessor.laps()?))
    }

    pub fn stints_for(&self, code: &DriverCode) -> Result<Vec<StintSummary>, BoxBoxError> {
        Ok(self
            .stints_by_compound()?
            .into_iter()
            .filter(|s| &s.driver == code)
            .collect())
    }

    pub fn winner(&self) -> Result<&'a DriverResult, BoxBoxError> {
        self.accessor
            .session()?
            .result_at_position(1)
            .ok_or_else(|| BoxBoxError::not_found("race winner"))
    }

    /// Absolute time a driver needed to complete the race.
    ///
    /// The winner's recorded time is the race time, every other driver's is the
    /// winner's time plus their recorded gap.
    pub fn actual_race_time(&self, code: &DriverCode) -> Result<Duration, BoxBoxError> {
        let winner = self.winner()?;
        let winner_time = winner
            .time
            .ok_or_else(|| BoxBoxError::not_found("race time of the winner"))?;
        if &winner.code == code {
            return Ok(winner_time);
        }

        let gap = self.result_for(code)?.time.ok_or_else(|| {
            BoxBoxError::not_found(format!("valid race time for driver code {code}"))
        })?;
        Ok(winner_time + gap)
    }

    pub fn compare_to_winner(&self) -> Result<WinnerReport, BoxBoxError> {
        let winner = self.winner()?;
        Ok(WinnerReport {
            summary: self.summarize(&winner.code)?,
            stints: self.stints_for(&winner.code)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockEntry, MockProvider};
    use crate::session::{EventInfo, RaceSelector, Session};

    fn event() -> EventInfo {
        EventInfo {
            round: 1,
            name: "Bahrain Grand Prix".to_string(),
            country: "Bahrain".to_string(),
            location: "Sakhir".to_string(),
            date: "2023-03-05".to_string(),
        }
    }

    fn lap(driver: &str, lap_number: u32, stint: Option<u32>, compound: Option<Compound>) -> LapRecord {
        LapRecord {
            driver: DriverCode::new(driver).unwrap(),
            driver_number: 1,
            lap_number,
            lap_time: Some(Duration::from_secs(95)),
            stint,
            compound,
            started_at: None,
        }
    }

    fn result(code: &str, position: u32, time: Option<Duration>) -> DriverResult {
        DriverResult {
            code: DriverCode::new(code).unwrap(),
            number: position,
            grid_position: Some(position),
            position: Some(position),
            points: 0.,
            time,
            status: "Finished".to_string(),
        }
    }

    #[test]
    fn test_stints_grouping() {
        let laps = vec![
            lap("VER", 1, Some(1), Some(Compound::Soft)),
            lap("VER", 2, Some(1), Some(Compound::Soft)),
            lap("VER", 3, Some(2), Some(Compound::Hard)),
            lap("ALO", 1, Some(1), Some(Compound::Medium)),
            lap("ALO", 2, None, Some(Compound::Medium)),
            lap("ALO", 3, Some(2), None),
        ];
        let stints = stints_by_compound(&laps);
        assert_eq!(stints.len(), 3);
        assert_eq!(stints[0].driver.as_str(), "ALO");
        assert_eq!(stints[0].laps, 1);
        assert_eq!(stints[1].compound, Compound::Soft);
        assert_eq!(stints[1].laps, 2);
        assert_eq!(stints[2].stint, 2);
    }

    #[test]
    fn test_stints_grouping_is_idempotent() {
        let laps = vec![
            lap("VER", 1, Some(1), Some(Compound::Soft)),
            lap("VER", 2, Some(2), Some(Compound::Medium)),
            lap("HAM", 1, Some(1), Some(Compound::Hard)),
        ];
        let before = laps.clone();
        let first = stints_by_compound(&laps);
        let second = stints_by_compound(&laps);
        assert_eq!(first, second);
        assert_eq!(laps, before);
    }

    #[test]
    fn test_stint_table_layout() {
        let stints = vec![StintSummary {
            driver: DriverCode::new("VER").unwrap(),
            stint: 1,
            compound: Compound::Medium,
            laps: 30,
        }];
        let table = format_stint_table(&stints);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Driver  Stint     Compound  StintLength");
        assert_eq!(lines[1], "   VER      1       MEDIUM           30");
    }

    fn provider_with(results: Vec<DriverResult>) -> MockProvider {
        let mut session = Session::new(2023, event(), results, vec![]);
        session.total_laps = 57;
        MockProvider::new().with_session(session)
    }

    #[test]
    fn test_actual_race_time_of_winner_and_others() {
        let provider = provider_with(vec![
            result("VER", 1, Some(parse("1:30:00.000"))),
            result("ALO", 2, Some(parse("+12.345s"))),
            result("SAR", 3, None),
        ]);
        let mut accessor = ResultsAccessor::new(&provider);
        accessor.load_session(2023, &RaceSelector::Round(1)).unwrap();
        let analyzer = PerformanceAnalyzer::new(&accessor);

        let ver = DriverCode::new("VER").unwrap();
        assert_eq!(analyzer.actual_race_time(&ver).unwrap(), parse("1:30:00.000"));

        let alo = DriverCode::new("ALO").unwrap();
        let alo_time = analyzer.actual_race_time(&alo).unwrap();
        assert_eq!(format_race_time(alo_time), "1:30:12.345");

        let sar = DriverCode::new("SAR").unwrap();
        assert!(matches!(
            analyzer.actual_race_time(&sar),
            Err(BoxBoxError::NotFound { .. })
        ));
        let nob = DriverCode::new("NOB").unwrap();
        assert!(analyzer.actual_race_time(&nob).is_err());
    }

    #[test]
    fn test_actual_race_time_without_winner_time() {
        let provider = provider_with(vec![result("VER", 1, None), result("ALO", 2, Some(parse("+1.0")))]);
        let mut accessor = ResultsAccessor::new(&provider);
        accessor.load_session(2023, &RaceSelector::Round(1)).unwrap();
        let analyzer = PerformanceAnalyzer::new(&accessor);

        let alo = DriverCode::new("ALO").unwrap();
        assert!(analyzer.actual_race_time(&alo).is_err());
    }

    fn parse(text: &str) -> Duration {
        crate::session::parse_race_time(text).unwrap()
    }

    #[test]
    fn test_summary_and_winner_report() {
        let session = MockProvider::synthetic_session(
            2023,
            event(),
            &[
                MockEntry {
                    code: "VER",
                    number: 1,
                    stints: vec![(Compound::Soft, 20), (Compound::Hard, 37)],
                    lap_secs: 94.,
                },
                MockEntry {
                    code: "PER",
                    number: 11,
                    stints: vec![(Compound::Soft, 17), (Compound::Hard, 40)],
                    lap_secs: 94.3,
                },
            ],
        );
        let provider = MockProvider::new().with_session(session);
        let mut accessor = ResultsAccessor::new(&provider);
        accessor.load_session(2023, &RaceSelector::Round(1)).unwrap();
        let analyzer = PerformanceAnalyzer::new(&accessor);

        let per = DriverCode::new("PER").unwrap();
        let summary = analyzer.summarize(&per).unwrap();
        assert_eq!(summary.position, Some(2));
        assert_eq!(summary.points, 18.);
        let text = summary.to_string();
        assert!(text.contains("Driver: PER"));
        assert!(text.contains("Top Speed during Fastest Lap: N/A"));

        let missing = DriverCode::new("XXX").unwrap();
        assert!(matches!(
            analyzer.summarize(&missing),
            Err(BoxBoxError::NotFound { .. })
        ));

        let report = analyzer.compare_to_winner().unwrap();
        assert_eq!(report.summary.code.as_str(), "VER");
        assert_eq!(report.stints.len(), 2);
        assert_eq!(report.stints[1].laps, 37);
        assert!(report.to_string().starts_with("Driver performance of race winner:"));
    }
}
