use std::fmt;
use std::time::Duration;

use crate::analysis::StintSummary;
use crate::session::{Compound, DriverCode, RaceTimeDelta, format_race_time};

use super::{PlannedStint, StrategyPlan};

/// Actual and planned stint sharing the same stint number
#[derive(Clone, Debug, PartialEq)]
pub struct StintComparisonRow {
    pub stint: u32,
    pub actual: Option<(Compound, u32)>,
    pub simulated: Option<PlannedStint>,
}

/// Simulated strategy next to the driver's real race
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyComparison {
    pub driver: DriverCode,
    pub rows: Vec<StintComparisonRow>,
    pub actual_time: Duration,
    pub simulated_time: Duration,
}

impl StrategyComparison {
    /// Lines up the driver's stints with the plan. The table is as long as the
    /// longer of the two, missing entries are left empty.
    pub fn new(
        driver: DriverCode,
        actual_stints: &[StintSummary],
        plan: &StrategyPlan,
        actual_time: Duration,
        simulated_time: Duration,
    ) -> Self {
        let actual_stints: Vec<&StintSummary> =
            actual_stints.iter().filter(|s| s.driver == driver).collect();
        let max_actual = actual_stints.iter().map(|s| s.stint).max().unwrap_or(0);
        let row_count = max_actual.max(plan.len() as u32);

        let rows = (1..=row_count)
            .map(|stint| StintComparisonRow {
                stint,
                actual: actual_stints
                    .iter()
                    .find(|s| s.stint == stint)
                    .map(|s| (s.compound, s.laps)),
                simulated: plan.stints().get(stint as usize - 1).copied(),
            })
            .collect();

        Self {
            driver,
            rows,
            actual_time,
            simulated_time,
        }
    }

    pub fn delta(&self) -> RaceTimeDelta {
        RaceTimeDelta::between(self.simulated_time, self.actual_time)
    }
}

fn cell(compound: Option<Compound>, laps: Option<u32>) -> String {
    let compound = compound.map_or("N/A", |c| c.as_str());
    let laps = laps.map_or_else(|| "N/A".to_string(), |l| l.to_string());
    format!("{compound:<16} ({laps:<3})")
}

impl fmt::Display for StrategyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stint | Actual Compound (Laps) | Simulated Compound (Laps)")?;
        writeln!(f, "{}", "-".repeat(58))?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<5} | {} | {}",
                row.stint,
                cell(row.actual.map(|a| a.0), row.actual.map(|a| a.1)),
                cell(row.simulated.map(|s| s.compound), row.simulated.map(|s| s.laps)),
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Actual total race time for driver {}: {}",
            self.driver,
            format_race_time(self.actual_time)
        )?;
        writeln!(
            f,
            "Simulated total race time for driver {}: {}",
            self.driver,
            format_race_time(self.simulated_time)
        )?;
        write!(
            f,
            "The simulated strategy is {} than the actual race time.",
            self.delta()
        )
    }
}
