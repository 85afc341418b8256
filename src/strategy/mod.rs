// Hypothetical tyre strategies: planning, simulation and comparison with the real race

pub mod comparison;
pub mod simulator;

use std::fmt;
use std::str::FromStr;

use crate::BoxBoxError;
use crate::session::Compound;

pub use comparison::{StintComparisonRow, StrategyComparison};
pub use simulator::{
    DEFAULT_LAP_SECS, SimulatedStint, SimulationResult, SimulatorState, StrategySimulator,
    baseline_lap_time, sample_lap,
};

/// One stint of a user plan: a compound run for a number of laps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedStint {
    pub compound: Compound,
    pub laps: u32,
}

impl PlannedStint {
    pub fn new(compound: Compound, laps: u32) -> Result<Self, BoxBoxError> {
        if laps == 0 {
            return Err(BoxBoxError::invalid_input(
                "stint laps",
                "number of laps must be greater than zero",
            ));
        }
        Ok(Self { compound, laps })
    }
}

impl fmt::Display for PlannedStint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.compound.label(), self.laps)
    }
}

/// Parses `"<compound> <laps>"`, e.g. `"Soft 20"`
impl FromStr for PlannedStint {
    type Err = BoxBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            BoxBoxError::invalid_input("stint", format!("'{}' is not in the form 'Compound Laps'", s.trim()))
        };
        let mut tokens = s.split_whitespace();
        let (Some(compound), Some(laps), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(malformed());
        };
        let compound: Compound = compound.parse()?;
        let laps: i64 = laps.parse().map_err(|_| {
            BoxBoxError::invalid_input("stint laps", format!("'{laps}' is not a whole number"))
        })?;
        if laps <= 0 {
            return Err(BoxBoxError::invalid_input(
                "stint laps",
                "number of laps must be greater than zero",
            ));
        }
        let laps = u32::try_from(laps).map_err(|_| {
            BoxBoxError::invalid_input("stint laps", format!("{laps} laps is too many"))
        })?;
        PlannedStint::new(compound, laps)
    }
}

/// An ordered list of stints covering exactly the race distance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyPlan {
    stints: Vec<PlannedStint>,
}

impl StrategyPlan {
    /// Accept the stints only if their laps add up to `total_laps`
    pub fn new(stints: Vec<PlannedStint>, total_laps: u32) -> Result<Self, BoxBoxError> {
        let planned: u64 = stints.iter().map(|s| u64::from(s.laps)).sum();
        if planned != u64::from(total_laps) {
            return Err(BoxBoxError::ValidationFailure {
                reason: format!(
                    "The total laps in your strategy ({planned}) do not match the race length of {total_laps} laps."
                ),
            });
        }
        Ok(Self { stints })
    }

    pub fn stints(&self) -> &[PlannedStint] {
        &self.stints
    }

    pub fn total_laps(&self) -> u32 {
        self.stints.iter().map(|s| s.laps).sum()
    }

    pub fn len(&self) -> usize {
        self.stints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stints.is_empty()
    }
}
