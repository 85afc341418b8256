use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use crate::BoxBoxError;
use crate::analysis::PerformanceAnalyzer;
use crate::provider::RaceDataProvider;
use crate::session::{Compound, DriverCode, ResultsAccessor, Session};

use super::comparison::StrategyComparison;
use super::{PlannedStint, StrategyPlan};

/// Lap time used when a driver has no timed laps at all
pub const DEFAULT_LAP_SECS: f64 = 90.0;

/// Half width of the uniform lap time deviation, as a share of the baseline
const DEVIATION: f64 = 0.005;

/// Mean lap time of a driver on a compound.
///
/// Falls back to the driver's mean over all of their timed laps when they never
/// ran the compound, and to `None` when they have no timed laps.
pub fn baseline_lap_time(
    session: &Session,
    driver: &DriverCode,
    compound: Compound,
) -> Option<Duration> {
    let mean = |laps: Vec<Duration>| -> Option<Duration> {
        if laps.is_empty() {
            return None;
        }
        let count = laps.len() as u32;
        Some(laps.into_iter().sum::<Duration>() / count)
    };

    let driver_laps = || session.driver_laps(driver).filter_map(|l| l.lap_time.map(|t| (l, t)));

    mean(
        driver_laps()
            .filter(|(l, _)| l.compound == Some(compound))
            .map(|(_, t)| t)
            .collect(),
    )
    .or_else(|| {
        debug!("No {compound} laps for {driver}, using their overall mean lap time");
        mean(driver_laps().map(|(_, t)| t).collect())
    })
}

/// Draw one simulated lap.
///
/// With a baseline `b` the lap is `b * factor + d` where `d` is uniform in
/// `[-0.5%, +0.5%)` of `b`. Without one the lap is the 90 second default plus
/// the same relative deviation, no compound factor applied.
pub fn sample_lap<R: Rng>(
    baseline: Option<Duration>,
    compound: Compound,
    rng: &mut R,
) -> Duration {
    let (base, factor) = match baseline {
        Some(b) => (b.as_secs_f64(), compound.performance_factor()),
        None => (DEFAULT_LAP_SECS, 1.0),
    };
    let deviation = rng.gen_range(-DEVIATION..DEVIATION) * base;
    Duration::from_secs_f64(base * factor + deviation)
}

/// Sampled laps of one planned stint
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedStint {
    pub compound: Compound,
    pub baseline: Option<Duration>,
    pub laps: Vec<Duration>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SimulationResult {
    pub stints: Vec<SimulatedStint>,
}

impl SimulationResult {
    pub fn total(&self) -> Duration {
        self.laps().sum()
    }

    pub fn lap_count(&self) -> usize {
        self.stints.iter().map(|s| s.laps.len()).sum()
    }

    /// Every sampled lap in race order
    pub fn laps(&self) -> impl Iterator<Item = Duration> + '_ {
        self.stints.iter().flat_map(|s| s.laps.iter().copied())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimulatorState {
    Uninitialized,
    SessionLoaded,
    StrategyAccepted,
    Simulated,
    Compared,
}

/// Walks one driver through plan acceptance, simulation and comparison.
///
/// Steps only move forward. A step that fails leaves the simulator in the
/// state it was in so the caller can retry it with different input.
pub struct StrategySimulator<'a, 'p, P: RaceDataProvider> {
    accessor: &'a ResultsAccessor<'p, P>,
    state: SimulatorState,
    driver: Option<DriverCode>,
    plan: Option<StrategyPlan>,
    result: Option<SimulationResult>,
}

impl<'a, 'p, P: RaceDataProvider> StrategySimulator<'a, 'p, P> {
    pub fn new(accessor: &'a ResultsAccessor<'p, P>) -> Self {
        let state = if accessor.session().is_ok() {
            SimulatorState::SessionLoaded
        } else {
            SimulatorState::Uninitialized
        };
        Self {
            accessor,
            state,
            driver: None,
            plan: None,
            result: None,
        }
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn driver(&self) -> Option<&DriverCode> {
        self.driver.as_ref()
    }

    pub fn plan(&self) -> Option<&StrategyPlan> {
        self.plan.as_ref()
    }

    pub fn result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    fn expect_state(&self, wanted: SimulatorState, what: &str) -> Result<(), BoxBoxError> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(BoxBoxError::NotLoaded {
                what: format!("{what} (simulator is in state {:?})", self.state),
            })
        }
    }

    /// Pick the driver to simulate. Only drivers who completed every lap qualify.
    pub fn select_driver(&mut self, code: &DriverCode) -> Result<(), BoxBoxError> {
        self.expect_state(SimulatorState::SessionLoaded, "race session")?;
        let session = self.accessor.session()?;
        if session.result_for(code).is_none() {
            return Err(BoxBoxError::not_found(format!("driver code {code}")));
        }
        if !session.did_driver_finish(code) {
            let laps = session.driver_laps(code).count();
            return Err(BoxBoxError::ValidationFailure {
                reason: format!(
                    "Driver {code} did not finish the race ({laps} of {} laps) and cannot be used for simulation.",
                    session.total_laps
                ),
            });
        }
        self.driver = Some(code.clone());
        Ok(())
    }

    pub fn accept_strategy(
        &mut self,
        stints: Vec<PlannedStint>,
    ) -> Result<&StrategyPlan, BoxBoxError> {
        self.expect_state(SimulatorState::SessionLoaded, "race session")?;
        if self.driver.is_none() {
            return Err(BoxBoxError::NotLoaded {
                what: "driver selection".to_string(),
            });
        }
        let plan = StrategyPlan::new(stints, self.accessor.session()?.total_laps)?;
        info!("Accepted strategy with {} stints", plan.len());
        self.state = SimulatorState::StrategyAccepted;
        Ok(self.plan.insert(plan))
    }

    /// Sample a lap time for every planned lap
    pub fn simulate<R: Rng>(
        &mut self,
        rng: &mut R,
    ) -> Result<&SimulationResult, BoxBoxError> {
        self.expect_state(SimulatorState::StrategyAccepted, "accepted strategy")?;
        let (Some(driver), Some(plan)) = (&self.driver, &self.plan) else {
            return Err(BoxBoxError::NotLoaded {
                what: "accepted strategy".to_string(),
            });
        };
        let session = self.accessor.session()?;

        let mut baselines: HashMap<Compound, Option<Duration>> = HashMap::new();
        let mut result = SimulationResult::default();
        for stint in plan.stints() {
            let baseline = *baselines
                .entry(stint.compound)
                .or_insert_with(|| baseline_lap_time(session, driver, stint.compound));
            if baseline.is_none() {
                warn!(
                    "No lap times for {driver}, using the {DEFAULT_LAP_SECS}s default for {} laps",
                    stint.compound
                );
            }
            let laps = (0..stint.laps)
                .map(|_| sample_lap(baseline, stint.compound, &mut *rng))
                .collect();
            result.stints.push(SimulatedStint {
                compound: stint.compound,
                baseline,
                laps,
            });
        }
        debug!(
            "Simulated {} laps for {driver} in {:?}",
            result.lap_count(),
            result.total()
        );

        self.state = SimulatorState::Simulated;
        Ok(self.result.insert(result))
    }

    /// Compare the simulated total with the driver's real race
    pub fn compare(&mut self) -> Result<StrategyComparison, BoxBoxError> {
        self.expect_state(SimulatorState::Simulated, "simulation result")?;
        let (Some(driver), Some(plan), Some(result)) = (&self.driver, &self.plan, &self.result)
        else {
            return Err(BoxBoxError::NotLoaded {
                what: "simulation result".to_string(),
            });
        };

        let analyzer = PerformanceAnalyzer::new(self.accessor);
        let actual_time = analyzer.actual_race_time(driver)?;
        let actual_stints = analyzer.stints_for(driver)?;
        let comparison = StrategyComparison::new(
            driver.clone(),
            &actual_stints,
            plan,
            actual_time,
            result.total(),
        );

        self.state = SimulatorState::Compared;
        Ok(comparison)
    }
}
