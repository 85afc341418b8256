// Interactive prompt loop tying the accessor, analysis, simulator and charts together

pub mod prompts;

use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use log::{debug, error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::BoxBoxError;
use crate::analysis::{PerformanceAnalyzer, format_stint_table};
use crate::config::AppConfig;
use crate::provider::RaceDataProvider;
use crate::session::{DriverCode, EventInfo, RaceSelector, ResultsAccessor};
use crate::strategy::{PlannedStint, StrategyPlan, StrategySimulator};
use crate::visualize::Visualizer;

use prompts::{DriverSelection, Prompter, parse_driver_selection, parse_race_selector, parse_year};

/// Minimum stints of a plan, a dry race requires one compound change
const MIN_STINTS: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellOptions {
    pub output_dir: PathBuf,
    pub charts_enabled: bool,
    /// Fixed seed for the simulator, drawn from the OS when absent
    pub seed: Option<u64>,
}

impl ShellOptions {
    pub fn from_config(config: &AppConfig, seed: Option<u64>) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            charts_enabled: config.charts_enabled,
            seed,
        }
    }
}

/// Render the season calendar as a table
pub fn format_calendar(events: &[EventInfo]) -> String {
    let mut table = format!(
        "{:>11}  {:<30} {:<20} {}\n",
        "RoundNumber", "EventName", "Country", "Location"
    );
    for event in events {
        let _ = writeln!(
            table,
            "{:>11}  {:<30} {:<20} {}",
            event.round, event.name, event.country, event.location
        );
    }
    table
}

pub struct Shell<'p, P: RaceDataProvider, R, W> {
    provider: &'p P,
    prompt: Prompter<R, W>,
    visualizer: Option<Visualizer>,
    rng: StdRng,
}

impl<'p, P: RaceDataProvider, R: BufRead, W: Write> Shell<'p, P, R, W> {
    pub fn new(provider: &'p P, input: R, output: W, options: ShellOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            provider,
            prompt: Prompter::new(input, output),
            visualizer: options
                .charts_enabled
                .then(|| Visualizer::new(options.output_dir)),
            rng,
        }
    }

    pub fn into_output(self) -> W {
        self.prompt.into_output()
    }

    /// Run until the user stops or the input is closed
    pub fn run(&mut self) -> Result<(), BoxBoxError> {
        match self.race_loop() {
            Err(BoxBoxError::InputClosed) => {
                debug!("Input closed, leaving the shell");
                Ok(())
            }
            other => other,
        }
    }

    fn race_loop(&mut self) -> Result<(), BoxBoxError> {
        loop {
            let (year, race) = self.race_details()?;
            self.analyze_race(year, &race)?;
            if !self
                .prompt
                .ask_yes_no("\nWould you like to analyze another race? (Yes/No): ")?
            {
                return Ok(());
            }
        }
    }

    fn race_details(&mut self) -> Result<(u32, RaceSelector), BoxBoxError> {
        let accessor = ResultsAccessor::new(self.provider);
        loop {
            let input = self.prompt.ask("Enter the race year (2018-Current): ")?;
            let year = match parse_year(&input) {
                Ok(year) => year,
                Err(e) => {
                    self.prompt.say(e)?;
                    continue;
                }
            };
            let calendar = match accessor.calendar(year) {
                Ok(calendar) => calendar,
                Err(e) => {
                    error!("Failed to fetch the {year} calendar: {e}");
                    self.prompt
                        .say(format!("Failed to fetch the race calendar ({e}). Please try again."))?;
                    continue;
                }
            };
            self.prompt.say("\nHere are the races for the selected year:")?;
            self.prompt.say(format_calendar(&calendar).trim_end())?;

            loop {
                let input = self
                    .prompt
                    .ask("\nEnter the desired race (e.g., 'Monaco' or '6'): ")?;
                match parse_race_selector(&input, &calendar) {
                    Ok(race) => return Ok((year, race)),
                    Err(e) => self.prompt.say(e)?,
                }
            }
        }
    }

    fn analyze_race(&mut self, year: u32, race: &RaceSelector) -> Result<(), BoxBoxError> {
        let mut accessor = ResultsAccessor::new(self.provider);
        loop {
            let choice = self
                .prompt
                .ask("Enter '1' for Data Analysis or '2' for Race Strategy Simulation: ")?;
            let choice = choice.trim();
            if choice != "1" && choice != "2" {
                self.prompt.say("Invalid option selected. Please try again.")?;
                continue;
            }

            if let Err(e) = accessor.load_session(year, race) {
                error!("Loading {race} {year} failed: {e}");
                self.prompt.say(format!(
                    "No data found for the race, the race might not have occurred ({e})."
                ))?;
                continue;
            }
            if !self.validate_data(&accessor)? {
                continue;
            }
            self.draw_track_map(&accessor);

            if choice == "1" {
                self.data_analysis(&accessor)?;
            } else {
                self.strategy_simulation(&accessor)?;
            }
            return Ok(());
        }
    }

    fn validate_data(&mut self, accessor: &ResultsAccessor<'p, P>) -> Result<bool, BoxBoxError> {
        let message = match (accessor.results(), accessor.laps()) {
            (Ok(results), _) if results.is_empty() => "No race results data available.",
            (_, Ok(laps)) if laps.is_empty() => "Failed to load lap data.",
            (Ok(_), Ok(_)) => {
                self.prompt.say("\nSuccessfully loaded data for the race.")?;
                return Ok(true);
            }
            _ => "No data found for the race. The race might not have occurred.",
        };
        self.prompt.say(message)?;
        Ok(false)
    }

    fn draw_track_map(&self, accessor: &ResultsAccessor<'p, P>) {
        if let Some(visualizer) = &self.visualizer {
            if let Err(e) = visualizer.track_map(accessor) {
                error!("Could not draw the track map: {e}");
            }
        }
    }

    fn draw_strategies(
        &self,
        accessor: &ResultsAccessor<'p, P>,
        simulated: Option<(&DriverCode, &StrategyPlan)>,
    ) {
        if let Some(visualizer) = &self.visualizer {
            if let Err(e) = visualizer.strategies(accessor, simulated) {
                error!("Could not draw the strategy chart: {e}");
            }
        }
    }

    fn drivers_to_analyze(
        &mut self,
        accessor: &ResultsAccessor<'p, P>,
    ) -> Result<Vec<DriverCode>, BoxBoxError> {
        loop {
            let input = self.prompt.ask(
                "\nEnter DriverID(s) to analyze or simulate (e.g., 'HAM' or '44') or type 'all' for all drivers: ",
            )?;
            let drivers: Vec<DriverCode> = match parse_driver_selection(&input) {
                DriverSelection::All => accessor.drivers().cloned().collect(),
                DriverSelection::Ids(ids) => ids
                    .iter()
                    .filter_map(|id| accessor.resolve_driver(id))
                    .collect(),
            };
            if !drivers.is_empty() {
                return Ok(drivers);
            }
            self.prompt.say("Invalid DriverID(s). Please try again.")?;
        }
    }

    fn data_analysis(&mut self, accessor: &ResultsAccessor<'p, P>) -> Result<(), BoxBoxError> {
        self.prompt.say(accessor.driver_mappings().trim_end())?;
        let drivers = self.drivers_to_analyze(accessor)?;
        let analyzer = PerformanceAnalyzer::new(accessor);

        for code in &drivers {
            self.prompt.say(format!("\nAnalysis for Driver {code}:"))?;
            match analyzer.summarize(code) {
                Ok(summary) => self.prompt.say(summary)?,
                Err(e) => self.prompt.say(e)?,
            }
            match analyzer.stints_for(code) {
                Ok(stints) if !stints.is_empty() => {
                    self.prompt.say("Tire and Compound Data:")?;
                    self.prompt.say(format_stint_table(&stints).trim_end())?;
                }
                Ok(_) => self
                    .prompt
                    .say("No tire and compound data available for the selected driver.")?,
                Err(e) => self.prompt.say(e)?,
            }
            self.prompt.say("-".repeat(40))?;
        }

        if self.prompt.ask_yes_no(
            "Would you like to compare the selected driver(s) with the race winner? (Yes/No): ",
        )? {
            match analyzer.compare_to_winner() {
                Ok(report) => self.prompt.say(report)?,
                Err(e) => self.prompt.say(e)?,
            }
        }

        self.draw_strategies(accessor, None);
        Ok(())
    }

    fn driver_to_simulate(
        &mut self,
        accessor: &ResultsAccessor<'p, P>,
    ) -> Result<DriverCode, BoxBoxError> {
        loop {
            let input = self
                .prompt
                .ask("Enter the DriverID or Driver Number to simulate (e.g., 'HAM' or '44'): ")?;
            match accessor.resolve_driver(&input.trim().to_uppercase()) {
                Some(code) => return Ok(code),
                None => self.prompt.say("Invalid DriverID. Please try again.")?,
            }
        }
    }

    fn planned_stints(&mut self) -> Result<Vec<PlannedStint>, BoxBoxError> {
        let stint_count = loop {
            let input = self
                .prompt
                .ask("\nHow many stints do you want to plan? (at least 2): ")?;
            match input.trim().parse::<u32>() {
                Ok(count) if count >= MIN_STINTS => break count,
                Ok(_) => self
                    .prompt
                    .say("You need to plan at least 2 stints. Please try again.")?,
                Err(_) => self.prompt.say(
                    "Invalid input. Please enter numerical values for the number of stints and laps.",
                )?,
            }
        };

        let mut stints = Vec::with_capacity(stint_count as usize);
        for stint_number in 1..=stint_count {
            loop {
                self.prompt
                    .say("\nCompound options:\nSoft\nMedium\nHard\nWet\nIntermediate")?;
                let input = self.prompt.ask(&format!(
                    "Enter compound and laps for stint {stint_number} (e.g., 'Soft 20'): "
                ))?;
                match input.parse::<PlannedStint>() {
                    Ok(stint) => {
                        stints.push(stint);
                        break;
                    }
                    Err(e) => self.prompt.say(format!("{e}. Please try again."))?,
                }
            }
        }
        Ok(stints)
    }

    fn strategy_simulation(
        &mut self,
        accessor: &ResultsAccessor<'p, P>,
    ) -> Result<(), BoxBoxError> {
        let mut simulator = StrategySimulator::new(accessor);
        self.prompt.say(accessor.driver_mappings().trim_end())?;

        let driver = self.driver_to_simulate(accessor)?;
        if let Err(e) = simulator.select_driver(&driver) {
            self.prompt.say(e)?;
            return Ok(());
        }

        let session = accessor.session()?;
        self.prompt.say(format!(
            "There are {} total laps in the {} of {}.",
            session.total_laps, session.event.name, session.year
        ))?;
        loop {
            let stints = self.planned_stints()?;
            match simulator.accept_strategy(stints) {
                Ok(_) => {
                    self.prompt.say("\nStrategy accepted.")?;
                    break;
                }
                Err(e) => self
                    .prompt
                    .say(format!("\n{e}\nPlease revise your strategy."))?,
            }
        }

        let result = simulator.simulate(&mut self.rng)?;
        info!(
            "Simulated {} laps for {driver}, total {:?}",
            result.lap_count(),
            result.total()
        );
        match simulator.compare() {
            Ok(comparison) => self.prompt.say(format!("\n{comparison}\n"))?,
            Err(e) => self
                .prompt
                .say(format!("No actual race time found for driver {driver}: {e}"))?,
        }

        if let Some(plan) = simulator.plan() {
            self.draw_strategies(accessor, Some((&driver, plan)));
        }
        Ok(())
    }
}
