use std::fmt::Display;
use std::io::{BufRead, Write};

use crate::BoxBoxError;
use crate::session::{EventInfo, RaceSelector};

/// First season the data services cover
pub const FIRST_SUPPORTED_YEAR: u32 = 2018;

/// Line oriented prompts over any reader and writer
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line
    pub fn say(&mut self, text: impl Display) -> Result<(), BoxBoxError> {
        writeln!(self.output, "{text}").map_err(|e| BoxBoxError::OutputIOError { source: e })
    }

    /// Print a question and read the answer, without its line ending.
    /// A closed input stream is reported as [`BoxBoxError::InputClosed`].
    pub fn ask(&mut self, question: &str) -> Result<String, BoxBoxError> {
        write!(self.output, "{question}")
            .and_then(|_| self.output.flush())
            .map_err(|e| BoxBoxError::OutputIOError { source: e })?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| BoxBoxError::InputIOError { source: e })?;
        if read == 0 {
            return Err(BoxBoxError::InputClosed);
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    /// `true` only for a case-insensitive "yes"
    pub fn ask_yes_no(&mut self, question: &str) -> Result<bool, BoxBoxError> {
        Ok(self.ask(question)?.trim().eq_ignore_ascii_case("yes"))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

pub fn parse_year(input: &str) -> Result<u32, BoxBoxError> {
    let year: u32 = input
        .trim()
        .parse()
        .map_err(|_| BoxBoxError::invalid_input("year", "Please enter a valid year."))?;
    if year < FIRST_SUPPORTED_YEAR {
        return Err(BoxBoxError::invalid_input(
            "year",
            format!(
                "Data can only be loaded for years {FIRST_SUPPORTED_YEAR} and onwards. Please enter a valid year."
            ),
        ));
    }
    Ok(year)
}

/// A round number must appear in the calendar, anything else is taken as a race name
pub fn parse_race_selector(
    input: &str,
    calendar: &[EventInfo],
) -> Result<RaceSelector, BoxBoxError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(BoxBoxError::invalid_input(
            "race",
            "No race found with the provided name. Please try again.",
        ));
    }
    if input.bytes().all(|b| b.is_ascii_digit()) {
        let round: u32 = input.parse().map_err(|_| {
            BoxBoxError::invalid_input("race", format!("'{input}' is not a round number"))
        })?;
        return calendar
            .iter()
            .find(|e| e.round == round)
            .map(|_| RaceSelector::Round(round))
            .ok_or_else(|| {
                BoxBoxError::not_found(format!(
                    "race for round number {round}. Please try again."
                ))
            });
    }
    Ok(RaceSelector::Name(input.to_string()))
}

/// What the user asked for at the driver prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSelection {
    All,
    /// Upper-cased codes or car numbers, not validated yet
    Ids(Vec<String>),
}

/// Split on any run of commas, semicolons and spaces
pub fn parse_driver_selection(input: &str) -> DriverSelection {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return DriverSelection::All;
    }
    DriverSelection::Ids(
        input
            .split([',', ';', ' '])
            .filter(|id| !id.is_empty())
            .map(str::to_uppercase)
            .collect(),
    )
}
