// Race data providers: the external source of calendars, results, laps and telemetry

pub mod cache;
pub mod http;
pub mod mock;
mod wire;

pub use cache::{CacheKey, FileCache};
pub use http::HttpProvider;
pub use mock::{MockEntry, MockProvider};

use crate::BoxBoxError;
use crate::session::{CarSample, CircuitInfo, EventInfo, LapRecord, Position, RaceSelector, Session};

/// A trait for fetching race data from a motorsport data service.
///
/// Implementations can talk to live web services or serve canned data for
/// tests and offline analysis. All calls block the calling thread.
///
/// # Lifecycle
///
/// 1. Call `event_schedule()` to list the races of a season
/// 2. Call `load_race()` to fetch results and lap records for one race
/// 3. Call `lap_car_data()`, `lap_positions()` and `circuit_info()` with the
///    loaded session for telemetry and track geometry
pub trait RaceDataProvider {
    /// Retrieve the race calendar of a season, ordered by round.
    ///
    /// # Errors
    ///
    /// Returns an error if the season does not exist or the service fails.
    fn event_schedule(&self, year: u32) -> Result<Vec<EventInfo>, BoxBoxError>;

    /// Load the classification and lap records of a race.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no race matches the selector, or an upstream
    /// error if the service fails.
    fn load_race(&self, year: u32, race: &RaceSelector) -> Result<Session, BoxBoxError>;

    /// Speed channel samples recorded during a lap. Empty when the provider has
    /// no telemetry for the lap.
    fn lap_car_data(
        &self,
        session: &Session,
        lap: &LapRecord,
    ) -> Result<Vec<CarSample>, BoxBoxError>;

    /// Car position samples recorded during a lap. Empty when the provider has
    /// no position data for the lap.
    fn lap_positions(
        &self,
        session: &Session,
        lap: &LapRecord,
    ) -> Result<Vec<Position>, BoxBoxError>;

    /// Track outline, rotation and corners of the circuit the race ran on.
    fn circuit_info(&self, session: &Session) -> Result<CircuitInfo, BoxBoxError>;
}

/// Find the calendar entry a selector refers to.
///
/// Round numbers match exactly. Names are compared case-insensitively against
/// the event name, country and location, preferring exact matches over
/// partial ones.
pub fn resolve_event<'s>(
    schedule: &'s [EventInfo],
    race: &RaceSelector,
) -> Result<&'s EventInfo, BoxBoxError> {
    let found = match race {
        RaceSelector::Round(round) => schedule.iter().find(|e| e.round == *round),
        RaceSelector::Name(name) => {
            let wanted = name.trim().to_lowercase();
            if wanted.is_empty() {
                None
            } else {
                let fields = |e: &EventInfo| {
                    [
                        e.name.to_lowercase(),
                        e.country.to_lowercase(),
                        e.location.to_lowercase(),
                    ]
                };
                schedule
                    .iter()
                    .find(|e| fields(e).iter().any(|f| *f == wanted))
                    .or_else(|| {
                        schedule
                            .iter()
                            .find(|e| fields(e).iter().any(|f| f.contains(&wanted)))
                    })
            }
        }
    };

    found.ok_or_else(|| BoxBoxError::not_found(format!("race matching {race}")))
}
