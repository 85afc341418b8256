use std::collections::HashMap;

use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::BoxBoxError;
use crate::config::ProviderConfig;
use crate::session::{
    CarSample, CircuitInfo, DriverCode, EventInfo, LapRecord, Position, RaceSelector, Session,
};

use super::cache::{CacheKey, FileCache};
use super::wire::{self, DriverIds, OpenF1Session};
use super::{RaceDataProvider, resolve_event};

const JOLPICA_PAGE_SIZE: usize = 100;

/// Data provider backed by public Formula 1 web services.
///
/// Calendars, classifications and fallback lap timings come from the Jolpica
/// (Ergast compatible) API; lap records with tyre stints, car telemetry and
/// position data from OpenF1; circuit geometry from MultiViewer. Every raw
/// response goes through the on-disk [`FileCache`].
pub struct HttpProvider {
    client: Client,
    cache: FileCache,
    config: ProviderConfig,
}

impl HttpProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, BoxBoxError> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        let cache = FileCache::new(config.cache_dir.clone(), config.cache_enabled)?;
        Ok(Self {
            client,
            cache,
            config,
        })
    }

    /// GET a URL, `None` when the service reports there is no such data
    fn fetch_text(&self, url: &str) -> Result<Option<String>, BoxBoxError> {
        debug!("GET {url}");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No data at {url}");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BoxBoxError::UpstreamResponse {
                reason: format!("{url} returned status {status}"),
            });
        }
        Ok(Some(response.text()?))
    }

    /// Fetch through the cache. Bodies failing `usable`, such as the empty
    /// lists returned for a race that has not run yet, are never cached.
    fn cached(
        &self,
        key: CacheKey,
        url: &str,
        usable: impl Fn(&str) -> bool,
    ) -> Result<Option<String>, BoxBoxError> {
        self.cache.get_or_fetch(&key, || self.fetch_text(url), usable)
    }

    fn find_openf1_session(
        &self,
        year: u32,
        event: &EventInfo,
    ) -> Result<Option<OpenF1Session>, BoxBoxError> {
        let url = format!(
            "{}/sessions?year={year}&session_name=Race",
            self.config.openf1_base_url
        );
        // the season list grows during a season, refetch until it has this race
        let has_race =
            |body: &str| matches!(wire::race_session_for(body, &event.date), Ok(Some(_)));
        match self.cached(CacheKey::season(year, "openf1_race_sessions"), &url, has_race)? {
            Some(body) => wire::race_session_for(&body, &event.date),
            None => Ok(None),
        }
    }

    fn openf1_laps(
        &self,
        year: u32,
        event: &EventInfo,
        session_key: u32,
        drivers: &HashMap<u32, DriverCode>,
    ) -> Result<Vec<LapRecord>, BoxBoxError> {
        let base = &self.config.openf1_base_url;
        let laps_url = format!("{base}/laps?session_key={session_key}");
        let Some(laps_body) = self.cached(
            CacheKey::race(year, &event.name, "laps"),
            &laps_url,
            wire::is_non_empty_list,
        )?
        else {
            return Ok(Vec::new());
        };

        let stints_url = format!("{base}/stints?session_key={session_key}");
        let stints_body = self.cached(
            CacheKey::race(year, &event.name, "stints"),
            &stints_url,
            wire::is_non_empty_list,
        )?;
        if stints_body.is_none() {
            warn!("No tyre stint data for {} {year}", event.name);
        }
        wire::laps_from_openf1(&laps_body, stints_body.as_deref(), drivers)
    }

    fn jolpica_laps(
        &self,
        year: u32,
        event: &EventInfo,
        driver_ids: &DriverIds,
    ) -> Result<Vec<LapRecord>, BoxBoxError> {
        let mut laps = Vec::new();
        let mut offset = 0;
        loop {
            let url = format!(
                "{}/{year}/{}/laps.json?limit={JOLPICA_PAGE_SIZE}&offset={offset}",
                self.config.jolpica_base_url, event.round
            );
            let key = CacheKey::race(year, &event.name, &format!("timings_{offset}"));
            let Some(body) = self.cached(key, &url, wire::has_jolpica_races)? else {
                break;
            };
            let (page, total) = wire::laps_from_jolpica(&body, driver_ids)?;
            let page_was_empty = page.is_empty();
            laps.extend(page);
            offset += JOLPICA_PAGE_SIZE;
            if page_was_empty || offset >= total {
                break;
            }
        }
        laps.sort_by(|a, b| {
            a.driver
                .cmp(&b.driver)
                .then(a.lap_number.cmp(&b.lap_number))
        });
        Ok(laps)
    }

    /// Start and end timestamps of a lap, formatted for OpenF1 date filters
    fn lap_window(lap: &LapRecord) -> Result<Option<(String, String)>, BoxBoxError> {
        let (Some(started_at), Some(lap_time)) = (&lap.started_at, lap.lap_time) else {
            return Ok(None);
        };
        let invalid = |reason: String| BoxBoxError::UpstreamResponse { reason };
        let start = OffsetDateTime::parse(started_at, &Rfc3339)
            .map_err(|e| invalid(format!("invalid lap start '{started_at}': {e}")))?;
        let end = start + lap_time;
        let format = |t: OffsetDateTime| {
            t.format(&Rfc3339)
                .map(|s| s.replace('+', "%2B"))
                .map_err(|e| invalid(format!("cannot format lap window: {e}")))
        };
        Ok(Some((format(start)?, format(end)?)))
    }

    fn lap_series(
        &self,
        endpoint: &str,
        session: &Session,
        lap: &LapRecord,
    ) -> Result<Option<String>, BoxBoxError> {
        let Some(session_key) = session.session_key else {
            debug!("No telemetry session for {}", session.event.name);
            return Ok(None);
        };
        let Some((start, end)) = Self::lap_window(lap)? else {
            debug!(
                "Lap {} of {} has no time window, skipping {endpoint}",
                lap.lap_number, lap.driver
            );
            return Ok(None);
        };
        let url = format!(
            "{}/{endpoint}?session_key={session_key}&driver_number={}&date>={start}&date<={end}",
            self.config.openf1_base_url, lap.driver_number
        );
        let key = CacheKey::race(
            session.year,
            &session.event.name,
            &format!("{endpoint}_{}_{}", lap.driver_number, lap.lap_number),
        );
        self.cached(key, &url, wire::is_non_empty_list)
    }
}

impl RaceDataProvider for HttpProvider {
    fn event_schedule(&self, year: u32) -> Result<Vec<EventInfo>, BoxBoxError> {
        let url = format!("{}/{year}.json?limit=100", self.config.jolpica_base_url);
        let body = self
            .cached(CacheKey::season(year, "schedule"), &url, wire::has_jolpica_races)?
            .ok_or_else(|| BoxBoxError::not_found(format!("calendar for {year}")))?;
        let events = wire::schedule_from_jolpica(&body)?;
        if events.is_empty() {
            return Err(BoxBoxError::not_found(format!("races in {year}")));
        }
        Ok(events)
    }

    fn load_race(&self, year: u32, race: &RaceSelector) -> Result<Session, BoxBoxError> {
        let schedule = self.event_schedule(year)?;
        let event = resolve_event(&schedule, race)?.clone();

        let results_url = format!(
            "{}/{year}/{}/results.json?limit=100",
            self.config.jolpica_base_url, event.round
        );
        let results_body = self
            .cached(
                CacheKey::race(year, &event.name, "results"),
                &results_url,
                wire::has_results,
            )?
            .ok_or_else(|| BoxBoxError::not_found(format!("results of {} {year}", event.name)))?;
        let (results, driver_ids) = wire::results_from_jolpica(&results_body)?;
        if results.is_empty() {
            return Err(BoxBoxError::not_found(format!(
                "results of {} {year}, the race might not have happened yet",
                event.name
            )));
        }

        let drivers: HashMap<u32, DriverCode> = results
            .iter()
            .map(|r| (r.number, r.code.clone()))
            .collect();
        let openf1_session = self.find_openf1_session(year, &event)?;
        let mut laps = match &openf1_session {
            Some(s) => self.openf1_laps(year, &event, s.session_key, &drivers)?,
            None => Vec::new(),
        };
        if laps.is_empty() {
            warn!(
                "No lap records with tyre data for {} {year}, using lap timings only",
                event.name
            );
            laps = self.jolpica_laps(year, &event, &driver_ids)?;
        }

        let mut session = Session::new(year, event, results, laps);
        session.session_key = openf1_session.as_ref().map(|s| s.session_key);
        session.circuit_key = openf1_session.and_then(|s| s.circuit_key);
        info!(
            "Loaded {} {} with {} drivers and {} laps",
            session.event.name,
            year,
            session.results.len(),
            session.total_laps
        );
        Ok(session)
    }

    fn lap_car_data(
        &self,
        session: &Session,
        lap: &LapRecord,
    ) -> Result<Vec<CarSample>, BoxBoxError> {
        match self.lap_series("car_data", session, lap)? {
            Some(body) => wire::car_samples_from_openf1(&body),
            None => Ok(Vec::new()),
        }
    }

    fn lap_positions(
        &self,
        session: &Session,
        lap: &LapRecord,
    ) -> Result<Vec<Position>, BoxBoxError> {
        match self.lap_series("location", session, lap)? {
            Some(body) => wire::positions_from_openf1(&body),
            None => Ok(Vec::new()),
        }
    }

    fn circuit_info(&self, session: &Session) -> Result<CircuitInfo, BoxBoxError> {
        let circuit_key = session.circuit_key.ok_or_else(|| {
            BoxBoxError::not_found(format!("circuit details for {}", session.event.name))
        })?;
        let url = format!(
            "{}/api/v1/circuits/{circuit_key}/{}",
            self.config.multiviewer_base_url, session.year
        );
        let body = self
            .cached(
                CacheKey::race(session.year, &session.event.name, "circuit"),
                &url,
                |_| true,
            )?
            .ok_or_else(|| {
                BoxBoxError::not_found(format!("circuit details for {}", session.event.name))
            })?;
        wire::circuit_from_multiviewer(&body)
    }
}
