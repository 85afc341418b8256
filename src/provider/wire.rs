// Response shapes of the Jolpica, OpenF1 and MultiViewer services and their
// conversion into session types

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::BoxBoxError;
use crate::session::{
    CarSample, CircuitInfo, Compound, Corner, DriverCode, DriverResult, EventInfo, LapRecord,
    Position, parse_race_time,
};

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, BoxBoxError> {
    serde_json::from_str(body).map_err(|e| BoxBoxError::DeserializeError { source: e })
}

/// A JSON array with at least one element
pub(crate) fn is_non_empty_list(body: &str) -> bool {
    parse_json::<Vec<IgnoredAny>>(body).is_ok_and(|items| !items.is_empty())
}

/// A Jolpica response listing at least one race
pub(crate) fn has_jolpica_races(body: &str) -> bool {
    parse_json::<JolpicaResponse<IgnoredAny>>(body)
        .is_ok_and(|response| !response.mr_data.race_table.races.is_empty())
}

/// A Jolpica results response with at least one classified driver
pub(crate) fn has_results(body: &str) -> bool {
    results_from_jolpica(body).is_ok_and(|(results, _)| !results.is_empty())
}

// Jolpica (Ergast compatible) responses

#[derive(Deserialize, Debug)]
struct JolpicaResponse<T> {
    #[serde(rename = "MRData")]
    mr_data: MrData<T>,
}

#[derive(Deserialize, Debug)]
struct MrData<T> {
    #[serde(default)]
    total: Option<String>,
    #[serde(rename = "RaceTable")]
    race_table: RaceTable<T>,
}

#[derive(Deserialize, Debug)]
struct RaceTable<T> {
    #[serde(rename = "Races", default = "Vec::new")]
    races: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct ScheduleRace {
    round: String,
    #[serde(rename = "raceName")]
    race_name: String,
    #[serde(rename = "Circuit")]
    circuit: JolpicaCircuit,
    date: String,
}

#[derive(Deserialize, Debug)]
struct JolpicaCircuit {
    #[serde(rename = "Location")]
    location: JolpicaLocation,
}

#[derive(Deserialize, Debug)]
struct JolpicaLocation {
    locality: String,
    country: String,
}

#[derive(Deserialize, Debug)]
struct ResultsRace {
    #[serde(rename = "Results", default)]
    results: Vec<ResultRow>,
}

#[derive(Deserialize, Debug)]
struct ResultRow {
    number: String,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    points: Option<String>,
    #[serde(default)]
    grid: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Driver")]
    driver: JolpicaDriver,
    #[serde(rename = "Time", default)]
    time: Option<TimeValue>,
}

#[derive(Deserialize, Debug)]
struct JolpicaDriver {
    #[serde(rename = "driverId")]
    driver_id: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TimeValue {
    time: String,
}

#[derive(Deserialize, Debug)]
struct LapsRace {
    #[serde(rename = "Laps", default)]
    laps: Vec<LapRow>,
}

#[derive(Deserialize, Debug)]
struct LapRow {
    number: String,
    #[serde(rename = "Timings", default)]
    timings: Vec<Timing>,
}

#[derive(Deserialize, Debug)]
struct Timing {
    #[serde(rename = "driverId")]
    driver_id: String,
    #[serde(default)]
    time: Option<String>,
}

/// Jolpica driver ids mapped to the canonical code and car number
pub(crate) type DriverIds = HashMap<String, (DriverCode, u32)>;

pub(crate) fn schedule_from_jolpica(body: &str) -> Result<Vec<EventInfo>, BoxBoxError> {
    let response: JolpicaResponse<ScheduleRace> = parse_json(body)?;
    let mut events = response
        .mr_data
        .race_table
        .races
        .into_iter()
        .filter_map(|race| match race.round.parse() {
            Ok(round) => Some(EventInfo {
                round,
                name: race.race_name,
                country: race.circuit.location.country,
                location: race.circuit.location.locality,
                date: race.date,
            }),
            Err(_) => {
                warn!("Skipping calendar entry with invalid round '{}'", race.round);
                None
            }
        })
        .collect::<Vec<_>>();
    events.sort_by_key(|e| e.round);
    Ok(events)
}

fn parse_optional_u32(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

fn parse_optional_time(value: Option<&TimeValue>, context: &str) -> Option<Duration> {
    let text = &value?.time;
    match parse_race_time(text) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!("Ignoring unparseable {context} '{text}': {e}");
            None
        }
    }
}

pub(crate) fn results_from_jolpica(
    body: &str,
) -> Result<(Vec<DriverResult>, DriverIds), BoxBoxError> {
    let response: JolpicaResponse<ResultsRace> = parse_json(body)?;
    let rows = response
        .mr_data
        .race_table
        .races
        .into_iter()
        .next()
        .map(|race| race.results)
        .unwrap_or_default();

    let mut results = Vec::with_capacity(rows.len());
    let mut driver_ids = DriverIds::new();
    for row in rows {
        let code = match row.driver.code.as_deref().map(DriverCode::new) {
            Some(Ok(code)) => code,
            _ => {
                warn!(
                    "Skipping result for driver '{}' without a valid code",
                    row.driver.driver_id
                );
                continue;
            }
        };
        let Ok(number) = row.number.trim().parse::<u32>() else {
            warn!("Skipping result for {} with car number '{}'", code, row.number);
            continue;
        };

        driver_ids.insert(row.driver.driver_id.clone(), (code.clone(), number));
        results.push(DriverResult {
            code,
            number,
            grid_position: parse_optional_u32(row.grid.as_deref()),
            position: parse_optional_u32(row.position.as_deref()),
            points: row
                .points
                .as_deref()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(0.),
            time: parse_optional_time(row.time.as_ref(), "race time"),
            status: row.status.unwrap_or_default(),
        });
    }
    Ok((results, driver_ids))
}

/// Lap records of one page of Jolpica lap timings plus the total number of
/// timings across all pages
pub(crate) fn laps_from_jolpica(
    body: &str,
    driver_ids: &DriverIds,
) -> Result<(Vec<LapRecord>, usize), BoxBoxError> {
    let response: JolpicaResponse<LapsRace> = parse_json(body)?;
    let total = response
        .mr_data
        .total
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);

    let mut laps = Vec::new();
    for race in response.mr_data.race_table.races {
        for lap_row in race.laps {
            let Ok(lap_number) = lap_row.number.parse::<u32>() else {
                warn!("Skipping lap with invalid number '{}'", lap_row.number);
                continue;
            };
            for timing in lap_row.timings {
                let Some((code, number)) = driver_ids.get(&timing.driver_id) else {
                    debug!("No classified driver for lap timing of '{}'", timing.driver_id);
                    continue;
                };
                let lap_time = timing
                    .time
                    .as_deref()
                    .and_then(|t| parse_race_time(t).ok());
                laps.push(LapRecord {
                    driver: code.clone(),
                    driver_number: *number,
                    lap_number,
                    lap_time,
                    stint: None,
                    compound: None,
                    started_at: None,
                });
            }
        }
    }
    Ok((laps, total))
}

// OpenF1 responses

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct OpenF1Session {
    pub(crate) session_key: u32,
    #[serde(default)]
    pub(crate) circuit_key: Option<u32>,
    pub(crate) date_start: String,
}

#[derive(Deserialize, Debug)]
struct OpenF1Lap {
    driver_number: u32,
    lap_number: u32,
    #[serde(default)]
    lap_duration: Option<f64>,
    #[serde(default)]
    date_start: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenF1Stint {
    driver_number: u32,
    stint_number: u32,
    #[serde(default)]
    lap_start: Option<u32>,
    #[serde(default)]
    lap_end: Option<u32>,
    #[serde(default)]
    compound: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenF1CarData {
    #[serde(default)]
    speed: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct OpenF1Location {
    x: f64,
    y: f64,
}

/// Pick the race session starting on the event's race day
pub(crate) fn race_session_for(
    body: &str,
    race_date: &str,
) -> Result<Option<OpenF1Session>, BoxBoxError> {
    let sessions: Vec<OpenF1Session> = parse_json(body)?;
    Ok(sessions
        .into_iter()
        .find(|s| s.date_start.starts_with(race_date)))
}

pub(crate) fn laps_from_openf1(
    laps_body: &str,
    stints_body: Option<&str>,
    drivers: &HashMap<u32, DriverCode>,
) -> Result<Vec<LapRecord>, BoxBoxError> {
    let raw_laps: Vec<OpenF1Lap> = parse_json(laps_body)?;
    let stints: Vec<OpenF1Stint> = match stints_body {
        Some(body) => parse_json(body)?,
        None => Vec::new(),
    };

    let mut laps = Vec::with_capacity(raw_laps.len());
    for raw in raw_laps {
        let Some(code) = drivers.get(&raw.driver_number) else {
            debug!("No classified driver for car number {}", raw.driver_number);
            continue;
        };
        let stint = stints.iter().find(|s| {
            s.driver_number == raw.driver_number
                && s.lap_start.is_some_and(|start| start <= raw.lap_number)
                && s.lap_end.is_none_or(|end| raw.lap_number <= end)
        });
        let compound = stint
            .and_then(|s| s.compound.as_deref())
            .and_then(|c| match c.parse::<Compound>() {
                Ok(compound) => Some(compound),
                Err(_) => {
                    debug!("Unknown compound '{c}' for car {}", raw.driver_number);
                    None
                }
            });
        let lap_time = raw
            .lap_duration
            .filter(|secs| secs.is_finite() && *secs > 0.)
            .map(Duration::from_secs_f64);

        laps.push(LapRecord {
            driver: code.clone(),
            driver_number: raw.driver_number,
            lap_number: raw.lap_number,
            lap_time,
            stint: stint.map(|s| s.stint_number),
            compound,
            started_at: raw.date_start,
        });
    }
    laps.sort_by(|a, b| {
        a.driver
            .cmp(&b.driver)
            .then(a.lap_number.cmp(&b.lap_number))
    });
    Ok(laps)
}

pub(crate) fn car_samples_from_openf1(body: &str) -> Result<Vec<CarSample>, BoxBoxError> {
    let data: Vec<OpenF1CarData> = parse_json(body)?;
    Ok(data
        .into_iter()
        .filter_map(|d| d.speed)
        .map(|speed_kph| CarSample { speed_kph })
        .collect())
}

pub(crate) fn positions_from_openf1(body: &str) -> Result<Vec<Position>, BoxBoxError> {
    let data: Vec<OpenF1Location> = parse_json(body)?;
    Ok(data.into_iter().map(|l| Position::new(l.x, l.y)).collect())
}

// MultiViewer circuit response

#[derive(Deserialize, Debug)]
struct MultiViewerCircuit {
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    x: Vec<f64>,
    #[serde(default)]
    y: Vec<f64>,
    #[serde(default)]
    corners: Vec<MultiViewerCorner>,
}

#[derive(Deserialize, Debug)]
struct MultiViewerCorner {
    number: u32,
    #[serde(default)]
    letter: String,
    #[serde(default)]
    angle: f64,
    #[serde(rename = "trackPosition")]
    track_position: MultiViewerPoint,
}

#[derive(Deserialize, Debug)]
struct MultiViewerPoint {
    x: f64,
    y: f64,
}

pub(crate) fn circuit_from_multiviewer(body: &str) -> Result<CircuitInfo, BoxBoxError> {
    let circuit: MultiViewerCircuit = parse_json(body)?;
    if circuit.x.len() != circuit.y.len() {
        warn!(
            "Circuit outline has {} x and {} y values, truncating",
            circuit.x.len(),
            circuit.y.len()
        );
    }
    Ok(CircuitInfo {
        rotation_deg: circuit.rotation,
        outline: circuit
            .x
            .iter()
            .zip(circuit.y.iter())
            .map(|(x, y)| Position::new(*x, *y))
            .collect(),
        corners: circuit
            .corners
            .into_iter()
            .map(|c| Corner {
                number: c.number,
                letter: c.letter,
                angle_deg: c.angle,
                position: Position::new(c.track_position.x, c.track_position.y),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"{"MRData":{"RaceTable":{"season":"2023","Races":[
        {"season":"2023","round":"6","raceName":"Monaco Grand Prix","date":"2023-05-28",
         "Circuit":{"circuitId":"monaco","Location":{"locality":"Monte-Carlo","country":"Monaco"}}},
        {"season":"2023","round":"1","raceName":"Bahrain Grand Prix","date":"2023-03-05",
         "Circuit":{"circuitId":"bahrain","Location":{"locality":"Sakhir","country":"Bahrain"}}}
    ]}}}"#;

    const RESULTS: &str = r#"{"MRData":{"RaceTable":{"Races":[{"Results":[
        {"number":"1","position":"1","points":"25","grid":"1","status":"Finished",
         "Driver":{"driverId":"max_verstappen","code":"VER"},
         "Time":{"millis":"5412345","time":"1:30:12.345"},
         "FastestLap":{"rank":"3","lap":"40","Time":{"time":"1:16.604"}}},
        {"number":"14","position":"2","points":"18","grid":"2","status":"Finished",
         "Driver":{"driverId":"alonso","code":"ALO"},
         "Time":{"millis":"5439266","time":"+26.921"}},
        {"number":"2","position":"20","points":"0","grid":"19","status":"Retired",
         "Driver":{"driverId":"sargeant","code":"SAR"}},
        {"number":"99","position":"21","points":"0","grid":"20","status":"Retired",
         "Driver":{"driverId":"nobody"}}
    ]}]}}}"#;

    #[test]
    fn test_schedule_is_sorted_by_round() {
        let events = schedule_from_jolpica(SCHEDULE).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].round, 1);
        assert_eq!(events[1].name, "Monaco Grand Prix");
        assert_eq!(events[1].location, "Monte-Carlo");
        assert_eq!(events[1].date, "2023-05-28");
    }

    #[test]
    fn test_results_conversion() {
        let (results, driver_ids) = results_from_jolpica(RESULTS).unwrap();
        assert_eq!(results.len(), 3, "row without a code is skipped");

        let winner = &results[0];
        assert_eq!(winner.code.as_str(), "VER");
        assert_eq!(winner.position, Some(1));
        assert_eq!(winner.points, 25.);
        assert_eq!(winner.time, Some(Duration::from_millis(5_412_345)));

        assert_eq!(results[1].time, Some(Duration::from_millis(26_921)));
        assert_eq!(results[2].time, None);
        assert_eq!(results[2].status, "Retired");

        assert_eq!(driver_ids["alonso"].1, 14);
    }

    #[test]
    fn test_jolpica_laps_conversion() {
        let (_, driver_ids) = results_from_jolpica(RESULTS).unwrap();
        let body = r#"{"MRData":{"total":"250","RaceTable":{"Races":[{"Laps":[
            {"number":"1","Timings":[
                {"driverId":"max_verstappen","position":"1","time":"1:20.101"},
                {"driverId":"alonso","position":"2","time":"1:20.900"},
                {"driverId":"unknown_driver","position":"3","time":"1:21.000"}]}
        ]}]}}}"#;

        let (laps, total) = laps_from_jolpica(body, &driver_ids).unwrap();
        assert_eq!(total, 250);
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0].lap_time, Some(Duration::from_millis(80_101)));
        assert!(laps.iter().all(|l| l.compound.is_none() && l.stint.is_none()));
    }

    #[test]
    fn test_openf1_laps_join_stints() {
        let drivers = HashMap::from([(1, DriverCode::new("VER").unwrap())]);
        let laps_body = r#"[
            {"driver_number":1,"lap_number":2,"lap_duration":80.5,"date_start":"2023-05-28T13:05:00.000000+00:00"},
            {"driver_number":1,"lap_number":1,"lap_duration":null,"date_start":null},
            {"driver_number":1,"lap_number":3,"lap_duration":79.25},
            {"driver_number":44,"lap_number":1,"lap_duration":81.0}
        ]"#;
        let stints_body = r#"[
            {"driver_number":1,"stint_number":1,"lap_start":1,"lap_end":2,"compound":"MEDIUM"},
            {"driver_number":1,"stint_number":2,"lap_start":3,"lap_end":3,"compound":"UNKNOWN"}
        ]"#;

        let laps = laps_from_openf1(laps_body, Some(stints_body), &drivers).unwrap();
        assert_eq!(laps.len(), 3);
        assert_eq!(laps[0].lap_number, 1);
        assert_eq!(laps[0].lap_time, None);
        assert_eq!(laps[1].compound, Some(Compound::Medium));
        assert_eq!(laps[1].stint, Some(1));
        assert_eq!(laps[2].stint, Some(2));
        assert_eq!(laps[2].compound, None);
        assert_eq!(laps[1].lap_time, Some(Duration::from_millis(80_500)));
    }

    #[test]
    fn test_race_session_matches_date() {
        let body = r#"[
            {"session_key":9093,"circuit_key":22,"date_start":"2023-05-27T14:00:00+00:00"},
            {"session_key":9094,"circuit_key":22,"date_start":"2023-05-28T13:00:00+00:00"}
        ]"#;
        let session = race_session_for(body, "2023-05-28").unwrap().unwrap();
        assert_eq!(session.session_key, 9094);
        assert!(race_session_for(body, "2023-06-04").unwrap().is_none());
    }

    #[test]
    fn test_circuit_conversion() {
        let body = r#"{"rotation":44.0,"x":[0.0,10.0,20.0],"y":[5.0,6.0,7.0],
            "corners":[{"number":1,"letter":"a","angle":90.0,"length":100.0,
            "trackPosition":{"x":10.0,"y":6.0}}]}"#;
        let circuit = circuit_from_multiviewer(body).unwrap();
        assert_eq!(circuit.rotation_deg, 44.0);
        assert_eq!(circuit.outline.len(), 3);
        assert_eq!(circuit.corners[0].label(), "1a");
        assert_eq!(circuit.corners[0].position, Position::new(10.0, 6.0));
    }

    #[test]
    fn test_telemetry_conversion() {
        let speeds = car_samples_from_openf1(r#"[{"speed":301},{"speed":null},{"speed":288.0}]"#)
            .unwrap();
        assert_eq!(speeds.len(), 2);
        assert_eq!(speeds[0].speed_kph, 301.);

        let positions = positions_from_openf1(r#"[{"x":1.0,"y":2.0,"z":0.0}]"#).unwrap();
        assert_eq!(positions, vec![Position::new(1.0, 2.0)]);
    }

    #[test]
    fn test_usable_response_checks() {
        assert!(is_non_empty_list(r#"[{"session_key":1}]"#));
        assert!(!is_non_empty_list("[]"));
        assert!(!is_non_empty_list("{}"));

        let no_races = r#"{"MRData":{"RaceTable":{"Races":[]}}}"#;
        assert!(!has_jolpica_races(no_races));
        assert!(has_jolpica_races(SCHEDULE));

        assert!(has_results(RESULTS));
        assert!(!has_results(no_races));
        assert!(!has_results(r#"{"MRData":{"RaceTable":{"Races":[{"Results":[]}]}}}"#));
    }
}
