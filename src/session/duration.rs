// Conversions between race time text and std durations

use std::fmt;
use std::time::Duration;

use crate::errors::BoxBoxError;

const MAX_FRACTION_DIGITS: usize = 9;

/// Parse a race time such as `1:30:00.000`, a lap time such as `1:32.456`,
/// or a gap such as `+12.345s`.
pub fn parse_race_time(text: &str) -> Result<Duration, BoxBoxError> {
    let invalid = |reason: &str| {
        BoxBoxError::invalid_input("race time", format!("'{text}' {reason}"))
    };

    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('s').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid("is empty"));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid("has too many components"));
    }

    let (seconds_part, unit_parts) = parts
        .split_last()
        .ok_or_else(|| invalid("is empty"))?;

    // hours and minutes, folded into minutes
    let mut total_minutes: u64 = 0;
    for (index, part) in unit_parts.iter().enumerate() {
        let value: u64 = part
            .parse()
            .map_err(|_| invalid("contains a non numeric component"))?;
        if index > 0 && value >= 60 {
            return Err(invalid("has more than 59 minutes in an hour"));
        }
        total_minutes = total_minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(value))
            .ok_or_else(|| invalid("is too large"))?;
    }

    let (secs, fraction) = match seconds_part.split_once('.') {
        Some((secs, fraction)) => (secs, fraction),
        None => (*seconds_part, ""),
    };
    if secs.is_empty() && fraction.is_empty() {
        return Err(invalid("has no seconds"));
    }
    let secs: u64 = if secs.is_empty() {
        0
    } else {
        secs.parse()
            .map_err(|_| invalid("contains a non numeric component"))?
    };
    if !unit_parts.is_empty() && secs >= 60 {
        return Err(invalid("has more than 59 seconds in a minute"));
    }

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("has a malformed fraction"));
    }
    let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    let nanos = if digits.is_empty() {
        0
    } else {
        let value: u32 = digits
            .parse()
            .map_err(|_| invalid("has a malformed fraction"))?;
        value * 10u32.pow((MAX_FRACTION_DIGITS - digits.len()) as u32)
    };

    let total_secs = total_minutes
        .checked_mul(60)
        .and_then(|s| s.checked_add(secs))
        .ok_or_else(|| invalid("is too large"))?;
    Ok(Duration::new(total_secs, nanos))
}

/// Render a race length duration as `H:MM:SS.mmm`, whole days are dropped
pub fn format_race_time(duration: Duration) -> String {
    let millis = duration.as_millis();
    let hours = (millis / 3_600_000) % 24;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1_000) % 60;
    format!("{hours}:{minutes:02}:{seconds:02}.{:03}", millis % 1_000)
}

/// Render a lap length duration as `M:SS.mmm`
pub fn format_lap_time(duration: Duration) -> String {
    let millis = duration.as_millis();
    let minutes = millis / 60_000;
    let seconds = (millis / 1_000) % 60;
    format!("{minutes}:{seconds:02}.{:03}", millis % 1_000)
}

/// Signed difference between a simulated and an actual race time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaceTimeDelta {
    Slower(Duration),
    Faster(Duration),
}

impl RaceTimeDelta {
    pub fn between(simulated: Duration, actual: Duration) -> Self {
        if simulated > actual {
            RaceTimeDelta::Slower(simulated - actual)
        } else {
            RaceTimeDelta::Faster(actual - simulated)
        }
    }
}

impl fmt::Display for RaceTimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceTimeDelta::Slower(d) => write!(f, "{} slower", format_race_time(*d)),
            RaceTimeDelta::Faster(d) => write!(f, "{} faster", format_race_time(*d)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_race_time() {
        assert_eq!(
            parse_race_time("1:30:00.000").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(
            parse_race_time("1:33:56.736").unwrap(),
            Duration::from_millis(5_636_736)
        );
    }

    #[test]
    fn test_parse_gaps_and_lap_times() {
        assert_eq!(
            parse_race_time("+12.345s").unwrap(),
            Duration::from_millis(12_345)
        );
        assert_eq!(
            parse_race_time("+12.345").unwrap(),
            Duration::from_millis(12_345)
        );
        assert_eq!(
            parse_race_time("+1:02.5").unwrap(),
            Duration::from_millis(62_500)
        );
        assert_eq!(
            parse_race_time("1:32.456").unwrap(),
            Duration::from_millis(92_456)
        );
        assert_eq!(parse_race_time("90").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_race_time("").is_err());
        assert!(parse_race_time("+1 Lap").is_err());
        assert!(parse_race_time("1:2:3:4").is_err());
        assert!(parse_race_time("1:75.000").is_err());
        assert!(parse_race_time("12.3x4").is_err());
    }

    #[test]
    fn test_parse_rejects_overflowing_components() {
        let huge = u64::MAX.to_string();
        for text in [
            format!("{huge}:00:00.000"),
            format!("{huge}:00.000"),
            "307445734561825860:59.0".to_string(),
        ] {
            let err = parse_race_time(&text).unwrap_err();
            assert!(err.to_string().contains("too large"), "{text}: {err}");
        }
    }

    #[test]
    fn test_format_race_time() {
        assert_eq!(
            format_race_time(Duration::from_millis(5_412_345)),
            "1:30:12.345"
        );
        assert_eq!(format_race_time(Duration::from_millis(12_345)), "0:00:12.345");
    }

    #[test]
    fn test_format_race_time_drops_days() {
        let one_day = Duration::from_secs(24 * 3600);
        assert_eq!(
            format_race_time(one_day + Duration::from_millis(3_600_250)),
            "1:00:00.250"
        );
        assert_eq!(format_race_time(one_day), "0:00:00.000");
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(Duration::from_millis(92_456)), "1:32.456");
        assert_eq!(format_lap_time(Duration::from_millis(5_004)), "0:05.004");
    }

    #[test]
    fn test_delta_direction() {
        let actual = Duration::from_secs(5400);
        assert_eq!(
            RaceTimeDelta::between(Duration::from_secs(5410), actual),
            RaceTimeDelta::Slower(Duration::from_secs(10))
        );
        assert_eq!(
            RaceTimeDelta::between(Duration::from_secs(5390), actual),
            RaceTimeDelta::Faster(Duration::from_secs(10))
        );
        assert_eq!(
            RaceTimeDelta::between(Duration::from_secs(5400), actual).to_string(),
            "0:00:00.000 faster"
        );
    }
}
