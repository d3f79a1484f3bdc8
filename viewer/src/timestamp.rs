use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Accepted layouts after the `T` separator is replaced, tried in order.
const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Converts a UTC `recvTime` string such as `2024-01-01T10:00:00.123Z`
/// into an instant in the target civil timezone.
///
/// The trailing `Z` is optional; the `T` date/time separator is not.
pub fn normalize(raw: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    let (date, time) = trimmed
        .split_once('T')
        .ok_or_else(|| Error::Format(format!("missing 'T' separator in '{}'", raw)))?;
    let candidate = format!("{} {}", date, time);

    let naive = FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&candidate, format).ok())
        .ok_or_else(|| Error::Format(format!("unrecognised timestamp '{}'", raw)))?;

    Ok(Utc.from_utc_datetime(&naive).with_timezone(&tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::Lisbon;

    #[test]
    fn test_fractional_and_whole_seconds() {
        let with_millis = normalize("2024-03-01T12:00:00.500Z", Lisbon).unwrap();
        let whole = normalize("2024-03-01T12:00:00Z", Lisbon).unwrap();

        assert_eq!((with_millis - whole).num_milliseconds(), 500);
    }

    #[test]
    fn test_missing_z_is_accepted() {
        let a = normalize("2024-01-01T10:00:00.123", Lisbon).unwrap();
        let b = normalize("2024-01-01T10:00:00.123Z", Lisbon).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_converts_to_summer_time() {
        // Lisbon is UTC+1 in July
        let local = normalize("2024-07-01T12:00:00Z", Lisbon).unwrap();
        assert_eq!(local.hour(), 13);

        let winter = normalize("2024-01-15T12:00:00Z", Lisbon).unwrap();
        assert_eq!(winter.hour(), 12);
    }

    #[test]
    fn test_other_timezone() {
        let local = normalize("2024-01-15T12:00:00Z", chrono_tz::Asia::Tokyo).unwrap();
        assert_eq!(local.hour(), 21);
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in [
            "2024-03-01 12:00:00",
            "not a timestamp",
            "",
            "2024-13-01T00:00:00Z",
            "2024-03-01T12:00Z",
            "1709294400",
        ] {
            let err = normalize(raw, Lisbon).unwrap_err();
            assert!(matches!(err, Error::Format(_)), "{} should fail", raw);
        }
    }
}
