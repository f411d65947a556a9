//! Date formats used on the carrier wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const DATE_FORMATS: [&str; 5] = ["%d-%b-%Y", "%d %B %Y", "%Y-%m-%d", "%d/%m/%Y", "%d %b %Y"];

/// `/Date(<unix millis>)/`, the JSON date literal the domestic API expects.
pub fn to_wcf_date(date: NaiveDate) -> String {
    let millis = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default();
    format!("/Date({})/", millis)
}

/// `2024-10-12T14:00:00 GMT+00:00` from a date and an HHMM time.
pub fn to_gmt_timestamp(date: NaiveDate, hhmm: &str) -> String {
    format!("{}T{}:00 GMT+00:00", date.format("%Y-%m-%d"), hhmm_to_colon(hhmm))
}

/// `1800` -> `18:00`. Anything other than four ASCII digits passes through.
pub fn hhmm_to_colon(hhmm: &str) -> String {
    if hhmm.len() == 4 && hhmm.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}:{}", &hhmm[..2], &hhmm[2..])
    } else {
        hhmm.to_string()
    }
}

pub fn parse_carrier_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Combine a carrier date and an optional `HH:MM` / `HHMM` time into UTC.
pub fn parse_carrier_datetime(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let day = parse_carrier_date(date)?;
    let time = time
        .map(|t| hhmm_to_colon(t.trim()))
        .and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M").ok())
        .or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
    Some(NaiveDateTime::new(day, time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_wcf_date() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 12).unwrap();
        assert_eq!(to_wcf_date(date), "/Date(1728691200000)/");
    }

    #[test]
    fn test_gmt_timestamp() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 12).unwrap();
        assert_eq!(to_gmt_timestamp(date, "1400"), "2024-10-12T14:00:00 GMT+00:00");
    }

    #[test]
    fn test_parse_carrier_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 12).unwrap();
        assert_eq!(parse_carrier_date("12-Oct-2024"), Some(expected));
        assert_eq!(parse_carrier_date("12 October 2024"), Some(expected));
        assert_eq!(parse_carrier_date("2024-10-12"), Some(expected));
        assert_eq!(parse_carrier_date(""), None);
        assert_eq!(parse_carrier_date("yesterday"), None);
    }

    #[test]
    fn test_parse_datetime_with_compact_time() {
        let at = parse_carrier_datetime("12-Oct-2024", Some("1530")).unwrap();
        assert_eq!(at.hour(), 15);
        assert_eq!(at.minute(), 30);

        let midnight = parse_carrier_datetime("12-Oct-2024", None).unwrap();
        assert_eq!(midnight.hour(), 0);
    }

    #[test]
    fn test_garbled_time_falls_back_to_midnight() {
        assert_eq!(hhmm_to_colon("1é3"), "1é3");
        assert_eq!(hhmm_to_colon("14:0"), "14:0");

        let at = parse_carrier_datetime("12-Oct-2024", Some("1é3")).unwrap();
        assert_eq!(at.hour(), 0);
        assert_eq!(at.minute(), 0);
    }
}
