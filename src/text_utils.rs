use std::ops::Index;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn to_int<T: std::str::FromStr>(num_str: &str, date_str: &str) -> Result<T, String> {
    match num_str.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => Err(format!("Error parsing {} from the date {}", num_str, date_str)),
    }
}

/// Parses the loosely formatted dates people write in front-matter.
///
/// RFC 3339 values are converted to UTC. Everything else is read as a naive
/// `YYYY-MM-DD[ HH:MM[:SS]]` (`T` and `/` separators are accepted) and any
/// trailing fraction or zone suffix is ignored.
pub fn parse_post_date(buf: &str) -> Result<NaiveDateTime, String> {
    lazy_static! {
        static ref DATE_REGEX: Regex = Regex::new(
            r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[T ](\d{1,2}):(\d{1,2})(?::(\d{1,2}))?)?"
        ).unwrap();
    }

    let buf = buf.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(buf) {
        return Ok(dt.naive_utc());
    }

    let Some(caps) = DATE_REGEX.captures(buf) else {
        return Err(format!("Unable to parse date time {}", buf));
    };

    let to_i32 = |num_str: &str| to_int::<i32>(num_str, buf);
    let to_u32 = |num_str: &str| to_int::<u32>(num_str, buf);
    let opt_u32 = |idx: usize| caps.get(idx).map_or(Ok(0), |m| to_u32(m.as_str()));

    let y: i32 = to_i32(caps.index(1))?;
    let m: u32 = to_u32(caps.index(2))?;
    let d: u32 = to_u32(caps.index(3))?;
    let h: u32 = opt_u32(4)?;
    let mn: u32 = opt_u32(5)?;
    let s: u32 = opt_u32(6)?;

    let date = NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| format!("Invalid calendar date {}", buf))?;
    let time = NaiveTime::from_hms_opt(h, mn, s)
        .ok_or_else(|| format!("Invalid time of day {}", buf))?;

    Ok(NaiveDateTime::new(date, time))
}

pub fn format_timestamp(date_time: &DateTime<Local>) -> String {
    date_time.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mn: u32, s: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            NaiveTime::from_hms_opt(h, mn, s).unwrap(),
        )
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(parse_post_date("2024-03-05").unwrap(), dt(2024, 3, 5, 0, 0, 0));
        assert_eq!(parse_post_date("2024/3/5").unwrap(), dt(2024, 3, 5, 0, 0, 0));
    }

    #[test]
    fn test_parse_date_time() {
        assert_eq!(parse_post_date("2017-09-10 10:42:32.123").unwrap(), dt(2017, 9, 10, 10, 42, 32));
        assert_eq!(parse_post_date("2017-09-10 10:42").unwrap(), dt(2017, 9, 10, 10, 42, 0));
        assert_eq!(parse_post_date("2017-09-10T10:42:32").unwrap(), dt(2017, 9, 10, 10, 42, 32));
    }

    #[test]
    fn test_parse_rfc3339_is_utc() {
        assert_eq!(parse_post_date("2024-01-02T10:00:00+02:00").unwrap(), dt(2024, 1, 2, 8, 0, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_post_date("yesterday").is_err());
        assert!(parse_post_date("2024-13-40").is_err());
        assert!(parse_post_date("").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let local = Local.with_ymd_and_hms(2023, 7, 8, 9, 10, 11).unwrap();
        assert_eq!(format_timestamp(&local), "2023-07-08 09:10:11");
    }
}
