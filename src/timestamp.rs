use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

// ISO-8601 with every component after the year optional:
// 1999, 1999-06, 1999-06-01, 1999-06-01T12:00, 1999-06-01 12:00:00.123+02:00
static RE_ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:[T ](\d{2})(?::(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?)?)?)?)?\s*(Z|[+-]\d{2}(?::?\d{2})?)?$",
    )
    .unwrap()
});

/// Parse ISO-8601 text, normalized to UTC. Text without an offset is taken
/// as UTC wall-clock time; missing date parts default to the first.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let caps = RE_ISO.captures(s)?;
    let num = |idx: usize, default: u32| -> Option<u32> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let nanos = match caps.get(7) {
        // right-pad the fraction to nanoseconds
        Some(m) => format!("{:0<9}", m.as_str()).parse().ok()?,
        None => 0,
    };
    let naive = NaiveDate::from_ymd_opt(year, num(2, 1)?, num(3, 1)?)?
        .and_hms_nano_opt(num(4, 0)?, num(5, 0)?, num(6, 0)?, nanos)?;

    match caps.get(8).map(|m| m.as_str()) {
        None | Some("Z") => Some(Utc.from_utc_datetime(&naive)),
        Some(tz) => {
            // offsets become the same instant in UTC; the wall-clock fields are not kept
            let offset = parse_offset(tz)?;
            let local = offset.from_local_datetime(&naive).single()?;
            Some(local.with_timezone(&Utc))
        }
    }
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let digits: String = tz[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = match digits.get(2..4) {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
