use crate::error::SignatureError;
use crate::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

/// How a symptom compares the value it reads off a report.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The value is absent.
    Null,
    /// Exact string equality.
    Value(String),
    /// Regex anchored at the start of the value.
    Pattern(Pattern),
    /// Exact timestamp equality.
    Time(DateTime<Utc>),
    /// Strictly inside the open interval; at least one bound is set.
    TimeRange {
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    anchored: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, SignatureError> {
        // validate the pattern as written before wrapping it
        Regex::new(source)?;
        let anchored = Regex::new(&format!("^(?:{source})"))?;
        Ok(Self { source: source.to_string(), anchored })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

const fn max_rank(ranks: &[u32]) -> u32 {
    let mut max = 0;
    let mut i = 0;
    while i < ranks.len() {
        if ranks[i] > max {
            max = ranks[i];
        }
        i += 1;
    }
    max
}

// ranks of Null, Value, Pattern, Time, TimeRange
const MATCHER_RANKS: [u32; 5] = [0, 1, 2, 0, 1];

/// Highest rank any matcher variant carries.
pub const MAX_MATCHER_RANK: u32 = max_rank(&MATCHER_RANKS);

fn time_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<DateTime<Utc>>, SignatureError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| SignatureError::InvalidTimestamp(s.clone())),
        Some(_) => Err(SignatureError::WrongType { field, expected: "a timestamp string" }),
    }
}

impl Matcher {
    /// Build from the keys of a symptom object. `value` takes precedence over
    /// `time`, which takes precedence over `pattern`, then `before`/`after`.
    pub fn from_object(obj: &Map<String, Value>) -> Result<Self, SignatureError> {
        if let Some(v) = obj.get("value") {
            return match v {
                Value::Null => Ok(Matcher::Null),
                Value::String(s) => Ok(Matcher::Value(s.clone())),
                _ => Err(SignatureError::WrongType { field: "value", expected: "a string or null" }),
            };
        }
        if obj.contains_key("time") {
            return match time_field(obj, "time")? {
                Some(t) => Ok(Matcher::Time(t)),
                None => Err(SignatureError::WrongType { field: "time", expected: "a timestamp string" }),
            };
        }
        if let Some(p) = obj.get("pattern") {
            return match p {
                Value::String(s) => Ok(Matcher::Pattern(Pattern::new(s)?)),
                _ => Err(SignatureError::WrongType { field: "pattern", expected: "a string" }),
            };
        }
        if !obj.contains_key("before") && !obj.contains_key("after") {
            return Err(SignatureError::MissingMatcher);
        }
        Matcher::time_range(time_field(obj, "after")?, time_field(obj, "before")?)
    }

    pub fn time_range(after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> Result<Self, SignatureError> {
        if after.is_none() && before.is_none() {
            return Err(SignatureError::EmptyTimeRange);
        }
        Ok(Matcher::TimeRange { after, before })
    }

    /// Fixed evaluation cost of this variant.
    pub fn rank(&self) -> u32 {
        match self {
            Matcher::Null => MATCHER_RANKS[0],
            Matcher::Value(_) => MATCHER_RANKS[1],
            Matcher::Pattern(_) => MATCHER_RANKS[2],
            Matcher::Time(_) => MATCHER_RANKS[3],
            Matcher::TimeRange { .. } => MATCHER_RANKS[4],
        }
    }

    /// The expected text or pattern source contains a `/`.
    pub fn mentions_slash(&self) -> bool {
        match self {
            Matcher::Value(v) => v.contains('/'),
            Matcher::Pattern(p) => p.as_str().contains('/'),
            _ => false,
        }
    }

    /// Test a text value. Timestamp matchers never match text.
    pub fn matches_str(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Matcher::Null, v) => v.is_none(),
            (Matcher::Value(expected), Some(v)) => v == expected,
            (Matcher::Pattern(p), Some(v)) => p.matches(v),
            _ => false,
        }
    }

    /// Test a timestamp value. Text matchers compare against RFC 3339 text.
    pub fn matches_time(&self, value: Option<DateTime<Utc>>) -> bool {
        match (self, value) {
            (Matcher::Null, v) => v.is_none(),
            (Matcher::Time(expected), Some(v)) => v == *expected,
            (Matcher::TimeRange { after, before }, Some(v)) => {
                after.map_or(true, |a| v > a) && before.map_or(true, |b| v < b)
            }
            (Matcher::Value(_) | Matcher::Pattern(_), Some(v)) => self.matches_str(Some(v.to_rfc3339().as_str())),
            _ => false,
        }
    }
}
