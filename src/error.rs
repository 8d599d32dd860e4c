use thiserror::Error;

/// Raised while turning a stored signature document into symptoms.
/// Nothing here is ever produced during matching.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signature must be an object with a `symptoms` array")]
    MissingSymptoms,
    #[error("symptom #{0} is not an object")]
    SymptomNotObject(usize),
    #[error("missing symptom type")]
    MissingType,
    #[error("unknown symptom type: {0}")]
    UnknownSymptomType(String),
    #[error("invalid source specified: {0}")]
    InvalidSource(String),
    #[error("unknown url part: {0}")]
    UnknownUrlPart(String),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("symptom has no matcher (expected one of value, time, pattern, before, after)")]
    MissingMatcher,
    #[error("at least one of 'after' and 'before' must be set")]
    EmptyTimeRange,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("error in regular expression: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid reported_at: {0}")]
    InvalidTimestamp(String),
    #[error("details is not valid JSON: {0}")]
    Details(serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
