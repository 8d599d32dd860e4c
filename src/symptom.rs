use crate::error::SignatureError;
use crate::jsonpath::JsonPath;
use crate::matcher::{Matcher, MAX_MATCHER_RANK};
use crate::report::{OutputSource, Property, Report};
use crate::urlparts::UrlPart;
use serde_json::{Map, Value};

/// What part of a report a symptom reads.
#[derive(Debug, Clone)]
pub enum SymptomKind {
    StringProperty(Property),
    /// Whole URL when no part is given.
    Url(Option<UrlPart>),
    ReportedAt,
    /// Whole serialized details when no path is given.
    Details(Option<JsonPath>),
    /// Any line of the selected output streams.
    Output(Option<OutputSource>),
}

impl SymptomKind {
    /// Structural cost, independent of the matcher.
    pub fn rank(&self) -> u32 {
        match self {
            SymptomKind::StringProperty(_) => 0,
            SymptomKind::Url(_) => 1,
            SymptomKind::ReportedAt => 2,
            SymptomKind::Details(_) => 3,
            SymptomKind::Output(_) => 4,
        }
    }
}

/// One predicate of a signature. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Symptom {
    kind: SymptomKind,
    matcher: Matcher,
    source: Map<String, Value>,
}

fn optional_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<Option<&'a str>, SignatureError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(SignatureError::WrongType { field, expected: "a string" }),
    }
}

impl Symptom {
    /// Build a symptom from its declarative object, dispatching on `type`.
    pub fn load(obj: &Map<String, Value>) -> Result<Self, SignatureError> {
        let stype = match obj.get("type") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err(SignatureError::MissingType),
        };

        let kind = match stype {
            "url" => {
                let part = match optional_str(obj, "part")? {
                    Some(p) => Some(UrlPart::from_name(p).ok_or_else(|| SignatureError::UnknownUrlPart(p.to_string()))?),
                    None => None,
                };
                SymptomKind::Url(part)
            }
            "reported_at" => SymptomKind::ReportedAt,
            "details" => SymptomKind::Details(optional_str(obj, "path")?.map(JsonPath::parse).transpose()?),
            "output" => {
                let src = match optional_str(obj, "src")? {
                    Some(s) => Some(OutputSource::from_name(s).ok_or_else(|| SignatureError::InvalidSource(s.to_string()))?),
                    None => None,
                };
                SymptomKind::Output(src)
            }
            other => match Property::from_name(other) {
                Some(prop) => SymptomKind::StringProperty(prop),
                None => return Err(SignatureError::UnknownSymptomType(other.to_string())),
            },
        };

        Ok(Self { kind, matcher: Matcher::from_object(obj)?, source: obj.clone() })
    }

    pub fn kind(&self) -> &SymptomKind {
        &self.kind
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The object this symptom was loaded from.
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Combined cost used to order symptoms inside a signature.
    pub fn order(&self) -> u32 {
        self.kind.rank() * (MAX_MATCHER_RANK + 1) + self.matcher.rank()
    }

    pub fn matches(&self, report: &Report) -> bool {
        match &self.kind {
            SymptomKind::StringProperty(prop) => self.matcher.matches_str(report.property(*prop)),
            SymptomKind::Url(None) => {
                let whole = report.url.to_string();
                tracing::debug!(url = %whole, "matching against whole url");
                self.matcher.matches_str(Some(whole.as_str()))
            }
            SymptomKind::Url(Some(part)) => {
                let value = report.url.part(*part);
                tracing::debug!(?part, value = ?value, "matching against url part");
                self.matcher.matches_str(value.as_deref())
            }
            SymptomKind::ReportedAt => self.matcher.matches_time(Some(report.reported_at)),
            SymptomKind::Details(None) => self.matcher.matches_str(Some(report.details_text().as_str())),
            SymptomKind::Details(Some(path)) => path.find(&report.details).into_iter().any(|node| match node {
                Value::Null => self.matcher.matches_str(None),
                Value::String(s) => self.matcher.matches_str(Some(s.as_str())),
                _ => false,
            }),
            SymptomKind::Output(src) => {
                // windows paths get a second try with forward slashes, but only
                // for matchers that mention a slash
                let retry = report.os.as_deref() == Some("windows") && self.matcher.mentions_slash();
                report.output(*src).into_iter().rev().any(|line| {
                    self.matcher.matches_str(Some(line))
                        || (retry
                            && line.contains('\\')
                            && self.matcher.matches_str(Some(line.replace('\\', "/").as_str())))
                })
            }
        }
    }
}
