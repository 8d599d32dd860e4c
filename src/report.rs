use crate::assertion::{self, create_short_signature};
use crate::error::{ReportError, SignatureError};
use crate::sanitize::sanitize_pattern;
use crate::signature::Signature;
use crate::timestamp::parse_timestamp;
use crate::urlparts::ReportUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::ser::Formatter;
use serde_json::{json, Value};
use std::io;

/// Scalar report attributes a `StringProperty` symptom may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    AppChannel,
    AppName,
    AppVersion,
    BreakageCategory,
    Comments,
    Os,
    Uuid,
}

impl Property {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "app_channel" => Property::AppChannel,
            "app_name" => Property::AppName,
            "app_version" => Property::AppVersion,
            "breakage_category" => Property::BreakageCategory,
            "comments" => Property::Comments,
            "os" => Property::Os,
            "uuid" => Property::Uuid,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::AppChannel => "app_channel",
            Property::AppName => "app_name",
            Property::AppVersion => "app_version",
            Property::BreakageCategory => "breakage_category",
            Property::Comments => "comments",
            Property::Os => "os",
            Property::Uuid => "uuid",
        }
    }
}

/// Which captured output stream to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
    CrashData,
}

impl OutputSource {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stdout" => Some(OutputSource::Stdout),
            "stderr" => Some(OutputSource::Stderr),
            "crashdata" => Some(OutputSource::CrashData),
            _ => None,
        }
    }
}

/// One incoming report. Matching only ever reads it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub app_channel: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub breakage_category: Option<String>,
    pub comments: Option<String>,
    pub os: Option<String>,
    pub uuid: Option<String>,
    pub details: Value,
    pub reported_at: DateTime<Utc>,
    #[serde(serialize_with = "url_text")]
    pub url: ReportUrl,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub crash_data: Vec<String>,
    pub short_signature: String,
}

fn url_text<S: Serializer>(url: &ReportUrl, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(url)
}

/// JSON text laid out like Python's `json.dumps` defaults: `", "` and
/// `": "` separators and non-ASCII characters as `\uXXXX` escapes.
struct DumpsFormatter;

impl Formatter for DumpsFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    app_channel: Option<String>,
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    breakage_category: Option<String>,
    #[serde(default)]
    comments: Option<String>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    details: Value,
    reported_at: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    stdout: Vec<String>,
    #[serde(default)]
    stderr: Vec<String>,
    #[serde(default)]
    crash_data: Vec<String>,
    #[serde(default)]
    short_signature: Option<String>,
}

impl Report {
    /// Decode a report record. `details` may be embedded JSON text, as
    /// stored by the application database.
    pub fn from_json(data: &str) -> Result<Self, ReportError> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_value(value, false)
    }

    pub fn from_value(value: Value, program_only: bool) -> Result<Self, ReportError> {
        let raw: RawReport = serde_json::from_value(value)?;
        let details = match raw.details {
            Value::String(text) => serde_json::from_str(&text).map_err(ReportError::Details)?,
            other => other,
        };
        let reported_at =
            parse_timestamp(&raw.reported_at).ok_or_else(|| ReportError::InvalidTimestamp(raw.reported_at.clone()))?;
        let mut report = Report {
            app_channel: raw.app_channel,
            app_name: raw.app_name,
            app_version: raw.app_version,
            breakage_category: raw.breakage_category,
            comments: raw.comments,
            os: raw.os,
            uuid: raw.uuid,
            details,
            reported_at,
            url: ReportUrl::parse(&raw.url),
            stdout: raw.stdout,
            stderr: raw.stderr,
            crash_data: raw.crash_data,
            short_signature: String::new(),
        };
        report.short_signature = match raw.short_signature {
            Some(s) => s,
            None => report.derive_short_signature(program_only),
        };
        Ok(report)
    }

    /// The details document as text, keys in their stored order. Symptoms
    /// without a path match against this.
    pub fn details_text(&self) -> String {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, DumpsFormatter);
        if self.details.serialize(&mut ser).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }

    pub fn derive_short_signature(&self, program_only: bool) -> String {
        create_short_signature(&self.stderr, &self.crash_data, program_only)
    }

    pub fn property(&self, prop: Property) -> Option<&str> {
        match prop {
            Property::AppChannel => self.app_channel.as_deref(),
            Property::AppName => self.app_name.as_deref(),
            Property::AppVersion => self.app_version.as_deref(),
            Property::BreakageCategory => self.breakage_category.as_deref(),
            Property::Comments => self.comments.as_deref(),
            Property::Os => self.os.as_deref(),
            Property::Uuid => self.uuid.as_deref(),
        }
    }

    /// Lines of the selected stream, or of all streams when `None`.
    pub fn output(&self, src: Option<OutputSource>) -> Vec<&str> {
        let streams: Vec<&Vec<String>> = match src {
            None => vec![&self.stdout, &self.stderr, &self.crash_data],
            Some(OutputSource::Stdout) => vec![&self.stdout],
            Some(OutputSource::Stderr) => vec![&self.stderr],
            Some(OutputSource::CrashData) => vec![&self.crash_data],
        };
        streams.into_iter().flat_map(|s| s.iter().map(|l| l.as_str())).collect()
    }

    /// A starting-point signature for a new bucket: the URL host, plus the
    /// sanitized abort message when the output carries one.
    pub fn create_signature(&self) -> Result<Signature, SignatureError> {
        let mut symptoms = vec![json!({
            "type": "url",
            "part": "hostname",
            "value": self.url.hostname(),
        })];
        let found = assertion::extract_abort_message(&self.stderr, false)
            .map(|m| (m, "stderr"))
            .or_else(|| assertion::extract_abort_message(&self.crash_data, false).map(|m| (m, "crashdata")));
        if let Some((msg, src)) = found {
            for line in msg.lines() {
                symptoms.push(json!({
                    "type": "output",
                    "src": src,
                    // output lines may carry decorations before the message
                    "pattern": format!(".*{}", sanitize_pattern(line)),
                }));
            }
        }
        Signature::from_value(&json!({ "symptoms": symptoms }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_details() {
        let r = Report::from_json(
            r#"{"app_name":"N","details":"{\"bi\":{\"env\":\"var\"}}","reported_at":"1999-01-01T12:00:00","url":"s://d.x/"}"#,
        )
        .unwrap();
        assert_eq!(r.details["bi"]["env"], "var");
        assert_eq!(r.app_channel, None);
        assert_eq!(r.url.hostname().as_deref(), Some("d.x"));
        assert_eq!(r.short_signature, "No crash detected");
    }

    #[test]
    fn details_text_keeps_order_and_spacing() {
        let r = Report::from_json(
            r#"{"details":"{\"z\":1,\"a\":[true,null],\"n\":\"caf\u00e9\"}","reported_at":"2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(r.details_text(), r#"{"z": 1, "a": [true, null], "n": "caf\u00e9"}"#);
        let empty = Report { details: json!({}), ..Default::default() };
        assert_eq!(empty.details_text(), "{}");
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let err = Report::from_json(r#"{"reported_at":"soon","url":""}"#).unwrap_err();
        assert!(matches!(err, ReportError::InvalidTimestamp(_)));
    }

    #[test]
    fn short_signature_from_stderr() {
        let r = Report::from_json(
            r#"{"reported_at":"2024-01-01","stderr":["noise","[42] Assertion failure: x, at /a/b.cpp:3"]}"#,
        )
        .unwrap();
        assert_eq!(r.short_signature, "Assertion failure: x, at /a/b.cpp:3");
    }
}
