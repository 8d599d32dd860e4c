use crate::error::SignatureError;
use crate::report::Report;
use crate::symptom::Symptom;
use serde_json::{json, Value};
use std::fmt;

/// A conjunction of symptoms defining bucket membership.
///
/// Symptoms are sorted by [`Symptom::order`] once, when the signature is
/// built, so cheap checks run first and `matches` can bail early.
#[derive(Debug, Clone)]
pub struct Signature {
    symptoms: Vec<Symptom>,
}

impl Signature {
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, SignatureError> {
        let list = value
            .get("symptoms")
            .and_then(Value::as_array)
            .ok_or(SignatureError::MissingSymptoms)?;
        let mut symptoms = Vec::with_capacity(list.len());
        for (idx, item) in list.iter().enumerate() {
            let obj = item.as_object().ok_or(SignatureError::SymptomNotObject(idx))?;
            symptoms.push(Symptom::load(obj)?);
        }
        Ok(Self::from_symptoms(symptoms))
    }

    fn from_symptoms(mut symptoms: Vec<Symptom>) -> Self {
        // stable: equal orders keep their authored position
        symptoms.sort_by_key(Symptom::order);
        Self { symptoms }
    }

    /// Symptoms in evaluation order.
    pub fn symptoms(&self) -> &[Symptom] {
        &self.symptoms
    }

    pub fn matches(&self, report: &Report) -> bool {
        self.matches_traced(report, |_, _| {})
    }

    /// Like `matches`, but calls `trace` with each evaluated symptom and its
    /// outcome. Symptoms after the first failure are never evaluated.
    pub fn matches_traced<F>(&self, report: &Report, mut trace: F) -> bool
    where
        F: FnMut(&Symptom, bool),
    {
        for symptom in &self.symptoms {
            let hit = symptom.matches(report);
            tracing::trace!(order = symptom.order(), hit, "symptom evaluated");
            trace(symptom, hit);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Number of symptoms the report does not satisfy.
    pub fn distance(&self, report: &Report) -> usize {
        self.symptoms.iter().filter(|s| !s.matches(report)).count()
    }

    /// The subset of symptoms the report satisfies, if any.
    pub fn fit(&self, report: &Report) -> Option<Signature> {
        let kept: Vec<Symptom> = self.symptoms.iter().filter(|s| s.matches(report)).cloned().collect();
        if kept.is_empty() {
            None
        } else {
            Some(Self::from_symptoms(kept))
        }
    }

    pub fn to_value(&self) -> Value {
        let sources: Vec<Value> = self.symptoms.iter().map(|s| Value::Object(s.source().clone())).collect();
        json!({ "symptoms": sources })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string_pretty(&self.to_value()).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symptom::SymptomKind;

    fn report() -> Report {
        Report::from_json(
            r#"{"app_name":"N","app_channel":"c","os":"linux","details":{"bi":{"env":"var"}},
                "reported_at":"1999-01-01T12:00:00","url":"https://d.x/p"}"#,
        )
        .unwrap()
    }

    #[test]
    fn symptoms_sorted_by_cost() {
        let sig = Signature::parse(
            r#"{"symptoms": [
                {"type": "details", "path": "$.bi.env", "value": "var"},
                {"type": "reported_at", "after": "1998"},
                {"type": "url", "pattern": "https"},
                {"type": "app_name", "pattern": "N"},
                {"type": "os", "value": "linux"},
                {"type": "app_channel", "value": null}
            ]}"#,
        )
        .unwrap();
        let kinds: Vec<u32> = sig.symptoms().iter().map(Symptom::order).collect();
        assert_eq!(kinds, vec![0, 1, 2, 5, 7, 10]);
        assert!(matches!(sig.symptoms()[0].kind(), SymptomKind::StringProperty(_)));
    }

    #[test]
    fn stops_at_first_failure() {
        let sig = Signature::parse(
            r#"{"symptoms": [
                {"type": "output", "pattern": ".*"},
                {"type": "os", "value": "linux"},
                {"type": "app_name", "value": "X"}
            ]}"#,
        )
        .unwrap();
        let mut seen = 0;
        assert!(!sig.matches_traced(&report(), |_, _| seen += 1));
        assert_eq!(seen, 2);
        assert_eq!(sig.distance(&report()), 2);
    }

    #[test]
    fn fit_keeps_matching_symptoms() {
        let sig = Signature::parse(
            r#"{"symptoms": [{"type": "os", "value": "linux"}, {"type": "app_name", "value": "other"}]}"#,
        )
        .unwrap();
        let fitted = sig.fit(&report()).unwrap();
        assert_eq!(fitted.symptoms().len(), 1);
        assert!(fitted.matches(&report()));

        let none = Signature::parse(r#"{"symptoms": [{"type": "os", "value": "mac"}]}"#).unwrap();
        assert!(none.fit(&report()).is_none());
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(Signature::parse("{}"), Err(SignatureError::MissingSymptoms)));
        assert!(matches!(Signature::parse(r#"{"symptoms": [1]}"#), Err(SignatureError::SymptomNotObject(0))));
        assert!(matches!(Signature::parse("nope"), Err(SignatureError::Json(_))));
    }

    #[test]
    fn empty_signature_matches_everything() {
        let sig = Signature::parse(r#"{"symptoms": []}"#).unwrap();
        assert!(sig.matches(&report()));
        assert!(sig.to_string().contains("\"symptoms\""));
    }
}
