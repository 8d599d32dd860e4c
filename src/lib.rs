pub mod error;
pub mod sanitize;
pub mod assertion;
pub mod timestamp;
pub mod urlparts;
pub mod jsonpath;
pub mod matcher;
pub mod report;
pub mod symptom;
pub mod signature;
pub mod cache;
pub mod config;
pub mod triage;
pub mod store;

pub use report::Report;
pub use signature::Signature;
pub use triage::{Bucket, BucketId, ReportEntry, SharedTriageEngine, TriageEngine, TriageOutcome};
