//! Line-delimited JSON files holding buckets and report entries.
//!
//! Buckets: `{"id": 7, "signature": {"symptoms": [...]}}`, where the
//! signature may also be given as JSON text. Entries:
//! `{"id": 1, "bucket": null, "triaged_once": false, "report": {...}}`.

use crate::error::StoreError;
use crate::report::Report;
use crate::signature::Signature;
use crate::triage::{Bucket, BucketId, ReportEntry};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Deserialize)]
struct BucketRecord {
    id: BucketId,
    signature: Value,
}

#[derive(Deserialize)]
struct EntryRecord {
    id: u64,
    #[serde(default)]
    bucket: Option<BucketId>,
    #[serde(default)]
    triaged_once: bool,
    report: Value,
}

#[derive(Serialize)]
struct EntryOut<'a> {
    id: u64,
    bucket: Option<BucketId>,
    triaged_once: bool,
    report: &'a Report,
}

fn record_err<E>(line: usize) -> impl FnOnce(E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| StoreError::Record { line, source: Box::new(e) }
}

// 1-based line numbers of non-blank lines
fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, String), StoreError>> {
    reader
        .lines()
        .enumerate()
        .map(|(idx, line)| line.map(|l| (idx + 1, l)).map_err(StoreError::from))
        .filter(|r| !matches!(r, Ok((_, l)) if l.trim().is_empty()))
}

fn parse_bucket(line: usize, text: &str) -> Result<Bucket, StoreError> {
    let raw: BucketRecord = serde_json::from_str(text).map_err(record_err(line))?;
    let signature = match &raw.signature {
        Value::String(s) => Signature::parse(s),
        other => Signature::from_value(other),
    }
    .map_err(record_err(line))?;
    Ok(Bucket { id: raw.id, signature })
}

/// Signatures compile their regexes and paths, so lines decode in parallel.
pub fn read_buckets<R: BufRead>(reader: R) -> Result<Vec<Bucket>, StoreError> {
    let lines: Vec<(usize, String)> = records(reader).collect::<Result<_, _>>()?;
    let buckets: Vec<Bucket> =
        lines.par_iter().map(|(line, text)| parse_bucket(*line, text)).collect::<Result<_, _>>()?;
    tracing::debug!(count = buckets.len(), "loaded buckets");
    Ok(buckets)
}

pub fn load_buckets(path: impl AsRef<Path>) -> Result<Vec<Bucket>, StoreError> {
    read_buckets(BufReader::new(File::open(path)?))
}

fn parse_entry(line: usize, text: &str, program_only: bool) -> Result<ReportEntry, StoreError> {
    let raw: EntryRecord = serde_json::from_str(text).map_err(record_err(line))?;
    let report = Report::from_value(raw.report, program_only).map_err(record_err(line))?;
    Ok(ReportEntry { id: raw.id, report, bucket: raw.bucket, triaged_once: raw.triaged_once })
}

/// `program_only` applies when a report carries no short signature and one
/// has to be derived from its output. Derivation runs on the rayon pool.
pub fn read_entries<R: BufRead>(reader: R, program_only: bool) -> Result<Vec<ReportEntry>, StoreError> {
    let lines: Vec<(usize, String)> = records(reader).collect::<Result<_, _>>()?;
    let entries: Vec<ReportEntry> = lines
        .par_iter()
        .map(|(line, text)| parse_entry(*line, text, program_only))
        .collect::<Result<_, _>>()?;
    tracing::debug!(count = entries.len(), "loaded report entries");
    Ok(entries)
}

pub fn load_entries(path: impl AsRef<Path>, program_only: bool) -> Result<Vec<ReportEntry>, StoreError> {
    read_entries(BufReader::new(File::open(path)?), program_only)
}

pub fn write_entries<W: Write>(mut writer: W, entries: &[ReportEntry]) -> Result<(), StoreError> {
    for e in entries {
        let out = EntryOut { id: e.id, bucket: e.bucket, triaged_once: e.triaged_once, report: &e.report };
        serde_json::to_writer(&mut writer, &out).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
