use crashbucket::config::TriageConfig;
use crashbucket::report::Report;
use crashbucket::signature::Signature;
use crashbucket::triage::{Bucket, SharedTriageEngine, TriageEngine};
use std::sync::Arc;

fn os_report(os: &str, short: &str) -> Report {
    Report { os: Some(os.to_string()), short_signature: short.to_string(), ..Default::default() }
}

fn bucket(id: u64, sig: &str) -> Bucket {
    Bucket { id, signature: Signature::parse(sig).expect("signature") }
}

const LINUX: &str = r#"{"symptoms":[{"type":"os","value":"linux"}]}"#;

#[test]
fn os_value_signature() {
    let sig = Signature::parse(LINUX).unwrap();
    assert!(sig.matches(&os_report("linux", "x")));
    assert!(!sig.matches(&os_report("windows", "x")));
}

#[test]
fn newest_bucket_wins_on_cold_cache() {
    let buckets = vec![bucket(5, LINUX), bucket(7, LINUX)];
    let mut engine = TriageEngine::default();
    let out = engine.triage(&os_report("linux", "crash A"), &buckets);
    assert_eq!(out.bucket, Some(7));
    assert!(!out.cache_hit);
    assert_eq!(out.buckets_tested, 1);
    assert_eq!(engine.cache().hint("crash A"), vec![7]);
}

#[test]
fn cached_bucket_is_tried_first() {
    // bucket 9 is newer but only the cached candidate should be evaluated
    let mut engine = TriageEngine::default();
    engine.triage(&os_report("linux", "crash A"), &[bucket(5, LINUX), bucket(7, LINUX)]);

    let buckets = vec![bucket(5, LINUX), bucket(7, LINUX), bucket(9, LINUX)];
    let out = engine.triage(&os_report("linux", "crash A"), &buckets);
    assert_eq!(out.bucket, Some(7));
    assert!(out.cache_hit);
    assert_eq!(out.buckets_tested, 1);
    assert_eq!(engine.cache().hint("crash A"), vec![7, 7]);
}

#[test]
fn unmatched_report_leaves_cache_alone() {
    let mut engine = TriageEngine::default();
    let out = engine.triage(&os_report("windows", "crash B"), &[bucket(5, LINUX)]);
    assert_eq!(out.bucket, None);
    assert_eq!(out.buckets_tested, 1);
    assert!(engine.cache().is_empty());
}

#[test]
fn cache_capacity_from_config() {
    let config = TriageConfig { cache_capacity: 1, ..Default::default() };
    let mut engine = TriageEngine::new(config);
    let buckets = vec![bucket(1, LINUX)];
    engine.triage(&os_report("linux", "a"), &buckets);
    engine.triage(&os_report("linux", "b"), &buckets);
    assert!(!engine.cache().contains("a"));
    assert!(engine.cache().contains("b"));
}

#[test]
fn shared_engine_across_threads() {
    let shared = Arc::new(SharedTriageEngine::new(TriageEngine::default()));
    let buckets = Arc::new(vec![bucket(2, LINUX), bucket(3, r#"{"symptoms":[{"type":"os","value":"mac"}]}"#)]);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let shared = Arc::clone(&shared);
            let buckets = Arc::clone(&buckets);
            std::thread::spawn(move || {
                let os = if i % 2 == 0 { "linux" } else { "mac" };
                shared.triage(&os_report(os, os), &buckets).bucket
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let expected = if i % 2 == 0 { Some(2) } else { Some(3) };
        assert_eq!(h.join().unwrap(), expected);
    }
    let engine = Arc::try_unwrap(shared).ok().expect("sole owner").into_inner();
    assert_eq!(engine.cache().hint("linux").len(), 4);
    assert_eq!(engine.cache().hint("mac").len(), 4);
}
