use crashbucket::assertion::{self, AbortMessage};
use crashbucket::sanitize;
use regex::Regex;

fn compiled(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})$")).expect("sanitized pattern compiles")
}

#[test]
fn sanitized_pattern_generalizes_numbers() {
    let literal = "crash at 0xdeadbeef in foo.c:42 after 12345 calls";
    let pattern = sanitize::sanitize_pattern(literal);
    let re = compiled(&pattern);
    assert!(re.is_match(literal), "{pattern}");
    assert!(re.is_match("crash at 0x1f in foo.c:7:3 after 99 calls"));
    assert!(!re.is_match("crash at 0x1f in bar.c:7 after 99 calls"));
}

#[test]
fn assertion_line_roundtrip() {
    let lines = ["foo", "Assertion failure: x == y, file a.c, line 10"];
    let found = assertion::get_assertion(&lines).expect("assertion");
    assert_eq!(found, AbortMessage::Line(lines[1].to_string()));
    let pattern = sanitize::sanitize_pattern(&found.joined());
    let re = compiled(&pattern);
    assert!(re.is_match("Assertion failure: x == y, file a.c, line 99"));
    assert!(re.is_match(lines[1]));
}

#[test]
fn paths_are_generalized() {
    let literal = "Assertion failure: mIsOpen (bad state), at /builds/worker/src/dom/Foo.cpp:120";
    let re = compiled(&sanitize::sanitize_pattern(literal));
    assert!(re.is_match(literal));
    assert!(re.is_match("Assertion failure: mIsOpen (bad state), at /home/me/mozilla/dom/Foo.cpp:98"));
    assert!(re.is_match("Assertion failure: mIsOpen (bad state), at C:/src/dom/Foo.cpp:98"));
}

#[test]
fn last_assertion_wins() {
    let lines = [
        "Assertion failure: first, at /a/b.cpp:1",
        "noise",
        "[4242] Assertion failure: second, at /a/b.cpp:2",
    ];
    let found = assertion::get_assertion(&lines).expect("assertion");
    assert_eq!(found.joined(), "Assertion failure: second, at /a/b.cpp:2");
}

#[test]
fn moz_crash_does_not_override_fatal_assertion() {
    let lines = ["Assertion failure: real, at /a.cpp:3", "Hit MOZ_CRASH(later) at /b.cpp:4"];
    let found = assertion::get_assertion(&lines).expect("assertion");
    assert_eq!(found.joined(), lines[0]);

    let only_crash = ["Hit MOZ_CRASH(alone) at /b.cpp:4"];
    assert_eq!(assertion::get_assertion(&only_crash).expect("crash").joined(), only_crash[0]);
}

#[test]
fn v8_fatal_error_spans_two_lines() {
    let lines = ["#", "# Fatal error in ../../v8/src/heap.cc, line 12", "# Check failed: ok.", "#"];
    let found = assertion::get_assertion(&lines).expect("fatal");
    assert_eq!(found, AbortMessage::Lines(vec![lines[1].to_string(), lines[2].to_string()]));
    assert_eq!(sanitize::sanitize_patterns(&found.lines()).len(), 2);
}

#[test]
fn rust_panic_single_and_multi_line() {
    let single = ["thread 'main' panicked at 'boom', src/main.rs:10:5"];
    assert_eq!(assertion::get_assertion(&single), Some(AbortMessage::Line(single[0].to_string())));

    let multi = ["thread 'main' panicked at 'assertion failed: `(left == right)`", "  left: `1`,", " right: `2`', src/lib.rs:7:3", "note: run with RUST_BACKTRACE"];
    match assertion::get_assertion(&multi) {
        Some(AbortMessage::Lines(got)) => assert_eq!(got, multi[..3].to_vec()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn asan_header_with_access_line() {
    let lines = [
        "==123==ERROR: AddressSanitizer: heap-use-after-free on address 0x602000000010 at pc 0x4005d4 bp 0x7ffc sp 0x7ff0",
        "READ of size 4 at 0x602000000010 thread T0",
    ];
    assert_eq!(assertion::get_assertion(&lines), None);
    match assertion::get_auxiliary_abort_message(&lines) {
        Some(AbortMessage::Lines(got)) => {
            assert_eq!(got[0], "ERROR: AddressSanitizer: heap-use-after-free");
            assert_eq!(got[1], lines[1]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(assertion::extract_abort_message(&lines, true).is_none());
    assert!(assertion::extract_abort_message(&lines, false).is_some());
}

#[test]
fn asan_segv_on_unknown_address_is_skipped() {
    let lines = ["==1==ERROR: AddressSanitizer: SEGV on unknown address 0x000000000000"];
    assert_eq!(assertion::get_auxiliary_abort_message(&lines), None);
}

#[test]
fn ubsan_and_glibc() {
    let ubsan = ["src/a.cpp:12:7: runtime error: signed integer overflow"];
    assert_eq!(assertion::get_auxiliary_abort_message(&ubsan).expect("ubsan").joined(), ubsan[0]);
    let glibc = ["*** glibc detected *** ./prog: double free or corruption"];
    assert_eq!(assertion::get_auxiliary_abort_message(&glibc).expect("glibc").joined(), glibc[0]);
}

#[test]
fn short_signature_sources() {
    let empty: [&str; 0] = [];
    assert_eq!(assertion::create_short_signature(&empty, &empty, false), "No crash detected");

    let asan = ["==9==ERROR: AddressSanitizer: stack-overflow on address 0x7ffe (pc 0x55 bp 0x7ffe sp 0x7ffd T0)"];
    let short = assertion::create_short_signature(&asan, &empty, false);
    assert_eq!(short, "AddressSanitizer: stack-overflow");
    assert_eq!(assertion::create_short_signature(&asan, &empty, true), "No crash detected");

    let crash = ["Assertion failure: in crash data, at /x/y.cpp:1"];
    assert_eq!(assertion::create_short_signature(&empty, &crash, true), crash[0]);
}
