//! Picks the most diagnostic abort line out of program output.
//!
//! Every program prints its fatal assertions differently, so extraction is a
//! cascade of format-specific rules. Per line the first matching rule wins;
//! across the buffer the last qualifying line wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RE_PID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d+\]\s+").unwrap());
static RE_ASSERTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ASSERTION \d+: \(.+\)").unwrap());
static RE_MOZ_CRASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"Hit MOZ_CRASH\(.+\)").unwrap());
static RE_RUST_ASSERT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^thread .*? panicked at '.+$").unwrap());
static RE_RUST_END: Lazy<Regex> = Lazy::new(|| Regex::new(r".+?\.rs(:\d+)+$").unwrap());
static RE_UBSAN: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+:\d+: runtime error: ").unwrap());

// Decorations stripped from ASan headers; they differ on every run.
static ASAN_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"on address 0x[0-9a-f]+").unwrap(),
        Regex::new(r"(at |\()pc 0x[0-9a-f]+").unwrap(),
        Regex::new(r"bp 0x[0-9a-f]+").unwrap(),
        Regex::new(r"sp 0x[0-9a-f]+").unwrap(),
        Regex::new(r"T[0-9]+\)").unwrap(),
        Regex::new(r"^[0-9=]+").unwrap(),
    ]
});

static RE_ASAN_ERROR_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ERROR: ").unwrap());
static RE_ASAN_THREAD: Lazy<Regex> = Lazy::new(|| Regex::new(r" in thread T.+").unwrap());

/// A single abort line, or an ordered group of lines for formats that span
/// several lines (V8 fatal errors, multi-line Rust panics, ASan read/write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AbortMessage {
    Line(String),
    Lines(Vec<String>),
}

impl AbortMessage {
    pub fn lines(&self) -> Vec<&str> {
        match self {
            AbortMessage::Line(l) => vec![l.as_str()],
            AbortMessage::Lines(ls) => ls.iter().map(|l| l.as_str()).collect(),
        }
    }

    /// All lines joined with a single space.
    pub fn joined(&self) -> String {
        self.lines().join(" ")
    }
}

/// When a multi-line message has started, the line that closes it.
#[derive(Clone, Copy)]
enum Continuation {
    RustPanic,
    // V8 prints exactly one more line after the header
    NextLine,
}

impl Continuation {
    fn ends_at(self, line: &str) -> bool {
        match self {
            Continuation::RustPanic => RE_RUST_END.is_match(line),
            Continuation::NextLine => true,
        }
    }
}

pub fn strip_pid(line: &str) -> &str {
    match RE_PID.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Extract an assertion the program under test raised itself.
pub fn get_assertion<S: AsRef<str>>(output: &[S]) -> Option<AbortMessage> {
    let mut last: Option<AbortMessage> = None;
    let mut pending: Option<Continuation> = None;

    // once set, a bare MOZ_CRASH line may no longer take over
    let mut have_fatal_assertion = false;
    // self-hosted JS asserts are followed by a plain "Assertion failure: false"
    let mut have_self_hosted_assert = false;

    for raw in output {
        let line = strip_pid(raw.as_ref());

        if let Some(cont) = pending {
            if let Some(AbortMessage::Lines(lines)) = last.as_mut() {
                lines.push(line.to_string());
            }
            if cont.ends_at(line) {
                pending = None;
            }
        } else if line.starts_with("Assertion failure") {
            // Firefox fatal assertion (MOZ_ASSERT, JS_ASSERT)
            if have_self_hosted_assert && line.contains("false") {
                continue;
            }
            last = Some(AbortMessage::Line(line.to_string()));
            have_fatal_assertion = true;
        } else if line.contains("panicked at") && RE_RUST_ASSERT.is_match(line) {
            if RE_RUST_END.is_match(line) {
                last = Some(AbortMessage::Line(line.to_string()));
            } else {
                pending = Some(Continuation::RustPanic);
                last = Some(AbortMessage::Lines(vec![line.to_string()]));
            }
            have_fatal_assertion = true;
        } else if line.starts_with("# Fatal error in") {
            pending = Some(Continuation::NextLine);
            last = Some(AbortMessage::Lines(vec![line.to_string()]));
            have_fatal_assertion = true;
        } else if line.contains("Assertion") && line.contains("failed") {
            // ANGLE
            last = Some(AbortMessage::Line(line.to_string()));
        } else if line.contains(": failed assertion") {
            // SkASSERT
            last = Some(AbortMessage::Line(line.to_string()));
            have_fatal_assertion = true;
        } else if line.contains(": fatal error: \"assert") {
            last = Some(AbortMessage::Line(line.to_string()));
            have_fatal_assertion = true;
        } else if line.starts_with("ASSERTION") && RE_ASSERTION.is_match(line) {
            last = Some(AbortMessage::Line(line.to_string()));
            have_fatal_assertion = true;
        } else if !have_fatal_assertion && line.contains("MOZ_CRASH") && RE_MOZ_CRASH.is_match(line) {
            // only MOZ_CRASH with a message is interesting
            last = Some(AbortMessage::Line(line.to_string()));
        } else if line.contains("Self-hosted JavaScript assertion info") {
            last = Some(AbortMessage::Line(line.to_string()));
            have_self_hosted_assert = true;
            have_fatal_assertion = true;
        } else if line.contains("terminate called after throwing an instance of") {
            // unhandled C++ exception
            last = Some(AbortMessage::Line(line.to_string()));
            have_fatal_assertion = true;
        } else if line.starts_with("[Non-crash bug] ") {
            last = Some(AbortMessage::Line(line.to_string()));
        }
    }

    last
}

/// Extract an abort raised by a helper tool (sanitizers, glibc) rather than
/// the program itself.
pub fn get_auxiliary_abort_message<S: AsRef<str>>(output: &[S]) -> Option<AbortMessage> {
    let mut last: Option<AbortMessage> = None;
    let mut need_asan_rw = false;

    for raw in output {
        let line = strip_pid(raw.as_ref());

        if line.contains("ERROR: AddressSanitizer") {
            if !line.contains("SEGV on unknown address") {
                let mut cleaned = line.to_string();
                for re in ASAN_NOISE.iter() {
                    cleaned = re.replace_all(&cleaned, "").into_owned();
                }
                last = Some(AbortMessage::Line(cleaned.trim().to_string()));
                need_asan_rw = true;
            }
        } else if need_asan_rw && (line.contains("READ of size") || line.contains("WRITE of size")) {
            if let Some(AbortMessage::Line(header)) = last.take() {
                last = Some(AbortMessage::Lines(vec![header, line.to_string()]));
            }
            need_asan_rw = false;
        } else if line.contains("glibc detected") {
            last = Some(AbortMessage::Line(line.to_string()));
        } else if line.contains("runtime error") && RE_UBSAN.is_match(line) {
            // UBSan
            last = Some(AbortMessage::Line(line.to_string()));
        }
    }

    last
}

/// Program assertions first; helper-tool aborts only when `program_only` is off.
pub fn extract_abort_message<S: AsRef<str>>(output: &[S], program_only: bool) -> Option<AbortMessage> {
    get_assertion(output).or_else(|| {
        if program_only {
            None
        } else {
            get_auxiliary_abort_message(output)
        }
    })
}

pub const NO_SHORT_SIGNATURE: &str = "No crash detected";

/// Compact fingerprint of a report's output, used as the triage cache key.
pub fn create_short_signature<S: AsRef<str>>(stderr: &[S], crash_data: &[S], program_only: bool) -> String {
    if let Some(msg) = get_assertion(stderr).or_else(|| get_assertion(crash_data)) {
        return msg.joined();
    }
    if program_only {
        return NO_SHORT_SIGNATURE.to_string();
    }
    match get_auxiliary_abort_message(stderr).or_else(|| get_auxiliary_abort_message(crash_data)) {
        Some(msg) => {
            let lines = msg.lines();
            let head = RE_ASAN_ERROR_PREFIX.replace(lines[0], "");
            RE_ASAN_THREAD.replace(&head, "").into_owned()
        }
        None => NO_SHORT_SIGNATURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_pid_prefix() {
        assert_eq!(strip_pid("[1234] Assertion failure: x"), "Assertion failure: x");
        assert_eq!(strip_pid("[abc] x"), "[abc] x");
    }

    #[test]
    fn self_hosted_assert_skips_following_false() {
        let lines = [
            "Self-hosted JavaScript assertion info: \"/src/Intl.js:12: bad locale\"",
            "Assertion failure: false, at /src/vm/SelfHosting.cpp:431",
        ];
        assert_eq!(get_assertion(&lines), Some(AbortMessage::Line(lines[0].to_string())));
    }

    #[test]
    fn moz_crash_does_not_override_fatal_assertion() {
        let lines = [
            "Assertion failure: cx->isExceptionPending(), at /src/jsapi.cpp:10",
            "Hit MOZ_CRASH(something else) at /src/x.cpp:5",
        ];
        assert_eq!(get_assertion(&lines), Some(AbortMessage::Line(lines[0].to_string())));
    }

    #[test]
    fn asan_read_follows_header() {
        let lines = [
            "==5328==ERROR: AddressSanitizer: heap-buffer-overflow on address 0x60200000cfd4 at pc 0x7f2b bp 0x7ffd sp 0x7ffc",
            "READ of size 8 at 0x60200000cfd4 thread T0",
        ];
        assert_eq!(
            get_auxiliary_abort_message(&lines),
            Some(AbortMessage::Lines(vec![
                "ERROR: AddressSanitizer: heap-buffer-overflow".to_string(),
                lines[1].to_string(),
            ]))
        );
    }
}
