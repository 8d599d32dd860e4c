use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

// Characters that carry meaning in a pattern. Deliberately narrower than
// `regex::escape`, which would also escape `#`, `&`, `~` and whitespace.
const ACTIVE_CHARS: &[char] = &[
    '\\', '[', ']', '{', '}', '(', ')', '*', '+', '-', '?', '^', '$', '.', '|',
];

const PATH_PATTERN: &str = "([a-zA-Z]:)?/.+/";

/// One generalization step: every span of the escaped text matched by
/// `search` is replaced with `source`, the pattern that stands for it.
struct Generalization {
    search: Regex,
    source: String,
}

impl Generalization {
    fn same(source: &str) -> Self {
        Self { search: Regex::new(source).unwrap(), source: source.to_string() }
    }

    /// A path preceded by `prefix`. The prefix is searched for in its escaped
    /// form so a `(` that was escaped to `\(` is replaced as a whole.
    fn path(prefix: &str) -> Self {
        let escaped = escape_pattern(prefix);
        Self {
            search: Regex::new(&format!("{}{}", regex::escape(&escaped), PATH_PATTERN)).unwrap(),
            source: format!("{escaped}{PATH_PATTERN}"),
        }
    }
}

// Order matters: each step runs over the output of the previous one.
static GENERALIZATIONS: Lazy<Vec<Generalization>> = Lazy::new(|| {
    vec![
        // memory addresses
        Generalization::same("0x[0-9a-fA-F]+"),
        // line numbers change across versions
        Generalization::same("(:[0-9]+)+"),
        Generalization::same(", line [0-9]+"),
        // rust thread numbers
        Generalization::same("Thread#[0-9]+' panicked"),
        // full paths, only when introduced by a character that can't be part of them
        Generalization::path(" "),
        Generalization::path("'"),
        Generalization::path("\""),
        Generalization::path(","),
        Generalization::path("("),
        // larger numbers; single digits are likely constants
        Generalization::same("[0-9]{2,}"),
    ]
});

/// Escape the characters that are active in a pattern so `msg` matches itself.
pub fn escape_pattern(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len() + 8);
    for ch in msg.chars() {
        if ACTIVE_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Turn a literal crash line into a pattern that tolerates addresses, line
/// numbers, paths and larger numbers differing between runs.
pub fn sanitize_pattern(msg: &str) -> String {
    let mut sanitized = escape_pattern(msg);
    for step in GENERALIZATIONS.iter() {
        sanitized = step.search.replace_all(&sanitized, NoExpand(&step.source)).into_owned();
    }
    sanitized
}

/// List form of [`sanitize_pattern`]; keeps length and order.
pub fn sanitize_patterns<S: AsRef<str>>(msgs: &[S]) -> Vec<String> {
    msgs.iter().map(|m| sanitize_pattern(m.as_ref())).collect()
}
