//! A small path query language over `serde_json::Value` trees.
//!
//! Supported: `$`, `.name`, `['name']`, `.*`, `[*]`, `[n]` (negative counts
//! from the end), `..name` / `..*` / `..[...]` recursive descent, and unions
//! like `['a','b']` or `[0,2]`. The leading `$` may be left out.

use crate::error::SignatureError;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Name(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Child(Vec<Selector>),
    Descendant(Vec<Selector>),
}

/// A compiled path. Parsing happens once; `find` only walks the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self, SignatureError> {
        let steps = Parser::new(source).parse().map_err(|reason| SignatureError::InvalidPath {
            path: source.to_string(),
            reason,
        })?;
        Ok(Self { source: source.to_string(), steps })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Every node the path reaches, in document order.
    pub fn find<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            match step {
                Step::Child(selectors) => {
                    for node in &current {
                        select(node, selectors, &mut next);
                    }
                }
                Step::Descendant(selectors) => {
                    for node in &current {
                        let mut all = Vec::new();
                        descendants(node, &mut all);
                        for d in all {
                            select(d, selectors, &mut next);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn select<'a>(node: &'a Value, selectors: &[Selector], out: &mut Vec<&'a Value>) {
    for sel in selectors {
        match (sel, node) {
            (Selector::Name(name), Value::Object(map)) => {
                if let Some(v) = map.get(name) {
                    out.push(v);
                }
            }
            (Selector::Index(idx), Value::Array(arr)) => {
                let len = arr.len() as i64;
                let pos = if *idx < 0 { len + idx } else { *idx };
                if (0..len).contains(&pos) {
                    out.push(&arr[pos as usize]);
                }
            }
            (Selector::Wildcard, Value::Object(map)) => out.extend(map.values()),
            (Selector::Wildcard, Value::Array(arr)) => out.extend(arr.iter()),
            _ => {}
        }
    }
}

// pre-order: the node itself, then its children recursively
fn descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Object(map) => map.values().for_each(|v| descendants(v, out)),
        Value::Array(arr) => arr.iter().for_each(|v| descendants(v, out)),
        _ => {}
    }
}

struct Parser<'s> {
    chars: Vec<char>,
    pos: usize,
    source: &'s str,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self { chars: source.trim().chars().collect(), pos: 0, source }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Vec<Step>, String> {
        if self.chars.is_empty() {
            return Err("empty path".into());
        }
        let mut steps = Vec::new();
        if !self.eat('$') {
            // implicit root: a bare name starts the path
            if !matches!(self.peek(), Some('.') | Some('[')) {
                steps.push(Step::Child(vec![self.member()?]));
            }
        }
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('.') {
                        let sels = if self.peek() == Some('[') { self.bracket()? } else { vec![self.member()?] };
                        steps.push(Step::Descendant(sels));
                    } else {
                        steps.push(Step::Child(vec![self.member()?]));
                    }
                }
                '[' => steps.push(Step::Child(self.bracket()?)),
                other => return Err(format!("unexpected `{other}` at {} in {}", self.pos, self.source)),
            }
        }
        Ok(steps)
    }

    // after a dot: `*` or a bare name
    fn member(&mut self) -> Result<Selector, String> {
        if self.eat('*') {
            return Ok(Selector::Wildcard);
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c == ']' || c == '*' || c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!("expected a name at {}", start));
        }
        Ok(Selector::Name(self.chars[start..self.pos].iter().collect()))
    }

    fn bracket(&mut self) -> Result<Vec<Selector>, String> {
        if !self.eat('[') {
            return Err(format!("expected `[` at {}", self.pos));
        }
        let mut sels = Vec::new();
        loop {
            self.skip_ws();
            let sel = match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    Selector::Wildcard
                }
                Some(q @ ('\'' | '"')) => {
                    self.pos += 1;
                    Selector::Name(self.quoted(q)?)
                }
                Some(c) if c == '-' || c.is_ascii_digit() => Selector::Index(self.integer()?),
                Some(c) => return Err(format!("unexpected `{c}` in brackets at {}", self.pos)),
                None => return Err("unterminated `[`".into()),
            };
            sels.push(sel);
            self.skip_ws();
            if self.eat(']') {
                return Ok(sels);
            }
            if !self.eat(',') {
                return Err(format!("expected `,` or `]` at {}", self.pos));
            }
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                match self.peek() {
                    Some(esc) => {
                        out.push(esc);
                        self.pos += 1;
                    }
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        Err("unterminated string".into())
    }

    fn integer(&mut self) -> Result<i64, String> {
        let start = self.pos;
        self.eat('-');
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map_err(|_| format!("invalid index `{text}`"))
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }
}
