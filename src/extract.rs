//! Recovery of structured JSON from untrusted model text.
//!
//! Model replies arrive wrapped in markdown fences, surrounded by prose,
//! with trailing commas, or cut off mid-value when the token limit hits.
//! [`extract_json`] tries, in order:
//!
//! 1. Strip a code fence (an unclosed fence runs to end of text).
//! 2. For each opener (`{` or `[`, earliest first): parse the slice up to
//!    the opener's matching closer, then up to the last closer of the same
//!    kind, each time retrying with trailing commas removed.
//! 3. If the root container never closes, repair it: a single tokenizer
//!    pass records every safe boundary (the end of a completed member
//!    value) together with the closers still open there. Boundaries are
//!    tried from the last one backwards; the largest truncation that
//!    parses wins.
//!
//! Values cut off at end of input are never completed. A key whose value
//! did not finish is dropped, never invented.

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScoutError};

/// Extract a JSON object or array from model output.
///
/// # Errors
///
/// Returns [`ScoutError::MalformedModelOutput`] when no attempt yields a
/// parseable document.
pub fn extract_json(text: &str) -> Result<Value> {
    let mut bodies = Vec::with_capacity(2);
    if let Some(body) = fenced_body(text) {
        bodies.push(body);
    }
    bodies.push(text);

    for body in bodies {
        if let Some(value) = extract_from(body) {
            return Ok(value);
        }
    }

    debug!(input_len = text.len(), "model output has no recoverable JSON");
    Err(ScoutError::MalformedModelOutput {
        input_len: text.len(),
    })
}

/// Contents of the first code fence, without its language tag line.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body = match after.find('\n') {
        Some(nl) if !after[..nl].trim_start().starts_with(['{', '[']) => &after[nl + 1..],
        _ => after,
    };
    Some(match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    })
}

fn extract_from(body: &str) -> Option<Value> {
    let mut openers: Vec<usize> = ['{', '['].iter().filter_map(|c| body.find(*c)).collect();
    openers.sort_unstable();

    for start in openers {
        let slice = &body[start..];
        let scan = scan(slice);

        if let Some(end) = scan.root_end {
            if let Some(value) = parse_lenient(&slice[..end]) {
                return Some(value);
            }
        }

        let closer = if slice.starts_with('{') { '}' } else { ']' };
        if let Some(last) = slice.rfind(closer) {
            if let Some(value) = parse_lenient(&slice[..=last]) {
                return Some(value);
            }
        }

        if scan.root_end.is_none() {
            if let Some(value) = repair(slice, &scan) {
                debug!(
                    input_len = body.len(),
                    boundaries = scan.boundaries.len(),
                    "repaired truncated JSON"
                );
                return Some(value);
            }
        }
    }
    None
}

/// Parse directly, then again with trailing commas removed.
fn parse_lenient(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&strip_trailing_commas(candidate)).ok())
}

/// Remove commas that directly precede `}` or `]`, ignoring string contents.
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' if input[i + 1..].trim_start().starts_with(['}', ']']) => {}
            _ => out.push(c),
        }
    }
    out
}

struct Frame {
    closer: char,
    expect_key: bool,
}

/// A prefix length at which the document can be closed validly.
struct Boundary {
    end: usize,
    closers: String,
}

#[derive(Default)]
struct Scan {
    root_end: Option<usize>,
    boundaries: Vec<Boundary>,
}

impl Scan {
    fn mark(&mut self, end: usize, frames: &[Frame]) {
        self.boundaries.push(Boundary {
            end,
            closers: frames.iter().rev().map(|f| f.closer).collect(),
        });
    }
}

/// Single tokenizer pass over a slice that starts with `{` or `[`.
fn scan(slice: &str) -> Scan {
    let mut frames: Vec<Frame> = Vec::new();
    let mut scan = Scan::default();
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_key = false;
    let mut in_primitive = false;

    for (i, c) in slice.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if !string_is_key {
                    scan.mark(i + 1, &frames);
                }
            }
            continue;
        }

        if in_primitive {
            if c.is_whitespace() || matches!(c, ',' | ':' | '}' | ']') {
                in_primitive = false;
                scan.mark(i, &frames);
            } else {
                continue;
            }
        }

        match c {
            '{' | '[' => {
                frames.push(Frame {
                    closer: if c == '{' { '}' } else { ']' },
                    expect_key: c == '{',
                });
                // Last resort: the empty root container.
                if frames.len() == 1 {
                    scan.mark(i + 1, &frames);
                }
            }
            '}' | ']' => {
                if frames.pop().is_none() {
                    break;
                }
                if frames.is_empty() {
                    scan.root_end = Some(i + 1);
                    break;
                }
                scan.mark(i + 1, &frames);
            }
            '"' => {
                in_string = true;
                string_is_key = frames
                    .last()
                    .is_some_and(|f| f.closer == '}' && f.expect_key);
            }
            ':' => {
                if let Some(frame) = frames.last_mut() {
                    frame.expect_key = false;
                }
            }
            ',' => {
                if let Some(frame) = frames.last_mut() {
                    frame.expect_key = frame.closer == '}';
                }
            }
            c if c.is_whitespace() => {}
            _ => in_primitive = true,
        }
    }
    scan
}

fn repair(slice: &str, scan: &Scan) -> Option<Value> {
    scan.boundaries.iter().rev().find_map(|boundary| {
        let mut candidate = String::with_capacity(boundary.end + boundary.closers.len());
        candidate.push_str(&slice[..boundary.end]);
        candidate.push_str(&boundary.closers);
        parse_lenient(&candidate)
    })
}
