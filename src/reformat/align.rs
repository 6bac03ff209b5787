//! Assignment alignment.
//!
//! Runs of consecutive assignments sharing one operator are padded so the
//! operators sit in one column:
//!
//! ```text
//! x <- 1             x      <- 1
//! longer <- 22   =>  longer <- 22
//! ```

use crate::string_utils::{char_count, char_to_byte};
use regex::Regex;
use std::sync::OnceLock;

/// `lhs <op> value` on a single line.
fn assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(\s*[-+\w._$@'"]+\s*)(<<-|<-|=)(\s*[-+\w._$@'"]+[,;]?\s*)$"#)
            .expect("assignment pattern is valid")
    })
}

fn string_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("string literal pattern is valid")
    })
}

/// A line split around its assignment operator.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment<'a> {
    lhs: &'a str,
    operator: &'a str,
    rhs: &'a str,
}

/// Replace the insides of string literals with `x` so operators and spaces
/// inside them cannot match. Quotes stay and the char count is unchanged.
fn mask_strings(line: &str) -> String {
    string_literal_regex()
        .replace_all(line, |caps: &regex::Captures| {
            let literal = &caps[0];
            let inner = char_count(literal).saturating_sub(2);
            let quote = &literal[..1];
            format!("{}{}{}", quote, "x".repeat(inner), quote)
        })
        .into_owned()
}

fn parse_assignment(line: &str) -> Option<Assignment<'_>> {
    let masked = mask_strings(line);
    let caps = assignment_regex().captures(&masked)?;
    let operator = caps.get(2)?;

    // Masking keeps char offsets, not byte offsets
    let op_start = char_to_byte(line, char_count(&masked[..operator.start()]));
    let op_end = char_to_byte(line, char_count(&masked[..operator.end()]));

    Some(Assignment {
        lhs: line[..op_start].trim_end(),
        operator: &line[op_start..op_end],
        rhs: line[op_end..].trim(),
    })
}

/// Lines that may sit inside a run without ending it.
fn is_filler(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Inclusive row ranges of alignable assignment runs.
///
/// A run holds at least two assignments using the same operator. Blank and
/// comment lines can separate them, but a run always ends on an assignment.
pub fn alignment_ranges(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    // (first row, last assignment row, operator, assignments seen)
    let mut run: Option<(usize, usize, String, usize)> = None;

    for (row, line) in lines.iter().enumerate() {
        match parse_assignment(line) {
            Some(assignment) => {
                let continues = run
                    .as_ref()
                    .is_some_and(|(_, _, operator, _)| operator == assignment.operator);
                if continues {
                    if let Some((_, last, _, count)) = run.as_mut() {
                        *last = row;
                        *count += 1;
                    }
                } else {
                    if let Some((start, last, _, count)) = run.take() {
                        if count > 1 {
                            ranges.push((start, last));
                        }
                    }
                    run = Some((row, row, assignment.operator.to_string(), 1));
                }
            }
            None if is_filler(line) => {}
            None => {
                if let Some((start, last, _, count)) = run.take() {
                    if count > 1 {
                        ranges.push((start, last));
                    }
                }
            }
        }
    }

    if let Some((start, last, _, count)) = run {
        if count > 1 {
            ranges.push((start, last));
        }
    }
    ranges
}

/// Whether a value is an integer once trailing punctuation is removed.
fn is_integer(value: &str) -> bool {
    let digits: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | ')' | ';'))
        .collect();
    digits.parse::<i64>().is_ok()
}

/// Split a trailing `,` or `;` off a value.
fn split_terminator(value: &str) -> (&str, &str) {
    let trimmed = value.trim_end_matches([',', ';']);
    (trimmed, &value[trimmed.len()..])
}

/// Align the assignment operators of every run in `text`.
pub fn align_assignments(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = lines.iter().map(|line| line.to_string()).collect();

    for (start, end) in alignment_ranges(&lines) {
        let rows: Vec<(usize, Assignment)> = (start..=end)
            .filter_map(|row| parse_assignment(lines[row]).map(|a| (row, a)))
            .collect();

        let lhs_width = rows.iter().map(|(_, a)| char_count(a.lhs)).max().unwrap_or(0);
        let numeric = rows.iter().all(|(_, a)| is_integer(a.rhs));
        let value_width = rows
            .iter()
            .map(|(_, a)| char_count(split_terminator(a.rhs).0))
            .max()
            .unwrap_or(0);

        for (row, assignment) in rows {
            let rhs = if numeric {
                let (value, terminator) = split_terminator(assignment.rhs);
                format!("{:>width$}{}", value, terminator, width = value_width)
            } else {
                assignment.rhs.to_string()
            };
            out[row] = format!(
                "{:<width$} {} {}",
                assignment.lhs,
                assignment.operator,
                rhs,
                width = lhs_width
            );
        }
    }

    out.join("\n")
}
