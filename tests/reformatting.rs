//! End-to-end checks of the reformatter through the public API.

use scopeline::config::FormatterSettings;
use scopeline::reformat::{align_assignments, Reformatter};
use scopeline::string_utils::strip_whitespace;

const INPUTS: &[&str] = &[
    "foo(a,b)",
    "foo(a,b,c_very_long_identifier_name_that_pushes_length_past_threshold)",
    "outer(inner(a, b), c)",
    "res <- call(alpha_value = 1, beta_value = 2, gamma = 3)",
    "if (x) y",
    "if (x) y else z",
    "if (-x < -y) z",
    "if (x) {\na\n} else {\nb\n}",
    "f <- function(x){x}",
    "x<-a+b*2",
];

/// Non-whitespace content, with `;` removed since it turns into a newline.
fn content(text: &str) -> String {
    strip_whitespace(text).replace(';', "")
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reformat_is_a_fixed_point() {
    let reformatter = Reformatter::default();
    for input in INPUTS {
        let once = reformatter.reformat(input);
        let twice = reformatter.reformat(&once);
        assert_eq!(once, twice, "not a fixed point for {:?}", input);
    }
}

#[test]
fn test_reformat_preserves_tokens() {
    let reformatter = Reformatter::default();
    let messy = [
        "a <- 1; b <- 2",
        "foo(a, bar(b,",
        ")(",
        "else",
        "x[[1]][2] <- y$z@w",
        "function(x) -x # trailing note",
        "}{",
        "",
    ];
    for input in INPUTS.iter().chain(messy.iter()) {
        let output = reformatter.reformat(input);
        assert_eq!(content(&output), content(input), "tokens changed for {:?}", input);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_long_argument_list_breaks() {
    let out = Reformatter::default()
        .reformat("foo(a,b,c_very_long_identifier_name_that_pushes_length_past_threshold)");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "foo(");
    assert_eq!(lines[1].trim(), "a,");
    assert_eq!(lines[2].trim(), "b,");
    assert_eq!(lines.len(), 5);
}

#[test]
fn test_named_arguments_break() {
    let out = Reformatter::default().reformat("res <- call(alpha_value = 1, beta_value = 2, gamma = 3)");
    assert_eq!(
        out,
        "res <- call(\n  alpha_value = 1,\n  beta_value = 2,\n  gamma = 3\n)"
    );
}

#[test]
fn test_control_flow_condition_does_not_break() {
    let out = Reformatter::default().reformat("if (x) y");
    assert!(!out.contains("(\n"));
    assert!(out.starts_with("if (x)"));
}

#[test]
fn test_custom_tab_size() {
    let settings = FormatterSettings {
        tab_size: 4,
        ..FormatterSettings::default()
    };
    let out = Reformatter::new(settings).reformat("f <- function(x){x}");
    assert_eq!(out, "f <- function(x) {\n    x\n}");
}

#[test]
fn test_align_after_reformat() {
    let formatted = Reformatter::default().reformat("a<-1\nlonger<-22");
    assert_eq!(align_assignments(&formatted), "a      <-  1\nlonger <- 22");
}
