//! Chunk header and option parsing
//!
//! A chunk opens with a fence such as ```` ```{r setup, echo=FALSE} ````.
//! The first word inside the braces names the engine, a following bare word
//! is the label and the rest are `key=value` options. Quarto-style chunks
//! carry more options as `#| key: value` comment lines at the top of the
//! body.

use crate::document::Document;
use crate::error::{Error, Result, ResultExt};
use crate::scope::{Scope, ScopeKind};
use log::debug;
use std::collections::BTreeMap;

/// Engine assumed when a header does not name one.
pub const DEFAULT_ENGINE: &str = "r";

/// Prefix of option comment lines in a chunk body.
const OPTION_COMMENT: &str = "#|";

/// Options of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOptions {
    pub engine: Option<String>,
    pub label: Option<String>,
    /// Every other option, values unquoted
    pub options: BTreeMap<String, String>,
}

impl ChunkOptions {
    /// Parse the options of a chunk fence line.
    ///
    /// Lines without a `{...}` block yield empty options.
    pub fn parse_header(line: &str) -> Self {
        let mut parsed = Self::default();
        let inner = match (line.find('{'), line.rfind('}')) {
            (Some(open), Some(close)) if open < close => &line[open + 1..close],
            _ => return parsed,
        };

        for (index, item) in split_items(inner).into_iter().enumerate() {
            if index == 0 {
                parsed.take_leading_item(item);
            } else if let Some((key, value)) = split_option(item) {
                parsed.set(key, value);
            } else if parsed.label.is_none() && !item.is_empty() {
                parsed.label = Some(unquote(item).to_string());
            }
        }
        parsed
    }

    /// Options of a chunk scope: its header merged with the `#|` comment
    /// lines that open its body. Comment options win over header options.
    ///
    /// Malformed comment options are logged and ignored.
    pub fn collect<D: Document + ?Sized>(doc: &D, scope: &Scope) -> Self {
        let mut options = match &scope.kind {
            ScopeKind::Chunk { header, .. } => Self::parse_header(header),
            _ => return Self::default(),
        };

        let yaml = option_comment_block(doc, scope);
        if yaml.is_empty() {
            return options;
        }
        let body_options = parse_option_comments(&yaml)
            .unwrap_or_warn_default(BTreeMap::new(), "Ignoring chunk option comments");
        debug!(
            "Chunk at row {} has {} comment option(s)",
            scope.preamble.row,
            body_options.len()
        );
        for (key, value) in body_options {
            options.set(&key, &value);
        }
        options
    }

    /// Value of option `key`, including `engine` and `label`.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "engine" => self.engine.as_deref(),
            "label" => self.label.as_deref(),
            _ => self.options.get(key).map(String::as_str),
        }
    }

    /// The engine, defaulting to R when the header names none.
    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = unquote(value).to_string();
        match key {
            "engine" => self.engine = Some(value),
            "label" => self.label = Some(value),
            _ => {
                self.options.insert(key.to_string(), value);
            }
        }
    }

    /// `r`, `r label`, `r echo=FALSE` or a bare `key=value`.
    fn take_leading_item(&mut self, item: &str) {
        if let Some((key, value)) = split_option(item) {
            if !key.contains(char::is_whitespace) {
                self.set(key, value);
                return;
            }
        }
        let (engine, rest) = match item.find(char::is_whitespace) {
            Some(at) => (&item[..at], item[at..].trim()),
            None => (item, ""),
        };
        if !engine.is_empty() && self.engine.is_none() {
            self.engine = Some(engine.to_string());
        }
        if rest.is_empty() {
            return;
        }
        match split_option(rest) {
            Some((key, value)) => self.set(key, value),
            None => self.label = Some(unquote(rest).to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Header splitting
// ─────────────────────────────────────────────────────────────────────────────

/// Split on commas that are outside quotes and brackets.
fn split_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;

    for (at, c) in inner.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(inner[start..at].trim());
                start = at + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !items.is_empty() {
        items.push(last);
    }
    items
}

/// `key = value` split at the first `=`, or `None` for a bare item.
fn split_option(item: &str) -> Option<(&str, &str)> {
    let at = item.find('=')?;
    let key = item[..at].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, item[at + 1..].trim()))
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// ─────────────────────────────────────────────────────────────────────────────
// Comment options
// ─────────────────────────────────────────────────────────────────────────────

/// The `#|` lines at the top of the chunk body, prefixes stripped.
pub(crate) fn option_comment_block<D: Document + ?Sized>(doc: &D, scope: &Scope) -> String {
    let last_row = scope
        .end
        .map(|end| end.row)
        .unwrap_or_else(|| doc.row_count());
    let mut lines = Vec::new();
    for row in scope.body_start.row + 1..last_row.min(doc.row_count()) {
        let line = match doc.line(row) {
            Some(line) => line.trim_start(),
            None => break,
        };
        match line.strip_prefix(OPTION_COMMENT) {
            Some(rest) => lines.push(rest.strip_prefix(' ').unwrap_or(rest)),
            None => break,
        }
    }
    lines.join("\n")
}

fn parse_option_comments(yaml: &str) -> Result<BTreeMap<String, String>> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Ok(BTreeMap::new()),
        _ => {
            return Err(Error::ChunkOptions {
                message: "expected `key: value` lines".to_string(),
            })
        }
    };
    Ok(mapping
        .iter()
        .filter_map(|(key, value)| match key {
            serde_yaml::Value::String(key) => Some((key.clone(), yaml_to_string(value))),
            _ => None,
        })
        .collect())
}

fn yaml_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        serde_yaml::Value::Mapping(_) => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
        serde_yaml::Value::Tagged(tagged) => yaml_to_string(&tagged.value),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, TextDocument};
    use crate::scope::ScopeTree;

    // ─────────────────────────────────────────────────────────────────────────
    // Header tests
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_engine_and_label() {
        let options = ChunkOptions::parse_header("```{r setup, include=FALSE}");
        assert_eq!(options.engine.as_deref(), Some("r"));
        assert_eq!(options.label.as_deref(), Some("setup"));
        assert_eq!(options.get("include"), Some("FALSE"));
    }

    #[test]
    fn test_parse_engine_only() {
        let options = ChunkOptions::parse_header("```{python}");
        assert_eq!(options.engine(), "python");
        assert_eq!(options.label, None);
        assert!(options.options.is_empty());
    }

    #[test]
    fn test_quoted_values_keep_commas() {
        let options = ChunkOptions::parse_header(r#"```{r plot, fig.cap="a, b", fig.dim=c(4, 3)}"#);
        assert_eq!(options.get("fig.cap"), Some("a, b"));
        assert_eq!(options.get("fig.dim"), Some("c(4, 3)"));
        assert_eq!(options.options.len(), 2);
    }

    #[test]
    fn test_engine_and_label_options_override() {
        let options = ChunkOptions::parse_header("```{r first, label='second', engine=\"Python\"}");
        assert_eq!(options.label.as_deref(), Some("second"));
        assert_eq!(options.engine(), "Python");
    }

    #[test]
    fn test_comma_after_engine() {
        let options = ChunkOptions::parse_header("```{r, echo=TRUE}");
        assert_eq!(options.engine(), "r");
        assert_eq!(options.label, None);
        assert_eq!(options.get("echo"), Some("TRUE"));

        let options = ChunkOptions::parse_header("```{r echo=TRUE}");
        assert_eq!(options.label, None);
        assert_eq!(options.get("echo"), Some("TRUE"));
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(ChunkOptions::parse_header("```"), ChunkOptions::default());
        assert_eq!(ChunkOptions::default().engine(), DEFAULT_ENGINE);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Comment option tests
    // ─────────────────────────────────────────────────────────────────────────

    fn chunk_scope(header: &str, rows: usize) -> Scope {
        let mut tree = ScopeTree::new();
        let id = tree.push(
            ScopeKind::Chunk {
                label: None,
                header: header.to_string(),
            },
            Position::new(0, 0),
            Position::new(0, header.len()),
        );
        tree.close(id, Position::new(rows, 3));
        tree.scope(id).clone()
    }

    #[test]
    fn test_collect_merges_comment_options() {
        let text = "```{r cars, echo=FALSE}\n#| label: trucks\n#| fig-width: 6\n#| echo: true\nplot(cars)\n```";
        let doc = TextDocument::from_text(text);
        let scope = chunk_scope("```{r cars, echo=FALSE}", 5);
        let options = ChunkOptions::collect(&doc, &scope);

        assert_eq!(options.label.as_deref(), Some("trucks"));
        assert_eq!(options.get("fig-width"), Some("6"));
        assert_eq!(options.get("echo"), Some("true"));
    }

    #[test]
    fn test_collect_stops_at_code() {
        let text = "```{python}\nx = 1\n#| echo: false\n```";
        let doc = TextDocument::from_text(text);
        let scope = chunk_scope("```{python}", 3);
        let options = ChunkOptions::collect(&doc, &scope);
        assert_eq!(options.get("echo"), None);
    }

    #[test]
    fn test_collect_ignores_malformed_yaml() {
        let text = "```{r}\n#| echo: [unclosed\n1\n```";
        let doc = TextDocument::from_text(text);
        let scope = chunk_scope("```{r}", 3);
        let options = ChunkOptions::collect(&doc, &scope);
        assert_eq!(options.engine(), "r");
        assert!(options.options.is_empty());
    }

    #[test]
    fn test_option_comments_must_be_mapping() {
        assert!(parse_option_comments("just text").is_err());
        let parsed = parse_option_comments("tags: [a, b]").unwrap();
        assert_eq!(parsed.get("tags").map(String::as_str), Some("a, b"));
    }
}
