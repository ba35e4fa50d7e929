use regex::Regex;
use std::fmt;
use std::sync::Arc;

use super::route::{decode_value, TemplateError};
use super::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

/// Regex matcher with positional capture groups.
///
/// The pattern must match the whole path; it is wrapped as `^(?:pattern)$`
/// before compiling, so unanchored sources never match a substring.
/// Group `n` (1-based) is exposed under `fields[n - 1]` when a field name was
/// given for it and under its index otherwise. When the regex is a plain
/// sequence of escaped literals and capture groups, a reverse template is
/// derived so positional values can be expanded back into a path.
#[derive(Clone)]
pub struct RegexPattern {
    source: String,
    regex: Regex,
    fields: Vec<Arc<str>>,
    reverse: Option<Vec<Segment>>,
}

impl RegexPattern {
    pub fn new(pattern: &str, fields: &[&str]) -> Result<Self, TemplateError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| TemplateError::Regex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let groups = regex.captures_len().saturating_sub(1);
        let fields = (0..groups)
            .map(|i| match fields.get(i) {
                Some(name) => Arc::from(*name),
                None => Arc::from(i.to_string()),
            })
            .collect();
        Ok(Self {
            source: pattern.to_string(),
            reverse: derive_reverse(pattern),
            regex,
            fields,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.as_ref())
    }

    /// Positional capture values; unmatched optional groups are empty strings.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(
            (1..=self.fields.len())
                .map(|i| caps.get(i).map(|m| decode_value(m.as_str())).unwrap_or_default())
                .collect(),
        )
    }

    /// Captures keyed by field name.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let values = self.captures(path)?;
        Some(
            self.fields
                .iter()
                .map(Arc::clone)
                .zip(values)
                .collect(),
        )
    }

    /// True when [`RegexPattern::expand`] can produce paths.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.reverse.is_some()
    }

    /// Expand positional values through the derived reverse template.
    ///
    /// `None` when no reverse template exists or the value count does not
    /// equal the group count.
    #[must_use]
    pub fn expand(&self, values: &[&str]) -> Option<String> {
        let reverse = self.reverse.as_ref()?;
        if values.len() != self.fields.len() {
            return None;
        }
        let mut out = String::new();
        for segment in reverse {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Group(idx) => out.push_str(&urlencoding::encode(values.get(*idx)?)),
            }
        }
        Some(out)
    }

    /// Expand using field names looked up in `params`; missing values are empty.
    #[must_use]
    pub fn expand_params(&self, params: &Params) -> Option<String> {
        let values: Vec<&str> = self
            .fields
            .iter()
            .map(|f| params.get(f).unwrap_or(""))
            .collect();
        self.expand(&values)
    }
}

/// Reverse template for `^literal(group)literal...$`.
///
/// Only escaped characters, plain literals and top-level capture groups are
/// understood; anything else (alternation, quantifiers outside a group,
/// character classes, non-capturing groups) makes the pattern irreversible.
fn derive_reverse(pattern: &str) -> Option<Vec<Segment>> {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    let body = match body.strip_suffix('$') {
        Some(b) if !b.ends_with('\\') => b,
        _ => body,
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut group = 0usize;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                if escaped.is_ascii_alphanumeric() {
                    // \d, \w and friends are classes, not literals
                    return None;
                }
                literal.push(escaped);
            }
            '(' => {
                if chars.peek() == Some(&'?') {
                    chars.next();
                    // named groups still capture; any other `(?` form does not
                    match chars.peek() {
                        Some('P') | Some('<') => {}
                        _ => return None,
                    }
                }
                skip_group(&mut chars)?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Group(group));
                group += 1;
            }
            '.' | '*' | '+' | '?' | '[' | ']' | '{' | '}' | '|' | ')' | '^' | '$' => return None,
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    // a quantified group or nested capture would break positional alignment
    let total = Regex::new(pattern).ok()?.captures_len() - 1;
    (total == group).then_some(segments)
}

/// Consume up to and including the `)` closing an already opened group.
fn skip_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<()> {
    let mut depth = 1usize;
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next()?;
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => {
                depth -= 1;
                if depth == 0 {
                    if matches!(chars.peek(), Some('*' | '+' | '?' | '{')) {
                        return None;
                    }
                    return Some(());
                }
            }
            _ => {}
        }
    }
    None
}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexPattern")
            .field("pattern", &self.source)
            .field("fields", &self.fields)
            .field("reversible", &self.reverse.is_some())
            .finish()
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.fields == other.fields
    }
}
