use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::{ParamSource, Params};

/// Capture for one variable: everything up to the next literal or delimiter.
const VARIABLE_CAPTURE: &str = "([^/;?#]+)";

/// Failure to compile a template or pattern at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated variable in template '{0}'")]
    Unterminated(String),

    #[error("invalid variable name '{name}' in template '{template}'")]
    InvalidName { template: String, name: String },

    #[error("adjacent variables in template '{0}'")]
    AdjacentVariables(String),

    #[error("invalid regex '{pattern}': {message}")]
    Regex { pattern: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Variable(Arc<str>),
}

fn is_brace_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_legacy_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split a template into literal and variable tokens.
///
/// Accepts `{name}` placeholders and the legacy `:name` form.
fn tokenize(template: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    fn flush(literal: &mut String, tokens: &mut Vec<Token>) {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(TemplateError::Unterminated(template.to_string()));
                }
                if name.is_empty() || !name.chars().all(is_brace_name_char) {
                    return Err(TemplateError::InvalidName {
                        template: template.to_string(),
                        name,
                    });
                }
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Variable(Arc::from(name)));
            }
            ':' if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric()) => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if !is_legacy_name_char(n) {
                        break;
                    }
                    name.push(n);
                    chars.next();
                }
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Variable(Arc::from(name)));
            }
            _ => literal.push(c),
        }
    }
    flush(&mut literal, &mut tokens);
    let adjacent = tokens
        .windows(2)
        .any(|pair| matches!(pair, [Token::Variable(_), Token::Variable(_)]));
    if adjacent {
        return Err(TemplateError::AdjacentVariables(template.to_string()));
    }
    Ok(tokens)
}

/// Characters that end a variable and would survive percent-encoding.
///
/// These are escaped in every expanded value so a value can never contain
/// the character its capture stops at.
fn boundary_chars(tokens: &[Token]) -> Vec<char> {
    let mut reserved = Vec::new();
    for pair in tokens.windows(2) {
        if let [Token::Variable(_), Token::Literal(text)] = pair {
            let Some(c) = text.chars().next() else { continue };
            let unescaped = c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
            if unescaped && !reserved.contains(&c) {
                reserved.push(c);
            }
        }
    }
    reserved
}

fn compile_regex(pattern: &str) -> Result<Regex, TemplateError> {
    Regex::new(pattern).map_err(|e| TemplateError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Percent-decode a captured value; undecodable input is kept verbatim.
pub(crate) fn decode_value(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// A compiled, named URI template.
///
/// Literal text is matched exactly; each variable greedily captures a
/// non-empty run up to the next literal or delimiter (`/`, `;`, `?`, `#`).
/// Two variables may not be adjacent. Values are percent-encoded on
/// [`Route::expand`], including any character that starts the literal
/// following a variable, and decoded on
/// [`Route::match_path`], so for every assignment `P` of declared variables to
/// non-empty values `route.match_path(&route.expand(&P)) == Some(P)`.
///
/// ```
/// use atomrouter::template::Route;
///
/// let route = Route::compile("entry", "/{collection}/{entry}").unwrap();
/// let params = route.match_path("/posts/42").unwrap();
/// assert_eq!(params.get("collection"), Some("posts"));
/// assert_eq!(params.get("entry"), Some("42"));
/// assert_eq!(route.expand(&[("collection", "posts"), ("entry", "42")]), "/posts/42");
/// ```
#[derive(Clone)]
pub struct Route {
    name: Arc<str>,
    template: String,
    tokens: Vec<Token>,
    /// Variable names in capture-group order (duplicates kept)
    captures: Vec<Arc<str>>,
    /// Unique variable names in order of first appearance
    variables: Vec<Arc<str>>,
    /// Literal boundary characters escaped on expansion
    reserved: Vec<char>,
    regex: Regex,
    prefix_regex: Regex,
    defaults: HashMap<String, String>,
    requirements: HashMap<String, Regex>,
}

impl Route {
    /// Compile a template string into a route.
    pub fn compile(name: &str, template: &str) -> Result<Self, TemplateError> {
        let tokens = tokenize(template)?;

        let mut body = String::with_capacity(template.len() + 16);
        let mut captures = Vec::new();
        let mut variables: Vec<Arc<str>> = Vec::new();
        for token in &tokens {
            match token {
                Token::Literal(text) => body.push_str(&regex::escape(text)),
                Token::Variable(var) => {
                    body.push_str(VARIABLE_CAPTURE);
                    captures.push(Arc::clone(var));
                    if !variables.iter().any(|v| v == var) {
                        variables.push(Arc::clone(var));
                    }
                }
            }
        }

        let regex = compile_regex(&format!("^{body}$"))?;
        let prefix_regex = compile_regex(&format!("^{body}"))?;
        let reserved = boundary_chars(&tokens);

        Ok(Self {
            name: Arc::from(name),
            template: template.to_string(),
            tokens,
            captures,
            variables,
            reserved,
            regex,
            prefix_regex,
            defaults: HashMap::new(),
            requirements: HashMap::new(),
        })
    }

    /// Value used by [`Route::expand`] when no source resolves `var`.
    #[must_use]
    pub fn with_default(mut self, var: &str, value: &str) -> Self {
        self.defaults.insert(var.to_string(), value.to_string());
        self
    }

    /// Require captured values of `var` to match `pattern` in full.
    pub fn with_requirement(mut self, var: &str, pattern: &str) -> Result<Self, TemplateError> {
        let regex = compile_regex(&format!("^(?:{pattern})$"))?;
        self.requirements.insert(var.to_string(), regex);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.as_ref())
    }

    #[must_use]
    pub fn declares(&self, var: &str) -> bool {
        self.variables.iter().any(|v| v.as_ref() == var)
    }

    /// True when the template has no variables.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.variables.is_empty()
    }

    /// Match the whole path.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        self.collect(&caps)
    }

    /// Match a leading portion of `path` ending on a segment boundary.
    ///
    /// Returns the captured parameters and the unmatched suffix, which is
    /// either empty or starts with `/`, `;` or `?` (unless the template itself
    /// ends with `/`).
    #[must_use]
    pub fn match_prefix<'p>(&self, path: &'p str) -> Option<(Params, &'p str)> {
        let caps = self.prefix_regex.captures(path)?;
        let end = caps.get(0)?.end();
        let rest = &path[end..];
        let on_boundary = rest.is_empty()
            || rest.starts_with(['/', ';', '?'])
            || self.template.ends_with('/');
        if !on_boundary {
            return None;
        }
        let params = self.collect(&caps)?;
        Some((params, rest))
    }

    fn collect(&self, caps: &Captures<'_>) -> Option<Params> {
        let mut params = Params::new();
        for (idx, var) in self.captures.iter().enumerate() {
            let raw = caps.get(idx + 1).map(|m| m.as_str()).unwrap_or("");
            let value = decode_value(raw);
            if let Some(requirement) = self.requirements.get(var.as_ref()) {
                if !requirement.is_match(&value) {
                    return None;
                }
            }
            params.insert(Arc::clone(var), value);
        }
        Some(params)
    }

    /// Expand the template from `source`.
    ///
    /// Unresolved variables fall back to the route default and otherwise
    /// expand to the empty string. Names enumerated by `source` that the
    /// template does not declare are appended as a query string in name order.
    #[must_use]
    pub fn expand(&self, source: &dyn ParamSource) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Variable(var) => {
                    let value = source
                        .resolve(var)
                        .or_else(|| self.defaults.get(var.as_ref()).cloned());
                    if let Some(value) = value {
                        self.push_value(&mut out, &value);
                    }
                }
            }
        }

        let mut separator = if self.template.contains('?') { '&' } else { '?' };
        for name in source.names() {
            if self.declares(&name) {
                continue;
            }
            if let Some(value) = source.resolve(&name) {
                out.push(separator);
                separator = '&';
                out.push_str(&urlencoding::encode(&name));
                out.push('=');
                out.push_str(&urlencoding::encode(&value));
            }
        }
        out
    }

    fn push_value(&self, out: &mut String, value: &str) {
        let encoded = urlencoding::encode(value);
        if self.reserved.is_empty() {
            out.push_str(&encoded);
            return;
        }
        for c in encoded.chars() {
            if self.reserved.contains(&c) {
                out.push_str(&format!("%{:02X}", c as u32));
            } else {
                out.push(c);
            }
        }
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.template == other.template
    }
}

impl Eq for Route {}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("variables", &self.variables)
            .finish()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
