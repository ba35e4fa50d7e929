//! # Validation Module
//!
//! Concurrency and validity helpers the dispatcher relies on:
//!
//! - [`EntityTag`]: deterministic validators derived from stable entity
//!   attributes, plus `If-Match` / `If-None-Match` parsing.
//! - [`is_valid_entry`]: the minimal validity rules an entry must satisfy
//!   before an adapter sees it.
//! - [`check_update_conflict`]: optimistic id-equality check on update.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProviderError, ProviderResult};
use crate::model::{ContentKind, Entry};

/// Opaque cache validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag {
    tag: String,
    weak: bool,
}

impl EntityTag {
    /// Strong tag over the given material.
    ///
    /// Parts are separated before hashing so `("ab", "c")` and `("a", "bc")`
    /// produce different tags.
    #[must_use]
    pub fn generate<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref().as_bytes());
            hasher.update([0x1f]);
        }
        let tag = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self { tag, weak: false }
    }

    /// Tag for an entry: (id, edited-or-updated).
    #[must_use]
    pub fn for_entry(entry: &Entry) -> Self {
        Self::generate(&[
            entry.id.as_deref().unwrap_or_default(),
            entry.modification_marker().unwrap_or_default(),
        ])
    }

    pub fn strong(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            weak: false,
        }
    }

    pub fn weak(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            weak: true,
        }
    }

    #[must_use]
    pub fn into_weak(self) -> Self {
        Self {
            tag: self.tag,
            weak: true,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Strong comparison: both strong and equal opaque tags.
    #[must_use]
    pub fn strong_eq(&self, other: &Self) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }

    /// Weak comparison: equal opaque tags regardless of weakness.
    #[must_use]
    pub fn weak_eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }

    /// Parse a comma separated header value (`If-Match`, `If-None-Match`).
    ///
    /// Malformed members are skipped; `*` yields [`TagList::Any`].
    #[must_use]
    pub fn parse_list(header: &str) -> TagList {
        if header.trim() == "*" {
            return TagList::Any;
        }
        let mut tags = Vec::new();
        let mut rest = header;
        loop {
            rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }
            let (weak, body) = match rest.strip_prefix("W/") {
                Some(b) => (true, b),
                None => (false, rest),
            };
            let Some(body) = body.strip_prefix('"') else {
                // skip to next member
                rest = rest.split_once(',').map(|(_, r)| r).unwrap_or("");
                continue;
            };
            let Some(end) = body.find('"') else { break };
            tags.push(Self {
                tag: body[..end].to_string(),
                weak,
            });
            rest = &body[end + 1..];
        }
        TagList::Tags(tags)
    }

    /// True when `list` contains a tag matching `self`.
    ///
    /// `If-None-Match` uses weak comparison, `If-Match` strong.
    #[must_use]
    pub fn matches_any(&self, list: &TagList, weak_comparison: bool) -> bool {
        match list {
            TagList::Any => true,
            TagList::Tags(tags) => tags.iter().any(|t| {
                if weak_comparison {
                    self.weak_eq(t)
                } else {
                    self.strong_eq(t)
                }
            }),
        }
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.tag)
        } else {
            write!(f, "\"{}\"", self.tag)
        }
    }
}

impl FromStr for EntityTag {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse_list(s) {
            TagList::Tags(mut tags) if tags.len() == 1 => Ok(tags.remove(0)),
            _ => Err(ProviderError::BadRequest(format!("invalid entity tag: {s}"))),
        }
    }
}

/// Parsed conditional header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagList {
    Any,
    Tags(Vec<EntityTag>),
}

/// Minimal validity rules for an entry about to reach an adapter.
///
/// The entry must carry an absolute id, a title, at least one author (own or
/// inherited from its source) and an updated timestamp. Without content it
/// needs an alternate link; with out-of-line or media content it needs a
/// summary.
pub fn is_valid_entry(entry: &Entry) -> ProviderResult<()> {
    let invalid = |msg: &str| Err(ProviderError::Validation(msg.to_string()));

    let Some(id) = entry.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return invalid("missing id");
    };
    if url::Url::parse(id).is_err() {
        return invalid("id is not an absolute IRI");
    }
    if entry.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        return invalid("missing title");
    }
    if entry.effective_authors().is_empty() {
        return invalid("missing author");
    }
    if entry.updated.as_deref().is_none_or(|u| u.trim().is_empty()) {
        return invalid("missing updated");
    }
    match &entry.content {
        None => {
            if entry.link("alternate").is_none() {
                return invalid("entry without content needs an alternate link");
            }
        }
        Some(content) => {
            let needs_summary = content.src.is_some() || content.kind == ContentKind::Media;
            if needs_summary && entry.summary.as_deref().is_none_or(|s| s.trim().is_empty()) {
                return invalid("out-of-line or media content needs a summary");
            }
        }
    }
    Ok(())
}

/// The submitted entry must describe the stored one.
pub fn check_update_conflict(submitted: &Entry, stored: &Entry) -> ProviderResult<()> {
    if submitted.id == stored.id {
        Ok(())
    } else {
        Err(ProviderError::Conflict(format!(
            "submitted id {} does not match stored id {}",
            submitted.id.as_deref().unwrap_or("<none>"),
            stored.id.as_deref().unwrap_or("<none>"),
        )))
    }
}

/// Path-safe form of a `Slug` header: runs of characters outside
/// `[A-Za-z0-9._-]` collapse to a single `_`.
#[must_use]
pub fn sanitize_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    let mut pending = false;
    for c in slug.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            if pending {
                out.push('_');
                pending = false;
            }
            out.push(c);
        } else {
            pending = true;
        }
    }
    if pending && !out.is_empty() {
        out.push('_');
    }
    out
}
