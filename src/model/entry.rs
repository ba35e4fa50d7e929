use serde::{Deserialize, Serialize};

use super::Category;

/// Author or contributor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Person {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn default_rel() -> String {
    "alternate".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default = "default_rel")]
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.to_string(),
            media_type: None,
            title: None,
        }
    }
}

/// How the entry content is carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Html,
    Xhtml,
    Xml,
    /// Any other media type, inline (base64 in Atom) or out of line
    Media,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub kind: ContentKind,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Out-of-line content reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl Content {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Out-of-line media content, as carried by media link entries.
    pub fn out_of_line(media_type: &str, src: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Media,
            media_type: Some(media_type.to_string()),
            value: None,
            src: Some(src.into()),
        }
    }

    /// Renderable inline text, HTML, XHTML or XML.
    #[must_use]
    pub fn is_inline_renderable(&self) -> bool {
        self.src.is_none() && !matches!(self.kind, ContentKind::Media)
    }
}

/// Metadata copied from the feed an entry originated in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Person>,
}

/// An Atom entry reduced to the fields the router inspects.
///
/// Timestamps are RFC 3339 strings; they are compared as opaque markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EntrySource>,
}

impl Entry {
    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Replace every link with `rel` by a single link to `href`.
    pub fn set_link(&mut self, rel: &str, href: impl Into<String>) {
        self.links.retain(|l| l.rel != rel);
        self.links.push(Link::new(rel, href));
    }

    /// Own authors, falling back to the authors of the source feed.
    #[must_use]
    pub fn effective_authors(&self) -> &[Person] {
        if !self.authors.is_empty() {
            return &self.authors;
        }
        self.source
            .as_ref()
            .map(|s| s.authors.as_slice())
            .unwrap_or_default()
    }

    /// `edited` when present, otherwise `updated`.
    #[must_use]
    pub fn modification_marker(&self) -> Option<&str> {
        self.edited.as_deref().or(self.updated.as_deref())
    }
}

/// A stored entry and the path key it is addressed by inside its collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub key: String,
    pub entry: Entry,
}

/// Binary payload of a media resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    pub key: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub updated: String,
}
