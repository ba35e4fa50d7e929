//! In-memory reference backend.
//!
//! Members are kept in insertion order behind a `RwLock`; listings come out
//! newest first. Every write stamps an `edited` marker that strictly increases
//! per adapter, so two writes within the same millisecond still produce
//! different entity tags.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::CollectionAdapter;
use crate::context::RequestContext;
use crate::error::{ProviderError, ProviderResult};
use crate::model::{
    format_millis, unix_millis_now, Categories, CollectionInfo, Content, ContentKind, Entry,
    MediaResource, Member, Person,
};
use crate::validation::sanitize_slug;

#[derive(Debug, Default)]
struct Store {
    members: Vec<Member>,
    media: Vec<MediaResource>,
    last_marker_ms: u64,
}

impl Store {
    /// Next modification marker, strictly greater than the previous one.
    fn next_marker(&mut self) -> String {
        let ms = unix_millis_now().max(self.last_marker_ms + 1);
        self.last_marker_ms = ms;
        format_millis(ms)
    }

    fn member_index(&self, key: &str) -> Option<usize> {
        self.members.iter().position(|m| m.key == key)
    }

    fn media_index(&self, key: &str) -> Option<usize> {
        self.media.iter().position(|m| m.key == key)
    }

    /// `base` if free, otherwise `base-2`, `base-3`, ...
    fn unique_key(&self, base: &str) -> String {
        if self.member_index(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|k| self.member_index(k).is_none())
            .unwrap_or_else(|| ulid::Ulid::new().to_string().to_lowercase())
    }
}

fn key_base(slug: Option<&str>, title: Option<&str>) -> String {
    let from = |s: Option<&str>| s.map(sanitize_slug).filter(|s| !s.is_empty());
    from(slug)
        .or_else(|| from(title))
        .unwrap_or_else(|| ulid::Ulid::new().to_string().to_lowercase())
}

fn poisoned() -> ProviderError {
    ProviderError::Internal("memory adapter lock poisoned".to_string())
}

/// Collection held entirely in memory.
#[derive(Debug)]
pub struct MemoryAdapter {
    name: String,
    title: String,
    accept: Vec<String>,
    media_base: Option<String>,
    categories: Option<Categories>,
    store: RwLock<Store>,
}

impl MemoryAdapter {
    /// Entry-only collection.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            accept: vec!["application/atom+xml;type=entry".to_string()],
            media_base: None,
            categories: None,
            store: RwLock::new(Store::default()),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_accept(mut self, accept: Vec<String>) -> Self {
        self.accept = accept;
        self
    }

    /// Enable media resources under `media_base` (e.g. `media/`).
    #[must_use]
    pub fn with_media(mut self, media_base: impl Into<String>) -> Self {
        self.media_base = Some(media_base.into());
        if !self.accept.iter().any(|a| a == "*/*") {
            self.accept.push("*/*".to_string());
        }
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Seed a member without going through a request.
    pub fn insert(&self, key: &str, entry: Entry) -> ProviderResult<()> {
        let mut store = self.write()?;
        let mut entry = entry;
        entry.edited = Some(store.next_marker());
        match store.member_index(key) {
            Some(i) => store.members[i].entry = entry,
            None => store.members.push(Member {
                key: key.to_string(),
                entry,
            }),
        }
        Ok(())
    }

    /// Number of stored members.
    pub fn len(&self) -> ProviderResult<usize> {
        Ok(self.read()?.members.len())
    }

    pub fn is_empty(&self) -> ProviderResult<bool> {
        Ok(self.read()?.members.is_empty())
    }

    fn read(&self) -> ProviderResult<RwLockReadGuard<'_, Store>> {
        self.store.read().map_err(|_| poisoned())
    }

    fn write(&self) -> ProviderResult<RwLockWriteGuard<'_, Store>> {
        self.store.write().map_err(|_| poisoned())
    }

    /// Store `bytes` and a media link entry built on top of `supplied`.
    fn store_media(
        &self,
        request: &RequestContext,
        supplied: Entry,
        content_type: &str,
        slug: Option<&str>,
        bytes: &[u8],
    ) -> ProviderResult<Member> {
        self.require_media()?;
        let mut store = self.write()?;
        let key = store.unique_key(&key_base(slug, supplied.title.as_deref()));
        let marker = store.next_marker();
        let authors = if supplied.authors.is_empty() {
            let author = request
                .principal()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "anonymous".to_string());
            vec![Person::named(author)]
        } else {
            supplied.authors
        };

        let entry = Entry {
            id: supplied
                .id
                .or_else(|| Some(format!("urn:ulid:{}", ulid::Ulid::new()))),
            title: supplied.title.or_else(|| Some(slug.unwrap_or(&key).to_string())),
            authors,
            updated: Some(marker.clone()),
            edited: Some(marker.clone()),
            published: supplied.published,
            summary: supplied.summary.or_else(|| Some(String::new())),
            content: Some(Content {
                kind: ContentKind::Media,
                media_type: Some(content_type.to_string()),
                value: None,
                src: None,
            }),
            categories: supplied.categories,
            ..Entry::default()
        };
        store.media.push(MediaResource {
            key: key.clone(),
            content_type: content_type.to_string(),
            data: bytes.to_vec(),
            updated: marker,
        });
        let member = Member { key, entry };
        store.members.push(member.clone());
        Ok(member)
    }

    fn require_media(&self) -> ProviderResult<()> {
        if self.media_base.is_some() {
            Ok(())
        } else {
            Err(ProviderError::unsupported("media"))
        }
    }
}

impl CollectionAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe_collection(&self, href: &str) -> CollectionInfo {
        CollectionInfo {
            title: self.title.clone(),
            href: href.to_string(),
            accept: self.accept.clone(),
            categories: self.categories.iter().cloned().collect(),
        }
    }

    fn media_base(&self) -> Option<&str> {
        self.media_base.as_deref()
    }

    fn begin(&self, request: &RequestContext) -> ProviderResult<()> {
        debug!(request_id = %request.id(), collection = %self.name, "Memory adapter begin");
        Ok(())
    }

    fn list_members(&self, _request: &RequestContext) -> ProviderResult<Vec<Member>> {
        Ok(self.read()?.members.iter().rev().cloned().collect())
    }

    fn get_member(&self, _request: &RequestContext, key: &str) -> ProviderResult<Option<Member>> {
        let store = self.read()?;
        Ok(store.member_index(key).map(|i| store.members[i].clone()))
    }

    fn create_member(
        &self,
        _request: &RequestContext,
        mut entry: Entry,
        slug: Option<&str>,
    ) -> ProviderResult<Member> {
        let mut store = self.write()?;
        let key = store.unique_key(&key_base(slug, entry.title.as_deref()));
        entry.edited = Some(store.next_marker());
        let member = Member { key, entry };
        store.members.push(member.clone());
        Ok(member)
    }

    fn update_member(&self, _request: &RequestContext, key: &str, mut entry: Entry) -> ProviderResult<Member> {
        let mut store = self.write()?;
        let idx = store
            .member_index(key)
            .ok_or_else(|| ProviderError::NotFound(format!("member {key}")))?;
        // a media link entry keeps pointing at its media
        if entry.content.is_none() {
            entry.content = store.members[idx].entry.content.clone();
        }
        entry.edited = Some(store.next_marker());
        store.members[idx].entry = entry;
        Ok(store.members[idx].clone())
    }

    fn delete_member(&self, _request: &RequestContext, key: &str) -> ProviderResult<()> {
        let mut store = self.write()?;
        let idx = store
            .member_index(key)
            .ok_or_else(|| ProviderError::NotFound(format!("member {key}")))?;
        store.members.remove(idx);
        if let Some(m) = store.media_index(key) {
            store.media.remove(m);
        }
        Ok(())
    }

    fn get_media(&self, _request: &RequestContext, key: &str) -> ProviderResult<Option<MediaResource>> {
        self.require_media()?;
        let store = self.read()?;
        Ok(store.media_index(key).map(|i| store.media[i].clone()))
    }

    fn create_media(
        &self,
        request: &RequestContext,
        content_type: &str,
        slug: Option<&str>,
        bytes: &[u8],
    ) -> ProviderResult<Member> {
        self.store_media(request, Entry::default(), content_type, slug, bytes)
    }

    fn create_media_with_entry(
        &self,
        request: &RequestContext,
        entry: Entry,
        content_type: &str,
        slug: Option<&str>,
        bytes: &[u8],
    ) -> ProviderResult<Member> {
        self.store_media(request, entry, content_type, slug, bytes)
    }

    fn update_media(
        &self,
        _request: &RequestContext,
        key: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ProviderResult<MediaResource> {
        self.require_media()?;
        let mut store = self.write()?;
        let idx = store
            .media_index(key)
            .ok_or_else(|| ProviderError::NotFound(format!("media {key}")))?;
        let marker = store.next_marker();
        if let Some(m) = store.member_index(key) {
            let entry = &mut store.members[m].entry;
            entry.edited = Some(marker.clone());
            if let Some(content) = entry.content.as_mut() {
                content.media_type = Some(content_type.to_string());
            }
        }
        let media = &mut store.media[idx];
        media.content_type = content_type.to_string();
        media.data = bytes.to_vec();
        media.updated = marker;
        Ok(media.clone())
    }

    fn delete_media(&self, request: &RequestContext, key: &str) -> ProviderResult<()> {
        self.require_media()?;
        {
            let mut store = self.write()?;
            let idx = store
                .media_index(key)
                .ok_or_else(|| ProviderError::NotFound(format!("media {key}")))?;
            store.media.remove(idx);
        }
        match self.delete_member(request, key) {
            Ok(()) | Err(ProviderError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn categories(&self, _request: &RequestContext) -> ProviderResult<Categories> {
        self.categories
            .clone()
            .ok_or_else(|| ProviderError::unsupported("categories"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> Entry {
        Entry {
            id: Some(format!("urn:test:{title}")),
            title: Some(title.to_string()),
            ..Entry::default()
        }
    }

    #[test]
    fn test_keys_come_from_slug_then_title() {
        let adapter = MemoryAdapter::new("posts");
        let req = RequestContext::get("/posts");
        let a = adapter.create_member(&req, entry("Hello World"), None).unwrap();
        let b = adapter.create_member(&req, entry("Hello World"), None).unwrap();
        let c = adapter.create_member(&req, entry("x"), Some("my slug")).unwrap();
        assert_eq!(a.key, "Hello_World");
        assert_eq!(b.key, "Hello_World-2");
        assert_eq!(c.key, "my_slug");
    }

    #[test]
    fn test_markers_strictly_increase() {
        let adapter = MemoryAdapter::new("posts");
        let req = RequestContext::get("/posts");
        let m = adapter.create_member(&req, entry("a"), None).unwrap();
        let first = m.entry.edited.clone().unwrap();
        let updated = adapter.update_member(&req, &m.key, entry("a")).unwrap();
        assert!(updated.entry.edited.unwrap() > first);
    }

    #[test]
    fn test_list_newest_first_and_delete() {
        let adapter = MemoryAdapter::new("posts");
        let req = RequestContext::get("/posts");
        adapter.create_member(&req, entry("one"), None).unwrap();
        adapter.create_member(&req, entry("two"), None).unwrap();
        let keys: Vec<_> = adapter.list_members(&req).unwrap().into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["two", "one"]);

        adapter.delete_member(&req, "one").unwrap();
        assert_eq!(adapter.len().unwrap(), 1);
        assert_eq!(adapter.delete_member(&req, "one").unwrap_err().status(), 404);
    }

    #[test]
    fn test_media_requires_media_base() {
        let adapter = MemoryAdapter::new("posts");
        let req = RequestContext::get("/posts");
        let err = adapter.create_media(&req, "image/png", None, b"png").unwrap_err();
        assert_eq!(err.status(), 405);
    }

    #[test]
    fn test_media_lifecycle() {
        let adapter = MemoryAdapter::new("pics").with_media("media/");
        let req = RequestContext::get("/pics");
        let member = adapter.create_media(&req, "image/png", Some("cat"), b"png").unwrap();
        assert_eq!(member.key, "cat");
        let media = adapter.get_media(&req, "cat").unwrap().unwrap();
        assert_eq!(media.data, b"png");

        let updated = adapter.update_media(&req, "cat", "image/gif", b"gif").unwrap();
        assert_eq!(updated.content_type, "image/gif");

        adapter.delete_media(&req, "cat").unwrap();
        assert!(adapter.get_media(&req, "cat").unwrap().is_none());
        assert!(adapter.get_member(&req, "cat").unwrap().is_none());
    }
}
