#![allow(dead_code)]

use atomrouter::adapter::{CollectionAdapter, MemoryAdapter};
use atomrouter::context::{Outcome, RequestContext};
use atomrouter::error::{ProviderError, ProviderResult};
use atomrouter::model::{Categories, CollectionInfo, Content, Entry, MediaResource, Member, Person};
use std::sync::Mutex;

/// Entry that passes the minimal validity rules.
pub fn valid_entry(id: &str, title: &str) -> Entry {
    Entry {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        authors: vec![Person::named("alice")],
        updated: Some("2024-01-01T00:00:00.000Z".to_string()),
        content: Some(Content::text(format!("{title} body"))),
        ..Entry::default()
    }
}

pub fn json_body(entry: &Entry) -> Vec<u8> {
    serde_json::to_vec(entry).unwrap()
}

/// Where a [`RecordingAdapter`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fail {
    #[default]
    Never,
    Begin,
    Operation,
    Panic,
    End,
    Compensate,
}

/// Memory adapter (with media under `media/`) that records every lifecycle
/// and operation call. `update_media`, `delete_media` and extension requests
/// are declined.
pub struct RecordingAdapter {
    inner: MemoryAdapter,
    fail: Fail,
    calls: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub fn new(name: &str, fail: Fail) -> Self {
        Self {
            inner: MemoryAdapter::new(name).with_media("media/"),
            fail,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &MemoryAdapter {
        &self.inner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of `end` plus `compensate` calls.
    pub fn closings(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| *c == "end" || *c == "compensate")
            .count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn op<T>(&self, call: &str, f: impl FnOnce() -> ProviderResult<T>) -> ProviderResult<T> {
        self.record(call);
        match self.fail {
            Fail::Operation => Err(ProviderError::adapter(format!("{call} failed"))),
            Fail::Panic => panic!("{call} exploded"),
            _ => f(),
        }
    }
}

impl CollectionAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn describe_collection(&self, href: &str) -> CollectionInfo {
        self.inner.describe_collection(href)
    }

    fn media_base(&self) -> Option<&str> {
        self.inner.media_base()
    }

    fn begin(&self, _request: &RequestContext) -> ProviderResult<()> {
        self.record("begin");
        if self.fail == Fail::Begin {
            return Err(ProviderError::adapter_status(503, "store offline"));
        }
        Ok(())
    }

    fn end(&self, _request: &RequestContext, _outcome: &Outcome) -> ProviderResult<()> {
        self.record("end");
        if self.fail == Fail::End {
            return Err(ProviderError::adapter("commit failed"));
        }
        Ok(())
    }

    fn compensate(&self, _request: &RequestContext, _error: &ProviderError) -> ProviderResult<()> {
        self.record("compensate");
        if self.fail == Fail::Compensate {
            return Err(ProviderError::adapter("rollback failed"));
        }
        Ok(())
    }

    fn list_members(&self, request: &RequestContext) -> ProviderResult<Vec<Member>> {
        self.op("list_members", || self.inner.list_members(request))
    }

    fn get_member(&self, request: &RequestContext, key: &str) -> ProviderResult<Option<Member>> {
        self.op("get_member", || self.inner.get_member(request, key))
    }

    fn create_member(&self, request: &RequestContext, entry: Entry, slug: Option<&str>) -> ProviderResult<Member> {
        self.op("create_member", || self.inner.create_member(request, entry, slug))
    }

    fn update_member(&self, request: &RequestContext, key: &str, entry: Entry) -> ProviderResult<Member> {
        self.op("update_member", || self.inner.update_member(request, key, entry))
    }

    fn delete_member(&self, request: &RequestContext, key: &str) -> ProviderResult<()> {
        self.op("delete_member", || self.inner.delete_member(request, key))
    }

    fn get_media(&self, request: &RequestContext, key: &str) -> ProviderResult<Option<MediaResource>> {
        self.op("get_media", || self.inner.get_media(request, key))
    }

    fn create_media(
        &self,
        request: &RequestContext,
        content_type: &str,
        slug: Option<&str>,
        bytes: &[u8],
    ) -> ProviderResult<Member> {
        self.op("create_media", || self.inner.create_media(request, content_type, slug, bytes))
    }

    fn categories(&self, request: &RequestContext) -> ProviderResult<Categories> {
        self.op("categories", || self.inner.categories(request))
    }
}
