//! Operation handlers.
//!
//! Each handler turns one selected [`Operation`] into adapter calls and an
//! [`Outcome`]. Entity tags, `Location` headers and edit links are computed
//! here because adapters know nothing about URIs.

use std::sync::Arc;
use tracing::warn;

use super::Operation;
use crate::adapter::CollectionAdapter;
use crate::context::{Outcome, RequestContext};
use crate::error::{ProviderError, ProviderResult};
use crate::model::{
    is_multipart_related, BodyParser, ContentKind, Document, Entry, Feed, Member, MultipartRelated, Renderer,
    ServiceDocument, WorkspaceInfo,
};
use crate::target::{RouteTable, TargetBuilder, COLLECTION_PARAM, MEMBER_PARAM};
use crate::template::EmptySource;
use crate::validation::{check_update_conflict, is_valid_entry, sanitize_slug, EntityTag};

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Per-request view over everything a handler needs.
pub(crate) struct Provider<'a> {
    pub table: &'a RouteTable,
    pub request: &'a RequestContext,
    pub parser: &'a dyn BodyParser,
    pub renderer: &'a Arc<dyn Renderer>,
}

impl Provider<'_> {
    fn builder(&self) -> TargetBuilder<'_> {
        TargetBuilder::for_request(self.table, self.request)
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.request.target().and_then(|t| t.param(name))
    }

    fn member_key(&self) -> ProviderResult<&str> {
        self.param(MEMBER_PARAM)
            .ok_or_else(|| ProviderError::BadRequest(format!("missing {MEMBER_PARAM} parameter")))
    }

    fn document(&self, outcome: Outcome, document: Document) -> Outcome {
        outcome.with_document(document, Arc::clone(self.renderer))
    }

    /// Absolute URI of collection `name`.
    fn collection_href(&self, name: &str) -> String {
        self.builder()
            .absolute_url_for(name, &EmptySource)
            .unwrap_or_else(|| {
                let identity = self.request.target().map(|t| t.identity()).unwrap_or_default();
                identity.split(['?', '#']).next().unwrap_or_default().to_string()
            })
    }

    fn entry_href(&self, adapter: &dyn CollectionAdapter, key: &str) -> String {
        let name = adapter.name();
        self.builder()
            .absolute_url_for(&format!("{name}.entry"), &[(MEMBER_PARAM, key)])
            .unwrap_or_else(|| {
                format!(
                    "{}/{}",
                    self.collection_href(name).trim_end_matches('/'),
                    urlencoding::encode(key)
                )
            })
    }

    fn media_href(&self, adapter: &dyn CollectionAdapter, key: &str) -> Option<String> {
        let name = adapter.name();
        let media_base = adapter.media_base()?;
        Some(
            self.builder()
                .absolute_url_for(&format!("{name}.media"), &[(MEMBER_PARAM, key)])
                .unwrap_or_else(|| {
                    format!(
                        "{}/{media_base}{}",
                        self.collection_href(name).trim_end_matches('/'),
                        urlencoding::encode(key)
                    )
                }),
        )
    }

    /// Stored entry with its edit (and edit-media) links filled in.
    fn decorate(&self, adapter: &dyn CollectionAdapter, member: Member) -> Entry {
        let Member { key, mut entry } = member;
        entry.set_link("edit", self.entry_href(adapter, &key));
        let is_media = entry
            .content
            .as_ref()
            .is_some_and(|c| c.kind == ContentKind::Media);
        if is_media {
            if let Some(href) = self.media_href(adapter, &key) {
                if let Some(content) = entry.content.as_mut().filter(|c| c.src.is_none()) {
                    content.src = Some(href.clone());
                }
                entry.set_link("edit-media", href);
            }
        }
        entry
    }

    fn require_entry_body(&self) -> ProviderResult<Entry> {
        let content_type = self.request.content_type().unwrap_or_default();
        if !self.parser.accepts(content_type) {
            return Err(ProviderError::UnsupportedMediaType(content_type.to_string()));
        }
        self.request.entry(self.parser).cloned()
    }

    fn slug(&self) -> Option<String> {
        self.request
            .slug()
            .map(sanitize_slug)
            .filter(|s| !s.is_empty())
    }

    fn body_media_type(&self) -> String {
        self.request
            .content_type()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_MEDIA_TYPE)
            .to_string()
    }

    /// Service document listing every workspace and its collections.
    pub fn get_service(&self) -> ProviderResult<Outcome> {
        let workspaces = self
            .table
            .workspaces()
            .iter()
            .map(|ws| WorkspaceInfo {
                title: ws.title.clone(),
                collections: ws
                    .collections
                    .iter()
                    .filter_map(|name| {
                        let adapter = self.table.adapter(name);
                        if adapter.is_none() {
                            warn!(collection = %name, workspace = %ws.title, "Workspace lists an unknown collection");
                        }
                        adapter.map(|a| a.describe_collection(&self.collection_href(name)))
                    })
                    .collect(),
            })
            .collect();
        let doc = Document::Service(ServiceDocument { workspaces });
        Ok(self.document(Outcome::ok(), doc))
    }

    /// Run the adapter-backed `operation`.
    pub fn execute(&self, adapter: &dyn CollectionAdapter, operation: Operation) -> ProviderResult<Outcome> {
        match operation {
            Operation::GetService => self.get_service(),
            Operation::GetCollection => self.get_collection(adapter),
            Operation::GetMember => self.get_member(adapter),
            Operation::CreateMember => self.create_member(adapter),
            Operation::UpdateMember => self.update_member(adapter),
            Operation::DeleteMember => {
                adapter.delete_member(self.request, self.member_key()?)?;
                Ok(Outcome::no_content())
            }
            Operation::GetMedia => self.get_media(adapter),
            Operation::CreateMedia => self.create_media(adapter),
            Operation::UpdateMedia => self.update_media(adapter),
            Operation::DeleteMedia => {
                adapter.delete_media(self.request, self.member_key()?)?;
                Ok(Outcome::no_content())
            }
            Operation::GetCategories => {
                let categories = adapter.categories(self.request)?;
                Ok(self.document(Outcome::ok(), Document::Categories(categories)))
            }
            Operation::Extension => adapter.extension_request(self.request),
        }
    }

    fn get_collection(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let name = self.param(COLLECTION_PARAM).unwrap_or(adapter.name()).to_string();
        let href = self.collection_href(&name);
        let members = adapter.list_members(self.request)?;
        let count = members.len().to_string();
        let entries: Vec<Entry> = members
            .into_iter()
            .map(|m| self.decorate(adapter, m))
            .collect();
        let updated = entries
            .iter()
            .filter_map(Entry::modification_marker)
            .max()
            .map(str::to_string);

        let tag = EntityTag::generate(&[href.as_str(), updated.as_deref().unwrap_or_default(), count.as_str()]);
        let feed = Feed {
            id: href.clone(),
            title: adapter.describe_collection(&href).title,
            href,
            updated: updated.clone(),
            entries,
        };
        let mut outcome = Outcome::ok().with_entity_tag(tag);
        if let Some(updated) = updated {
            outcome = outcome.with_last_modified(&updated);
        }
        Ok(self.document(outcome, Document::Feed(feed)))
    }

    fn get_member(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let key = self.member_key()?;
        let member = adapter
            .get_member(self.request, key)?
            .ok_or_else(|| ProviderError::NotFound(format!("entry {key}")))?;
        let location = self.entry_href(adapter, key);
        let entry = self.decorate(adapter, member);

        let mut outcome = Outcome::ok()
            .with_entity_tag(EntityTag::for_entry(&entry))
            .with_content_location(location);
        if let Some(marker) = entry.modification_marker() {
            outcome = outcome.with_last_modified(marker);
        }
        Ok(self.document(outcome, Document::Entry(entry)))
    }

    fn create_member(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let entry = self.require_entry_body()?;
        is_valid_entry(&entry)?;
        let slug = self.slug();
        let member = adapter.create_member(self.request, entry, slug.as_deref())?;
        let location = self.entry_href(adapter, &member.key);
        let entry = self.decorate(adapter, member);
        let outcome = Outcome::created(location).with_entity_tag(EntityTag::for_entry(&entry));
        Ok(self.document(outcome, Document::Entry(entry)))
    }

    fn update_member(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let submitted = self.require_entry_body()?;
        let key = self.member_key()?;
        let stored = adapter
            .get_member(self.request, key)?
            .ok_or_else(|| ProviderError::NotFound(format!("entry {key}")))?;
        // identity mismatch wins over any validity problem
        check_update_conflict(&submitted, &stored.entry)?;
        is_valid_entry(&submitted)?;
        let updated = adapter.update_member(self.request, key, submitted)?;
        let entry = self.decorate(adapter, updated);
        Ok(Outcome::no_content().with_entity_tag(EntityTag::for_entry(&entry)))
    }

    fn get_media(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let key = self.member_key()?;
        let media = adapter
            .get_media(self.request, key)?
            .ok_or_else(|| ProviderError::NotFound(format!("media {key}")))?;
        let tag = EntityTag::generate(&[adapter.name(), media.key.as_str(), media.updated.as_str()]);
        Ok(Outcome::ok()
            .with_entity_tag(tag)
            .with_last_modified(&media.updated)
            .with_bytes(&media.content_type, media.data))
    }

    fn create_media(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let content_type = self.body_media_type();
        let slug = self.slug();
        let member = if is_multipart_related(&content_type) {
            self.create_related(adapter, &content_type, slug.as_deref())?
        } else {
            adapter.create_media(self.request, &content_type, slug.as_deref(), self.request.body())?
        };
        let location = self.entry_href(adapter, &member.key);
        let entry = self.decorate(adapter, member);
        let outcome = Outcome::created(location).with_entity_tag(EntityTag::for_entry(&entry));
        Ok(self.document(outcome, Document::Entry(entry)))
    }

    /// Media link entry and media in one `multipart/related` body.
    fn create_related(
        &self,
        adapter: &dyn CollectionAdapter,
        content_type: &str,
        slug: Option<&str>,
    ) -> ProviderResult<Member> {
        let related = MultipartRelated::parse(content_type, self.request.body())?;
        for declared in [related.root_type.as_str(), related.entry.content_type().unwrap_or_default()] {
            if !self.parser.accepts(declared) {
                return Err(ProviderError::UnsupportedMediaType(declared.to_string()));
            }
        }
        let entry = self.parser.parse_entry(&related.entry.body)?;
        let media_type = related.media.content_type().unwrap_or(DEFAULT_MEDIA_TYPE);
        adapter.create_media_with_entry(self.request, entry, media_type, slug, &related.media.body)
    }

    fn update_media(&self, adapter: &dyn CollectionAdapter) -> ProviderResult<Outcome> {
        let key = self.member_key()?;
        let content_type = self.body_media_type();
        let media = adapter.update_media(self.request, key, &content_type, self.request.body())?;
        let tag = EntityTag::generate(&[adapter.name(), media.key.as_str(), media.updated.as_str()]);
        Ok(Outcome::no_content().with_entity_tag(tag))
    }
}
