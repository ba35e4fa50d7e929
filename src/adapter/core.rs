use crate::context::{Outcome, RequestContext};
use crate::error::{ProviderError, ProviderResult};
use crate::model::{Categories, CollectionInfo, Entry, MediaResource, Member};

/// Storage backend for one collection.
///
/// A single capability set: member CRUD is required, every media, category
/// and extension operation is optional and defaults to
/// [`ProviderError::Unsupported`], which the dispatcher answers with `405`.
///
/// The lifecycle hooks bracket each dispatched operation. For every
/// successful `begin` exactly one of `end` or `compensate` follows. Failures
/// in `end` and `compensate` are logged and never replace the outcome.
///
/// Implementations are shared across concurrently handled requests, so they
/// are `Send + Sync` and own whatever locking their storage needs.
pub trait CollectionAdapter: Send + Sync {
    /// Collection name, unique within a route table.
    fn name(&self) -> &str;

    /// Metadata for the service document; `href` is the collection URI.
    fn describe_collection(&self, href: &str) -> CollectionInfo;

    /// Path prefix (relative to the collection root) under which media
    /// resources live, e.g. `media/`.
    fn media_base(&self) -> Option<&str> {
        None
    }

    fn begin(&self, _request: &RequestContext) -> ProviderResult<()> {
        Ok(())
    }

    fn end(&self, _request: &RequestContext, _outcome: &Outcome) -> ProviderResult<()> {
        Ok(())
    }

    fn compensate(&self, _request: &RequestContext, _error: &ProviderError) -> ProviderResult<()> {
        Ok(())
    }

    /// Members, newest first.
    fn list_members(&self, request: &RequestContext) -> ProviderResult<Vec<Member>>;

    /// `Ok(None)` when no member has `key`.
    fn get_member(&self, request: &RequestContext, key: &str) -> ProviderResult<Option<Member>>;

    /// Store a new member. `slug` is the sanitised `Slug` header, if any.
    fn create_member(
        &self,
        request: &RequestContext,
        entry: Entry,
        slug: Option<&str>,
    ) -> ProviderResult<Member>;

    fn update_member(&self, request: &RequestContext, key: &str, entry: Entry) -> ProviderResult<Member>;

    fn delete_member(&self, request: &RequestContext, key: &str) -> ProviderResult<()>;

    fn get_media(&self, _request: &RequestContext, _key: &str) -> ProviderResult<Option<MediaResource>> {
        Err(ProviderError::unsupported("get_media"))
    }

    /// Store a media resource and return its media link entry.
    fn create_media(
        &self,
        _request: &RequestContext,
        _content_type: &str,
        _slug: Option<&str>,
        _bytes: &[u8],
    ) -> ProviderResult<Member> {
        Err(ProviderError::unsupported("create_media"))
    }

    /// Store a media resource together with the media link entry the client
    /// sent alongside it in a `multipart/related` request.
    fn create_media_with_entry(
        &self,
        _request: &RequestContext,
        _entry: Entry,
        _content_type: &str,
        _slug: Option<&str>,
        _bytes: &[u8],
    ) -> ProviderResult<Member> {
        Err(ProviderError::unsupported("create_media_with_entry"))
    }

    fn update_media(
        &self,
        _request: &RequestContext,
        _key: &str,
        _content_type: &str,
        _bytes: &[u8],
    ) -> ProviderResult<MediaResource> {
        Err(ProviderError::unsupported("update_media"))
    }

    fn delete_media(&self, _request: &RequestContext, _key: &str) -> ProviderResult<()> {
        Err(ProviderError::unsupported("delete_media"))
    }

    fn categories(&self, _request: &RequestContext) -> ProviderResult<Categories> {
        Err(ProviderError::unsupported("categories"))
    }

    /// Requests outside the CRUD set, e.g. `POST` to a member.
    fn extension_request(&self, _request: &RequestContext) -> ProviderResult<Outcome> {
        Err(ProviderError::unsupported("extension_request"))
    }
}
