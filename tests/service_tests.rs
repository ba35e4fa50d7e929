mod common;

use atomrouter::adapter::{CollectionAdapter, MemoryAdapter};
use atomrouter::config::RuntimeConfig;
use atomrouter::context::{Outcome, RequestContext, Scope};
use atomrouter::filter::{Filter, ParamMappingFilter};
use atomrouter::model::{Categories, Category, Entry};
use atomrouter::security::HeaderIdentityResolver;
use atomrouter::service::AtomService;
use atomrouter::target::{ResourceType, RouteTable};
use common::{json_body, valid_entry};
use http::Method;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn blog() -> (AtomService, Arc<MemoryAdapter>) {
    let posts = Arc::new(
        MemoryAdapter::new("posts")
            .with_title("Posts")
            .with_media("media/")
            .with_categories(Categories {
                fixed: true,
                categories: vec![Category::term("rust"), Category::term("atom")],
                ..Categories::default()
            }),
    );
    let shared: Arc<dyn CollectionAdapter> = posts.clone();
    let table = RouteTable::builder()
        .route("service", "/", ResourceType::Service)
        .unwrap()
        .collection("/posts", shared)
        .unwrap()
        .build();
    (AtomService::new(table), posts)
}

fn entry_of(outcome: &Outcome) -> Entry {
    serde_json::from_slice(&outcome.render().unwrap()).unwrap()
}

fn post(service: &AtomService, entry: &Entry, slug: &str) -> Outcome {
    service.handle(
        RequestContext::new(Method::POST, "/posts")
            .with_body("application/json", json_body(entry))
            .with_header("Slug", slug),
    )
}

#[test]
fn test_member_crud_round_trip() {
    let (service, posts) = blog();

    let created = post(&service, &valid_entry("urn:p:1", "First"), "first");
    assert_eq!(created.status, 201);
    assert_eq!(created.location.as_deref(), Some("http://localhost/posts/first"));
    let body = entry_of(&created);
    assert_eq!(body.link("edit").map(|l| l.href.as_str()), Some("http://localhost/posts/first"));

    let fetched = service.handle(RequestContext::get("/posts/first"));
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.content_location.as_deref(), Some("http://localhost/posts/first"));
    assert_eq!(fetched.entity_tag, created.entity_tag);

    let updated = service.handle(
        RequestContext::new(Method::PUT, "/posts/first")
            .with_body("application/json", json_body(&valid_entry("urn:p:1", "Renamed"))),
    );
    assert_eq!(updated.status, 204);
    assert!(!updated.has_body());
    let refetched = service.handle(RequestContext::get("/posts/first"));
    assert_eq!(entry_of(&refetched).title.as_deref(), Some("Renamed"));
    assert_eq!(refetched.entity_tag, updated.entity_tag);

    let deleted = service.handle(RequestContext::new(Method::DELETE, "/posts/first"));
    assert_eq!(deleted.status, 204);
    assert_eq!(service.handle(RequestContext::get("/posts/first")).status, 404);
    assert!(posts.is_empty().unwrap());
}

#[test]
fn test_feed_lists_newest_first_and_tag_tracks_changes() {
    let (service, _) = blog();
    post(&service, &valid_entry("urn:p:1", "One"), "one");
    post(&service, &valid_entry("urn:p:2", "Two"), "two");

    let feed = service.handle(RequestContext::get("/posts"));
    assert_eq!(feed.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&feed.render().unwrap()).unwrap();
    assert_eq!(body["kind"], "feed");
    assert_eq!(body["title"], "Posts");
    assert_eq!(body["entries"][0]["title"], "Two");
    assert_eq!(body["entries"][1]["title"], "One");

    // removing the oldest member leaves the newest marker unchanged
    service.handle(RequestContext::new(Method::DELETE, "/posts/one"));
    let after = service.handle(RequestContext::get("/posts"));
    assert_eq!(after.last_modified, feed.last_modified);
    assert_ne!(after.entity_tag, feed.entity_tag);
}

#[test]
fn test_media_lifecycle() {
    let (service, _) = blog();

    let created = service.handle(
        RequestContext::new(Method::POST, "/posts")
            .with_body("image/png", vec![1u8, 2, 3])
            .with_header("Slug", "pic"),
    );
    assert_eq!(created.status, 201);
    assert_eq!(created.location.as_deref(), Some("http://localhost/posts/pic"));
    let link_entry = entry_of(&created);
    assert_eq!(
        link_entry.link("edit-media").map(|l| l.href.as_str()),
        Some("http://localhost/posts/media/pic")
    );
    assert_eq!(
        link_entry.content.as_ref().and_then(|c| c.src.as_deref()),
        Some("http://localhost/posts/media/pic")
    );

    let media = service.handle(RequestContext::get("/posts/media/pic"));
    assert_eq!(media.status, 200);
    assert_eq!(media.content_type.as_deref(), Some("image/png"));
    assert_eq!(media.render().unwrap(), vec![1u8, 2, 3]);

    let replaced = service.handle(
        RequestContext::new(Method::PUT, "/posts/media/pic").with_body("image/gif", vec![9u8]),
    );
    assert_eq!(replaced.status, 204);
    assert_ne!(replaced.entity_tag, media.entity_tag);
    let media = service.handle(RequestContext::get("/posts/media/pic"));
    assert_eq!(media.content_type.as_deref(), Some("image/gif"));
    assert_eq!(media.entity_tag, replaced.entity_tag);

    let deleted = service.handle(RequestContext::new(Method::DELETE, "/posts/media/pic"));
    assert_eq!(deleted.status, 204);
    assert_eq!(service.handle(RequestContext::get("/posts/media/pic")).status, 404);
    assert_eq!(service.handle(RequestContext::get("/posts/pic")).status, 404);
}

#[test]
fn test_categories_document() {
    let (service, _) = blog();
    let outcome = service.handle(RequestContext::get("/posts;categories"));
    assert_eq!(outcome.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&outcome.render().unwrap()).unwrap();
    assert_eq!(body["kind"], "categories");
    assert_eq!(body["fixed"], true);
    assert_eq!(body["categories"][1]["term"], "atom");
}

#[test]
fn test_service_document_describes_collections() {
    let (service, _) = blog();
    let outcome = service.handle(RequestContext::get("/"));
    let body: serde_json::Value = serde_json::from_slice(&outcome.render().unwrap()).unwrap();
    let collection = &body["workspaces"][0]["collections"][0];
    assert_eq!(collection["title"], "Posts");
    assert_eq!(collection["href"], "http://localhost/posts");
    assert!(collection["accept"].as_array().unwrap().iter().any(|a| a == "*/*"));
}

#[test]
fn test_conditional_get_returns_304() {
    let (service, _) = blog();
    post(&service, &valid_entry("urn:p:1", "One"), "one");
    let fresh = service.handle(RequestContext::get("/posts/one"));
    let tag = fresh.entity_tag.clone().unwrap();

    let cached = service.handle(RequestContext::get("/posts/one").with_header("If-None-Match", tag.to_string()));
    assert_eq!(cached.status, 304);
    assert!(!cached.has_body());
    assert_eq!(cached.entity_tag, Some(tag.clone()));

    let stale = service.handle(RequestContext::get("/posts/one").with_header("If-None-Match", "\"other\""));
    assert_eq!(stale.status, 200);

    // writes never short-circuit
    let write = service.handle(
        RequestContext::new(Method::PUT, "/posts/one")
            .with_header("If-None-Match", tag.to_string())
            .with_body("application/json", json_body(&valid_entry("urn:p:1", "One again"))),
    );
    assert_eq!(write.status, 204);
}

#[test]
fn test_if_modified_since_with_http_date_returns_304() {
    let (service, _) = blog();
    post(&service, &valid_entry("urn:p:1", "One"), "one");
    let fresh = service.handle(RequestContext::get("/posts"));
    let stamp = fresh.header("last-modified").unwrap();
    assert!(stamp.ends_with(" GMT"), "{stamp}");

    let cached = service.handle(RequestContext::get("/posts").with_header("If-Modified-Since", stamp.as_str()));
    assert_eq!(cached.status, 304);
    assert!(!cached.has_body());
    assert_eq!(cached.header("last-modified"), Some(stamp));

    let old = service.handle(
        RequestContext::get("/posts").with_header("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT"),
    );
    assert_eq!(old.status, 200);
}

#[test]
fn test_head_mirrors_get_headers() {
    let (service, _) = blog();
    post(&service, &valid_entry("urn:p:1", "One"), "one");
    let get = service.handle(RequestContext::get("/posts"));
    let head = service.handle(RequestContext::new(Method::HEAD, "/posts"));
    assert_eq!(head.status, 200);
    assert!(!head.has_body());
    assert_eq!(head.entity_tag, get.entity_tag);
    assert_eq!(head.content_type, get.content_type);
}

#[test]
fn test_oversized_body_is_rejected() {
    let (service, posts) = blog();
    let service = service.with_runtime_config(RuntimeConfig {
        max_body_bytes: 16,
        ..RuntimeConfig::default()
    });
    let outcome = post(&service, &valid_entry("urn:p:1", "One"), "one");
    assert_eq!(outcome.status, 400);
    assert!(posts.is_empty().unwrap());
}

#[test]
fn test_runtime_base_overrides_request_base() {
    let (service, _) = blog();
    let service = service.with_runtime_config(RuntimeConfig {
        base_uri: Some(url::Url::parse("https://atom.example/").unwrap()),
        ..RuntimeConfig::default()
    });
    let created = post(&service, &valid_entry("urn:p:1", "One"), "one");
    assert_eq!(created.location.as_deref(), Some("https://atom.example/posts/one"));
}

#[test]
fn test_identity_resolver_sets_principal() {
    let (service, _) = blog();
    let service = service.with_identity_resolver(Arc::new(HeaderIdentityResolver::default()));
    let created = service.handle(
        RequestContext::new(Method::POST, "/posts")
            .with_body("text/plain", "hello")
            .with_header("Slug", "note")
            .with_header("X-Remote-User", "bob"),
    );
    assert_eq!(created.status, 201);
    let entry = entry_of(&created);
    assert_eq!(entry.authors[0].name, "bob");
}

#[test]
fn test_reload_swaps_table_without_touching_snapshots() {
    let (service, _) = blog();
    let before = service.table();
    assert_eq!(service.handle(RequestContext::get("/drafts")).status, 404);

    let drafts: Arc<dyn CollectionAdapter> = Arc::new(MemoryAdapter::new("drafts"));
    let table = RouteTable::builder().collection("/drafts", drafts).unwrap().build();
    service.reload(table);

    assert_eq!(service.handle(RequestContext::get("/drafts")).status, 200);
    assert_eq!(service.handle(RequestContext::get("/posts")).status, 404);
    assert!(before.route("posts").is_some());
    assert!(service.table().route("posts").is_none());
}

#[test]
fn test_url_for_outside_a_request() {
    let (service, _) = blog();
    let params: BTreeMap<String, String> = [("entry".to_string(), "a b".to_string())].into();
    assert_eq!(service.url_for("posts.entry", &params).as_deref(), Some("/posts/a%20b"));
    assert_eq!(service.url_for("posts.media", &params).as_deref(), Some("/posts/media/a%20b"));
    assert_eq!(service.url_for("missing", &params), None);
}

#[test]
fn test_concurrent_requests_share_the_service() {
    let (service, posts) = blog();
    let service = Arc::new(service);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                let entry = valid_entry(&format!("urn:p:{i}"), &format!("Post {i}"));
                post(&service, &entry, &format!("post-{i}")).status
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 201);
    }
    assert_eq!(posts.len().unwrap(), 8);
}

/// Rejects writes without a token and stamps every outcome it lets through.
struct WriteGate;

impl Filter for WriteGate {
    fn before(&self, request: &mut RequestContext) -> Option<Outcome> {
        let write = !matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
        (write && request.header("authorization").is_none()).then(|| Outcome::new(401))
    }

    fn after(&self, request: &RequestContext, outcome: &mut Outcome, _latency: Duration) {
        let mapped = request.attribute(Scope::Request, "member").unwrap_or("-").to_string();
        outcome.headers.push(("X-Member".into(), mapped));
    }
}

#[test]
fn test_filters_wrap_dispatch() {
    let (service, posts) = blog();
    let service = service
        .with_filter(Arc::new(WriteGate))
        .with_filter(Arc::new(ParamMappingFilter::new().map("entry", "member")));

    let denied = post(&service, &valid_entry("urn:p:1", "One"), "one");
    assert_eq!(denied.status, 401);
    assert!(posts.is_empty().unwrap());
    // the mapping filter never ran, so nothing was mapped
    assert_eq!(denied.header("x-member").as_deref(), Some("-"));

    let created = service.handle(
        RequestContext::new(Method::POST, "/posts")
            .with_body("application/json", json_body(&valid_entry("urn:p:1", "One")))
            .with_header("Slug", "one")
            .with_header("Authorization", "token"),
    );
    assert_eq!(created.status, 201);

    let fetched = service.handle(RequestContext::get("/posts/one"));
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.header("x-member").as_deref(), Some("one"));
}

fn related_body(entry: &Entry, media: &[u8]) -> Vec<u8> {
    let mut body = b"--part\r\nContent-Type: application/json\r\n\r\n".to_vec();
    body.extend(json_body(entry));
    body.extend(b"\r\n--part\r\nContent-Type: image/png\r\n\r\n");
    body.extend(media);
    body.extend(b"\r\n--part--\r\n");
    body
}

const RELATED: &str = r#"multipart/related; boundary=part; type="application/json""#;

#[test]
fn test_multipart_related_creates_media_with_entry() {
    let (service, _) = blog();
    let created = service.handle(
        RequestContext::new(Method::POST, "/posts")
            .with_body(RELATED, related_body(&valid_entry("urn:m:1", "Holiday"), &[7u8, 8, 9])),
    );
    assert_eq!(created.status, 201);
    assert_eq!(created.location.as_deref(), Some("http://localhost/posts/Holiday"));
    let entry = entry_of(&created);
    assert_eq!(entry.id.as_deref(), Some("urn:m:1"));
    assert_eq!(entry.title.as_deref(), Some("Holiday"));
    assert_eq!(
        entry.link("edit-media").map(|l| l.href.as_str()),
        Some("http://localhost/posts/media/Holiday")
    );

    let media = service.handle(RequestContext::get("/posts/media/Holiday"));
    assert_eq!(media.status, 200);
    assert_eq!(media.content_type.as_deref(), Some("image/png"));
    assert_eq!(media.render().unwrap(), vec![7u8, 8, 9]);
}

#[test]
fn test_multipart_related_rejects_bad_parts() {
    let (service, posts) = blog();
    let wrong_root = service.handle(
        RequestContext::new(Method::POST, "/posts").with_body(
            "multipart/related; boundary=part; type=\"application/xml\"",
            related_body(&valid_entry("urn:m:1", "Holiday"), b"x"),
        ),
    );
    assert_eq!(wrong_root.status, 415);

    let truncated = service.handle(
        RequestContext::new(Method::POST, "/posts").with_body(RELATED, b"--part\r\nContent-Type: application/json\r\n\r\n{}".to_vec()),
    );
    assert_eq!(truncated.status, 400);
    assert!(posts.is_empty().unwrap());
}
