mod common;

use atomrouter::adapter::{CollectionAdapter, MemoryAdapter};
use atomrouter::context::{Outcome, RequestContext};
use atomrouter::dispatcher::Dispatcher;
use atomrouter::target::{ResourceType, RouteTable, TargetResolver};
use common::{json_body, valid_entry, Fail, RecordingAdapter};
use http::Method;
use std::sync::Arc;

fn table_with(adapter: Arc<RecordingAdapter>) -> RouteTable {
    let shared: Arc<dyn CollectionAdapter> = adapter;
    RouteTable::builder()
        .route("service", "/", ResourceType::Service)
        .unwrap()
        .collection("/posts", shared)
        .unwrap()
        .build()
}

fn send(table: &RouteTable, mut request: RequestContext) -> Outcome {
    TargetResolver::new(table).resolve(&mut request);
    Dispatcher::default().dispatch(table, &request)
}

fn recording(fail: Fail) -> (RouteTable, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::new("posts", fail));
    (table_with(Arc::clone(&adapter)), adapter)
}

#[test]
fn test_success_closes_with_end() {
    let (table, posts) = recording(Fail::Never);
    let outcome = send(&table, RequestContext::get("/posts"));
    assert_eq!(outcome.status, 200);
    assert_eq!(posts.calls(), vec!["begin", "list_members", "end"]);
}

#[test]
fn test_operation_failure_closes_with_compensate() {
    let (table, posts) = recording(Fail::Operation);
    let outcome = send(&table, RequestContext::get("/posts"));
    assert_eq!(outcome.status, 500);
    assert_eq!(posts.calls(), vec!["begin", "list_members", "compensate"]);
}

#[test]
fn test_operation_panic_is_contained() {
    let (table, posts) = recording(Fail::Panic);
    let outcome = send(&table, RequestContext::get("/posts"));
    assert_eq!(outcome.status, 500);
    assert_eq!(posts.closings(), 1);
    assert_eq!(posts.calls().last().map(String::as_str), Some("compensate"));

    // the dispatcher is still usable afterwards
    let outcome = send(&table, RequestContext::get("/"));
    assert_eq!(outcome.status, 200);
}

#[test]
fn test_begin_failure_skips_operation_and_closing() {
    let (table, posts) = recording(Fail::Begin);
    let outcome = send(&table, RequestContext::get("/posts"));
    assert_eq!(outcome.status, 503);
    assert_eq!(posts.calls(), vec!["begin"]);
    assert_eq!(posts.closings(), 0);
}

#[test]
fn test_end_failure_keeps_outcome() {
    let (table, posts) = recording(Fail::End);
    let outcome = send(&table, RequestContext::get("/posts"));
    assert_eq!(outcome.status, 200);
    assert_eq!(posts.closings(), 1);
}

#[test]
fn test_compensate_failure_keeps_original_error() {
    let (table, posts) = recording(Fail::Compensate);
    let outcome = send(&table, RequestContext::get("/posts/missing"));
    assert_eq!(outcome.status, 404);
    assert_eq!(posts.calls(), vec!["begin", "get_member", "compensate"]);
}

#[test]
fn test_every_adapter_request_closes_exactly_once() {
    let (table, posts) = recording(Fail::Never);
    posts.inner().insert("a", valid_entry("urn:a", "A")).unwrap();
    let requests = [
        RequestContext::get("/posts"),
        RequestContext::get("/posts/a"),
        RequestContext::get("/posts/none"),
        RequestContext::new(Method::HEAD, "/posts/a"),
        RequestContext::new(Method::PUT, "/posts/a").with_body("application/json", "not json"),
        RequestContext::new(Method::DELETE, "/posts/media/a"),
        RequestContext::new(Method::POST, "/posts").with_body("application/json", json_body(&valid_entry("urn:b", "B"))),
    ];
    for request in requests {
        posts.clear();
        let outcome = send(&table, request);
        assert_eq!(posts.closings(), 1, "status {} calls {:?}", outcome.status, posts.calls());
    }
}

#[test]
fn test_requests_without_adapter_work_skip_lifecycle() {
    let (table, posts) = recording(Fail::Never);
    assert_eq!(send(&table, RequestContext::get("/")).status, 200);
    assert_eq!(send(&table, RequestContext::new(Method::OPTIONS, "/posts")).status, 200);
    assert_eq!(send(&table, RequestContext::new(Method::PATCH, "/posts/a")).status, 405);
    assert!(posts.calls().is_empty());
}

#[test]
fn test_conflicting_update_never_reaches_adapter_update() {
    let (table, posts) = recording(Fail::Never);
    posts.inner().insert("a", valid_entry("urn:stored", "A")).unwrap();

    let mut submitted = valid_entry("urn:other", "A");
    // invalid as well; the conflict is reported first
    submitted.title = None;
    let outcome = send(
        &table,
        RequestContext::new(Method::PUT, "/posts/a").with_body("application/json", json_body(&submitted)),
    );
    assert_eq!(outcome.status, 409);
    assert!(!posts.calls().iter().any(|c| c == "update_member"));
    assert_eq!(posts.calls().last().map(String::as_str), Some("compensate"));
}

#[test]
fn test_matching_update_is_applied() {
    let (table, posts) = recording(Fail::Never);
    posts.inner().insert("a", valid_entry("urn:stored", "A")).unwrap();
    let before = send(&table, RequestContext::get("/posts/a"));

    let outcome = send(
        &table,
        RequestContext::new(Method::PUT, "/posts/a")
            .with_body("application/json", json_body(&valid_entry("urn:stored", "Renamed"))),
    );
    assert_eq!(outcome.status, 204);
    assert!(outcome.entity_tag.is_some());
    assert_ne!(outcome.entity_tag, before.entity_tag);
    assert!(posts.calls().iter().any(|c| c == "update_member"));
}

#[test]
fn test_declined_media_operation_gets_safe_allow() {
    let (table, posts) = recording(Fail::Never);
    let created = send(
        &table,
        RequestContext::new(Method::POST, "/posts")
            .with_body("image/png", vec![1u8, 2, 3])
            .with_header("Slug", "pic"),
    );
    assert_eq!(created.status, 201);

    // RecordingAdapter does not implement media deletion
    let outcome = send(&table, RequestContext::new(Method::DELETE, "/posts/media/pic"));
    assert_eq!(outcome.status, 405);
    assert_eq!(outcome.allow.as_deref(), Some("GET, HEAD, OPTIONS"));
    assert!(posts.calls().contains(&"compensate".to_string()));
}

#[test]
fn test_declined_multipart_creation_gets_safe_allow() {
    let (table, posts) = recording(Fail::Never);
    let mut body = b"--b\r\nContent-Type: application/json\r\n\r\n".to_vec();
    body.extend(json_body(&valid_entry("urn:m", "M")));
    body.extend(b"\r\n--b\r\nContent-Type: image/png\r\n\r\nxyz\r\n--b--");
    let outcome = send(
        &table,
        RequestContext::new(Method::POST, "/posts")
            .with_body(r#"multipart/related; boundary=b; type="application/json""#, body),
    );
    // RecordingAdapter keeps the default create_media_with_entry
    assert_eq!(outcome.status, 405);
    assert_eq!(outcome.allow.as_deref(), Some("GET, HEAD, OPTIONS"));
    assert_eq!(posts.closings(), 1);
    assert!(posts.inner().is_empty().unwrap());
}

#[test]
fn test_media_route_on_entry_only_adapter_is_405() {
    let plain: Arc<dyn CollectionAdapter> = Arc::new(MemoryAdapter::new("notes"));
    let table = RouteTable::builder()
        .route_with_adapter("photo", "/photos/{entry}", ResourceType::Media, plain)
        .unwrap()
        .build();

    let outcome = send(&table, RequestContext::new(Method::DELETE, "/photos/x"));
    assert_eq!(outcome.status, 405);
    assert_eq!(outcome.allow.as_deref(), Some("GET, HEAD, OPTIONS"));

    let outcome = send(&table, RequestContext::get("/photos/x"));
    assert_eq!(outcome.status, 405);
}

#[test]
fn test_unmapped_method_lists_every_legal_method() {
    let (table, _) = recording(Fail::Never);
    let outcome = send(&table, RequestContext::new(Method::PATCH, "/posts/media/x"));
    assert_eq!(outcome.status, 405);
    assert_eq!(outcome.allow.as_deref(), Some("GET, HEAD, PUT, POST, DELETE, OPTIONS"));
}

#[test]
fn test_first_registration_wins() {
    let first = Arc::new(RecordingAdapter::new("first", Fail::Never));
    let second = Arc::new(RecordingAdapter::new("second", Fail::Never));
    let table = RouteTable::builder()
        .route_with_adapter("a", "/shared/{entry}", ResourceType::Entry, Arc::clone(&first) as Arc<dyn CollectionAdapter>)
        .unwrap()
        .route_with_adapter("b", "/shared/{entry}", ResourceType::Entry, Arc::clone(&second) as Arc<dyn CollectionAdapter>)
        .unwrap()
        .build();

    send(&table, RequestContext::get("/shared/x"));
    assert!(!first.calls().is_empty());
    assert!(second.calls().is_empty());
}
