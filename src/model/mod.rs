//! # Model Module
//!
//! The narrow document surface the router reads and produces: entries, feeds,
//! service and category documents, plus the parser/renderer seams through
//! which a host plugs in its own serialisation.

mod clock;
mod codec;
mod document;
mod entry;
mod multipart;

pub use clock::{format_millis, http_date, now_rfc3339, parse_http_date, parse_marker, unix_millis_now};
pub use codec::{
    media_type_essence, media_type_param, BodyParser, JsonEntryParser, JsonRenderer, Renderer,
};
pub use document::{
    Categories, Category, CollectionInfo, Document, Feed, ServiceDocument, WorkspaceInfo,
};
pub use entry::{Content, ContentKind, Entry, EntrySource, Link, MediaResource, Member, Person};
pub use multipart::{is_multipart_related, MultipartRelated, Part, MULTIPART_RELATED};
