//! Method × resource-type state machine.
//!
//! Everything here is a pure function of its inputs; the legal method sets in
//! particular never depend on which adapter is bound.

use http::Method;
use std::fmt;

use crate::target::ResourceType;

/// Operations the dispatcher can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetService,
    GetCollection,
    GetMember,
    CreateMember,
    UpdateMember,
    DeleteMember,
    GetMedia,
    CreateMedia,
    UpdateMedia,
    DeleteMedia,
    GetCategories,
    /// Forwarded to [`crate::adapter::CollectionAdapter::extension_request`]
    Extension,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetService => "get_service",
            Self::GetCollection => "get_collection",
            Self::GetMember => "get_member",
            Self::CreateMember => "create_member",
            Self::UpdateMember => "update_member",
            Self::DeleteMember => "delete_member",
            Self::GetMedia => "get_media",
            Self::CreateMedia => "create_media",
            Self::UpdateMedia => "update_media",
            Self::DeleteMedia => "delete_media",
            Self::GetCategories => "get_categories",
            Self::Extension => "extension",
        }
    }

    /// Runs inside the adapter lifecycle.
    #[must_use]
    pub fn needs_adapter(&self) -> bool {
        !matches!(self, Self::GetService)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const READ_ONLY: &[Method] = &[Method::GET, Method::HEAD, Method::OPTIONS];
const COLLECTION: &[Method] = &[Method::GET, Method::HEAD, Method::POST, Method::OPTIONS];
const MEMBER: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::OPTIONS,
];

/// Methods legal on a resource type, in `Allow` header order.
#[must_use]
pub fn legal_methods(resource_type: ResourceType) -> &'static [Method] {
    match resource_type {
        ResourceType::Service | ResourceType::Categories => READ_ONLY,
        ResourceType::Collection => COLLECTION,
        ResourceType::Entry | ResourceType::Media => MEMBER,
        ResourceType::Unknown => &[],
    }
}

/// Legal methods that never write, advertised when an adapter declines an
/// optional operation.
#[must_use]
pub fn safe_methods(resource_type: ResourceType) -> Vec<Method> {
    legal_methods(resource_type)
        .iter()
        .filter(|m| matches!(**m, Method::GET | Method::HEAD | Method::OPTIONS))
        .cloned()
        .collect()
}

/// `Allow` methods after an adapter declined the operation `method` selected.
///
/// The safe subset, without the declined method itself; `GET` and `HEAD`
/// select the same operation, so declining one drops both.
#[must_use]
pub fn declined_allow(resource_type: ResourceType, method: &Method) -> Vec<Method> {
    let read = matches!(*method, Method::GET | Method::HEAD);
    safe_methods(resource_type)
        .into_iter()
        .filter(|m| m != method && !(read && matches!(*m, Method::GET | Method::HEAD)))
        .collect()
}

/// `Allow` header value for a resource type.
#[must_use]
pub fn allow_header(resource_type: ResourceType) -> String {
    legal_methods(resource_type)
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the operation for `method` on `resource_type`.
///
/// `entry_body` tells whether the request body is an entry the configured
/// parser understands; a `POST` to a collection with any other body creates a
/// media resource. `OPTIONS` is answered by the dispatcher itself and never
/// selects an operation.
#[must_use]
pub fn select_operation(method: &Method, resource_type: ResourceType, entry_body: bool) -> Option<Operation> {
    use Operation::*;

    let read = *method == Method::GET || *method == Method::HEAD;
    let op = match resource_type {
        ResourceType::Service if read => GetService,
        ResourceType::Categories if read => GetCategories,
        ResourceType::Collection if read => GetCollection,
        ResourceType::Collection if *method == Method::POST => {
            if entry_body {
                CreateMember
            } else {
                CreateMedia
            }
        }
        ResourceType::Entry if read => GetMember,
        ResourceType::Entry if *method == Method::PUT => UpdateMember,
        ResourceType::Entry if *method == Method::DELETE => DeleteMember,
        ResourceType::Media if read => GetMedia,
        ResourceType::Media if *method == Method::PUT => UpdateMedia,
        ResourceType::Media if *method == Method::DELETE => DeleteMedia,
        ResourceType::Entry | ResourceType::Media if *method == Method::POST => Extension,
        _ => return None,
    };
    Some(op)
}
