//! Parameter sources for template expansion.
//!
//! Expansion never reflects over values: every source answers a named lookup
//! through [`ParamSource::resolve`]. Maps, structs (via [`Fields`]) and the
//! request-derived namespace in [`crate::target::RequestVariables`] all sit
//! behind the same trait.

use std::collections::{BTreeMap, HashMap};

use super::Params;

/// Named lookup used by [`super::Route::expand`].
pub trait ParamSource {
    /// Value for `name`, or `None` when this source does not know it.
    fn resolve(&self, name: &str) -> Option<String>;

    /// Names this source explicitly provides.
    ///
    /// Only enumerable sources return anything here; the names drive the
    /// query-string overflow of [`super::Route::expand`].
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<T: ParamSource + ?Sized> ParamSource for &T {
    fn resolve(&self, name: &str) -> Option<String> {
        (**self).resolve(name)
    }

    fn names(&self) -> Vec<String> {
        (**self).names()
    }
}

/// Source that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ParamSource for EmptySource {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Leading `:` is stripped so route-style keys (`:entry`) address `entry`.
fn clean_key(key: &str) -> &str {
    key.strip_prefix(':').unwrap_or(key)
}

impl ParamSource for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name)
            .or_else(|| self.get(&format!(":{name}")))
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().map(|k| clean_key(k).to_string()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl ParamSource for BTreeMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name)
            .or_else(|| self.get(&format!(":{name}")))
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().map(|k| clean_key(k).to_string()).collect();
        names.dedup();
        names
    }
}

impl ParamSource for [(&str, &str)] {
    fn resolve(&self, name: &str) -> Option<String> {
        self.iter()
            .rev()
            .find(|(k, _)| clean_key(k) == name)
            .map(|(_, v)| (*v).to_string())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(|(k, _)| clean_key(k).to_string()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl<const N: usize> ParamSource for [(&str, &str); N] {
    fn resolve(&self, name: &str) -> Option<String> {
        self.as_slice().resolve(name)
    }

    fn names(&self) -> Vec<String> {
        self.as_slice().names()
    }
}

impl ParamSource for Params {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names().map(str::to_string).collect();
        names.sort();
        names
    }
}

/// Named field access for plain structs used as expansion sources.
///
/// ```
/// use atomrouter::template::{Fields, FieldSource, Route};
///
/// struct Post { slug: String, year: u16 }
///
/// impl Fields for Post {
///     fn field_names(&self) -> &'static [&'static str] { &["slug", "year"] }
///     fn field(&self, name: &str) -> Option<String> {
///         match name {
///             "slug" => Some(self.slug.clone()),
///             "year" => Some(self.year.to_string()),
///             _ => None,
///         }
///     }
/// }
///
/// let route = Route::compile("archive", "/{year}/{slug}").unwrap();
/// let post = Post { slug: "hello".into(), year: 2024 };
/// assert_eq!(route.expand(&FieldSource(&post)), "/2024/hello");
/// ```
pub trait Fields {
    fn field_names(&self) -> &'static [&'static str];
    fn field(&self, name: &str) -> Option<String>;
}

/// Adapts a [`Fields`] implementation into a [`ParamSource`].
pub struct FieldSource<'a, T: Fields + ?Sized>(pub &'a T);

impl<T: Fields + ?Sized> ParamSource for FieldSource<'_, T> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.0.field(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.field_names().iter().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}

/// Lookup backed by a closure; enumerates nothing.
pub struct FnSource<F>(pub F);

impl<F> ParamSource for FnSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }
}

/// Ordered chain of sources: the first source that resolves a name wins.
///
/// Enumerated names come from the first source only, so fall-back sources can
/// fill declared variables without leaking into the query string.
#[derive(Default)]
pub struct ChainSource<'a> {
    sources: Vec<&'a dyn ParamSource>,
}

impl<'a> ChainSource<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, source: &'a dyn ParamSource) -> Self {
        self.sources.push(source);
        self
    }
}

impl ParamSource for ChainSource<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.resolve(name))
    }

    fn names(&self) -> Vec<String> {
        self.sources.first().map(|s| s.names()).unwrap_or_default()
    }
}
