use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of parameters stored inline before spilling to the heap.
/// Most AtomPub routes carry ≤4 variables (collection, entry, media name, page).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Inline storage for `(name, value)` pairs.
///
/// Names come from the compiled route (known at configuration time), so they
/// are `Arc<str>` and cloned in O(1); values are per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Parameter bag extracted from a matched path.
///
/// Keys are unique: inserting a name that is already present replaces its value
/// in place, so a route that repeats a variable ends up with the last capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    inner: ParamVec,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a parameter.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.inner.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.inner.push((name, value));
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(k, _)| k.as_ref())
    }

    /// Merge `other` into `self`; values from `other` win.
    pub fn extend(&mut self, other: Params) {
        for (k, v) in other.inner {
            self.insert(k, v);
        }
    }

    /// Note: this allocates - use [`Params::get`] on the request path.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
