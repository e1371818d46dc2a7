//! Read-only asset collections.

use bytes::Bytes;
use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::collections::HashMap;

/// A read-only collection of files addressed by relative path.
///
/// Paths use `/` separators and carry no leading slash, e.g. `css/site.css`.
pub trait AssetStore: Send + Sync + 'static {
    /// Returns the contents of the file at `path`, if there is one.
    fn get(&self, path: &str) -> Option<Bytes>;
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Bundle;

/// Assets compiled into the binary from the `assets/` directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl EmbeddedAssets {
    /// Lists the paths of every embedded file.
    pub fn paths() -> impl Iterator<Item = Cow<'static, str>> {
        Bundle::iter()
    }
}

impl AssetStore for EmbeddedAssets {
    fn get(&self, path: &str) -> Option<Bytes> {
        Bundle::get(path).map(|file| match file.data {
            Cow::Borrowed(data) => Bytes::from_static(data),
            Cow::Owned(data) => Bytes::from(data),
        })
    }
}

/// An in-memory asset collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Bytes>,
}

impl MemoryAssets {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, replacing any previous contents at `path`.
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) -> &mut Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// Builder-style variant of [`insert`](MemoryAssets::insert).
    pub fn with(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }
}

impl AssetStore for MemoryAssets {
    fn get(&self, path: &str) -> Option<Bytes> {
        self.files.get(path).cloned()
    }
}
