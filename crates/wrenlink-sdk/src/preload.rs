//! In-memory store of preloaded module files

use std::collections::HashMap;

/// Files registered by path, ready to be handed to the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadManifest {
    files: HashMap<String, Vec<u8>>,
}

impl PreloadManifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file, replacing any earlier contents for the same path.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Contents registered for `path`
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Whether `path` is registered
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Remove a file
    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Move every file of `other` into this manifest
    pub fn merge(&mut self, other: PreloadManifest) {
        self.files.extend(other.files);
    }

    /// Registered paths, in no particular order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P, C> FromIterator<(P, C)> for PreloadManifest
where
    P: Into<String>,
    C: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut manifest = PreloadManifest::new();
        for (path, contents) in iter {
            manifest.insert(path, contents);
        }
        manifest
    }
}
