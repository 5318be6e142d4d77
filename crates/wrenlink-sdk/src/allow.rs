//! Allow list of fetchable script paths

use std::collections::HashSet;

use crate::host::AllowList;

/// Set of exact paths that may be fetched in restricted mode.
///
/// Matching is exact: no prefix, glob or case folding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAllowList {
    paths: HashSet<String>,
}

impl ScriptAllowList {
    /// Create an empty list (nothing allowed)
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a path
    pub fn allow(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    /// Number of allowed paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no path is allowed
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl AllowList for ScriptAllowList {
    fn is_allowed(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

impl<S: Into<String>> FromIterator<S> for ScriptAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ScriptAllowList {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for ScriptAllowList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.paths.extend(iter.into_iter().map(Into::into));
    }
}
