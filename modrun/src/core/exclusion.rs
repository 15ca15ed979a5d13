//! Name predicates that decide which directory entries module discovery
//! looks at.
//!
//! These mirror the paths the Go toolchain itself ignores when matching
//! `./...`: hidden and underscore-prefixed entries, `vendor` and `testdata`.

/// Default manifest file marking a module root.
pub const DEFAULT_MANIFEST: &str = "go.mod";

const VENDOR_DIR: &str = "vendor";
const TESTDATA_DIR: &str = "testdata";

/// Whether an entry with this name is pruned from discovery, at any depth.
pub fn is_excluded(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || name == VENDOR_DIR || name == TESTDATA_DIR
}

/// Rules applied to every entry during one discovery walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRules {
    pub manifest: String,
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        Self {
            manifest: DEFAULT_MANIFEST.to_string(),
        }
    }
}

impl DiscoveryRules {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        is_excluded(name)
    }

    /// An entry marks its parent as a module only if it is a regular file
    /// whose name matches the manifest exactly.
    pub fn is_manifest(&self, name: &str, is_file: bool) -> bool {
        is_file && name == self.manifest
    }
}
