//! Module discovery: a sorted depth-first walk for manifest files.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

use crate::core::exclusion::DiscoveryRules;
use crate::core::types::Module;
use crate::error::FilesystemError;

/// Find every directory under `root` (inclusive) that holds a manifest file.
///
/// Siblings are visited in byte order of their names and each directory is
/// fully walked before its next sibling. A module directory is still
/// descended into, so nested modules are reported after (or before, if their
/// name sorts ahead of the manifest) their parent. Excluded entries are
/// pruned with their whole subtree; the root itself is never excluded.
/// Symlinks are not followed.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover_modules(root: &Path, rules: &DiscoveryRules) -> Result<Vec<Module>, FilesystemError> {
    let root = fs::canonicalize(root).map_err(|err| FilesystemError::new(root, err))?;
    if !root.is_dir() {
        return Err(FilesystemError::new(
            &root,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !rules.is_excluded(&entry.file_name().to_string_lossy())
        });

    let mut modules = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !rules.is_manifest(&name, entry.file_type().is_file()) {
            continue;
        }
        if let Some(dir) = entry.path().parent() {
            trace!(module = %dir.display(), "found manifest");
            modules.push(Module::new(dir));
        }
    }

    debug!(count = modules.len(), "discovery finished");
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::test_support::FixtureTree;

    fn paths(modules: &[Module]) -> Vec<PathBuf> {
        modules.iter().map(|m| m.path().to_path_buf()).collect()
    }

    #[test]
    fn finds_root_and_nested_modules_depth_first() {
        let tree = FixtureTree::new();
        tree.module("");
        tree.module("engine");
        tree.module("engine/boltengine");
        tree.module("sql");

        let modules = discover_modules(tree.path(), &DiscoveryRules::default()).expect("discover");
        assert_eq!(
            paths(&modules),
            vec![
                tree.abs("engine/boltengine"),
                tree.abs("engine"),
                tree.abs(""),
                tree.abs("sql"),
            ]
        );
    }

    #[test]
    fn siblings_are_sorted_by_name() {
        let tree = FixtureTree::new();
        tree.module("c");
        tree.module("a");
        tree.module("b");

        let modules = discover_modules(tree.path(), &DiscoveryRules::default()).expect("discover");
        assert_eq!(
            paths(&modules),
            vec![tree.abs("a"), tree.abs("b"), tree.abs("c")]
        );
    }

    #[test]
    fn module_with_nested_module_yields_both() {
        let tree = FixtureTree::new();
        tree.module("mod");
        tree.module("mod/sub");

        let modules = discover_modules(tree.path(), &DiscoveryRules::default()).expect("discover");
        assert_eq!(paths(&modules), vec![tree.abs("mod"), tree.abs("mod/sub")]);
    }

    #[test]
    fn excluded_subtrees_are_pruned() {
        let tree = FixtureTree::new();
        tree.module("kept");
        tree.module("vendor/dep");
        tree.module("kept/testdata/fixture");
        tree.module(".hidden");
        tree.module("_tools");
        tree.module("deep/a/_b/c");

        let modules = discover_modules(tree.path(), &DiscoveryRules::default()).expect("discover");
        assert_eq!(paths(&modules), vec![tree.abs("kept")]);
    }

    #[test]
    fn manifest_directory_is_not_a_module() {
        let tree = FixtureTree::new();
        tree.dir("odd/go.mod");
        tree.file("odd/go.sum");

        let modules = discover_modules(tree.path(), &DiscoveryRules::default()).expect("discover");
        assert!(modules.is_empty());
    }

    #[test]
    fn custom_manifest_name() {
        let tree = FixtureTree::new();
        tree.file("a/module.toml");
        tree.module("b");

        let rules = DiscoveryRules::new("module.toml");
        let modules = discover_modules(tree.path(), &rules).expect("discover");
        assert_eq!(paths(&modules), vec![tree.abs("a")]);
    }

    #[test]
    fn missing_root_is_a_filesystem_error() {
        let tree = FixtureTree::new();
        let err = discover_modules(&tree.path().join("missing"), &DiscoveryRules::default())
            .expect_err("missing root");
        assert!(err.path.ends_with("missing"));
    }

    #[test]
    fn file_root_is_a_filesystem_error() {
        let tree = FixtureTree::new();
        tree.file("plain.txt");
        let err = discover_modules(&tree.path().join("plain.txt"), &DiscoveryRules::default())
            .expect_err("file root");
        assert_eq!(err.source.kind(), io::ErrorKind::NotADirectory);
    }
}
