//! Race detector runtime object (`race_<os>_<arch>.syso`) resolution.
//!
//! Prebuilt Go releases only carry the race runtime for the host
//! architecture. For cross targets the object is fetched from the Go
//! source tree at a ref matching the installed toolchain.

use std::path::{Path, PathBuf};

use super::target::Target;

const SOURCE_BASE_URL: &str = "https://raw.githubusercontent.com/golang/go";

/// Go 1.15 shipped a broken linux/ppc64le runtime; the rc1 object works.
/// See golang/go#42080.
const PPC64LE_GO115_REF: &str = "go1.15rc1";

/// Pick the Go source ref to fetch the race runtime from.
///
/// `version_output` is the raw `go version` line, e.g.
/// `go version go1.14.9 linux/amd64` or
/// `go version devel +66e66e7113 Sun Sep 13 19:17:09 2020 +0000 linux/amd64`.
/// Unknown formats fall back to the newest release tag.
pub fn resolve_runtime_ref(
    release_tags: &[String],
    target: &Target,
    version_output: &str,
) -> Option<String> {
    let has_go115 = release_tags.iter().any(|tag| tag == "go1.15");
    if has_go115 && target.os == "linux" && target.arch == "ppc64le" {
        return Some(PPC64LE_GO115_REF.to_string());
    }

    let words: Vec<&str> = version_output.split_whitespace().collect();
    let fields: &[&str] = if words.len() > 3 {
        &words[2..words.len() - 1]
    } else {
        &[]
    };
    match fields {
        [release] => Some((*release).to_string()),
        [_, revision, _, _, _, _, _, _] => {
            Some(revision.strip_prefix('+').unwrap_or(*revision).to_string())
        }
        _ => release_tags.last().cloned(),
    }
}

/// Location of the race runtime inside GOROOT and in the Go source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceRuntime {
    pub file_name: String,
    /// Path relative to GOROOT (and to the source tree root).
    pub relative_path: String,
    pub url: String,
}

impl RaceRuntime {
    pub fn new(target: &Target, git_ref: &str) -> Self {
        let file_name = format!("race_{}_{}.syso", target.os, target.arch);
        let relative_path = format!("src/runtime/race/{file_name}");
        let url = format!("{SOURCE_BASE_URL}/{git_ref}/{relative_path}");
        Self {
            file_name,
            relative_path,
            url,
        }
    }

    pub fn destination(&self, goroot: &Path) -> PathBuf {
        goroot.join(&self.relative_path)
    }
}
